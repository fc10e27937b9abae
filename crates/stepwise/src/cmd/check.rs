use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use stepwise_qm::QTreeNode;

use super::load_tree;

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(long, value_name = "tree.json")]
    pub tree: PathBuf,
}

pub fn run(args: CheckArgs) -> Result<()> {
    let tree = load_tree(&args.tree)?;
    let questions = count_questions(&tree);
    tracing::debug!(tree = %args.tree.display(), questions, "tree checked");
    println!("{}: {questions} question(s)", args.tree.display());
    Ok(())
}

fn count_questions(tree: &QTreeNode) -> usize {
    let own = usize::from(!tree.data.is_group());
    own + tree.children.iter().map(count_questions).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_qm::Question;

    #[test]
    fn groups_are_not_counted() {
        let tree = QTreeNode::group()
            .with_child(QTreeNode::question(Question::text("a")))
            .with_child(QTreeNode::group().with_child(QTreeNode::question(Question::text("b"))));
        assert_eq!(count_questions(&tree), 2);
    }
}
