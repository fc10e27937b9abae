use proptest::prelude::*;
use serde_json::json;

use stepwise_qm::{AnswerStore, InputResult, QTreeNode, Question, ScriptedGateway, traverse};

#[derive(Debug, Clone)]
struct Shape {
    group: bool,
    children: Vec<Shape>,
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = any::<bool>().prop_map(|group| Shape {
        group,
        children: Vec::new(),
    });
    leaf.prop_recursive(4, 40, 4, |inner| {
        (any::<bool>(), prop::collection::vec(inner, 0..4))
            .prop_map(|(group, children)| Shape { group, children })
    })
}

/// Builds the tree and returns the question names in pre-order.
fn build(shape: &Shape, counter: &mut usize, order: &mut Vec<String>) -> QTreeNode {
    let node = if shape.group {
        QTreeNode::group()
    } else {
        let name = format!("q{counter}");
        *counter += 1;
        order.push(name.clone());
        QTreeNode::question(Question::text(name))
    };
    let children: Vec<QTreeNode> = shape
        .children
        .iter()
        .map(|child| build(child, counter, order))
        .collect();
    node.with_children(children)
}

fn run(tree: &QTreeNode, gateway: &ScriptedGateway, answers: &mut AnswerStore) -> InputResult {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(traverse(tree, answers, gateway, None))
}

proptest! {
    #[test]
    fn every_question_is_prompted_once_in_preorder(shape in shape()) {
        let mut order = Vec::new();
        let tree = build(&shape, &mut 0, &mut order);
        let gateway = ScriptedGateway::new(order.iter().map(|name| InputResult::Success(json!(name))));
        let mut answers = AnswerStore::new();

        let result = run(&tree, &gateway, &mut answers);

        prop_assert!(result.is_success());
        prop_assert_eq!(gateway.prompted_names(), order.clone());
        prop_assert_eq!(answers.len(), order.len());
        let steps: Vec<usize> = gateway.prompts().iter().map(|record| record.step).collect();
        prop_assert_eq!(steps, (1..=order.len()).collect::<Vec<_>>());
    }

    #[test]
    fn preseeded_questions_are_skipped(shape in shape(), seed in any::<u64>()) {
        let mut order = Vec::new();
        let tree = build(&shape, &mut 0, &mut order);
        let mut answers = AnswerStore::new();
        let mut expected = Vec::new();
        for (index, name) in order.iter().enumerate() {
            if (seed >> (index % 64)) & 1 == 1 {
                answers.insert(name.clone(), json!("seeded"));
            } else {
                expected.push(name.clone());
            }
        }
        let gateway = ScriptedGateway::new(expected.iter().map(|_| InputResult::Success(json!("asked"))));

        let result = run(&tree, &gateway, &mut answers);

        prop_assert!(result.is_success());
        prop_assert_eq!(gateway.prompted_names(), expected);
        prop_assert_eq!(answers.len(), order.len());
    }
}
