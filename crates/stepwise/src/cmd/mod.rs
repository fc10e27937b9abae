pub mod answer;
pub mod check;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use stepwise_qm::QTreeNode;

/// Reads a question tree and rejects duplicate question names.
pub fn load_tree(path: &Path) -> Result<QTreeNode> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read tree {}", path.display()))?;
    let tree: QTreeNode = serde_json::from_str(&raw)
        .with_context(|| format!("tree {} is not a valid question tree", path.display()))?;
    tree.validate_names()
        .with_context(|| format!("tree {} has conflicting questions", path.display()))?;
    Ok(tree)
}
