use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::answers::AnswerStore;
use crate::dynamic::DynamicValue;
use crate::error::QmError;
use crate::validation::Validation;

/// Descriptor of a function that lives behind a [`crate::RemoteFuncExecutor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl FuncDescriptor {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            namespace: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// Function evaluated in-process instead of prompting.
#[async_trait]
pub trait LocalFunc: Send + Sync {
    async fn call(&self, answers: &AnswerStore) -> Value;
}

#[async_trait]
impl<F> LocalFunc for F
where
    F: Fn(&AnswerStore) -> Value + Send + Sync,
{
    async fn call(&self, answers: &AnswerStore) -> Value {
        self(answers)
    }
}

#[derive(Clone)]
pub struct LocalFuncRef(pub Arc<dyn LocalFunc>);

impl LocalFuncRef {
    pub fn new(func: impl LocalFunc + 'static) -> Self {
        Self(Arc::new(func))
    }
}

impl fmt::Debug for LocalFuncRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LocalFuncRef(..)")
    }
}

/// A selectable entry of a select question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OptionItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            detail: None,
            cli_name: None,
            data: None,
        }
    }
}

/// Options known up front: either bare identifiers or full items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StaticOptions {
    Ids(Vec<String>),
    Items(Vec<OptionItem>),
}

impl StaticOptions {
    pub fn len(&self) -> usize {
        match self {
            StaticOptions::Ids(ids) => ids.len(),
            StaticOptions::Items(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value recorded when the first option is picked without prompting.
    ///
    /// With `return_object` the whole option is returned (identifiers are
    /// wrapped as `{ "id": .. }`), otherwise only its identifier.
    pub fn first_value(&self, return_object: bool) -> Option<Value> {
        let id = match self {
            StaticOptions::Ids(ids) => ids.first()?,
            StaticOptions::Items(items) => &items.first()?.id,
        };
        self.value_of(id, return_object)
    }

    /// Value recorded for the option `id`, shaped like [`Self::first_value`].
    /// `None` when no option carries that identifier.
    pub fn value_of(&self, id: &str, return_object: bool) -> Option<Value> {
        match self {
            StaticOptions::Ids(ids) => ids.iter().find(|candidate| *candidate == id).map(|id| {
                if return_object {
                    let mut object = Map::new();
                    object.insert("id".into(), Value::String(id.clone()));
                    Value::Object(object)
                } else {
                    Value::String(id.clone())
                }
            }),
            StaticOptions::Items(items) => items.iter().find(|item| item.id == id).map(|item| {
                if return_object {
                    serde_json::to_value(item).unwrap_or(Value::Null)
                } else {
                    Value::String(item.id.clone())
                }
            }),
        }
    }

    /// Parses the value produced by a remote option loader.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionSource {
    Static(StaticOptions),
    Dynamic(FuncDescriptor),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<DynamicValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<DynamicValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectSpec {
    pub options: OptionSource,
    #[serde(default)]
    pub skip_single_option: bool,
    #[serde(default)]
    pub return_object: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<DynamicValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<DynamicValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

impl SelectSpec {
    pub fn new(options: OptionSource) -> Self {
        Self {
            options,
            skip_single_option: false,
            return_object: false,
            placeholder: None,
            prompt: None,
            validation: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    Text(InputSpec),
    Password(InputSpec),
    Number(InputSpec),
    SingleSelect(SelectSpec),
    MultiSelect(SelectSpec),
    Folder(FolderSpec),
    RemoteFunc(FuncDescriptor),
    #[serde(skip)]
    LocalFunc(LocalFuncRef),
}

impl QuestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::Text(_) => "text",
            QuestionKind::Password(_) => "password",
            QuestionKind::Number(_) => "number",
            QuestionKind::SingleSelect(_) => "single_select",
            QuestionKind::MultiSelect(_) => "multi_select",
            QuestionKind::Folder(_) => "folder",
            QuestionKind::RemoteFunc(_) => "remote_func",
            QuestionKind::LocalFunc(_) => "local_func",
        }
    }

    /// Function kinds resolve without ever showing a prompt.
    ///
    /// Going back passes over both remote and local functions.
    pub fn is_func(&self) -> bool {
        matches!(self, QuestionKind::RemoteFunc(_) | QuestionKind::LocalFunc(_))
    }

    pub fn select_spec(&self) -> Option<&SelectSpec> {
        match self {
            QuestionKind::SingleSelect(spec) | QuestionKind::MultiSelect(spec) => Some(spec),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DynamicValue>,
    /// Already resolved answer; the question is never prompted when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    pub fn new(name: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            default: None,
            value: None,
            kind,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, QuestionKind::Text(InputSpec::default()))
    }

    pub fn password(name: impl Into<String>) -> Self {
        Self::new(name, QuestionKind::Password(InputSpec::default()))
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, QuestionKind::Number(InputSpec::default()))
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self::new(name, QuestionKind::Folder(FolderSpec::default()))
    }

    pub fn single_select(name: impl Into<String>, options: OptionSource) -> Self {
        Self::new(name, QuestionKind::SingleSelect(SelectSpec::new(options)))
    }

    pub fn multi_select(name: impl Into<String>, options: OptionSource) -> Self {
        Self::new(name, QuestionKind::MultiSelect(SelectSpec::new(options)))
    }

    pub fn remote_func(name: impl Into<String>, func: FuncDescriptor) -> Self {
        Self::new(name, QuestionKind::RemoteFunc(func))
    }

    pub fn local_func(name: impl Into<String>, func: impl LocalFunc + 'static) -> Self {
        Self::new(name, QuestionKind::LocalFunc(LocalFuncRef::new(func)))
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_default(mut self, default: DynamicValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets `skip_single_option` on select questions; other kinds are unchanged.
    pub fn skip_single_option(mut self, skip: bool) -> Self {
        if let QuestionKind::SingleSelect(spec) | QuestionKind::MultiSelect(spec) = &mut self.kind {
            spec.skip_single_option = skip;
        }
        self
    }

    /// Sets `return_object` on select questions; other kinds are unchanged.
    pub fn return_object(mut self, return_object: bool) -> Self {
        if let QuestionKind::SingleSelect(spec) | QuestionKind::MultiSelect(spec) = &mut self.kind {
            spec.return_object = return_object;
        }
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        match &mut self.kind {
            QuestionKind::Text(spec) | QuestionKind::Password(spec) | QuestionKind::Number(spec) => {
                spec.validation = Some(validation);
            }
            QuestionKind::SingleSelect(spec) | QuestionKind::MultiSelect(spec) => {
                spec.validation = Some(validation);
            }
            QuestionKind::Folder(spec) => spec.validation = Some(validation),
            QuestionKind::RemoteFunc(_) | QuestionKind::LocalFunc(_) => {}
        }
        self
    }

    /// Title shown to the user, falling back to the description and the name.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.is_empty())
            .or(self.description.as_deref())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum GroupTag {
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupData {
    kind: GroupTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeData {
    Group(GroupData),
    Question(Question),
}

impl NodeData {
    pub fn group(name: Option<String>) -> Self {
        NodeData::Group(GroupData {
            kind: GroupTag::Group,
            name,
        })
    }

    pub fn as_question(&self) -> Option<&Question> {
        match self {
            NodeData::Question(question) => Some(question),
            NodeData::Group(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, NodeData::Group(_))
    }
}

/// A node of the question tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QTreeNode {
    #[serde(flatten)]
    pub data: NodeData,
    /// Evaluated against the parent's resolved value; the node is only
    /// visited when it reports no violation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Validation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<QTreeNode>,
}

impl QTreeNode {
    pub fn group() -> Self {
        Self {
            data: NodeData::group(None),
            condition: None,
            children: Vec::new(),
        }
    }

    pub fn named_group(name: impl Into<String>) -> Self {
        Self {
            data: NodeData::group(Some(name.into())),
            condition: None,
            children: Vec::new(),
        }
    }

    pub fn question(question: Question) -> Self {
        Self {
            data: NodeData::Question(question),
            condition: None,
            children: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Validation) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_child(mut self, child: QTreeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = QTreeNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Checks that no two questions in the tree share a name.
    pub fn validate_names(&self) -> Result<(), QmError> {
        let mut seen = BTreeSet::new();
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if let Some(question) = node.data.as_question()
                && !seen.insert(question.name.as_str())
            {
                return Err(QmError::DuplicateName(question.name.clone()));
            }
            pending.extend(node.children.iter());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_value_honours_return_object() {
        let ids = StaticOptions::Ids(vec!["only".into()]);
        assert_eq!(ids.first_value(false), Some(json!("only")));
        assert_eq!(ids.first_value(true), Some(json!({ "id": "only" })));

        let items = StaticOptions::Items(vec![OptionItem::new("a", "Alpha")]);
        assert_eq!(items.first_value(false), Some(json!("a")));
        assert_eq!(
            items.first_value(true),
            Some(json!({ "id": "a", "label": "Alpha" }))
        );
    }

    #[test]
    fn tree_deserializes_groups_and_questions() {
        let tree: QTreeNode = serde_json::from_value(json!({
            "kind": "group",
            "children": [
                { "name": "app-name", "kind": "text", "title": "Application name" },
                {
                    "name": "capability",
                    "kind": "single_select",
                    "options": ["tab", "bot"],
                    "skip_single_option": true,
                    "children": [
                        {
                            "name": "bot-id",
                            "kind": "text",
                            "condition": { "string": { "equals": "bot" } }
                        }
                    ]
                }
            ]
        }))
        .unwrap();

        assert!(tree.data.is_group());
        assert_eq!(tree.children.len(), 2);
        let select = tree.children[1].data.as_question().unwrap();
        let spec = select.kind.select_spec().unwrap();
        assert!(spec.skip_single_option);
        assert_eq!(
            spec.options,
            OptionSource::Static(StaticOptions::Ids(vec!["tab".into(), "bot".into()]))
        );
        assert!(tree.children[1].children[0].condition.is_some());
    }

    #[test]
    fn validate_names_reports_duplicates() {
        let tree = QTreeNode::group()
            .with_child(QTreeNode::question(Question::text("dup")))
            .with_child(QTreeNode::question(Question::text("dup")));
        let err = tree.validate_names().unwrap_err();
        assert!(matches!(err, QmError::DuplicateName(name) if name == "dup"));
    }
}
