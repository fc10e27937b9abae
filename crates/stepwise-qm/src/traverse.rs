//! Depth-first walk over a question tree with backward navigation.
//!
//! The walk keeps an explicit pending stack and a visit history instead of
//! recursing, so that a `Back` answer can rewind the walk in place: nodes are
//! popped off the history, their expanded children are taken off the pending
//! stack again and the nodes themselves are pushed back for another visit.

use serde_json::Value;
use tracing::Instrument;

use crate::answers::AnswerStore;
use crate::dynamic::{Resolution, resolve, resolve_text};
use crate::error::QmError;
use crate::question::{OptionSource, QTreeNode, Question, QuestionKind, StaticOptions};
use crate::ui::{InputResult, PromptConfig, PromptGateway, RemoteFuncExecutor};
use crate::validation::{ConditionEvaluator, SchemaEvaluator, Validator};

type NodeId = usize;

const ROOT: NodeId = 0;

/// Flat view of a borrowed tree; node identity is the slot index.
struct Arena<'t> {
    nodes: Vec<&'t QTreeNode>,
    children: Vec<Vec<NodeId>>,
}

impl<'t> Arena<'t> {
    fn build(root: &'t QTreeNode) -> Self {
        let mut nodes = vec![root];
        let mut children = vec![Vec::new()];
        let mut index = 0;
        while index < nodes.len() {
            let node = nodes[index];
            for child in &node.children {
                let id = nodes.len();
                nodes.push(child);
                children.push(Vec::new());
                children[index].push(id);
            }
            index += 1;
        }
        Self { nodes, children }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: NodeId) -> &'t QTreeNode {
        self.nodes[id]
    }

    fn question(&self, id: NodeId) -> Option<&'t Question> {
        self.nodes[id].data.as_question()
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        &self.children[id]
    }
}

/// Per-traversal bookkeeping, discarded when the walk ends.
struct WalkState {
    pending: Vec<NodeId>,
    history: Vec<NodeId>,
    parent: Vec<Option<NodeId>>,
    /// Answers reduced to identifiers, seen by child conditions and `$parent`.
    values: Vec<Option<Value>>,
    /// Answers as the gateway returned them, offered again after `Back`.
    given: Vec<Option<Value>>,
    auto_skipped: Vec<bool>,
}

impl WalkState {
    fn new(len: usize) -> Self {
        Self {
            pending: vec![ROOT],
            history: Vec::new(),
            parent: vec![None; len],
            values: vec![None; len],
            given: vec![None; len],
            auto_skipped: vec![false; len],
        }
    }

    fn parent_value(&self, id: NodeId) -> Option<Value> {
        self.parent[id].and_then(|parent| self.values[parent].clone())
    }

    /// Takes the children of `id` that are still waiting off the pending stack.
    fn retract_children(&mut self, arena: &Arena<'_>, id: NodeId) {
        let children = arena.children(id);
        while let Some(top) = self.pending.last() {
            if children.contains(top) {
                self.pending.pop();
            } else {
                break;
            }
        }
    }

    /// Whether going back may stop at this node and prompt it again.
    fn is_repromptable(&self, arena: &Arena<'_>, id: NodeId) -> bool {
        match arena.question(id) {
            Some(question) => !question.kind.is_func() && !self.auto_skipped[id],
            None => false,
        }
    }
}

/// Drives one traversal of a question tree.
pub struct Traversal<'a> {
    gateway: &'a dyn PromptGateway,
    executor: Option<&'a dyn RemoteFuncExecutor>,
    conditions: Option<&'a dyn ConditionEvaluator>,
}

impl<'a> Traversal<'a> {
    pub fn new(gateway: &'a dyn PromptGateway) -> Self {
        Self {
            gateway,
            executor: None,
            conditions: None,
        }
    }

    pub fn executor(mut self, executor: &'a dyn RemoteFuncExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Replaces the default [`SchemaEvaluator`] used for child conditions.
    pub fn conditions(mut self, conditions: &'a dyn ConditionEvaluator) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Walks `root`, filling `answers`.
    ///
    /// Returns `Success` carrying the final answers as a JSON object, `Cancel`
    /// when the user canceled or went back past the first question, or the
    /// first `Error` encountered.
    pub async fn run(&self, root: &QTreeNode, answers: &mut AnswerStore) -> InputResult {
        let span = tracing::debug_span!("traverse", seeded = answers.len());
        self.walk(root, answers).instrument(span).await
    }

    async fn walk(&self, root: &QTreeNode, answers: &mut AnswerStore) -> InputResult {
        let fallback = SchemaEvaluator::new(self.executor);
        let conditions: &dyn ConditionEvaluator = match self.conditions {
            Some(conditions) => conditions,
            None => &fallback,
        };

        let arena = Arena::build(root);
        let mut state = WalkState::new(arena.len());
        let mut step = 1;

        while let Some(current) = state.pending.pop() {
            if let Some(question) = arena.question(current) {
                let parent_value = state.parent_value(current);
                let previous = state.given[current].clone();
                let total_steps = step + state.pending.len();
                state.auto_skipped[current] = false;

                let outcome = self
                    .visit(
                        question,
                        parent_value.as_ref(),
                        previous,
                        answers,
                        step,
                        total_steps,
                    )
                    .await;

                match outcome {
                    InputResult::Back => {
                        state.retract_children(&arena, current);
                        state.pending.push(current);

                        let mut found = false;
                        while let Some(last) = state.history.pop() {
                            state.retract_children(&arena, last);
                            state.pending.push(last);
                            if let Some(question) = arena.question(last) {
                                answers.remove(&question.name);
                            }
                            if state.is_repromptable(&arena, last) {
                                found = true;
                                break;
                            }
                        }
                        if !found {
                            tracing::debug!(question = %question.name, "nothing left to go back to");
                            return InputResult::Cancel;
                        }
                        step = step.saturating_sub(1).max(1);
                        tracing::debug!(from = %question.name, step, "went back");
                        continue;
                    }
                    InputResult::Cancel => {
                        tracing::debug!(question = %question.name, "traversal canceled");
                        return InputResult::Cancel;
                    }
                    InputResult::Error(err) => {
                        tracing::debug!(question = %question.name, error = %err, "traversal failed");
                        return InputResult::Error(err);
                    }
                    InputResult::Success(value) => {
                        if !question.kind.is_func() {
                            step += 1;
                        }
                        self.record(&mut state, current, question, value, answers);
                    }
                    InputResult::Skip(value) => {
                        state.auto_skipped[current] = true;
                        tracing::debug!(question = %question.name, "resolved without prompting");
                        self.record(&mut state, current, question, value, answers);
                    }
                }
            }

            state.history.push(current);

            let children = arena.children(current);
            if children.is_empty() {
                continue;
            }
            let value = state.values[current].clone().unwrap_or(Value::Null);
            let mut included = Vec::with_capacity(children.len());
            for &child in children {
                if let Some(condition) = &arena.node(child).condition {
                    match conditions.evaluate(condition, &value, answers).await {
                        Ok(None) => {}
                        Ok(Some(violation)) => {
                            tracing::trace!(child, %violation, "condition not met");
                            continue;
                        }
                        Err(err) => return InputResult::Error(err),
                    }
                }
                included.push(child);
            }
            for &child in included.iter().rev() {
                state.parent[child] = Some(current);
                state.pending.push(child);
            }
        }

        InputResult::Success(answers.to_json())
    }

    fn record(
        &self,
        state: &mut WalkState,
        id: NodeId,
        question: &Question,
        value: Value,
        answers: &mut AnswerStore,
    ) {
        state.values[id] = Some(normalized(&question.kind, &value));
        state.given[id] = Some(value.clone());
        answers.insert(question.name.clone(), value);
    }

    async fn visit(
        &self,
        question: &Question,
        parent: Option<&Value>,
        previous: Option<Value>,
        answers: &AnswerStore,
        step: usize,
        total_steps: usize,
    ) -> InputResult {
        if let Some(value) = answers.get(&question.name) {
            return InputResult::Success(value.clone());
        }
        if let Some(value) = &question.value {
            return InputResult::Skip(value.clone());
        }

        match &question.kind {
            QuestionKind::RemoteFunc(func) => {
                let Some(executor) = self.executor else {
                    return InputResult::Error(QmError::NoRemoteExecutor {
                        name: question.name.clone(),
                    });
                };
                match executor.execute(func, answers).await {
                    Ok(value) => InputResult::Success(value),
                    Err(err) => InputResult::Error(QmError::Delegate(err)),
                }
            }
            QuestionKind::LocalFunc(func) => InputResult::Success(func.0.call(answers).await),
            _ => match self
                .prompt(question, parent, previous, answers, step, total_steps)
                .await
            {
                Ok(result) => result,
                Err(err) => InputResult::Error(err),
            },
        }
    }

    async fn prompt(
        &self,
        question: &Question,
        parent: Option<&Value>,
        previous: Option<Value>,
        answers: &AnswerStore,
        step: usize,
        total_steps: usize,
    ) -> Result<InputResult, QmError> {
        let name = question.name.as_str();
        let default = match previous {
            Some(previous) => Some(previous),
            None => match &question.default {
                Some(default) => {
                    resolve(default, parent, answers, self.executor, Resolution::Lenient, name)
                        .await?
                }
                None => None,
            },
        };

        let mut config = PromptConfig::new(name, question.display_title());
        config.default = default;
        config.step = step;
        config.total_steps = total_steps;

        match &question.kind {
            QuestionKind::Text(spec) | QuestionKind::Password(spec) | QuestionKind::Number(spec) => {
                config.placeholder =
                    resolve_text(spec.placeholder.as_ref(), parent, answers, self.executor, name)
                        .await?;
                config.prompt =
                    resolve_text(spec.prompt.as_ref(), parent, answers, self.executor, name).await?;
                config.validation = spec
                    .validation
                    .as_ref()
                    .map(|validation| Validator::new(validation, answers, self.executor));
                config.password = matches!(question.kind, QuestionKind::Password(_));
                config.numeric = matches!(question.kind, QuestionKind::Number(_));
                Ok(self.gateway.input_text(config).await)
            }
            QuestionKind::SingleSelect(spec) | QuestionKind::MultiSelect(spec) => {
                let multi = matches!(question.kind, QuestionKind::MultiSelect(_));
                let options = self.load_options(name, &spec.options, answers).await?;
                if options.is_empty() {
                    return Err(QmError::EmptyOptionSet {
                        name: name.to_string(),
                    });
                }
                if spec.skip_single_option && options.len() == 1 {
                    let value = options
                        .first_value(spec.return_object)
                        .unwrap_or(Value::Null);
                    let value = if multi {
                        Value::Array(vec![value])
                    } else {
                        value
                    };
                    return Ok(InputResult::Skip(value));
                }

                config.placeholder =
                    resolve_text(spec.placeholder.as_ref(), parent, answers, self.executor, name)
                        .await?;
                config.prompt =
                    resolve_text(spec.prompt.as_ref(), parent, answers, self.executor, name).await?;
                config.validation = spec
                    .validation
                    .as_ref()
                    .map(|validation| Validator::new(validation, answers, self.executor));
                config.options = Some(options);
                config.return_object = spec.return_object;
                if multi {
                    Ok(self.gateway.select_options(config).await)
                } else {
                    Ok(self.gateway.select_option(config).await)
                }
            }
            QuestionKind::Folder(spec) => {
                config.validation = spec
                    .validation
                    .as_ref()
                    .map(|validation| Validator::new(validation, answers, self.executor));
                Ok(self.gateway.select_folder(config).await)
            }
            QuestionKind::RemoteFunc(_) | QuestionKind::LocalFunc(_) => {
                Err(QmError::UnsupportedQuestionKind {
                    name: name.to_string(),
                    kind: question.kind.label().to_string(),
                })
            }
        }
    }

    async fn load_options(
        &self,
        name: &str,
        source: &OptionSource,
        answers: &AnswerStore,
    ) -> Result<StaticOptions, QmError> {
        match source {
            OptionSource::Static(options) => Ok(options.clone()),
            OptionSource::Dynamic(func) => {
                let executor = self.executor.ok_or_else(|| QmError::NoRemoteExecutor {
                    name: name.to_string(),
                })?;
                let value = executor.execute(func, answers).await?;
                if value.is_null() {
                    return Ok(StaticOptions::Ids(Vec::new()));
                }
                StaticOptions::from_value(value).map_err(|err| {
                    QmError::Delegate(
                        anyhow::Error::new(err).context(format!("options loaded for '{name}'")),
                    )
                })
            }
        }
    }
}

/// The value children see: select answers are reduced to option identifiers.
fn normalized(kind: &QuestionKind, value: &Value) -> Value {
    let id = |value: &Value| match value {
        Value::Object(object) => object.get("id").cloned().unwrap_or_else(|| value.clone()),
        other => other.clone(),
    };
    match (kind, value) {
        (QuestionKind::SingleSelect(_), Value::Object(_)) => id(value),
        (QuestionKind::MultiSelect(_), Value::Array(items)) => {
            Value::Array(items.iter().map(id).collect())
        }
        _ => value.clone(),
    }
}

/// Walks `root` with the default condition evaluator.
pub async fn traverse(
    root: &QTreeNode,
    answers: &mut AnswerStore,
    gateway: &dyn PromptGateway,
    executor: Option<&dyn RemoteFuncExecutor>,
) -> InputResult {
    let mut traversal = Traversal::new(gateway);
    if let Some(executor) = executor {
        traversal = traversal.executor(executor);
    }
    traversal.run(root, answers).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ScriptedGateway;
    use crate::question::OptionItem;
    use serde_json::json;

    fn text(name: &str) -> QTreeNode {
        QTreeNode::question(Question::text(name))
    }

    #[test]
    fn arena_assigns_children_in_order() {
        let tree = QTreeNode::group()
            .with_child(text("a").with_child(text("a1")))
            .with_child(text("b"));
        let arena = Arena::build(&tree);
        assert_eq!(arena.len(), 4);
        assert_eq!(arena.children(ROOT), &[1, 2]);
        assert_eq!(arena.question(arena.children(1)[0]).unwrap().name, "a1");
    }

    #[test]
    fn normalized_reduces_option_objects_to_ids() {
        let single = QuestionKind::SingleSelect(crate::question::SelectSpec::new(
            OptionSource::Static(StaticOptions::Items(vec![OptionItem::new("a", "A")])),
        ));
        assert_eq!(normalized(&single, &json!({ "id": "a", "label": "A" })), json!("a"));
        assert_eq!(normalized(&single, &json!("a")), json!("a"));

        let multi = QuestionKind::MultiSelect(crate::question::SelectSpec::new(
            OptionSource::Static(StaticOptions::Ids(vec![])),
        ));
        assert_eq!(
            normalized(&multi, &json!([{ "id": "x" }, "y"])),
            json!(["x", "y"])
        );
    }

    #[tokio::test]
    async fn total_steps_counts_pending_questions() {
        let tree = QTreeNode::group().with_children([text("a"), text("b"), text("c")]);
        let gateway = ScriptedGateway::new([
            InputResult::Success(json!("1")),
            InputResult::Success(json!("2")),
            InputResult::Success(json!("3")),
        ]);
        let mut answers = AnswerStore::new();
        let result = traverse(&tree, &mut answers, &gateway, None).await;
        assert!(result.is_success());

        let steps: Vec<(usize, usize)> = gateway
            .prompts()
            .iter()
            .map(|record| (record.step, record.total_steps))
            .collect();
        assert_eq!(steps, vec![(1, 3), (2, 3), (3, 3)]);
    }
}
