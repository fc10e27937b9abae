use std::collections::BTreeSet;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::answers::AnswerStore;
use crate::error::QmError;
use crate::question::FuncDescriptor;
use crate::ui::RemoteFuncExecutor;

/// Rules checked against a single string answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringValidation {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_equals: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<String>,
}

/// Rules checked against a list of identifiers (multi-select answers).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringArrayValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub unique_items: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Vec<String>>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains_all: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains_any: Option<Vec<String>>,
}

/// A validation rule, also used as the inclusion condition of a tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    String(StringValidation),
    StringArray(StringArrayValidation),
    /// Delegated to the remote function executor; a non-empty string result
    /// is the violation message.
    Func(FuncDescriptor),
}

impl Validation {
    pub fn equals(value: impl Into<String>) -> Self {
        Validation::String(StringValidation {
            equals: Some(value.into()),
            ..Default::default()
        })
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Validation::String(StringValidation {
            one_of: Some(values.into_iter().map(Into::into).collect()),
            ..Default::default()
        })
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Validation::StringArray(StringArrayValidation {
            contains: Some(value.into()),
            ..Default::default()
        })
    }
}

/// Decides whether a child node is included, given its parent's answer.
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    /// Returns `None` when the condition holds, otherwise the violation.
    async fn evaluate(
        &self,
        condition: &Validation,
        value: &Value,
        answers: &AnswerStore,
    ) -> Result<Option<String>, QmError>;
}

/// Evaluates [`Validation`] rules, delegating function rules to an executor.
#[derive(Clone, Copy, Default)]
pub struct SchemaEvaluator<'a> {
    executor: Option<&'a dyn RemoteFuncExecutor>,
}

impl<'a> SchemaEvaluator<'a> {
    pub fn new(executor: Option<&'a dyn RemoteFuncExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<'a> ConditionEvaluator for SchemaEvaluator<'a> {
    async fn evaluate(
        &self,
        condition: &Validation,
        value: &Value,
        answers: &AnswerStore,
    ) -> Result<Option<String>, QmError> {
        validate(condition, value, answers, self.executor).await
    }
}

/// Checks `value` against `validation`; `Ok(None)` means it passes.
pub async fn validate(
    validation: &Validation,
    value: &Value,
    answers: &AnswerStore,
    executor: Option<&dyn RemoteFuncExecutor>,
) -> Result<Option<String>, QmError> {
    match validation {
        Validation::String(rules) => validate_string(rules, value),
        Validation::StringArray(rules) => Ok(validate_string_array(rules, value)),
        Validation::Func(func) => {
            let Some(executor) = executor else {
                return Err(QmError::NoRemoteExecutor {
                    name: func.method.clone(),
                });
            };
            let call = FuncDescriptor {
                namespace: func.namespace.clone(),
                method: func.method.clone(),
                params: Some(json!({ "input": value, "params": func.params })),
            };
            let outcome = executor.execute(&call, answers).await?;
            Ok(match outcome {
                Value::String(message) if !message.is_empty() => Some(message),
                _ => None,
            })
        }
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Object(object) => object.get("id").and_then(as_text),
        other => Some(other.to_string()),
    }
}

fn validate_string(rules: &StringValidation, value: &Value) -> Result<Option<String>, QmError> {
    let text = match as_text(value) {
        Some(text) if !text.is_empty() => text,
        _ if rules.required => return Ok(Some("a value is required".into())),
        Some(text) => text,
        None => return Ok(None),
    };

    if let Some(expected) = &rules.equals
        && &text != expected
    {
        return Ok(Some(format!("must equal '{expected}'")));
    }
    if let Some(unexpected) = &rules.not_equals
        && &text == unexpected
    {
        return Ok(Some(format!("must not equal '{unexpected}'")));
    }
    if let Some(allowed) = &rules.one_of
        && !allowed.contains(&text)
    {
        return Ok(Some(format!("must be one of: {}", allowed.join(", "))));
    }
    let length = text.chars().count();
    if let Some(min) = rules.min_length
        && length < min
    {
        return Ok(Some(format!("must be at least {min} characters")));
    }
    if let Some(max) = rules.max_length
        && length > max
    {
        return Ok(Some(format!("must be at most {max} characters")));
    }
    if let Some(pattern) = &rules.pattern {
        let regex = Regex::new(pattern).map_err(|source| QmError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        if !regex.is_match(&text) {
            return Ok(Some(format!("must match pattern '{pattern}'")));
        }
    }
    if let Some(prefix) = &rules.starts_with
        && !text.starts_with(prefix.as_str())
    {
        return Ok(Some(format!("must start with '{prefix}'")));
    }
    if let Some(suffix) = &rules.ends_with
        && !text.ends_with(suffix.as_str())
    {
        return Ok(Some(format!("must end with '{suffix}'")));
    }
    if let Some(needle) = &rules.includes
        && !text.contains(needle.as_str())
    {
        return Ok(Some(format!("must include '{needle}'")));
    }
    Ok(None)
}

fn validate_string_array(rules: &StringArrayValidation, value: &Value) -> Option<String> {
    let items: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        _ => return Some("expected a list of values".into()),
    };

    if let Some(min) = rules.min_items
        && items.len() < min
    {
        return Some(format!("select at least {min} items"));
    }
    if let Some(max) = rules.max_items
        && items.len() > max
    {
        return Some(format!("select at most {max} items"));
    }
    if rules.unique_items {
        let distinct: BTreeSet<&String> = items.iter().collect();
        if distinct.len() != items.len() {
            return Some("items must be unique".into());
        }
    }
    if let Some(expected) = &rules.equals {
        let left: BTreeSet<&String> = items.iter().collect();
        let right: BTreeSet<&String> = expected.iter().collect();
        if left != right {
            return Some(format!("must equal [{}]", expected.join(", ")));
        }
    }
    if let Some(allowed) = &rules.one_of
        && let Some(item) = items.iter().find(|item| !allowed.contains(*item))
    {
        return Some(format!("'{item}' is not one of: {}", allowed.join(", ")));
    }
    if let Some(required) = &rules.contains
        && !items.contains(required)
    {
        return Some(format!("must contain '{required}'"));
    }
    if let Some(required) = &rules.contains_all
        && let Some(missing) = required.iter().find(|item| !items.contains(*item))
    {
        return Some(format!("must contain '{missing}'"));
    }
    if let Some(any) = &rules.contains_any
        && !any.iter().any(|item| items.contains(item))
    {
        return Some(format!("must contain one of: {}", any.join(", ")));
    }
    None
}

/// A question's validation bundled with what it needs to run, handed to the
/// prompt gateway so it can re-prompt on invalid input.
#[derive(Clone, Copy)]
pub struct Validator<'a> {
    pub(crate) validation: &'a Validation,
    pub(crate) answers: &'a AnswerStore,
    pub(crate) executor: Option<&'a dyn RemoteFuncExecutor>,
}

impl<'a> Validator<'a> {
    pub fn new(
        validation: &'a Validation,
        answers: &'a AnswerStore,
        executor: Option<&'a dyn RemoteFuncExecutor>,
    ) -> Self {
        Self {
            validation,
            answers,
            executor,
        }
    }

    pub fn rules(&self) -> &Validation {
        self.validation
    }

    pub async fn validate(&self, input: &Value) -> Result<Option<String>, QmError> {
        validate(self.validation, input, self.answers, self.executor).await
    }
}

impl std::fmt::Debug for Validator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("validation", self.validation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn check(validation: &Validation, value: Value) -> Option<String> {
        validate(validation, &value, &AnswerStore::new(), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn string_rules() {
        assert_eq!(check(&Validation::equals("bot"), json!("bot")).await, None);
        assert!(check(&Validation::equals("bot"), json!("tab")).await.is_some());
        assert_eq!(
            check(&Validation::one_of(["a", "b"]), json!({ "id": "b" })).await,
            None
        );

        let required = Validation::String(StringValidation {
            required: true,
            ..Default::default()
        });
        assert!(check(&required, json!("")).await.is_some());
        assert!(check(&required, Value::Null).await.is_some());

        let pattern = Validation::String(StringValidation {
            pattern: Some("^[a-z]+$".into()),
            max_length: Some(5),
            ..Default::default()
        });
        assert_eq!(check(&pattern, json!("demo")).await, None);
        assert!(check(&pattern, json!("Demo")).await.is_some());
        assert!(check(&pattern, json!("toolong")).await.is_some());
    }

    #[tokio::test]
    async fn invalid_pattern_is_an_error() {
        let rules = Validation::String(StringValidation {
            pattern: Some("(".into()),
            ..Default::default()
        });
        let err = validate(&rules, &json!("x"), &AnswerStore::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QmError::InvalidPattern { .. }));
    }

    #[tokio::test]
    async fn array_rules() {
        assert_eq!(check(&Validation::contains("sql"), json!(["sql", "fn"])).await, None);
        assert!(check(&Validation::contains("sql"), json!(["fn"])).await.is_some());
        assert!(check(&Validation::contains("sql"), json!("sql")).await.is_some());

        let unique = Validation::StringArray(StringArrayValidation {
            unique_items: true,
            min_items: Some(1),
            ..Default::default()
        });
        assert!(check(&unique, json!(["a", "a"])).await.is_some());
        assert!(check(&unique, json!([])).await.is_some());
        assert_eq!(check(&unique, json!(["a", "b"])).await, None);
    }

    #[tokio::test]
    async fn func_rule_without_executor_fails() {
        let rules = Validation::Func(FuncDescriptor::new("checkName"));
        let err = validate(&rules, &json!("x"), &AnswerStore::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QmError::NoRemoteExecutor { .. }));
    }
}
