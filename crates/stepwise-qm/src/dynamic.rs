use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::answers::AnswerStore;
use crate::error::QmError;
use crate::question::FuncDescriptor;
use crate::ui::RemoteFuncExecutor;

const PARENT: &str = "$parent";
const PARENT_FIELD_PREFIX: &str = "$parent.";

/// A value that is either known up front or computed while traversing.
///
/// In JSON, `"$parent"` and `"$parent.<field>"` refer to the parent question's
/// answer, an object with a `method` key is a deferred call and anything else
/// is taken literally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDynamicValue", into = "RawDynamicValue")]
pub enum DynamicValue {
    Literal(Value),
    ParentReference,
    ParentFieldReference(String),
    DeferredCall(FuncDescriptor),
}

impl DynamicValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        DynamicValue::Literal(value.into())
    }

    pub fn parent_field(field: impl Into<String>) -> Self {
        DynamicValue::ParentFieldReference(field.into())
    }

    pub fn call(func: FuncDescriptor) -> Self {
        DynamicValue::DeferredCall(func)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawDynamicValue {
    Call(FuncDescriptor),
    Literal(Value),
}

impl From<RawDynamicValue> for DynamicValue {
    fn from(raw: RawDynamicValue) -> Self {
        match raw {
            RawDynamicValue::Call(func) => DynamicValue::DeferredCall(func),
            RawDynamicValue::Literal(Value::String(text)) if text == PARENT => {
                DynamicValue::ParentReference
            }
            RawDynamicValue::Literal(Value::String(text))
                if text.starts_with(PARENT_FIELD_PREFIX) =>
            {
                DynamicValue::ParentFieldReference(text[PARENT_FIELD_PREFIX.len()..].to_string())
            }
            RawDynamicValue::Literal(value) => DynamicValue::Literal(value),
        }
    }
}

impl From<DynamicValue> for RawDynamicValue {
    fn from(value: DynamicValue) -> Self {
        match value {
            DynamicValue::Literal(value) => RawDynamicValue::Literal(value),
            DynamicValue::ParentReference => RawDynamicValue::Literal(Value::String(PARENT.into())),
            DynamicValue::ParentFieldReference(field) => {
                RawDynamicValue::Literal(Value::String(format!("{PARENT_FIELD_PREFIX}{field}")))
            }
            DynamicValue::DeferredCall(func) => RawDynamicValue::Call(func),
        }
    }
}

/// How failures of deferred calls are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Failures are logged and resolve to nothing.
    Lenient,
    /// Failures are returned to the caller.
    Strict,
}

/// Resolves a dynamic value against the parent's answer and the answers so far.
pub async fn resolve(
    value: &DynamicValue,
    parent: Option<&Value>,
    answers: &AnswerStore,
    executor: Option<&dyn RemoteFuncExecutor>,
    resolution: Resolution,
    question: &str,
) -> Result<Option<Value>, QmError> {
    match value {
        DynamicValue::Literal(value) => Ok(Some(value.clone())),
        DynamicValue::ParentReference => Ok(parent.cloned()),
        DynamicValue::ParentFieldReference(field) => Ok(parent
            .and_then(Value::as_object)
            .and_then(|object| object.get(field))
            .cloned()),
        DynamicValue::DeferredCall(func) => {
            let Some(executor) = executor else {
                return match resolution {
                    Resolution::Strict => Err(QmError::NoRemoteExecutor {
                        name: question.to_string(),
                    }),
                    Resolution::Lenient => {
                        tracing::warn!(question, method = %func.method, "no remote executor for deferred value");
                        Ok(None)
                    }
                };
            };
            match executor.execute(func, answers).await {
                Ok(value) => Ok(Some(value)),
                Err(err) if resolution == Resolution::Strict => Err(QmError::Delegate(err)),
                Err(err) => {
                    tracing::warn!(question, method = %func.method, error = %err, "deferred value failed");
                    Ok(None)
                }
            }
        }
    }
}

/// Resolves an optional dynamic value leniently, rendering it as text.
pub(crate) async fn resolve_text(
    value: Option<&DynamicValue>,
    parent: Option<&Value>,
    answers: &AnswerStore,
    executor: Option<&dyn RemoteFuncExecutor>,
    question: &str,
) -> Result<Option<String>, QmError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let resolved = resolve(value, parent, answers, executor, Resolution::Lenient, question).await?;
    Ok(resolved.and_then(|value| match value {
        Value::String(text) => Some(text),
        Value::Null => None,
        other => Some(other.to_string()),
    }))
}
