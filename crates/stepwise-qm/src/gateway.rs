//! Prompt gateways that do not need a terminal.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::QmError;
use crate::question::StaticOptions;
use crate::ui::{InputResult, PromptConfig, PromptGateway};

/// Answers every prompt from its default, for unattended runs.
///
/// Questions already present in the answer store never reach the gateway, so
/// together with a pre-seeded store this completes a traversal without input.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresetGateway {
    accept_defaults: bool,
}

impl PresetGateway {
    pub fn new(accept_defaults: bool) -> Self {
        Self { accept_defaults }
    }

    async fn answer(&self, config: PromptConfig<'_>, multi: bool) -> InputResult {
        let value = match config.default.clone() {
            Some(value) if self.accept_defaults && !value.is_null() => Some(value),
            _ => None,
        };
        let Some(value) = value else {
            return InputResult::Error(QmError::NeedsInteraction { name: config.name });
        };
        let value = if multi && !value.is_array() {
            Value::Array(vec![value])
        } else {
            value
        };
        if let Some(validator) = &config.validation {
            match validator.validate(&value).await {
                Ok(None) => {}
                Ok(Some(message)) => {
                    return InputResult::Error(QmError::Validation {
                        name: config.name,
                        message,
                    });
                }
                Err(err) => return InputResult::Error(err),
            }
        }
        if let Some(options) = &config.options
            && !default_is_offered(options, &value)
        {
            return InputResult::Error(QmError::Validation {
                name: config.name,
                message: format!("default {value} is not one of the offered options"),
            });
        }
        let value = match &config.options {
            Some(options) if config.return_object => as_objects(options, value),
            _ => value,
        };
        tracing::debug!(question = %config.name, "answered from default");
        InputResult::Success(value)
    }
}

/// Swaps bare option identifiers for the option objects they name.
fn as_objects(options: &StaticOptions, value: Value) -> Value {
    match value {
        Value::Array(values) => Value::Array(
            values
                .into_iter()
                .map(|value| as_objects(options, value))
                .collect(),
        ),
        Value::String(id) => options
            .value_of(&id, true)
            .unwrap_or(Value::String(id)),
        other => other,
    }
}

fn default_is_offered(options: &StaticOptions, value: &Value) -> bool {
    let offered = |id: &str| match options {
        StaticOptions::Ids(ids) => ids.iter().any(|candidate| candidate == id),
        StaticOptions::Items(items) => items.iter().any(|item| item.id == id),
    };
    let id_of = |value: &Value| -> Option<String> {
        match value {
            Value::String(text) => Some(text.clone()),
            Value::Object(object) => object.get("id").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    };
    match value {
        Value::Array(values) => values
            .iter()
            .all(|value| id_of(value).is_some_and(|id| offered(&id))),
        other => id_of(other).is_some_and(|id| offered(&id)),
    }
}

#[async_trait]
impl PromptGateway for PresetGateway {
    async fn input_text(&self, config: PromptConfig<'_>) -> InputResult {
        self.answer(config, false).await
    }

    async fn select_option(&self, config: PromptConfig<'_>) -> InputResult {
        self.answer(config, false).await
    }

    async fn select_options(&self, config: PromptConfig<'_>) -> InputResult {
        self.answer(config, true).await
    }

    async fn select_folder(&self, config: PromptConfig<'_>) -> InputResult {
        self.answer(config, false).await
    }
}

/// What a [`ScriptedGateway`] was asked.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRecord {
    pub method: &'static str,
    pub name: String,
    pub default: Option<Value>,
    pub step: usize,
    pub total_steps: usize,
    pub options: Option<StaticOptions>,
}

/// Replays a fixed list of outcomes and records each prompt it was shown.
///
/// Once the script runs out every further prompt is answered with `Cancel`.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<InputResult>>,
    seen: Mutex<Vec<PromptRecord>>,
}

impl ScriptedGateway {
    pub fn new(script: impl IntoIterator<Item = InputResult>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<PromptRecord> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    /// Names of the prompted questions in prompt order.
    pub fn prompted_names(&self) -> Vec<String> {
        self.prompts().into_iter().map(|record| record.name).collect()
    }

    fn next(&self, method: &'static str, config: PromptConfig<'_>) -> InputResult {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(PromptRecord {
                method,
                name: config.name,
                default: config.default,
                step: config.step,
                total_steps: config.total_steps,
                options: config.options,
            });
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or(InputResult::Cancel)
    }
}

#[async_trait]
impl PromptGateway for ScriptedGateway {
    async fn input_text(&self, config: PromptConfig<'_>) -> InputResult {
        self.next("input_text", config)
    }

    async fn select_option(&self, config: PromptConfig<'_>) -> InputResult {
        self.next("select_option", config)
    }

    async fn select_options(&self, config: PromptConfig<'_>) -> InputResult {
        self.next("select_options", config)
    }

    async fn select_folder(&self, config: PromptConfig<'_>) -> InputResult {
        self.next("select_folder", config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::OptionItem;
    use serde_json::json;

    #[tokio::test]
    async fn preset_requires_accepting_defaults() {
        let mut config = PromptConfig::new("name", "Name");
        config.default = Some(json!("demo"));

        let strict = PresetGateway::new(false);
        assert!(matches!(
            strict.input_text(config.clone()).await,
            InputResult::Error(QmError::NeedsInteraction { .. })
        ));

        let lenient = PresetGateway::new(true);
        assert!(matches!(
            lenient.input_text(config).await,
            InputResult::Success(value) if value == json!("demo")
        ));
    }

    #[tokio::test]
    async fn preset_rejects_defaults_outside_the_options() {
        let mut config = PromptConfig::new("region", "Region");
        config.default = Some(json!("mars"));
        config.options = Some(StaticOptions::Ids(vec!["westus".into(), "eastus".into()]));
        let result = PresetGateway::new(true).select_option(config).await;
        assert!(matches!(result, InputResult::Error(QmError::Validation { .. })));
    }

    #[tokio::test]
    async fn preset_wraps_multi_select_defaults() {
        let mut config = PromptConfig::new("features", "Features");
        config.default = Some(json!("sql"));
        config.options = Some(StaticOptions::Ids(vec!["sql".into(), "fn".into()]));
        let result = PresetGateway::new(true).select_options(config).await;
        assert!(matches!(result, InputResult::Success(value) if value == json!(["sql"])));
    }

    #[tokio::test]
    async fn preset_returns_option_objects_when_asked() {
        let options = StaticOptions::Items(vec![
            OptionItem::new("tab", "Tab"),
            OptionItem::new("bot", "Bot"),
        ]);
        let mut config = PromptConfig::new("capability", "Capability");
        config.default = Some(json!("bot"));
        config.options = Some(options);
        config.return_object = true;

        let single = PresetGateway::new(true).select_option(config.clone()).await;
        assert!(matches!(
            single,
            InputResult::Success(value) if value == json!({ "id": "bot", "label": "Bot" })
        ));

        config.default = Some(json!(["tab", { "id": "bot", "label": "Bot" }]));
        let multi = PresetGateway::new(true).select_options(config).await;
        assert!(matches!(
            multi,
            InputResult::Success(value) if value == json!([
                { "id": "tab", "label": "Tab" },
                { "id": "bot", "label": "Bot" }
            ])
        ));
    }

    #[tokio::test]
    async fn scripted_gateway_cancels_when_exhausted() {
        let gateway = ScriptedGateway::new([InputResult::Success(json!("a"))]);
        assert!(gateway.input_text(PromptConfig::new("a", "A")).await.is_success());
        assert!(gateway.input_text(PromptConfig::new("b", "B")).await.is_cancel());
        assert_eq!(gateway.prompted_names(), vec!["a", "b"]);
    }
}
