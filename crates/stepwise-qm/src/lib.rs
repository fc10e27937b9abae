//! Question tree traversal for multi-step wizards.
//!
//! A wizard is described as a tree of [`QTreeNode`]s. [`traverse`] walks it
//! depth first, asks a [`PromptGateway`] for each question, resolves dynamic
//! defaults and options through a [`RemoteFuncExecutor`], only descends into
//! children whose condition holds for the parent's answer, and supports going
//! back to earlier questions.

pub mod answers;
pub mod dynamic;
pub mod error;
pub mod gateway;
pub mod question;
pub mod traverse;
pub mod ui;
pub mod validation;

pub use answers::AnswerStore;
pub use dynamic::{DynamicValue, Resolution, resolve};
pub use error::QmError;
pub use gateway::{PresetGateway, PromptRecord, ScriptedGateway};
pub use question::{
    FolderSpec, FuncDescriptor, GroupData, InputSpec, LocalFunc, LocalFuncRef, NodeData,
    OptionItem, OptionSource, QTreeNode, Question, QuestionKind, SelectSpec, StaticOptions,
};
pub use traverse::{Traversal, traverse};
pub use ui::{InputResult, PromptConfig, PromptGateway, RemoteFuncExecutor};
pub use validation::{
    ConditionEvaluator, SchemaEvaluator, StringArrayValidation, StringValidation, Validation,
    Validator, validate,
};
