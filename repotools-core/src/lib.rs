// repotools-core/src/lib.rs

//! Project automation tools for the Riddle Rush monorepo.
//!
//! A [`Registry`] maps tool names to descriptors. Dispatching a tool merges
//! the caller's parameters over the declared defaults, builds one or more
//! bounded child-process invocations through the [`Invoker`], and shapes the
//! captured output into either a labeled text report or a JSON record.

pub mod choices;
pub mod config;
pub mod errors;
pub mod health;
pub mod invoker;
pub mod registry;
pub mod shaping;
pub mod tools;

pub use async_trait::async_trait;

pub use config::{load_config, ToolsConfig, CONFIG_FILENAME};
pub use errors::{ToolError, ToolErrorKind};
pub use invoker::{CommandLine, InvocationRequest, InvocationResult, Invoker, Outcome};
pub use registry::{
    ParamKind, ParamSpec, Registry, ResponseShape, ToolCall, ToolContext, ToolDescriptor,
    ToolHandler, ToolResponse,
};
