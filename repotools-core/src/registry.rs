// repotools-core/src/registry.rs

//! Tool descriptors, parameter schemas and name-based dispatch.
//!
//! A [`Registry`] is filled once at startup and only read afterwards, so it can
//! be shared behind an `Arc` by any number of concurrent callers.

use crate::config::ToolsConfig;
use crate::errors::ToolError;
use crate::invoker::Invoker;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// JSON type accepted by a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Boolean,
}

impl ParamKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Boolean => "boolean",
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A declared tool parameter. Every parameter carries a default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub default: Value,
    pub description: &'static str,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<&'static str>>,
}

impl ParamSpec {
    pub fn string(name: &'static str, default: &str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::String,
            default: Value::String(default.to_string()),
            description,
            choices: None,
        }
    }

    pub fn boolean(name: &'static str, default: bool, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Boolean,
            default: Value::Bool(default),
            description,
            choices: None,
        }
    }

    /// Documents the accepted values. Mapping is still enforced by the handler.
    pub fn with_choices(mut self, choices: &[&'static str]) -> Self {
        self.choices = Some(choices.to_vec());
        self
    }
}

/// Response shape a tool declares up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseShape {
    Text,
    Record,
}

/// What a tool hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResponse {
    Text(String),
    Record(Map<String, Value>),
}

impl ToolResponse {
    pub fn shape(&self) -> ResponseShape {
        match self {
            ToolResponse::Text(_) => ResponseShape::Text,
            ToolResponse::Record(_) => ResponseShape::Record,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolResponse::Text(text) => Some(text),
            ToolResponse::Record(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&Map<String, Value>> {
        match self {
            ToolResponse::Record(record) => Some(record),
            ToolResponse::Text(_) => None,
        }
    }
}

/// Everything handlers share: the invoker (which owns the project root) and configuration.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub invoker: Invoker,
    pub config: ToolsConfig,
}

impl ToolContext {
    pub fn new(invoker: Invoker, config: ToolsConfig) -> Self {
        Self { invoker, config }
    }
}

/// One resolved call: declared defaults merged with the caller's values.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    pub params: Map<String, Value>,
    /// Bound for each invocation the handler issues.
    pub timeout: Duration,
}

impl ToolCall {
    pub fn str_param(&self, name: &str) -> Result<&str, ToolError> {
        self.params
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_parameter(&self.tool, name, "expected a string"))
    }

    pub fn bool_param(&self, name: &str) -> Result<bool, ToolError> {
        self.params
            .get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| ToolError::invalid_parameter(&self.tool, name, "expected a boolean"))
    }
}

/// Maps a resolved call to a response. Handlers never touch the registry.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: &ToolContext, call: &ToolCall) -> Result<ToolResponse, ToolError>;
}

/// A named tool with its parameter schema and handler.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub shape: ResponseShape,
    pub timeout: Duration,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("shape", &self.shape)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        shape: ResponseShape,
        timeout: Duration,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            shape,
            timeout,
            handler: Arc::new(handler),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Merges `supplied` over the declared defaults.
    ///
    /// Undeclared keys and values of the wrong JSON type are rejected; `null`
    /// falls back to the default.
    pub fn resolve(&self, supplied: Map<String, Value>) -> Result<ToolCall, ToolError> {
        let mut params = Map::new();
        for (key, value) in supplied {
            let Some(spec) = self.params.iter().find(|p| p.name == key) else {
                let accepted: Vec<&str> = self.params.iter().map(|p| p.name).collect();
                let reason = if accepted.is_empty() {
                    "this tool takes no parameters".to_string()
                } else {
                    format!("not declared; accepted parameters: {}", accepted.join(", "))
                };
                return Err(ToolError::invalid_parameter(&self.name, key, reason));
            };
            if value.is_null() {
                continue;
            }
            if !spec.kind.accepts(&value) {
                return Err(ToolError::invalid_parameter(
                    &self.name,
                    key,
                    format!("expected {}, got {}", spec.kind.name(), json_type_name(&value)),
                ));
            }
            params.insert(key, value);
        }
        for spec in &self.params {
            params
                .entry(spec.name.to_string())
                .or_insert_with(|| spec.default.clone());
        }
        Ok(ToolCall {
            tool: self.name.clone(),
            params,
            timeout: self.timeout,
        })
    }
}

/// Name → descriptor table.
#[derive(Debug)]
pub struct Registry {
    ctx: ToolContext,
    tools: BTreeMap<String, ToolDescriptor>,
}

impl Registry {
    /// An empty registry.
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            ctx,
            tools: BTreeMap::new(),
        }
    }

    /// A registry holding every built-in tool, with configured timeout overrides applied.
    pub fn with_builtin_tools(ctx: ToolContext) -> Result<Self, ToolError> {
        let overrides: Vec<(String, Duration)> = ctx
            .config
            .timeout_overrides()
            .map(|(name, timeout)| (name.to_string(), timeout))
            .collect();
        let mut registry = Self::new(ctx);
        for descriptor in crate::tools::builtin_tools() {
            registry.register(descriptor)?;
        }
        for (name, timeout) in overrides {
            registry.set_timeout(&name, timeout)?;
        }
        info!(tools = registry.tools.len(), "Registered built-in tools");
        Ok(registry)
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), ToolError> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(ToolError::DuplicateName(descriptor.name));
        }
        debug!(tool = %descriptor.name, "Registering tool");
        self.tools.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn set_timeout(&mut self, name: &str, timeout: Duration) -> Result<(), ToolError> {
        if timeout.is_zero() {
            return Err(ToolError::invalid_parameter(
                name,
                "timeout",
                "must be greater than zero",
            ));
        }
        let descriptor = self
            .tools
            .get_mut(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        debug!(tool = name, ?timeout, "Overriding tool timeout");
        descriptor.timeout = timeout;
        Ok(())
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Registered names in lexical order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    /// Resolves `name`, merges parameters over defaults and runs the handler.
    pub async fn dispatch(
        &self,
        name: &str,
        supplied: Map<String, Value>,
    ) -> Result<ToolResponse, ToolError> {
        let descriptor = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let call = descriptor.resolve(supplied)?;
        let params = Value::Object(call.params.clone());
        info!(tool = name, params = %params, "Dispatching tool call");

        let response = descriptor.handler.call(&self.ctx, &call).await;
        match &response {
            Ok(resp) if resp.shape() != descriptor.shape => warn!(
                tool = name,
                declared = ?descriptor.shape,
                actual = ?resp.shape(),
                "Tool returned a response of an undeclared shape"
            ),
            Ok(_) => debug!(tool = name, "Tool call finished"),
            Err(e) => warn!(tool = name, error = %e, "Tool call failed"),
        }
        response
    }
}
