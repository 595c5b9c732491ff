// repotools-core/src/tools/mod.rs

//! The built-in tool table.
//!
//! Most tools are data: a parameter schema plus a command builder, run by one
//! of the two generic handlers here. [`ReportTool`] returns the labeled text
//! report, [`JsonTool`] parses the command's JSON output into a record.
//! Composite tools that check several things implement [`ToolHandler`]
//! themselves.

pub mod checks;
pub mod deploy;
pub mod project;

use crate::errors::ToolError;
use crate::invoker::InvocationRequest;
use crate::registry::{ToolCall, ToolContext, ToolDescriptor, ToolHandler, ToolResponse};
use crate::shaping::{failure_record, format_report, parse_json_output};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Builds the invocation for a call, or refuses with a mapping/parameter error.
pub type CommandBuilder = fn(&ToolContext, &ToolCall) -> Result<InvocationRequest, ToolError>;
/// Builds the report label shown above the output.
pub type LabelBuilder = fn(&ToolCall) -> Result<String, ToolError>;
/// Reshapes parsed JSON output into the tool's record; `Err` is a description of the mismatch.
pub type RecordShaper = fn(&ToolContext, Value) -> Result<Map<String, Value>, String>;

/// Runs one command and returns the labeled text report.
pub struct ReportTool {
    pub label: LabelBuilder,
    pub command: CommandBuilder,
}

#[async_trait]
impl ToolHandler for ReportTool {
    async fn call(&self, ctx: &ToolContext, call: &ToolCall) -> Result<ToolResponse, ToolError> {
        let request = (self.command)(ctx, call)?;
        let label = (self.label)(call)?;
        let result = ctx.invoker.invoke(&request).await;
        Ok(ToolResponse::Text(format_report(&label, &result)))
    }
}

/// Runs one command whose stdout is JSON and shapes it into a record.
pub struct JsonTool {
    pub command: CommandBuilder,
    pub shape: RecordShaper,
}

#[async_trait]
impl ToolHandler for JsonTool {
    async fn call(&self, ctx: &ToolContext, call: &ToolCall) -> Result<ToolResponse, ToolError> {
        let request = (self.command)(ctx, call)?;
        let result = ctx.invoker.invoke(&request).await;
        if !result.success() {
            debug!(
                tool = %call.tool,
                status = result.status,
                "Command failed; returning error record"
            );
            return Ok(ToolResponse::Record(failure_record(&result)));
        }
        let payload = parse_json_output(&call.tool, &result)?;
        let record = (self.shape)(ctx, payload)
            .map_err(|detail| ToolError::malformed_output(&call.tool, detail))?;
        Ok(ToolResponse::Record(record))
    }
}

/// Absolute path of a project script, so it runs without a shell or `PATH` lookup.
pub(crate) fn script_path(root: &Path, script: &str) -> String {
    root.join("scripts").join(script).to_string_lossy().into_owned()
}

/// Every built-in tool, in no particular order.
pub fn builtin_tools() -> Vec<ToolDescriptor> {
    let mut tools = deploy::descriptors();
    tools.extend(checks::descriptors());
    tools.extend(project::descriptors());
    tools
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::ToolsConfig;
    use crate::invoker::Invoker;
    use crate::registry::{Registry, ToolContext};
    use serde_json::{Map, Value};
    use std::path::Path;

    pub fn context(root: &Path) -> ToolContext {
        ToolContext::new(Invoker::new(root), ToolsConfig::default())
    }

    pub fn registry(root: &Path) -> Registry {
        Registry::with_builtin_tools(context(root)).expect("built-in tools should register")
    }

    pub fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Writes an executable script under `scripts/`.
    #[cfg(unix)]
    pub fn write_script(root: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let dir = root.join("scripts");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }
}
