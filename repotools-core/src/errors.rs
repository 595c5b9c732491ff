// repotools-core/src/errors.rs
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Errors surfaced by the tool registry and its handlers.
///
/// Timeouts and launch failures are not represented here; they are reported as
/// [`crate::invoker::Outcome`] values inside an [`crate::invoker::InvocationResult`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// No tool is registered under this name.
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    /// A tool with this name is already registered.
    #[error("A tool named '{0}' is already registered")]
    DuplicateName(String),

    /// A supplied parameter is not declared by the tool or has the wrong type.
    #[error("Invalid parameter '{parameter}' for tool '{tool}': {reason}")]
    InvalidParameter {
        tool: String,
        parameter: String,
        reason: String,
    },

    /// An enumerated value (environment, test type, ...) has no known mapping.
    #[error("Invalid {parameter} for tool '{tool}': '{value}'. Valid choices: {}", .valid.join(", "))]
    Mapping {
        tool: String,
        parameter: String,
        value: String,
        valid: Vec<String>,
    },

    /// The child exited successfully but its machine-readable output did not parse.
    #[error("Malformed output from tool '{tool}': {detail}")]
    MalformedOutput { tool: String, detail: String },
}

/// Stable labels for [`ToolError`] variants, used in error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    UnknownTool,
    DuplicateName,
    InvalidParameter,
    Mapping,
    MalformedOutput,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::UnknownTool => "unknown_tool",
            ToolErrorKind::DuplicateName => "duplicate_name",
            ToolErrorKind::InvalidParameter => "invalid_parameter",
            ToolErrorKind::Mapping => "mapping_error",
            ToolErrorKind::MalformedOutput => "malformed_output",
        }
    }
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::UnknownTool(_) => ToolErrorKind::UnknownTool,
            ToolError::DuplicateName(_) => ToolErrorKind::DuplicateName,
            ToolError::InvalidParameter { .. } => ToolErrorKind::InvalidParameter,
            ToolError::Mapping { .. } => ToolErrorKind::Mapping,
            ToolError::MalformedOutput { .. } => ToolErrorKind::MalformedOutput,
        }
    }

    pub fn invalid_parameter(
        tool: impl Into<String>,
        parameter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ToolError::InvalidParameter {
            tool: tool.into(),
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed_output(tool: impl Into<String>, detail: impl ToString) -> Self {
        ToolError::MalformedOutput {
            tool: tool.into(),
            detail: detail.to_string(),
        }
    }

    /// Renders the error as a labeled response record:
    /// `{"error": {"kind": "...", "detail": "..."}}`.
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert(
            "error".to_string(),
            json!({ "kind": self.kind().as_str(), "detail": self.to_string() }),
        );
        record
    }
}
