// repotools-core/src/choices.rs

//! Fixed enumerations accepted by tool parameters.
//!
//! Callers pass these as strings. Handlers map them through [`parse_choice`],
//! which refuses anything outside the accepted set before a command is built.

use crate::errors::ToolError;

/// A closed set of string-named values.
pub trait Choice: Copy + PartialEq + 'static {
    const ALL: &'static [Self];
    /// Parameter-facing name, e.g. `"production"`.
    fn as_str(&self) -> &'static str;
}

/// Maps `value` onto one of `accepted`, or fails with a mapping error listing them.
pub fn parse_choice<T: Choice>(
    tool: &str,
    parameter: &str,
    value: &str,
    accepted: &[T],
) -> Result<T, ToolError> {
    accepted
        .iter()
        .copied()
        .find(|choice| choice.as_str() == value)
        .ok_or_else(|| ToolError::Mapping {
            tool: tool.to_string(),
            parameter: parameter.to_string(),
            value: value.to_string(),
            valid: accepted.iter().map(|c| c.as_str().to_string()).collect(),
        })
}

/// Maps `value` through a lookup table keyed by choice, e.g. environment → script.
///
/// Only the table's keys are accepted; anything else is a mapping error.
pub fn lookup<T: Choice, V: Copy>(
    tool: &str,
    parameter: &str,
    value: &str,
    table: &[(T, V)],
) -> Result<(T, V), ToolError> {
    table
        .iter()
        .copied()
        .find(|(choice, _)| choice.as_str() == value)
        .ok_or_else(|| ToolError::Mapping {
            tool: tool.to_string(),
            parameter: parameter.to_string(),
            value: value.to_string(),
            valid: table.iter().map(|(c, _)| c.as_str().to_string()).collect(),
        })
}

/// Names of every member of `T`, for parameter schemas.
pub fn names<T: Choice>() -> Vec<&'static str> {
    T::ALL.iter().map(T::as_str).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Choice for Environment {
    const ALL: &'static [Self] = &[
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestType {
    Unit,
    EndToEnd,
    EndToEndUi,
    EndToEndHeaded,
}

impl Choice for TestType {
    const ALL: &'static [Self] = &[
        TestType::Unit,
        TestType::EndToEnd,
        TestType::EndToEndUi,
        TestType::EndToEndHeaded,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            TestType::Unit => "unit",
            TestType::EndToEnd => "e2e",
            TestType::EndToEndUi => "e2e:ui",
            TestType::EndToEndHeaded => "e2e:headed",
        }
    }
}

/// Buildable targets of the monorepo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum App {
    Game,
    Docs,
    All,
}

impl Choice for App {
    const ALL: &'static [Self] = &[App::Game, App::Docs, App::All];

    fn as_str(&self) -> &'static str {
        match self {
            App::Game => "game",
            App::Docs => "docs",
            App::All => "all",
        }
    }
}
