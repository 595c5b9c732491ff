// repotools-core/src/tools/checks.rs

//! Quality checks, test runners, builds and the vetted repository task runner.

use super::ReportTool;
use crate::choices::{lookup, names, parse_choice, App, Choice, Environment, TestType};
use crate::errors::ToolError;
use crate::invoker::{CommandLine, InvocationRequest};
use crate::registry::{
    ParamSpec, ResponseShape, ToolCall, ToolContext, ToolDescriptor, ToolHandler, ToolResponse,
};
use crate::shaping::combined_output;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

const QUALITY_TIMEOUT: Duration = Duration::from_secs(180);
const TESTS_TIMEOUT: Duration = Duration::from_secs(300);
const DEPLOYED_SITE_TIMEOUT: Duration = Duration::from_secs(600);
const BUILD_TIMEOUT: Duration = Duration::from_secs(300);
const REPO_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Output of `run_repo_command` is capped at this many characters.
pub const MAX_REPO_COMMAND_OUTPUT: usize = 12_000;

/// E2E scripts that target a deployed site.
const DEPLOYED_SITE_SCRIPTS: &[(Environment, &str)] = &[
    (Environment::Development, "test:e2e:dev"),
    (Environment::Staging, "test:e2e:staging"),
    (Environment::Production, "test:e2e:production"),
];

fn pnpm_run(script: &str, timeout: Duration) -> InvocationRequest {
    InvocationRequest::new(CommandLine::argv(["pnpm", "run", script]), timeout)
}

fn quality_command(_ctx: &ToolContext, call: &ToolCall) -> Result<InvocationRequest, ToolError> {
    let script = if call.bool_param("fix")? {
        "agent:fix"
    } else {
        "workspace:check"
    };
    Ok(pnpm_run(script, call.timeout))
}

fn quality_label(_call: &ToolCall) -> Result<String, ToolError> {
    Ok("Quality Checks".to_string())
}

/// Package script for a test type. Coverage only applies to unit tests.
pub fn test_script(test_type: TestType, coverage: bool) -> &'static str {
    match test_type {
        TestType::Unit if coverage => "test:unit:coverage",
        TestType::Unit => "test:unit",
        TestType::EndToEnd => "test:e2e",
        TestType::EndToEndUi => "test:e2e:ui",
        TestType::EndToEndHeaded => "test:e2e:headed",
    }
}

fn tests_command(_ctx: &ToolContext, call: &ToolCall) -> Result<InvocationRequest, ToolError> {
    let test_type = parse_choice(
        &call.tool,
        "test_type",
        call.str_param("test_type")?,
        TestType::ALL,
    )?;
    let coverage = call.bool_param("coverage")?;
    Ok(pnpm_run(test_script(test_type, coverage), call.timeout))
}

fn tests_label(call: &ToolCall) -> Result<String, ToolError> {
    Ok(format!("Test Results ({})", call.str_param("test_type")?))
}

fn deployed_site_command(
    _ctx: &ToolContext,
    call: &ToolCall,
) -> Result<InvocationRequest, ToolError> {
    let (_, script) = lookup(
        &call.tool,
        "environment",
        call.str_param("environment")?,
        DEPLOYED_SITE_SCRIPTS,
    )?;
    Ok(pnpm_run(script, call.timeout))
}

fn deployed_site_label(call: &ToolCall) -> Result<String, ToolError> {
    Ok(format!("E2E Tests ({})", call.str_param("environment")?))
}

fn build_command(ctx: &ToolContext, call: &ToolCall) -> Result<InvocationRequest, ToolError> {
    let app = parse_choice(&call.tool, "app", call.str_param("app")?, App::ALL)?;
    let command = match app {
        App::All => CommandLine::argv(["pnpm", "run", "build"]),
        app => CommandLine::Argv(vec![
            "pnpm".to_string(),
            "--filter".to_string(),
            format!("{}/{}", ctx.config.package_scope, app.as_str()),
            "run".to_string(),
            "build".to_string(),
        ]),
    };
    Ok(InvocationRequest::new(command, call.timeout))
}

fn build_label(call: &ToolCall) -> Result<String, ToolError> {
    Ok(format!("Build Output ({})", call.str_param("app")?))
}

/// Repository tasks `run_repo_command` is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoTask {
    GitStatus,
    WorkspaceCheck,
    Typecheck,
    Lint,
    UnitTests,
}

impl Choice for RepoTask {
    const ALL: &'static [Self] = &[
        RepoTask::GitStatus,
        RepoTask::WorkspaceCheck,
        RepoTask::Typecheck,
        RepoTask::Lint,
        RepoTask::UnitTests,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            RepoTask::GitStatus => "git:status",
            RepoTask::WorkspaceCheck => "workspace:check",
            RepoTask::Typecheck => "typecheck",
            RepoTask::Lint => "lint",
            RepoTask::UnitTests => "test:unit",
        }
    }
}

impl RepoTask {
    pub fn command(&self) -> CommandLine {
        match self {
            RepoTask::GitStatus => CommandLine::argv(["git", "status", "-sb"]),
            RepoTask::WorkspaceCheck => CommandLine::argv(["pnpm", "run", "workspace:check"]),
            RepoTask::Typecheck => CommandLine::argv(["pnpm", "run", "typecheck"]),
            RepoTask::Lint => CommandLine::argv(["pnpm", "run", "lint"]),
            RepoTask::UnitTests => CommandLine::argv(["pnpm", "run", "test:unit"]),
        }
    }
}

/// Runs one vetted task and returns its joined, truncated output.
struct RepoCommand;

#[async_trait]
impl ToolHandler for RepoCommand {
    async fn call(&self, ctx: &ToolContext, call: &ToolCall) -> Result<ToolResponse, ToolError> {
        let task = parse_choice(&call.tool, "task", call.str_param("task")?, RepoTask::ALL)?;
        let request = InvocationRequest::new(task.command(), call.timeout);
        let result = ctx.invoker.invoke(&request).await;

        let mut record = Map::new();
        record.insert("task".to_string(), Value::String(task.as_str().to_string()));
        record.insert(
            "output".to_string(),
            Value::String(combined_output(&result, MAX_REPO_COMMAND_OUTPUT)),
        );
        record.insert("exit_code".to_string(), Value::from(result.status));
        Ok(ToolResponse::Record(record))
    }
}

pub(crate) fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "run_quality_checks",
            "Run all code quality checks (typecheck, lint, format).",
            ResponseShape::Text,
            QUALITY_TIMEOUT,
            ReportTool {
                label: quality_label,
                command: quality_command,
            },
        )
        .param(ParamSpec::boolean(
            "fix",
            false,
            "Automatically fix issues where possible",
        )),
        ToolDescriptor::new(
            "run_tests",
            "Run unit or end-to-end tests.",
            ResponseShape::Text,
            TESTS_TIMEOUT,
            ReportTool {
                label: tests_label,
                command: tests_command,
            },
        )
        .param(
            ParamSpec::string("test_type", "unit", "Type of tests to run")
                .with_choices(&names::<TestType>()),
        )
        .param(ParamSpec::boolean(
            "coverage",
            false,
            "Generate a coverage report for unit tests",
        )),
        ToolDescriptor::new(
            "test_deployed_site",
            "Run E2E tests against a deployed site.",
            ResponseShape::Text,
            DEPLOYED_SITE_TIMEOUT,
            ReportTool {
                label: deployed_site_label,
                command: deployed_site_command,
            },
        )
        .param(
            ParamSpec::string("environment", "production", "Environment to test")
                .with_choices(&names::<Environment>()),
        ),
        ToolDescriptor::new(
            "run_build",
            "Build an app of the monorepo, or all of them.",
            ResponseShape::Text,
            BUILD_TIMEOUT,
            ReportTool {
                label: build_label,
                command: build_command,
            },
        )
        .param(ParamSpec::string("app", "game", "The app to build").with_choices(&names::<App>())),
        ToolDescriptor::new(
            "run_repo_command",
            "Run a vetted repository command for checks and status.",
            ResponseShape::Record,
            REPO_COMMAND_TIMEOUT,
            RepoCommand,
        )
        .param(
            ParamSpec::string("task", "git:status", "The repository task to run")
                .with_choices(&names::<RepoTask>()),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::ToolsConfig;
    use crate::errors::ToolErrorKind;
    use crate::invoker::Invoker;
    use serde_json::json;
    use tempfile::tempdir;

    fn call(tool: &str, value: Value) -> ToolCall {
        let descriptor = descriptors().into_iter().find(|d| d.name == tool).unwrap();
        descriptor.resolve(params(value)).unwrap()
    }

    #[test]
    fn test_unit_coverage_variant_is_selected() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let request = tests_command(
            &ctx,
            &call("run_tests", json!({ "test_type": "unit", "coverage": true })),
        )
        .unwrap();
        assert_eq!(
            request.command,
            CommandLine::argv(["pnpm", "run", "test:unit:coverage"])
        );
        assert_eq!(request.timeout, TESTS_TIMEOUT);
    }

    #[test]
    fn test_script_table() {
        assert_eq!(test_script(TestType::Unit, false), "test:unit");
        assert_eq!(test_script(TestType::EndToEnd, true), "test:e2e");
        assert_eq!(test_script(TestType::EndToEndUi, false), "test:e2e:ui");
        assert_eq!(test_script(TestType::EndToEndHeaded, false), "test:e2e:headed");
    }

    #[tokio::test]
    async fn test_run_tests_report_has_both_sections() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        let response = registry
            .dispatch("run_tests", params(json!({ "test_type": "unit", "coverage": true })))
            .await
            .unwrap();
        let text = response.as_text().unwrap();
        assert!(text.starts_with("Test Results (unit):"), "{}", text);
        assert!(text.contains("--- OUTPUT ---"));
        assert!(text.contains("--- ERRORS ---"));
    }

    #[tokio::test]
    async fn test_unknown_test_type_is_mapping_error() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        let err = registry
            .dispatch("run_tests", params(json!({ "test_type": "integration" })))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::Mapping);
        assert!(err.to_string().contains("unit, e2e, e2e:ui, e2e:headed"));
    }

    #[test]
    fn test_build_command_uses_package_scope() {
        let dir = tempdir().unwrap();
        let config = ToolsConfig {
            package_scope: "@puzzles".to_string(),
            ..ToolsConfig::default()
        };
        let ctx = ToolContext::new(Invoker::new(dir.path()), config);

        let request = build_command(&ctx, &call("run_build", json!({ "app": "docs" }))).unwrap();
        assert_eq!(
            request.command,
            CommandLine::argv(["pnpm", "--filter", "@puzzles/docs", "run", "build"])
        );

        let request = build_command(&ctx, &call("run_build", json!({ "app": "all" }))).unwrap();
        assert_eq!(request.command, CommandLine::argv(["pnpm", "run", "build"]));

        let err = build_command(&ctx, &call("run_build", json!({ "app": "admin" }))).unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::Mapping);
    }

    #[test]
    fn test_quality_command_fix_flag() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let check = quality_command(&ctx, &call("run_quality_checks", json!({}))).unwrap();
        assert_eq!(check.command, CommandLine::argv(["pnpm", "run", "workspace:check"]));
        let fix =
            quality_command(&ctx, &call("run_quality_checks", json!({ "fix": true }))).unwrap();
        assert_eq!(fix.command, CommandLine::argv(["pnpm", "run", "agent:fix"]));
    }

    #[test]
    fn test_deployed_site_scripts() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let development = call("test_deployed_site", json!({ "environment": "development" }));
        let request = deployed_site_command(&ctx, &development).unwrap();
        assert_eq!(request.command, CommandLine::argv(["pnpm", "run", "test:e2e:dev"]));
        let dev = call("test_deployed_site", json!({ "environment": "dev" }));
        let err = deployed_site_command(&ctx, &dev).unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::Mapping);
    }

    #[tokio::test]
    async fn test_repo_command_git_status() {
        let dir = tempdir().unwrap();
        duct::cmd!("git", "init", "-q").dir(dir.path()).run().expect("git init failed");
        std::fs::write(dir.path().join("notes.txt"), "draft").unwrap();

        let registry = registry(dir.path());
        let response = registry.dispatch("run_repo_command", Map::new()).await.unwrap();
        let record = response.as_record().unwrap();
        assert_eq!(record["task"], "git:status");
        assert_eq!(record["exit_code"], 0);
        assert!(record["output"].as_str().unwrap().contains("notes.txt"));
    }

    #[tokio::test]
    async fn test_repo_command_rejects_unvetted_task() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        let err = registry
            .dispatch("run_repo_command", params(json!({ "task": "rm -rf /" })))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::Mapping);
    }
}
