// repotools-core/src/tools/project.rs

//! Project status, CI/CD, documentation and workspace tools.

use super::JsonTool;
use crate::choices::{names, App, Choice};
use crate::errors::ToolError;
use crate::health::{HealthIndicator, HealthIssue, HealthReport, Severity};
use crate::invoker::{CommandLine, InvocationRequest};
use crate::registry::{
    ResponseShape, ToolCall, ToolContext, ToolDescriptor, ToolHandler, ToolResponse,
};
use async_trait::async_trait;
use ignore::WalkBuilder;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const STATUS_TIMEOUT: Duration = Duration::from_secs(10);
const WORKSPACE_LIST_TIMEOUT: Duration = Duration::from_secs(30);
/// Used by tools that never spawn a process.
const NO_PROCESS_TIMEOUT: Duration = Duration::from_secs(5);

const DOCS_DIR: &str = "docs";

fn git(args: &[&str], timeout: Duration) -> InvocationRequest {
    let mut argv = vec!["git".to_string()];
    argv.extend(args.iter().map(|a| a.to_string()));
    InvocationRequest::new(CommandLine::Argv(argv), timeout)
}

struct ProjectStatus;

#[async_trait]
impl ToolHandler for ProjectStatus {
    async fn call(&self, ctx: &ToolContext, call: &ToolCall) -> Result<ToolResponse, ToolError> {
        let root = ctx.invoker.root();
        let status = ctx.invoker.invoke(&git(&["status", "--short"], call.timeout)).await;
        let branch = ctx
            .invoker
            .invoke(&git(&["branch", "--show-current"], call.timeout))
            .await;

        let git_status = status.stdout.trim().to_string();
        let mut record = Map::new();
        record.insert("has_changes".to_string(), Value::Bool(!git_status.is_empty()));
        record.insert("git_status".to_string(), Value::String(git_status));
        record.insert(
            "current_branch".to_string(),
            Value::String(branch.stdout.trim().to_string()),
        );
        record.insert(
            "dependencies_installed".to_string(),
            Value::Bool(root.join("node_modules").exists()),
        );
        record.insert(
            "build_exists".to_string(),
            Value::Bool(root.join("dist").exists()),
        );
        Ok(ToolResponse::Record(record))
    }
}

/// Sorted names of `scripts/*.sh` that deploy or drive Terraform.
fn pipeline_scripts(root: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(root.join("scripts")) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut scripts: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map_or(false, |ft| ft.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".sh"))
        .filter(|name| name.starts_with("deploy-") || name.starts_with("terraform-"))
        .collect();
    scripts.sort();
    scripts
}

struct CicdCheck;

#[async_trait]
impl ToolHandler for CicdCheck {
    async fn call(&self, ctx: &ToolContext, _call: &ToolCall) -> Result<ToolResponse, ToolError> {
        let root = ctx.invoker.root();
        let mut record = Map::new();
        record.insert(
            "gitlab_ci_exists".to_string(),
            Value::Bool(root.join(".gitlab-ci.yml").is_file()),
        );
        record.insert(
            "hooks_configured".to_string(),
            Value::Bool(root.join(".husky").exists()),
        );
        record.insert("scripts_available".to_string(), json!(pipeline_scripts(root)));
        Ok(ToolResponse::Record(record))
    }
}

/// Every Markdown file under `docs/`, as sorted root-relative paths.
///
/// Hidden and git-ignored files are included. A missing `docs/` yields an empty list.
pub fn documentation_files(root: &Path) -> Vec<String> {
    let docs = root.join(DOCS_DIR);
    if !docs.is_dir() {
        return Vec::new();
    }

    let mut files = Vec::new();
    for result in WalkBuilder::new(&docs).standard_filters(false).build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Failed to read documentation entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().map_or(false, |ft| ft.is_file()) {
            continue;
        }
        if entry.path().extension().map_or(true, |ext| ext != "md") {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }
    files.sort();
    files
}

struct ListDocumentation;

#[async_trait]
impl ToolHandler for ListDocumentation {
    async fn call(&self, ctx: &ToolContext, _call: &ToolCall) -> Result<ToolResponse, ToolError> {
        let documents = documentation_files(ctx.invoker.root());
        debug!(count = documents.len(), "Listed documentation");
        let mut record = Map::new();
        record.insert("documents".to_string(), json!(documents));
        Ok(ToolResponse::Record(record))
    }
}

struct QuickReference;

#[async_trait]
impl ToolHandler for QuickReference {
    async fn call(&self, ctx: &ToolContext, _call: &ToolCall) -> Result<ToolResponse, ToolError> {
        let scope = &ctx.config.package_scope;
        let apps: Vec<&str> = names::<App>()
            .into_iter()
            .filter(|app| *app != App::All.as_str())
            .collect();
        let mut record = Map::new();
        record.insert("project".to_string(), json!(ctx.config.project_name));
        record.insert("package_scope".to_string(), json!(scope));
        record.insert(
            "key_commands".to_string(),
            json!({
                "dev": "pnpm run dev",
                "build": "pnpm run build",
                "build:game": format!("pnpm --filter {}/game run build", scope),
                "test": "pnpm run test:unit",
                "e2e": "pnpm run test:e2e",
                "quality": "pnpm run workspace:check",
                "deploy:prod": "./scripts/deploy-prod.sh",
                "deploy:dev": "./scripts/deploy-dev.sh"
            }),
        );
        record.insert(
            "important_docs".to_string(),
            json!([
                "AGENTS.md - Agent workflow guide",
                "docs/AWS-DEPLOYMENT.md - AWS deployment guide",
                "docs/TERRAFORM-SETUP.md - Terraform guide",
                "docs/TESTING.md - Testing documentation"
            ]),
        );
        record.insert("apps".to_string(), json!(apps));
        record.insert("packages".to_string(), json!(["config", "shared", "types"]));
        Ok(ToolResponse::Record(record))
    }
}

fn workspace_list_command(
    _ctx: &ToolContext,
    call: &ToolCall,
) -> Result<InvocationRequest, ToolError> {
    Ok(InvocationRequest::new(
        CommandLine::argv(["pnpm", "list", "-r", "--depth", "0", "--json"]),
        call.timeout,
    ))
}

/// Path of a package relative to the project root; the root itself is `"."`.
///
/// Only whole components are stripped. Paths outside the root stay absolute.
fn relative_package_path(root: &Path, path: &str) -> String {
    match Path::new(path).strip_prefix(root) {
        Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string(),
    }
}

/// Shapes `pnpm list --json` output into `{packages: [{name, version, path}]}`.
pub fn shape_packages(ctx: &ToolContext, payload: Value) -> Result<Map<String, Value>, String> {
    let entries = match payload {
        Value::Array(entries) => entries,
        other => return Err(format!("expected a JSON array of packages, got {}", other)),
    };

    let root = ctx.invoker.root();
    let mut packages = Vec::with_capacity(entries.len());
    for entry in entries {
        let entry = match entry {
            Value::Object(entry) => entry,
            other => return Err(format!("expected a package object, got {}", other)),
        };
        let path = match entry.get("path") {
            Some(Value::String(path)) => Value::String(relative_package_path(root, path)),
            _ => Value::Null,
        };
        packages.push(json!({
            "name": entry.get("name").cloned().unwrap_or(Value::Null),
            "version": entry.get("version").cloned().unwrap_or(Value::Null),
            "path": path,
        }));
    }

    let mut record = Map::new();
    record.insert("packages".to_string(), Value::Array(packages));
    Ok(record)
}

struct WorkspaceHealth;

#[async_trait]
impl ToolHandler for WorkspaceHealth {
    async fn call(&self, ctx: &ToolContext, call: &ToolCall) -> Result<ToolResponse, ToolError> {
        let root = ctx.invoker.root();
        let mut indicators = Vec::new();
        let mut issues = Vec::new();

        let status = ctx.invoker.invoke(&git(&["status", "--short"], call.timeout)).await;
        let changes = status.stdout.trim();
        if status.success() && !changes.is_empty() {
            issues.push(HealthIssue {
                category: "git".to_string(),
                severity: Severity::Medium,
                message: "Uncommitted changes detected".to_string(),
                details: changes.to_string(),
            });
        } else if status.success() {
            indicators.push(HealthIndicator::ok("git", "Working tree clean"));
        }

        if root.join("node_modules").exists() {
            indicators.push(HealthIndicator::ok("dependencies", "Dependencies installed"));
        } else {
            issues.push(HealthIssue {
                category: "dependencies".to_string(),
                severity: Severity::High,
                message: "node_modules not found - dependencies not installed".to_string(),
                details: "Run 'pnpm install' to install dependencies".to_string(),
            });
        }

        if root.join("dist").exists() || root.join("apps").join("game").join(".output").exists() {
            indicators.push(HealthIndicator::ok("build", "Build artifacts found"));
        } else {
            issues.push(HealthIssue {
                category: "build".to_string(),
                severity: Severity::Low,
                message: "No build artifacts found".to_string(),
                details: "Run 'pnpm run build' to create production build".to_string(),
            });
        }

        let report = HealthReport::new(indicators, issues);
        debug!(
            score = report.overall_score,
            issues = report.issues_found.len(),
            "Scored workspace health"
        );
        match serde_json::to_value(&report) {
            Ok(Value::Object(record)) => Ok(ToolResponse::Record(record)),
            Ok(other) => Err(ToolError::malformed_output(
                &call.tool,
                format!("health report serialized to {}", other),
            )),
            Err(e) => Err(ToolError::malformed_output(&call.tool, e.to_string())),
        }
    }
}

pub(crate) fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "get_project_status",
            "Get project status including git, dependencies, and build state.",
            ResponseShape::Record,
            STATUS_TIMEOUT,
            ProjectStatus,
        ),
        ToolDescriptor::new(
            "cicd_check",
            "Check CI/CD pipeline configuration and available deployment scripts.",
            ResponseShape::Record,
            NO_PROCESS_TIMEOUT,
            CicdCheck,
        ),
        ToolDescriptor::new(
            "list_documentation",
            "List all documentation files.",
            ResponseShape::Record,
            NO_PROCESS_TIMEOUT,
            ListDocumentation,
        ),
        ToolDescriptor::new(
            "get_quick_reference",
            "Get quick reference information about the project structure and commands.",
            ResponseShape::Record,
            NO_PROCESS_TIMEOUT,
            QuickReference,
        ),
        ToolDescriptor::new(
            "workspace_info",
            "Get information about the monorepo workspace packages.",
            ResponseShape::Record,
            WORKSPACE_LIST_TIMEOUT,
            JsonTool {
                command: workspace_list_command,
                shape: shape_packages,
            },
        ),
        ToolDescriptor::new(
            "workspace_health",
            "Analyze the overall health of the workspace.",
            ResponseShape::Record,
            STATUS_TIMEOUT,
            WorkspaceHealth,
        ),
    ]
}
