// repotools-core/src/tools/deploy.rs

//! AWS deployment and Terraform tools.

use super::{script_path, JsonTool, ReportTool};
use crate::choices::{lookup, names, parse_choice, Choice, Environment};
use crate::errors::ToolError;
use crate::invoker::{CommandLine, InvocationRequest, Outcome};
use crate::registry::{
    ParamSpec, ResponseShape, ToolCall, ToolContext, ToolDescriptor, ToolHandler, ToolResponse,
};
use crate::shaping::non_empty_lines;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const DEPLOY_CHECK_TIMEOUT: Duration = Duration::from_secs(60);
const OUTPUTS_TIMEOUT: Duration = Duration::from_secs(30);
const DEPLOY_TIMEOUT: Duration = Duration::from_secs(600);
const PLAN_TIMEOUT: Duration = Duration::from_secs(120);
const APPLY_TIMEOUT: Duration = Duration::from_secs(300);
const STATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Deployment scripts exist for development and production only.
const DEPLOY_SCRIPTS: &[(Environment, &str)] = &[
    (Environment::Development, "deploy-dev.sh"),
    (Environment::Production, "deploy-prod.sh"),
];

fn environment(call: &ToolCall) -> Result<Environment, ToolError> {
    parse_choice(
        &call.tool,
        "environment",
        call.str_param("environment")?,
        Environment::ALL,
    )
}

fn environment_param(default: &str, description: &'static str) -> ParamSpec {
    ParamSpec::string("environment", default, description).with_choices(&names::<Environment>())
}

/// Terraform root module of an environment, relative to the project root.
pub fn environment_dir(env: Environment) -> PathBuf {
    PathBuf::from("infrastructure")
        .join("environments")
        .join(env.as_str())
}

fn deploy_check_command(
    ctx: &ToolContext,
    call: &ToolCall,
) -> Result<InvocationRequest, ToolError> {
    let env = environment(call)?;
    let command = CommandLine::argv([
        script_path(ctx.invoker.root(), "terraform-plan.sh"),
        env.as_str().to_string(),
    ]);
    Ok(InvocationRequest::new(command, call.timeout))
}

fn deploy_check_label(call: &ToolCall) -> Result<String, ToolError> {
    Ok(format!(
        "AWS Deployment Check for {}",
        call.str_param("environment")?
    ))
}

fn outputs_command(_ctx: &ToolContext, call: &ToolCall) -> Result<InvocationRequest, ToolError> {
    let env = environment(call)?;
    let command = CommandLine::argv(["terraform", "output", "-json"]);
    Ok(InvocationRequest::new(command, call.timeout).in_dir(environment_dir(env)))
}

/// `terraform output -json` wraps every output as `{"value": ..., "type": ..., "sensitive": ...}`.
pub(crate) fn shape_outputs(
    _ctx: &ToolContext,
    payload: Value,
) -> Result<Map<String, Value>, String> {
    let Value::Object(outputs) = payload else {
        return Err("expected a JSON object of terraform outputs".to_string());
    };
    Ok(outputs
        .into_iter()
        .map(|(name, output)| {
            let value = output.get("value").cloned().unwrap_or(Value::Null);
            (name, value)
        })
        .collect())
}

fn deploy_command(ctx: &ToolContext, call: &ToolCall) -> Result<InvocationRequest, ToolError> {
    let (_, script) = lookup(
        &call.tool,
        "environment",
        call.str_param("environment")?,
        DEPLOY_SCRIPTS,
    )?;
    let mut args = vec![script_path(ctx.invoker.root(), script)];
    if call.bool_param("skip_tests")? {
        args.push("--skip-tests".to_string());
    }
    Ok(InvocationRequest::new(CommandLine::Argv(args), call.timeout))
}

fn deploy_label(call: &ToolCall) -> Result<String, ToolError> {
    Ok(format!("AWS Deployment to {}", call.str_param("environment")?))
}

fn plan_command(_ctx: &ToolContext, call: &ToolCall) -> Result<InvocationRequest, ToolError> {
    let env = environment(call)?;
    let command = CommandLine::argv(["pnpm", "run", "terraform:plan", env.as_str()]);
    Ok(InvocationRequest::new(command, call.timeout))
}

fn plan_label(call: &ToolCall) -> Result<String, ToolError> {
    Ok(format!("Terraform Plan for {}", call.str_param("environment")?))
}

fn apply_command(ctx: &ToolContext, call: &ToolCall) -> Result<InvocationRequest, ToolError> {
    let env = environment(call)?;
    let mut args = vec![
        script_path(ctx.invoker.root(), "terraform-apply.sh"),
        env.as_str().to_string(),
    ];
    if call.bool_param("auto_approve")? {
        args.push("--auto-approve".to_string());
    }
    Ok(InvocationRequest::new(CommandLine::Argv(args), call.timeout))
}

fn apply_label(call: &ToolCall) -> Result<String, ToolError> {
    Ok(format!("Terraform Apply for {}", call.str_param("environment")?))
}

/// Runs `terraform state list` once per environment and reports each one.
struct TerraformStatus;

#[async_trait]
impl ToolHandler for TerraformStatus {
    async fn call(&self, ctx: &ToolContext, call: &ToolCall) -> Result<ToolResponse, ToolError> {
        let mut record = Map::new();
        for env in Environment::ALL {
            let request = InvocationRequest::new(
                CommandLine::argv(["terraform", "state", "list"]),
                call.timeout,
            )
            .in_dir(environment_dir(*env));
            let result = ctx.invoker.invoke(&request).await;
            debug!(environment = env.as_str(), status = result.status, "Collected terraform state");

            let mut status = Map::new();
            status.insert("initialized".to_string(), Value::Bool(result.success()));
            status.insert(
                "resources".to_string(),
                json!(non_empty_lines(&result.stdout)),
            );
            if result.outcome != Outcome::Completed {
                status.insert(
                    "error".to_string(),
                    Value::String(result.stderr.trim().to_string()),
                );
            }
            record.insert(env.as_str().to_string(), Value::Object(status));
        }
        Ok(ToolResponse::Record(record))
    }
}

pub(crate) fn descriptors() -> Vec<ToolDescriptor> {
    let deployable: Vec<&'static str> =
        DEPLOY_SCRIPTS.iter().map(|(env, _)| env.as_str()).collect();
    vec![
        ToolDescriptor::new(
            "aws_deploy_check",
            "Check AWS deployment status and prerequisites by running a terraform plan for an environment.",
            ResponseShape::Text,
            DEPLOY_CHECK_TIMEOUT,
            ReportTool {
                label: deploy_check_label,
                command: deploy_check_command,
            },
        )
        .param(environment_param("development", "The deployment environment")),
        ToolDescriptor::new(
            "aws_get_outputs",
            "Get Terraform outputs for the AWS infrastructure (bucket names, CloudFront IDs, ...).",
            ResponseShape::Record,
            OUTPUTS_TIMEOUT,
            JsonTool {
                command: outputs_command,
                shape: shape_outputs,
            },
        )
        .param(environment_param("production", "The environment to read outputs from")),
        ToolDescriptor::new(
            "aws_deploy",
            "Deploy the application to AWS (S3 + CloudFront) for an environment.",
            ResponseShape::Text,
            DEPLOY_TIMEOUT,
            ReportTool {
                label: deploy_label,
                command: deploy_command,
            },
        )
        .param(
            ParamSpec::string("environment", "development", "Target environment")
                .with_choices(&deployable),
        )
        .param(ParamSpec::boolean(
            "skip_tests",
            false,
            "Skip pre-deployment tests",
        )),
        ToolDescriptor::new(
            "terraform_plan",
            "Run Terraform plan to preview infrastructure changes.",
            ResponseShape::Text,
            PLAN_TIMEOUT,
            ReportTool {
                label: plan_label,
                command: plan_command,
            },
        )
        .param(environment_param("development", "Target environment")),
        ToolDescriptor::new(
            "terraform_apply",
            "Apply Terraform changes to create or update infrastructure.",
            ResponseShape::Text,
            APPLY_TIMEOUT,
            ReportTool {
                label: apply_label,
                command: apply_command,
            },
        )
        .param(environment_param("development", "Target environment"))
        .param(ParamSpec::boolean(
            "auto_approve",
            false,
            "Skip the confirmation prompt",
        )),
        ToolDescriptor::new(
            "terraform_status",
            "Get the Terraform state of every environment.",
            ResponseShape::Record,
            STATE_TIMEOUT,
            TerraformStatus,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::errors::ToolErrorKind;
    use tempfile::tempdir;

    fn call(tool: &str, value: Value) -> ToolCall {
        let descriptor = descriptors().into_iter().find(|d| d.name == tool).unwrap();
        descriptor.resolve(params(value)).unwrap()
    }

    #[test]
    fn test_deploy_command_maps_environment_to_script() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let request = deploy_command(
            &ctx,
            &call("aws_deploy", json!({ "environment": "production", "skip_tests": true })),
        )
        .unwrap();
        let expected_script = dir
            .path()
            .join("scripts/deploy-prod.sh")
            .to_string_lossy()
            .into_owned();
        assert_eq!(
            request.command,
            CommandLine::argv([expected_script.as_str(), "--skip-tests"])
        );
        assert_eq!(request.timeout, DEPLOY_TIMEOUT);
    }

    #[test]
    fn test_apply_command_flags() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let request = apply_command(&ctx, &call("terraform_apply", json!({ "auto_approve": true })))
            .unwrap();
        match request.command {
            CommandLine::Argv(args) => {
                assert!(args[0].ends_with("scripts/terraform-apply.sh"));
                assert_eq!(args[1..].to_vec(), vec!["development", "--auto-approve"]);
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_outputs_run_in_environment_dir() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let request = outputs_command(&ctx, &call("aws_get_outputs", json!({}))).unwrap();
        assert_eq!(
            request.working_dir,
            Some(PathBuf::from("infrastructure/environments/production"))
        );
        assert_eq!(request.command, CommandLine::argv(["terraform", "output", "-json"]));
    }

    #[test]
    fn test_shape_outputs_unwraps_values() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let payload = json!({
            "bucket_name": { "sensitive": false, "type": "string", "value": "riddle-rush-prod" },
            "distribution_id": { "sensitive": false, "type": "string", "value": "E123" },
        });
        let record = shape_outputs(&ctx, payload).unwrap();
        assert_eq!(record["bucket_name"], "riddle-rush-prod");
        assert_eq!(record["distribution_id"], "E123");
        assert!(shape_outputs(&ctx, json!(["not", "an", "object"])).is_err());
    }

    #[tokio::test]
    async fn test_aws_deploy_rejects_staging_without_invoking() {
        let dir = tempdir().unwrap();
        #[cfg(unix)]
        for script in ["deploy-dev.sh", "deploy-prod.sh"] {
            write_script(dir.path(), script, "touch invoked");
        }
        let registry = registry(dir.path());
        let err = registry
            .dispatch("aws_deploy", params(json!({ "environment": "staging" })))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::Mapping);
        assert_eq!(
            err.to_string(),
            "Invalid environment for tool 'aws_deploy': 'staging'. Valid choices: development, production"
        );
        assert!(!dir.path().join("invoked").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_aws_deploy_runs_script() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "deploy-dev.sh", "echo \"deploying $@\"; echo warn >&2");
        let registry = registry(dir.path());
        let response = registry
            .dispatch("aws_deploy", params(json!({ "skip_tests": true })))
            .await
            .unwrap();
        let text = response.as_text().unwrap();
        assert!(text.starts_with("AWS Deployment to development:"), "{}", text);
        assert!(text.contains("Exit Code: 0"));
        assert!(text.contains("--- OUTPUT ---\ndeploying --skip-tests"));
        assert!(text.contains("--- ERRORS ---\nwarn"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deploy_check_timeout_reports_sentinel() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "terraform-plan.sh", "sleep 5");
        let mut registry = registry(dir.path());
        registry
            .set_timeout("aws_deploy_check", Duration::from_millis(300))
            .unwrap();
        let response = registry.dispatch("aws_deploy_check", Map::new()).await.unwrap();
        let text = response.as_text().unwrap();
        assert!(text.contains("Exit Code: -1"), "{}", text);
        assert!(text.contains("timed out after 300ms"), "{}", text);
    }

    #[tokio::test]
    async fn test_missing_script_is_reported_not_raised() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        let response = registry
            .dispatch("terraform_apply", params(json!({ "environment": "staging" })))
            .await
            .unwrap();
        let text = response.as_text().unwrap();
        assert!(text.starts_with("Terraform Apply for staging:"));
        assert!(text.contains("Exit Code: -2"), "{}", text);
    }

    #[tokio::test]
    async fn test_get_outputs_without_environment_dir_is_error_record() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        let response = registry.dispatch("aws_get_outputs", Map::new()).await.unwrap();
        let record = response.as_record().unwrap();
        assert_eq!(record["exit_code"], -2);
        assert!(record["error"]
            .as_str()
            .unwrap()
            .contains("Working directory does not exist"));
    }

    #[tokio::test]
    async fn test_terraform_status_covers_every_environment() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        let response = registry.dispatch("terraform_status", Map::new()).await.unwrap();
        let record = response.as_record().unwrap();
        assert_eq!(record.len(), 3);
        for env in ["development", "staging", "production"] {
            assert_eq!(record[env]["initialized"], false, "{}", env);
            assert_eq!(record[env]["resources"], json!([]));
            assert!(record[env]["error"].is_string());
        }
    }
}
