// repotools-core/src/shaping.rs

//! Turns raw invocation results into tool responses.

use crate::errors::ToolError;
use crate::invoker::InvocationResult;
use serde_json::{Map, Value};

const EMPTY_SECTION: &str = "<no output>";

fn section(text: &str) -> &str {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        EMPTY_SECTION
    } else {
        trimmed
    }
}

/// Human-readable report: a label, the exit code, then the output and errors
/// sections. Both sections are always present.
pub fn format_report(label: &str, result: &InvocationResult) -> String {
    format!(
        "{}:\n\nExit Code: {}\n--- OUTPUT ---\n{}\n--- ERRORS ---\n{}",
        label,
        result.status,
        section(&result.stdout),
        section(&result.stderr)
    )
}

/// Record for a structured tool whose command did not succeed.
pub fn failure_record(result: &InvocationResult) -> Map<String, Value> {
    let mut record = Map::new();
    let detail = result.stderr.trim();
    let detail = if detail.is_empty() {
        format!("Command exited with status {}", result.status)
    } else {
        detail.to_string()
    };
    record.insert("error".to_string(), Value::String(detail));
    record.insert("exit_code".to_string(), Value::from(result.status));
    record
}

/// Parses the standard output of a successful command as JSON.
pub fn parse_json_output(tool: &str, result: &InvocationResult) -> Result<Value, ToolError> {
    serde_json::from_str(result.stdout.trim())
        .map_err(|e| ToolError::malformed_output(tool, format!("stdout is not valid JSON: {}", e)))
}

/// Non-empty, trimmed lines of `text`.
pub fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins stdout and stderr, trims the result and caps it at `max_chars` characters.
pub fn combined_output(result: &InvocationResult, max_chars: usize) -> String {
    let joined = [result.stdout.as_str(), result.stderr.as_str()]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    joined.trim().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::Outcome;

    fn completed(stdout: &str, stderr: &str, status: i32) -> InvocationResult {
        InvocationResult {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            status,
            outcome: Outcome::Completed,
        }
    }

    #[test]
    fn test_report_always_has_both_sections() {
        let report = format_report("Quality Checks", &completed("all good\n", "", 0));
        assert!(report.starts_with("Quality Checks:\n"));
        assert!(report.contains("Exit Code: 0"));
        assert!(report.contains("--- OUTPUT ---\nall good\n"));
        assert!(report.ends_with("--- ERRORS ---\n<no output>"));
    }

    #[test]
    fn test_report_keeps_stderr() {
        let report = format_report("Build Output (game)", &completed("", "boom", 1));
        assert!(report.contains("--- OUTPUT ---\n<no output>\n"));
        assert!(report.ends_with("--- ERRORS ---\nboom"));
    }

    #[test]
    fn test_failure_record() {
        let record = failure_record(&completed("", "No state file\n", 1));
        assert_eq!(record["error"], "No state file");
        assert_eq!(record["exit_code"], 1);

        let silent = failure_record(&completed("", "", 3));
        assert_eq!(silent["error"], "Command exited with status 3");
    }

    #[test]
    fn test_parse_json_output() {
        let value = parse_json_output("t", &completed("  {\"a\": 1}\n", "", 0)).unwrap();
        assert_eq!(value["a"], 1);

        let progress = completed("Progress: 10%", "", 0);
        let err = parse_json_output("workspace_info", &progress).unwrap_err();
        assert!(
            matches!(err, ToolError::MalformedOutput { ref tool, .. } if tool == "workspace_info")
        );
    }

    #[test]
    fn test_combined_output_truncates() {
        let result = completed("  abcdef", "ghij\n", 0);
        assert_eq!(combined_output(&result, 100), "abcdef\nghij");
        assert_eq!(combined_output(&result, 4), "abcd");
        assert_eq!(combined_output(&completed("", "", 0), 10), "");
    }

    #[test]
    fn test_non_empty_lines() {
        assert_eq!(non_empty_lines("a\n\n  b \n"), vec!["a", "b"]);
        assert!(non_empty_lines("").is_empty());
    }
}
