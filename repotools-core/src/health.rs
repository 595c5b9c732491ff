// repotools-core/src/health.rs

//! Scoring of workspace health checks.
//!
//! The score is a step function of the number of issues found:
//! 0 issues → 100, exactly 1 → 80, 2 or more → 60.

use serde::Serialize;

pub const TOP_SCORE: u8 = 100;
pub const MID_HIGH_SCORE: u8 = 80;
pub const MID_LOW_SCORE: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A failing check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthIssue {
    #[serde(rename = "type")]
    pub category: String,
    pub severity: Severity,
    pub message: String,
    pub details: String,
}

/// A passing check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthIndicator {
    #[serde(rename = "type")]
    pub category: String,
    pub status: String,
    pub message: String,
}

impl HealthIndicator {
    pub fn ok(category: &str, message: &str) -> Self {
        Self {
            category: category.to_string(),
            status: "ok".to_string(),
            message: message.to_string(),
        }
    }
}

pub fn score_for(issue_count: usize) -> u8 {
    match issue_count {
        0 => TOP_SCORE,
        1 => MID_HIGH_SCORE,
        _ => MID_LOW_SCORE,
    }
}

pub fn recommendation_for(issue_count: usize) -> &'static str {
    match issue_count {
        0 => "Workspace is in excellent health!",
        1 => "Address minor issues to improve workspace health",
        _ => "Multiple issues detected - review and fix for optimal performance",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub overall_score: u8,
    pub health_indicators: Vec<HealthIndicator>,
    pub issues_found: Vec<HealthIssue>,
    pub recommendations: Vec<String>,
}

impl HealthReport {
    pub fn new(health_indicators: Vec<HealthIndicator>, issues_found: Vec<HealthIssue>) -> Self {
        let count = issues_found.len();
        Self {
            overall_score: score_for(count),
            health_indicators,
            issues_found,
            recommendations: vec![recommendation_for(count).to_string()],
        }
    }
}
