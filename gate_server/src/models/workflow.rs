//! sql.workflow — A submitted SQL change and its review/execution state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::review::{parse_review_content, ReviewResult};
use crate::schema::sql_workflow;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = sql_workflow)]
pub struct Workflow {
    pub id: i64,
    pub workflow_name: String,
    pub engineer: String,
    /// Either a JSON list of usernames or a single bare username.
    pub review_man: String,
    pub create_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
    pub status: String,
    pub is_backup: bool,
    /// Initial review result captured at submission, as positional JSON rows.
    pub review_content: String,
    pub cluster_name: String,
    pub reviewok_time: Option<DateTime<Utc>>,
    pub sql_content: String,
    pub execute_result: Option<String>,
}

impl Workflow {
    /// Usernames allowed to review this workflow.
    pub fn reviewers(&self) -> Vec<String> {
        match serde_json::from_str::<Vec<String>>(&self.review_man) {
            Ok(list) => list,
            Err(_) => vec![self.review_man.clone()],
        }
    }

    pub fn is_reviewer(&self, username: &str) -> bool {
        self.reviewers().iter().any(|r| r == username)
    }

    /// Decode the stored initial review result.
    pub fn initial_review(&self) -> serde_json::Result<ReviewResult> {
        parse_review_content(&self.review_content)
    }

    pub fn workflow_status(&self) -> Option<WorkflowStatus> {
        self.status.parse().ok()
    }
}

/// Workflow lifecycle states as persisted in `sql_workflow.status`.
///
/// Only `Executing` gates anything inside the gateway (OSC cancellation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    AutoReviewing,
    AutoReviewFailed,
    Pending,
    Executing,
    Completed,
    Failed,
    Canceled,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::AutoReviewing => "auto_reviewing",
            WorkflowStatus::AutoReviewFailed => "auto_review_failed",
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Executing => "executing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto_reviewing" => Ok(WorkflowStatus::AutoReviewing),
            "auto_review_failed" => Ok(WorkflowStatus::AutoReviewFailed),
            "pending" => Ok(WorkflowStatus::Pending),
            "executing" => Ok(WorkflowStatus::Executing),
            "completed" => Ok(WorkflowStatus::Completed),
            "failed" => Ok(WorkflowStatus::Failed),
            "canceled" => Ok(WorkflowStatus::Canceled),
            other => Err(format!("unknown workflow status: {other}")),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_workflow(id: i64, status: WorkflowStatus, review_man: &str, review_content: &str) -> Workflow {
    Workflow {
        id,
        workflow_name: format!("workflow-{id}"),
        engineer: "alice".to_string(),
        review_man: review_man.to_string(),
        create_time: Utc::now(),
        finish_time: None,
        status: status.to_string(),
        is_backup: true,
        review_content: review_content.to_string(),
        cluster_name: "cluster-a".to_string(),
        reviewok_time: None,
        sql_content: "alter table t add column c int;".to_string(),
        execute_result: None,
    }
}
