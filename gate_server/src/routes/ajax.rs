//! Form payloads and envelope mapping for the AJAX endpoints.

use axum::extract::rejection::FormRejection;
use serde::{Deserialize, Serialize};

use crate::errors::{GatewayError, STATUS_FAILED, STATUS_TRANSPORT};
use crate::models::envelope::Envelope;
use crate::models::review::ReviewResult;

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimpleCheckForm {
    pub sql_content: Option<String>,
    pub cluster_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OscForm {
    pub workflowid: Option<String>,
    #[serde(rename = "sqlID")]
    pub sql_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkflowForm {
    pub workflowid: Option<String>,
}

/// Reply of the status endpoint, whose `status` field is the workflow's
/// status text rather than a numeric code.
#[derive(Debug, Serialize)]
pub struct WorkflowStatusReply {
    pub status: String,
    pub msg: String,
    pub data: String,
}

/// Parse a required numeric form field.
pub fn required_id(name: &str, value: Option<&str>) -> Result<i64, GatewayError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(GatewayError::MissingParameter(format!("{name} is empty")));
    }
    value
        .parse()
        .map_err(|_| GatewayError::MalformedInput(format!("{name} must be an integer, got {value:?}")))
}

/// Parse both OSC identifiers, reporting either as missing in one message.
pub fn osc_ids(form: &OscForm) -> Result<(i64, i64), GatewayError> {
    let missing = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or_default().is_empty();
    if missing(&form.workflowid) || missing(&form.sql_id) {
        return Err(GatewayError::MissingParameter("workflowid or sqlID is empty".to_string()));
    }
    Ok((
        required_id("workflowid", form.workflowid.as_deref())?,
        required_id("sqlID", form.sql_id.as_deref())?,
    ))
}

/// Envelope for a review submission. Everything but transport failure is
/// reported as status 1, which is what the submit page checks for.
pub fn review_envelope(result: Result<ReviewResult, GatewayError>) -> Envelope {
    match result {
        Ok(rows) => match serde_json::to_value(&rows) {
            Ok(data) => Envelope::ok(data),
            Err(e) => Envelope::failure(STATUS_FAILED, format!("could not encode review result: {e}")),
        },
        Err(e @ (GatewayError::Transport(_) | GatewayError::Timeout(_))) => {
            Envelope::failure(STATUS_TRANSPORT, e.to_string())
        }
        Err(e) => Envelope::failure(STATUS_FAILED, e.to_string()),
    }
}

/// A form body axum could not extract (wrong content type, bad encoding).
pub fn rejected_form(rejection: &FormRejection) -> GatewayError {
    GatewayError::MalformedInput(format!("invalid form submission: {}", rejection.body_text()))
}

/// Envelope for any other failed operation.
pub fn error_envelope(err: &GatewayError) -> Envelope {
    if let GatewayError::Storage(e) = err {
        tracing::error!("Storage failure: {e:#}");
    }
    Envelope::failure(err.envelope_status(), err.to_string())
}

/// Starter DDL offered by the submit page.
pub const TABLE_TEMPLATE: &str = "CREATE TABLE `default_table` (
    `id` bigint unsigned NOT NULL AUTO_INCREMENT COMMENT 'ID',
    `create_time` timestamp(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) COMMENT 'created at',
    `update_time` timestamp(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3) COMMENT 'updated at',
    `valid` tinyint(1) unsigned NOT NULL DEFAULT '1' COMMENT 'is valid',
    PRIMARY KEY (`id`),
    KEY `idx_create_time` (`create_time`),
    KEY `idx_update_time` (`update_time`)
    ) ENGINE=InnoDB AUTO_INCREMENT=1 DEFAULT CHARSET=utf8mb4 COMMENT='default table comment';
";
