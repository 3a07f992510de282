//! Audit engine result rows.
//!
//! The engine speaks in positional rows. On the wire, and in the
//! `review_content` column, every row is an 11-element JSON array:
//!
//! ```text
//! [id, stage, error_level, stage_status, error_message, sql,
//!  affected_rows, sequence, backup_dbname, execute_time, sqlsha1]
//! ```
//!
//! `ReviewRow` gives those positions names but serializes back to the same
//! array so an unchanged engine and existing clients keep working.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Rendering of an absent text column, as the engine writes it.
pub const NULL_TEXT: &str = "None";

/// `backup_dbname` value meaning "no backup target".
pub const NO_BACKUP_TARGET: &str = NULL_TEXT;

/// One line of an audit engine result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    /// 1-based, stable within a workflow.
    pub id: i64,
    pub stage: String,
    pub error_level: i64,
    pub stage_status: String,
    pub error_message: String,
    /// Normalized SQL text of the statement.
    pub sql: String,
    pub affected_rows: i64,
    /// Split-path marker, e.g. `'0_0_1'`.
    pub sequence: String,
    pub backup_dbname: String,
    pub execute_time: String,
    /// Empty unless the statement runs through OSC.
    pub sqlsha1: String,
}

/// Ordered rows, one per logical statement after splitting.
pub type ReviewResult = Vec<ReviewRow>;

impl ReviewRow {
    pub fn has_fingerprint(&self) -> bool {
        !self.sqlsha1.is_empty()
    }

    pub fn has_backup_target(&self) -> bool {
        self.backup_dbname != NO_BACKUP_TARGET
    }
}

#[derive(Serialize)]
struct WireRowRef<'a>(
    i64,
    &'a str,
    i64,
    &'a str,
    &'a str,
    &'a str,
    i64,
    &'a str,
    &'a str,
    &'a str,
    &'a str,
);

#[derive(Deserialize)]
struct WireRow(
    #[serde(deserialize_with = "lenient_int")] i64,
    #[serde(deserialize_with = "lenient_string")] String,
    #[serde(deserialize_with = "lenient_int")] i64,
    #[serde(deserialize_with = "lenient_string")] String,
    #[serde(deserialize_with = "lenient_string")] String,
    #[serde(deserialize_with = "lenient_string")] String,
    #[serde(deserialize_with = "lenient_int")] i64,
    #[serde(deserialize_with = "lenient_string")] String,
    #[serde(deserialize_with = "lenient_string")] String,
    #[serde(deserialize_with = "lenient_string")] String,
    #[serde(deserialize_with = "lenient_fingerprint")] String,
);

impl Serialize for ReviewRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireRowRef(
            self.id,
            &self.stage,
            self.error_level,
            &self.stage_status,
            &self.error_message,
            &self.sql,
            self.affected_rows,
            &self.sequence,
            &self.backup_dbname,
            &self.execute_time,
            &self.sqlsha1,
        )
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReviewRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let w = WireRow::deserialize(deserializer)?;
        Ok(ReviewRow {
            id: w.0,
            stage: w.1,
            error_level: w.2,
            stage_status: w.3,
            error_message: w.4,
            sql: w.5,
            affected_rows: w.6,
            sequence: w.7,
            backup_dbname: w.8,
            execute_time: w.9,
            sqlsha1: w.10,
        })
    }
}

// The engine emits `null` for absent text columns and sometimes quotes numbers.

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(NULL_TEXT.to_string()),
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!("expected text column, got {other}"))),
    }
}

fn lenient_fingerprint<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => Ok(s),
        None => Ok(String::new()),
    }
}

fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| de::Error::custom(format!("expected integer column, got {n}"))),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected integer column, got {s:?}"))),
        serde_json::Value::Null => Ok(0),
        other => Err(de::Error::custom(format!("expected integer column, got {other}"))),
    }
}

/// Parse a stored `review_content` document.
pub fn parse_review_content(raw: &str) -> serde_json::Result<ReviewResult> {
    serde_json::from_str(raw)
}
