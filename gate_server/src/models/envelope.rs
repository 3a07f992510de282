//! The `{"status", "msg", "data"}` reply shape shared by every endpoint and by
//! the audit engine's OSC operations.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: i64,
    pub msg: String,
    #[serde(default = "empty_data")]
    pub data: serde_json::Value,
}

fn empty_data() -> serde_json::Value {
    serde_json::Value::String(String::new())
}

impl Envelope {
    pub fn ok(data: impl Into<serde_json::Value>) -> Self {
        Self {
            status: 0,
            msg: "ok".to_string(),
            data: data.into(),
        }
    }

    pub fn failure(status: i64, msg: impl Into<String>) -> Self {
        Self {
            status,
            msg: msg.into(),
            data: empty_data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_order_is_status_msg_data() {
        let body = serde_json::to_string(&Envelope::failure(4, "not executed via OSC")).unwrap();
        assert_eq!(body, r#"{"status":4,"msg":"not executed via OSC","data":""}"#);
    }

    #[test]
    fn missing_data_defaults_to_empty_string() {
        let env: Envelope = serde_json::from_str(r#"{"status":1,"msg":"gone"}"#).unwrap();
        assert_eq!(env.data, serde_json::Value::String(String::new()));
    }
}
