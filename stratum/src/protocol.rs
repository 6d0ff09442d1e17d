//! Stratum Protocol Messages
//!
//! Line-delimited JSON-RPC as miners speak it: requests carry an id,
//! notifications do not, and replies always carry both `result` and
//! `error` fields.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use mergepool_core::Work;

/// A request (or notification) from a miner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratumRequest {
    /// JSON-RPC id; absent on notifications
    #[serde(default)]
    pub id: Option<Value>,

    /// Method name
    pub method: String,

    /// Positional parameters
    #[serde(default)]
    pub params: Vec<Value>,
}

/// A reply to a miner request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratumResponse {
    pub id: Value,
    pub result: Value,
    pub error: Value,
}

impl StratumResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        StratumResponse {
            id,
            result,
            error: Value::Null,
        }
    }

    pub fn err(id: Value, code: i32, message: &str) -> Self {
        StratumResponse {
            id,
            result: Value::Null,
            error: json!([code, message, Value::Null]),
        }
    }

    /// Serializes to one protocol line (no trailing newline)
    pub fn to_line(&self) -> String {
        json!({
            "id": self.id,
            "result": self.result,
            "error": self.error,
        })
        .to_string()
    }
}

/// The `mining.subscribe` result tuple
pub fn subscribe_result(session_id: u64, extranonce1: &str, extranonce2_size: usize) -> Value {
    json!([
        [["mining.notify", format!("{:016x}", session_id)]],
        extranonce1,
        extranonce2_size,
    ])
}

/// A `mining.notify` push for a job
pub fn notify_line(work: &Work) -> String {
    json!({
        "id": Value::Null,
        "method": "mining.notify",
        "params": work.notify_params(),
    })
    .to_string()
}

/// A `mining.set_difficulty` push
pub fn set_difficulty_line(difficulty: f64) -> String {
    json!({
        "id": Value::Null,
        "method": "mining.set_difficulty",
        "params": [difficulty],
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_without_id_parses() {
        let request: StratumRequest =
            serde_json::from_str(r#"{"method":"mining.subscribe","params":[]}"#).unwrap();
        assert!(request.id.is_none());
        assert_eq!(request.method, "mining.subscribe");
    }

    #[test]
    fn test_response_lines() {
        let ok = StratumResponse::ok(json!(1), json!(true)).to_line();
        assert_eq!(ok, r#"{"error":null,"id":1,"result":true}"#);

        let err = StratumResponse::err(json!(2), 21, "stale work").to_line();
        assert!(err.contains("[21,\"stale work\",null]"));
    }

    #[test]
    fn test_subscribe_result_shape() {
        let result = subscribe_result(7, "01020304", 4);
        assert_eq!(result[1], "01020304");
        assert_eq!(result[2], 4);
        assert_eq!(result[0][0][0], "mining.notify");
    }

    #[test]
    fn test_set_difficulty_line() {
        let line = set_difficulty_line(1.0);
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["method"], "mining.set_difficulty");
        assert_eq!(value["params"][0], 1.0);
    }
}
