//! Legacy lifecycle event payloads
//!
//! The event translator derives these from the live host tree at the moment
//! each host event fires; no running tallies are kept. Payload shapes match
//! the legacy callback API field for field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Run start: total registered tests at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeginData {
    pub total_tests: usize,
}

/// Run end aggregate. `passed` is derived as total minus failed minus
/// skipped; `runtime` is the maximum elapsed time across top-level suites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoneData {
    pub failed: usize,
    pub passed: usize,
    pub total: usize,
    pub runtime: u64,
}

/// Per-test detail, fired for every test regardless of module context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogData {
    pub result: bool,
    pub actual: Option<Value>,
    pub expected: Option<Value>,
    pub message: Option<String>,
    pub source: Option<String>,
    pub module: String,
    pub name: String,
}

/// Module start; only fired for suites created through the registrar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleStartData {
    pub name: String,
}

/// Module end aggregate; only fired for suites created through the
/// registrar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDoneData {
    pub name: String,
    pub failed: usize,
    pub passed: usize,
    pub total: usize,
    pub runtime: u64,
}

/// Test start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStartData {
    pub name: String,
    pub module: String,
}

/// Per-test summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDoneData {
    pub name: String,
    pub module: String,
    pub failed: usize,
    pub passed: usize,
    pub total: usize,
    pub runtime: u64,
}

/// A registered legacy callback.
pub type Callback<T> = Box<dyn FnMut(&T)>;

/// Generic subscription dispatch: one variant per legacy event, each
/// carrying its typed callback. Matched exhaustively by the interface, so
/// unknown event names are unrepresentable.
pub enum EventSubscriber {
    Begin(Callback<BeginData>),
    Done(Callback<DoneData>),
    Log(Callback<LogData>),
    ModuleStart(Callback<ModuleStartData>),
    ModuleDone(Callback<ModuleDoneData>),
    TestStart(Callback<TestStartData>),
    TestDone(Callback<TestDoneData>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payloads_serialize_with_legacy_field_shapes() {
        let payload = TestDoneData {
            name: "qunit test 1".into(),
            module: "qunit suite 1".into(),
            failed: 0,
            passed: 1,
            total: 1,
            runtime: 42,
        };
        insta::assert_json_snapshot!(payload, @r###"
        {
          "name": "qunit test 1",
          "module": "qunit suite 1",
          "failed": 0,
          "passed": 1,
          "total": 1,
          "runtime": 42
        }
        "###);
    }

    #[test]
    fn log_payload_round_trips() {
        let payload = LogData {
            result: false,
            actual: Some(json!(2)),
            expected: Some(json!(1)),
            message: Some("expected 2 to equal 1".into()),
            source: None,
            module: "m".into(),
            name: "t".into(),
        };
        let encoded = serde_json::to_string(&payload).expect("log payload serializes");
        let decoded: LogData = serde_json::from_str(&encoded).expect("log payload parses");
        assert_eq!(decoded, payload);
    }
}
