use serde::Serialize;

use crate::script::compiler::CompiledScript;
use crate::script::error::RunError;
use crate::trace::{StatementRef, TraceRecord};

/// Failure details handed to whoever repairs the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub error_type: String,
    pub message: String,
    pub element: Option<String>,
    pub source_script: String,
    pub compiled_script: String,
    pub compiled_line: Option<usize>,
    pub compiled_code: Option<String>,
    pub source_line: Option<usize>,
    pub source_code: Option<String>,
    /// Markup of the screen at the time of failure.
    pub screen: String,
    pub screen_name: Option<String>,
}

impl ErrorReport {
    pub fn new(
        error: &RunError,
        script: &CompiledScript,
        statement: Option<&StatementRef>,
        screen: String,
        screen_name: Option<&str>,
    ) -> Self {
        Self {
            error_type: error.kind().to_string(),
            message: error.to_string(),
            element: error.element().map(String::from),
            source_script: script.source.clone(),
            compiled_script: script.code.clone(),
            compiled_line: statement.map(|s| s.compiled_line),
            compiled_code: statement.map(|s| s.compiled_code.clone()),
            source_line: statement.and_then(|s| s.source_line),
            source_code: statement.and_then(|s| s.source_code.clone()),
            screen,
            screen_name: screen_name.map(String::from),
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    pub completed: bool,
    pub action_count: usize,
    pub elapsed_ms: u64,
    pub error: Option<ErrorReport>,
    pub trace_records: Vec<TraceRecord>,
    /// Typed error behind `error`.
    #[serde(skip)]
    pub failure: Option<RunError>,
}

impl ExecutionResult {
    pub fn error_kind(&self) -> Option<&'static str> {
        self.failure.as_ref().map(RunError::kind)
    }
}
