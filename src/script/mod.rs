pub mod ast;
pub mod compiler;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod report;
pub mod runtime;
pub mod value;

pub use compiler::{CompiledScript, compile, sanitize};
pub use error::{CompileError, RunError};
pub use interpreter::{Interpreter, MAX_LOOP_ITERATIONS};
pub use report::{ErrorReport, ExecutionResult};
pub use runtime::{MatchQuery, Runtime, RuntimeOptions, execute};
pub use value::{ElementHandle, Value};
