use thiserror::Error;

use crate::resolver::ResolveError;

/// Defects found before any device action runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("line {line}: '{construct}' would swallow execution errors and is not allowed")]
    SuppressionSyntax { line: usize, construct: String },

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: '{reference}' is not a valid element reference")]
    InvalidReference { line: usize, reference: String },
}

impl CompileError {
    pub fn line(&self) -> usize {
        match self {
            CompileError::SuppressionSyntax { line, .. }
            | CompileError::Syntax { line, .. }
            | CompileError::InvalidReference { line, .. } => *line,
        }
    }
}

/// Terminal failure of a run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Element reference missing from the locator document.
    #[error("unknown element '{name}'")]
    ApiName { name: String },

    #[error("more than {limit} actions issued; the script is likely stuck in a loop")]
    ActionLimitExceeded { limit: usize },

    /// Type errors, bad arguments and other script-level faults.
    #[error("{message}")]
    Script { message: String },
}

impl RunError {
    pub fn script(message: impl Into<String>) -> Self {
        RunError::Script {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Resolve(e) => e.kind(),
            RunError::ApiName { .. } => "ApiNameError",
            RunError::ActionLimitExceeded { .. } => "ActionLimitExceeded",
            RunError::Script { .. } => "ScriptError",
        }
    }

    /// Element the failure is about, when there is one.
    pub fn element(&self) -> Option<&str> {
        match self {
            RunError::Resolve(ResolveError::XPath { element, .. })
            | RunError::Resolve(ResolveError::NotFound { element, .. }) => Some(element),
            RunError::Resolve(ResolveError::Action { container, .. }) => Some(container),
            RunError::ApiName { name } => Some(name),
            _ => None,
        }
    }
}
