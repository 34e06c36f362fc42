pub mod eval;
pub mod locator_model;
pub mod parser;

pub use eval::{LocatorMatch, evaluate, evaluate_all, first_match};
pub use locator_model::{LocatorPath, node_locator, quote_literal};
pub use parser::{LocatorError, parse};
