pub mod context;
pub mod error;
pub mod model_locator;
pub mod resolver;

pub use context::{ExecutionStatus, Limits, ResolutionContext};
pub use error::ResolveError;
pub use model_locator::{LocatorModel, OllamaLocator};
pub use resolver::{Resolution, Target, device_action, direct, expected_here, locate_here, resolve, scroll_until};
