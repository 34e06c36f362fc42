use thiserror::Error;

use crate::device::DeviceError;
use crate::tree::TreeError;

/// Why an element could not be turned into a node.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The element was expected on the current screen but no candidate matched,
    /// even after scrolling. Points at a stale or wrong locator.
    #[error("element '{element}' should be on this screen but none of its locators match: {locators:?}")]
    XPath {
        element: String,
        locators: Vec<String>,
    },

    /// The element lives on another screen and no dependency path reached it.
    #[error("{}", not_found_message(.element, .container))]
    NotFound {
        element: String,
        container: Option<String>,
    },

    /// A sub-element lookup inside an already located container failed.
    #[error("'{action}' on '{container}' failed for argument {argument}")]
    Action {
        container: String,
        action: String,
        argument: String,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("device returned an unusable view tree: {0}")]
    Tree(#[from] TreeError),
}

fn not_found_message(element: &str, container: &Option<String>) -> String {
    match container {
        Some(container) => format!("element '{}' not found inside '{}'", element, container),
        None => format!("element '{}' not found and no dependency path reaches it", element),
    }
}

impl ResolveError {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::XPath { .. } => "XPathError",
            ResolveError::NotFound { .. } => "NotFoundError",
            ResolveError::Action { .. } => "ActionError",
            ResolveError::Device(_) => "DeviceError",
            ResolveError::Tree(_) => "TreeError",
        }
    }
}
