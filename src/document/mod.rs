pub mod document_model;
pub mod loader;

pub use document_model::{
    ActionType, DependencyPath, ElementEntry, LocatorDocument, ScreenEntry, ScrollDirection, Step,
    screen_of,
};
pub use loader::{DocumentError, from_json_str, from_yaml_str, load_document, parse_step};
