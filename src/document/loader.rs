use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

use crate::document::document_model::{
    ActionType, DependencyPath, ElementEntry, LocatorDocument, SCREEN_ELEMENT_DELIMITER,
    ScreenEntry, ScrollDirection, Step, screen_of,
};
use crate::skeleton::{Fingerprint, SkeletonError};

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("cannot read locator document '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid JSON locator document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML locator document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("screen '{screen}' has a malformed skeleton: {source}")]
    Skeleton {
        screen: String,
        source: SkeletonError,
    },

    #[error("element '{element}' has an invalid dependency step '{step}': {message}")]
    Step {
        element: String,
        step: String,
        message: String,
    },
}

// ============================================================================
// On-disk shape
// ============================================================================

/// Map deserialized into a `Vec` so that key order survives.
struct Ordered<V>(Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Ordered<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = Ordered<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(Ordered(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

impl<V> Default for Ordered<V> {
    fn default() -> Self {
        Ordered(Vec::new())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

#[derive(Deserialize)]
struct RawScreen {
    #[serde(default, alias = "skeleton_str", alias = "fingerprint")]
    skeleton: String,
    #[serde(default)]
    elements: Ordered<RawElement>,
}

#[derive(Deserialize)]
struct RawElement {
    #[serde(default, alias = "xpath", alias = "locator_candidates")]
    locators: OneOrMany,
    #[serde(default, alias = "dependency_paths", alias = "dependency")]
    paths: Vec<Vec<RawStep>>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    effect: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStep {
    Statement(String),
    Structured {
        #[serde(default, alias = "screen_name")]
        screen: Option<String>,
        #[serde(alias = "action_type")]
        action: String,
        #[serde(default, alias = "referenced_element")]
        element: Option<String>,
        #[serde(default, alias = "input_text")]
        text: Option<String>,
        #[serde(default)]
        direction: Option<String>,
    },
}

// ============================================================================
// Loading
// ============================================================================

/// Loads a document, choosing YAML for `.yaml`/`.yml` and JSON otherwise.
pub fn load_document(path: &Path) -> Result<LocatorDocument, DocumentError> {
    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => from_yaml_str(&content),
        _ => from_json_str(&content),
    }
}

pub fn from_json_str(content: &str) -> Result<LocatorDocument, DocumentError> {
    let raw: Ordered<RawScreen> = serde_json::from_str(content)?;
    assemble(raw)
}

pub fn from_yaml_str(content: &str) -> Result<LocatorDocument, DocumentError> {
    let raw: Ordered<RawScreen> = serde_yaml::from_str(content)?;
    assemble(raw)
}

fn assemble(raw: Ordered<RawScreen>) -> Result<LocatorDocument, DocumentError> {
    let mut screens = Vec::with_capacity(raw.0.len());

    for (screen_name, raw_screen) in raw.0 {
        let fingerprint = Fingerprint::from_markup(&raw_screen.skeleton).map_err(|source| {
            DocumentError::Skeleton {
                screen: screen_name.clone(),
                source,
            }
        })?;

        let mut elements = Vec::with_capacity(raw_screen.elements.0.len());
        for (element_name, raw_element) in raw_screen.elements.0 {
            let locators = match raw_element.locators {
                OneOrMany::One(single) => vec![single],
                OneOrMany::Many(many) => many,
            };

            let mut paths = Vec::with_capacity(raw_element.paths.len());
            for raw_path in raw_element.paths {
                let steps = raw_path
                    .into_iter()
                    .map(|raw_step| convert_step(&element_name, raw_step))
                    .collect::<Result<Vec<_>, _>>()?;
                paths.push(DependencyPath { steps });
            }

            elements.push(ElementEntry {
                name: element_name,
                screen: screen_name.clone(),
                locators,
                paths,
                description: raw_element.description,
                kind: raw_element.kind,
                effect: raw_element.effect,
            });
        }

        screens.push(ScreenEntry {
            name: screen_name,
            fingerprint,
            elements,
        });
    }

    let mut document = LocatorDocument::new(screens);
    qualify_step_elements(&mut document);

    debug!(
        screens = document.screens.len(),
        elements = document.index.len(),
        "loaded locator document"
    );
    Ok(document)
}

fn convert_step(element: &str, raw: RawStep) -> Result<Step, DocumentError> {
    let invalid = |step: String, message: String| DocumentError::Step {
        element: element.to_string(),
        step,
        message,
    };

    match raw {
        RawStep::Statement(statement) => {
            parse_step(&statement).map_err(|message| invalid(statement.clone(), message))
        }
        RawStep::Structured {
            screen,
            action,
            element: target,
            text,
            direction,
        } => {
            let direction = direction.or_else(|| text.clone());
            let action_type = parse_action(&action, direction.as_deref())
                .map_err(|message| invalid(action.clone(), message))?;
            if !action_type.is_global() && target.is_none() {
                return Err(invalid(action, "step needs an element".to_string()));
            }
            let screen = screen.or_else(|| target.as_deref().and_then(screen_of).map(String::from));
            Ok(Step {
                screen,
                action: action_type,
                element: if action_type.is_global() { None } else { target },
                text: if action_type == ActionType::SetText { text } else { None },
            })
        }
    }
}

/// Rewrites short step element names (`wifi` on screen `settings`) to their full form.
fn qualify_step_elements(document: &mut LocatorDocument) {
    let known = document.index.clone();
    for screen in &mut document.screens {
        for element in &mut screen.elements {
            for path in &mut element.paths {
                for step in &mut path.steps {
                    let (Some(name), Some(screen_name)) = (&step.element, &step.screen) else {
                        continue;
                    };
                    if known.contains_key(name) {
                        continue;
                    }
                    let qualified = format!("{}{}{}", screen_name, SCREEN_ELEMENT_DELIMITER, name);
                    if known.contains_key(&qualified) {
                        step.element = Some(qualified);
                    }
                }
            }
        }
    }
}

// ============================================================================
// Step parsing
// ============================================================================

/// Parses an action name such as `tap`, `long_touch` or `scroll down`.
pub fn parse_action(action: &str, direction: Option<&str>) -> Result<ActionType, String> {
    let action = action.trim().to_ascii_lowercase();
    let (name, inline_direction) = match action.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_string(), Some(rest.trim().to_string())),
        None => (action.clone(), None),
    };

    match name.as_str() {
        "tap" | "touch" | "click" => Ok(ActionType::Tap),
        "long_tap" | "long_touch" => Ok(ActionType::LongTap),
        "set_text" | "input" => Ok(ActionType::SetText),
        "back" => Ok(ActionType::Back),
        "enter" => Ok(ActionType::Enter),
        "scroll" => {
            let direction = inline_direction
                .as_deref()
                .or(direction)
                .ok_or_else(|| "scroll step needs a direction".to_string())?;
            Ok(ActionType::Scroll(direction.parse()?))
        }
        other => Err(format!("unknown action '{}'", other)),
    }
}

/// Parses a recorded statement such as `settings__wifi.tap()`,
/// `search__box.set_text('hello')`, `feed__list.scroll('down')` or `back()`.
pub fn parse_step(statement: &str) -> Result<Step, String> {
    let statement = statement.trim().trim_end_matches(';').trim();

    let (element, call) = match statement.split_once('.') {
        Some((element, call)) if !element.contains('(') => (Some(element.trim()), call.trim()),
        _ => (None, statement),
    };

    let open = call
        .find('(')
        .ok_or_else(|| format!("'{}' is not a call", statement))?;
    if !call.ends_with(')') {
        return Err(format!("'{}' is missing ')'", statement));
    }
    let name = call[..open].trim();
    let argument = unquote(call[open + 1..call.len() - 1].trim());

    let action = match name {
        "scroll" => {
            let direction = argument
                .as_deref()
                .ok_or_else(|| "scroll needs a direction".to_string())?;
            ActionType::Scroll(direction.parse::<ScrollDirection>()?)
        }
        other => parse_action(other, None)?,
    };

    if action.is_global() {
        return Ok(Step {
            screen: None,
            action,
            element: None,
            text: None,
        });
    }

    let element = element
        .filter(|e| !e.is_empty())
        .ok_or_else(|| format!("'{}' has no element", statement))?;
    let text = if action == ActionType::SetText {
        Some(argument.ok_or_else(|| "set_text needs a text argument".to_string())?)
    } else {
        None
    };

    Ok(Step {
        screen: screen_of(element).map(String::from),
        action,
        element: Some(element.to_string()),
        text,
    })
}

fn unquote(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let stripped = raw
        .strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .or_else(|| raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
        .unwrap_or(raw);
    Some(stripped.to_string())
}
