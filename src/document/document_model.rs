use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::skeleton::Fingerprint;

/// Separator between screen and element in element names (`settings__wifi`).
pub const SCREEN_ELEMENT_DELIMITER: &str = "__";

/// Screen prefix of an element name, if it has one.
pub fn screen_of(element: &str) -> Option<&str> {
    element
        .split_once(SCREEN_ELEMENT_DELIMITER)
        .map(|(screen, _)| screen)
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl FromStr for ScrollDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.strip_prefix("page_").unwrap_or(&lower) {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "left" => Ok(ScrollDirection::Left),
            "right" => Ok(ScrollDirection::Right),
            other => Err(format!("unknown scroll direction '{}'", other)),
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        };
        f.write_str(s)
    }
}

/// Action a dependency step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "direction", rename_all = "snake_case")]
pub enum ActionType {
    Tap,
    LongTap,
    SetText,
    Scroll(ScrollDirection),
    Back,
    Enter,
}

impl ActionType {
    /// `back` and `enter` act on the whole screen and need no element.
    pub fn is_global(&self) -> bool {
        matches!(self, ActionType::Back | ActionType::Enter)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionType::Tap => "tap",
            ActionType::LongTap => "long_tap",
            ActionType::SetText => "set_text",
            ActionType::Scroll(_) => "scroll",
            ActionType::Back => "back",
            ActionType::Enter => "enter",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Scroll(direction) => write!(f, "scroll {}", direction),
            other => f.write_str(other.name()),
        }
    }
}

/// One recorded action on the way to a target screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub screen: Option<String>,
    pub action: ActionType,
    pub element: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyPath {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementEntry {
    pub name: String,
    pub screen: String,
    /// Locator candidates, most specific first.
    pub locators: Vec<String>,
    pub paths: Vec<DependencyPath>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub effect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenEntry {
    pub name: String,
    pub fingerprint: Fingerprint,
    pub elements: Vec<ElementEntry>,
}

/// Pre-built element table. Screens keep document order; the first is the main screen.
#[derive(Debug, Clone, Default)]
pub struct LocatorDocument {
    pub(crate) screens: Vec<ScreenEntry>,
    /// element name -> (screen index, element index)
    pub(crate) index: HashMap<String, (usize, usize)>,
}

impl LocatorDocument {
    pub fn new(screens: Vec<ScreenEntry>) -> Self {
        let mut index = HashMap::new();
        for (si, screen) in screens.iter().enumerate() {
            for (ei, element) in screen.elements.iter().enumerate() {
                index.entry(element.name.clone()).or_insert((si, ei));
            }
        }
        Self { screens, index }
    }

    pub fn screens(&self) -> &[ScreenEntry] {
        &self.screens
    }

    pub fn main_screen(&self) -> Option<&str> {
        self.screens.first().map(|s| s.name.as_str())
    }

    pub fn screen(&self, name: &str) -> Option<&ScreenEntry> {
        self.screens.iter().find(|s| s.name == name)
    }

    pub fn element(&self, name: &str) -> Option<&ElementEntry> {
        let &(si, ei) = self.index.get(name)?;
        self.screens.get(si)?.elements.get(ei)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Screen an element lives on: the screen listing it, else its name prefix.
    pub fn screen_of_element<'s>(&'s self, name: &'s str) -> Option<&'s str> {
        match self.element(name) {
            Some(entry) => Some(entry.screen.as_str()),
            None => screen_of(name),
        }
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = (&str, &Fingerprint)> {
        self.screens
            .iter()
            .map(|s| (s.name.as_str(), &s.fingerprint))
    }

    /// Candidates of `name` that no other element on its screen also lists.
    /// Falls back to every candidate when all are shared.
    pub fn unique_locators(&self, name: &str) -> Vec<String> {
        let Some(entry) = self.element(name) else {
            return Vec::new();
        };
        let Some(screen) = self.screen(&entry.screen) else {
            return entry.locators.clone();
        };

        let unique: Vec<String> = entry
            .locators
            .iter()
            .filter(|candidate| {
                !screen
                    .elements
                    .iter()
                    .any(|other| other.name != entry.name && other.locators.contains(candidate))
            })
            .cloned()
            .collect();

        if unique.is_empty() {
            entry.locators.clone()
        } else {
            unique
        }
    }
}
