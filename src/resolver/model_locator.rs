use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::tree::NodeId;

/// Picks a node for an element that has no locator candidates.
pub trait LocatorModel {
    fn locate(&self, element: &str, description: Option<&str>, screen: &str) -> Option<NodeId>;
}

/// Asks a local Ollama model to pick the node id from the screen markup.
pub struct OllamaLocator {
    pub endpoint: String,
    pub model: String,
}

impl Default for OllamaLocator {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "qwen2.5:1.5b".to_string(),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: &'static str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Deserialize)]
struct ModelAnswer {
    id: Option<NodeId>,
}

impl OllamaLocator {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
        }
    }

    fn build_prompt(&self, element: &str, description: Option<&str>, screen: &str) -> String {
        format!(
r#"You locate UI elements on an Android screen.

ELEMENT: {}
DESCRIPTION: {}

SCREEN (every element carries its id attribute):
{}

Answer with JSON only: {{"id": <id of the matching element>}} or {{"id": null}} if it is not on screen."#,
            element,
            description.unwrap_or("none"),
            screen
        )
    }

    pub fn parse_response(text: &str) -> Option<NodeId> {
        let answer: ModelAnswer = match serde_json::from_str(text.trim()) {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "model answer is not the expected JSON");
                return None;
            }
        };
        answer.id
    }
}

impl LocatorModel for OllamaLocator {
    fn locate(&self, element: &str, description: Option<&str>, screen: &str) -> Option<NodeId> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: self.build_prompt(element, description, screen),
            stream: false,
            format: "json",
        };

        let client = reqwest::blocking::Client::new();
        let response = match client.post(&self.endpoint).json(&request).send() {
            Ok(r) => r,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "model request failed");
                return None;
            }
        };

        let ollama_response: OllamaResponse = response.json().ok()?;
        let id = Self::parse_response(&ollama_response.response);
        debug!(element, ?id, "model located element");
        id
    }
}
