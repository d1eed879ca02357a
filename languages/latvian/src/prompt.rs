use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const TOOL_NAME: &str = "create_flashcards";

const INSTRUCTIONS: &str = "You are helping a Russian speaker learn Latvian. \
For the Latvian text below, create a flashcard for every meaningful word and \
fixed expression. For each card give the dictionary base form, its Russian \
translation, and every sentence of the text in which it occurs, with the \
sentence's Russian translation and the exact forms used in that sentence. \
Also give a Russian translation of the whole text.";

/// Model parameters shared by every request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Request body accepted by the proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
}

impl ModelRequest {
    /// Flashcard request for one chunk of Latvian text
    pub fn flashcards(chunk_text: &str, options: &RequestOptions) -> Self {
        Self {
            model: options.model.clone(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: format!("{INSTRUCTIONS}\n\nText:\n{chunk_text}"),
            }],
            tools: Some(vec![flashcard_tool()]),
            tool_choice: Some(json!({"type": "tool", "name": TOOL_NAME})),
        }
    }

    /// Serialized body, which is also the retry queue's dedup key
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Tool schema forcing the nested card layout
pub fn flashcard_tool() -> Value {
    json!({
        "name": TOOL_NAME,
        "description": "Return Latvian vocabulary flashcards with usage contexts",
        "input_schema": {
            "type": "object",
            "properties": {
                "translation": {"type": "string"},
                "flashcards": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "unit": {"type": "string", "enum": ["word", "phrase"]},
                            "base_form": {"type": "string"},
                            "base_translation": {"type": "string"},
                            "contexts": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "latvian": {"type": "string"},
                                        "russian": {"type": "string"},
                                        "forms": {
                                            "type": "array",
                                            "items": {
                                                "type": "object",
                                                "properties": {
                                                    "form": {"type": "string"},
                                                    "translation": {"type": "string"}
                                                },
                                                "required": ["form", "translation"]
                                            }
                                        }
                                    },
                                    "required": ["latvian", "russian", "forms"]
                                }
                            }
                        },
                        "required": ["unit", "base_form", "base_translation", "contexts"]
                    }
                }
            },
            "required": ["flashcards"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RequestOptions {
        RequestOptions {
            model: "test-model".to_string(),
            max_tokens: 1024,
            temperature: 0.3,
        }
    }

    #[test]
    fn payload_forces_flashcard_tool() {
        let payload = ModelRequest::flashcards("Anna pamostas agri.", &options())
            .to_payload()
            .unwrap();
        let body: Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["tool_choice"]["name"], TOOL_NAME);
        assert_eq!(body["tools"][0]["name"], TOOL_NAME);
        assert!(
            body["messages"][0]["content"]
                .as_str()
                .unwrap()
                .ends_with("Anna pamostas agri.")
        );
    }

    #[test]
    fn same_chunk_gives_same_payload() {
        let a = ModelRequest::flashcards("Labdien!", &options()).to_payload().unwrap();
        let b = ModelRequest::flashcards("Labdien!", &options()).to_payload().unwrap();
        assert_eq!(a, b);
    }
}
