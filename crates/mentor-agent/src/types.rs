use serde::{Deserialize, Serialize};

// ─── Messages ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ─── Context ──────────────────────────────────────────────────────────────

/// The step the learner is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContext {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Where the learner is, sent with every question so the mentor can answer
/// about the current step.
///
/// `current_step` serializes as `null` (not omitted) when there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorContext {
    pub platform: String,
    pub module: String,
    pub current_step: Option<StepContext>,
    pub step_index: usize,
    pub total_steps: usize,
    pub completed_steps: Vec<String>,
}

// ─── Request ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorRequest {
    pub messages: Vec<ChatMessage>,
    pub context: MentorContext,
    /// Model override; the endpoint picks its own when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

// ─── Stream payload ───────────────────────────────────────────────────────

/// One `data:` payload. Only `choices[0].delta.content` is read; every other
/// field the endpoint sends is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamChunk {
    pub(crate) fn content(self) -> Option<String> {
        self.choices.into_iter().next()?.delta.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(step: Option<StepContext>) -> MentorContext {
        MentorContext {
            platform: "docker".into(),
            module: "Docker Compose Basics".into(),
            current_step: step,
            step_index: 1,
            total_steps: 5,
            completed_steps: vec!["check-version".into()],
        }
    }

    #[test]
    fn request_uses_wire_keys() {
        let req = MentorRequest {
            messages: vec![ChatMessage::user("why?")],
            context: context(Some(StepContext {
                title: "Start the stack".into(),
                description: "Bring services up".into(),
                tip: Some("-d detaches".into()),
                warning: None,
            })),
            model: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "messages": [{"role": "user", "content": "why?"}],
                "context": {
                    "platform": "docker",
                    "module": "Docker Compose Basics",
                    "currentStep": {
                        "title": "Start the stack",
                        "description": "Bring services up",
                        "tip": "-d detaches"
                    },
                    "stepIndex": 1,
                    "totalSteps": 5,
                    "completedSteps": ["check-version"]
                }
            })
        );
    }

    #[test]
    fn missing_step_is_null() {
        let value = serde_json::to_value(context(None)).unwrap();
        assert!(value["currentStep"].is_null());
        assert!(value.as_object().unwrap().contains_key("currentStep"));
    }

    #[test]
    fn chunk_content_tolerates_extra_fields() {
        let chunk: StreamChunk = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.content().as_deref(), Some("Hi"));

        let empty: StreamChunk = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.content(), None);
    }
}
