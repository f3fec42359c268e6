use crate::client::TurnOutcome;
use crate::types::{ChatMessage, MentorContext, MentorRequest};

// ─── Conversation ─────────────────────────────────────────────────────────

/// Message history for one mentor panel.
///
/// At most one assistant turn is in flight. Starting a new turn while one is
/// pending abandons the old slot, matching a learner who asks again before
/// the previous answer finished.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    pending: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a saved history. Nothing is pending.
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            pending: None,
        }
    }

    /// Push the learner's message, open an empty assistant slot, and build
    /// the request for this turn.
    pub fn begin_turn(
        &mut self,
        user_text: impl Into<String>,
        context: MentorContext,
        model: Option<String>,
    ) -> MentorRequest {
        if self.pending.take().is_some() {
            tracing::debug!("previous mentor turn abandoned");
        }
        self.messages.push(ChatMessage::user(user_text));
        self.pending = Some(String::new());
        MentorRequest {
            messages: self.messages.clone(),
            context,
            model,
        }
    }

    /// Append streamed text to the open slot.
    pub fn push_fragment(&mut self, fragment: &str) {
        if let Some(pending) = self.pending.as_mut() {
            pending.push_str(fragment);
        }
    }

    /// Text streamed so far for the open turn.
    pub fn pending_text(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Close the open slot: keep the reply, replace it with the apology, or
    /// drop it when the turn was aborted.
    pub fn finish_turn(&mut self, outcome: &TurnOutcome) {
        if self.pending.take().is_none() {
            return;
        }
        match outcome {
            TurnOutcome::Completed(text) => self.messages.push(ChatMessage::assistant(text.clone())),
            TurnOutcome::Failed { apology, .. } => {
                self.messages.push(ChatMessage::assistant(apology.clone()))
            }
            TurnOutcome::Aborted => {}
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
