//! `mentor-agent`: streaming client for the guidepath mentor assistant.
//!
//! The mentor is an HTTP endpoint that takes the chat history plus a
//! snapshot of the learner's position and answers with a line-delimited
//! `data:` stream of content deltas.
//!
//! # Architecture
//!
//! ```text
//! Conversation      ← history; one pending assistant slot at a time
//!     │ begin_turn()
//!     ▼
//! MentorRequest     ← { messages, context: MentorContext } (camelCase wire keys)
//!     │
//!     ▼
//! MentorClient      ← POST via reqwest, streaming body
//!     │
//!     ▼
//! MentorStream      ← futures::Stream<Item = Result<String>>
//!     │                background task + mpsc channel + StreamDecoder
//!     ▼
//! TurnOutcome       ← Completed(text) | Aborted | Failed { apology, .. }
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use futures::future::AbortHandle;
//! use mentor_agent::{Conversation, MentorClient};
//!
//! let client = MentorClient::new("http://localhost:3000/api/assistant");
//! let mut conversation = Conversation::new();
//! let request = conversation.begin_turn("What does -d do?", context, None);
//! let (_handle, abort) = AbortHandle::new_pair();
//! let outcome = client.ask(&request, abort, |f| print!("{f}")).await;
//! conversation.finish_turn(&outcome);
//! ```

pub mod client;
pub mod conversation;
pub mod error;
pub mod stream;
pub mod types;

pub use client::{MentorClient, TurnOutcome, APOLOGY};
pub use conversation::Conversation;
pub use error::MentorError;
pub use stream::{MentorStream, StreamDecoder};
pub use types::{ChatMessage, MentorContext, MentorRequest, Role, StepContext};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, MentorError>;
