//! Persona-driven chat session core
//!
//! A [`ConversationController`] owns one session's message log, keeps it
//! within a token budget, swaps system personas, throttles request rate and
//! persists history to a flat JSON file. Front ends (web, terminal, tests)
//! drive it through `submit`, `set_persona`, `set_custom_persona`, `reset`
//! and `update_credential`.

pub mod completion;
pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod logging;
pub mod metrics;
pub mod persona;
pub mod rate_limit;
pub mod session;

pub use completion::{CompletionClient, CompletionRequest, OpenAiClient};
pub use config::Config;
pub use context::{ConversationLog, Message, Role};
pub use error::{ChatError, Result};
pub use history::HistoryStore;
pub use persona::{Persona, PersonaRegistry};
pub use session::{ConversationController, SharedController, SubmitOptions};
