//! Conversation log model, token counting and budget enforcement

pub mod models;
pub mod token_budget;
pub mod token_estimator;

pub use models::{ConversationLog, Message, Role};
pub use token_budget::{Enforcement, TokenBudgetManager};
pub use token_estimator::{TiktokenEstimator, TokenEstimator, WordBasedEstimator, FALLBACK_MODEL};
