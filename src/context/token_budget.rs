//! Token budget enforcement by oldest-first eviction
//!
//! The system message at index 0 is never evicted. When it alone exceeds the
//! ceiling, enforcement stops at the single-message floor: the budget is a
//! soft ceiling and messages are never partially truncated.

use super::models::ConversationLog;
use super::token_estimator::TokenEstimator;
use crate::metrics::METRICS;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a single enforcement pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enforcement {
    pub evicted: usize,
    pub total_tokens: usize,
    pub budget: usize,
}

impl Enforcement {
    /// Check if the log ended within budget
    pub fn is_within_budget(&self) -> bool {
        self.total_tokens <= self.budget
    }
}

/// Token budget enforcer
pub struct TokenBudgetManager {
    estimator: Arc<dyn TokenEstimator>,
}

impl TokenBudgetManager {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { estimator }
    }

    /// Total tokens across every message in the log
    pub fn total_tokens(&self, log: &ConversationLog, model: &str) -> usize {
        self.estimator.count_messages(log.messages(), model)
    }

    /// Evict messages at index 1 until the log fits `budget` or only the
    /// system message remains.
    pub fn enforce(&self, log: &mut ConversationLog, budget: usize, model: &str) -> Enforcement {
        // Per-message counts so each eviction is a subtraction, not a recount
        let mut counts: Vec<usize> = log
            .messages()
            .iter()
            .map(|m| self.estimator.count(&m.content, model))
            .collect();
        let mut total: usize = counts.iter().sum();
        let mut evicted = 0;

        while total > budget && log.len() > 1 {
            if let Some(removed) = log.evict_oldest() {
                total -= counts.remove(1);
                evicted += 1;
                debug!(role = %removed.role, remaining = log.len(), total, "Evicted message");
            }
        }

        if total > budget {
            warn!(total, budget, "System message alone exceeds token budget");
        }

        METRICS.record_token_budget(total, evicted);

        Enforcement {
            evicted,
            total_tokens: total,
            budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::models::Message;
    use crate::context::token_estimator::WordBasedEstimator;

    fn words(n: usize) -> String {
        vec!["w"; n].join(" ")
    }

    fn manager() -> TokenBudgetManager {
        TokenBudgetManager::new(Arc::new(WordBasedEstimator::new(1.0)))
    }

    #[test]
    fn test_within_budget_is_untouched() {
        let mut log = ConversationLog::seeded(words(3));
        log.push(Message::user(words(5)));

        let result = manager().enforce(&mut log, 10, "any");
        assert_eq!(result.evicted, 0);
        assert_eq!(result.total_tokens, 8);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_evicts_oldest_first() {
        // [system(3), user(5), user(5), user(5)] against a budget of 10
        let mut log = ConversationLog::seeded(words(3));
        log.push(Message::user(format!("first {}", words(4))));
        log.push(Message::user(format!("second {}", words(4))));
        log.push(Message::user(format!("third {}", words(4))));

        let result = manager().enforce(&mut log, 10, "any");
        assert_eq!(result.evicted, 2);
        assert_eq!(result.total_tokens, 8);
        assert!(result.is_within_budget());
        assert_eq!(log.len(), 2);
        assert!(log.messages()[1].content.starts_with("third"));
        assert_eq!(log.system_prompt(), Some(words(3).as_str()));
    }

    #[test]
    fn test_oversized_system_message_is_kept() {
        let mut log = ConversationLog::seeded(words(20));
        log.push(Message::user(words(2)));
        log.push(Message::assistant(words(2)));

        let result = manager().enforce(&mut log, 10, "any");
        assert_eq!(log.len(), 1);
        assert_eq!(result.evicted, 2);
        assert!(!result.is_within_budget());
        assert_eq!(log.system_prompt(), Some(words(20).as_str()));
    }

    #[test]
    fn test_terminates_for_any_budget() {
        for budget in 0..40 {
            let mut log = ConversationLog::seeded(words(4));
            for i in 0..6 {
                log.push(Message::user(words(i + 1)));
            }
            let system = log.messages()[0].clone();

            let result = manager().enforce(&mut log, budget, "any");
            assert!(result.total_tokens <= budget || log.len() == 1);
            assert_eq!(log.messages()[0], system);
            assert_eq!(result.total_tokens, manager().total_tokens(&log, "any"));
        }
    }
}
