//! Conversation controller: the façade a front end drives
//!
//! One controller per session. It owns the conversation log and coordinates
//! persona switching, budget enforcement, completion calls, throttling and
//! history persistence. Methods take `&mut self`; hosts that share a session
//! across tasks wrap it in a [`SharedController`].

pub mod credentials;

pub use credentials::CredentialResolver;

use crate::completion::{CompletionClient, CompletionRequest, OpenAiClient};
use crate::config::{check_max_tokens, check_temperature, Config, SessionConfig};
use crate::context::{ConversationLog, Message, TiktokenEstimator, TokenBudgetManager, TokenEstimator};
use crate::error::{ChatError, Result};
use crate::history::HistoryStore;
use crate::metrics::METRICS;
use crate::persona::{Persona, PersonaRegistry};
use crate::rate_limit::{RateLimiter, RateLimiterConfig};
use chrono::Local;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A controller shared between tasks; the mutex serialises access to the log
pub type SharedController = Arc<tokio::sync::Mutex<ConversationController>>;

/// Per-call overrides of the session defaults
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub model: Option<String>,
}

impl SubmitOptions {
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Conversation state controller for one session
pub struct ConversationController {
    config: SessionConfig,
    personas: PersonaRegistry,
    persona: Persona,
    log: ConversationLog,
    credential: SecretString,
    resolver: CredentialResolver,
    client: Arc<dyn CompletionClient>,
    budget: TokenBudgetManager,
    store: HistoryStore,
    history_path: PathBuf,
    rate_limiter: Option<RateLimiter>,
    storage_warning: Option<String>,
}

impl ConversationController {
    /// Build a controller that talks to the configured endpoint and counts
    /// tokens with tiktoken.
    pub fn from_config(credential: SecretString, config: Config) -> Result<Self> {
        let client = Arc::new(OpenAiClient::new(&config.completion)?);
        let estimator = Arc::new(TiktokenEstimator::new()?);
        Self::new(credential, config, client, estimator)
    }

    /// Build a controller with explicit collaborators. Loads the session's
    /// history file or seeds a fresh log with the default persona.
    pub fn new(
        credential: SecretString,
        config: Config,
        client: Arc<dyn CompletionClient>,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Result<Self> {
        config.validate()?;

        let Config {
            session,
            history,
            rate_limit,
            credentials,
            ..
        } = config;

        let personas = PersonaRegistry::new();
        let persona = session.default_persona;
        let store = HistoryStore::from_config(&history);
        let history_path = HistoryStore::session_path(&history, Local::now());

        // The active persona owns index 0, whatever the file held there
        let mut log = store.load(&history_path, personas.prompt(persona));
        log.set_system_prompt(personas.prompt(persona));

        let resolver = CredentialResolver::from(credentials);
        let credential = resolver.resolve(credential);
        let rate_limiter = rate_limit
            .enabled
            .then(|| RateLimiter::new(RateLimiterConfig::from(&rate_limit)));

        info!(
            path = %history_path.display(),
            persona = %persona,
            messages = log.len(),
            model = %session.model,
            "Conversation session started"
        );

        Ok(Self {
            config: session,
            personas,
            persona,
            log,
            credential,
            resolver,
            client,
            budget: TokenBudgetManager::new(estimator),
            store,
            history_path,
            rate_limiter,
            storage_warning: None,
        })
    }

    /// Current conversation log
    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    /// Active persona
    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub fn personas(&self) -> &PersonaRegistry {
        &self.personas
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    /// Token count of the current log under the session model
    pub fn total_tokens(&self) -> usize {
        self.budget.total_tokens(&self.log, &self.config.model)
    }

    /// The most recent persistence failure, if any, clearing it
    pub fn take_storage_warning(&mut self) -> Option<String> {
        self.storage_warning.take()
    }

    /// Switch to a named persona, replacing or inserting the system message
    pub fn set_persona(&mut self, key: &str) -> Result<()> {
        let (persona, _) = self.personas.get(key)?;
        self.apply_persona(persona);
        Ok(())
    }

    /// Store a custom persona text and switch to it
    pub fn set_custom_persona(&mut self, text: &str) -> Result<()> {
        self.personas.set_custom(text)?;
        self.apply_persona(Persona::Custom);
        Ok(())
    }

    fn apply_persona(&mut self, persona: Persona) {
        self.persona = persona;
        self.log.set_system_prompt(self.personas.prompt(persona));
        debug!(persona = %persona, "Persona switched");
    }

    /// Send a prompt and append the assistant's reply.
    ///
    /// On a completion failure the user message stays in the log without a
    /// reply, so the next successful call resends the same context.
    pub async fn submit(&mut self, prompt: &str, options: SubmitOptions) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(ChatError::EmptyMessage("Prompt"));
        }

        let temperature = options.temperature.unwrap_or(self.config.temperature);
        let max_tokens = options.max_tokens.unwrap_or(self.config.max_tokens);
        check_temperature(temperature)?;
        check_max_tokens(max_tokens)?;
        let model = options.model.unwrap_or_else(|| self.config.model.clone());

        if let Some(limiter) = self.rate_limiter.as_mut() {
            limiter.check(Instant::now())?;
        }

        self.log.push(Message::user(prompt));
        let enforcement = self.budget.enforce(&mut self.log, self.config.token_budget, &model);
        if enforcement.evicted > 0 {
            info!(
                evicted = enforcement.evicted,
                total_tokens = enforcement.total_tokens,
                budget = enforcement.budget,
                "Trimmed conversation to fit token budget"
            );
        }

        let request = CompletionRequest {
            messages: self.log.messages(),
            model: &model,
            temperature,
            max_tokens,
        };

        let reply = match self.client.complete(request, &self.credential).await {
            Ok(reply) => reply,
            Err(e) => {
                match &e {
                    ChatError::Authentication(_) => warn!("Completion credential rejected"),
                    other => error!(error = %other, "An error occurred while generating a response"),
                }
                return Err(e);
            }
        };

        self.log.push(Message::assistant(reply.clone()));
        self.persist();
        Ok(reply)
    }

    /// Replace the log with the current persona's system message and persist
    pub fn reset(&mut self) {
        self.log = ConversationLog::seeded(self.personas.prompt(self.persona));
        info!(persona = %self.persona, "Conversation reset");
        self.persist();
    }

    /// Swap the credential used by later `submit` calls
    pub fn update_credential(&mut self, credential: SecretString) {
        self.credential = self.resolver.resolve(credential);
        debug!("Credential updated");
    }

    /// Wrap for shared use across tasks
    pub fn into_shared(self) -> SharedController {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    fn persist(&mut self) {
        match self.store.save(&self.history_path, &self.log) {
            Ok(()) => self.storage_warning = None,
            Err(e) => {
                warn!(error = %e, "Conversation continues without persistence");
                METRICS.record_history_save_failure();
                self.storage_warning = Some(e.to_string());
            }
        }
    }
}
