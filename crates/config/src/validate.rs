//! Semantic validation of a loaded [`BotConfig`].

use secrecy::ExposeSecret;

use crate::schema::BotConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "dispatch.workers".
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

/// Check the config for values the bot cannot run with.
pub fn validate(config: &BotConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.telegram_token.expose_secret().trim().is_empty() {
        result.push(Severity::Error, "telegram_token", "bot token is empty");
    }
    if config.openai_token.expose_secret().trim().is_empty() {
        result.push(Severity::Error, "openai_token", "backend API key is empty");
    }
    if config.dispatch.workers == 0 {
        result.push(
            Severity::Error,
            "dispatch.workers",
            "at least one worker is required",
        );
    }
    if config.dispatch.queue_capacity == 0 {
        result.push(
            Severity::Error,
            "dispatch.queue_capacity",
            "queue capacity must be positive",
        );
    }
    if !(0.0..=1.2).contains(&config.chat.temperature) {
        result.push(
            Severity::Error,
            "chat.temperature",
            format!("{} is outside 0.0..=1.2", config.chat.temperature),
        );
    }
    if config.chat.model.trim().is_empty() {
        result.push(Severity::Error, "chat.model", "model identifier is empty");
    }
    if config.timeout_value == 0 {
        result.push(
            Severity::Warning,
            "timeout_value",
            "a zero poll timeout turns long polling into busy polling",
        );
    }
    if config.admin().is_none() && !config.authorized_user_ids.is_empty() {
        result.push(
            Severity::Warning,
            "admin_id",
            "no administrator: rejected senders go unreported and the allow-list cannot be edited from chat",
        );
    }
    if let Some(admin) = config.admin()
        && !config.authorized_user_ids.is_empty()
        && !config.authorized_user_ids.contains(&admin)
    {
        result.push(
            Severity::Warning,
            "authorized_user_ids",
            format!("administrator {admin} is not on the allow-list and will be rejected"),
        );
    }

    result
}
