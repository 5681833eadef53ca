//! Config schema types for the bot, its backends, and the dispatch engine.

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant based on an OpenAI GPT \
     language model. You always try to help and answer with relevant information.";

/// Root configuration document.
///
/// Read at startup and rewritten whenever the allow-list changes.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub telegram_token: Secret<String>,

    /// API key for the OpenAI-compatible backend.
    #[serde(serialize_with = "serialize_secret")]
    pub openai_token: Secret<String>,

    /// Base URL of the OpenAI-compatible API (without trailing slash).
    pub openai_base_url: String,

    /// Privileged administrator. Receives rejection notices, may run admin
    /// commands and bypasses the image cooldown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<i64>,

    /// Allow-list of sender ids. Empty means the bot is public.
    pub authorized_user_ids: Vec<i64>,

    /// Number of prompt/response entries kept per chat. `0` keeps everything.
    pub max_messages: usize,

    /// Long-poll timeout in seconds.
    pub timeout_value: u32,

    /// HTTP timeout for backend calls, in seconds.
    pub request_timeout_secs: u64,

    /// Optional override of the command menu shown by Telegram clients.
    pub command_menu: Vec<String>,

    /// Where chat state is stored. Defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    pub dispatch: DispatchConfig,
    pub chat: ChatDefaults,
    pub image: ImageConfig,
}

impl BotConfig {
    /// The administrator id, ignoring non-positive placeholders such as `0`.
    #[must_use]
    pub fn admin(&self) -> Option<i64> {
        self.admin_id.filter(|id| *id > 0)
    }

    /// Short, secret-free description used by `/reload` and `check-config`.
    #[must_use]
    pub fn summary(&self) -> String {
        let admin = self
            .admin()
            .map_or_else(|| "none".to_string(), |id| id.to_string());
        let users = if self.authorized_user_ids.is_empty() {
            "public".to_string()
        } else {
            self.authorized_user_ids
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "admin: {admin}\nauthorized users: {users}\nmax messages: {}\npoll timeout: {}s\nworkers: {} (queue {})\nmodel: {} (temperature {:.1})\nimage cooldown: {}s",
            self.max_messages,
            self.timeout_value,
            self.dispatch.workers,
            self.dispatch.queue_capacity,
            self.chat.model,
            self.chat.temperature,
            self.image.cooldown_secs,
        )
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("telegram_token", &"[REDACTED]")
            .field("openai_token", &"[REDACTED]")
            .field("openai_base_url", &self.openai_base_url)
            .field("admin_id", &self.admin_id)
            .field("authorized_user_ids", &self.authorized_user_ids)
            .field("max_messages", &self.max_messages)
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_token: Secret::new(String::new()),
            openai_token: Secret::new(String::new()),
            openai_base_url: "https://api.openai.com/v1".into(),
            admin_id: None,
            authorized_user_ids: Vec::new(),
            max_messages: 20,
            timeout_value: 30,
            request_timeout_secs: 120,
            command_menu: Vec::new(),
            data_dir: None,
            dispatch: DispatchConfig::default(),
            chat: ChatDefaults::default(),
            image: ImageConfig::default(),
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Sizing of the dispatch queue and worker pool. Fixed for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
    pub workers: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            workers: 10,
        }
    }
}

/// Settings stamped onto every newly created conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatDefaults {
    pub temperature: f32,
    pub model: String,
    pub use_markdown: bool,
    pub system_prompt: String,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            model: "gpt-3.5-turbo".into(),
            use_markdown: false,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
        }
    }
}

/// Image generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ImageConfig {
    /// Per-chat cooldown between two generations.
    pub cooldown_secs: u64,
    pub size: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 900,
            size: "512x512".into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = BotConfig::default();
        assert_eq!(cfg.dispatch.queue_capacity, 100);
        assert_eq!(cfg.dispatch.workers, 10);
        assert_eq!(cfg.image.cooldown_secs, 900);
        assert_eq!(cfg.chat.model, "gpt-3.5-turbo");
        assert!(cfg.authorized_user_ids.is_empty());
        assert!(cfg.admin().is_none());
    }

    #[test]
    fn deserialize_from_toml_keeps_defaults_for_missing_fields() {
        let raw = r#"
            telegram_token = "123:ABC"
            openai_token = "sk-test"
            admin_id = 42
            authorized_user_ids = [42, 7]

            [dispatch]
            workers = 4
        "#;
        let cfg: BotConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.telegram_token.expose_secret(), "123:ABC");
        assert_eq!(cfg.admin(), Some(42));
        assert_eq!(cfg.authorized_user_ids, vec![42, 7]);
        assert_eq!(cfg.dispatch.workers, 4);
        assert_eq!(cfg.dispatch.queue_capacity, 100);
        assert_eq!(cfg.max_messages, 20);
    }

    #[test]
    fn zero_admin_id_means_no_admin() {
        let cfg = BotConfig {
            admin_id: Some(0),
            ..Default::default()
        };
        assert!(cfg.admin().is_none());
    }

    #[test]
    fn debug_redacts_tokens() {
        let cfg = BotConfig {
            telegram_token: Secret::new("super-secret".into()),
            ..Default::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn summary_reports_public_mode() {
        let summary = BotConfig::default().summary();
        assert!(summary.contains("authorized users: public"));
        assert!(summary.contains("admin: none"));
    }

    #[test]
    fn serialize_roundtrip_keeps_secrets() {
        let cfg = BotConfig {
            openai_token: Secret::new("sk-1".into()),
            authorized_user_ids: vec![1, 2],
            ..Default::default()
        };
        let raw = toml::to_string_pretty(&cfg).unwrap();
        let back: BotConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back.openai_token.expose_secret(), "sk-1");
        assert_eq!(back.authorized_user_ids, vec![1, 2]);
    }
}
