//! The authorization gate and the allow-list it reads.

use std::path::PathBuf;

use {
    chatbridge_channels::{Sender, gating},
    chatbridge_config::{BotConfig, apply_env_overrides, load_config, update_config_value},
    tokio::sync::RwLock,
    tracing::{info, warn},
};

use crate::error::{Error, Result};

const ALLOW_LIST_KEY: &str = "authorized_user_ids";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct AccessState {
    allow_list: Vec<i64>,
    admin: Option<i64>,
}

/// Reason an inbound message was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    NotOnAllowlist,
}

impl std::fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOnAllowlist => write!(f, "user not on allowlist"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowListChange {
    Added(i64),
    AlreadyPresent(i64),
    Removed(i64),
    NotFound(i64),
}

impl AllowListChange {
    /// Reply shown to the administrator.
    #[must_use]
    pub fn describe(self) -> String {
        match self {
            Self::Added(id) => format!("User successfully added: {id}"),
            Self::AlreadyPresent(id) => format!("User already added: {id}"),
            Self::Removed(id) => format!("User successfully removed: {id}"),
            Self::NotFound(id) => format!("User not found: {id}"),
        }
    }
}

/// Live allow-list and administrator identity.
///
/// Reads for gating take the read lock. Every mutation holds the write lock
/// across "compute, persist, commit", so concurrent admin commands never
/// interleave and the in-memory list only changes once the config file
/// accepted the new value.
pub struct AccessControl {
    state: RwLock<AccessState>,
    config_path: Option<PathBuf>,
}

impl AccessControl {
    pub fn new(allow_list: Vec<i64>, admin: Option<i64>, config_path: Option<PathBuf>) -> Self {
        Self {
            state: RwLock::new(AccessState {
                allow_list,
                admin: admin.filter(|id| *id > 0),
            }),
            config_path,
        }
    }

    pub fn from_config(config: &BotConfig, config_path: Option<PathBuf>) -> Self {
        Self::new(
            config.authorized_user_ids.clone(),
            config.admin(),
            config_path,
        )
    }

    pub async fn check(&self, sender: &Sender) -> std::result::Result<(), AccessDenied> {
        let state = self.state.read().await;
        if gating::permit(sender.id, &state.allow_list) {
            Ok(())
        } else {
            Err(AccessDenied::NotOnAllowlist)
        }
    }

    pub async fn admin(&self) -> Option<i64> {
        self.state.read().await.admin
    }

    pub async fn is_admin(&self, sender_id: i64) -> bool {
        self.admin().await == Some(sender_id)
    }

    pub async fn allow_list(&self) -> Vec<i64> {
        self.state.read().await.allow_list.clone()
    }

    pub async fn add_user(&self, id: i64) -> Result<AllowListChange> {
        let mut state = self.state.write().await;
        if state.allow_list.contains(&id) {
            return Ok(AllowListChange::AlreadyPresent(id));
        }

        let mut next = state.allow_list.clone();
        next.push(id);
        self.persist(&next).await?;
        state.allow_list = next;
        info!(user_id = id, "added user to allow-list");
        Ok(AllowListChange::Added(id))
    }

    pub async fn remove_user(&self, id: i64) -> Result<AllowListChange> {
        let mut state = self.state.write().await;
        if !state.allow_list.contains(&id) {
            return Ok(AllowListChange::NotFound(id));
        }

        let next: Vec<i64> = state
            .allow_list
            .iter()
            .copied()
            .filter(|u| *u != id)
            .collect();
        self.persist(&next).await?;
        state.allow_list = next;
        info!(user_id = id, "removed user from allow-list");
        Ok(AllowListChange::Removed(id))
    }

    /// Re-read the config file and apply its allow-list and administrator.
    pub async fn reload(&self) -> Result<BotConfig> {
        let path = self
            .config_path
            .clone()
            .ok_or_else(|| Error::message("no configuration file to reload"))?;

        let mut state = self.state.write().await;
        let mut config = tokio::task::spawn_blocking(move || load_config(&path)).await??;
        apply_env_overrides(&mut config);

        *state = AccessState {
            allow_list: config.authorized_user_ids.clone(),
            admin: config.admin(),
        };
        info!(
            users = state.allow_list.len(),
            admin = ?state.admin,
            "reloaded access control"
        );
        Ok(config)
    }

    async fn persist(&self, allow_list: &[i64]) -> Result<()> {
        let Some(path) = self.config_path.clone() else {
            warn!("no configuration file, allow-list change is kept in memory only");
            return Ok(());
        };
        let value = serde_json::json!(allow_list);
        tokio::task::spawn_blocking(move || update_config_value(&path, ALLOW_LIST_KEY, value))
            .await??;
        Ok(())
    }
}
