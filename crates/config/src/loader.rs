use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::BotConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "chatbridge.toml",
    "chatbridge.yaml",
    "chatbridge.yml",
    "chatbridge.json",
];

pub const TELEGRAM_TOKEN_ENV: &str = "CHATBRIDGE_TELEGRAM_TOKEN";
pub const OPENAI_TOKEN_ENV: &str = "CHATBRIDGE_OPENAI_TOKEN";
pub const ADMIN_ID_ENV: &str = "CHATBRIDGE_ADMIN_ID";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<BotConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Parse raw config text, picking the format from the file extension.
pub fn parse_config(raw: &str, path: &Path) -> Result<BotConfig> {
    match extension(path).as_str() {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

/// Find the first config file in standard locations.
///
/// Search order:
/// 1. `./chatbridge.{toml,yaml,yml,json}`
/// 2. `<user config dir>/chatbridge.{toml,yaml,yml,json}`
pub fn discover_config_path() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Like [`discover_config_path`], but reports what was searched on failure.
pub fn require_config_path() -> Result<PathBuf> {
    discover_config_path().ok_or_else(|| Error::NotFound {
        searched: CONFIG_FILENAMES.join(", "),
    })
}

/// Returns the user-global config directory (`~/.config/chatbridge/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "chatbridge").map(|d| d.config_dir().to_path_buf())
}

/// Directory holding chat state: the configured one, else the platform data dir,
/// else `./data`.
pub fn data_dir(config: &BotConfig) -> PathBuf {
    if let Some(dir) = &config.data_dir {
        return dir.clone();
    }
    directories::ProjectDirs::from("", "", "chatbridge")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Apply `CHATBRIDGE_*` environment overrides on top of file values.
pub fn apply_env_overrides(config: &mut BotConfig) {
    apply_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_overrides_with(config: &mut BotConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(token) = lookup(TELEGRAM_TOKEN_ENV).filter(|v| !v.is_empty()) {
        config.telegram_token = Secret::new(token);
    }
    if let Some(token) = lookup(OPENAI_TOKEN_ENV).filter(|v| !v.is_empty()) {
        config.openai_token = Secret::new(token);
    }
    if let Some(raw) = lookup(ADMIN_ID_ENV) {
        match raw.trim().parse::<i64>() {
            Ok(id) => config.admin_id = Some(id),
            Err(e) => warn!(value = %raw, error = %e, "ignoring invalid {ADMIN_ID_ENV}"),
        }
    }
}

/// Serialize `config` in the format implied by `path` and atomically replace the file.
pub fn save_config(path: &Path, config: &BotConfig) -> Result<()> {
    let rendered = match extension(path).as_str() {
        "toml" => toml::to_string_pretty(config)?,
        "yaml" | "yml" => serde_yaml::to_string(config)?,
        "json" => serde_json::to_string_pretty(config)?,
        other => {
            return Err(Error::UnsupportedFormat {
                extension: other.to_string(),
            });
        },
    };
    write_atomic(path, &rendered)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

/// Set a single top-level key in the config file, leaving everything else
/// (including `${ENV}` placeholders) as written.
///
/// A missing file is created containing just that key.
pub fn update_config_value(path: &Path, key: &str, value: serde_json::Value) -> Result<()> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(Error::Read {
                path: path.to_path_buf(),
                source,
            });
        },
    };

    let rendered = match extension(path).as_str() {
        "toml" => {
            let mut table: toml::Table = toml::from_str(&raw)?;
            let value = toml::Value::try_from(value)?;
            table.insert(key.to_string(), value);
            toml::to_string_pretty(&table)?
        },
        "yaml" | "yml" => {
            let mut doc: serde_yaml::Value = if raw.trim().is_empty() {
                serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
            } else {
                serde_yaml::from_str(&raw)?
            };
            let map = doc
                .as_mapping_mut()
                .context("config root must be a mapping")?;
            map.insert(
                serde_yaml::Value::String(key.to_string()),
                serde_yaml::to_value(value)?,
            );
            serde_yaml::to_string(&doc)?
        },
        "json" => {
            let mut doc: serde_json::Value = if raw.trim().is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(&raw)?
            };
            let map = doc
                .as_object_mut()
                .context("config root must be an object")?;
            map.insert(key.to_string(), value);
            serde_json::to_string_pretty(&doc)?
        },
        other => {
            return Err(Error::UnsupportedFormat {
                extension: other.to_string(),
            });
        },
    };

    write_atomic(path, &rendered)?;
    debug!(path = %path.display(), key, "updated config key");
    Ok(())
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| Error::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp = path.with_extension(format!("{}.tmp", extension(path)));
    std::fs::write(&tmp, contents).map_err(|source| Error::Write {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("toml")
        .to_ascii_lowercase()
}
