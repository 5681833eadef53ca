use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use chatbridge_config::{
    BotConfig, Severity, ValidationResult, apply_env_overrides, config_dir, load_config,
    require_config_path, save_config, validate,
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// The explicit `--config` path, else the first discovered config file.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(require_config_path()?),
    }
}

/// Load a config file with environment overrides applied, and validate it.
pub fn load_checked(path: &Path) -> Result<(BotConfig, ValidationResult)> {
    let mut config =
        load_config(path).with_context(|| format!("loading {}", path.display()))?;
    apply_env_overrides(&mut config);
    let report = validate(&config);
    Ok((config, report))
}

pub fn check(explicit: Option<PathBuf>) -> Result<()> {
    let path = resolve_config_path(explicit)?;
    eprintln!("Checking {}\n", path.display());

    let (config, report) = load_checked(&path)?;

    for d in &report.diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };
        eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
    }

    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);
    if !report.diagnostics.is_empty() {
        eprintln!();
    }

    if errors > 0 {
        bail!("{errors} error(s), {warnings} warning(s)");
    }
    if warnings == 0 {
        eprintln!("No issues found.\n");
    } else {
        eprintln!("{warnings} warning(s)\n");
    }
    println!("{}", config.summary());
    Ok(())
}

/// Write a config file with default values. Refuses to overwrite.
pub fn init(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let path = match explicit {
        Some(path) => path,
        None => config_dir()
            .context("no user config directory on this platform, pass --config")?
            .join("chatbridge.toml"),
    };
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    save_config(&path, &BotConfig::default())?;
    eprintln!(
        "Wrote {}. Fill in telegram_token and openai_token, then run `chatbridge check-config`.",
        path.display()
    );
    Ok(path)
}
