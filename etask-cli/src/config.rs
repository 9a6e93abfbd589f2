use anyhow::{Context, Result};
use chrono_tz::Tz;
use clap::Subcommand;
use etask_core::{Preferences, WeekStart, time::parse_timezone};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_etask_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub preferences: PreferencesSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub base_url: String,
    /// Bearer token; empty means unauthenticated.
    pub token: String,
    /// Default user filter for listings; 0 means none.
    pub user_id: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            token: String::new(),
            user_id: 0,
        }
    }
}

impl BackendSection {
    pub fn token(&self) -> Option<&str> {
        Some(self.token.as_str()).filter(|t| !t.is_empty())
    }

    pub fn user_filter(&self) -> Option<u64> {
        Some(self.user_id).filter(|id| *id != 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesSection {
    pub auto_complete: bool,
    pub week_start: WeekStart,
    /// IANA name; calendar days are compared in this zone.
    pub timezone: String,
}

impl Default for PreferencesSection {
    fn default() -> Self {
        let prefs = Preferences::default();
        Self {
            auto_complete: prefs.auto_complete,
            week_start: prefs.week_start,
            timezone: "UTC".to_string(),
        }
    }
}

impl PreferencesSection {
    pub fn preferences(&self) -> Preferences {
        Preferences {
            auto_complete: self.auto_complete,
            week_start: self.week_start,
        }
    }

    pub fn tz(&self) -> Result<Tz> {
        Ok(parse_timezone(&self.timezone)?)
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a default config.toml if none exists
    Init,
    /// Print the effective configuration
    Show,
}

pub fn run(cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Init => init_config(),
        ConfigCommand::Show => {
            let cfg = load_config()?;
            print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            Ok(())
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_etask_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(s).context("parse config.toml")?;
    cfg.preferences.tz()?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
