use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{errors::Error, Result};

/// Default UTF-8 byte budget for sender aliases and member labels.
pub const DEFAULT_ALIAS_BYTE_LIMIT: usize = 64;

/// Fixed input pattern for the expiration timestamp ("day.month.year hour:minute:second").
pub const DEFAULT_DATETIME_PATTERN: &str = "%d.%m.%Y %H:%M:%S";

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub data_dir: PathBuf,

    // Initial admin seeded into the directory on first start.
    pub admin_username: Option<String>,
    pub admin_label: Option<String>,

    // Initial expiration timestamp, in `datetime_pattern` format.
    pub initial_expiration: Option<String>,

    // Validation limits
    pub alias_byte_limit: usize,
    pub datetime_pattern: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let data_dir = env_path("FENCES_DATA_DIR").unwrap_or_else(|| PathBuf::from("/tmp/fences"));
        fs::create_dir_all(&data_dir)?;

        let admin_username = env_str("ADMIN_USERNAME").and_then(non_empty);
        let admin_label = env_str("ADMIN_LABEL").and_then(non_empty);
        if admin_username.is_some() != admin_label.is_some() {
            return Err(Error::Config(
                "ADMIN_USERNAME and ADMIN_LABEL must be set together".to_string(),
            ));
        }

        let initial_expiration = env_str("INITIAL_EXPIRATION").and_then(non_empty);

        let alias_byte_limit = env_usize("ALIAS_BYTE_LIMIT").unwrap_or(DEFAULT_ALIAS_BYTE_LIMIT);
        let datetime_pattern =
            env_str("DATETIME_PATTERN").unwrap_or_else(|| DEFAULT_DATETIME_PATTERN.to_string());

        Ok(Self {
            bot_token,
            data_dir,
            admin_username,
            admin_label,
            initial_expiration,
            alias_byte_limit,
            datetime_pattern,
        })
    }
}

impl Default for Config {
    /// Config for tests and ephemeral runs; no transport credentials.
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            data_dir: PathBuf::from("/tmp/fences"),
            admin_username: None,
            admin_label: None,
            initial_expiration: None,
            alias_byte_limit: DEFAULT_ALIAS_BYTE_LIMIT,
            datetime_pattern: DEFAULT_DATETIME_PATTERN.to_string(),
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
