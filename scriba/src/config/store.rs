//! Config storage: a trait seam plus the `.env`-backed implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{AppConfig, NamingMode, OutputMode};
use crate::Result;

const KEY_DEEPGRAM_API_KEY: &str = "DEEPGRAM_API_KEY";
const KEY_SERVICE_ACCOUNT: &str = "GOOGLE_SERVICE_ACCOUNT_JSON";
const KEY_DRIVE_FOLDER: &str = "DRIVE_FOLDER_ID";
const KEY_NAMING_MODE: &str = "NAMING_MODE";
const KEY_PREFIX: &str = "PREFIX";
const KEY_MARKDOWN_DIR: &str = "MARKDOWN_OUTPUT_DIR";
const KEY_OUTPUT_MODE: &str = "OUTPUT_MODE";

/// Interface for loading and saving app config.
pub trait ConfigStore: Send + Sync {
    /// Load config, falling back to defaults for missing keys.
    fn load(&self) -> Result<AppConfig>;
    /// Persist config.
    fn save(&self, config: &AppConfig) -> Result<()>;
}

/// Config store that reads and writes a `.env` file.
pub struct EnvConfigStore {
    env_path: PathBuf,
}

impl EnvConfigStore {
    pub fn new(env_path: impl Into<PathBuf>) -> Self {
        Self {
            env_path: env_path.into(),
        }
    }

    fn read_env(&self) -> Result<HashMap<String, String>> {
        let mut values = HashMap::new();
        if !self.env_path.exists() {
            return Ok(values);
        }
        for item in dotenvy::from_path_iter(&self.env_path)
            .map_err(|e| crate::Error::config(format!("Cannot read {:?}: {}", self.env_path, e)))?
        {
            let (key, value) = item.map_err(|e| {
                crate::Error::config(format!("Malformed entry in {:?}: {}", self.env_path, e))
            })?;
            values.insert(key, value);
        }
        Ok(values)
    }
}

impl Default for EnvConfigStore {
    fn default() -> Self {
        Self::new(".env")
    }
}

impl ConfigStore for EnvConfigStore {
    fn load(&self) -> Result<AppConfig> {
        let env = self.read_env()?;
        let defaults = AppConfig::default();

        let naming_mode = match env.get(KEY_NAMING_MODE).map(String::as_str) {
            Some("original") => NamingMode::Original,
            _ => NamingMode::Sequential,
        };
        let output_mode_override = env
            .get(KEY_OUTPUT_MODE)
            .and_then(|v| OutputMode::parse(v));

        Ok(AppConfig {
            deepgram_api_key: env.get(KEY_DEEPGRAM_API_KEY).cloned().unwrap_or_default(),
            google_service_account_json: env.get(KEY_SERVICE_ACCOUNT).cloned().unwrap_or_default(),
            drive_folder_id: env.get(KEY_DRIVE_FOLDER).cloned().unwrap_or_default(),
            naming_mode,
            prefix: env.get(KEY_PREFIX).cloned().unwrap_or(defaults.prefix),
            markdown_output_dir: env
                .get(KEY_MARKDOWN_DIR)
                .cloned()
                .unwrap_or(defaults.markdown_output_dir),
            output_mode_override,
        })
    }

    fn save(&self, config: &AppConfig) -> Result<()> {
        let mut entries = vec![
            (KEY_DEEPGRAM_API_KEY, config.deepgram_api_key.clone()),
            (
                KEY_SERVICE_ACCOUNT,
                config.google_service_account_json.clone(),
            ),
            (KEY_DRIVE_FOLDER, config.drive_folder_id.clone()),
            (KEY_NAMING_MODE, config.naming_mode.as_str().to_string()),
            (KEY_PREFIX, config.prefix.clone()),
            (KEY_MARKDOWN_DIR, config.markdown_output_dir.clone()),
        ];
        if let Some(mode) = config.output_mode_override {
            entries.push((KEY_OUTPUT_MODE, mode.as_str().to_string()));
        }
        write_env_file(&self.env_path, &entries)
    }
}

/// Rewrite `path`, replacing managed keys in place and keeping unrelated lines.
fn write_env_file(path: &Path, entries: &[(&str, String)]) -> Result<()> {
    let existing = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut written: Vec<&str> = Vec::new();
    let mut lines: Vec<String> = Vec::new();

    for line in existing.lines() {
        let key = line.split('=').next().unwrap_or("").trim();
        if let Some((name, value)) = entries.iter().find(|(name, _)| *name == key) {
            lines.push(format!("{}={}", name, value));
            written.push(*name);
        } else {
            lines.push(line.to_string());
        }
    }
    for (name, value) in entries {
        if !written.contains(name) {
            lines.push(format!("{}={}", name, value));
        }
    }

    std::fs::write(path, lines.join("\n") + "\n")?;
    Ok(())
}
