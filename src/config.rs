use crate::letters::{LetterPolicy, FALLBACK_LETTER, UNDETERMINED_LETTER};
use crate::model::GradeCutoff;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_ENV: &str = "GRADEBOOKD_CONFIG";
const MAX_DISPLAY_DECIMALS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub undetermined_letter: String,
    pub fallback_letter: String,
    pub display_decimals: u32,
    /// Used whenever a request carries no cutoffs of its own.
    pub default_cutoffs: Vec<GradeCutoff>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undetermined_letter: UNDETERMINED_LETTER.to_string(),
            fallback_letter: FALLBACK_LETTER.to_string(),
            display_decimals: 1,
            default_cutoffs: vec![
                GradeCutoff::new("A", 90.0),
                GradeCutoff::new("B", 80.0),
                GradeCutoff::new("C", 70.0),
                GradeCutoff::new("D", 60.0),
                GradeCutoff::new("F", 0.0),
            ],
        }
    }
}

impl EngineConfig {
    pub fn letter_policy(&self) -> LetterPolicy<'_> {
        LetterPolicy {
            undetermined: &self.undetermined_letter,
            fallback: &self.fallback_letter,
        }
    }

    pub fn display_decimals(&self) -> u32 {
        self.display_decimals.min(MAX_DISPLAY_DECIMALS)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg: EngineConfig = serde_json::from_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(cfg)
    }

    /// Reads the file named by `GRADEBOOKD_CONFIG`, if set.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let Some(path) = std::env::var_os(CONFIG_ENV) else {
            return Ok(None);
        };
        if path.is_empty() {
            return Ok(None);
        }
        Self::load(Path::new(&path)).map(Some)
    }

    /// Merges the keys present in `patch` over the current values. On error
    /// the config is left untouched.
    pub fn apply_update(&mut self, patch: &serde_json::Value) -> anyhow::Result<()> {
        let Some(patch) = patch.as_object() else {
            anyhow::bail!("config update must be an object");
        };
        let mut merged = serde_json::to_value(&*self)?;
        let Some(fields) = merged.as_object_mut() else {
            anyhow::bail!("config did not serialize to an object");
        };
        for (key, value) in patch {
            if !fields.contains_key(key) {
                anyhow::bail!("unknown config key: {}", key);
            }
            fields.insert(key.clone(), value.clone());
        }
        let next: EngineConfig =
            serde_json::from_value(merged).context("invalid config value")?;
        *self = next;
        Ok(())
    }
}
