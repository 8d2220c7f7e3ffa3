//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "app": { "defaultOwner": "local", "defaultCurrency": "USD" },
//!   "import": {
//!     "dedupWindowDays": 1,
//!     "fallbackDescription": "Imported transaction",
//!     "profiles": { ... }
//!   }
//! }
//! ```
//! Fields Moneta does not manage are preserved when saving.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::OwnerId;

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_OWNER: &str = "local";
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_DEDUP_WINDOW_DAYS: u32 = 1;
pub const DEFAULT_FALLBACK_DESCRIPTION: &str = "Imported transaction";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    import: ImportSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_currency: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dedup_window_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fallback_description: Option<String>,
    #[serde(default)]
    profiles: HashMap<String, ImportProfile>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Moneta configuration (resolved view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub default_owner: OwnerId,
    pub default_currency: String,
    /// Days added on each side of the incoming date range when looking for duplicates
    pub dedup_window_days: u32,
    /// Description used when a statement entry carries neither memo nor name
    pub fallback_description: String,
    pub import_profiles: HashMap<String, ImportProfile>,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_owner: OwnerId::new(DEFAULT_OWNER),
            default_currency: DEFAULT_CURRENCY.to_string(),
            dedup_window_days: DEFAULT_DEDUP_WINDOW_DAYS,
            fallback_description: DEFAULT_FALLBACK_DESCRIPTION.to_string(),
            import_profiles: HashMap::new(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// The owner can be overridden with MONETA_OWNER. A missing file yields defaults;
    /// a file that exists but does not parse is an error.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings in {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        let owner = std::env::var("MONETA_OWNER")
            .ok()
            .filter(|o| !o.trim().is_empty())
            .or_else(|| raw.app.default_owner.clone())
            .unwrap_or_else(|| DEFAULT_OWNER.to_string());

        Ok(Self {
            default_owner: OwnerId::new(owner),
            default_currency: raw
                .app
                .default_currency
                .clone()
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            dedup_window_days: raw
                .import
                .dedup_window_days
                .unwrap_or(DEFAULT_DEDUP_WINDOW_DAYS),
            fallback_description: raw
                .import
                .fallback_description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FALLBACK_DESCRIPTION.to_string()),
            import_profiles: raw.import.profiles.clone(),
            _raw_settings: raw,
        })
    }

    /// Save config to the data directory
    /// Preserves other settings that Moneta doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join(SETTINGS_FILE);

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.app.default_owner = Some(self.default_owner.to_string());
        settings.app.default_currency = Some(self.default_currency.clone());
        settings.import.dedup_window_days = Some(self.dedup_window_days);
        settings.import.fallback_description = Some(self.fallback_description.clone());
        settings.import.profiles = self.import_profiles.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}

/// Saved CSV import profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProfile {
    #[serde(default)]
    pub column_mappings: ColumnMappings,
    /// Extra chrono format tried before the built-in ones
    #[serde(default)]
    pub date_format: Option<String>,
    /// Lines to drop before the header row
    #[serde(default)]
    pub skip_rows: usize,
    #[serde(default)]
    pub options: ImportOptions,
}

/// Sign handling for CSV amounts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    /// Flip signs on all amounts (credit card statements)
    #[serde(default)]
    pub flip_signs: bool,
    /// Negate positive debit values (unsigned debit columns)
    #[serde(default)]
    pub debit_negative: bool,
}

/// Column mappings for CSV import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMappings {
    pub date: String,
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub credit: Option<String>,
    #[serde(default)]
    pub debit: Option<String>,
}

impl Default for ColumnMappings {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            amount: "Amount".to_string(),
            description: Some("Description".to_string()),
            credit: None,
            debit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.default_currency, "USD");
        assert_eq!(config.dedup_window_days, 1);
        assert_eq!(config.fallback_description, "Imported transaction");
        assert!(config.import_profiles.is_empty());
    }

    #[test]
    fn test_load_and_preserve_unknown_fields() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{
                "app": { "defaultCurrency": "BRL", "theme": "dark" },
                "import": {
                    "dedupWindowDays": 3,
                    "profiles": {
                        "nubank": {
                            "columnMappings": { "date": "Data", "amount": "Valor", "description": "Descricao" },
                            "options": { "flipSigns": true }
                        }
                    }
                },
                "ui": { "compact": true }
            }"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        assert_eq!(config.default_currency, "BRL");
        assert_eq!(config.dedup_window_days, 3);
        let profile = &config.import_profiles["nubank"];
        assert_eq!(profile.column_mappings.amount, "Valor");
        assert!(profile.options.flip_signs);

        config.dedup_window_days = 2;
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(saved["app"]["theme"], "dark");
        assert_eq!(saved["ui"]["compact"], true);
        assert_eq!(saved["import"]["dedupWindowDays"], 2);
    }

    #[test]
    fn test_malformed_settings_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ not json").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
