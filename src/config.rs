use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants;
use crate::error::{IndexerError, Result};
use crate::pipeline::normalize::{CleaningRules, FillValue};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub elasticsearch: StoreConfig,
    pub source: SourceConfig,
    pub normalize: NormalizeConfig,
    pub facet: FacetConfig,
}

/// `[elasticsearch]` connection settings. Credentials are forwarded unchanged.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub accept_invalid_certs: bool,
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            accept_invalid_certs: false,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[serde(alias = "iso-8859-1", alias = "latin-1")]
    Latin1,
    #[serde(alias = "utf-8")]
    Utf8,
}

/// `[source]` input file settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub encoding: TextEncoding,
    pub na_values: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_SOURCE_FILE),
            encoding: TextEncoding::Latin1,
            na_values: constants::DEFAULT_NA_VALUES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// What to do with a row whose document has no identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingIdPolicy {
    /// Stop the ingestion pass at the first such row
    Abort,
    /// Record the row as skipped and continue with the next one
    Skip,
}

/// `[normalize]` cleaning rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub id_column: String,
    pub currency_column: String,
    pub percent_column: String,
    pub missing_id: MissingIdPolicy,
    pub fills: BTreeMap<String, FillValue>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        let mut fills: BTreeMap<String, FillValue> = constants::SENTINEL_FILLED_COLUMNS
            .iter()
            .map(|c| (c.to_string(), FillValue::Text(constants::UNKNOWN_SENTINEL.to_string())))
            .collect();
        fills.insert(constants::AGE_COLUMN.to_string(), FillValue::Number(0.0));

        Self {
            id_column: constants::EMPLOYEE_ID_COLUMN.to_string(),
            currency_column: constants::ANNUAL_SALARY_COLUMN.to_string(),
            percent_column: constants::BONUS_PERCENT_COLUMN.to_string(),
            missing_id: MissingIdPolicy::Abort,
            fills,
        }
    }
}

impl NormalizeConfig {
    /// Cleaning rules for one ingestion pass, dropping `exclude_column`.
    pub fn cleaning_rules(&self, exclude_column: Option<&str>) -> CleaningRules {
        CleaningRules {
            fills: self.fills.clone(),
            currency_column: self.currency_column.clone(),
            percent_column: self.percent_column.clone(),
            exclude_column: exclude_column.map(|c| c.to_string()),
            id_column: self.id_column.clone(),
        }
    }
}

/// `[facet]` terms aggregation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FacetConfig {
    pub field: String,
    pub keyword_suffix: String,
    pub size: u32,
}

impl Default for FacetConfig {
    fn default() -> Self {
        Self {
            field: constants::DEPARTMENT_COLUMN.to_string(),
            keyword_suffix: constants::KEYWORD_SUFFIX.to_string(),
            size: constants::DEFAULT_FACET_SIZE,
        }
    }
}

impl FacetConfig {
    /// Exact-match sub-field to bucket on, e.g. `Department.keyword`.
    pub fn keyword_field(&self, field: Option<&str>) -> String {
        format!("{}{}", field.unwrap_or(&self.field), self.keyword_suffix)
    }
}

impl Config {
    /// Load configuration: built-in defaults, then the TOML file, then the
    /// environment (after reading `.env`).
    ///
    /// An explicitly given `path` must exist; without one, `config.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(constants::DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("No {} found, using built-in defaults", constants::DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IndexerError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `ES_*` and `EMPLOYEE_CSV` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ES_URL") {
            self.elasticsearch.url = url;
        }
        if let Some(username) = lookup("ES_USERNAME") {
            self.elasticsearch.username = Some(username);
        }
        if let Some(password) = lookup("ES_PASSWORD") {
            self.elasticsearch.password = Some(password);
        }
        if let Some(flag) = lookup("ES_ACCEPT_INVALID_CERTS") {
            self.elasticsearch.accept_invalid_certs = match flag.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(IndexerError::Config(format!(
                        "ES_ACCEPT_INVALID_CERTS must be true or false, got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(path) = lookup("EMPLOYEE_CSV") {
            self.source.path = PathBuf::from(path);
        }
        Ok(())
    }
}
