//! Runtime settings.
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional settings file (`contracts.toml`, or whatever `CONTRACTS_CONFIG`
//! points at), then `CONTRACTS_*` environment variables. For example
//! `CONTRACTS_DATASET=/data/contracts.csv` or
//! `CONTRACTS_IDENTITY_ATTRIBUTES=cpf_assinante,nome_assinante`.

use std::path::PathBuf;

use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{ContractError, Result};
use crate::resolver::DEFAULT_PARTIAL_MATCH_CAP;

pub const DEFAULT_SETTINGS_FILE: &str = "contracts.toml";
pub const SETTINGS_FILE_VARIABLE: &str = "CONTRACTS_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub dataset: PathBuf,
    pub journal: PathBuf,
    pub attachments: PathBuf,
    pub identity_attributes: Vec<String>,
    pub primary_id: Option<String>,
    pub filename_field: String,
    pub partial_match_cap: usize,
    pub delimiter: String,
    pub bind: String,
}

impl Settings {
    /// Defaults, then the settings file, then the environment.
    pub fn load() -> Result<Self> {
        let file = std::env::var(SETTINGS_FILE_VARIABLE)
            .unwrap_or_else(|_| DEFAULT_SETTINGS_FILE.to_string());
        let config = Self::defaults(Config::builder())?
            .add_source(File::with_name(&file).required(false))
            .add_source(
                Environment::with_prefix("CONTRACTS")
                    .prefix_separator("_")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("identity_attributes"),
            )
            .build()?;
        Self::from_config(config)
    }
    pub fn defaults(builder: ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>> {
        Ok(builder
            .set_default("dataset", "contracts.csv")?
            .set_default("journal", "contracts_edits.csv")?
            .set_default("attachments", "contracts.pdf")?
            .set_default(
                "identity_attributes",
                vec!["cpf_assinante", "nome_assinante", "cnpj_assinante"],
            )?
            .set_default("primary_id", "id_contrato")?
            .set_default("filename_field", "file_name")?
            .set_default("partial_match_cap", DEFAULT_PARTIAL_MATCH_CAP as u64)?
            .set_default("delimiter", ",")?
            .set_default("bind", "127.0.0.1:5000")?)
    }
    /// Defaults only, pointed at the given files.
    pub fn with_paths(
        dataset: impl Into<PathBuf>,
        journal: impl Into<PathBuf>,
        attachments: impl Into<PathBuf>,
    ) -> Result<Self> {
        let mut settings = Self::from_config(Self::defaults(Config::builder())?.build()?)?;
        settings.dataset = dataset.into();
        settings.journal = journal.into();
        settings.attachments = attachments.into();
        Ok(settings)
    }
    pub fn from_config(config: Config) -> Result<Self> {
        let settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
    fn validate(&self) -> Result<()> {
        if self.identity_attributes.is_empty() {
            return Err(ContractError::Configuration(
                "at least one identity attribute is needed".into(),
            ));
        }
        if self.partial_match_cap == 0 {
            return Err(ContractError::Configuration(
                "partial_match_cap must be positive".into(),
            ));
        }
        if self.delimiter.len() != 1 || !self.delimiter.is_ascii() {
            return Err(ContractError::Configuration(format!(
                "delimiter '{}' is not a single byte",
                self.delimiter
            )));
        }
        Ok(())
    }
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.bytes().next().unwrap_or(b',')
    }
}
