//! Runtime configuration.
//!
//! Values come from the process environment (the CLI loads `.env` first with
//! `dotenvy`). Unset variables fall back to devnet defaults.

use std::{path::PathBuf, str::FromStr};

use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    pubkey::Pubkey,
};

use crate::{
    constants::{DEFAULT_CLUSTER_URL, DEFAULT_COMMITMENT, DEFAULT_STORAGE_GATEWAY},
    error::{Error, Result},
    PROGRAM_ID,
};

pub const ENV_CLUSTER_URL: &str = "SOLANA_TWITTER_CLUSTER_URL";
pub const ENV_COMMITMENT: &str = "SOLANA_TWITTER_COMMITMENT";
pub const ENV_PROGRAM_ID: &str = "SOLANA_TWITTER_PROGRAM_ID";
pub const ENV_STORAGE_GATEWAY: &str = "SOLANA_TWITTER_STORAGE_GATEWAY";
pub const ENV_BACKUP_PATH: &str = "SOLANA_TWITTER_BACKUP_PATH";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub cluster_url: String,
    pub commitment: CommitmentConfig,
    pub program_id: Pubkey,
    /// Base URL content addresses are resolved against
    pub storage_gateway: String,
    /// Opt-in local backup of published metadata
    pub backup_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_url: DEFAULT_CLUSTER_URL.to_string(),
            commitment: CommitmentConfig::processed(),
            program_id: PROGRAM_ID,
            storage_gateway: DEFAULT_STORAGE_GATEWAY.to_string(),
            backup_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cluster_url = lookup(ENV_CLUSTER_URL).unwrap_or(defaults.cluster_url);
        let commitment = parse_commitment(
            &lookup(ENV_COMMITMENT).unwrap_or_else(|| DEFAULT_COMMITMENT.to_string()),
        )?;
        let program_id = match lookup(ENV_PROGRAM_ID) {
            Some(raw) => Pubkey::from_str(&raw)
                .map_err(|e| Error::Config(format!("{ENV_PROGRAM_ID}={raw}: {e}")))?,
            None => defaults.program_id,
        };
        let storage_gateway = lookup(ENV_STORAGE_GATEWAY).unwrap_or(defaults.storage_gateway);
        if !storage_gateway.starts_with("http://") && !storage_gateway.starts_with("https://") {
            return Err(Error::Config(format!(
                "{ENV_STORAGE_GATEWAY} must be an http(s) URL, got {storage_gateway}"
            )));
        }
        let backup_path = lookup(ENV_BACKUP_PATH)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            cluster_url,
            commitment,
            program_id,
            storage_gateway,
            backup_path,
        })
    }
}

pub fn parse_commitment(raw: &str) -> Result<CommitmentConfig> {
    let commitment = CommitmentLevel::from_str(raw)
        .map_err(|_| Error::Config(format!("unknown commitment: {raw}")))?;
    Ok(CommitmentConfig { commitment })
}
