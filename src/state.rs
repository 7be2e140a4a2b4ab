use anyhow::{Context, Result};
use std::fs;

use crate::access::OwnedRecords;
use crate::config::Config;
use crate::models::{Project, Skill};
use crate::user_storage::UserStorage;

pub struct AppState {
    pub skills: OwnedRecords<Skill>,
    pub projects: OwnedRecords<Project>,
    pub users: UserStorage,
    pub config: Config,
}

impl AppState {
    /// Open every collection under `config.data_dir`, creating the directory
    /// on first start.
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Failed to create data directory {}", config.data_dir.display())
        })?;

        Ok(Self {
            skills: OwnedRecords::open(&config.data_dir).context("Failed to open skills")?,
            projects: OwnedRecords::open(&config.data_dir).context("Failed to open projects")?,
            users: UserStorage::open(&config.data_dir).context("Failed to open users")?,
            config,
        })
    }
}
