use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::query::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, PageLimits};

pub const ENV_PREFIX: &str = "JOBTRACK_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address the API server listens on
    pub bind: SocketAddr,
    /// SQLite file; defaults to the platform data directory
    pub database_path: Option<PathBuf>,
    pub default_page_limit: u32,
    pub max_page_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_path: None,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: MAX_PAGE_LIMIT,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file, then `JOBTRACK_*` env vars.
    ///
    /// Without an explicit path, `config.toml` in the user config dir is read
    /// if it exists. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match path {
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(dirs) = project_dirs() {
                    figment = figment.merge(Toml::file(dirs.config_dir().join("config.toml")));
                }
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let config: Config = figment.extract().context("failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_page_limit == 0 {
            bail!("max_page_limit must be greater than 0");
        }
        if !(1..=self.max_page_limit).contains(&self.default_page_limit) {
            bail!(
                "default_page_limit must be between 1 and max_page_limit ({})",
                self.max_page_limit
            );
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        // Use XDG data directory or fallback
        match project_dirs() {
            Some(dirs) => dirs.data_dir().join("jobtrack.db"),
            None => PathBuf::from("jobtrack.db"),
        }
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_limit: self.default_page_limit,
            max_limit: self.max_page_limit,
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "jobtrack")
}
