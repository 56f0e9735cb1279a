// Runtime configuration read from the environment

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const ENV_DATA_DIR: &str = "EXPENSE_DASHBOARD_DATA_DIR";
pub const ENV_BACKEND: &str = "EXPENSE_DASHBOARD_BACKEND";
pub const ENV_REMOTE_DB: &str = "EXPENSE_DASHBOARD_REMOTE_DB";
pub const ENV_ADDR: &str = "EXPENSE_DASHBOARD_ADDR";

const APP_DIR_NAME: &str = "expense-dashboard";
const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Which persistence variant the dashboard talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Local,
    Remote,
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "remote" => Ok(Backend::Remote),
            other => Err(Error::Config(format!(
                "{} must be 'local' or 'remote', got {:?}",
                ENV_BACKEND, other
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Local => f.write_str("local"),
            Backend::Remote => f.write_str("remote"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub backend: Backend,
    pub remote_db: PathBuf,
    pub addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = match get(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let backend = match get(ENV_BACKEND) {
            Some(raw) => raw.parse()?,
            None => Backend::default(),
        };

        let remote_db = get(ENV_REMOTE_DB)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("remote.sqlite"));

        let raw_addr = get(ENV_ADDR).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = raw_addr.trim().parse::<SocketAddr>().map_err(|err| {
            Error::Config(format!("{} is not a socket address ({}): {}", ENV_ADDR, raw_addr, err))
        })?;

        Ok(Config {
            data_dir,
            backend,
            remote_db,
            addr,
        })
    }

    /// Database file of the local variant
    pub fn local_db(&self) -> PathBuf {
        self.data_dir.join("local.sqlite")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("expense-dashboard.log")
    }
}

fn default_data_dir() -> Result<PathBuf> {
    let base = dirs_next::data_local_dir()
        .ok_or_else(|| Error::Config("no local data directory on this platform".to_string()))?;
    Ok(base.join(APP_DIR_NAME))
}
