//! Environment-driven configuration.
//!
//! Everything the tool needs comes from environment variables, optionally
//! seeded from a `.env` file in the working directory. Each loader has a
//! `from_lookup` form taking a key lookup function so it can be exercised
//! without touching the process environment.

use std::env;
use std::path::PathBuf;

use log::{debug, warn};

use crate::error::{ReconcileError, Result};

pub const USERNAME: &str = "USERNAME";
pub const PASSWORD: &str = "PASSWORD";
pub const BASE_URL: &str = "BASE_URL";
pub const AUTH_HEADER: &str = "AUTH_HEADER";
pub const PHY_INV_FACILITY_ID: &str = "PHY_INV_FACILITY_ID";
pub const PHY_INV_IS_DRAFT: &str = "PHY_INV_IS_DRAFT";
pub const PHY_INV_PROGRAM_ID: &str = "PHY_INV_PROGRAM_ID";
pub const RECONCILE_SOURCE: &str = "RECONCILE_SOURCE";
pub const LOT_UPDATE_SCOPE: &str = "LOT_UPDATE_SCOPE";
pub const FAIL_EXIT: &str = "RECONCILE_FAIL_EXIT";

/// Loads `.env` from the working directory if there is one.
///
/// Variables already set in the environment win over the file.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }
}

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Returns `true` if `key` is set to `1` or `true` (any case).
pub fn env_flag(key: &str) -> bool {
    flag_from_lookup(key, env_lookup)
}

fn flag_from_lookup<F>(key: &str, lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true"))
        .unwrap_or(false)
}

/// API credentials and the seed `Authorization` header for the token call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub base_url: String,
    pub auth_header: String,
}

// Keeps the password and header out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(ReconcileError::MissingEnv(key))
        };

        Ok(Credentials {
            username: require(USERNAME)?,
            password: require(PASSWORD)?,
            base_url: require(BASE_URL)?,
            auth_header: require(AUTH_HEADER)?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }
}

/// Loads `.env` and reads the credentials from the environment.
///
/// This is the standalone entry point for library callers. The binary loads
/// `.env` once at startup and uses [`Credentials::from_env`] instead.
///
/// Fails with [`ReconcileError::MissingEnv`] naming the first variable that
/// is absent or empty.
pub fn load_credentials() -> Result<Credentials> {
    load_dotenv();
    Credentials::from_env()
}

/// Filters for the physical inventory search. Absent values are sent empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryQuery {
    pub facility: String,
    pub is_draft: String,
    pub program: String,
}

impl InventoryQuery {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        InventoryQuery {
            facility: lookup(PHY_INV_FACILITY_ID).unwrap_or_default(),
            is_draft: lookup(PHY_INV_IS_DRAFT).unwrap_or_default(),
            program: lookup(PHY_INV_PROGRAM_ID).unwrap_or_default(),
        }
    }
}

/// Where the reference collections come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Fetch from the inventory API and push corrections immediately.
    Api,
    /// Read JSON dumps from the data directory.
    Local,
}

impl Source {
    const EXPECTED: &'static str = "api, local";

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "api" => Some(Source::Api),
            "local" => Some(Source::Local),
            _ => None,
        }
    }
}

/// Which lots get written back to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotUpdateScope {
    /// Only lots whose trade item was corrected.
    Changed,
    /// Every lot in the collection, corrected or not.
    All,
    /// Nothing is written back.
    Disabled,
}

impl LotUpdateScope {
    const EXPECTED: &'static str = "changed, all, none";

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "changed" => Some(LotUpdateScope::Changed),
            "all" => Some(LotUpdateScope::All),
            "none" => Some(LotUpdateScope::Disabled),
            _ => None,
        }
    }
}

/// Run settings other than credentials.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: Source,
    pub scope: LotUpdateScope,
    pub inventory: InventoryQuery,
    /// Directory holding the JSON dumps and the correction CSV.
    pub data_dir: PathBuf,
    /// Directory the corrected CSV and lot snapshot are written to.
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            source: Source::Api,
            scope: LotUpdateScope::Changed,
            inventory: InventoryQuery::default(),
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings {
            inventory: InventoryQuery::from_lookup(&lookup),
            ..Settings::default()
        };

        if let Some(value) = lookup(RECONCILE_SOURCE).filter(|v| !v.is_empty()) {
            settings.source = Source::parse(&value).ok_or(ReconcileError::InvalidEnv {
                key: RECONCILE_SOURCE,
                value,
                expected: Source::EXPECTED,
            })?;
        }

        if let Some(value) = lookup(LOT_UPDATE_SCOPE).filter(|v| !v.is_empty()) {
            settings.scope = LotUpdateScope::parse(&value).ok_or(ReconcileError::InvalidEnv {
                key: LOT_UPDATE_SCOPE,
                value,
                expected: LotUpdateScope::EXPECTED,
            })?;
        }

        Ok(settings)
    }

    /// Reads the settings from the process environment. `.env` is not
    /// loaded here; see [`load_dotenv`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    /// Returns `true` if this run talks to the API at all.
    pub fn needs_credentials(&self) -> bool {
        self.source == Source::Api || self.scope != LotUpdateScope::Disabled
    }
}
