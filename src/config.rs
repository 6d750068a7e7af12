use anyhow::{Context, Result, anyhow};
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use crate::upload::CloudinaryCredentials;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/videometa-env";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Raw settings, each one optional. Filled from the env file and then
/// overlaid with process environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub database_url: Option<String>,
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub cloudinary_folder: Option<String>,
    pub cloudinary_api_base: Option<String>,
    pub max_upload_bytes: Option<usize>,
}

/// Which storage the server runs against.
#[derive(Debug, Clone)]
pub enum StorageMode {
    /// Seeded in-memory records; no uploads.
    Demo,
    Persistent {
        database_path: PathBuf,
        credentials: CloudinaryCredentials,
        folder: Option<String>,
        api_base: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub storage: StorageMode,
}

impl EnvConfig {
    /// Applies one `KEY=value` pair. Unknown keys are ignored and empty values
    /// leave the setting untouched.
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim().trim_matches('"');
        if value.is_empty() {
            return Ok(());
        }
        match key {
            "PORT" => {
                self.port = Some(value.parse().with_context(|| format!("parsing PORT {value:?}"))?)
            }
            "LISTEN_HOST" => self.host = Some(value.to_string()),
            "DATABASE_URL" => self.database_url = Some(value.to_string()),
            "CLOUDINARY_CLOUD_NAME" => self.cloud_name = Some(value.to_string()),
            "CLOUDINARY_API_KEY" => self.api_key = Some(value.to_string()),
            "CLOUDINARY_API_SECRET" => self.api_secret = Some(value.to_string()),
            "CLOUDINARY_FOLDER" => self.cloudinary_folder = Some(value.to_string()),
            "CLOUDINARY_API_BASE" => self.cloudinary_api_base = Some(value.to_string()),
            "MAX_UPLOAD_BYTES" => {
                self.max_upload_bytes = Some(
                    value
                        .parse()
                        .with_context(|| format!("parsing MAX_UPLOAD_BYTES {value:?}"))?,
                )
            }
            _ => {}
        }
        Ok(())
    }

    /// Overlays values from an environment map, e.g. `std::env::vars()`.
    pub fn overlay_env<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            self.set(key.as_ref(), value.as_ref())?;
        }
        Ok(())
    }

    /// Resolves defaults and decides between the demo and persistent server.
    /// A database URL switches to persistent mode, which then needs all three
    /// media service credentials.
    pub fn resolve(self) -> Result<RuntimeConfig> {
        let storage = match self.database_url {
            None => StorageMode::Demo,
            Some(url) => {
                let required = |value: Option<String>, key: &str| {
                    value.ok_or_else(|| anyhow!("{key} is required with DATABASE_URL"))
                };
                let credentials = CloudinaryCredentials {
                    cloud_name: required(self.cloud_name, "CLOUDINARY_CLOUD_NAME")?,
                    api_key: required(self.api_key, "CLOUDINARY_API_KEY")?,
                    api_secret: required(self.api_secret, "CLOUDINARY_API_SECRET")?,
                };
                StorageMode::Persistent {
                    database_path: database_path_from_url(&url),
                    credentials,
                    folder: self.cloudinary_folder,
                    api_base: self.cloudinary_api_base,
                }
            }
        };

        Ok(RuntimeConfig {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            max_upload_bytes: self.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            storage,
        })
    }
}

/// Accepts either a bare path or a `sqlite://` URL.
pub fn database_path_from_url(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

/// Reads a `KEY=value` env file. A missing file is not an error.
pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            cfg.set(key.trim(), value)
                .with_context(|| format!("in {}", path.display()))?;
        }
    }
    Ok(Some(cfg))
}

/// Drops environment entries whose key or value is not valid UTF-8.
pub fn utf8_env_vars(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> impl Iterator<Item = (String, String)> {
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

/// Env file first, then process environment on top.
pub fn load_env_config(
    path: &Path,
    process_env: impl IntoIterator<Item = (String, String)>,
) -> Result<EnvConfig> {
    let mut cfg = read_env_config(path)?.unwrap_or_default();
    cfg.overlay_env(process_env)?;
    Ok(cfg)
}
