#![forbid(unsafe_code)]

//! Runtime configuration for the creatorkit backend.
//!
//! Values are resolved once at startup. A CLI override wins over the process
//! environment, which wins over the `.env` file, which wins over the built-in
//! defaults. Blank values are treated as unset everywhere.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{error::PipelineError, poll::PollPolicy, store::VIDEOS_SUBDIR};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_PUBLIC_ROOT: &str = "public";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ZAPCAP_BASE_URL: &str = "https://api.zapcap.ai";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 900;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 512;

pub const ZAPCAP_API_KEY_VAR: &str = "ZAPCAP_API_KEY";

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub public_root: PathBuf,
    pub host: String,
    pub port: u16,
    pub zapcap_api_key: Option<String>,
    pub zapcap_base_url: String,
    pub request_timeout: Duration,
    pub transfer_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl RuntimeSettings {
    /// Directory backing the output store; also served under `/videos/`.
    pub fn videos_dir(&self) -> PathBuf {
        self.public_root.join(VIDEOS_SUBDIR)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub public_root: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_settings(overrides: RuntimeOverrides) -> Result<RuntimeSettings> {
    let env_path = overrides
        .env_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(&env_path)?;
    Ok(build_runtime_settings(&file_vars, env_var_string, overrides))
}

fn build_runtime_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> RuntimeSettings {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let public_root = overrides
        .public_root
        .or_else(|| lookup("PUBLIC_ROOT").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLIC_ROOT));
    let host = overrides
        .host
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| lookup("CREATORKIT_HOST"))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = overrides
        .port
        .or_else(|| lookup("CREATORKIT_PORT").and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_PORT);
    let zapcap_base_url = lookup("ZAPCAP_BASE_URL")
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_ZAPCAP_BASE_URL.to_string());
    let request_timeout = lookup("ZAPCAP_REQUEST_TIMEOUT_SECS")
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    let transfer_timeout = lookup("ZAPCAP_TRANSFER_TIMEOUT_SECS")
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TRANSFER_TIMEOUT_SECS);
    let max_upload_mb = lookup("CREATORKIT_MAX_UPLOAD_MB")
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|mb| *mb > 0)
        .unwrap_or(DEFAULT_MAX_UPLOAD_MB);

    RuntimeSettings {
        public_root,
        host,
        port,
        zapcap_api_key: lookup(ZAPCAP_API_KEY_VAR),
        zapcap_base_url,
        request_timeout: Duration::from_secs(request_timeout),
        transfer_timeout: Duration::from_secs(transfer_timeout),
        max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| {
        file_vars
            .get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// Reads `KEY=value` pairs from a dotenv file. A missing file yields no
/// variables.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("reading {}", path.display()));
        }
    };
    Ok(content
        .lines()
        .filter_map(parse_env_line)
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect())
}

/// Splits one dotenv line, accepting an optional `export ` prefix and a
/// single layer of matching quotes around the value.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, unquote(value.trim())))
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| value.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(value)
}

/// Everything the subtitle pipeline needs, handed to it explicitly instead of
/// being read from the process environment per request.
#[derive(Debug, Clone)]
pub struct SubtitleConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout: Duration,
    pub transfer_timeout: Duration,
    pub transcript_poll: PollPolicy,
    pub render_poll: PollPolicy,
}

impl SubtitleConfig {
    pub fn from_runtime(settings: &RuntimeSettings) -> Self {
        Self {
            api_key: settings.zapcap_api_key.clone(),
            base_url: settings.zapcap_base_url.clone(),
            request_timeout: settings.request_timeout,
            transfer_timeout: settings.transfer_timeout,
            ..Self::default()
        }
    }

    /// Returns the service credential or the configuration error every
    /// subtitle route reports when it is absent.
    pub fn api_key(&self) -> Result<&str, PipelineError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(PipelineError::Configuration {
                key: ZAPCAP_API_KEY_VAR,
            })
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_ZAPCAP_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            transfer_timeout: Duration::from_secs(DEFAULT_TRANSFER_TIMEOUT_SECS),
            transcript_poll: PollPolicy::transcript(),
            render_poll: PollPolicy::render(),
        }
    }
}
