use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VidgateConfig {
    pub server: ServerSection,
    pub networking: NetworkingSection,
    pub secret: SecretSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkingSection {
    pub videoplayback: VideoplaybackSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoplaybackSection {
    pub video_fetch_chunk_size_mb: u64,
    #[serde(default = "default_upstream_timeout_seconds")]
    pub upstream_timeout_seconds: u64,
}

impl VideoplaybackSection {
    /// Chunk size in bytes. The origin expects decimal megabytes.
    pub fn chunk_size_bytes(&self) -> u64 {
        self.video_fetch_chunk_size_mb * 1_000_000
    }
}

fn default_upstream_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretSection {
    pub video_playback_decryption_key: String,
    pub video_playback_decryption_iv: String,
}

pub fn load_vidgate_config<P: AsRef<Path>>(path: P) -> Result<VidgateConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
