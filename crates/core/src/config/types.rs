use serde::{Deserialize, Serialize};

use crate::worker::DownloadClientKind;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub download_client: DownloadClientConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

/// Debrid provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider API key. The runner refuses to do any work while this
    /// is empty, so a freshly installed instance idles until configured.
    #[serde(default)]
    pub api_key: String,
}

/// Download client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadClientConfig {
    /// Which download backend handles the unrestricted links.
    #[serde(default = "default_client")]
    pub client: DownloadClientKind,

    /// Root directory downloads are written under. A per-torrent
    /// category is appended as a subdirectory when present.
    #[serde(default)]
    pub download_path: String,

    /// Mount point of the rclone remote (required when client = "symlink").
    #[serde(default)]
    pub rclone_mount_path: Option<String>,

    /// Aria2c JSON-RPC endpoint (required when client = "aria2c").
    #[serde(default)]
    pub aria2: Option<Aria2Config>,
}

impl Default for DownloadClientConfig {
    fn default() -> Self {
        Self {
            client: default_client(),
            download_path: String::new(),
            rclone_mount_path: None,
            aria2: None,
        }
    }
}

fn default_client() -> DownloadClientKind {
    DownloadClientKind::Internal
}

/// Aria2c JSON-RPC configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Aria2Config {
    /// Aria2c RPC URL (e.g., "http://localhost:6800")
    pub url: String,
    /// RPC secret token (optional)
    #[serde(default)]
    pub secret: Option<String>,
    /// Total request timeout in seconds (default: 10)
    #[serde(default = "default_aria2_timeout")]
    pub timeout_secs: u64,
}

fn default_aria2_timeout() -> u64 {
    10
}

/// General runner configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Maximum concurrent download workers. Values below 1 are clamped
    /// to 1 at tick entry rather than rejected at load time.
    #[serde(default = "default_download_limit")]
    pub download_limit: i64,

    /// Maximum concurrent unpack workers. Clamped like `download_limit`.
    #[serde(default = "default_unpack_limit")]
    pub unpack_limit: i64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            download_limit: default_download_limit(),
            unpack_limit: default_unpack_limit(),
        }
    }
}

fn default_download_limit() -> i64 {
    2
}

fn default_unpack_limit() -> i64 {
    1
}
