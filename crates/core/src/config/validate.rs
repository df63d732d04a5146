use crate::worker::DownloadClientKind;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - A symlink client names its rclone mount path
/// - An aria2c client names its RPC endpoint
///
/// The tick re-checks the runtime half of these (mount reachable, API
/// key present) on every pass, since both can change underneath a
/// running process.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.download_client.client == DownloadClientKind::Symlink
        && config.download_client.rclone_mount_path.is_none()
    {
        return Err(ConfigError::ValidationError(
            "download_client.rclone_mount_path is required for the symlink client".to_string(),
        ));
    }

    if config.download_client.client == DownloadClientKind::Aria2c
        && config.download_client.aria2.is_none()
    {
        return Err(ConfigError::ValidationError(
            "download_client.aria2 is required for the aria2c client".to_string(),
        ));
    }

    Ok(())
}
