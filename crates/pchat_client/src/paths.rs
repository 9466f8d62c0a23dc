use directories::ProjectDirs;
use std::path::PathBuf;

use crate::error::ClientError;

pub const APP_QUALIFIER: &str = "org";
pub const APP_ORG: &str = "pchat";
pub const APP_NAME: &str = "privacy-chat";

pub fn config_dir() -> Result<PathBuf, ClientError> {
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or_else(|| ClientError::Config("cannot determine config directory".into()))?;
    Ok(dirs.config_dir().to_path_buf())
}

pub fn settings_path() -> Result<PathBuf, ClientError> {
    if let Ok(override_path) = std::env::var("PCHAT_SETTINGS") {
        return Ok(PathBuf::from(override_path));
    }
    Ok(config_dir()?.join("settings.json"))
}
