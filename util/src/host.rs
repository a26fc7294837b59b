//! Host platform utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::env;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the environment variable pointing at the software root, the
/// directory containing `params/` and `sessions/`.
pub const SW_ROOT_ENV_VAR: &str = "CAR_MPC_SW_ROOT";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HostError {
    #[error("The software root environment variable ({0}) is not set")]
    SwRootNotSet(&'static str),

    #[error("The software root ({0:?}) is not a directory")]
    SwRootNotADir(PathBuf),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the path to the root of the software installation.
pub fn get_sw_root() -> Result<PathBuf, HostError> {
    let root = match env::var_os(SW_ROOT_ENV_VAR) {
        Some(r) => PathBuf::from(r),
        None => return Err(HostError::SwRootNotSet(SW_ROOT_ENV_VAR)),
    };

    if !root.is_dir() {
        return Err(HostError::SwRootNotADir(root));
    }

    Ok(root)
}

/// Short description of the host this executable is running on.
pub fn get_host_info() -> String {
    format!(
        "{} {} ({})",
        env::consts::FAMILY,
        env::consts::OS,
        env::consts::ARCH
    )
}
