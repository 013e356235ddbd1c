//! Environment file loading utilities

use std::path::Path;

use tracing::debug;

/// Load environment variables from .env files in the session directory.
/// This loads .env first, then .env.{RHELP_ENV} if RHELP_ENV is set.
pub fn load_env_files(folder: &Path) {
    load_env_file(folder, ".env", false);

    if let Ok(session_env) = std::env::var("RHELP_ENV") {
        load_env_file(folder, &format!(".env.{}", session_env), true);
    }
}

/// Load a single .env file
///
/// # Arguments
/// * `folder` - The directory containing the .env file
/// * `filename` - The name of the .env file
/// * `override_existing` - Whether to override existing environment variables
pub fn load_env_file(folder: &Path, filename: &str, override_existing: bool) {
    let env_file = folder.join(filename);
    let Ok(content) = std::fs::read_to_string(&env_file) else {
        return;
    };
    debug!("loading environment from {}", env_file.display());

    for (key, value) in parse_env(&content) {
        if override_existing || std::env::var(key).is_err() {
            // Called during startup, before the server and worker threads exist.
            std::env::set_var(key, value);
        }
    }
}

/// Parse `KEY=value` lines, skipping blanks and `#` comments.
fn parse_env(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            (
                key.trim(),
                value.trim().trim_matches('"').trim_matches('\''),
            )
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
