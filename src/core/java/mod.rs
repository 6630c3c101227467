// ─── Java Resolution ───
// Finds a usable Java binary for a launch: explicit override first, then
// JAVA_HOME, then PATH. The resolved binary is probed with `-version` so a
// wrong-major install is caught before the game falls over at startup.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

fn java_binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "java.exe"
    } else {
        "java"
    }
}

/// Candidate binaries in preference order.
fn candidate_binaries(override_path: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = override_path {
        candidates.push(path.to_path_buf());
    }

    if let Ok(java_home) = std::env::var("JAVA_HOME") {
        candidates.push(PathBuf::from(java_home).join("bin").join(java_binary_name()));
    }

    if let Ok(path_var) = std::env::var("PATH") {
        for dir in std::env::split_paths(&path_var) {
            candidates.push(dir.join(java_binary_name()));
        }
    }

    candidates
}

/// Query `java -version` and extract the major version.
fn probe_major(binary: &Path) -> Option<u32> {
    let output = std::process::Command::new(binary)
        .arg("-version")
        .output()
        .ok()?;

    // `java -version` historically writes to stderr.
    let text = String::from_utf8_lossy(&output.stderr).to_string()
        + &String::from_utf8_lossy(&output.stdout);
    parse_major_from_version_output(&text)
}

fn parse_major_from_version_output(text: &str) -> Option<u32> {
    let quoted = text.split('"').nth(1)?;
    let mut parts = quoted.split('.');
    let first = parts.next()?.parse::<u32>().ok()?;
    if first == 1 {
        // Legacy "1.8.0_392" style.
        parts.next()?.parse::<u32>().ok()
    } else {
        Some(first)
    }
}

/// Resolve a Java binary for the required major version.
///
/// An explicit override is honored when it exists and matches the required
/// major; otherwise the ambient candidates are probed in order.
pub async fn resolve_java_binary(
    required_major: u32,
    override_path: Option<&Path>,
) -> LauncherResult<PathBuf> {
    let candidates = candidate_binaries(override_path);

    let result = tokio::task::spawn_blocking(move || {
        for candidate in candidates {
            if !candidate.is_file() {
                continue;
            }
            match probe_major(&candidate) {
                Some(major) if major == required_major => {
                    debug!("Resolved Java {} at {:?}", major, candidate);
                    return Some(candidate);
                }
                Some(major) => {
                    debug!("Skipping Java {} at {:?}", major, candidate);
                }
                None => {
                    warn!("Cannot probe Java at {:?}", candidate);
                }
            }
        }
        None
    })
    .await
    .map_err(|e| LauncherError::Other(format!("Java probe task failed: {e}")))?;

    result.ok_or(LauncherError::JavaNotFound(required_major))
}

/// Conservative mapping from Minecraft version to required Java major, used
/// when an instance predates the install artifacts carrying the real value.
pub fn required_java_for_minecraft_version(minecraft_version: &str) -> u32 {
    let mut parts = minecraft_version.split('.');
    let major = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(1);
    let minor = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(20);
    let patch = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(0);

    if major > 1 || minor >= 21 || (minor == 20 && patch >= 5) {
        21
    } else if minor >= 17 {
        17
    } else {
        8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_version_output() {
        let text = "openjdk version \"21.0.2\" 2024-01-16\nOpenJDK Runtime Environment";
        assert_eq!(parse_major_from_version_output(text), Some(21));
    }

    #[test]
    fn parses_legacy_version_output() {
        let text = "java version \"1.8.0_392\"\nJava(TM) SE Runtime Environment";
        assert_eq!(parse_major_from_version_output(text), Some(8));
    }

    #[test]
    fn required_java_mapping() {
        assert_eq!(required_java_for_minecraft_version("1.16.5"), 8);
        assert_eq!(required_java_for_minecraft_version("1.18.2"), 17);
        assert_eq!(required_java_for_minecraft_version("1.20.4"), 17);
        assert_eq!(required_java_for_minecraft_version("1.20.6"), 21);
        assert_eq!(required_java_for_minecraft_version("1.21.1"), 21);
    }
}
