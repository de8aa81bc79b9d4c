//! # Configuration
//!
//! Settings are read from a TOML file (default `stagetrack.toml`, optional)
//! and then overridden from the environment.
//!
//! ```toml
//! api_base_url = "http://localhost:3005"
//! request_timeout_secs = 15
//! notice_ttl_ms = 2000
//! roster_refresh_secs = 300
//!
//! [roster]
//! source = "sheet"
//! sheet_id = "1AbC..."
//! sheet_name = "Users"
//! ```
//!
//! ## Environment Overrides
//!
//! - `STAGETRACK_API_URL`: base URL of the stage services
//! - `STAGETRACK_ROSTER_FILE`: path to a TOML roster; replaces `[roster]`

use serde::{Deserialize, Serialize};
use stagetrack_core::{Roster, RosterRow, TrackError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default base URL of the stage services.
pub const DEFAULT_API_URL: &str = "http://localhost:3005";

/// Default configuration file, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "stagetrack.toml";

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_NOTICE_TTL_MS: u64 = 2000;
const DEFAULT_ROSTER_REFRESH_SECS: u64 = 300;

// =============================================================================
// CONFIG
// =============================================================================

/// Where the access roster comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum RosterSource {
    /// Google Sheets gviz export of a shared sheet.
    Sheet { sheet_id: String, sheet_name: String },
    /// Versioned TOML roster file.
    File { path: PathBuf },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagetrackConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub notice_ttl_ms: u64,
    /// Roster re-fetch period of the view server; 0 disables it.
    pub roster_refresh_secs: u64,
    /// Without a roster, non-admin users only reach the landing stage.
    pub roster: Option<RosterSource>,
}

impl Default for StagetrackConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            notice_ttl_ms: DEFAULT_NOTICE_TTL_MS,
            roster_refresh_secs: DEFAULT_ROSTER_REFRESH_SECS,
            roster: None,
        }
    }
}

impl StagetrackConfig {
    /// Load from `path` and apply environment overrides.
    ///
    /// A missing file yields the defaults. A file that exists but does not
    /// parse is an error.
    pub fn load(path: &Path) -> Result<Self, TrackError> {
        let config = Self::from_file(path)?;
        Ok(config.with_overrides(
            std::env::var("STAGETRACK_API_URL").ok(),
            std::env::var("STAGETRACK_ROSTER_FILE").ok(),
        ))
    }

    /// Load from `path` without looking at the environment.
    pub fn from_file(path: &Path) -> Result<Self, TrackError> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TrackError::Io(format!("Cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| TrackError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply override values; empty strings are ignored.
    #[must_use]
    pub fn with_overrides(mut self, api_url: Option<String>, roster_file: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(file) = roster_file.filter(|f| !f.trim().is_empty()) {
            self.roster = Some(RosterSource::File {
                path: PathBuf::from(file),
            });
        }
        self
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    #[must_use]
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }

    #[must_use]
    pub fn roster_refresh(&self) -> Option<Duration> {
        (self.roster_refresh_secs > 0).then(|| Duration::from_secs(self.roster_refresh_secs))
    }
}

// =============================================================================
// ROSTER FILE
// =============================================================================

/// On-disk roster table.
///
/// ```toml
/// version = 7
///
/// [[users]]
/// username = "asha"
/// role = "user"
/// steps = "Hot Coil, QC Lab"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterFile {
    pub version: u64,
    #[serde(default)]
    pub users: Vec<RosterRow>,
}

/// Parse a TOML roster.
pub fn parse_roster_file(contents: &str) -> Result<Roster, TrackError> {
    let file: RosterFile =
        toml::from_str(contents).map_err(|e| TrackError::RosterParse(e.to_string()))?;
    Ok(Roster::from_rows(file.version, file.users))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stagetrack_core::Role;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let config =
            StagetrackConfig::from_file(Path::new("/nonexistent/stagetrack.toml")).expect("load");
        assert_eq!(config, StagetrackConfig::default());
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
        assert_eq!(config.notice_ttl(), Duration::from_secs(2));
        assert_eq!(config.roster_refresh(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn file_values_are_read() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            r#"
api_base_url = "http://plant.local:3005"
request_timeout_secs = 5
roster_refresh_secs = 0

[roster]
source = "sheet"
sheet_id = "abc123"
sheet_name = "Users"
"#
        )
        .expect("write");

        let config = StagetrackConfig::from_file(file.path()).expect("load");
        assert_eq!(config.api_base_url, "http://plant.local:3005");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.notice_ttl_ms, DEFAULT_NOTICE_TTL_MS);
        assert!(config.roster_refresh().is_none());
        assert_eq!(
            config.roster,
            Some(RosterSource::Sheet {
                sheet_id: "abc123".to_string(),
                sheet_name: "Users".to_string(),
            })
        );
    }

    #[test]
    fn malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "api_base_url = [").expect("write");
        assert!(matches!(
            StagetrackConfig::from_file(file.path()),
            Err(TrackError::Config(_))
        ));
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = StagetrackConfig::default().with_overrides(
            Some("http://override:9000".to_string()),
            Some("/etc/stagetrack/roster.toml".to_string()),
        );
        assert_eq!(config.api_base_url, "http://override:9000");
        assert_eq!(
            config.roster,
            Some(RosterSource::File {
                path: PathBuf::from("/etc/stagetrack/roster.toml"),
            })
        );

        let untouched = StagetrackConfig::default().with_overrides(Some("  ".to_string()), None);
        assert_eq!(untouched.api_base_url, DEFAULT_API_URL);
    }

    #[test]
    fn roster_file_parses() {
        let roster = parse_roster_file(
            r#"
version = 7

[[users]]
username = "asha"
role = "user"
steps = "Hot Coil, QC Lab"

[[users]]
username = "root"
role = "admin"
"#,
        )
        .expect("parse");
        assert_eq!(roster.version, 7);
        assert_eq!(roster.len(), 2);
        let asha = roster.lookup("asha", Role::User).expect("row");
        assert!(asha.step_access.grants("Hot Coil"));
    }

    #[test]
    fn roster_file_errors_are_roster_parse() {
        assert!(matches!(
            parse_roster_file("users = 3"),
            Err(TrackError::RosterParse(_))
        ));
    }
}
