use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use gradewatch_engine::{Credentials, PollSettings, SettingsSource, DEFAULT_POLL_INTERVAL};
use watch_logging::{watch_debug, watch_warn};

pub const DEFAULT_LOGIN_URL: &str = "https://cis.nordakademie.de/login";
pub const DEFAULT_TRANSCRIPT_URL: &str = "https://cis.nordakademie.de/studium/pruefungen/pruefungsergebnisse?tx_nagrades_nagradesmodules%5Baction%5D=transcript&tx_nagrades_nagradesmodules%5Bcontroller%5D=Notenverwaltung&tx_nagrades_nagradesmodules%5BcurriculumId%5D=161&tx_nagrades_nagradesmodules%5Blang%5D=de&cHash=1f08230e8aedd6f54255c728bbd29c19";

pub const USERNAME_KEY: &str = "CIS_USERNAME";
pub const PASSWORD_KEY: &str = "CIS_PASSWORD";
pub const INTERVAL_KEY: &str = "CHECK_INTERVAL";
pub const TRANSCRIPT_URL_KEY: &str = "TRANSCRIPT_URL";
pub const LOGIN_URL_KEY: &str = "LOGIN_URL";

/// Build poll settings from a key lookup. Empty values count as unset.
pub fn settings_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PollSettings {
    let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let credentials = match (value(USERNAME_KEY), value(PASSWORD_KEY)) {
        (Some(username), Some(password)) => Some(Credentials::new(username.trim(), password)),
        _ => None,
    };

    let transcript_url = value(TRANSCRIPT_URL_KEY)
        .map(|url| url.trim().to_string())
        .unwrap_or_else(|| DEFAULT_TRANSCRIPT_URL.to_string());

    let interval = match value(INTERVAL_KEY) {
        None => DEFAULT_POLL_INTERVAL,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(minutes) if minutes > 0 => Duration::from_secs(minutes * 60),
            _ => {
                watch_warn!(
                    "Ignoring invalid {}={:?}; using {} minutes",
                    INTERVAL_KEY,
                    raw,
                    DEFAULT_POLL_INTERVAL.as_secs() / 60
                );
                DEFAULT_POLL_INTERVAL
            }
        },
    };

    PollSettings {
        credentials,
        transcript_url,
        interval,
    }
}

pub fn login_url_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> String {
    lookup(LOGIN_URL_KEY)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string())
}

/// Reads a dotenv file on every load, falling back to the process environment.
///
/// The process environment is never modified, so edits to the file take
/// effect on the next iteration.
#[derive(Debug, Clone)]
pub struct DotenvSettings {
    env_file: PathBuf,
}

impl DotenvSettings {
    pub fn new(env_file: PathBuf) -> Self {
        Self { env_file }
    }

    pub fn lookup(&self) -> impl Fn(&str) -> Option<String> {
        let file_values = self.read_file();
        move |key: &str| {
            file_values
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        }
    }

    fn read_file(&self) -> HashMap<String, String> {
        let iter = match dotenvy::from_path_iter(&self.env_file) {
            Ok(iter) => iter,
            Err(err) if err.not_found() => {
                watch_debug!("No dotenv file at {}", self.env_file.display());
                return HashMap::new();
            }
            Err(err) => {
                watch_warn!("Could not read {}: {}", self.env_file.display(), err);
                return HashMap::new();
            }
        };

        let mut values = HashMap::new();
        for item in iter {
            match item {
                Ok((key, value)) => {
                    values.insert(key, value);
                }
                Err(err) => {
                    watch_warn!("Skipping malformed line in {}: {}", self.env_file.display(), err);
                }
            }
        }
        values
    }
}

impl SettingsSource for DotenvSettings {
    fn load(&self) -> PollSettings {
        settings_from_lookup(self.lookup())
    }
}
