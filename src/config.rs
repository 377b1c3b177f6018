use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings, read from the environment (and `.env` if present)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub csv_path: PathBuf,
    /// Run an import pass before any other command
    pub import_on_start: bool,
    pub busy_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("swift_codes.db"),
            csv_path: PathBuf::from("data/swift_codes.csv"),
            import_on_start: true,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let db_path = lookup("SWIFT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let csv_path = lookup("SWIFT_CSV_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.csv_path);
        let import_on_start = lookup("SWIFT_IMPORT_ON_START")
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.import_on_start);
        let busy_timeout = lookup("SWIFT_DB_BUSY_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.busy_timeout);

        Config {
            db_path,
            csv_path,
            import_on_start,
            busy_timeout,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
