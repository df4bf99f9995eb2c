use std::env;
use std::fmt;

/// Distinguishes runtime behavior for different stages of a reporting run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    /// Filter used when neither `RUST_LOG` nor `MASTERY_LOG_LEVEL` is set.
    pub fn default_log_level(self) -> &'static str {
        match self {
            Self::Development => "debug",
            Self::Test => "warn",
            Self::Production => "info",
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub mail: MailConfig,
    pub scoring: ScoringConfig,
    pub roster: RosterConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("MASTERY_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("MASTERY_LOG_LEVEL")
            .unwrap_or_else(|_| environment.default_log_level().to_string());

        let email_domain = env::var("MASTERY_EMAIL_DOMAIN")
            .map(|domain| domain.trim().trim_start_matches('@').to_string())
            .unwrap_or_else(|_| "dukes.jmu.edu".to_string());
        let sender = env::var("MASTERY_SENDER")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let done_score = parse_var("MASTERY_DONE_SCORE", 3.0_f64)?;
        let apprentice_score = parse_var("MASTERY_APPRENTICE_SCORE", 2.0_f64)?;
        let skip_rows = parse_var("MASTERY_ROSTER_SKIP", 1_usize)?;

        Ok(Self {
            environment,
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            mail: MailConfig {
                email_domain,
                sender,
            },
            scoring: ScoringConfig {
                done_score,
                apprentice_score,
            },
            roster: RosterConfig { skip_rows },
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
                key,
                value: raw.clone(),
            })
        }
        _ => Ok(default),
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Colored output; only for interactive development runs.
    pub ansi: bool,
}

/// Addressing used when drafting messages to students.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub email_domain: String,
    pub sender: Option<String>,
}

impl MailConfig {
    pub fn address_for(&self, local_part: &str) -> String {
        format!("{}@{}", local_part.trim(), self.email_domain)
    }
}

/// Score thresholds for the fixed-scale mastery rule and quiz annotations.
#[derive(Debug, Clone, Copy)]
pub struct ScoringConfig {
    pub done_score: f64,
    pub apprentice_score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RosterConfig {
    /// Data rows skipped after the roster header.
    pub skip_rows: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => {
                write!(f, "{key} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
