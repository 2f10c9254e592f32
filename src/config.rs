// =============================================================================
// CONFIGURATION - Typed startup configuration from the environment
// =============================================================================
//
// Everything tunable is read once at startup and injected explicitly; no
// module reads the process environment after this point. A bad value is a
// startup failure, never a per-request surprise.
//
// **Environment variables:**
// - `CLAUDE_API_KEY`          - API key for the AI provider (required)
// - `CLAUDE_API_URL`          - messages endpoint override
// - `CLAUDE_MODEL`            - model for moderation and rewrite calls
// - `AI_MODERATION_ENABLED`   - remote classification on/off (default true)
// - `AI_MODERATION_THRESHOLD` - confidence below which flags are ignored
// - `UNCERTAIN_POLICY`        - `allow` or `review` (required, no default)
// - `AI_DAILY_LIMIT`          - rewrites per user per day (default 3)
// - `QUOTA_TIMEZONE`          - IANA zone for the quota day (default Europe/Moscow)
// - `OUTBOUND_PROXY_URL`      - optional proxy used after the direct route
// - `BANNED_TERMS_FILE`       - optional term-list file replacing the built-in
// - `REQUEST_TIMEOUT_SECS`    - remote call timeout (default 30)
// - `FALLBACK_TIMEOUT_SECS`   - timeout when failing open (default 10)
// - `RETRY_BACKOFF_MS`        - pause before the single retry (default 400)

use crate::core::moderation::UncertainPolicy;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {name}")]
    Missing { name: &'static str },

    #[error("invalid value for {name}: {detail}")]
    Invalid { name: &'static str, detail: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub moderation_enabled: bool,
    pub confidence_threshold: f64,
    pub uncertain_policy: UncertainPolicy,
    pub daily_limit: u32,
    pub quota_timezone: Tz,
    pub proxy_url: Option<String>,
    pub terms_file: Option<PathBuf>,
    pub request_timeout: Duration,
    pub fallback_timeout: Duration,
    pub retry_backoff: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_nonempty("CLAUDE_API_KEY").ok_or(ConfigError::Missing {
            name: "CLAUDE_API_KEY",
        })?;

        let endpoint = env_nonempty("CLAUDE_API_URL")
            .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".to_string());

        let model = env_nonempty("CLAUDE_MODEL")
            .unwrap_or_else(|| "claude-3-haiku-20240307".to_string());

        let moderation_enabled = match env_nonempty("AI_MODERATION_ENABLED") {
            Some(raw) => parse_bool("AI_MODERATION_ENABLED", &raw)?,
            None => true,
        };

        let confidence_threshold = match env_nonempty("AI_MODERATION_THRESHOLD") {
            Some(raw) => parse_threshold("AI_MODERATION_THRESHOLD", &raw)?,
            None => 0.7,
        };

        // No default on purpose: whether an uncertain verdict publishes or
        // parks the ad is a product decision the operator has to make.
        let uncertain_policy = env_nonempty("UNCERTAIN_POLICY")
            .ok_or(ConfigError::Missing {
                name: "UNCERTAIN_POLICY",
            })?
            .parse::<UncertainPolicy>()
            .map_err(|detail| ConfigError::Invalid {
                name: "UNCERTAIN_POLICY",
                detail,
            })?;

        let daily_limit = match env_nonempty("AI_DAILY_LIMIT") {
            Some(raw) => raw.parse::<u32>().map_err(|err| ConfigError::Invalid {
                name: "AI_DAILY_LIMIT",
                detail: err.to_string(),
            })?,
            None => 3,
        };

        let quota_timezone = match env_nonempty("QUOTA_TIMEZONE") {
            Some(raw) => raw.parse::<Tz>().map_err(|detail| ConfigError::Invalid {
                name: "QUOTA_TIMEZONE",
                detail,
            })?,
            None => chrono_tz::Europe::Moscow,
        };

        let request_timeout = match env_nonempty("REQUEST_TIMEOUT_SECS") {
            Some(raw) => parse_secs("REQUEST_TIMEOUT_SECS", &raw)?,
            None => Duration::from_secs(30),
        };

        let fallback_timeout = match env_nonempty("FALLBACK_TIMEOUT_SECS") {
            Some(raw) => parse_secs("FALLBACK_TIMEOUT_SECS", &raw)?,
            None => Duration::from_secs(10),
        };

        let retry_backoff = match env_nonempty("RETRY_BACKOFF_MS") {
            Some(raw) => parse_millis("RETRY_BACKOFF_MS", &raw)?,
            None => Duration::from_millis(400),
        };

        Ok(Self {
            api_key,
            endpoint,
            model,
            moderation_enabled,
            confidence_threshold,
            uncertain_policy,
            daily_limit,
            quota_timezone,
            proxy_url: env_nonempty("OUTBOUND_PROXY_URL"),
            terms_file: env_nonempty("BANNED_TERMS_FILE").map(PathBuf::from),
            request_timeout,
            fallback_timeout,
            retry_backoff,
        })
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            detail: format!("expected true/false, got '{other}'"),
        }),
    }
}

fn parse_threshold(name: &'static str, raw: &str) -> Result<f64, ConfigError> {
    let value = raw.parse::<f64>().map_err(|err| ConfigError::Invalid {
        name,
        detail: err.to_string(),
    })?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Invalid {
            name,
            detail: format!("expected a value in [0, 1], got {value}"),
        });
    }
    Ok(value)
}

fn parse_secs(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs = parse_nonzero(name, raw)?;
    Ok(Duration::from_secs(secs))
}

fn parse_millis(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let millis = parse_nonzero(name, raw)?;
    Ok(Duration::from_millis(millis))
}

fn parse_nonzero(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let value = raw.parse::<u64>().map_err(|err| ConfigError::Invalid {
        name,
        detail: err.to_string(),
    })?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            detail: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        assert!(parse_bool("X", "true").unwrap());
        assert!(parse_bool("X", "YES").unwrap());
        assert!(parse_bool("X", "1").unwrap());
        assert!(!parse_bool("X", "false").unwrap());
        assert!(!parse_bool("X", "Off").unwrap());
        assert!(parse_bool("X", "da").is_err());
    }

    #[test]
    fn test_parse_threshold_bounds() {
        assert_eq!(parse_threshold("X", "0.7").unwrap(), 0.7);
        assert_eq!(parse_threshold("X", "0").unwrap(), 0.0);
        assert_eq!(parse_threshold("X", "1").unwrap(), 1.0);
        assert!(parse_threshold("X", "1.5").is_err());
        assert!(parse_threshold("X", "-0.1").is_err());
        assert!(parse_threshold("X", "high").is_err());
    }

    #[test]
    fn test_durations_must_be_positive() {
        assert_eq!(parse_secs("X", "30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_millis("X", "400").unwrap(), Duration::from_millis(400));
        assert!(parse_secs("X", "0").is_err());
        assert!(parse_millis("X", "-5").is_err());
    }

    #[test]
    fn test_timezone_parses_iana_names() {
        assert_eq!(
            "Europe/Moscow".parse::<Tz>().unwrap(),
            chrono_tz::Europe::Moscow
        );
        assert!("Mars/Olympus".parse::<Tz>().is_err());
    }
}
