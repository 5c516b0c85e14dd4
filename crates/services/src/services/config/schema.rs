use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::ConfigError;

pub const CURRENT_CONFIG_VERSION: &str = "v1";

/// Upper bound for focus/rest durations, one day in minutes.
pub const MAX_DURATION_MINUTES: i32 = 1440;

fn default_ttl_days() -> i64 {
    7
}

fn default_work_minutes() -> i32 {
    25
}

fn default_rest_minutes() -> i32 {
    5
}

fn default_deadline_hour() -> u32 {
    18
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct InviteConfig {
    #[serde(alias = "ttlDays")]
    pub ttl_days: i64,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
        }
    }
}

/// Durations handed to new employee profiles, in minutes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct FocusConfig {
    #[serde(alias = "workMinutes")]
    pub work_minutes: i32,
    #[serde(alias = "restMinutes")]
    pub rest_minutes: i32,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            rest_minutes: default_rest_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct NotesConfig {
    /// Hour of day (UTC) used as the deadline of notes created without one.
    #[serde(alias = "defaultDeadlineHour")]
    pub default_deadline_hour: u32,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            default_deadline_hour: default_deadline_hour(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct SessionConfig {
    /// HS256 secret for session tokens. Generated on first start when absent.
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "configVersion")]
    pub config_version: String,
    pub invite: InviteConfig,
    pub focus: FocusConfig,
    pub notes: NotesConfig,
    pub session: SessionConfig,
}

impl Config {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<Config>(raw_config) {
            Ok(config) => config.normalized(),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.config_version = CURRENT_CONFIG_VERSION.to_string();

        if self.invite.ttl_days <= 0 {
            tracing::warn!(
                "Invalid invite TTL {} days, resetting to default",
                self.invite.ttl_days
            );
            self.invite.ttl_days = default_ttl_days();
        }

        if !(1..=MAX_DURATION_MINUTES).contains(&self.focus.work_minutes) {
            tracing::warn!(
                "Invalid focus duration {} minutes, resetting to default",
                self.focus.work_minutes
            );
            self.focus.work_minutes = default_work_minutes();
        }

        if !(1..=MAX_DURATION_MINUTES).contains(&self.focus.rest_minutes) {
            tracing::warn!(
                "Invalid rest duration {} minutes, resetting to default",
                self.focus.rest_minutes
            );
            self.focus.rest_minutes = default_rest_minutes();
        }

        if self.notes.default_deadline_hour > 23 {
            self.notes.default_deadline_hour = default_deadline_hour();
        }

        if matches!(
            self.session.secret.as_deref(),
            Some(secret) if secret.trim().is_empty()
        ) {
            self.session.secret = None;
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.invite.ttl_days <= 0 {
            return Err(ConfigError::ValidationError(
                "invite.ttl_days must be positive".to_string(),
            ));
        }
        if self.notes.default_deadline_hour > 23 {
            return Err(ConfigError::ValidationError(
                "notes.default_deadline_hour must be between 0 and 23".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION.to_string(),
            invite: InviteConfig::default(),
            focus: FocusConfig::default(),
            notes: NotesConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_empty_config() {
        let config = Config::from_raw("{}");

        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.invite.ttl_days, 7);
        assert_eq!(config.focus.work_minutes, 25);
        assert_eq!(config.focus.rest_minutes, 5);
        assert_eq!(config.notes.default_deadline_hour, 18);
        assert!(config.session.secret.is_none());
    }

    #[test]
    fn invalid_json_falls_back_to_default() {
        let config = Config::from_raw("{invalid json");

        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.invite.ttl_days, 7);
    }

    #[test]
    fn aliases_and_normalization_are_applied() {
        let raw = r#"{
            "configVersion": "v0",
            "invite": { "ttlDays": 3 },
            "focus": { "workMinutes": 50, "restMinutes": 0 },
            "session": { "secret": "   " }
        }"#;

        let config = Config::from_raw(raw);

        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.invite.ttl_days, 3);
        assert_eq!(config.focus.work_minutes, 50);
        assert_eq!(config.focus.rest_minutes, 5);
        assert!(config.session.secret.is_none());
    }

    #[test]
    fn out_of_range_values_are_reset() {
        let raw = r#"{ "invite": { "ttl_days": -1 }, "notes": { "default_deadline_hour": 30 } }"#;
        let config = Config::from_raw(raw);

        assert_eq!(config.invite.ttl_days, 7);
        assert_eq!(config.notes.default_deadline_hour, 18);
        assert!(config.validate().is_ok());
    }
}
