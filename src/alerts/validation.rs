//! Configuration validation and input sanitizing helpers

use chrono::{DateTime, Utc};

use super::error::{AlertError, AlertResult};
use super::types::{AlertConfig, DEFAULT_RETRY_DELAYS_SEC};

impl AlertConfig {
    /// Check thresholds, windows and cooldown.
    ///
    /// Returns the first violation found. NaN percentages are rejected by the
    /// range checks.
    pub fn validate(&self) -> AlertResult<()> {
        if !(self.warning_percent > 0.0 && self.warning_percent <= 100.0) {
            return Err(AlertError::configuration(
                "warning_percent must be > 0 and <= 100",
            ));
        }
        if !(self.critical_percent > 0.0 && self.critical_percent <= 100.0) {
            return Err(AlertError::configuration(
                "critical_percent must be > 0 and <= 100",
            ));
        }
        if !(self.recovery_percent >= 0.0 && self.recovery_percent <= 100.0) {
            return Err(AlertError::configuration(
                "recovery_percent must be >= 0 and <= 100",
            ));
        }
        if self.warning_percent >= self.critical_percent {
            return Err(AlertError::configuration(
                "warning_percent must be lower than critical_percent",
            ));
        }
        if self.recovery_percent >= self.warning_percent {
            return Err(AlertError::configuration(
                "recovery_percent must be lower than warning_percent",
            ));
        }
        if self.warning_for_sec <= 0 || self.critical_for_sec <= 0 || self.recovery_for_sec <= 0 {
            return Err(AlertError::configuration("window seconds must be > 0"));
        }
        if self.cooldown_sec < 0 {
            return Err(AlertError::configuration("cooldown_sec must be >= 0"));
        }
        Ok(())
    }
}

/// Trim every entry and drop the blank ones.
pub fn sanitize_string_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drop negative delays; an empty result falls back to the default schedule.
pub fn sanitize_retry_delays(items: &[i64]) -> Vec<u64> {
    let delays: Vec<u64> = items
        .iter()
        .filter_map(|delay| u64::try_from(*delay).ok())
        .collect();

    if delays.is_empty() {
        DEFAULT_RETRY_DELAYS_SEC.to_vec()
    } else {
        delays
    }
}

/// Mask a secret for display, keeping at most its last four characters.
///
/// A secret that is stored but could not be decrypted shows as `********`.
pub fn mask_secret(secret: &str, present: bool) -> String {
    if !present {
        return String::new();
    }

    let trimmed = secret.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return "********".to_string();
    }
    if len <= 4 {
        return "****".to_string();
    }

    let tail: String = trimmed.chars().skip(len - 4).collect();
    format!("****{tail}")
}

pub fn is_silenced_at(muted_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    muted_until.is_some_and(|until| until > now)
}
