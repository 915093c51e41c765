//! Hysteresis state machine deciding when a CPU reading becomes a notification

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use super::types::{AlertConfig, Level, Trigger};

/// Threshold evaluator for one host.
///
/// Windows track how long the metric has continuously stayed in a zone.
/// Cooldowns are tracked per level and only advance when a notification is
/// actually emitted, so silencing never consumes a cooldown.
///
/// Calls must be serialized by the owner.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    active_level: Level,
    above_warning_since: Option<DateTime<Utc>>,
    above_critical_since: Option<DateTime<Utc>>,
    below_recovery_since: Option<DateTime<Utc>>,
    last_sent: HashMap<Level, DateTime<Utc>>,
    last_warning_at: Option<DateTime<Utc>>,
    last_critical_at: Option<DateTime<Utc>>,
    last_recovery_at: Option<DateTime<Utc>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Level {
        self.active_level
    }

    pub fn last_warning_at(&self) -> Option<DateTime<Utc>> {
        self.last_warning_at
    }

    pub fn last_critical_at(&self) -> Option<DateTime<Utc>> {
        self.last_critical_at
    }

    pub fn last_recovery_at(&self) -> Option<DateTime<Utc>> {
        self.last_recovery_at
    }

    /// Feed one sample. Returns the triggers to notify, at most one.
    pub fn evaluate(
        &mut self,
        now: DateTime<Utc>,
        cpu_percent: f64,
        config: &AlertConfig,
        silenced: bool,
    ) -> Vec<Trigger> {
        if !config.enabled {
            self.reset_windows();
            self.active_level = Level::None;
            return Vec::new();
        }

        if cpu_percent >= config.critical_percent {
            self.below_recovery_since = None;
            self.above_warning_since.get_or_insert(now);
            let since = *self.above_critical_since.get_or_insert(now);

            if window_elapsed(since, now, config.critical_for_sec)
                && self.can_send(Level::Critical, now, config.cooldown_sec)
            {
                self.active_level = Level::Critical;
                if !silenced {
                    self.mark_sent(Level::Critical, now);
                    return vec![Trigger {
                        level: Level::Critical,
                        cpu_percent,
                    }];
                }
            }
            return Vec::new();
        }
        self.above_critical_since = None;

        if cpu_percent >= config.warning_percent {
            self.below_recovery_since = None;
            let since = *self.above_warning_since.get_or_insert(now);

            if window_elapsed(since, now, config.warning_for_sec)
                && self.can_send(Level::Warning, now, config.cooldown_sec)
            {
                if !silenced {
                    self.mark_sent(Level::Warning, now);
                    if self.active_level != Level::Critical {
                        self.active_level = Level::Warning;
                    }
                    return vec![Trigger {
                        level: Level::Warning,
                        cpu_percent,
                    }];
                }
                // Silenced: only raise from rest, never lower a latent critical.
                if self.active_level == Level::None {
                    self.active_level = Level::Warning;
                }
            }
            return Vec::new();
        }
        self.above_warning_since = None;

        if self.active_level != Level::None && cpu_percent < config.recovery_percent {
            let since = *self.below_recovery_since.get_or_insert(now);

            if window_elapsed(since, now, config.recovery_for_sec)
                && self.can_send(Level::Recovery, now, config.cooldown_sec)
            {
                self.active_level = Level::None;
                self.reset_windows();
                if !silenced {
                    self.mark_sent(Level::Recovery, now);
                    return vec![Trigger {
                        level: Level::Recovery,
                        cpu_percent,
                    }];
                }
            }
        } else {
            self.below_recovery_since = None;
        }

        Vec::new()
    }

    fn reset_windows(&mut self) {
        self.above_warning_since = None;
        self.above_critical_since = None;
        self.below_recovery_since = None;
    }

    fn can_send(&self, level: Level, now: DateTime<Utc>, cooldown_sec: i64) -> bool {
        match self.last_sent.get(&level) {
            None => true,
            Some(last) => window_elapsed(*last, now, cooldown_sec),
        }
    }

    fn mark_sent(&mut self, level: Level, now: DateTime<Utc>) {
        self.last_sent.insert(level, now);
        match level {
            Level::Warning => self.last_warning_at = Some(now),
            Level::Critical => self.last_critical_at = Some(now),
            Level::Recovery => self.last_recovery_at = Some(now),
            Level::None | Level::Test => {}
        }
    }
}

fn window_elapsed(since: DateTime<Utc>, now: DateTime<Utc>, required_sec: i64) -> bool {
    if required_sec <= 0 {
        return true;
    }
    match TimeDelta::try_seconds(required_sec) {
        Some(required) => now.signed_duration_since(since) >= required,
        None => false,
    }
}
