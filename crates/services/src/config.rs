use std::env;
use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

pub const ADVANCE_ON_CORRECT_ENV: &str = "TUTOR_ADVANCE_ON_CORRECT";
pub const ADVANCE_DELAY_ENV: &str = "TUTOR_ADVANCE_DELAY_MS";
pub const REVEAL_DELAY_ENV: &str = "TUTOR_REVEAL_DELAY_MS";
pub const REVIEW_MIN_ENV: &str = "TUTOR_REVIEW_MIN_MS";
pub const REVIEW_MAX_ENV: &str = "TUTOR_REVIEW_MAX_MS";
pub const REVIEW_AUTO_CLOSE_ENV: &str = "TUTOR_REVIEW_AUTO_CLOSE_MS";
pub const UNLOCK_STREAK_ENV: &str = "TUTOR_UNLOCK_STREAK";

/// Timing and policy knobs for the practice and review engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Move to the next problem automatically after a correct answer.
    pub advance_on_correct: bool,
    pub advance_delay: Duration,
    /// Delay between revealing an answer and moving on.
    pub reveal_delay: Duration,
    /// Bounds of the randomized delay between due-review probes.
    pub review_min_delay: Duration,
    pub review_max_delay: Duration,
    /// How long a correctly answered review stays visible.
    pub review_auto_close: Duration,
    /// Consecutive correct answers that trigger the lesson-unlock proposal.
    pub unlock_streak: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            advance_on_correct: true,
            advance_delay: Duration::from_millis(1500),
            reveal_delay: Duration::from_millis(3000),
            review_min_delay: Duration::from_millis(60_000),
            review_max_delay: Duration::from_millis(180_000),
            review_auto_close: Duration::from_millis(800),
            unlock_streak: 3,
        }
    }
}

impl SessionSettings {
    /// Defaults overlaid with `TUTOR_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable values or an inverted delay range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`; blank values are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable values or an inverted delay range.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        let value = |key: &str| lookup(key).filter(|raw| !raw.trim().is_empty());

        if let Some(raw) = value(ADVANCE_ON_CORRECT_ENV) {
            settings.advance_on_correct = parse_bool(ADVANCE_ON_CORRECT_ENV, &raw)?;
        }
        if let Some(raw) = value(ADVANCE_DELAY_ENV) {
            settings.advance_delay = parse_millis(ADVANCE_DELAY_ENV, &raw)?;
        }
        if let Some(raw) = value(REVEAL_DELAY_ENV) {
            settings.reveal_delay = parse_millis(REVEAL_DELAY_ENV, &raw)?;
        }
        if let Some(raw) = value(REVIEW_MIN_ENV) {
            settings.review_min_delay = parse_millis(REVIEW_MIN_ENV, &raw)?;
        }
        if let Some(raw) = value(REVIEW_MAX_ENV) {
            settings.review_max_delay = parse_millis(REVIEW_MAX_ENV, &raw)?;
        }
        if let Some(raw) = value(REVIEW_AUTO_CLOSE_ENV) {
            settings.review_auto_close = parse_millis(REVIEW_AUTO_CLOSE_ENV, &raw)?;
        }
        if let Some(raw) = value(UNLOCK_STREAK_ENV) {
            settings.unlock_streak = raw.trim().parse().map_err(|_| ConfigError::InvalidCount {
                key: UNLOCK_STREAK_ENV,
                raw: raw.clone(),
            })?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvertedRange` when the review delay bounds are
    /// swapped, or `ConfigError::ZeroStreak` for a zero unlock streak.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.review_min_delay > self.review_max_delay {
            return Err(ConfigError::InvertedRange {
                min_ms: self.review_min_delay.as_millis(),
                max_ms: self.review_max_delay.as_millis(),
            });
        }
        if self.unlock_streak == 0 {
            return Err(ConfigError::ZeroStreak);
        }
        Ok(())
    }

    /// Fresh delay drawn uniformly from `[review_min_delay, review_max_delay]`.
    #[must_use]
    pub fn random_review_delay(&self) -> Duration {
        let (low, high) = if self.review_min_delay <= self.review_max_delay {
            (self.review_min_delay, self.review_max_delay)
        } else {
            (self.review_max_delay, self.review_min_delay)
        };
        let low_ms = u64::try_from(low.as_millis()).unwrap_or(u64::MAX);
        let high_ms = u64::try_from(high.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(low_ms..=high_ms))
    }
}

fn parse_millis(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidMillis {
            key,
            raw: raw.to_string(),
        })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            raw: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_timings() {
        let settings = SessionSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, SessionSettings::default());
        assert_eq!(settings.advance_delay, Duration::from_millis(1500));
        assert_eq!(settings.review_auto_close, Duration::from_millis(800));
    }

    #[test]
    fn overrides_are_applied() {
        let settings = SessionSettings::from_lookup(lookup(&[
            (ADVANCE_ON_CORRECT_ENV, "off"),
            (ADVANCE_DELAY_ENV, "250"),
            (REVIEW_MIN_ENV, "10"),
            (REVIEW_MAX_ENV, " 20 "),
            (REVEAL_DELAY_ENV, ""),
        ]))
        .unwrap();
        assert!(!settings.advance_on_correct);
        assert_eq!(settings.advance_delay, Duration::from_millis(250));
        assert_eq!(settings.review_max_delay, Duration::from_millis(20));
        assert_eq!(settings.reveal_delay, Duration::from_millis(3000));
    }

    #[test]
    fn rejects_inverted_range_and_garbage() {
        let err = SessionSettings::from_lookup(lookup(&[(REVIEW_MIN_ENV, "500"), (REVIEW_MAX_ENV, "100")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvertedRange {
                min_ms: 500,
                max_ms: 100
            }
        );

        let err = SessionSettings::from_lookup(lookup(&[(ADVANCE_DELAY_ENV, "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMillis { key: ADVANCE_DELAY_ENV, .. }));
    }

    #[test]
    fn unlock_streak_must_be_positive() {
        let settings = SessionSettings::from_lookup(lookup(&[(UNLOCK_STREAK_ENV, "5")])).unwrap();
        assert_eq!(settings.unlock_streak, 5);

        let err = SessionSettings::from_lookup(lookup(&[(UNLOCK_STREAK_ENV, "0")])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroStreak);
        let err = SessionSettings::from_lookup(lookup(&[(UNLOCK_STREAK_ENV, "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCount { .. }));
    }

    #[test]
    fn random_delay_stays_within_bounds() {
        let settings = SessionSettings::default();
        for _ in 0..200 {
            let delay = settings.random_review_delay();
            assert!(delay >= settings.review_min_delay);
            assert!(delay <= settings.review_max_delay);
        }
    }

    #[test]
    fn degenerate_range_yields_fixed_delay() {
        let settings = SessionSettings {
            review_min_delay: Duration::from_millis(42),
            review_max_delay: Duration::from_millis(42),
            ..SessionSettings::default()
        };
        assert_eq!(settings.random_review_delay(), Duration::from_millis(42));
    }
}
