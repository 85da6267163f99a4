//! Registration choice and embargo end date
//!
//! Persisted under two reserved answer keys. The submit gate checks the end
//! date against the configured window.

use crate::config::EmbargoConfig;
use chrono::{NaiveDate, NaiveTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use regform_schema::{EMBARGO_END_DATE_KEY, REGISTRATION_CHOICE_KEY};

/// Whether a key is reserved for the embargo model
#[inline]
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    regform_schema::RESERVED_KEYS.contains(&key)
}

/// When the registration becomes public
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationChoice {
    #[default]
    Immediate,
    Embargo,
}

impl RegistrationChoice {
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Embargo => "embargo",
        }
    }
}

/// Embargo errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmbargoError {
    /// Embargo chosen without an end date
    #[error("embargo end date is required")]
    MissingEndDate,

    /// End date too close to today
    #[error("embargo end date {end} must be more than {min_days} days after {today}")]
    TooSoon {
        end: NaiveDate,
        today: NaiveDate,
        min_days: i64,
    },

    /// End date too far away
    #[error("embargo end date {end} must be at most {max_days} days after {today}")]
    TooLate {
        end: NaiveDate,
        today: NaiveDate,
        max_days: i64,
    },

    /// Persisted value did not parse
    #[error("invalid {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Embargo sub-model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embargo {
    choice: RegistrationChoice,
    end_date: Option<NaiveDate>,
}

impl Embargo {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn choice(&self) -> RegistrationChoice {
        self.choice
    }

    #[inline]
    #[must_use]
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    #[inline]
    pub fn set_choice(&mut self, choice: RegistrationChoice) {
        self.choice = choice;
    }

    #[inline]
    pub fn set_end_date(&mut self, end_date: Option<NaiveDate>) {
        self.end_date = end_date;
    }

    /// Check the submit gate for a submission made on `today`
    ///
    /// # Errors
    /// Returns error if an embargo lacks an end date or the date falls outside
    /// the configured window
    pub fn validate(&self, today: NaiveDate, config: &EmbargoConfig) -> Result<(), EmbargoError> {
        if self.choice == RegistrationChoice::Immediate {
            return Ok(());
        }
        let end = self.end_date.ok_or(EmbargoError::MissingEndDate)?;
        let days = (end - today).num_days();
        if days <= config.min_days {
            return Err(EmbargoError::TooSoon {
                end,
                today,
                min_days: config.min_days,
            });
        }
        if days > config.max_days {
            return Err(EmbargoError::TooLate {
                end,
                today,
                max_days: config.max_days,
            });
        }
        Ok(())
    }

    /// `(registrationChoice, embargoEndDate)` answer entries
    #[must_use]
    pub fn serialize(&self) -> [(&'static str, Value); 2] {
        let end = self
            .end_date
            .map(|date| {
                date.and_time(NaiveTime::MIN)
                    .and_utc()
                    .to_rfc3339_opts(SecondsFormat::Millis, true)
            })
            .unwrap_or_default();
        [
            (REGISTRATION_CHOICE_KEY, Value::String(self.choice.as_str().to_string())),
            (EMBARGO_END_DATE_KEY, Value::String(end)),
        ]
    }

    /// Restore one reserved key
    ///
    /// # Errors
    /// Returns error if the value does not parse
    pub fn unserialize(&mut self, key: &str, value: &Value) -> Result<(), EmbargoError> {
        let invalid = || EmbargoError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            REGISTRATION_CHOICE_KEY => {
                self.choice = serde_json::from_value(value.clone()).map_err(|_| invalid())?;
            }
            EMBARGO_END_DATE_KEY => {
                self.end_date = match value {
                    Value::Null => None,
                    Value::String(s) if s.is_empty() => None,
                    Value::String(s) => Some(parse_date(s).ok_or_else(invalid)?),
                    _ => return Err(invalid()),
                };
            }
            _ => return Err(invalid()),
        }
        Ok(())
    }
}

/// Accepts a plain date or any RFC 3339 timestamp (date part kept)
fn parse_date(text: &str) -> Option<NaiveDate> {
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn immediate_always_passes() {
        let embargo = Embargo::new();
        assert!(embargo.validate(date(2024, 1, 1), &EmbargoConfig::default()).is_ok());
    }

    #[test]
    fn embargo_needs_end_date() {
        let mut embargo = Embargo::new();
        embargo.set_choice(RegistrationChoice::Embargo);
        assert_eq!(
            embargo.validate(date(2024, 1, 1), &EmbargoConfig::default()),
            Err(EmbargoError::MissingEndDate)
        );
    }

    #[test]
    fn window_bounds() {
        let config = EmbargoConfig::default();
        let today = date(2024, 1, 1);
        let mut embargo = Embargo::new();
        embargo.set_choice(RegistrationChoice::Embargo);

        embargo.set_end_date(Some(date(2024, 1, 3)));
        assert!(matches!(embargo.validate(today, &config), Err(EmbargoError::TooSoon { .. })));

        embargo.set_end_date(Some(date(2024, 1, 4)));
        assert!(embargo.validate(today, &config).is_ok());

        embargo.set_end_date(Some(today + chrono::Duration::days(1460)));
        assert!(embargo.validate(today, &config).is_ok());

        embargo.set_end_date(Some(today + chrono::Duration::days(1461)));
        assert!(matches!(embargo.validate(today, &config), Err(EmbargoError::TooLate { .. })));
    }

    #[test]
    fn serializes_midnight_utc() {
        let mut embargo = Embargo::new();
        assert_eq!(embargo.serialize()[1].1, json!(""));

        embargo.set_choice(RegistrationChoice::Embargo);
        embargo.set_end_date(Some(date(2025, 6, 30)));
        let [(choice_key, choice), (end_key, end)] = embargo.serialize();
        assert_eq!(choice_key, REGISTRATION_CHOICE_KEY);
        assert_eq!(choice, json!("embargo"));
        assert_eq!(end_key, EMBARGO_END_DATE_KEY);
        assert_eq!(end, json!("2025-06-30T00:00:00.000Z"));
    }

    #[test]
    fn unserializes_reserved_keys() {
        let mut embargo = Embargo::new();
        embargo.unserialize(REGISTRATION_CHOICE_KEY, &json!("embargo")).unwrap();
        embargo
            .unserialize(EMBARGO_END_DATE_KEY, &json!("2025-06-30T00:00:00.000Z"))
            .unwrap();
        assert_eq!(embargo.choice(), RegistrationChoice::Embargo);
        assert_eq!(embargo.end_date(), Some(date(2025, 6, 30)));

        embargo.unserialize(EMBARGO_END_DATE_KEY, &json!("2025-07-01")).unwrap();
        assert_eq!(embargo.end_date(), Some(date(2025, 7, 1)));

        embargo.unserialize(EMBARGO_END_DATE_KEY, &json!("")).unwrap();
        assert_eq!(embargo.end_date(), None);
    }

    #[test]
    fn rejects_bad_reserved_values() {
        let mut embargo = Embargo::new();
        assert!(embargo.unserialize(REGISTRATION_CHOICE_KEY, &json!("later")).is_err());
        assert!(embargo.unserialize(EMBARGO_END_DATE_KEY, &json!("soon")).is_err());
        assert!(embargo.unserialize(EMBARGO_END_DATE_KEY, &json!(5)).is_err());
    }
}
