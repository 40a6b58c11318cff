//! Duration values as they appear in spec files ("2s", "1h30m", "500ms")

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Parse error for duration strings
pub type ParseDurationError = humantime::DurationError;

/// A non-negative duration in humantime form (`500ms`, `2s`, `1h30m`, `1m 30s`).
///
/// Plain integers are read as nanoseconds. Zero means "not set" for the merge rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecDuration(pub Duration);

impl SpecDuration {
    pub const ZERO: SpecDuration = SpecDuration(Duration::ZERO);

    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for SpecDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl FromStr for SpecDuration {
    type Err = ParseDurationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        humantime::parse_duration(input.trim()).map(Self)
    }
}

impl fmt::Display for SpecDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", humantime::format_duration(self.0))
    }
}

impl Serialize for SpecDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = SpecDuration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a duration string like \"30s\" or an integer number of nanoseconds")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(SpecDuration(Duration::from_nanos(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(|n| SpecDuration(Duration::from_nanos(n)))
            .map_err(|_| E::custom("negative durations are not allowed"))
    }
}

impl<'de> Deserialize<'de> for SpecDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compound() {
        let d: SpecDuration = "1h30m".parse().unwrap();
        assert_eq!(d.0, Duration::from_secs(5400));

        let d: SpecDuration = "1m 30s".parse().unwrap();
        assert_eq!(d.0, Duration::from_secs(90));

        let d: SpecDuration = "250ms".parse().unwrap();
        assert_eq!(d.0, Duration::from_millis(250));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<SpecDuration>().is_err());
        assert!("10".parse::<SpecDuration>().is_err());
        assert!("10x".parse::<SpecDuration>().is_err());
        assert!("-1s".parse::<SpecDuration>().is_err());
        assert!("h".parse::<SpecDuration>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for secs in [0, 2, 90, 3600, 5400] {
            let d = SpecDuration::from_secs(secs);
            assert_eq!(d.to_string().parse::<SpecDuration>().unwrap(), d);
        }
        let d = SpecDuration(Duration::from_millis(1500));
        assert_eq!(d.to_string().parse::<SpecDuration>().unwrap(), d);
        assert_eq!(SpecDuration::ZERO.to_string(), "0s");
    }

    #[test]
    fn test_yaml_accepts_string_and_integer() {
        let d: SpecDuration = serde_yaml::from_str("\"2s\"").unwrap();
        assert_eq!(d, SpecDuration::from_secs(2));
        let d: SpecDuration = serde_yaml::from_str("2000000000").unwrap();
        assert_eq!(d, SpecDuration::from_secs(2));
        assert_eq!(serde_yaml::to_string(&d).unwrap().trim(), "2s");
        assert!(serde_yaml::from_str::<SpecDuration>("-5").is_err());
    }
}
