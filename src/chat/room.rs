//! Room identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A chat room, always a positive integer that fits the backend's `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(u32);

/// Rejection for a path segment that is not a usable room id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid room id")]
pub struct RoomIdError;

impl RoomId {
    /// Build a room id from a raw value. Zero is rejected.
    pub fn new(raw: u32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    /// Parses a signed decimal integer and keeps it only when it is positive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s.parse().map_err(|_| RoomIdError)?;
        let value = u32::try_from(value).map_err(|_| RoomIdError)?;
        Self::new(value).ok_or(RoomIdError)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_ids() {
        assert_eq!("42".parse::<RoomId>().unwrap().get(), 42);
        assert_eq!("+7".parse::<RoomId>().unwrap().get(), 7);
        assert_eq!("4294967295".parse::<RoomId>().unwrap().get(), u32::MAX);
    }

    #[test]
    fn rejects_everything_else() {
        for raw in ["0", "-1", "", "abc", "42/", "4.2", " 42", "4294967296", "99999999999999999999"] {
            assert_eq!(raw.parse::<RoomId>(), Err(RoomIdError), "{raw:?}");
        }
    }

    #[test]
    fn zero_is_not_a_room() {
        assert!(RoomId::new(0).is_none());
        assert_eq!(RoomId::new(3).map(RoomId::get), Some(3));
    }
}
