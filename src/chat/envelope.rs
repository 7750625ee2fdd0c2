//! Client envelope decoding.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::chat::event::ClientEvent;
use crate::chat::room::RoomId;

/// A chat message as the browser sends it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientEnvelope {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub sent_at_unix: Option<i64>,
}

impl ClientEnvelope {
    /// Decode one frame. A bare `null` is an empty envelope.
    pub fn parse(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<Option<Self>>(data).map(Option::unwrap_or_default)
    }

    /// Turn the envelope into a `Send` event for `room_id`.
    ///
    /// A missing or zero timestamp is replaced by `received_at`.
    pub fn into_event(self, room_id: RoomId, received_at: i64) -> ClientEvent {
        let sent_at_unix = match self.sent_at_unix {
            Some(ts) if ts != 0 => ts,
            _ => received_at,
        };
        ClientEvent::Send {
            room_id,
            text: self.message,
            sender_id: self.sender,
            sent_at_unix,
        }
    }
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::new(42).unwrap()
    }

    #[test]
    fn stamps_missing_timestamp() {
        let env = ClientEnvelope::parse(br#"{"message":"hi","sender":"alice"}"#).unwrap();
        assert_eq!(
            env.into_event(room(), 1_700_000_123),
            ClientEvent::Send {
                room_id: room(),
                text: "hi".into(),
                sender_id: "alice".into(),
                sent_at_unix: 1_700_000_123,
            }
        );
    }

    #[test]
    fn zero_and_null_timestamps_are_stamped() {
        for raw in [
            br#"{"message":"a","sender":"b","sent_at_unix":0}"#.as_slice(),
            br#"{"message":"a","sender":"b","sent_at_unix":null}"#.as_slice(),
        ] {
            let event = ClientEnvelope::parse(raw).unwrap().into_event(room(), 99);
            assert!(matches!(event, ClientEvent::Send { sent_at_unix: 99, .. }));
        }
    }

    #[test]
    fn explicit_timestamp_passes_through() {
        let env = ClientEnvelope::parse(br#"{"message":"a","sender":"b","sent_at_unix":1234}"#)
            .unwrap();
        assert!(matches!(
            env.into_event(room(), 99),
            ClientEvent::Send { sent_at_unix: 1234, .. }
        ));
    }

    #[test]
    fn lenient_about_missing_and_unknown_fields() {
        let env = ClientEnvelope::parse(br#"{"sender":"b","extra":[1,2]}"#).unwrap();
        assert_eq!(env.message, "");
        assert_eq!(env.sender, "b");
    }

    #[test]
    fn null_frame_is_an_empty_message() {
        let env = ClientEnvelope::parse(b"null").unwrap();
        assert_eq!(env, ClientEnvelope::default());
        assert_eq!(
            env.into_event(room(), 77),
            ClientEvent::Send {
                room_id: room(),
                text: String::new(),
                sender_id: String::new(),
                sent_at_unix: 77,
            }
        );
    }

    #[test]
    fn rejects_malformed_payloads() {
        for raw in [
            b"not json".as_slice(),
            b"[1,2,3]".as_slice(),
            br#"{"message":5}"#.as_slice(),
            br#"{"message":"a","sent_at_unix":"now"}"#.as_slice(),
        ] {
            assert!(ClientEnvelope::parse(raw).is_err());
        }
    }

    #[test]
    fn clock_is_after_2020() {
        assert!(unix_now() > 1_577_836_800);
    }
}
