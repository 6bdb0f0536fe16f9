//! Identifier newtypes shared across the model.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Identity of a single event within its owning sequence.
///
/// Ids are drawn from the sequence's monotonic counter and stay with the
/// event through edits, undo/redo and version control; only a move to
/// another sequence assigns a fresh one. On the wire an id is a compact
/// base-36 string ("0", "z", "1h", ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u32);

impl EventId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    fn encode(self) -> String {
        const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut n = self.0;
        let mut buf = [0u8; 7];
        let mut at = buf.len();
        loop {
            at -= 1;
            buf[at] = DIGITS[(n % 36) as usize];
            n /= 36;
            if n == 0 {
                break;
            }
        }
        String::from_utf8_lossy(&buf[at..]).into_owned()
    }

    fn decode(text: &str) -> Option<Self> {
        let mut n: u32 = 0;
        if text.is_empty() {
            return None;
        }
        for c in text.bytes() {
            let digit = match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'z' => c - b'a' + 10,
                _ => return None,
            };
            n = n.checked_mul(36)?.checked_add(digit as u32)?;
        }
        Some(Self(n))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::decode(&text)
            .ok_or_else(|| D::Error::custom(format!("malformed event id: {:?}", text)))
    }
}

/// Identity of a track, assigned once at creation and preserved across
/// undo/redo, checkouts and serialization. Also used for the project-info
/// pseudo-item in version control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(Uuid);

impl TrackId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for TrackId {
    fn from(raw: Uuid) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_encoding_round_trips() {
        for raw in [0u32, 1, 35, 36, 1295, 1296, u32::MAX] {
            let id = EventId::new(raw);
            assert_eq!(Some(id), EventId::decode(&id.encode()));
        }
    }

    #[test]
    fn event_id_rejects_garbage() {
        assert_eq!(None, EventId::decode(""));
        assert_eq!(None, EventId::decode("no spaces"));
        assert_eq!(None, EventId::decode("NEG"));
    }
}
