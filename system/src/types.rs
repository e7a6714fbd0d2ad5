use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub type ConnectionId = u64;
pub type RoomId = String;

pub const MAX_ROOM_ID_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeData {
    pub path: Vec<Point>,
    pub color: String,
    pub width: f32,
    pub timestamp: u64,
}

/// One durable, ordered unit of canvas history.
// Externally tagged so the same derive serves both the bincode wire and the
// JSON store documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawOp {
    Stroke(StrokeData),
    Clear { timestamp: u64 },
}

impl DrawOp {
    pub fn is_clear(&self) -> bool {
        matches!(self, DrawOp::Clear { .. })
    }
}

pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Room ids come from outside; they must stay safe to embed in file names
/// and URLs.
pub fn is_valid_room_id(room_id: &str) -> bool {
    !room_id.is_empty()
        && room_id.len() <= MAX_ROOM_ID_LEN
        && room_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_accepts_reasonable_room_ids() {
        assert!(is_valid_room_id("abc123"));
        assert!(is_valid_room_id("room_4-b"));
    }

    #[test]
    fn it_rejects_unsafe_room_ids() {
        assert!(!is_valid_room_id(""));
        assert!(!is_valid_room_id("../etc/passwd"));
        assert!(!is_valid_room_id("white board"));
        assert!(!is_valid_room_id(&"x".repeat(MAX_ROOM_ID_LEN + 1)));
    }
}
