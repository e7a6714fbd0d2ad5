use std::collections::HashMap;
use std::time::{Duration, Instant};
use system::{ConnectionId, RoomId};

/// A silently-dead connection stops updating its cursor; entries older than
/// this are evicted on the next sweep.
pub const STALE_AFTER: Duration = Duration::from_millis(3000);
/// Sweep cadence, independent of other traffic.
pub const EVICT_EVERY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct CursorPresence {
    pub x: f32,
    pub y: f32,
    pub color: String,
    pub last_seen: Instant,
}

/// Per-room map of connected participants' last-known cursor state.
pub struct PresenceTracker {
    rooms: HashMap<RoomId, HashMap<ConnectionId, CursorPresence>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    pub fn record_cursor(
        &mut self,
        room_id: &str,
        connection_id: ConnectionId,
        x: f32,
        y: f32,
        color: &str,
        now: Instant,
    ) {
        let entry = self
            .rooms
            .entry(room_id.to_owned())
            .or_insert_with(HashMap::new)
            .entry(connection_id)
            .or_insert_with(|| CursorPresence {
                x,
                y,
                color: color.to_owned(),
                last_seen: now,
            });
        entry.x = x;
        entry.y = y;
        entry.color = color.to_owned();
        entry.last_seen = now;
    }

    /// Removes entries not updated within `threshold`, returning what was
    /// evicted so the caller can broadcast the cursor removals.
    pub fn evict_stale(
        &mut self,
        now: Instant,
        threshold: Duration,
    ) -> Vec<(RoomId, ConnectionId)> {
        let mut evicted = Vec::new();
        for (room_id, cursors) in self.rooms.iter_mut() {
            cursors.retain(|connection_id, presence| {
                let stale = now.duration_since(presence.last_seen) > threshold;
                if stale {
                    log::debug!(
                        "room {}: evicting stale cursor of connection {} ({} at {}, {})",
                        room_id,
                        connection_id,
                        presence.color,
                        presence.x,
                        presence.y
                    );
                    evicted.push((room_id.clone(), *connection_id));
                }
                !stale
            });
        }
        self.rooms.retain(|_, cursors| !cursors.is_empty());
        evicted
    }

    /// Returns true when the participant had a live cursor entry.
    pub fn remove_participant(&mut self, room_id: &str, connection_id: ConnectionId) -> bool {
        let removed = self
            .rooms
            .get_mut(room_id)
            .map(|cursors| cursors.remove(&connection_id).is_some())
            .unwrap_or(false);
        self.rooms.retain(|_, cursors| !cursors.is_empty());
        removed
    }

    #[cfg(test)]
    pub fn cursor(&self, room_id: &str, connection_id: ConnectionId) -> Option<&CursorPresence> {
        self.rooms.get(room_id).and_then(|c| c.get(&connection_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_upserts_cursor_state() {
        let mut presence = PresenceTracker::new();
        let now = Instant::now();
        presence.record_cursor("abc123", 1, 10.0, 10.0, "#e6194b", now);
        presence.record_cursor("abc123", 1, 20.0, 25.0, "#e6194b", now);

        let cursor = presence.cursor("abc123", 1).unwrap();
        assert_eq!((cursor.x, cursor.y), (20.0, 25.0));
    }

    #[test]
    fn it_evicts_entries_older_than_the_threshold() {
        let mut presence = PresenceTracker::new();
        let start = Instant::now();
        presence.record_cursor("abc123", 1, 0.0, 0.0, "#e6194b", start);
        presence.record_cursor("abc123", 2, 0.0, 0.0, "#3cb44b", start + STALE_AFTER);

        // Worst case bound: one sweep interval plus the staleness threshold.
        let sweep = start + STALE_AFTER + EVICT_EVERY;
        let evicted = presence.evict_stale(sweep, STALE_AFTER);
        assert_eq!(evicted, vec![("abc123".to_owned(), 1)]);
        assert!(presence.cursor("abc123", 1).is_none());
        assert!(presence.cursor("abc123", 2).is_some());
    }

    #[test]
    fn it_removes_participants_on_leave() {
        let mut presence = PresenceTracker::new();
        presence.record_cursor("abc123", 1, 0.0, 0.0, "#e6194b", Instant::now());
        assert!(presence.remove_participant("abc123", 1));
        assert!(!presence.remove_participant("abc123", 1));
    }
}
