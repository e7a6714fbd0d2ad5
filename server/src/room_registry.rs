use std::collections::HashMap;
use system::{compact, epoch_millis, ConnectionId, DrawOp, RoomId};

/// Cached drawing history for one room.
///
/// The canonical history is loaded from the durable store on first access.
/// While the load is in flight, joiners queue up in `waiting` and ops that
/// arrive are staged; `complete_load` merges them after the loaded prefix.
/// The load job runs on the room's persistence queue, so a staged op can
/// never also appear in the loaded prefix.
#[derive(Debug)]
pub enum HistoryState {
    Loading {
        staged: Vec<DrawOp>,
        waiting: Vec<ConnectionId>,
    },
    Ready(Vec<DrawOp>),
}

#[derive(Debug)]
pub struct Room {
    pub participants: Vec<ConnectionId>,
    pub history: HistoryState,
    pub last_activity: u64,
}

impl Room {
    fn new() -> Self {
        Self {
            participants: Vec::new(),
            history: HistoryState::Loading {
                staged: Vec::new(),
                waiting: Vec::new(),
            },
            last_activity: epoch_millis(),
        }
    }

    pub fn apply_op(&mut self, op: DrawOp) {
        self.last_activity = epoch_millis();
        match &mut self.history {
            HistoryState::Loading { staged, .. } => staged.push(op),
            HistoryState::Ready(ops) => {
                if op.is_clear() {
                    ops.clear();
                }
                ops.push(op);
            }
        }
    }

    /// Finishes the read-through load. Returns the connections waiting for
    /// their `init-drawing` snapshot; no-op if the history is already ready.
    pub fn complete_load(&mut self, loaded: Vec<DrawOp>) -> Vec<ConnectionId> {
        match std::mem::replace(&mut self.history, HistoryState::Ready(Vec::new())) {
            HistoryState::Loading { staged, waiting } => {
                let mut ops = loaded;
                ops.extend(staged);
                self.history = HistoryState::Ready(compact(ops));
                waiting
            }
            ready @ HistoryState::Ready(_) => {
                self.history = ready;
                Vec::new()
            }
        }
    }

    pub fn ready_ops(&self) -> Option<&[DrawOp]> {
        match &self.history {
            HistoryState::Ready(ops) => Some(ops),
            HistoryState::Loading { .. } => None,
        }
    }
}

/// Authoritative in-memory map of live rooms. Owns the room entries and
/// their cached history; rooms are created lazily and the cache entry is
/// dropped once the last participant leaves (the durable record remains).
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Returns the room, creating an empty one on first access. The `bool`
    /// is true when the room was just created and needs a history load.
    pub fn ensure_room(&mut self, room_id: &str) -> (&mut Room, bool) {
        let created = !self.rooms.contains_key(room_id);
        let room = self
            .rooms
            .entry(room_id.to_owned())
            .or_insert_with(Room::new);
        (room, created)
    }

    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    pub fn participants(&self, room_id: &str) -> &[ConnectionId] {
        self.rooms
            .get(room_id)
            .map(|r| r.participants.as_slice())
            .unwrap_or(&[])
    }

    pub fn participant_count(&self, room_id: &str) -> usize {
        self.participants(room_id).len()
    }

    pub fn join(&mut self, room_id: &str, connection_id: ConnectionId) {
        let (room, _) = self.ensure_room(room_id);
        if !room.participants.contains(&connection_id) {
            room.participants.push(connection_id);
        }
    }

    /// Removes the participant and drops the cache entry when the room
    /// becomes empty. Returns the remaining participant count.
    pub fn leave(&mut self, room_id: &str, connection_id: ConnectionId) -> usize {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.participants.retain(|c| *c != connection_id);
            // A leaver must not receive this room's snapshot once the
            // in-flight load completes.
            if let HistoryState::Loading { waiting, .. } = &mut room.history {
                waiting.retain(|c| *c != connection_id);
            }
            if room.participants.is_empty() {
                self.rooms.remove(room_id);
                return 0;
            }
            return room.participants.len();
        }
        0
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use system::{Point, StrokeData};

    fn stroke(timestamp: u64) -> DrawOp {
        DrawOp::Stroke(StrokeData {
            path: vec![Point { x: 0.0, y: 0.0 }],
            color: "#000".into(),
            width: 1.0,
            timestamp,
        })
    }

    #[test]
    fn it_removes_the_room_when_all_participants_leave() {
        let mut registry = RoomRegistry::new();
        registry.join("abc123", 1);
        registry.join("abc123", 2);
        assert_eq!(registry.participant_count("abc123"), 2);

        assert_eq!(registry.leave("abc123", 1), 1);
        assert_eq!(registry.leave("abc123", 2), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn it_merges_staged_ops_after_the_loaded_prefix() {
        let mut registry = RoomRegistry::new();
        let (room, created) = registry.ensure_room("abc123");
        assert!(created);

        room.apply_op(stroke(10));
        if let HistoryState::Loading { waiting, .. } = &mut room.history {
            waiting.push(7);
        }

        let waiting = room.complete_load(vec![stroke(1), stroke(2)]);
        assert_eq!(waiting, vec![7]);

        let ops = room.ready_ops().unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(
            ops.iter()
                .map(|op| match op {
                    DrawOp::Stroke(s) => s.timestamp,
                    DrawOp::Clear { timestamp } => *timestamp,
                })
                .collect::<Vec<_>>(),
            vec![1, 2, 10]
        );
    }

    #[test]
    fn it_forgets_waiting_joiners_that_leave_during_a_load() {
        let mut registry = RoomRegistry::new();
        registry.join("abc123", 1);
        registry.join("abc123", 2);
        {
            let room = registry.get_mut("abc123").unwrap();
            if let HistoryState::Loading { waiting, .. } = &mut room.history {
                waiting.push(1);
                waiting.push(2);
            }
        }

        // 1 switches away while the load is still in flight.
        registry.leave("abc123", 1);

        let room = registry.get_mut("abc123").unwrap();
        assert_eq!(room.complete_load(vec![stroke(1)]), vec![2]);
    }

    #[test]
    fn it_compacts_when_a_clear_was_staged_during_load() {
        let mut registry = RoomRegistry::new();
        let (room, _) = registry.ensure_room("abc123");
        room.apply_op(DrawOp::Clear { timestamp: 5 });
        room.apply_op(stroke(6));

        room.complete_load(vec![stroke(1)]);
        let ops = room.ready_ops().unwrap();
        assert_eq!(ops, &[DrawOp::Clear { timestamp: 5 }, stroke(6)]);
    }

    #[test]
    fn it_truncates_ready_history_on_clear() {
        let mut registry = RoomRegistry::new();
        let (room, _) = registry.ensure_room("abc123");
        room.complete_load(vec![stroke(1), stroke(2)]);

        room.apply_op(DrawOp::Clear { timestamp: 3 });
        room.apply_op(stroke(4));

        let ops = room.ready_ops().unwrap();
        assert_eq!(ops, &[DrawOp::Clear { timestamp: 3 }, stroke(4)]);
    }
}
