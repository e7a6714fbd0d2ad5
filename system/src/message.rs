use crate::types::{ConnectionId, DrawOp, Point, RoomId};
use serde::{Deserialize, Serialize};

/// Inbound real-time events, one per client frame.
///
/// Every room-scoped command carries the room id the client believes it is
/// in; the server drops commands whose room id does not match the session's
/// joined room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientCommand {
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    CursorMove {
        room_id: RoomId,
        x: f32,
        y: f32,
        /// Accepted for wire compatibility; the relayed color is always the
        /// server-assigned one.
        color: Option<String>,
    },
    CursorLeave {
        room_id: RoomId,
    },
    DrawStart {
        room_id: RoomId,
        x: f32,
        y: f32,
        color: String,
        width: f32,
    },
    DrawMove {
        room_id: RoomId,
        x: f32,
        y: f32,
    },
    DrawEnd {
        room_id: RoomId,
        path: Vec<Point>,
        color: String,
        width: f32,
    },
    ClearCanvas {
        room_id: RoomId,
    },
}

/// Outbound real-time events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerEvent {
    Connected {
        connection_id: ConnectionId,
    },
    /// Unicast join reply: the room's canonical ordered history.
    InitDrawing {
        ops: Vec<DrawOp>,
    },
    UserCount {
        count: usize,
    },
    CursorMove {
        connection_id: ConnectionId,
        x: f32,
        y: f32,
        color: String,
    },
    DrawStart {
        connection_id: ConnectionId,
        x: f32,
        y: f32,
        color: String,
        width: f32,
    },
    DrawMove {
        connection_id: ConnectionId,
        x: f32,
        y: f32,
    },
    DrawEnd {
        connection_id: ConnectionId,
        path: Vec<Point>,
        color: String,
        width: f32,
    },
    ClearCanvas,
    CursorLeave {
        connection_id: ConnectionId,
    },
    UserDisconnected {
        connection_id: ConnectionId,
    },
}
