//! Durable store contract for room drawing history.
//!
//! The store is an opaque durable document store: one record per room,
//! holding the ordered `DrawOp` history. The server never assumes anything
//! about its internals beyond this interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use system::{epoch_millis, DrawOp, RoomId};
use thiserror::Error;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid room id: {0:?}")]
    InvalidRoomId(String),
}

/// Durable record for one room, mirroring the one-document-per-room model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    pub room_id: RoomId,
    pub drawing_data: Vec<DrawOp>,
    pub last_activity: u64,
}

impl RoomRecord {
    pub fn new(room_id: &str) -> Self {
        Self {
            room_id: room_id.to_owned(),
            drawing_data: Vec::new(),
            last_activity: epoch_millis(),
        }
    }
}

#[async_trait]
pub trait DrawingStore: Send + Sync {
    /// Fetch a room record. An unknown room is `Ok(None)`, not an error.
    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRecord>, StoreError>;

    /// Create an empty record, or return the existing one.
    async fn create_room(&self, room_id: &str) -> Result<RoomRecord, StoreError>;

    /// Append one op to the room's history, creating the record if absent.
    async fn append_draw_op(&self, room_id: &str, op: DrawOp) -> Result<(), StoreError>;

    /// Reset the room's history to a single clear marker.
    async fn reset_draw_ops(&self, room_id: &str) -> Result<(), StoreError>;
}
