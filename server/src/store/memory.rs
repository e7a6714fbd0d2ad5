//! In-memory store used by tests and as a persistence-free fallback.

use super::{DrawingStore, RoomRecord, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use system::{epoch_millis, DrawOp};

#[derive(Default)]
pub struct MemoryStore {
    rooms: Mutex<HashMap<String, RoomRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DrawingStore for MemoryStore {
    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRecord>, StoreError> {
        Ok(self.rooms.lock().unwrap().get(room_id).cloned())
    }

    async fn create_room(&self, room_id: &str) -> Result<RoomRecord, StoreError> {
        let mut rooms = self.rooms.lock().unwrap();
        Ok(rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| RoomRecord::new(room_id))
            .clone())
    }

    async fn append_draw_op(&self, room_id: &str, op: DrawOp) -> Result<(), StoreError> {
        let mut rooms = self.rooms.lock().unwrap();
        let record = rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| RoomRecord::new(room_id));
        record.drawing_data.push(op);
        record.last_activity = epoch_millis();
        Ok(())
    }

    async fn reset_draw_ops(&self, room_id: &str) -> Result<(), StoreError> {
        let mut rooms = self.rooms.lock().unwrap();
        let record = rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| RoomRecord::new(room_id));
        record.drawing_data = vec![DrawOp::Clear {
            timestamp: epoch_millis(),
        }];
        record.last_activity = epoch_millis();
        Ok(())
    }
}
