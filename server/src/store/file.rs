//! File-backed store: one JSON document per room under a data directory.

use super::{DrawingStore, RoomRecord, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use system::{epoch_millis, is_valid_room_id, DrawOp};
use tokio::fs;

pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_owned(),
        }
    }

    fn record_path(&self, room_id: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_room_id(room_id) {
            return Err(StoreError::InvalidRoomId(room_id.to_owned()));
        }
        Ok(self.data_dir.join(format!("{}.room.json", room_id)))
    }

    async fn read_record(&self, room_id: &str) -> Result<Option<RoomRecord>, StoreError> {
        let path = self.record_path(room_id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_record(&self, record: &RoomRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.room_id)?;
        fs::create_dir_all(&self.data_dir).await?;
        fs::write(&path, serde_json::to_vec(record)?).await?;
        Ok(())
    }
}

#[async_trait]
impl DrawingStore for FileStore {
    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRecord>, StoreError> {
        self.read_record(room_id).await
    }

    async fn create_room(&self, room_id: &str) -> Result<RoomRecord, StoreError> {
        if let Some(existing) = self.read_record(room_id).await? {
            return Ok(existing);
        }
        let record = RoomRecord::new(room_id);
        self.write_record(&record).await?;
        Ok(record)
    }

    async fn append_draw_op(&self, room_id: &str, op: DrawOp) -> Result<(), StoreError> {
        let mut record = self
            .read_record(room_id)
            .await?
            .unwrap_or_else(|| RoomRecord::new(room_id));
        record.drawing_data.push(op);
        record.last_activity = epoch_millis();
        self.write_record(&record).await
    }

    async fn reset_draw_ops(&self, room_id: &str) -> Result<(), StoreError> {
        let mut record = self
            .read_record(room_id)
            .await?
            .unwrap_or_else(|| RoomRecord::new(room_id));
        record.drawing_data = vec![DrawOp::Clear {
            timestamp: epoch_millis(),
        }];
        record.last_activity = epoch_millis();
        self.write_record(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use system::{visible_strokes, Point, StrokeData};

    fn stroke() -> DrawOp {
        DrawOp::Stroke(StrokeData {
            path: vec![Point { x: 10.0, y: 10.0 }, Point { x: 20.0, y: 20.0 }],
            color: "#000".into(),
            width: 5.0,
            timestamp: 1,
        })
    }

    #[tokio::test]
    async fn it_returns_none_for_unknown_rooms() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.find_room("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn it_appends_with_upsert_on_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.append_draw_op("abc123", stroke()).await.unwrap();
        store.append_draw_op("abc123", stroke()).await.unwrap();

        let record = store.find_room("abc123").await.unwrap().unwrap();
        assert_eq!(record.drawing_data.len(), 2);
    }

    #[tokio::test]
    async fn it_resets_to_a_single_clear_marker() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.append_draw_op("abc123", stroke()).await.unwrap();
        store.reset_draw_ops("abc123").await.unwrap();

        let record = store.find_room("abc123").await.unwrap().unwrap();
        assert_eq!(record.drawing_data.len(), 1);
        assert!(record.drawing_data[0].is_clear());
        assert!(visible_strokes(&record.drawing_data).is_empty());
    }

    #[tokio::test]
    async fn it_rejects_path_traversal_room_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.find_room("../oops").await,
            Err(StoreError::InvalidRoomId(_))
        ));
    }
}
