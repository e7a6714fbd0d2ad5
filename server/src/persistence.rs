use crate::server::{ServerCommand, ServerTx};
use crate::store::DrawingStore;
use std::collections::HashMap;
use std::sync::Arc;
use system::{DrawOp, RoomId};
use tokio::sync::mpsc::{channel, Sender};

const ROOM_QUEUE_DEPTH: usize = 64;

#[derive(Debug)]
enum WriteJob {
    Append(DrawOp),
    Reset,
    /// Read-through snapshot fetch. Runs on the same queue as writes, so
    /// the loaded history reflects every append enqueued before it.
    Load { reply: ServerTx },
}

/// Makes completed drawing actions durable, one worker task and queue per
/// room. Writes for a room never interleave; rooms are fully independent,
/// and a slow store never blocks the event loop: jobs are enqueued with
/// `try_send` and dropped (logged) if the room's queue is full.
pub struct PersistenceWriter {
    store: Arc<dyn DrawingStore>,
    rooms: HashMap<RoomId, Sender<WriteJob>>,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn DrawingStore>) -> Self {
        Self {
            store,
            rooms: HashMap::new(),
        }
    }

    pub fn append(&mut self, room_id: &str, op: DrawOp) {
        self.enqueue(room_id, WriteJob::Append(op));
    }

    pub fn reset(&mut self, room_id: &str) {
        self.enqueue(room_id, WriteJob::Reset);
    }

    pub fn load(&mut self, room_id: &str, reply: ServerTx) {
        self.enqueue(room_id, WriteJob::Load { reply });
    }

    fn enqueue(&mut self, room_id: &str, job: WriteJob) {
        let store = &self.store;
        let tx = self
            .rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| spawn_room_worker(room_id.to_owned(), store.clone()));
        if let Err(err) = tx.try_send(job) {
            // Lost persistence on overload is accepted; live peers already
            // saw the event through the broadcast path.
            log::warn!("room {}: persistence queue rejected job: {}", room_id, err);
        }
    }
}

fn spawn_room_worker(room_id: RoomId, store: Arc<dyn DrawingStore>) -> Sender<WriteJob> {
    let (tx, mut rx) = channel::<WriteJob>(ROOM_QUEUE_DEPTH);

    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            match job {
                WriteJob::Append(op) => {
                    if let Err(err) = store.append_draw_op(&room_id, op).await {
                        log::warn!("room {}: append failed, not retried: {}", room_id, err);
                    }
                }
                WriteJob::Reset => {
                    if let Err(err) = store.reset_draw_ops(&room_id).await {
                        log::warn!("room {}: reset failed, not retried: {}", room_id, err);
                    }
                }
                WriteJob::Load { reply } => {
                    let ops = match store.find_room(&room_id).await {
                        Ok(Some(record)) => record.drawing_data,
                        Ok(None) => Vec::new(),
                        Err(err) => {
                            log::warn!("room {}: snapshot load failed: {}", room_id, err);
                            Vec::new()
                        }
                    };
                    let _ = reply
                        .send(ServerCommand::HistoryLoaded {
                            room_id: room_id.clone(),
                            ops,
                        })
                        .await;
                }
            }
        }
        log::debug!("room {}: persistence worker terminated", room_id);
    });

    tx
}
