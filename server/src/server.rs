use std::collections::HashMap;
use std::num::Wrapping;
use std::sync::Arc;
use std::time::Instant;

use system::{
    cursor_color, epoch_millis, is_valid_room_id, ClientCommand, ConnectionId, DrawOp, RoomId,
    ServerEvent,
};
use tokio::sync::mpsc::{channel, Sender};

use crate::connection::ConnectionEvent;
use crate::connection_tx_storage::{ConnectionTx, ConnectionTxStorage};
use crate::persistence::PersistenceWriter;
use crate::presence::{PresenceTracker, EVICT_EVERY, STALE_AFTER};
use crate::room_registry::{HistoryState, RoomRegistry};
use crate::session::SessionRecord;
use crate::store::DrawingStore;

pub type ServerTx = Sender<ServerCommand>;

#[derive(Debug)]
pub enum ServerCommand {
    Connect {
        tx: ConnectionTx,
    },
    Disconnect {
        from: ConnectionId,
    },
    Client {
        from: ConnectionId,
        command: ClientCommand,
    },
    /// Reply from a room's persistence queue with the loaded history.
    HistoryLoaded {
        room_id: RoomId,
        ops: Vec<DrawOp>,
    },
}

/// The connection gateway and single event-processing stream. Every
/// inbound event across all connections runs through `handle_command` as a
/// short non-suspending step; only the persistence workers do store I/O.
pub struct Server {
    connection_id_source: Wrapping<ConnectionId>,
    registry: RoomRegistry,
    presence: PresenceTracker,
    sessions: HashMap<ConnectionId, SessionRecord>,
    connections: ConnectionTxStorage,
    writer: PersistenceWriter,
    srv_tx: ServerTx,
}

impl Server {
    pub fn new(store: Arc<dyn DrawingStore>, srv_tx: ServerTx) -> Self {
        Self {
            connection_id_source: Wrapping(0),
            registry: RoomRegistry::new(),
            presence: PresenceTracker::new(),
            sessions: HashMap::new(),
            connections: ConnectionTxStorage::new(),
            writer: PersistenceWriter::new(store),
            srv_tx,
        }
    }

    pub fn handle_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connect { tx } => {
                let connection_id = self.new_connection_id();
                let color = cursor_color(connection_id).to_owned();
                self.sessions
                    .insert(connection_id, SessionRecord::new(connection_id, color));
                self.connections.insert(connection_id, tx);
                self.connections
                    .send(connection_id, ConnectionEvent::Connected { connection_id });
                log::info!("connection {} established", connection_id);
            }
            ServerCommand::Disconnect { from } => {
                if let Some(room_id) = self.sessions.get(&from).and_then(|s| s.room_id.clone()) {
                    self.leave_room(from, &room_id);
                }
                self.sessions.remove(&from);
                self.connections.remove(from);
                log::info!("connection {} closed", from);
            }
            ServerCommand::Client { from, command } => self.handle_client_command(from, command),
            ServerCommand::HistoryLoaded { room_id, ops } => {
                if let Some(room) = self.registry.get_mut(&room_id) {
                    let waiting = room.complete_load(ops);
                    let snapshot = room.ready_ops().map(|o| o.to_vec()).unwrap_or_default();
                    for connection_id in waiting {
                        self.connections.send(
                            connection_id,
                            ConnectionEvent::Event(ServerEvent::InitDrawing {
                                ops: snapshot.clone(),
                            }),
                        );
                    }
                } else {
                    log::debug!("history loaded for inactive room {}", room_id);
                }
            }
        }
    }

    fn handle_client_command(&mut self, from: ConnectionId, command: ClientCommand) {
        match command {
            ClientCommand::JoinRoom { room_id } => self.handle_join(from, room_id),
            ClientCommand::LeaveRoom { room_id } => {
                if self.session_in_room(from, &room_id) {
                    self.leave_room(from, &room_id);
                }
            }
            ClientCommand::CursorMove { room_id, x, y, .. } => {
                if !self.session_in_room(from, &room_id) {
                    return;
                }
                // Relay the assigned color, not the client-sent one, so
                // every observer sees the same participant color.
                let color = match self.sessions.get(&from) {
                    Some(session) => session.cursor_color.clone(),
                    None => return,
                };
                self.presence
                    .record_cursor(&room_id, from, x, y, &color, Instant::now());
                self.broadcast_room_event(
                    &room_id,
                    ServerEvent::CursorMove {
                        connection_id: from,
                        x,
                        y,
                        color,
                    },
                    Some(from),
                );
            }
            ClientCommand::CursorLeave { room_id } => {
                if !self.session_in_room(from, &room_id) {
                    return;
                }
                if self.presence.remove_participant(&room_id, from) {
                    self.broadcast_room_event(
                        &room_id,
                        ServerEvent::CursorLeave {
                            connection_id: from,
                        },
                        Some(from),
                    );
                }
            }
            ClientCommand::DrawStart {
                room_id,
                x,
                y,
                color,
                width,
            } => {
                if !self.session_in_room(from, &room_id) {
                    return;
                }
                if let Some(session) = self.sessions.get_mut(&from) {
                    session.begin_stroke(x, y, color.clone(), width);
                }
                self.broadcast_room_event(
                    &room_id,
                    ServerEvent::DrawStart {
                        connection_id: from,
                        x,
                        y,
                        color,
                        width,
                    },
                    Some(from),
                );
            }
            ClientCommand::DrawMove { room_id, x, y } => {
                if !self.session_in_room(from, &room_id) {
                    return;
                }
                if let Some(session) = self.sessions.get_mut(&from) {
                    session.push_point(x, y);
                }
                self.broadcast_room_event(
                    &room_id,
                    ServerEvent::DrawMove {
                        connection_id: from,
                        x,
                        y,
                    },
                    Some(from),
                );
            }
            ClientCommand::DrawEnd {
                room_id,
                path,
                color,
                width,
            } => {
                if !self.session_in_room(from, &room_id) {
                    return;
                }
                // Relay first; persistence is an independent path and its
                // outcome never affects what live peers already received.
                self.broadcast_room_event(
                    &room_id,
                    ServerEvent::DrawEnd {
                        connection_id: from,
                        path: path.clone(),
                        color: color.clone(),
                        width,
                    },
                    Some(from),
                );
                let stroke = match self.sessions.get_mut(&from) {
                    Some(session) => session.end_stroke(path, color, width),
                    None => return,
                };
                let op = DrawOp::Stroke(stroke);
                if let Some(room) = self.registry.get_mut(&room_id) {
                    room.apply_op(op.clone());
                }
                self.writer.append(&room_id, op);
            }
            ClientCommand::ClearCanvas { room_id } => {
                if !self.session_in_room(from, &room_id) {
                    return;
                }
                self.broadcast_room_event(&room_id, ServerEvent::ClearCanvas, None);
                let op = DrawOp::Clear {
                    timestamp: epoch_millis(),
                };
                if let Some(room) = self.registry.get_mut(&room_id) {
                    room.apply_op(op);
                }
                self.writer.reset(&room_id);
            }
        }
    }

    fn handle_join(&mut self, from: ConnectionId, room_id: RoomId) {
        if !is_valid_room_id(&room_id) {
            log::debug!("connection {}: dropping join with invalid room id", from);
            return;
        }
        let prev_room = match self.sessions.get(&from) {
            Some(session) => session.room_id.clone(),
            None => {
                log::warn!("join from unknown connection {}", from);
                return;
            }
        };
        // A second join while joined switches rooms.
        if let Some(prev) = prev_room {
            if prev != room_id {
                self.leave_room(from, &prev);
            }
        }

        let (room, created) = self.registry.ensure_room(&room_id);
        let snapshot = match &mut room.history {
            HistoryState::Ready(ops) => Some(ops.clone()),
            HistoryState::Loading { waiting, .. } => {
                if !waiting.contains(&from) {
                    waiting.push(from);
                }
                None
            }
        };
        if created {
            self.writer.load(&room_id, self.srv_tx.clone());
        }
        self.registry.join(&room_id, from);
        if let Some(session) = self.sessions.get_mut(&from) {
            session.room_id = Some(room_id.clone());
        }
        log::info!("connection {} joined room {}", from, room_id);

        let count = self.registry.participant_count(&room_id);
        self.broadcast_room_event(&room_id, ServerEvent::UserCount { count }, None);
        if let Some(ops) = snapshot {
            self.connections.send(
                from,
                ConnectionEvent::Event(ServerEvent::InitDrawing { ops }),
            );
        }
    }

    fn leave_room(&mut self, from: ConnectionId, room_id: &str) {
        let count = self.registry.leave(room_id, from);
        let had_cursor = self.presence.remove_participant(room_id, from);
        if let Some(session) = self.sessions.get_mut(&from) {
            session.room_id = None;
            session.discard_stroke();
        }
        log::info!("connection {} left room {}", from, room_id);
        if count == 0 {
            return;
        }
        if had_cursor {
            self.broadcast_room_event(
                room_id,
                ServerEvent::CursorLeave {
                    connection_id: from,
                },
                None,
            );
        }
        self.broadcast_room_event(room_id, ServerEvent::UserCount { count }, None);
        self.broadcast_room_event(
            room_id,
            ServerEvent::UserDisconnected {
                connection_id: from,
            },
            None,
        );
    }

    pub fn evict_stale_cursors(&mut self) {
        for (room_id, connection_id) in self.presence.evict_stale(Instant::now(), STALE_AFTER) {
            self.broadcast_room_event(&room_id, ServerEvent::CursorLeave { connection_id }, None);
        }
    }

    fn broadcast_room_event(
        &mut self,
        room_id: &str,
        event: ServerEvent,
        without: Option<ConnectionId>,
    ) {
        let recipients = self.registry.participants(room_id).to_vec();
        for connection_id in recipients {
            if without.map_or(true, |w| w != connection_id) {
                self.connections
                    .send(connection_id, ConnectionEvent::Event(event.clone()));
            }
        }
    }

    fn session_in_room(&self, from: ConnectionId, room_id: &str) -> bool {
        let joined = self
            .sessions
            .get(&from)
            .map(|s| s.in_room(room_id))
            .unwrap_or(false);
        if !joined {
            log::debug!(
                "connection {}: dropping event for room {} it is not in",
                from,
                room_id
            );
        }
        joined
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        self.connection_id_source += Wrapping(1);
        self.connection_id_source.0
    }
}

/// Starts the event loop. The eviction timer is owned by the loop and
/// stops with it; the loop itself lives as long as the runtime.
pub fn spawn_server(store: Arc<dyn DrawingStore>) -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ServerCommand>(64);
    let loop_tx = srv_tx.clone();

    tokio::spawn(async move {
        let mut server = Box::new(Server::new(store, loop_tx));
        let mut evict = tokio::time::interval(EVICT_EVERY);

        loop {
            tokio::select! {
                command = srv_rx.recv() => match command {
                    Some(command) => server.handle_command(command),
                    None => break,
                },
                _ = evict.tick() => server.evict_stale_cursors(),
            }
        }
        log::info!("server loop terminated");
    });

    srv_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn test_server() -> Server {
        let (srv_tx, _srv_rx) = channel::<ServerCommand>(8);
        Server::new(Arc::new(MemoryStore::new()), srv_tx)
    }

    fn connect(server: &mut Server) -> (ConnectionId, tokio::sync::mpsc::Receiver<ConnectionEvent>)
    {
        let (tx, mut rx) = channel::<ConnectionEvent>(32);
        server.handle_command(ServerCommand::Connect { tx });
        match rx.try_recv().unwrap() {
            ConnectionEvent::Connected { connection_id } => (connection_id, rx),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn it_switches_rooms_on_a_second_join() {
        let mut server = test_server();
        let (a, _rx) = connect(&mut server);

        server.handle_command(ServerCommand::Client {
            from: a,
            command: ClientCommand::JoinRoom {
                room_id: "one".into(),
            },
        });
        assert_eq!(server.registry.participant_count("one"), 1);

        server.handle_command(ServerCommand::Client {
            from: a,
            command: ClientCommand::JoinRoom {
                room_id: "two".into(),
            },
        });
        assert_eq!(server.registry.participant_count("one"), 0);
        assert_eq!(server.registry.participant_count("two"), 1);
        assert!(server.sessions.get(&a).unwrap().in_room("two"));
    }

    #[tokio::test]
    async fn it_does_not_send_the_old_rooms_snapshot_after_a_room_switch() {
        let mut server = test_server();
        let (a, mut a_rx) = connect(&mut server);
        let (b, mut b_rx) = connect(&mut server);

        // Both join "one" while its history load is still in flight, then
        // A switches to "two" before the load completes.
        for id in [a, b] {
            server.handle_command(ServerCommand::Client {
                from: id,
                command: ClientCommand::JoinRoom {
                    room_id: "one".into(),
                },
            });
        }
        server.handle_command(ServerCommand::Client {
            from: a,
            command: ClientCommand::JoinRoom {
                room_id: "two".into(),
            },
        });
        while a_rx.try_recv().is_ok() {}
        while b_rx.try_recv().is_ok() {}

        let stroke = DrawOp::Stroke(system::StrokeData {
            path: vec![system::Point { x: 1.0, y: 1.0 }],
            color: "#000".into(),
            width: 5.0,
            timestamp: 1,
        });
        server.handle_command(ServerCommand::HistoryLoaded {
            room_id: "one".into(),
            ops: vec![stroke.clone()],
        });

        // B still gets its snapshot; A, now in "two", must not.
        match b_rx.try_recv().unwrap() {
            ConnectionEvent::Event(ServerEvent::InitDrawing { ops }) => {
                assert_eq!(ops, vec![stroke]);
            }
            other => panic!("expected init-drawing, got {:?}", other),
        }
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn it_drops_events_for_rooms_the_sender_is_not_in() {
        let mut server = test_server();
        let (a, _a_rx) = connect(&mut server);
        let (b, mut b_rx) = connect(&mut server);
        for (id, room) in [(a, "one"), (b, "two")] {
            server.handle_command(ServerCommand::Client {
                from: id,
                command: ClientCommand::JoinRoom {
                    room_id: room.into(),
                },
            });
        }
        while b_rx.try_recv().is_ok() {}

        // A is in "one"; its events addressed to "two" must go nowhere.
        server.handle_command(ServerCommand::Client {
            from: a,
            command: ClientCommand::CursorMove {
                room_id: "two".into(),
                x: 1.0,
                y: 1.0,
                color: None,
            },
        });
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn it_discards_the_stroke_buffer_on_disconnect_mid_stroke() {
        let mut server = test_server();
        let (a, _rx) = connect(&mut server);
        server.handle_command(ServerCommand::Client {
            from: a,
            command: ClientCommand::JoinRoom {
                room_id: "abc123".into(),
            },
        });
        server.handle_command(ServerCommand::Client {
            from: a,
            command: ClientCommand::DrawStart {
                room_id: "abc123".into(),
                x: 1.0,
                y: 1.0,
                color: "#000".into(),
                width: 5.0,
            },
        });
        server.handle_command(ServerCommand::Disconnect { from: a });

        assert!(server.sessions.is_empty());
        assert!(server.registry.is_empty());
    }
}
