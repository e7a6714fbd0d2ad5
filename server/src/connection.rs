use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;

use system::{bincode, ClientCommand, ConnectionId, ServerEvent};

use crate::server::{ServerCommand, ServerTx};

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    Event(ServerEvent),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    Idle,
    Connected(ConnectionId),
}

/// Transport glue: one actor per WebSocket, forwarding frames to the server
/// loop and serializing outbound events. Holds no room state of its own.
struct ConnectionActor {
    state: ConnectionState,
    srv_tx: ServerTx,
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(32);

        if self.srv_tx.try_send(ServerCommand::Connect { tx }).is_err() {
            log::warn!("server loop unavailable, closing incoming connection");
            ctx.stop();
            return;
        }

        let addr = ctx.address().recipient();

        tokio::spawn(async move {
            log::debug!("connection forwarder - started");
            while let Some(msg) = rx.recv().await {
                if addr.try_send(ConnectionActorMessage(msg)).is_err() {
                    break;
                }
            }
            log::debug!("connection forwarder - terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(id) = self.state {
            let _ = self.srv_tx.try_send(ServerCommand::Disconnect { from: id });
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Binary(bin)) => {
                if let ConnectionState::Connected(from) = self.state {
                    match bincode::deserialize::<ClientCommand>(&bin) {
                        Ok(command) => {
                            log::debug!("ingress {:?}", command);
                            if self
                                .srv_tx
                                .try_send(ServerCommand::Client { from, command })
                                .is_err()
                            {
                                log::warn!("server loop backpressure, dropping frame");
                            }
                        }
                        Err(_) => {
                            // Malformed frames are dropped; the connection
                            // stays open.
                            log::debug!("dropping malformed frame from {}", from);
                        }
                    }
                }
            }
            Ok(ws::Message::Close(_)) => {
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Connected { connection_id } => {
                self.state = ConnectionState::Connected(connection_id);
                self.send_event(ServerEvent::Connected { connection_id }, ctx);
            }
            ConnectionEvent::Event(event) => {
                log::debug!("egress {:?}", event);
                self.send_event(event, ctx);
            }
        }
    }
}

impl ConnectionActor {
    fn send_event(&self, event: ServerEvent, ctx: &mut ws::WebsocketContext<Self>) {
        match bincode::serialize(&event) {
            Ok(serialized) => ctx.binary(serialized),
            Err(err) => log::error!("failed to serialize outbound event: {}", err),
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, Error> {
    ws::start(
        ConnectionActor {
            state: ConnectionState::Idle,
            srv_tx: srv_tx.get_ref().clone(),
        },
        &req,
        stream,
    )
}
