use tokio::sync::{mpsc, watch};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::handlers::event_actor::TrackerActor;
use crate::handlers::events::{Command, Inbound};
use crate::handlers::tracker::ProximityTracker;
use crate::models::position::Position;
use crate::models::updates::{ClientMessage, RenderCommand};

struct AutoCancelTask<T>(pub JoinHandle<T>);

impl<T> Drop for AutoCancelTask<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// The channels of one tracking session plus its running tracker actor.
pub struct TrackingSession {
    actor: AutoCancelTask<()>,
    inputs: SessionInputs,
    outbound: mpsc::Receiver<RenderCommand>,
}

struct SessionInputs {
    positions: watch::Sender<Option<Position>>,
    commands: mpsc::Sender<Command>,
    errors: mpsc::Sender<RenderCommand>,
}

impl TrackingSession {
    pub fn new(tracker: ProximityTracker) -> Self {
        let (positions, positions_recv) = watch::channel(None);
        let (commands, commands_recv) = mpsc::channel(8);
        let (outbound_send, outbound) = mpsc::channel(256);

        let operator = TrackerActor::new(
            positions_recv,
            commands_recv,
            outbound_send.clone(),
            tracker);

        Self {
            actor: AutoCancelTask(tokio::spawn(operator.run_actor())),
            inputs: SessionInputs {
                positions,
                commands,
                errors: outbound_send,
            },
            outbound,
        }
    }

    /// Serves the session over `ws` until either side closes.
    pub async fn run(self, ws: WebSocket) {
        let Self { actor, inputs, outbound } = self;
        WebsocketActor::new(ws, inputs, outbound).run_actor().await;
        drop(actor);
    }
}

/// Routes one text frame. Returns `false` once the session can no longer
/// accept input.
async fn route_frame(text: &str, inputs: &SessionInputs) -> bool {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Malformed client message: {}", e);
            return inputs.errors
                .send(RenderCommand::error(format!("Malformed message: {}", e)))
                .await
                .is_ok();
        }
    };

    match Inbound::from(message) {
        Inbound::Fix(position) => inputs.positions.send(Some(position)).is_ok(),
        Inbound::Command(command) => inputs.commands.send(command).await.is_ok(),
    }
}

struct WebsocketActor {
    send_task: AutoCancelTask<()>,
    recv_task: AutoCancelTask<()>,
}

impl WebsocketActor {
    fn new(socket: WebSocket,
           inputs: SessionInputs,
           mut outbound: mpsc::Receiver<RenderCommand>) -> Self {
        let (mut ws_sender, mut ws_receiver) = socket.split();

        let inbound_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = ws_receiver.next().await {
                debug!("Received message from client: {:?}", msg);
                match msg {
                    Message::Text(text) => {
                        if !route_frame(&text, &inputs).await {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        let outbound_task = tokio::spawn(async move {
            while let Some(command) = outbound.recv().await {
                let msg = match serde_json::to_string(&command) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("Could not serialize {:?}: {}", command, e);
                        continue;
                    }
                };
                debug!("Sending message to client: {}", msg);
                if ws_sender.send(Message::Text(msg)).await.is_err() {
                    return;
                }
            }
            ws_sender.send(Message::Close(None)).await.ok();
        });

        Self {
            send_task: AutoCancelTask(outbound_task),
            recv_task: AutoCancelTask(inbound_task),
        }
    }

    async fn run_actor(mut self) {
        tokio::select! {
            _ = &mut self.send_task.0 => (),
            _ = &mut self.recv_task.0 => ()
        }
        info!("Session socket finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> (SessionInputs, watch::Receiver<Option<Position>>, mpsc::Receiver<Command>, mpsc::Receiver<RenderCommand>) {
        let (positions, positions_recv) = watch::channel(None);
        let (commands, commands_recv) = mpsc::channel(8);
        let (errors, errors_recv) = mpsc::channel(8);
        (SessionInputs { positions, commands, errors }, positions_recv, commands_recv, errors_recv)
    }

    #[tokio::test]
    async fn fixes_go_to_the_position_slot() {
        let (inputs, positions, _commands, _errors) = inputs();

        assert!(route_frame(r#"{"Position":{"lat":25.6,"lon":-100.3}}"#, &inputs).await);

        assert_eq!(*positions.borrow(), Some(Position::new(25.6, -100.3)));
    }

    #[tokio::test]
    async fn commands_go_to_the_queue() {
        let (inputs, _positions, mut commands, _errors) = inputs();

        assert!(route_frame(r#"{"Select":{"id":3}}"#, &inputs).await);

        assert_eq!(commands.recv().await, Some(Command::Select(3)));
    }

    #[tokio::test]
    async fn malformed_frames_are_reported() {
        let (inputs, _positions, _commands, mut errors) = inputs();

        assert!(route_frame("{not json", &inputs).await);

        assert!(matches!(errors.recv().await, Some(RenderCommand::Error { .. })));
    }

    #[tokio::test]
    async fn closed_session_stops_routing() {
        let (inputs, positions, _commands, _errors) = inputs();
        drop(positions);

        assert!(!route_frame(r#"{"Position":{"lat":0.0,"lon":0.0}}"#, &inputs).await);
    }
}
