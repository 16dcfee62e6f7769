use tokio::select;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use crate::handlers::events::Command;
use crate::handlers::tracker::ProximityTracker;
use crate::models::position::Position;
use crate::models::updates::RenderCommand;

/// Drives one [`ProximityTracker`].
///
/// Fixes arrive through a `watch` slot, so while an update is being processed
/// newer fixes replace each other and only the latest one is handled next.
/// Every step runs to completion before the next is taken.
pub struct TrackerActor {
    positions: watch::Receiver<Option<Position>>,
    commands: mpsc::Receiver<Command>,
    outbound: mpsc::Sender<RenderCommand>,
    tracker: ProximityTracker,
    bootstrapped: bool,
}

impl TrackerActor {
    pub fn new(positions: watch::Receiver<Option<Position>>,
               commands: mpsc::Receiver<Command>,
               outbound: mpsc::Sender<RenderCommand>,
               tracker: ProximityTracker) -> Self {
        Self {
            positions,
            commands,
            outbound,
            tracker,
            bootstrapped: false,
        }
    }

    pub async fn run_actor(mut self) {
        enum Message {
            Fix,
            Command(Command),
        }
        loop {
            let message = select! {
                changed = self.positions.changed() => changed.ok().map(|_| Message::Fix),
                command = self.commands.recv() => command.map(Message::Command),
            };

            let render = match message {
                Some(Message::Fix) => {
                    let fix = *self.positions.borrow_and_update();
                    match fix {
                        Some(position) => self.on_fix(position).await,
                        None => continue,
                    }
                }
                Some(Message::Command(command)) => self.on_command(command).await,
                None => {
                    info!("Session input closed");
                    return;
                }
            };

            for command in render {
                if self.outbound.send(command).await.is_err() {
                    info!("Session output closed");
                    return;
                }
            }
        }
    }

    async fn on_fix(&mut self, position: Position) -> Vec<RenderCommand> {
        debug!("Fix at {}", position);
        if self.bootstrapped {
            self.tracker.on_position_update(position)
        } else {
            self.bootstrapped = true;
            self.tracker.bootstrap(position).await
        }
    }

    async fn on_command(&mut self, command: Command) -> Vec<RenderCommand> {
        debug!("Command {:?}", command);
        match command {
            Command::ToggleFavorite(name) => self.tracker.toggle_favorite(&name).await,
            Command::Select(id) => self.tracker.select(id),
            Command::ListFavorites => self.tracker.list_favorites().await,
        }
    }
}
