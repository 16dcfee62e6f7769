use crate::models::location::LocationId;
use crate::models::position::Position;
use crate::models::updates::ClientMessage;

/// Requests for a session's tracker other than position fixes.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ToggleFavorite(String),
    Select(LocationId),
    ListFavorites,
}

/// A parsed client frame, split by the channel it travels on.
pub enum Inbound {
    Fix(Position),
    Command(Command),
}

impl From<ClientMessage> for Inbound {
    fn from(message: ClientMessage) -> Self {
        match message {
            ClientMessage::Position(position) => Inbound::Fix(position),
            ClientMessage::ToggleFavorite { name } => Inbound::Command(Command::ToggleFavorite(name)),
            ClientMessage::Select { id } => Inbound::Command(Command::Select(id)),
            ClientMessage::ListFavorites => Inbound::Command(Command::ListFavorites),
        }
    }
}
