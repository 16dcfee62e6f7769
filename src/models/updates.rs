use serde::{Deserialize, Serialize};
use crate::models::location::{FavoriteRef, LocationId, Marker};
use crate::models::position::Position;

/// Messages a map client sends over its session socket.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Position(Position),
    ToggleFavorite { name: String },
    Select { id: LocationId },
    ListFavorites,
}

/// Data-only instructions for the client's map. Markers are keyed by
/// location id.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum RenderCommand {
    Located {
        position: Position,
        address: Option<String>,
    },
    MoveUser(Position),
    CenterView {
        position: Position,
        zoom: u8,
    },
    PanTo(Position),
    AddMarker(Marker),
    RemoveMarker { id: LocationId },
    RestyleMarker { id: LocationId, favorite: bool },
    ShowDetails(Marker),
    Favorites(Vec<FavoriteRef>),
    FavoriteToggled {
        name: String,
        favorite: bool,
        message: String,
    },
    Error { message: String },
}

impl RenderCommand {
    pub fn error(message: impl Into<String>) -> Self {
        RenderCommand::Error { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_externally_tagged() {
        let msg: ClientMessage = serde_json::from_str(r#"{"Position":{"lat":25.6,"lon":-100.3}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Position(Position::new(25.6, -100.3)));

        let msg: ClientMessage = serde_json::from_str(r#"{"ToggleFavorite":{"name":"Oxxo"}}"#).unwrap();
        assert_eq!(msg, ClientMessage::ToggleFavorite { name: "Oxxo".to_string() });

        let msg: ClientMessage = serde_json::from_str(r#""ListFavorites""#).unwrap();
        assert_eq!(msg, ClientMessage::ListFavorites);
    }

    #[test]
    fn remove_marker_shape() {
        let json = serde_json::to_value(RenderCommand::RemoveMarker { id: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"RemoveMarker": {"id": 4}}));
    }
}
