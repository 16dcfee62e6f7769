use std::sync::Arc;
use async_trait::async_trait;
use crate::models::error::GatewayError;
use crate::models::location::{CandidateLocation, FavoriteRef};
use crate::models::position::Position;

pub mod http;
#[cfg(test)]
pub mod testing;

/// One forward geocoding match.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub position: Position,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn locations(&self) -> Result<Vec<CandidateLocation>, GatewayError>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best matches for `address`, best first. An empty list means no match.
    async fn geocode(&self, address: &str) -> Result<Vec<Place>, GatewayError>;

    /// Display name of the place at `position`, if the service knows one.
    async fn reverse_geocode(&self, position: Position) -> Result<Option<String>, GatewayError>;
}

#[async_trait]
pub trait FavoritesStore: Send + Sync {
    async fn favorites(&self, token: &str) -> Result<Vec<FavoriteRef>, GatewayError>;

    /// Adds or removes `name` from the user's favorites, returning the
    /// store's confirmation message.
    async fn toggle_favorite(&self, token: &str, name: &str) -> Result<String, GatewayError>;
}

#[derive(Clone)]
pub struct Gateways {
    pub locations: Arc<dyn LocationStore>,
    pub geocoder: Arc<dyn Geocoder>,
    pub favorites: Arc<dyn FavoritesStore>,
}
