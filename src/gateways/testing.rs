//! In-memory gateways with call counters.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use crate::gateways::{FavoritesStore, Gateways, Geocoder, LocationStore, Place};
use crate::models::error::GatewayError;
use crate::models::location::{CandidateLocation, FavoriteRef};
use crate::models::position::Position;

#[derive(Default)]
pub struct FakeBackend {
    pub locations: Vec<CandidateLocation>,
    pub locations_fail: bool,
    pub favorites_fail: bool,
    pub coordinates: HashMap<String, Position>,
    pub favorites: Mutex<HashSet<String>>,
    pub geocode_calls: AtomicUsize,
    pub reverse_calls: AtomicUsize,
    pub location_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a candidate that geocodes to `position`; `None` makes its
    /// address fail.
    pub fn with_location(mut self, id: i64, name: &str, position: Option<Position>) -> Self {
        let address = format!("{} address", name);
        if let Some(position) = position {
            self.coordinates.insert(address.clone(), position);
        }
        self.locations.push(CandidateLocation::new(id, name, address));
        self
    }

    pub fn with_favorite(self, name: &str) -> Self {
        self.favorites.lock().unwrap().insert(name.to_string());
        self
    }

    pub fn geocode_calls(&self) -> usize {
        self.geocode_calls.load(Ordering::SeqCst)
    }

    pub fn gateways(self: &Arc<Self>) -> Gateways {
        Gateways {
            locations: self.clone(),
            geocoder: self.clone(),
            favorites: self.clone(),
        }
    }
}

#[async_trait]
impl LocationStore for FakeBackend {
    async fn locations(&self) -> Result<Vec<CandidateLocation>, GatewayError> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        if self.locations_fail {
            return Err(GatewayError::Malformed("store offline".to_string()));
        }
        Ok(self.locations.clone())
    }
}

#[async_trait]
impl Geocoder for FakeBackend {
    async fn geocode(&self, address: &str) -> Result<Vec<Place>, GatewayError> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.coordinates.get(address)
            .map(|position| Place { position: *position, display_name: Some(address.to_string()) })
            .into_iter()
            .collect())
    }

    async fn reverse_geocode(&self, _position: Position) -> Result<Option<String>, GatewayError> {
        self.reverse_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some("Laderas del Mirador, Monterrey".to_string()))
    }
}

#[async_trait]
impl FavoritesStore for FakeBackend {
    async fn favorites(&self, _token: &str) -> Result<Vec<FavoriteRef>, GatewayError> {
        if self.favorites_fail {
            return Err(GatewayError::Malformed("favorites offline".to_string()));
        }
        let favorites = self.favorites.lock().unwrap();
        Ok(favorites.iter().map(|name| FavoriteRef { name: name.clone() }).collect())
    }

    async fn toggle_favorite(&self, _token: &str, name: &str) -> Result<String, GatewayError> {
        let mut favorites = self.favorites.lock().unwrap();
        if favorites.remove(name) {
            Ok("Favorito eliminado".to_string())
        } else {
            favorites.insert(name.to_string());
            Ok("Favorito agregado".to_string())
        }
    }
}
