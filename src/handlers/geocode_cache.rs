use std::collections::HashMap;
use tracing::{debug, warn};
use crate::gateways::Geocoder;
use crate::models::position::Position;

/// Address to coordinate memo. Lives as long as its session and never
/// evicts; failed lookups are not remembered.
#[derive(Default)]
pub struct GeocodeCache {
    entries: HashMap<String, Position>,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<Position> {
        self.entries.get(address).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cache first; on a miss asks `geocoder` once and keeps the first match.
    pub async fn resolve(&mut self, geocoder: &dyn Geocoder, address: &str) -> Option<Position> {
        if let Some(position) = self.get(address) {
            debug!("Geocode cache hit for {:?}", address);
            return Some(position);
        }

        match geocoder.geocode(address).await {
            Ok(places) => match places.into_iter().next() {
                Some(place) => {
                    debug!("Geocoded {:?} as {:?}", address, place.display_name.as_deref().unwrap_or("unnamed place"));
                    self.entries.insert(address.to_string(), place.position);
                    Some(place.position)
                }
                None => {
                    warn!("No geocoding result for {:?}", address);
                    None
                }
            },
            Err(e) => {
                warn!("Geocoding {:?} failed: {}", address, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::gateways::testing::FakeBackend;

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let backend = Arc::new(FakeBackend::new().with_location(1, "Oxxo", Some(Position::new(25.6, -100.3))));
        let mut cache = GeocodeCache::new();

        let first = cache.resolve(&*backend, "Oxxo address").await;
        let second = cache.resolve(&*backend, "Oxxo address").await;

        assert_eq!(first, Some(Position::new(25.6, -100.3)));
        assert_eq!(first, second);
        assert_eq!(backend.geocode_calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn misses_are_not_stored() {
        let backend = Arc::new(FakeBackend::new());
        let mut cache = GeocodeCache::new();

        assert_eq!(cache.resolve(&*backend, "nowhere").await, None);
        assert!(cache.is_empty());
        assert_eq!(backend.geocode_calls(), 1);
    }
}
