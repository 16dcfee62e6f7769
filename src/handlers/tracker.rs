use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument, warn};
use crate::gateways::Gateways;
use crate::handlers::geocode_cache::GeocodeCache;
use crate::models::location::{FavoriteRef, GeocodedLocation, LocationId, Marker};
use crate::models::position::Position;
use crate::models::updates::RenderCommand;

pub type VisibleSet = BTreeMap<LocationId, Marker>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerSettings {
    /// Markers farther than this are hidden.
    pub radius_km: f64,
    /// Minimum movement since the last recomputation before markers are
    /// recomputed.
    pub hysteresis_km: f64,
    /// Minimum movement between fixes before the view follows the user.
    pub pan_threshold_km: f64,
    pub zoom: u8,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            radius_km: 5.0,
            hysteresis_km: 0.03,
            pan_threshold_km: 0.2,
            zoom: 15,
        }
    }
}

/// Keeps the set of markers within `radius_km` of the user up to date.
///
/// The tracker does no rendering: every operation returns the
/// [`RenderCommand`]s the client has to apply.
pub struct ProximityTracker {
    gateways: Gateways,
    settings: TrackerSettings,
    token: Option<String>,
    cache: GeocodeCache,
    candidates: Vec<GeocodedLocation>,
    favorites: HashSet<String>,
    last_known: Option<Position>,
    last_recomputed_at: Option<Position>,
    visible: VisibleSet,
    recomputations: usize,
}

impl ProximityTracker {
    pub fn new(gateways: Gateways, settings: TrackerSettings, token: Option<String>) -> Self {
        Self {
            gateways,
            settings,
            token,
            cache: GeocodeCache::new(),
            candidates: Vec::new(),
            favorites: HashSet::new(),
            last_known: None,
            last_recomputed_at: None,
            visible: VisibleSet::new(),
            recomputations: 0,
        }
    }

    #[cfg(test)]
    pub fn last_known_position(&self) -> Option<Position> {
        self.last_known
    }

    #[cfg(test)]
    pub fn visible(&self) -> &VisibleSet {
        &self.visible
    }

    /// Number of full marker recomputations so far.
    #[cfg(test)]
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    #[instrument(skip(self, initial), fields(position = %initial))]
    pub async fn bootstrap(&mut self, initial: Position) -> Vec<RenderCommand> {
        let mut commands = Vec::new();

        let address = match self.gateways.geocoder.reverse_geocode(initial).await {
            Ok(address) => address,
            Err(e) => {
                warn!("Reverse geocoding failed: {}", e);
                None
            }
        };
        commands.push(RenderCommand::Located { position: initial, address });

        self.refresh_favorites().await;

        let candidates = match self.gateways.locations.locations().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Fetching locations failed: {}", e);
                Vec::new()
            }
        };
        for location in candidates {
            let resolved = self.resolve_coordinates(&location.address).await;
            match resolved {
                Some(position) => self.candidates.push(GeocodedLocation { location, position }),
                None => warn!("Skipping location {} ({:?}): address did not resolve", location.id, location.address),
            }
        }
        info!("Bootstrapped with {} resolved locations", self.candidates.len());

        commands.extend(self.on_position_update(initial));
        commands
    }

    pub fn on_position_update(&mut self, position: Position) -> Vec<RenderCommand> {
        let mut commands = vec![RenderCommand::MoveUser(position)];

        let recompute = match self.last_known {
            None => {
                commands.push(RenderCommand::CenterView { position, zoom: self.settings.zoom });
                true
            }
            Some(previous) => {
                if previous.distance_to(&position).km > self.settings.pan_threshold_km {
                    commands.push(RenderCommand::PanTo(position));
                }
                match self.last_recomputed_at {
                    Some(anchor) => anchor.distance_to(&position).km >= self.settings.hysteresis_km,
                    None => true,
                }
            }
        };

        if recompute {
            commands.extend(self.recompute(position));
        } else {
            debug!("Moved less than {} km, keeping markers", self.settings.hysteresis_km);
        }

        self.last_known = Some(position);
        commands
    }

    pub fn compute_visible_set(&self, position: Position) -> VisibleSet {
        self.candidates.iter()
            .filter_map(|candidate| {
                let distance = position.distance_to(&candidate.position).km;
                (distance <= self.settings.radius_km).then(|| (candidate.location.id, Marker {
                    location: candidate.location.clone(),
                    position: candidate.position,
                    distance_km: distance,
                    favorite: self.favorites.contains(&candidate.location.name),
                }))
            })
            .collect()
    }

    pub async fn resolve_coordinates(&mut self, address: &str) -> Option<Position> {
        self.cache.resolve(self.gateways.geocoder.as_ref(), address).await
    }

    fn recompute(&mut self, position: Position) -> Vec<RenderCommand> {
        let next = self.compute_visible_set(position);
        let mut commands = Vec::new();

        for id in self.visible.keys() {
            if !next.contains_key(id) {
                commands.push(RenderCommand::RemoveMarker { id: *id });
            }
        }
        for (id, marker) in &next {
            match self.visible.get(id) {
                None => commands.push(RenderCommand::AddMarker(marker.clone())),
                Some(shown) if shown.favorite != marker.favorite => {
                    commands.push(RenderCommand::RestyleMarker { id: *id, favorite: marker.favorite });
                }
                Some(_) => {}
            }
        }

        debug!("Recomputed markers at {}: {} visible", position, next.len());
        self.visible = next;
        self.last_recomputed_at = Some(position);
        self.recomputations += 1;
        commands
    }

    /// Reloads the user's favorites from the store. Returns `false` and keeps
    /// the previous set when the store cannot be reached.
    async fn refresh_favorites(&mut self) -> bool {
        let Some(token) = &self.token else { return false };
        match self.gateways.favorites.favorites(token).await {
            Ok(favorites) => {
                self.favorites = favorites.into_iter().map(|favorite| favorite.name).collect();
                true
            }
            Err(e) => {
                warn!("Fetching favorites failed: {}", e);
                false
            }
        }
    }

    /// Brings the favorite flag of every marker on the map in line with the
    /// favorites set.
    fn restyle_visible(&mut self) -> Vec<RenderCommand> {
        let mut commands = Vec::new();
        for marker in self.visible.values_mut() {
            let favorite = self.favorites.contains(&marker.location.name);
            if marker.favorite != favorite {
                marker.favorite = favorite;
                commands.push(RenderCommand::RestyleMarker { id: marker.location.id, favorite });
            }
        }
        commands
    }

    pub async fn toggle_favorite(&mut self, name: &str) -> Vec<RenderCommand> {
        let Some(token) = &self.token else {
            return vec![RenderCommand::error("Log in to manage favorites")];
        };
        let message = match self.gateways.favorites.toggle_favorite(token, name).await {
            Ok(message) => message,
            Err(e) => {
                warn!("Toggling favorite {:?} failed: {}", name, e);
                return vec![RenderCommand::error(format!("Could not update favorite {}", name))];
            }
        };

        // The store is the source of truth; another session of the same user
        // may have toggled it too.
        if !self.refresh_favorites().await && !self.favorites.remove(name) {
            self.favorites.insert(name.to_string());
        }
        let favorite = self.favorites.contains(name);

        let mut commands = vec![RenderCommand::FavoriteToggled {
            name: name.to_string(),
            favorite,
            message,
        }];
        commands.extend(self.restyle_visible());
        commands
    }

    pub async fn list_favorites(&mut self) -> Vec<RenderCommand> {
        if self.token.is_none() {
            return vec![RenderCommand::Favorites(Vec::new())];
        }
        self.refresh_favorites().await;
        let mut names: Vec<_> = self.favorites.iter().cloned().collect();
        names.sort();
        let mut commands = vec![RenderCommand::Favorites(names.into_iter()
            .map(|name| FavoriteRef { name })
            .collect())];
        commands.extend(self.restyle_visible());
        commands
    }

    pub fn select(&self, id: LocationId) -> Vec<RenderCommand> {
        match self.visible.get(&id) {
            Some(marker) => vec![RenderCommand::ShowDetails(marker.clone())],
            None => vec![RenderCommand::error(format!("Location {} is not on the map", id))],
        }
    }
}
