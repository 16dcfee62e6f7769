use serde::{Deserialize, Serialize};
use crate::models::position::Position;

pub type LocationId = i64;

/// A safety-inspected establishment as served by `/api/locations`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateLocation {
    pub id: LocationId,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub establishment: Option<String>,
    #[serde(default)]
    pub num_extinguisher: Option<u32>,
    #[serde(default)]
    pub first_aid: Option<bool>,
    #[serde(default)]
    pub sprinklers: Option<bool>,
    #[serde(default, rename = "emergncyExits")]
    pub emergency_exits: Option<u32>,
    #[serde(default)]
    pub last_inspection: Option<String>,
    #[serde(default)]
    pub accessibility: Option<String>,
}

impl CandidateLocation {
    pub fn new(id: LocationId, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: address.into(),
            establishment: None,
            num_extinguisher: None,
            first_aid: None,
            sprinklers: None,
            emergency_exits: None,
            last_inspection: None,
            accessibility: None,
        }
    }
}

/// A candidate whose address resolved to coordinates.
#[derive(Debug, Clone)]
pub struct GeocodedLocation {
    pub location: CandidateLocation,
    pub position: Position,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Marker {
    pub location: CandidateLocation,
    pub position: Position,
    pub distance_km: f64,
    pub favorite: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct FavoriteRef {
    #[serde(alias = "nombre")]
    pub name: String,
}
