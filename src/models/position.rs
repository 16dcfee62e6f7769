use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Distance {
    pub km: f64
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance using the haversine formula on a sphere of
    /// radius [`EARTH_RADIUS_KM`].
    pub fn distance_to(&self, other: &Position) -> Distance {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
            + self.lat.to_radians().cos() * other.lat.to_radians().cos()
            * (d_lon / 2.0).sin() * (d_lon / 2.0).sin();
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        Distance { km: EARTH_RADIUS_KM * c }
    }

    /// Point `fraction` of the way towards `other`, interpolated linearly in
    /// degrees. Good enough for the few hundred meters between fixes.
    pub fn lerp(&self, other: &Position, fraction: f64) -> Position {
        Position {
            lat: self.lat + (other.lat - self.lat) * fraction,
            lon: self.lon + (other.lon - self.lon) * fraction,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}
