use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use crate::gateways::{FavoritesStore, Geocoder, LocationStore, Place};
use crate::models::error::GatewayError;
use crate::models::location::{CandidateLocation, FavoriteRef};
use crate::models::position::Position;

pub fn client(user_agent: &str) -> Result<Client, GatewayError> {
    Ok(Client::builder().user_agent(user_agent).build()?)
}

fn check(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(GatewayError::Status(status))
    }
}

/// The application's REST backend: location list and per-user favorites.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }
}

#[async_trait]
impl LocationStore for ApiClient {
    async fn locations(&self) -> Result<Vec<CandidateLocation>, GatewayError> {
        let url = format!("{}/api/locations", self.base_url);
        debug!("GET {}", url);
        let response = check(self.client.get(url).send().await?)?;
        Ok(response.json().await?)
    }
}

#[derive(Deserialize)]
struct ToggleResponse {
    message: String,
}

#[async_trait]
impl FavoritesStore for ApiClient {
    async fn favorites(&self, token: &str) -> Result<Vec<FavoriteRef>, GatewayError> {
        let url = format!("{}/api/favorites", self.base_url);
        debug!("GET {}", url);
        let response = check(self.client.get(url).bearer_auth(token).send().await?)?;
        Ok(response.json().await?)
    }

    async fn toggle_favorite(&self, token: &str, name: &str) -> Result<String, GatewayError> {
        let url = format!("{}/api/favorites/toggle", self.base_url);
        debug!("POST {} ({})", url, name);
        let response = check(self.client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "nombreUbicacion": name }))
            .send().await?)?;
        let body: ToggleResponse = response.json().await?;
        Ok(body.message)
    }
}

/// Nominatim search and reverse endpoints.
pub struct Nominatim {
    client: Client,
    base_url: String,
    language: String,
}

impl Nominatim {
    pub fn new(client: Client, base_url: impl Into<String>, language: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, language: language.into() }
    }
}

#[derive(Deserialize)]
struct SearchHit {
    lat: Value,
    lon: Value,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct ReverseHit {
    #[serde(default)]
    display_name: Option<String>,
}

/// Nominatim encodes coordinates as strings, proxies sometimes as numbers.
fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn into_place(hit: SearchHit) -> Result<Place, GatewayError> {
    match (coordinate(&hit.lat), coordinate(&hit.lon)) {
        (Some(lat), Some(lon)) => Ok(Place {
            position: Position::new(lat, lon),
            display_name: hit.display_name,
        }),
        _ => Err(GatewayError::Malformed(format!("bad coordinates {} / {}", hit.lat, hit.lon))),
    }
}

fn parse_search(body: Value) -> Result<Vec<Place>, GatewayError> {
    let hits: Vec<SearchHit> = serde_json::from_value(body)
        .map_err(|e| GatewayError::Malformed(e.to_string()))?;
    hits.into_iter().map(into_place).collect()
}

#[async_trait]
impl Geocoder for Nominatim {
    async fn geocode(&self, address: &str) -> Result<Vec<Place>, GatewayError> {
        let url = format!("{}/search", self.base_url);
        debug!("GET {} q={}", url, address);
        let response = check(self.client
            .get(url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send().await?)?;
        parse_search(response.json().await?)
    }

    async fn reverse_geocode(&self, position: Position) -> Result<Option<String>, GatewayError> {
        let url = format!("{}/reverse", self.base_url);
        debug!("GET {} at {}", url, position);
        let lat = position.lat.to_string();
        let lon = position.lon.to_string();
        let response = check(self.client
            .get(url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("format", "json"),
                ("accept-language", self.language.as_str()),
            ])
            .send().await?)?;
        let hit: ReverseHit = response.json().await?;
        Ok(hit.display_name.filter(|name| !name.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_hits_with_string_coordinates() {
        let body = json!([{"lat": "25.0", "lon": "-100.0", "display_name": "Calle X"}]);
        let places = parse_search(body).unwrap();
        assert_eq!(places, vec![Place {
            position: Position::new(25.0, -100.0),
            display_name: Some("Calle X".to_string()),
        }]);
    }

    #[test]
    fn search_hits_with_numeric_coordinates() {
        let places = parse_search(json!([{"lat": 25.5, "lon": -100.5}])).unwrap();
        assert_eq!(places[0].position, Position::new(25.5, -100.5));
        assert_eq!(places[0].display_name, None);
    }

    #[test]
    fn empty_search_is_no_match() {
        assert!(parse_search(json!([])).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(parse_search(json!({"error": "x"})), Err(GatewayError::Malformed(_))));
        assert!(matches!(parse_search(json!([{"lat": "north", "lon": "1"}])), Err(GatewayError::Malformed(_))));
    }
}
