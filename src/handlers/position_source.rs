use std::time::Duration;
use futures::Stream;
use crate::models::error::ConfigError;
use crate::models::position::Position;

/// Fixes along `route`, at most `step_km` apart, one every `interval`.
///
/// Starts with the first waypoint and ends exactly on the last one.
pub fn walk(route: Vec<Position>, step_km: f64, interval: Duration) -> impl Stream<Item = Position> {
    async_stream::stream! {
        let mut ticker = tokio::time::interval(interval);
        let mut waypoints = route.into_iter();
        let Some(mut from) = waypoints.next() else { return };

        ticker.tick().await;
        yield from;

        for to in waypoints {
            let leg = from.distance_to(&to).km;
            let steps = if step_km > 0.0 { (leg / step_km).ceil().max(1.0) as u32 } else { 1 };
            for step in 1..=steps {
                let fix = if step == steps { to } else { from.lerp(&to, f64::from(step) / f64::from(steps)) };
                ticker.tick().await;
                yield fix;
            }
            from = to;
        }
    }
}

/// Parses `"lat,lon;lat,lon;..."`.
pub fn parse_route(raw: &str) -> Result<Vec<Position>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|waypoint| !waypoint.is_empty())
        .map(|waypoint| {
            let invalid = || ConfigError::Invalid {
                key: "SIMULATE_ROUTE",
                message: format!("bad waypoint {:?}", waypoint),
            };
            let (lat, lon) = waypoint.split_once(',').ok_or_else(invalid)?;
            let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
            let lon: f64 = lon.trim().parse().map_err(|_| invalid())?;
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err(invalid());
            }
            Ok(Position::new(lat, lon))
        })
        .collect()
}
