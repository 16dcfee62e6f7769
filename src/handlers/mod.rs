pub mod event_actor;
pub mod events;
pub mod geocode_cache;
pub mod position_source;
pub mod tracker;
pub mod websocket_actor;
