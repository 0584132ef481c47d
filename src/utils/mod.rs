pub mod beacon_cache;
pub mod date;
