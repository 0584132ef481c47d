pub mod attendance;
pub mod beacon;
