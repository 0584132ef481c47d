use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Admin-configured beacon identity plus the minimum signal strength at which
/// a sighting counts as "at the office". Immutable for the duration of a scan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BeaconDescriptor {
    pub beacon_id: String,
    pub uuid: Uuid,
    pub major: u16,
    pub minor: u16,
    /// Minimum acceptable RSSI in dBm, e.g. -70.
    pub rssi_threshold: i16,
    pub label: String,
    pub enabled: bool,
}

impl BeaconDescriptor {
    pub fn matches(&self, uuid: Uuid, major: u16, minor: u16) -> bool {
        self.enabled && self.uuid == uuid && self.major == major && self.minor == minor
    }
}

/// One decoded sighting of a configured beacon. Lives only inside a scan
/// session; never persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BeaconObservation {
    pub beacon_id: String,
    pub label: String,
    pub rssi: i16,
    pub rssi_threshold: i16,
    pub seen_at: DateTime<Utc>,
}

impl BeaconObservation {
    /// A sighting only confirms proximity when it meets its descriptor's
    /// threshold.
    pub fn qualifies(&self) -> bool {
        self.rssi >= self.rssi_threshold
    }
}

/// Terminal output of one scan session: the strongest qualifying observation,
/// or an explicit none.
#[derive(Debug, Clone)]
pub enum BestBeaconResult {
    Match(BeaconObservation),
    NoMatch,
}

impl BestBeaconResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, BestBeaconResult::Match(_))
    }

    pub fn observation(&self) -> Option<&BeaconObservation> {
        match self {
            BestBeaconResult::Match(obs) => Some(obs),
            BestBeaconResult::NoMatch => None,
        }
    }
}
