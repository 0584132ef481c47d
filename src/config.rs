use std::env;
use std::time::Duration;

use dotenvy::dotenv;

use crate::model::attendance::LedgerPolicy;
use crate::punch::{GeoFix, PunchConfig};

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,

    // Office site
    pub office_latitude: Option<f64>,
    pub office_longitude: Option<f64>,
    pub geofence_radius_m: f64,
    pub beacon_required: bool,

    // Punch policy
    pub daily_target_minutes: i64,
    pub allow_punch_after_complete: bool,
    pub scan_timeout_ms: u64,
    pub op_timeout_secs: u64,

    // Rate limiting
    pub rate_punch_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),

            office_latitude: env::var("OFFICE_LAT").ok().map(|v| v.parse().unwrap()),
            office_longitude: env::var("OFFICE_LNG").ok().map(|v| v.parse().unwrap()),
            geofence_radius_m: env::var("GEOFENCE_RADIUS_M")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap(),
            beacon_required: env::var("BEACON_REQUIRED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap(),

            daily_target_minutes: env::var("DAILY_TARGET_MINUTES")
                .unwrap_or_else(|_| "540".to_string()) // 9 hours
                .parse()
                .unwrap(),
            allow_punch_after_complete: env::var("ALLOW_PUNCH_AFTER_COMPLETE")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap(),
            scan_timeout_ms: env::var("SCAN_TIMEOUT_MS")
                .unwrap_or_else(|_| "6000".to_string())
                .parse()
                .unwrap(),
            op_timeout_secs: env::var("OP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),

            rate_punch_per_min: env::var("RATE_PUNCH_PER_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            rate_protected_per_min: env::var("RATE_PROTECTED_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
        }
    }

    /// Both coordinates must be set for the geofence to apply.
    pub fn office(&self) -> Option<GeoFix> {
        match (self.office_latitude, self.office_longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoFix {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    pub fn punch_config(&self) -> PunchConfig {
        PunchConfig {
            office: self.office(),
            geofence_radius_m: self.geofence_radius_m,
            beacon_required: self.beacon_required,
            scan_timeout: Duration::from_millis(self.scan_timeout_ms),
            op_timeout: Duration::from_secs(self.op_timeout_secs),
        }
    }

    pub fn ledger_policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            daily_target_minutes: self.daily_target_minutes,
            allow_punch_after_complete: self.allow_punch_after_complete,
        }
    }
}
