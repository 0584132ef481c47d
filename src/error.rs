use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Terminal reasons a beacon scan session can fail. Preflight variants mean
/// the radio was never started; `Radio` carries the platform error code of a
/// mid-scan failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanFailure {
    #[error("Bluetooth not available")]
    RadioUnavailable,
    #[error("Bluetooth is disabled")]
    RadioDisabled,
    #[error("Bluetooth scan permission not granted")]
    PermissionDenied,
    #[error("Scan failed with code: {0}")]
    Radio(i32),
}

/// Everything a punch attempt can fail with, across the whole decision flow.
#[derive(Debug, Error)]
pub enum PunchError {
    // Precondition failures: user-correctable, try again from a better spot.
    #[error("Location unavailable")]
    LocationUnavailable,
    #[error("Outside office by {distance_m:.0} m")]
    OutsideGeofence { distance_m: f64 },
    #[error("Beacon not found or too far")]
    BeaconNotFound,
    #[error(transparent)]
    Scan(#[from] ScanFailure),

    // State conflicts: the client's view of today's record is stale; it
    // should re-sync from the live feed rather than retry the same request.
    #[error("Already punched in")]
    AlreadyPunchedIn,
    #[error("Already punched out")]
    AlreadyPunchedOut,
    #[error("No active session")]
    NoActiveSession,
    #[error("Daily target already reached")]
    DailyTargetReached,

    // Infrastructure. Never auto-retried here: a blind retry of a punch-out
    // that actually committed would double-count the session.
    #[error("Operation timed out")]
    Timeout,
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl PunchError {
    /// Stable machine-readable identifier for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            PunchError::LocationUnavailable => "location_unavailable",
            PunchError::OutsideGeofence { .. } => "outside_geofence",
            PunchError::BeaconNotFound => "beacon_not_found",
            PunchError::Scan(ScanFailure::RadioUnavailable) => "radio_unavailable",
            PunchError::Scan(ScanFailure::RadioDisabled) => "radio_disabled",
            PunchError::Scan(ScanFailure::PermissionDenied) => "permission_denied",
            PunchError::Scan(ScanFailure::Radio(_)) => "radio_error",
            PunchError::AlreadyPunchedIn => "already_punched_in",
            PunchError::AlreadyPunchedOut => "already_punched_out",
            PunchError::NoActiveSession => "no_active_session",
            PunchError::DailyTargetReached => "daily_target_reached",
            PunchError::Timeout => "timeout",
            PunchError::Storage(_) => "storage_error",
        }
    }
}

impl ResponseError for PunchError {
    fn status_code(&self) -> StatusCode {
        match self {
            PunchError::AlreadyPunchedIn
            | PunchError::AlreadyPunchedOut
            | PunchError::NoActiveSession
            | PunchError::DailyTargetReached => StatusCode::CONFLICT,
            PunchError::LocationUnavailable
            | PunchError::OutsideGeofence { .. }
            | PunchError::BeaconNotFound
            | PunchError::Scan(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PunchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            PunchError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            PunchError::Storage(e) => {
                tracing::error!(error = %e, "attendance storage error");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": message,
            "code": self.code(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_map_to_409() {
        assert_eq!(PunchError::AlreadyPunchedIn.status_code(), StatusCode::CONFLICT);
        assert_eq!(PunchError::NoActiveSession.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn geofence_message_names_the_distance() {
        let err = PunchError::OutsideGeofence { distance_m: 612.4 };
        assert_eq!(err.to_string(), "Outside office by 612 m");
    }

    #[test]
    fn storage_details_stay_out_of_the_response() {
        let err = PunchError::Storage(sqlx::Error::PoolTimedOut);
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
