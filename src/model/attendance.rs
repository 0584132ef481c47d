use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::PunchError;

/// Derived daily status. `PresentComplete` is reached only once the day's
/// accumulated minutes meet the configured target; `Absent`, `Weekoff` and
/// `Missed` are written by back-office jobs, never by the punch path.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    PresentInProgress,
    PresentComplete,
    Absent,
    Weekoff,
    Missed,
}

/// How a punch was verified.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PunchMethod {
    Manual,
    Geofence,
    Beacon,
    Qr,
}

/// One per (user, calendar date). Wire field names are part of the document
/// contract shared with mobile clients; do not rename.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "userId": "u_8f3a",
    "dateId": "2026-08-31",
    "inTime": "2026-08-31T03:05:00Z",
    "outTime": null,
    "firstInTime": "2026-08-31T03:05:00Z",
    "lastOutTime": null,
    "totalMinutes": 0,
    "status": "present_in_progress",
    "deviceId": "a1b2c3",
    "method": "geofence",
    "latitude": 23.7808875,
    "longitude": 90.2792371,
    "beaconId": null,
    "beaconRssi": null,
    "createdAt": "2026-08-31T03:05:00Z",
    "updatedAt": "2026-08-31T03:05:00Z"
}))]
pub struct DailyAttendanceRecord {
    pub user_id: String,
    /// `YYYY-MM-DD` in the user's local calendar.
    pub date_id: String,
    /// Start of the current or most recent session.
    pub in_time: Option<DateTime<Utc>>,
    /// End of the current session; `None` while a session is open.
    pub out_time: Option<DateTime<Utc>>,
    /// First check-in of the day; set once, never overwritten.
    pub first_in_time: Option<DateTime<Utc>>,
    /// Latest check-out of the day; only ever advances.
    pub last_out_time: Option<DateTime<Utc>>,
    /// Accumulated worked minutes across all sessions. Never decreases.
    pub total_minutes: i64,
    pub status: AttendanceStatus,
    pub device_id: String,
    pub method: PunchMethod,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub beacon_id: Option<String>,
    pub beacon_rssi: Option<i16>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyAttendanceRecord {
    /// The only state permitting a punch-out; any other permits a punch-in.
    pub fn has_open_session(&self) -> bool {
        self.in_time.is_some() && self.out_time.is_none()
    }
}

/// Per-punch metadata decided by the flow before the ledger runs.
#[derive(Debug, Clone)]
pub struct PunchContext {
    pub device_id: String,
    pub method: PunchMethod,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub beacon_id: Option<String>,
    pub beacon_rssi: Option<i16>,
}

/// Business knobs for the punch state machine.
#[derive(Debug, Clone, Copy)]
pub struct LedgerPolicy {
    pub daily_target_minutes: i64,
    /// Whether a fresh session may start after the day already hit the target.
    pub allow_punch_after_complete: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            daily_target_minutes: 540,
            allow_punch_after_complete: true,
        }
    }
}

/// Pure punch-in transition. The ledger runs this inside its transaction so
/// the rules stay testable without a database.
pub fn apply_punch_in(
    current: Option<&DailyAttendanceRecord>,
    user_id: &str,
    date_id: &str,
    ctx: &PunchContext,
    policy: LedgerPolicy,
    now: DateTime<Utc>,
) -> Result<DailyAttendanceRecord, PunchError> {
    match current {
        // First punch of the day creates the record lazily.
        None => Ok(DailyAttendanceRecord {
            user_id: user_id.to_string(),
            date_id: date_id.to_string(),
            in_time: Some(now),
            out_time: None,
            first_in_time: Some(now),
            last_out_time: None,
            total_minutes: 0,
            status: AttendanceStatus::PresentInProgress,
            device_id: ctx.device_id.clone(),
            method: ctx.method,
            latitude: ctx.latitude,
            longitude: ctx.longitude,
            beacon_id: ctx.beacon_id.clone(),
            beacon_rssi: ctx.beacon_rssi,
            created_at: now,
            updated_at: now,
        }),
        Some(rec) if rec.has_open_session() => Err(PunchError::AlreadyPunchedIn),
        Some(rec)
            if rec.status == AttendanceStatus::PresentComplete
                && !policy.allow_punch_after_complete =>
        {
            Err(PunchError::DailyTargetReached)
        }
        // Prior session closed: start a new one. Totals and status carry over.
        Some(rec) => {
            let mut next = rec.clone();
            next.in_time = Some(now);
            next.out_time = None;
            next.first_in_time = rec.first_in_time.or(Some(now));
            next.device_id = ctx.device_id.clone();
            next.method = ctx.method;
            next.latitude = ctx.latitude;
            next.longitude = ctx.longitude;
            next.beacon_id = ctx.beacon_id.clone();
            next.beacon_rssi = ctx.beacon_rssi;
            next.updated_at = now;
            Ok(next)
        }
    }
}

/// Pure punch-out transition.
pub fn apply_punch_out(
    current: Option<&DailyAttendanceRecord>,
    ctx: &PunchContext,
    policy: LedgerPolicy,
    now: DateTime<Utc>,
) -> Result<DailyAttendanceRecord, PunchError> {
    let rec = current.ok_or(PunchError::NoActiveSession)?;
    let in_time = rec.in_time.ok_or(PunchError::NoActiveSession)?;
    if rec.out_time.is_some() {
        return Err(PunchError::AlreadyPunchedOut);
    }

    // Whole minutes, truncated. Clamped so a skewed clock can never shrink
    // the running total.
    let elapsed = (now - in_time).num_minutes().max(0);

    let mut next = rec.clone();
    next.out_time = Some(now);
    next.last_out_time = Some(now);
    next.total_minutes = rec.total_minutes + elapsed;
    next.status = if next.total_minutes >= policy.daily_target_minutes {
        AttendanceStatus::PresentComplete
    } else {
        AttendanceStatus::PresentInProgress
    };
    next.device_id = ctx.device_id.clone();
    next.method = ctx.method;
    next.latitude = ctx.latitude;
    next.longitude = ctx.longitude;
    next.beacon_id = ctx.beacon_id.clone();
    next.beacon_rssi = ctx.beacon_rssi;
    next.updated_at = now;
    Ok(next)
}
