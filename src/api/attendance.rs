use actix_web::{HttpResponse, Responder, web};
use futures_util::stream;
use serde::Deserialize;
use sqlx::MySqlPool;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::beacon::scanner::{Advertisement, RadioAdapter, RadioEvent};
use crate::error::ScanFailure;
use crate::model::attendance::DailyAttendanceRecord;
use crate::punch::{AttendanceFlow, GeoFix, LocationProvider};
use crate::utils::beacon_cache;

/// Punch request body. The client submits the raw evidence it captured; the
/// server re-runs the geofence and beacon checks itself.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "deviceId": "a1b2c3",
    "latitude": 23.7808875,
    "longitude": 90.2792371,
    "beaconSightings": [
        {"companyId": 76, "payload": "0215e2c56db5dffb48d2b060d0f5a71096e000010001c5", "rssi": -64}
    ]
}))]
pub struct PunchRequest {
    pub device_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub beacon_sightings: Vec<ReportedAdvertisement>,
}

/// One raw BLE advertisement captured by the client during its local scan.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportedAdvertisement {
    pub company_id: u16,
    /// Raw manufacturer-specific payload, hex encoded.
    pub payload: String,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

impl PunchRequest {
    fn location(&self) -> RequestLocation {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => RequestLocation(Some(GeoFix {
                latitude,
                longitude,
            })),
            _ => RequestLocation(None),
        }
    }

    fn radio(&self) -> ReportedRadio {
        let events = self
            .beacon_sightings
            .iter()
            .filter_map(|sighting| match hex::decode(&sighting.payload) {
                Ok(payload) => Some(RadioEvent::Advertisement(Advertisement {
                    company_id: sighting.company_id,
                    payload,
                    rssi: sighting.rssi,
                })),
                Err(_) => {
                    // Malformed evidence is radio noise, not an error.
                    debug!("dropping sighting with malformed hex payload");
                    None
                }
            })
            .collect();
        ReportedRadio::new(events)
    }
}

/// The coordinates the client reported with this request.
struct RequestLocation(Option<GeoFix>);

impl LocationProvider for RequestLocation {
    async fn last_known(&self) -> Option<GeoFix> {
        self.0
    }
}

/// Replays the client-captured advertisements into the scanner and closes the
/// stream, so the scan session completes without waiting out the radio
/// timeout.
struct ReportedRadio {
    events: Mutex<Option<Vec<RadioEvent>>>,
}

impl ReportedRadio {
    fn new(events: Vec<RadioEvent>) -> Self {
        Self {
            events: Mutex::new(Some(events)),
        }
    }
}

impl RadioAdapter for ReportedRadio {
    fn preflight(&self) -> Result<(), ScanFailure> {
        Ok(())
    }

    fn start(&self) -> Result<mpsc::Receiver<RadioEvent>, ScanFailure> {
        let events = self.events.lock().unwrap().take().unwrap_or_default();
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for ev in events {
            let _ = tx.try_send(ev);
        }
        // Dropping the sender closes the stream once the replay is consumed.
        Ok(rx)
    }

    fn stop(&self) {}
}

/// Punch-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    request_body = PunchRequest,
    responses(
        (status = 200, description = "Punched in successfully", body = DailyAttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already punched in"),
        (status = 422, description = "Precondition failed (geofence, beacon, location)"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch_in(
    auth: AuthUser,
    flow: web::Data<AttendanceFlow>,
    pool: web::Data<MySqlPool>,
    body: web::Json<PunchRequest>,
) -> actix_web::Result<impl Responder> {
    let descriptors = beacon_cache::enabled_descriptors(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to load beacon config");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let record = flow
        .punch_in(
            &auth.user_id,
            &body.device_id,
            &body.location(),
            body.radio(),
            &descriptors,
        )
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Punched in successfully",
        "record": record
    })))
}

/// Punch-out endpoint
#[utoipa::path(
    put,
    path = "/api/v1/attendance",
    request_body = PunchRequest,
    responses(
        (status = 200, description = "Punched out successfully", body = DailyAttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "No active session or already punched out"),
        (status = 422, description = "Precondition failed (geofence, beacon, location)"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch_out(
    auth: AuthUser,
    flow: web::Data<AttendanceFlow>,
    pool: web::Data<MySqlPool>,
    body: web::Json<PunchRequest>,
) -> actix_web::Result<impl Responder> {
    let descriptors = beacon_cache::enabled_descriptors(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to load beacon config");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let record = flow
        .punch_out(
            &auth.user_id,
            &body.device_id,
            &body.location(),
            body.radio(),
            &descriptors,
        )
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Punched out successfully",
        "record": record
    })))
}

/// Today's record
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today",
    responses(
        (status = 200, description = "Today's attendance record, null before the first punch",
         body = DailyAttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    flow: web::Data<AttendanceFlow>,
) -> actix_web::Result<impl Responder> {
    let record = flow.ledger().today(&auth.user_id).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Live feed of today's record as server-sent events. The first frame always
/// reflects the current persisted state; one frame follows per mutation.
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today/stream",
    responses(
        (status = 200, description = "text/event-stream of today's record"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today_stream(
    auth: AuthUser,
    flow: web::Data<AttendanceFlow>,
) -> actix_web::Result<impl Responder> {
    let rx = flow.ledger().observe_today(&auth.user_id).await?;

    let events = stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first {
            // Sender dropped: the feed is over.
            rx.changed().await.ok()?;
        }
        let json = serde_json::to_string(&*rx.borrow_and_update()).ok()?;
        let frame = web::Bytes::from(format!("data: {json}\n\n"));
        Some((Ok::<_, actix_web::Error>(frame), (rx, false)))
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(events))
}
