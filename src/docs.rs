use crate::api::attendance::{PunchRequest, ReportedAdvertisement};
use crate::model::attendance::{AttendanceStatus, DailyAttendanceRecord, PunchMethod};
use crate::model::beacon::{BeaconDescriptor, BeaconObservation};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "InOut Attendance API",
        version = "1.0.0",
        description = r#"
## InOut — mobile workforce attendance

Backend for geofenced, beacon-confirmed daily punch in/out.

### 🔹 Key Features
- **Punch in / punch out**
  - At most one open session per day; multiple sessions accumulate worked time
- **Geofencing**
  - Punches are validated against the configured office radius
- **Beacon confirmation**
  - Client-captured iBeacon sightings are re-verified server side
- **Live record feed**
  - Server-sent events push today's record as it changes

### 🔐 Security
All endpoints require a **JWT Bearer token** issued by the identity provider.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::punch_in,
        crate::api::attendance::punch_out,
        crate::api::attendance::today,
        crate::api::attendance::today_stream,
    ),
    components(
        schemas(
            PunchRequest,
            ReportedAdvertisement,
            DailyAttendanceRecord,
            AttendanceStatus,
            PunchMethod,
            BeaconDescriptor,
            BeaconObservation
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance punch and live-record APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
