use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::model::beacon::BeaconDescriptor;

const CACHE_KEY: &str = "enabled";

/// Enabled beacon descriptors, refreshed at most once a minute. Scans always
/// read through this cache so admin edits take effect without a restart.
static BEACON_CACHE: Lazy<Cache<&'static str, Arc<Vec<BeaconDescriptor>>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1)
        .time_to_live(Duration::from_secs(60))
        .build()
});

#[derive(sqlx::FromRow)]
struct BeaconRow {
    beacon_id: String,
    uuid: String,
    major: u16,
    minor: u16,
    rssi_threshold: i16,
    label: String,
    enabled: bool,
}

/// The current set of enabled beacon descriptors the scanner matches against.
pub async fn enabled_descriptors(pool: &MySqlPool) -> Result<Arc<Vec<BeaconDescriptor>>> {
    if let Some(hit) = BEACON_CACHE.get(CACHE_KEY).await {
        return Ok(hit);
    }

    let rows = sqlx::query_as::<_, BeaconRow>(
        r#"
        SELECT beacon_id, uuid, major, minor, rssi_threshold, label, enabled
        FROM beacons
        WHERE enabled = 1
        ORDER BY beacon_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut descriptors = Vec::with_capacity(rows.len());
    for row in rows {
        match Uuid::parse_str(&row.uuid) {
            Ok(uuid) => descriptors.push(BeaconDescriptor {
                beacon_id: row.beacon_id,
                uuid,
                major: row.major,
                minor: row.minor,
                rssi_threshold: row.rssi_threshold,
                label: row.label,
                enabled: row.enabled,
            }),
            Err(e) => {
                tracing::warn!(beacon_id = %row.beacon_id, error = %e, "skipping beacon with malformed uuid");
            }
        }
    }

    let descriptors = Arc::new(descriptors);
    BEACON_CACHE.insert(CACHE_KEY, descriptors.clone()).await;
    tracing::debug!(count = descriptors.len(), "beacon config cache refreshed");
    Ok(descriptors)
}
