use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::beacon::decoder;
use crate::error::ScanFailure;
use crate::model::beacon::{BeaconDescriptor, BeaconObservation, BestBeaconResult};

/// One advertisement as delivered by the radio stack.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub company_id: u16,
    pub payload: Vec<u8>,
    pub rssi: i16,
}

#[derive(Debug)]
pub enum RadioEvent {
    Advertisement(Advertisement),
    /// Platform-level scan failure with its error code.
    Failed(i32),
}

/// Seam to the radio stack. `start` hands back the event channel; the
/// implementation delivers advertisements until `stop` is called or it closes
/// the channel itself.
pub trait RadioAdapter {
    /// Adapter presence, power and permission checks, before anything starts.
    fn preflight(&self) -> Result<(), ScanFailure>;
    fn start(&self) -> Result<mpsc::Receiver<RadioEvent>, ScanFailure>;
    /// Idempotently halt delivery.
    fn stop(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Completed,
    Failed,
}

/// Fixed scan window; signal strength can improve for its whole duration.
pub const SCAN_TIMEOUT: Duration = Duration::from_millis(6000);

/// A bounded-duration scan session over one radio adapter.
///
/// Aggregates repeated sightings per configured beacon, keeping only the
/// strongest observation for each, and resolves to the single best qualifying
/// observation when the window closes. The scan is never short-circuited by
/// an early match since signal strength can still improve.
pub struct BeaconProximityScanner<R: RadioAdapter> {
    adapter: R,
    descriptors: Vec<BeaconDescriptor>,
    timeout: Duration,
    active: AtomicBool,
    state: Mutex<ScanState>,
}

/// Halts the radio when the scan exits, on every path including cancellation.
struct StopOnExit<'a, R: RadioAdapter>(&'a R);

impl<R: RadioAdapter> Drop for StopOnExit<'_, R> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Clears the in-flight flag when the session ends, however it ends.
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<R: RadioAdapter> BeaconProximityScanner<R> {
    pub fn new(adapter: R, descriptors: Vec<BeaconDescriptor>) -> Self {
        Self {
            adapter,
            descriptors,
            timeout: SCAN_TIMEOUT,
            active: AtomicBool::new(false),
            state: Mutex::new(ScanState::Idle),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: ScanState) {
        *self.state.lock().unwrap() = state;
    }

    /// Run one scan session to its terminal outcome, invoking `on_sighting`
    /// each time some beacon's best-so-far observation improves.
    ///
    /// Returns `None` when a session is already in flight: a repeated start is
    /// a no-op, not an error, and the live session keeps sole ownership of its
    /// observation map.
    pub async fn scan(
        &self,
        mut on_sighting: impl FnMut(&BeaconObservation) + Send,
    ) -> Option<Result<BestBeaconResult, ScanFailure>> {
        if self.active.swap(true, Ordering::SeqCst) {
            warn!("scan already in progress");
            return None;
        }
        let _active = ActiveGuard(&self.active);

        let outcome = self.run(&mut on_sighting).await;
        self.set_state(match outcome {
            Ok(_) => ScanState::Completed,
            Err(_) => ScanState::Failed,
        });
        Some(outcome)
    }

    async fn run(
        &self,
        on_sighting: &mut (dyn FnMut(&BeaconObservation) + Send),
    ) -> Result<BestBeaconResult, ScanFailure> {
        self.adapter.preflight()?;
        let mut events = self.adapter.start()?;
        let _radio = StopOnExit(&self.adapter);
        self.set_state(ScanState::Scanning);
        debug!(timeout_ms = self.timeout.as_millis() as u64, "BLE scan started");

        // Best observation so far per beacon id. Owned by this session alone;
        // dropped with it.
        let mut found: HashMap<String, BeaconObservation> = HashMap::new();

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                ev = events.recv() => match ev {
                    Some(RadioEvent::Advertisement(adv)) => {
                        self.process(&adv, &mut found, on_sighting);
                    }
                    Some(RadioEvent::Failed(code)) => {
                        warn!(code, "BLE scan failed");
                        return Err(ScanFailure::Radio(code));
                    }
                    // Radio closed the stream; nothing more can arrive.
                    None => break,
                },
            }
        }

        let best = best_of(found);
        debug!(valid = best.is_valid(), "BLE scan complete");
        Ok(best)
    }

    fn process(
        &self,
        adv: &Advertisement,
        found: &mut HashMap<String, BeaconObservation>,
        on_sighting: &mut (dyn FnMut(&BeaconObservation) + Send),
    ) {
        let Some(frame) = decoder::decode(adv.company_id, &adv.payload) else {
            return;
        };
        let Some(config) = self
            .descriptors
            .iter()
            .find(|d| d.matches(frame.uuid, frame.major, frame.minor))
        else {
            return;
        };

        // Keep the strongest signal per beacon; on a tie the earliest wins.
        let improved = found
            .get(&config.beacon_id)
            .is_none_or(|prev| adv.rssi > prev.rssi);
        if !improved {
            return;
        }

        let obs = BeaconObservation {
            beacon_id: config.beacon_id.clone(),
            label: config.label.clone(),
            rssi: adv.rssi,
            rssi_threshold: config.rssi_threshold,
            seen_at: Utc::now(),
        };
        debug!(
            beacon = %obs.label,
            rssi = obs.rssi,
            valid = obs.qualifies(),
            "beacon sighted"
        );
        on_sighting(&obs);
        found.insert(config.beacon_id.clone(), obs);
    }
}

/// Strongest observation meeting its threshold, across all beacons.
fn best_of(found: HashMap<String, BeaconObservation>) -> BestBeaconResult {
    found
        .into_values()
        .filter(BeaconObservation::qualifies)
        .max_by_key(|obs| obs.rssi)
        .map_or(BestBeaconResult::NoMatch, BestBeaconResult::Match)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::decoder::{APPLE_COMPANY_ID, OFFICE_UUID, frame_bytes};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    const GUEST_UUID: &str = "f7826da6-4fa2-4e98-8024-bc5b71e0893e";

    fn descriptor(id: &str, uuid: &str, threshold: i16, enabled: bool) -> BeaconDescriptor {
        BeaconDescriptor {
            beacon_id: id.into(),
            uuid: Uuid::parse_str(uuid).unwrap(),
            major: 1,
            minor: 1,
            rssi_threshold: threshold,
            label: id.to_uppercase(),
            enabled,
        }
    }

    fn adv(uuid: &str, rssi: i16) -> RadioEvent {
        RadioEvent::Advertisement(Advertisement {
            company_id: APPLE_COMPANY_ID,
            payload: frame_bytes(uuid, 1, 1, -59),
            rssi,
        })
    }

    /// Scripted radio: hands out a pre-filled event channel. Leaving `hold`
    /// set keeps the channel open so the session runs to its timeout.
    struct MockRadio {
        preflight: Result<(), ScanFailure>,
        events: Mutex<Option<mpsc::Receiver<RadioEvent>>>,
        hold: Mutex<Option<mpsc::Sender<RadioEvent>>>,
        stops: AtomicUsize,
    }

    impl MockRadio {
        fn scripted(events: Vec<RadioEvent>, hold_open: bool) -> Self {
            let (tx, rx) = mpsc::channel(events.len().max(1));
            for ev in events {
                tx.try_send(ev).unwrap();
            }
            Self {
                preflight: Ok(()),
                events: Mutex::new(Some(rx)),
                hold: Mutex::new(hold_open.then_some(tx)),
                stops: AtomicUsize::new(0),
            }
        }

        fn failing_preflight(failure: ScanFailure) -> Self {
            let mut radio = Self::scripted(Vec::new(), false);
            radio.preflight = Err(failure);
            radio
        }

        fn stop_count(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    impl RadioAdapter for MockRadio {
        fn preflight(&self) -> Result<(), ScanFailure> {
            self.preflight
        }

        fn start(&self) -> Result<mpsc::Receiver<RadioEvent>, ScanFailure> {
            Ok(self.events.lock().unwrap().take().expect("single start"))
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.hold.lock().unwrap().take();
        }
    }

    fn office_descriptors() -> Vec<BeaconDescriptor> {
        vec![
            descriptor("office-main", OFFICE_UUID, -70, true),
            descriptor("guest-area", GUEST_UUID, -70, true),
        ]
    }

    #[tokio::test]
    async fn preflight_failures_never_start_the_radio() {
        for failure in [
            ScanFailure::RadioUnavailable,
            ScanFailure::RadioDisabled,
            ScanFailure::PermissionDenied,
        ] {
            let radio = MockRadio::failing_preflight(failure);
            let scanner = BeaconProximityScanner::new(radio, office_descriptors());
            let outcome = scanner.scan(|_| {}).await.unwrap();
            assert_eq!(outcome.unwrap_err(), failure);
            assert_eq!(scanner.state(), ScanState::Failed);
            assert_eq!(scanner.adapter.stop_count(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn best_of_selection_prefers_strongest_qualifying() {
        // Beacon A at -80 then -65 (threshold -70); beacon B at -90 never
        // qualifies. Final result must be A at -65.
        let radio = MockRadio::scripted(
            vec![
                adv(OFFICE_UUID, -80),
                adv(GUEST_UUID, -90),
                adv(OFFICE_UUID, -65),
            ],
            false,
        );
        let scanner = BeaconProximityScanner::new(radio, office_descriptors());

        let mut sightings = Vec::new();
        let outcome = scanner
            .scan(|obs| sightings.push((obs.beacon_id.clone(), obs.rssi)))
            .await
            .unwrap()
            .unwrap();

        let best = outcome.observation().expect("valid result");
        assert_eq!(best.beacon_id, "office-main");
        assert_eq!(best.rssi, -65);
        // Every new best was reported, including the not-yet-qualifying ones.
        assert_eq!(
            sightings,
            vec![
                ("office-main".to_string(), -80),
                ("guest-area".to_string(), -90),
                ("office-main".to_string(), -65),
            ]
        );
        assert_eq!(scanner.state(), ScanState::Completed);
        assert_eq!(scanner.adapter.stop_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn equal_rssi_keeps_the_earliest_observation() {
        let radio = MockRadio::scripted(vec![adv(OFFICE_UUID, -65), adv(OFFICE_UUID, -65)], false);
        let scanner = BeaconProximityScanner::new(radio, office_descriptors());

        let mut notifications = 0;
        let outcome = scanner.scan(|_| notifications += 1).await.unwrap().unwrap();

        assert!(outcome.is_valid());
        assert_eq!(notifications, 1, "tie must not count as a new best");
    }

    #[tokio::test(start_paused = true)]
    async fn no_qualifying_observation_yields_the_invalid_sentinel() {
        let radio = MockRadio::scripted(vec![adv(OFFICE_UUID, -85)], false);
        let scanner = BeaconProximityScanner::new(radio, office_descriptors());
        let outcome = scanner.scan(|_| {}).await.unwrap().unwrap();
        assert!(!outcome.is_valid());
        assert!(outcome.observation().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_descriptors_are_ignored() {
        let radio = MockRadio::scripted(vec![adv(OFFICE_UUID, -40)], false);
        let scanner = BeaconProximityScanner::new(
            radio,
            vec![descriptor("office-main", OFFICE_UUID, -70, false)],
        );
        let outcome = scanner.scan(|_| {}).await.unwrap().unwrap();
        assert!(!outcome.is_valid());
    }

    #[tokio::test(start_paused = true)]
    async fn irrelevant_advertisements_are_silently_skipped() {
        let noise = RadioEvent::Advertisement(Advertisement {
            company_id: 0x0059,
            payload: frame_bytes(OFFICE_UUID, 1, 1, -59),
            rssi: -40,
        });
        let radio = MockRadio::scripted(vec![noise, adv(OFFICE_UUID, -60)], false);
        let scanner = BeaconProximityScanner::new(radio, office_descriptors());
        let outcome = scanner.scan(|_| {}).await.unwrap().unwrap();
        assert_eq!(outcome.observation().unwrap().rssi, -60);
    }

    #[tokio::test(start_paused = true)]
    async fn scan_runs_to_the_timeout_when_the_radio_stays_open() {
        let radio = MockRadio::scripted(vec![adv(OFFICE_UUID, -60)], true);
        let scanner = BeaconProximityScanner::new(radio, office_descriptors())
            .with_timeout(Duration::from_millis(6000));

        let started = tokio::time::Instant::now();
        let outcome = scanner.scan(|_| {}).await.unwrap().unwrap();
        assert!(outcome.is_valid(), "early match must not short-circuit");
        assert!(started.elapsed() >= Duration::from_millis(6000));
        assert_eq!(scanner.adapter.stop_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mid_scan_radio_failure_reports_the_platform_code() {
        let radio = MockRadio::scripted(
            vec![adv(OFFICE_UUID, -60), RadioEvent::Failed(2)],
            true,
        );
        let scanner = BeaconProximityScanner::new(radio, office_descriptors());
        let outcome = scanner.scan(|_| {}).await.unwrap();
        assert_eq!(outcome.unwrap_err(), ScanFailure::Radio(2));
        assert_eq!(scanner.state(), ScanState::Failed);
        // The radio is still released on the failure path.
        assert_eq!(scanner.adapter.stop_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_start_is_a_no_op_with_one_terminal_result() {
        let radio = MockRadio::scripted(vec![adv(OFFICE_UUID, -60)], true);
        let scanner = Arc::new(
            BeaconProximityScanner::new(radio, office_descriptors())
                .with_timeout(Duration::from_millis(6000)),
        );

        let first = {
            let scanner = Arc::clone(&scanner);
            tokio::spawn(async move { scanner.scan(|_| {}).await.is_some() })
        };
        // Let the first session reach its select loop before the second start.
        tokio::task::yield_now().await;

        let second = scanner.scan(|_| {}).await;
        assert!(second.is_none(), "second start must be a no-op");

        assert!(first.await.unwrap(), "exactly one terminal result");
        assert_eq!(scanner.adapter.stop_count(), 1);
    }
}
