//! Acquisition session tests against an in-memory advertisement source.
//!
//! Time is paused: the runtime auto-advances to the session deadline as soon
//! as every task is idle, so the timeout path runs instantly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use bodyscale_app::acquisition::AcquisitionSession;
use bodyscale_app::config::{AcquisitionConfig, ProtocolConfig};
use bodyscale_app::error::{AcquisitionError, PlatformError};
use bodyscale_app::ports::{
    AdapterState, Advertisement, AdvertisementSource, PermissionStatus, PlatformEvent,
};
use bodyscale_app::protocol::ProtocolRegistry;
use bodyscale_app::status::AcquisitionStatus;
use bodyscale_domain::metrics::Status;
use bodyscale_domain::profile::{Profile, Sex};
use bodyscale_domain::sample::WeightSample;
use bodyscale_domain::stabilizer::UnstableReason;
use bodyscale_domain::weight::Weight;

const SCALE: &str = "ED:67:37:01:02:03";

// ── fake platform ───────────────────────────────────────────────────────

struct FakeState {
    permission: PermissionStatus,
    adapter: AdapterState,
    sender: Option<mpsc::Sender<PlatformEvent>>,
    start_calls: usize,
    stop_calls: usize,
}

#[derive(Clone)]
struct FakeSource(Arc<Mutex<FakeState>>);

impl FakeSource {
    fn new(permission: PermissionStatus, adapter: AdapterState) -> Self {
        Self(Arc::new(Mutex::new(FakeState {
            permission,
            adapter,
            sender: None,
            start_calls: 0,
            stop_calls: 0,
        })))
    }

    fn ready() -> Self {
        Self::new(PermissionStatus::Granted, AdapterState::PoweredOn)
    }

    async fn emit(&self, event: PlatformEvent) {
        let sender = self.0.lock().unwrap().sender.clone().expect("scan running");
        sender.send(event).await.expect("session listening");
    }

    async fn emit_weight(&self, hundredths: u16) {
        self.emit(PlatformEvent::Advertisement(advert(SCALE, hundredths)))
            .await;
    }

    fn start_calls(&self) -> usize {
        self.0.lock().unwrap().start_calls
    }

    fn stop_calls(&self) -> usize {
        self.0.lock().unwrap().stop_calls
    }

    fn is_scanning(&self) -> bool {
        self.0.lock().unwrap().sender.is_some()
    }
}

impl AdvertisementSource for FakeSource {
    async fn adapter_state(&self) -> Result<AdapterState, PlatformError> {
        Ok(self.0.lock().unwrap().adapter)
    }

    async fn request_permissions(&self) -> Result<PermissionStatus, PlatformError> {
        Ok(self.0.lock().unwrap().permission)
    }

    async fn start_scan(&self) -> Result<mpsc::Receiver<PlatformEvent>, PlatformError> {
        let (tx, rx) = mpsc::channel(64);
        let mut state = self.0.lock().unwrap();
        state.sender = Some(tx);
        state.start_calls += 1;
        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<(), PlatformError> {
        let mut state = self.0.lock().unwrap();
        state.sender = None;
        state.stop_calls += 1;
        Ok(())
    }
}

// ── helpers ─────────────────────────────────────────────────────────────

fn advert(address: &str, hundredths: u16) -> Advertisement {
    let mut manufacturer_data = hundredths.to_be_bytes().to_vec();
    manufacturer_data.extend_from_slice(&[0x00, 0x01]);
    Advertisement {
        address: address.to_string(),
        name: None,
        rssi: Some(-58),
        manufacturer_data,
    }
}

fn session(source: &FakeSource) -> AcquisitionSession<FakeSource> {
    AcquisitionSession::new(
        source.clone(),
        AcquisitionConfig::default(),
        ProtocolRegistry::from_config(&ProtocolConfig::default()),
    )
}

struct Outputs {
    samples: mpsc::UnboundedReceiver<WeightSample>,
    statuses: mpsc::UnboundedReceiver<AcquisitionStatus>,
}

async fn start(
    session: &mut AcquisitionSession<FakeSource>,
) -> Result<Outputs, AcquisitionError> {
    let (sample_tx, samples) = mpsc::unbounded_channel();
    let (status_tx, statuses) = mpsc::unbounded_channel();
    session
        .start(
            move |sample| {
                let _ = sample_tx.send(*sample);
            },
            move |status| {
                let _ = status_tx.send(status);
            },
        )
        .await?;
    Ok(Outputs { samples, statuses })
}

/// Emit `count` identical readings 300 ms apart and return the status that
/// followed the last one.
async fn feed(
    source: &FakeSource,
    outputs: &mut Outputs,
    hundredths: u16,
    count: usize,
) -> AcquisitionStatus {
    let mut last = None;
    for _ in 0..count {
        source.emit_weight(hundredths).await;
        last = outputs.statuses.recv().await;
        tokio::time::advance(Duration::from_millis(300)).await;
    }
    last.expect("a status per sample")
}

fn adult_male() -> Profile {
    Profile::builder()
        .height_cm(175.0)
        .age(30)
        .sex(Sex::Male)
        .build()
        .unwrap()
}

// ── convergence ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn should_converge_on_ten_identical_readings() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();

    for expected in 1..10 {
        let status = feed(&source, &mut outputs, 7000, 1).await;
        assert_eq!(
            status,
            AcquisitionStatus::Collecting {
                count: expected,
                threshold: 10
            }
        );
    }
    let status = feed(&source, &mut outputs, 7000, 1).await;

    let AcquisitionStatus::Stable {
        weight,
        result,
        sample_count,
        spread_kg,
        trend_kg,
        ..
    } = status
    else {
        panic!("expected stable, got {status:?}");
    };
    assert_eq!(weight, Weight::from_hundredths(7000));
    assert_eq!(sample_count, 10);
    assert!(spread_kg.abs() < 1e-9);
    assert!(trend_kg.abs() < 1e-9);
    assert!(result.is_none());

    // Exactly one final status, and the scan was stopped.
    assert!(outputs.statuses.recv().await.is_none());
    assert_eq!(source.stop_calls(), 2);
    assert!(!session.is_active());
}

#[tokio::test(start_paused = true)]
async fn should_forward_every_sample_in_order() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();

    feed(&source, &mut outputs, 7000, 10).await;

    let mut sequences = Vec::new();
    let mut offsets = Vec::new();
    while let Some(sample) = outputs.samples.recv().await {
        sequences.push(sample.sequence);
        offsets.push(sample.offset_ms);
    }
    assert_eq!(sequences, (1..=10).collect::<Vec<_>>());
    assert_eq!(offsets, (0..10).map(|i| i * 300).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn should_derive_metrics_when_profile_is_set() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    session.set_profile(Some(adult_male()));
    let mut outputs = start(&mut session).await.unwrap();

    let status = feed(&source, &mut outputs, 7000, 10).await;

    let AcquisitionStatus::Stable {
        result: Some(result),
        ..
    } = status
    else {
        panic!("expected stable with result, got {status:?}");
    };
    assert!((result.bmi.value - 22.9).abs() <= 0.1);
    assert_eq!(result.bmi.status, Status::Healthy);
}

#[tokio::test(start_paused = true)]
async fn should_use_profile_set_during_session() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();

    feed(&source, &mut outputs, 7000, 5).await;
    session.set_profile(Some(adult_male()));
    let status = feed(&source, &mut outputs, 7000, 5).await;

    assert!(matches!(
        status,
        AcquisitionStatus::Stable {
            result: Some(_),
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn should_report_weight_without_result_when_profile_is_missing() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();

    let status = feed(&source, &mut outputs, 8340, 10).await;

    assert!(matches!(
        status,
        AcquisitionStatus::Stable { weight, result: None, .. }
            if weight == Weight::from_hundredths(8340)
    ));
}

#[tokio::test(start_paused = true)]
async fn should_ignore_foreign_and_implausible_advertisements() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();

    source
        .emit(PlatformEvent::Advertisement(advert("A4:C1:38:5B:0E:DF", 7000)))
        .await;
    source
        .emit(PlatformEvent::Advertisement(advert(SCALE, 2900)))
        .await;
    source
        .emit(PlatformEvent::Advertisement(Advertisement {
            manufacturer_data: vec![0x1B],
            ..advert(SCALE, 0)
        }))
        .await;
    let status = feed(&source, &mut outputs, 7000, 10).await;

    assert!(matches!(
        status,
        AcquisitionStatus::Stable {
            sample_count: 10,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn should_keep_stabilizing_while_readings_spread() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();

    let mut last = None;
    for step in 0..10u16 {
        last = Some(feed(&source, &mut outputs, 7000 + step * 11, 1).await);
    }

    assert!(matches!(
        last,
        Some(AcquisitionStatus::Stabilizing {
            reason: UnstableReason::SpreadTooWide { .. },
            ..
        })
    ));
    assert!(session.is_active());
    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn should_report_drift_when_spread_is_within_tolerance() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();

    // 0.10 kg spread is accepted, but the whole step lands in the second half.
    feed(&source, &mut outputs, 7000, 5).await;
    let status = feed(&source, &mut outputs, 7010, 5).await;

    match status {
        AcquisitionStatus::Stabilizing {
            reason: UnstableReason::Drifting { trend_kg, .. },
            live_weight,
            ..
        } => {
            assert!((trend_kg - 0.1).abs() < 1e-9);
            assert_eq!(live_weight, Some(Weight::from_hundredths(7005)));
        }
        other => panic!("expected drifting, got {other:?}"),
    }
    assert!(session.is_active());
    session.stop().await;
}

// ── timeout ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn should_time_out_exactly_once() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let started = tokio::time::Instant::now();
    let mut outputs = start(&mut session).await.unwrap();

    assert_eq!(
        outputs.statuses.recv().await,
        Some(AcquisitionStatus::Timeout)
    );
    assert!(started.elapsed() >= Duration::from_secs(45));
    assert_eq!(outputs.statuses.recv().await, None);
    assert_eq!(source.stop_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn should_honour_configured_timeout() {
    let source = FakeSource::ready();
    let mut session = AcquisitionSession::new(
        source.clone(),
        AcquisitionConfig {
            timeout_secs: 5,
            ..AcquisitionConfig::default()
        },
        ProtocolRegistry::from_config(&ProtocolConfig::default()),
    );
    let started = tokio::time::Instant::now();
    let mut outputs = start(&mut session).await.unwrap();

    feed(&source, &mut outputs, 7000, 3).await;

    assert_eq!(
        outputs.statuses.recv().await,
        Some(AcquisitionStatus::Timeout)
    );
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn should_not_time_out_after_convergence() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();

    feed(&source, &mut outputs, 7000, 10).await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(outputs.statuses.recv().await, None);
}

// ── preconditions ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn should_fail_fast_when_permission_is_denied() {
    let source = FakeSource::new(PermissionStatus::Denied, AdapterState::PoweredOn);
    let mut session = session(&source);

    let err = start(&mut session).await.err().unwrap();

    assert!(matches!(err, AcquisitionError::PermissionDenied));
    assert_eq!(source.start_calls(), 0);
    assert!(!session.is_active());
}

#[tokio::test(start_paused = true)]
async fn should_fail_fast_when_adapter_is_off() {
    let source = FakeSource::new(PermissionStatus::Granted, AdapterState::PoweredOff);
    let mut session = session(&source);

    let err = start(&mut session).await.err().unwrap();

    assert!(matches!(err, AcquisitionError::AdapterOff));
    assert_eq!(source.start_calls(), 0);
    assert!(!session.is_active());
}

// ── platform errors ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn should_report_platform_error_once_and_stop() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();

    feed(&source, &mut outputs, 7000, 3).await;
    source
        .emit(PlatformEvent::Error("radio reset".to_string()))
        .await;

    assert_eq!(
        outputs.statuses.recv().await,
        Some(AcquisitionStatus::Error {
            message: "radio reset".to_string()
        })
    );
    assert_eq!(outputs.statuses.recv().await, None);
    assert_eq!(source.stop_calls(), 2);
}

// ── lifecycle ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn should_restart_without_leaking_samples() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut first = start(&mut session).await.unwrap();
    feed(&source, &mut first, 8000, 5).await;

    let mut second = start(&mut session).await.unwrap();
    assert_eq!(source.start_calls(), 2);

    // The first session ends silently.
    while let Some(status) = first.statuses.recv().await {
        assert!(!status.is_final(), "stopped session reported {status:?}");
    }

    let status = feed(&source, &mut second, 7000, 10).await;
    assert!(matches!(
        status,
        AcquisitionStatus::Stable {
            weight,
            sample_count: 10,
            ..
        } if weight == Weight::from_hundredths(7000)
    ));
}

#[tokio::test(start_paused = true)]
async fn should_stop_silently_and_idempotently() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();
    feed(&source, &mut outputs, 7000, 2).await;

    session.stop().await;
    session.stop().await;

    assert!(!session.is_active());
    assert_eq!(outputs.statuses.recv().await, None);
    assert_eq!(source.stop_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn should_allow_stop_before_start() {
    let source = FakeSource::ready();
    let mut session = session(&source);

    session.stop().await;
    session.stop().await;

    assert!(!session.is_active());
    assert!(session.session_id().is_none());
    assert_eq!(source.stop_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn should_allow_stop_after_stable() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();
    feed(&source, &mut outputs, 7000, 10).await;

    session.stop().await;

    assert!(!session.is_active());
}

#[tokio::test(start_paused = true)]
async fn should_stop_scan_when_dropped() {
    let source = FakeSource::ready();
    let mut session = session(&source);
    let mut outputs = start(&mut session).await.unwrap();
    feed(&source, &mut outputs, 7000, 2).await;
    assert!(source.is_scanning());

    drop(session);
    // Let the spawned cleanup run.
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(!source.is_scanning());
    assert_eq!(source.stop_calls(), 2);
    assert_eq!(outputs.statuses.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn should_not_touch_platform_when_idle_session_is_dropped() {
    let source = FakeSource::ready();
    drop(session(&source));
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(source.stop_calls(), 0);
}
