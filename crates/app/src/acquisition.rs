//! Acquisition session: turns a stream of advertisements into one
//! converged measurement.
//!
//! ## Concurrency model
//!
//! The platform adapter only enqueues [`PlatformEvent`]s on an `mpsc`
//! channel. A single processing task, spawned by
//! [`AcquisitionSession::start`], owns the [`Stabilizer`] exclusively and
//! races three things in one `select!`:
//!
//! - the caller's cancellation (`oneshot`, fired by [`AcquisitionSession::stop`]),
//! - the session deadline,
//! - the next platform event.
//!
//! Whichever completes first ends the session; the other two are dropped
//! with the task. The profile is shared through a `watch` channel so
//! [`AcquisitionSession::set_profile`] can be called at any time without a
//! lock, and the value current at convergence is used.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument as _;

use bodyscale_domain::id::SessionId;
use bodyscale_domain::metrics::{self, BodyComposition, CalibrationTable};
use bodyscale_domain::profile::Profile;
use bodyscale_domain::sample::WeightSample;
use bodyscale_domain::stabilizer::{Assessment, Convergence, Stabilizer};

use crate::config::AcquisitionConfig;
use crate::error::AcquisitionError;
use crate::payload::hex;
use crate::ports::{
    AdapterState, Advertisement, AdvertisementSource, PermissionStatus, PlatformEvent,
};
use crate::protocol::ProtocolRegistry;
use crate::status::AcquisitionStatus;

/// Handle on the processing task of the running session.
struct Running {
    id: SessionId,
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// One scale acquisition at a time, over a platform [`AdvertisementSource`].
///
/// The session is an ordinary owned value: create as many as needed (one
/// per adapter, one per test). Dropping it aborts the processing task and,
/// inside a runtime, asks the platform to stop scanning.
pub struct AcquisitionSession<S: AdvertisementSource + 'static> {
    source: Arc<S>,
    config: AcquisitionConfig,
    registry: Arc<ProtocolRegistry>,
    calibration: Arc<CalibrationTable>,
    profile: watch::Sender<Option<Profile>>,
    running: Option<Running>,
}

impl<S: AdvertisementSource + 'static> AcquisitionSession<S> {
    /// Create an idle session.
    pub fn new(source: S, config: AcquisitionConfig, registry: ProtocolRegistry) -> Self {
        let (profile, _) = watch::channel(None);
        Self {
            source: Arc::new(source),
            config,
            registry: Arc::new(registry),
            calibration: Arc::new(CalibrationTable::identity()),
            profile,
            running: None,
        }
    }

    /// Use a calibration table for the metrics derived at convergence.
    #[must_use]
    pub fn with_calibration(mut self, calibration: CalibrationTable) -> Self {
        self.calibration = Arc::new(calibration);
        self
    }

    /// Set (or clear) the subject profile.
    ///
    /// Takes effect immediately, including for a running session.
    pub fn set_profile(&self, profile: Option<Profile>) {
        self.profile.send_replace(profile);
    }

    /// The profile that would be used if the weight converged now.
    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        self.profile.borrow().clone()
    }

    /// Whether a processing task is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Identifier of the session started last, until it is stopped.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.running.as_ref().map(|running| running.id)
    }

    /// Start a new acquisition.
    ///
    /// Any session still running is fully stopped first. `on_sample` is
    /// called with every decoded sample, before convergence is evaluated;
    /// `on_status` receives progress updates and then exactly one final
    /// status (`Stable`, `Timeout` or `Error`) unless [`stop`](Self::stop)
    /// is called first.
    ///
    /// # Errors
    ///
    /// - [`AcquisitionError::PermissionDenied`] if the scanning permission
    ///   was refused;
    /// - [`AcquisitionError::AdapterOff`] if the radio is not powered on;
    /// - [`AcquisitionError::Platform`] if the platform failed to answer or
    ///   to start scanning.
    ///
    /// Nothing is left running when an error is returned.
    pub async fn start<F, G>(
        &mut self,
        on_sample: F,
        on_status: G,
    ) -> Result<SessionId, AcquisitionError>
    where
        F: FnMut(&WeightSample) + Send + 'static,
        G: FnMut(AcquisitionStatus) + Send + 'static,
    {
        self.stop().await;

        if self.source.request_permissions().await? == PermissionStatus::Denied {
            tracing::warn!("bluetooth permission denied");
            return Err(AcquisitionError::PermissionDenied);
        }
        let state = self.source.adapter_state().await?;
        if state != AdapterState::PoweredOn {
            tracing::warn!(?state, "bluetooth adapter is not powered on");
            return Err(AcquisitionError::AdapterOff);
        }

        let events = self.source.start_scan().await?;
        let id = SessionId::new();
        let (cancel, cancelled) = oneshot::channel();
        let worker = Worker {
            id,
            source: Arc::clone(&self.source),
            config: self.config.clone(),
            registry: Arc::clone(&self.registry),
            calibration: Arc::clone(&self.calibration),
            profile: self.profile.subscribe(),
            stabilizer: Stabilizer::new(self.config.stabilizer()),
            started: Instant::now(),
            sequence: 0,
            on_sample,
            on_status,
        };
        let span = tracing::info_span!("acquisition", session_id = %id);
        let task = tokio::spawn(worker.run(events, cancelled).instrument(span));

        tracing::info!(
            session_id = %id,
            timeout_secs = self.config.timeout_secs,
            "acquisition started"
        );
        self.running = Some(Running { id, cancel, task });
        Ok(id)
    }

    /// Stop the current session.
    ///
    /// Idempotent: safe before any [`start`](Self::start), after a final
    /// status, or twice in a row. The platform scan is always asked to stop.
    /// No status is reported for a session stopped this way.
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            // The task may already be gone after a final status.
            let _ = running.cancel.send(());
            if let Err(err) = running.task.await {
                tracing::warn!(%err, session_id = %running.id, "acquisition task did not finish cleanly");
            }
            tracing::debug!(session_id = %running.id, "acquisition stopped");
        }
        if let Err(err) = self.source.stop_scan().await {
            tracing::warn!(%err, "failed to stop the advertisement stream");
        }
    }
}

impl<S: AdvertisementSource + 'static> Drop for AcquisitionSession<S> {
    fn drop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.task.abort();
        // Without a runtime there is nothing left to drive the platform call.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(session_id = %running.id, "session dropped outside a runtime, scan left running");
            return;
        };
        let source = Arc::clone(&self.source);
        let id = running.id;
        handle.spawn(async move {
            if let Err(err) = source.stop_scan().await {
                tracing::warn!(%err, session_id = %id, "failed to stop the advertisement stream");
            }
            tracing::debug!(session_id = %id, "acquisition dropped");
        });
    }
}

/// State owned by the processing task.
struct Worker<S, F, G> {
    id: SessionId,
    source: Arc<S>,
    config: AcquisitionConfig,
    registry: Arc<ProtocolRegistry>,
    calibration: Arc<CalibrationTable>,
    profile: watch::Receiver<Option<Profile>>,
    stabilizer: Stabilizer,
    started: Instant,
    sequence: u64,
    on_sample: F,
    on_status: G,
}

impl<S, F, G> Worker<S, F, G>
where
    S: AdvertisementSource,
    F: FnMut(&WeightSample) + Send,
    G: FnMut(AcquisitionStatus) + Send,
{
    async fn run(
        mut self,
        mut events: mpsc::Receiver<PlatformEvent>,
        mut cancelled: oneshot::Receiver<()>,
    ) {
        let deadline = tokio::time::sleep_until(self.started + self.config.timeout());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                // A dropped sender counts as a stop request too.
                _ = &mut cancelled => {
                    tracing::debug!("acquisition cancelled");
                    return;
                }
                () = &mut deadline => {
                    tracing::info!(
                        samples = self.stabilizer.samples().len(),
                        phase = %self.stabilizer.phase(),
                        "acquisition timed out"
                    );
                    self.stabilizer.mark_timed_out();
                    self.finish(AcquisitionStatus::Timeout).await;
                    return;
                }
                event = events.recv() => {
                    let flow = match event {
                        Some(PlatformEvent::Advertisement(advertisement)) => {
                            self.handle(&advertisement).await
                        }
                        Some(PlatformEvent::Error(message)) => self.fail(message).await,
                        None => self.fail("advertisement stream closed".to_string()).await,
                    };
                    if flow.is_break() {
                        return;
                    }
                }
            }
        }
    }

    async fn handle(&mut self, advertisement: &Advertisement) -> ControlFlow<()> {
        if !self.config.passes_filter(&advertisement.address) {
            tracing::trace!(address = %advertisement.address, "filtered out by device_filter");
            return ControlFlow::Continue(());
        }
        let Some(protocol) = self.registry.identify(advertisement) else {
            return ControlFlow::Continue(());
        };
        let weight = match ProtocolRegistry::decode(protocol, advertisement) {
            Ok(weight) => weight,
            Err(err) => {
                tracing::trace!(
                    %err,
                    address = %advertisement.address,
                    payload = %hex(&advertisement.manufacturer_data),
                    "dropping undecodable advertisement"
                );
                return ControlFlow::Continue(());
            }
        };

        self.sequence += 1;
        let offset_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let sample = WeightSample::new(self.sequence, weight, offset_ms);
        tracing::debug!(
            sequence = sample.sequence,
            %weight,
            offset_ms,
            address = %advertisement.address,
            rssi = ?advertisement.rssi,
            "weight sample"
        );
        (self.on_sample)(&sample);

        match self.stabilizer.push(sample) {
            Ok(Assessment::Stable(convergence)) => {
                let result = self.derive(&convergence);
                self.finish(AcquisitionStatus::stable(self.id, &convergence, result))
                    .await;
                ControlFlow::Break(())
            }
            Ok(assessment) => {
                if let Some(status) = AcquisitionStatus::in_progress(&assessment) {
                    (self.on_status)(status);
                }
                ControlFlow::Continue(())
            }
            Err(err) => {
                tracing::warn!(%err, "sample rejected by a finished session");
                ControlFlow::Break(())
            }
        }
    }

    fn derive(&self, convergence: &Convergence) -> Option<BodyComposition> {
        let profile = self.profile.borrow().clone();
        let Some(profile) = profile else {
            tracing::info!(weight = %convergence.weight, "no profile set, reporting weight only");
            return None;
        };
        match metrics::derive_with(convergence.weight, &profile, &self.calibration) {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::warn!(%err, "cannot derive metrics from profile");
                None
            }
        }
    }

    async fn fail(&mut self, message: String) -> ControlFlow<()> {
        tracing::error!(%message, "advertisement stream failed");
        self.stabilizer.mark_failed();
        self.finish(AcquisitionStatus::Error { message }).await;
        ControlFlow::Break(())
    }

    /// Stop scanning and report the final status.
    async fn finish(&mut self, status: AcquisitionStatus) {
        if let Err(err) = self.source.stop_scan().await {
            tracing::warn!(%err, "failed to stop the advertisement stream");
        }
        if let AcquisitionStatus::Stable {
            weight,
            sample_count,
            ..
        } = &status
        {
            tracing::info!(%weight, sample_count, "weight converged");
        }
        (self.on_status)(status);
    }
}
