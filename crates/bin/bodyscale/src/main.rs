//! # bodyscale: one weighing from a broadcast BLE scale
//!
//! Composition root that wires the BLE adapter into an acquisition session,
//! waits for one final status and prints it as a JSON line on stdout.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialize logging (`tracing-subscriber`, to stderr)
//! - Construct the BLE advertisement source (adapter)
//! - Construct the acquisition session, injecting the source via the port
//! - Handle Ctrl-C by stopping the session
//!
//! ## Exit status
//! `0` when the weight converged, `1` on a platform error, `2` on timeout,
//! `130` when interrupted.
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::process::ExitCode;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use bodyscale_adapter_ble::BleAdvertisementSource;
use bodyscale_app::acquisition::AcquisitionSession;
use bodyscale_app::protocol::ProtocolRegistry;
use bodyscale_app::status::AcquisitionStatus;

use crate::config::Config;

const EXIT_PLATFORM_ERROR: u8 = 1;
const EXIT_TIMEOUT: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "bodyscale failed");
            eprintln!("bodyscale: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .with_writer(std::io::stderr)
        .init();

    let registry = ProtocolRegistry::from_config(&config.protocol);
    let source = BleAdvertisementSource::new(config.ble.clone());
    let mut session = AcquisitionSession::new(source, config.acquisition.clone(), registry)
        .with_calibration(config.calibration_table());
    session.set_profile(config.profile.to_profile()?);

    let (status_tx, mut statuses) = mpsc::unbounded_channel();
    let session_id = session
        .start(
            |sample| {
                tracing::info!(
                    sequence = sample.sequence,
                    weight = %sample.weight,
                    offset_ms = sample.offset_ms,
                    "sample"
                );
            },
            move |status| {
                let _ = status_tx.send(status);
            },
        )
        .await?;
    tracing::info!(%session_id, "step on the scale");

    let outcome = wait_for_final(&mut statuses, tokio::signal::ctrl_c()).await;
    session.stop().await;

    let status = match outcome {
        Outcome::Final(status) => status,
        Outcome::Interrupted => {
            tracing::info!("interrupted, acquisition stopped");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        Outcome::Closed => return Err("acquisition ended without a final status".into()),
    };
    println!("{}", serde_json::to_string(&status)?);

    Ok(match status {
        AcquisitionStatus::Stable { .. } => ExitCode::SUCCESS,
        AcquisitionStatus::Timeout => ExitCode::from(EXIT_TIMEOUT),
        _ => ExitCode::from(EXIT_PLATFORM_ERROR),
    })
}

/// How waiting on the session ended.
#[derive(Debug, PartialEq)]
enum Outcome {
    Final(AcquisitionStatus),
    Interrupted,
    Closed,
}

/// Log progress statuses until a final one arrives or `shutdown` completes.
///
/// `shutdown` is polled across every iteration, so a signal listener is
/// registered once for the whole wait.
async fn wait_for_final<F: Future>(
    statuses: &mut mpsc::UnboundedReceiver<AcquisitionStatus>,
    shutdown: F,
) -> Outcome {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            status = statuses.recv() => match status {
                Some(status) if status.is_final() => return Outcome::Final(status),
                Some(status) => log_progress(&status),
                None => return Outcome::Closed,
            },
            _ = &mut shutdown => return Outcome::Interrupted,
        }
    }
}

fn log_progress(status: &AcquisitionStatus) {
    match status {
        AcquisitionStatus::Collecting { count, threshold } => {
            tracing::info!(count, threshold, "collecting readings");
        }
        AcquisitionStatus::Stabilizing {
            reason,
            live_weight,
            progress,
        } => {
            tracing::info!(
                %reason,
                live_weight = ?live_weight.map(|weight| weight.kg()),
                progress_pct = (progress * 100.0).round(),
                "stabilizing"
            );
        }
        _ => {}
    }
}
