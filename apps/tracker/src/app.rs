//! Application orchestrator: wires the tailing worker to the reporter.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use killtrack_game_log::{
    CredentialCell, Identity, LineProcessor, LineSource, MonitorFlag, ReportContext, TailWorker,
    resolve_identity,
};
use killtrack_reporter::{Client, KeyStore, NoFeedback, QueuedDispatcher, run_delivery};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// How long queued events may take to drain at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Command-line values that take precedence over configuration and
/// detection.
#[derive(Debug, Default)]
pub struct Overrides {
    pub log_path: Option<PathBuf>,
    pub key: Option<String>,
    pub handle: Option<String>,
    pub geid: Option<String>,
}

/// Runs the tracker until Ctrl-C or the session limit.
pub async fn run(config: Config, overrides: Overrides) -> anyhow::Result<()> {
    if config.api_base_url.trim().is_empty() {
        anyhow::bail!("api_base_url is not configured");
    }
    let cancel = CancellationToken::new();
    let log_path = overrides.log_path.clone().unwrap_or_else(|| config.log_path.clone());

    // -- Identity --
    let identity = identify(&log_path, &overrides).await?;
    tracing::info!(
        handle = identity.handle(),
        geid = identity.geid().unwrap_or("unknown"),
        "player identified"
    );

    // -- Credential --
    let client = Client::new(&config.api_base_url)?;
    let store = match &config.key_file {
        Some(path) => KeyStore::new(path.clone()),
        None => KeyStore::default_location()?,
    };
    let credential = CredentialCell::new();
    let stored = match &overrides.key {
        Some(key) => store.activate(&client, key, config.key_ttl()).await,
        None => store.restore(&client).await,
    };
    match stored {
        Ok(stored) => {
            credential.set(stored.key.clone());
            if let Some(remaining) = stored.remaining(Utc::now()) {
                spawn_expiry(remaining, credential.clone(), cancel.clone());
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "no usable key, events will not be uploaded");
        }
    }

    // -- Delivery --
    let (dispatcher, rx) = QueuedDispatcher::channel();
    let mut delivery = tokio::spawn(run_delivery(
        client,
        rx,
        credential.clone(),
        NoFeedback,
        cancel.clone(),
    ));

    // -- Tailing --
    let monitor = MonitorFlag::new();
    let source = LineSource::open(&log_path)?;
    let processor = LineProcessor::new(
        identity,
        ReportContext::new(env!("CARGO_PKG_VERSION"), config.anonymize),
    );
    let mut worker = TailWorker::new(source, processor, dispatcher, monitor.clone(), credential)
        .with_poll_interval(config.poll_interval());

    let worker = tokio::task::spawn_blocking(move || {
        worker.replay_backlog().map(|_| worker)
    })
    .await??;
    let tail_handle = worker.spawn().context("spawning tail thread")?;

    tracing::info!("tracker ready");

    // -- Main loop: wait for shutdown --
    let session_limit = config.session_limit();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
        _ = async {
            match session_limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        } => {
            tracing::info!(
                hours = config.session_limit_hours,
                "session limit reached, shutting down"
            );
        }
    }

    // -- Graceful shutdown --
    monitor.stop();
    match tokio::task::spawn_blocking(move || tail_handle.join()).await? {
        // Dropping the worker closes the delivery queue.
        Ok(worker) => drop(worker),
        Err(_) => tracing::error!("tail thread panicked"),
    }

    let stats = match tokio::time::timeout(DRAIN_TIMEOUT, &mut delivery).await {
        Ok(stats) => stats?,
        Err(_) => {
            tracing::warn!("delivery did not drain in time, cancelling");
            cancel.cancel();
            delivery.await?
        }
    };
    cancel.cancel();
    tracing::info!(
        delivered = stats.delivered,
        failed = stats.failed,
        skipped = stats.skipped,
        "delivery finished"
    );

    Ok(())
}

/// Resolves the local player, reading the log only for values not given on
/// the command line.
async fn identify(log_path: &std::path::Path, overrides: &Overrides) -> anyhow::Result<Identity> {
    if let (Some(handle), Some(geid)) = (&overrides.handle, &overrides.geid) {
        return Ok(Identity::new(handle.clone(), Some(geid.clone())));
    }

    let path = log_path.to_path_buf();
    let detected = tokio::task::spawn_blocking(move || resolve_identity(&path))
        .await?
        .with_context(|| format!("reading player identity from {}", log_path.display()));

    let (handle, geid) = match (detected, &overrides.handle) {
        (Ok(found), _) => (
            overrides
                .handle
                .clone()
                .unwrap_or_else(|| found.handle().to_string()),
            overrides
                .geid
                .clone()
                .or_else(|| found.geid().map(str::to_string)),
        ),
        // The handle was given; a log without a login line is fine.
        (Err(e), Some(handle)) => {
            tracing::debug!(error = %e, "identity detection failed, using overrides");
            (handle.clone(), overrides.geid.clone())
        }
        (Err(e), None) => return Err(e),
    };
    Ok(Identity::new(handle, geid))
}

/// Clears the credential when the cached key's lifetime runs out.
fn spawn_expiry(
    remaining: chrono::Duration,
    credential: CredentialCell,
    cancel: CancellationToken,
) {
    let Ok(remaining) = remaining.to_std() else {
        return;
    };
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(remaining) => {
                credential.clear();
                tracing::warn!("key expired, uploads stopped; restart with --key to renew");
            }
        }
    });
}
