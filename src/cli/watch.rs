//! `envref watch`: re-resolve whenever a layer file or the config changes.
//!
//! Files are polled for modification times. A change is acted on once the
//! files have stopped changing for the debounce period. Every pass reloads
//! the configuration and builds a fresh registry. The interrupt listener is
//! installed before the first pass; a Ctrl-C that arrives during a pass
//! stops the watch as soon as that pass has finished.

use anyhow::Result;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::commands;
use super::context::ProjectContext;
use super::output::report_error;

/// Watch settings
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub config_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub output: String,
    pub strict: bool,
    pub interval: Duration,
    pub debounce: Duration,
}

type Snapshot = Vec<(PathBuf, Option<SystemTime>)>;

fn watched_paths(ctx: &ProjectContext) -> Vec<PathBuf> {
    let layers = ctx.layer_paths();
    let mut paths = vec![ctx.config_path.clone(), layers.base];
    paths.extend(layers.profile);
    paths.extend(layers.local);
    paths
}

fn snapshot(paths: &[PathBuf]) -> Snapshot {
    paths
        .iter()
        .map(|path| {
            let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
            (path.clone(), modified)
        })
        .collect()
}

/// One full pipeline run. Failures are reported and do not stop watching.
async fn pass(options: &WatchOptions) -> Option<Vec<PathBuf>> {
    let ctx = match ProjectContext::load(options.config_path.clone(), options.profile.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            report_error(format!("{:#}", e));
            return None;
        }
    };
    if let Err(e) = commands::resolve(&ctx, &options.output, options.strict).await {
        report_error(format!("{:#}", e));
    }
    Some(watched_paths(&ctx))
}

/// Forward the first interrupt into a channel. The listener is registered
/// before this returns, so an interrupt is buffered even while nothing waits.
fn interrupt_channel() -> Result<mpsc::Receiver<()>> {
    let (tx, rx) = mpsc::channel(1);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut interrupt = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            if interrupt.recv().await.is_some() {
                tx.send(()).await.ok();
            }
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tx.send(()).await.ok();
        }
    });

    Ok(rx)
}

fn stop_requested(stop: &mut mpsc::Receiver<()>) -> bool {
    stop.try_recv().is_ok()
}

/// Run until Ctrl-C.
pub async fn run(options: WatchOptions) -> Result<()> {
    let stop = interrupt_channel()?;
    run_until(options, stop).await
}

/// Run until a message arrives on `stop`.
pub async fn run_until(options: WatchOptions, mut stop: mpsc::Receiver<()>) -> Result<()> {
    let mut paths = match pass(&options).await {
        Some(paths) => paths,
        None => anyhow::bail!("Initial load failed; fix the errors above and retry"),
    };
    if stop_requested(&mut stop) {
        info!("Stopping watch");
        return Ok(());
    }
    let mut last = snapshot(&paths);
    info!(files = paths.len(), "Watching for changes");

    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(()) = stop.recv() => {
                info!("Stopping watch");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let current = snapshot(&paths);
        if current == last {
            continue;
        }

        // Wait for the files to settle.
        let mut settled = current;
        loop {
            tokio::select! {
                Some(()) = stop.recv() => {
                    info!("Stopping watch");
                    return Ok(());
                }
                _ = tokio::time::sleep(options.debounce) => {}
            }
            let next = snapshot(&paths);
            if next == settled {
                break;
            }
            settled = next;
        }

        debug!("Change detected; re-resolving");
        if let Some(new_paths) = pass(&options).await {
            paths = new_paths;
        }
        if stop_requested(&mut stop) {
            info!("Stopping watch");
            return Ok(());
        }
        last = snapshot(&paths);
    }
}
