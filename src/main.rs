//! Razcep daemon - weighted tunnel splitter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use razcep::cli::Cli;
use razcep::config::{init_logging, Config};
use razcep::error::{Error, Result};
use razcep::mangle::Mangler;
use razcep::multipath::{PortLayout, PortTranslator, TunnelScheduler};
use razcep::queue::QueueRunner;
use razcep::weights::{Mailbox, WeightWatcher};
use razcep::{MAX_FLOWS, MAX_TUNNELS_PER_FLOW, SEND_RANGE_WIDTH};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config if specified, then fold in command-line overrides
    let mut config = if let Some(ref path) = cli.config {
        Config::load(path)?
    } else {
        Config::default()
    };
    cli.apply_to(&mut config);

    init_logging(&config.logging)?;
    config.validate()?;

    let self_addr = config
        .splitter
        .self_addr
        .ok_or_else(|| Error::InvalidConfig("self address missing after validation".into()))?;
    let weight_file = config
        .weights
        .file
        .clone()
        .ok_or_else(|| Error::InvalidConfig("weight file missing after validation".into()))?;

    let send_base = config.splitter.send_base_port;
    let recv_base = config.splitter.recv_base_port;

    info!(version = razcep::VERSION, "Razcep starting");
    info!(
        "Source ports {}..{} will be rewritten",
        send_base,
        send_base as usize + SEND_RANGE_WIDTH
    );
    info!(
        "Outbound: port {send_base} + N maps to {send_base} + N*{MAX_TUNNELS_PER_FLOW} + tunnel"
    );
    info!("Inbound: tunnel ports collapse back to {send_base} + N");
    info!(
        "Sessions toward peer N use source port {send_base} + N and destination port {recv_base} + M (up to {MAX_FLOWS} peers)"
    );
    info!(%self_addr, "Packets sourced from this address are outbound");
    info!(
        weight_file = %weight_file.display(),
        poll_interval = ?config.weights.poll_interval,
        checksums = config.splitter.compute_checksums,
        "Configuration"
    );

    // Weight ingestion runs beside the packet path; the mailbox is the only
    // thing they share.
    let mailbox = Mailbox::new();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let watcher = WeightWatcher::new(
        weight_file,
        config.weights.poll_interval,
        mailbox.clone(),
    );
    let mut watcher_handle = tokio::spawn(watcher.run(shutdown_tx.subscribe()));

    let scheduler = TunnelScheduler::new(mailbox);
    let translator = PortTranslator::new(
        PortLayout::new(recv_base, send_base),
        self_addr,
        scheduler,
    );
    let mangler = Mangler::new(translator, config.splitter.compute_checksums);

    let stop = Arc::new(AtomicBool::new(false));
    let runner = QueueRunner::new(config.queue.clone(), mangler, Arc::clone(&stop));
    let mut queue_handle = tokio::task::spawn_blocking(move || runner.run());

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            stop.store(true, Ordering::Relaxed);
            let _ = shutdown_tx.send(());
            let _ = watcher_handle.await;
            // The queue thread may be parked in a blocking receive with no
            // packet coming; ingestion has stopped, so leave with it parked.
            std::process::exit(0);
        }
        res = &mut watcher_handle => {
            // The watcher only ends early on a fatal specification error.
            stop.store(true, Ordering::Relaxed);
            match res {
                Ok(Err(e)) => error!(error = %e, "Weight ingestion failed"),
                Ok(Ok(())) => error!("Weight ingestion stopped unexpectedly"),
                Err(e) => error!(error = %e, "Weight ingestion panicked"),
            }
            std::process::exit(1);
        }
        res = &mut queue_handle => {
            let _ = shutdown_tx.send(());
            let _ = watcher_handle.await;
            let stats = res.map_err(|e| Error::Config(format!("Queue task failed: {e}")))??;
            info!(%stats, "Shut down cleanly");
            Ok(())
        }
    }
}
