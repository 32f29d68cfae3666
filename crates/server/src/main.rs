use std::collections::HashSet;
use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use rustls::crypto::{self, CryptoProvider};
use sea_orm::{ConnectOptions, Database};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use uptime_sentinel::api::start_webserver;
use uptime_sentinel::config::load_config;
use uptime_sentinel::groups::GroupService;
use uptime_sentinel::incidents::IncidentService;
use uptime_sentinel::metrics::Collector;
use uptime_sentinel::metrics::remote_write::RemoteWriter;
use uptime_sentinel::notify::{Dispatcher, LogTransport};
use uptime_sentinel::probes::{Prober, dns};
use uptime_sentinel::scheduler::Scheduler;
use uptime_sentinel::scheduler::worker::WorkerPool;
use uptime_sentinel::sla::{SlaCalculator, monthly_rollup_loop};
use uptime_sentinel::AppResources;

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("uptime_sentinel=info,tower_http=warn")
        }))
        .init();

    let config = Arc::new(load_config()?);

    let ring_provider = crypto::ring::default_provider();
    CryptoProvider::install_default(ring_provider)
        .expect("Failed to install crypto provider");

    // Database + schema
    let mut connect_options = ConnectOptions::new(config.database.url.clone());
    connect_options.max_connections(config.database.max_connections);
    let db = Arc::new(Database::connect(connect_options).await?);
    Migrator::up(db.as_ref(), None).await?;

    // Shared resources
    let metrics = Arc::new(Collector::new()?);
    let resources = AppResources {
        db: db.clone(),
        config: config.clone(),
        metrics: metrics.clone(),
    };
    let store = resources.store();

    // Engine services
    let resolver = Arc::new(dns::build_resolver(config.dns.resolver));
    let prober = Arc::new(Prober::new(resolver));
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(LogTransport), metrics.clone()));
    let incidents = Arc::new(IncidentService::new(store.clone(), metrics.clone()));
    let groups = Arc::new(GroupService::new(
        store.clone(),
        metrics.clone(),
        dispatcher.clone(),
    ));
    let calculator = Arc::new(SlaCalculator::new(store.clone(), metrics.clone()));

    // One cancellation signal drives every long-lived task.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Bounded job queue between scheduler and workers
    let (job_tx, job_rx) = mpsc::channel(config.scheduler.queue_capacity);

    let pool = Arc::new(WorkerPool::new(
        prober,
        store.clone(),
        metrics.clone(),
        incidents,
        groups,
        dispatcher,
        config.scheduler.clone(),
    ));
    let mut worker_handles = pool.spawn(job_rx, shutdown_rx.clone());

    let scheduler = Scheduler::new(
        store.clone(),
        metrics.clone(),
        config.scheduler.clone(),
        config.regions.keys().cloned().collect::<HashSet<_>>(),
    );
    worker_handles.push(tokio::spawn(scheduler.run(job_tx, shutdown_rx.clone())));

    if config.remote_sink.enabled() {
        let writer = RemoteWriter::new(config.remote_sink.clone())?;
        worker_handles.push(tokio::spawn(
            writer.run(metrics.clone(), shutdown_rx.clone()),
        ));
    } else {
        info!("Remote sink not configured; metrics available via /metrics only");
    }

    worker_handles.push(tokio::spawn(monthly_rollup_loop(
        calculator,
        shutdown_rx.clone(),
    )));

    // Ctrl-C flips the shutdown flag once the webserver exits.
    let webserver = tokio::spawn(start_webserver(resources, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received; draining workers");
    let _ = shutdown_tx.send(true);

    for handle in worker_handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Task ended abnormally during shutdown");
        }
    }
    match webserver.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "Webserver task ended abnormally"),
    }
    info!("Shutdown complete");
    Ok(())
}
