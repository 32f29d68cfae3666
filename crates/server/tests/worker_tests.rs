//! Worker pool pipeline: probe, persist, incident fan-out, shutdown.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{group, member, monitor, test_db};
use uptime_sentinel::config::SchedulerConfig;
use uptime_sentinel::entity::types::{CheckStatus, MonitorKind};
use uptime_sentinel::groups::GroupService;
use uptime_sentinel::incidents::IncidentService;
use uptime_sentinel::metrics::Collector;
use uptime_sentinel::notify::{Dispatcher, LogTransport};
use uptime_sentinel::probes::{Prober, dns};
use uptime_sentinel::scheduler::CheckJob;
use uptime_sentinel::scheduler::worker::WorkerPool;
use uptime_sentinel::store::Store;

struct Harness {
    store: Store,
    pool: Arc<WorkerPool<hickory_resolver::name_server::TokioConnectionProvider>>,
}

async fn harness() -> Harness {
    let db = test_db().await;
    let store = Store::new(db);
    let metrics = Arc::new(Collector::new().unwrap());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(LogTransport), metrics.clone()));
    let incidents = Arc::new(IncidentService::new(store.clone(), metrics.clone()));
    let groups = Arc::new(GroupService::new(
        store.clone(),
        metrics.clone(),
        dispatcher.clone(),
    ));
    let resolver = Arc::new(dns::build_resolver(SocketAddr::from(([127, 0, 0, 1], 53))));
    let prober = Arc::new(Prober::new(resolver));

    let config = SchedulerConfig {
        worker_count: 2,
        ..SchedulerConfig::default()
    };
    let pool = Arc::new(WorkerPool::new(
        prober,
        store.clone(),
        metrics,
        incidents,
        groups,
        dispatcher,
        config,
    ));
    Harness { store, pool }
}

#[tokio::test]
async fn job_flows_probe_to_store_and_incident() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let h = harness().await;
    let mut m = monitor(MonitorKind::Http, 60);
    m.target = server.uri();
    h.store.insert_monitor(m.clone()).await.unwrap();

    let g = group(&m.tenant_id);
    h.store
        .create_group(g.clone(), vec![member(&g, &m, 1.0, true)])
        .await
        .unwrap();

    let (job_tx, job_rx) = mpsc::channel(8);
    // Held open until workers finish so shutdown never races the job.
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = h.pool.clone().spawn(job_rx, shutdown_rx);

    job_tx
        .send(CheckJob {
            monitor: m.clone(),
            region: "us-east".to_string(),
        })
        .await
        .unwrap();

    // Close the queue so workers drain and exit.
    drop(job_tx);
    for handle in handles {
        handle.await.unwrap();
    }

    // Result persisted with the status cache in sync.
    let history = h.store.history(m.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, CheckStatus::Down);
    assert_eq!(history[0].status_code, Some(500));
    assert_eq!(history[0].region, "us-east");

    let status = h.store.status_for(m.id).await.unwrap().unwrap();
    assert_eq!(status.status, CheckStatus::Down);
    assert_eq!(status.last_check, history[0].checked_at);

    // Incident opened for the failing monitor.
    assert_eq!(h.store.open_incident_count(m.id).await.unwrap(), 1);

    // Group fan-out ran: snapshot reflects the critical member down.
    let group_status = h.store.group_status(g.id).await.unwrap().unwrap();
    assert_eq!(group_status.overall_status, CheckStatus::Down);
    assert_eq!(group_status.critical_monitors_down, 1);
}

#[tokio::test]
async fn workers_drain_and_stop_on_shutdown_signal() {
    let h = harness().await;
    let (job_tx, job_rx) = mpsc::channel::<CheckJob>(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = h.pool.clone().spawn(job_rx, shutdown_rx);

    // No jobs in flight: flipping the signal stops every worker.
    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
    drop(job_tx);
}
