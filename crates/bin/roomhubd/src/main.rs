//! # roomhubd — roomhub daemon
//!
//! Composition root that wires all adapters together and runs the loops.
//!
//! ## Responsibilities
//! - Load configuration (`roomhub.toml`, env vars) and install tracing
//! - Initialize the `SQLite` connection pool and run migrations
//! - Connect to the MQTT broker
//! - Construct the registry, controllers, router, reconciler and services
//! - Run the dispatcher, the reconciliation tick, the audit recorder, the
//!   presence simulation and the registration expiry
//! - Shut down on SIGINT
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod notifier;

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use roomhub_adapter_mqtt::{InboundMessage, MqttBus};
use roomhub_adapter_storage_sqlite_sqlx::{
    Config as DatabaseConfig, SqliteCardDirectory, SqliteEventLog, SqliteRoomRepository,
    SqliteScheduleRepository,
};
use roomhub_app::controller::DeviceController;
use roomhub_app::event_bus::InProcessEventBus;
use roomhub_app::pending::PendingCommands;
use roomhub_app::ports::{CardHandler, DeviceHandler};
use roomhub_app::reconciler::{ScheduleReconciler, TickOutcome};
use roomhub_app::registry::DeviceRegistry;
use roomhub_app::router::MessageRouter;
use roomhub_app::services::audit::AuditRecorder;
use roomhub_app::services::card_service::CardService;
use roomhub_app::services::vacation_service::{VacationMode, VacationService};
use roomhub_domain::room::DeviceKind;
use roomhub_domain::time::{local_minute, now};

use crate::config::Config;
use crate::notifier::LogNotifier;

type Events = Arc<InProcessEventBus>;
type Registry = Arc<DeviceRegistry<SqliteRoomRepository>>;
type Controller = Arc<DeviceController<SqliteRoomRepository, MqttBus, LogNotifier, Events>>;
type Cards =
    Arc<CardService<SqliteRoomRepository, MqttBus, Controller, SqliteCardDirectory, Events>>;
type Reconciler =
    ScheduleReconciler<SqliteScheduleRepository, SqliteRoomRepository, Controller, Events>;

const AUDIT_PRUNE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
const REGISTRATION_CHECK_PERIOD: Duration = Duration::from_secs(5);

fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn every(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

fn spawn_dispatcher<D, C>(
    router: MessageRouter<D, C>,
    mut inbound: mpsc::Receiver<InboundMessage>,
) -> JoinHandle<()>
where
    D: DeviceHandler + Send + Sync + 'static,
    C: CardHandler + Send + Sync + 'static,
{
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            let disposition = router.route(&message.topic, &message.payload).await;
            tracing::trace!(topic = %message.topic, ?disposition, "message routed");
        }
        tracing::debug!("dispatcher stopped");
    })
}

fn spawn_reconciler(reconciler: Arc<Reconciler>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = every(period);
        loop {
            interval.tick().await;
            let reconciler = Arc::clone(&reconciler);
            // overlapping ticks are skipped by the reconciler's in-flight guard
            tokio::spawn(async move {
                let outcome = reconciler.tick(local_minute(), now()).await;
                if let TickOutcome::Completed(report) = outcome {
                    tracing::debug!(?report, "reconciliation tick");
                }
            });
        }
    })
}

fn spawn_audit(
    audit: Arc<AuditRecorder<SqliteEventLog>>,
    events: &Events,
    retention: TimeDelta,
) -> Vec<JoinHandle<()>> {
    let rx = events.subscribe();
    let recorder = Arc::clone(&audit);
    let record = tokio::spawn(async move { recorder.run(rx).await });

    let prune = tokio::spawn(async move {
        let mut interval = every(AUDIT_PRUNE_PERIOD);
        loop {
            interval.tick().await;
            if let Err(err) = audit.prune(retention, now()).await {
                tracing::error!(%err, "failed to prune audit log");
            }
        }
    });
    vec![record, prune]
}

fn spawn_simulation(
    vacation: Arc<VacationService<SqliteRoomRepository, Controller, Events>>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = SmallRng::from_os_rng();
        let mut interval = every(period);
        loop {
            interval.tick().await;
            if let Err(err) = vacation.simulate_with(&mut rng).await {
                tracing::warn!(%err, "presence simulation step failed");
            }
        }
    })
}

fn spawn_registration_expiry(cards: Cards) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = every(REGISTRATION_CHECK_PERIOD);
        loop {
            interval.tick().await;
            if let Err(err) = cards.expire_registration(now()).await {
                tracing::warn!(%err, "failed to expire card registration");
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(&config.logging.filter);

    // Database
    let db = DatabaseConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let schedules = SqliteScheduleRepository::new(pool.clone());
    let event_log = SqliteEventLog::new(pool.clone());
    let directory = SqliteCardDirectory::new(pool.clone());
    for username in &config.registration.users {
        directory.add_user(username).await?;
    }
    let registry: Registry = Arc::new(DeviceRegistry::new(SqliteRoomRepository::new(pool)));

    // Bus
    let (bus, inbound, mqtt_loop) = MqttBus::connect(&config.mqtt);
    let events: Events = Arc::new(InProcessEventBus::new(config.events.bus_capacity));
    let pending = Arc::new(PendingCommands::new(config.reconciler.retry_policy()));

    // Controllers
    let controller = |device: DeviceKind| -> Controller {
        Arc::new(DeviceController::new(
            device,
            Arc::clone(&registry),
            bus.clone(),
            LogNotifier,
            Arc::clone(&events),
            Arc::clone(&pending),
        ))
    };
    let light = controller(DeviceKind::Light);
    let alarm = controller(DeviceKind::Alarm);

    // Services
    let vacation_mode = Arc::new(VacationMode::default());
    let vacation = Arc::new(VacationService::new(
        Arc::clone(&registry),
        Arc::clone(&light),
        Arc::clone(&alarm),
        Arc::clone(&events),
        Arc::clone(&vacation_mode),
    ));
    let cards: Cards = Arc::new(CardService::new(
        Arc::clone(&registry),
        bus.clone(),
        Arc::clone(&alarm),
        directory,
        Arc::clone(&events),
        vacation_mode,
        config.registration.ttl(),
    ));
    let reconciler = Arc::new(ScheduleReconciler::new(
        schedules,
        Arc::clone(&registry),
        Arc::clone(&light),
        Arc::clone(&alarm),
        Arc::clone(&events),
        pending,
    ));
    let audit = Arc::new(AuditRecorder::new(event_log));

    // Tasks
    let mut tasks = spawn_audit(audit, &events, config.events.retention());
    tasks.push(spawn_dispatcher(
        MessageRouter::new(light, alarm, Arc::clone(&cards)),
        inbound,
    ));
    tasks.push(spawn_reconciler(reconciler, config.reconciler.tick()));
    tasks.push(spawn_simulation(
        Arc::clone(&vacation),
        config.vacation.simulation_period(),
    ));
    tasks.push(spawn_registration_expiry(cards));

    if config.vacation.active {
        let armed = vacation.activate().await?;
        tracing::info!(armed, "vacation mode enabled at startup");
    }

    tracing::info!("roomhubd running");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    if let Err(err) = bus.disconnect().await {
        tracing::warn!(%err, "failed to disconnect from broker");
    }
    for task in tasks {
        task.abort();
    }
    mqtt_loop.abort();

    Ok(())
}
