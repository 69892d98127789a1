//! klaxond - The klaxon background service
//!
//! This is the main entry point for the klaxond service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Alarm engine and its tick loop
//! - IPC server

use anyhow::{Context, Result};
use clap::Parser;
use klaxon_api::{
    Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus, Response, ResponsePayload,
};
use klaxon_config::load_config_or_default;
use klaxon_core::{AlarmEngine, CoreEvent};
use klaxon_ipc::{IpcServer, ServerMessage};
use klaxon_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use klaxon_util::{
    ClientId, KLAXON_CONFIG_ENV, KLAXON_DATA_DIR_ENV, KLAXON_SOCKET_ENV, KlaxonError,
    default_config_path,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// klaxond - Personal alarm scheduler
#[derive(Parser, Debug)]
#[command(name = "klaxond")]
#[command(about = "Personal alarm scheduler daemon", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/klaxon/config.toml)
    #[arg(short, long, env = KLAXON_CONFIG_ENV, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override
    #[arg(short, long, env = KLAXON_SOCKET_ENV)]
    socket: Option<PathBuf>,

    /// Data directory override
    #[arg(short, long, env = KLAXON_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    engine: AlarmEngine,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    tick_interval: Duration,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let config = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            preset_count = config.alarms.len(),
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| config.daemon.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| config.daemon.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("klaxond.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::DaemonStarted))?;
        store.append_audit(AuditEvent::new(AuditEventType::ConfigLoaded {
            preset_count: config.alarms.len(),
        }))?;

        let mut engine = AlarmEngine::new(&config.defaults, store.clone());
        engine.seed(&config.alarms, klaxon_util::now());

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start()
            .await
            .with_context(|| format!("Failed to bind socket {:?}", socket_path))?;

        Ok(Self {
            engine,
            ipc: Arc::new(ipc),
            store,
            tick_interval: config.daemon.tick_interval,
        })
    }

    async fn run(self) -> Result<()> {
        let ipc = self.ipc.clone();
        let mut ipc_messages = ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let engine = Arc::new(Mutex::new(self.engine));
        let store = self.store.clone();

        let ipc_accept = ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let mut tick_timer = tokio::time::interval(self.tick_interval);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(tick_ms = self.tick_interval.as_millis() as u64, "Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                _ = tick_timer.tick() => {
                    let now = klaxon_util::now();
                    let events = engine.lock().await.tick(now);
                    Self::publish(&engine, &ipc, events).await;
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&engine, &ipc, &store, msg).await;
                }
            }
        }

        info!("Shutting down klaxond");

        engine.lock().await.persist();
        ipc.broadcast_event(Event::new(EventPayload::Shutdown));

        if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::DaemonStopped)) {
            warn!(error = %e, "Failed to log daemon shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }

    /// Forward engine events to subscribers, followed by a fresh snapshot
    async fn publish(engine: &Arc<Mutex<AlarmEngine>>, ipc: &Arc<IpcServer>, events: Vec<CoreEvent>) {
        if events.is_empty() {
            return;
        }

        for event in events {
            if let Some(payload) = event_payload(event) {
                ipc.broadcast_event(Event::new(payload));
            }
        }

        let state = engine.lock().await.get_state();
        ipc.broadcast_event(Event::new(EventPayload::StateChanged(state)));
    }

    async fn handle_ipc_message(
        engine: &Arc<Mutex<AlarmEngine>>,
        ipc: &Arc<IpcServer>,
        store: &Arc<dyn Store>,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                let (response, events) =
                    Self::handle_command(engine, ipc, store, &client_id, request.request_id, request.command)
                        .await;

                let _ = ipc.send_response(&client_id, response).await;
                Self::publish(engine, ipc, events).await;
            }

            ServerMessage::ClientConnected { client_id, info } => {
                debug!(
                    client_id = %client_id,
                    role = ?info.role,
                    uid = ?info.uid,
                    "Client registered"
                );

                let _ = store.append_audit(AuditEvent::new(AuditEventType::ClientConnected {
                    client_id: client_id.to_string(),
                    role: format!("{:?}", info.role),
                    uid: info.uid,
                }));
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                let _ = store.append_audit(AuditEvent::new(AuditEventType::ClientDisconnected {
                    client_id: client_id.to_string(),
                }));
            }
        }
    }

    async fn handle_command(
        engine: &Arc<Mutex<AlarmEngine>>,
        ipc: &Arc<IpcServer>,
        store: &Arc<dyn Store>,
        client_id: &ClientId,
        request_id: u64,
        command: Command,
    ) -> (Response, Vec<CoreEvent>) {
        let now = klaxon_util::now();

        if command.is_mutating() {
            if let Some(info) = ipc.get_client_info(client_id).await {
                if !info.role.can_modify() {
                    return (
                        Response::error(
                            request_id,
                            ErrorInfo::new(ErrorCode::PermissionDenied, "Read-only client"),
                        ),
                        Vec::new(),
                    );
                }
            }
        }

        let mut eng = engine.lock().await;

        let result: Result<(ResponsePayload, Vec<CoreEvent>), KlaxonError> = match command {
            Command::GetState => Ok((ResponsePayload::State(eng.get_state()), Vec::new())),

            Command::ListAlarms => Ok((
                ResponsePayload::Alarms {
                    alarms: eng.list_alarms(),
                },
                Vec::new(),
            )),

            Command::CreateAlarm { label } => {
                let (alarm_id, events) = eng.create_alarm(label);
                alarm_payload(&eng, &alarm_id).map(|payload| (payload, events))
            }

            Command::ConfigureAlarm { alarm_id, kind } => eng
                .configure(&alarm_id, kind, now)
                .and_then(|events| alarm_payload(&eng, &alarm_id).map(|p| (p, events))),

            Command::RenameAlarm { alarm_id, label } => eng
                .rename(&alarm_id, label)
                .and_then(|events| alarm_payload(&eng, &alarm_id).map(|p| (p, events))),

            Command::SetEnabled { alarm_id, enabled } => eng
                .set_enabled(&alarm_id, enabled)
                .and_then(|events| alarm_payload(&eng, &alarm_id).map(|p| (p, events))),

            Command::RemoveAlarm { alarm_id } => eng
                .remove(&alarm_id)
                .map(|events| (ResponsePayload::AlarmRemoved { alarm_id }, events)),

            Command::Dismiss { alarm_id } => {
                let outcome = match &alarm_id {
                    Some(id) => eng.dismiss(id, now),
                    None => eng.dismiss_primary(now),
                };
                outcome.and_then(|event| {
                    let CoreEvent::AlarmDismissed {
                        alarm_id,
                        next_fire_time,
                        ..
                    } = event.clone()
                    else {
                        return Err(KlaxonError::internal("unexpected dismiss outcome"));
                    };
                    let payload = ResponsePayload::Dismissed {
                        alarm_id,
                        next_fire_time,
                    };
                    Ok((payload, vec![event]))
                })
            }

            Command::Snooze { alarm_id } => {
                let outcome = match &alarm_id {
                    Some(id) => eng.snooze(id, now),
                    None => eng.snooze_primary(now),
                };
                outcome.and_then(|event| {
                    let CoreEvent::AlarmSnoozed { alarm_id, until } = event.clone() else {
                        return Err(KlaxonError::internal("unexpected snooze outcome"));
                    };
                    Ok((ResponsePayload::Snoozed { alarm_id, until }, vec![event]))
                })
            }

            Command::SetDefaultSnooze { duration } => eng
                .set_default_snooze(duration)
                .map(|event| (ResponsePayload::DefaultSnoozeSet { duration }, vec![event])),

            Command::SubscribeEvents => Ok((
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
                Vec::new(),
            )),

            Command::UnsubscribeEvents => Ok((ResponsePayload::Unsubscribed, Vec::new())),

            Command::GetHealth => Ok((
                ResponsePayload::Health(HealthStatus {
                    live: true,
                    ready: true,
                    store_ok: store.is_healthy(),
                }),
                Vec::new(),
            )),

            Command::Ping => Ok((ResponsePayload::Pong, Vec::new())),
        };

        match result {
            Ok((payload, events)) => (Response::success(request_id, payload), events),
            Err(e) => {
                if e.is_contract_violation() {
                    debug!(error = %e, "Rejected alarm transition");
                } else {
                    warn!(error = %e, "Command failed");
                }
                (Response::error(request_id, error_info(&e)), Vec::new())
            }
        }
    }
}

fn alarm_payload(
    engine: &AlarmEngine,
    alarm_id: &klaxon_util::AlarmId,
) -> Result<ResponsePayload, KlaxonError> {
    engine
        .get_alarm(alarm_id)
        .map(ResponsePayload::Alarm)
        .ok_or_else(|| KlaxonError::AlarmNotFound(alarm_id.clone()))
}

/// Protocol error for an engine error
fn error_info(e: &KlaxonError) -> ErrorInfo {
    let code = match e {
        KlaxonError::AlarmNotFound(_) => ErrorCode::AlarmNotFound,
        KlaxonError::AlreadyFiring(_) | KlaxonError::NotFiring(_) => ErrorCode::InvalidTransition,
        KlaxonError::NothingFiring => ErrorCode::NothingFiring,
        KlaxonError::ValidationError(_) | KlaxonError::ConfigError(_) => ErrorCode::InvalidRequest,
        KlaxonError::StoreError(_) => ErrorCode::StoreError,
        KlaxonError::IpcError(_) | KlaxonError::Internal(_) => ErrorCode::InternalError,
    };
    ErrorInfo::new(code, e.to_string())
}

/// Client-facing event for an engine event. Settings changes are covered by
/// the state snapshot that follows every batch.
fn event_payload(event: CoreEvent) -> Option<EventPayload> {
    let payload = match event {
        CoreEvent::AlarmFired {
            alarm_id,
            label,
            role,
            scheduled_for,
        } => EventPayload::AlarmFired {
            alarm_id,
            label,
            role,
            scheduled_for,
        },
        CoreEvent::AlarmPromoted { alarm_id, label } => {
            EventPayload::AlarmPromoted { alarm_id, label }
        }
        CoreEvent::AlarmDismissed {
            alarm_id,
            next_fire_time,
            retired,
        } => EventPayload::AlarmDismissed {
            alarm_id,
            next_fire_time,
            retired,
        },
        CoreEvent::AlarmSnoozed { alarm_id, until } => {
            EventPayload::AlarmSnoozed { alarm_id, until }
        }
        CoreEvent::AlarmSilenced { alarm_id } => EventPayload::AlarmSilenced { alarm_id },
        CoreEvent::AlarmsChanged { alarm_count } => EventPayload::AlarmsChanged { alarm_count },
        CoreEvent::DefaultSnoozeChanged { .. } => return None,
    };
    Some(payload)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "klaxond starting");

    if klaxon_util::is_mock_time_active() {
        warn!(now = %klaxon_util::now(), "Running with mock time");
    }

    let service = Service::new(&args).await?;
    service.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use klaxon_api::FiringRole;
    use klaxon_util::AlarmId;

    #[test]
    fn contract_errors_map_to_transition_codes() {
        let id = AlarmId::new();
        assert_eq!(
            error_info(&KlaxonError::NotFiring(id.clone())).code,
            ErrorCode::InvalidTransition
        );
        assert_eq!(
            error_info(&KlaxonError::AlarmNotFound(id)).code,
            ErrorCode::AlarmNotFound
        );
        assert_eq!(
            error_info(&KlaxonError::NothingFiring).code,
            ErrorCode::NothingFiring
        );
        assert_eq!(
            error_info(&KlaxonError::validation("bad")).code,
            ErrorCode::InvalidRequest
        );
    }

    #[test]
    fn fired_event_is_forwarded() {
        let payload = event_payload(CoreEvent::AlarmFired {
            alarm_id: AlarmId::new(),
            label: "Wake up".into(),
            role: FiringRole::Secondary,
            scheduled_for: klaxon_util::now(),
        });
        assert!(matches!(
            payload,
            Some(EventPayload::AlarmFired {
                role: FiringRole::Secondary,
                ..
            })
        ));

        assert!(
            event_payload(CoreEvent::DefaultSnoozeChanged {
                duration: Duration::from_secs(60)
            })
            .is_none()
        );
    }

    #[test]
    fn args_parse_overrides() {
        let args = Args::try_parse_from([
            "klaxond",
            "--config",
            "/tmp/klaxon.toml",
            "--socket",
            "/tmp/klaxon.sock",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.config, PathBuf::from("/tmp/klaxon.toml"));
        assert_eq!(args.socket, Some(PathBuf::from("/tmp/klaxon.sock")));
        assert_eq!(args.log_level, "debug");
    }
}
