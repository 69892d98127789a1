//! klaxonctl - command-line client for klaxond
//!
//! Every subcommand is one request over the daemon socket, except `watch`,
//! which subscribes and prints events until the daemon goes away.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, Weekday};
use clap::{Parser, Subcommand};
use klaxon_api::{
    AlarmKind, AlarmState, AlarmView, Command, EngineStateSnapshot, EventPayload, FiringRole,
    ResponsePayload,
};
use klaxon_ipc::{IpcClient, IpcError};
use klaxon_util::{
    AlarmId, KLAXON_SOCKET_ENV, TimeOfDay, format_clock_time, format_datetime_full,
    format_duration, parse_local_datetime, parse_weekday, socket_path_without_env,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "klaxonctl")]
#[command(about = "Control the klaxond alarm scheduler", long_about = None)]
struct Cli {
    /// Daemon socket path
    #[arg(short, long, env = KLAXON_SOCKET_ENV, default_value_os_t = socket_path_without_env())]
    socket: PathBuf,

    /// Print raw JSON payloads instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show the primary notification and every alarm
    Status,
    /// List alarms in creation order
    List,
    /// Create a new alarm. It stays disabled until scheduled and enabled.
    Add { label: Option<String> },
    /// Set an alarm's schedule
    Set {
        #[command(subcommand)]
        schedule: Schedule,
    },
    Rename { id: AlarmId, label: String },
    Enable { id: AlarmId },
    Disable { id: AlarmId },
    Remove { id: AlarmId },
    /// Dismiss a firing alarm (the primary when no id is given)
    Dismiss { id: Option<AlarmId> },
    /// Snooze a firing alarm (the primary when no id is given)
    Snooze { id: Option<AlarmId> },
    /// Snooze length given to alarms created from now on
    SnoozeDefault {
        #[arg(value_parser = clap::value_parser!(u64).range(1..=1440))]
        minutes: u64,
    },
    /// Daemon health
    Health,
    /// Print events as they happen
    Watch,
}

#[derive(Subcommand, Debug)]
enum Schedule {
    /// Fire once at "YYYY-MM-DD HH:MM[:SS]"
    Once {
        id: AlarmId,
        #[arg(value_parser = parse_at)]
        at: DateTime<Local>,
    },
    /// Fire every day at HH:MM[:SS]
    Daily { id: AlarmId, time: TimeOfDay },
    /// Fire every week on a day at HH:MM[:SS]
    Weekly {
        id: AlarmId,
        #[arg(value_parser = parse_day)]
        day: Weekday,
        time: TimeOfDay,
    },
}

fn parse_at(s: &str) -> Result<DateTime<Local>, String> {
    parse_local_datetime(s).ok_or_else(|| format!("expected YYYY-MM-DD HH:MM[:SS], got '{}'", s))
}

fn parse_day(s: &str) -> Result<Weekday, String> {
    parse_weekday(s).ok_or_else(|| format!("unknown day '{}'", s))
}

/// Map a subcommand onto its protocol command. `None` for `watch`.
fn to_command(cmd: &Cmd) -> Result<Option<Command>> {
    let command = match cmd {
        Cmd::Status => Command::GetState,
        Cmd::List => Command::ListAlarms,
        Cmd::Add { label } => Command::CreateAlarm {
            label: label.clone(),
        },
        Cmd::Set { schedule } => {
            let (alarm_id, kind) = match schedule {
                Schedule::Once { id, at } => (id, AlarmKind::OneTime { fire_at: *at }),
                Schedule::Daily { id, time } => (id, AlarmKind::Daily { time: *time }),
                Schedule::Weekly { id, day, time } => (
                    id,
                    AlarmKind::Weekly {
                        day: *day,
                        time: *time,
                    },
                ),
            };
            Command::ConfigureAlarm {
                alarm_id: alarm_id.clone(),
                kind,
            }
        }
        Cmd::Rename { id, label } => Command::RenameAlarm {
            alarm_id: id.clone(),
            label: label.clone(),
        },
        Cmd::Enable { id } => Command::SetEnabled {
            alarm_id: id.clone(),
            enabled: true,
        },
        Cmd::Disable { id } => Command::SetEnabled {
            alarm_id: id.clone(),
            enabled: false,
        },
        Cmd::Remove { id } => Command::RemoveAlarm {
            alarm_id: id.clone(),
        },
        Cmd::Dismiss { id } => Command::Dismiss {
            alarm_id: id.clone(),
        },
        Cmd::Snooze { id } => Command::Snooze {
            alarm_id: id.clone(),
        },
        Cmd::SnoozeDefault { minutes } => {
            let secs = minutes
                .checked_mul(60)
                .with_context(|| format!("{} minutes is too long a snooze", minutes))?;
            Command::SetDefaultSnooze {
                duration: Duration::from_secs(secs),
            }
        }
        Cmd::Health => Command::GetHealth,
        Cmd::Watch => return Ok(None),
    };
    Ok(Some(command))
}

fn state_label(view: &AlarmView) -> &'static str {
    match view.state {
        AlarmState::Firing(FiringRole::Primary) => "FIRING",
        AlarmState::Firing(FiringRole::Secondary) => "firing (queued)",
        AlarmState::Idle if !view.initialized => "not set",
        AlarmState::Idle if !view.enabled => "off",
        AlarmState::Idle if view.snoozed => "snoozed",
        AlarmState::Idle => "on",
    }
}

fn format_alarm(view: &AlarmView) -> String {
    let when = view
        .current_fire_time
        .as_ref()
        .map(format_datetime_full)
        .unwrap_or_else(|| "-".into());
    format!(
        "{}  {:<20} {:<10} {:<20} {}",
        view.alarm_id,
        view.label,
        view.summary,
        when,
        state_label(view)
    )
}

fn print_alarms(alarms: &[AlarmView]) {
    if alarms.is_empty() {
        println!("No alarms");
        return;
    }
    for view in alarms {
        println!("{}", format_alarm(view));
    }
}

fn print_state(state: &EngineStateSnapshot) {
    let primary = state
        .primary
        .as_ref()
        .and_then(|id| state.alarms.iter().find(|a| &a.alarm_id == id));
    match primary {
        Some(view) => println!("Firing: {} ({})", view.label, view.alarm_id),
        None if state.primary_notification_open => println!("Firing: handing over"),
        None => println!("Nothing firing"),
    }
    println!("Default snooze: {}", format_duration(state.default_snooze));
    println!();
    print_alarms(&state.alarms);
}

fn print_payload(payload: &ResponsePayload) {
    match payload {
        ResponsePayload::State(state) => print_state(state),
        ResponsePayload::Alarms { alarms } => print_alarms(alarms),
        ResponsePayload::Alarm(view) => println!("{}", format_alarm(view)),
        ResponsePayload::AlarmRemoved { alarm_id } => println!("Removed {}", alarm_id),
        ResponsePayload::Dismissed {
            alarm_id,
            next_fire_time,
        } => match next_fire_time {
            Some(next) => println!("Dismissed {}, next at {}", alarm_id, format_datetime_full(next)),
            None => println!("Dismissed {}, no further occurrences", alarm_id),
        },
        ResponsePayload::Snoozed { alarm_id, until } => {
            println!("Snoozed {} until {}", alarm_id, format_datetime_full(until))
        }
        ResponsePayload::DefaultSnoozeSet { duration } => {
            println!("Default snooze is now {}", format_duration(*duration))
        }
        ResponsePayload::Health(health) => println!(
            "live: {}, ready: {}, store: {}",
            health.live,
            health.ready,
            if health.store_ok { "ok" } else { "failing" }
        ),
        ResponsePayload::Subscribed { .. } | ResponsePayload::Unsubscribed => {}
        ResponsePayload::Pong => println!("pong"),
    }
}

/// One-line description of an event, `None` for events `watch` stays quiet about
fn describe_event(payload: &EventPayload) -> Option<String> {
    let line = match payload {
        EventPayload::StateChanged(_) => return None,
        EventPayload::AlarmFired {
            label,
            role: FiringRole::Primary,
            scheduled_for,
            ..
        } => format!(
            "ALARM: {} (scheduled {})",
            label,
            format_datetime_full(scheduled_for)
        ),
        EventPayload::AlarmFired {
            label,
            role: FiringRole::Secondary,
            ..
        } => format!("queued: {}", label),
        EventPayload::AlarmPromoted { label, .. } => format!("ALARM: {}", label),
        EventPayload::AlarmDismissed {
            alarm_id,
            next_fire_time,
            retired,
        } => match (next_fire_time, retired) {
            (Some(next), _) => format!("dismissed {}, next {}", alarm_id, format_datetime_full(next)),
            (None, true) => format!("dismissed {}, retired", alarm_id),
            (None, false) => format!("dismissed {}", alarm_id),
        },
        EventPayload::AlarmSnoozed { alarm_id, until } => {
            format!("snoozed {} until {}", alarm_id, format_datetime_full(until))
        }
        EventPayload::AlarmSilenced { alarm_id } => format!("silenced {}", alarm_id),
        EventPayload::AlarmsChanged { alarm_count } => format!("{} alarm(s)", alarm_count),
        EventPayload::Shutdown => "daemon shutting down".to_string(),
    };
    Some(line)
}

async fn watch(client: IpcClient, json: bool) -> Result<()> {
    let mut events = client.subscribe().await.context("Failed to subscribe")?;

    loop {
        let event = match events.next().await {
            Ok(event) => event,
            Err(IpcError::ConnectionClosed) => {
                debug!("Daemon closed the connection");
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to read event"),
        };

        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else if let Some(line) = describe_event(&event.payload) {
            println!("[{}] {}", format_clock_time(&event.timestamp), line);
        }

        if matches!(event.payload, EventPayload::Shutdown) {
            return Ok(());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut client = IpcClient::connect(&cli.socket)
        .await
        .with_context(|| format!("Failed to connect to klaxond at {:?}", cli.socket))?;

    let Some(command) = to_command(&cli.command)? else {
        return watch(client, cli.json).await;
    };

    debug!(?command, "Sending command");
    let payload = match client.call(command).await {
        Ok(payload) => payload,
        Err(IpcError::Rejected { code, message }) => bail!("{:?}: {}", code, message),
        Err(e) => return Err(e).context("Request failed"),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_payload(&payload);
    }
    Ok(())
}
