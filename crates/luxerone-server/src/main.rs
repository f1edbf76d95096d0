//! luxerOne standalone host
//!
//! Runs the integration outside of a full Home Assistant install: accounts
//! from `configuration.yaml` go through the config flow, get set up, and are
//! polled on a fixed interval until Ctrl-C.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ha_host::{ConfigEntries, EventBus, FlowResultType, StateMachine};
use luxerone_residential::constants::{PASS, USER};
use luxerone_residential::{
    HttpClientFactory, LuxerOneConfigFlow, LuxerOneIntegration, PollOutcome, EVENT_DOMAIN,
};
use secrecy::ExposeSecret;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{AccountConfig, LuxerOneConfig, DEFAULT_CONFIG_PATH};

/// In-process host services the integration writes to
struct Host {
    bus: Arc<EventBus>,
    states: Arc<StateMachine>,
    entries: Arc<ConfigEntries>,
}

impl Host {
    fn new() -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateMachine::new(bus.clone()));
        Self {
            bus,
            states,
            entries: Arc::new(ConfigEntries::new()),
        }
    }
}

/// What happened to one configured account on a setup attempt
enum Registration {
    Loaded,
    /// Service unreachable; try again next interval
    Retry,
    /// Needs user action; not retried
    Failed,
}

struct Runner {
    host: Host,
    flow: LuxerOneConfigFlow,
    integration: LuxerOneIntegration,
}

impl Runner {
    fn new(config: &LuxerOneConfig) -> Self {
        let host = Host::new();
        let factory = Arc::new(HttpClientFactory::default());
        let flow = LuxerOneConfigFlow::new(factory.clone(), host.entries.clone());
        let integration =
            LuxerOneIntegration::new(factory, host.states.clone(), host.bus.clone())
                .with_comparison(config.change_detection);

        Self {
            host,
            flow,
            integration,
        }
    }

    async fn register(&self, account: &AccountConfig) -> Result<Registration> {
        let input = json!({ USER: account.username, PASS: account.password.expose_secret() });
        let result = self.flow.step_user(Some(&input)).await;

        let entry = match result.result_type {
            FlowResultType::CreateEntry => self
                .host
                .entries
                .add_from_flow(&result)?
                .context("flow did not produce an entry")?,
            FlowResultType::Abort => {
                warn!(
                    "Account {} is already configured ({})",
                    account.username,
                    result.reason.as_deref().unwrap_or("aborted")
                );
                return Ok(Registration::Failed);
            }
            FlowResultType::Form => {
                let reason = result.base_error().unwrap_or("unknown");
                if reason == "cannot_connect" {
                    warn!("Cannot reach luxerOne for {}, will retry", account.username);
                    return Ok(Registration::Retry);
                }
                error!("Could not add account {}: {}", account.username, reason);
                return Ok(Registration::Failed);
            }
        };

        match self.integration.setup_entry(&entry).await {
            Ok(entity_id) => {
                info!("Tracking packages for {} as {}", entry.title, entity_id);
                Ok(Registration::Loaded)
            }
            Err(err) if err.requires_reauth() => {
                let reauth = self.flow.step_reauth(&entry.data).await;
                error!(
                    "Credentials for {} were refused, re-authentication required (step {})",
                    account.username,
                    reauth.step_id.as_deref().unwrap_or("user")
                );
                self.host.entries.remove(&entry.entry_id)?;
                Ok(Registration::Failed)
            }
            Err(err) => {
                warn!("Setup of {} failed: {}, will retry", entry.title, err);
                self.host.entries.remove(&entry.entry_id)?;
                Ok(Registration::Retry)
            }
        }
    }

    /// Try to register every waiting account, keeping those worth retrying
    async fn register_waiting(&self, waiting: Vec<AccountConfig>) -> Vec<AccountConfig> {
        let mut retry = Vec::new();
        for account in waiting {
            match self.register(&account).await {
                Ok(Registration::Loaded) | Ok(Registration::Failed) => {}
                Ok(Registration::Retry) => retry.push(account),
                Err(err) => error!("Failed to register {}: {:#}", account.username, err),
            }
        }
        retry
    }

    async fn poll(&self) {
        for (entry_id, outcome) in self.integration.poll_all().await {
            match outcome {
                PollOutcome::Updated {
                    count,
                    codes_changed,
                    reauthenticated,
                } => debug!(
                    entry_id = %entry_id,
                    count,
                    codes_changed,
                    reauthenticated,
                    "Poll cycle completed"
                ),
                PollOutcome::Failed { reason } => {
                    debug!(entry_id = %entry_id, reason = %reason, "Poll cycle failed")
                }
                PollOutcome::Removed => {}
            }
        }
    }

    async fn shutdown(&self) {
        for entry_id in self.integration.entry_ids() {
            self.integration.unload_entry(&entry_id).await;
        }
        info!(
            "Unloaded all entries, {} entities remain",
            self.host.states.entity_count()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = config::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    info!(
        "Starting luxerOne with {} account(s), polling every {}s",
        config.accounts.len(),
        config.scan_interval
    );

    let runner = Runner::new(&config);

    let mut events = runner.host.bus.subscribe(EVENT_DOMAIN);
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(
                    "New package detected for {}",
                    event.data["entity_id"].as_str().unwrap_or("unknown entity")
                ),
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} package events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut waiting = runner.register_waiting(config.accounts.clone()).await;

    let mut interval = tokio::time::interval(Duration::from_secs(config.scan_interval));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // setup already ran the first poll
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !waiting.is_empty() {
                    waiting = runner.register_waiting(waiting).await;
                }
                runner.poll().await;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutting down...");
                break;
            }
        }
    }

    runner.shutdown().await;
    Ok(())
}
