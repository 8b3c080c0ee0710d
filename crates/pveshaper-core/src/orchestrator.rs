// ── Orchestrator ──
//
// Owns the validated configuration, one `PveClient` per server and the
// trigger registry. Lifecycle: `new` (build clients, compile, register)
// -> `start` -> `stop`. `catch_up` may run while the clock loop ticks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

use pveshaper_api::PveClient;

use crate::action;
use crate::compiler::{self, ScheduledAction};
use crate::error::CoreError;
use crate::model::ScheduleConfig;
use crate::trigger::{Clock, RegistryHandle, SystemClock, TriggerRegistry};

/// Registry lifecycle state.
#[derive(Debug)]
enum State {
    Idle(TriggerRegistry),
    Running(RegistryHandle),
    /// Transient while moving between the other two.
    Empty,
}

/// Drives the whole schedule for every configured server.
#[derive(Debug)]
pub struct Orchestrator {
    config: ScheduleConfig,
    clients: IndexMap<Url, Arc<PveClient>>,
    scheduled: Vec<ScheduledAction>,
    state: State,
}

impl Orchestrator {
    /// Build clients and register one trigger per scheduled action.
    /// Does NOT start the clock -- call [`start()`](Self::start).
    pub fn new(config: ScheduleConfig) -> Result<Self, CoreError> {
        let mut clients = IndexMap::new();
        for server in &config.servers {
            let client = PveClient::new(server.url.clone(), server.token.clone(), &server.transport)?;
            info!(server = %server.url, token = client.token_id(), "control-plane client ready");
            // Two entries for one URL would silently share the last token.
            if clients.insert(server.url.clone(), Arc::new(client)).is_some() {
                return Err(CoreError::Config {
                    message: format!("server {} is configured more than once", server.url),
                });
            }
        }

        let scheduled = compiler::compile(&config);
        let mut registry = TriggerRegistry::new();
        for item in &scheduled {
            let client = client_for(&clients, &item.server)?;
            registry.register(
                item.at,
                config.timezone,
                item.to_string(),
                action::bind(client, item.clone()),
            );
        }
        info!(
            servers = clients.len(),
            triggers = registry.len(),
            timezone = %config.timezone,
            "schedule compiled"
        );

        Ok(Self {
            config,
            clients,
            scheduled,
            state: State::Idle(registry),
        })
    }

    /// Every compiled action, in registration order.
    pub fn scheduled(&self) -> &[ScheduledAction] {
        &self.scheduled
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    /// Manually evaluate the triggers at `now` while the clock loop is not
    /// running. Returns the spawned action handles.
    pub fn fire_due(&mut self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        match &mut self.state {
            State::Idle(registry) => registry.fire_due(now),
            State::Running(_) | State::Empty => {
                warn!("fire_due ignored while the trigger loop is running");
                Vec::new()
            }
        }
    }

    /// Apply the rate that should currently be in force on every scheduled
    /// interface. Exact-minute triggers never replay a missed time, so this
    /// is how a restart catches up.
    pub fn catch_up(&self, now: DateTime<Utc>) -> Result<Vec<JoinHandle<bool>>, CoreError> {
        let pending = compiler::in_effect_at(&self.config, now);
        info!(actions = pending.len(), "applying rates currently in effect");
        pending
            .into_iter()
            .map(|item| {
                let client = client_for(&self.clients, &item.server)?;
                Ok(tokio::spawn(action::run_scheduled_rate(client, item)))
            })
            .collect()
    }

    /// Start ticking against the system clock.
    pub fn start(&mut self) {
        self.start_with_clock(SystemClock);
    }

    /// Start ticking against `clock`. No-op when already running.
    pub fn start_with_clock<C: Clock>(&mut self, clock: C) {
        match std::mem::replace(&mut self.state, State::Empty) {
            State::Idle(registry) => {
                for trigger in registry.iter() {
                    if let Some(next) = trigger.next_fire_after(clock.now()) {
                        info!(
                            trigger = %trigger.id(),
                            label = trigger.label(),
                            next = %next.with_timezone(&self.config.timezone).to_rfc3339(),
                            "next firing"
                        );
                    }
                }
                self.state = State::Running(registry.start(clock));
            }
            other => {
                warn!("trigger loop already running");
                self.state = other;
            }
        }
    }

    /// Stop the clock loop. Actions already in flight are left to finish.
    pub async fn stop(&mut self) -> Result<(), CoreError> {
        match std::mem::replace(&mut self.state, State::Empty) {
            State::Running(handle) => {
                let registry = handle.stop().await?;
                self.state = State::Idle(registry);
                Ok(())
            }
            other => {
                self.state = other;
                Ok(())
            }
        }
    }
}

fn client_for(
    clients: &IndexMap<Url, Arc<PveClient>>,
    url: &Url,
) -> Result<Arc<PveClient>, CoreError> {
    clients
        .get(url)
        .map(Arc::clone)
        .ok_or_else(|| CoreError::UnknownServer {
            url: url.to_string(),
        })
}
