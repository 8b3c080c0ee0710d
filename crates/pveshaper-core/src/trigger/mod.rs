// ── Trigger registry ──
//
// Recurring, time-zone-aware triggers. Each trigger is bound to one action
// and fires at most once per local calendar day, when the registry is
// ticked during the matching local minute. Actions are spawned as
// independent tasks so a slow request never delays another trigger.

mod clock;
mod time_of_day;

pub use clock::{Clock, SystemClock};
pub use time_of_day::TimeOfDay;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CoreError;

/// How often the clock loop evaluates triggers. Must stay well under a
/// minute, the schedule granularity.
pub const TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Work run when a trigger fires. Called once per firing.
pub type Action = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Registry-assigned trigger identifier, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(usize);

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One recurring daily trigger.
pub struct Trigger {
    id: TriggerId,
    label: String,
    at: TimeOfDay,
    tz: Tz,
    action: Action,
    /// Local date of the last firing; guards against double fires when the
    /// loop ticks several times inside the matching minute.
    last_fired: Option<NaiveDate>,
}

impl Trigger {
    pub fn id(&self) -> TriggerId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The local date this trigger should fire on, if `now` falls inside
    /// its minute and it has not fired on that date yet.
    fn due_date(&self, now: DateTime<Utc>) -> Option<NaiveDate> {
        let local = now.with_timezone(&self.tz);
        let matches = local.hour() == u32::from(self.at.hour())
            && local.minute() == u32::from(self.at.minute());
        let date = local.date_naive();
        (matches && self.last_fired != Some(date)).then_some(date)
    }

    /// Next instant strictly after `now` at which this trigger would fire.
    ///
    /// Local times skipped by a DST jump are not fired on that day.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.with_timezone(&self.tz).date_naive();
        (0..=2)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .filter_map(|date| {
                date.and_hms_opt(u32::from(self.at.hour()), u32::from(self.at.minute()), 0)
            })
            .filter_map(|naive| self.tz.from_local_datetime(&naive).earliest())
            .map(|local| local.with_timezone(&Utc))
            .find(|instant| *instant > now)
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("at", &self.at)
            .field("tz", &self.tz)
            .field("last_fired", &self.last_fired)
            .finish_non_exhaustive()
    }
}

/// Owns every registered trigger and evaluates them against a clock.
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    triggers: Vec<Trigger>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action to run daily at `at` local time in `tz`.
    pub fn register(
        &mut self,
        at: TimeOfDay,
        tz: Tz,
        label: impl Into<String>,
        action: Action,
    ) -> TriggerId {
        let id = TriggerId(self.triggers.len());
        let label = label.into();
        debug!(trigger = %id, %at, %tz, label = %label, "registered trigger");
        self.triggers.push(Trigger {
            id,
            label,
            at,
            tz,
            action,
            last_fired: None,
        });
        id
    }

    /// Like [`register`](Self::register), parsing `HH:MM` first.
    ///
    /// A malformed time is an error rather than a skipped entry: a trigger
    /// that never fires is a silently unenforced schedule.
    pub fn register_action(
        &mut self,
        time_of_day: &str,
        tz: Tz,
        label: impl Into<String>,
        action: Action,
    ) -> Result<TriggerId, CoreError> {
        let at = time_of_day.parse()?;
        Ok(self.register(at, tz, label, action))
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter()
    }

    /// Fire every trigger due at `now`.
    ///
    /// Each action is spawned on its own task and is not awaited here.
    /// The handles are returned for callers that want to observe
    /// completion; dropping them detaches the tasks.
    pub fn fire_due(&mut self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for trigger in &mut self.triggers {
            let Some(date) = trigger.due_date(now) else {
                continue;
            };
            trigger.last_fired = Some(date);
            info!(trigger = %trigger.id, at = %trigger.at, label = %trigger.label, "trigger fired");
            handles.push(tokio::spawn((trigger.action)()));
        }
        handles
    }

    /// Spawn the clock loop. The registry moves into the loop and is handed
    /// back by [`RegistryHandle::stop`].
    pub fn start<C: Clock>(self, clock: C) -> RegistryHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(clock_loop(self, clock, cancel.clone()));
        RegistryHandle { cancel, task }
    }
}

/// Handle to a running clock loop.
#[derive(Debug)]
pub struct RegistryHandle {
    cancel: CancellationToken,
    task: JoinHandle<TriggerRegistry>,
}

impl RegistryHandle {
    /// Stop ticking and recover the registry. Actions already in flight
    /// keep running to completion.
    pub async fn stop(self) -> Result<TriggerRegistry, CoreError> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| CoreError::Internal(format!("trigger loop terminated abnormally: {e}")))
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

async fn clock_loop<C: Clock>(
    mut registry: TriggerRegistry,
    clock: C,
    cancel: CancellationToken,
) -> TriggerRegistry {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(triggers = registry.len(), "trigger loop started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let fired = registry.fire_due(clock.now());
                if !fired.is_empty() {
                    debug!(count = fired.len(), "dispatched trigger actions");
                }
            }
        }
    }

    info!("trigger loop stopped");
    registry
}
