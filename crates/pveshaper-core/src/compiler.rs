// ── Schedule compiler ──
//
// Flattens the configuration tree into one `ScheduledAction` per
// (guest, time, interface). Order is deterministic: servers and nodes in
// `ScheduleConfig` order, guests in list order, times ascending, interfaces
// by name. Actions are independent of each other, so order only matters
// for reproducible logs.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::model::{GuestTarget, Rate, ScheduleConfig};
use crate::trigger::TimeOfDay;

/// One rate change for one interface of one guest at one time of day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledAction {
    pub server: Url,
    pub guest: GuestTarget,
    pub at: TimeOfDay,
    pub interface: String,
    pub rate: Rate,
}

impl fmt::Display for ScheduledAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{} -> {} @ {}",
            self.server.host_str().unwrap_or("?"),
            self.guest,
            self.interface,
            self.rate,
            self.at
        )
    }
}

/// Produce every scheduled action in the configuration.
pub fn compile(config: &ScheduleConfig) -> Vec<ScheduledAction> {
    let mut actions = Vec::new();
    let mut seen: HashSet<(&Url, GuestTarget)> = HashSet::new();

    for server in &config.servers {
        for node in &server.nodes {
            for guest in &node.guests {
                let target = node.target(guest);
                if !seen.insert((&server.url, target.clone())) {
                    warn!(server = %server.url, guest = %target, "guest listed more than once; both schedules apply");
                }
                if guest.schedule.is_empty() {
                    debug!(server = %server.url, guest = %target, "guest has an empty schedule");
                }
                for (at, rates) in guest.schedule.entries() {
                    for (interface, rate) in rates {
                        actions.push(ScheduledAction {
                            server: server.url.clone(),
                            guest: target.clone(),
                            at,
                            interface: interface.clone(),
                            rate: *rate,
                        });
                    }
                }
            }
        }
    }

    debug!(count = actions.len(), "compiled schedule");
    actions
}

/// The action currently in force for every (guest, interface), evaluated at
/// `now` in the configured zone. Used to bring guests in line after a
/// restart, since exact-minute triggers do not replay missed times.
pub fn in_effect_at(config: &ScheduleConfig, now: DateTime<Utc>) -> Vec<ScheduledAction> {
    let local = now.with_timezone(&config.timezone);
    let Ok(current) = TimeOfDay::new(
        u8::try_from(local.hour()).unwrap_or_default(),
        u8::try_from(local.minute()).unwrap_or_default(),
    ) else {
        return Vec::new();
    };

    let mut actions = Vec::new();
    for server in &config.servers {
        for node in &server.nodes {
            for guest in &node.guests {
                let target = node.target(guest);
                for interface in guest.schedule.interfaces() {
                    if let Some((at, rate)) = guest.schedule.rate_in_effect(interface, current) {
                        actions.push(ScheduledAction {
                            server: server.url.clone(),
                            guest: target.clone(),
                            at,
                            interface: interface.to_owned(),
                            rate,
                        });
                    }
                }
            }
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use pveshaper_api::{ApiToken, GuestKind, TransportConfig};
    use secrecy::SecretString;

    use super::*;
    use crate::model::{Guest, Node, RateSet, Schedule, Server};

    fn at(s: &str) -> TimeOfDay {
        s.parse().expect("valid time")
    }

    fn rates(pairs: &[(&str, u32)]) -> RateSet {
        pairs
            .iter()
            .map(|(iface, r)| ((*iface).to_owned(), Rate::mbps(*r)))
            .collect()
    }

    fn guest(kind: GuestKind, vmid: u32, entries: Vec<(&str, RateSet)>) -> Guest {
        let schedule: BTreeMap<_, _> = entries.into_iter().map(|(t, r)| (at(t), r)).collect();
        Guest {
            kind,
            vmid,
            schedule: Schedule::new(schedule),
        }
    }

    fn server(url: &str, nodes: Vec<Node>) -> Server {
        Server {
            url: Url::parse(url).expect("valid url"),
            token: ApiToken::new("root@pam!t", SecretString::from("s".to_string())),
            transport: TransportConfig::default(),
            nodes,
        }
    }

    fn sample() -> ScheduleConfig {
        ScheduleConfig {
            timezone: chrono_tz::Asia::Seoul,
            servers: vec![
                server(
                    "https://pve-b.lan:8006",
                    vec![Node {
                        name: "b1".into(),
                        guests: vec![guest(
                            GuestKind::Qemu,
                            200,
                            vec![
                                ("22:00", rates(&[("net1", 0), ("net0", 0)])),
                                ("07:00", rates(&[("net0", 5)])),
                            ],
                        )],
                    }],
                ),
                server(
                    "https://pve-a.lan:8006",
                    vec![Node {
                        name: "a1".into(),
                        guests: vec![guest(
                            GuestKind::Lxc,
                            101,
                            vec![("09:30", rates(&[("net0", 10)]))],
                        )],
                    }],
                ),
            ],
        }
    }

    fn summary(actions: &[ScheduledAction]) -> Vec<String> {
        actions
            .iter()
            .map(|a| format!("{} {} {} {}", a.guest, a.at, a.interface, a.rate))
            .collect()
    }

    #[test]
    fn one_action_per_guest_time_interface_in_stable_order() {
        let actions = compile(&sample());
        assert_eq!(
            summary(&actions),
            vec![
                "b1/qemu/200 07:00 net0 5 MB/s",
                "b1/qemu/200 22:00 net0 unlimited",
                "b1/qemu/200 22:00 net1 unlimited",
                "a1/lxc/101 09:30 net0 10 MB/s",
            ]
        );
        assert_eq!(compile(&sample()), actions);
    }

    #[test]
    fn duplicate_guests_are_still_compiled() {
        let mut config = sample();
        let dup = config.servers[1].nodes[0].guests[0].clone();
        config.servers[1].nodes[0].guests.push(dup);
        assert_eq!(compile(&config).len(), 5);
    }

    #[test]
    fn in_effect_at_uses_configured_zone() {
        // 2026-03-10 00:00 UTC is 09:00 KST.
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).single().expect("instant");
        let actions = in_effect_at(&sample(), now);
        assert_eq!(
            summary(&actions),
            vec![
                "b1/qemu/200 07:00 net0 5 MB/s",
                "b1/qemu/200 22:00 net1 unlimited",
                "a1/lxc/101 09:30 net0 10 MB/s",
            ]
        );
    }
}
