// ── Domain model ──
//
// Typed, validated form of the shaping configuration. Built once by
// `pveshaper-config` and never mutated afterwards; triggers only hold
// clones of the small pieces they need.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono_tz::Tz;
use serde::Serialize;
use url::Url;

use pveshaper_api::{ApiToken, GuestKind, TransportConfig};

use crate::trigger::TimeOfDay;

/// Bandwidth ceiling in MB/s. Zero means "no limit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct Rate(u32);

impl Rate {
    /// No ceiling: the `rate` key is removed from the interface.
    pub const UNLIMITED: Rate = Rate(0);

    pub const fn mbps(value: u32) -> Self {
        Self(value)
    }

    pub const fn is_unlimited(self) -> bool {
        self.0 == 0
    }

    /// The ceiling in MB/s, or `None` when unlimited.
    pub const fn limit(self) -> Option<u32> {
        if self.0 == 0 { None } else { Some(self.0) }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit() {
            Some(mbps) => write!(f, "{mbps} MB/s"),
            None => f.write_str("unlimited"),
        }
    }
}

/// Interface name → rate for one schedule entry. Sorted by interface name.
pub type RateSet = BTreeMap<String, Rate>;

/// Time-of-day → rate set, sorted by time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    entries: BTreeMap<TimeOfDay, RateSet>,
}

impl Schedule {
    pub fn new(entries: BTreeMap<TimeOfDay, RateSet>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> impl Iterator<Item = (TimeOfDay, &RateSet)> {
        self.entries.iter().map(|(t, set)| (*t, set))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every interface named anywhere in the schedule.
    pub fn interfaces(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .flat_map(|set| set.keys().map(String::as_str))
            .collect()
    }

    /// The rate that should be in force on `interface` at local time `at`.
    ///
    /// Picks the latest entry at or before `at` that mentions the
    /// interface. When none exists yet today, the schedule wraps around and
    /// the last entry of the previous day applies.
    pub fn rate_in_effect(&self, interface: &str, at: TimeOfDay) -> Option<(TimeOfDay, Rate)> {
        let mut before = None;
        let mut last = None;
        for (time, set) in &self.entries {
            let Some(rate) = set.get(interface) else {
                continue;
            };
            if *time <= at {
                before = Some((*time, *rate));
            }
            last = Some((*time, *rate));
        }
        before.or(last)
    }
}

/// Address of one guest on one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GuestTarget {
    pub node: String,
    pub kind: GuestKind,
    pub vmid: u32,
}

impl fmt::Display for GuestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.node, self.kind, self.vmid)
    }
}

/// A container or VM with its daily schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guest {
    pub kind: GuestKind,
    pub vmid: u32,
    pub schedule: Schedule,
}

/// A compute host grouping guests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub guests: Vec<Guest>,
}

impl Node {
    pub fn target(&self, guest: &Guest) -> GuestTarget {
        GuestTarget {
            node: self.name.clone(),
            kind: guest.kind,
            vmid: guest.vmid,
        }
    }
}

/// One Proxmox VE endpoint with its credentials and nodes.
#[derive(Debug, Clone)]
pub struct Server {
    pub url: Url,
    pub token: ApiToken,
    pub transport: TransportConfig,
    pub nodes: Vec<Node>,
}

/// The complete, validated shaping configuration.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Zone every `HH:MM` is interpreted in.
    pub timezone: Tz,
    /// Servers, sorted by base URL when loaded from a file.
    pub servers: Vec<Server>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn at(s: &str) -> TimeOfDay {
        s.parse().expect("valid time")
    }

    fn schedule(entries: &[(&str, &[(&str, u32)])]) -> Schedule {
        Schedule::new(
            entries
                .iter()
                .map(|(t, rates)| {
                    let set = rates
                        .iter()
                        .map(|(iface, r)| ((*iface).to_owned(), Rate::mbps(*r)))
                        .collect();
                    (at(t), set)
                })
                .collect(),
        )
    }

    #[test]
    fn rate_display() {
        assert_eq!(Rate::mbps(5).to_string(), "5 MB/s");
        assert_eq!(Rate::UNLIMITED.to_string(), "unlimited");
        assert!(Rate::mbps(0).is_unlimited());
        assert_eq!(Rate::mbps(12).limit(), Some(12));
    }

    #[test]
    fn rate_in_effect_picks_latest_past_entry() {
        let s = schedule(&[
            ("07:00", &[("net0", 5)]),
            ("12:00", &[("net1", 2)]),
            ("18:30", &[("net0", 0), ("net1", 0)]),
        ]);
        assert_eq!(s.rate_in_effect("net0", at("07:00")), Some((at("07:00"), Rate::mbps(5))));
        assert_eq!(s.rate_in_effect("net0", at("15:10")), Some((at("07:00"), Rate::mbps(5))));
        assert_eq!(s.rate_in_effect("net1", at("15:10")), Some((at("12:00"), Rate::mbps(2))));
        assert_eq!(s.rate_in_effect("net0", at("23:59")), Some((at("18:30"), Rate::UNLIMITED)));
    }

    #[test]
    fn rate_in_effect_wraps_to_previous_day() {
        let s = schedule(&[("07:00", &[("net0", 5)]), ("22:00", &[("net0", 0)])]);
        assert_eq!(s.rate_in_effect("net0", at("03:15")), Some((at("22:00"), Rate::UNLIMITED)));
        assert_eq!(s.rate_in_effect("net9", at("03:15")), None);
    }

    #[test]
    fn interfaces_are_collected_across_entries() {
        let s = schedule(&[("07:00", &[("net1", 5)]), ("22:00", &[("net0", 0), ("net1", 0)])]);
        assert_eq!(s.interfaces().into_iter().collect::<Vec<_>>(), vec!["net0", "net1"]);
    }

    #[test]
    fn guest_target_display() {
        let target = GuestTarget {
            node: "pve1".into(),
            kind: GuestKind::Qemu,
            vmid: 200,
        };
        assert_eq!(target.to_string(), "pve1/qemu/200");
    }
}
