// ── Interface descriptor codec ──
//
// Proxmox stores each network interface as one flat string such as
// `name=eth0,bridge=vmbr0,hwaddr=BC:24:11:5E:7A:01,rate=5`. Only the `rate`
// key is ever changed here; everything else must survive untouched.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::model::Rate;

const RATE_KEY: &str = "rate";

/// Ordered key-value view of one interface descriptor string.
///
/// Keys keep insertion order so that `parse` followed by `to_string`
/// reproduces the original layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    entries: IndexMap<String, String>,
}

impl Descriptor {
    /// Decode a descriptor string.
    ///
    /// Segments are split on `,` and then on the first `=`. A segment with
    /// an empty key or no `=` at all is dropped; `key=` keeps an empty value.
    /// A repeated key keeps its first position and takes the last value.
    pub fn parse(raw: &str) -> Self {
        let entries = raw
            .split(',')
            .filter_map(|segment| segment.split_once('='))
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect();
        Self { entries }
    }

    /// Return a copy with the bandwidth ceiling applied.
    ///
    /// An unlimited rate removes the `rate` key entirely; Proxmox treats a
    /// missing key as "no limit", whereas `rate=0` is not accepted.
    pub fn with_rate(&self, rate: Rate) -> Self {
        let mut entries = self.entries.clone();
        match rate.limit() {
            Some(mbps) => {
                entries.insert(RATE_KEY.to_owned(), mbps.to_string());
            }
            None => {
                entries.shift_remove(RATE_KEY);
            }
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The raw `rate` value, if one is set.
    pub fn rate(&self) -> Option<&str> {
        self.get(RATE_KEY)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromStr for Descriptor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Descriptor {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
