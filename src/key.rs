//! Client identifiers and the experiment key shared by ingestion and queries.
//!
//! Source rows carry the participating guests as a tuple literal, e.g.
//! `host+('guest_1', 'guest_3')`. Both the index lookup and the UI selection
//! go through [`encode_guest_ids`], so the two sides cannot drift apart.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::DashboardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientId {
    Host,
    #[serde(rename = "guest_1")]
    Guest1,
    #[serde(rename = "guest_2")]
    Guest2,
    #[serde(rename = "guest_3")]
    Guest3,
}

/// Guests in checkbox iteration order.
pub const GUESTS: [ClientId; 3] = [ClientId::Guest1, ClientId::Guest2, ClientId::Guest3];

/// Every client that can carry an `ablation_<id>` column, host first.
pub const CLIENTS: [ClientId; 4] = [
    ClientId::Host,
    ClientId::Guest1,
    ClientId::Guest2,
    ClientId::Guest3,
];

impl ClientId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientId::Host => "host",
            ClientId::Guest1 => "guest_1",
            ClientId::Guest2 => "guest_2",
            ClientId::Guest3 => "guest_3",
        }
    }

    pub fn is_guest(&self) -> bool {
        !matches!(self, ClientId::Host)
    }

    /// Column carrying this client's contribution metric.
    pub fn ablation_field(&self) -> String {
        format!("ablation_{}", self.as_str())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientId {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "host" => Ok(ClientId::Host),
            "guest_1" => Ok(ClientId::Guest1),
            "guest_2" => Ok(ClientId::Guest2),
            "guest_3" => Ok(ClientId::Guest3),
            other => Err(DashboardError::InvalidSelection(format!(
                "unknown client identifier '{}'",
                other
            ))),
        }
    }
}

/// Serialize an ordered guest list into the key format used by the source rows.
///
/// No guests gives `host+()`, one guest keeps the trailing comma
/// (`host+('guest_2',)`), several are joined by `", "` in the given order.
pub fn encode_guest_ids<S: AsRef<str>>(guests: &[S]) -> String {
    match guests {
        [] => "host+()".to_string(),
        [only] => format!("host+('{}',)", only.as_ref()),
        many => {
            let inner = many
                .iter()
                .map(|g| format!("'{}'", g.as_ref()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("host+({})", inner)
        }
    }
}

/// String-level key construction over raw guest identifiers.
pub fn experiment_key<S: AsRef<str>>(selected_guests: &[S]) -> String {
    encode_guest_ids(selected_guests)
}

/// The set of non-host clients participating in one federated run, in key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ExperimentKey {
    guests: Vec<ClientId>,
}

impl ExperimentKey {
    /// Keep the caller's order. Hosts and repeats are dropped.
    pub fn new(ordered: &[ClientId]) -> Self {
        let mut guests = Vec::with_capacity(ordered.len());
        for g in ordered {
            if g.is_guest() && !guests.contains(g) {
                guests.push(*g);
            }
        }
        Self { guests }
    }

    /// Filter the canonical guest order by a checked set, the way the UI walks its checkboxes.
    pub fn from_selection(checked: &BTreeSet<ClientId>) -> Self {
        Self {
            guests: GUESTS.iter().copied().filter(|g| checked.contains(g)).collect(),
        }
    }

    pub fn guests(&self) -> &[ClientId] {
        &self.guests
    }

    pub fn contains(&self, client: ClientId) -> bool {
        client == ClientId::Host || self.guests.contains(&client)
    }

    pub fn encode(&self) -> String {
        let ids: Vec<&str> = self.guests.iter().map(|g| g.as_str()).collect();
        encode_guest_ids(&ids)
    }

    /// Read a key as written in the `experiment` column.
    pub fn parse(raw: &str) -> Option<Self> {
        let inner = raw.trim().strip_prefix("host+(")?.strip_suffix(')')?;
        let mut guests = Vec::new();
        for part in inner.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let id = part.trim_matches(|c| c == '\'' || c == '"');
            guests.push(ClientId::from_str(id).ok().filter(|c| c.is_guest())?);
        }
        Some(Self { guests })
    }
}

impl fmt::Display for ExperimentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
