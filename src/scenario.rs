//! Human-readable scenario labels and the static palettes used by the charts.

use serde::Serialize;

use crate::key::ClientId;

/// Fallback for labels outside the palette.
pub const DEFAULT_COLOR: &str = "#000";

/// Line color of the individual comparison chart.
pub const INDIVIDUAL_COLOR: &str = "#1f77b4";

const GUEST_MARKER: &str = "guest_";

/// One variant per subset of the three guests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scenario {
    HostOnly,
    Lta,
    Housing,
    Grab,
    LtaHousing,
    LtaGrab,
    HousingGrab,
    Full,
}

pub const ALL_SCENARIOS: [Scenario; 8] = [
    Scenario::Full,
    Scenario::LtaHousing,
    Scenario::LtaGrab,
    Scenario::HousingGrab,
    Scenario::Lta,
    Scenario::Housing,
    Scenario::Grab,
    Scenario::HostOnly,
];

impl Scenario {
    /// Classify an encoded experiment key by the guests it references.
    ///
    /// Three references short-circuit to [`Scenario::Full`]; otherwise each
    /// guest identifier is tested on its own. A key that only names unknown
    /// guests is treated as host-only.
    pub fn from_key(key: &str) -> Self {
        let count = key.matches(GUEST_MARKER).count();
        if count == 0 {
            return Scenario::HostOnly;
        }
        if count == 3 {
            return Scenario::Full;
        }
        let lta = key.contains(ClientId::Guest1.as_str());
        let housing = key.contains(ClientId::Guest2.as_str());
        let grab = key.contains(ClientId::Guest3.as_str());
        match (lta, housing, grab) {
            // Only unknown guests referenced. A purely string-assembled label
            // would be the dangling "Host + "; classify as host-only instead.
            (false, false, false) => Scenario::HostOnly,
            (true, false, false) => Scenario::Lta,
            (false, true, false) => Scenario::Housing,
            (false, false, true) => Scenario::Grab,
            (true, true, false) => Scenario::LtaHousing,
            (true, false, true) => Scenario::LtaGrab,
            (false, true, true) => Scenario::HousingGrab,
            (true, true, true) => Scenario::Full,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Scenario::HostOnly => "Host Only",
            Scenario::Lta => "Host + LTA",
            Scenario::Housing => "Host + Housing",
            Scenario::Grab => "Host + Grab",
            Scenario::LtaHousing => "Host + LTA + Housing",
            Scenario::LtaGrab => "Host + LTA + Grab",
            Scenario::HousingGrab => "Host + Housing + Grab",
            Scenario::Full => "Host + LTA + Housing + Grab",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Scenario::Full => "#1f77b4",
            Scenario::LtaHousing => "#d62728",
            Scenario::LtaGrab => "#2ca02c",
            Scenario::HousingGrab => "#ff7f0e",
            Scenario::Lta => "#9467bd",
            Scenario::Housing => "#8c564b",
            Scenario::Grab => "#e377c2",
            Scenario::HostOnly => "#7f7f7f",
        }
    }
}

/// Label for an encoded experiment key.
pub fn scenario_name(key: &str) -> &'static str {
    Scenario::from_key(key).label()
}

/// Palette lookup by label.
pub fn combo_color(label: &str) -> &'static str {
    ALL_SCENARIOS
        .iter()
        .find(|s| s.label() == label)
        .map(|s| s.color())
        .unwrap_or(DEFAULT_COLOR)
}

/// Line color for a client's contribution curve.
pub fn client_color(client: ClientId) -> &'static str {
    match client {
        ClientId::Host => "#000000",
        ClientId::Guest1 => "#d62728",
        ClientId::Guest2 => "#2ca02c",
        ClientId::Guest3 => "#ff7f0e",
    }
}

/// Display name in the federated contribution chart.
pub fn client_name(client: ClientId) -> &'static str {
    match client {
        ClientId::Host => "HDB Carpark",
        ClientId::Guest1 => "LTA",
        ClientId::Guest2 => "HDB Housing",
        ClientId::Guest3 => "Grab",
    }
}

/// Display name in the individual comparison view. These names come from the
/// independent-training export and do not follow the federated guest naming.
pub fn independent_display_name(client: &str) -> String {
    match client {
        "host" => "HDB Carpark Data".to_string(),
        "guest_1" => "HDB Housing Data".to_string(),
        "guest_2" => "LTA Traffic Data".to_string(),
        "guest_3" => "Grab Trip Data".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{ExperimentKey, GUESTS};
    use std::collections::{BTreeSet, HashSet};

    #[test]
    fn test_all_subsets_have_distinct_labels() {
        let mut labels = HashSet::new();
        for mask in 0u8..8 {
            let checked: BTreeSet<_> = GUESTS
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, g)| *g)
                .collect();
            let key = ExperimentKey::from_selection(&checked).encode();
            labels.insert(scenario_name(&key));
        }
        assert_eq!(labels.len(), 8);
    }

    #[test]
    fn test_full_set_label() {
        assert_eq!(
            scenario_name("host+('guest_1', 'guest_2', 'guest_3')"),
            "Host + LTA + Housing + Grab"
        );
        // Selection order does not change the label
        assert_eq!(
            scenario_name("host+('guest_3', 'guest_1')"),
            "Host + LTA + Grab"
        );
    }

    #[test]
    fn test_host_only_and_single() {
        assert_eq!(scenario_name("host+()"), "Host Only");
        assert_eq!(scenario_name("host+('guest_1',)"), "Host + LTA");
        assert_eq!(combo_color("Host + LTA"), "#9467bd");
    }

    #[test]
    fn test_unknown_label_falls_back() {
        assert_eq!(combo_color("Host + Nobody"), DEFAULT_COLOR);
        assert_eq!(scenario_name("host+('guest_7',)"), "Host Only");
    }

    #[test]
    fn test_palette_covers_every_scenario() {
        let colors: HashSet<_> = ALL_SCENARIOS.iter().map(|s| combo_color(s.label())).collect();
        assert_eq!(colors.len(), 8);
        assert!(!colors.contains(DEFAULT_COLOR));
    }

    #[test]
    fn test_independent_names() {
        assert_eq!(independent_display_name("guest_2"), "LTA Traffic Data");
        assert_eq!(independent_display_name("mystery"), "mystery");
    }
}
