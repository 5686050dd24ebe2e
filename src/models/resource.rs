//! Resource model.
//!
//! Resources are what tasks consume while they run: crews (labor),
//! plant and machinery (equipment), and material supply lines. Each
//! resource carries a capacity, per-unit economic and carbon rates, and
//! an efficiency multiplier that scales task durations.
//!
//! # Rates
//! Cost and emissions accrue per unit per time unit of use. When no
//! explicit rate is given, the kind's default applies (a labor unit is
//! 100 cost / 5 kg CO₂ per day, equipment 1000 / 50, material 100 / 10).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::CapacityProfile;

/// A resource that tasks draw units from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Unique resource identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Resource classification.
    pub kind: ResourceKind,
    /// Units available simultaneously outside any profile window.
    pub capacity: i64,
    /// Time-varying capacity overrides.
    pub profile: CapacityProfile,
    /// Cost per unit per time unit.
    pub unit_cost: f64,
    /// Emissions (kg CO₂e) per unit per time unit.
    pub emission_factor: f64,
    /// Work rate multiplier (1.0 = normal, >1.0 = faster).
    ///
    /// Only labor and equipment affect task durations.
    pub efficiency: f64,
    /// Domain-specific metadata.
    pub attributes: HashMap<String, String>,
}

/// Resource classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Crews and trades.
    Labor,
    /// Bulk material supply (concrete, steel, timber).
    Material,
    /// Plant and machinery (cranes, excavators, pumps).
    Equipment,
}

impl ResourceKind {
    /// Default cost per unit per time unit.
    pub fn default_unit_cost(self) -> f64 {
        match self {
            Self::Labor => 100.0,
            Self::Material => 100.0,
            Self::Equipment => 1000.0,
        }
    }

    /// Default emissions per unit per time unit (kg CO₂e).
    pub fn default_emission_factor(self) -> f64 {
        match self {
            Self::Labor => 5.0,
            Self::Material => 10.0,
            Self::Equipment => 50.0,
        }
    }

    /// Whether this kind changes how long a task takes.
    pub fn drives_duration(self) -> bool {
        matches!(self, Self::Labor | Self::Equipment)
    }
}

impl Resource {
    /// Creates a resource with capacity 1 and the kind's default rates.
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            kind,
            capacity: 1,
            profile: CapacityProfile::new(),
            unit_cost: kind.default_unit_cost(),
            emission_factor: kind.default_emission_factor(),
            efficiency: 1.0,
            attributes: HashMap::new(),
        }
    }

    /// Creates a labor resource.
    pub fn labor(id: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::Labor)
    }

    /// Creates an equipment resource.
    pub fn equipment(id: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::Equipment)
    }

    /// Creates a material resource.
    pub fn material(id: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::Material)
    }

    /// Sets the resource name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the base capacity.
    pub fn with_capacity(mut self, capacity: i64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Overrides capacity inside `[start, end)`.
    pub fn with_capacity_window(mut self, start: i64, end: i64, capacity: i64) -> Self {
        self.profile.push(start, end, capacity);
        self
    }

    /// Sets the cost per unit per time unit.
    pub fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    /// Sets the emissions per unit per time unit.
    pub fn with_emission_factor(mut self, emission_factor: f64) -> Self {
        self.emission_factor = emission_factor;
        self
    }

    /// Sets the efficiency multiplier.
    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Capacity at time `t`.
    pub fn capacity_at(&self, t: i64) -> i64 {
        self.profile.capacity_at(self.capacity, t)
    }
}
