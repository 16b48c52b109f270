//! Expansion of manifest lines into placement units.
//!
//! Each line describes one box kind with a quantity. Expansion produces one
//! [`PlacementUnit`] per physical box, numbered in line order and instance
//! order. The rule table is applied first, the line and instance overrides
//! after it.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{BoxSpec, FlatRotation, PlacementUnit, UnitId, ValidationError};
use crate::rules::RoleRuleTable;

fn default_quantity() -> u32 {
    1
}

/// Override for a single instance of a line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InstanceOverride {
    /// 0-based instance within the line
    pub instance: u32,
    #[serde(default)]
    pub allow_edge: Option<bool>,
    #[serde(default)]
    pub force_rotation: Option<FlatRotation>,
}

/// One manifest line: a box kind and how many of it ship.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ManifestLine {
    #[serde(flatten)]
    pub spec: BoxSpec,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Overrides `can_stand_on_edge` for every instance
    #[serde(default)]
    pub allow_edge: Option<bool>,
    #[serde(default)]
    pub force_rotation: Option<FlatRotation>,
    #[serde(default)]
    pub instances: Vec<InstanceOverride>,
}

impl ManifestLine {
    pub fn new(spec: BoxSpec, quantity: u32) -> Self {
        Self {
            spec,
            quantity,
            allow_edge: None,
            force_rotation: None,
            instances: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.spec.validate()?;
        if let Some(bad) = self.instances.iter().find(|o| o.instance >= self.quantity) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "instance override {} is out of range for quantity {}",
                bad.instance, self.quantity
            )));
        }
        Ok(())
    }
}

/// Where an expanded unit came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitOrigin {
    /// Index of the manifest line
    pub line: usize,
    /// Instance number within the line
    pub instance: u32,
}

/// Units produced from a manifest, with their origins.
///
/// `origins[id]` describes the unit with `UnitId(id)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expansion {
    pub units: Vec<PlacementUnit>,
    pub origins: Vec<UnitOrigin>,
}

impl Expansion {
    pub fn origin(&self, id: UnitId) -> Option<UnitOrigin> {
        usize::try_from(id.0)
            .ok()
            .and_then(|idx| self.origins.get(idx))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Validates every line and expands the manifest.
///
/// The summed quantity may not exceed `max_units`; the check runs before
/// anything is allocated. Errors carry the index of the first offending
/// line.
pub fn expand(
    lines: &[ManifestLine],
    rules: &RoleRuleTable,
    max_units: usize,
) -> Result<Expansion, (usize, ValidationError)> {
    let mut total: usize = 0;
    for (idx, line) in lines.iter().enumerate() {
        line.validate().map_err(|err| (idx, err))?;
        total = total.saturating_add(line.quantity as usize);
        if total > max_units {
            return Err((idx, ValidationError::TooManyUnits { limit: max_units }));
        }
    }

    let mut expansion = Expansion {
        units: Vec::with_capacity(total),
        origins: Vec::with_capacity(total),
    };
    for (line_idx, line) in lines.iter().enumerate() {
        let mut spec = line.spec.clone();
        rules.apply(&mut spec);
        if let Some(allow) = line.allow_edge {
            spec.can_stand_on_edge = allow;
        }

        for instance in 0..line.quantity {
            let mut unit_spec = spec.clone();
            let mut rotation = line.force_rotation;
            if let Some(o) = line.instances.iter().find(|o| o.instance == instance) {
                if let Some(allow) = o.allow_edge {
                    unit_spec.can_stand_on_edge = allow;
                }
                rotation = o.force_rotation.or(rotation);
            }

            let id = UnitId(expansion.units.len() as u64);
            let mut unit = PlacementUnit::new(id, unit_spec);
            unit.force_rotation = rotation;
            expansion.units.push(unit);
            expansion.origins.push(UnitOrigin {
                line: line_idx,
                instance,
            });
        }
    }
    Ok(expansion)
}
