//! Stacking rules between a candidate group and the layer beneath it.

use std::fmt;

use crate::model::{Layer, PlacementUnit, UnitId};
use crate::packing_config::PackingConfig;

/// Outcome of the stacking gate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StackVerdict {
    /// Nothing below: the group goes onto the deck.
    Ground,
    /// The layer below accepts the group.
    Eligible,
    /// A unit below must not carry anything.
    NoStackAbove { below: UnitId },
    /// A fragile unit below would carry more than its limit.
    FragileLimitExceeded {
        below: UnitId,
        limit: f64,
        weight: f64,
    },
}

impl StackVerdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, StackVerdict::Ground | StackVerdict::Eligible)
    }
}

impl fmt::Display for StackVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackVerdict::Ground => write!(f, "ground level"),
            StackVerdict::Eligible => write!(f, "eligible"),
            StackVerdict::NoStackAbove { below } => {
                write!(f, "unit {} below must not be stacked on", below)
            }
            StackVerdict::FragileLimitExceeded {
                below,
                limit,
                weight,
            } => write!(
                f,
                "{} kg exceeds the {} kg limit of fragile unit {} below",
                weight, limit, below
            ),
        }
    }
}

/// Decides whether `candidate`'s group may be placed on `below`.
///
/// `candidate` is the group's representative unit and `below` the most
/// recently committed layer (`None` at ground level). The first offending
/// unit in layer order is reported.
pub fn check_stack(
    candidate: &PlacementUnit,
    below: Option<&Layer>,
    config: &PackingConfig,
) -> StackVerdict {
    let Some(layer) = below else {
        return StackVerdict::Ground;
    };

    if let Some(blocker) = layer.units.iter().find(|p| p.unit.spec.no_stack_above) {
        return StackVerdict::NoStackAbove { below: blocker.id() };
    }

    let weight = candidate.spec.weight;
    for placed in &layer.units {
        let spec = &placed.unit.spec;
        if !config.is_fragile(spec.fragile_rating) {
            continue;
        }
        if let Some(limit) = spec.fragile_weight_limit {
            if weight > limit + config.general_epsilon {
                return StackVerdict::FragileLimitExceeded {
                    below: placed.id(),
                    limit,
                    weight,
                };
            }
        }
    }

    StackVerdict::Eligible
}

/// Boolean form of [`check_stack`].
pub fn can_stack(candidate: &PlacementUnit, below: Option<&Layer>, config: &PackingConfig) -> bool {
    check_stack(candidate, below, config).is_eligible()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoxSpec, GroupKey, OrientationKind, PlacedUnit};
    use crate::types::Vec3;

    fn unit(id: u64, weight: f64) -> PlacementUnit {
        PlacementUnit::new(UnitId(id), BoxSpec::new("p", id as u32, (400.0, 400.0, 200.0), weight))
    }

    fn layer_of(units: Vec<PlacementUnit>) -> Layer {
        Layer {
            group: GroupKey::new("p", 0),
            base_y: 150.0,
            height: 200.0,
            units: units
                .into_iter()
                .map(|unit| PlacedUnit {
                    extents: OrientationKind::Flat.extents(&unit.spec),
                    unit,
                    orientation: OrientationKind::Flat,
                    position: Vec3::new(0.0, 150.0, 0.0),
                })
                .collect(),
        }
    }

    #[test]
    fn ground_is_always_eligible() {
        let config = PackingConfig::default();
        assert_eq!(check_stack(&unit(1, 500.0), None, &config), StackVerdict::Ground);
    }

    #[test]
    fn no_stack_above_blocks_everything() {
        let config = PackingConfig::default();
        let mut fixture = unit(1, 10.0);
        fixture.spec.no_stack_above = true;
        let below = layer_of(vec![unit(0, 10.0), fixture]);

        assert_eq!(
            check_stack(&unit(2, 0.5), Some(&below), &config),
            StackVerdict::NoStackAbove { below: UnitId(1) }
        );
    }

    #[test]
    fn fragile_limit_applies_above_threshold_only() {
        let config = PackingConfig::default();
        let mut fragile = unit(1, 10.0);
        fragile.spec.fragile_rating = 9;
        fragile.spec.fragile_weight_limit = Some(30.0);
        let below = layer_of(vec![fragile.clone()]);

        assert!(!can_stack(&unit(2, 50.0), Some(&below), &config));
        assert!(can_stack(&unit(3, 30.0), Some(&below), &config));

        fragile.spec.fragile_rating = 7;
        let below = layer_of(vec![fragile]);
        assert!(can_stack(&unit(2, 50.0), Some(&below), &config));
    }

    #[test]
    fn fragile_without_limit_accepts_any_weight() {
        let config = PackingConfig::default();
        let mut fragile = unit(1, 10.0);
        fragile.spec.fragile_rating = 10;
        let below = layer_of(vec![fragile]);
        assert_eq!(
            check_stack(&unit(2, 900.0), Some(&below), &config),
            StackVerdict::Eligible
        );
    }
}
