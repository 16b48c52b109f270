//! Splits a shipment across as many pallets as needed.
//!
//! The scheduler calls the pallet packer on whatever is left over until the
//! queue is empty. A pallet invocation that places nothing drops the lead
//! unit of the queue as unplaceable, so every iteration makes progress.
//! Both safety counters end the run with a partial, flagged result.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::metrics::build_load;
use crate::model::{PalletKind, PalletLoad, PalletType, PlacementUnit, UnitId};
use crate::orientation::{OrientationBounds, OrientationError, select_orientation};
use crate::packer::{order_queue, pack_pallet};
use crate::packing_config::PackingConfig;

/// Why a unit ended up on no pallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnplacedReason {
    /// Too large for the pallet footprint in every allowed orientation.
    ExceedsPalletFootprint,
    /// Too tall for the height limit in every orientation that fits.
    ExceedsHeightLimit,
    /// Fits on its own but no layer or empty pallet would take it.
    NoEligibleLayer,
    /// Left over when a safety counter stopped the run.
    SafetyLimitReached,
}

impl UnplacedReason {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            UnplacedReason::ExceedsPalletFootprint => "exceeds_pallet_footprint",
            UnplacedReason::ExceedsHeightLimit => "exceeds_height_limit",
            UnplacedReason::NoEligibleLayer => "no_eligible_layer",
            UnplacedReason::SafetyLimitReached => "safety_limit_reached",
        }
    }
}

impl fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnplacedReason::ExceedsPalletFootprint => {
                write!(f, "Box exceeds the pallet footprint including overhang")
            }
            UnplacedReason::ExceedsHeightLimit => {
                write!(f, "Box exceeds the maximum stack height")
            }
            UnplacedReason::NoEligibleLayer => {
                write!(f, "No layer or pallet could accept the box")
            }
            UnplacedReason::SafetyLimitReached => {
                write!(f, "Packing stopped at a safety limit before the box was tried")
            }
        }
    }
}

impl From<OrientationError> for UnplacedReason {
    fn from(err: OrientationError) -> Self {
        match err {
            OrientationError::ExceedsFootprint => UnplacedReason::ExceedsPalletFootprint,
            OrientationError::ExceedsHeight => UnplacedReason::ExceedsHeightLimit,
        }
    }
}

/// A unit reported outside every pallet.
#[derive(Clone, Debug, PartialEq)]
pub struct UnplacedUnit {
    pub unit: PlacementUnit,
    pub reason: UnplacedReason,
}

/// Dimensions and weight of one pallet in the shipment summary.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct PalletSummary {
    pub pallet_type: PalletKind,
    pub units: usize,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    pub weight: f64,
}

/// Totals over the whole shipment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct ShipmentSummary {
    pub pallet_count: usize,
    pub placed_units: usize,
    pub unplaced_units: usize,
    /// Sum of pallet weights, tare included
    pub total_weight: f64,
    pub pallets: Vec<PalletSummary>,
}

/// Output of a scheduler run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackingResult {
    pub pallets: Vec<PalletLoad>,
    pub unplaced: Vec<UnplacedUnit>,
    /// A safety counter stopped the run
    pub truncated: bool,
}

impl PackingResult {
    pub fn placed_count(&self) -> usize {
        self.pallets.iter().map(PalletLoad::unit_count).sum()
    }

    /// Every unit was placed and the run was not cut short.
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty() && !self.truncated
    }

    pub fn unplaced_ids(&self) -> Vec<UnitId> {
        self.unplaced.iter().map(|u| u.unit.id).collect()
    }

    pub fn summary(&self) -> ShipmentSummary {
        let pallets: Vec<PalletSummary> = self
            .pallets
            .iter()
            .map(|load| PalletSummary {
                pallet_type: load.pallet.kind,
                units: load.unit_count(),
                width: load.metrics.load_width,
                depth: load.metrics.load_depth,
                height: load.metrics.total_height,
                weight: load.metrics.total_weight,
            })
            .collect();

        ShipmentSummary {
            pallet_count: pallets.len(),
            placed_units: self.placed_count(),
            unplaced_units: self.unplaced.len(),
            total_weight: pallets.iter().map(|p| p.weight).sum(),
            pallets,
        }
    }
}

/// Progress notifications of a scheduler run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PackEvent {
    PalletStarted {
        /// 1-based pallet number
        pallet: usize,
        pallet_type: PalletKind,
    },
    LayerCommitted {
        pallet: usize,
        layer: usize,
        product_id: String,
        role_index: u32,
        units: usize,
        base_y: f64,
        height: f64,
    },
    UnitRejected {
        unit: UnitId,
        code: &'static str,
        reason: String,
    },
    Finished {
        pallets: usize,
        placed: usize,
        unplaced: usize,
        truncated: bool,
    },
}

/// Packs `units` onto as many pallets of type `pallet` as needed.
pub fn schedule(
    units: Vec<PlacementUnit>,
    pallet: &PalletType,
    config: &PackingConfig,
) -> PackingResult {
    schedule_with_progress(units, pallet, config, |_| {})
}

/// Like [`schedule`], reporting progress through `on_event`.
pub fn schedule_with_progress<F>(
    units: Vec<PlacementUnit>,
    pallet: &PalletType,
    config: &PackingConfig,
    mut on_event: F,
) -> PackingResult
where
    F: FnMut(PackEvent),
{
    let mut queue = order_queue(units);
    let mut result = PackingResult::default();
    let mut iterations = 0;

    while !queue.is_empty() {
        if iterations >= config.max_pallet_iterations {
            warn!(
                limit = config.max_pallet_iterations,
                remaining = queue.len(),
                "pallet iteration limit reached"
            );
            result.truncated = true;
            break;
        }
        iterations += 1;

        let plan = pack_pallet(queue, pallet, config);
        queue = plan.remainder;

        if plan.layers.is_empty() {
            if plan.truncated {
                warn!(remaining = queue.len(), "attempt budget exhausted on an empty pallet");
                result.truncated = true;
                break;
            }
            if queue.is_empty() {
                break;
            }
            let lead = queue.remove(0);
            let reason = classify_unplaceable(&lead, pallet, config);
            warn!(unit = %lead.id, group = %lead.group_key(), %reason, "unit cannot be placed");
            reject(&mut result, &mut on_event, lead, reason);
            continue;
        }

        let number = result.pallets.len() + 1;
        on_event(PackEvent::PalletStarted {
            pallet: number,
            pallet_type: pallet.kind,
        });
        for (idx, layer) in plan.layers.iter().enumerate() {
            on_event(PackEvent::LayerCommitted {
                pallet: number,
                layer: idx + 1,
                product_id: layer.group.product_id.clone(),
                role_index: layer.group.role_index,
                units: layer.len(),
                base_y: layer.base_y,
                height: layer.height,
            });
        }

        let load = build_load(*pallet, plan.layers, config);
        info!(
            pallet = number,
            units = load.unit_count(),
            height = load.metrics.total_height,
            weight = load.metrics.total_weight,
            "pallet loaded"
        );
        result.pallets.push(load);

        if plan.truncated {
            warn!(
                pallet = number,
                attempts = plan.attempts,
                remaining = queue.len(),
                "attempt budget exhausted"
            );
            result.truncated = true;
            break;
        }
    }

    if result.truncated {
        for unit in queue.drain(..) {
            reject(&mut result, &mut on_event, unit, UnplacedReason::SafetyLimitReached);
        }
    }

    info!(
        pallets = result.pallets.len(),
        placed = result.placed_count(),
        unplaced = result.unplaced.len(),
        truncated = result.truncated,
        "packing finished"
    );
    on_event(PackEvent::Finished {
        pallets: result.pallets.len(),
        placed: result.placed_count(),
        unplaced: result.unplaced.len(),
        truncated: result.truncated,
    });
    result
}

/// Reason for a unit that did not fit onto an empty pallet.
pub fn classify_unplaceable(
    unit: &PlacementUnit,
    pallet: &PalletType,
    config: &PackingConfig,
) -> UnplacedReason {
    let bounds =
        OrientationBounds::for_pallet(pallet, config.max_overhang, config.max_stack_height);
    match select_orientation(unit, &bounds, config.general_epsilon) {
        Ok(_) => UnplacedReason::NoEligibleLayer,
        Err(err) => err.into(),
    }
}

fn reject<F>(result: &mut PackingResult, on_event: &mut F, unit: PlacementUnit, reason: UnplacedReason)
where
    F: FnMut(PackEvent),
{
    on_event(PackEvent::UnitRejected {
        unit: unit.id,
        code: reason.code(),
        reason: reason.to_string(),
    });
    result.unplaced.push(UnplacedUnit { unit, reason });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoxSpec;

    fn unit(id: u64, product: &str, dims: (f64, f64, f64), weight: f64) -> PlacementUnit {
        PlacementUnit::new(UnitId(id), BoxSpec::new(product, 0, dims, weight))
    }

    fn chep() -> PalletType {
        PalletKind::AuChep.pallet_type()
    }

    #[test]
    fn empty_input_gives_empty_result() {
        let result = schedule(Vec::new(), &chep(), &PackingConfig::default());
        assert!(result.pallets.is_empty());
        assert!(result.is_complete());
        assert_eq!(result.summary().pallet_count, 0);
    }

    #[test]
    fn oversize_unit_is_reported_and_the_rest_packs() {
        let units = vec![
            unit(0, "huge", (2000.0, 2000.0, 300.0), 90.0),
            unit(1, "small", (400.0, 300.0, 200.0), 10.0),
        ];
        let result = schedule(units, &chep(), &PackingConfig::default());

        assert_eq!(result.pallets.len(), 1);
        assert_eq!(result.placed_count(), 1);
        assert_eq!(result.unplaced.len(), 1);
        assert_eq!(result.unplaced[0].unit.id, UnitId(0));
        assert_eq!(result.unplaced[0].reason, UnplacedReason::ExceedsPalletFootprint);
        assert!(!result.truncated);
    }

    #[test]
    fn tall_unit_is_classified_by_height() {
        let units = vec![unit(0, "pole", (300.0, 300.0, 2400.0), 15.0)];
        let result = schedule(units, &chep(), &PackingConfig::default());
        assert_eq!(result.unplaced[0].reason, UnplacedReason::ExceedsHeightLimit);
        assert_eq!(result.unplaced[0].reason.code(), "exceeds_height_limit");
    }

    #[test]
    fn iteration_limit_reports_leftovers_as_safety_limit() {
        let config = PackingConfig::builder().max_pallet_iterations(1).build();
        let mut blocker = unit(0, "lamp", (1000.0, 1000.0, 300.0), 30.0);
        blocker.spec.no_stack_above = true;
        let units = vec![blocker, unit(1, "a", (500.0, 500.0, 300.0), 10.0), unit(2, "a", (500.0, 500.0, 300.0), 10.0)];

        let result = schedule(units, &chep(), &config);
        assert!(result.truncated);
        assert_eq!(result.pallets.len(), 1);
        assert_eq!(result.unplaced.len(), 2);
        assert!(
            result
                .unplaced
                .iter()
                .all(|u| u.reason == UnplacedReason::SafetyLimitReached)
        );
        assert_eq!(result.placed_count() + result.unplaced.len(), 3);
    }

    #[test]
    fn events_describe_the_run() {
        let mut blocker = unit(0, "lamp", (1000.0, 1000.0, 300.0), 30.0);
        blocker.spec.no_stack_above = true;
        let units = vec![blocker, unit(1, "a", (500.0, 500.0, 300.0), 10.0)];

        let mut events = Vec::new();
        let result = schedule_with_progress(units, &chep(), &PackingConfig::default(), |event| {
            events.push(event)
        });

        assert_eq!(result.pallets.len(), 2);
        let started = events
            .iter()
            .filter(|e| matches!(e, PackEvent::PalletStarted { .. }))
            .count();
        assert_eq!(started, 2);
        assert_eq!(
            events.last(),
            Some(&PackEvent::Finished {
                pallets: 2,
                placed: 2,
                unplaced: 0,
                truncated: false,
            })
        );
    }

    #[test]
    fn summary_totals_all_pallets() {
        let mut blocker = unit(0, "lamp", (1000.0, 1000.0, 300.0), 30.0);
        blocker.spec.no_stack_above = true;
        let units = vec![blocker, unit(1, "a", (500.0, 500.0, 300.0), 10.0)];
        let summary = schedule(units, &chep(), &PackingConfig::default()).summary();

        assert_eq!(summary.pallet_count, 2);
        assert_eq!(summary.placed_units, 2);
        assert_eq!(summary.total_weight, 30.0 + 30.0 + 10.0 + 30.0);
        assert_eq!(summary.pallets[0].height, 450.0);
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let json = serde_json::to_value(PackEvent::UnitRejected {
            unit: UnitId(4),
            code: UnplacedReason::NoEligibleLayer.code(),
            reason: UnplacedReason::NoEligibleLayer.to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "unit_rejected");
        assert_eq!(json["unit"], 4);
        assert_eq!(json["code"], "no_eligible_layer");
    }
}
