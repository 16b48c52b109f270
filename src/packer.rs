//! Layer-by-layer loading of a single pallet.
//!
//! The queue is ordered once (base groups, then by stacking strength, then
//! groups that must sit on top) and cut into contiguous product-role runs.
//! Each committed run becomes one layer; runs that may not rest on the
//! current top layer, or would exceed the height limit, are deferred and
//! stay in the queue for later layers or the next pallet.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Range;

use tracing::debug;

use crate::model::{GroupKey, GroupPriority, Layer, PalletType, PlacementUnit};
use crate::packing_config::PackingConfig;
use crate::rows::layout_group;
use crate::stacking::check_stack;

/// Layers built on one pallet plus everything that did not make it.
#[derive(Clone, Debug, Default)]
pub struct PalletPlan {
    pub layers: Vec<Layer>,
    /// Unconsumed units, still in queue order
    pub remainder: Vec<PlacementUnit>,
    /// Height cursor after the last committed layer
    pub height: f64,
    /// Scan passes spent; each pass commits at most one layer
    pub attempts: usize,
    /// The attempt budget ran out before the scan settled
    pub truncated: bool,
}

impl PalletPlan {
    pub fn placed_count(&self) -> usize {
        self.layers.iter().map(Layer::len).sum()
    }
}

/// Orders the queue for loading.
///
/// Units are gathered into product-role groups in order of first
/// appearance. `base` groups come first and `must_stack_above_base` groups
/// last, both keeping their relative order; the remaining groups are sorted
/// by descending weight × rigidity of their first unit (stable on ties).
pub fn order_queue(units: Vec<PlacementUnit>) -> Vec<PlacementUnit> {
    let mut groups: Vec<Vec<PlacementUnit>> = Vec::new();
    let mut slots: HashMap<GroupKey, usize> = HashMap::new();

    for unit in units {
        let key = unit.group_key();
        match slots.get(&key) {
            Some(&slot) => groups[slot].push(unit),
            None => {
                slots.insert(key, groups.len());
                groups.push(vec![unit]);
            }
        }
    }

    groups.sort_by(|a, b| {
        let (lead_a, lead_b) = (&a[0].spec, &b[0].spec);
        lead_a
            .group_priority
            .rank()
            .cmp(&lead_b.group_priority.rank())
            .then_with(|| {
                if lead_a.group_priority == GroupPriority::Normal {
                    lead_b
                        .stacking_strength()
                        .partial_cmp(&lead_a.stacking_strength())
                        .unwrap_or(Ordering::Equal)
                } else {
                    Ordering::Equal
                }
            })
    });

    groups.into_iter().flatten().collect()
}

/// Index ranges of contiguous same-group runs.
pub fn contiguous_runs(queue: &[PlacementUnit]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = 0;
    for idx in 1..=queue.len() {
        if idx == queue.len() || !queue[idx].same_group(&queue[start]) {
            if start < idx {
                runs.push(start..idx);
            }
            start = idx;
        }
    }
    runs
}

/// Builds as many layers as possible on one pallet.
///
/// Every pass over the queue costs one attempt, however many runs it has
/// to defer before it commits.
///
/// # Parameters
/// * `queue` - units to load; ordered with [`order_queue`] before packing
/// * `pallet` - the pallet type
/// * `config` - engine parameters
///
/// # Returns
/// The committed layers and the ordered remainder
pub fn pack_pallet(
    queue: Vec<PlacementUnit>,
    pallet: &PalletType,
    config: &PackingConfig,
) -> PalletPlan {
    let mut queue = order_queue(queue);
    let mut layers: Vec<Layer> = Vec::new();
    let mut cursor = pallet.deck_height;
    let mut attempts = 0;
    let mut truncated = false;

    while !queue.is_empty() {
        if attempts >= config.max_attempts_per_pallet {
            truncated = true;
            break;
        }
        attempts += 1;
        let mut committed = false;

        for run in contiguous_runs(&queue) {
            let group = queue[run.start].group_key();
            let verdict = check_stack(&queue[run.start], layers.last(), config);
            if !verdict.is_eligible() {
                debug!(%group, %verdict, "run deferred");
                continue;
            }

            let layout = layout_group(&queue[run.clone()], pallet, config);
            if layout.placed.is_empty() {
                debug!(%group, "run does not fit the pallet");
                continue;
            }
            if cursor + layout.layer_height > config.max_stack_height + config.height_epsilon {
                debug!(
                    %group,
                    height = cursor + layout.layer_height,
                    "run would exceed the height limit"
                );
                continue;
            }

            let mut units = layout.placed;
            for placed in &mut units {
                placed.position.y = cursor;
            }
            debug!(
                %group,
                units = units.len(),
                base_y = cursor,
                height = layout.layer_height,
                overhang = layout.overhang,
                "layer committed"
            );
            layers.push(Layer {
                group,
                base_y: cursor,
                height: layout.layer_height,
                units,
            });
            cursor += layout.layer_height;
            queue.splice(run, layout.not_placed);
            committed = true;
            break;
        }

        if !committed {
            break;
        }
    }

    PalletPlan {
        layers,
        remainder: queue,
        height: cursor,
        attempts,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoxSpec, PalletKind, UnitId};

    fn unit(id: u64, product: &str, dims: (f64, f64, f64), weight: f64) -> PlacementUnit {
        PlacementUnit::new(UnitId(id), BoxSpec::new(product, 0, dims, weight))
    }

    fn ids(units: &[PlacementUnit]) -> Vec<u64> {
        units.iter().map(|u| u.id.0).collect()
    }

    #[test]
    fn queue_orders_base_then_strength_then_top() {
        let mut base = unit(0, "base", (100.0, 100.0, 100.0), 1.0);
        base.spec.group_priority = GroupPriority::Base;
        let mut top = unit(1, "top", (100.0, 100.0, 100.0), 99.0);
        top.spec.group_priority = GroupPriority::MustStackAboveBase;
        let light = unit(2, "light", (100.0, 100.0, 100.0), 5.0);
        let heavy = unit(3, "heavy", (100.0, 100.0, 100.0), 50.0);
        let mut stiff = unit(4, "stiff", (100.0, 100.0, 100.0), 10.0);
        stiff.spec.rigidity_rating = 10;
        let mut soft = unit(5, "soft", (100.0, 100.0, 100.0), 10.0);
        soft.spec.rigidity_rating = 2;

        let ordered = order_queue(vec![top, light, soft, base, heavy, stiff]);
        assert_eq!(ids(&ordered), vec![0, 3, 4, 2, 5, 1]);
    }

    #[test]
    fn queue_gathers_groups_and_keeps_ties_stable() {
        let queue = vec![
            unit(0, "a", (100.0, 100.0, 100.0), 10.0),
            unit(1, "b", (100.0, 100.0, 100.0), 10.0),
            unit(2, "a", (100.0, 100.0, 100.0), 10.0),
        ];
        let ordered = order_queue(queue);
        assert_eq!(ids(&ordered), vec![0, 2, 1]);
        assert_eq!(contiguous_runs(&ordered), vec![0..2, 2..3]);
    }

    #[test]
    fn contiguous_runs_handles_empty_queue() {
        assert!(contiguous_runs(&[]).is_empty());
    }

    #[test]
    fn single_box_lands_on_the_deck() {
        let pallet = PalletKind::AuChep.pallet_type();
        let plan = pack_pallet(
            vec![unit(0, "p", (400.0, 300.0, 200.0), 10.0)],
            &pallet,
            &PackingConfig::default(),
        );

        assert_eq!(plan.layers.len(), 1);
        assert!(plan.remainder.is_empty());
        assert_eq!(plan.height, 350.0);
        let placed = &plan.layers[0].units[0];
        assert_eq!(placed.position.y, 150.0);
        assert_eq!(placed.position.x, -200.0);
        assert_eq!(placed.position.z, -150.0);
    }

    #[test]
    fn leftover_units_of_a_group_stack_on_their_own_layer() {
        let pallet = PalletKind::AuChep.pallet_type();
        let queue = (0..12)
            .map(|i| unit(i, "crate", (500.0, 500.0, 300.0), 20.0))
            .collect();
        let plan = pack_pallet(queue, &pallet, &PackingConfig::default());

        assert_eq!(plan.layers.len(), 2);
        assert_eq!(plan.layers[0].len(), 9);
        assert_eq!(plan.layers[1].len(), 3);
        assert_eq!(plan.layers[1].base_y, 450.0);
        assert_eq!(plan.height, 750.0);
        assert_eq!(plan.placed_count(), 12);
    }

    #[test]
    fn runs_above_the_height_limit_are_skipped_not_truncated() {
        let pallet = PalletKind::AuChep.pallet_type();
        let mut tall = unit(0, "tall", (1000.0, 1000.0, 1500.0), 80.0);
        tall.spec.group_priority = GroupPriority::Base;
        let second = unit(1, "second", (1000.0, 1000.0, 1000.0), 40.0);
        let third = unit(2, "third", (1000.0, 1000.0, 500.0), 20.0);

        let plan = pack_pallet(vec![tall, second, third], &pallet, &PackingConfig::default());
        assert_eq!(plan.layers.len(), 2);
        assert_eq!(plan.layers[1].group, GroupKey::new("third", 0));
        assert_eq!(plan.height, 2150.0);
        assert_eq!(ids(&plan.remainder), vec![1]);
    }

    #[test]
    fn ineligible_runs_are_deferred_to_the_remainder() {
        let pallet = PalletKind::AuChep.pallet_type();
        let mut blocker = unit(0, "lamp", (600.0, 600.0, 400.0), 30.0);
        blocker.spec.no_stack_above = true;
        let other = unit(1, "table", (600.0, 600.0, 400.0), 10.0);

        let plan = pack_pallet(vec![blocker, other], &pallet, &PackingConfig::default());
        assert_eq!(plan.layers.len(), 1);
        assert_eq!(ids(&plan.remainder), vec![1]);
        assert!(!plan.truncated);
    }

    #[test]
    fn deferred_runs_are_not_charged_again_after_each_commit() {
        let pallet = PalletKind::AuChep.pallet_type();
        let cabinets = (0..60).map(|i| unit(i, &format!("cabinet-{i}"), (1000.0, 1000.0, 600.0), 80.0));
        let panels = (60..85).map(|i| unit(i, &format!("panel-{i}"), (1000.0, 1000.0, 12.0), 4.0));
        let queue = cabinets.chain(panels).collect();

        let plan = pack_pallet(queue, &pallet, &PackingConfig::default());
        assert!(!plan.truncated);
        assert_eq!(plan.layers.len(), 28);
        assert_eq!(plan.attempts, 29);
        assert_eq!(plan.remainder.len(), 57);
        assert!((plan.height - 2250.0).abs() < 1e-6);
    }

    #[test]
    fn attempt_budget_truncates_the_pallet() {
        let pallet = PalletKind::AuChep.pallet_type();
        let config = PackingConfig::builder().max_attempts_per_pallet(1).build();
        let queue = vec![
            unit(0, "a", (400.0, 400.0, 100.0), 20.0),
            unit(1, "b", (400.0, 400.0, 100.0), 10.0),
        ];

        let plan = pack_pallet(queue, &pallet, &config);
        assert!(plan.truncated);
        assert_eq!(plan.attempts, 1);
        assert_eq!(plan.layers.len(), 1);
        assert_eq!(ids(&plan.remainder), vec![1]);
    }
}
