//! Shelf layout of one product-role group.
//!
//! Units fill a row along the pallet width until the next one no longer
//! fits, then a new row is opened behind it. The finished block of rows is
//! centered on the pallet along the depth axis and every row is centered on
//! its own along the width axis. The heuristic is greedy on purpose: units
//! are taken strictly in queue order and never reshuffled.

use tracing::debug;

use crate::model::{PalletType, PlacedUnit, PlacementUnit};
use crate::orientation::{Orientation, OrientationBounds, select_orientation};
use crate::packing_config::PackingConfig;
use crate::types::Vec3;

/// Result of laying out one group.
///
/// Placed units carry `x`/`z` positions with `y = 0`; the pallet packer
/// lifts them to the layer height when the layer is committed.
#[derive(Clone, Debug, Default)]
pub struct RowLayout {
    pub placed: Vec<PlacedUnit>,
    pub not_placed: Vec<PlacementUnit>,
    /// Common oriented height of the placed units (0 when nothing fits)
    pub layer_height: f64,
    /// Overhang the layout was computed with
    pub overhang: f64,
    pub row_count: usize,
}

impl RowLayout {
    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }
}

struct Row {
    members: Vec<(PlacementUnit, Orientation)>,
    width: f64,
    depth: f64,
}

impl Row {
    fn open(unit: &PlacementUnit, orientation: Orientation) -> Self {
        Self {
            width: orientation.extents.x,
            depth: orientation.extents.z,
            members: vec![(unit.clone(), orientation)],
        }
    }

    fn push(&mut self, unit: &PlacementUnit, orientation: Orientation) {
        self.width += orientation.extents.x;
        self.depth = self.depth.max(orientation.extents.z);
        self.members.push((unit.clone(), orientation));
    }
}

/// Lays out a group, first within the bare pallet and, if anything is left
/// over, once more with the overhang tolerance.
///
/// The overhang attempt replaces the strict one only when it places more units.
pub fn layout_group(
    units: &[PlacementUnit],
    pallet: &PalletType,
    config: &PackingConfig,
) -> RowLayout {
    let strict_bounds = OrientationBounds::for_pallet(pallet, 0.0, config.max_stack_height);
    let strict = shelf_pack(units, &strict_bounds, config);
    if strict.not_placed.is_empty() || config.max_overhang <= 0.0 {
        return strict;
    }

    let relaxed = shelf_pack(units, &strict_bounds.with_overhang(config.max_overhang), config);
    debug!(
        strict = strict.placed_count(),
        with_overhang = relaxed.placed_count(),
        "retried group layout with overhang"
    );
    if relaxed.placed_count() > strict.placed_count() {
        relaxed
    } else {
        strict
    }
}

/// Single shelf pass within `bounds`.
pub fn shelf_pack(
    units: &[PlacementUnit],
    bounds: &OrientationBounds,
    config: &PackingConfig,
) -> RowLayout {
    let eps = config.general_epsilon;
    let budget_width = bounds.usable_width();
    let budget_depth = bounds.usable_depth();

    // The last row is the open one; all rows before it are closed.
    let mut rows: Vec<Row> = Vec::new();
    let mut closed_depth = 0.0;
    let mut layer_height: Option<f64> = None;
    let mut not_placed = Vec::new();

    let mut remaining = units.iter();
    while let Some(unit) = remaining.next() {
        let orientation = match select_orientation(unit, bounds, eps) {
            Ok(orientation) => orientation,
            Err(err) => {
                debug!(unit = %unit.id, %err, "no orientation within bounds");
                not_placed.push(unit.clone());
                continue;
            }
        };

        if let Some(height) = layer_height {
            if (orientation.extents.y - height).abs() > config.height_epsilon {
                not_placed.push(unit.clone());
                continue;
            }
        }

        let opens_row = match rows.last() {
            None => true,
            Some(row) => {
                let width_fits = row.width + orientation.extents.x <= budget_width + eps;
                let depth_fits =
                    closed_depth + row.depth.max(orientation.extents.z) <= budget_depth + eps;
                if width_fits && depth_fits {
                    false
                } else if closed_depth + row.depth + orientation.extents.z > budget_depth + eps {
                    not_placed.push(unit.clone());
                    not_placed.extend(remaining.by_ref().cloned());
                    break;
                } else {
                    true
                }
            }
        };

        if opens_row {
            if let Some(row) = rows.last() {
                closed_depth += row.depth;
            }
            rows.push(Row::open(unit, orientation));
        } else if let Some(row) = rows.last_mut() {
            row.push(unit, orientation);
        }
        layer_height.get_or_insert(orientation.extents.y);
    }

    RowLayout {
        row_count: rows.len(),
        placed: position_rows(rows),
        not_placed,
        layer_height: layer_height.unwrap_or(0.0),
        overhang: bounds.overhang,
    }
}

/// Centers the row block on the pallet and each row along the width.
fn position_rows(rows: Vec<Row>) -> Vec<PlacedUnit> {
    let total_depth: f64 = rows.iter().map(|row| row.depth).sum();
    let mut z = -total_depth / 2.0;
    let mut placed = Vec::new();

    for row in rows {
        let mut x = -row.width / 2.0;
        for (unit, orientation) in row.members {
            placed.push(PlacedUnit {
                unit,
                orientation: orientation.kind,
                extents: orientation.extents,
                position: Vec3::new(x, 0.0, z),
            });
            x += orientation.extents.x;
        }
        z += row.depth;
    }
    placed
}
