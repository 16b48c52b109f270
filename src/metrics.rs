//! Derived metrics of a loaded pallet.

use serde::Serialize;

use crate::geometry::{point_inside_footprint, weight_resting_on};
use crate::model::{Layer, PalletLoad, PalletType, UnitId};
use crate::packing_config::PackingConfig;
use crate::types::{BoundingBox, CenterOfMassCalculator, Dimensional, Vec3, Weighted};

/// Horizontal center of gravity of the load.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CenterOfGravity {
    pub x: f64,
    pub z: f64,
    /// Distance from the pallet center
    pub offset: f64,
    /// Whether the point lies over a unit of the ground layer
    pub over_ground_layer: bool,
}

/// Load carried by one fragile unit relative to its limit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CrushRisk {
    pub unit: UnitId,
    pub load_above: f64,
    pub limit: f64,
    pub ratio: f64,
}

/// Metrics of one pallet load.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LoadMetrics {
    /// Height of the topmost layer above the floor, deck included
    pub total_height: f64,
    /// Placed weight plus pallet tare
    pub total_weight: f64,
    pub load_width: f64,
    pub load_depth: f64,
    /// Placed volume relative to the enclosing load volume above the deck
    pub efficiency: f64,
    pub center_of_gravity: Option<CenterOfGravity>,
    pub crush_risks: Vec<CrushRisk>,
    pub max_crush_risk: f64,
}

impl LoadMetrics {
    /// Crush risk entry of a unit, if it has one.
    pub fn crush_risk_of(&self, unit: UnitId) -> Option<&CrushRisk> {
        self.crush_risks.iter().find(|risk| risk.unit == unit)
    }
}

/// Computes the metrics of `layers` on `pallet`.
pub fn calculate(pallet: &PalletType, layers: &[Layer], config: &PackingConfig) -> LoadMetrics {
    let deck = BoundingBox::from_position_and_dims(
        Vec3::new(-pallet.width / 2.0, 0.0, -pallet.depth / 2.0),
        Vec3::new(pallet.width, pallet.deck_height, pallet.depth),
    );

    let mut bounds = deck;
    let mut placed_volume = 0.0;
    let mut placed_weight = 0.0;
    let mut com = CenterOfMassCalculator::new();

    for placed in layers.iter().flat_map(|layer| layer.units.iter()) {
        bounds = bounds.union(&placed.bounding_box());
        placed_volume += placed.volume();
        placed_weight += placed.weight();
        let center = placed.center();
        com.add_point(center.x, center.z, placed.weight());
    }

    let total_height = layers
        .last()
        .map(Layer::top_y)
        .unwrap_or(pallet.deck_height);
    let extent = bounds.dimensions();
    let enclosing = extent.x * extent.z * (total_height - pallet.deck_height);
    let efficiency = if enclosing > config.general_epsilon {
        placed_volume / enclosing
    } else {
        0.0
    };

    let center_of_gravity = com.compute().map(|(x, z)| CenterOfGravity {
        x,
        z,
        offset: com.distance_to((0.0, 0.0)),
        over_ground_layer: layers
            .first()
            .map(|ground| ground.units.iter().any(|p| point_inside_footprint((x, z), p)))
            .unwrap_or(false),
    });

    let crush_risks = crush_risks(layers, config);
    let max_crush_risk = crush_risks
        .iter()
        .map(|risk| risk.ratio)
        .fold(0.0, f64::max);

    LoadMetrics {
        total_height,
        total_weight: placed_weight + pallet.tare_weight,
        load_width: extent.x,
        load_depth: extent.z,
        efficiency,
        center_of_gravity,
        crush_risks,
        max_crush_risk,
    }
}

/// Wraps finished layers into a [`PalletLoad`] with its metrics.
pub fn build_load(pallet: PalletType, layers: Vec<Layer>, config: &PackingConfig) -> PalletLoad {
    let metrics = calculate(&pallet, &layers, config);
    PalletLoad {
        pallet,
        layers,
        metrics,
    }
}

fn crush_risks(layers: &[Layer], config: &PackingConfig) -> Vec<CrushRisk> {
    let mut risks = Vec::new();
    for (lower, upper) in layers.iter().zip(layers.iter().skip(1)) {
        for placed in &lower.units {
            let spec = &placed.unit.spec;
            if !config.is_fragile(spec.fragile_rating) {
                continue;
            }
            let Some(limit) = spec.fragile_weight_limit else {
                continue;
            };
            let load_above = weight_resting_on(placed, upper);
            if load_above <= config.general_epsilon {
                continue;
            }
            risks.push(CrushRisk {
                unit: placed.id(),
                load_above,
                limit,
                ratio: load_above / limit.max(config.general_epsilon),
            });
        }
    }
    risks
}
