//! Orientation selection for a single box.
//!
//! Flat rotations are always candidates; boxes allowed to stand on edge add
//! the four on-edge orientations. Among the orientations that fit, the one
//! with the smallest footprint wins and ties go to the earlier candidate.

use thiserror::Error;
use tracing::debug;

use crate::model::{OrientationKind, PalletType, PlacementUnit};
use crate::types::Vec3;

/// Space an orientation has to fit into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientationBounds {
    /// Pallet width (x)
    pub width: f64,
    /// Pallet depth (z)
    pub depth: f64,
    /// Permitted excess per side on each axis
    pub overhang: f64,
    /// Vertical space between deck and the height limit
    pub clearance: f64,
}

impl OrientationBounds {
    /// Bounds for a pallet with the given overhang and height limit.
    pub fn for_pallet(pallet: &PalletType, overhang: f64, max_stack_height: f64) -> Self {
        Self {
            width: pallet.width,
            depth: pallet.depth,
            overhang,
            clearance: max_stack_height - pallet.deck_height,
        }
    }

    /// Same bounds with a different overhang.
    pub fn with_overhang(self, overhang: f64) -> Self {
        Self { overhang, ..self }
    }

    /// Usable width including overhang on both sides.
    pub fn usable_width(&self) -> f64 {
        self.width + 2.0 * self.overhang
    }

    /// Usable depth including overhang on both sides.
    pub fn usable_depth(&self) -> f64 {
        self.depth + 2.0 * self.overhang
    }

    fn footprint_fits(&self, extents: &Vec3, epsilon: f64) -> bool {
        extents.x <= self.usable_width() + epsilon && extents.z <= self.usable_depth() + epsilon
    }

    fn fits(&self, extents: &Vec3, epsilon: f64) -> bool {
        self.footprint_fits(extents, epsilon) && extents.y <= self.clearance + epsilon
    }
}

/// A chosen orientation with its oriented extents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orientation {
    pub kind: OrientationKind,
    pub extents: Vec3,
}

/// Why no orientation could be chosen.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum OrientationError {
    #[error("box exceeds the pallet footprint in every orientation")]
    ExceedsFootprint,
    #[error("box exceeds the height limit in every orientation that fits the footprint")]
    ExceedsHeight,
}

/// Candidate orientations in enumeration (tie-break) order.
pub fn candidates(unit: &PlacementUnit) -> Vec<OrientationKind> {
    let mut kinds = OrientationKind::FLAT.to_vec();
    if unit.spec.can_stand_on_edge {
        kinds.extend_from_slice(&OrientationKind::ON_EDGE);
    }
    kinds
}

/// Chooses the orientation of `unit` within `bounds`.
///
/// A forced flat rotation is used whenever it fits; otherwise the smallest
/// fitting footprint is taken, earliest candidate first on equal area.
///
/// # Examples
/// ```
/// use auto_pallet::model::{BoxSpec, OrientationKind, PalletKind, PlacementUnit, UnitId};
/// use auto_pallet::orientation::{select_orientation, OrientationBounds};
///
/// let pallet = PalletKind::AuChep.pallet_type();
/// let bounds = OrientationBounds::for_pallet(&pallet, 0.0, 2300.0);
/// let unit = PlacementUnit::new(UnitId(0), BoxSpec::new("p", 0, (400.0, 300.0, 200.0), 10.0));
///
/// let chosen = select_orientation(&unit, &bounds, 1e-6).unwrap();
/// assert_eq!(chosen.kind, OrientationKind::Flat);
/// ```
pub fn select_orientation(
    unit: &PlacementUnit,
    bounds: &OrientationBounds,
    epsilon: f64,
) -> Result<Orientation, OrientationError> {
    if let Some(forced) = unit.force_rotation {
        let kind = OrientationKind::from(forced);
        let extents = kind.extents(&unit.spec);
        if bounds.fits(&extents, epsilon) {
            return Ok(Orientation { kind, extents });
        }
        debug!(unit = %unit.id, ?kind, "forced rotation does not fit, falling back to selection");
    }

    let mut best: Option<Orientation> = None;
    let mut footprint_fits_somewhere = false;

    for kind in candidates(unit) {
        let extents = kind.extents(&unit.spec);
        if !bounds.footprint_fits(&extents, epsilon) {
            continue;
        }
        footprint_fits_somewhere = true;
        if extents.y > bounds.clearance + epsilon {
            continue;
        }

        let better = match &best {
            None => true,
            Some(current) => {
                extents.footprint_area() + epsilon < current.extents.footprint_area()
            }
        };
        if better {
            best = Some(Orientation { kind, extents });
        }
    }

    best.ok_or(if footprint_fits_somewhere {
        OrientationError::ExceedsHeight
    } else {
        OrientationError::ExceedsFootprint
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoxSpec, FlatRotation, PalletKind, UnitId};

    const EPS: f64 = 1e-6;

    fn unit(dims: (f64, f64, f64)) -> PlacementUnit {
        PlacementUnit::new(UnitId(1), BoxSpec::new("p", 0, dims, 10.0))
    }

    fn chep_bounds(overhang: f64) -> OrientationBounds {
        OrientationBounds::for_pallet(&PalletKind::AuChep.pallet_type(), overhang, 2300.0)
    }

    #[test]
    fn flat_wins_ties_over_rotated() {
        let chosen = select_orientation(&unit((600.0, 400.0, 300.0)), &chep_bounds(0.0), EPS).unwrap();
        assert_eq!(chosen.kind, OrientationKind::Flat);
        assert_eq!(chosen.extents, Vec3::new(600.0, 300.0, 400.0));
    }

    #[test]
    fn rotated_is_used_when_flat_does_not_fit() {
        let euro = OrientationBounds::for_pallet(&PalletKind::EuEuro.pallet_type(), 0.0, 2300.0);
        let chosen = select_orientation(&unit((700.0, 1000.0, 300.0)), &euro, EPS).unwrap();
        assert_eq!(chosen.kind, OrientationKind::FlatRotated);
        assert_eq!(chosen.extents.x, 1000.0);
        assert_eq!(chosen.extents.z, 700.0);
    }

    #[test]
    fn edge_orientations_only_when_allowed() {
        let mut flat_only = unit((1000.0, 1000.0, 100.0));
        let chosen = select_orientation(&flat_only, &chep_bounds(0.0), EPS).unwrap();
        assert!(chosen.kind.is_flat());

        flat_only.spec.can_stand_on_edge = true;
        let chosen = select_orientation(&flat_only, &chep_bounds(0.0), EPS).unwrap();
        assert_eq!(chosen.kind, OrientationKind::Side);
        assert!((chosen.extents.footprint_area() - 100_000.0).abs() < EPS);
        assert_eq!(chosen.extents.y, 1000.0);
    }

    #[test]
    fn overhang_widens_the_filter() {
        let long = unit((1500.0, 500.0, 300.0));
        assert_eq!(
            select_orientation(&long, &chep_bounds(0.0), EPS),
            Err(OrientationError::ExceedsFootprint)
        );
        let chosen = select_orientation(&long, &chep_bounds(200.0), EPS).unwrap();
        assert_eq!(chosen.kind, OrientationKind::Flat);
    }

    #[test]
    fn forced_rotation_bypasses_tie_break() {
        let forced = unit((600.0, 400.0, 300.0)).with_forced_rotation(FlatRotation::FlatRotated);
        let chosen = select_orientation(&forced, &chep_bounds(0.0), EPS).unwrap();
        assert_eq!(chosen.kind, OrientationKind::FlatRotated);
        assert_eq!(chosen.extents.x, 400.0);
    }

    #[test]
    fn forced_rotation_falls_back_when_it_does_not_fit() {
        let euro = OrientationBounds::for_pallet(&PalletKind::EuEuro.pallet_type(), 0.0, 2300.0);
        let forced = unit((1000.0, 700.0, 300.0)).with_forced_rotation(FlatRotation::FlatRotated);
        let chosen = select_orientation(&forced, &euro, EPS).unwrap();
        assert_eq!(chosen.kind, OrientationKind::Flat);
    }

    #[test]
    fn too_tall_boxes_report_height() {
        let tower = unit((500.0, 500.0, 2500.0));
        assert_eq!(
            select_orientation(&tower, &chep_bounds(200.0), EPS),
            Err(OrientationError::ExceedsHeight)
        );

        let mut lying_down = tower.clone();
        lying_down.spec.can_stand_on_edge = true;
        let chosen = select_orientation(&lying_down, &chep_bounds(200.0), EPS);
        // 2500 does not fit 1165 + 400 on either axis, so it can never lie down
        assert_eq!(chosen, Err(OrientationError::ExceedsHeight));
    }
}
