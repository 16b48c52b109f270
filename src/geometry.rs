//! Geometrische Hilfsfunktionen für Grundflächen und Auflage zwischen Schichten.
//!
//! Alle Prüfungen arbeiten in der horizontalen Ebene (x = Palettenbreite,
//! z = Palettentiefe); die Höhe wird über die Schichten abgebildet.

use crate::model::{Layer, PlacedUnit};
use crate::types::EPSILON_GENERAL;

/// Berechnet die Überlappung zweier Intervalle in einer Dimension.
///
/// # Rückgabewert
/// Länge der Überlappung, mindestens 0.0
///
/// # Beispiel
/// ```
/// use auto_pallet::geometry::overlap_1d;
///
/// assert_eq!(overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
/// ```
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}

/// Prüft, ob sich die Grundflächen zweier platzierter Einheiten überschneiden.
///
/// Berührende Kanten gelten nicht als Überschneidung.
pub fn footprints_overlap(a: &PlacedUnit, b: &PlacedUnit) -> bool {
    a.bounding_box()
        .footprints_overlap(&b.bounding_box(), EPSILON_GENERAL)
}

/// Sucht das erste Paar überlappender Einheiten innerhalb einer Schicht.
///
/// # Rückgabewert
/// `Some((i, j))` mit den Indizes des Paares, sonst `None`
pub fn first_overlap(layer: &Layer) -> Option<(usize, usize)> {
    for (i, a) in layer.units.iter().enumerate() {
        for (j, b) in layer.units.iter().enumerate().skip(i + 1) {
            if footprints_overlap(a, b) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Gewicht, das direkt auf einer Einheit lastet.
///
/// Summiert alle Einheiten der darüberliegenden Schicht, deren Grundfläche
/// die Oberseite von `lower` berührt.
pub fn weight_resting_on(lower: &PlacedUnit, above: &Layer) -> f64 {
    let lower_box = lower.bounding_box();
    above
        .units
        .iter()
        .filter(|upper| (upper.position.y - lower.top_y()).abs() <= crate::types::EPSILON_HEIGHT)
        .filter(|upper| lower_box.overlap_area_xz(&upper.bounding_box()) > EPSILON_GENERAL)
        .map(|upper| upper.unit.spec.weight)
        .sum()
}

/// Prüft, ob ein Punkt (x, z) innerhalb der Grundfläche einer Einheit liegt.
pub fn point_inside_footprint(point: (f64, f64), placed: &PlacedUnit) -> bool {
    let (px, pz) = point;
    let min = placed.position;
    let max = placed.position + placed.extents;
    px >= min.x && px <= max.x && pz >= min.z && pz <= max.z
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoxSpec, GroupKey, OrientationKind, PlacementUnit, UnitId};
    use crate::types::Vec3;

    fn placed(id: u64, position: Vec3, extents: Vec3, weight: f64) -> PlacedUnit {
        PlacedUnit {
            unit: PlacementUnit::new(
                UnitId(id),
                BoxSpec::new("p", 0, (extents.x, extents.z, extents.y), weight),
            ),
            orientation: OrientationKind::Flat,
            extents,
            position,
        }
    }

    fn layer(base_y: f64, height: f64, units: Vec<PlacedUnit>) -> Layer {
        Layer {
            group: GroupKey::new("p", 0),
            base_y,
            height,
            units,
        }
    }

    #[test]
    fn overlap_1d_is_never_negative() {
        assert_eq!(overlap_1d(0.0, 1.0, 2.0, 3.0), 0.0);
        assert_eq!(overlap_1d(0.0, 10.0, 2.0, 3.0), 1.0);
    }

    #[test]
    fn touching_footprints_do_not_overlap() {
        let a = placed(1, Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 5.0, 10.0), 1.0);
        let b = placed(2, Vec3::new(10.0, 0.0, 0.0), Vec3::new(10.0, 5.0, 10.0), 1.0);
        let c = placed(3, Vec3::new(9.0, 0.0, 9.0), Vec3::new(10.0, 5.0, 10.0), 1.0);

        assert!(!footprints_overlap(&a, &b));
        assert!(footprints_overlap(&a, &c));
        assert_eq!(first_overlap(&layer(0.0, 5.0, vec![a.clone(), b.clone()])), None);
        assert_eq!(first_overlap(&layer(0.0, 5.0, vec![a, b, c])), Some((0, 2)));
    }

    #[test]
    fn weight_resting_on_counts_only_touching_units() {
        let lower = placed(1, Vec3::new(0.0, 150.0, 0.0), Vec3::new(100.0, 50.0, 100.0), 5.0);
        let above = layer(
            200.0,
            20.0,
            vec![
                placed(2, Vec3::new(50.0, 200.0, 50.0), Vec3::new(100.0, 20.0, 100.0), 7.0),
                placed(3, Vec3::new(100.0, 200.0, 0.0), Vec3::new(50.0, 20.0, 50.0), 3.0),
            ],
        );

        assert!((weight_resting_on(&lower, &above) - 7.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn point_inside_footprint_includes_edges() {
        let unit = placed(1, Vec3::new(-5.0, 0.0, -5.0), Vec3::new(10.0, 1.0, 10.0), 1.0);
        assert!(point_inside_footprint((0.0, 0.0), &unit));
        assert!(point_inside_footprint((5.0, -5.0), &unit));
        assert!(!point_inside_footprint((5.1, 0.0), &unit));
    }
}
