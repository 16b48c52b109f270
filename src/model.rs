//! Data models for the pallet loading engine.
//!
//! - `BoxSpec`: one kind of box with its dimensions, weight and role flags
//! - `PlacementUnit`: one physical box instance with a stable identifier
//! - `PlacedUnit`: a unit after packing, with orientation and position
//! - `PalletType`: an entry of the fixed pallet catalog
//! - `Layer` / `PalletLoad`: the per-pallet arrangement
//!
//! All structures implement the traits from the `types` module.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::metrics::LoadMetrics;
use crate::types::{BoundingBox, Dimensional, Vec3, Weighted};

/// Highest accepted fragility / rigidity rating.
pub const MAX_RATING: u8 = 10;

/// Validation error for box data arriving from the manifest.
///
/// The engine itself assumes valid input; this is enforced at the boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid rating: {0}")]
    InvalidRating(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Too many units: the manifest expands beyond {limit} boxes")]
    TooManyUnits { limit: usize },
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_weight_value(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidWeight(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_rating(value: u8, name: &str) -> Result<(), ValidationError> {
    if value > MAX_RATING {
        return Err(ValidationError::InvalidRating(format!(
            "{} must be between 0 and {}, got: {}",
            name, MAX_RATING, value
        )));
    }
    Ok(())
}

/// Ordering class of a product-role group in the packing queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroupPriority {
    /// Loaded first, as a block, in original order.
    Base,
    #[default]
    Normal,
    /// Loaded last, after every other group.
    MustStackAboveBase,
}

impl GroupPriority {
    /// Position of the class in the queue (lower goes first).
    pub fn rank(self) -> u8 {
        match self {
            GroupPriority::Base => 0,
            GroupPriority::Normal => 1,
            GroupPriority::MustStackAboveBase => 2,
        }
    }
}

fn default_rigidity() -> u8 {
    MAX_RATING
}

/// Description of one kind of box.
///
/// # Fields
/// * `width`, `depth`, `height` - unrotated dimensions in mm
/// * `weight` - weight in kg
/// * `product_id` / `role_index` - product identity and sub-component role
/// * `can_stand_on_edge` - permits the four on-edge orientations
/// * `no_stack_above` - nothing may rest on this box
/// * `fragile_weight_limit` - max weight directly above when the box counts as fragile
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "width": 730.0, "depth": 600.0, "height": 500.0, "weight": 30.0,
    "fragile_rating": 4, "rigidity_rating": 8,
    "product_id": "wr-s4", "role_index": 0
}))]
pub struct BoxSpec {
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    pub weight: f64,
    #[serde(default)]
    pub fragile_rating: u8,
    #[serde(default = "default_rigidity")]
    pub rigidity_rating: u8,
    pub product_id: String,
    #[serde(default)]
    pub role_index: u32,
    #[serde(default)]
    pub can_stand_on_edge: bool,
    #[serde(default)]
    pub no_stack_above: bool,
    #[serde(default)]
    pub group_priority: GroupPriority,
    #[serde(default)]
    pub fragile_weight_limit: Option<f64>,
}

impl BoxSpec {
    /// Creates a plain box spec with neutral ratings and no role flags.
    ///
    /// # Examples
    /// ```
    /// use auto_pallet::model::BoxSpec;
    ///
    /// let spec = BoxSpec::new("desk", 0, (400.0, 300.0, 200.0), 10.0);
    /// assert!(spec.validate().is_ok());
    ///
    /// let broken = BoxSpec::new("desk", 0, (-400.0, 300.0, 200.0), 10.0);
    /// assert!(broken.validate().is_err());
    /// ```
    pub fn new(
        product_id: impl Into<String>,
        role_index: u32,
        dims: (f64, f64, f64),
        weight: f64,
    ) -> Self {
        Self {
            width: dims.0,
            depth: dims.1,
            height: dims.2,
            weight,
            fragile_rating: 0,
            rigidity_rating: MAX_RATING,
            product_id: product_id.into(),
            role_index,
            can_stand_on_edge: false,
            no_stack_above: false,
            group_priority: GroupPriority::Normal,
            fragile_weight_limit: None,
        }
    }

    /// Checks the manifest preconditions the engine relies on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.width, "Width")?;
        validate_dimension(self.depth, "Depth")?;
        validate_dimension(self.height, "Height")?;
        validate_weight_value(self.weight, "Weight")?;
        validate_rating(self.fragile_rating, "Fragile rating")?;
        validate_rating(self.rigidity_rating, "Rigidity rating")?;
        if let Some(limit) = self.fragile_weight_limit {
            if limit < 0.0 || !limit.is_finite() {
                return Err(ValidationError::InvalidWeight(format!(
                    "Fragile weight limit must be a non-negative number, got: {}",
                    limit
                )));
            }
        }
        Ok(())
    }

    /// Ordering weight used by the queue: weight × rigidity.
    pub fn stacking_strength(&self) -> f64 {
        self.weight * f64::from(self.rigidity_rating)
    }
}

/// Stable identifier of a placement unit.
///
/// Assigned by manifest expansion (arena index) or supplied by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a product-role group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub product_id: String,
    pub role_index: u32,
}

impl GroupKey {
    pub fn new(product_id: impl Into<String>, role_index: u32) -> Self {
        Self {
            product_id: product_id.into(),
            role_index,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product_id, self.role_index)
    }
}

/// Axis-aligned orientation of a box.
///
/// Listed in enumeration order, which is also the tie-break order of the
/// orientation selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrientationKind {
    /// 0° about the vertical axis.
    Flat,
    /// 90° about the vertical axis.
    FlatRotated,
    /// Depth becomes vertical.
    Side,
    SideRotated,
    /// Width becomes vertical.
    End,
    EndRotated,
}

impl OrientationKind {
    pub const FLAT: [OrientationKind; 2] = [OrientationKind::Flat, OrientationKind::FlatRotated];
    pub const ON_EDGE: [OrientationKind; 4] = [
        OrientationKind::Side,
        OrientationKind::SideRotated,
        OrientationKind::End,
        OrientationKind::EndRotated,
    ];

    /// Oriented extents (`x` footprint width, `y` height, `z` footprint depth).
    pub fn extents(self, spec: &BoxSpec) -> Vec3 {
        let (w, d, h) = (spec.width, spec.depth, spec.height);
        match self {
            OrientationKind::Flat => Vec3::new(w, h, d),
            OrientationKind::FlatRotated => Vec3::new(d, h, w),
            OrientationKind::Side => Vec3::new(w, d, h),
            OrientationKind::SideRotated => Vec3::new(h, d, w),
            OrientationKind::End => Vec3::new(h, w, d),
            OrientationKind::EndRotated => Vec3::new(d, w, h),
        }
    }

    pub fn is_flat(self) -> bool {
        matches!(self, OrientationKind::Flat | OrientationKind::FlatRotated)
    }
}

/// A caller-forced flat rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlatRotation {
    Flat,
    FlatRotated,
}

impl From<FlatRotation> for OrientationKind {
    fn from(rotation: FlatRotation) -> Self {
        match rotation {
            FlatRotation::Flat => OrientationKind::Flat,
            FlatRotation::FlatRotated => OrientationKind::FlatRotated,
        }
    }
}

/// One physical box instance waiting to be packed.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementUnit {
    pub id: UnitId,
    pub spec: BoxSpec,
    pub force_rotation: Option<FlatRotation>,
}

impl PlacementUnit {
    pub fn new(id: UnitId, spec: BoxSpec) -> Self {
        Self {
            id,
            spec,
            force_rotation: None,
        }
    }

    /// Pre-selects a flat rotation (builder style).
    pub fn with_forced_rotation(mut self, rotation: FlatRotation) -> Self {
        self.force_rotation = Some(rotation);
        self
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(self.spec.product_id.clone(), self.spec.role_index)
    }

    /// Whether `other` belongs to the same product-role group.
    pub fn same_group(&self, other: &PlacementUnit) -> bool {
        self.spec.product_id == other.spec.product_id && self.spec.role_index == other.spec.role_index
    }
}

/// A packed unit with its final orientation and position.
///
/// `position` is the minimum corner in the pallet frame.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedUnit {
    pub unit: PlacementUnit,
    pub orientation: OrientationKind,
    pub extents: Vec3,
    pub position: Vec3,
}

impl PlacedUnit {
    pub fn id(&self) -> UnitId {
        self.unit.id
    }

    /// Y coordinate of the top face.
    pub fn top_y(&self) -> f64 {
        self.position.y + self.extents.y
    }

    pub fn center(&self) -> Vec3 {
        self.position + self.extents * 0.5
    }

    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.position, self.extents)
    }
}

impl Dimensional for PlacedUnit {
    fn dimensions(&self) -> Vec3 {
        self.extents
    }
}

impl Weighted for PlacedUnit {
    fn weight(&self) -> f64 {
        self.unit.spec.weight
    }
}

/// Keys of the fixed pallet catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PalletKind {
    #[default]
    AuChep,
    UsStd,
    EuEuro,
    PlasticStd,
}

impl PalletKind {
    pub const ALL: [PalletKind; 4] = [
        PalletKind::AuChep,
        PalletKind::UsStd,
        PalletKind::EuEuro,
        PalletKind::PlasticStd,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PalletKind::AuChep => "AU_CHEP",
            PalletKind::UsStd => "US_STD",
            PalletKind::EuEuro => "EU_EURO",
            PalletKind::PlasticStd => "PLASTIC_STD",
        }
    }

    /// Catalog entry for this key.
    pub fn pallet_type(self) -> PalletType {
        let (name, width, depth, deck_height, tare_weight) = match self {
            PalletKind::AuChep => ("AU CHEP", 1165.0, 1165.0, 150.0, 30.0),
            PalletKind::UsStd => ("US STND", 1016.0, 1219.0, 150.0, 20.0),
            PalletKind::EuEuro => ("EU EPAL", 1200.0, 800.0, 144.0, 25.0),
            PalletKind::PlasticStd => ("Plastic Unit", 1100.0, 1000.0, 125.0, 15.0),
        };
        PalletType {
            kind: self,
            name,
            width,
            depth,
            deck_height,
            tare_weight,
        }
    }

    /// Highest deck in the catalog; stack limits must clear it.
    pub fn tallest_deck_height() -> f64 {
        PalletKind::ALL
            .into_iter()
            .map(|kind| kind.pallet_type().deck_height)
            .fold(0.0, f64::max)
    }
}

impl fmt::Display for PalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PalletKind {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim();
        PalletKind::ALL
            .into_iter()
            .find(|kind| kind.key().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ValidationError::InvalidConfiguration(format!("unknown pallet type '{}'", raw))
            })
    }
}

/// A pallet from the catalog.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PalletType {
    pub kind: PalletKind,
    pub name: &'static str,
    pub width: f64,
    pub depth: f64,
    pub deck_height: f64,
    pub tare_weight: f64,
}

/// Units sharing one height level on a pallet.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    /// Product-role group the layer was built from.
    pub group: GroupKey,
    /// Height of the layer's bottom face above the floor.
    pub base_y: f64,
    /// Common oriented height of all members.
    pub height: f64,
    pub units: Vec<PlacedUnit>,
}

impl Layer {
    pub fn top_y(&self) -> f64 {
        self.base_y + self.height
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// One loaded pallet with its layers and derived metrics.
#[derive(Clone, Debug, PartialEq)]
pub struct PalletLoad {
    pub pallet: PalletType,
    pub layers: Vec<Layer>,
    pub metrics: LoadMetrics,
}

impl PalletLoad {
    /// All placed units, bottom layer first.
    pub fn placed_units(&self) -> impl Iterator<Item = &PlacedUnit> {
        self.layers.iter().flat_map(|layer| layer.units.iter())
    }

    pub fn unit_count(&self) -> usize {
        self.layers.iter().map(Layer::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_matches_published_dimensions() {
        let chep = PalletKind::AuChep.pallet_type();
        assert_eq!((chep.width, chep.depth, chep.deck_height), (1165.0, 1165.0, 150.0));
        assert_eq!(chep.tare_weight, 30.0);

        let euro = PalletKind::EuEuro.pallet_type();
        assert_eq!((euro.width, euro.depth, euro.deck_height), (1200.0, 800.0, 144.0));
        assert_eq!(euro.tare_weight, 25.0);

        let us = PalletKind::UsStd.pallet_type();
        assert_eq!((us.width, us.depth), (1016.0, 1219.0));

        let plastic = PalletKind::PlasticStd.pallet_type();
        assert_eq!(plastic.deck_height, 125.0);
        assert_eq!(plastic.tare_weight, 15.0);
    }

    #[test]
    fn pallet_kind_parses_keys_case_insensitively() {
        assert_eq!("EU_EURO".parse::<PalletKind>(), Ok(PalletKind::EuEuro));
        assert_eq!(" plastic_std ".parse::<PalletKind>(), Ok(PalletKind::PlasticStd));
        assert!("EURO".parse::<PalletKind>().is_err());
    }

    #[test]
    fn pallet_kind_serializes_as_catalog_key() {
        let json = serde_json::to_string(&PalletKind::UsStd).unwrap();
        assert_eq!(json, "\"US_STD\"");
        let parsed: PalletKind = serde_json::from_str("\"AU_CHEP\"").unwrap();
        assert_eq!(parsed, PalletKind::AuChep);
    }

    #[test]
    fn orientation_extents_follow_enumeration() {
        let spec = BoxSpec::new("p", 0, (100.0, 200.0, 300.0), 1.0);
        assert_eq!(OrientationKind::Flat.extents(&spec), Vec3::new(100.0, 300.0, 200.0));
        assert_eq!(OrientationKind::FlatRotated.extents(&spec), Vec3::new(200.0, 300.0, 100.0));
        assert_eq!(OrientationKind::Side.extents(&spec), Vec3::new(100.0, 200.0, 300.0));
        assert_eq!(OrientationKind::SideRotated.extents(&spec), Vec3::new(300.0, 200.0, 100.0));
        assert_eq!(OrientationKind::End.extents(&spec), Vec3::new(300.0, 100.0, 200.0));
        assert_eq!(OrientationKind::EndRotated.extents(&spec), Vec3::new(200.0, 100.0, 300.0));
    }

    #[test]
    fn box_spec_rejects_bad_ratings_and_limits() {
        let mut spec = BoxSpec::new("p", 0, (10.0, 10.0, 10.0), 1.0);
        spec.fragile_rating = 11;
        assert!(matches!(spec.validate(), Err(ValidationError::InvalidRating(_))));

        spec.fragile_rating = 9;
        spec.fragile_weight_limit = Some(-1.0);
        assert!(matches!(spec.validate(), Err(ValidationError::InvalidWeight(_))));

        spec.fragile_weight_limit = Some(30.0);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn box_spec_deserializes_with_defaults() {
        let json = r#"{"width": 10.0, "depth": 20.0, "height": 30.0, "weight": 2.0, "product_id": "x"}"#;
        let spec: BoxSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.rigidity_rating, MAX_RATING);
        assert_eq!(spec.fragile_rating, 0);
        assert_eq!(spec.group_priority, GroupPriority::Normal);
        assert!(spec.fragile_weight_limit.is_none());
    }

    #[test]
    fn group_priority_ranks_base_first() {
        assert!(GroupPriority::Base.rank() < GroupPriority::Normal.rank());
        assert!(GroupPriority::Normal.rank() < GroupPriority::MustStackAboveBase.rank());
    }
}
