//! Deterministic pallet loading engine.
//!
//! Boxes are grouped by product and role, laid out in rows layer by layer,
//! and spread over as many pallets as the stacking rules and the height
//! limit require.
//!
//! ```
//! use auto_pallet::model::{BoxSpec, PalletKind, PlacementUnit, UnitId};
//! use auto_pallet::packing_config::PackingConfig;
//! use auto_pallet::scheduler::schedule;
//!
//! let units = vec![PlacementUnit::new(
//!     UnitId(0),
//!     BoxSpec::new("desk", 0, (400.0, 300.0, 200.0), 10.0),
//! )];
//! let result = schedule(units, &PalletKind::AuChep.pallet_type(), &PackingConfig::default());
//!
//! assert_eq!(result.pallets.len(), 1);
//! assert_eq!(result.pallets[0].metrics.total_height, 350.0);
//! ```

pub mod api;
pub mod config;
pub mod geometry;
pub mod logging;
pub mod manifest;
pub mod metrics;
pub mod model;
pub mod orientation;
pub mod packer;
pub mod packing_config;
pub mod rows;
pub mod rules;
pub mod scheduler;
pub mod stacking;
pub mod types;

pub use packing_config::PackingConfig;
pub use scheduler::{PackingResult, schedule, schedule_with_progress};
