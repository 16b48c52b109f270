//! Tuning parameters of the packing engine.

/// Configuration for the packing engine.
///
/// Contains the global tolerances and the two safety counters that bound
/// every invocation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Permitted footprint excess beyond each pallet edge, per axis and side (mm)
    pub max_overhang: f64,
    /// Maximum load height measured from the floor, deck included (mm)
    pub max_stack_height: f64,
    /// Fragile ratings strictly above this value enforce `fragile_weight_limit`
    pub fragile_threshold: u8,
    /// Maximum number of pallets the scheduler will start
    pub max_pallet_iterations: usize,
    /// Maximum number of run placement attempts while building one pallet
    pub max_attempts_per_pallet: usize,
    /// Maximum number of boxes a manifest may expand into
    pub max_units: usize,
    /// Tolerance for height comparisons
    pub height_epsilon: f64,
    /// General numerical tolerance
    pub general_epsilon: f64,
}

impl PackingConfig {
    pub const DEFAULT_MAX_OVERHANG: f64 = 200.0;
    pub const DEFAULT_MAX_STACK_HEIGHT: f64 = 2300.0;
    pub const DEFAULT_FRAGILE_THRESHOLD: u8 = 7;
    pub const DEFAULT_MAX_PALLET_ITERATIONS: usize = 100;
    pub const DEFAULT_MAX_ATTEMPTS_PER_PALLET: usize = 1000;
    pub const DEFAULT_MAX_UNITS: usize = 10_000;
    pub const DEFAULT_HEIGHT_EPSILON: f64 = crate::types::EPSILON_HEIGHT;
    pub const DEFAULT_GENERAL_EPSILON: f64 = crate::types::EPSILON_GENERAL;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }

    /// Whether a box with this rating enforces its fragile weight limit.
    pub fn is_fragile(&self, fragile_rating: u8) -> bool {
        fragile_rating > self.fragile_threshold
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            max_overhang: Self::DEFAULT_MAX_OVERHANG,
            max_stack_height: Self::DEFAULT_MAX_STACK_HEIGHT,
            fragile_threshold: Self::DEFAULT_FRAGILE_THRESHOLD,
            max_pallet_iterations: Self::DEFAULT_MAX_PALLET_ITERATIONS,
            max_attempts_per_pallet: Self::DEFAULT_MAX_ATTEMPTS_PER_PALLET,
            max_units: Self::DEFAULT_MAX_UNITS,
            height_epsilon: Self::DEFAULT_HEIGHT_EPSILON,
            general_epsilon: Self::DEFAULT_GENERAL_EPSILON,
        }
    }
}

/// Builder for [`PackingConfig`].
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    pub fn max_overhang(mut self, overhang: f64) -> Self {
        self.config.max_overhang = overhang;
        self
    }

    pub fn max_stack_height(mut self, height: f64) -> Self {
        self.config.max_stack_height = height;
        self
    }

    pub fn fragile_threshold(mut self, threshold: u8) -> Self {
        self.config.fragile_threshold = threshold;
        self
    }

    pub fn max_pallet_iterations(mut self, iterations: usize) -> Self {
        self.config.max_pallet_iterations = iterations;
        self
    }

    pub fn max_attempts_per_pallet(mut self, attempts: usize) -> Self {
        self.config.max_attempts_per_pallet = attempts;
        self
    }

    pub fn max_units(mut self, units: usize) -> Self {
        self.config.max_units = units;
        self
    }

    pub fn height_epsilon(mut self, epsilon: f64) -> Self {
        self.config.height_epsilon = epsilon;
        self
    }

    pub fn general_epsilon(mut self, epsilon: f64) -> Self {
        self.config.general_epsilon = epsilon;
        self
    }

    pub fn build(self) -> PackingConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_constants() {
        let config = PackingConfig::default();
        assert_eq!(config.max_overhang, 200.0);
        assert_eq!(config.max_stack_height, 2300.0);
        assert_eq!(config.max_pallet_iterations, 100);
        assert_eq!(config.max_units, 10_000);
    }

    #[test]
    fn builder_overrides_selected_fields() {
        let config = PackingConfig::builder()
            .max_overhang(50.0)
            .fragile_threshold(5)
            .max_attempts_per_pallet(3)
            .build();
        assert_eq!(config.max_overhang, 50.0);
        assert_eq!(config.fragile_threshold, 5);
        assert_eq!(config.max_attempts_per_pallet, 3);
        assert_eq!(config.max_stack_height, PackingConfig::DEFAULT_MAX_STACK_HEIGHT);
    }

    #[test]
    fn fragile_threshold_is_exclusive() {
        let config = PackingConfig::default();
        assert!(!config.is_fragile(7));
        assert!(config.is_fragile(8));
    }
}
