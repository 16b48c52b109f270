use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, warn};

use crate::model::PalletKind;
use crate::packing_config::PackingConfig;
use crate::rules::RoleRuleTable;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub engine: EngineSettings,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            engine: EngineSettings::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "AUTO_PALLET_API_HOST";
    const PORT_VAR: &'static str = "AUTO_PALLET_API_PORT";

    fn from_env() -> Self {
        let host_value = env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = load_with_warning(
            Self::PORT_VAR,
            Self::DEFAULT_PORT,
            |value| value != 0,
            "must not be 0",
            None,
        );

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Engine parameters and defaults shared by all requests.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    packing: PackingConfig,
    default_pallet: PalletKind,
    role_rules: RoleRuleTable,
    role_rules_path: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            packing: PackingConfig::default(),
            default_pallet: PalletKind::default(),
            role_rules: RoleRuleTable::new(),
            role_rules_path: None,
        }
    }
}

impl EngineSettings {
    const MAX_OVERHANG_VAR: &'static str = "AUTO_PALLET_MAX_OVERHANG";
    const MAX_STACK_HEIGHT_VAR: &'static str = "AUTO_PALLET_MAX_STACK_HEIGHT";
    const FRAGILE_THRESHOLD_VAR: &'static str = "AUTO_PALLET_FRAGILE_THRESHOLD";
    const MAX_PALLET_ITERATIONS_VAR: &'static str = "AUTO_PALLET_MAX_PALLET_ITERATIONS";
    const MAX_ATTEMPTS_VAR: &'static str = "AUTO_PALLET_MAX_ATTEMPTS_PER_PALLET";
    const MAX_UNITS_VAR: &'static str = "AUTO_PALLET_MAX_UNITS";
    const DEFAULT_PALLET_VAR: &'static str = "AUTO_PALLET_DEFAULT_PALLET";
    const ROLE_RULES_VAR: &'static str = "AUTO_PALLET_ROLE_RULES";

    fn from_env() -> Self {
        let max_overhang = load_with_warning(
            Self::MAX_OVERHANG_VAR,
            PackingConfig::DEFAULT_MAX_OVERHANG,
            |value| value >= 0.0 && value.is_finite(),
            "must be a non-negative number",
            Some("Adjusted overhang tolerance changes how far loads may project beyond the deck"),
        );

        let max_stack_height = load_with_warning(
            Self::MAX_STACK_HEIGHT_VAR,
            PackingConfig::DEFAULT_MAX_STACK_HEIGHT,
            is_valid_stack_height,
            "must exceed the tallest pallet deck (150 mm)",
            Some("Adjusted stack height limit may exceed vehicle or racking clearance"),
        );

        let fragile_threshold = load_with_warning(
            Self::FRAGILE_THRESHOLD_VAR,
            PackingConfig::DEFAULT_FRAGILE_THRESHOLD,
            |value| value <= crate::model::MAX_RATING,
            "must be between 0 and 10",
            Some("Adjusted fragile threshold changes which weight limits are enforced"),
        );

        let max_pallet_iterations = load_with_warning(
            Self::MAX_PALLET_ITERATIONS_VAR,
            PackingConfig::DEFAULT_MAX_PALLET_ITERATIONS,
            |value| value > 0,
            "must be greater than 0",
            None,
        );

        let max_attempts_per_pallet = load_with_warning(
            Self::MAX_ATTEMPTS_VAR,
            PackingConfig::DEFAULT_MAX_ATTEMPTS_PER_PALLET,
            |value| value > 0,
            "must be greater than 0",
            None,
        );

        let max_units = load_with_warning(
            Self::MAX_UNITS_VAR,
            PackingConfig::DEFAULT_MAX_UNITS,
            |value| value > 0,
            "must be greater than 0",
            Some("Adjusted unit limit changes the largest manifest a request may carry"),
        );

        let default_pallet = match env_string(Self::DEFAULT_PALLET_VAR) {
            Some(raw) => raw.parse::<PalletKind>().unwrap_or_else(|err| {
                warn!(
                    "{} ('{}'): {}. Using {}.",
                    Self::DEFAULT_PALLET_VAR,
                    raw,
                    err,
                    PalletKind::default()
                );
                PalletKind::default()
            }),
            None => PalletKind::default(),
        };

        let role_rules_path = env_string(Self::ROLE_RULES_VAR).map(PathBuf::from);
        let role_rules = match &role_rules_path {
            Some(path) => match RoleRuleTable::load(path) {
                Ok(table) => {
                    info!(rules = table.len(), path = %path.display(), "role rule table loaded");
                    table
                }
                Err(err) => {
                    warn!("{}. Continuing without role rules.", err);
                    RoleRuleTable::new()
                }
            },
            None => RoleRuleTable::new(),
        };

        let packing = PackingConfig::builder()
            .max_overhang(max_overhang)
            .max_stack_height(max_stack_height)
            .fragile_threshold(fragile_threshold)
            .max_pallet_iterations(max_pallet_iterations)
            .max_attempts_per_pallet(max_attempts_per_pallet)
            .max_units(max_units)
            .build();

        Self {
            packing,
            default_pallet,
            role_rules,
            role_rules_path,
        }
    }

    /// Settings with explicit values, bypassing the environment.
    pub fn new(packing: PackingConfig, default_pallet: PalletKind, role_rules: RoleRuleTable) -> Self {
        Self {
            packing,
            default_pallet,
            role_rules,
            role_rules_path: None,
        }
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }

    /// Pallet type used when a request names none.
    pub fn default_pallet(&self) -> PalletKind {
        self.default_pallet
    }

    pub fn role_rules(&self) -> &RoleRuleTable {
        &self.role_rules
    }

    /// File the role rules were loaded from, if any.
    pub fn role_rules_path(&self) -> Option<&PathBuf> {
        self.role_rules_path.as_ref()
    }
}

/// A stack limit has to leave room above every catalog deck.
fn is_valid_stack_height(value: f64) -> bool {
    value.is_finite() && value > PalletKind::tallest_deck_height()
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_or_default<T>(
    var_name: &str,
    raw: &str,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Copy + Display,
    T::Err: Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) if validator(value) => value,
        Ok(_) => {
            warn!(
                "{} contains invalid value '{}': {}. Using {}.",
                var_name, raw, invalid_hint, default
            );
            default
        }
        Err(err) => {
            warn!(
                "Could not parse {} ('{}'): {}. Using {}.",
                var_name, raw, err, default
            );
            default
        }
    }
}

fn load_with_warning<T>(
    var_name: &str,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
    changed_warning: Option<&str>,
) -> T
where
    T: FromStr + Copy + Display + PartialEq,
    T::Err: Display,
{
    let Some(raw) = env_string(var_name) else {
        return default;
    };
    let value = parse_or_default(var_name, &raw, default, validator, invalid_hint);
    if let Some(warning) = changed_warning {
        if value != default {
            warn!("{} ({} = {}).", warning, var_name, value);
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_valid_numbers() {
        assert_eq!(parse_or_default("TEST_VAR", "150", 200.0, |v| v >= 0.0, "hint"), 150.0);
        assert_eq!(parse_or_default("TEST_VAR", " 42 ", 1usize, |v| v > 0, "hint"), 42);
        assert_eq!(parse_or_default("TEST_VAR", "9", 7u8, |v| v <= 10, "hint"), 9);
    }

    #[test]
    fn test_parse_falls_back_on_invalid_values() {
        assert_eq!(parse_or_default("TEST_VAR", "-5", 200.0, |v| v >= 0.0, "hint"), 200.0);
        assert_eq!(parse_or_default("TEST_VAR", "abc", 200.0, |v| v >= 0.0, "hint"), 200.0);
        assert_eq!(parse_or_default("TEST_VAR", "0", 100usize, |v| v > 0, "hint"), 100);
        assert_eq!(parse_or_default("TEST_VAR", "11", 7u8, |v| v <= 10, "hint"), 7);
        assert_eq!(parse_or_default("TEST_VAR", "300", 7u8, |v| v <= 10, "hint"), 7);
    }

    #[test]
    fn test_stack_height_must_clear_every_deck() {
        assert_eq!(PalletKind::tallest_deck_height(), 150.0);
        assert!(is_valid_stack_height(1800.0));
        assert!(!is_valid_stack_height(150.0));
        assert!(!is_valid_stack_height(140.0));
        assert!(!is_valid_stack_height(f64::INFINITY));
        assert_eq!(
            parse_or_default("TEST_VAR", "120", 2300.0, is_valid_stack_height, "hint"),
            2300.0
        );
    }

    #[test]
    fn test_unset_variable_uses_default() {
        let value = load_with_warning(
            "AUTO_PALLET_TEST_SURELY_UNSET_VARIABLE",
            2300.0,
            |v| v > 0.0,
            "hint",
            Some("changed"),
        );
        assert_eq!(value, 2300.0);
    }

    #[test]
    fn test_engine_settings_default() {
        let settings = EngineSettings::default();
        assert_eq!(settings.default_pallet(), PalletKind::AuChep);
        assert_eq!(settings.packing_config(), PackingConfig::default());
        assert!(settings.role_rules().is_empty());
        assert!(settings.role_rules_path().is_none());
    }
}
