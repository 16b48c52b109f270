//! Product-specific stacking rules keyed by product and role.
//!
//! A rule only carries the fields it overrides; everything else keeps the
//! value from the box line. Tables come from a JSON file (a list of rules)
//! or from the request body.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::{BoxSpec, GroupKey, GroupPriority, ValidationError};

/// Overrides for one product-role group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoleRule {
    pub product_id: String,
    #[serde(default)]
    pub role_index: u32,
    #[serde(default)]
    pub no_stack_above: Option<bool>,
    #[serde(default)]
    pub fragile_weight_limit: Option<f64>,
    #[serde(default)]
    pub can_stand_on_edge: Option<bool>,
    #[serde(default)]
    pub group_priority: Option<GroupPriority>,
}

impl RoleRule {
    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.product_id.clone(), self.role_index)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.product_id.trim().is_empty() {
            return Err(ValidationError::InvalidConfiguration(
                "role rule without product_id".to_string(),
            ));
        }
        if let Some(limit) = self.fragile_weight_limit {
            if limit < 0.0 || !limit.is_finite() {
                return Err(ValidationError::InvalidWeight(format!(
                    "fragile weight limit for {} must be a non-negative number, got: {}",
                    self.key(),
                    limit
                )));
            }
        }
        Ok(())
    }

    /// Writes the overridden fields into `spec`.
    pub fn apply_to(&self, spec: &mut BoxSpec) {
        if let Some(value) = self.no_stack_above {
            spec.no_stack_above = value;
        }
        if let Some(value) = self.fragile_weight_limit {
            spec.fragile_weight_limit = Some(value);
        }
        if let Some(value) = self.can_stand_on_edge {
            spec.can_stand_on_edge = value;
        }
        if let Some(value) = self.group_priority {
            spec.group_priority = value;
        }
    }
}

/// Error while loading a rule table.
#[derive(Debug, Error)]
pub enum RuleTableError {
    #[error("could not read role rule table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse role rule table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Role rules indexed by group; later rules for the same group win.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoleRuleTable {
    rules: BTreeMap<GroupKey, RoleRule>,
}

impl RoleRuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: impl IntoIterator<Item = RoleRule>) -> Result<Self, ValidationError> {
        let mut table = Self::new();
        for rule in rules {
            table.insert(rule)?;
        }
        Ok(table)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, RuleTableError> {
        let rules: Vec<RoleRule> = serde_json::from_str(raw)?;
        Ok(Self::from_rules(rules)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuleTableError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| RuleTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn insert(&mut self, rule: RoleRule) -> Result<(), ValidationError> {
        rule.validate()?;
        self.rules.insert(rule.key(), rule);
        Ok(())
    }

    /// Table with the rules of `other` layered over these.
    pub fn merged(&self, other: &RoleRuleTable) -> Self {
        let mut rules = self.rules.clone();
        rules.extend(other.rules.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { rules }
    }

    pub fn get(&self, key: &GroupKey) -> Option<&RoleRule> {
        self.rules.get(key)
    }

    /// Applies the rule of the spec's group, if any.
    pub fn apply(&self, spec: &mut BoxSpec) {
        let key = GroupKey::new(spec.product_id.clone(), spec.role_index);
        if let Some(rule) = self.rules.get(&key) {
            rule.apply_to(spec);
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
