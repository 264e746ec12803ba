//! Mode resolution.
//!
//! Maps a requested mode name onto a concrete [`ExecutionPlan`]: an
//! ordered list of unit names plus the option bag those units consume.
//! Resolution is pure. Unknown mode names never fail; they resolve to
//! the `full` plan so the caller is never blocked.

use crate::error::ResolutionFailure;
use crate::units::UnitRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Built-in unit names.
pub mod unit {
    pub const SIGNUP: &str = "signup";
    pub const LOGIN: &str = "login";
    pub const NAVIGATION: &str = "navigation";
    pub const FORMS: &str = "forms";
    pub const API: &str = "api";
    pub const SECURITY: &str = "security";
}

/// Option keys understood by the built-in units.
pub mod option {
    pub const SHORT_TIMEOUT: &str = "shortTimeout";
    pub const SKIP_VALIDATION: &str = "skipValidation";
    pub const MAX_RESULTS: &str = "maxResults";
}

/// Mode used for unknown names.
pub const FALLBACK_MODE: &str = "full";

/// Mode label given to plans built from an explicit unit list.
pub const CUSTOM_MODE: &str = "custom";

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Option bag handed to every unit of a plan. The orchestrator never
/// reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanOptions(BTreeMap<String, OptionValue>);

impl PlanOptions {
    pub fn with(mut self, key: &str, value: OptionValue) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    /// Boolean flag; absent or non-boolean values read as `false`.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(OptionValue::Bool(true)))
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(OptionValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }
}

/// Concrete unit list and options resolved from a mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Canonical mode name (`custom` for explicit unit lists).
    pub mode: String,
    /// Unique unit names in execution order.
    pub units: Vec<String>,
    pub options: PlanOptions,
    /// True when the requested mode was unknown and `full` was used.
    pub fallback: bool,
}

impl ExecutionPlan {
    /// Append `name` if the plan does not already contain it.
    pub fn ensure_unit(&mut self, name: &str) {
        if !self.units.iter().any(|u| u == name) {
            self.units.push(name.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

struct ModeEntry {
    name: &'static str,
    aliases: &'static [&'static str],
    units: &'static [&'static str],
    short_timeout: bool,
    skip_validation: bool,
    max_results: Option<i64>,
}

const MODES: &[ModeEntry] = &[
    ModeEntry {
        name: "smoke",
        aliases: &[],
        units: &[unit::NAVIGATION, unit::FORMS],
        short_timeout: true,
        skip_validation: true,
        max_results: Some(3),
    },
    ModeEntry {
        name: "fast",
        aliases: &["quick"],
        units: &[unit::LOGIN, unit::NAVIGATION, unit::FORMS],
        short_timeout: true,
        skip_validation: false,
        max_results: Some(5),
    },
    ModeEntry {
        name: "integration",
        aliases: &[],
        units: &[unit::API],
        short_timeout: false,
        skip_validation: false,
        max_results: Some(10),
    },
    ModeEntry {
        name: FALLBACK_MODE,
        aliases: &["e2e"],
        units: &[
            unit::SIGNUP,
            unit::LOGIN,
            unit::NAVIGATION,
            unit::FORMS,
            unit::API,
            unit::SECURITY,
        ],
        short_timeout: false,
        skip_validation: false,
        max_results: None,
    },
];

impl ModeEntry {
    fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }

    fn options(&self) -> PlanOptions {
        let options = PlanOptions::default()
            .with(option::SHORT_TIMEOUT, OptionValue::Bool(self.short_timeout))
            .with(option::SKIP_VALIDATION, OptionValue::Bool(self.skip_validation));
        match self.max_results {
            Some(max) => options.with(option::MAX_RESULTS, OptionValue::Int(max)),
            None => options,
        }
    }

    fn plan(&self, fallback: bool) -> ExecutionPlan {
        ExecutionPlan {
            mode: self.name.to_string(),
            units: self.units.iter().map(|u| u.to_string()).collect(),
            options: self.options(),
            fallback,
        }
    }
}

fn fallback_entry() -> &'static ModeEntry {
    MODES
        .iter()
        .find(|m| m.name == FALLBACK_MODE)
        .unwrap_or(&MODES[MODES.len() - 1])
}

/// Canonical names of every known mode.
pub fn mode_names() -> Vec<&'static str> {
    MODES.iter().map(|m| m.name).collect()
}

/// Resolve a mode name into an execution plan.
///
/// Lookup is case-insensitive and ignores surrounding whitespace. Unknown
/// names resolve to the `full` plan with `fallback` set.
pub fn resolve(mode: &str) -> ExecutionPlan {
    let key = mode.trim().to_lowercase();

    match MODES.iter().find(|m| m.matches(&key)) {
        Some(entry) => {
            debug!("Resolved mode '{}' to {} units", entry.name, entry.units.len());
            entry.plan(false)
        }
        None => {
            warn!("Unknown mode '{}', falling back to '{}'", mode, FALLBACK_MODE);
            fallback_entry().plan(true)
        }
    }
}

/// Build a plan from an explicit unit subset, bypassing mode lookup.
///
/// Names missing from the registry are skipped and returned as
/// resolution failures; duplicates keep their first position. The plan
/// carries the `full` option bag.
pub fn resolve_units(
    names: &[String],
    registry: &UnitRegistry,
) -> (ExecutionPlan, Vec<ResolutionFailure>) {
    let mut units: Vec<String> = Vec::new();
    let mut skipped = Vec::new();

    for name in names {
        let name = name.trim();
        if name.is_empty() || units.iter().any(|u| u == name) {
            continue;
        }
        if registry.contains(name) {
            units.push(name.to_string());
        } else {
            warn!("Skipping unknown unit '{}'", name);
            skipped.push(ResolutionFailure::new(name));
        }
    }

    let plan = ExecutionPlan {
        mode: CUSTOM_MODE.to_string(),
        units,
        options: fallback_entry().options(),
        fallback: false,
    };

    (plan, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_mode_resolves_to_non_empty_plan() {
        for name in mode_names() {
            let plan = resolve(name);
            assert!(!plan.units.is_empty(), "mode {} has no units", name);
            assert_eq!(plan.mode, name);
            assert!(!plan.fallback);
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        for name in ["smoke", "fast", "integration", "full", "bogus"] {
            assert_eq!(resolve(name), resolve(name));
        }
    }

    #[test]
    fn test_returned_options_are_independent_copies() {
        let mut first = resolve("smoke");
        first.options = first.options.with(option::MAX_RESULTS, OptionValue::Int(99));
        first.units.clear();

        let second = resolve("smoke");
        assert_eq!(second.options.int(option::MAX_RESULTS), Some(3));
        assert_eq!(second.units.len(), 2);
    }

    #[test]
    fn test_unknown_mode_falls_back_to_full() {
        for name in ["", "nonsense", "SMOKEY", "🚀"] {
            let plan = resolve(name);
            assert_eq!(plan.mode, FALLBACK_MODE);
            assert!(plan.fallback);
            assert_eq!(plan.units, resolve("full").units);
        }
    }

    #[test]
    fn test_aliases_and_case() {
        assert_eq!(resolve("quick").mode, "fast");
        assert_eq!(resolve(" E2E ").mode, "full");
        assert_eq!(resolve("Smoke").mode, "smoke");
    }

    #[test]
    fn test_smoke_options() {
        let plan = resolve("smoke");
        assert!(plan.options.flag(option::SHORT_TIMEOUT));
        assert!(plan.options.flag(option::SKIP_VALIDATION));
        assert_eq!(plan.options.int(option::MAX_RESULTS), Some(3));
    }

    #[test]
    fn test_full_has_no_result_cap() {
        let plan = resolve("full");
        assert!(!plan.options.flag(option::SHORT_TIMEOUT));
        assert_eq!(plan.options.int(option::MAX_RESULTS), None);
    }

    #[test]
    fn test_ensure_unit_appends_once() {
        let mut plan = resolve("smoke");
        plan.ensure_unit(unit::API);
        plan.ensure_unit(unit::API);
        assert_eq!(plan.units.last().map(String::as_str), Some(unit::API));
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_resolve_units_skips_unknown() {
        let registry = UnitRegistry::builtin();
        let names = vec![
            "login".to_string(),
            "checkout".to_string(),
            "login".to_string(),
            "api".to_string(),
        ];

        let (plan, skipped) = resolve_units(&names, &registry);

        assert_eq!(plan.mode, CUSTOM_MODE);
        assert_eq!(plan.units, vec!["login", "api"]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].name, "checkout");
    }
}
