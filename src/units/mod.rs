//! Units of work.
//!
//! A unit is one named, self-contained check. The engine only knows the
//! [`Unit`] interface: it hands each unit a [`UnitContext`] and never
//! interprets the records the unit appends. Units are looked up by name
//! in a [`UnitRegistry`] populated at startup.

mod http;
mod probes;

pub use http::{PageResponse, Probe};
pub use probes::{ApiUnit, FormsUnit, LoginUnit, NavigationUnit, SecurityUnit, SignupUnit};

use crate::analysis::ResultAggregator;
use crate::data::DataGenerator;
use crate::error::ResolutionFailure;
use crate::models::Record;
use crate::modes::PlanOptions;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything a unit receives for one invocation.
#[derive(Clone)]
pub struct UnitContext {
    /// Normalized target address.
    pub target: String,
    /// Shared store the unit appends its own records to.
    pub aggregator: Arc<ResultAggregator>,
    pub data: Arc<DataGenerator>,
    pub options: Arc<PlanOptions>,
}

impl UnitContext {
    pub fn record(&self, record: Record) {
        self.aggregator.append(record);
    }
}

/// A runnable check.
///
/// Returning `Err` (or panicking) is reported by the dispatcher as a
/// System failure record; the run continues with the next unit.
#[async_trait]
pub trait Unit: Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    async fn run(&self, ctx: UnitContext) -> anyhow::Result<()>;
}

/// Static name → unit mapping.
#[derive(Default, Clone)]
pub struct UnitRegistry {
    units: BTreeMap<String, Arc<dyn Unit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in probe unit.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SignupUnit));
        registry.register(Arc::new(LoginUnit));
        registry.register(Arc::new(NavigationUnit));
        registry.register(Arc::new(FormsUnit));
        registry.register(Arc::new(ApiUnit));
        registry.register(Arc::new(SecurityUnit));
        registry
    }

    /// Add a unit, replacing any unit registered under the same name.
    pub fn register(&mut self, unit: Arc<dyn Unit>) {
        self.units.insert(unit.name().to_string(), unit);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Unit>, ResolutionFailure> {
        self.units
            .get(name)
            .cloned()
            .ok_or_else(|| ResolutionFailure::new(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// `(name, description)` pairs in name order.
    pub fn describe(&self) -> Vec<(String, String)> {
        self.units
            .iter()
            .map(|(name, unit)| (name.clone(), unit.description().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
