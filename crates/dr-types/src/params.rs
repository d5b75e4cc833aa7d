//! Sweep specifications and the run configurations they expand into.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single parameter value. Any JSON value may be swept.
pub type ParamValue = serde_json::Value;

/// Parameters that are not swept, applied underneath every run configuration.
pub type DefaultParams = BTreeMap<String, ParamValue>;

/// One swept parameter and its candidate values, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepParam {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Ordered set of swept parameters.
///
/// Declaration order matters: expansion varies the last-declared parameter
/// fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SweepSpec {
    params: Vec<SweepParam>,
}

impl SweepSpec {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Builder form of [`SweepSpec::insert`].
    pub fn param<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.insert(name, values.into_iter().map(Into::into).collect());
        self
    }

    /// Declare a parameter. Re-declaring a name replaces its values but keeps
    /// its original position.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<ParamValue>) {
        let name = name.into();
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.values = values,
            None => self.params.push(SweepParam { name, values }),
        }
    }

    pub fn params(&self) -> &[SweepParam] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of configurations in the full product, or `None` on overflow.
    pub fn grid_size(&self) -> Option<usize> {
        self.params
            .iter()
            .try_fold(1usize, |total, p| total.checked_mul(p.values.len()))
    }
}

impl From<Vec<SweepParam>> for SweepSpec {
    fn from(params: Vec<SweepParam>) -> Self {
        Self { params }
    }
}

/// A fully resolved parameter mapping for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunConfig(BTreeMap<String, ParamValue>);

impl RunConfig {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, ParamValue> {
        &self.0
    }

    pub fn into_inner(self) -> BTreeMap<String, ParamValue> {
        self.0
    }
}

impl From<BTreeMap<String, ParamValue>> for RunConfig {
    fn from(map: BTreeMap<String, ParamValue>) -> Self {
        Self(map)
    }
}
