//! Cartesian expansion of a [`SweepSpec`] into run configurations.

use dr_types::{invalid_spec, DefaultParams, DrResult, RunConfig, SweepSpec};
use std::collections::HashSet;
use tracing::debug;

/// Deterministic grid expander.
///
/// Configurations are produced in row-major product order: the last-declared
/// parameter varies fastest. Each configuration is the defaults overlaid with
/// one product tuple. Identity is positional; equal configurations are not
/// merged.
#[derive(Debug, Clone)]
pub struct Sweeper {
    spec: SweepSpec,
    defaults: DefaultParams,
    len: usize,
}

impl Sweeper {
    pub fn new(spec: SweepSpec, defaults: DefaultParams) -> DrResult<Self> {
        let mut seen = HashSet::new();
        let mut len: usize = 1;
        for param in spec.params() {
            if !seen.insert(param.name.as_str()) {
                return Err(invalid_spec!(param.name, "parameter declared more than once"));
            }
            if param.values.is_empty() {
                return Err(invalid_spec!(param.name, "value list is empty"));
            }
            len = len.checked_mul(param.values.len()).ok_or_else(|| {
                invalid_spec!(param.name, "grid size overflows at this parameter")
            })?;
        }

        debug!(
            params = spec.len(),
            defaults = defaults.len(),
            configs = len,
            "expanded sweep grid"
        );

        Ok(Self {
            spec,
            defaults,
            len,
        })
    }

    /// Number of configurations in the sweep.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Never true: an empty spec still yields the defaults once.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn spec(&self) -> &SweepSpec {
        &self.spec
    }

    pub fn defaults(&self) -> &DefaultParams {
        &self.defaults
    }

    /// The `index`-th configuration, computed directly from its mixed-radix
    /// digits.
    pub fn config_at(&self, index: usize) -> Option<RunConfig> {
        if index >= self.len {
            return None;
        }
        Some(self.build(index))
    }

    fn build(&self, index: usize) -> RunConfig {
        let mut merged = self.defaults.clone();
        let mut remainder = index;
        for param in self.spec.params().iter().rev() {
            let radix = param.values.len();
            merged.insert(param.name.clone(), param.values[remainder % radix].clone());
            remainder /= radix;
        }
        RunConfig::from(merged)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = RunConfig> + '_ {
        (0..self.len).map(move |i| self.build(i))
    }

    pub fn configs(&self) -> Vec<RunConfig> {
        self.iter().collect()
    }
}

/// Expand `spec` over `defaults` in one call.
pub fn expand(spec: SweepSpec, defaults: DefaultParams) -> DrResult<Vec<RunConfig>> {
    Ok(Sweeper::new(spec, defaults)?.configs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_types::{DrError, SweepParam};
    use serde_json::json;

    fn defaults(pairs: &[(&str, serde_json::Value)]) -> DefaultParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn as_json(configs: &[RunConfig]) -> Vec<serde_json::Value> {
        configs
            .iter()
            .map(|c| serde_json::to_value(c).unwrap())
            .collect()
    }

    #[test]
    fn expands_in_row_major_order_over_defaults() {
        let spec = SweepSpec::new().param("x", [1, 4]).param("y", [3, 4]);
        let configs = expand(spec, defaults(&[("z", json!(10))])).unwrap();

        assert_eq!(
            as_json(&configs),
            vec![
                json!({"x": 1, "y": 3, "z": 10}),
                json!({"x": 1, "y": 4, "z": 10}),
                json!({"x": 4, "y": 3, "z": 10}),
                json!({"x": 4, "y": 4, "z": 10}),
            ]
        );
    }

    #[test]
    fn produces_product_of_list_lengths() {
        let spec = SweepSpec::new()
            .param("a", [1, 2, 3])
            .param("b", ["u", "v"])
            .param("c", [true, false])
            .param("d", [0.1]);
        let sweeper = Sweeper::new(spec, DefaultParams::new()).unwrap();
        assert_eq!(sweeper.len(), 12);

        let configs = sweeper.configs();
        assert_eq!(configs.len(), 12);
        let unique: HashSet<String> = configs
            .iter()
            .map(|c| serde_json::to_string(c).unwrap())
            .collect();
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn sweep_values_override_defaults() {
        let spec = SweepSpec::new().param("lr", [0.1, 0.01]);
        let configs = expand(
            spec,
            defaults(&[("lr", json!(1.0)), ("epochs", json!(5))]),
        )
        .unwrap();

        assert_eq!(configs[0].get("lr"), Some(&json!(0.1)));
        assert_eq!(configs[1].get("lr"), Some(&json!(0.01)));
        assert!(configs.iter().all(|c| c.get("epochs") == Some(&json!(5))));
    }

    #[test]
    fn empty_spec_yields_defaults_once() {
        let d = defaults(&[("seed", json!(0))]);
        let configs = expand(SweepSpec::new(), d.clone()).unwrap();
        assert_eq!(configs, vec![RunConfig::from(d)]);
    }

    #[test]
    fn empty_value_list_is_invalid() {
        let spec = SweepSpec::new().param("x", [1]).param("y", Vec::<i32>::new());
        match Sweeper::new(spec, DefaultParams::new()) {
            Err(DrError::InvalidSpec { key, .. }) => assert_eq!(key, "y"),
            other => panic!("expected InvalidSpec, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_from_deserialized_specs_are_invalid() {
        let spec = SweepSpec::from(vec![
            SweepParam {
                name: "x".into(),
                values: vec![json!(1)],
            },
            SweepParam {
                name: "x".into(),
                values: vec![json!(2)],
            },
        ]);
        assert!(matches!(
            Sweeper::new(spec, DefaultParams::new()),
            Err(DrError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn repeated_values_are_not_deduplicated() {
        let spec = SweepSpec::new().param("seed", [7, 7]);
        let configs = expand(spec, DefaultParams::new()).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0], configs[1]);
    }

    #[test]
    fn expansion_is_idempotent() {
        let spec = SweepSpec::new()
            .param("env", ["hopper", "walker", "ant"])
            .param("seed", [1, 2]);
        let d = defaults(&[("steps", json!(1000))]);
        let first = expand(spec.clone(), d.clone()).unwrap();
        let second = expand(spec, d).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn config_at_matches_iteration_and_stops_at_len() {
        let spec = SweepSpec::new().param("a", [1, 2]).param("b", [3, 4, 5]);
        let sweeper = Sweeper::new(spec, DefaultParams::new()).unwrap();
        for (i, config) in sweeper.iter().enumerate() {
            assert_eq!(sweeper.config_at(i), Some(config));
        }
        assert_eq!(sweeper.config_at(sweeper.len()), None);
    }
}
