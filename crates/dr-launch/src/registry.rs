//! Named methods a run can execute.
//!
//! A method is identified by name on both sides of the wire. The launching
//! side and the executing side each build a [`MethodRegistry`]; reference
//! encoded arguments only decode when both registries agree on the name.

use anyhow::{anyhow, bail, Context};
use dr_types::{DrError, DrResult, LaunchContext, MethodCall, RunConfig, SHELL_METHOD};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Environment variable exposing the run's output directory to shell methods.
pub const OUTPUT_DIR_ENV: &str = "DROVER_OUTPUT_DIR";

/// A computation executed once per run.
pub trait Method: Send + Sync {
    fn call(&self, ctx: &LaunchContext, config: &RunConfig, state: &Value) -> anyhow::Result<()>;
}

impl<F> Method for F
where
    F: Fn(&LaunchContext, &RunConfig, &Value) -> anyhow::Result<()> + Send + Sync,
{
    fn call(&self, ctx: &LaunchContext, config: &RunConfig, state: &Value) -> anyhow::Result<()> {
        self(ctx, config, state)
    }
}

#[derive(Clone)]
struct Registered {
    method: Arc<dyn Method>,
    state: Value,
}

#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Registered>,
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("MethodRegistry").field("methods", &names).finish()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `shell` method.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(SHELL_METHOD, ShellMethod);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, method: impl Method + 'static) -> &mut Self {
        self.register_with_state(name, Value::Null, method)
    }

    /// Register a method together with the state it runs with when resolved
    /// by name alone.
    pub fn register_with_state(
        &mut self,
        name: impl Into<String>,
        state: Value,
        method: impl Method + 'static,
    ) -> &mut Self {
        self.methods.insert(
            name.into(),
            Registered {
                method: Arc::new(method),
                state,
            },
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// The call a bare name stands for: the method with its registered state.
    pub fn resolve(&self, name: &str) -> DrResult<MethodCall> {
        let registered = self.lookup(name)?;
        Ok(MethodCall::new(name).with_state(registered.state.clone()))
    }

    /// Run `call` to completion on the current thread.
    pub fn invoke(&self, call: &MethodCall, ctx: &LaunchContext, config: &RunConfig) -> DrResult<()> {
        let registered = self.lookup(&call.name)?;
        registered
            .method
            .call(ctx, config, &call.state)
            .map_err(|e| DrError::Method(format!("{}: {e:#}", call.name)))
    }

    fn lookup(&self, name: &str) -> DrResult<&Registered> {
        self.methods.get(name).ok_or_else(|| DrError::UnknownMethod {
            name: name.to_string(),
        })
    }
}

/// Runs `state.command` through `sh -c` after substituting `{param}`
/// placeholders from the run config and `{output_dir}` from the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellMethod;

impl Method for ShellMethod {
    fn call(&self, ctx: &LaunchContext, config: &RunConfig, state: &Value) -> anyhow::Result<()> {
        let template = state
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("shell method state needs a string `command`"))?;
        let command = render_command(template, config, &ctx.output_directory);

        info!(command = %command, output_dir = %ctx.output_directory, "running shell method");
        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .env(OUTPUT_DIR_ENV, &ctx.output_directory)
            .status()
            .with_context(|| format!("failed to start `{command}`"))?;

        if !status.success() {
            bail!("`{command}` exited with {status}");
        }
        Ok(())
    }
}

/// Substitute `{name}` for every run parameter and `{output_dir}`.
///
/// Single left-to-right pass over the template: inserted text is never
/// scanned again. String values are inserted bare, everything else as JSON.
/// Unknown placeholders are left as written.
pub fn render_command(template: &str, config: &RunConfig, output_dir: &str) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            rest = &rest[open..];
            break;
        };
        let name = &after[..close];
        if name.contains('{') {
            rendered.push('{');
            rest = after;
            continue;
        }

        if name == "output_dir" {
            rendered.push_str(output_dir);
        } else if let Some(value) = config.get(name) {
            match value {
                Value::String(s) => rendered.push_str(s),
                other => rendered.push_str(&other.to_string()),
            }
        } else {
            rendered.push_str(&rest[open..open + close + 2]);
        }
        rest = &after[close + 1..];
    }
    rendered.push_str(rest);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(pairs: &[(&str, Value)]) -> RunConfig {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>()
            .into()
    }

    #[test]
    fn renders_placeholders() {
        let cfg = config(&[("seed", json!(3)), ("env", json!("hopper")), ("lr", json!(0.5))]);
        let rendered = render_command(
            "train --env {env} --seed {seed} --lr {lr} --out {output_dir} {missing}",
            &cfg,
            "/output/run0",
        );
        assert_eq!(
            rendered,
            "train --env hopper --seed 3 --lr 0.5 --out /output/run0 {missing}"
        );
    }

    #[test]
    fn inserted_values_are_not_rendered_again() {
        let cfg = config(&[("a", json!("{b}")), ("b", json!("rm -rf x"))]);
        assert_eq!(render_command("echo {a}", &cfg, "/out"), "echo {b}");

        let cfg = config(&[("a", json!(1))]);
        assert_eq!(
            render_command("ls {output_dir} {a}", &cfg, "/out/{a}"),
            "ls /out/{a} 1"
        );
    }

    #[test]
    fn unbalanced_braces_are_kept() {
        let cfg = config(&[("a", json!("x"))]);
        assert_eq!(render_command("{{a} {a", &cfg, "/o"), "{x {a");
        assert_eq!(render_command("awk '{print $1}' {a}", &cfg, "/o"), "awk '{print $1}' x");
    }

    #[test]
    fn invoke_passes_state_and_config() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut registry = MethodRegistry::new();
        registry.register("count", move |_: &LaunchContext, cfg: &RunConfig, state: &Value| -> anyhow::Result<()> {
            assert_eq!(cfg.get("x"), Some(&json!(1)));
            seen.fetch_add(state["step"].as_u64().unwrap_or(0) as usize, Ordering::SeqCst);
            Ok(())
        });

        let call = MethodCall::new("count").with_state(json!({"step": 5}));
        registry
            .invoke(&call, &LaunchContext::new("/out"), &config(&[("x", json!(1))]))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn unknown_method_is_reported_by_name() {
        let registry = MethodRegistry::with_builtins();
        let err = registry
            .invoke(&MethodCall::new("nope"), &LaunchContext::new("/o"), &RunConfig::default())
            .unwrap_err();
        assert!(matches!(err, DrError::UnknownMethod { name } if name == "nope"));
    }

    #[test]
    fn method_failure_becomes_method_error() {
        let mut registry = MethodRegistry::new();
        registry.register("boom", |_: &LaunchContext, _: &RunConfig, _: &Value| -> anyhow::Result<()> {
            Err(anyhow!("diverged"))
        });
        let err = registry
            .invoke(&MethodCall::new("boom"), &LaunchContext::new("/o"), &RunConfig::default())
            .unwrap_err();
        assert!(matches!(&err, DrError::Method(msg) if msg.contains("boom") && msg.contains("diverged")));
    }

    #[test]
    fn resolve_returns_registered_state() {
        let mut registry = MethodRegistry::new();
        registry.register_with_state(
            "train",
            json!({"epochs": 3}),
            |_: &LaunchContext, _: &RunConfig, _: &Value| -> anyhow::Result<()> { Ok(()) },
        );
        assert_eq!(
            registry.resolve("train").unwrap(),
            MethodCall::new("train").with_state(json!({"epochs": 3}))
        );
    }

    #[cfg(unix)]
    #[test]
    fn shell_method_writes_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = LaunchContext::new(dir.path().to_string_lossy());
        let call = MethodCall::shell("echo sum={x} > \"$DROVER_OUTPUT_DIR/out.txt\"");

        MethodRegistry::with_builtins()
            .invoke(&call, &ctx, &config(&[("x", json!(15))]))
            .unwrap();
        let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(written.trim(), "sum=15");
    }

    #[cfg(unix)]
    #[test]
    fn shell_method_fails_on_nonzero_exit() {
        let call = MethodCall::shell("exit 3");
        let err = MethodRegistry::with_builtins()
            .invoke(&call, &LaunchContext::new("/tmp"), &RunConfig::default())
            .unwrap_err();
        assert!(matches!(err, DrError::Method(_)));
    }
}
