//! Fusion patterns of the run-tracking service.
//!
//! | Composite | Chain |
//! |---|---|
//! | `project-filteredCount` | `root-project → project-filteredRuns → count` |
//! | `project-runCount` | `project-runs → count` |
//! | `run-historyLineCount` | `run-history → count`, single run only |
//! | `project-limitedRuns` | `project-filteredRuns → limit` |
//!
//! Patterns are attached to their terminal operation and tried longest
//! first.

use weft_core::BoxedError;
use weft_runtime::registry::{
    ChainStep, CompositeSpec, FusionPattern, PushdownSpec, default_builder,
};

use crate::{TRACING_TARGET, types};

/// Largest page of runs the remote service returns for a limited query.
pub const MAX_REMOTE_LIMIT: u64 = 1_000;

/// Patterns terminated by `count`.
pub fn count() -> PushdownSpec {
    PushdownSpec::new()
        .with_pattern(FusionPattern::new(
            "project",
            "filteredCount",
            ["root-project", "project-filteredRuns", "count"],
        ))
        .with_pattern(FusionPattern::new("project", "runCount", ["project-runs", "count"]))
        .with_pattern(
            FusionPattern::new("run", "historyLineCount", ["run-history", "count"])
                .with_overload("run-history", types::run()),
        )
}

/// Patterns terminated by `limit`.
pub fn limit() -> PushdownSpec {
    PushdownSpec::new().with_pattern(
        FusionPattern::new("project", "limitedRuns", ["project-filteredRuns", "limit"])
            .with_builder(limited_runs),
    )
}

/// Fuses a limit into the run query when it fits in one page.
fn limited_runs(
    pattern: &FusionPattern,
    steps: &[ChainStep],
) -> Result<CompositeSpec, BoxedError> {
    let limit = steps
        .last()
        .and_then(|step| step.node().input("limit"))
        .and_then(|node| node.const_value())
        .and_then(|value| value.as_u64())
        .ok_or("`limit` must be a constant non-negative integer")?;

    if limit > MAX_REMOTE_LIMIT {
        tracing::trace!(
            target: TRACING_TARGET,
            limit,
            max = MAX_REMOTE_LIMIT,
            "limit exceeds remote page size"
        );
        return Err(
            format!("limit {limit} exceeds the remote page size {MAX_REMOTE_LIMIT}").into(),
        );
    }
    default_builder(pattern, steps)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;
    use weft_runtime::compiler::{Compiler, CompilerConfig};

    use super::*;
    use crate::Expr;

    fn filtered(limit: u64) -> Expr {
        let registry = Arc::new(crate::registry().unwrap());
        Expr::project(&registry, "shawn", "dsviz-demo")
            .unwrap()
            .filtered_runs(Value::Null, "-summary.a")
            .unwrap()
            .limit(limit)
            .unwrap()
    }

    #[test]
    fn test_count_patterns_longest_first() {
        let spec = count();
        let names: Vec<_> = spec.patterns().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            ["project-filteredCount", "project-runCount", "run-historyLineCount"]
        );
    }

    #[test]
    fn test_small_limit_fuses() {
        let expr = filtered(2);
        let compiler = Compiler::new(expr.registry().clone(), CompilerConfig::default()).unwrap();
        let compiled = compiler.compile(expr.node()).unwrap();

        let composites: Vec<_> = compiled.composites().map(|n| n.name().to_owned()).collect();
        assert_eq!(composites, ["project-limitedRuns"]);
        assert_eq!(compiled.stats().fallbacks, 0);
    }

    #[test]
    fn test_large_limit_falls_back() {
        let expr = filtered(MAX_REMOTE_LIMIT + 1);
        let compiler = Compiler::new(expr.registry().clone(), CompilerConfig::default()).unwrap();
        let compiled = compiler.compile(expr.node()).unwrap();

        assert_eq!(compiled.composites().count(), 0);
        assert_eq!(compiled.stats().fallbacks, 1);
        assert_eq!(compiled.roots()[0], *expr.node());
    }

    #[test]
    fn test_history_count_fuses_for_single_run_only() {
        let registry = Arc::new(crate::registry().unwrap());
        let compiler = Compiler::new(registry.clone(), CompilerConfig::default()).unwrap();
        let project = Expr::project(&registry, "shawn", "dsviz-demo").unwrap();
        let composites = |expr: Expr| -> Vec<String> {
            let compiled = compiler.compile(expr.node()).unwrap();
            compiled.composites().map(|n| n.name().to_owned()).collect()
        };

        let single = project.run("fresh-sun-1").unwrap().history().unwrap().count().unwrap();
        assert_eq!(composites(single), ["run-historyLineCount"]);

        let listed = project.runs().unwrap().history().unwrap().count().unwrap();
        assert!(composites(listed).is_empty());
    }
}
