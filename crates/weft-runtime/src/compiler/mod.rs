//! Graph compiler.
//!
//! The compiler takes root [`Node`]s and produces a [`CompiledGraph`] that
//! can be executed by the engine.
//!
//! # Compilation Process
//!
//! 1. **Validation**: every operation must come from the compiler's registry
//! 2. **Folding**: constant inputs of value-dependent operations are
//!    computed so their output types become known
//! 3. **Fusion**: chains matching a fusion pattern are replaced by one
//!    composite remote node, repeated until the roots stop changing
//! 4. **Graph Building**: the rewritten roots are indexed into a petgraph

mod compiled;
mod config;
mod fold;
mod fuse;

use std::collections::HashSet;
use std::sync::Arc;

pub use compiled::{CompileStats, CompiledGraph};
pub use config::{CompilerConfig, CompilerConfigBuilder};
pub use fuse::ANCHOR_INPUT;

use self::fold::Folder;
use self::fuse::Fuser;
use crate::graph::{Node, walk};
use crate::registry::Registry;
use crate::{Error, Result, TRACING_TARGET_COMPILER};

/// Rewrites node trees into compiled graphs.
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<Registry>,
    config: CompilerConfig,
}

impl Compiler {
    /// Creates a compiler over a frozen registry.
    ///
    /// Fails with [`Error::Config`] when `config` is out of range.
    pub fn new(registry: Arc<Registry>, config: CompilerConfig) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        Ok(Self { registry, config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Compiles a single root.
    pub fn compile(&self, root: &Node) -> Result<CompiledGraph> {
        self.compile_all(std::slice::from_ref(root))
    }

    /// Compiles several roots into one graph, sharing common sub-trees.
    ///
    /// Compilation is deterministic: the same roots always produce the same
    /// compiled roots. Pushdown failures never surface; the affected chain
    /// stays unfused.
    pub fn compile_all(&self, roots: &[Node]) -> Result<CompiledGraph> {
        self.validate(roots)?;

        let mut stats = CompileStats::default();
        let mut roots = roots.to_vec();

        if self.config.fold_constants {
            let mut folder = Folder::default();
            roots = roots.iter().map(|root| folder.fold(root)).collect();
            stats.folded = folder.folded;
        }

        if self.config.pushdown {
            let mut failed = HashSet::new();
            for pass in 1..=self.config.max_passes {
                let mut fuser = Fuser::new(&mut failed);
                let next: Vec<Node> = roots.iter().map(|root| fuser.fuse(root)).collect();
                stats.passes = pass;
                stats.fusions += fuser.fusions;
                stats.fallbacks += fuser.fallbacks;

                let changed = next != roots;
                roots = next;
                if !changed {
                    break;
                }
            }
        }

        let compiled = CompiledGraph::new(roots, stats);
        tracing::debug!(
            target: TRACING_TARGET_COMPILER,
            roots = compiled.roots().len(),
            nodes = compiled.node_count(),
            passes = stats.passes,
            fusions = stats.fusions,
            fallbacks = stats.fallbacks,
            folded = stats.folded,
            "compiled graph"
        );
        Ok(compiled)
    }

    /// Checks that every operation belongs to this compiler's registry.
    fn validate(&self, roots: &[Node]) -> Result<()> {
        for node in walk(roots) {
            let Some(op) = node.op() else { continue };
            if op.is_composite() {
                return Err(Error::InvalidGraph(format!(
                    "`{}` is already compiled",
                    op.name()
                )));
            }
            if !self.registry.contains(op) {
                return Err(Error::InvalidGraph(format!(
                    "operation `{}` is not registered with this compiler",
                    op.name()
                )));
            }
        }
        Ok(())
    }
}
