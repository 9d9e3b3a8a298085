//! Graph execution engine.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tokio::sync::Semaphore;
use uuid::Uuid;
use weft_core::{Resolved, Type};

use super::cache::{CacheStats, NodeResult, ResultCache};
use super::{CacheScope, EngineConfig};
use crate::compiler::{ANCHOR_INPUT, CompiledGraph, Compiler};
use crate::error::{Error, EvaluationError, Result};
use crate::graph::{Node, NodeKind};
use crate::publish::Publisher;
use crate::registry::{Args, CompositeSpec, Operation, OperationKind, Registry};
use crate::remote::{CallStep, CompositeCall, RemoteExecutor};
use crate::TRACING_TARGET_ENGINE;

struct EngineInner {
    config: EngineConfig,
    compiler: Compiler,
    remote: Arc<dyn RemoteExecutor>,
    cache: Arc<ResultCache>,
    semaphore: Semaphore,
}

/// The graph execution engine.
///
/// Compiles node trees, evaluates them bottom-up with concurrent inputs and
/// memoizes results by structural digest. Remote nodes are dispatched to the
/// [`RemoteExecutor`]; everything else runs in process. Cloning an engine
/// shares its cache.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
    publisher: Option<Arc<dyn Publisher>>,
}

impl Engine {
    /// Creates a new engine.
    ///
    /// Fails with [`Error::Config`] when `config` is out of range, which
    /// happens only for deserialized configurations.
    pub fn new(
        registry: Arc<Registry>,
        remote: Arc<dyn RemoteExecutor>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        tracing::info!(
            target: TRACING_TARGET_ENGINE,
            operations = registry.len(),
            cache_scope = %config.cache_scope,
            max_concurrent_remote_calls = config.max_concurrent_remote_calls,
            pushdown = config.compiler.pushdown,
            "engine initialized"
        );

        let inner = EngineInner {
            compiler: Compiler::new(registry, config.compiler.clone())?,
            semaphore: Semaphore::new(config.max_concurrent_remote_calls),
            cache: Arc::new(ResultCache::default()),
            remote,
            config,
        };
        Ok(Self {
            inner: Arc::new(inner),
            publisher: None,
        })
    }

    /// Attaches the publication collaborator.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns the registry nodes must be built from.
    pub fn registry(&self) -> &Arc<Registry> {
        self.inner.compiler.registry()
    }

    /// Compiles roots with the engine's compiler configuration.
    pub fn compile(&self, roots: &[Node]) -> Result<CompiledGraph> {
        self.inner.compiler.compile_all(roots)
    }

    /// Compiles and evaluates a single node.
    pub async fn evaluate(&self, node: &Node) -> Result<Resolved> {
        let compiled = self.inner.compiler.compile(node)?;
        let mut results = self.execute(&compiled).await;
        match results.pop() {
            Some(result) => Ok(result?),
            None => Err(Error::Internal("compiled graph has no root".into())),
        }
    }

    /// Compiles and evaluates several roots.
    ///
    /// Returns one result per root, in order. Roots fail independently.
    pub async fn evaluate_many(&self, nodes: &[Node]) -> Result<Vec<NodeResult>> {
        let compiled = self.inner.compiler.compile_all(nodes)?;
        Ok(self.execute(&compiled).await)
    }

    /// Evaluates the roots of a compiled graph.
    pub async fn execute(&self, compiled: &CompiledGraph) -> Vec<NodeResult> {
        let session = Session::new(self.inner.clone());
        tracing::debug!(
            target: TRACING_TARGET_ENGINE,
            session = %session.id,
            roots = compiled.roots().len(),
            nodes = compiled.node_count(),
            "evaluating graph"
        );

        let results = join_all(
            compiled
                .roots()
                .iter()
                .map(|root| session.resolve(root.clone())),
        )
        .await;

        tracing::debug!(
            target: TRACING_TARGET_ENGINE,
            session = %session.id,
            failed = results.iter().filter(|r| r.is_err()).count(),
            "evaluated graph"
        );
        results
    }

    /// Evaluates `node` and publishes its value under `name`.
    ///
    /// Returns the content-addressed reference of the published value.
    pub async fn publish(&self, node: &Node, name: &str) -> Result<String> {
        let Some(publisher) = &self.publisher else {
            return Err(Error::Publish(
                weft_core::Error::unsupported().with_message("no publisher configured"),
            ));
        };

        let resolved = self.evaluate(node).await?;
        let reference = publisher
            .publish(name, resolved.value())
            .await
            .map_err(Error::Publish)?;

        tracing::debug!(
            target: TRACING_TARGET_ENGINE,
            name,
            digest = %node.digest().short(),
            reference = %reference,
            "published value"
        );
        Ok(reference)
    }

    /// Returns the counters of the process cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Drops every entry of the process cache.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("publisher", &self.publisher.is_some())
            .finish_non_exhaustive()
    }
}

/// State of one `execute` call.
#[derive(Clone)]
struct Session {
    id: Uuid,
    inner: Arc<EngineInner>,
    cache: Option<Arc<ResultCache>>,
}

impl Session {
    fn new(inner: Arc<EngineInner>) -> Self {
        let cache = match inner.config.cache_scope {
            CacheScope::Process => Some(inner.cache.clone()),
            CacheScope::Request => Some(Arc::new(ResultCache::default())),
            CacheScope::Disabled => None,
        };
        Self {
            id: Uuid::now_v7(),
            inner,
            cache,
        }
    }

    /// Resolves `node` through the cache.
    fn resolve(&self, node: Node) -> BoxFuture<'static, NodeResult> {
        if let NodeKind::Const { value } = node.kind() {
            let resolved = Resolved::new(value.clone(), node.output_type().clone());
            return futures::future::ready(Ok(resolved)).boxed();
        }

        match &self.cache {
            Some(cache) => {
                let session = self.clone();
                let key = node.clone();
                cache.get_or_compute(&key, move || session.compute(node))
            }
            None => self.clone().compute(node),
        }
    }

    /// Evaluates the inputs of `node`, then the node itself.
    fn compute(self, node: Node) -> BoxFuture<'static, NodeResult> {
        async move {
            let NodeKind::Output { op, inputs } = node.kind() else {
                return Err(EvaluationError::internal(&node, "constant reached compute"));
            };

            let results = join_all(inputs.values().map(|input| self.resolve(input.clone()))).await;
            let mut args = Vec::with_capacity(inputs.len());
            for ((param, _), result) in inputs.iter().zip(results) {
                match result {
                    Ok(resolved) => args.push((param.to_owned(), resolved)),
                    Err(error) => return Err(EvaluationError::upstream(&node, error)),
                }
            }
            let args = Args::new(args);

            tracing::trace!(
                target: TRACING_TARGET_ENGINE,
                session = %self.id,
                op = %op.name(),
                digest = %node.digest().short(),
                "computing node"
            );

            match op.kind() {
                OperationKind::Local(implementation) => implementation(&args)
                    .map(|value| Resolved::new(value, node.output_type().clone()))
                    .map_err(|error| EvaluationError::operation(&node, error)),
                OperationKind::Remote { root } => {
                    let call = step_call(op, *root, &args);
                    self.call_remote(&node, call).await
                }
                OperationKind::Composite(spec) => {
                    let call = composite_call(spec, &args)
                        .map_err(|message| EvaluationError::internal(&node, message))?;
                    self.call_remote(&node, call).await
                }
            }
        }
        .boxed()
    }

    async fn call_remote(&self, node: &Node, call: CompositeCall) -> NodeResult {
        let _permit = self
            .inner
            .semaphore
            .acquire()
            .await
            .map_err(|e| EvaluationError::internal(node, format!("semaphore closed: {e}")))?;

        tracing::debug!(
            target: TRACING_TARGET_ENGINE,
            session = %self.id,
            call = %call.name,
            steps = call.steps.len(),
            fused = call.is_fused(),
            "calling remote"
        );

        let resolved = self
            .inner
            .remote
            .execute(call)
            .await
            .map_err(|error| EvaluationError::remote(node, error))?;
        Ok(retype(node, resolved))
    }
}

/// Describes a single remote step.
fn step_call(op: &Operation, root: bool, args: &Args<Resolved>) -> CompositeCall {
    let skip = usize::from(!root);
    let input = (!root)
        .then(|| args.first().map(|r| r.value().clone()))
        .flatten();
    let step_args: BTreeMap<_, _> = args
        .iter()
        .skip(skip)
        .map(|(param, resolved)| (param.to_owned(), resolved.value().clone()))
        .collect();

    CompositeCall {
        name: op.name().to_owned(),
        input,
        steps: vec![CallStep::new(op.name(), step_args)],
    }
}

/// Describes a fused chain, binding step arguments to the composite inputs.
fn composite_call(spec: &CompositeSpec, args: &Args<Resolved>) -> Result<CompositeCall, String> {
    let steps = spec
        .steps
        .iter()
        .map(|template| -> Result<CallStep, String> {
            let step_args = template
                .args
                .iter()
                .map(|arg| {
                    args.value(&arg.input)
                        .map(|value| (arg.param.clone(), value.clone()))
                        .ok_or_else(|| format!("composite input `{}` is missing", arg.input))
                })
                .collect::<Result<BTreeMap<_, _>, String>>()?;
            Ok(CallStep::new(template.op.as_str(), step_args))
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(CompositeCall {
        name: spec.name.clone(),
        input: args.value(ANCHOR_INPUT).cloned(),
        steps,
    })
}

/// Gives a remote result the node's declared type.
///
/// The declared payload type wins unless it is [`Type::Any`]; the declared
/// tags are always kept.
fn retype(node: &Node, resolved: Resolved) -> Resolved {
    let declared = node.output_type();
    if declared.untagged() != &Type::Any {
        return Resolved::new(resolved.into_value(), declared.clone());
    }

    let tags = declared.tags().cloned().unwrap_or_default();
    let ty = Type::tagged(tags, resolved.ty().untagged().clone());
    Resolved::new(resolved.into_value(), ty)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use crate::compiler::CompilerConfig;
    use crate::engine::EngineConfigBuilder;
    use crate::error::EvaluationCause;
    use crate::testing::{self, MockRemote};

    fn engine(remote: Arc<MockRemote>, config: EngineConfig) -> Engine {
        Engine::new(Arc::new(testing::registry()), remote, config).unwrap()
    }

    fn store_count(registry: &Registry, name: &str) -> Node {
        let store = Node::call(registry, "root-store", [("name", Node::from_value(json!(name)))])
            .unwrap();
        let items = Node::call(registry, "store-items", [("store", store)]).unwrap();
        Node::call(registry, "count", [("arr", items)]).unwrap()
    }

    fn add(registry: &Registry, lhs: Node, rhs: Node) -> Node {
        Node::call(registry, "number-add", [("lhs", lhs), ("rhs", rhs)]).unwrap()
    }

    #[tokio::test]
    async fn test_evaluates_local_graph() {
        let engine = engine(Arc::new(MockRemote::default()), EngineConfig::default());
        let registry = engine.registry();
        let sum = add(registry, Node::from_value(json!(1)), Node::from_value(json!(2)));
        let root = add(registry, sum.clone(), sum);

        let resolved = engine.evaluate(&root).await.unwrap();
        assert_eq!(resolved.value(), &json!(6));
        assert_eq!(resolved.ty(), &Type::Number);
    }

    #[tokio::test]
    async fn test_fused_call() {
        let remote = Arc::new(MockRemote::default());
        let engine = engine(remote.clone(), EngineConfig::default());
        let root = store_count(engine.registry(), "a");

        let resolved = engine.evaluate(&root).await.unwrap();
        assert_eq!(resolved.value(), &json!(3));

        let calls = remote.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "store-itemCount");
        assert_eq!(calls[0].input, None);
        assert_eq!(calls[0].steps[0].arg("name"), Some(&json!("a")));
    }

    #[tokio::test]
    async fn test_fusion_preserves_results() {
        let fused_remote = Arc::new(MockRemote::default());
        let fused = engine(fused_remote.clone(), EngineConfig::default());
        let plain_remote = Arc::new(MockRemote::default());
        let plain = engine(
            plain_remote.clone(),
            EngineConfigBuilder::default()
                .compiler(CompilerConfig::without_pushdown())
                .build()
                .unwrap(),
        );

        let a = fused.evaluate(&store_count(fused.registry(), "b")).await.unwrap();
        let b = plain.evaluate(&store_count(plain.registry(), "b")).await.unwrap();

        assert_eq!(a.value(), b.value());
        assert_eq!(a.ty(), b.ty());
        assert_eq!(fused_remote.calls().len(), 1);
        assert_eq!(plain_remote.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_cache_idempotence() {
        let remote = Arc::new(MockRemote::default());
        let engine = engine(remote.clone(), EngineConfig::default());
        let root = store_count(engine.registry(), "a");

        let first = engine.evaluate(&root).await.unwrap();
        let second = engine.evaluate(&root).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(remote.calls().len(), 1);
        assert!(engine.cache_stats().hits >= 1);

        engine.clear_cache();
        engine.evaluate(&root).await.unwrap();
        assert_eq!(remote.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_request_scope_does_not_share() {
        let remote = Arc::new(MockRemote::default());
        let config = EngineConfigBuilder::default()
            .cache_scope(CacheScope::Request)
            .build()
            .unwrap();
        let engine = engine(remote.clone(), config);
        let root = store_count(engine.registry(), "a");

        engine.evaluate(&root).await.unwrap();
        engine.evaluate(&root).await.unwrap();

        assert_eq!(remote.calls().len(), 2);
        assert_eq!(engine.cache_stats().entries, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_evaluations_run_once() {
        let remote = Arc::new(MockRemote::with_delay(std::time::Duration::from_millis(50)));
        let engine = engine(remote.clone(), EngineConfig::default());
        let root = store_count(engine.registry(), "a");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let root = root.clone();
                tokio::spawn(async move { engine.evaluate(&root).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().value(), &json!(3));
        }

        assert_eq!(remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_scope_computes_each_reference() {
        let remote = Arc::new(MockRemote::default());
        let config = EngineConfigBuilder::default()
            .cache_scope(CacheScope::Disabled)
            .build()
            .unwrap();
        let engine = engine(remote.clone(), config);
        let count = store_count(engine.registry(), "a");
        let root = add(engine.registry(), count.clone(), count);

        assert_eq!(engine.evaluate(&root).await.unwrap().value(), &json!(6));
        assert_eq!(remote.calls().len(), 2);
        assert_eq!(engine.cache_stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_process_scope_computes_shared_subtree_once() {
        let remote = Arc::new(MockRemote::default());
        let engine = engine(remote.clone(), EngineConfig::default());
        let count = store_count(engine.registry(), "a");
        let root = add(engine.registry(), count.clone(), count);

        assert_eq!(engine.evaluate(&root).await.unwrap().value(), &json!(6));
        assert_eq!(remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_evaluation_keeps_cache_usable() {
        let remote = Arc::new(MockRemote::with_delay(std::time::Duration::from_millis(50)));
        let engine = engine(remote.clone(), EngineConfig::default());
        let root = store_count(engine.registry(), "a");

        let dropped =
            tokio::time::timeout(std::time::Duration::from_millis(5), engine.evaluate(&root)).await;
        assert!(dropped.is_err());

        let resolved = engine.evaluate(&root).await.unwrap();
        assert_eq!(resolved.value(), &json!(3));
        assert_eq!(remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_deserialized_zero_concurrency() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"maxConcurrentRemoteCalls": 0}"#).unwrap();
        let err = Engine::new(Arc::new(testing::registry()), Arc::new(MockRemote::default()), config)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config: EngineConfig = serde_json::from_str(r#"{"compiler": {"maxPasses": 0}}"#).unwrap();
        let err = Engine::new(Arc::new(testing::registry()), Arc::new(MockRemote::default()), config)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_failure_carries_node_identity() {
        let engine = engine(Arc::new(MockRemote::default()), EngineConfig::default());
        let registry = engine.registry();
        let failing = Node::call(registry, "fail", [("message", Node::from_value(json!("boom")))])
            .unwrap();
        let parent = add(registry, failing.clone(), Node::from_value(json!(1)));

        let err = engine.evaluate(&parent).await.unwrap_err();
        let Error::Evaluation(err) = err else {
            panic!("expected an evaluation error");
        };
        assert_eq!(err.op, "number-add");
        assert!(err.is_upstream());
        assert_eq!(err.origin().op, "fail");
        assert_eq!(err.origin().digest, failing.digest());
        assert!(matches!(err.origin().cause, EvaluationCause::Operation(_)));
    }

    #[tokio::test]
    async fn test_sibling_survives_failure() {
        let engine = engine(Arc::new(MockRemote::default()), EngineConfig::default());
        let registry = engine.registry();
        let failing = Node::call(registry, "fail", [("message", Node::from_value(json!("boom")))])
            .unwrap();
        let sibling = add(registry, Node::from_value(json!(2)), Node::from_value(json!(3)));

        let results = engine.evaluate_many(&[failing, sibling]).await.unwrap();
        assert!(results[0].as_ref().is_err_and(|e| e.op == "fail"));
        assert_eq!(results[1].as_ref().unwrap().value(), &json!(5));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let remote = Arc::new(MockRemote::default());
        let engine = engine(remote.clone(), EngineConfig::default());
        let root = store_count(engine.registry(), "missing");

        assert!(engine.evaluate(&root).await.is_err());
        assert!(engine.evaluate(&root).await.is_err());
        assert_eq!(remote.calls().len(), 2);
        assert_eq!(engine.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_remote_failure_cause() {
        let engine = engine(Arc::new(MockRemote::default()), EngineConfig::default());
        let root = store_count(engine.registry(), "missing");

        let Err(Error::Evaluation(err)) = engine.evaluate(&root).await else {
            panic!("expected an evaluation error");
        };
        assert_eq!(err.op, "store-itemCount");
        assert!(matches!(err.cause, EvaluationCause::Remote(_)));
    }

    #[tokio::test]
    async fn test_tags_survive_evaluation() {
        let engine = engine(Arc::new(MockRemote::default()), EngineConfig::default());
        let registry = engine.registry();
        let tagged = |value: i64| {
            Node::call(
                registry,
                "tag-as",
                [
                    ("value", Node::from_value(json!(value))),
                    ("source", Node::from_value(json!("child"))),
                ],
            )
            .unwrap()
        };
        let (one, two) = (tagged(1), tagged(2));
        let parent = add(registry, one.clone(), two);

        let resolved = engine.evaluate(&parent).await.unwrap();
        assert_eq!(resolved.value(), &json!(3));
        assert_eq!(resolved.ty().tags(), one.output_type().tags());
        assert_eq!(resolved.ty().tags().map(|t| t["source"].clone()), Some(Type::String));
    }

    #[tokio::test]
    async fn test_publish_requires_publisher() {
        let engine = engine(Arc::new(MockRemote::default()), EngineConfig::default());
        let node = Node::from_value(json!([1, 2, 3]));

        let err = engine.publish(&node, "list").await.unwrap_err();
        assert!(matches!(err, Error::Publish(_)));
    }

    #[tokio::test]
    async fn test_remote_concurrency_is_bounded() {
        let remote = Arc::new(MockRemote::with_delay(std::time::Duration::from_millis(10)));
        let config = EngineConfigBuilder::default()
            .max_concurrent_remote_calls(1usize)
            .compiler(CompilerConfig::without_pushdown())
            .build()
            .unwrap();
        let engine = engine(remote.clone(), config);
        let roots: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|name| store_count(engine.registry(), name))
            .collect();

        let results = engine.evaluate_many(&roots).await.unwrap();
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(remote.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
