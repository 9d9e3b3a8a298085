//! Operations and their tag behavior.

use std::fmt;
use std::sync::Arc;

use semver::Version;
use weft_core::types::merge_tags;
use weft_core::{BoxedError, Resolved, TagTypes, Type, Value};

use super::pushdown::{CompositeSpec, PushdownSpec};
use super::{Args, Signature};

/// Local implementation of an operation.
///
/// Implementations must be pure: the same inputs always produce the same
/// output. The result cache relies on it.
pub type LocalFn = Arc<dyn Fn(&Args<Resolved>) -> Result<Value, BoxedError> + Send + Sync>;

/// How tags on input types propagate to the output type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagBehavior {
    /// Output carries the merged tags of all inputs; earlier parameters win
    /// on conflicting tag names.
    #[default]
    PassThrough,
    /// Output carries no tags.
    Strip,
    /// Like [`TagBehavior::PassThrough`], plus a tag `name` whose type is the
    /// untagged type of input `from`.
    Tag {
        /// Name of the tag to add.
        name: String,
        /// Parameter whose type becomes the tag.
        from: String,
    },
}

impl TagBehavior {
    /// Creates a behavior tagging the output with input `from` under `name`.
    pub fn tag(name: impl Into<String>, from: impl Into<String>) -> Self {
        Self::Tag {
            name: name.into(),
            from: from.into(),
        }
    }

    /// Wraps `output` with the tags this behavior derives from `inputs`.
    pub fn apply(&self, inputs: &Args<Type>, output: Type) -> Type {
        let inherited = || merge_tags(inputs.values().filter_map(Type::tags));
        match self {
            Self::Strip => output.untagged().clone(),
            Self::PassThrough => Type::tagged(inherited(), output),
            Self::Tag { name, from } => {
                let mut tags: TagTypes = inherited();
                if let Some(source) = inputs.get(from) {
                    tags.insert(name.clone(), source.untagged().clone());
                }
                Type::tagged(tags, output)
            }
        }
    }
}

/// Where an operation executes.
#[derive(Clone)]
pub enum OperationKind {
    /// Runs in process.
    Local(LocalFn),
    /// Runs as a single step on the remote service.
    ///
    /// Root steps take all of their inputs as arguments; other steps take
    /// their first input as the value the step is applied to.
    Remote {
        /// Whether the operation starts from nothing but its arguments.
        root: bool,
    },
    /// Synthesized by the compiler from a fused chain.
    Composite(CompositeSpec),
}

impl fmt::Debug for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(_) => f.write_str("Local(..)"),
            Self::Remote { root } => f.debug_struct("Remote").field("root", root).finish(),
            Self::Composite(spec) => f.debug_tuple("Composite").field(spec).finish(),
        }
    }
}

/// A named, versioned, typed function nodes are built from.
#[derive(Debug, Clone)]
pub struct Operation {
    name: String,
    version: Version,
    signature: Signature,
    tags: TagBehavior,
    kind: OperationKind,
    pushdown: Option<PushdownSpec>,
}

impl Operation {
    fn new(name: impl Into<String>, signature: Signature, kind: OperationKind) -> Self {
        Self {
            name: name.into(),
            version: Version::new(1, 0, 0),
            signature,
            tags: TagBehavior::default(),
            kind,
            pushdown: None,
        }
    }

    /// Creates an operation implemented in process.
    pub fn local(
        name: impl Into<String>,
        signature: Signature,
        implementation: impl Fn(&Args<Resolved>) -> Result<Value, BoxedError> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, signature, OperationKind::Local(Arc::new(implementation)))
    }

    /// Creates a remote step that takes all inputs as arguments.
    pub fn remote_root(name: impl Into<String>, signature: Signature) -> Self {
        Self::new(name, signature, OperationKind::Remote { root: true })
    }

    /// Creates a remote step applied to its first input.
    pub fn remote(name: impl Into<String>, signature: Signature) -> Self {
        Self::new(name, signature, OperationKind::Remote { root: false })
    }

    /// Creates a composite operation from a fused chain.
    pub(crate) fn composite(spec: CompositeSpec, signature: Signature) -> Self {
        let name = spec.name.clone();
        let mut op = Self::new(name, signature, OperationKind::Composite(spec));
        op.tags = TagBehavior::Strip;
        op
    }

    /// Sets the version.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Sets the tag behavior.
    pub fn with_tags(mut self, tags: TagBehavior) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the pushdown metadata.
    pub fn with_pushdown(mut self, pushdown: PushdownSpec) -> Self {
        self.pushdown = Some(pushdown);
        self
    }

    /// Returns the operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Returns the signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns the tag behavior.
    pub fn tag_behavior(&self) -> &TagBehavior {
        &self.tags
    }

    /// Returns where the operation executes.
    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    /// Returns the pushdown metadata.
    pub fn pushdown(&self) -> Option<&PushdownSpec> {
        self.pushdown.as_ref()
    }

    /// Returns `true` if the operation runs on the remote service.
    pub fn is_remote(&self) -> bool {
        matches!(
            self.kind,
            OperationKind::Remote { .. } | OperationKind::Composite(_)
        )
    }

    /// Returns `true` for a remote step that takes no chained input.
    pub fn is_root_step(&self) -> bool {
        matches!(self.kind, OperationKind::Remote { root: true })
    }

    /// Returns `true` for a single remote step.
    pub fn is_remote_step(&self) -> bool {
        matches!(self.kind, OperationKind::Remote { .. })
    }

    /// Returns `true` for compiler-synthesized composites.
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, OperationKind::Composite(_))
    }

    /// Returns `true` if the operation may be part of a pushdown chain.
    pub fn is_chainable(&self) -> bool {
        self.is_remote_step() || self.pushdown.is_some()
    }

    /// Computes the tagged output type for the given input types.
    pub fn output_type<'a>(
        &self,
        inputs: &Args<Type>,
        constant: impl Fn(&str) -> Option<&'a Value>,
    ) -> Type {
        let output = self.signature.output_type(inputs, constant);
        self.tags.apply(inputs, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Param;

    fn tagged(name: &str, tag: Type, value: Type) -> Type {
        Type::tagged(TagTypes::from([(name.to_owned(), tag)]), value)
    }

    #[test]
    fn test_pass_through_merges_inputs() {
        let inputs = Args::new(vec![
            ("lhs".to_owned(), tagged("run", Type::object("run"), Type::Int)),
            ("rhs".to_owned(), tagged("step", Type::Int, Type::Int)),
        ]);

        let out = TagBehavior::PassThrough.apply(&inputs, Type::Number);
        assert_eq!(out.untagged(), &Type::Number);
        let tags = out.tags().expect("output should be tagged");
        assert_eq!(tags["run"], Type::object("run"));
        assert_eq!(tags["step"], Type::Int);
    }

    #[test]
    fn test_pass_through_without_tags() {
        let inputs = Args::new(vec![("x".to_owned(), Type::Int)]);
        assert_eq!(TagBehavior::PassThrough.apply(&inputs, Type::Int), Type::Int);
    }

    #[test]
    fn test_tag_adds_input_type() {
        let inputs = Args::new(vec![
            ("project".to_owned(), tagged("entity", Type::String, Type::object("project"))),
            ("runName".to_owned(), Type::String),
        ]);

        let out = TagBehavior::tag("project", "project").apply(&inputs, Type::object("run"));
        let tags = out.tags().expect("output should be tagged");
        assert_eq!(tags["project"], Type::object("project"));
        assert_eq!(tags["entity"], Type::String);
    }

    #[test]
    fn test_strip() {
        let inputs = Args::new(vec![("x".to_owned(), tagged("run", Type::object("run"), Type::Int))]);
        assert_eq!(TagBehavior::Strip.apply(&inputs, Type::Int), Type::Int);
    }

    #[test]
    fn test_operation_kinds() {
        let sig = Signature::new([Param::new("x", Type::Any)]);
        let local = Operation::local("id", sig.clone(), |args| {
            Ok(args.value("x").cloned().unwrap_or_default())
        });
        let root = Operation::remote_root("root-project", sig.clone());
        let step = Operation::remote("project-runs", sig);

        assert!(!local.is_remote() && !local.is_chainable());
        assert!(root.is_root_step() && root.is_chainable());
        assert!(step.is_remote_step() && !step.is_root_step());
        assert_eq!(local.version(), &Version::new(1, 0, 0));
    }
}
