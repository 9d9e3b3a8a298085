//! Operation signatures and output type rules.

use std::fmt;
use std::sync::Arc;

use weft_core::{Type, Value};

use super::Args;

/// Output type computed from the input types.
pub type TypeFn = Arc<dyn Fn(&Args<Type>) -> Type + Send + Sync>;

/// Output type computed from the input types and one constant input value.
pub type ValueTypeFn = Arc<dyn Fn(&Args<Type>, &Value) -> Type + Send + Sync>;

/// A named, typed parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Most general type the parameter accepts.
    pub ty: Type,
}

impl Param {
    /// Creates a parameter.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// How the output type of an operation is derived.
#[derive(Clone)]
pub enum OutputRule {
    /// Always the same type.
    Fixed(Type),
    /// Computed from the input types.
    Derived(TypeFn),
    /// Computed from the input types and the constant value of `param`.
    ///
    /// When that input is not a constant at construction time the node is
    /// typed with `fallback` and the compiler folds the constant later.
    ValueDependent {
        /// Parameter whose value determines the type.
        param: String,
        /// Type used until the value is known.
        fallback: Type,
        /// The rule itself.
        rule: ValueTypeFn,
    },
}

impl fmt::Debug for OutputRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(ty) => f.debug_tuple("Fixed").field(ty).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
            Self::ValueDependent {
                param, fallback, ..
            } => f
                .debug_struct("ValueDependent")
                .field("param", param)
                .field("fallback", fallback)
                .finish_non_exhaustive(),
        }
    }
}

/// Parameters and output rule of an operation.
#[derive(Debug, Clone)]
pub struct Signature {
    params: Vec<Param>,
    output: OutputRule,
}

impl Signature {
    /// Creates a signature returning [`Type::Any`] until an output rule is set.
    pub fn new(params: impl IntoIterator<Item = Param>) -> Self {
        Self {
            params: params.into_iter().collect(),
            output: OutputRule::Fixed(Type::Any),
        }
    }

    /// Sets a fixed output type.
    pub fn returns(mut self, ty: Type) -> Self {
        self.output = OutputRule::Fixed(ty);
        self
    }

    /// Sets an output type derived from the input types.
    pub fn derive(mut self, rule: impl Fn(&Args<Type>) -> Type + Send + Sync + 'static) -> Self {
        self.output = OutputRule::Derived(Arc::new(rule));
        self
    }

    /// Sets an output type that depends on the value of `param`.
    pub fn value_dependent(
        mut self,
        param: impl Into<String>,
        fallback: Type,
        rule: impl Fn(&Args<Type>, &Value) -> Type + Send + Sync + 'static,
    ) -> Self {
        self.output = OutputRule::ValueDependent {
            param: param.into(),
            fallback,
            rule: Arc::new(rule),
        };
        self
    }

    /// Returns the parameters in order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Returns the parameter names in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// Returns the output rule.
    pub fn output(&self) -> &OutputRule {
        &self.output
    }

    /// Returns the parameter whose value the output type depends on.
    pub fn value_param(&self) -> Option<&str> {
        match &self.output {
            OutputRule::ValueDependent { param, .. } => Some(param),
            _ => None,
        }
    }

    /// Returns `true` if every input type is assignable to its parameter.
    ///
    /// `inputs` must already be in signature order.
    pub fn accepts(&self, inputs: &Args<Type>) -> bool {
        inputs.len() == self.params.len()
            && self
                .params
                .iter()
                .zip(inputs.values())
                .all(|(param, ty)| ty.is_assignable_to(&param.ty))
    }

    /// Returns `true` if every parameter type of `self` is assignable to the
    /// corresponding parameter of `other`.
    pub fn is_at_least_as_specific_as(&self, other: &Signature) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty.is_assignable_to(&b.ty))
    }

    /// Returns `true` if both signatures take the same parameter names.
    pub fn has_same_params(&self, other: &Signature) -> bool {
        self.param_names().eq(other.param_names())
    }

    /// Returns `true` if both signatures take identical parameter types.
    pub fn has_same_param_types(&self, other: &Signature) -> bool {
        self.params == other.params
    }

    /// Computes the untagged output type.
    ///
    /// `constant` looks up the constant value of an input, if it is one.
    pub fn output_type<'a>(
        &self,
        inputs: &Args<Type>,
        constant: impl Fn(&str) -> Option<&'a Value>,
    ) -> Type {
        match &self.output {
            OutputRule::Fixed(ty) => ty.clone(),
            OutputRule::Derived(rule) => rule(inputs),
            OutputRule::ValueDependent {
                param,
                fallback,
                rule,
            } => match constant(param) {
                Some(value) => rule(inputs, value),
                None => fallback.clone(),
            },
        }
    }
}
