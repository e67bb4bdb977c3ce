//! Typed program representation and its text serialiser.
//!
//! Chains compile to a [`Program`]: an ordered list of [`Op`] descriptors
//! running from the source block to the output block. Only the serialiser
//! knows the engine's surface syntax; nothing upstream builds text.

use crate::block::{is_identifier, BlockId, ParamValue};
use crate::error::SerializeError;

/// Argument passed to a stage operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OpArg {
    /// Scalar literal.
    Float(f64),
    /// Name of a rendered texture.
    Texture(String),
    /// Positional placeholder letting the engine apply its own default.
    Unset,
}

impl From<&ParamValue> for OpArg {
    fn from(value: &ParamValue) -> Self {
        match value {
            ParamValue::Float(v) => Self::Float(*v),
            ParamValue::Texture(Some(name)) => Self::Texture(name.clone()),
            ParamValue::Texture(None) => Self::Unset,
        }
    }
}

/// One operation contributed by one block.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Source or modifier stage invoking an engine function.
    Stage {
        /// Engine function name.
        function: &'static str,
        /// Positional arguments.
        args: Vec<OpArg>,
    },
    /// Chain terminator writing into the named output.
    Output {
        /// Output block receiving the chain.
        target: BlockId,
    },
}

/// Ordered operations of one chain, source first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    ops: Vec<Op>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Appends an operation at the output end.
    pub fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// Operations in definition order.
    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the program has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Output the program writes into, if it ends in one.
    #[must_use]
    pub fn target(&self) -> Option<&BlockId> {
        match self.ops.last() {
            Some(Op::Output { target }) => Some(target),
            _ => None,
        }
    }
}

impl FromIterator<Op> for Program {
    fn from_iter<T: IntoIterator<Item = Op>>(iter: T) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

/// Turns programs into engine source text.
pub trait Serializer {
    /// Text contributed by a single operation.
    ///
    /// # Errors
    /// Returns [`SerializeError`] when the operation holds a value the
    /// target syntax cannot express.
    fn fragment(&self, op: &Op) -> Result<String, SerializeError>;

    /// Text of a whole program: fragments concatenated in order.
    ///
    /// # Errors
    /// Returns the first [`SerializeError`] raised by [`Self::fragment`].
    fn serialize(&self, program: &Program) -> Result<String, SerializeError> {
        program.ops().iter().map(|op| self.fragment(op)).collect()
    }
}

/// Serialiser for the chained-call syntax of the visual synthesis engine:
/// `osc(60,0.5).diff().out(o1)`.
///
/// Only finite numbers and plain identifiers are written; anything else is
/// refused rather than escaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainSyntax;

impl ChainSyntax {
    fn identifier(name: &str) -> Result<&str, SerializeError> {
        if is_identifier(name) {
            Ok(name)
        } else {
            Err(SerializeError::NotIdentifier(name.to_owned()))
        }
    }

    fn arg(arg: &OpArg) -> Result<String, SerializeError> {
        match arg {
            OpArg::Float(v) if v.is_finite() => Ok(v.to_string()),
            OpArg::Float(v) => Err(SerializeError::NonFinite(*v)),
            OpArg::Texture(name) => Self::identifier(name).map(str::to_owned),
            OpArg::Unset => Ok("undefined".to_owned()),
        }
    }
}

impl Serializer for ChainSyntax {
    fn fragment(&self, op: &Op) -> Result<String, SerializeError> {
        let mut out = String::new();
        match op {
            Op::Stage { function, args } => {
                let rendered = args
                    .iter()
                    .map(Self::arg)
                    .collect::<Result<Vec<_>, _>>()?;
                out.push_str(Self::identifier(function)?);
                out.push('(');
                out.push_str(&rendered.join(","));
                out.push_str(").");
            }
            Op::Output { target } => {
                out.push_str("out(");
                out.push_str(Self::identifier(target.as_str())?);
                out.push(')');
            }
        }
        Ok(out)
    }
}
