//! Error types surfaced by the block graph and its collaborators.
//!
//! Rejected or redundant connections are not errors; they are reported as
//! [`Settlement`](crate::resolver::Settlement) outcomes instead.

use thiserror::Error;

use crate::block::{BlockId, LinkSide};
use crate::template::{BlockKind, ParamType};

/// Failures raised by block creation, lookup and patching.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// A block was requested for a template name that is not registered.
    #[error("invalid block template {0} supplied")]
    UnknownTemplate(String),
    /// No live block carries the identifier.
    #[error("no block with id {0}")]
    UnknownBlock(BlockId),
    /// A live block already carries the identifier.
    #[error("block id {0} is already in use")]
    DuplicateBlock(BlockId),
    /// The identifier belonged to a destroyed block and cannot be reused.
    #[error("block id {0} was destroyed and cannot be reused")]
    RetiredBlock(BlockId),
    /// A patch supplied the wrong number of arguments for the template.
    #[error("block {id} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Block receiving the patch.
        id: BlockId,
        /// Parameter count declared by the template.
        expected: usize,
        /// Number of arguments supplied.
        actual: usize,
    },
    /// An argument value does not match the parameter's declared type.
    #[error("argument {index} of block {id} must be a {expected}")]
    ArgumentType {
        /// Block receiving the value.
        id: BlockId,
        /// Position of the offending argument.
        index: usize,
        /// Type declared by the template.
        expected: ParamType,
    },
    /// An argument index lies outside the template's parameter list.
    #[error("block {id} has no argument {index}")]
    ArgumentIndex {
        /// Block receiving the value.
        id: BlockId,
        /// Requested position.
        index: usize,
    },
    /// An argument has the right shape but a value the engine cannot take.
    #[error("argument {index} of block {id} {reason}")]
    ArgumentValue {
        /// Block receiving the value.
        id: BlockId,
        /// Position of the offending argument.
        index: usize,
        /// What the value must satisfy.
        reason: &'static str,
    },
    /// A caller-supplied output id cannot be written into program text.
    #[error("output id {0:?} is not a plain identifier")]
    InvalidIdentifier(BlockId),
    /// A patch would give a source a predecessor or an output a successor.
    #[error("{kind:?} block {id} cannot take a {side} link")]
    ForbiddenLink {
        /// Block receiving the patch.
        id: BlockId,
        /// Chain role of the block.
        kind: BlockKind,
        /// Link the patch tried to set.
        side: LinkSide,
    },
    /// A patch links a block to itself or to a block that is not live.
    #[error("block {id} cannot set {side} to {target}")]
    InvalidLink {
        /// Block receiving the patch.
        id: BlockId,
        /// Link the patch tried to set.
        side: LinkSide,
        /// Requested neighbour.
        target: BlockId,
    },
    /// A compiled program holds a value the serialiser cannot express.
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    /// The execution engine refused a program or render call.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Values a [`Serializer`](crate::program::Serializer) refuses to write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializeError {
    /// A scalar argument is infinite or NaN.
    #[error("cannot write non-finite number {0}")]
    NonFinite(f64),
    /// A texture, function or output name is not a plain identifier.
    #[error("cannot write {0:?} as an identifier")]
    NotIdentifier(String),
}

/// Failure reported by an [`ExecutionEngine`](crate::engine::ExecutionEngine).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("engine {call} failed: {detail}")]
pub struct EngineError {
    /// Entry point that failed (`execute`, `render` or `clear`).
    pub call: &'static str,
    /// Description of the underlying failure.
    pub detail: String,
}

impl EngineError {
    /// Convenience constructor used by engine implementations.
    #[must_use]
    pub fn new(call: &'static str, detail: impl Into<String>) -> Self {
        Self {
            call,
            detail: detail.into(),
        }
    }
}

/// Failure raised while loading a [`Config`](crate::config::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Path that was requested.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid configuration JSON.
    #[error("cannot parse config {path}: {source}")]
    Parse {
        /// Path that was requested.
        path: String,
        /// Underlying decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// A numeric setting is outside its accepted range.
    #[error("config value {name} must be finite and positive, got {value}")]
    OutOfRange {
        /// Offending setting.
        name: &'static str,
        /// Supplied value.
        value: f32,
    },
}

/// Failure raised while loading or replaying a [`Script`](crate::script::Script).
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The file could not be read.
    #[error("cannot read script {path}: {source}")]
    Io {
        /// Path that was requested.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The text is not a valid event list.
    #[error("cannot parse script: {0}")]
    Parse(#[from] serde_json::Error),
    /// An event was rejected by the workspace.
    #[error("event {index} failed: {source}")]
    Event {
        /// Zero-based position of the event in the script.
        index: usize,
        /// Underlying graph failure.
        #[source]
        source: GraphError,
    },
}
