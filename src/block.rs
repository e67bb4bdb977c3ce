//! Block instances and the patches used to update them.
//!
//! Blocks reference their neighbours by [`BlockId`] rather than by pointer;
//! the [`BlockStore`](crate::store::BlockStore) is the only owner and every
//! traversal resolves ids through it.

use std::fmt;

use glam::{Quat, Vec3};

use crate::template::{BlockKind, BlockTemplate, ParamType};

/// Globally unique block identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub String);

impl BlockId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn fresh() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Generates a fresh random identifier that is also a plain program
    /// identifier, for blocks whose id appears in program text.
    #[must_use]
    pub fn fresh_identifier() -> Self {
        Self(format!("o{}", uuid::Uuid::new_v4().simple()))
    }

    /// Borrows the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id can be written into program text unquoted.
    #[must_use]
    pub fn is_identifier(&self) -> bool {
        is_identifier(&self.0)
    }
}

/// Whether `text` is a plain identifier: an ASCII letter or underscore
/// followed by ASCII letters, digits and underscores.
///
/// # Examples
///
/// ```
/// use blocksynth::block::is_identifier;
/// assert!(is_identifier("o1"));
/// assert!(!is_identifier("o1);alert(1"));
/// assert!(!is_identifier(""));
/// ```
#[must_use]
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Which neighbour link of a block a patch touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkSide {
    /// The `prev` link.
    Prev,
    /// The `next` link.
    Next,
}

impl fmt::Display for LinkSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prev => f.write_str("prev"),
            Self::Next => f.write_str("next"),
        }
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for BlockId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Argument value held by a block.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Scalar argument.
    Float(f64),
    /// Texture argument naming a rendered output, or unset.
    Texture(Option<String>),
}

impl ParamValue {
    /// Shape of this value.
    #[must_use]
    pub const fn value_type(&self) -> ParamType {
        match self {
            Self::Float(_) => ParamType::Float,
            Self::Texture(_) => ParamType::Texture,
        }
    }

    /// Whether the value carries something to render.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        !matches!(self, Self::Texture(None))
    }
}

/// A live block: one stage of a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Unique identifier.
    pub id: BlockId,
    /// Name of the template this block was created from.
    pub template: &'static str,
    /// Chain role copied from the template.
    pub kind: BlockKind,
    /// Display hint copied from the template.
    pub color: &'static str,
    /// Argument values, one per template parameter.
    pub args: Vec<ParamValue>,
    /// World-space anchor position.
    pub position: Vec3,
    /// Orientation supplied by the interaction layer.
    pub orientation: Quat,
    /// Block feeding into this one.
    pub prev: Option<BlockId>,
    /// Block this one feeds into.
    pub next: Option<BlockId>,
}

impl Block {
    /// Creates an unlinked block with the template's default arguments.
    #[must_use]
    pub fn from_template(template: &BlockTemplate, id: BlockId, position: Vec3) -> Self {
        Self {
            id,
            template: template.name,
            kind: template.kind,
            color: template.color,
            args: template.default_args(),
            position,
            orientation: Quat::IDENTITY,
            prev: None,
            next: None,
        }
    }

    /// Whether the block is linked to neither neighbour.
    #[must_use]
    pub const fn is_unlinked(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }
}

/// Partial update merged into an existing block.
///
/// Fields left as `None` are preserved. The link fields use a nested
/// option so a patch can clear a link (`Some(None)`) as well as set one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockPatch {
    /// Replacement argument list; must match the template's arity.
    pub args: Option<Vec<ParamValue>>,
    /// New anchor position.
    pub position: Option<Vec3>,
    /// New orientation.
    pub orientation: Option<Quat>,
    /// New predecessor link.
    pub prev: Option<Option<BlockId>>,
    /// New successor link.
    pub next: Option<Option<BlockId>>,
}

impl BlockPatch {
    /// Patch relocating a block.
    #[must_use]
    pub fn moved_to(position: Vec3) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// Sets the predecessor link.
    #[must_use]
    pub fn with_prev(mut self, prev: Option<BlockId>) -> Self {
        self.prev = Some(prev);
        self
    }

    /// Sets the successor link.
    #[must_use]
    pub fn with_next(mut self, next: Option<BlockId>) -> Self {
        self.next = Some(next);
        self
    }

    /// Sets the anchor position.
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    /// Whether applying the patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.args.is_none()
            && self.position.is_none()
            && self.orientation.is_none()
            && self.prev.is_none()
            && self.next.is_none()
    }
}
