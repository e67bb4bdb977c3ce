//! Static catalog of block templates.
//!
//! A template fixes a block's chain role, its ordered parameter list with
//! defaults, and the rule turning a block instance into a program
//! [`Op`]. The catalog is built once per process and never mutated.

use std::fmt;

use hashbrown::HashMap;
use once_cell::sync::Lazy;

use crate::block::{Block, ParamValue};
use crate::error::GraphError;
use crate::program::{Op, OpArg};

/// Position a block may take in a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Chain origin; never has a predecessor.
    Source,
    /// Intermediate stage transforming its predecessor's signal.
    Modifier,
    /// Chain terminator; never has a successor.
    Output,
}

impl BlockKind {
    /// Whether a block of this kind may appear as the left member of a link.
    #[must_use]
    pub const fn accepts_successor(self) -> bool {
        !matches!(self, Self::Output)
    }

    /// Whether a block of this kind may appear as the right member of a link.
    #[must_use]
    pub const fn accepts_predecessor(self) -> bool {
        !matches!(self, Self::Source)
    }
}

/// Value shape expected by a template parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Scalar parameter.
    Float,
    /// Reference to another rendered texture.
    Texture,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => f.write_str("float"),
            Self::Texture => f.write_str("texture"),
        }
    }
}

/// Declaration of one template parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Parameter name shown on the block's controls.
    pub name: &'static str,
    /// Accepted value shape.
    pub value_type: ParamType,
    /// Value a freshly created block starts with.
    pub default: ParamValue,
}

impl ParamSpec {
    const fn float(name: &'static str, default: f64) -> Self {
        Self {
            name,
            value_type: ParamType::Float,
            default: ParamValue::Float(default),
        }
    }

    const fn texture(name: &'static str) -> Self {
        Self {
            name,
            value_type: ParamType::Texture,
            default: ParamValue::Texture(None),
        }
    }
}

/// Rule mapping a block instance to its program operation.
pub type FragmentRule = fn(&BlockTemplate, &Block) -> Op;

/// Immutable schema for one block kind.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    /// Registry key, also used as the engine function name for stages.
    pub name: &'static str,
    /// Chain role.
    pub kind: BlockKind,
    /// Display hint for the presentation layer.
    pub color: &'static str,
    /// Ordered parameter declarations.
    pub parameters: Vec<ParamSpec>,
    /// Code-generation rule.
    pub fragment: FragmentRule,
}

impl BlockTemplate {
    /// Default argument list for a new block.
    #[must_use]
    pub fn default_args(&self) -> Vec<ParamValue> {
        self.parameters.iter().map(|p| p.default.clone()).collect()
    }

    /// Renders `block` into its program operation.
    #[must_use]
    pub fn render(&self, block: &Block) -> Op {
        (self.fragment)(self, block)
    }

    /// Arguments to pass to the engine, with trailing defaults elided.
    ///
    /// Arguments are positional, so every value up to the last one that
    /// differs from its default is kept.
    #[must_use]
    pub fn explicit_args(&self, block: &Block) -> Vec<OpArg> {
        let keep = self
            .parameters
            .iter()
            .zip(&block.args)
            .rposition(|(spec, value)| *value != spec.default)
            .map_or(0, |last| last + 1);
        block.args.iter().take(keep).map(OpArg::from).collect()
    }
}

fn stage_fragment(template: &BlockTemplate, block: &Block) -> Op {
    Op::Stage {
        function: template.name,
        args: template.explicit_args(block),
    }
}

fn output_fragment(_template: &BlockTemplate, block: &Block) -> Op {
    Op::Output {
        target: block.id.clone(),
    }
}

/// Process-wide lookup table of block templates.
#[derive(Debug)]
pub struct TemplateRegistry {
    templates: HashMap<&'static str, BlockTemplate>,
}

static BUILTIN: Lazy<TemplateRegistry> = Lazy::new(|| {
    TemplateRegistry::from_templates(vec![
        BlockTemplate {
            name: "osc",
            kind: BlockKind::Source,
            color: "red",
            parameters: vec![
                ParamSpec::float("freq", 60.0),
                ParamSpec::float("sync", 0.1),
                ParamSpec::float("offset", 0.0),
            ],
            fragment: stage_fragment,
        },
        BlockTemplate {
            name: "diff",
            kind: BlockKind::Modifier,
            color: "blue",
            parameters: vec![ParamSpec::texture("texture")],
            fragment: stage_fragment,
        },
        BlockTemplate {
            name: "output",
            kind: BlockKind::Output,
            color: "purple",
            parameters: Vec::new(),
            fragment: output_fragment,
        },
    ])
});

impl TemplateRegistry {
    fn from_templates(templates: Vec<BlockTemplate>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| (t.name, t)).collect(),
        }
    }

    /// The built-in catalog: `osc` (source), `diff` (modifier) and
    /// `output`.
    ///
    /// # Examples
    ///
    /// ```
    /// use blocksynth::template::{BlockKind, TemplateRegistry};
    /// let osc = TemplateRegistry::builtin().lookup("osc").expect("osc is built in");
    /// assert_eq!(osc.kind, BlockKind::Source);
    /// assert_eq!(osc.parameters.len(), 3);
    /// ```
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Looks up a template by name.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownTemplate`] when `name` is not registered.
    pub fn lookup(&self, name: &str) -> Result<&BlockTemplate, GraphError> {
        self.templates
            .get(name)
            .ok_or_else(|| GraphError::UnknownTemplate(name.to_owned()))
    }

    /// Registered template names in lexical order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.templates.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("osc", BlockKind::Source, 3)]
    #[case("diff", BlockKind::Modifier, 1)]
    #[case("output", BlockKind::Output, 0)]
    fn builtin_catalog_shapes(
        #[case] name: &str,
        #[case] kind: BlockKind,
        #[case] params: usize,
    ) {
        let template = TemplateRegistry::builtin()
            .lookup(name)
            .expect("template should be registered");
        assert_eq!(template.kind, kind);
        assert_eq!(template.parameters.len(), params);
        assert_eq!(template.default_args().len(), params);
    }

    #[rstest]
    fn unknown_template_is_reported() {
        let err = TemplateRegistry::builtin()
            .lookup("noise")
            .expect_err("noise is not registered");
        assert_eq!(err, GraphError::UnknownTemplate("noise".to_owned()));
    }

    #[rstest]
    fn names_are_sorted() {
        assert_eq!(
            TemplateRegistry::builtin().names(),
            vec!["diff", "osc", "output"]
        );
    }

    #[rstest]
    #[case(BlockKind::Source, true, false)]
    #[case(BlockKind::Modifier, true, true)]
    #[case(BlockKind::Output, false, true)]
    fn kind_link_rules(#[case] kind: BlockKind, #[case] succ: bool, #[case] pred: bool) {
        assert_eq!(kind.accepts_successor(), succ);
        assert_eq!(kind.accepts_predecessor(), pred);
    }
}
