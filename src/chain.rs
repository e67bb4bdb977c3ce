//! Chain validity and traversal.
//!
//! A chain is never stored. It is derived by walking `prev` links from an
//! output block back to the source that feeds it. Walks are bounded by the
//! store size so a corrupted graph cannot loop forever.

use log::{debug, warn};

use crate::block::{Block, BlockId, ParamValue};
use crate::error::GraphError;
use crate::program::{Program, Serializer};
use crate::store::BlockStore;
use crate::template::{BlockKind, BlockTemplate};

/// Per-block admissibility check applied to every block on a chain.
pub type Admissibility = fn(&Block, &BlockTemplate) -> bool;

/// Admits every block.
#[must_use]
pub const fn always_admissible(_block: &Block, _template: &BlockTemplate) -> bool {
    true
}

/// Admits blocks whose arguments are all set (no unassigned textures).
#[must_use]
pub fn arguments_complete(block: &Block, _template: &BlockTemplate) -> bool {
    block.args.iter().all(ParamValue::is_set)
}

/// A renderable path, source first and output last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    blocks: Vec<BlockId>,
}

impl Chain {
    /// Block ids in definition order.
    #[must_use]
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// The originating source block.
    #[must_use]
    pub fn source(&self) -> Option<&BlockId> {
        self.blocks.first()
    }

    /// The block the chain ends at.
    #[must_use]
    pub fn output(&self) -> Option<&BlockId> {
        self.blocks.last()
    }

    /// Whether `id` lies on the chain.
    #[must_use]
    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains(id)
    }
}

/// Decides whether chains are well formed and producible.
#[derive(Debug, Clone, Copy)]
pub struct ChainValidator {
    admissible: Admissibility,
}

impl Default for ChainValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainValidator {
    /// Validator admitting every block.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            admissible: always_admissible,
        }
    }

    /// Validator applying a custom per-block predicate.
    #[must_use]
    pub const fn with_predicate(admissible: Admissibility) -> Self {
        Self { admissible }
    }

    /// Walks back from `output` and returns the chain when it is renderable.
    ///
    /// The walk fails on a missing `prev` before reaching a source, on a
    /// block that fails admissibility, and on a dangling or cyclic link.
    #[must_use]
    pub fn trace(&self, store: &BlockStore, output: &BlockId) -> Option<Chain> {
        let mut blocks = Vec::new();
        let mut current = store.get(output)?;
        loop {
            if blocks.len() > store.len() {
                warn!("chain ending at {output} loops; treating it as unrenderable");
                return None;
            }
            let template = store.registry().lookup(current.template).ok()?;
            if !(self.admissible)(current, template) {
                debug!("block {} is not admissible; chain at {output} skipped", current.id);
                return None;
            }
            blocks.push(current.id.clone());
            match &current.prev {
                Some(prev) => {
                    let Some(block) = store.get(prev) else {
                        warn!("block {} links to missing predecessor {prev}", current.id);
                        return None;
                    };
                    current = block;
                }
                None if current.kind == BlockKind::Source => break,
                None => return None,
            }
        }
        blocks.reverse();
        Some(Chain { blocks })
    }

    /// Whether the chain ending at `output` reaches a source.
    ///
    /// # Examples
    ///
    /// ```
    /// use blocksynth::chain::ChainValidator;
    /// use blocksynth::store::{BlockStore, CreateOptions};
    /// let mut store = BlockStore::new();
    /// store.create("osc", CreateOptions::with_id("s1")).expect("osc is built in");
    /// store.create("output", CreateOptions::with_id("o1")).expect("output is built in");
    /// assert!(!ChainValidator::new().is_renderable(&store, &"o1".into()));
    /// ```
    #[must_use]
    pub fn is_renderable(&self, store: &BlockStore, output: &BlockId) -> bool {
        let renderable = self.trace(store, output).is_some();
        debug!(
            "{output} {} a valid render chain",
            if renderable { "has" } else { "lacks" }
        );
        renderable
    }
}

/// Blocks from the head of `id`'s chain up to and including `id`.
///
/// Stops at the first missing `prev`, whatever the head's kind.
///
/// # Errors
/// Returns [`GraphError::UnknownBlock`] when `id` is not live.
pub fn ancestry<'a>(store: &'a BlockStore, id: &BlockId) -> Result<Vec<&'a Block>, GraphError> {
    let mut current = store.require(id)?;
    let mut path = vec![current];
    while let Some(prev) = current.prev.as_ref() {
        if path.len() > store.len() {
            warn!("cycle detected behind {id}; truncating");
            break;
        }
        let Some(block) = store.get(prev) else {
            warn!("dangling predecessor {prev} behind {id}");
            break;
        };
        path.push(block);
        current = block;
    }
    path.reverse();
    Ok(path)
}

/// Compiles the blocks leading into `id`, followed by `id` itself.
///
/// # Errors
/// Returns [`GraphError::UnknownBlock`] when `id` is not live.
pub fn build_program(store: &BlockStore, id: &BlockId) -> Result<Program, GraphError> {
    ancestry(store, id)?
        .into_iter()
        .map(|block| {
            store
                .registry()
                .lookup(block.template)
                .map(|template| template.render(block))
        })
        .collect()
}

/// Program text for the chain leading into `id`, in definition order.
///
/// # Errors
/// Returns [`GraphError::UnknownBlock`] when `id` is not live, or
/// [`GraphError::Serialize`] when the serialiser refuses the program.
pub fn build_program_fragment(
    store: &BlockStore,
    id: &BlockId,
    serializer: &impl Serializer,
) -> Result<String, GraphError> {
    Ok(serializer.serialize(&build_program(store, id)?)?)
}

/// Follows `next` links from `id` to the output that terminates its chain.
#[must_use]
pub fn downstream_output(store: &BlockStore, id: &BlockId) -> Option<BlockId> {
    let mut current = store.get(id)?;
    for _ in 0..=store.len() {
        if current.kind == BlockKind::Output {
            return Some(current.id.clone());
        }
        current = store.get(current.next.as_ref()?)?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockPatch;
    use crate::program::ChainSyntax;
    use crate::store::CreateOptions;
    use rstest::{fixture, rstest};

    /// Builds `s1 -> m1 -> o1` plus a loose output `o2`, linked directly
    /// through patches.
    #[fixture]
    fn linked() -> BlockStore {
        let mut store = BlockStore::new();
        for (template, id) in [("osc", "s1"), ("diff", "m1"), ("output", "o1"), ("output", "o2")] {
            store
                .create(template, CreateOptions::with_id(id))
                .expect("create should succeed");
        }
        store
            .upsert_many([
                ("s1".into(), BlockPatch::default().with_next(Some("m1".into()))),
                (
                    "m1".into(),
                    BlockPatch::default()
                        .with_prev(Some("s1".into()))
                        .with_next(Some("o1".into())),
                ),
                ("o1".into(), BlockPatch::default().with_prev(Some("m1".into()))),
            ])
            .expect("links should apply");
        store
    }

    #[rstest]
    fn linked_output_traces_to_source(linked: BlockStore) {
        let chain = ChainValidator::new()
            .trace(&linked, &"o1".into())
            .expect("o1 is renderable");
        let ids: Vec<&str> = chain.blocks().iter().map(BlockId::as_str).collect();
        assert_eq!(ids, vec!["s1", "m1", "o1"]);
        assert_eq!(chain.source(), Some(&BlockId::from("s1")));
        assert_eq!(chain.output(), Some(&BlockId::from("o1")));
    }

    #[rstest]
    fn loose_output_is_not_renderable(linked: BlockStore) {
        assert!(!ChainValidator::new().is_renderable(&linked, &"o2".into()));
    }

    #[rstest]
    fn chain_without_source_is_not_renderable(mut linked: BlockStore) {
        linked
            .upsert_many([("m1".into(), BlockPatch::default().with_prev(None))])
            .expect("patch should apply");
        assert!(!ChainValidator::new().is_renderable(&linked, &"o1".into()));
    }

    #[rstest]
    fn inadmissible_block_breaks_chain(mut linked: BlockStore) {
        let strict = ChainValidator::with_predicate(arguments_complete);
        assert!(!strict.is_renderable(&linked, &"o1".into()));
        linked
            .set_argument(&"m1".into(), 0, ParamValue::Texture(Some("o2".to_owned())))
            .expect("texture fits");
        assert!(strict.is_renderable(&linked, &"o1".into()));
    }

    #[rstest]
    fn dangling_predecessor_is_not_renderable(mut linked: BlockStore) {
        // The store leaves neighbour links alone when a block is destroyed.
        linked.destroy(&"m1".into()).expect("m1 is live");
        assert!(!ChainValidator::new().is_renderable(&linked, &"o1".into()));
        let path = ancestry(&linked, &"o1".into()).expect("o1 is live");
        assert_eq!(path.len(), 1);
    }

    #[rstest]
    fn cyclic_links_terminate(mut linked: BlockStore) {
        linked
            .create("diff", CreateOptions::with_id("m2"))
            .expect("create should succeed");
        linked
            .upsert_many([
                ("m1".into(), BlockPatch::default().with_prev(Some("m2".into()))),
                ("m2".into(), BlockPatch::default().with_prev(Some("m1".into()))),
            ])
            .expect("modifiers may link both ways");
        assert!(!ChainValidator::new().is_renderable(&linked, &"o1".into()));
        assert!(ancestry(&linked, &"o1".into()).is_ok());
    }

    #[rstest]
    fn fragment_concatenates_source_to_output(linked: BlockStore) {
        let text = build_program_fragment(&linked, &"o1".into(), &ChainSyntax)
            .expect("o1 exists");
        assert_eq!(text, "osc().diff().out(o1)");
    }

    #[rstest]
    fn fragment_of_unlinked_block_is_its_own(linked: BlockStore) {
        let text = build_program_fragment(&linked, &"o2".into(), &ChainSyntax)
            .expect("o2 exists");
        assert_eq!(text, "out(o2)");
    }

    #[rstest]
    fn fragment_of_missing_block_fails(linked: BlockStore) {
        assert_eq!(
            build_program(&linked, &"ghost".into()),
            Err(GraphError::UnknownBlock("ghost".into()))
        );
    }

    #[rstest]
    #[case("s1", Some("o1"))]
    #[case("m1", Some("o1"))]
    #[case("o2", Some("o2"))]
    fn downstream_output_follows_next(
        linked: BlockStore,
        #[case] from: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(
            downstream_output(&linked, &from.into()),
            expected.map(BlockId::from)
        );
    }
}
