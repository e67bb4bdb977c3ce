//! Arena owning every live block.
//!
//! The store is the single owner of [`Block`] values. Links between blocks
//! are plain ids resolved through the arena, so removing a block never
//! leaves a dangling pointer, only a dangling id that the resolver repairs
//! when it unlinks. Every mutation notifies subscribed listeners with the
//! full block mapping.

use glam::{Quat, Vec3};
use hashbrown::{HashMap, HashSet};
use log::{debug, warn};

use crate::block::{is_identifier, Block, BlockId, BlockPatch, LinkSide, ParamValue};
use crate::constants::DEFAULT_SPAWN;
use crate::error::GraphError;
use crate::template::{BlockKind, BlockTemplate, TemplateRegistry};

/// Mapping from id to block published to listeners.
pub type BlockMap = HashMap<BlockId, Block>;

/// Observer invoked after every store mutation.
pub type Listener = Box<dyn FnMut(&BlockMap)>;

/// Handle returned by [`BlockStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Optional settings for [`BlockStore::create`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateOptions {
    /// Identifier to use instead of a generated one.
    pub id: Option<BlockId>,
    /// Spawn position; defaults to [`DEFAULT_SPAWN`].
    pub position: Option<Vec3>,
    /// Initial orientation; defaults to identity.
    pub orientation: Option<Quat>,
}

impl CreateOptions {
    /// Options with an explicit identifier.
    #[must_use]
    pub fn with_id(id: impl Into<BlockId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Sets the spawn position.
    #[must_use]
    pub fn at(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets the initial orientation.
    #[must_use]
    pub fn facing(mut self, orientation: Quat) -> Self {
        self.orientation = Some(orientation);
        self
    }
}

/// Owner of all live blocks.
pub struct BlockStore {
    registry: &'static TemplateRegistry,
    blocks: BlockMap,
    /// Ids of destroyed blocks; never handed out again.
    retired: HashSet<BlockId>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("blocks", &self.blocks)
            .field("retired", &self.retired)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl BlockStore {
    /// Creates an empty store backed by the built-in template catalog.
    ///
    /// # Examples
    ///
    /// ```
    /// use blocksynth::store::BlockStore;
    /// let store = BlockStore::new();
    /// assert!(store.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(TemplateRegistry::builtin())
    }

    /// Creates an empty store backed by `registry`.
    #[must_use]
    pub fn with_registry(registry: &'static TemplateRegistry) -> Self {
        Self {
            registry,
            blocks: HashMap::new(),
            retired: HashSet::new(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Template catalog used to create and validate blocks.
    #[must_use]
    pub const fn registry(&self) -> &'static TemplateRegistry {
        self.registry
    }

    /// Looks up the template of a live block.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownBlock`] when `id` is not live.
    pub fn template_of(&self, id: &BlockId) -> Result<&'static BlockTemplate, GraphError> {
        let block = self.require(id)?;
        self.registry.lookup(block.template)
    }

    /// Creates a block from the named template with default arguments.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownTemplate`] for an unregistered name,
    /// [`GraphError::DuplicateBlock`] when the requested id is live,
    /// [`GraphError::RetiredBlock`] when it belonged to a destroyed block, or
    /// [`GraphError::InvalidIdentifier`] when an output is given an id that
    /// cannot appear in program text.
    ///
    /// # Examples
    ///
    /// ```
    /// use blocksynth::store::{BlockStore, CreateOptions};
    /// let mut store = BlockStore::new();
    /// let id = store
    ///     .create("osc", CreateOptions::with_id("s1"))
    ///     .expect("osc is built in")
    ///     .id
    ///     .clone();
    /// assert_eq!(store.get(&id).map(|b| b.args.len()), Some(3));
    /// ```
    pub fn create(&mut self, name: &str, options: CreateOptions) -> Result<&Block, GraphError> {
        let template = self.registry.lookup(name)?;
        let id = match options.id {
            Some(id) => {
                if self.blocks.contains_key(&id) {
                    return Err(GraphError::DuplicateBlock(id));
                }
                if self.retired.contains(&id) {
                    return Err(GraphError::RetiredBlock(id));
                }
                if template.kind == BlockKind::Output && !id.is_identifier() {
                    return Err(GraphError::InvalidIdentifier(id));
                }
                id
            }
            // Output ids are written into program text.
            None if template.kind == BlockKind::Output => BlockId::fresh_identifier(),
            None => BlockId::fresh(),
        };
        let position = options.position.unwrap_or_else(|| Vec3::from(DEFAULT_SPAWN));
        let mut block = Block::from_template(template, id.clone(), position);
        if let Some(orientation) = options.orientation {
            block.orientation = orientation;
        }
        debug!("created {} block {id} at {position}", template.name);
        self.blocks.insert(id.clone(), block);
        self.notify();
        self.require(&id)
    }

    /// Looks up a live block.
    #[must_use]
    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Looks up a live block, failing when it does not exist.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownBlock`] when `id` is not live.
    pub fn require(&self, id: &BlockId) -> Result<&Block, GraphError> {
        self.blocks
            .get(id)
            .ok_or_else(|| GraphError::UnknownBlock(id.clone()))
    }

    /// Whether `id` names a live block.
    #[must_use]
    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    /// Number of live blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the store holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The full block mapping.
    #[must_use]
    pub const fn blocks(&self) -> &BlockMap {
        &self.blocks
    }

    /// Live blocks of `kind`, ordered by id.
    #[must_use]
    pub fn of_kind(&self, kind: BlockKind) -> Vec<&Block> {
        let mut found: Vec<&Block> = self.blocks.values().filter(|b| b.kind == kind).collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Merges patches into existing blocks and publishes the result once.
    ///
    /// Every patch is validated before any is applied, so a failing batch
    /// leaves the store untouched. Fields a patch omits are preserved.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownBlock`] when a patch targets a missing
    /// block, an argument error when a replacement argument list does not
    /// match the template, [`GraphError::ForbiddenLink`] when a source would
    /// gain a `prev` or an output a `next`, and [`GraphError::InvalidLink`]
    /// when a link points at the block itself or at a block that is not live.
    pub fn upsert_many<I>(&mut self, patches: I) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = (BlockId, BlockPatch)>,
    {
        let batch: Vec<(BlockId, BlockPatch)> = patches.into_iter().collect();
        for (id, patch) in &batch {
            let block = self.require(id)?;
            let template = self.registry.lookup(block.template)?;
            if let Some(args) = &patch.args {
                self.check_args(id, template, args)?;
            }
            if let Some(Some(target)) = &patch.prev {
                self.check_link(block, LinkSide::Prev, target)?;
            }
            if let Some(Some(target)) = &patch.next {
                self.check_link(block, LinkSide::Next, target)?;
            }
        }
        for (id, patch) in batch {
            if let Some(block) = self.blocks.get_mut(&id) {
                apply_patch(block, patch);
            }
        }
        self.notify();
        Ok(())
    }

    /// Replaces a single argument of a block.
    ///
    /// # Errors
    /// Returns [`GraphError::ArgumentIndex`] when `index` is outside the
    /// template's parameter list, [`GraphError::ArgumentType`] when the
    /// value has the wrong shape, and [`GraphError::ArgumentValue`] for a
    /// non-finite number or a texture that does not name a live output.
    pub fn set_argument(
        &mut self,
        id: &BlockId,
        index: usize,
        value: ParamValue,
    ) -> Result<(), GraphError> {
        let template = self.template_of(id)?;
        let spec = template
            .parameters
            .get(index)
            .ok_or_else(|| GraphError::ArgumentIndex {
                id: id.clone(),
                index,
            })?;
        if spec.value_type != value.value_type() {
            return Err(GraphError::ArgumentType {
                id: id.clone(),
                index,
                expected: spec.value_type,
            });
        }
        let mut args = self.require(id)?.args.clone();
        if let Some(slot) = args.get_mut(index) {
            *slot = value;
        }
        self.upsert_many([(
            id.clone(),
            BlockPatch {
                args: Some(args),
                ..BlockPatch::default()
            },
        )])
    }

    /// Removes a block and retires its id.
    ///
    /// Neighbour links are not repaired here; callers unlink the block first
    /// (see [`ConnectionResolver::detach`](crate::resolver::ConnectionResolver::detach)).
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownBlock`] when `id` is not live.
    pub fn destroy(&mut self, id: &BlockId) -> Result<Block, GraphError> {
        let block = self
            .blocks
            .remove(id)
            .ok_or_else(|| GraphError::UnknownBlock(id.clone()))?;
        if !block.is_unlinked() {
            warn!("destroyed block {id} while still linked; neighbours keep dangling ids");
        }
        self.retired.insert(id.clone());
        self.notify();
        Ok(block)
    }

    /// Registers a listener for change notifications.
    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Removes a listener; returns whether it was registered.
    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != subscription);
        self.listeners.len() != before
    }

    fn check_args(
        &self,
        id: &BlockId,
        template: &BlockTemplate,
        args: &[ParamValue],
    ) -> Result<(), GraphError> {
        if args.len() != template.parameters.len() {
            return Err(GraphError::ArgumentCount {
                id: id.clone(),
                expected: template.parameters.len(),
                actual: args.len(),
            });
        }
        for (index, (spec, value)) in template.parameters.iter().zip(args).enumerate() {
            if spec.value_type != value.value_type() {
                return Err(GraphError::ArgumentType {
                    id: id.clone(),
                    index,
                    expected: spec.value_type,
                });
            }
            let problem = match value {
                ParamValue::Float(v) if !v.is_finite() => Some("must be a finite number"),
                ParamValue::Texture(Some(name)) if !self.is_live_output(name) => {
                    Some("must name a live output")
                }
                _ => None,
            };
            if let Some(reason) = problem {
                return Err(GraphError::ArgumentValue {
                    id: id.clone(),
                    index,
                    reason,
                });
            }
        }
        Ok(())
    }

    fn is_live_output(&self, name: &str) -> bool {
        is_identifier(name)
            && self
                .blocks
                .get(&BlockId::from(name))
                .is_some_and(|block| block.kind == BlockKind::Output)
    }

    fn check_link(&self, block: &Block, side: LinkSide, target: &BlockId) -> Result<(), GraphError> {
        let allowed = match side {
            LinkSide::Prev => block.kind.accepts_predecessor(),
            LinkSide::Next => block.kind.accepts_successor(),
        };
        if !allowed {
            return Err(GraphError::ForbiddenLink {
                id: block.id.clone(),
                kind: block.kind,
                side,
            });
        }
        if *target == block.id || !self.blocks.contains_key(target) {
            return Err(GraphError::InvalidLink {
                id: block.id.clone(),
                side,
                target: target.clone(),
            });
        }
        Ok(())
    }

    fn notify(&mut self) {
        let mut listeners = std::mem::take(&mut self.listeners);
        for (_, listener) in &mut listeners {
            listener(&self.blocks);
        }
        // Listeners cannot subscribe re-entrantly, so nothing is lost here.
        self.listeners = listeners;
    }
}

fn apply_patch(block: &mut Block, patch: BlockPatch) {
    if let Some(args) = patch.args {
        block.args = args;
    }
    if let Some(position) = patch.position {
        block.position = position;
    }
    if let Some(orientation) = patch.orientation {
        block.orientation = orientation;
    }
    if let Some(prev) = patch.prev {
        block.prev = prev;
    }
    if let Some(next) = patch.next {
        block.next = next;
    }
}
