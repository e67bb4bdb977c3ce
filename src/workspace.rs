//! Event-driven session tying the store, resolver, compiler and engine.
//!
//! A [`Workspace`] is driven by the interaction layer: blocks are spawned,
//! dragged freely and then released. Only a release that changes the
//! topology, an argument edit on a live chain, or a removal recompiles and
//! redispatches. Everything runs synchronously inside the calling event.

use glam::{Quat, Vec3};
use log::{debug, info};

use crate::block::{BlockId, BlockPatch, ParamValue};
use crate::compiler::{Dispatch, ProgramCompiler};
use crate::config::Config;
use crate::constants::DEFAULT_OUTPUT_ID;
use crate::engine::ExecutionEngine;
use crate::error::GraphError;
use crate::resolver::{ConnectionResolver, ProximitySearch, Settlement};
use crate::store::{BlockStore, CreateOptions};

/// Outcome of releasing a dragged block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// How the resolver settled the block.
    pub settlement: Settlement,
    /// Dispatch performed when the topology changed.
    pub dispatch: Option<Dispatch>,
}

/// One editing session against one engine.
#[derive(Debug)]
pub struct Workspace<E> {
    store: BlockStore,
    resolver: ConnectionResolver,
    compiler: ProgramCompiler,
    engine: E,
    last_dispatch: Option<Dispatch>,
}

impl<E: ExecutionEngine> Workspace<E> {
    /// Empty workspace with default settings.
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self::with_config(&Config::default(), engine)
    }

    /// Empty workspace with the given settings.
    #[must_use]
    pub fn with_config(config: &Config, engine: E) -> Self {
        Self {
            store: BlockStore::new(),
            resolver: config.resolver(),
            compiler: config.compiler(),
            engine,
            last_dispatch: None,
        }
    }

    /// The block store.
    #[must_use]
    pub const fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Mutable store access, for subscribing listeners.
    pub fn store_mut(&mut self) -> &mut BlockStore {
        &mut self.store
    }

    /// The execution engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable engine access.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Consumes the workspace, returning its engine.
    #[must_use]
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Most recent dispatch, if any.
    #[must_use]
    pub const fn last_dispatch(&self) -> Option<&Dispatch> {
        self.last_dispatch.as_ref()
    }

    /// Creates an unlinked block.
    ///
    /// # Errors
    /// See [`BlockStore::create`].
    pub fn spawn(&mut self, template: &str, options: CreateOptions) -> Result<BlockId, GraphError> {
        Ok(self.store.create(template, options)?.id.clone())
    }

    /// Moves a block mid-drag without settling it.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownBlock`] when `id` is not live.
    pub fn drag(
        &mut self,
        id: &BlockId,
        position: Vec3,
        orientation: Option<Quat>,
    ) -> Result<(), GraphError> {
        let patch = BlockPatch {
            orientation,
            ..BlockPatch::moved_to(position)
        };
        self.store.upsert_many([(id.clone(), patch)])
    }

    /// Settles a released block, recompiling when it was spliced.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownBlock`] when `id` is not live, or
    /// [`GraphError::Engine`] when dispatch fails.
    pub fn release(&mut self, id: &BlockId) -> Result<Release, GraphError> {
        let settlement = self.resolver.settle(&mut self.store, id)?;
        self.after_settle(settlement)
    }

    /// Like [`Workspace::release`], reading placements from `scene`.
    ///
    /// # Errors
    /// As for [`Workspace::release`].
    pub fn release_in<S: ProximitySearch + ?Sized>(
        &mut self,
        scene: &S,
        id: &BlockId,
    ) -> Result<Release, GraphError> {
        let settlement = self.resolver.settle_with(scene, &mut self.store, id)?;
        self.after_settle(settlement)
    }

    fn after_settle(&mut self, settlement: Settlement) -> Result<Release, GraphError> {
        let dispatch = if settlement.is_spliced() {
            Some(self.recompile()?)
        } else {
            None
        };
        Ok(Release {
            settlement,
            dispatch,
        })
    }

    /// Replaces one argument; recompiles when the block feeds a renderable
    /// chain before or after the edit.
    ///
    /// # Errors
    /// See [`BlockStore::set_argument`].
    pub fn set_argument(
        &mut self,
        id: &BlockId,
        index: usize,
        value: ParamValue,
    ) -> Result<Option<Dispatch>, GraphError> {
        let was_live = self.on_renderable_chain(id)?;
        self.store.set_argument(id, index, value)?;
        if was_live || self.on_renderable_chain(id)? {
            self.recompile().map(Some)
        } else {
            debug!("argument {index} of {id} changed off any renderable chain");
            Ok(None)
        }
    }

    /// Unlinks a block from its chain, bridging its neighbours.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownBlock`] when `id` is not live.
    pub fn detach(&mut self, id: &BlockId) -> Result<Option<Dispatch>, GraphError> {
        if self.resolver.detach(&mut self.store, id)? {
            self.recompile().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Unlinks and removes a block, then recompiles.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownBlock`] when `id` is not live.
    pub fn destroy(&mut self, id: &BlockId) -> Result<Dispatch, GraphError> {
        self.resolver.detach(&mut self.store, id)?;
        let block = self.store.destroy(id)?;
        info!("destroyed {} block {id}", block.template);
        self.recompile()
    }

    /// Compiles every output and dispatches to the engine.
    ///
    /// # Errors
    /// Returns [`GraphError::Engine`] when the engine fails.
    pub fn recompile(&mut self) -> Result<Dispatch, GraphError> {
        let dispatch = self.compiler.run(&self.store, &mut self.engine)?;
        self.last_dispatch = Some(dispatch.clone());
        Ok(dispatch)
    }

    /// Creates the starting scene: an output, a source and a modifier laid
    /// out left to right, unlinked.
    ///
    /// # Errors
    /// Returns [`GraphError::DuplicateBlock`] when the default output id is
    /// already taken.
    pub fn seed_default_scene(&mut self) -> Result<Vec<BlockId>, GraphError> {
        let layout = [
            ("output", Some(DEFAULT_OUTPUT_ID), Vec3::new(-2.0, 1.0, -5.0)),
            ("osc", None, Vec3::new(0.0, 1.0, -5.0)),
            ("diff", None, Vec3::new(2.0, 1.0, -5.0)),
        ];
        let mut ids = Vec::with_capacity(layout.len());
        for (template, id, position) in layout {
            let options = CreateOptions {
                id: id.map(BlockId::from),
                ..CreateOptions::default()
            };
            ids.push(self.spawn(template, options.at(position))?);
        }
        info!("seeded default scene with {} blocks", ids.len());
        Ok(ids)
    }

    fn on_renderable_chain(&self, id: &BlockId) -> Result<bool, GraphError> {
        self.store.require(id)?;
        Ok(self.compiler.compile(&self.store)?.covers(id))
    }
}
