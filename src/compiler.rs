//! Program compilation and render dispatch.
//!
//! Every output block is a traversal root. Renderable roots compile to a
//! [`CompiledChain`]; the rest are skipped silently. Dispatch then depends
//! only on how many chains compiled: none leaves the engine alone (or
//! clears it, per [`IdlePolicy`]), one threads its program text through
//! `execute` and a scoped `render`, and several issue a bare render-all.

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::block::BlockId;
use crate::chain::{build_program, Chain, ChainValidator};
use crate::engine::ExecutionEngine;
use crate::error::{EngineError, GraphError};
use crate::program::{ChainSyntax, Program, Serializer};
use crate::store::BlockStore;
use crate::template::BlockKind;

/// What to do when no chain is renderable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdlePolicy {
    /// Leave whatever the engine last ran in place.
    #[default]
    Keep,
    /// Clear the engine once when the last renderable chain disappears.
    Clear,
}

/// A renderable chain together with its compiled program.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledChain {
    /// Output block the chain ends at.
    pub output: BlockId,
    /// Blocks on the chain, source first.
    pub chain: Chain,
    /// Typed program.
    pub program: Program,
    /// Serialised program text.
    pub text: String,
}

/// Result of compiling every output in a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compilation {
    chains: Vec<CompiledChain>,
}

impl Compilation {
    /// Compiled chains ordered by output id.
    #[must_use]
    pub fn chains(&self) -> &[CompiledChain] {
        &self.chains
    }

    /// Number of renderable outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether no output is renderable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// The compiled chain ending at `output`.
    #[must_use]
    pub fn get(&self, output: &BlockId) -> Option<&CompiledChain> {
        self.chains.iter().find(|c| c.output == *output)
    }

    /// Whether `id` lies on any renderable chain.
    #[must_use]
    pub fn covers(&self, id: &BlockId) -> bool {
        self.chains.iter().any(|c| c.chain.contains(id))
    }
}

/// How the engine was driven after a compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing renderable; the engine was not called.
    Idle,
    /// Nothing renderable; the engine was cleared.
    Cleared,
    /// One renderable output; its program was executed and rendered.
    Single {
        /// Output rendered.
        output: BlockId,
        /// Program text executed.
        text: String,
    },
    /// Several renderable outputs; a bare render-all was issued.
    All {
        /// Outputs that were renderable, ordered by id.
        outputs: Vec<BlockId>,
    },
}

/// Compiles renderable chains and dispatches them to an engine.
#[derive(Debug, Clone)]
pub struct ProgramCompiler<S = ChainSyntax> {
    validator: ChainValidator,
    serializer: S,
    idle_policy: IdlePolicy,
    /// Whether the engine currently shows something this compiler sent.
    active: bool,
}

impl Default for ProgramCompiler {
    fn default() -> Self {
        Self::new(ChainValidator::new(), IdlePolicy::Keep)
    }
}

impl ProgramCompiler {
    /// Compiler using the chained-call syntax.
    #[must_use]
    pub const fn new(validator: ChainValidator, idle_policy: IdlePolicy) -> Self {
        Self::with_serializer(validator, idle_policy, ChainSyntax)
    }
}

impl<S: Serializer> ProgramCompiler<S> {
    /// Compiler using a custom serialiser.
    #[must_use]
    pub const fn with_serializer(
        validator: ChainValidator,
        idle_policy: IdlePolicy,
        serializer: S,
    ) -> Self {
        Self {
            validator,
            serializer,
            idle_policy,
            active: false,
        }
    }

    /// Policy applied when nothing is renderable.
    #[must_use]
    pub const fn idle_policy(&self) -> IdlePolicy {
        self.idle_policy
    }

    /// Compiles every renderable output in `store`, ordered by output id.
    ///
    /// # Errors
    /// Returns a [`GraphError`] if a block on a chain names a template the
    /// registry no longer knows, or [`GraphError::Serialize`] when a chain
    /// holds a value the serialiser cannot write.
    pub fn compile(&self, store: &BlockStore) -> Result<Compilation, GraphError> {
        let mut chains = Vec::new();
        for output in store.of_kind(BlockKind::Output) {
            let Some(chain) = self.validator.trace(store, &output.id) else {
                continue;
            };
            let program = build_program(store, &output.id)?;
            let text = self.serializer.serialize(&program)?;
            debug!("compiled {}: {text}", output.id);
            chains.push(CompiledChain {
                output: output.id.clone(),
                chain,
                program,
                text,
            });
        }
        Ok(Compilation { chains })
    }

    /// Drives `engine` according to how many chains compiled.
    ///
    /// # Errors
    /// Propagates the first [`EngineError`] the engine reports.
    pub fn dispatch<E: ExecutionEngine + ?Sized>(
        &mut self,
        compilation: &Compilation,
        engine: &mut E,
    ) -> Result<Dispatch, EngineError> {
        let outcome = match compilation.chains() {
            [] => {
                if self.idle_policy == IdlePolicy::Clear && self.active {
                    engine.clear().inspect_err(|e| error!("{e}"))?;
                    self.active = false;
                    info!("no renderable chains; engine cleared");
                    Dispatch::Cleared
                } else {
                    debug!("no renderable chains; engine left as is");
                    Dispatch::Idle
                }
            }
            [single] => {
                engine.execute(&single.text).inspect_err(|e| error!("{e}"))?;
                engine
                    .render(Some(&single.output))
                    .inspect_err(|e| error!("{e}"))?;
                self.active = true;
                info!("rendering {} with {}", single.output, single.text);
                Dispatch::Single {
                    output: single.output.clone(),
                    text: single.text.clone(),
                }
            }
            many => {
                engine.render(None).inspect_err(|e| error!("{e}"))?;
                self.active = true;
                info!("rendering all {} outputs", many.len());
                Dispatch::All {
                    outputs: many.iter().map(|c| c.output.clone()).collect(),
                }
            }
        };
        Ok(outcome)
    }

    /// Compiles `store` and dispatches the result.
    ///
    /// # Errors
    /// Returns a [`GraphError`] from compilation, or
    /// [`GraphError::Engine`] when the engine fails.
    pub fn run<E: ExecutionEngine + ?Sized>(
        &mut self,
        store: &BlockStore,
        engine: &mut E,
    ) -> Result<Dispatch, GraphError> {
        let compilation = self.compile(store)?;
        Ok(self.dispatch(&compilation, engine)?)
    }
}
