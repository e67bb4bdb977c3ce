//! Library crate for spatially patched synthesis blocks.
//!
//! Blocks are created from templates, placed in 3D space and linked into
//! chains by dropping them next to each other. Each chain that runs from a
//! source to an output compiles into a program for an external engine.
//! Re-exports the common types for the binary and tests.
pub mod block;
pub mod chain;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod logging;
pub mod program;
pub mod resolver;
pub mod script;
pub mod store;
pub mod template;
pub mod vector_math;
pub mod workspace;
pub use constants::*;

// Re-export commonly used items
pub use block::{is_identifier, Block, BlockId, BlockPatch, LinkSide, ParamValue};
pub use chain::{build_program, build_program_fragment, Chain, ChainValidator};
pub use compiler::{Compilation, Dispatch, IdlePolicy, ProgramCompiler};
pub use config::Config;
pub use engine::{EngineCall, ExecutionEngine, RecordingEngine};
pub use error::{ConfigError, EngineError, GraphError, ScriptError, SerializeError};
pub use logging::init as init_logging;
pub use program::{ChainSyntax, Op, OpArg, Program, Serializer};
pub use resolver::{Anchor, ConnectionResolver, ProximitySearch, Settlement};
pub use script::{Script, ScriptEvent, ScriptOrientation};
pub use store::{BlockMap, BlockStore, CreateOptions};
pub use template::{BlockKind, BlockTemplate, ParamType, TemplateRegistry};
pub use vector_math::{is_right_of, right_axis, snap_position, vec_normalize};
pub use workspace::{Release, Workspace};

pub mod prelude {
    //! Prelude exports used in documentation examples.
    //!
    //! ```rust
    //! use blocksynth::prelude::*;
    //!
    //! let mut workspace = Workspace::new(RecordingEngine::new());
    //! let source = workspace
    //!     .spawn("osc", CreateOptions::default().at(Vec3::ZERO))
    //!     .expect("osc is built in");
    //! let output = workspace
    //!     .spawn("output", CreateOptions::with_id("o1").at(Vec3::new(0.5, 0.0, 0.0)))
    //!     .expect("output is built in");
    //! let release = workspace.release(&output).expect("o1 is live");
    //! assert!(release.settlement.is_spliced());
    //! assert_eq!(workspace.store().get(&output).and_then(|b| b.prev.clone()), Some(source));
    //! assert_eq!(workspace.engine().last_program(), Some("osc().out(o1)"));
    //! ```

    pub use crate::block::{BlockId, ParamValue};
    pub use crate::compiler::Dispatch;
    pub use crate::engine::{ExecutionEngine, RecordingEngine};
    pub use crate::resolver::Settlement;
    pub use crate::store::{BlockStore, CreateOptions};
    pub use crate::template::BlockKind;
    pub use crate::workspace::Workspace;
    pub use glam::{Quat, Vec3};
    pub use ordered_float::OrderedFloat;
}
