//! Boundary to the external execution engine.
//!
//! The engine is a black box that accepts program text and renders one
//! output, or every output at once. The workspace only ever talks to it
//! through [`ExecutionEngine`], so tests can substitute a recording or
//! mocked implementation.

use log::info;

use crate::block::BlockId;
use crate::error::EngineError;

/// Entry points of the external synthesis engine.
pub trait ExecutionEngine {
    /// Evaluates program text.
    ///
    /// # Errors
    /// Returns [`EngineError`] when the engine rejects the program.
    fn execute(&mut self, program: &str) -> Result<(), EngineError>;

    /// Shows `output`, or every output when `None`.
    ///
    /// # Errors
    /// Returns [`EngineError`] when the engine cannot render.
    fn render(&mut self, output: Option<&BlockId>) -> Result<(), EngineError>;

    /// Blanks the display.
    ///
    /// # Errors
    /// Returns [`EngineError`] when the engine cannot clear.
    fn clear(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// One call observed by a [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `execute` with the program text.
    Execute(String),
    /// `render` with the requested output.
    Render(Option<BlockId>),
    /// `clear`.
    Clear,
}

/// Engine that logs every call and keeps a transcript.
///
/// Used by the command-line driver and by tests that assert on the exact
/// call sequence.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    calls: Vec<EngineCall>,
}

impl RecordingEngine {
    /// Creates an engine with an empty transcript.
    #[must_use]
    pub const fn new() -> Self {
        Self { calls: Vec::new() }
    }

    /// Calls received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// Program text of the most recent `execute` call.
    #[must_use]
    pub fn last_program(&self) -> Option<&str> {
        self.calls.iter().rev().find_map(|call| match call {
            EngineCall::Execute(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Drains the transcript.
    pub fn take_calls(&mut self) -> Vec<EngineCall> {
        std::mem::take(&mut self.calls)
    }
}

impl ExecutionEngine for RecordingEngine {
    fn execute(&mut self, program: &str) -> Result<(), EngineError> {
        info!("execute {program}");
        self.calls.push(EngineCall::Execute(program.to_owned()));
        Ok(())
    }

    fn render(&mut self, output: Option<&BlockId>) -> Result<(), EngineError> {
        info!("render {}", output.map_or("all outputs", BlockId::as_str));
        self.calls.push(EngineCall::Render(output.cloned()));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), EngineError> {
        info!("clear");
        self.calls.push(EngineCall::Clear);
        Ok(())
    }
}
