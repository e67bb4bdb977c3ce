//! Replayable interaction scripts.
//!
//! A script is a JSON array of events, applied in order:
//!
//! ```json
//! [
//!   { "event": "spawn", "template": "osc", "id": "s1", "position": [0, 1, -5] },
//!   { "event": "drag", "id": "o1", "position": [0.5, 1, -5] },
//!   { "event": "release", "id": "o1" },
//!   { "event": "set_argument", "id": "s1", "index": 0, "value": 30 }
//! ]
//! ```

use std::path::Path;

use glam::{Quat, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::block::{BlockId, ParamValue};
use crate::engine::ExecutionEngine;
use crate::error::{GraphError, ScriptError};
use crate::store::CreateOptions;
use crate::workspace::Workspace;

/// Argument value as written in a script: a number, a texture name or
/// `null` for an unset texture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptValue {
    /// Scalar argument.
    Float(f64),
    /// Texture argument.
    Texture(Option<String>),
}

impl From<ScriptValue> for ParamValue {
    fn from(value: ScriptValue) -> Self {
        match value {
            ScriptValue::Float(v) => Self::Float(v),
            ScriptValue::Texture(name) => Self::Texture(name),
        }
    }
}

/// Orientation written as a quaternion `[x, y, z, w]`.
///
/// Parsing normalises the quaternion and rejects values that do not
/// describe a rotation: all-zero or non-finite components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f32; 4]", into = "[f32; 4]")]
pub struct ScriptOrientation(Quat);

impl ScriptOrientation {
    /// The unit quaternion.
    #[must_use]
    pub const fn quat(self) -> Quat {
        self.0
    }
}

impl TryFrom<[f32; 4]> for ScriptOrientation {
    type Error = String;

    fn try_from(raw: [f32; 4]) -> Result<Self, Self::Error> {
        let quat = Quat::from_array(raw);
        if !quat.is_finite() || quat.length_squared() <= f32::EPSILON {
            return Err(format!("orientation {raw:?} is not a rotation"));
        }
        Ok(Self(quat.normalize()))
    }
}

impl From<ScriptOrientation> for [f32; 4] {
    fn from(orientation: ScriptOrientation) -> Self {
        orientation.0.to_array()
    }
}

/// One interaction event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// Create a block.
    Spawn {
        /// Template name.
        template: String,
        /// Explicit id; generated when omitted.
        #[serde(default)]
        id: Option<String>,
        /// Spawn position.
        #[serde(default)]
        position: Option<[f32; 3]>,
    },
    /// Move a block without settling it.
    Drag {
        /// Block to move.
        id: String,
        /// New position.
        position: [f32; 3],
        /// New orientation as `[x, y, z, w]`.
        #[serde(default)]
        orientation: Option<ScriptOrientation>,
    },
    /// End a drag and settle the block.
    Release {
        /// Block released.
        id: String,
    },
    /// Turn a knob.
    SetArgument {
        /// Block edited.
        id: String,
        /// Parameter position.
        index: usize,
        /// New value.
        value: ScriptValue,
    },
    /// Pull a block out of its chain.
    Detach {
        /// Block detached.
        id: String,
    },
    /// Remove a block.
    Destroy {
        /// Block removed.
        id: String,
    },
}

impl ScriptEvent {
    /// Applies the event to `workspace`.
    ///
    /// # Errors
    /// Returns the [`GraphError`] raised by the workspace.
    pub fn apply<E: ExecutionEngine>(self, workspace: &mut Workspace<E>) -> Result<(), GraphError> {
        match self {
            Self::Spawn {
                template,
                id,
                position,
            } => {
                let options = CreateOptions {
                    id: id.map(BlockId::from),
                    position: position.map(Vec3::from),
                    orientation: None,
                };
                let spawned = workspace.spawn(&template, options)?;
                debug!("script spawned {template} {spawned}");
            }
            Self::Drag {
                id,
                position,
                orientation,
            } => {
                workspace.drag(
                    &id.into(),
                    Vec3::from(position),
                    orientation.map(ScriptOrientation::quat),
                )?;
            }
            Self::Release { id } => {
                let release = workspace.release(&id.into())?;
                debug!("script release settled as {:?}", release.settlement);
            }
            Self::SetArgument { id, index, value } => {
                workspace.set_argument(&id.into(), index, value.into())?;
            }
            Self::Detach { id } => {
                workspace.detach(&id.into())?;
            }
            Self::Destroy { id } => {
                workspace.destroy(&id.into())?;
            }
        }
        Ok(())
    }
}

/// Ordered list of events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    /// Events in replay order.
    pub events: Vec<ScriptEvent>,
}

impl Script {
    /// Parses a script from JSON text.
    ///
    /// # Errors
    /// Returns [`ScriptError::Parse`] for malformed input.
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a script file.
    ///
    /// # Errors
    /// Returns [`ScriptError::Io`] or [`ScriptError::Parse`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let file = path.as_ref();
        let text = std::fs::read_to_string(file).map_err(|source| ScriptError::Io {
            path: file.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Applies every event in order, stopping at the first failure.
    ///
    /// # Errors
    /// Returns [`ScriptError::Event`] naming the failing event.
    pub fn replay<E: ExecutionEngine>(self, workspace: &mut Workspace<E>) -> Result<(), ScriptError> {
        for (index, event) in self.events.into_iter().enumerate() {
            event
                .apply(workspace)
                .map_err(|source| ScriptError::Event { index, source })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Dispatch;
    use crate::engine::RecordingEngine;
    use rstest::rstest;

    const SPLICE: &str = r#"[
        { "event": "spawn", "template": "osc", "id": "s1", "position": [0, 1, -5] },
        { "event": "spawn", "template": "output", "id": "o1", "position": [4, 1, -5] },
        { "event": "drag", "id": "o1", "position": [0.5, 1, -5] },
        { "event": "release", "id": "o1" },
        { "event": "set_argument", "id": "s1", "index": 0, "value": 30 }
    ]"#;

    #[rstest]
    fn replay_splices_and_edits() {
        let script = Script::parse(SPLICE).expect("valid script");
        assert_eq!(script.events.len(), 5);
        let mut workspace = Workspace::new(RecordingEngine::new());
        script.replay(&mut workspace).expect("events apply");
        assert_eq!(
            workspace.last_dispatch(),
            Some(&Dispatch::Single {
                output: "o1".into(),
                text: "osc(30).out(o1)".to_owned()
            })
        );
    }

    #[rstest]
    #[case("30", ScriptValue::Float(30.0))]
    #[case("\"o2\"", ScriptValue::Texture(Some("o2".to_owned())))]
    #[case("null", ScriptValue::Texture(None))]
    fn values_are_untagged(#[case] text: &str, #[case] expected: ScriptValue) {
        let value: ScriptValue = serde_json::from_str(text).expect("valid value");
        assert_eq!(value, expected);
    }

    #[rstest]
    fn failing_event_is_located() {
        let script = Script::parse(r#"[{ "event": "release", "id": "ghost" }]"#)
            .expect("valid script");
        let mut workspace = Workspace::new(RecordingEngine::new());
        let err = script.replay(&mut workspace).expect_err("ghost is not live");
        assert!(matches!(
            err,
            ScriptError::Event {
                index: 0,
                source: GraphError::UnknownBlock(_)
            }
        ));
    }

    #[rstest]
    #[case("[0, 0, 0, 0]")]
    #[case("[0, 0, 0, 1e39]")]
    fn degenerate_orientations_fail_to_parse(#[case] orientation: &str) {
        let text = format!(
            r#"[{{ "event": "drag", "id": "s1", "position": [0, 0, 0], "orientation": {orientation} }}]"#
        );
        assert!(matches!(Script::parse(&text), Err(ScriptError::Parse(_))));
    }

    #[rstest]
    fn orientations_are_normalised() {
        let script = Script::parse(
            r#"[{ "event": "drag", "id": "s1", "position": [0, 0, 0], "orientation": [0, 0, 0, 2] }]"#,
        )
        .expect("valid script");
        let Some(ScriptEvent::Drag {
            orientation: Some(orientation),
            ..
        }) = script.events.first()
        else {
            panic!("expected a drag with an orientation, got {:?}", script.events);
        };
        assert_eq!(orientation.quat(), Quat::IDENTITY);
    }

    #[rstest]
    fn unknown_event_fails_to_parse() {
        assert!(matches!(
            Script::parse(r#"[{ "event": "teleport", "id": "s1" }]"#),
            Err(ScriptError::Parse(_))
        ));
    }
}
