//! Session configuration.
//!
//! Every field has a default, so a config file only needs the settings it
//! changes:
//!
//! ```json
//! { "proximity_threshold": 1.5, "idle_policy": "clear" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chain::{always_admissible, arguments_complete, ChainValidator};
use crate::compiler::{IdlePolicy, ProgramCompiler};
use crate::constants::{PROXIMITY_THRESHOLD, SNAP_OFFSET};
use crate::error::ConfigError;
use crate::resolver::ConnectionResolver;

/// Tunables for a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Release distance under which blocks become connection candidates.
    pub proximity_threshold: f32,
    /// Distance a spliced right block is placed from its left partner.
    pub snap_offset: f32,
    /// Engine handling when nothing is renderable.
    pub idle_policy: IdlePolicy,
    /// Treat blocks with unset texture arguments as breaking their chain.
    pub require_complete_arguments: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proximity_threshold: PROXIMITY_THRESHOLD,
            snap_offset: SNAP_OFFSET,
            idle_policy: IdlePolicy::Keep,
            require_complete_arguments: false,
        }
    }
}

impl Config {
    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or a
    /// distance is not a finite positive number.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = path.as_ref();
        let text = std::fs::read_to_string(file).map_err(|source| ConfigError::Io {
            path: file.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: file.display().to_string(),
            source,
        })?;
        config.validate()
    }

    /// Checks that both distances are finite and positive.
    ///
    /// # Errors
    /// Returns [`ConfigError::OutOfRange`] naming the first bad setting.
    pub fn validate(self) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("proximity_threshold", self.proximity_threshold),
            ("snap_offset", self.snap_offset),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }
        Ok(self)
    }

    /// Chain validator matching `require_complete_arguments`.
    #[must_use]
    pub const fn validator(&self) -> ChainValidator {
        if self.require_complete_arguments {
            ChainValidator::with_predicate(arguments_complete)
        } else {
            ChainValidator::with_predicate(always_admissible)
        }
    }

    /// Resolver using the configured distances.
    #[must_use]
    pub const fn resolver(&self) -> ConnectionResolver {
        ConnectionResolver::new(self.proximity_threshold, self.snap_offset)
    }

    /// Compiler using the configured validator and idle policy.
    #[must_use]
    pub const fn compiler(&self) -> ProgramCompiler {
        ProgramCompiler::new(self.validator(), self.idle_policy)
    }
}
