//! Placement constants shared by the resolver and the default configuration.
//!
//! Distances are world units in the scene's coordinate space.
//! [`Config`](crate::config::Config) starts from these values and may
//! override them per session.

/// Blocks whose anchors are strictly closer than this distance to a released
/// block are connection candidates.
pub const PROXIMITY_THRESHOLD: f32 = 1.0;
/// Distance along the left block's local +X axis at which a spliced right
/// block is snapped.
pub const SNAP_OFFSET: f32 = 1.0;
/// Spawn position used when a block is created without one.
pub const DEFAULT_SPAWN: [f32; 3] = [0.0, 0.0, 0.0];
/// Identifier of the output block placed by the default scene.
pub const DEFAULT_OUTPUT_ID: &str = "o1";
