//! Constructors for workspaces and chains used across integration tests.

use blocksynth::{BlockId, CreateOptions, RecordingEngine, Workspace};
use glam::Vec3;

/// Shorthand for a world-space position.
///
/// # Examples
/// ```
/// use test_utils::pos;
/// assert_eq!(pos(1.0, 2.0, 3.0).y, 2.0);
/// ```
#[must_use]
pub fn pos(x: f32, y: f32, z: f32) -> Vec3 {
    Vec3::new(x, y, z)
}

/// An empty workspace recording every engine call.
#[must_use]
pub fn workspace() -> Workspace<RecordingEngine> {
    Workspace::new(RecordingEngine::new())
}

/// Spawns a block with an explicit id at `at`.
///
/// # Panics
/// Panics if the template is unknown or the id is taken.
pub fn spawn_at(
    workspace: &mut Workspace<RecordingEngine>,
    template: &str,
    id: &str,
    at: Vec3,
) -> BlockId {
    workspace
        .spawn(template, CreateOptions::with_id(id).at(at))
        .unwrap_or_else(|e| panic!("spawning {template} {id} failed: {e}"))
}

/// Builds a chain by dropping each block just right of the previous one.
///
/// The first block is spawned at `origin`; every following block is
/// spawned half a unit to the right of its predecessor and released, so
/// the resolver splices and snaps it.
///
/// # Panics
/// Panics if a spawn fails or a release does not splice.
pub fn build_chain(
    workspace: &mut Workspace<RecordingEngine>,
    blocks: &[(&str, &str)],
    origin: Vec3,
) -> Vec<BlockId> {
    let mut ids: Vec<BlockId> = Vec::with_capacity(blocks.len());
    for (template, id) in blocks {
        let at = match ids.last() {
            Some(last) => {
                let anchor = workspace
                    .store()
                    .get(last)
                    .map_or(origin, |b| b.position);
                anchor + Vec3::new(0.5, 0.0, 0.0)
            }
            None => origin,
        };
        let new_id = spawn_at(workspace, template, id, at);
        if !ids.is_empty() {
            let release = workspace
                .release(&new_id)
                .unwrap_or_else(|e| panic!("releasing {id} failed: {e}"));
            assert!(
                release.settlement.is_spliced(),
                "{id} did not splice: {:?}",
                release.settlement
            );
        }
        ids.push(new_id);
    }
    ids
}
