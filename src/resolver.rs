//! Spatial connection resolver.
//!
//! Runs once per released block. The nearest block within the proximity
//! threshold becomes the overlapped partner; the partner's local right axis
//! decides which of the two is upstream. Kind rules reject links that would
//! give a source a predecessor or an output a successor, and re-dropping a
//! block onto its current predecessor changes nothing.
//!
//! Link rewrites are planned against an overlay and published through a
//! single [`BlockStore::upsert_many`] call, so listeners never observe a
//! half-spliced chain.

use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use log::{debug, info, warn};
use ordered_float::OrderedFloat;

use crate::block::{BlockId, BlockPatch};
use crate::constants::{PROXIMITY_THRESHOLD, SNAP_OFFSET};
use crate::error::GraphError;
use crate::store::BlockStore;
use crate::template::BlockKind;
use crate::vector_math::{is_right_of, snap_position};

/// Placement of a block in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    /// Block the anchor belongs to.
    pub id: BlockId,
    /// World-space position.
    pub position: Vec3,
    /// World-space orientation.
    pub orientation: Quat,
}

/// Scene query supplied by the interaction layer.
pub trait ProximitySearch {
    /// Current placement of `id`, if the scene knows it.
    fn anchor(&self, id: &BlockId) -> Option<Anchor>;

    /// Anchors strictly closer than `radius` to `origin`, excluding `exclude`.
    fn anchors_within(&self, origin: Vec3, radius: f32, exclude: &BlockId) -> Vec<Anchor>;
}

impl ProximitySearch for BlockStore {
    fn anchor(&self, id: &BlockId) -> Option<Anchor> {
        self.get(id).map(|b| Anchor {
            id: b.id.clone(),
            position: b.position,
            orientation: b.orientation,
        })
    }

    fn anchors_within(&self, origin: Vec3, radius: f32, exclude: &BlockId) -> Vec<Anchor> {
        self.blocks()
            .values()
            .filter(|b| b.id != *exclude && b.position.distance(origin) < radius)
            .map(|b| Anchor {
                id: b.id.clone(),
                position: b.position,
                orientation: b.orientation,
            })
            .collect()
    }
}

/// Outcome of settling a released block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// No block lies within the threshold; the block stays where it is.
    Isolated,
    /// The pair violates a kind rule; nothing changed.
    Invalid {
        /// Would-be upstream block.
        left: BlockId,
        /// Would-be downstream block.
        right: BlockId,
    },
    /// `right` already follows `left`; nothing changed.
    NoOp {
        /// Existing upstream block.
        left: BlockId,
        /// Existing downstream block.
        right: BlockId,
    },
    /// `right` now follows `left`.
    Spliced {
        /// Upstream block.
        left: BlockId,
        /// Downstream block, snapped beside `left`.
        right: BlockId,
        /// Former successor of `left` cut loose because `right` is an output.
        displaced: Option<BlockId>,
    },
}

impl Settlement {
    /// Whether the graph topology changed.
    #[must_use]
    pub const fn is_spliced(&self) -> bool {
        matches!(self, Self::Spliced { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Links {
    prev: Option<BlockId>,
    next: Option<BlockId>,
}

/// Pending link rewrites layered over the store.
struct LinkPlan<'s> {
    store: &'s BlockStore,
    links: BTreeMap<BlockId, Links>,
}

impl<'s> LinkPlan<'s> {
    const fn new(store: &'s BlockStore) -> Self {
        Self {
            store,
            links: BTreeMap::new(),
        }
    }

    /// Links of a live block, loading them from the store on first use.
    ///
    /// Links to blocks that are no longer live load as `None`, so the plan
    /// clears them instead of republishing them.
    fn get(&mut self, id: &BlockId) -> Option<&mut Links> {
        if !self.links.contains_key(id) {
            let store = self.store;
            let block = store.get(id)?;
            let live = |link: &Option<BlockId>| link.clone().filter(|target| store.contains(target));
            self.links.insert(
                id.clone(),
                Links {
                    prev: live(&block.prev),
                    next: live(&block.next),
                },
            );
        }
        self.links.get_mut(id)
    }

    fn links_of(&mut self, id: &BlockId) -> Links {
        self.get(id).cloned().unwrap_or_default()
    }

    fn set_prev(&mut self, id: &BlockId, prev: Option<BlockId>) {
        let Some(links) = self.get(id) else {
            warn!("skipping link update for missing block {id}");
            return;
        };
        links.prev = prev;
    }

    fn set_next(&mut self, id: &BlockId, next: Option<BlockId>) {
        let Some(links) = self.get(id) else {
            warn!("skipping link update for missing block {id}");
            return;
        };
        links.next = next;
    }

    /// Bridges `id`'s neighbours and clears its own links.
    fn detach(&mut self, id: &BlockId) {
        let Links { prev, next } = self.links_of(id);
        if let Some(prev_id) = &prev {
            self.set_next(prev_id, next.clone());
        }
        if let Some(next_id) = &next {
            self.set_prev(next_id, prev);
        }
        self.set_prev(id, None);
        self.set_next(id, None);
    }

    /// Inserts `right` directly after `left`. Returns the block displaced
    /// when `right` cannot carry a successor.
    fn insert_after(&mut self, left: &BlockId, right: &BlockId, right_kind: BlockKind) -> Option<BlockId> {
        self.detach(right);
        let successor = self.links_of(left).next;
        let mut displaced = None;
        if let Some(successor_id) = &successor {
            if right_kind.accepts_successor() {
                self.set_prev(successor_id, Some(right.clone()));
                self.set_next(right, successor.clone());
            } else {
                self.set_prev(successor_id, None);
                displaced = successor;
            }
        }
        self.set_prev(right, Some(left.clone()));
        self.set_next(left, Some(right.clone()));
        displaced
    }

    /// Patches for every block whose links differ from the store.
    fn into_patches(self) -> BTreeMap<BlockId, BlockPatch> {
        let store = self.store;
        self.links
            .into_iter()
            .filter_map(|(id, links)| {
                let block = store.get(&id)?;
                let mut patch = BlockPatch::default();
                if block.prev != links.prev {
                    patch.prev = Some(links.prev);
                }
                if block.next != links.next {
                    patch.next = Some(links.next);
                }
                (!patch.is_empty()).then_some((id, patch))
            })
            .collect()
    }
}

/// Decides and applies links for released blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionResolver {
    threshold: f32,
    snap_offset: f32,
}

impl Default for ConnectionResolver {
    fn default() -> Self {
        Self::new(PROXIMITY_THRESHOLD, SNAP_OFFSET)
    }
}

impl ConnectionResolver {
    /// Resolver with explicit proximity threshold and snap distance.
    #[must_use]
    pub const fn new(threshold: f32, snap_offset: f32) -> Self {
        Self {
            threshold,
            snap_offset,
        }
    }

    /// Proximity threshold in world units.
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Nearest candidate to `dropped`; ties break on the smaller id.
    fn nearest<S: ProximitySearch + ?Sized>(&self, scene: &S, dropped: &Anchor) -> Option<Anchor> {
        scene
            .anchors_within(dropped.position, self.threshold, &dropped.id)
            .into_iter()
            .min_by(|a, b| {
                let da = OrderedFloat(a.position.distance(dropped.position));
                let db = OrderedFloat(b.position.distance(dropped.position));
                da.cmp(&db).then_with(|| a.id.cmp(&b.id))
            })
    }

    /// Settles `moved` using the store itself as the scene.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownBlock`] when `moved` is not live.
    pub fn settle(&self, store: &mut BlockStore, moved: &BlockId) -> Result<Settlement, GraphError> {
        let dropped = store
            .anchor(moved)
            .ok_or_else(|| GraphError::UnknownBlock(moved.clone()))?;
        let overlapped = self.nearest(&*store, &dropped);
        self.connect(store, dropped, overlapped)
    }

    /// Settles `moved` using an external scene for placement queries.
    ///
    /// The released block's scene position is written back to the store
    /// whatever the outcome.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownBlock`] when `moved` is unknown to the
    /// scene or the store.
    pub fn settle_with<S: ProximitySearch + ?Sized>(
        &self,
        scene: &S,
        store: &mut BlockStore,
        moved: &BlockId,
    ) -> Result<Settlement, GraphError> {
        let dropped = scene
            .anchor(moved)
            .ok_or_else(|| GraphError::UnknownBlock(moved.clone()))?;
        let overlapped = self.nearest(scene, &dropped);
        self.connect(store, dropped, overlapped)
    }

    fn connect(
        &self,
        store: &mut BlockStore,
        dropped: Anchor,
        candidate: Option<Anchor>,
    ) -> Result<Settlement, GraphError> {
        let Some(overlapped) = candidate.filter(|a| store.contains(&a.id)) else {
            debug!("{} released with no neighbour in range", dropped.id);
            sync_position(store, &dropped)?;
            return Ok(Settlement::Isolated);
        };

        let dropped_is_right =
            is_right_of(overlapped.position, overlapped.orientation, dropped.position);
        let (left, right) = if dropped_is_right {
            (&overlapped, &dropped)
        } else {
            (&dropped, &overlapped)
        };
        let left_kind = store.require(&left.id)?.kind;
        let right_block = store.require(&right.id)?;
        let right_kind = right_block.kind;

        if !left_kind.accepts_successor() || !right_kind.accepts_predecessor() {
            debug!(
                "rejected link {} -> {}: {left_kind:?} cannot feed {right_kind:?}",
                left.id, right.id
            );
            sync_position(store, &dropped)?;
            return Ok(Settlement::Invalid {
                left: left.id.clone(),
                right: right.id.clone(),
            });
        }
        if right_block.prev.as_ref() == Some(&left.id) {
            debug!("{} already follows {}; nothing to do", right.id, left.id);
            sync_position(store, &dropped)?;
            return Ok(Settlement::NoOp {
                left: left.id.clone(),
                right: right.id.clone(),
            });
        }

        let mut plan = LinkPlan::new(store);
        let displaced = plan.insert_after(&left.id, &right.id, right_kind);
        let mut patches = plan.into_patches();
        let snapped = snap_position(left.position, left.orientation, self.snap_offset);
        let dropped_patch = patches.entry(dropped.id.clone()).or_default();
        dropped_patch.position = Some(dropped.position);
        let right_patch = patches.entry(right.id.clone()).or_default();
        right_patch.position = Some(snapped);
        store.upsert_many(patches)?;

        info!("spliced {} -> {} (snapped to {snapped})", left.id, right.id);
        if let Some(cut) = &displaced {
            info!("{cut} cut loose: output {} ends the chain", right.id);
        }
        Ok(Settlement::Spliced {
            left: left.id.clone(),
            right: right.id.clone(),
            displaced,
        })
    }

    /// Removes `id` from its chain, joining its former neighbours.
    ///
    /// Returns whether any link changed.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownBlock`] when `id` is not live.
    pub fn detach(&self, store: &mut BlockStore, id: &BlockId) -> Result<bool, GraphError> {
        store.require(id)?;
        let mut plan = LinkPlan::new(store);
        plan.detach(id);
        let patches = plan.into_patches();
        if patches.is_empty() {
            return Ok(false);
        }
        store.upsert_many(patches)?;
        info!("detached {id} from its chain");
        Ok(true)
    }
}

/// Records a released block's scene position when the store lags behind.
fn sync_position(store: &mut BlockStore, dropped: &Anchor) -> Result<(), GraphError> {
    if store.require(&dropped.id)?.position == dropped.position {
        return Ok(());
    }
    store.upsert_many([(dropped.id.clone(), BlockPatch::moved_to(dropped.position))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CreateOptions;
    use rstest::{fixture, rstest};

    #[fixture]
    fn resolver() -> ConnectionResolver {
        ConnectionResolver::default()
    }

    fn spawn(store: &mut BlockStore, template: &str, id: &str, at: Vec3) -> BlockId {
        store
            .create(template, CreateOptions::with_id(id).at(at))
            .expect("create should succeed")
            .id
            .clone()
    }

    fn links(store: &BlockStore, id: &BlockId) -> (Option<BlockId>, Option<BlockId>) {
        let block = store.require(id).expect("block exists");
        (block.prev.clone(), block.next.clone())
    }

    #[rstest]
    fn isolated_release_is_a_noop(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        let s = spawn(&mut store, "osc", "s", Vec3::ZERO);
        spawn(&mut store, "output", "o", Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(resolver.settle(&mut store, &s), Ok(Settlement::Isolated));
        assert_eq!(links(&store, &s), (None, None));
    }

    #[rstest]
    fn threshold_is_exclusive(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        let s = spawn(&mut store, "osc", "s", Vec3::ZERO);
        spawn(&mut store, "output", "o", Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(resolver.settle(&mut store, &s), Ok(Settlement::Isolated));
    }

    #[rstest]
    fn drop_to_the_right_links_after_neighbour(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        let s = spawn(&mut store, "osc", "s", Vec3::new(0.0, 1.0, -5.0));
        let o = spawn(&mut store, "output", "o", Vec3::new(0.6, 1.2, -5.0));
        let outcome = resolver.settle(&mut store, &o).expect("o is live");
        assert_eq!(
            outcome,
            Settlement::Spliced {
                left: s.clone(),
                right: o.clone(),
                displaced: None
            }
        );
        assert_eq!(links(&store, &s), (None, Some(o.clone())));
        assert_eq!(links(&store, &o), (Some(s), None));
        assert_eq!(
            store.require(&o).expect("block exists").position,
            Vec3::new(1.0, 1.0, -5.0)
        );
    }

    #[rstest]
    fn drop_to_the_left_pulls_neighbour_alongside(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        let d = spawn(&mut store, "diff", "d", Vec3::new(2.0, 0.0, 0.0));
        let s = spawn(&mut store, "osc", "s", Vec3::new(1.5, 0.0, 0.0));
        resolver.settle(&mut store, &s).expect("s is live");
        assert_eq!(links(&store, &d), (Some(s.clone()), None));
        assert_eq!(
            store.require(&d).expect("block exists").position,
            Vec3::new(2.5, 0.0, 0.0)
        );
        assert_eq!(
            store.require(&s).expect("block exists").position,
            Vec3::new(1.5, 0.0, 0.0)
        );
    }

    #[rstest]
    #[case("output", "osc", "left output")]
    #[case("diff", "osc", "right source")]
    #[case("output", "diff", "left output before modifier")]
    fn kind_rules_reject_links(
        resolver: ConnectionResolver,
        #[case] left: &str,
        #[case] right: &str,
        #[case] description: &str,
    ) {
        let mut store = BlockStore::new();
        let l = spawn(&mut store, left, "l", Vec3::ZERO);
        let r = spawn(&mut store, right, "r", Vec3::new(0.5, 0.0, 0.0));
        let outcome = resolver.settle(&mut store, &r).expect("r is live");
        assert_eq!(
            outcome,
            Settlement::Invalid {
                left: l.clone(),
                right: r.clone()
            },
            "{description}"
        );
        assert_eq!(links(&store, &l), (None, None), "{description}");
        assert_eq!(links(&store, &r), (None, None), "{description}");
        assert_eq!(
            store.require(&r).expect("block exists").position,
            Vec3::new(0.5, 0.0, 0.0),
            "{description}"
        );
    }

    #[rstest]
    fn redrop_onto_predecessor_is_idempotent(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        let s = spawn(&mut store, "osc", "s", Vec3::ZERO);
        let o = spawn(&mut store, "output", "o", Vec3::new(0.5, 0.0, 0.0));
        resolver.settle(&mut store, &o).expect("o is live");
        // The snap leaves the pair exactly one threshold apart; nudge closer.
        store
            .upsert_many([(o.clone(), BlockPatch::moved_to(Vec3::new(0.5, 0.0, 0.0)))])
            .expect("drag applies");
        let before = store.blocks().clone();
        let outcome = resolver.settle(&mut store, &o).expect("o is live");
        assert_eq!(
            outcome,
            Settlement::NoOp {
                left: s,
                right: o
            }
        );
        assert_eq!(store.blocks(), &before);
    }

    #[rstest]
    fn nearest_candidate_wins(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        spawn(&mut store, "osc", "far", Vec3::new(-0.5, 0.3, 0.0));
        let near = spawn(&mut store, "osc", "near", Vec3::new(0.0, 0.3, 0.0));
        let o = spawn(&mut store, "output", "o", Vec3::new(0.2, 0.3, 0.0));
        let outcome = resolver.settle(&mut store, &o).expect("o is live");
        assert_eq!(
            outcome,
            Settlement::Spliced {
                left: near,
                right: o,
                displaced: None
            }
        );
    }

    #[rstest]
    fn equidistant_candidates_break_on_id(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        spawn(&mut store, "osc", "b", Vec3::new(0.0, 0.5, 0.0));
        let a = spawn(&mut store, "osc", "a", Vec3::new(0.0, -0.5, 0.0));
        let o = spawn(&mut store, "output", "o", Vec3::new(0.1, 0.0, 0.0));
        let outcome = resolver.settle(&mut store, &o).expect("o is live");
        assert!(matches!(outcome, Settlement::Spliced { left, .. } if left == a));
    }

    #[rstest]
    fn insertion_adopts_left_successor(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        let s = spawn(&mut store, "osc", "s", Vec3::ZERO);
        let o = spawn(&mut store, "output", "o", Vec3::new(0.5, 0.0, 0.0));
        resolver.settle(&mut store, &o).expect("o is live");
        // Output now sits at x = 1.0; drop the modifier just right of the source.
        let m = spawn(&mut store, "diff", "m", Vec3::new(0.3, 0.0, 0.0));
        let outcome = resolver.settle(&mut store, &m).expect("m is live");
        assert!(outcome.is_spliced());
        assert_eq!(links(&store, &s), (None, Some(m.clone())));
        assert_eq!(links(&store, &m), (Some(s), Some(o.clone())));
        assert_eq!(links(&store, &o), (Some(m), None));
    }

    #[rstest]
    fn splice_clears_links_to_destroyed_blocks(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        let s = spawn(&mut store, "osc", "s", Vec3::ZERO);
        let o = spawn(&mut store, "output", "o", Vec3::new(0.5, 0.0, 0.0));
        resolver.settle(&mut store, &o).expect("o is live");
        store.destroy(&o).expect("o is live");
        assert_eq!(links(&store, &s), (None, Some(o)));

        let m = spawn(&mut store, "diff", "m", Vec3::new(0.3, 0.0, 0.0));
        let outcome = resolver.settle(&mut store, &m).expect("m is live");
        assert!(outcome.is_spliced());
        assert_eq!(links(&store, &s), (None, Some(m.clone())));
        assert_eq!(links(&store, &m), (Some(s), None));
    }

    #[rstest]
    fn output_insertion_displaces_successor(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        let s = spawn(&mut store, "osc", "s", Vec3::ZERO);
        let m = spawn(&mut store, "diff", "m", Vec3::new(0.5, 0.0, 0.0));
        resolver.settle(&mut store, &m).expect("m is live");
        let o = spawn(&mut store, "output", "o", Vec3::new(0.2, 0.4, 0.0));
        let outcome = resolver.settle(&mut store, &o).expect("o is live");
        assert_eq!(
            outcome,
            Settlement::Spliced {
                left: s.clone(),
                right: o.clone(),
                displaced: Some(m.clone())
            }
        );
        assert_eq!(links(&store, &s), (None, Some(o.clone())));
        assert_eq!(links(&store, &o), (Some(s), None));
        assert_eq!(links(&store, &m), (None, None));
    }

    #[rstest]
    fn moving_a_linked_block_repairs_its_old_chain(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        let s1 = spawn(&mut store, "osc", "s1", Vec3::ZERO);
        let m = spawn(&mut store, "diff", "m", Vec3::new(0.5, 0.0, 0.0));
        resolver.settle(&mut store, &m).expect("m is live");
        let o = spawn(&mut store, "output", "o", Vec3::new(1.5, 0.0, 0.0));
        resolver.settle(&mut store, &o).expect("o is live");
        assert_eq!(links(&store, &m), (Some(s1.clone()), Some(o.clone())));

        let s2 = spawn(&mut store, "osc", "s2", Vec3::new(10.0, 0.0, 0.0));
        store
            .upsert_many([(m.clone(), BlockPatch::moved_to(Vec3::new(10.5, 0.0, 0.0)))])
            .expect("drag applies");
        resolver.settle(&mut store, &m).expect("m is live");

        assert_eq!(links(&store, &s1), (None, Some(o.clone())));
        assert_eq!(links(&store, &o), (Some(s1), None));
        assert_eq!(links(&store, &s2), (None, Some(m.clone())));
        assert_eq!(links(&store, &m), (Some(s2), None));
    }

    #[rstest]
    fn detach_bridges_neighbours(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        let s = spawn(&mut store, "osc", "s", Vec3::ZERO);
        let m = spawn(&mut store, "diff", "m", Vec3::new(0.5, 0.0, 0.0));
        resolver.settle(&mut store, &m).expect("m is live");
        let o = spawn(&mut store, "output", "o", Vec3::new(1.5, 0.0, 0.0));
        resolver.settle(&mut store, &o).expect("o is live");

        assert_eq!(resolver.detach(&mut store, &m), Ok(true));
        assert_eq!(links(&store, &s), (None, Some(o.clone())));
        assert_eq!(links(&store, &o), (Some(s), None));
        assert_eq!(links(&store, &m), (None, None));
        assert_eq!(resolver.detach(&mut store, &m), Ok(false));
    }

    struct FixedScene(Vec<Anchor>);

    impl ProximitySearch for FixedScene {
        fn anchor(&self, id: &BlockId) -> Option<Anchor> {
            self.0.iter().find(|a| a.id == *id).cloned()
        }

        fn anchors_within(&self, origin: Vec3, radius: f32, exclude: &BlockId) -> Vec<Anchor> {
            self.0
                .iter()
                .filter(|a| a.id != *exclude && a.position.distance(origin) < radius)
                .cloned()
                .collect()
        }
    }

    #[rstest]
    fn external_scene_drives_placement(resolver: ConnectionResolver) {
        let mut store = BlockStore::new();
        let s = spawn(&mut store, "osc", "s", Vec3::ZERO);
        let o = spawn(&mut store, "output", "o", Vec3::new(9.0, 0.0, 0.0));
        let turned = Quat::from_rotation_y(std::f32::consts::PI);
        let scene = FixedScene(vec![
            Anchor {
                id: s.clone(),
                position: Vec3::ZERO,
                orientation: turned,
            },
            Anchor {
                id: o.clone(),
                position: Vec3::new(-0.5, 0.0, 0.0),
                orientation: Quat::IDENTITY,
            },
        ]);
        let outcome = resolver
            .settle_with(&scene, &mut store, &o)
            .expect("o is known");
        assert!(outcome.is_spliced());
        let snapped = store.require(&o).expect("block exists").position;
        assert!((snapped - Vec3::NEG_X).length() < 1e-6);
    }
}
