//! Brush application, undo and the deferred update pass.
//!
//! Edits only touch field values and flags and mark blocks dirty. The heavy
//! work (pruning, falling, meshing, AO) happens in
//! [`EditEngine::process_pending_updates`], which the owner calls once per
//! frame or in a loop when baking offline.

use std::collections::BTreeSet;
use std::time::Instant;

use crate::core::time::{Clock, StepTimer, SystemClock};
use crate::core::types::{Result, VoxelCoord};
use crate::math::VoxelBox;
use crate::terrain::blocks::{BlockIndex, BlockManager, ColliderSink};
use crate::terrain::config::TerrainConfig;
use crate::voxel::connectivity::merge_regions;
use crate::voxel::{
    Classifier, ConnectivityPruner, Grid3D, PruneMode, ScalarField, SurfaceHeight, VoxelFlags,
};
use super::brush::Brush;
use super::events::{EditEventSink, NullEvents};
use super::history::BrushHistory;

/// Mutable view of the terrain state an edit works on.
pub struct EditTarget<'a> {
    pub field: &'a mut ScalarField,
    pub flags: &'a mut Grid3D<VoxelFlags>,
    pub blocks: &'a mut BlockManager,
    pub surface: Option<&'a dyn SurfaceHeight>,
    pub colliders: &'a mut dyn ColliderSink,
}

/// What one update pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub blocks_rebuilt: usize,
    pub voxels_removed: usize,
    pub voxels_fallen: usize,
    /// Disconnected material is still settling; call again.
    pub falling: bool,
}

pub struct EditEngine {
    classifier: Classifier,
    pruner: ConnectivityPruner,
    normalize: bool,
    offline: bool,
    history: BrushHistory,
    dirty: BTreeSet<BlockIndex>,
    next_pass: BTreeSet<BlockIndex>,
    falling_regions: Vec<VoxelBox>,
    falling_active: bool,
    volume_added: bool,
    /// Material landed this pass; the blocks it reached rebuild next pass.
    next_pass_volume_added: bool,
    clock: Box<dyn Clock>,
    fall_timer: StepTimer,
    events: Box<dyn EditEventSink>,
}

impl EditEngine {
    pub fn new(config: &TerrainConfig) -> Result<Self> {
        let clock: Box<dyn Clock> = Box::new(SystemClock::new());
        let fall_timer = StepTimer::new(config.fall_interval()?, clock.elapsed());
        Ok(Self {
            classifier: Classifier::new(config.closed_surface),
            pruner: ConnectivityPruner::new(config.prune.clone()),
            normalize: config.normalize,
            offline: config.offline,
            history: BrushHistory::new(),
            dirty: BTreeSet::new(),
            next_pass: BTreeSet::new(),
            falling_regions: Vec::new(),
            falling_active: false,
            volume_added: false,
            next_pass_volume_added: false,
            clock,
            fall_timer,
            events: Box::new(NullEvents),
        })
    }

    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.fall_timer.rearm(clock.elapsed());
        self.clock = clock;
    }

    pub fn set_events(&mut self, events: Box<dyn EditEventSink>) {
        self.events = events;
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn pruner(&self) -> &ConnectivityPruner {
        &self.pruner
    }

    /// Switch disconnected material between falling and being destroyed.
    /// Has no effect while pruning is off.
    pub fn set_falling(&mut self, falling: bool) {
        let mut config = self.pruner.config().clone();
        if config.mode == PruneMode::Off {
            return;
        }
        config.mode = if falling { PruneMode::Fall } else { PruneMode::Destroy };
        self.pruner = ConnectivityPruner::new(config);
    }

    pub fn history(&self) -> &BrushHistory {
        &self.history
    }

    /// Snapshot of the history with the current falling flag.
    pub fn history_snapshot(&self) -> BrushHistory {
        BrushHistory {
            brushes: self.history.brushes.clone(),
            falling_enabled: self.pruner.config().falling_enabled(),
        }
    }

    pub fn dirty_blocks(&self) -> &BTreeSet<BlockIndex> {
        &self.dirty
    }

    pub fn next_pass_blocks(&self) -> &BTreeSet<BlockIndex> {
        &self.next_pass
    }

    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty() || !self.next_pass.is_empty() || !self.falling_regions.is_empty()
    }

    pub fn volume_added(&self) -> bool {
        self.volume_added
    }

    /// Forget queued work after a full rebuild made it redundant.
    pub fn clear_pending(&mut self) {
        self.dirty.clear();
        self.next_pass.clear();
        self.falling_regions.clear();
        self.falling_active = false;
        self.volume_added = false;
        self.next_pass_volume_added = false;
    }

    /// Apply and record a brush. Returns whether any voxel value changed.
    pub fn apply_brush(&mut self, t: &mut EditTarget<'_>, brush: Brush) -> bool {
        let changed = self.stamp(t, &brush);
        self.history.push(brush);
        changed
    }

    /// Reapply the last recorded brush with negated weight. Pruning done
    /// since then is not restored.
    pub fn undo_last_brush(&mut self, t: &mut EditTarget<'_>) -> bool {
        let Some(brush) = self.history.pop() else {
            return false;
        };
        self.stamp(t, &brush.negated());
        true
    }

    fn stamp(&mut self, t: &mut EditTarget<'_>, brush: &Brush) -> bool {
        let Some(region) = t.field.grid().voxel_box_for(&brush.bounds()) else {
            return false;
        };
        let dir = t.field.solid_direction();
        let mut changed = false;
        let mut removed = 0;
        let mut added = 0;
        let mut touched = Vec::new();

        for c in region.iter() {
            let pos = t.field.grid().world_pos(c);
            let delta = brush.delta_at(pos);
            if delta == 0.0 {
                continue;
            }
            touched.push(c);
            let old = t.field.value(c);
            let mut value = old + delta * dir;
            if self.normalize {
                value = value.clamp(-1.0, 1.0);
            }
            if value == old {
                continue;
            }
            changed = true;

            let was_solid = t.field.is_solid_value(old);
            let solid = t.field.is_solid_value(value);
            t.field.set_value(c, value);
            if was_solid && !solid {
                removed += 1;
                self.events.material_removed(pos);
            } else if !was_solid && solid {
                added += 1;
            }
        }

        t.blocks.mark_voxels(touched, &mut self.dirty);
        if !changed {
            return false;
        }
        if added > 0 {
            self.volume_added = true;
        }
        self.classifier.classify_box(t.field, t.flags, &region, t.surface);
        log::debug!(
            "Brush at {} r={} w={}: +{} -{} voxels, {} blocks dirty",
            brush.position, brush.radius, brush.weight, added, removed, self.dirty.len()
        );
        true
    }

    /// Prune around dirty blocks, settle or destroy disconnected material,
    /// then re-mesh and re-bake the dirty blocks in block order.
    pub fn process_pending_updates(&mut self, t: &mut EditTarget<'_>) -> UpdateSummary {
        let mut summary = UpdateSummary::default();
        let mut current = std::mem::take(&mut self.dirty);
        let mut regions = std::mem::take(&mut self.falling_regions);
        if current.is_empty() && regions.is_empty() {
            return summary;
        }
        let start = Instant::now();

        if self.pruner.config().enabled() {
            let dims = t.field.dims();
            regions.extend(current.iter().map(|b| t.blocks.voxel_range(*b).padded(1, false, dims)));
            let regions = merge_regions(regions);

            let mut floating: Vec<VoxelCoord> = Vec::new();
            for region in &regions {
                floating.extend(self.pruner.find_unanchored(t.flags, region));
            }
            floating.sort_unstable_by_key(|c| (c[2], c[1], c[0]));
            floating.dedup();

            if self.pruner.config().falling_enabled() {
                self.settle(t, &floating, regions, &mut summary);
            } else {
                self.destroy(t, &floating, &mut current, &mut summary);
            }
        }

        let list: Vec<BlockIndex> = current.into_iter().collect();
        t.blocks.rebuild(&*t.field, &*t.flags, &list, !self.volume_added, &mut *t.colliders);
        summary.blocks_rebuilt = list.len();
        self.volume_added = std::mem::take(&mut self.next_pass_volume_added);
        self.dirty.append(&mut self.next_pass);

        if summary.blocks_rebuilt > 0 || summary.falling {
            log::debug!(
                "Update pass: {} blocks, {} removed, {} fallen in {:.1}ms",
                summary.blocks_rebuilt,
                summary.voxels_removed,
                summary.voxels_fallen,
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
        summary
    }

    fn destroy(
        &mut self,
        t: &mut EditTarget<'_>,
        floating: &[VoxelCoord],
        current: &mut BTreeSet<BlockIndex>,
        summary: &mut UpdateSummary,
    ) {
        if floating.is_empty() {
            return;
        }
        let empty = t.field.nudged_empty(self.pruner.config().epsilon);
        for &c in floating {
            t.field.set_value(c, empty);
            t.flags[c].set_outside(true);
            current.extend(t.blocks.blocks_for_voxel(c));
        }
        summary.voxels_removed += floating.len();

        if !self.offline {
            for &c in floating {
                self.events.fragment(t.field.grid().world_pos(c));
            }
            self.events.impact(floating.len());
        }
    }

    /// Drop floating voxels one z layer, at most once per fall interval.
    /// `floating` must be sorted by ascending z.
    fn settle(
        &mut self,
        t: &mut EditTarget<'_>,
        floating: &[VoxelCoord],
        regions: Vec<VoxelBox>,
        summary: &mut UpdateSummary,
    ) {
        let resumed = self.falling_active;
        self.falling_active = !floating.is_empty();
        let Some(&first) = floating.first() else {
            return;
        };
        summary.falling = true;

        let now = self.clock.elapsed();
        if !resumed {
            self.fall_timer.rearm(now);
        }
        if !self.fall_timer.try_step(now) {
            self.falling_regions = regions;
            return;
        }

        let empty = t.field.nudged_empty(self.pruner.config().epsilon);
        let mut moved = VoxelBox::new(first, first);
        for &c in floating {
            let value = t.field.value(c);
            t.field.set_value(c, empty);
            moved = moved.union(&VoxelBox::new(c, c));
            if c[2] > 0 {
                let below = [c[0], c[1], c[2] - 1];
                t.field.set_value(below, value);
                moved = moved.union(&VoxelBox::new(below, below));
            }
        }
        summary.voxels_fallen += floating.len();

        // Landing material can darken its surroundings
        self.next_pass_volume_added = true;
        self.classifier.classify_box(t.field, t.flags, &moved, t.surface);
        t.blocks.mark_voxels(floating.iter().copied(), &mut self.next_pass);
    }
}
