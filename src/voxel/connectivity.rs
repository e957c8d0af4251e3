//! Flood-fill connectivity analysis.
//!
//! Solid voxels that cannot reach an anchor through face-adjacent solid
//! voxels are floating and get removed (or, in falling mode, handed back to
//! the caller to be moved). A second pass fills empty pockets that cannot be
//! reached from the open faces of the grid.
//!
//! All passes use the `ANCHORED` flag bit as their visited marker and clear
//! it again before returning.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::types::VoxelCoord;
use crate::math::VoxelBox;
use super::field::ScalarField;
use super::flags::VoxelFlags;
use super::grid::{Grid3D, FACE_NEIGHBORS};

/// What happens to disconnected material.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PruneMode {
    /// Leave floating material alone.
    Off,
    /// Delete floating material outright.
    #[default]
    Destroy,
    /// Let floating material fall one layer at a time.
    Fall,
}

/// Where anchors come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorMode {
    /// Material touching the ground (grid floor or the external surface).
    #[default]
    Ground,
    /// A single seed at the centre of the field, for free-floating bodies.
    Floating,
}

/// Which faces seed the interior-hole flood.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoleSeed {
    /// Only the top z plane. Misses pockets that are open to the sides only.
    #[default]
    TopFace,
    /// All six faces.
    AllFaces,
}

/// Pruning configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneConfig {
    pub mode: PruneMode,
    pub anchor: AnchorMode,
    /// Treat solid voxels on the outer x/y faces as supported.
    pub anchor_scene_boundary: bool,
    /// Run the enclosed-pocket fill after full prunes.
    pub remove_holes: bool,
    pub hole_seed: HoleSeed,
    /// Distance past the isolevel that removed or filled values are set to.
    pub epsilon: f32,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            mode: PruneMode::Destroy,
            anchor: AnchorMode::Ground,
            anchor_scene_boundary: false,
            remove_holes: false,
            hole_seed: HoleSeed::TopFace,
            epsilon: 1e-3,
        }
    }
}

impl PruneConfig {
    pub fn enabled(&self) -> bool {
        self.mode != PruneMode::Off
    }

    pub fn falling_enabled(&self) -> bool {
        self.mode == PruneMode::Fall
    }
}

/// Flood-fill pruner over a field and its flags.
#[derive(Clone, Debug, Default)]
pub struct ConnectivityPruner {
    config: PruneConfig,
}

impl ConnectivityPruner {
    pub fn new(config: PruneConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PruneConfig {
        &self.config
    }

    /// Solid voxels inside `region` with no path to an anchor.
    ///
    /// `region` always spans the full z range in practice. Solid voxels on
    /// its x/y shell that are not on the grid boundary stand in for the
    /// unvisited material beyond and act as anchors.
    pub fn find_unanchored(&self, flags: &mut Grid3D<VoxelFlags>, region: &VoxelBox) -> Vec<VoxelCoord> {
        let mut queue = VecDeque::new();
        for c in region.iter() {
            if flags[c].is_solid() && self.is_anchor(flags, region, c) {
                flags[c].set_anchored(true);
                queue.push_back(c);
            }
        }
        let anchors = queue.len();

        while let Some(c) = queue.pop_front() {
            for offset in FACE_NEIGHBORS {
                let Some(n) = flags.offset(c, offset) else { continue };
                if !region.contains(n) {
                    continue;
                }
                let f = &mut flags[n];
                if f.is_solid() && !f.is_anchored() {
                    f.set_anchored(true);
                    queue.push_back(n);
                }
            }
        }

        let mut floating = Vec::new();
        for c in region.iter() {
            let f = &mut flags[c];
            if f.is_anchored() {
                f.set_anchored(false);
            } else if f.is_solid() {
                floating.push(c);
            }
        }

        log::debug!(
            "Connectivity over {:?}..{:?}: {} anchors, {} floating voxels",
            region.min, region.max, anchors, floating.len()
        );
        floating
    }

    /// Remove every floating voxel in `region`. Returns the removed voxels.
    pub fn prune_range(
        &self,
        field: &mut ScalarField,
        flags: &mut Grid3D<VoxelFlags>,
        region: &VoxelBox,
    ) -> Vec<VoxelCoord> {
        let floating = self.find_unanchored(flags, region);
        let empty = field.nudged_empty(self.config.epsilon);
        for &c in &floating {
            field.set_value(c, empty);
            flags[c].set_outside(true);
        }
        floating
    }

    /// Prune the whole grid.
    pub fn prune(&self, field: &mut ScalarField, flags: &mut Grid3D<VoxelFlags>) -> Vec<VoxelCoord> {
        let whole = VoxelBox::whole(field.dims());
        self.prune_range(field, flags, &whole)
    }

    /// Fill empty voxels that no flood from the seed faces can reach.
    /// Returns the number of voxels made solid.
    pub fn remove_interior_holes(&self, field: &mut ScalarField, flags: &mut Grid3D<VoxelFlags>) -> usize {
        let dims = field.dims();
        let whole = VoxelBox::whole(dims);
        let mut queue = VecDeque::new();
        for c in whole.iter() {
            let seed_face = match self.config.hole_seed {
                HoleSeed::TopFace => c[2] == dims[2] - 1,
                HoleSeed::AllFaces => flags.is_boundary(c),
            };
            if seed_face && flags[c].is_outside() {
                flags[c].set_anchored(true);
                queue.push_back(c);
            }
        }

        while let Some(c) = queue.pop_front() {
            for offset in FACE_NEIGHBORS {
                let Some(n) = flags.offset(c, offset) else { continue };
                let f = &mut flags[n];
                if f.is_outside() && !f.is_anchored() {
                    f.set_anchored(true);
                    queue.push_back(n);
                }
            }
        }

        let solid = field.nudged_solid(self.config.epsilon);
        let mut filled = 0;
        for c in whole.iter() {
            let f = &mut flags[c];
            if f.is_anchored() {
                f.set_anchored(false);
            } else if f.is_outside() && !f.is_on_edge() {
                f.set_outside(false);
                field.set_value(c, solid);
                filled += 1;
            }
        }
        if filled > 0 {
            log::debug!("Filled {} enclosed empty voxels", filled);
        }
        filled
    }

    fn is_anchor(&self, flags: &Grid3D<VoxelFlags>, region: &VoxelBox, c: VoxelCoord) -> bool {
        let dims = flags.dims();

        // Solid material continuing past the region edge is assumed supported
        for a in 0..2 {
            if (c[a] == region.min[a] && region.min[a] > 0)
                || (c[a] == region.max[a] && region.max[a] < dims[a] - 1)
            {
                return true;
            }
        }

        if self.config.anchor_scene_boundary {
            let on_face = c[0] == 0 || c[1] == 0 || c[0] == dims[0] - 1 || c[1] == dims[1] - 1;
            let beside_edge = FACE_NEIGHBORS[..4]
                .iter()
                .filter_map(|o| flags.offset(c, *o))
                .any(|n| flags[n].is_on_edge());
            if on_face || beside_edge {
                return true;
            }
        }

        match self.config.anchor {
            AnchorMode::Ground => {
                if flags[c].is_under_surface() || c[2] == 0 {
                    return true;
                }
                let below = flags[[c[0], c[1], c[2] - 1]];
                below.is_on_edge() || below.is_under_surface()
            }
            AnchorMode::Floating => c == [dims[0] / 2, dims[1] / 2, dims[2] / 2],
        }
    }
}

/// Merge overlapping prune regions when one pass over the union costs no
/// more than separate passes.
pub fn merge_regions(mut regions: Vec<VoxelBox>) -> Vec<VoxelBox> {
    let mut merged = true;
    while merged {
        merged = false;
        'outer: for i in 0..regions.len() {
            for j in (i + 1)..regions.len() {
                let (a, b) = (regions[i], regions[j]);
                if !a.overlaps(&b) {
                    continue;
                }
                let union = a.union(&b);
                if union.volume() <= a.volume() + b.volume() {
                    regions[i] = union;
                    regions.swap_remove(j);
                    merged = true;
                    break 'outer;
                }
            }
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::voxel::classifier::Classifier;

    fn setup(dims: [usize; 3], solid: impl Fn(VoxelCoord) -> bool) -> (ScalarField, Grid3D<VoxelFlags>) {
        let mut field = ScalarField::new(dims, Vec3::ONE, Vec3::ZERO, 0.0, false);
        for i in 0..field.grid().len() {
            let c = field.grid().coord_of(i);
            field.set_value(c, if solid(c) { 1.0 } else { -1.0 });
        }
        let mut flags = Grid3D::with_layout_of(field.grid(), VoxelFlags::SOLID);
        Classifier::new(false).classify_all(&field, &mut flags, None);
        (field, flags)
    }

    /// Independent reachability check from ground anchors.
    fn all_grounded(flags: &Grid3D<VoxelFlags>) -> bool {
        let mut seen = vec![false; flags.len()];
        let mut stack = Vec::new();
        for i in 0..flags.len() {
            let c = flags.coord_of(i);
            if c[2] == 0 && flags[c].is_solid() {
                seen[i] = true;
                stack.push(c);
            }
        }
        while let Some(c) = stack.pop() {
            for n in flags.face_neighbors(c) {
                let i = flags.index(n[0], n[1], n[2]);
                if !seen[i] && flags[n].is_solid() {
                    seen[i] = true;
                    stack.push(n);
                }
            }
        }
        (0..flags.len()).all(|i| seen[i] || flags[flags.coord_of(i)].is_outside())
    }

    #[test]
    fn test_default_config() {
        let config = PruneConfig::default();
        assert_eq!(config.mode, PruneMode::Destroy);
        assert_eq!(config.anchor, AnchorMode::Ground);
        assert!(config.enabled());
        assert!(!config.falling_enabled());
    }

    #[test]
    fn test_floating_island_removed() {
        let (mut field, mut flags) = setup([8, 8, 8], |c| {
            c[2] <= 1 || (c[0] >= 3 && c[0] <= 4 && c[1] >= 3 && c[1] <= 4 && c[2] >= 5 && c[2] <= 6)
        });
        let pruner = ConnectivityPruner::new(PruneConfig::default());
        let removed = pruner.prune(&mut field, &mut flags);
        assert_eq!(removed.len(), 8);
        assert!(flags[[3, 3, 5]].is_outside());
        assert!(!field.is_solid([3, 3, 5]));
        assert!(flags[[3, 3, 1]].is_solid());
        assert!(flags.data().iter().all(|f| !f.is_anchored()));
    }

    #[test]
    fn test_pillar_keeps_overhang() {
        let (mut field, mut flags) = setup([8, 8, 8], |c| {
            c[2] == 0
                || (c[0] == 2 && c[1] == 2 && c[2] <= 5)
                || (c[2] == 5 && c[1] == 2 && c[0] <= 5)
        });
        let pruner = ConnectivityPruner::new(PruneConfig::default());
        assert!(pruner.prune(&mut field, &mut flags).is_empty());
    }

    #[test]
    fn test_prune_is_idempotent_and_grounded() {
        let mut rng = fastrand::Rng::with_seed(42);
        let (mut field, mut flags) = setup([24, 24, 16], |_| false);
        for i in 0..field.grid().len() {
            let c = field.grid().coord_of(i);
            field.set_value(c, rng.f32() * 2.0 - 0.9);
        }
        Classifier::new(false).classify_all(&field, &mut flags, None);

        let pruner = ConnectivityPruner::new(PruneConfig::default());
        let first = pruner.prune(&mut field, &mut flags);
        assert!(!first.is_empty());
        let snapshot_flags = flags.data().to_vec();
        let snapshot_values = field.grid().data().to_vec();

        let second = pruner.prune(&mut field, &mut flags);
        assert!(second.is_empty());
        assert_eq!(flags.data(), &snapshot_flags[..]);
        assert_eq!(field.grid().data(), &snapshot_values[..]);
        assert!(all_grounded(&flags));
    }

    #[test]
    fn test_no_anchor_removes_everything() {
        // Floating mode with an empty centre: nothing is supported
        let (mut field, mut flags) = setup([9, 9, 9], |c| c[0] < 2);
        let config = PruneConfig { anchor: AnchorMode::Floating, ..Default::default() };
        let removed = ConnectivityPruner::new(config).prune(&mut field, &mut flags);
        assert_eq!(removed.len(), 2 * 9 * 9);
        assert_eq!(field.solid_count(), 0);
    }

    #[test]
    fn test_floating_anchor_at_center() {
        let (mut field, mut flags) = setup([9, 9, 9], |c| {
            let d = Vec3::new(c[0] as f32 - 4.0, c[1] as f32 - 4.0, c[2] as f32 - 4.0);
            d.length() <= 2.5 || c[2] == 0
        });
        let config = PruneConfig { anchor: AnchorMode::Floating, ..Default::default() };
        let removed = ConnectivityPruner::new(config).prune(&mut field, &mut flags);
        // The ball survives, the detached floor does not
        assert_eq!(removed.len(), 81);
        assert!(flags[[4, 4, 4]].is_solid());
    }

    #[test]
    fn test_scene_boundary_anchor() {
        let (mut field, mut flags) = setup([8, 8, 8], |c| c[0] == 0 && c[2] == 4);
        let config = PruneConfig { anchor_scene_boundary: true, ..Default::default() };
        let removed = ConnectivityPruner::new(config).prune(&mut field, &mut flags);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_range_shell_counts_as_support() {
        // A beam leaving the region sideways is kept; a blob inside is not
        let (mut field, mut flags) = setup([12, 12, 8], |c| {
            (c[1] == 5 && c[2] == 4 && c[0] >= 2) || (c[0] == 5 && c[1] == 8 && c[2] == 6)
        });
        let region = VoxelBox::new([3, 3, 0], [9, 9, 7]);
        let pruner = ConnectivityPruner::new(PruneConfig::default());
        let removed = pruner.prune_range(&mut field, &mut flags, &region);
        assert_eq!(removed, vec![[5, 8, 6]]);
        assert!(flags[[4, 5, 4]].is_solid());
    }

    #[test]
    fn test_remove_interior_holes() {
        let (mut field, mut flags) = setup([10, 10, 10], |c| {
            let pocket = (4..=5).contains(&c[0]) && (4..=5).contains(&c[1]) && (3..=4).contains(&c[2]);
            let chimney = c[0] == 2 && c[1] == 2 && c[2] >= 3;
            c[2] <= 7 && !pocket && !chimney
        });
        let config = PruneConfig { remove_holes: true, ..Default::default() };
        let pruner = ConnectivityPruner::new(config);
        let filled = pruner.remove_interior_holes(&mut field, &mut flags);
        assert_eq!(filled, 8);
        assert!(flags[[4, 4, 3]].is_solid());
        assert!(field.is_solid([4, 4, 3]));
        // Chimney reaches the open top
        assert!(flags[[2, 2, 4]].is_outside());
    }

    #[test]
    fn test_hole_seed_all_faces() {
        // Tunnel open only on the x faces
        let solid = |c: VoxelCoord| !(c[1] == 4 && c[2] == 2);
        let (mut field, mut flags) = setup([8, 8, 6], solid);
        let top_only = ConnectivityPruner::new(PruneConfig::default());
        let mut f2 = field.clone();
        let mut g2 = flags.clone();
        assert_eq!(top_only.remove_interior_holes(&mut f2, &mut g2), 8);

        let all = ConnectivityPruner::new(PruneConfig { hole_seed: HoleSeed::AllFaces, ..Default::default() });
        assert_eq!(all.remove_interior_holes(&mut field, &mut flags), 0);
    }

    #[test]
    fn test_merge_regions() {
        let a = VoxelBox::new([0, 0, 0], [9, 9, 7]);
        let b = VoxelBox::new([1, 1, 0], [9, 9, 7]);
        let c = VoxelBox::new([20, 20, 0], [25, 25, 7]);
        let merged = merge_regions(vec![a, b, c]);
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&a));
        assert!(merged.contains(&c));

        // Barely touching corners would make the union far bigger: keep apart
        let d = VoxelBox::new([0, 0, 0], [5, 5, 7]);
        let e = VoxelBox::new([5, 5, 0], [10, 10, 7]);
        assert_eq!(merge_regions(vec![d, e]).len(), 2);
    }
}
