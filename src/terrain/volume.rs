//! The terrain facade: owns the field, flags, blocks and edit state.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::time::Instant;

use crate::core::time::Clock;
use crate::core::types::{Result, Vec3};
use crate::edit::{Brush, BrushHistory, EditEngine, EditEventSink, EditTarget, UpdateSummary};
use crate::generation::{
    create_from_bounding_shapes, generate_field, import_heights, load_height_image, FbmSampler,
    FieldParams, NoiseSampler, PlacedShape,
};
use crate::math::{Aabb, Segment};
use crate::mesh::BlockMesh;
use crate::voxel::{Grid3D, ScalarField, SurfaceHeight, VoxelFlags};
use super::blocks::{BlockIndex, BlockManager, ColliderSink, NullColliders};
use super::config::TerrainConfig;

/// Summary numbers for logging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TerrainStats {
    pub dims: [usize; 3],
    pub blocks: [usize; 2],
    pub solid_voxels: usize,
    pub triangles_per_lod: Vec<usize>,
    pub dirty_blocks: usize,
    pub brushes: usize,
}

impl fmt::Display for TerrainStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} voxels, {}x{} blocks, {} solid, triangles per LOD {:?}, {} dirty, {} brushes",
            self.dims[0],
            self.dims[1],
            self.dims[2],
            self.blocks[0],
            self.blocks[1],
            self.solid_voxels,
            self.triangles_per_lod,
            self.dirty_blocks,
            self.brushes
        )
    }
}

/// Editable voxel terrain.
pub struct VoxelTerrain {
    config: TerrainConfig,
    field: ScalarField,
    flags: Grid3D<VoxelFlags>,
    blocks: BlockManager,
    edits: EditEngine,
    surface: Option<Box<dyn SurfaceHeight>>,
    colliders: Box<dyn ColliderSink>,
}

impl VoxelTerrain {
    /// Allocate an empty terrain. Fails on layouts the block and LOD scheme
    /// cannot represent.
    pub fn new(config: TerrainConfig) -> Result<Self> {
        config.validate()?;
        let field = ScalarField::new(
            config.dims,
            config.cell_size,
            config.origin(),
            config.isolevel,
            config.invert,
        );
        let edits = EditEngine::new(&config)?;
        let mut flags = Grid3D::with_layout_of(field.grid(), VoxelFlags::EMPTY);
        edits.classifier().classify_all(&field, &mut flags, None);
        let blocks = BlockManager::new(
            field.grid(),
            config.block_size,
            config.lod_count,
            config.remove_under_mesh,
            config.ao.clone(),
        );
        log::info!(
            "Terrain {:?} voxels at {}, {}x{} blocks of {}, {} LODs",
            config.dims,
            config.origin(),
            blocks.num_blocks()[0],
            blocks.num_blocks()[1],
            config.block_size,
            config.lod_count
        );
        Ok(Self {
            config,
            field,
            flags,
            blocks,
            edits,
            surface: None,
            colliders: Box::new(NullColliders),
        })
    }

    /// Attach the external ground surface and reclassify.
    pub fn with_surface(mut self, surface: Box<dyn SurfaceHeight>) -> Self {
        self.surface = Some(surface);
        self.edits
            .classifier()
            .classify_all(&self.field, &mut self.flags, self.surface.as_deref());
        self
    }

    pub fn set_events(&mut self, events: Box<dyn EditEventSink>) {
        self.edits.set_events(events);
    }

    pub fn set_colliders(&mut self, colliders: Box<dyn ColliderSink>) {
        self.colliders = colliders;
    }

    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.edits.set_clock(clock);
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn field(&self) -> &ScalarField {
        &self.field
    }

    /// Raw field access. Call [`VoxelTerrain::rebuild_all`] afterwards.
    pub fn field_mut(&mut self) -> &mut ScalarField {
        &mut self.field
    }

    pub fn flags(&self) -> &Grid3D<VoxelFlags> {
        &self.flags
    }

    pub fn blocks(&self) -> &BlockManager {
        &self.blocks
    }

    pub fn edits(&self) -> &EditEngine {
        &self.edits
    }

    pub fn dirty_blocks(&self) -> &BTreeSet<BlockIndex> {
        self.edits.dirty_blocks()
    }

    /// Fill the field from noise and rebuild everything.
    pub fn generate(&mut self, params: &FieldParams, sampler: &dyn NoiseSampler, rng: &mut fastrand::Rng) {
        generate_field(&mut self.field, params, sampler, rng, self.surface.as_deref());
        self.rebuild_all();
    }

    /// [`VoxelTerrain::generate`] with the default fBm sampler and an RNG
    /// seeded from `params.seed`.
    pub fn generate_from_params(&mut self, params: &FieldParams) {
        let sampler = FbmSampler::from_params(params);
        let mut rng = fastrand::Rng::with_seed(params.seed as u64);
        self.generate(params, &sampler, &mut rng);
    }

    /// Rasterise solid shapes into the field and rebuild.
    pub fn create_from_bounding_shapes(&mut self, shapes: &[PlacedShape], fill_value: f32, samples: usize) {
        create_from_bounding_shapes(&mut self.field, shapes, fill_value, samples);
        self.rebuild_all();
    }

    /// Replace the field with solid columns up to `heights` and rebuild.
    pub fn import_heightmap(&mut self, heights: &dyn SurfaceHeight) {
        import_heights(&mut self.field, heights);
        self.rebuild_all();
    }

    /// Load a greyscale image as column heights between `min_height` and
    /// `max_height`.
    pub fn import_heightmap_image(&mut self, path: &Path, min_height: f32, max_height: f32) -> Result<()> {
        let heights = load_height_image(path, &self.field, min_height, max_height)?;
        self.import_heightmap(&heights);
        Ok(())
    }

    /// Reclassify, prune and fill holes over the whole grid, then re-mesh
    /// and re-bake every block. Queued edit work is dropped.
    pub fn rebuild_all(&mut self) {
        let start = Instant::now();
        let surface = self.surface.as_deref();
        self.edits.classifier().classify_all(&self.field, &mut self.flags, surface);

        let pruner = self.edits.pruner();
        if pruner.config().enabled() {
            let removed = pruner.prune(&mut self.field, &mut self.flags);
            if !removed.is_empty() {
                log::debug!("Pruned {} disconnected voxels", removed.len());
            }
            if pruner.config().remove_holes {
                pruner.remove_interior_holes(&mut self.field, &mut self.flags);
            }
        }

        let all = self.blocks.all_blocks();
        self.blocks
            .rebuild(&self.field, &self.flags, &all, false, self.colliders.as_mut());
        self.edits.clear_pending();
        log::info!(
            "Rebuilt terrain in {:.1}ms: {}",
            start.elapsed().as_secs_f64() * 1000.0,
            self.stats()
        );
    }

    fn with_target<R>(&mut self, f: impl FnOnce(&mut EditEngine, &mut EditTarget<'_>) -> R) -> R {
        let mut target = EditTarget {
            field: &mut self.field,
            flags: &mut self.flags,
            blocks: &mut self.blocks,
            surface: self.surface.as_deref(),
            colliders: self.colliders.as_mut(),
        };
        f(&mut self.edits, &mut target)
    }

    /// Apply and record a brush. Returns whether anything changed.
    pub fn apply_brush(&mut self, brush: Brush) -> bool {
        self.with_target(|edits, t| edits.apply_brush(t, brush))
    }

    /// Brush entry point. A positive `value_at_center` adds material.
    pub fn update_sphere_region(
        &mut self,
        center: Vec3,
        radius: f32,
        value_at_center: f32,
        spherical: bool,
        falloff: f32,
    ) -> bool {
        let brush = if spherical {
            Brush::sphere(center, radius, value_at_center, falloff)
        } else {
            Brush::cube(center, radius, value_at_center)
        };
        self.apply_brush(brush)
    }

    pub fn undo_last_brush(&mut self) -> bool {
        self.with_target(|edits, t| edits.undo_last_brush(t))
    }

    pub fn process_pending_updates(&mut self) -> UpdateSummary {
        self.with_target(|edits, t| edits.process_pending_updates(t))
    }

    /// Run update passes until nothing is pending or `max_passes` is hit.
    /// Falling material only settles as fast as the clock allows.
    pub fn settle(&mut self, max_passes: usize) -> usize {
        let mut passes = 0;
        while self.edits.has_pending() && passes < max_passes {
            self.process_pending_updates();
            passes += 1;
        }
        passes
    }

    /// True if the voxel nearest `pos` is solid. False outside the grid.
    pub fn point_inside(&self, pos: Vec3) -> bool {
        self.flags
            .voxel_at(pos)
            .is_some_and(|c| self.flags[c].is_solid())
    }

    /// Closest point to `center` on any solid voxel cell within `radius`.
    pub fn sphere_intersect(&self, center: Vec3, radius: f32) -> Option<Vec3> {
        let grid = self.field.grid();
        let half = grid.cell_size() * 0.5;
        let reach = Aabb::new(center - radius - half, center + radius + half);
        let region = grid.voxel_box_for(&reach)?;
        region
            .iter()
            .filter(|c| self.flags[*c].is_solid())
            .map(|c| grid.cell_bounds(c))
            .filter(|cell| cell.intersects_sphere(center, radius))
            .map(|cell| cell.closest_point(center))
            .min_by(|a, b| a.distance_squared(center).total_cmp(&b.distance_squared(center)))
    }

    /// First solid sample along the segment, stepping half the smallest
    /// cell dimension.
    pub fn line_intersect(&self, p1: Vec3, p2: Vec3) -> Option<Vec3> {
        let grid = self.field.grid();
        let segment = Segment::new(p1, p2).clip(&grid.bounds())?;
        let length = segment.length();
        let dir = (segment.end - segment.start).normalize_or_zero();
        let step = 0.5 * grid.cell_size().min_element();

        let mut t = 0.0f32;
        loop {
            let p = segment.start + dir * t.min(length);
            if self.point_inside(p) {
                return Some(p);
            }
            if t >= length {
                return None;
            }
            t += step;
        }
    }

    pub fn block_mesh(&self, block: BlockIndex, lod: usize) -> Option<&BlockMesh> {
        self.blocks.mesh(block, lod)
    }

    /// Ambient occlusion in [0, 1]; 1.0 where nothing was baked.
    pub fn ao_value(&self, pos: Vec3) -> f32 {
        self.blocks.ao_value(pos)
    }

    pub fn save_brushes(&self, path: impl AsRef<Path>) -> Result<()> {
        self.edits.history_snapshot().save(path)
    }

    /// Apply every brush of `history` in order and adopt its falling flag.
    pub fn replay_brushes(&mut self, history: &BrushHistory) {
        self.edits.set_falling(history.falling_enabled);
        for brush in &history.brushes {
            self.apply_brush(*brush);
        }
        log::info!("Replayed {} brushes", history.len());
    }

    /// Load and replay a brush file. On failure the terrain is left as it
    /// was and false is returned.
    pub fn replay_brush_file(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match BrushHistory::load(path) {
            Ok(history) => {
                self.replay_brushes(&history);
                true
            }
            Err(e) => {
                log::warn!("Failed to load brushes from {}: {}", path.display(), e);
                false
            }
        }
    }

    pub fn stats(&self) -> TerrainStats {
        TerrainStats {
            dims: self.field.dims(),
            blocks: self.blocks.num_blocks(),
            solid_voxels: self.field.solid_count(),
            triangles_per_lod: self.blocks.triangles_per_lod(),
            dirty_blocks: self.edits.dirty_blocks().len(),
            brushes: self.edits.history().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::ManualClock;
    use crate::core::Error;
    use crate::generation::{Attenuation, SolidShape};
    use crate::math::VoxelBox;
    use crate::voxel::{FlatSurface, PruneConfig, PruneMode};
    use std::time::Duration;

    fn config(dims: [usize; 3], block_size: usize, mode: PruneMode) -> TerrainConfig {
        TerrainConfig {
            dims,
            block_size,
            lod_count: 2,
            prune: PruneConfig { mode, ..Default::default() },
            ..Default::default()
        }
    }

    fn slab_terrain(invert: bool) -> VoxelTerrain {
        let mut terrain = VoxelTerrain::new(TerrainConfig {
            invert,
            ..config([16, 16, 16], 4, PruneMode::Destroy)
        })
        .unwrap();
        let sign = if invert { -1.0 } else { 1.0 };
        let field = terrain.field_mut();
        for i in 0..field.grid().len() {
            let c = field.grid().coord_of(i);
            field.set_value(c, sign * (8.0 - c[2] as f32).clamp(-1.0, 1.0));
        }
        terrain.rebuild_all();
        terrain
    }

    #[test]
    fn test_invalid_config_fails() {
        let bad = TerrainConfig { block_size: 5, lod_count: 2, ..Default::default() };
        assert!(matches!(VoxelTerrain::new(bad), Err(Error::Config(_))));
    }

    #[test]
    fn test_flat_slab_sheet() {
        for invert in [false, true] {
            let terrain = slab_terrain(invert);
            assert_eq!(terrain.stats().triangles_per_lod[0], 450);
            for block in terrain.blocks().all_blocks() {
                let mesh = terrain.block_mesh(block, 0).unwrap();
                assert!(mesh.positions.iter().all(|p| p.z == 8.0));
                assert!(mesh.normals.iter().all(|n| (*n - Vec3::Z).length() < 1e-6));
            }
        }
    }

    #[test]
    fn test_sphere_brush_at_center() {
        let mut terrain = VoxelTerrain::new(config([32, 32, 32], 8, PruneMode::Off)).unwrap();
        let center = terrain.field().grid().center();
        assert!(!terrain.point_inside(center));
        assert!(terrain.sphere_intersect(center, 0.1).is_none());

        assert!(terrain.update_sphere_region(center, 3.0, 2.0, true, 1.0));
        assert!(terrain.point_inside(center));
        assert!(terrain.sphere_intersect(center, 0.1).is_some());

        let expected: BTreeSet<BlockIndex> = [(1, 1), (2, 1), (1, 2), (2, 2)]
            .into_iter()
            .map(|(x, y)| BlockIndex::new(x, y))
            .collect();
        assert_eq!(terrain.dirty_blocks(), &expected);

        let summary = terrain.process_pending_updates();
        assert_eq!(summary.blocks_rebuilt, 4);
        assert!(terrain.dirty_blocks().is_empty());
        assert!(terrain.block_mesh(BlockIndex::new(1, 1), 0).is_some_and(|m| !m.is_empty()));
    }

    #[test]
    fn test_off_seam_brush_dirties_only_touched_blocks() {
        let mut terrain = VoxelTerrain::new(config([32, 32, 32], 8, PruneMode::Off)).unwrap();
        let center = Vec3::new(13.5, 13.5, 15.5);
        assert!(terrain.update_sphere_region(center, 3.0, 2.0, true, 1.0));

        // The ball reaches the x = 16 and y = 16 seams but never both at once
        let expected: BTreeSet<BlockIndex> = [(1, 1), (2, 1), (1, 2)]
            .into_iter()
            .map(|(x, y)| BlockIndex::new(x, y))
            .collect();
        assert_eq!(terrain.dirty_blocks(), &expected);

        let mut touched = BTreeSet::new();
        for i in 0..terrain.field().grid().len() {
            let c = terrain.field().grid().coord_of(i);
            if terrain.field().grid().world_pos(c).distance(center) < 3.0 {
                touched.extend(terrain.blocks().blocks_for_voxel(c));
            }
        }
        assert_eq!(terrain.dirty_blocks(), &touched);
    }

    #[test]
    fn test_brush_round_trip() {
        let mut terrain = VoxelTerrain::new(TerrainConfig {
            normalize: false,
            ..config([16, 16, 16], 8, PruneMode::Off)
        })
        .unwrap();
        terrain.generate_from_params(&FieldParams { seed: 3, ..Default::default() });
        let before = terrain.field().grid().data().to_vec();

        terrain.apply_brush(Brush::sphere(Vec3::new(6.0, 9.0, 7.5), 4.0, -1.5, 2.0));
        assert!(terrain.undo_last_brush());
        for (a, b) in terrain.field().grid().data().iter().zip(&before) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_generated_terrain_is_consistent_and_anchored() {
        crate::core::logging::init_for_tests();
        let mut terrain = VoxelTerrain::new(config([24, 24, 16], 8, PruneMode::Destroy)).unwrap();
        terrain.generate_from_params(&FieldParams { seed: 11, ..Default::default() });

        let field = terrain.field();
        for i in 0..field.grid().len() {
            let c = field.grid().coord_of(i);
            assert_eq!(terrain.flags()[c].is_solid(), field.is_solid(c));
        }

        let mut flags = terrain.flags().clone();
        let whole = VoxelBox::whole(field.dims());
        assert!(terrain.edits().pruner().find_unanchored(&mut flags, &whole).is_empty());
        assert_eq!(flags.data(), terrain.flags().data());
    }

    #[test]
    fn test_generation_deterministic() {
        let params = FieldParams { seed: 21, attenuation: Attenuation::None, ..Default::default() };
        let mut a = VoxelTerrain::new(config([16, 16, 12], 8, PruneMode::Destroy)).unwrap();
        let mut b = VoxelTerrain::new(config([16, 16, 12], 8, PruneMode::Destroy)).unwrap();
        a.generate_from_params(&params);
        b.generate_from_params(&params);
        assert_eq!(a.field().grid().data(), b.field().grid().data());
        assert_eq!(a.stats(), b.stats());
    }

    #[test]
    fn test_line_intersect() {
        let terrain = slab_terrain(false);
        let hit = terrain.line_intersect(Vec3::new(5.0, 5.0, 30.0), Vec3::new(5.0, 5.0, -5.0)).unwrap();
        assert!(hit.z < 7.5 && hit.z >= 6.5, "hit {}", hit);
        assert!(terrain.line_intersect(Vec3::new(5.0, 5.0, 30.0), Vec3::new(9.0, 9.0, 12.0)).is_none());
        assert!(terrain.line_intersect(Vec3::splat(-10.0), Vec3::new(-10.0, -10.0, 40.0)).is_none());
    }

    #[test]
    fn test_queries_outside_grid() {
        let terrain = slab_terrain(false);
        assert!(!terrain.point_inside(Vec3::new(-3.0, 4.0, 2.0)));
        assert!(terrain.sphere_intersect(Vec3::splat(100.0), 1.0).is_none());
        assert_eq!(terrain.ao_value(Vec3::splat(100.0)), 1.0);
        assert!(terrain.block_mesh(BlockIndex::new(9, 9), 0).is_none());
    }

    #[test]
    fn test_brush_file_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brushes.json");
        let params = FieldParams { seed: 5, ..Default::default() };

        let mut edited = VoxelTerrain::new(config([16, 16, 16], 8, PruneMode::Destroy)).unwrap();
        edited.generate_from_params(&params);
        edited.apply_brush(Brush::sphere(Vec3::new(8.0, 8.0, 6.0), 3.0, -2.0, 1.0));
        edited.apply_brush(Brush::cube(Vec3::new(4.0, 4.0, 2.0), 1.0, 2.0));
        edited.process_pending_updates();
        edited.save_brushes(&path).unwrap();

        let mut replayed = VoxelTerrain::new(config([16, 16, 16], 8, PruneMode::Destroy)).unwrap();
        replayed.generate_from_params(&params);
        assert!(replayed.replay_brush_file(&path));
        replayed.process_pending_updates();
        assert_eq!(replayed.field().grid().data(), edited.field().grid().data());
        assert_eq!(replayed.stats().brushes, 2);

        assert!(!replayed.replay_brush_file(dir.path().join("missing.json")));
        assert_eq!(replayed.stats().brushes, 2);
    }

    #[test]
    fn test_falling_settles_with_manual_clock() {
        crate::core::logging::init_for_tests();
        let mut terrain = VoxelTerrain::new(config([16, 16, 16], 8, PruneMode::Fall)).unwrap();
        let clock = ManualClock::new();
        terrain.set_clock(Box::new(clock.clone()));

        terrain.apply_brush(Brush::cube(Vec3::new(10.0, 10.0, 6.0), 1.0, 2.0));
        let mut passes = 0;
        while terrain.edits().has_pending() && passes < 50 {
            terrain.process_pending_updates();
            clock.advance(Duration::from_millis(100));
            passes += 1;
        }
        assert!(!terrain.edits().has_pending());
        for z in 0..3 {
            assert!(terrain.point_inside(Vec3::new(10.0, 10.0, z as f32)));
        }
        assert!(!terrain.point_inside(Vec3::new(10.0, 10.0, 3.0)));
        assert_eq!(terrain.field().solid_count(), 27);
    }

    #[test]
    fn test_surface_anchors_and_hides() {
        let mut terrain = VoxelTerrain::new(TerrainConfig {
            remove_under_mesh: true,
            ..config([16, 16, 16], 8, PruneMode::Destroy)
        })
        .unwrap()
        .with_surface(Box::new(FlatSurface::new(4.5)));

        // A block sitting on the ground surface survives pruning
        let shapes = [PlacedShape::new(
            SolidShape::Cuboid { half_extents: Vec3::new(3.0, 3.0, 4.0) },
            Vec3::new(8.0, 8.0, 4.0),
        )];
        terrain.create_from_bounding_shapes(&shapes, 1.0, 1);
        assert!(terrain.point_inside(Vec3::new(8.0, 8.0, 6.0)));
        assert!(terrain.flags()[[8, 8, 2]].is_under_surface());
        assert!(terrain.stats().triangles_per_lod[0] > 0);
    }
}
