use criterion::{criterion_group, criterion_main, Criterion, black_box};

use voxterra::core::types::Vec3;
use voxterra::edit::Brush;
use voxterra::generation::FieldParams;
use voxterra::lighting::{AoConfig, OcclusionBaker};
use voxterra::math::VoxelBox;
use voxterra::mesh::{CubeRange, IsosurfaceMesher};
use voxterra::terrain::{TerrainConfig, VoxelTerrain};
use voxterra::voxel::connectivity::merge_regions;

fn generated(size: usize, height: usize) -> VoxelTerrain {
    let config = TerrainConfig {
        dims: [size, size, height],
        block_size: 16,
        lod_count: 2,
        ..Default::default()
    };
    let mut terrain = match VoxelTerrain::new(config) {
        Ok(terrain) => terrain,
        Err(e) => panic!("bench config rejected: {}", e),
    };
    terrain.generate_from_params(&FieldParams { seed: 7, ..Default::default() });
    terrain
}

fn bench_mesh_block(c: &mut Criterion) {
    let terrain = generated(64, 32);
    let mesher = IsosurfaceMesher::new(false);
    let range = CubeRange { x0: 16, x1: 32, y0: 16, y1: 32 };

    c.bench_function("mesh_block_16_lod0", |b| {
        b.iter(|| mesher.mesh_block(terrain.field(), terrain.flags(), black_box(range), 0));
    });
    c.bench_function("mesh_block_16_lod1", |b| {
        b.iter(|| mesher.mesh_block(terrain.field(), terrain.flags(), black_box(range), 1));
    });
}

fn bench_ao_block(c: &mut Criterion) {
    let terrain = generated(64, 32);
    let baker = OcclusionBaker::new(AoConfig::default());
    let range = VoxelBox::new([16, 16, 0], [31, 31, 31]);

    c.bench_function("ao_block_16", |b| {
        b.iter(|| baker.bake_block(terrain.flags(), terrain.blocks().ao_grid(), black_box(&range), false));
    });
}

fn bench_full_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    group.sample_size(10);
    group.bench_function("generate_64x64x32", |b| {
        b.iter(|| generated(black_box(64), 32));
    });
    group.finish();
}

fn bench_brush_update(c: &mut Criterion) {
    let mut terrain = generated(64, 32);
    let center = Vec3::new(32.0, 32.0, 14.0);

    c.bench_function("brush_carve_and_update", |b| {
        b.iter(|| {
            terrain.apply_brush(Brush::sphere(black_box(center), 4.0, -1.0, 1.0));
            terrain.process_pending_updates();
            terrain.undo_last_brush();
            terrain.process_pending_updates();
        });
    });
}

fn bench_merge_regions(c: &mut Criterion) {
    let regions: Vec<VoxelBox> = (0..32)
        .map(|i| {
            let x = (i % 8) * 12;
            let y = (i / 8) * 12;
            VoxelBox::new([x, y, 0], [x + 15, y + 15, 31])
        })
        .collect();

    c.bench_function("merge_regions_32", |b| {
        b.iter(|| merge_regions(black_box(regions.clone())));
    });
}

criterion_group!(
    benches,
    bench_mesh_block,
    bench_ao_block,
    bench_full_generate,
    bench_brush_update,
    bench_merge_regions,
);
criterion_main!(benches);
