//! Offline terrain baker: generates a field, replays brushes, settles
//! pruning and falling, then reports mesh and AO statistics.
//!
//! Usage: cargo run --release --bin bake_terrain -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>     TerrainConfig JSON (other layout flags override it)
//!   --size <N>          Voxels along x and y (default: 64)
//!   --height <N>        Voxels along z (default: 32)
//!   --block <N>         Cubes per block (default: 16)
//!   --lods <N>          LOD count (default: 3)
//!   --seed <SEED>       Noise seed (default: 12345)
//!   --heightmap <PATH>  Greyscale image to import instead of noise
//!   --brushes <PATH>    Brush history JSON to replay
//!   --save-brushes <P>  Write the brush history after baking
//!   --jobs <N>          Worker threads (default: all cores)

use std::path::PathBuf;
use std::time::Instant;

use voxterra::generation::FieldParams;
use voxterra::terrain::{TerrainConfig, VoxelTerrain};

fn main() {
    voxterra::core::logging::init();

    let args: Vec<String> = std::env::args().collect();
    if let Some(jobs) = parse_usize_arg(&args, "--jobs") {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global() {
            log::warn!("Could not size thread pool: {}", e);
        }
    }

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => match TerrainConfig::load_json(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to read config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => TerrainConfig::default(),
    };
    if let Some(size) = parse_usize_arg(&args, "--size") {
        config.dims[0] = size;
        config.dims[1] = size;
    }
    if let Some(height) = parse_usize_arg(&args, "--height") {
        config.dims[2] = height;
    }
    if let Some(block) = parse_usize_arg(&args, "--block") {
        config.block_size = block;
    }
    if let Some(lods) = parse_usize_arg(&args, "--lods") {
        config.lod_count = lods;
    }
    config.offline = true;
    let seed = parse_u32_arg(&args, "--seed").unwrap_or(12345);

    println!("=== Voxterra Terrain Baker ===");
    println!("Grid:   {} x {} x {}", config.dims[0], config.dims[1], config.dims[2]);
    println!("Blocks: {} cubes, {} LODs", config.block_size, config.lod_count);
    println!("Seed:   {}", seed);
    println!();

    let start = Instant::now();
    let mut terrain = match VoxelTerrain::new(config) {
        Ok(terrain) => terrain,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    match parse_str_arg(&args, "--heightmap") {
        Some(path) => {
            let top = terrain.field().grid().bounds().max.z;
            if let Err(e) = terrain.import_heightmap_image(&PathBuf::from(&path), 0.0, top * 0.75) {
                eprintln!("Failed to import heightmap {}: {}", path, e);
                std::process::exit(1);
            }
        }
        None => {
            let params = FieldParams { seed, ..Default::default() };
            terrain.generate_from_params(&params);
        }
    }
    println!("Generated in {:.2}s", start.elapsed().as_secs_f64());

    if let Some(path) = parse_str_arg(&args, "--brushes") {
        if terrain.replay_brush_file(&path) {
            let passes = terrain.settle(10_000);
            println!("Replayed brushes from {} ({} update passes)", path, passes);
        } else {
            println!("Brushes from {} not applied", path);
        }
    }

    let stats = terrain.stats();
    log::info!("{}", stats);
    println!();
    println!("Solid voxels: {}", stats.solid_voxels);
    for (lod, tris) in stats.triangles_per_lod.iter().enumerate() {
        println!("LOD {}: {} triangles", lod, tris);
    }
    let center = terrain.field().grid().center();
    println!("AO at centre: {:.3}", terrain.ao_value(center));

    if let Some(path) = parse_str_arg(&args, "--save-brushes") {
        match terrain.save_brushes(&path) {
            Ok(()) => println!("Saved brush history to {}", path),
            Err(e) => eprintln!("Failed to save brushes: {}", e),
        }
    }
    println!("Done in {:.2}s", start.elapsed().as_secs_f64());
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
