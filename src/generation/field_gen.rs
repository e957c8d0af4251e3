//! Procedural field synthesis

use rayon::prelude::*;

use crate::core::types::Vec3;
use crate::voxel::{ScalarField, SurfaceHeight};
use super::attenuation::{Attenuation, RandomHeights, TopHeight};
use super::config::FieldParams;
use super::sampler::NoiseSampler;

/// Fill `field` from noise plus a vertical gradient, then attenuate.
///
/// All randomness beyond the sampler comes from `rng`, so the same params,
/// sampler and RNG seed always give the same field.
pub fn generate_field(
    field: &mut ScalarField,
    params: &FieldParams,
    sampler: &dyn NoiseSampler,
    rng: &mut fastrand::Rng,
    surface: Option<&dyn SurfaceHeight>,
) {
    let start = std::time::Instant::now();
    let dims = field.dims();
    let [nx, ny, nz] = dims;
    let ceilings = column_ceilings(field, &params.attenuation, rng, surface);

    let origin = field.grid().origin();
    let cell = field.grid().cell_size();
    let slab = field.grid().slab_len();
    let iso = field.isolevel();
    let dir = field.solid_direction();
    let top = (nz - 1).max(1) as f32;

    field
        .grid_mut()
        .data_mut()
        .par_chunks_mut(slab)
        .enumerate()
        .for_each(|(y, slab)| {
            for x in 0..nx {
                let ceiling = ceilings[x + nx * y];
                for z in 0..nz {
                    let pos = origin + cell * Vec3::new(x as f32, y as f32, z as f32);
                    let gradient = params.vertical_gradient * (0.5 - z as f32 / top);
                    let solidity = params.amplitude * sampler.sample(pos) + gradient;
                    let factor = params.attenuation.factor([x, y, z], dims, ceiling);
                    let solidity = Attenuation::attenuate(solidity, factor);
                    slab[z + nz * x] = iso + solidity * dir;
                }
            }
        });

    log::info!(
        "Generated {}x{}x{} field in {:.1}ms ({} solid)",
        nx,
        ny,
        nz,
        start.elapsed().as_secs_f64() * 1000.0,
        field.solid_count()
    );
}

/// Per-column top height in voxel units for the `Top` policy.
fn column_ceilings(
    field: &ScalarField,
    attenuation: &Attenuation,
    rng: &mut fastrand::Rng,
    surface: Option<&dyn SurfaceHeight>,
) -> Vec<f32> {
    let [nx, ny, nz] = field.dims();
    let grid_top = (nz - 1) as f32;
    let mut ceilings = vec![grid_top; nx * ny];

    let Attenuation::Top { height, .. } = attenuation else {
        return ceilings;
    };
    match *height {
        TopHeight::GridTop => {}
        TopHeight::Surface => {
            let Some(surface) = surface else { return ceilings };
            let grid = field.grid();
            for y in 0..ny {
                for x in 0..nx {
                    let p = grid.world_pos([x, y, 0]);
                    if let Some(h) = surface.height_at(p.x, p.y) {
                        let gz = (h - grid.origin().z) / grid.cell_size().z;
                        ceilings[x + nx * y] = gz.min(grid_top);
                    }
                }
            }
        }
        TopHeight::Random { period, amplitude } => {
            let lattice = RandomHeights::new(nx, ny, period, rng);
            for y in 0..ny {
                for x in 0..nx {
                    ceilings[x + nx * y] = grid_top - amplitude * lattice.at(x, y);
                }
            }
        }
    }
    ceilings
}
