//! Heightmap import

use std::path::Path;

use crate::core::types::{Result, Vec2};
use crate::core::Error;
use crate::voxel::{HeightGrid, ScalarField, SurfaceHeight};

/// Fill every column solid up to the height given by `heights`.
///
/// The voxel containing the surface gets a linear ramp so the mesh lands on
/// the exact height. Columns without a height are left untouched.
pub fn import_heights(field: &mut ScalarField, heights: &dyn SurfaceHeight) {
    let [nx, ny, nz] = field.dims();
    let cell_z = field.grid().cell_size().z;
    let mut columns = 0usize;
    for y in 0..ny {
        for x in 0..nx {
            let base = field.grid().world_pos([x, y, 0]);
            let Some(h) = heights.height_at(base.x, base.y) else { continue };
            columns += 1;
            for z in 0..nz {
                let wz = base.z + cell_z * z as f32;
                let solidity = ((h - wz) / cell_z).clamp(-1.0, 1.0);
                let value = field.from_solidity(solidity);
                field.set_value([x, y, z], value);
            }
        }
    }
    log::debug!("Imported heights for {} of {} columns", columns, nx * ny);
}

/// Decode a greyscale image into a height grid that spans the field's x/y
/// extent. Black maps to `min_height`, white to `max_height`.
pub fn load_height_image(
    path: &Path,
    field: &ScalarField,
    min_height: f32,
    max_height: f32,
) -> Result<HeightGrid> {
    let img = image::open(path)?.to_luma16();
    let (w, h) = img.dimensions();
    if w < 2 || h < 2 {
        return Err(Error::Heightmap(format!(
            "{}: image must be at least 2x2, got {}x{}",
            path.display(),
            w,
            h
        )));
    }

    let bounds = field.grid().bounds();
    let origin = Vec2::new(bounds.min.x, bounds.min.y);
    let extent = Vec2::new(bounds.size().x, bounds.size().y);
    let spacing = extent / Vec2::new((w - 1) as f32, (h - 1) as f32);

    let range = max_height - min_height;
    let heights = img
        .pixels()
        .map(|p| min_height + range * (p.0[0] as f32 / u16::MAX as f32))
        .collect();

    log::info!("Loaded {}x{} heightmap from {}", w, h, path.display());
    Ok(HeightGrid::new(origin, spacing, [w as usize, h as usize], heights))
}
