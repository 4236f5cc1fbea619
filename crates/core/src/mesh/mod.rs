//! Full-screen grid meshes carrying cartesian and polar coordinates.
//!
//! The grid folds its two centre lines onto the screen centre, so the seam
//! between the halves has zero width and the `ang` field can be fixed up on
//! either side of it without interpolating across the 0/2π wrap.

use std::f32::consts::{PI, TAU};

use crate::{RenderError, Result};

const SQUISH_EXPONENT: f32 = 3.0;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeshVertex {
    /// Clip-space position in [-1, 1].
    pub x: f32,
    pub y: f32,
    pub u: f32,
    pub v: f32,
    /// Distance from the centre, 1 at the corners.
    pub radius: f32,
    /// Counter-clockwise from three o'clock.
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WarpMesh {
    width: u32,
    height: u32,
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
}

impl WarpMesh {
    /// Builds the grid. `width` and `height` must be even and at least 4.
    pub fn generate(width: u32, height: u32, aspect_x: f32, aspect_y: f32) -> Result<Self> {
        check_grid(width, height)?;
        Ok(Self::build(width, height, aspect_x, aspect_y))
    }

    fn build(width: u32, height: u32, aspect_x: f32, aspect_y: f32) -> Self {
        let w = width as usize;
        let h = height as usize;
        let half_w = w / 2;
        let half_h = h / 2;
        let step_x = 1.0 / (w - 2) as f32;
        let step_y = 1.0 / (h - 2) as f32;

        let mut vertices = Vec::with_capacity(w * h);
        for grid_y in 0..h {
            let v = squish_to_center((grid_y - grid_y / half_h) as f32 * step_y, SQUISH_EXPONENT);
            for grid_x in 0..w {
                let u =
                    squish_to_center((grid_x - grid_x / half_w) as f32 * step_x, SQUISH_EXPONENT);
                let (radius, angle) = uv_to_math_space(aspect_x, aspect_y, u, v);
                let angle = seam_angle(grid_x, grid_y, half_w, half_h).unwrap_or(angle);

                vertices.push(MeshVertex {
                    x: u * 2.0 - 1.0,
                    y: -(v * 2.0 - 1.0),
                    u,
                    v,
                    radius,
                    angle,
                });
            }
        }

        let at = |x: usize, y: usize| (y * w + x) as u32;
        let mut indices = Vec::with_capacity((w - 2) * (h - 2) * 6);
        for grid_y in 0..h - 1 {
            if grid_y == half_h - 1 {
                continue;
            }
            for grid_x in 0..w - 1 {
                if grid_x == half_w - 1 {
                    continue;
                }

                let left_half = grid_x < half_w;
                let top_half = grid_y < half_h;
                let center4 = (grid_x == half_w || grid_x == half_w - 1)
                    && (grid_y == half_h || grid_y == half_h - 1);
                let parity = (left_half as u8 + top_half as u8 + center4 as u8) % 2;

                // Diagonals run away from the centre so `ang` interpolates
                // along the radial direction.
                if parity == 1 {
                    indices.extend_from_slice(&[
                        at(grid_x, grid_y),
                        at(grid_x + 1, grid_y),
                        at(grid_x + 1, grid_y + 1),
                        at(grid_x + 1, grid_y + 1),
                        at(grid_x, grid_y + 1),
                        at(grid_x, grid_y),
                    ]);
                } else {
                    indices.extend_from_slice(&[
                        at(grid_x, grid_y + 1),
                        at(grid_x, grid_y),
                        at(grid_x + 1, grid_y),
                        at(grid_x + 1, grid_y),
                        at(grid_x + 1, grid_y + 1),
                        at(grid_x, grid_y + 1),
                    ]);
                }
            }
        }

        Self {
            width,
            height,
            vertices,
            indices,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major, `width * height` entries.
    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex(&self, grid_x: u32, grid_y: u32) -> Option<&MeshVertex> {
        if grid_x >= self.width {
            return None;
        }
        self.vertices
            .get(grid_y as usize * self.width as usize + grid_x as usize)
    }
}

/// Pushes values in [0, 1] towards the centre: `p` steepens the curve
/// around 0.5 and flattens it near the edges.
pub fn squish_to_center(x: f32, exponent: f32) -> f32 {
    if x > 0.5 {
        (x * 2.0 - 1.0).powf(exponent) * 0.5 + 0.5
    } else {
        (1.0 - (1.0 - x * 2.0).powf(exponent)) * 0.5
    }
}

/// UV to (radius, angle) about the screen centre. Radius is 1 at the
/// corners; angle lies in [0, 2π).
pub fn uv_to_math_space(aspect_x: f32, aspect_y: f32, u: f32, v: f32) -> (f32, f32) {
    let px = (u * 2.0 - 1.0) * aspect_x;
    let py = (v * 2.0 - 1.0) * aspect_y;
    let radius = (px * px + py * py).sqrt() / (aspect_x * aspect_x + aspect_y * aspect_y).sqrt();
    let mut angle = py.atan2(px);
    if angle < 0.0 {
        angle += TAU;
    }
    (radius, angle)
}

/// Fixed angles for the two seam columns and rows.
fn seam_angle(grid_x: usize, grid_y: usize, half_w: usize, half_h: usize) -> Option<f32> {
    let turns = if grid_x == half_w - 1 {
        match grid_y {
            y if y < half_h - 1 => 1.5,
            y if y == half_h - 1 => 1.25,
            y if y == half_h => 0.75,
            _ => 0.5,
        }
    } else if grid_x == half_w {
        match grid_y {
            y if y < half_h - 1 => 1.5,
            y if y == half_h - 1 => 1.75,
            y if y == half_h => 0.25,
            _ => 0.5,
        }
    } else if grid_y == half_h - 1 {
        if grid_x < half_w - 1 {
            1.0
        } else {
            2.0
        }
    } else if grid_y == half_h {
        if grid_x < half_w - 1 {
            1.0
        } else {
            0.0
        }
    } else {
        return None;
    };
    Some(PI * turns)
}

fn check_grid(width: u32, height: u32) -> Result<()> {
    if width < 4 || height < 4 || width % 2 != 0 || height % 2 != 0 {
        return Err(RenderError::Config(format!(
            "mesh grid must be even and at least 4x4, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Holds one mesh of a fixed grid size and rebuilds it only when the
/// aspect ratio changes or it is invalidated.
#[derive(Debug)]
pub struct MeshCache {
    width: u32,
    height: u32,
    aspect: Option<(u32, u32)>,
    mesh: Option<WarpMesh>,
    regenerations: u64,
}

impl MeshCache {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        check_grid(width, height)?;
        Ok(Self {
            width,
            height,
            aspect: None,
            mesh: None,
            regenerations: 0,
        })
    }

    pub fn get(&mut self, aspect_x: f32, aspect_y: f32) -> &WarpMesh {
        let key = (aspect_x.to_bits(), aspect_y.to_bits());
        if self.aspect != Some(key) {
            self.mesh = None;
        }
        if self.mesh.is_none() {
            self.regenerations += 1;
            self.aspect = Some(key);
            tracing::debug!(
                width = self.width,
                height = self.height,
                aspect_x,
                aspect_y,
                "generating warp mesh"
            );
        }
        let (width, height) = (self.width, self.height);
        self.mesh
            .get_or_insert_with(|| WarpMesh::build(width, height, aspect_x, aspect_y))
    }

    /// Last generated mesh, if any.
    pub fn current(&self) -> Option<&WarpMesh> {
        self.mesh.as_ref()
    }

    pub fn invalidate(&mut self) {
        self.mesh = None;
        self.aspect = None;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn regenerations(&self) -> u64 {
        self.regenerations
    }
}
