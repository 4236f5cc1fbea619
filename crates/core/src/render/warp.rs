//! Texture coordinates of the warp pass.

use crate::expr::WarpParams;
use crate::mesh::WarpMesh;

/// Amplitude of the animated warp wobble per unit of `warp`.
const WARP_AMPLITUDE: f32 = 0.0035;

/// Frame-wide inputs of the warp computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpFrame {
    pub time: f32,
    pub warp_anim_speed: f32,
    pub warp_scale: f32,
    pub aspect_x: f32,
    pub aspect_y: f32,
    pub inv_aspect_x: f32,
    pub inv_aspect_y: f32,
}

/// For every mesh vertex, where to sample the previous frame. Zoom and
/// stretch act about `(cx, cy)`, then the wobble, rotation and translation
/// are applied in that order.
pub fn warped_uvs(frame: &WarpFrame, mesh: &WarpMesh, params: &[WarpParams], out: &mut Vec<[f32; 2]>) {
    let warp_time = frame.time * frame.warp_anim_speed;
    let scale_inv = if frame.warp_scale == 0.0 {
        1.0
    } else {
        1.0 / frame.warp_scale
    };
    let f = [
        11.68 + 4.0 * (warp_time * 1.413 + 10.0).cos(),
        8.77 + 3.0 * (warp_time * 1.113 + 7.0).cos(),
        10.54 + 3.0 * (warp_time * 1.233 + 3.0).cos(),
        11.49 + 4.0 * (warp_time * 0.933 + 5.0).cos(),
    ];

    out.clear();
    out.extend(mesh.vertices().iter().zip(params).map(|(vertex, p)| {
        let zoom = p.zoom.powf(p.zoom_exp.powf(vertex.radius * 2.0 - 1.0));
        let zoom_inv = 1.0 / zoom;

        let mut u = vertex.x * frame.aspect_x * 0.5 * zoom_inv + 0.5;
        let mut v = -vertex.y * frame.aspect_y * 0.5 * zoom_inv + 0.5;

        u = (u - p.cx) / p.sx + p.cx;
        v = (v - p.cy) / p.sy + p.cy;

        if p.warp != 0.0 {
            let (x, y) = (vertex.x, vertex.y);
            let amount = p.warp * WARP_AMPLITUDE;
            u += amount * (warp_time * 0.333 + scale_inv * (x * f[0] - y * f[3])).sin();
            v += amount * (warp_time * 0.375 - scale_inv * (x * f[2] + y * f[1])).cos();
            u += amount * (warp_time * 0.753 - scale_inv * (x * f[1] - y * f[2])).cos();
            v += amount * (warp_time * 0.825 + scale_inv * (x * f[0] + y * f[3])).sin();
        }

        let (du, dv) = (u - p.cx, v - p.cy);
        let (sin, cos) = p.rot.sin_cos();
        u = du * cos - dv * sin + p.cx;
        v = du * sin + dv * cos + p.cy;

        u -= p.dx;
        v -= p.dy;

        [
            (u - 0.5) * frame.inv_aspect_x + 0.5,
            (v - 0.5) * frame.inv_aspect_y + 0.5,
        ]
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> WarpFrame {
        WarpFrame {
            time: 1.0,
            warp_anim_speed: 1.0,
            warp_scale: 1.0,
            aspect_x: 1.0,
            aspect_y: 1.0,
            inv_aspect_x: 1.0,
            inv_aspect_y: 1.0,
        }
    }

    fn identity() -> WarpParams {
        WarpParams {
            warp: 0.0,
            ..WarpParams::default()
        }
    }

    #[test]
    fn identity_parameters_sample_in_place() {
        let mesh = WarpMesh::generate(8, 8, 1.0, 1.0).unwrap();
        let params = vec![identity(); mesh.vertices().len()];
        let mut uvs = Vec::new();

        warped_uvs(&frame(), &mesh, &params, &mut uvs);

        for (vertex, uv) in mesh.vertices().iter().zip(&uvs) {
            assert!((uv[0] - vertex.u).abs() < 1e-5);
            assert!((uv[1] - vertex.v).abs() < 1e-5);
        }
    }

    #[test]
    fn zoom_pulls_samples_towards_the_centre() {
        let mesh = WarpMesh::generate(8, 8, 1.0, 1.0).unwrap();
        let params = vec![
            WarpParams {
                zoom: 2.0,
                ..identity()
            };
            mesh.vertices().len()
        ];
        let mut uvs = Vec::new();

        warped_uvs(&frame(), &mesh, &params, &mut uvs);

        let corner = uvs[0];
        assert!((corner[0] - 0.25).abs() < 1e-5);
        assert!((corner[1] - 0.25).abs() < 1e-5);
    }

    #[test]
    fn translation_is_subtracted() {
        let mesh = WarpMesh::generate(4, 4, 1.0, 1.0).unwrap();
        let params = vec![
            WarpParams {
                dx: 0.1,
                dy: -0.2,
                ..identity()
            };
            mesh.vertices().len()
        ];
        let mut uvs = Vec::new();

        warped_uvs(&frame(), &mesh, &params, &mut uvs);
        let vertex = mesh.vertices()[0];
        assert!((uvs[0][0] - (vertex.u - 0.1)).abs() < 1e-5);
        assert!((uvs[0][1] - (vertex.v + 0.2)).abs() < 1e-5);
    }
}
