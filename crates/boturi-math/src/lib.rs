// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Uniform block consumed by the vertex stage: model, view, projection.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MvpMatrix {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

impl MvpMatrix {
    /// Camera at (2, 2, 2) looking at the origin, Z up, 45° vertical FOV.
    ///
    /// The projection Y axis is flipped for Vulkan clip space.
    pub fn looking_at_origin(aspect: f32) -> Self {
        let view = Mat4::look_at_rh(Vec3::splat(2.0), Vec3::ZERO, Vec3::Z);
        let mut projection = Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, 10.0);
        projection.y_axis.y *= -1.0;
        MvpMatrix {
            model: Mat4::IDENTITY.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
