// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2021 Adrian <adrian.eddy at gmail>

//! CPU side of the renderer contract: how a view ray ends up as a texture coordinate.
//!
//! The fragment shader of a renderer does the same per pixel: multiply the normalized
//! device coordinate by the transform built here, turn the result into longitude and
//! latitude, then normalize by the crop rectangle. Coordinates outside of the crop are
//! painted black.

use std::f32::consts::{ PI, TAU, FRAC_PI_2 };

use crate::mat4::{ self, Mat4, DEG_TO_RAD };
use crate::pano_info::PanoInfo;

/// Device orientation of a handheld viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceOrientation {
    /// From [`mat4::device_orientation`].
    pub matrix: Mat4,
    /// Screen rotation relative to the device's natural orientation (0, 90, -90, 180).
    pub screen_orientation_degrees: f32,
}

impl DeviceOrientation {
    /// Angles in degrees, as reported by the platform.
    pub fn from_degrees(alpha: f32, beta: f32, gamma: f32, screen_orientation_degrees: f32) -> Self {
        let r = DEG_TO_RAD as f32;
        Self {
            matrix: mat4::device_orientation(alpha * r, beta * r, gamma * r),
            screen_orientation_degrees,
        }
    }
}

/// Projection used for a flat (non-VR) canvas with the given width / height ratio.
pub fn screen_projection(aspect: f32) -> Mat4 {
    let mut m = Mat4([
        1.0, 0.0, 0.0,  0.0,
        0.0, 1.0, 0.0,  0.0,
        0.0, 0.0, -1.0, 0.0,
        0.0, 0.0, -1.0, 1.0,
    ]);
    if aspect > 1.0 {
        m.0[0] = 1.0 / aspect;
    } else {
        m.0[5] = aspect;
    }
    m
}

/// Camera-to-world rotation of a flat viewer.
///
/// With a device orientation the latitude from dragging is ignored, the device decides it.
pub fn flat_inverse_view(rotate_long: f32, rotate_lat: f32, device: Option<&DeviceOrientation>) -> Mat4 {
    let view = match device {
        Some(d) => {
            let screen_rot = mat4::roll(-d.screen_orientation_degrees * DEG_TO_RAD as f32);
            mat4::mul(&mat4::yaw(-FRAC_PI_2), &mat4::mul(&mat4::pitch(-FRAC_PI_2), &mat4::mul(&d.matrix, &screen_rot)))
        },
        None => mat4::pitch(rotate_lat),
    };
    mat4::mul(&mat4::yaw(rotate_long), &view)
}

/// `rotation * inverse_view * projection⁻¹`
pub fn view_transform(info: &PanoInfo, inverse_view: &Mat4, projection: &Mat4) -> Mat4 {
    mat4::mul(&info.rotation, &mat4::mul(inverse_view, &mat4::inv(projection)))
}

/// Transform for one eye of a headset. The eye position is dropped, the panorama is at infinity.
pub fn eye_transform(info: &PanoInfo, view: &Mat4, projection: &Mat4) -> Mat4 {
    view_transform(info, &mat4::clear_translate(&mat4::inv(view)), projection)
}

/// Texture coordinate for a normalized device coordinate (-1..1 on both axes).
pub fn texture_coord(info: &PanoInfo, transform: &Mat4, ndc: [f32; 2]) -> Option<[f32; 2]> {
    sphere_to_texture(info, mat4::transform(transform, [ndc[0], ndc[1], 0.0, 1.0]))
}

/// Texture coordinate for a world space direction (-Z is forward).
pub fn direction_texture_coord(info: &PanoInfo, dir: [f32; 3]) -> Option<[f32; 2]> {
    sphere_to_texture(info, mat4::transform(&info.rotation, [dir[0], dir[1], dir[2], 1.0]))
}

/// Longitude and latitude of a panorama space position, in radians. Longitude is in 0..2π.
pub fn lon_lat(p: [f32; 4]) -> (f32, f32) {
    let mut lon = p[0].atan2(-p[2]);
    let lat = p[1].atan2((p[0] * p[0] + p[2] * p[2]).sqrt());
    if lon < 0.0 {
        lon += TAU;
    }
    (lon, lat)
}

fn sphere_to_texture(info: &PanoInfo, p: [f32; 4]) -> Option<[f32; 2]> {
    let (lon, lat) = lon_lat(p);
    let x = (lon / TAU - info.crop_base[0]) / info.crop_size[0];
    let y = (0.5 - lat / PI - info.crop_base[1]) / info.crop_size[1];
    if x <= 0.0 || x >= 1.0 || y <= 0.0 || y >= 1.0 {
        return None;
    }
    Some([x, y])
}
