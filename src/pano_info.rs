// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2021 Adrian <adrian.eddy at gmail>

use std::f64::consts::PI;

use crate::mat4::{ self, Mat4, DEG_TO_RAD };
use crate::xmp::{ Attributes, XmpMetadata };

/// GPano parameters with every missing value resolved to its default.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct GPanoParams {
    pub cropped_area_image_width_pixels: f64,
    pub cropped_area_image_height_pixels: f64,
    pub full_pano_width_pixels: f64,
    pub full_pano_height_pixels: f64,
    pub cropped_area_left_pixels: f64,
    pub cropped_area_top_pixels: f64,
    pub pose_heading_degrees: f64,
    pub pose_pitch_degrees: f64,
    pub pose_roll_degrees: f64,
    pub initial_view_heading_degrees: f64,
}

// Number conversion of an attribute value. Unparsable values count as missing.
fn number(attrs: Option<&Attributes>, key: &str) -> Option<f64> {
    let v = attrs?.get(key)?.trim();
    if v.is_empty() {
        return Some(0.0);
    }
    match v.parse::<f64>() {
        Ok(x) => Some(x),
        Err(_) => {
            log::warn!("Ignoring invalid {key} value: {v:?}");
            None
        }
    }
}

impl GPanoParams {
    pub fn new(width: u32, height: u32, attrs: Option<&Attributes>) -> Self {
        let (w, h) = (width as f64, height as f64);

        let cropped_area_image_width_pixels  = number(attrs, "GPano:CroppedAreaImageWidthPixels") .unwrap_or(w);
        let cropped_area_image_height_pixels = number(attrs, "GPano:CroppedAreaImageHeightPixels").unwrap_or(h);
        let full_pano_width_pixels           = number(attrs, "GPano:FullPanoWidthPixels")         .unwrap_or(w);
        let full_pano_height_pixels          = number(attrs, "GPano:FullPanoHeightPixels")        .unwrap_or(h);
        let cropped_area_left_pixels         = number(attrs, "GPano:CroppedAreaLeftPixels")       .unwrap_or(0.0);
        let cropped_area_top_pixels          = number(attrs, "GPano:CroppedAreaTopPixels")        .unwrap_or(0.0);
        let pose_heading_degrees             = number(attrs, "GPano:PoseHeadingDegrees")          .unwrap_or(0.0);
        let pose_pitch_degrees               = number(attrs, "GPano:PosePitchDegrees")            .unwrap_or(0.0);
        let pose_roll_degrees                = number(attrs, "GPano:PoseRollDegrees")             .unwrap_or(0.0);
        let initial_view_heading_degrees     = number(attrs, "GPano:InitialViewHeadingDegrees")   .unwrap_or_else(|| {
            (cropped_area_left_pixels + cropped_area_image_width_pixels * 0.5) / full_pano_width_pixels * 360.0
        });

        Self {
            cropped_area_image_width_pixels,
            cropped_area_image_height_pixels,
            full_pano_width_pixels,
            full_pano_height_pixels,
            cropped_area_left_pixels,
            cropped_area_top_pixels,
            pose_heading_degrees,
            pose_pitch_degrees,
            pose_roll_degrees,
            initial_view_heading_degrees,
        }
    }

    /// Longitude of the crop center, in radians.
    pub fn center_rotation(&self) -> f64 {
        (self.cropped_area_left_pixels + self.cropped_area_image_width_pixels * 0.5) / self.full_pano_width_pixels * 2.0 * PI
    }
}

/// Where the image sits on the sphere and how the sphere is oriented for rendering.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PanoInfo {
    pub crop_base: [f32; 2],
    pub crop_size: [f32; 2],
    pub rotation: Mat4,
}

impl PanoInfo {
    /// Only the standard XMP packet is consulted, the extended one carries the embedded image.
    pub fn new(width: u32, height: u32, metadata: Option<&XmpMetadata>) -> Self {
        Self::from_params(&GPanoParams::new(width, height, metadata.map(XmpMetadata::standard)))
    }

    pub fn from_params(p: &GPanoParams) -> Self {
        // PoseHeadingDegrees is resolved but the view heading takes its place here
        let crop_base = [
            (p.cropped_area_left_pixels / p.full_pano_width_pixels) as f32,
            (p.cropped_area_top_pixels / p.full_pano_height_pixels) as f32,
        ];
        let crop_size = [
            (p.cropped_area_image_width_pixels / p.full_pano_width_pixels) as f32,
            (p.cropped_area_image_height_pixels / p.full_pano_height_pixels) as f32,
        ];

        let center_rot = p.center_rotation();

        let pitch_mat   = mat4::pitch((p.pose_pitch_degrees * DEG_TO_RAD) as f32);
        let heading_mat = mat4::yaw((p.initial_view_heading_degrees * DEG_TO_RAD - center_rot) as f32);
        let roll_mat    = mat4::roll((-p.pose_roll_degrees * DEG_TO_RAD) as f32);
        let inv_rot_mat = mat4::inv(&mat4::mul(&heading_mat, &mat4::mul(&pitch_mat, &roll_mat)));

        let center_heading_mat = mat4::yaw(-center_rot as f32);

        Self {
            crop_base,
            crop_size,
            rotation: mat4::mul(&center_heading_mat, &inv_rot_mat),
        }
    }

    pub fn crop_base(&self) -> [f32; 2] { self.crop_base }
    pub fn crop_size(&self) -> [f32; 2] { self.crop_size }
    pub fn rotation(&self) -> &Mat4 { &self.rotation }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(list: &[(&str, &str)]) -> XmpMetadata {
        XmpMetadata::Standard(Attributes(list.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()))
    }

    fn assert_close(a: &Mat4, b: &Mat4) {
        for (x, y) in a.0.iter().zip(b.0.iter()) {
            assert!((x - y).abs() < 1e-4, "{a:?}\n{b:?}");
        }
    }

    #[test]
    fn defaults_without_metadata() {
        let p = GPanoParams::new(100, 50, None);
        assert_eq!(p.full_pano_width_pixels, 100.0);
        assert_eq!(p.cropped_area_image_height_pixels, 50.0);
        assert_eq!(p.initial_view_heading_degrees, 180.0);
        assert!((p.center_rotation() - PI).abs() < 1e-12);

        let info = PanoInfo::new(100, 50, None);
        assert_eq!(info.crop_base(), [0.0, 0.0]);
        assert_eq!(info.crop_size(), [1.0, 1.0]);
        assert_close(info.rotation(), &mat4::yaw(-std::f32::consts::PI));
    }

    #[test]
    fn cropped_partial_panorama() {
        let md = attrs(&[
            ("GPano:CroppedAreaImageWidthPixels", "2000"),
            ("GPano:CroppedAreaImageHeightPixels", "1000"),
            ("GPano:FullPanoWidthPixels", "4000"),
            ("GPano:FullPanoHeightPixels", "2000"),
            ("GPano:CroppedAreaLeftPixels", "1000"),
            ("GPano:CroppedAreaTopPixels", "500"),
        ]);
        let info = PanoInfo::new(2000, 1000, Some(&md));
        assert_eq!(info.crop_base, [0.25, 0.25]);
        assert_eq!(info.crop_size, [0.5, 0.5]);
        // Initial heading defaults to the crop center, so only the center rotation remains
        assert_close(&info.rotation, &mat4::yaw(-std::f32::consts::PI));
    }

    #[test]
    fn initial_heading_and_pose() {
        let md = attrs(&[
            ("GPano:InitialViewHeadingDegrees", "90"),
            ("GPano:PosePitchDegrees", "10"),
            ("GPano:PoseRollDegrees", "-5"),
        ]);
        let info = PanoInfo::new(400, 200, Some(&md));
        let center = std::f32::consts::PI;
        let heading = mat4::yaw(std::f32::consts::FRAC_PI_2 - center);
        let pitch = mat4::pitch(10f32.to_radians());
        let roll = mat4::roll(5f32.to_radians());
        let expected = mat4::mul(&mat4::yaw(-center), &mat4::inv(&mat4::mul(&heading, &mat4::mul(&pitch, &roll))));
        assert_close(&info.rotation, &expected);
    }

    #[test]
    fn first_value_wins_and_garbage_is_ignored() {
        let md = attrs(&[
            ("GPano:FullPanoWidthPixels", " 200 "),
            ("GPano:FullPanoWidthPixels", "400"),
            ("GPano:CroppedAreaLeftPixels", "abc"),
            ("GPano:CroppedAreaTopPixels", ""),
        ]);
        let p = GPanoParams::new(100, 50, Some(md.standard()));
        assert_eq!(p.full_pano_width_pixels, 200.0);
        assert_eq!(p.cropped_area_left_pixels, 0.0);
        assert_eq!(p.cropped_area_top_pixels, 0.0);
        assert_eq!(p.initial_view_heading_degrees, 90.0);
    }

    #[test]
    fn extended_packet_is_not_consulted() {
        let md = XmpMetadata::Extended(
            Attributes::default(),
            Attributes(vec![("GPano:FullPanoWidthPixels".into(), "1000".into())]),
        );
        let info = PanoInfo::new(100, 50, Some(&md));
        assert_eq!(info.crop_size, [1.0, 1.0]);
    }
}
