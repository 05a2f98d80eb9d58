// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2021 Adrian <adrian.eddy at gmail>

pub mod mat4;
pub mod jpeg;
pub mod xmp;
pub mod pano_info;
pub mod projection;
pub mod util;

use std::io::*;

pub use pano_info::{ PanoInfo, GPanoParams };
pub use xmp::{ Attributes, XmpMetadata };

/// A decoded panorama: its geometry and the optional image for the right eye.
#[derive(Debug, Clone)]
pub struct PanoImage {
    pub width: u32,
    pub height: u32,
    pub metadata: Option<XmpMetadata>,
    pub info: PanoInfo,
    /// Encoded bytes of the image embedded in the extended XMP, if any.
    pub embedded_image: Option<Vec<u8>>,
}

impl PanoImage {
    /// `width` and `height` are the dimensions of the decoded `data`.
    pub fn from_bytes(data: &[u8], width: u32, height: u32) -> Self {
        let metadata = xmp::parse(data);
        if metadata.is_none() {
            log::debug!("No usable XMP metadata, treating the image as a full sphere");
        }
        let info = PanoInfo::new(width, height, metadata.as_ref());
        let embedded_image = metadata.as_ref().and_then(XmpMetadata::embedded_image);
        Self { width, height, metadata, info, embedded_image }
    }

    /// Reads the whole stream, dimensions come from the JPEG frame header.
    pub fn from_stream<T: Read + Seek>(stream: &mut T) -> Result<Self> {
        let data = util::read_all(stream)?;
        let (width, height) = jpeg::frame_size(&data).ok_or_else(|| Error::new(ErrorKind::InvalidData, "No JPEG frame header found"))?;
        Ok(Self::from_bytes(&data, width, height))
    }

    pub fn has_embedded_image(&self) -> bool {
        self.embedded_image.is_some()
    }
}
