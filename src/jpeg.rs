// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2021 Adrian <adrian.eddy at gmail>

use std::io::*;
use byteorder::{ ReadBytesExt, BigEndian };

pub const SOI:  u16 = 0xFFD8; // Start of image
pub const SOS:  u16 = 0xFFDA; // Start of scan
pub const APP1: u16 = 0xFFE1;

/// A length-prefixed block of the container. `size` includes its own two bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub marker: u16,
    pub size: u16,
    pub offset: usize,
    pub len: usize,
}

impl Segment {
    pub fn payload<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        data.get(self.offset..self.offset + self.len).ok_or_else(|| {
            log::error!("Segment 0x{:04X} at {} exceeds the buffer ({} bytes)", self.marker, self.offset, data.len());
            ErrorKind::UnexpectedEof.into()
        })
    }
}

/// Walks the segment headers until the start of scan. Payloads are not bounds-checked here.
pub struct Segments<'a> {
    d: Cursor<&'a [u8]>,
    done: bool,
}

impl<'a> Segments<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let mut d = Cursor::new(data);
        if d.read_u16::<BigEndian>()? != SOI {
            return Err(Error::new(ErrorKind::InvalidData, "Missing start of image marker"));
        }
        Ok(Self { d, done: false })
    }

    fn read_segment(&mut self) -> Result<Option<Segment>> {
        let len = self.d.get_ref().len() as u64;
        if self.d.position() + 4 >= len {
            return Ok(None);
        }
        let marker = self.d.read_u16::<BigEndian>()?;
        let size   = self.d.read_u16::<BigEndian>()?;
        if marker == SOS {
            return Ok(None);
        }
        if size < 2 {
            return Err(Error::new(ErrorKind::InvalidData, format!("Invalid size {size} of segment 0x{marker:04X}")));
        }
        let offset = self.d.position() as usize;
        let len = size as usize - 2;
        self.d.seek(SeekFrom::Current(len as i64))?;
        Ok(Some(Segment { marker, size, offset, len }))
    }
}

impl Iterator for Segments<'_> {
    type Item = Result<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let ret = self.read_segment().transpose();
        if !matches!(ret, Some(Ok(_))) {
            self.done = true;
        }
        ret
    }
}

/// Width and height from the first start-of-frame segment.
pub fn frame_size(data: &[u8]) -> Option<(u32, u32)> {
    for seg in Segments::new(data).ok()? {
        let seg = seg.ok()?;
        match seg.marker {
            0xFFC4 | 0xFFC8 | 0xFFCC => { }, // DHT, JPG, DAC
            0xFFC0..=0xFFCF => {
                return crate::try_block!((u32, u32), {
                    let mut d = Cursor::new(seg.payload(data).ok()?);
                    let _precision = d.read_u8().ok()?;
                    let height = d.read_u16::<BigEndian>().ok()? as u32;
                    let width  = d.read_u16::<BigEndian>().ok()? as u32;
                    (width, height)
                });
            },
            _ => { }
        }
    }
    None
}
