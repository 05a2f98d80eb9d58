// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2021 Adrian <adrian.eddy at gmail>

pub mod leaves;

use std::io::*;
use byteorder::{ ReadBytesExt, BigEndian };
use memchr::memmem;

use crate::jpeg::{ self, Segments };

pub const XMP_SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
pub const EXTENSION_SIGNATURE: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
pub const GUID_LEN: usize = 32;
pub const EXTENSION_HEADER_SIZE: usize = 35 + GUID_LEN + 4 + 4; // signature, guid, full size, offset

pub const HAS_EXTENDED_XMP: &str = "xmpNote:HasExtendedXMP";
pub const GIMAGE_DATA: &str = "GImage:Data";

/// Ordered `(name, value)` pairs. Names can repeat, lookups return the first one.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Attributes(pub Vec<(String, String)>);

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
    pub fn iter(&self) -> std::slice::Iter<'_, (String, String)> {
        self.0.iter()
    }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a (String, String);
    type IntoIter = std::slice::Iter<'a, (String, String)>;
    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum XmpMetadata {
    Standard(Attributes),
    Extended(Attributes, Attributes),
}

impl XmpMetadata {
    pub fn standard(&self) -> &Attributes {
        match self {
            Self::Standard(s) | Self::Extended(s, _) => s,
        }
    }
    pub fn extended(&self) -> Option<&Attributes> {
        match self {
            Self::Standard(_) => None,
            Self::Extended(_, e) => Some(e),
        }
    }

    /// Image embedded in the extended packet (`GImage:Data`), used as the right eye of stereo photo spheres.
    pub fn embedded_image(&self) -> Option<Vec<u8>> {
        use base64::Engine as _;
        let data = self.extended()?.get(GIMAGE_DATA)?;
        let data: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        match base64::engine::general_purpose::STANDARD.decode(data) {
            Ok(x) => Some(x),
            Err(e) => {
                log::warn!("Invalid {GIMAGE_DATA}: {e}");
                None
            }
        }
    }
}

/// Extended XMP being put back together from its chunks.
#[derive(Debug)]
pub struct ExtendedAssembly {
    pub id: String,
    pub full_size: u32,
    pub buffer: Vec<u8>,
}

impl ExtendedAssembly {
    pub fn new(id: &str, full_size: u32) -> Self {
        Self { id: id.to_owned(), full_size, buffer: vec![0u8; full_size as usize] }
    }

    pub fn write(&mut self, offset: u32, chunk: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start.checked_add(chunk.len()).filter(|end| *end <= self.buffer.len()).ok_or_else(|| {
            Error::new(ErrorKind::InvalidData, format!("Extended XMP chunk at {offset} with {} bytes exceeds the declared size {}", chunk.len(), self.full_size))
        })?;
        self.buffer[start..end].copy_from_slice(chunk);
        Ok(())
    }
}

/// Cuts the `x:xmpmeta` element out of a packet and flattens it.
pub fn parse_packet(data: &[u8]) -> Result<Attributes> {
    let xml = String::from_utf8_lossy(data);
    let start = memmem::find(xml.as_bytes(), b"<x:xmpmeta ");
    let end = memmem::find(xml.as_bytes(), b"</x:xmpmeta>");
    match (start, end) {
        (Some(start), Some(end)) if start <= end => leaves::leaves(&xml[start..end + 12]),
        _ => Err(Error::new(ErrorKind::NotFound, "No x:xmpmeta element in XMP packet"))
    }
}

struct Scanner<'a> {
    data: &'a [u8],
    segments: Segments<'a>,
    standard: Option<Attributes>,
    extension_id: Option<String>,
    assembly: Option<ExtendedAssembly>,
}

impl<'a> Scanner<'a> {
    fn new(data: &'a [u8]) -> Result<Self> {
        Ok(Self {
            data,
            segments: Segments::new(data)?,
            standard: None,
            extension_id: None,
            assembly: None,
        })
    }

    fn run(mut self) -> Result<Option<XmpMetadata>> {
        while let Some(seg) = self.segments.next() {
            let seg = seg?;
            if seg.marker != jpeg::APP1 {
                continue;
            }
            let payload = seg.payload(self.data)?;
            if payload.starts_with(XMP_SIGNATURE) {
                let attrs = parse_packet(&payload[XMP_SIGNATURE.len()..])?;
                let Some(id) = attrs.get(HAS_EXTENDED_XMP) else {
                    return Ok(Some(XmpMetadata::Standard(attrs)));
                };
                if id.chars().count() != GUID_LEN {
                    log::error!("Invalid extended XMP id: {id:?}");
                    return Ok(None);
                }
                self.extension_id = Some(id.to_owned());
                self.standard = Some(attrs);
            } else if self.is_extension(payload) {
                self.add_chunk(payload)?;
            } else {
                log::debug!("Skipping APP1 segment at {}", seg.offset);
            }
        }

        let Some(standard) = self.standard else {
            return Ok(None);
        };
        let Some(assembly) = self.assembly else {
            log::warn!("Extended XMP {} declared but no chunks found", self.extension_id.unwrap_or_default());
            return Ok(Some(XmpMetadata::Standard(standard)));
        };
        match parse_packet(&assembly.buffer) {
            Ok(extended) => Ok(Some(XmpMetadata::Extended(standard, extended))),
            Err(e) => {
                log::warn!("Failed to parse extended XMP: {e}");
                Ok(Some(XmpMetadata::Standard(standard)))
            }
        }
    }

    fn is_extension(&self, payload: &[u8]) -> bool {
        match &self.extension_id {
            Some(id) => payload.starts_with(EXTENSION_SIGNATURE) && payload[EXTENSION_SIGNATURE.len()..].starts_with(id.as_bytes()),
            None => false
        }
    }

    fn add_chunk(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() < EXTENSION_HEADER_SIZE {
            log::error!("Extended XMP chunk too short: {}", pretty_hex::pretty_hex(&payload));
            return Err(ErrorKind::UnexpectedEof.into());
        }
        let mut d = Cursor::new(&payload[EXTENSION_HEADER_SIZE - 8..]);
        let full_size = d.read_u32::<BigEndian>()?;
        let offset    = d.read_u32::<BigEndian>()?;
        let chunk = &payload[EXTENSION_HEADER_SIZE..];

        if self.assembly.is_none() {
            if full_size as usize > self.data.len() {
                return Err(Error::new(ErrorKind::InvalidData, format!("Extended XMP size {full_size} exceeds the file size")));
            }
            self.assembly = Some(ExtendedAssembly::new(self.extension_id.as_deref().unwrap_or_default(), full_size));
        }
        log::debug!("Extended XMP chunk: offset {offset}, {} bytes of {full_size}", chunk.len());
        match self.assembly.as_mut() {
            Some(assembly) => assembly.write(offset, chunk),
            None => Ok(())
        }
    }
}

/// Finds the XMP metadata of a JPEG file, reassembling the extended packet if there is one.
///
/// Returns `None` if the container is malformed, has no XMP, or declares an invalid
/// extended XMP id. The standard packet is discarded in that last case too.
pub fn parse(data: &[u8]) -> Option<XmpMetadata> {
    match Scanner::new(data).and_then(Scanner::run) {
        Ok(md) => md,
        Err(e) => {
            log::error!("Failed to read XMP metadata: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembly_rejects_out_of_bounds_writes() {
        let mut a = ExtendedAssembly::new("0123456789abcdef0123456789abcdef", 8);
        assert!(a.write(0, b"1234").is_ok());
        assert!(a.write(4, b"5678").is_ok());
        assert_eq!(&a.buffer, b"12345678");
        assert!(a.write(5, b"abcd").is_err());
        assert!(a.write(u32::MAX, b"a").is_err());
        assert_eq!(&a.buffer, b"12345678");
    }

    #[test]
    fn packet_is_cut_to_xmpmeta() {
        let packet = br#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?><x:xmpmeta xmlns:x="adobe:ns:meta/" a="1"/></x:xmpmeta><?xpacket end="w"?>"#;
        // self-closing root followed by a stray closing tag is malformed
        assert!(parse_packet(packet).is_err());

        let packet = br#"<?xpacket begin=""?><x:xmpmeta xmlns:x="adobe:ns:meta/" a="1"></x:xmpmeta><?xpacket end="w"?>"#;
        let attrs = parse_packet(packet).unwrap();
        assert_eq!(attrs.get("a"), Some("1"));
        assert_eq!(attrs.len(), 2);

        assert_eq!(parse_packet(b"<x:xmpmeta>").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn attribute_lookup_returns_first() {
        let attrs = Attributes(vec![("a".into(), "1".into()), ("a".into(), "2".into())]);
        assert_eq!(attrs.get("a"), Some("1"));
        assert_eq!(attrs.get("b"), None);
    }

    #[test]
    fn embedded_image_decodes_base64() {
        let md = XmpMetadata::Extended(Attributes::default(), Attributes(vec![(GIMAGE_DATA.into(), "/9j/\n4AAQ".into())]));
        assert_eq!(md.embedded_image(), Some(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]));
        let md = XmpMetadata::Extended(Attributes::default(), Attributes(vec![(GIMAGE_DATA.into(), "*".into())]));
        assert_eq!(md.embedded_image(), None);
        assert_eq!(XmpMetadata::Standard(Attributes::default()).embedded_image(), None);
    }
}
