// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2021 Adrian <adrian.eddy at gmail>

use std::io::*;

pub fn invalid_data<E: std::fmt::Display>(e: E) -> Error {
    Error::new(ErrorKind::InvalidData, e.to_string())
}

/// Reads the whole stream, leaving it rewound.
pub fn read_all<T: Read + Seek>(stream: &mut T) -> Result<Vec<u8>> {
    stream.seek(SeekFrom::Start(0))?;
    let mut all = Vec::new();
    stream.read_to_end(&mut all)?;
    stream.seek(SeekFrom::Start(0))?;
    Ok(all)
}

#[macro_export]
macro_rules! try_block {
    ($type:ty, $body:block) => {
        (|| -> Option<$type> {
            Some($body)
        }())
    };
    ($body:block) => {
        (|| -> Option<()> {
            $body
            Some(())
        }())
    };
}
