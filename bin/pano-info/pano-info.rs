// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2021 Adrian <adrian.eddy at gmail>

use argh::FromArgs;
use serde::Serialize;

use panoview::*;

/** pano-info v0.1.0
Author: Adrian <adrian.eddy@gmail.com>

Print the photo sphere geometry of a JPEG file as JSON
*/
#[derive(FromArgs)]
struct Opts {
    /// input file
    #[argh(positional)]
    input: String,

    /// image width, read from the JPEG frame header if not given
    #[argh(option)]
    width: Option<u32>,

    /// image height, read from the JPEG frame header if not given
    #[argh(option)]
    height: Option<u32>,

    /// dump all XMP attributes
    #[argh(switch, short = 'd')]
    dump: bool,

    /// write the embedded right eye image to this path
    #[argh(option)]
    embedded: Option<String>,
}

#[derive(Serialize)]
struct Output<'a> {
    width: u32,
    height: u32,
    params: GPanoParams,
    info: &'a PanoInfo,
    has_embedded_image: bool,
}

fn main() {
    let opts: Opts = argh::from_env();

    let data = match std::fs::read(&opts.input) {
        Ok(x) => x,
        Err(e) => { eprintln!("Failed to read {}: {e}", opts.input); std::process::exit(1); }
    };

    let frame = jpeg::frame_size(&data);
    let (Some(width), Some(height)) = (opts.width.or(frame.map(|x| x.0)), opts.height.or(frame.map(|x| x.1))) else {
        eprintln!("Unknown image size, pass --width and --height");
        std::process::exit(1);
    };

    let image = PanoImage::from_bytes(&data, width, height);

    if opts.dump {
        match &image.metadata {
            Some(md) => {
                for (k, v) in md.standard() {
                    println!("{: <45} {}", k, v);
                }
                if let Some(ext) = md.extended() {
                    println!("--- extended ---");
                    for (k, v) in ext {
                        println!("{: <45} {}", k, if v.len() > 64 { format!("{}... ({} bytes)", v.chars().take(64).collect::<String>(), v.len()) } else { v.clone() });
                    }
                }
            },
            None => println!("No XMP metadata"),
        }
    }

    if let Some(path) = &opts.embedded {
        match &image.embedded_image {
            Some(bytes) => {
                if let Err(e) = std::fs::write(path, bytes) {
                    eprintln!("Failed to write {path}: {e}");
                }
            },
            None => eprintln!("No embedded image in {}", opts.input),
        }
    }

    let out = Output {
        width,
        height,
        params: GPanoParams::new(width, height, image.metadata.as_ref().map(XmpMetadata::standard)),
        info: &image.info,
        has_embedded_image: image.has_embedded_image(),
    };
    match serde_json::to_string_pretty(&out) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("{e}"),
    }
}
