//! `facegate probe`: decodes a captured frame the way the pipelines do, so
//! operators can tell a malformed client payload from a recognition failure.

use std::fs;

use anyhow::{Context, Result};
use facegate_core::{decode_frame, decode_frame_bytes, Frame};

fn decode(contents: &[u8], raw: bool) -> Result<Frame> {
    let frame = if raw {
        decode_frame_bytes(contents)?
    } else {
        let text = std::str::from_utf8(contents).context("payload is not UTF-8 text")?;
        decode_frame(text)?
    };
    Ok(frame)
}

pub fn run(file: &str, raw: bool) -> Result<()> {
    let contents = fs::read(file).with_context(|| format!("failed to read {file}"))?;
    let frame = decode(&contents, raw).with_context(|| format!("failed to decode {file}"))?;
    println!(
        "{file}: {}x{} pixels, decodes ok",
        frame.color.width(),
        frame.color.height()
    );
    Ok(())
}
