//! Builders for containers the extractor reads in-process

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Morrowind-layout BSA holding `entries` uncompressed
///
/// Names use `\` like the game's own archives.
pub fn tes3_bsa(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let count = entries.len() as u32;
    let names_len: u32 = entries.iter().map(|(name, _)| name.len() as u32 + 1).sum();

    let mut out = Vec::new();
    out.extend_from_slice(&0x100u32.to_le_bytes());
    out.extend_from_slice(&(count * 12 + names_len).to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());

    let mut data_offset = 0u32;
    for (_, data) in entries {
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&data_offset.to_le_bytes());
        data_offset += data.len() as u32;
    }
    let mut name_offset = 0u32;
    for (name, _) in entries {
        out.extend_from_slice(&name_offset.to_le_bytes());
        name_offset += name.len() as u32 + 1;
    }
    for (name, _) in entries {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }
    // Name hashes only need to be distinct
    for i in 0..entries.len() as u64 {
        out.extend_from_slice(&(i + 1).to_le_bytes());
    }
    for (_, data) in entries {
        out.extend_from_slice(data);
    }
    out
}

fn dotnet_string(out: &mut Vec<u8>, s: &str) {
    assert!(s.len() < 128, "test strings use a one-byte length prefix");
    out.push(s.len() as u8);
    out.extend_from_slice(s.as_bytes());
}

fn omod_config() -> Vec<u8> {
    let mut out = vec![4u8];
    dotnet_string(&mut out, "Quiet Footsteps");
    out.extend_from_slice(&1i32.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    for field in ["modder", "modder@example.com", "", "Softer footstep sounds"] {
        dotnet_string(&mut out, field);
    }
    out.extend_from_slice(&0i64.to_le_bytes());
    out.push(1);
    out
}

/// OMOD package with a zip-compressed data stream holding `files`
pub fn omod_package(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut list = Vec::new();
    let mut joined = Vec::new();
    for (name, content) in files {
        dotnet_string(&mut list, name);
        list.extend_from_slice(&0u32.to_le_bytes());
        list.extend_from_slice(&(content.len() as i64).to_le_bytes());
        joined.extend_from_slice(content);
    }

    let mut stream = ZipWriter::new(Cursor::new(Vec::new()));
    stream
        .start_file("data", FileOptions::default())
        .expect("start data stream");
    stream.write_all(&joined).expect("write data stream");
    let stream = stream.finish().expect("finish data stream").into_inner();

    let mut package = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in [("config", omod_config()), ("data.crc", list), ("data", stream)] {
        package.start_file(name, options).expect("start package entry");
        package.write_all(&bytes).expect("write package entry");
    }
    package.finish().expect("finish package").into_inner()
}
