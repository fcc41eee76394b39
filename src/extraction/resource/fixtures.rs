//! Builders for small resource containers used by the reader tests
//!
//! Hashes are not real name hashes; each entry just gets a distinct value,
//! which is all the index needs to keep entries apart.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;

pub(crate) const TES4_DIRECTORY_NAMES: u32 = 0x1;
pub(crate) const TES4_FILE_NAMES: u32 = 0x2;
pub(crate) const TES4_EMBEDDED_NAMES: u32 = 0x100;

const TES4_COMPRESSION_TOGGLE: u32 = 0x4000_0000;
const BA2_SENTINEL: u32 = 0xBAAD_F00D;

pub(crate) const DXGI_R8G8B8A8_UNORM: u8 = 28;

pub(crate) fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub(crate) fn lz4_frame(data: &[u8]) -> Vec<u8> {
    let mut encoder = lz4::EncoderBuilder::new().build(Vec::new()).unwrap();
    encoder.write_all(data).unwrap();
    let (out, result) = encoder.finish();
    result.unwrap();
    out
}

fn u16le(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn u32le(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn u64le(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Morrowind BSA holding `(path, content)` pairs
pub(crate) fn tes3_bsa(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let count = entries.len() as u32;
    let names_len: u32 = entries.iter().map(|(n, _)| n.len() as u32 + 1).sum();

    let mut out = Vec::new();
    u32le(&mut out, 0x100);
    u32le(&mut out, count * 12 + names_len);
    u32le(&mut out, count);

    let mut data_offset = 0u32;
    for (_, data) in entries {
        u32le(&mut out, data.len() as u32);
        u32le(&mut out, data_offset);
        data_offset += data.len() as u32;
    }
    let mut name_offset = 0u32;
    for (name, _) in entries {
        u32le(&mut out, name_offset);
        name_offset += name.len() as u32 + 1;
    }
    for (name, _) in entries {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }
    for i in 0..entries.len() {
        u64le(&mut out, i as u64 + 1);
    }
    for (_, data) in entries {
        out.extend_from_slice(data);
    }
    out
}

/// Oblivion/Skyrim BSA with folder and file names; entries must be grouped by folder
///
/// Compressed entries use zlib before version 105 and an LZ4 frame from 105 on.
pub(crate) fn tes4_bsa(version: u32, entries: &[(&str, &str, &[u8], bool)]) -> Vec<u8> {
    tes4_bsa_with(version, TES4_DIRECTORY_NAMES | TES4_FILE_NAMES, entries)
}

/// Same as [`tes4_bsa`] with explicit archive flags
pub(crate) fn tes4_bsa_with(
    version: u32,
    flags: u32,
    entries: &[(&str, &str, &[u8], bool)],
) -> Vec<u8> {
    let mut folders: Vec<(&str, Vec<usize>)> = Vec::new();
    for (i, (folder, ..)) in entries.iter().enumerate() {
        if let Some((name, files)) = folders.last_mut()
            && *name == *folder
        {
            files.push(i);
            continue;
        }
        folders.push((*folder, vec![i]));
    }

    let embed = version >= 104 && flags & TES4_EMBEDDED_NAMES != 0;
    let payloads: Vec<Vec<u8>> = entries
        .iter()
        .map(|(folder, name, data, compressed)| {
            let mut block = Vec::new();
            if embed {
                let full = format!("{folder}\\{name}");
                block.push(full.len() as u8);
                block.extend_from_slice(full.as_bytes());
            }
            if *compressed {
                u32le(&mut block, data.len() as u32);
                if version == 105 {
                    block.extend_from_slice(&lz4_frame(data));
                } else {
                    block.extend_from_slice(&zlib(data));
                }
            } else {
                block.extend_from_slice(data);
            }
            block
        })
        .collect();

    let record_len = if version == 105 { 24 } else { 16 };
    let folder_names_len: usize = folders.iter().map(|(n, _)| n.len() + 1).sum();
    let file_names_len: usize = entries.iter().map(|(_, n, ..)| n.len() + 1).sum();
    let blocks_start = 36 + folders.len() * record_len;
    let data_start =
        blocks_start + folders.len() + folder_names_len + entries.len() * 16 + file_names_len;

    let mut offsets = Vec::new();
    let mut cursor = data_start;
    for payload in &payloads {
        offsets.push(cursor);
        cursor += payload.len();
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"BSA\0");
    u32le(&mut out, version);
    u32le(&mut out, 36);
    u32le(&mut out, flags);
    u32le(&mut out, folders.len() as u32);
    u32le(&mut out, entries.len() as u32);
    u32le(&mut out, folder_names_len as u32);
    u32le(&mut out, file_names_len as u32);
    u32le(&mut out, 0);

    let mut block = blocks_start;
    for (i, (folder, files)) in folders.iter().enumerate() {
        u64le(&mut out, i as u64 + 1);
        u32le(&mut out, files.len() as u32);
        let offset = (block + file_names_len) as u64;
        if version == 105 {
            u32le(&mut out, 0);
            u64le(&mut out, offset);
        } else {
            u32le(&mut out, offset as u32);
        }
        block += folder.len() + 2 + files.len() * 16;
    }
    assert_eq!(out.len(), blocks_start);

    for (folder, files) in &folders {
        out.push(folder.len() as u8 + 1);
        out.extend_from_slice(folder.as_bytes());
        out.push(0);
        for &i in files {
            let mut size = payloads[i].len() as u32;
            if entries[i].3 {
                size |= TES4_COMPRESSION_TOGGLE;
            }
            u64le(&mut out, i as u64 + 1);
            u32le(&mut out, size);
            u32le(&mut out, offsets[i] as u32);
        }
    }
    for (_, files) in &folders {
        for &i in files {
            out.extend_from_slice(entries[i].1.as_bytes());
            out.push(0);
        }
    }
    assert_eq!(out.len(), data_start);
    for payload in payloads {
        out.extend_from_slice(&payload);
    }
    out
}

fn ba2_header(out: &mut Vec<u8>, version: u32, kind: &[u8; 4], count: usize, name_table: u64) {
    out.extend_from_slice(b"BTDX");
    u32le(out, version);
    out.extend_from_slice(kind);
    u32le(out, count as u32);
    u64le(out, name_table);
    if version == 2 || version == 3 {
        u32le(out, 1);
        u32le(out, 0);
    }
    if version == 3 {
        u32le(out, 0);
    }
}

fn ba2_header_len(version: u32) -> usize {
    match version {
        2 => 32,
        3 => 36,
        _ => 24,
    }
}

/// General-purpose BA2 holding `(path, content, compressed)` triples
pub(crate) fn ba2_general(version: u32, entries: &[(&str, &[u8], bool)]) -> Vec<u8> {
    let payloads: Vec<(Vec<u8>, u32)> = entries
        .iter()
        .map(|(_, data, compressed)| {
            if *compressed {
                let packed = zlib(data);
                let packed_len = packed.len() as u32;
                (packed, packed_len)
            } else {
                (data.to_vec(), 0)
            }
        })
        .collect();
    let data_start = ba2_header_len(version) + entries.len() * 36;
    let data_len: usize = payloads.iter().map(|(p, _)| p.len()).sum();

    let mut out = Vec::new();
    ba2_header(
        &mut out,
        version,
        b"GNRL",
        entries.len(),
        (data_start + data_len) as u64,
    );

    let mut offset = data_start as u64;
    for (i, ((_, data, _), (payload, packed_len))) in entries.iter().zip(&payloads).enumerate() {
        u32le(&mut out, i as u32 + 1);
        out.extend_from_slice(b"bin\0");
        u32le(&mut out, 1);
        out.push(0);
        out.push(1);
        u16le(&mut out, 16);
        u64le(&mut out, offset);
        u32le(&mut out, *packed_len);
        u32le(&mut out, data.len() as u32);
        u32le(&mut out, BA2_SENTINEL);
        offset += payload.len() as u64;
    }
    assert_eq!(out.len(), data_start);
    for (payload, _) in &payloads {
        out.extend_from_slice(payload);
    }
    for (name, ..) in entries {
        u16le(&mut out, name.len() as u16);
        out.extend_from_slice(name.as_bytes());
    }
    out
}

/// Texture BA2 holding one single-mip, uncompressed texture
pub(crate) fn ba2_texture(
    name: &str,
    width: u16,
    height: u16,
    format: u8,
    pixels: &[u8],
) -> Vec<u8> {
    let data_start = ba2_header_len(1) + 24 + 24;

    let mut out = Vec::new();
    ba2_header(&mut out, 1, b"DX10", 1, (data_start + pixels.len()) as u64);

    u32le(&mut out, 1);
    out.extend_from_slice(b"dds\0");
    u32le(&mut out, 1);
    out.push(0);
    out.push(1);
    u16le(&mut out, 24);
    u16le(&mut out, height);
    u16le(&mut out, width);
    out.push(1);
    out.push(format);
    out.push(0);
    out.push(8);

    u64le(&mut out, data_start as u64);
    u32le(&mut out, 0);
    u32le(&mut out, pixels.len() as u32);
    u16le(&mut out, 0);
    u16le(&mut out, 0);
    u32le(&mut out, BA2_SENTINEL);
    assert_eq!(out.len(), data_start);

    out.extend_from_slice(pixels);
    u16le(&mut out, name.len() as u16);
    out.extend_from_slice(name.as_bytes());
    out
}
