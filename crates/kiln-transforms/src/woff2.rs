//! WOFF2 encoding with null table transforms.
//!
//! Table data is concatenated in directory order and compressed as a single
//! Brotli stream. `glyf` and `loca` use transform version 3 (null), every
//! other table version 0 (also null), so decoders reproduce the input
//! tables byte for byte.

use std::io;

const SIGNATURE: u32 = 0x774F_4632;
const HEADER_LEN: usize = 48;

const FLAVOR_TRUETYPE: u32 = 0x0001_0000;
const FLAVOR_CFF: u32 = 0x4F54_544F;
const FLAVOR_APPLE: u32 = 0x7472_7565;

const BROTLI_QUALITY: i32 = 11;
const BROTLI_WINDOW: i32 = 22;

/// Tags with a one-byte encoding in the table directory, by index.
const KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm",
    b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT", b"EBLC", b"gasp", b"hdmx", b"kern",
    b"LTSH", b"PCLT", b"VDMX", b"vhea", b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC",
    b"JSTF", b"MATH", b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar", b"gvar", b"hsty",
    b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop", b"trak", b"Zapf", b"Silf", b"Glat",
    b"Gloc", b"Feat", b"Sill",
];

const ARBITRARY_TAG: u8 = 63;
const NULL_TRANSFORM_GLYF: u8 = 3 << 6;

/// Errors that can occur while encoding a font.
#[derive(Debug, thiserror::Error)]
pub enum Woff2Error {
    #[error("font is truncated in the {0}")]
    Truncated(&'static str),

    #[error("unsupported sfnt version {0:#010x}")]
    UnsupportedFlavor(u32),

    #[error("table '{0}' lies outside the font data")]
    TableOutOfBounds(String),

    #[error("compression failed: {0}")]
    Compression(#[from] io::Error),
}

#[derive(Debug)]
struct Table<'a> {
    tag: [u8; 4],
    data: &'a [u8],
}

/// Encode an sfnt (TrueType or CFF-flavored OpenType) font as WOFF2.
pub fn encode(font: &[u8]) -> Result<Vec<u8>, Woff2Error> {
    let flavor = read_u32(font, 0).ok_or(Woff2Error::Truncated("header"))?;
    if !matches!(flavor, FLAVOR_TRUETYPE | FLAVOR_CFF | FLAVOR_APPLE) {
        return Err(Woff2Error::UnsupportedFlavor(flavor));
    }

    let mut tables = read_tables(font)?;
    order_tables(&mut tables);

    let stream: Vec<u8> = tables.iter().flat_map(|t| t.data.iter().copied()).collect();
    let compressed = compress(&stream)?;

    let mut directory = Vec::new();
    for table in &tables {
        write_directory_entry(&mut directory, table);
    }

    let sfnt_size = 12 + 16 * tables.len() + tables.iter().map(|t| pad4(t.data.len())).sum::<usize>();
    let total = pad4(HEADER_LEN + directory.len() + compressed.len());

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&SIGNATURE.to_be_bytes());
    out.extend_from_slice(&flavor.to_be_bytes());
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(sfnt_size as u32).to_be_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    // metadata offset, length, original length; private offset, length
    out.extend_from_slice(&[0u8; 20]);
    debug_assert_eq!(out.len(), HEADER_LEN);

    out.extend_from_slice(&directory);
    out.extend_from_slice(&compressed);
    out.resize(total, 0);

    Ok(out)
}

fn read_tables(font: &[u8]) -> Result<Vec<Table<'_>>, Woff2Error> {
    let count = read_u16(font, 4).ok_or(Woff2Error::Truncated("header"))? as usize;
    let mut tables = Vec::with_capacity(count);

    for i in 0..count {
        let record = 12 + i * 16;
        let tag: [u8; 4] = font
            .get(record..record + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or(Woff2Error::Truncated("table directory"))?;
        let offset = read_u32(font, record + 8).ok_or(Woff2Error::Truncated("table directory"))?;
        let length = read_u32(font, record + 12).ok_or(Woff2Error::Truncated("table directory"))?;

        let start = offset as usize;
        let data = start
            .checked_add(length as usize)
            .and_then(|end| font.get(start..end))
            .ok_or_else(|| Woff2Error::TableOutOfBounds(String::from_utf8_lossy(&tag).into_owned()))?;

        tables.push(Table { tag, data });
    }

    Ok(tables)
}

/// Sort by tag, with `loca` directly after `glyf`.
fn order_tables(tables: &mut Vec<Table<'_>>) {
    tables.sort_by(|a, b| a.tag.cmp(&b.tag));

    let loca = tables.iter().position(|t| &t.tag == b"loca");
    let glyf = tables.iter().position(|t| &t.tag == b"glyf");
    if let (Some(loca), Some(glyf)) = (loca, glyf) {
        let table = tables.remove(loca);
        let glyf = if loca < glyf { glyf - 1 } else { glyf };
        tables.insert(glyf + 1, table);
    }
}

fn write_directory_entry(out: &mut Vec<u8>, table: &Table<'_>) {
    let known = KNOWN_TAGS.iter().position(|t| **t == table.tag);
    let mut flags = known.map_or(ARBITRARY_TAG, |i| i as u8);
    if &table.tag == b"glyf" || &table.tag == b"loca" {
        flags |= NULL_TRANSFORM_GLYF;
    }

    out.push(flags);
    if known.is_none() {
        out.extend_from_slice(&table.tag);
    }
    write_base128(out, table.data.len() as u32);
}

/// UIntBase128: big-endian 7-bit groups, high bit set on all but the last.
fn write_base128(out: &mut Vec<u8>, mut value: u32) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    loop {
        groups[len] = (value & 0x7f) as u8;
        value >>= 7;
        len += 1;
        if value == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | continuation);
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>, Woff2Error> {
    let mut params = brotli::enc::BrotliEncoderParams::default();
    params.quality = BROTLI_QUALITY;
    params.lgwin = BROTLI_WINDOW;
    let mut out = Vec::new();
    brotli::BrotliCompress(&mut &data[..], &mut out, &params)?;
    Ok(out)
}

fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(at..at + 4)?.try_into().ok()?))
}
