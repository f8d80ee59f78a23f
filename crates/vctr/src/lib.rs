//! VCTR: vector tile payloads for streamed 3D tilesets.
//!
//! - JSON body with a `polygons` array (and an optional `labels` array).
//! - Each polygon carries a ring of `[lon, lat, height?]` positions (degrees,
//!   metres) and/or a pre-created mesh, plus optional height bounds.
//! - Optional binary framing in front of the JSON body.
//!
//! Framed layout (little-endian):
//!   00  : [u8;4]  magic = b"vctr"
//!   04  : u32     version = 1
//!   08  : u32     byte_length (whole tile, header included)
//!   0C  : [u8]    UTF-8 JSON body, optionally NUL padded up to byte_length
//!
//! Unframed payloads are the JSON body alone.

mod error;
mod payload;

use std::fs;
use std::path::Path;

pub use error::{VctrError, VctrResult};
pub use payload::{Cartographic, LabelRecord, PolygonRecord, PolygonSource, PrecreatedGeometry, VectorTilePayload};

pub const VCTR_MAGIC: [u8; 4] = *b"vctr";
pub const VCTR_VERSION: u32 = 1;
pub const VCTR_HEADER_LEN: usize = 12;

/// How the bytes in front of the JSON body are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// The buffer is JSON text from the byte offset onwards.
    #[default]
    Unframed,
    /// A 12-byte `vctr` header precedes the JSON body and is validated.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VctrHeader {
    /// Whole tile length, header included.
    pub byte_length: u32,
}

#[inline(always)]
fn take<'a>(buf: &mut &'a [u8], n: usize) -> VctrResult<&'a [u8]> {
    if buf.len() < n {
        return Err(VctrError::Truncated {
            needed: n,
            available: buf.len(),
        });
    }

    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

#[inline(always)]
fn le_u32(buf: &mut &[u8]) -> VctrResult<u32> {
    let b = take(buf, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Reads and validates the 12-byte header at the front of `p`.
pub fn read_header(p: &[u8]) -> VctrResult<VctrHeader> {
    let available = p.len();
    let mut p = p;

    let mut magic = [0u8; 4];
    magic.copy_from_slice(take(&mut p, 4)?);
    if magic != VCTR_MAGIC {
        return Err(VctrError::BadMagic(magic));
    }

    let version = le_u32(&mut p)?;
    if version != VCTR_VERSION {
        return Err(VctrError::UnsupportedVersion(version));
    }

    let byte_length = le_u32(&mut p)?;
    if (byte_length as usize) < VCTR_HEADER_LEN || byte_length as usize > available {
        return Err(VctrError::BadByteLength {
            declared: byte_length,
            available,
        });
    }

    Ok(VctrHeader { byte_length })
}

/// Returns the JSON body slice of `bytes`, starting at `byte_offset`.
pub fn payload_body(bytes: &[u8], byte_offset: usize, framing: Framing) -> VctrResult<&[u8]> {
    let tail = bytes.get(byte_offset..).ok_or(VctrError::Truncated {
        needed: byte_offset,
        available: bytes.len(),
    })?;

    match framing {
        Framing::Unframed => Ok(tail),
        Framing::Strict => {
            let header = read_header(tail)?;
            Ok(&tail[VCTR_HEADER_LEN..header.byte_length as usize])
        }
    }
}

/// Parse a vector tile from a contiguous byte slice. This is the single source of truth for parsing.
pub fn parse_payload(bytes: &[u8], byte_offset: usize, framing: Framing) -> VctrResult<VectorTilePayload> {
    let body = payload_body(bytes, byte_offset, framing)?;
    let text = std::str::from_utf8(body)?.trim_end_matches('\0');

    let payload: VectorTilePayload = serde_json::from_str(text)?;
    payload.validate()?;

    Ok(payload)
}

/// Prefixes a JSON body with a `vctr` header.
pub fn encode_framed(body: &[u8]) -> VctrResult<Vec<u8>> {
    let total = body.len() + VCTR_HEADER_LEN;
    let byte_length = u32::try_from(total).map_err(|_| VctrError::TooLarge(total))?;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&VCTR_MAGIC);
    out.extend_from_slice(&VCTR_VERSION.to_le_bytes());
    out.extend_from_slice(&byte_length.to_le_bytes());
    out.extend_from_slice(body);

    Ok(out)
}

/// Guesses the framing of a buffer from its first four bytes.
pub fn detect_framing(bytes: &[u8]) -> Framing {
    if bytes.starts_with(&VCTR_MAGIC) {
        Framing::Strict
    } else {
        Framing::Unframed
    }
}

pub fn read_file<P: AsRef<Path>>(path: P, framing: Framing) -> VctrResult<VectorTilePayload> {
    let bytes = fs::read(path)?;
    parse_payload(&bytes, 0, framing)
}

pub fn write_file<P: AsRef<Path>>(path: P, payload: &VectorTilePayload) -> VctrResult<()> {
    payload.validate()?;
    payload.validate_labels()?;

    let body = serde_json::to_vec(payload)?;
    fs::write(path, encode_framed(&body)?)?;

    Ok(())
}

pub mod wgs84 {
    /// Semi-major axis (equatorial radius) in meters.
    pub const A: f64 = 6_378_137.0;

    /// Flattening factor (1 / 298.257223563).
    pub const F: f64 = 1.0 / 298.257_223_563;

    /// First eccentricity squared.
    pub const E2: f64 = F * (2.0 - F);
}

#[inline]
pub fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, h_m: f64) -> [f64; 3] {
    let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();

    // Radius of curvature in the prime vertical
    let n = wgs84::A / (1.0 - wgs84::E2 * sin_lat * sin_lat).sqrt();

    [
        (n + h_m) * cos_lat * cos_lon,
        (n + h_m) * cos_lat * sin_lon,
        (n * (1.0 - wgs84::E2) + h_m) * sin_lat,
    ]
}
