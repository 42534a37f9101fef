//! # Atom Wire Codec
//!
//! Binary encode/decode of [`Atom`] trees over any [`ByteStream`].
//!
//! ## Wire Format
//! ```text
//! Atom := Name(4) Length(4, LE u32) Payload
//! ```
//! When the high bit of `Length` is set the atom is a list: the low 31
//! bits give the child count and the payload is that many consecutively
//! encoded child atoms. When the high bit is clear the atom is a data
//! leaf and `Length` is the exact payload byte count.
//!
//! ## Security
//! Decoding consumes hostile input. Every decode call runs under
//! [`DecodeLimits`]: a recursion depth cap and a total byte budget that
//! covers headers and payloads. A peer claiming an enormous child count
//! or payload length hits the budget long before a matching allocation is
//! attempted; data payloads are read in bounded chunks so a forged length
//! can never force a single huge allocation up front.

use crate::core::atom::{Atom, AtomName, AtomValue};
use crate::error::{ProtocolError, Result};
use crate::transport::stream::ByteStream;
use tracing::debug;

/// High bit of the length field marks a list atom.
const LIST_FLAG: u32 = 0x8000_0000;

/// Upper bound on a single read while draining a data payload.
const READ_CHUNK: usize = 64 * 1024;

/// Default nesting depth allowed when decoding.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default total byte budget for one decode call (headers + payloads).
pub const DEFAULT_MAX_BYTES: usize = 16 * 1024 * 1024;

/// Resource limits applied to a single decode call.
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    /// Maximum nesting depth of list atoms.
    pub max_depth: usize,
    /// Maximum total bytes one decode may consume, counting the 8 header
    /// bytes of every node plus all data payloads.
    pub max_bytes: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        DecodeLimits {
            max_depth: DEFAULT_MAX_DEPTH,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl Atom {
    /// Encode this atom and all of its descendants to `stream`.
    ///
    /// Children are written in insertion order; that order is part of the
    /// wire contract. Any failed or short write aborts the whole encode;
    /// the caller only learns that it failed, not how much was written.
    pub fn write_to(&self, stream: &mut dyn ByteStream) -> Result<()> {
        write_full(stream, self.name().as_bytes())?;
        match self.value() {
            AtomValue::List(children) => {
                let count = u32::try_from(children.len())
                    .ok()
                    .filter(|n| n & LIST_FLAG == 0)
                    .ok_or(ProtocolError::SizeLimit(children.len()))?;
                write_full(stream, &(LIST_FLAG | count).to_le_bytes())?;
                for child in children {
                    child.write_to(stream)?;
                }
            }
            AtomValue::Data(data) => {
                let len = u32::try_from(data.len())
                    .ok()
                    .filter(|n| n & LIST_FLAG == 0)
                    .ok_or(ProtocolError::SizeLimit(data.len()))?;
                write_full(stream, &len.to_le_bytes())?;
                write_full(stream, data)?;
            }
        }
        Ok(())
    }

    /// Decode one atom tree from `stream` under [`DecodeLimits::default`].
    pub fn read_from(stream: &mut dyn ByteStream) -> Result<Atom> {
        Self::read_from_with_limits(stream, &DecodeLimits::default())
    }

    /// Decode one atom tree from `stream` under explicit limits.
    ///
    /// On any failure (short read, depth or budget trip, child decode
    /// failure inside a list) no atom is returned and everything decoded
    /// so far is released.
    pub fn read_from_with_limits(
        stream: &mut dyn ByteStream,
        limits: &DecodeLimits,
    ) -> Result<Atom> {
        let mut budget = limits.max_bytes;
        read_node(stream, limits, &mut budget, 0)
    }
}

fn read_node(
    stream: &mut dyn ByteStream,
    limits: &DecodeLimits,
    budget: &mut usize,
    depth: usize,
) -> Result<Atom> {
    if depth >= limits.max_depth {
        debug!(max_depth = limits.max_depth, "atom decode depth limit hit");
        return Err(ProtocolError::DepthLimit(limits.max_depth));
    }
    charge(budget, 8, limits)?;

    let mut name = [0u8; 4];
    read_full(stream, &mut name)?;
    let mut len_bytes = [0u8; 4];
    read_full(stream, &mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes);

    if len & LIST_FLAG != 0 {
        let count = (len & !LIST_FLAG) as usize;
        // No preallocation from the claimed count; growth tracks what the
        // peer actually sends, and the budget bounds it.
        let mut children = Vec::new();
        for _ in 0..count {
            children.push(read_node(stream, limits, budget, depth + 1)?);
        }
        Ok(Atom::from_parts(
            AtomName::from_bytes(name),
            AtomValue::List(children),
        ))
    } else {
        let total = len as usize;
        charge(budget, total, limits)?;
        let mut data = Vec::new();
        let mut remaining = total;
        while remaining > 0 {
            let chunk = remaining.min(READ_CHUNK);
            let start = data.len();
            data.resize(start + chunk, 0);
            read_full(stream, &mut data[start..])?;
            remaining -= chunk;
        }
        Ok(Atom::from_parts(
            AtomName::from_bytes(name),
            AtomValue::Data(data.into()),
        ))
    }
}

fn charge(budget: &mut usize, cost: usize, limits: &DecodeLimits) -> Result<()> {
    if cost > *budget {
        debug!(cost, max_bytes = limits.max_bytes, "atom decode byte budget hit");
        return Err(ProtocolError::SizeLimit(limits.max_bytes));
    }
    *budget -= cost;
    Ok(())
}

/// Fill `buf` completely or fail. EOF before the field is complete is a
/// truncated stream, never a partial result.
fn read_full(stream: &mut dyn ByteStream, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..])? {
            0 => return Err(ProtocolError::Truncated),
            n => filled += n,
        }
    }
    Ok(())
}

/// Write `buf` completely or fail.
fn write_full(stream: &mut dyn ByteStream, buf: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < buf.len() {
        match stream.write(&buf[written..])? {
            0 => return Err(ProtocolError::ShortWrite),
            n => written += n,
        }
    }
    Ok(())
}
