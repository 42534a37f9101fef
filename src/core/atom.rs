//! Atom tree data model.
//!
//! An [`Atom`] is a named node in the relay protocol's binary tree format:
//! either a *list* owning an ordered sequence of child atoms, or a *data*
//! leaf owning an opaque byte payload. A node never changes variant after
//! construction.
//!
//! Payloads carry no type tag. Integers and strings are stored by
//! convention only: fixed-width little-endian bytes for 1/2/4-byte
//! integers, text plus a trailing NUL for strings. The typed accessors
//! below apply exactly those conventions and nothing more, so an atom
//! built with [`Atom::with_int`] is indistinguishable on the wire from a
//! four-byte [`Atom::with_data`] payload.

use crate::error::{ProtocolError, Result};
use bytes::Bytes;
use std::fmt;

/// A four-byte atom tag, NUL-padded when the source tag is shorter.
///
/// Equality is bytewise over all four bytes. The tag is not guaranteed to
/// be printable or NUL-terminated; decoded names are whatever the peer put
/// on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomName([u8; 4]);

impl AtomName {
    /// Build a name from a human-readable tag.
    ///
    /// Fails with [`ProtocolError::InvalidName`] when the tag is empty or
    /// longer than four bytes. Shorter tags are padded with NULs.
    pub fn new(tag: &str) -> Result<Self> {
        let raw = tag.as_bytes();
        if raw.is_empty() || raw.len() > 4 {
            return Err(ProtocolError::InvalidName(tag.to_string()));
        }
        let mut name = [0u8; 4];
        name[..raw.len()].copy_from_slice(raw);
        Ok(AtomName(name))
    }

    /// Build a name from raw wire bytes. Any four bytes are a valid name.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        AtomName(bytes)
    }

    /// The four raw name bytes, including any NUL padding.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// The tag with trailing NUL padding stripped, lossily decoded for
    /// display. Wire bytes outside ASCII come out as replacement chars.
    pub fn to_display_string(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(4);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl fmt::Debug for AtomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtomName({:?})", self.to_display_string())
    }
}

impl fmt::Display for AtomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

/// The two closed variants an atom can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomValue {
    /// Ordered, exclusively owned children. Insertion order is wire order.
    List(Vec<Atom>),
    /// Opaque payload bytes, possibly empty.
    Data(Bytes),
}

/// A node in the binary tree protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    name: AtomName,
    value: AtomValue,
}

impl Atom {
    /// Create an empty list atom.
    pub fn list(tag: &str) -> Result<Self> {
        Ok(Atom {
            name: AtomName::new(tag)?,
            value: AtomValue::List(Vec::new()),
        })
    }

    /// Create a data atom holding the given bytes (may be empty).
    pub fn with_data(tag: &str, data: impl Into<Bytes>) -> Result<Self> {
        Ok(Atom {
            name: AtomName::new(tag)?,
            value: AtomValue::Data(data.into()),
        })
    }

    /// Create a data atom holding a 4-byte little-endian integer.
    pub fn with_int(tag: &str, value: i32) -> Result<Self> {
        Self::with_data(tag, value.to_le_bytes().to_vec())
    }

    /// Create a data atom holding a 2-byte little-endian integer.
    pub fn with_short(tag: &str, value: i16) -> Result<Self> {
        Self::with_data(tag, value.to_le_bytes().to_vec())
    }

    /// Create a data atom holding a single byte.
    pub fn with_byte(tag: &str, value: u8) -> Result<Self> {
        Self::with_data(tag, vec![value])
    }

    /// Create a data atom holding the text plus its trailing NUL.
    ///
    /// The NUL terminator counts toward [`Atom::data_len`], matching the
    /// wire convention for string payloads.
    pub fn with_string(tag: &str, value: &str) -> Result<Self> {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        Self::with_data(tag, data)
    }

    /// Assemble an atom from already-validated parts (decoder path).
    pub(crate) fn from_parts(name: AtomName, value: AtomValue) -> Self {
        Atom { name, value }
    }

    pub fn name(&self) -> AtomName {
        self.name
    }

    pub fn is_list(&self) -> bool {
        matches!(self.value, AtomValue::List(_))
    }

    pub fn value(&self) -> &AtomValue {
        &self.value
    }

    /// Payload byte length. Always 0 for a list atom; that is not an error.
    pub fn data_len(&self) -> usize {
        match &self.value {
            AtomValue::List(_) => 0,
            AtomValue::Data(data) => data.len(),
        }
    }

    /// Copy the payload into `dest`, truncating silently if it does not
    /// fit. Returns the number of bytes written; 0 for a list atom. Bytes
    /// of `dest` beyond the returned count are left untouched.
    pub fn get_bytes(&self, dest: &mut [u8]) -> usize {
        match &self.value {
            AtomValue::List(_) => 0,
            AtomValue::Data(data) => {
                let n = data.len().min(dest.len());
                dest[..n].copy_from_slice(&data[..n]);
                n
            }
        }
    }

    /// The payload as a 4-byte little-endian integer, or `None` when the
    /// stored length is not exactly 4. No widening or truncation across
    /// widths.
    pub fn get_int(&self) -> Option<i32> {
        match &self.value {
            AtomValue::Data(data) if data.len() == 4 => {
                Some(i32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            }
            _ => None,
        }
    }

    /// The payload as a 2-byte little-endian integer, or `None` when the
    /// stored length is not exactly 2.
    pub fn get_short(&self) -> Option<i16> {
        match &self.value {
            AtomValue::Data(data) if data.len() == 2 => {
                Some(i16::from_le_bytes([data[0], data[1]]))
            }
            _ => None,
        }
    }

    /// The payload as a single byte, or `None` when the stored length is
    /// not exactly 1.
    pub fn get_byte(&self) -> Option<u8> {
        match &self.value {
            AtomValue::Data(data) if data.len() == 1 => Some(data[0]),
            _ => None,
        }
    }

    /// Copy the payload into `dest` as a string, always writing a NUL
    /// terminator inside the bound: at most `dest.len() - 1` payload bytes
    /// are copied and a NUL follows them. Returns the number of payload
    /// bytes copied. An empty `dest` gets nothing and returns 0.
    pub fn get_string(&self, dest: &mut [u8]) -> usize {
        if dest.is_empty() {
            return 0;
        }
        let payload = match &self.value {
            AtomValue::List(_) => &[][..],
            AtomValue::Data(data) => &data[..],
        };
        let n = payload.len().min(dest.len() - 1);
        dest[..n].copy_from_slice(&payload[..n]);
        dest[n] = 0;
        n
    }

    /// Number of children. Always 0 for a data atom.
    pub fn child_count(&self) -> usize {
        match &self.value {
            AtomValue::List(children) => children.len(),
            AtomValue::Data(_) => 0,
        }
    }

    /// Borrow the child at `index`, or `None` for a data atom or an
    /// out-of-range index. The parent keeps ownership.
    pub fn child(&self, index: usize) -> Option<&Atom> {
        match &self.value {
            AtomValue::List(children) => children.get(index),
            AtomValue::Data(_) => None,
        }
    }

    /// Borrow all children; empty for a data atom.
    pub fn children(&self) -> &[Atom] {
        match &self.value {
            AtomValue::List(children) => children,
            AtomValue::Data(_) => &[],
        }
    }

    /// Append a child, transferring ownership into this atom.
    ///
    /// Silently drops the child when called on a data atom; callers are
    /// expected to know the variant they hold.
    pub fn push_child(&mut self, child: Atom) {
        if let AtomValue::List(children) = &mut self.value {
            children.push(child);
        }
    }
}
