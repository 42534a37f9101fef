//! # Core Protocol Components
//!
//! The Atom tree data model and its binary wire codec.
//!
//! This module is the heart of the relay protocol: every control and media
//! message exchanged between peers is an [`atom::Atom`] tree, framed as
//! described in [`codec`].
//!
//! ## Components
//! - **Atom**: named tree nodes, either child lists or opaque byte leaves
//! - **Codec**: encode/decode over any byte stream, hardened against
//!   hostile framing
//!
//! ## Wire Format
//! ```text
//! [Name(4)] [Length(4, LE u32)] [Payload(N)]
//! ```
//!
//! ## Security
//! - Depth and byte budgets on every decode (see [`codec::DecodeLimits`])
//! - Length validation before allocation; payloads read in bounded chunks

pub mod atom;
pub mod codec;
