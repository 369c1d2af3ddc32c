//! The closed `Kind` enumeration and the primitive skip table.

use serde::{Deserialize, Serialize};

/// Tags a [`crate::scheme::SchemeNode`] with the shape of the value it describes.
///
/// `Uint`/`Int` stand in for Rust's `usize`/`isize` and are always wire-encoded
/// as 64-bit varints, independent of host pointer width, so a scheme produced
/// on a 32-bit target decodes correctly on a 64-bit one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Ignore,
    Struct,
    Slice,
    Array,
    Map,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Bytes,
    Time,
    Interface,
    Pointer,
    Complex32,
    Complex64,
    Custom,
}

impl Kind {
    /// Whether a field of this kind can be skipped (advanced past without
    /// being materialized) purely from its declared kind, with no access to
    /// the concrete Rust type that originally produced it.
    ///
    /// `Interface` is the one kind this can't do: an interface payload's
    /// length depends on the embedded concrete type, which the declared kind
    /// alone doesn't carry. `Custom` looks similar but isn't — its payload is
    /// always length-prefixed, so skipping it costs only a length read.
    pub fn is_skippable(self) -> bool {
        !matches!(self, Kind::Interface)
    }
}
