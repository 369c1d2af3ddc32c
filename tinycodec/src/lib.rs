//! A compact, reflection-free binary serialization library.
//!
//! Values implementing [`Codable`] (hand-written here for primitives and
//! standard containers, generated by `#[derive(Codable)]` for structs)
//! encode to a dense little-endian wire format: offset-subtracted varints
//! for integers, bit-packed runs for consecutive bools, and length-prefixed
//! raw bytes for strings and byte buffers. A [`Codec`] bundles a type's
//! scheme with a pooled encoder so repeated calls don't reallocate.
//!
//! ```
//! use tinycodec::{marshal, unmarshal};
//!
//! let bytes = marshal(&42i32);
//! let back: i32 = unmarshal(&bytes).unwrap();
//! assert_eq!(back, 42);
//! ```

mod coder;
mod codable;
mod codec;
mod custom;
mod dynamic;
mod kind;
mod registry;
mod scheme;
mod wire;

pub use codable::{Addr, Bytes, Codable, Complex32, Complex64};
pub use codec::{marshal, unmarshal, Codec};
pub use custom::{Custom, CustomCodable};
pub use dynamic::Dyn;
pub use kind::Kind;
pub use registry::register;
pub use scheme::{describe_cached, skip_value, SchemeNode};

pub use tinycodec_base::{Error, Result};

/// Re-exported so downstream crates only need one `use tinycodec::Codable;`
/// to bring both the trait and the derive macro into scope.
pub use tinycodec_derive::Codable;

use std::sync::atomic::{AtomicBool, Ordering};

static TIME_SPECIAL_CASE_DISABLED: AtomicBool = AtomicBool::new(false);

/// Turns off the dedicated `Kind::Time` wire form for `SystemTime` fields,
/// falling back to treating `SystemTime` as an ordinary two-field struct
/// (seconds, nanos) the next time its scheme is described.
///
/// Exists for interop with encoders that don't special-case time the way
/// this crate does by default; most callers never need it.
pub fn disable_time_special_case() {
    TIME_SPECIAL_CASE_DISABLED.store(true, Ordering::Relaxed);
}

pub(crate) fn time_special_case_enabled() -> bool {
    !TIME_SPECIAL_CASE_DISABLED.load(Ordering::Relaxed)
}

/// Not part of the public API. `#[derive(Codable)]` expands into code that
/// needs `Encoder`/`Decoder` and the `err` constructor; everything else in
/// the crate reaches them through their owning modules directly.
#[doc(hidden)]
pub mod __private {
    pub use crate::coder::{Decoder, Encoder};
    pub use tinycodec_base::err;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Codable)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn derive_round_trips_a_struct() {
        let p = Point { x: 3, y: -4 };
        let bytes = marshal(&p);
        let back: Point = unmarshal(&bytes).unwrap();
        assert_eq!(p, back);
    }

    #[derive(Debug, PartialEq, Default, Codable)]
    struct Wide {
        a: i32,
        b: String,
        c: bool,
    }

    #[derive(Debug, PartialEq, Default, Codable)]
    struct Narrow {
        c: bool,
        a: i32,
        d: u8,
    }

    #[test]
    fn derived_reshape_matches_by_name_across_drop_reorder_and_add() {
        let wire_scheme = Wide::describe("root");
        let wire = marshal(&Wide {
            a: 7,
            b: "dropped in the receiver".to_string(),
            c: true,
        });

        let mut dec = crate::__private::Decoder::new(&wire);
        let narrow = Narrow::decode_reshaped(&wire_scheme, &mut dec).unwrap();

        assert_eq!(
            narrow,
            Narrow {
                a: 7,
                c: true,
                d: 0,
            }
        );
        assert_eq!(dec.position(), wire.len());
    }
}
