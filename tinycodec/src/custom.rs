//! Escape hatch for types that want full control over their own wire
//! representation, mirroring the source's `GoTinyMarshaler`/`GoTinyUnmarshaler`
//! pair.

use tinycodec_base::Result;

use crate::coder::{Decoder, Encoder};
use crate::codable::Codable;
use crate::kind::Kind;
use crate::scheme::SchemeNode;

/// Implemented by types that encode themselves to and from a length-prefixed
/// opaque byte run, bypassing the field-by-field `Codable` machinery.
///
/// A type implementing this directly (rather than deriving `Codable`) hands
/// its payload's internal shape to [`CustomCodable::marshal`]/`unmarshal`
/// alone; the codec only ever sees a length-prefixed opaque blob. That's
/// still enough to skip a dropped custom field during reshape (see
/// [`Kind::is_skippable`]) even though the codec can't decode one without the
/// concrete type.
pub trait CustomCodable: Sized {
    fn marshal(&self) -> Vec<u8>;
    fn unmarshal(bytes: &[u8]) -> Result<Self>;
}

/// Wraps a [`CustomCodable`] type so it can sit in a struct field and be
/// picked up by `#[derive(Codable)]` the same way any other `Codable` field
/// would be.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Custom<T>(pub T);

impl<T: CustomCodable> Codable for Custom<T> {
    const KIND: Kind = Kind::Custom;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Custom)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_bytes_raw(&self.0.marshal());
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        let bytes = dec.read_bytes_raw()?;
        Ok(Custom(T::unmarshal(&bytes)?))
    }

    // No override of decode_reshaped: the default rejects a kind mismatch,
    // and a matching Custom kind always decodes as a whole unit, which is
    // exactly what the inherited default already does.
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hex(u32);

    impl CustomCodable for Hex {
        fn marshal(&self) -> Vec<u8> {
            format!("{:x}", self.0).into_bytes()
        }

        fn unmarshal(bytes: &[u8]) -> Result<Self> {
            let s = std::str::from_utf8(bytes).map_err(|e| tinycodec_base::err(e.to_string()))?;
            let v = u32::from_str_radix(s, 16).map_err(|e| tinycodec_base::err(e.to_string()))?;
            Ok(Hex(v))
        }
    }

    #[test]
    fn custom_codable_round_trips() {
        let mut enc = Encoder::new();
        Custom(Hex(255)).encode(&mut enc);
        let buf = enc.finish();

        let mut dec = Decoder::new(&buf);
        let back = Custom::<Hex>::decode_into(&mut dec).unwrap();
        assert_eq!(back.0 .0, 255);
    }
}
