//! The `Codable` trait and its implementations for primitives and the
//! standard container types the codec understands natively.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tinycodec_base::{err, Result};

use crate::coder::{Decoder, Encoder};
use crate::kind::Kind;
use crate::scheme::{describe_cached, skip_value, SchemeNode};

/// Implemented by every type the codec can encode and decode.
///
/// `#[derive(Codable)]` generates this for user structs; this module hand-
/// writes it for primitives and the standard containers, the way a derive
/// macro's generated code would look if you wrote it out by hand.
///
/// `decode_reshaped` has a default suitable for leaf kinds: if the incoming
/// node's kind doesn't match `Self::KIND`, the stray bytes are skipped (so
/// the cursor stays in sync for whatever field follows) and an error is
/// returned, since a leaf type has no sensible way to recover a value for a
/// kind it never described. Composite kinds (`Option<Box<T>>`, `Vec<T>`,
/// `HashMap`, `[T; N]`) override it to recurse per-element/per-field
/// instead of treating the whole value as one opaque unit, and derived
/// structs recover by falling back to `Default` per missing field rather
/// than failing outright.
pub trait Codable: Sized {
    const KIND: Kind;

    fn describe(name: &str) -> SchemeNode;

    fn encode(&self, enc: &mut Encoder);

    fn decode_into(dec: &mut Decoder) -> Result<Self>;

    fn decode_reshaped(node: &SchemeNode, dec: &mut Decoder) -> Result<Self> {
        if node.kind == Self::KIND {
            Self::decode_into(dec)
        } else {
            skip_value(node, dec)?;
            Err(err(format!(
                "tinycodec: field `{}` changed kind from {:?} to {:?}; no zero value available \
                 for a non-default Codable type",
                node.name,
                node.kind,
                Self::KIND
            )))
        }
    }
}

macro_rules! impl_codable_int {
    ($ty:ty, $kind:expr, $write:ident, $read:ident) => {
        impl Codable for $ty {
            const KIND: Kind = $kind;

            fn describe(name: &str) -> SchemeNode {
                SchemeNode::leaf(name, $kind)
            }

            fn encode(&self, enc: &mut Encoder) {
                enc.$write(*self);
            }

            fn decode_into(dec: &mut Decoder) -> Result<Self> {
                dec.$read()
            }
        }
    };
}

impl_codable_int!(i64, Kind::Int64, write_varint_i64, read_varint_i64);
impl_codable_int!(i32, Kind::Int32, write_varint_i32, read_varint_i32);
impl_codable_int!(i16, Kind::Int16, write_varint_i16, read_varint_i16);
impl_codable_int!(u64, Kind::Uint64, write_varint_u64, read_varint_u64);
impl_codable_int!(u32, Kind::Uint32, write_varint_u32, read_varint_u32);
impl_codable_int!(u16, Kind::Uint16, write_varint_u16, read_varint_u16);

impl Codable for isize {
    const KIND: Kind = Kind::Int;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Int)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_varint_i64(*self as i64);
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        Ok(dec.read_varint_i64()? as isize)
    }
}

impl Codable for usize {
    const KIND: Kind = Kind::Uint;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Uint)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_varint_u64(*self as u64);
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        Ok(dec.read_varint_u64()? as usize)
    }
}

impl Codable for i8 {
    const KIND: Kind = Kind::Int8;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Int8)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_raw_byte(*self as u8);
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        Ok(dec.read_raw_byte()? as i8)
    }
}

impl Codable for u8 {
    const KIND: Kind = Kind::Uint8;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Uint8)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_raw_byte(*self);
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        dec.read_raw_byte()
    }
}

impl Codable for bool {
    const KIND: Kind = Kind::Bool;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Bool)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_bool(*self);
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        dec.read_bool()
    }
}

impl Codable for f32 {
    const KIND: Kind = Kind::Float32;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Float32)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_varint_u32(self.to_bits());
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        Ok(f32::from_bits(dec.read_varint_u32()?))
    }
}

impl Codable for f64 {
    const KIND: Kind = Kind::Float64;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Float64)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_varint_u64(self.to_bits());
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        Ok(f64::from_bits(dec.read_varint_u64()?))
    }
}

/// Wraps a byte buffer to opt into the raw length-prefixed `Kind::Bytes`
/// wire form instead of `Vec<u8>`'s generic element-wise `Kind::Slice`
/// path, the same opt-in `serde_bytes` asks callers to make for `serde`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Bytes(v)
    }
}

impl From<Bytes> for Vec<u8> {
    fn from(b: Bytes) -> Self {
        b.0
    }
}

impl Codable for Bytes {
    const KIND: Kind = Kind::Bytes;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Bytes)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_bool(true);
        enc.write_bytes_raw(&self.0);
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        if dec.read_bool()? {
            Ok(Bytes(dec.read_bytes_raw()?))
        } else {
            Ok(Bytes::default())
        }
    }
}

impl Codable for String {
    const KIND: Kind = Kind::Bytes;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Bytes)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_bytes_raw(self.as_bytes());
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        let bytes = dec.read_bytes_raw()?;
        String::from_utf8(bytes).map_err(|e| err(e.to_string()))
    }
}

impl<T: Codable + 'static> Codable for Option<Box<T>> {
    const KIND: Kind = Kind::Pointer;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode {
            name: name.to_string(),
            kind: Kind::Pointer,
            children: vec![describe_cached::<T>("")],
            offset: 0,
            len: 0,
        }
    }

    fn encode(&self, enc: &mut Encoder) {
        match self {
            Some(v) => {
                enc.write_bool(true);
                v.encode(enc);
            }
            None => enc.write_bool(false),
        }
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        if dec.read_bool()? {
            Ok(Some(Box::new(T::decode_into(dec)?)))
        } else {
            Ok(None)
        }
    }

    fn decode_reshaped(node: &SchemeNode, dec: &mut Decoder) -> Result<Self> {
        if node.kind != Kind::Pointer {
            skip_value(node, dec)?;
            return Ok(None);
        }
        if dec.read_bool()? {
            Ok(Some(Box::new(T::decode_reshaped(&node.children[0], dec)?)))
        } else {
            Ok(None)
        }
    }
}

impl<T: Codable + 'static> Codable for Vec<T> {
    const KIND: Kind = Kind::Slice;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode {
            name: name.to_string(),
            kind: Kind::Slice,
            children: vec![describe_cached::<T>("")],
            offset: 0,
            len: 0,
        }
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_length(self.len());
        for item in self {
            item.encode(enc);
        }
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        let len = dec.read_length()?;
        let mut out = Vec::with_capacity(len.min(1 << 20));
        for _ in 0..len {
            out.push(T::decode_into(dec)?);
        }
        Ok(out)
    }

    fn decode_reshaped(node: &SchemeNode, dec: &mut Decoder) -> Result<Self> {
        if node.kind != Kind::Slice {
            skip_value(node, dec)?;
            return Ok(Vec::new());
        }
        let len = dec.read_length()?;
        let child = &node.children[0];
        let mut out = Vec::with_capacity(len.min(1 << 20));
        for _ in 0..len {
            out.push(T::decode_reshaped(child, dec)?);
        }
        Ok(out)
    }
}

impl<K: Codable + Eq + Hash + 'static, V: Codable + 'static> Codable for HashMap<K, V> {
    const KIND: Kind = Kind::Map;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode {
            name: name.to_string(),
            kind: Kind::Map,
            children: vec![describe_cached::<K>("key"), describe_cached::<V>("value")],
            offset: 0,
            len: 0,
        }
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_length(self.len());
        for (k, v) in self {
            k.encode(enc);
            v.encode(enc);
        }
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        let len = dec.read_length()?;
        let mut out = HashMap::with_capacity(len.min(1 << 20));
        for _ in 0..len {
            let k = K::decode_into(dec)?;
            let v = V::decode_into(dec)?;
            out.insert(k, v);
        }
        Ok(out)
    }

    fn decode_reshaped(node: &SchemeNode, dec: &mut Decoder) -> Result<Self> {
        if node.kind != Kind::Map {
            skip_value(node, dec)?;
            return Ok(HashMap::new());
        }
        let len = dec.read_length()?;
        let key_node = &node.children[0];
        let val_node = &node.children[1];
        let mut out = HashMap::with_capacity(len.min(1 << 20));
        for _ in 0..len {
            let k = K::decode_reshaped(key_node, dec)?;
            let v = V::decode_reshaped(val_node, dec)?;
            out.insert(k, v);
        }
        Ok(out)
    }
}

/// A fixed-size array has no length prefix on the wire (unlike `Vec<T>`):
/// the element count is part of the type, carried in the scheme's `len`
/// field instead, so `skip_value` can advance past one without decoding it.
impl<T: Codable + 'static, const N: usize> Codable for [T; N] {
    const KIND: Kind = Kind::Array;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode {
            name: name.to_string(),
            kind: Kind::Array,
            children: vec![describe_cached::<T>("")],
            offset: 0,
            len: N,
        }
    }

    fn encode(&self, enc: &mut Encoder) {
        for item in self {
            item.encode(enc);
        }
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        let mut out: [std::mem::MaybeUninit<T>; N] =
            unsafe { std::mem::MaybeUninit::uninit().assume_init() };
        let mut filled = 0;
        for slot in out.iter_mut() {
            match T::decode_into(dec) {
                Ok(v) => {
                    slot.write(v);
                    filled += 1;
                }
                Err(e) => {
                    for s in &mut out[..filled] {
                        unsafe { std::ptr::drop_in_place(s.as_mut_ptr()) };
                    }
                    return Err(e);
                }
            }
        }
        Ok(unsafe { std::mem::transmute_copy(&out) })
    }

    fn decode_reshaped(node: &SchemeNode, dec: &mut Decoder) -> Result<Self> {
        if node.kind != Kind::Array {
            skip_value(node, dec)?;
            return Err(err("tinycodec: array field changed kind during reshape"));
        }
        let child = &node.children[0];
        let take = node.len.min(N);
        let mut out: [std::mem::MaybeUninit<T>; N] =
            unsafe { std::mem::MaybeUninit::uninit().assume_init() };
        let mut filled = 0;
        for slot in out.iter_mut().take(take) {
            match T::decode_reshaped(child, dec) {
                Ok(v) => {
                    slot.write(v);
                    filled += 1;
                }
                Err(e) => {
                    for s in &mut out[..filled] {
                        unsafe { std::ptr::drop_in_place(s.as_mut_ptr()) };
                    }
                    return Err(e);
                }
            }
        }
        for _ in take..node.len {
            skip_value(child, dec)?;
        }
        if take < N {
            for s in &mut out[..filled] {
                unsafe { std::ptr::drop_in_place(s.as_mut_ptr()) };
            }
            return Err(err(
                "tinycodec: encoded array is shorter than the receiver array",
            ));
        }
        Ok(unsafe { std::mem::transmute_copy(&out) })
    }
}

/// Encoded as a single varint of nanoseconds since the Unix epoch. With the
/// special case disabled, falls back to the two-field (secs, nanos) struct
/// shape an encoder with no dedicated time kind would use instead.
impl Codable for SystemTime {
    const KIND: Kind = Kind::Time;

    fn describe(name: &str) -> SchemeNode {
        if crate::time_special_case_enabled() {
            SchemeNode::leaf(name, Kind::Time)
        } else {
            SchemeNode {
                name: name.to_string(),
                kind: Kind::Struct,
                children: vec![
                    SchemeNode::leaf("secs", Kind::Uint64),
                    SchemeNode::leaf("nanos", Kind::Uint32),
                ],
                offset: 0,
                len: 0,
            }
        }
    }

    fn encode(&self, enc: &mut Encoder) {
        let dur = self.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        let nanos = dur.as_secs().saturating_mul(1_000_000_000) + dur.subsec_nanos() as u64;
        enc.write_varint_u64(nanos);
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        let nanos = dec.read_varint_u64()?;
        Ok(UNIX_EPOCH + Duration::from_nanos(nanos))
    }
}

/// Opaque machine-word-sized value, analogous to `unsafe.Pointer` in the
/// source: carried across the wire as a varint with no further
/// interpretation by the codec. Values are not portable across machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Addr(pub u64);

impl Codable for Addr {
    const KIND: Kind = Kind::Uint64;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Uint64)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_varint_u64(self.0);
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        Ok(Addr(dec.read_varint_u64()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex32 {
    pub re: f32,
    pub im: f32,
}

impl Codable for Complex32 {
    const KIND: Kind = Kind::Complex32;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Complex32)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_varint_u32(self.re.to_bits());
        enc.write_varint_u32(self.im.to_bits());
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        let re = f32::from_bits(dec.read_varint_u32()?);
        let im = f32::from_bits(dec.read_varint_u32()?);
        Ok(Complex32 { re, im })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

impl Codable for Complex64 {
    const KIND: Kind = Kind::Complex64;

    fn describe(name: &str) -> SchemeNode {
        SchemeNode::leaf(name, Kind::Complex64)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_varint_u64(self.re.to_bits());
        enc.write_varint_u64(self.im.to_bits());
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        let re = f64::from_bits(dec.read_varint_u64()?);
        let im = f64::from_bits(dec.read_varint_u64()?);
        Ok(Complex64 { re, im })
    }
}

macro_rules! impl_codable_tuple {
    ($($idx:tt => $T:ident),+) => {
        impl<$($T: Codable + 'static),+> Codable for ($($T,)+) {
            const KIND: Kind = Kind::Struct;

            fn describe(name: &str) -> SchemeNode {
                SchemeNode {
                    name: name.to_string(),
                    kind: Kind::Struct,
                    children: vec![$(describe_cached::<$T>(stringify!($idx))),+],
                    offset: 0,
                    len: 0,
                }
            }

            fn encode(&self, enc: &mut Encoder) {
                $(self.$idx.encode(enc);)+
            }

            fn decode_into(dec: &mut Decoder) -> Result<Self> {
                Ok(($($T::decode_into(dec)?,)+))
            }
        }
    };
}

impl_codable_tuple!(0 => A);
impl_codable_tuple!(0 => A, 1 => B);
impl_codable_tuple!(0 => A, 1 => B, 2 => C);
impl_codable_tuple!(0 => A, 1 => B, 2 => C, 3 => D);

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Codable + PartialEq + std::fmt::Debug>(v: T) {
        let mut enc = Encoder::new();
        v.encode(&mut enc);
        let buf = enc.finish();
        let mut dec = Decoder::new(&buf);
        let back = T::decode_into(&mut dec).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn primitives_round_trip() {
        round_trip(42i64);
        round_trip(-42i32);
        round_trip(7u8);
        round_trip(true);
        round_trip(false);
        round_trip(3.5f32);
        round_trip(3.5f64);
    }

    #[test]
    fn string_round_trips() {
        round_trip(String::from("hello tinycodec"));
        round_trip(String::new());
    }

    #[test]
    fn bytes_round_trips() {
        round_trip(Bytes(vec![1, 2, 3, 4]));
        round_trip(Bytes(Vec::new()));
    }

    #[test]
    fn option_box_round_trips_nil_and_present() {
        round_trip::<Option<Box<i32>>>(None);
        round_trip::<Option<Box<i32>>>(Some(Box::new(99)));
    }

    #[test]
    fn self_referential_pointer_chain_round_trips() {
        #[derive(Debug, PartialEq)]
        struct Node {
            val: i32,
            next: Option<Box<Node>>,
        }

        impl Codable for Node {
            const KIND: Kind = Kind::Struct;

            fn describe(name: &str) -> SchemeNode {
                SchemeNode {
                    name: name.to_string(),
                    kind: Kind::Struct,
                    children: vec![
                        describe_cached::<i32>("val"),
                        describe_cached::<Option<Box<Node>>>("next"),
                    ],
                    offset: 0,
                    len: 0,
                }
            }

            fn encode(&self, enc: &mut Encoder) {
                self.val.encode(enc);
                self.next.encode(enc);
            }

            fn decode_into(dec: &mut Decoder) -> Result<Self> {
                Ok(Node {
                    val: i32::decode_into(dec)?,
                    next: Option::decode_into(dec)?,
                })
            }
        }

        let chain = Node {
            val: 1,
            next: Some(Box::new(Node {
                val: 2,
                next: Some(Box::new(Node { val: 3, next: None })),
            })),
        };
        round_trip(chain);

        // Describing the type must terminate despite the cycle in the type
        // graph (not the value graph).
        let _ = Node::describe("root");
    }

    #[test]
    fn vec_round_trips_empty_and_populated() {
        round_trip(Vec::<i32>::new());
        round_trip(vec![1, 2, 3]);
    }

    #[test]
    fn map_round_trips() {
        let mut m = HashMap::new();
        m.insert("a".to_string(), 1i32);
        m.insert("b".to_string(), 2i32);
        round_trip(m);
    }

    #[test]
    fn array_round_trips() {
        round_trip([1i32, 2, 3, 4]);
    }

    #[test]
    fn reshape_skips_dropped_field_then_continues() {
        #[derive(Debug, PartialEq)]
        struct Wide {
            a: i32,
            b: String,
            c: bool,
        }
        #[derive(Debug, PartialEq)]
        struct Narrow {
            a: i32,
            c: bool,
        }

        let wide_scheme = SchemeNode {
            name: "root".into(),
            kind: Kind::Struct,
            children: vec![
                describe_cached::<i32>("a"),
                describe_cached::<String>("b"),
                describe_cached::<bool>("c"),
            ],
            offset: 0,
            len: 0,
        };

        let mut enc = Encoder::new();
        42i32.encode(&mut enc);
        "dropped".to_string().encode(&mut enc);
        true.encode(&mut enc);
        let buf = enc.finish();
        let mut dec = Decoder::new(&buf);

        let a = i32::decode_reshaped(&wide_scheme.children[0], &mut dec).unwrap();
        skip_value(&wide_scheme.children[1], &mut dec).unwrap();
        let c = bool::decode_reshaped(&wide_scheme.children[2], &mut dec).unwrap();

        assert_eq!(Narrow { a, c }, Narrow { a: 42, c: true });
    }
}
