//! `Codec<T>`: a reusable encode/decode handle bound to `T`'s scheme, plus
//! the bounded encoder/decoder pools that make repeated calls avoid
//! reallocating their working buffers.
//!
//! Mirrors the source's per-type codec object with its two bounded channel
//! pools; `std::sync::Mutex<Vec<_>>` stands in for the channel since Rust's
//! std has no bounded MPMC queue, and a mutex-guarded `Vec` used as a stack
//! gives the same "take one if available, otherwise build one" behavior.

use std::marker::PhantomData;
use std::sync::Mutex;

use tinycodec_base::Result;

use crate::coder::{Decoder, Encoder};
use crate::codable::Codable;
use crate::scheme::SchemeNode;

/// Bounded pool capacity. The source channels cap at 10; past that, callers
/// are assumed to be running with enough concurrency that a fresh
/// allocation is cheaper than lock contention on a bigger pool.
const POOL_CAPACITY: usize = 10;

// Only the encoder side is pooled. `Decoder<'a>` borrows the input slice
// rather than owning a scratch buffer, so there's no allocation to amortize
// across calls the way there is for `Encoder`'s growing `Vec<u8>`.

struct Pool<S> {
    items: Mutex<Vec<S>>,
}

impl<S> Pool<S> {
    fn new() -> Self {
        Pool {
            items: Mutex::new(Vec::with_capacity(POOL_CAPACITY)),
        }
    }

    fn take(&self, make: impl FnOnce() -> S) -> S {
        if let Some(item) = self.items.lock().unwrap().pop() {
            item
        } else {
            make()
        }
    }

    fn put(&self, item: S) {
        let mut items = self.items.lock().unwrap();
        if items.len() < POOL_CAPACITY {
            items.push(item);
        }
    }
}

/// A reusable handle bound to `T`'s scheme.
///
/// The canonical scheme (`T`'s own shape) and the receiver scheme (what an
/// incoming encode actually described itself as, set via [`Codec::set_scheme`])
/// are tracked separately so a `Codec<T>` can decode payloads produced by an
/// older or newer version of `T`'s shape, reshaping field-by-field.
pub struct Codec<T: Codable> {
    canonical_scheme: SchemeNode,
    receiver_scheme: SchemeNode,
    encoders: Pool<Encoder>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Codable + 'static> Codec<T> {
    pub fn new() -> Self {
        let scheme = crate::scheme::describe_cached::<T>(std::any::type_name::<T>());
        Codec {
            canonical_scheme: scheme.clone(),
            receiver_scheme: scheme,
            encoders: Pool::new(),
            _marker: PhantomData,
        }
    }

    /// The scheme `T` describes itself with.
    pub fn scheme(&self) -> &SchemeNode {
        &self.canonical_scheme
    }

    /// Installs the scheme an incoming payload was actually encoded with,
    /// so subsequent `decode` calls reshape onto `T` field-by-field instead
    /// of assuming the payload matches `T`'s current shape exactly.
    pub fn set_scheme(&mut self, scheme: SchemeNode) {
        self.receiver_scheme = scheme;
    }

    pub fn encode(&self, value: &T) -> Vec<u8> {
        let mut enc = self.encoders.take(Encoder::new);
        value.encode(&mut enc);
        let out = enc.finish();
        self.encoders.put(enc);
        out
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<T> {
        Ok(self.decode_prefix(bytes)?.0)
    }

    /// Like [`Codec::decode`], but also reports how many bytes of `bytes`
    /// were consumed, so several values concatenated in one buffer can be
    /// decoded one after another without a length-prefixed framing layer.
    pub fn decode_prefix(&self, bytes: &[u8]) -> Result<(T, usize)> {
        let mut dec = Decoder::new(bytes);
        let value = if self.receiver_scheme == self.canonical_scheme {
            T::decode_into(&mut dec)?
        } else {
            T::decode_reshaped(&self.receiver_scheme, &mut dec)?
        };
        Ok((value, dec.position()))
    }
}

impl<T: Codable + 'static> Default for Codec<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot convenience wrapping `Codec::new().encode(value)` for callers
/// that don't need to reuse the codec across many calls.
pub fn marshal<T: Codable + 'static>(value: &T) -> Vec<u8> {
    Codec::<T>::new().encode(value)
}

/// One-shot convenience counterpart to [`marshal`].
pub fn unmarshal<T: Codable + 'static>(bytes: &[u8]) -> Result<T> {
    Codec::<T>::new().decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marshal_unmarshal_round_trip() {
        let out = marshal(&42i32);
        let back: i32 = unmarshal(&out).unwrap();
        assert_eq!(back, 42);
    }

    #[test]
    fn codec_reuses_encoder_buffer_across_calls() {
        let codec = Codec::<i32>::new();
        let a = codec.encode(&1);
        let b = codec.encode(&2);
        assert_ne!(a, b);
        assert_eq!(codec.decode(&a).unwrap(), 1);
        assert_eq!(codec.decode(&b).unwrap(), 2);
    }

    #[test]
    fn decode_prefix_reports_bytes_consumed_for_back_to_back_values() {
        let codec = Codec::<i32>::new();
        let mut buf = codec.encode(&1);
        buf.extend(codec.encode(&300));

        let (first, consumed) = codec.decode_prefix(&buf).unwrap();
        assert_eq!(first, 1);
        let (second, _) = codec.decode_prefix(&buf[consumed..]).unwrap();
        assert_eq!(second, 300);
    }

    #[test]
    fn codec_is_safe_to_share_across_threads() {
        use std::sync::Arc;
        let codec = Arc::new(Codec::<i32>::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let codec = Arc::clone(&codec);
                std::thread::spawn(move || {
                    let bytes = codec.encode(&i);
                    codec.decode(&bytes).unwrap()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let mut sorted = results;
        sorted.sort();
        assert_eq!(sorted, (0..8).collect::<Vec<_>>());
    }
}
