//! Global name-keyed registry mapping a stable wire name to the `TypeId` and
//! vtable needed to encode/decode a boxed `Codable` value through [`Dyn`].
//!
//! Mirrors the source's global name-to-type table used for interface
//! values: since Rust has no runtime reflection, each concrete type that can
//! ride inside a `Dyn` must be registered once, up front, under a name that
//! is stable across processes (unlike `TypeId`, which is not).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use tinycodec_base::{err, Result};

use crate::coder::{Decoder, Encoder};
use crate::codable::Codable;
use crate::scheme::SchemeNode;

type EncodeFn = fn(&dyn Any, &mut Encoder);
type DecodeFn = fn(&mut Decoder) -> Result<Box<dyn Any + Send + Sync>>;
type DescribeFn = fn(&str) -> SchemeNode;

#[derive(Clone)]
struct RegistryEntry {
    type_id: TypeId,
    encode: EncodeFn,
    decode: DecodeFn,
    describe: DescribeFn,
}

struct Registry {
    by_name: HashMap<&'static str, RegistryEntry>,
    by_type: HashMap<TypeId, &'static str>,
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        RwLock::new(Registry {
            by_name: HashMap::new(),
            by_type: HashMap::new(),
        })
    })
}

/// Registers `T` under `name` so it can be carried inside a [`Dyn`] value.
///
/// Panics if `name` is already registered to a different type: this is a
/// one-time startup wiring mistake, not a runtime condition callers should
/// recover from.
pub fn register<T>(name: &'static str)
where
    T: Codable + Any + Send + Sync + 'static,
{
    let entry = RegistryEntry {
        type_id: TypeId::of::<T>(),
        encode: |v, enc| {
            v.downcast_ref::<T>()
                .expect("tinycodec: registry encode called with mismatched type")
                .encode(enc)
        },
        decode: |dec| T::decode_into(dec).map(|v| Box::new(v) as Box<dyn Any + Send + Sync>),
        describe: T::describe,
    };

    let mut reg = registry().write().unwrap();
    if let Some(existing) = reg.by_name.get(name) {
        assert!(
            existing.type_id == entry.type_id,
            "tinycodec: name `{name}` already registered to a different type"
        );
        return;
    }
    reg.by_name.insert(name, entry);
    reg.by_type.insert(TypeId::of::<T>(), name);
}

pub(crate) fn name_for(type_id: TypeId) -> Result<&'static str> {
    registry()
        .read()
        .unwrap()
        .by_type
        .get(&type_id)
        .copied()
        .ok_or_else(|| err("tinycodec: type not registered for dynamic encoding"))
}

/// Resolves an owned name read off the wire back to the `'static` key the
/// registry was populated with, so callers don't have to keep the decoded
/// `String` alive alongside the `Dyn` value.
pub(crate) fn name_for_str(name: &str) -> Result<&'static str> {
    registry()
        .read()
        .unwrap()
        .by_name
        .get_key_value(name)
        .map(|(k, _)| *k)
        .ok_or_else(|| err(format!("tinycodec: unknown registered type `{name}`")))
}

pub(crate) fn encode_by_name(name: &str, value: &dyn Any, enc: &mut Encoder) -> Result<()> {
    let reg = registry().read().unwrap();
    let entry = reg
        .by_name
        .get(name)
        .ok_or_else(|| err(format!("tinycodec: unknown registered type `{name}`")))?;
    (entry.encode)(value, enc);
    Ok(())
}

pub(crate) fn decode_by_name(name: &str, dec: &mut Decoder) -> Result<Box<dyn Any + Send + Sync>> {
    let reg = registry().read().unwrap();
    let entry = reg
        .by_name
        .get(name)
        .ok_or_else(|| err(format!("tinycodec: unknown registered type `{name}`")))?;
    (entry.decode)(dec)
}

pub(crate) fn describe_by_name(name: &str) -> Result<SchemeNode> {
    let reg = registry().read().unwrap();
    let entry = reg
        .by_name
        .get(name)
        .ok_or_else(|| err(format!("tinycodec: unknown registered type `{name}`")))?;
    Ok((entry.describe)(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_same_type_twice_is_fine() {
        register::<i32>("tests::registry::i32");
        register::<i32>("tests::registry::i32");
    }

    #[test]
    #[should_panic(expected = "already registered to a different type")]
    fn register_different_type_same_name_panics() {
        register::<i32>("tests::registry::clash");
        register::<i64>("tests::registry::clash");
    }
}
