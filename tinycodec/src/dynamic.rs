//! `Dyn`: a registry-backed stand-in for the source's interface values.
//!
//! Rust has no runtime type switch, so a polymorphic field is modeled as
//! `Dyn`, carrying a boxed value plus the registered name needed to decode
//! it back into the right concrete type.

use std::any::Any;
use std::sync::Arc;

use tinycodec_base::Result;

use crate::coder::{Decoder, Encoder};
use crate::codable::Codable;
use crate::kind::Kind;
use crate::registry;
use crate::scheme::{skip_value, SchemeNode};

/// A type-erased, registry-identified value.
///
/// Cloning is cheap (an `Arc` bump) because a decoded `Dyn` is often shared
/// read-only afterward; nothing about the wire format requires sharing,
/// it's just a convenient default for the boxed payload.
#[derive(Clone)]
pub struct Dyn {
    name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl Dyn {
    pub fn new<T: Codable + Any + Send + Sync + 'static>(name: &'static str, value: T) -> Self {
        Dyn {
            name,
            value: Arc::new(value),
        }
    }

    /// Looks up `T`'s registered name instead of requiring the caller to
    /// repeat it, for the common case where `T` was registered once under
    /// its own canonical name.
    pub fn from_registered<T: Codable + Any + Send + Sync + 'static>(value: T) -> Result<Self> {
        let name = registry::name_for(std::any::TypeId::of::<T>())?;
        Ok(Dyn {
            name,
            value: Arc::new(value),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// The concrete type's own scheme, resolved through the registry by
    /// name. Unlike every other `Codable` impl, `Dyn`'s `describe()` cannot
    /// report a useful shape statically — the whole point of an interface
    /// value is that its concrete type isn't known until a value exists —
    /// so this is the introspection entry point callers actually want.
    pub fn describe_concrete(&self) -> Result<SchemeNode> {
        registry::describe_by_name(self.name)
    }
}

impl std::fmt::Debug for Dyn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dyn").field("name", &self.name).finish()
    }
}

impl Codable for Dyn {
    const KIND: Kind = Kind::Interface;

    fn describe(name: &str) -> SchemeNode {
        // The concrete shape behind a Dyn isn't known statically; its real
        // scheme is resolved per-value at encode time via the registry name
        // written onto the wire, the same way the decode side resolves it.
        SchemeNode::leaf(name, Kind::Interface)
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.write_bytes_raw(self.name.as_bytes());
        registry::encode_by_name(self.name, self.value.as_ref(), enc)
            .expect("tinycodec: Dyn constructed with an unregistered type");
    }

    fn decode_into(dec: &mut Decoder) -> Result<Self> {
        let name_bytes = dec.read_bytes_raw()?;
        let name_owned = String::from_utf8(name_bytes).map_err(|e| tinycodec_base::err(e.to_string()))?;
        let name = registry::name_for_str(&name_owned)?;
        let value = registry::decode_by_name(name, dec)?;
        Ok(Dyn {
            name,
            value: Arc::from(value),
        })
    }

    fn decode_reshaped(node: &SchemeNode, dec: &mut Decoder) -> Result<Self> {
        if node.kind != Kind::Interface {
            skip_value(node, dec)?;
            return Err(tinycodec_base::err(
                "tinycodec: interface field changed kind during reshape",
            ));
        }
        Self::decode_into(dec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::{Decoder, Encoder};

    #[derive(Debug, PartialEq)]
    struct Ping(i32);

    impl Codable for Ping {
        const KIND: Kind = Kind::Struct;

        fn describe(name: &str) -> SchemeNode {
            SchemeNode {
                name: name.to_string(),
                kind: Kind::Struct,
                children: vec![crate::scheme::describe_cached::<i32>("0")],
                offset: 0,
                len: 0,
            }
        }

        fn encode(&self, enc: &mut Encoder) {
            self.0.encode(enc);
        }

        fn decode_into(dec: &mut Decoder) -> Result<Self> {
            Ok(Ping(i32::decode_into(dec)?))
        }
    }

    #[test]
    fn dyn_round_trips_through_registry() {
        registry::register::<Ping>("tests::dynamic::Ping");
        let d = Dyn::new("tests::dynamic::Ping", Ping(7));

        let mut enc = Encoder::new();
        d.encode(&mut enc);
        let buf = enc.finish();

        let mut dec = Decoder::new(&buf);
        let back = Dyn::decode_into(&mut dec).unwrap();
        assert_eq!(back.downcast_ref::<Ping>(), Some(&Ping(7)));
    }

    #[derive(Debug, PartialEq)]
    struct Pong(i32);

    impl Codable for Pong {
        const KIND: Kind = Kind::Struct;

        fn describe(name: &str) -> SchemeNode {
            SchemeNode {
                name: name.to_string(),
                kind: Kind::Struct,
                children: vec![crate::scheme::describe_cached::<i32>("0")],
                offset: 0,
                len: 0,
            }
        }

        fn encode(&self, enc: &mut Encoder) {
            self.0.encode(enc);
        }

        fn decode_into(dec: &mut Decoder) -> Result<Self> {
            Ok(Pong(i32::decode_into(dec)?))
        }
    }

    #[test]
    fn from_registered_looks_up_the_name() {
        registry::register::<Pong>("tests::dynamic::Pong");
        let d = Dyn::from_registered(Pong(9)).unwrap();
        assert_eq!(d.name(), "tests::dynamic::Pong");
    }

    #[test]
    fn describe_concrete_resolves_through_the_registry() {
        registry::register::<Pong>("tests::dynamic::describe::Pong");
        let d = Dyn::new("tests::dynamic::describe::Pong", Pong(1));
        let scheme = d.describe_concrete().unwrap();
        assert_eq!(scheme.kind, Kind::Struct);
    }
}
