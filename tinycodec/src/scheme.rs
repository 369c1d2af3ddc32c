//! The introspectable scheme tree: `SchemeNode`, the memoizing `describe`
//! cache, and the data-driven `skip_value` used when reshaping a decode onto
//! a receiver type whose fields don't line up 1:1 with the encoded scheme.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use serde::{Deserialize, Serialize};
use tinycodec_base::Result;

use crate::coder::Decoder;
use crate::kind::Kind;

/// One node of a type's scheme tree.
///
/// `offset` is the byte offset of the field within its parent struct,
/// recorded purely for diagnostic and interop purposes (nothing in the
/// codec's own encode/decode path depends on it, since field order, not
/// offset, drives the wire layout). `len` only carries meaning for
/// `Kind::Array`: fixed-size arrays have no length prefix on the wire, so
/// `skip_value` needs the element count from the scheme itself to know how
/// many elements to skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeNode {
    pub name: String,
    pub kind: Kind,
    pub children: Vec<SchemeNode>,
    pub offset: usize,
    pub len: usize,
}

impl SchemeNode {
    pub fn leaf(name: impl Into<String>, kind: Kind) -> Self {
        SchemeNode {
            name: name.into(),
            kind,
            children: Vec::new(),
            offset: 0,
            len: 0,
        }
    }
}

type SchemeCache = RwLock<HashMap<TypeId, SchemeNode>>;

fn scheme_cache() -> &'static SchemeCache {
    static CACHE: OnceLock<SchemeCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

thread_local! {
    /// Types currently being described on this call stack. A self-referential
    /// type (`struct Node { next: Option<Box<Node>> }`) would otherwise send
    /// `describe_cached` into unbounded recursion, since unlike the source's
    /// pointer-based scheme graph, `SchemeNode` is a plain owned tree with no
    /// way to close a cycle back onto an ancestor node.
    static IN_PROGRESS: RefCell<std::collections::HashSet<TypeId>> = RefCell::new(std::collections::HashSet::new());
}

/// Builds (or retrieves from cache) the scheme tree for `T`, memoized by
/// `TypeId` so a type referenced from many fields is only walked once.
///
/// If `T` is already being described further up the call stack, a leaf
/// `Kind::Ignore` sentinel is returned instead of recursing again. This cuts
/// cycles at the *description* level; actual recursive *values* (a real
/// `Option<Box<Node>>` chain terminating in `None`) are handled fine by
/// ordinary recursive `encode`/`decode_into` calls, since those bottom out
/// with the data rather than the type.
pub fn describe_cached<T: crate::codable::Codable + 'static>(name: &str) -> SchemeNode {
    let type_id = TypeId::of::<T>();

    if let Some(node) = scheme_cache().read().unwrap().get(&type_id) {
        let mut node = node.clone();
        node.name = name.to_string();
        return node;
    }

    let already_in_progress = IN_PROGRESS.with(|set| !set.borrow_mut().insert(type_id));
    if already_in_progress {
        return SchemeNode::leaf(name, Kind::Ignore);
    }

    let node = T::describe(name);

    IN_PROGRESS.with(|set| {
        set.borrow_mut().remove(&type_id);
    });
    scheme_cache()
        .write()
        .unwrap()
        .insert(type_id, SchemeNode { name: String::new(), ..node.clone() });

    node
}

/// Advances the decoder past a value described by `node` without
/// materializing it, used when the receiver scheme drops a field the
/// canonical scheme still encodes.
///
/// `Kind::Interface` cannot be skipped generically (see [`Kind::is_skippable`])
/// and is reported as a fatal error rather than silently desynchronizing the
/// cursor. `Kind::Custom` looks the same at first glance — its payload shape
/// is opaque to the codec too — but `Custom<T>` always length-prefixes that
/// payload via `write_bytes_raw`, so skipping it only costs reading a length.
pub fn skip_value(node: &SchemeNode, dec: &mut Decoder) -> Result<()> {
    match node.kind {
        Kind::Ignore => Ok(()),
        Kind::Bool => {
            dec.read_bool()?;
            Ok(())
        }
        Kind::Int | Kind::Int64 => {
            dec.read_varint_i64()?;
            Ok(())
        }
        Kind::Int32 => {
            dec.read_varint_i32()?;
            Ok(())
        }
        Kind::Int16 => {
            dec.read_varint_i16()?;
            Ok(())
        }
        Kind::Int8 => {
            dec.read_raw_byte()?;
            Ok(())
        }
        Kind::Uint | Kind::Uint64 => {
            dec.read_varint_u64()?;
            Ok(())
        }
        Kind::Uint32 => {
            dec.read_varint_u32()?;
            Ok(())
        }
        Kind::Uint16 => {
            dec.read_varint_u16()?;
            Ok(())
        }
        Kind::Uint8 => {
            dec.read_raw_byte()?;
            Ok(())
        }
        Kind::Float32 => {
            dec.read_varint_u32()?;
            Ok(())
        }
        Kind::Float64 => {
            dec.read_varint_u64()?;
            Ok(())
        }
        Kind::Complex32 => {
            dec.read_varint_u32()?;
            dec.read_varint_u32()?;
            Ok(())
        }
        Kind::Complex64 => {
            dec.read_varint_u64()?;
            dec.read_varint_u64()?;
            Ok(())
        }
        Kind::Time => {
            dec.read_varint_u64()?;
            Ok(())
        }
        Kind::Bytes => {
            dec.read_bool()?;
            dec.skip_bytes_raw()
        }
        Kind::Pointer => {
            let present = dec.read_bool()?;
            if present {
                skip_value(&node.children[0], dec)?;
            }
            Ok(())
        }
        Kind::Struct => {
            for child in &node.children {
                skip_value(child, dec)?;
            }
            Ok(())
        }
        Kind::Slice => {
            let len = dec.read_length()?;
            for _ in 0..len {
                skip_value(&node.children[0], dec)?;
            }
            Ok(())
        }
        Kind::Array => {
            for _ in 0..node.len {
                skip_value(&node.children[0], dec)?;
            }
            Ok(())
        }
        Kind::Map => {
            let len = dec.read_length()?;
            for _ in 0..len {
                skip_value(&node.children[0], dec)?;
                skip_value(&node.children[1], dec)?;
            }
            Ok(())
        }
        Kind::Interface => Err(tinycodec_base::err(
            "tinycodec: cannot skip an interface field during reshape; \
             the receiver type must keep every Dyn field the canonical scheme encodes",
        )),
        Kind::Custom => dec.skip_bytes_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codable::Codable;

    #[test]
    fn describe_cached_reuses_the_same_shape() {
        let a = describe_cached::<u32>("a");
        let b = describe_cached::<u32>("b");
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.kind, Kind::Uint32);
    }

    #[test]
    fn skip_value_advances_cursor_for_struct_of_primitives() {
        use crate::coder::Encoder;

        let node = SchemeNode {
            name: "s".into(),
            kind: Kind::Struct,
            children: vec![
                SchemeNode::leaf("a", Kind::Uint32),
                SchemeNode::leaf("b", Kind::Bool),
            ],
            offset: 0,
            len: 0,
        };

        let mut enc = Encoder::new();
        42u32.encode(&mut enc);
        true.encode(&mut enc);
        7u8.encode(&mut enc);
        let buf = enc.finish();

        let mut dec = Decoder::new(&buf);
        skip_value(&node, &mut dec).unwrap();
        assert_eq!(u8::decode_into(&mut dec).unwrap(), 7);
    }
}
