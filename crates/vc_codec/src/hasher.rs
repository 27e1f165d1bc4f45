//! Content fingerprints.
//!
//! A [`ContentHasher`] encodes a value through the pipeline in canonical
//! mode, flattens the result into a [`ContentLog`] of `(path, kind, value)`
//! entries and digests the log with SHA-256. Object keys are visited in
//! sorted order, and the elements of hash sets and maps as well as erased
//! sets and maps are sorted by their encoding, so the fingerprint does not
//! depend on insertion or iteration order.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vc_codec::AnyValue;
//! use vc_codec::erasure::AnySet;
//! use vc_codec::hasher::ContentHasher;
//! use vc_codec::registry::TypeRegistry;
//!
//! let hasher = ContentHasher::new(Arc::new(TypeRegistry::new()));
//!
//! let a: AnySet = [AnyValue::new(1_i32), AnyValue::new(true)].into_iter().collect();
//! let b: AnySet = [AnyValue::new(true), AnyValue::new(1_i32)].into_iter().collect();
//!
//! let fingerprint = hasher.hash(&AnyValue::new(a)).unwrap();
//! assert_eq!(fingerprint, hasher.hash(&AnyValue::new(b)).unwrap());
//! assert_eq!(fingerprint.as_str().len(), 64);
//! ```

use alloc::borrow::ToOwned;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::CodecError;
use crate::context::{CodingContext, Configuration};
use crate::erasure::TaggedElement;
use crate::pipeline::encode_value;
use crate::registry::TypeRegistry;

// -----------------------------------------------------------------------------
// Fingerprint

/// A SHA-256 digest rendered as 64 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// -----------------------------------------------------------------------------
// ContentHasher

/// Computes [`Fingerprint`]s of values.
///
/// Values are encoded with the hasher's [`Configuration`]; by default the
/// type discriminator and the unsafe serialization plugin, so polymorphic
/// slots and erased containers contribute their type as well as their data.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    registry: Arc<TypeRegistry>,
    config: Configuration,
}

impl ContentHasher {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_configuration(
            registry,
            Configuration::new()
                .with_type_discriminator()
                .with_unsafe_serialization(),
        )
    }

    #[inline]
    pub fn with_configuration(registry: Arc<TypeRegistry>, config: Configuration) -> Self {
        Self { registry, config }
    }

    /// An empty log to append several values to.
    #[inline]
    pub fn log(&self) -> ContentLog<'_> {
        ContentLog {
            hasher: self,
            entries: Vec::new(),
        }
    }

    /// The fingerprint of a single value.
    pub fn hash<T: ?Sized + Serialize>(&self, value: &T) -> Result<Fingerprint, CodecError> {
        let mut log = self.log();
        log.append(value)?;
        Ok(log.finish())
    }
}

// -----------------------------------------------------------------------------
// ContentLog

/// The ordered list of canonical sub-values a fingerprint is computed over.
pub struct ContentLog<'a> {
    hasher: &'a ContentHasher,
    entries: Vec<Value>,
}

impl ContentLog<'_> {
    /// Encodes `value` and appends its flattened form.
    pub fn append<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CodecError> {
        let tree = encode_value(&self.hasher.registry, &self.hasher.config, true, value)?;
        flatten(&tree, "$".to_owned(), &mut self.entries);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Digests the log.
    pub fn finish(self) -> Fingerprint {
        let rendered = Value::Array(self.entries).to_string();
        let digest = Sha256::digest(rendered.as_bytes());
        let fingerprint = Fingerprint(hex::encode(digest));
        log::trace!("fingerprint {fingerprint} over {} bytes", rendered.len());
        fingerprint
    }
}

impl fmt::Debug for ContentLog<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentLog")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

// Containers record their length so that `{}`, `[]` and `null` stay distinct.
fn flatten(value: &Value, path: String, entries: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            entries.push(entry(&path, "array", Value::from(items.len())));
            for (index, item) in items.iter().enumerate() {
                flatten(item, format!("{path}[{index}]"), entries);
            }
        }
        Value::Object(fields) => {
            entries.push(entry(&path, "object", Value::from(fields.len())));
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            for key in keys {
                flatten(&fields[key.as_str()], format!("{path}.{key}"), entries);
            }
        }
        Value::Null => entries.push(entry(&path, "null", Value::Null)),
        Value::Bool(_) => entries.push(entry(&path, "bool", value.clone())),
        Value::Number(_) => entries.push(entry(&path, "number", value.clone())),
        Value::String(_) => entries.push(entry(&path, "string", value.clone())),
    }
}

fn entry(path: &str, kind: &str, value: Value) -> Value {
    Value::Array(alloc::vec![Value::from(path), Value::from(kind), value])
}

/// The canonical encoding of an erased element, used to order sets and maps.
pub(crate) fn canonical_key(element: &TaggedElement, ctx: &CodingContext) -> Result<String, CodecError> {
    encode_value(ctx.registry(), ctx.configuration(), true, element).map(|tree| tree.to_string())
}

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeMap;
    use alloc::string::{String, ToString};
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use std::collections::{HashMap, HashSet};

    use serde::Serialize;

    use super::ContentHasher;
    use crate::AnyValue;
    use crate::erasure::{AnyArray, AnyMap};
    use crate::registry::TypeRegistry;

    fn hasher() -> ContentHasher {
        ContentHasher::new(Arc::new(TypeRegistry::new()))
    }

    #[test]
    fn fingerprints_are_lowercase_hex() {
        let fingerprint = hasher().hash(&"hello").unwrap();
        assert_eq!(fingerprint.as_str().len(), 64);
        assert!(fingerprint.as_str().bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
        assert_eq!(fingerprint, hasher().hash(&"hello").unwrap());
    }

    #[test]
    fn shapes_are_distinguished() {
        let hasher = hasher();
        let empty_map = hasher.hash(&BTreeMap::<String, i32>::new()).unwrap();
        let empty_seq = hasher.hash(&Vec::<i32>::new()).unwrap();
        let unit = hasher.hash(&()).unwrap();
        assert_ne!(empty_map, empty_seq);
        assert_ne!(empty_seq, unit);
        assert_ne!(hasher.hash(&[1, 2]).unwrap(), hasher.hash(&[2, 1]).unwrap());
        assert_ne!(hasher.hash(&"1").unwrap(), hasher.hash(&1).unwrap());
    }

    #[test]
    fn erased_maps_ignore_insertion_order() {
        let hasher = hasher();
        let mut a = AnyMap::new();
        a.insert(AnyValue::new(String::from("x")), AnyValue::new(1_u8));
        a.insert(AnyValue::new(2_i32), AnyValue::new(AnyArray::new()));
        let mut b = AnyMap::new();
        b.insert(AnyValue::new(2_i32), AnyValue::new(AnyArray::new()));
        b.insert(AnyValue::new(String::from("x")), AnyValue::new(1_u8));

        assert_eq!(
            hasher.hash(&AnyValue::new(a.clone())).unwrap(),
            hasher.hash(&AnyValue::new(b)).unwrap(),
        );
        a.insert(AnyValue::new(String::from("x")), AnyValue::new(2_u8));
        let changed = hasher.hash(&AnyValue::new(a)).unwrap();
        assert_ne!(changed, hasher.hash(&AnyValue::new(AnyMap::new())).unwrap());
    }

    #[test]
    fn logs_cover_several_values() {
        let hasher = hasher();
        let mut log = hasher.log();
        log.append(&1_u8).unwrap();
        log.append(&AnyValue::new(true)).unwrap();
        assert_eq!(log.len(), 1 + 3);

        let mut swapped = hasher.log();
        swapped.append(&AnyValue::new(true)).unwrap();
        swapped.append(&1_u8).unwrap();
        assert_ne!(log.finish(), swapped.finish());
    }

    #[derive(Serialize)]
    struct Tags {
        names: HashSet<String>,
        weights: HashMap<u16, Vec<u8>>,
    }

    fn tags(order: impl Iterator<Item = u16> + Clone) -> Tags {
        Tags {
            names: order.clone().map(|i| i.to_string()).collect(),
            weights: order.map(|i| (i, alloc::vec![i as u8; 2])).collect(),
        }
    }

    #[test]
    fn std_hash_containers_ignore_iteration_order() {
        let hasher = hasher();
        let a: HashSet<i32> = (0..32).collect();
        let b: HashSet<i32> = (0..32).rev().collect();
        assert_eq!(a, b);
        assert_eq!(hasher.hash(&a).unwrap(), hasher.hash(&b).unwrap());
        assert_ne!(
            hasher.hash(&a).unwrap(),
            hasher.hash(&(0..31).collect::<HashSet<i32>>()).unwrap(),
        );

        assert_eq!(
            hasher.hash(&tags(0..16)).unwrap(),
            hasher.hash(&tags((0..16).rev())).unwrap(),
        );

        let registry = TypeRegistry::new();
        registry.register::<HashSet<i32>>();
        let hasher = ContentHasher::new(Arc::new(registry));
        assert_eq!(
            hasher.hash(&AnyValue::new(a)).unwrap(),
            hasher.hash(&AnyValue::new(b)).unwrap(),
        );
    }
}
