use alloc::borrow::ToOwned;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser};
use thiserror::Error;

use crate::context::CodingContext;
use crate::derive::GetTypeMeta;
use crate::erasure::{TaggedBranch, TaggedElement, TaggedRepresentation, TypeErasure};
use crate::{AnyValue, CodecError};

// -----------------------------------------------------------------------------
// Helpers

fn mismatch<T>(repr: &TaggedRepresentation, ctx: &CodingContext) -> CodecError {
    ctx.error(|path| CodecError::TypeMismatch {
        expected: core::any::type_name::<T>().to_owned(),
        message: format!("found a tagged {}", repr.kind()),
        path,
    })
}

fn tag_all<'a>(
    values: impl IntoIterator<Item = &'a AnyValue>,
    ctx: &CodingContext,
) -> Result<Vec<TaggedElement>, CodecError> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| TaggedElement::from_value(value, &ctx.child(index)))
        .collect()
}

/// Sorts `items` by the canonical encoding of their key, in canonical calls.
fn canonical_order<T>(
    items: Vec<T>,
    key: impl Fn(&T) -> &TaggedElement,
    ctx: &CodingContext,
) -> Result<Vec<T>, CodecError> {
    if !ctx.is_canonical() {
        return Ok(items);
    }
    let mut keyed = items
        .into_iter()
        .map(|item| Ok((crate::hasher::canonical_key(key(&item), ctx)?, item)))
        .collect::<Result<Vec<(String, T)>, CodecError>>()?;
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

/// The context of a container being encoded or decoded directly, that is
/// not through an [`AnyValue`] slot.
fn erasure_context(action: &str) -> Result<CodingContext, String> {
    let ctx = CodingContext::current()
        .ok_or_else(|| format!("erased containers can only be {action} by a modular pipeline"))?;
    if ctx.allows_unsafe_serialization() {
        Ok(ctx)
    } else {
        Err(format!(
            "{action} an erased container requires the unsafe serialization plugin, at {}",
            ctx.path()
        ))
    }
}

macro_rules! impl_serde {
    ($($ty:ident),*) => {$(
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let ctx = erasure_context("encoded").map_err(<S::Error as ser::Error>::custom)?;
                let repr = self.to_tagged(&ctx).map_err(|error| ctx.smuggle_ser::<S::Error>(error))?;
                repr.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let ctx = erasure_context("decoded").map_err(<D::Error as de::Error>::custom)?;
                let repr = TaggedRepresentation::deserialize(deserializer)?;
                Self::from_tagged(repr, &ctx).map_err(|error| ctx.smuggle_de(error))
            }
        }
    )*};
}

impl_serde!(AnyArray, AnySet, AnyMap, AnyOption, AnyResult);

// -----------------------------------------------------------------------------
// AnyArray

/// An ordered sequence of heterogeneous values.
///
/// # Examples
///
/// ```
/// use vc_codec::AnyValue;
/// use vc_codec::erasure::AnyArray;
///
/// let array: AnyArray = [AnyValue::new(1_i32), AnyValue::new("a".to_owned())].into_iter().collect();
/// assert_eq!(array.len(), 2);
/// assert_eq!(array[1].downcast_ref::<String>().unwrap(), "a");
/// ```
#[derive(GetTypeMeta, Debug, Clone, PartialEq, Default)]
#[type_meta(id = "vc.array", erasure, default)]
pub struct AnyArray(pub Vec<AnyValue>);

impl AnyArray {
    #[inline]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn push(&mut self, value: AnyValue) {
        self.0.push(value);
    }
}

impl core::ops::Deref for AnyArray {
    type Target = [AnyValue];

    #[inline]
    fn deref(&self) -> &[AnyValue] {
        &self.0
    }
}

impl FromIterator<AnyValue> for AnyArray {
    fn from_iter<I: IntoIterator<Item = AnyValue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl TypeErasure for AnyArray {
    fn to_tagged(&self, ctx: &CodingContext) -> Result<TaggedRepresentation, CodecError> {
        tag_all(&self.0, ctx).map(TaggedRepresentation::Array)
    }

    fn from_tagged(repr: TaggedRepresentation, ctx: &CodingContext) -> Result<Self, CodecError> {
        match repr {
            TaggedRepresentation::Array(items) => {
                Ok(items.into_iter().map(TaggedElement::into_value).collect())
            }
            other => Err(mismatch::<Self>(&other, ctx)),
        }
    }
}

// -----------------------------------------------------------------------------
// AnySet

/// An unordered collection of distinct heterogeneous values.
///
/// Values are compared with their own equality; inserting a value equal to
/// one already present does nothing. Two sets are equal when they hold the
/// same values, in any order.
///
/// # Examples
///
/// ```
/// use vc_codec::AnyValue;
/// use vc_codec::erasure::AnySet;
///
/// let mut set = AnySet::new();
/// assert!(set.insert(AnyValue::new(1_u8)));
/// assert!(set.insert(AnyValue::new(1_i8)));
/// assert!(!set.insert(AnyValue::new(1_u8)));
/// assert_eq!(set.len(), 2);
/// ```
#[derive(GetTypeMeta, Debug, Clone, Default)]
#[type_meta(id = "vc.set", erasure, default)]
pub struct AnySet(Vec<AnyValue>);

impl AnySet {
    #[inline]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds `value`, returns `false` if an equal value was already present.
    pub fn insert(&mut self, value: AnyValue) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.0.push(value);
        true
    }

    #[inline]
    pub fn contains(&self, value: &AnyValue) -> bool {
        self.0.contains(value)
    }

    pub fn remove(&mut self, value: &AnyValue) -> bool {
        match self.0.iter().position(|item| item == value) {
            Some(index) => {
                self.0.swap_remove(index);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, AnyValue> {
        self.0.iter()
    }
}

impl PartialEq for AnySet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|value| other.contains(value))
    }
}

impl FromIterator<AnyValue> for AnySet {
    fn from_iter<I: IntoIterator<Item = AnyValue>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl TypeErasure for AnySet {
    fn to_tagged(&self, ctx: &CodingContext) -> Result<TaggedRepresentation, CodecError> {
        let items = tag_all(&self.0, ctx)?;
        canonical_order(items, |item| item, ctx).map(TaggedRepresentation::Set)
    }

    fn from_tagged(repr: TaggedRepresentation, ctx: &CodingContext) -> Result<Self, CodecError> {
        match repr {
            TaggedRepresentation::Set(items) => {
                Ok(items.into_iter().map(TaggedElement::into_value).collect())
            }
            other => Err(mismatch::<Self>(&other, ctx)),
        }
    }
}

// -----------------------------------------------------------------------------
// AnyMap

/// A map from heterogeneous keys to heterogeneous values.
///
/// Entries keep their insertion order; keys are unique by their own equality.
///
/// # Examples
///
/// ```
/// use vc_codec::AnyValue;
/// use vc_codec::erasure::AnyMap;
///
/// let mut map = AnyMap::new();
/// map.insert(AnyValue::new(1_i32), AnyValue::new("one".to_owned()));
/// let old = map.insert(AnyValue::new(1_i32), AnyValue::new("uno".to_owned()));
///
/// assert_eq!(old.unwrap().downcast_ref::<String>().unwrap(), "one");
/// assert_eq!(map.len(), 1);
/// ```
#[derive(GetTypeMeta, Debug, Clone, Default)]
#[type_meta(id = "vc.map", erasure, default)]
pub struct AnyMap(Vec<(AnyValue, AnyValue)>);

impl AnyMap {
    #[inline]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Inserts an entry, returns the value it replaced.
    pub fn insert(&mut self, key: AnyValue, value: AnyValue) -> Option<AnyValue> {
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => Some(core::mem::replace(slot, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &AnyValue) -> Option<&AnyValue> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, key: &AnyValue) -> Option<AnyValue> {
        let index = self.0.iter().position(|(existing, _)| existing == key)?;
        Some(self.0.remove(index).1)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AnyValue, &AnyValue)> {
        self.0.iter().map(|(key, value)| (key, value))
    }
}

impl PartialEq for AnyMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl FromIterator<(AnyValue, AnyValue)> for AnyMap {
    fn from_iter<I: IntoIterator<Item = (AnyValue, AnyValue)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl TypeErasure for AnyMap {
    fn to_tagged(&self, ctx: &CodingContext) -> Result<TaggedRepresentation, CodecError> {
        let entries = self
            .0
            .iter()
            .enumerate()
            .map(|(index, (key, value))| {
                let entry = ctx.child(index);
                Ok((
                    TaggedElement::from_value(key, &entry.child(0_usize))?,
                    TaggedElement::from_value(value, &entry.child(1_usize))?,
                ))
            })
            .collect::<Result<Vec<_>, CodecError>>()?;
        canonical_order(entries, |(key, _)| key, ctx).map(TaggedRepresentation::Map)
    }

    fn from_tagged(repr: TaggedRepresentation, ctx: &CodingContext) -> Result<Self, CodecError> {
        match repr {
            TaggedRepresentation::Map(entries) => Ok(entries
                .into_iter()
                .map(|(key, value)| (key.into_value(), value.into_value()))
                .collect()),
            other => Err(mismatch::<Self>(&other, ctx)),
        }
    }
}

// -----------------------------------------------------------------------------
// AnyOption

/// An optional heterogeneous value.
#[derive(GetTypeMeta, Debug, Clone, PartialEq, Default)]
#[type_meta(id = "vc.optional", erasure, default)]
pub struct AnyOption(pub Option<AnyValue>);

impl TypeErasure for AnyOption {
    fn to_tagged(&self, ctx: &CodingContext) -> Result<TaggedRepresentation, CodecError> {
        let item = match &self.0 {
            Some(value) => Some(TaggedElement::from_value(value, ctx)?),
            None => None,
        };
        Ok(TaggedRepresentation::Optional(item))
    }

    fn from_tagged(repr: TaggedRepresentation, ctx: &CodingContext) -> Result<Self, CodecError> {
        match repr {
            TaggedRepresentation::Optional(item) => Ok(Self(item.map(TaggedElement::into_value))),
            other => Err(mismatch::<Self>(&other, ctx)),
        }
    }
}

// -----------------------------------------------------------------------------
// AnyResult

/// The failure branch of an [`AnyResult`].
///
/// Keeps a failure apart from a success whose payload happens to be an error value.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failure: {0:?}")]
pub struct Failure(pub AnyValue);

/// The outcome of a fallible operation, with heterogeneous payloads.
#[derive(GetTypeMeta, Debug, Clone, PartialEq)]
#[type_meta(id = "vc.result", erasure)]
pub struct AnyResult(pub Result<AnyValue, Failure>);

impl AnyResult {
    #[inline]
    pub fn ok(value: AnyValue) -> Self {
        Self(Ok(value))
    }

    #[inline]
    pub fn err(value: AnyValue) -> Self {
        Self(Err(Failure(value)))
    }
}

impl TypeErasure for AnyResult {
    fn to_tagged(&self, ctx: &CodingContext) -> Result<TaggedRepresentation, CodecError> {
        let branch = match &self.0 {
            Ok(value) => TaggedBranch::Ok(TaggedElement::from_value(value, &ctx.child("ok"))?),
            Err(Failure(value)) => {
                TaggedBranch::Err(TaggedElement::from_value(value, &ctx.child("err"))?)
            }
        };
        Ok(TaggedRepresentation::Result(branch))
    }

    fn from_tagged(repr: TaggedRepresentation, ctx: &CodingContext) -> Result<Self, CodecError> {
        match repr {
            TaggedRepresentation::Result(TaggedBranch::Ok(item)) => Ok(Self(Ok(item.into_value()))),
            TaggedRepresentation::Result(TaggedBranch::Err(item)) => {
                Ok(Self(Err(Failure(item.into_value()))))
            }
            other => Err(mismatch::<Self>(&other, ctx)),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::sync::Arc;

    use super::{AnyArray, AnyMap, AnyOption, AnyResult, AnySet};
    use crate::context::Configuration;
    use crate::pipeline::ModularCodec;
    use crate::registry::TypeRegistry;
    use crate::{AnyValue, CodecError};

    fn codec(config: Configuration) -> ModularCodec {
        ModularCodec::json(Arc::new(TypeRegistry::new()), config)
    }

    fn lenient() -> ModularCodec {
        codec(Configuration::new().with_type_discriminator().with_unsafe_serialization())
    }

    fn round_trip(value: AnyValue) -> AnyValue {
        let codec = lenient();
        let bytes = codec.encode(&value).unwrap();
        codec.decode::<AnyValue>(&bytes).unwrap()
    }

    #[test]
    fn array_wire_shape() {
        let array: AnyArray = [AnyValue::new(1_i32), AnyValue::new(String::from("a"))]
            .into_iter()
            .collect();
        let bytes = lenient().encode(&AnyValue::new(array.clone())).unwrap();
        assert_eq!(
            bytes,
            br#"{"$type":"vc.array","$value":{"array":[{"tag":"i32","payload":1},{"tag":"string","payload":"a"}]}}"#
        );
        assert_eq!(round_trip(AnyValue::new(array.clone())), AnyValue::new(array));
    }

    #[test]
    fn containers_round_trip() {
        let set: AnySet = [AnyValue::new(1_u8), AnyValue::new(true), AnyValue::new(1_u8)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);

        let mut map = AnyMap::new();
        map.insert(AnyValue::new(String::from("k")), AnyValue::new(set.clone()));
        map.insert(AnyValue::new(7_i64), AnyValue::new(AnyOption(None)));

        for value in [
            AnyValue::new(set),
            AnyValue::new(map),
            AnyValue::new(AnyOption(Some(AnyValue::new(2.5_f64)))),
            AnyValue::new(AnyResult::ok(AnyValue::new(String::from("done")))),
            AnyValue::new(AnyResult::err(AnyValue::new(String::from("boom")))),
        ] {
            assert_eq!(round_trip(value.clone()), value);
        }
    }

    #[test]
    fn failures_stay_failures() {
        let value = round_trip(AnyValue::new(AnyResult::err(AnyValue::new(3_u32))));
        let result = value.downcast::<AnyResult>().unwrap();
        assert_eq!(result.0.unwrap_err().0, AnyValue::new(3_u32));
    }

    #[test]
    fn the_bridge_needs_the_unsafe_plugin() {
        let strict = codec(Configuration::new().with_type_discriminator());
        let value = AnyValue::new(AnyArray::new());

        let error = strict.encode(&value).unwrap_err();
        assert!(matches!(error, CodecError::EncodingFailed { .. }));

        let bytes = lenient().encode(&value).unwrap();
        let error = strict.decode::<AnyValue>(&bytes).unwrap_err();
        assert!(matches!(error, CodecError::DecodingFailed { .. }));
    }

    #[test]
    fn kinds_must_match() {
        let error = lenient()
            .decode::<AnyValue>(br#"{"$type":"vc.array","$value":{"optional":null}}"#)
            .unwrap_err();
        assert!(matches!(error, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn elements_need_a_stable_id() {
        let array: AnyArray = [AnyValue::new(vec![1_i32])].into_iter().collect();
        let error = lenient().encode(&AnyValue::new(array)).unwrap_err();
        match error {
            CodecError::UnresolvableType { path, .. } => assert_eq!(path.to_string(), "$.$value[0]"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
