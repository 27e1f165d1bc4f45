//! Encoding and decoding of [`AnyValue`] slots.
//!
//! Encoding a slot:
//!
//! 1. Resolve the concrete type of the held value in the registry.
//! 2. Pick the body: native `serde` serialization, or the tagged
//!    representation of an erased container when the unsafe serialization
//!    plugin allows it.
//! 3. If the type discriminator resolves an identifier, write
//!    `{ type_key: id, value_key: body }` with the discriminator suppressed
//!    for both entries.
//! 4. Otherwise write the body plainly.
//!
//! Decoding reverses this. A discriminator that does not resolve is an
//! error; a missing discriminator falls back to the statically known type,
//! if the caller provided one.

use alloc::borrow::{Cow, ToOwned};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::fmt;

use serde::de::value::{MapAccessDeserializer, SeqAccessDeserializer};
use serde::de::{self, DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, Visitor};
use serde::ser::{self, SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::context::{CodingContext, PathSegment};
use crate::erasure::TaggedRepresentation;
use crate::pipeline::ser::{Pinned, ordered_by_type};
use crate::registry::{TypeMeta, TypeTraitDeserialize, TypeTraitErasure, TypeTraitSerialize};
use crate::{AnyValue, CodecError, Portable};

// -----------------------------------------------------------------------------
// Encoding

/// The encoded form of a value, without discriminator.
pub(crate) enum Body<'a> {
    Native(&'a dyn erased_serde::Serialize),
    Tagged {
        erasure: TypeTraitErasure,
        value: &'a dyn Portable,
    },
}

impl<'a> Body<'a> {
    /// Picks how the concrete value of `meta` is encoded.
    pub(crate) fn resolve(
        value: &'a dyn Portable,
        meta: &TypeMeta,
        ctx: &CodingContext,
    ) -> Result<Self, CodecError> {
        if let Some(view) = meta
            .get_trait::<TypeTraitSerialize>()
            .and_then(|native| native.get(value))
        {
            return Ok(Self::Native(view));
        }
        if let Some(erasure) = meta.get_trait::<TypeTraitErasure>() {
            if !ctx.allows_unsafe_serialization() {
                return Err(ctx.error(|path| CodecError::EncodingFailed {
                    message: format!(
                        "`{}` is an erased container, encoding it requires the unsafe serialization plugin",
                        meta.type_name()
                    ),
                    path,
                }));
            }
            return Ok(Self::Tagged {
                erasure: erasure.clone(),
                value,
            });
        }
        Err(ctx.error(|path| CodecError::EncodingFailed {
            message: format!("`{}` has no serialization registered", meta.type_name()),
            path,
        }))
    }
}

impl Serialize for Body<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Native(view) => erased_serde::serialize(*view, serializer),
            Self::Tagged { erasure, value } => {
                let Some(ctx) = CodingContext::current() else {
                    return Err(ser::Error::custom("erased containers can only be encoded by a modular encoder"));
                };
                match erasure.to_tagged(*value, &ctx) {
                    Some(Ok(repr)) => repr.serialize(serializer),
                    Some(Err(error)) => Err(ctx.smuggle_ser(error)),
                    None => Err(ctx.smuggle_ser(ctx.error(|path| CodecError::TypeMismatch {
                        expected: value.portable_type_name().to_owned(),
                        message: "the registered erasure does not accept this value".to_owned(),
                        path,
                    }))),
                }
            }
        }
    }
}

/// The registered type of `value`, or [`CodecError::UnresolvableType`].
pub(crate) fn meta_of(value: &dyn Portable, ctx: &CodingContext) -> Result<Arc<TypeMeta>, CodecError> {
    ctx.registry()
        .get_by_type_id(value.value_type_id())
        .ok_or_else(|| {
            ctx.error(|path| CodecError::UnresolvableType {
                type_name: value.portable_type_name().to_owned(),
                path,
            })
        })
}

fn encode_polymorphic<S: Serializer>(
    value: &dyn Portable,
    ctx: &CodingContext,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let meta = meta_of(value, ctx).map_err(|error| ctx.smuggle_ser::<S::Error>(error))?;
    let body = Body::resolve(value, &meta, ctx).map_err(|error| ctx.smuggle_ser::<S::Error>(error))?;

    let Some((index, discriminator)) = ctx.type_discriminator() else {
        return write_body(&body, &meta, ctx, serializer);
    };
    let id = discriminator
        .resolve_discriminator(&meta, ctx.registry())
        .map_err(|error| ctx.smuggle_ser::<S::Error>(error.into()))?;
    let Some(id) = id else {
        return write_body(&body, &meta, ctx, serializer);
    };

    log::trace!("tagging `{}` as `{id}` at {}", meta.type_name(), ctx.path());
    let type_key = discriminator.type_key();
    let value_key = discriminator.value_key();
    let type_ctx = ctx
        .child(PathSegment::Key(Cow::Owned(type_key.to_owned())))
        .suppressing(index);
    let value_ctx = ctx
        .child(PathSegment::Key(Cow::Owned(value_key.to_owned())))
        .suppressing(index);
    let value_ctx = ordered_by_type(value_ctx, meta.type_name());

    let mut map = serializer.serialize_map(Some(2))?;
    map.serialize_entry(type_key, &Pinned::new(&id, type_ctx))?;
    map.serialize_entry(value_key, &Pinned::new(&body, value_ctx))?;
    map.end()
}

// Writes an undiscriminated body, in its own context when the concrete type
// is an unordered container.
fn write_body<S: Serializer>(
    body: &Body<'_>,
    meta: &TypeMeta,
    ctx: &CodingContext,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let body_ctx = ordered_by_type(ctx.clone(), meta.type_name());
    if body_ctx.is_unordered() {
        Pinned::new(body, body_ctx).serialize(serializer)
    } else {
        body.serialize(serializer)
    }
}

impl Serialize for AnyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match CodingContext::current() {
            Some(ctx) => encode_polymorphic(self.innermost(), &ctx, serializer),
            None => Err(ser::Error::custom(
                "`AnyValue` can only be encoded by a modular encoder",
            )),
        }
    }
}

// -----------------------------------------------------------------------------
// Decoding

impl<'de> Deserialize<'de> for AnyValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match CodingContext::current() {
            Some(ctx) => PolymorphicSeed::new(ctx, None).deserialize(deserializer),
            None => Err(de::Error::custom(
                "`AnyValue` can only be decoded by a modular decoder",
            )),
        }
    }
}

/// Decodes a polymorphic slot, falling back to `fallback` when the input
/// carries no discriminator.
pub(crate) struct PolymorphicSeed {
    ctx: CodingContext,
    fallback: Option<Arc<TypeMeta>>,
}

impl PolymorphicSeed {
    #[inline]
    pub(crate) fn new(ctx: CodingContext, fallback: Option<Arc<TypeMeta>>) -> Self {
        Self { ctx, fallback }
    }
}

fn undiscriminated(ctx: &CodingContext) -> CodecError {
    ctx.error(|path| CodecError::UnresolvableDiscriminator {
        discriminator: None,
        path,
    })
}

impl<'de> DeserializeSeed<'de> for PolymorphicSeed {
    type Value = AnyValue;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<AnyValue, D::Error> {
        let Self { ctx, fallback } = self;
        match ctx.type_discriminator() {
            Some((index, discriminator)) => {
                let visitor = DiscriminatedVisitor {
                    type_key: discriminator.type_key().to_owned(),
                    value_key: discriminator.value_key().to_owned(),
                    index,
                    ctx: ctx.clone(),
                    fallback,
                };
                deserializer.deserialize_any(visitor)
            }
            None => match fallback {
                Some(meta) => DecodeAs::new(meta, None).deserialize(deserializer),
                None => Err(ctx.smuggle_de(undiscriminated(&ctx))),
            },
        }
    }
}

struct DiscriminatedVisitor {
    type_key: String,
    value_key: String,
    index: usize,
    ctx: CodingContext,
    fallback: Option<Arc<TypeMeta>>,
}

impl DiscriminatedVisitor {
    // The input has no discriminator: decode it as the static type.
    fn fallback<'de, D: Deserializer<'de>>(self, deserializer: D) -> Result<AnyValue, D::Error> {
        match self.fallback {
            Some(meta) => {
                log::trace!("no discriminator at {}, decoding as `{}`", self.ctx.path(), meta.type_name());
                DecodeAs::new(meta, None).deserialize(deserializer)
            }
            None => Err(self.ctx.smuggle_de(undiscriminated(&self.ctx))),
        }
    }

    fn fail<E: de::Error>(&self, make: impl FnOnce(crate::context::CodingPath) -> CodecError) -> E {
        self.ctx.smuggle_de(self.ctx.error(make))
    }
}

macro_rules! fallback {
    ($($method:ident($ty:ty);)*) => {$(
        fn $method<E: de::Error>(self, v: $ty) -> Result<AnyValue, E> {
            self.fallback(v.into_deserializer())
        }
    )*};
}

impl<'de> Visitor<'de> for DiscriminatedVisitor {
    type Value = AnyValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a map with a `{}` discriminator", self.type_key)
    }

    fallback! {
        visit_bool(bool);
        visit_i64(i64);
        visit_u64(u64);
        visit_f64(f64);
        visit_char(char);
        visit_string(String);
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<AnyValue, E> {
        self.fallback(v.into_deserializer())
    }

    fn visit_unit<E: de::Error>(self) -> Result<AnyValue, E> {
        self.fallback(().into_deserializer())
    }

    fn visit_none<E: de::Error>(self) -> Result<AnyValue, E> {
        self.fallback(().into_deserializer())
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, seq: A) -> Result<AnyValue, A::Error> {
        self.fallback(SeqAccessDeserializer::new(seq))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<AnyValue, A::Error> {
        let first: Option<String> = map.next_key()?;
        match first {
            Some(key) if key == self.type_key => {}
            first => {
                return self.fallback(MapAccessDeserializer::new(Replay { first, map }));
            }
        }

        let id: String = map.next_value()?;
        let meta = match self.ctx.type_discriminator() {
            Some((_, discriminator)) => discriminator.resolve_type(&id, self.ctx.registry()),
            None => None,
        };
        let Some(meta) = meta else {
            return Err(self.fail(|path| CodecError::UnresolvableDiscriminator {
                discriminator: Some(id),
                path,
            }));
        };

        match map.next_key::<String>()? {
            Some(key) if key == self.value_key => {}
            Some(key) => {
                return Err(self.fail(|path| CodecError::DecodingFailed {
                    message: format!("unexpected key `{key}`, expected `{}`", self.value_key),
                    path,
                }));
            }
            None => {
                let missing = self.ctx.child(PathSegment::Key(Cow::Owned(self.value_key.clone())));
                return Err(self.ctx.smuggle_de(missing.error(|path| CodecError::KeyNotFound {
                    key: self.value_key.clone(),
                    path,
                })));
            }
        }
        let value = map.next_value_seed(DecodeAs::new(meta, Some(self.index)))?;

        if let Some(key) = map.next_key::<String>()? {
            return Err(self.fail(|path| CodecError::DecodingFailed {
                message: format!("unexpected key `{key}` after `{}`", self.value_key),
                path,
            }));
        }
        Ok(value)
    }
}

/// A map whose first key was already read.
struct Replay<A> {
    first: Option<String>,
    map: A,
}

impl<'de, A: MapAccess<'de>> MapAccess<'de> for Replay<A> {
    type Error = A::Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, A::Error> {
        match self.first.take() {
            Some(key) => seed.deserialize(key.into_deserializer()).map(Some),
            None => self.map.next_key_seed(seed),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, A::Error> {
        self.map.next_value_seed(seed)
    }
}

// -----------------------------------------------------------------------------
// DecodeAs

/// Decodes a value of a known registered type, in the current context with
/// the plugin at `guard` suppressed.
pub(crate) struct DecodeAs {
    meta: Arc<TypeMeta>,
    guard: Option<usize>,
}

impl DecodeAs {
    #[inline]
    pub(crate) fn new(meta: Arc<TypeMeta>, guard: Option<usize>) -> Self {
        Self { meta, guard }
    }
}

impl<'de> DeserializeSeed<'de> for DecodeAs {
    type Value = AnyValue;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<AnyValue, D::Error> {
        let Some(ctx) = CodingContext::current() else {
            return Err(de::Error::custom("polymorphic values can only be decoded by a modular decoder"));
        };
        let ctx = match self.guard {
            Some(index) => ctx.suppressing(index),
            None => ctx,
        };
        ctx.enter(|| decode_as(&self.meta, &ctx, deserializer))
    }
}

fn decode_as<'de, D: Deserializer<'de>>(
    meta: &TypeMeta,
    ctx: &CodingContext,
    deserializer: D,
) -> Result<AnyValue, D::Error> {
    if let Some(native) = meta.get_trait::<TypeTraitDeserialize>() {
        return match native.deserialize(deserializer) {
            Ok(value) => Ok(AnyValue::from_boxed(value)),
            Err(error) => {
                let message = match ctx.recall(&error.to_string()) {
                    Some(CodecError::DecodingFailed { message, .. }) => message,
                    Some(_) => return Err(error),
                    None => error.to_string(),
                };
                Err(ctx.smuggle_de(ctx.error(|path| CodecError::TypeMismatch {
                    expected: meta.type_name().to_owned(),
                    message,
                    path,
                })))
            }
        };
    }
    if let Some(erasure) = meta.get_trait::<TypeTraitErasure>() {
        if !ctx.allows_unsafe_serialization() {
            return Err(ctx.smuggle_de(ctx.error(|path| CodecError::DecodingFailed {
                message: format!(
                    "`{}` is an erased container, decoding it requires the unsafe serialization plugin",
                    meta.type_name()
                ),
                path,
            })));
        }
        let repr = TaggedRepresentation::deserialize(deserializer)?;
        return erasure
            .from_tagged(repr, ctx)
            .map(AnyValue::from_boxed)
            .map_err(|error| ctx.smuggle_de(error));
    }
    Err(ctx.smuggle_de(ctx.error(|path| CodecError::DecodingFailed {
        message: format!("`{}` has no deserialization registered", meta.type_name()),
        path,
    })))
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use serde::{Deserialize, Serialize};

    use crate::context::Configuration;
    use crate::pipeline::ModularCodec;
    use crate::registry::TypeRegistry;
    use crate::{AnyValue, CodecError};

    #[derive(crate::derive::GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    #[type_meta(id = "test.point", serde)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[derive(crate::derive::GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    #[type_meta(serde)]
    struct Anonymous(u8);

    fn codec(config: Configuration) -> ModularCodec {
        let registry = TypeRegistry::new();
        registry.register::<Point>();
        registry.register::<Anonymous>();
        ModularCodec::json(Arc::new(registry), config)
    }

    #[test]
    fn discriminated_slots() {
        let codec = codec(Configuration::new().with_type_discriminator());
        let value = AnyValue::new(Point { x: 1, y: 2 });

        let bytes = codec.encode(&value).unwrap();
        assert_eq!(bytes, br#"{"$type":"test.point","$value":{"x":1,"y":2}}"#);

        let back: AnyValue = codec.decode(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn types_without_id_are_written_plainly() {
        let codec = codec(Configuration::new().with_type_discriminator());
        let bytes = codec.encode(&AnyValue::new(Anonymous(3))).unwrap();
        assert_eq!(bytes, b"3");

        // nothing names the type on the way back
        let error = codec.decode::<AnyValue>(&bytes).unwrap_err();
        assert!(matches!(error, CodecError::UnresolvableDiscriminator { discriminator: None, .. }));
    }

    #[test]
    fn unknown_discriminators_are_fatal() {
        let codec = codec(Configuration::new().with_type_discriminator());
        let error = codec
            .decode::<AnyValue>(br#"{"$type":"ghost","$value":1}"#)
            .unwrap_err();
        assert!(matches!(
            &error,
            CodecError::UnresolvableDiscriminator { discriminator: Some(id), .. } if id == "ghost"
        ));
    }

    #[test]
    fn unregistered_values_cannot_be_encoded() {
        let codec = codec(Configuration::new().with_type_discriminator());
        let error = codec.encode(&AnyValue::new(1_u16..4_u16)).unwrap_err();
        assert!(matches!(error, CodecError::UnresolvableType { .. }));
    }

    #[test]
    fn payloads_must_fit_their_type() {
        let codec = codec(Configuration::new().with_type_discriminator());
        let error = codec
            .decode::<AnyValue>(br#"{"$type":"test.point","$value":"nope"}"#)
            .unwrap_err();
        match error {
            CodecError::TypeMismatch { expected, path, .. } => {
                assert!(expected.ends_with("Point"));
                assert_eq!(path.to_string(), "$.$value");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn values_without_discriminator_plugin_stay_plain() {
        let codec = codec(Configuration::new());
        let bytes = codec.encode(&AnyValue::new(Point { x: 5, y: 6 })).unwrap();
        assert_eq!(bytes, br#"{"x":5,"y":6}"#);
    }
}
