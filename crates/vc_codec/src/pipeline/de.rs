use alloc::borrow::{Cow, ToOwned};
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, IntoDeserializer, Visitor};

use crate::CodecError;
use crate::context::{CodingContext, PathSegment};
use crate::pipeline::missing::MissingValue;

// -----------------------------------------------------------------------------
// ModularDeserializer

/// Wraps a transport deserializer so that every nested value is decoded with
/// its own [`CodingContext`].
///
/// Struct fields missing from the input are reported to the active
/// [`KeyNotFoundRecovery`](crate::plugin::KeyNotFoundRecovery) plugin, which
/// may substitute a default value.
pub struct ModularDeserializer<D> {
    inner: D,
    ctx: CodingContext,
    // Set for map keys and enum variants, which report their name to the context.
    capture_key: bool,
}

impl<D> ModularDeserializer<D> {
    #[inline]
    pub(crate) fn new(inner: D, ctx: CodingContext) -> Self {
        Self {
            inner,
            ctx,
            capture_key: false,
        }
    }

    #[inline]
    pub fn context(&self) -> &CodingContext {
        &self.ctx
    }
}

macro_rules! forward {
    ($($method:ident),* $(,)?) => {$(
        #[inline]
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, D::Error> {
            let Self { inner, ctx, capture_key } = self;
            inner.$method(Wrap::new(visitor, ctx, capture_key))
        }
    )*};
}

impl<'de, D: Deserializer<'de>> Deserializer<'de> for ModularDeserializer<D> {
    type Error = D::Error;

    forward! {
        deserialize_any,
        deserialize_bool,
        deserialize_i8,
        deserialize_i16,
        deserialize_i32,
        deserialize_i64,
        deserialize_i128,
        deserialize_u8,
        deserialize_u16,
        deserialize_u32,
        deserialize_u64,
        deserialize_u128,
        deserialize_f32,
        deserialize_f64,
        deserialize_char,
        deserialize_str,
        deserialize_string,
        deserialize_bytes,
        deserialize_byte_buf,
        deserialize_option,
        deserialize_unit,
        deserialize_seq,
        deserialize_map,
        deserialize_identifier,
        deserialize_ignored_any,
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, D::Error> {
        let Self { inner, ctx, .. } = self;
        inner.deserialize_unit_struct(name, Wrap::new(visitor, ctx, false))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, D::Error> {
        let Self { inner, ctx, .. } = self;
        let ctx = ctx.newtype(name);
        inner.deserialize_newtype_struct(name, Wrap::new(visitor, ctx, false))
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, D::Error> {
        let Self { inner, ctx, .. } = self;
        inner.deserialize_tuple(len, Wrap::new(visitor, ctx, false))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, D::Error> {
        let Self { inner, ctx, .. } = self;
        let ctx = ctx.with_static_type(name);
        inner.deserialize_tuple_struct(name, len, Wrap::new(visitor, ctx, false))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, D::Error> {
        let Self { inner, ctx, .. } = self;
        let ctx = ctx.with_static_type(name);
        inner.deserialize_struct(name, fields, Wrap::with_fields(visitor, ctx, fields))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, D::Error> {
        let Self { inner, ctx, .. } = self;
        let ctx = ctx.with_static_type(name);
        inner.deserialize_enum(name, variants, Wrap::new(visitor, ctx, false))
    }

    #[inline]
    fn is_human_readable(&self) -> bool {
        self.inner.is_human_readable()
    }
}

// -----------------------------------------------------------------------------
// Seeded

/// A nested seed paired with the context it is decoded in.
pub(crate) struct Seeded<T> {
    seed: T,
    ctx: CodingContext,
    capture_key: bool,
}

impl<T> Seeded<T> {
    #[inline]
    pub(crate) fn new(seed: T, ctx: CodingContext) -> Self {
        Self {
            seed,
            ctx,
            capture_key: false,
        }
    }

    #[inline]
    fn keyed(seed: T, ctx: CodingContext) -> Self {
        Self {
            seed,
            ctx,
            capture_key: true,
        }
    }
}

impl<'de, T: DeserializeSeed<'de>> DeserializeSeed<'de> for Seeded<T> {
    type Value = T::Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<T::Value, D::Error> {
        let Self {
            seed,
            ctx,
            capture_key,
        } = self;
        ctx.clone().enter(|| {
            seed.deserialize(ModularDeserializer {
                inner: deserializer,
                ctx,
                capture_key,
            })
        })
    }
}

// -----------------------------------------------------------------------------
// Errors

/// The field named by a transport's missing-field message.
fn missing_field_name(message: &str) -> Option<&str> {
    const MARKERS: [&str; 2] = ["missing field `", "missing field named `"];
    MARKERS.iter().find_map(|marker| {
        let start = message.find(marker)? + marker.len();
        let rest = &message[start..];
        rest.find('`').map(|end| &rest[..end])
    })
}

/// Turns the transport's own missing-field error into [`CodecError::KeyNotFound`].
fn translate<E: de::Error>(ctx: &CodingContext, error: E) -> E {
    let message = error.to_string();
    if ctx.recall(&message).is_some() {
        return error;
    }
    match missing_field_name(&message) {
        Some(field) => {
            let key = field.to_owned();
            let child = ctx.child(PathSegment::Key(Cow::Owned(key.clone())));
            ctx.smuggle_de(child.error(|path| CodecError::KeyNotFound { key, path }))
        }
        None => error,
    }
}

// -----------------------------------------------------------------------------
// Wrap

struct Wrap<V> {
    visitor: V,
    ctx: CodingContext,
    fields: &'static [&'static str],
    capture_key: bool,
}

impl<V> Wrap<V> {
    #[inline]
    fn new(visitor: V, ctx: CodingContext, capture_key: bool) -> Self {
        Self {
            visitor,
            ctx,
            fields: &[],
            capture_key,
        }
    }

    #[inline]
    fn with_fields(visitor: V, ctx: CodingContext, fields: &'static [&'static str]) -> Self {
        Self {
            visitor,
            ctx,
            fields,
            capture_key: false,
        }
    }
}

macro_rules! visit {
    ($($method:ident($ty:ty);)*) => {$(
        #[inline]
        fn $method<E: de::Error>(self, v: $ty) -> Result<V::Value, E> {
            self.visitor.$method(v)
        }
    )*};
}

impl<'de, V: Visitor<'de>> Visitor<'de> for Wrap<V> {
    type Value = V::Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.visitor.expecting(formatter)
    }

    visit! {
        visit_bool(bool);
        visit_i8(i8);
        visit_i16(i16);
        visit_i32(i32);
        visit_i64(i64);
        visit_i128(i128);
        visit_u8(u8);
        visit_u16(u16);
        visit_u32(u32);
        visit_u128(u128);
        visit_f32(f32);
        visit_f64(f64);
        visit_char(char);
        visit_bytes(&[u8]);
        visit_borrowed_bytes(&'de [u8]);
        visit_byte_buf(Vec<u8>);
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<V::Value, E> {
        if self.capture_key {
            self.ctx.capture_key(v);
        }
        self.visitor.visit_u64(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<V::Value, E> {
        if self.capture_key {
            self.ctx.capture_key(v);
        }
        self.visitor.visit_str(v)
    }

    fn visit_borrowed_str<E: de::Error>(self, v: &'de str) -> Result<V::Value, E> {
        if self.capture_key {
            self.ctx.capture_key(v);
        }
        self.visitor.visit_borrowed_str(v)
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<V::Value, E> {
        if self.capture_key {
            self.ctx.capture_key(&v);
        }
        self.visitor.visit_string(v)
    }

    #[inline]
    fn visit_none<E: de::Error>(self) -> Result<V::Value, E> {
        self.visitor.visit_none()
    }

    #[inline]
    fn visit_unit<E: de::Error>(self) -> Result<V::Value, E> {
        self.visitor.visit_unit()
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<V::Value, D::Error> {
        self.visitor
            .visit_some(ModularDeserializer::new(deserializer, self.ctx))
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<V::Value, D::Error> {
        let Self { visitor, ctx, .. } = self;
        ctx.clone()
            .enter(|| visitor.visit_newtype_struct(ModularDeserializer::new(deserializer, ctx)))
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, seq: A) -> Result<V::Value, A::Error> {
        let ctx = self.ctx.clone();
        self.visitor
            .visit_seq(SeqWrap {
                inner: seq,
                ctx: self.ctx,
                index: 0,
            })
            .map_err(|error| translate(&ctx, error))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, map: A) -> Result<V::Value, A::Error> {
        let ctx = self.ctx.clone();
        self.visitor
            .visit_map(MapWrap::new(map, self.ctx, self.fields))
            .map_err(|error| translate(&ctx, error))
    }

    fn visit_enum<A: de::EnumAccess<'de>>(self, data: A) -> Result<V::Value, A::Error> {
        self.visitor.visit_enum(EnumWrap {
            inner: data,
            ctx: self.ctx,
        })
    }
}

// -----------------------------------------------------------------------------
// SeqWrap

struct SeqWrap<A> {
    inner: A,
    ctx: CodingContext,
    index: usize,
}

impl<'de, A: de::SeqAccess<'de>> de::SeqAccess<'de> for SeqWrap<A> {
    type Error = A::Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, A::Error> {
        let child = self.ctx.child(self.index);
        self.index += 1;
        self.inner.next_element_seed(Seeded::new(seed, child))
    }

    #[inline]
    fn size_hint(&self) -> Option<usize> {
        self.inner.size_hint()
    }
}

// -----------------------------------------------------------------------------
// MapWrap

struct MapWrap<A> {
    inner: A,
    ctx: CodingContext,
    // Declared fields of the struct being decoded, empty for plain maps.
    fields: &'static [&'static str],
    seen: Vec<bool>,
    // Next declared field to check once the input is exhausted.
    cursor: usize,
    exhausted: bool,
    key: Option<PathSegment>,
    missing: Option<&'static str>,
    index: usize,
}

impl<A> MapWrap<A> {
    fn new(inner: A, ctx: CodingContext, fields: &'static [&'static str]) -> Self {
        Self {
            inner,
            ctx,
            fields,
            seen: vec![false; fields.len()],
            cursor: 0,
            exhausted: false,
            key: None,
            missing: None,
            index: 0,
        }
    }

    // Offers the next unseen field to the recovery plugin.
    fn recover_next<'de, K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, A::Error>
    where
        A: de::MapAccess<'de>,
    {
        let Some(recovery) = self.ctx.key_not_found_recovery() else {
            return Ok(None);
        };
        while let Some(&field) = self.fields.get(self.cursor) {
            let seen = self.seen[self.cursor];
            self.cursor += 1;
            if !seen && recovery.should_recover(field, &self.ctx) {
                log::debug!("recovering missing field `{field}` at {}", self.ctx.path());
                self.missing = Some(field);
                return seed
                    .deserialize(IntoDeserializer::<A::Error>::into_deserializer(field))
                    .map(Some);
            }
        }
        Ok(None)
    }
}

struct KeySeed<'a, K> {
    seed: &'a mut Option<K>,
    ctx: CodingContext,
}

impl<'de, K: DeserializeSeed<'de>> DeserializeSeed<'de> for KeySeed<'_, K> {
    type Value = K::Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<K::Value, D::Error> {
        match self.seed.take() {
            Some(seed) => Seeded::keyed(seed, self.ctx).deserialize(deserializer),
            None => Err(de::Error::custom("map key requested twice")),
        }
    }
}

impl<'de, A: de::MapAccess<'de>> de::MapAccess<'de> for MapWrap<A> {
    type Error = A::Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, A::Error> {
        let mut seed = Some(seed);
        if !self.exhausted {
            self.ctx.take_captured_key();
            let key_seed = KeySeed {
                seed: &mut seed,
                ctx: self.ctx.child(self.index),
            };
            match self.inner.next_key_seed(key_seed)? {
                Some(key) => {
                    let captured = self.ctx.take_captured_key();
                    self.key = match captured {
                        Some(name) => {
                            if let Some(position) = self.fields.iter().position(|field| *field == name) {
                                self.seen[position] = true;
                            }
                            Some(PathSegment::Key(Cow::Owned(name)))
                        }
                        None => None,
                    };
                    return Ok(Some(key));
                }
                None => self.exhausted = true,
            }
        }
        match seed {
            Some(seed) if !self.fields.is_empty() => self.recover_next(seed),
            _ => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, A::Error> {
        if let Some(field) = self.missing.take() {
            let child = self.ctx.child(field);
            return child
                .enter(|| seed.deserialize(MissingValue::new(field, child.clone())))
                .map_err(|error| child.smuggle_de(error));
        }
        let segment = self.key.take().unwrap_or(PathSegment::Index(self.index));
        self.index += 1;
        self.inner
            .next_value_seed(Seeded::new(seed, self.ctx.child(segment)))
    }

    #[inline]
    fn size_hint(&self) -> Option<usize> {
        self.inner.size_hint()
    }
}

// -----------------------------------------------------------------------------
// EnumWrap

struct EnumWrap<A> {
    inner: A,
    ctx: CodingContext,
}

impl<'de, A: de::EnumAccess<'de>> de::EnumAccess<'de> for EnumWrap<A> {
    type Error = A::Error;
    type Variant = VariantWrap<A::Variant>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self::Variant), A::Error> {
        self.ctx.take_captured_key();
        let (value, variant) = self
            .inner
            .variant_seed(Seeded::keyed(seed, self.ctx.clone()))?;
        let ctx = match self.ctx.take_captured_key() {
            Some(name) => self.ctx.child(PathSegment::Key(Cow::Owned(name))),
            None => self.ctx,
        };
        Ok((value, VariantWrap { inner: variant, ctx }))
    }
}

struct VariantWrap<A> {
    inner: A,
    ctx: CodingContext,
}

impl<'de, A: de::VariantAccess<'de>> de::VariantAccess<'de> for VariantWrap<A> {
    type Error = A::Error;

    #[inline]
    fn unit_variant(self) -> Result<(), A::Error> {
        self.inner.unit_variant()
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, A::Error> {
        self.inner.newtype_variant_seed(Seeded::new(seed, self.ctx))
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, A::Error> {
        self.inner
            .tuple_variant(len, Wrap::new(visitor, self.ctx, false))
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, A::Error> {
        self.inner
            .struct_variant(fields, Wrap::with_fields(visitor, self.ctx, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::missing_field_name;

    #[test]
    fn missing_field_messages() {
        assert_eq!(missing_field_name("missing field `x` at line 1 column 2"), Some("x"));
        assert_eq!(missing_field_name("Unexpected missing field named `hp` in `Hero`"), Some("hp"));
        assert_eq!(missing_field_name("invalid type: string"), None);
    }
}
