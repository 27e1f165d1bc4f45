use alloc::borrow::{Cow, ToOwned};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::ser::{self, Serialize, Serializer};
use serde_json::Value;

use crate::CodecError;
use crate::context::{CodingContext, PathSegment};

/// The name of the newtype struct carrying a [`Pinned`] value.
pub(crate) const PINNED_TOKEN: &str = "$vc_codec::Pinned";

// -----------------------------------------------------------------------------
// ModularSerializer

/// Wraps a transport serializer so that every nested value is encoded with
/// its own [`CodingContext`].
///
/// Values are not changed by the wrapper itself: polymorphic values read the
/// installed context to find the registry and the plugins.
pub struct ModularSerializer<S> {
    inner: S,
    ctx: CodingContext,
}

impl<S> ModularSerializer<S> {
    #[inline]
    pub(crate) fn new(inner: S, ctx: CodingContext) -> Self {
        Self { inner, ctx }
    }

    #[inline]
    pub fn context(&self) -> &CodingContext {
        &self.ctx
    }
}

macro_rules! forward {
    ($($method:ident($($arg:ident: $ty:ty),*);)*) => {$(
        #[inline]
        fn $method(self, $($arg: $ty),*) -> Result<S::Ok, CodecError> {
            let Self { inner, ctx } = self;
            inner.$method($($arg),*).map_err(|error| ctx.recover_ser(error))
        }
    )*};
}

impl<S: Serializer> Serializer for ModularSerializer<S> {
    type Ok = S::Ok;
    type Error = CodecError;
    type SerializeSeq = Compound<S::SerializeSeq>;
    type SerializeTuple = Compound<S::SerializeTuple>;
    type SerializeTupleStruct = Compound<S::SerializeTupleStruct>;
    type SerializeTupleVariant = Compound<S::SerializeTupleVariant>;
    type SerializeMap = Compound<S::SerializeMap>;
    type SerializeStruct = Compound<S::SerializeStruct>;
    type SerializeStructVariant = Compound<S::SerializeStructVariant>;

    forward! {
        serialize_bool(v: bool);
        serialize_i8(v: i8);
        serialize_i16(v: i16);
        serialize_i32(v: i32);
        serialize_i64(v: i64);
        serialize_i128(v: i128);
        serialize_u8(v: u8);
        serialize_u16(v: u16);
        serialize_u32(v: u32);
        serialize_u64(v: u64);
        serialize_u128(v: u128);
        serialize_f32(v: f32);
        serialize_f64(v: f64);
        serialize_char(v: char);
        serialize_str(v: &str);
        serialize_bytes(v: &[u8]);
        serialize_none();
        serialize_unit();
        serialize_unit_struct(name: &'static str);
        serialize_unit_variant(name: &'static str, index: u32, variant: &'static str);
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<S::Ok, CodecError> {
        let Self { inner, ctx } = self;
        inner
            .serialize_some(&Proxy::new(value, ctx.clone()))
            .map_err(|error| ctx.recover_ser(error))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<S::Ok, CodecError> {
        let Self { inner, ctx } = self;
        if name == PINNED_TOKEN {
            // The pinned value installed its own context.
            let ctx = CodingContext::current().unwrap_or(ctx);
            return value.serialize(ModularSerializer::new(inner, ctx));
        }
        let content = ctx.newtype(name);
        inner
            .serialize_newtype_struct(name, &Proxy::new(value, content))
            .map_err(|error| ctx.recover_ser(error))
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<S::Ok, CodecError> {
        let Self { inner, ctx } = self;
        let child = ctx.with_static_type(name).child(variant);
        inner
            .serialize_newtype_variant(name, variant_index, variant, &Proxy::new(value, child))
            .map_err(|error| ctx.recover_ser(error))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, CodecError> {
        let Self { inner, ctx } = self;
        match inner.serialize_seq(len) {
            Ok(inner) => Ok(Compound::sorting(inner, ctx)),
            Err(error) => Err(ctx.recover_ser(error)),
        }
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, CodecError> {
        let Self { inner, ctx } = self;
        match inner.serialize_tuple(len) {
            Ok(inner) => Ok(Compound::new(inner, ctx)),
            Err(error) => Err(ctx.recover_ser(error)),
        }
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, CodecError> {
        let Self { inner, ctx } = self;
        match inner.serialize_tuple_struct(name, len) {
            Ok(inner) => Ok(Compound::new(inner, ctx.with_static_type(name))),
            Err(error) => Err(ctx.recover_ser(error)),
        }
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, CodecError> {
        let Self { inner, ctx } = self;
        match inner.serialize_tuple_variant(name, variant_index, variant, len) {
            Ok(inner) => Ok(Compound::new(inner, ctx.with_static_type(name).child(variant))),
            Err(error) => Err(ctx.recover_ser(error)),
        }
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, CodecError> {
        let Self { inner, ctx } = self;
        match inner.serialize_map(len) {
            Ok(inner) => Ok(Compound::sorting(inner, ctx)),
            Err(error) => Err(ctx.recover_ser(error)),
        }
    }

    fn serialize_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, CodecError> {
        let Self { inner, ctx } = self;
        match inner.serialize_struct(name, len) {
            Ok(inner) => Ok(Compound::new(inner, ctx.with_static_type(name))),
            Err(error) => Err(ctx.recover_ser(error)),
        }
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, CodecError> {
        let Self { inner, ctx } = self;
        match inner.serialize_struct_variant(name, variant_index, variant, len) {
            Ok(inner) => Ok(Compound::new(inner, ctx.with_static_type(name).child(variant))),
            Err(error) => Err(ctx.recover_ser(error)),
        }
    }

    #[inline]
    fn is_human_readable(&self) -> bool {
        self.inner.is_human_readable()
    }
}

// -----------------------------------------------------------------------------
// Proxy

/// A nested value paired with the context it is encoded in.
pub(crate) struct Proxy<'a, T: ?Sized> {
    value: &'a T,
    ctx: CodingContext,
}

impl<'a, T: ?Sized> Proxy<'a, T> {
    #[inline]
    pub(crate) fn new(value: &'a T, ctx: CodingContext) -> Self {
        Self { value, ctx }
    }
}

impl<T: ?Sized + Serialize> Serialize for Proxy<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ctx = &ordered_by_type(self.ctx.clone(), core::any::type_name::<T>());
        ctx.enter(|| {
            self.value
                .serialize(ModularSerializer::new(serializer, ctx.clone()))
                .map_err(|error| ctx.smuggle_ser(error))
        })
    }
}

// -----------------------------------------------------------------------------
// Unordered containers

/// Whether `type_name` names a hash set or map, possibly behind references
/// or smart pointers.
fn is_hash_container(type_name: &str) -> bool {
    const WRAPPERS: [&str; 5] = ["&", "mut ", "alloc::boxed::Box<", "alloc::sync::Arc<", "alloc::rc::Rc<"];
    const CONTAINERS: [&str; 4] = [
        "std::collections::hash::set::HashSet<",
        "std::collections::hash::map::HashMap<",
        "hashbrown::set::HashSet<",
        "hashbrown::map::HashMap<",
    ];

    let mut name = type_name;
    while let Some(rest) = WRAPPERS.iter().find_map(|wrapper| name.strip_prefix(wrapper)) {
        name = rest;
    }
    CONTAINERS.iter().any(|container| name.starts_with(container))
}

/// `ctx`, marked [unordered](CodingContext::unordered) when the call is
/// canonical and `type_name` is a hash container.
pub(crate) fn ordered_by_type(ctx: CodingContext, type_name: &str) -> CodingContext {
    if ctx.is_canonical() && is_hash_container(type_name) {
        ctx.unordered()
    } else {
        ctx
    }
}

// An element of an unordered container, encoded ahead of sorting.
struct Buffered {
    rank: String,
    key: Option<Value>,
    value: Value,
}

fn encode_element<T: ?Sized + Serialize>(value: &T, ctx: CodingContext) -> Result<Value, CodecError> {
    let ctx = ordered_by_type(ctx, core::any::type_name::<T>());
    ctx.enter(|| value.serialize(ModularSerializer::new(serde_json::value::Serializer, ctx.clone())))
}

// -----------------------------------------------------------------------------
// Pinned

/// A value encoded in an explicit context, replacing the one the enclosing
/// compound would derive for it.
///
/// Outside of a modular serializer this is a transparent newtype.
pub(crate) struct Pinned<'a, T: ?Sized> {
    value: &'a T,
    ctx: CodingContext,
}

impl<'a, T: ?Sized> Pinned<'a, T> {
    #[inline]
    pub(crate) fn new(value: &'a T, ctx: CodingContext) -> Self {
        Self { value, ctx }
    }
}

impl<T: ?Sized + Serialize> Serialize for Pinned<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.ctx
            .enter(|| serializer.serialize_newtype_struct(PINNED_TOKEN, self.value))
    }
}

// -----------------------------------------------------------------------------
// Compound

/// The compound half of [`ModularSerializer`], giving each element its child context.
///
/// The elements of an [unordered](CodingContext::is_unordered) sequence or
/// map are encoded first and written sorted by their encoding on `end`.
pub struct Compound<C> {
    inner: C,
    ctx: CodingContext,
    index: usize,
    key: Option<PathSegment>,
    buffer: Option<Vec<Buffered>>,
    pending_key: Option<Value>,
}

impl<C> Compound<C> {
    #[inline]
    fn new(inner: C, ctx: CodingContext) -> Self {
        Self {
            inner,
            ctx,
            index: 0,
            key: None,
            buffer: None,
            pending_key: None,
        }
    }

    #[inline]
    fn sorting(inner: C, ctx: CodingContext) -> Self {
        let buffer = ctx.is_unordered().then(Vec::new);
        Self {
            buffer,
            ..Self::new(inner, ctx)
        }
    }

    fn push(&mut self, element: Buffered) {
        if let Some(buffer) = &mut self.buffer {
            buffer.push(element);
        }
    }

    // The buffered elements in canonical order, if any.
    fn take_sorted(&mut self) -> Vec<Buffered> {
        let mut buffer = self.buffer.take().unwrap_or_default();
        buffer.sort_by(|a, b| a.rank.cmp(&b.rank));
        buffer
    }

    fn next_index(&mut self) -> CodingContext {
        let child = self.ctx.child(self.index);
        self.index += 1;
        child
    }
}

/// The path segment of a map key: its scalar rendering, if it has one.
fn key_label<T: ?Sized + Serialize>(key: &T) -> Option<String> {
    match key.serialize(serde_json::value::Serializer).ok()? {
        serde_json::Value::String(label) => Some(label),
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

macro_rules! impl_sequence {
    ($trait:ident, $method:ident) => {
        impl<C: ser::$trait> ser::$trait for Compound<C> {
            type Ok = C::Ok;
            type Error = CodecError;

            fn $method<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CodecError> {
                let child = self.next_index();
                if self.buffer.is_some() {
                    let value = encode_element(value, child)?;
                    self.push(Buffered {
                        rank: value.to_string(),
                        key: None,
                        value,
                    });
                    return Ok(());
                }
                self.inner
                    .$method(&Proxy::new(value, child))
                    .map_err(|error| self.ctx.recover_ser(error))
            }

            fn end(mut self) -> Result<C::Ok, CodecError> {
                for element in self.take_sorted() {
                    self.inner
                        .$method(&element.value)
                        .map_err(|error| self.ctx.recover_ser(error))?;
                }
                let Self { inner, ctx, .. } = self;
                inner.end().map_err(|error| ctx.recover_ser(error))
            }
        }
    };
}

impl_sequence!(SerializeSeq, serialize_element);
impl_sequence!(SerializeTuple, serialize_element);
impl_sequence!(SerializeTupleStruct, serialize_field);
impl_sequence!(SerializeTupleVariant, serialize_field);

impl<C: ser::SerializeMap> ser::SerializeMap for Compound<C> {
    type Ok = C::Ok;
    type Error = CodecError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), CodecError> {
        let segment = match key_label(key) {
            Some(label) => PathSegment::Key(Cow::Owned(label)),
            None => PathSegment::Index(self.index),
        };
        let child = self.ctx.child(segment.clone());
        self.key = Some(segment);
        if self.buffer.is_some() {
            self.pending_key = Some(encode_element(key, child)?);
            return Ok(());
        }
        self.inner
            .serialize_key(&Proxy::new(key, child))
            .map_err(|error| self.ctx.recover_ser(error))
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CodecError> {
        let child = match self.key.take() {
            Some(segment) => self.ctx.child(segment),
            None => self.ctx.child(self.index),
        };
        self.index += 1;
        if self.buffer.is_some() {
            let Some(key) = self.pending_key.take() else {
                return Err(child.error(|path| CodecError::EncodingFailed {
                    message: "map value written before its key".to_owned(),
                    path,
                }));
            };
            let value = encode_element(value, child)?;
            self.push(Buffered {
                rank: key.to_string(),
                key: Some(key),
                value,
            });
            return Ok(());
        }
        self.inner
            .serialize_value(&Proxy::new(value, child))
            .map_err(|error| self.ctx.recover_ser(error))
    }

    fn end(mut self) -> Result<C::Ok, CodecError> {
        for Buffered { key, value, .. } in self.take_sorted() {
            if let Some(key) = key {
                self.inner
                    .serialize_entry(&key, &value)
                    .map_err(|error| self.ctx.recover_ser(error))?;
            }
        }
        let Self { inner, ctx, .. } = self;
        inner.end().map_err(|error| ctx.recover_ser(error))
    }
}

macro_rules! impl_struct {
    ($trait:ident) => {
        impl<C: ser::$trait> ser::$trait for Compound<C> {
            type Ok = C::Ok;
            type Error = CodecError;

            fn serialize_field<T: ?Sized + Serialize>(
                &mut self,
                key: &'static str,
                value: &T,
            ) -> Result<(), CodecError> {
                let child = self.ctx.child(key);
                self.inner
                    .serialize_field(key, &Proxy::new(value, child))
                    .map_err(|error| self.ctx.recover_ser(error))
            }

            fn skip_field(&mut self, key: &'static str) -> Result<(), CodecError> {
                self.inner
                    .skip_field(key)
                    .map_err(|error| self.ctx.recover_ser(error))
            }

            fn end(self) -> Result<C::Ok, CodecError> {
                let Self { inner, ctx, .. } = self;
                inner.end().map_err(|error| ctx.recover_ser(error))
            }
        }
    };
}

impl_struct!(SerializeStruct);
impl_struct!(SerializeStructVariant);
