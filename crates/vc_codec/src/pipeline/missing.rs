use alloc::borrow::ToOwned;

use serde::de::{self, DeserializeSeed, Deserializer, Visitor};
use serde_json::Value;

use crate::CodecError;
use crate::context::CodingContext;
use crate::pipeline::de::ModularDeserializer;
use crate::pipeline::encode_value;
use crate::registry::{TypeTraitDefault, TypeTraitSerialize};

/// Stands in for the value of a missing field the recovery plugin chose to
/// fill in.
///
/// Named types (structs, enums, newtypes) are looked up in the registry by
/// the name `serde` reports for them, and recover as their registered
/// [`TypeTraitDefault`]. Options recover as `None`. Scalars, strings,
/// tuples, sequences and maps recover as their empty value. Anything else,
/// including a named type that is unregistered, ambiguous or registered
/// without a default, fails with [`CodecError::KeyNotFound`].
pub(crate) struct MissingValue {
    field: &'static str,
    ctx: CodingContext,
}

impl MissingValue {
    #[inline]
    pub(crate) fn new(field: &'static str, ctx: CodingContext) -> Self {
        Self { field, ctx }
    }

    fn not_found(&self) -> CodecError {
        self.ctx.error(|path| CodecError::KeyNotFound {
            key: self.field.to_owned(),
            path,
        })
    }

    // The encoded default of the registered type `serde` calls `name`.
    fn registered_default(&self, name: &str) -> Result<Value, CodecError> {
        let registry = self.ctx.registry();
        let Some(meta) = registry.get_with_type_name(name) else {
            return Err(self.not_found());
        };
        let (Some(default), Some(native)) = (
            meta.get_trait::<TypeTraitDefault>(),
            meta.get_trait::<TypeTraitSerialize>(),
        ) else {
            return Err(self.not_found());
        };
        let value = default.default();
        let Some(view) = native.get(&*value) else {
            return Err(self.not_found());
        };
        log::trace!(
            "recovering `{}` at {} with the default of `{}`",
            self.field,
            self.ctx.path(),
            meta.type_name()
        );
        encode_value(registry, self.ctx.configuration(), false, view)
    }

    // Decodes the registered default of `name` with `decode`.
    fn from_default<'de, V, F>(self, name: &str, visitor: V, decode: F) -> Result<V::Value, CodecError>
    where
        V: Visitor<'de>,
        F: FnOnce(ModularDeserializer<Value>, V) -> Result<V::Value, serde_json::Error>,
    {
        let value = self.registered_default(name)?;
        let ctx = self.ctx;
        decode(ModularDeserializer::new(value, ctx.clone()), visitor).map_err(|error| ctx.recover_de(error))
    }
}

macro_rules! zero {
    ($($method:ident => $visit:ident($value:expr);)*) => {$(
        #[inline]
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
            visitor.$visit($value)
        }
    )*};
}

impl<'de> Deserializer<'de> for MissingValue {
    type Error = CodecError;

    zero! {
        deserialize_bool => visit_bool(false);
        deserialize_i8 => visit_i8(0);
        deserialize_i16 => visit_i16(0);
        deserialize_i32 => visit_i32(0);
        deserialize_i64 => visit_i64(0);
        deserialize_i128 => visit_i128(0);
        deserialize_u8 => visit_u8(0);
        deserialize_u16 => visit_u16(0);
        deserialize_u32 => visit_u32(0);
        deserialize_u64 => visit_u64(0);
        deserialize_u128 => visit_u128(0);
        deserialize_f32 => visit_f32(0.0);
        deserialize_f64 => visit_f64(0.0);
        deserialize_char => visit_char('\0');
        deserialize_str => visit_str("");
        deserialize_string => visit_str("");
        deserialize_bytes => visit_bytes(&[]);
        deserialize_byte_buf => visit_bytes(&[]);
    }

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, CodecError> {
        Err(self.not_found())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        visitor.visit_none()
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        self.from_default(name, visitor, |value, visitor| {
            value.deserialize_newtype_struct(name, visitor)
        })
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        visitor.visit_seq(Elements {
            remaining: 0,
            source: self,
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, CodecError> {
        visitor.visit_seq(Elements {
            remaining: len,
            source: self,
        })
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        self.from_default(name, visitor, |value, visitor| {
            value.deserialize_tuple_struct(name, len, visitor)
        })
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        visitor.visit_map(NoEntries)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        self.from_default(name, visitor, |value, visitor| {
            value.deserialize_struct(name, fields, visitor)
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        self.from_default(name, visitor, |value, visitor| {
            value.deserialize_enum(name, variants, visitor)
        })
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, CodecError> {
        Err(self.not_found())
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        visitor.visit_unit()
    }
}

struct Elements {
    remaining: usize,
    source: MissingValue,
}

impl<'de> de::SeqAccess<'de> for Elements {
    type Error = CodecError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, CodecError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let value = MissingValue::new(self.source.field, self.source.ctx.clone());
        seed.deserialize(value).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

struct NoEntries;

impl<'de> de::MapAccess<'de> for NoEntries {
    type Error = CodecError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, _seed: K) -> Result<Option<K::Value>, CodecError> {
        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, _seed: V) -> Result<V::Value, CodecError> {
        Err(de::Error::custom("value requested from an empty map"))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(0)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    use serde::{Deserialize, Serialize};

    use super::MissingValue;
    use crate::context::{CodingContext, Configuration};
    use crate::derive::GetTypeMeta;
    use crate::registry::TypeRegistry;

    #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    #[type_meta(serde, default)]
    struct Port(u16);

    impl Default for Port {
        fn default() -> Self {
            Self(8080)
        }
    }

    #[derive(GetTypeMeta, Serialize, Deserialize, Default, Clone, PartialEq, Debug)]
    #[type_meta(serde, default)]
    enum Mode {
        Auto,
        #[default]
        Manual,
    }

    #[derive(GetTypeMeta, Serialize, Deserialize, Default, Clone, PartialEq, Debug)]
    #[type_meta(serde, default)]
    struct Limits {
        port: Port,
        retries: u8,
    }

    #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    #[type_meta(serde)]
    struct Handle {
        id: u64,
    }

    #[derive(Deserialize, Debug)]
    struct Unknown {
        #[allow(dead_code, reason = "only decoded")]
        id: u64,
    }

    fn missing(field: &'static str) -> MissingValue {
        let registry = TypeRegistry::new();
        registry.register::<Port>();
        registry.register::<Mode>();
        registry.register::<Limits>();
        registry.register::<Handle>();
        let root = CodingContext::root(Arc::new(registry), Configuration::new(), false, None);
        MissingValue::new(field, root.child(field))
    }

    #[test]
    fn unnamed_shapes_get_empty_values() {
        type Row = (u32, String, Vec<String>, Option<u64>, (f32, f32));

        let row = Row::deserialize(missing("row")).unwrap();
        assert_eq!(row, (0, String::new(), Vec::new(), None, (0.0, 0.0)));
    }

    #[test]
    fn named_types_get_their_registered_default() {
        assert_eq!(Port::deserialize(missing("port")).unwrap(), Port(8080));
        assert_eq!(Mode::deserialize(missing("mode")).unwrap(), Mode::Manual);
        assert_eq!(
            Limits::deserialize(missing("limits")).unwrap(),
            Limits {
                port: Port(8080),
                retries: 0,
            }
        );
        assert_eq!(Option::<Handle>::deserialize(missing("handle")).unwrap(), None);
    }

    #[test]
    fn types_without_default_stay_missing() {
        let error = Handle::deserialize(missing("handle")).unwrap_err();
        assert!(error.is_key_not_found());
        assert_eq!(error.to_string(), "missing field `handle`, at $.handle");

        let error = Unknown::deserialize(missing("unknown")).unwrap_err();
        assert!(error.is_key_not_found());
    }
}
