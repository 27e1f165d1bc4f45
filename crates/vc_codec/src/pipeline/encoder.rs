use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::marker::PhantomData;

use serde::Serialize;

use crate::CodecError;
use crate::context::{CodingContext, Configuration};
use crate::pipeline::format::{Format, Json};
use crate::pipeline::ser::{ModularSerializer, Proxy, ordered_by_type};
use crate::registry::TypeRegistry;

// -----------------------------------------------------------------------------
// ModularEncoder

/// Encodes values through the plugin pipeline on top of a [`Format`].
///
/// # Encoding Rules
///
/// Every nested value is encoded in its own [`CodingContext`], narrowed from
/// the root context of the call. Statically typed values are written by
/// their own `Serialize` implementation, unchanged. [`AnyValue`] slots are
/// resolved in the registry:
///
/// 1. nested `AnyValue` layers are unwrapped to the concrete value;
/// 2. the concrete value is written natively if its type registered
///    [`TypeTraitSerialize`], or as its tagged representation if it is an
///    erased container and the [unsafe serialization plugin] is active;
/// 3. if the [type discriminator] resolves an identifier for the type, the
///    value is wrapped as `{ "$type": id, "$value": value }`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use vc_codec::AnyValue;
/// use vc_codec::context::Configuration;
/// use vc_codec::pipeline::ModularEncoder;
/// use vc_codec::registry::TypeRegistry;
///
/// let encoder: ModularEncoder = ModularEncoder::new(
///     Arc::new(TypeRegistry::new()),
///     Configuration::new().with_type_discriminator(),
/// );
///
/// let bytes = encoder.encode(&vec![AnyValue::new(1_i32), AnyValue::new(true)]).unwrap();
/// assert_eq!(
///     bytes,
///     br#"[{"$type":"i32","$value":1},{"$type":"bool","$value":true}]"#,
/// );
/// ```
///
/// [`AnyValue`]: crate::AnyValue
/// [`TypeTraitSerialize`]: crate::registry::TypeTraitSerialize
/// [unsafe serialization plugin]: crate::plugin::UnsafeSerializationPlugin
/// [type discriminator]: crate::plugin::TypeDiscriminatorPlugin
pub struct ModularEncoder<F: Format = Json> {
    registry: Arc<TypeRegistry>,
    config: Configuration,
    _format: PhantomData<fn() -> F>,
}

impl<F: Format> ModularEncoder<F> {
    #[inline]
    pub fn new(registry: Arc<TypeRegistry>, config: Configuration) -> Self {
        Self {
            registry,
            config,
            _format: PhantomData,
        }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    #[inline]
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Encodes `value` into the bytes of the format.
    pub fn encode<T: ?Sized + Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let ctx = CodingContext::root(
            self.registry.clone(),
            self.config.clone(),
            false,
            Some(core::any::type_name::<T>()),
        );
        log::trace!("encoding `{}` as {}", core::any::type_name::<T>(), F::NAME);
        ctx.enter(|| F::to_bytes(&Proxy::new(value, ctx.clone())))
            .map_err(|error| ctx.recover_ser(error))
    }

    /// Encodes `value` into a JSON tree, whatever the format.
    #[inline]
    pub fn encode_to_value<T: ?Sized + Serialize>(&self, value: &T) -> Result<serde_json::Value, CodecError> {
        encode_value(&self.registry, &self.config, false, value)
    }
}

/// Encodes `value` into a JSON tree; canonical calls sort erased sets and maps.
pub(crate) fn encode_value<T: ?Sized + Serialize>(
    registry: &Arc<TypeRegistry>,
    config: &Configuration,
    canonical: bool,
    value: &T,
) -> Result<serde_json::Value, CodecError> {
    let ctx = CodingContext::root(
        registry.clone(),
        config.clone(),
        canonical,
        Some(core::any::type_name::<T>()),
    );
    let ctx = ordered_by_type(ctx, core::any::type_name::<T>());
    ctx.enter(|| value.serialize(ModularSerializer::new(serde_json::value::Serializer, ctx.clone())))
}

impl<F: Format> Clone for ModularEncoder<F> {
    fn clone(&self) -> Self {
        Self::new(self.registry.clone(), self.config.clone())
    }
}

impl<F: Format> fmt::Debug for ModularEncoder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModularEncoder")
            .field("format", &F::NAME)
            .field("configuration", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeMap;
    use alloc::sync::Arc;

    use serde::Serialize;

    use super::ModularEncoder;
    use crate::context::Configuration;
    use crate::pipeline::JsonPretty;
    use crate::registry::TypeRegistry;
    use crate::{AnyValue, CodecError};

    #[derive(Serialize)]
    struct Scene {
        name: &'static str,
        props: BTreeMap<&'static str, AnyValue>,
    }

    fn scene() -> Scene {
        let mut props = BTreeMap::new();
        props.insert("hp", AnyValue::new(10_u32));
        props.insert("label", AnyValue::new(String::from("door")));
        Scene { name: "hall", props }
    }

    #[test]
    fn statically_typed_values_are_untouched() {
        let encoder: ModularEncoder = ModularEncoder::new(Arc::new(TypeRegistry::new()), Configuration::new());
        assert_eq!(encoder.encode(&(1, "a", [true])).unwrap(), br#"[1,"a",[true]]"#);
    }

    #[test]
    fn tree_and_bytes_agree() {
        let encoder: ModularEncoder<JsonPretty> = ModularEncoder::new(
            Arc::new(TypeRegistry::new()),
            Configuration::new().with_type_discriminator(),
        );
        let tree = encoder.encode_to_value(&scene()).unwrap();
        assert_eq!(tree["props"]["hp"]["$type"], "u32");
        assert_eq!(tree["props"]["label"]["$value"], "door");

        let bytes = encoder.encode(&scene()).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn errors_point_at_the_failing_slot() {
        let encoder: ModularEncoder = ModularEncoder::new(
            Arc::new(TypeRegistry::empty()),
            Configuration::new().with_type_discriminator(),
        );
        let error = encoder.encode(&scene()).unwrap_err();
        match error {
            CodecError::UnresolvableType { type_name, path } => {
                assert_eq!(type_name, "u32");
                assert_eq!(path.to_string(), "$.props.hp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
