use alloc::borrow::ToOwned;
use alloc::sync::Arc;
use core::fmt;
use core::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::context::{CodingContext, CodingPath, Configuration};
use crate::pipeline::de::Seeded;
use crate::pipeline::format::{Format, Json};
use crate::pipeline::polymorphic::PolymorphicSeed;
use crate::registry::{TypeMeta, TypeRegistry};
use crate::{AnyValue, CodecError};

// -----------------------------------------------------------------------------
// ModularDecoder

/// Decodes values through the plugin pipeline on top of a [`Format`].
///
/// The mirror image of [`ModularEncoder`](crate::pipeline::ModularEncoder):
/// statically typed values are read by their own `Deserialize`
/// implementation, [`AnyValue`] slots read the discriminator first and
/// decode the payload as the type it names.
///
/// When the [recovery plugin] is active, struct fields absent from the input
/// are filled in with empty values instead of failing with
/// [`CodecError::KeyNotFound`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use vc_codec::AnyValue;
/// use vc_codec::context::Configuration;
/// use vc_codec::pipeline::ModularDecoder;
/// use vc_codec::registry::TypeRegistry;
///
/// let decoder: ModularDecoder = ModularDecoder::new(
///     Arc::new(TypeRegistry::new()),
///     Configuration::new().with_type_discriminator(),
/// );
///
/// let values: Vec<AnyValue> = decoder
///     .decode(br#"[{"$type":"string","$value":"a"},{"$type":"u8","$value":2}]"#)
///     .unwrap();
/// assert_eq!(values[0].downcast_ref::<String>().unwrap(), "a");
/// assert_eq!(values[1].downcast_ref::<u8>(), Some(&2));
/// ```
///
/// [recovery plugin]: crate::plugin::KeyNotFoundRecoveryPlugin
pub struct ModularDecoder<F: Format = Json> {
    registry: Arc<TypeRegistry>,
    config: Configuration,
    _format: PhantomData<fn() -> F>,
}

impl<F: Format> ModularDecoder<F> {
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

    fn root(&self, static_type: Option<&'static str>) -> CodingContext {
        CodingContext::root(self.registry.clone(), self.config.clone(), false, static_type)
    }

    /// Decodes a value of the statically known type `T`.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let ctx = self.root(Some(core::any::type_name::<T>()));
        log::trace!("decoding `{}` from {}", core::any::type_name::<T>(), F::NAME);
        ctx.enter(|| F::from_bytes(bytes, Seeded::new(PhantomData::<T>, ctx.clone())))
            .map_err(|error| ctx.recover_de(error))
    }

    /// Decodes a polymorphic value.
    ///
    /// The type is read from the discriminator. Input without discriminator
    /// is decoded as `static_type`, and fails with
    /// [`CodecError::UnresolvableDiscriminator`] when there is none.
    pub fn decode_dyn(
        &self,
        static_type: Option<Arc<TypeMeta>>,
        bytes: &[u8],
    ) -> Result<AnyValue, CodecError> {
        let ctx = self.root(static_type.as_ref().map(|meta| meta.type_name()));
        let seed = PolymorphicSeed::new(ctx.clone(), static_type);
        ctx.enter(|| F::from_bytes(bytes, Seeded::new(seed, ctx.clone())))
            .map_err(|error| ctx.recover_de(error))
    }

    /// Like [`decode_dyn`](Self::decode_dyn), with the static type given by
    /// its stable identifier.
    pub fn decode_by_id(&self, id: &str, bytes: &[u8]) -> Result<AnyValue, CodecError> {
        match self.registry.resolve_id(id) {
            Some(meta) => self.decode_dyn(Some(meta), bytes),
            None => Err(CodecError::UnresolvableDiscriminator {
                discriminator: Some(id.to_owned()),
                path: CodingPath::root(),
            }),
        }
    }
}

impl<F: Format> Clone for ModularDecoder<F> {
    fn clone(&self) -> Self {
        Self::new(self.registry.clone(), self.config.clone())
    }
}

impl<F: Format> fmt::Debug for ModularDecoder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModularDecoder")
            .field("format", &F::NAME)
            .field("configuration", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use serde::{Deserialize, Serialize};

    use super::ModularDecoder;
    use crate::context::Configuration;
    use crate::derive::GetTypeMeta;
    use crate::registry::TypeRegistry;
    use crate::{AnyValue, CodecError};

    #[derive(Deserialize, Debug, PartialEq)]
    struct Stats {
        hp: u32,
        name: String,
        alias: Option<String>,
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Hero {
        stats: Stats,
        level: u8,
    }

    fn decoder(config: Configuration) -> ModularDecoder {
        ModularDecoder::new(Arc::new(TypeRegistry::new()), config)
    }

    #[test]
    fn missing_fields_fail_without_recovery() {
        let error = decoder(Configuration::new())
            .decode::<Hero>(br#"{"stats":{"name":"ann"},"level":3}"#)
            .unwrap_err();
        match error {
            CodecError::KeyNotFound { key, path } => {
                assert_eq!(key, "hp");
                assert_eq!(path.to_string(), "$.stats.hp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_fields_are_recovered() {
        let hero = decoder(Configuration::new().with_key_not_found_recovery())
            .decode::<Hero>(br#"{"stats":{"name":"ann"}}"#)
            .unwrap();
        assert_eq!(
            hero,
            Hero {
                stats: Stats {
                    hp: 0,
                    name: "ann".into(),
                    alias: None,
                },
                level: 0,
            }
        );
    }

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
        #[default]
        Auto,
        Manual,
    }

    #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    #[type_meta(serde)]
    struct Handle {
        id: u64,
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Server {
        name: String,
        port: Port,
        mode: Mode,
    }

    #[derive(Deserialize, Debug)]
    #[allow(dead_code, reason = "only decoded")]
    struct Holder {
        name: String,
        handle: Handle,
    }

    #[test]
    fn recovery_uses_registered_defaults() {
        let registry = TypeRegistry::new();
        registry.register::<Port>();
        registry.register::<Mode>();
        registry.register::<Handle>();
        let decoder: ModularDecoder = ModularDecoder::new(
            Arc::new(registry),
            Configuration::new().with_key_not_found_recovery(),
        );

        let server = decoder.decode::<Server>(br#"{"name":"a"}"#).unwrap();
        assert_eq!(
            server,
            Server {
                name: "a".into(),
                port: Port(8080),
                mode: Mode::Auto,
            }
        );

        match decoder.decode::<Holder>(br#"{"name":"a"}"#).unwrap_err() {
            CodecError::KeyNotFound { key, path } => {
                assert_eq!(key, "handle");
                assert_eq!(path.to_string(), "$.handle");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_input_is_a_decoding_error() {
        let error = decoder(Configuration::new()).decode::<Hero>(b"{\"stats\":").unwrap_err();
        assert!(matches!(error, CodecError::DecodingFailed { .. }));
    }

    #[test]
    fn static_type_is_the_fallback() {
        let decoder = decoder(Configuration::new().with_type_discriminator());
        let value = decoder.decode_by_id("u16", b"7").unwrap();
        assert_eq!(value.downcast_ref::<u16>(), Some(&7));

        // an explicit discriminator wins over the static type
        let value = decoder
            .decode_by_id("u16", br#"{"$type":"string","$value":"x"}"#)
            .unwrap();
        assert_eq!(value.downcast_ref::<String>().unwrap(), "x");

        let error = decoder.decode_dyn(None, b"7").unwrap_err();
        assert!(matches!(error, CodecError::UnresolvableDiscriminator { discriminator: None, .. }));
    }
}
