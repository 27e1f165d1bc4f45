use alloc::sync::Arc;
use alloc::vec::Vec;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::Configuration;
use crate::hasher::{ContentHasher, Fingerprint};
use crate::pipeline::format::{Format, Json};
use crate::pipeline::{ModularDecoder, ModularEncoder};
use crate::registry::{TypeMeta, TypeRegistry};
use crate::{AnyValue, CodecError};

/// An encoder, a decoder and a hasher sharing one registry and one configuration.
#[derive(Debug, Clone)]
pub struct ModularCodec<F: Format = Json> {
    encoder: ModularEncoder<F>,
    decoder: ModularDecoder<F>,
    hasher: ContentHasher,
}

impl ModularCodec<Json> {
    /// A codec on compact JSON.
    #[inline]
    pub fn json(registry: Arc<TypeRegistry>, config: Configuration) -> Self {
        Self::new(registry, config)
    }
}

impl<F: Format> ModularCodec<F> {
    pub fn new(registry: Arc<TypeRegistry>, config: Configuration) -> Self {
        Self {
            encoder: ModularEncoder::new(registry.clone(), config.clone()),
            decoder: ModularDecoder::new(registry.clone(), config.clone()),
            hasher: ContentHasher::with_configuration(registry, config),
        }
    }

    #[inline]
    pub fn encoder(&self) -> &ModularEncoder<F> {
        &self.encoder
    }

    #[inline]
    pub fn decoder(&self) -> &ModularDecoder<F> {
        &self.decoder
    }

    #[inline]
    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    #[inline]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        self.encoder.registry()
    }

    #[inline]
    pub fn configuration(&self) -> &Configuration {
        self.encoder.configuration()
    }

    /// See [`ModularEncoder::encode`].
    #[inline]
    pub fn encode<T: ?Sized + Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        self.encoder.encode(value)
    }

    /// See [`ModularDecoder::decode`].
    #[inline]
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        self.decoder.decode(bytes)
    }

    /// See [`ModularDecoder::decode_dyn`].
    #[inline]
    pub fn decode_dyn(
        &self,
        static_type: Option<Arc<TypeMeta>>,
        bytes: &[u8],
    ) -> Result<AnyValue, CodecError> {
        self.decoder.decode_dyn(static_type, bytes)
    }

    /// See [`ContentHasher::hash`].
    #[inline]
    pub fn hash<T: ?Sized + Serialize>(&self, value: &T) -> Result<Fingerprint, CodecError> {
        self.hasher.hash(value)
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use serde::{Deserialize, Serialize};

    use super::ModularCodec;
    use crate::context::Configuration;
    use crate::derive::GetTypeMeta;
    use crate::registry::TypeRegistry;
    use crate::{AnyValue, CodecError};

    #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    #[type_meta(id = "foo", serde)]
    struct Foo {
        x: i32,
    }

    #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    #[type_meta(id = "bar", serde)]
    struct Bar {
        x: f32,
    }

    #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    #[type_meta(id = "baz", serde, nested(Foo, Bar))]
    struct Baz {
        child1: AnyValue,
        child2: AnyValue,
    }

    fn baz() -> Baz {
        Baz {
            child1: AnyValue::new(Foo { x: 42 }),
            child2: AnyValue::new(Bar { x: 4.2 }),
        }
    }

    fn registry() -> Arc<TypeRegistry> {
        let registry = TypeRegistry::new();
        registry.register::<Baz>();
        Arc::new(registry)
    }

    fn codec(config: Configuration) -> ModularCodec {
        ModularCodec::json(registry(), config)
    }

    #[test]
    fn slots_carry_their_discriminator() {
        let codec = codec(Configuration::new().with_type_discriminator());

        let bytes = codec.encode(&baz()).unwrap();
        assert_eq!(
            bytes,
            br#"{"child1":{"$type":"foo","$value":{"x":42}},"child2":{"$type":"bar","$value":{"x":4.2}}}"#
        );

        let back: Baz = codec.decode(&bytes).unwrap();
        assert_eq!(back.child1.downcast_ref::<Foo>(), Some(&Foo { x: 42 }));
        assert_eq!(back.child2.downcast_ref::<Bar>(), Some(&Bar { x: 4.2 }));
        assert_eq!(back, baz());
    }

    #[test]
    fn slots_need_the_discriminator() {
        let plain = codec(Configuration::new());
        let bytes = plain.encode(&baz()).unwrap();
        assert_eq!(bytes, br#"{"child1":{"x":42},"child2":{"x":4.2}}"#);

        let error = plain.decode::<Baz>(&bytes).unwrap_err();
        match error {
            CodecError::UnresolvableDiscriminator { discriminator: None, path } => {
                assert_eq!(path.to_string(), "$.child1");
            }
            other => panic!("unexpected error: {other}"),
        }

        // The discriminator only counts as the first key.
        let reordered = br#"{"child1":{"$value":{"x":42},"$type":"foo"},"child2":{"$type":"bar","$value":{"x":4.2}}}"#;
        let error = codec(Configuration::new().with_type_discriminator())
            .decode::<Baz>(reordered)
            .unwrap_err();
        assert!(matches!(
            error,
            CodecError::UnresolvableDiscriminator { discriminator: None, .. }
        ));
    }

    #[test]
    fn missing_fields_inside_slots() {
        let input = br#"{"child1":{"$type":"foo","$value":{}},"child2":{"$type":"bar","$value":{"x":1.5}}}"#;

        let strict = codec(Configuration::new().with_type_discriminator());
        match strict.decode::<Baz>(input).unwrap_err() {
            CodecError::KeyNotFound { key, path } => {
                assert_eq!(key, "x");
                assert_eq!(path.to_string(), "$.child1.$value.x");
            }
            other => panic!("unexpected error: {other}"),
        }

        let lenient = codec(
            Configuration::new()
                .with_type_discriminator()
                .with_key_not_found_recovery(),
        );
        let back: Baz = lenient.decode(input).unwrap();
        assert_eq!(back.child1.downcast_ref::<Foo>(), Some(&Foo { x: 0 }));
        assert_eq!(back.child2.downcast_ref::<Bar>(), Some(&Bar { x: 1.5 }));
    }

    #[test]
    fn unknown_discriminators_are_reported() {
        let input = br#"{"child1":{"$type":"qux","$value":{}},"child2":{"$type":"bar","$value":{"x":1.5}}}"#;
        let error = codec(Configuration::new().with_type_discriminator())
            .decode::<Baz>(input)
            .unwrap_err();
        match error {
            CodecError::UnresolvableDiscriminator { discriminator: Some(id), path } => {
                assert_eq!(id, "qux");
                assert_eq!(path.to_string(), "$.child1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn round_trips_keep_the_fingerprint() {
        let codec = codec(Configuration::new().with_type_discriminator());
        let bytes = codec.encode(&baz()).unwrap();
        let back: Baz = codec.decode(&bytes).unwrap();
        assert_eq!(codec.hash(&back).unwrap(), codec.hash(&baz()).unwrap());

        let mut other = baz();
        other.child1 = AnyValue::new(Foo { x: 43 });
        assert_ne!(codec.hash(&other).unwrap(), codec.hash(&baz()).unwrap());
    }

    #[test]
    fn dynamic_roots() {
        let codec = codec(Configuration::new().with_type_discriminator());
        let bytes = codec.encode(&AnyValue::new(baz())).unwrap();
        assert!(bytes.starts_with(br#"{"$type":"baz","$value":"#));

        let value = codec.decode_dyn(None, &bytes).unwrap();
        assert_eq!(value.downcast_ref::<Baz>(), Some(&baz()));
        assert_eq!(codec.registry().resolve_id("baz").unwrap().type_name(), core::any::type_name::<Baz>());
        assert!(codec.registry().resolve_id("foo").is_some());
    }

    #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    #[type_meta(id = "wrapper", serde, nested(Foo))]
    struct Wrapper(AnyValue);

    #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    #[type_meta(id = "envelope", serde, nested(Foo))]
    enum Envelope {
        Sealed(AnyValue),
    }

    #[test]
    fn newtypes_keep_the_discriminator_of_their_content() {
        let registry = registry();
        registry.register::<Wrapper>();
        registry.register::<Envelope>();
        let codec = ModularCodec::json(registry, Configuration::new().with_type_discriminator());

        let wrapper = Wrapper(AnyValue::new(Foo { x: 42 }));
        let bytes = codec.encode(&AnyValue::new(wrapper.clone())).unwrap();
        assert_eq!(
            bytes,
            br#"{"$type":"wrapper","$value":{"$type":"foo","$value":{"x":42}}}"#
        );
        let back = codec.decode_dyn(None, &bytes).unwrap();
        assert_eq!(back.downcast_ref::<Wrapper>(), Some(&wrapper));

        let envelope = Envelope::Sealed(AnyValue::new(Foo { x: 7 }));
        let bytes = codec.encode(&AnyValue::new(envelope.clone())).unwrap();
        assert_eq!(
            bytes,
            br#"{"$type":"envelope","$value":{"Sealed":{"$type":"foo","$value":{"x":7}}}}"#
        );
        let back = codec.decode_dyn(None, &bytes).unwrap();
        assert_eq!(back.downcast_ref::<Envelope>(), Some(&envelope));
    }

    #[cfg(feature = "ron")]
    #[test]
    fn ron_transport() {
        use crate::pipeline::Ron;

        let codec = ModularCodec::<Ron>::new(registry(), Configuration::new().with_type_discriminator());
        let bytes = codec.encode(&baz()).unwrap();
        let back: Baz = codec.decode(&bytes).unwrap();
        assert_eq!(back, baz());
    }
}
