use alloc::vec::Vec;
use core::fmt;

use serde::Serialize;
use serde::de::DeserializeSeed;

/// The base transport a [`ModularEncoder`] or [`ModularDecoder`] runs on.
///
/// [`ModularEncoder`]: crate::pipeline::ModularEncoder
/// [`ModularDecoder`]: crate::pipeline::ModularDecoder
pub trait Format {
    type Error: fmt::Display;

    /// A short name for logs.
    const NAME: &'static str;

    fn to_bytes<T: ?Sized + Serialize>(value: &T) -> Result<Vec<u8>, Self::Error>;

    /// Decodes the whole input with `seed`, trailing data is an error.
    fn from_bytes<'de, S: DeserializeSeed<'de>>(bytes: &'de [u8], seed: S) -> Result<S::Value, Self::Error>;
}

/// Compact JSON through `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Format for Json {
    type Error = serde_json::Error;

    const NAME: &'static str = "json";

    fn to_bytes<T: ?Sized + Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(value)
    }

    fn from_bytes<'de, S: DeserializeSeed<'de>>(bytes: &'de [u8], seed: S) -> Result<S::Value, serde_json::Error> {
        let mut deserializer = serde_json::Deserializer::from_slice(bytes);
        let value = seed.deserialize(&mut deserializer)?;
        deserializer.end()?;
        Ok(value)
    }
}

/// Indented JSON, decoded like [`Json`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPretty;

impl Format for JsonPretty {
    type Error = serde_json::Error;

    const NAME: &'static str = "json-pretty";

    fn to_bytes<T: ?Sized + Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(value)
    }

    #[inline]
    fn from_bytes<'de, S: DeserializeSeed<'de>>(bytes: &'de [u8], seed: S) -> Result<S::Value, serde_json::Error> {
        Json::from_bytes(bytes, seed)
    }
}

/// Rusty Object Notation through `ron`.
#[cfg(feature = "ron")]
#[cfg_attr(docsrs, doc(cfg(feature = "ron")))]
#[derive(Debug, Clone, Copy, Default)]
pub struct Ron;

#[cfg(feature = "ron")]
impl Format for Ron {
    type Error = ron::Error;

    const NAME: &'static str = "ron";

    fn to_bytes<T: ?Sized + Serialize>(value: &T) -> Result<Vec<u8>, ron::Error> {
        ron::to_string(value).map(alloc::string::String::into_bytes)
    }

    fn from_bytes<'de, S: DeserializeSeed<'de>>(bytes: &'de [u8], seed: S) -> Result<S::Value, ron::Error> {
        let text = core::str::from_utf8(bytes).map_err(ron::Error::Utf8Error)?;
        let mut deserializer = ron::Deserializer::from_str(text).map_err(|error| error.code)?;
        let value = seed.deserialize(&mut deserializer)?;
        deserializer.end()?;
        Ok(value)
    }
}
