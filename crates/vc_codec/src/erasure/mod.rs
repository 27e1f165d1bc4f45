//! The type-erasure bridge: containers of heterogeneous values.
//!
//! [`AnyArray`], [`AnySet`], [`AnyMap`], [`AnyOption`] and [`AnyResult`]
//! hold [`AnyValue`](crate::AnyValue)s of any registered type. They are not
//! serializable on their own: the pipeline converts them to a
//! [`TaggedRepresentation`] where every element carries the stable
//! identifier of its concrete type, and back.
//!
//! Because this bypasses static typing, the bridge is only used when the
//! [`UnsafeSerializationPlugin`](crate::plugin::UnsafeSerializationPlugin)
//! is part of the configuration.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vc_codec::AnyValue;
//! use vc_codec::context::Configuration;
//! use vc_codec::erasure::AnyOption;
//! use vc_codec::pipeline::ModularCodec;
//! use vc_codec::registry::TypeRegistry;
//!
//! let codec = ModularCodec::json(
//!     Arc::new(TypeRegistry::new()),
//!     Configuration::new().with_type_discriminator().with_unsafe_serialization(),
//! );
//!
//! let value = AnyValue::new(AnyOption(Some(AnyValue::new(5_u8))));
//! let bytes = codec.encode(&value).unwrap();
//! assert_eq!(
//!     bytes,
//!     br#"{"$type":"vc.optional","$value":{"optional":{"tag":"u8","payload":5}}}"#,
//! );
//! assert_eq!(codec.decode::<AnyValue>(&bytes).unwrap(), value);
//! ```

// -----------------------------------------------------------------------------
// Modules

mod containers;
mod tagged;

// -----------------------------------------------------------------------------
// Exports

pub use containers::{AnyArray, AnyMap, AnyOption, AnyResult, AnySet, Failure};
pub use tagged::{TaggedBranch, TaggedElement, TaggedRepresentation, TypeErasure};
