//! A modular serialization pipeline for polymorphic values.
//!
//! Values of statically unknown types travel through any `serde` transport
//! (JSON, RON) behind [`AnyValue`] slots. The pipeline wraps the transport's
//! serializer and deserializer so that every nested value passes through
//! a set of [plugins]: a type discriminator that tags polymorphic slots with
//! a [`StableId`], a recovery plugin that fills in missing fields, and a
//! marker that enables the [type-erasure bridge] for erased containers.
//!
//! ## Menu
//!
//! - [`registry`]: stable identifiers, [`TypeMeta`](registry::TypeMeta) and
//!   the [`TypeRegistry`](registry::TypeRegistry).
//! - [`erasure`]: [`AnyArray`](erasure::AnyArray), [`AnySet`](erasure::AnySet),
//!   [`AnyMap`](erasure::AnyMap), [`AnyOption`](erasure::AnyOption) and
//!   [`AnyResult`](erasure::AnyResult) with their tagged representation.
//! - [`context`]: [`Configuration`](context::Configuration) and the
//!   per-call [`CodingContext`](context::CodingContext).
//! - [`plugin`]: the [`Plugin`](plugin::Plugin) contract and built-ins.
//! - [`pipeline`]: [`ModularEncoder`](pipeline::ModularEncoder),
//!   [`ModularDecoder`](pipeline::ModularDecoder) and the transports.
//! - [`hasher`]: [`ContentHasher`](hasher::ContentHasher) fingerprints.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde::{Deserialize, Serialize};
//! use vc_codec::{AnyValue, derive::GetTypeMeta};
//! use vc_codec::context::Configuration;
//! use vc_codec::pipeline::ModularCodec;
//! use vc_codec::registry::TypeRegistry;
//!
//! #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
//! #[type_meta(id = "foo", serde)]
//! struct Foo { x: i32 }
//!
//! #[derive(Serialize, Deserialize)]
//! struct Holder { slot: AnyValue }
//!
//! let registry = Arc::new(TypeRegistry::new());
//! registry.register::<Foo>();
//!
//! let codec = ModularCodec::json(registry, Configuration::new().with_type_discriminator());
//! let bytes = codec.encode(&Holder { slot: AnyValue::new(Foo { x: 42 }) }).unwrap();
//! assert_eq!(bytes, br#"{"slot":{"$type":"foo","$value":{"x":42}}}"#);
//!
//! let back: Holder = codec.decode(&bytes).unwrap();
//! assert_eq!(back.slot.downcast_ref::<Foo>(), Some(&Foo { x: 42 }));
//! ```
//!
//! [plugins]: plugin
//! [type-erasure bridge]: erasure
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

// Allows the derive output (`::vc_codec::...`) to resolve inside this crate.
extern crate self as vc_codec;

// -----------------------------------------------------------------------------
// Modules

mod error;
mod hash;
mod impls;
mod portable;

pub mod context;
pub mod erasure;
pub mod hasher;
pub mod pipeline;
pub mod plugin;
pub mod registry;

// -----------------------------------------------------------------------------
// Exports

pub use error::{CodecError, RegistryError};
pub use portable::{AnyValue, Portable};
pub use registry::StableId;

pub mod derive {
    //! `#[derive(GetTypeMeta)]`, see [`GetTypeMeta`](crate::registry::GetTypeMeta).
    pub use vc_codec_derive::GetTypeMeta;
}

#[doc(hidden)]
pub mod __macro_exports;
