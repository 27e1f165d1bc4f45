//! The modular encoder and decoder.
//!
//! - [`ModularSerializer`] and [`ModularDeserializer`] wrap any `serde`
//!   transport and give every nested value its own
//!   [`CodingContext`](crate::context::CodingContext).
//! - [`ModularEncoder`] and [`ModularDecoder`] run whole encode and decode
//!   calls on a [`Format`]: [`Json`], [`JsonPretty`] or `Ron` (`ron` feature).
//! - [`ModularCodec`] bundles both with a [`ContentHasher`](crate::hasher::ContentHasher).

// -----------------------------------------------------------------------------
// Modules

mod codec;
mod de;
mod decoder;
mod encoder;
mod format;
mod missing;
mod polymorphic;
mod ser;

// -----------------------------------------------------------------------------
// Internal API

pub(crate) use encoder::encode_value;
pub(crate) use polymorphic::{Body, DecodeAs, meta_of};

// -----------------------------------------------------------------------------
// Exports

pub use codec::ModularCodec;
pub use de::ModularDeserializer;
pub use decoder::ModularDecoder;
pub use encoder::ModularEncoder;
pub use format::{Format, Json, JsonPretty};
pub use ser::{Compound, ModularSerializer};

#[cfg(feature = "ron")]
pub use format::Ron;
