//! Stable type identifiers and the type registry.
//!
//! ## Menu
//!
//! - [`StableId`]: An opaque, human-readable name of a registrable type.
//! - [`TypeTrait`]: A capability supported by a registered type.
//! - [`FromType`]: Builds a `TypeTrait` from a type.
//! - [`TypeMeta`]: A type's identity, declared stable id and `TypeTrait` table.
//! - [`GetTypeMeta`]: Builds the `TypeMeta` of a type.
//! - [`TypeRegistry`]: The bijective, concurrency-safe store of `TypeMeta`s.
//! - TypeTraits:
//!     - [`TypeTraitDefault`]: Builds a default value.
//!     - [`TypeTraitSerialize`]: Encodes a value natively through `serde`.
//!     - [`TypeTraitDeserialize`]: Decodes a value natively through `serde`.
//!     - [`TypeTraitErasure`]: Converts a container through the type-erasure bridge.
//!
//! ## auto_register
//!
//! See [`TypeRegistry::auto_register`] .
//!
//! We use [`inventory`] crate to implement static registration,
//! not all platforms support it (although major platforms do).
//! When it is not supported, registration returns `false` instead of failing.
//!
//! [`inventory`]: https://docs.rs/inventory

// -----------------------------------------------------------------------------
// Modules

mod from_type;
mod stable_id;
mod traits;
mod type_meta;
mod type_registry;
mod type_trait;

// -----------------------------------------------------------------------------
// Exports

pub use from_type::FromType;
pub use stable_id::StableId;
pub use traits::{TypeTraitDefault, TypeTraitErasure};
pub use traits::{TypeTraitDeserialize, TypeTraitSerialize};
pub use type_meta::{GetTypeMeta, TypeMeta};
pub use type_registry::TypeRegistry;
pub use type_trait::TypeTrait;
