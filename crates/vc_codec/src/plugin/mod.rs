//! The plugin contract and the built-in plugins.
//!
//! A [`Plugin`] is a stateless capability object consulted at every nesting
//! level of an encode or decode call. The set of capabilities is closed:
//!
//! - [`TypeDiscriminator`]: tags polymorphic slots with a stable identifier,
//!   provided by [`TypeDiscriminatorPlugin`].
//! - [`KeyNotFoundRecovery`]: substitutes defaults for missing fields,
//!   provided by [`KeyNotFoundRecoveryPlugin`].
//! - unsafe serialization: authorizes the type-erasure bridge fallback,
//!   provided by [`UnsafeSerializationPlugin`].
//!
//! Plugins are collected into a [`Configuration`](crate::context::Configuration)
//! and looked up by capability, first match wins.

// -----------------------------------------------------------------------------
// Modules

mod discriminator;
mod recovery;
mod unsafe_serialization;

// -----------------------------------------------------------------------------
// Exports

pub use discriminator::{TypeDiscriminator, TypeDiscriminatorPlugin};
pub use recovery::{KeyNotFoundRecovery, KeyNotFoundRecoveryPlugin};
pub use unsafe_serialization::UnsafeSerializationPlugin;

// -----------------------------------------------------------------------------
// Plugin

/// A composable capability that intercepts encoding and decoding.
///
/// Implementations hold no per-call state, one instance may serve
/// concurrent calls.
///
/// # Example
///
/// A custom discriminator that writes `kind` instead of `$type`:
///
/// ```
/// use std::sync::Arc;
/// use vc_codec::StableId;
/// use vc_codec::context::Configuration;
/// use vc_codec::plugin::{Plugin, TypeDiscriminator};
/// use vc_codec::registry::{TypeMeta, TypeRegistry};
/// use vc_codec::RegistryError;
///
/// struct Kind;
///
/// impl TypeDiscriminator for Kind {
///     fn type_key(&self) -> &str { "kind" }
///
///     fn resolve_discriminator(
///         &self,
///         meta: &TypeMeta,
///         registry: &TypeRegistry,
///     ) -> Result<Option<StableId>, RegistryError> {
///         registry.resolve_stable_id(meta)
///     }
///
///     fn resolve_type(&self, discriminator: &str, registry: &TypeRegistry) -> Option<Arc<TypeMeta>> {
///         registry.resolve_id(discriminator)
///     }
/// }
///
/// impl Plugin for Kind {
///     fn name(&self) -> &'static str { "kind" }
///
///     fn as_type_discriminator(&self) -> Option<&dyn TypeDiscriminator> {
///         Some(self)
///     }
/// }
///
/// let config = Configuration::new().with_plugin(Kind);
/// assert_eq!(config.type_discriminator().unwrap().1.type_key(), "kind");
/// ```
pub trait Plugin: Send + Sync + 'static {
    /// A short name, used in logs and debug output.
    fn name(&self) -> &'static str;

    #[inline]
    fn as_type_discriminator(&self) -> Option<&dyn TypeDiscriminator> {
        None
    }

    #[inline]
    fn as_key_not_found_recovery(&self) -> Option<&dyn KeyNotFoundRecovery> {
        None
    }

    /// Whether this plugin authorizes the type-erasure bridge fallback.
    #[inline]
    fn allows_unsafe_serialization(&self) -> bool {
        false
    }
}
