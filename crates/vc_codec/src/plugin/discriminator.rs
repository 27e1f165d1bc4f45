use alloc::borrow::Cow;
use alloc::sync::Arc;

use crate::plugin::Plugin;
use crate::registry::{StableId, TypeMeta, TypeRegistry};
use crate::RegistryError;

/// Tags a polymorphic slot with the stable identifier of its concrete type.
///
/// On encode the slot becomes a two-entry map, the discriminator first:
///
/// ```text
/// { "$type": "foo", "$value": { "x": 42 } }
/// ```
///
/// On decode the discriminator is read first and resolved through the
/// registry. A discriminator that does not resolve is a hard error, the
/// pipeline never falls back to the static type in that case.
pub trait TypeDiscriminator: Send + Sync {
    /// The map key holding the discriminator.
    #[inline]
    fn type_key(&self) -> &str {
        "$type"
    }

    /// The map key holding the payload.
    #[inline]
    fn value_key(&self) -> &str {
        "$value"
    }

    /// The discriminator of a concrete type, `None` to encode it plainly.
    fn resolve_discriminator(
        &self,
        meta: &TypeMeta,
        registry: &TypeRegistry,
    ) -> Result<Option<StableId>, RegistryError>;

    /// The concrete type named by `discriminator`.
    fn resolve_type(&self, discriminator: &str, registry: &TypeRegistry) -> Option<Arc<TypeMeta>>;
}

/// The built-in [`TypeDiscriminator`], backed by the registry's stable identifiers.
///
/// Types registered without an identifier opt out and are encoded plainly.
#[derive(Debug, Clone)]
pub struct TypeDiscriminatorPlugin {
    type_key: Cow<'static, str>,
    value_key: Cow<'static, str>,
}

impl TypeDiscriminatorPlugin {
    /// Uses the `$type` and `$value` keys.
    #[inline]
    pub const fn new() -> Self {
        Self {
            type_key: Cow::Borrowed("$type"),
            value_key: Cow::Borrowed("$value"),
        }
    }

    /// Uses custom keys.
    ///
    /// # Panics
    ///
    /// Panics if both keys are equal.
    pub fn with_keys(
        type_key: impl Into<Cow<'static, str>>,
        value_key: impl Into<Cow<'static, str>>,
    ) -> Self {
        let type_key = type_key.into();
        let value_key = value_key.into();
        assert_ne!(type_key, value_key, "discriminator keys must differ");
        Self {
            type_key,
            value_key,
        }
    }
}

impl Default for TypeDiscriminatorPlugin {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl TypeDiscriminator for TypeDiscriminatorPlugin {
    #[inline]
    fn type_key(&self) -> &str {
        &self.type_key
    }

    #[inline]
    fn value_key(&self) -> &str {
        &self.value_key
    }

    fn resolve_discriminator(
        &self,
        meta: &TypeMeta,
        registry: &TypeRegistry,
    ) -> Result<Option<StableId>, RegistryError> {
        registry.resolve_stable_id(meta)
    }

    fn resolve_type(&self, discriminator: &str, registry: &TypeRegistry) -> Option<Arc<TypeMeta>> {
        registry.resolve_id(discriminator)
    }
}

impl Plugin for TypeDiscriminatorPlugin {
    fn name(&self) -> &'static str {
        "type_discriminator"
    }

    #[inline]
    fn as_type_discriminator(&self) -> Option<&dyn TypeDiscriminator> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{TypeDiscriminator, TypeDiscriminatorPlugin};
    use crate::registry::TypeRegistry;

    #[test]
    fn resolves_through_the_registry() {
        let registry = TypeRegistry::new();
        let plugin = TypeDiscriminatorPlugin::new();

        let meta = plugin.resolve_type("i32", &registry).unwrap();
        assert_eq!(meta.type_name(), "i32");

        let id = plugin.resolve_discriminator(&meta, &registry).unwrap();
        assert_eq!(id.as_deref(), Some("i32"));

        assert!(plugin.resolve_type("nope", &registry).is_none());
    }

    #[test]
    fn custom_keys() {
        let plugin = TypeDiscriminatorPlugin::with_keys("kind", "data");
        assert_eq!(plugin.type_key(), "kind");
        assert_eq!(plugin.value_key(), "data");
    }

    #[test]
    #[should_panic = "discriminator keys must differ"]
    fn equal_keys() {
        TypeDiscriminatorPlugin::with_keys("same", "same");
    }
}
