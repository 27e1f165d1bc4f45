use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::plugin::{KeyNotFoundRecovery, Plugin, TypeDiscriminator};
use crate::plugin::{KeyNotFoundRecoveryPlugin, TypeDiscriminatorPlugin, UnsafeSerializationPlugin};

// -----------------------------------------------------------------------------
// PluginSet

/// A small set of plugin indices, used to suppress plugins for one nesting level.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PluginSet(u64);

impl PluginSet {
    /// The maximum number of plugins a [`Configuration`] can hold.
    pub const CAPACITY: usize = u64::BITS as usize;

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn contains(self, index: usize) -> bool {
        index < Self::CAPACITY && self.0 & (1 << index) != 0
    }

    #[inline]
    pub const fn with(self, index: usize) -> Self {
        debug_assert!(index < Self::CAPACITY);
        Self(self.0 | (1 << index))
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries((0..Self::CAPACITY).filter(|index| self.contains(*index)))
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Configuration

/// The ordered list of active [`Plugin`]s.
///
/// A configuration is cheap to clone and shared by every nested call of an
/// encode or decode operation. Capability lookups return the first plugin
/// offering the capability, so when several discriminator plugins are
/// present only the first one is used.
///
/// # Example
///
/// ```
/// use vc_codec::context::Configuration;
///
/// let config = Configuration::new()
///     .with_type_discriminator()
///     .with_key_not_found_recovery();
///
/// assert!(config.type_discriminator().is_some());
/// assert!(config.key_not_found_recovery().is_some());
/// assert!(!config.allows_unsafe_serialization());
/// ```
#[derive(Clone, Default)]
pub struct Configuration {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Configuration {
    /// Create a configuration without any plugin.
    #[inline]
    pub const fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Append a plugin.
    ///
    /// # Panics
    ///
    /// Panics if the configuration already holds [`PluginSet::CAPACITY`] plugins.
    pub fn with_plugin(self, plugin: impl Plugin) -> Self {
        self.with_shared_plugin(Arc::new(plugin))
    }

    /// Append a plugin instance that may be shared with other configurations.
    pub fn with_shared_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        assert!(
            self.plugins.len() < PluginSet::CAPACITY,
            "a configuration holds at most {} plugins",
            PluginSet::CAPACITY,
        );
        self.plugins.push(plugin);
        self
    }

    /// Enables polymorphic-slot tagging, see [`TypeDiscriminatorPlugin`].
    #[inline]
    pub fn with_type_discriminator(self) -> Self {
        self.with_plugin(TypeDiscriminatorPlugin::new())
    }

    /// Enables default substitution on missing fields, see [`KeyNotFoundRecoveryPlugin`].
    #[inline]
    pub fn with_key_not_found_recovery(self) -> Self {
        self.with_plugin(KeyNotFoundRecoveryPlugin)
    }

    /// Enables the type-erasure bridge fallback, see [`UnsafeSerializationPlugin`].
    #[inline]
    pub fn with_unsafe_serialization(self) -> Self {
        self.with_plugin(UnsafeSerializationPlugin)
    }

    #[inline]
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// The first plugin offering the type discriminator capability, with its index.
    pub fn type_discriminator(&self) -> Option<(usize, &dyn TypeDiscriminator)> {
        self.plugins
            .iter()
            .enumerate()
            .find_map(|(index, plugin)| Some((index, plugin.as_type_discriminator()?)))
    }

    /// The first plugin offering the key-not-found recovery capability, with its index.
    pub fn key_not_found_recovery(&self) -> Option<(usize, &dyn KeyNotFoundRecovery)> {
        self.plugins
            .iter()
            .enumerate()
            .find_map(|(index, plugin)| Some((index, plugin.as_key_not_found_recovery()?)))
    }

    /// The index of the first plugin authorizing the type-erasure bridge fallback.
    pub fn unsafe_serialization(&self) -> Option<usize> {
        self.plugins
            .iter()
            .position(|plugin| plugin.allows_unsafe_serialization())
    }

    #[inline]
    pub fn allows_unsafe_serialization(&self) -> bool {
        self.unsafe_serialization().is_some()
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|plugin| plugin.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Configuration, PluginSet};

    #[test]
    fn plugin_set() {
        let set = PluginSet::empty().with(0).with(5);
        assert!(set.contains(0));
        assert!(set.contains(5));
        assert!(!set.contains(1));
        assert!(!set.contains(200));
        assert!(PluginSet::empty().is_empty());
    }

    #[test]
    fn capability_lookup_follows_order() {
        let config = Configuration::new()
            .with_unsafe_serialization()
            .with_key_not_found_recovery()
            .with_type_discriminator();

        assert_eq!(config.len(), 3);
        assert_eq!(config.unsafe_serialization(), Some(0));
        assert_eq!(config.key_not_found_recovery().map(|(index, _)| index), Some(1));
        assert_eq!(config.type_discriminator().map(|(index, _)| index), Some(2));

        let empty = Configuration::new();
        assert!(empty.type_discriminator().is_none());
        assert!(!empty.allows_unsafe_serialization());
    }

    #[test]
    fn debug_lists_names() {
        let config = Configuration::new().with_type_discriminator();
        assert_eq!(format!("{config:?}"), r#"["type_discriminator"]"#);
    }
}
