use alloc::boxed::Box;
use core::any::{Any, TypeId};
use core::fmt;
use core::ops::Deref;

use crate::hash::{FixedHashState, HashMap};
use crate::registry::{TypeRegistry, TypeTrait};

// -----------------------------------------------------------------------------
// TypeMeta

/// Runtime metadata of a registered type: its identity, its declared stable
/// identifier and a table of [`TypeTrait`] capabilities.
///
/// The capability table is what the pipeline dispatches through: a value
/// behind an [`AnyValue`](crate::AnyValue) is encoded through the
/// [`TypeTraitSerialize`](crate::registry::TypeTraitSerialize) of its type,
/// decoded through its [`TypeTraitDeserialize`](crate::registry::TypeTraitDeserialize)
/// and so on.
///
/// Usually generated by [`#[derive(GetTypeMeta)]`](crate::derive::GetTypeMeta).
///
/// # Example
///
/// ```
/// # use vc_codec::registry::{TypeMeta, TypeTraitDefault, FromType};
/// let mut meta = TypeMeta::of::<String>();
/// meta.insert_trait::<TypeTraitDefault>(FromType::<String>::from_type());
///
/// assert_eq!(meta.declared_id(), Some("string"));
/// assert!(meta.has_trait::<TypeTraitDefault>());
/// ```
pub struct TypeMeta {
    type_id: TypeId,
    type_name: &'static str,
    declared_id: Option<&'static str>,
    trait_table: HashMap<TypeId, Box<dyn TypeTrait>>,
}

impl TypeMeta {
    /// Create an empty [`TypeMeta`] for `T`, with the stable identifier `T` declares.
    #[inline]
    pub fn of<T: GetTypeMeta>() -> Self {
        Self::with_capacity::<T>(0)
    }

    /// Create an empty [`TypeMeta`] for `T` with room for `capacity` capabilities.
    #[inline]
    pub fn with_capacity<T: GetTypeMeta>(capacity: usize) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            declared_id: T::STABLE_ID,
            trait_table: HashMap::with_capacity_and_hasher(capacity, FixedHashState),
        }
    }

    #[inline(always)]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The full type name, as given by [`core::any::type_name`].
    #[inline(always)]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The stable identifier the type declares for itself, if any.
    ///
    /// Types registered with [`TypeRegistry::register_as`] have no declared
    /// identifier, see [`TypeRegistry::resolve_stable_id`].
    #[inline(always)]
    pub const fn declared_id(&self) -> Option<&'static str> {
        self.declared_id
    }

    /// Returns `true` if this is the metadata of `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Insert a new [`TypeTrait`], replacing the previous one of the same type.
    #[inline(always)]
    pub fn insert_trait<T: TypeTrait>(&mut self, data: T) {
        self.insert_trait_by_id(TypeId::of::<T>(), Box::new(data));
    }

    #[inline(never)]
    fn insert_trait_by_id(&mut self, id: TypeId, val: Box<dyn TypeTrait>) {
        self.trait_table.insert(id, val);
    }

    /// Removes a [`TypeTrait`] from the meta.
    pub fn remove_trait<T: TypeTrait>(&mut self) -> Option<Box<T>> {
        let removed: Box<dyn Any> = self.trait_table.remove(&TypeId::of::<T>())?;
        removed.downcast::<T>().ok()
    }

    /// Get a [`TypeTrait`] reference, or return `None` if it doesn't exist.
    #[inline]
    pub fn get_trait<T: TypeTrait>(&self) -> Option<&T> {
        self.trait_table
            .get(&TypeId::of::<T>())
            .and_then(|val| val.deref().downcast_ref())
    }

    /// Return true if specific [`TypeTrait`] exists.
    #[inline]
    pub fn has_trait<T: TypeTrait>(&self) -> bool {
        self.trait_table.contains_key(&TypeId::of::<T>())
    }

    /// Return the number of [`TypeTrait`].
    #[inline]
    pub fn trait_len(&self) -> usize {
        self.trait_table.len()
    }
}

impl Clone for TypeMeta {
    fn clone(&self) -> Self {
        let mut trait_table = HashMap::with_capacity_and_hasher(self.trait_len(), FixedHashState);
        for (id, type_trait) in self.trait_table.iter() {
            trait_table.insert(*id, (**type_trait).clone_type_trait());
        }

        Self {
            trait_table,
            type_id: self.type_id,
            type_name: self.type_name,
            declared_id: self.declared_id,
        }
    }
}

impl fmt::Debug for TypeMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMeta")
            .field("type_name", &self.type_name)
            .field("declared_id", &self.declared_id)
            .field("trait_len", &self.trait_table.len())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// GetTypeMeta

/// A trait which allows a type to generate its [`TypeMeta`]
/// for registration into the [`TypeRegistry`].
///
/// # Implementation
///
/// Use [`#[derive(GetTypeMeta)]`](crate::derive::GetTypeMeta):
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use vc_codec::derive::GetTypeMeta;
/// use vc_codec::registry::{GetTypeMeta, TypeTraitSerialize};
///
/// #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
/// #[type_meta(id = "hero.name", serde)]
/// struct Name(String);
///
/// let meta = Name::get_type_meta();
/// assert_eq!(meta.declared_id(), Some("hero.name"));
/// assert!(meta.has_trait::<TypeTraitSerialize>());
/// ```
///
/// ## Namespaces
///
/// A namespace type contributes its nested types at registration time:
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use vc_codec::derive::GetTypeMeta;
/// use vc_codec::registry::TypeRegistry;
///
/// #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
/// #[type_meta(id = "shapes.circle", serde)]
/// struct Circle { r: f32 }
///
/// #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
/// #[type_meta(id = "shapes.square", serde)]
/// struct Square { side: f32 }
///
/// #[derive(GetTypeMeta)]
/// #[type_meta(namespace, nested(Circle, Square))]
/// struct Shapes;
///
/// let registry = TypeRegistry::empty();
/// registry.register::<Shapes>();
///
/// assert!(registry.resolve_id("shapes.circle").is_some());
/// assert!(registry.resolve_id("shapes.square").is_some());
/// ```
///
/// ## Manually
///
/// ```
/// use vc_codec::registry::{FromType, GetTypeMeta, TypeMeta, TypeTraitDefault};
///
/// #[derive(Default, Clone, PartialEq, Debug)]
/// struct Gold(u32);
///
/// impl GetTypeMeta for Gold {
///     const STABLE_ID: Option<&'static str> = Some("gold");
///
///     fn get_type_meta() -> TypeMeta {
///         let mut meta = TypeMeta::of::<Self>();
///         meta.insert_trait::<TypeTraitDefault>(FromType::<Self>::from_type());
///         meta
///     }
/// }
///
/// assert_eq!(Gold::get_type_meta().declared_id(), Some("gold"));
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `GetTypeMeta` so cannot provide type registration information",
    note = "consider annotating `{Self}` with `#[derive(GetTypeMeta)]`"
)]
pub trait GetTypeMeta: 'static {
    /// The stable identifier this type declares for itself.
    const STABLE_ID: Option<&'static str> = None;

    /// Returns the **default** [`TypeMeta`] for this type.
    fn get_type_meta() -> TypeMeta;

    /// Registers other types needed by this type, nested types of a
    /// namespace included. **Allow** not to register oneself.
    fn register_dependencies(_registry: &TypeRegistry) {}
}

#[cfg(test)]
mod tests {
    use super::{GetTypeMeta, TypeMeta};
    use crate::derive::GetTypeMeta;
    use crate::registry::{FromType, TypeRegistry, TypeTraitDefault};
    use crate::registry::{TypeTraitDeserialize, TypeTraitSerialize};

    #[derive(Clone)]
    struct Tag(&'static str);

    #[test]
    fn trait_table() {
        let mut meta = TypeMeta::of::<i32>();
        assert_eq!(meta.trait_len(), 0);

        meta.insert_trait(Tag("first"));
        meta.insert_trait(Tag("second"));
        meta.insert_trait::<TypeTraitDefault>(FromType::<i32>::from_type());
        assert_eq!(meta.trait_len(), 2);
        assert_eq!(meta.get_trait::<Tag>().unwrap().0, "second");

        let cloned = meta.clone();
        assert!(cloned.has_trait::<Tag>());

        assert_eq!(meta.remove_trait::<Tag>().unwrap().0, "second");
        assert!(!meta.has_trait::<Tag>());
        assert!(cloned.has_trait::<Tag>());
    }

    #[derive(Clone)]
    struct TypeTraitLabel(&'static str);

    impl<T> FromType<T> for TypeTraitLabel {
        fn from_type() -> Self {
            Self(core::any::type_name::<T>())
        }
    }

    #[derive(GetTypeMeta, serde::Serialize, Default, Clone, PartialEq, Debug)]
    #[type_meta(id = "test.labelled", serialize, default, type_trait = TypeTraitLabel)]
    struct Labelled;

    #[derive(GetTypeMeta, serde::Serialize, serde::Deserialize, Clone, PartialEq, Debug)]
    #[type_meta(serde)]
    struct Wrapper<T>(T);

    #[derive(GetTypeMeta)]
    #[type_meta(namespace, nested(Labelled, Wrapper<u8>))]
    struct Everything;

    #[test]
    fn derived_capabilities() {
        let meta = Labelled::get_type_meta();
        assert_eq!(Labelled::STABLE_ID, Some("test.labelled"));
        assert_eq!(meta.trait_len(), 3);
        assert!(meta.has_trait::<TypeTraitSerialize>());
        assert!(!meta.has_trait::<TypeTraitDeserialize>());
        assert!(meta.get_trait::<TypeTraitLabel>().unwrap().0.ends_with("Labelled"));

        let meta = Wrapper::<u8>::get_type_meta();
        assert_eq!(Wrapper::<u8>::STABLE_ID, None);
        assert!(meta.has_trait::<TypeTraitDeserialize>());

        let registry = TypeRegistry::empty();
        registry.register::<Everything>();
        assert!(registry.contains_id("test.labelled"));
        assert!(registry.get::<Wrapper<u8>>().is_some());
        assert!(registry.get::<Wrapper<u16>>().is_none());
    }

    #[test]
    fn identity() {
        let meta = i32::get_type_meta();
        assert!(meta.is::<i32>());
        assert_eq!(meta.type_name(), "i32");
        assert_eq!(meta.declared_id(), Some("i32"));
    }
}
