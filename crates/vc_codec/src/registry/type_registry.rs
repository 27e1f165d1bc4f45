use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::TypeId;
use core::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hashbrown::hash_map::Entry;

use crate::RegistryError;
use crate::hash::{FixedHashState, HashMap, HashSet};
use crate::registry::{GetTypeMeta, StableId, TypeMeta, TypeTrait};

// -----------------------------------------------------------------------------
// TypeRegistry

struct Tables {
    metas: HashMap<TypeId, Arc<TypeMeta>>,
    id_to_type: HashMap<StableId, TypeId>,
    type_to_id: HashMap<TypeId, StableId>,
    name_to_type: HashMap<&'static str, TypeId>,
    ambiguous_names: HashSet<&'static str>,
}

impl Tables {
    // The type must not be registered yet.
    fn add_type_name(&mut self, meta: &TypeMeta) {
        let name = short_type_name(meta.type_name());
        if self.ambiguous_names.contains(name) {
            return;
        }
        if self.name_to_type.remove(name).is_some() {
            self.ambiguous_names.insert(name);
        } else {
            self.name_to_type.insert(name, meta.type_id());
        }
    }
}

/// The last path segment of a type name, without generic arguments:
/// `Vec` for `alloc::vec::Vec<u8>`.
///
/// This is the name `serde` derives report for a type.
pub(crate) fn short_type_name(type_name: &'static str) -> &'static str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

/// A registry of types and their stable identifiers.
///
/// This struct is the central store the pipeline resolves types through.
/// [Registering] a type stores its [`TypeMeta`], generated from its
/// [`GetTypeMeta`] implementation, and, when the type has a stable
/// identifier, adds it to the identifier tables. Within one registry the
/// mapping between identifiers and types is a bijection.
///
/// The registry is append-only and safe to share between threads, usually
/// as an `Arc<TypeRegistry>` handed to every codec. Every operation takes the
/// same lock for the duration of a table access only.
///
/// # Example
///
/// ```
/// use vc_codec::registry::{TypeRegistry, TypeTraitDefault};
///
/// let registry = TypeRegistry::new();
///
/// let meta = registry.resolve_id("string").unwrap();
/// let value = meta.get_trait::<TypeTraitDefault>().unwrap().default();
///
/// assert_eq!(value.downcast_ref::<String>(), Some(&String::new()));
/// assert_eq!(registry.stable_id_of::<String>().unwrap().unwrap(), "string");
/// ```
///
/// [Registering]: TypeRegistry::register
pub struct TypeRegistry {
    tables: RwLock<Tables>,
    #[cfg(feature = "auto_register")]
    auto_registered: core::sync::atomic::AtomicBool,
}

impl Default for TypeRegistry {
    /// See [`TypeRegistry::new`] .
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create an empty [`TypeRegistry`].
    #[inline]
    pub const fn empty() -> Self {
        Self {
            tables: RwLock::new(Tables {
                metas: HashMap::with_hasher(FixedHashState),
                id_to_type: HashMap::with_hasher(FixedHashState),
                type_to_id: HashMap::with_hasher(FixedHashState),
                name_to_type: HashMap::with_hasher(FixedHashState),
                ambiguous_names: HashSet::with_hasher(FixedHashState),
            }),
            #[cfg(feature = "auto_register")]
            auto_registered: core::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Create a type registry with default registrations.
    ///
    /// - `()` `bool` `char` `String`
    /// - `i8 - i128` `u8 - u128` `f32` `f64`
    /// - the type-erasure bridge containers
    ///   [`AnyArray`](crate::erasure::AnyArray), [`AnySet`](crate::erasure::AnySet),
    ///   [`AnyMap`](crate::erasure::AnyMap), [`AnyOption`](crate::erasure::AnyOption)
    ///   and [`AnyResult`](crate::erasure::AnyResult)
    ///
    /// Primitives are identified by their name, `String` by `"string"`, the
    /// containers by `"vc.array"`, `"vc.set"`, `"vc.map"`, `"vc.optional"`
    /// and `"vc.result"`.
    pub fn new() -> Self {
        use crate::erasure::{AnyArray, AnyMap, AnyOption, AnyResult, AnySet};

        let registry = Self::empty();
        registry.register::<()>();
        registry.register::<bool>();
        registry.register::<char>();
        registry.register::<u8>();
        registry.register::<u16>();
        registry.register::<u32>();
        registry.register::<u64>();
        registry.register::<u128>();
        registry.register::<i8>();
        registry.register::<i16>();
        registry.register::<i32>();
        registry.register::<i64>();
        registry.register::<i128>();
        registry.register::<f32>();
        registry.register::<f64>();
        registry.register::<String>();
        registry.register::<AnyArray>();
        registry.register::<AnySet>();
        registry.register::<AnyMap>();
        registry.register::<AnyOption>();
        registry.register::<AnyResult>();
        registry
    }

    #[inline]
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Returns `true` if the metadata of `T` was not registered yet.
    //
    // The lock is released before the dependencies of `T` are registered.
    fn insert<T: GetTypeMeta>(&self, id: Option<StableId>) -> Result<bool, RegistryError> {
        let type_id = TypeId::of::<T>();

        {
            let tables = self.read();
            let known = tables.metas.contains_key(&type_id);
            let identified = match &id {
                Some(id) => tables.type_to_id.get(&type_id) == Some(id),
                None => true,
            };
            if known && identified {
                return Ok(false);
            }
        }

        let meta = Arc::new(T::get_type_meta());

        let fresh = {
            let mut tables = self.write();

            if let Some(id) = &id {
                if let Some(other) = tables.id_to_type.get(id)
                    && *other != type_id
                {
                    return Err(RegistryError::IdentifierCollision {
                        id: id.clone(),
                        existing: tables.metas.get(other).map_or("?", |meta| meta.type_name()),
                        incoming: meta.type_name(),
                    });
                }
                if let Some(existing) = tables.type_to_id.get(&type_id)
                    && existing != id
                {
                    return Err(RegistryError::AlreadyIdentified {
                        type_name: meta.type_name(),
                        existing: existing.clone(),
                        requested: id.clone(),
                    });
                }
                tables.id_to_type.insert(id.clone(), type_id);
                tables.type_to_id.insert(type_id, id.clone());
            }

            match tables.metas.entry(type_id) {
                Entry::Vacant(entry) => {
                    entry.insert(meta.clone());
                    tables.add_type_name(&meta);
                    true
                }
                Entry::Occupied(_) => false,
            }
        };

        if fresh {
            log::trace!("registered `{}` as {:?}", core::any::type_name::<T>(), id);
            T::register_dependencies(self);
        }
        Ok(fresh)
    }

    /// Registers the type `T` with the stable identifier it declares, if any.
    ///
    /// This also registers the dependencies of `T` as specified by
    /// [`GetTypeMeta::register_dependencies`], the nested types of a
    /// namespace included. Re-registering a type is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if another type is already registered under the same identifier.
    /// See [`try_register`](Self::try_register) for the fallible version.
    ///
    /// # Example
    ///
    /// ```
    /// use serde::{Deserialize, Serialize};
    /// use vc_codec::{derive::GetTypeMeta, registry::TypeRegistry};
    ///
    /// #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    /// #[type_meta(id = "point", serde)]
    /// struct Point { x: i32, y: i32 }
    ///
    /// let registry = TypeRegistry::empty();
    /// registry.register::<Point>();
    /// registry.register::<Point>();
    ///
    /// assert!(registry.contains_id("point"));
    /// assert_eq!(registry.len(), 1);
    /// ```
    #[track_caller]
    pub fn register<T: GetTypeMeta>(&self) {
        if let Err(error) = self.try_register::<T>() {
            panic!("{error}");
        }
    }

    /// Like [`register`](Self::register), but returns an error on identifier collision.
    pub fn try_register<T: GetTypeMeta>(&self) -> Result<(), RegistryError> {
        self.insert::<T>(T::STABLE_ID.map(StableId::from)).map(|_| ())
    }

    /// Registers the type `T` under an explicit stable identifier.
    ///
    /// This is for types that cannot declare their own identifier, such as
    /// foreign types.
    ///
    /// # Panics
    ///
    /// Panics if `T` declares its own identifier, if `T` is already
    /// registered under another identifier, or if another type is already
    /// registered under `id`.
    #[track_caller]
    pub fn register_as<T: GetTypeMeta>(&self, id: impl Into<StableId>) {
        if let Err(error) = self.try_register_as::<T>(id) {
            panic!("{error}");
        }
    }

    /// Like [`register_as`](Self::register_as), but returns an error instead of panicking.
    pub fn try_register_as<T: GetTypeMeta>(&self, id: impl Into<StableId>) -> Result<(), RegistryError> {
        let id = id.into();
        if let Some(declared) = T::STABLE_ID {
            return Err(RegistryError::SelfIdentified {
                type_name: core::any::type_name::<T>(),
                declared: declared.into(),
                requested: id,
            });
        }
        self.insert::<T>(Some(id)).map(|_| ())
    }

    /// Registers every non-generic type annotated with `#[type_meta(auto_register)]`.
    ///
    /// Equivalent to calling [`register`](Self::register) for each of them.
    /// Repeated calls are cheap.
    ///
    /// Returns `true` if automatic registration is supported on the current
    /// platform. It relies on the `inventory` crate, which covers Linux,
    /// macOS, Windows, iOS, Android and Web. Without the `auto_register`
    /// feature this does nothing and returns `false`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use serde::{Deserialize, Serialize};
    /// use vc_codec::{derive::GetTypeMeta, registry::TypeRegistry};
    ///
    /// #[derive(GetTypeMeta, Serialize, Deserialize, Clone, PartialEq, Debug)]
    /// #[type_meta(id = "coin", serde, auto_register)]
    /// struct Coin(u32);
    ///
    /// let registry = TypeRegistry::empty();
    /// assert!(registry.auto_register());
    /// assert!(registry.contains_id("coin"));
    /// ```
    pub fn auto_register(&self) -> bool {
        #[cfg(feature = "auto_register")]
        {
            use core::sync::atomic::Ordering;

            if self.auto_registered.load(Ordering::Acquire) {
                return true;
            }
            // At least the crate's own marker runs when the platform is supported.
            let count = crate::__macro_exports::auto_register::__register_types(self);
            if count == 0 {
                log::warn!("automatic type registration is not supported on this platform");
                return false;
            }
            log::trace!("auto registration ran {count} functions");
            self.auto_registered.store(true, Ordering::Release);
            true
        }
        #[cfg(not(feature = "auto_register"))]
        {
            false
        }
    }

    /// Returns the type registered under `id`.
    ///
    /// An unknown identifier is not an error, callers decide how to treat it.
    pub fn resolve_id(&self, id: &str) -> Option<Arc<TypeMeta>> {
        let tables = self.read();
        let type_id = tables.id_to_type.get(id)?;
        tables.metas.get(type_id).cloned()
    }

    /// Returns the identifier the type is registered under, if any.
    pub fn stable_id(&self, type_id: TypeId) -> Option<StableId> {
        self.read().type_to_id.get(&type_id).cloned()
    }

    fn resolve_stable_id_inner(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        declared: Option<&'static str>,
    ) -> Result<Option<StableId>, RegistryError> {
        if let Some(id) = self.stable_id(type_id) {
            return Ok(Some(id));
        }
        match declared {
            Some(id) => Err(RegistryError::FailedToResolveIdentifier {
                type_name,
                id: id.into(),
            }),
            None => Ok(None),
        }
    }

    /// Returns the stable identifier of a type.
    ///
    /// - `Ok(Some(id))`: the type is registered with an identifier.
    /// - `Ok(None)`: the type legitimately has no identifier.
    /// - `Err(FailedToResolveIdentifier)`: the type declares an identifier
    ///   but is not registered here.
    pub fn resolve_stable_id(&self, meta: &TypeMeta) -> Result<Option<StableId>, RegistryError> {
        self.resolve_stable_id_inner(meta.type_id(), meta.type_name(), meta.declared_id())
    }

    /// See [`resolve_stable_id`](Self::resolve_stable_id).
    ///
    /// ```
    /// use vc_codec::{RegistryError, registry::TypeRegistry};
    ///
    /// let registry = TypeRegistry::empty();
    /// assert!(matches!(
    ///     registry.stable_id_of::<i32>(),
    ///     Err(RegistryError::FailedToResolveIdentifier { .. }),
    /// ));
    ///
    /// registry.register::<i32>();
    /// assert_eq!(registry.stable_id_of::<i32>().unwrap().unwrap(), "i32");
    /// assert_eq!(registry.stable_id_of::<Vec<i32>>(), Ok(None));
    /// ```
    pub fn stable_id_of<T: GetTypeMeta>(&self) -> Result<Option<StableId>, RegistryError> {
        self.resolve_stable_id_inner(TypeId::of::<T>(), core::any::type_name::<T>(), T::STABLE_ID)
    }

    /// Whether the type with given [`TypeId`] has been registered in this registry.
    #[inline]
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.read().metas.contains_key(&type_id)
    }

    #[inline]
    pub fn contains_id(&self, id: &str) -> bool {
        self.read().id_to_type.contains_key(id)
    }

    /// The number of registered types.
    #[inline]
    pub fn len(&self) -> usize {
        self.read().metas.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read().metas.is_empty()
    }

    #[inline]
    pub fn get<T: 'static>(&self) -> Option<Arc<TypeMeta>> {
        self.get_by_type_id(TypeId::of::<T>())
    }

    /// Returns the [`TypeMeta`] of the type with the given [`TypeId`].
    pub fn get_by_type_id(&self, type_id: TypeId) -> Option<Arc<TypeMeta>> {
        self.read().metas.get(&type_id).cloned()
    }

    /// Returns the [`TypeMeta`] of the type with the given short name, the
    /// last segment of its path without generic arguments.
    ///
    /// If the name is ambiguous, or if no type with this name has been
    /// registered, returns `None`.
    ///
    /// ```
    /// use vc_codec::registry::TypeRegistry;
    ///
    /// let registry = TypeRegistry::new();
    /// registry.register::<Vec<u8>>();
    /// registry.register::<Vec<i8>>();
    ///
    /// assert!(registry.get_with_type_name("String").is_some());
    /// assert!(registry.get_with_type_name("Vec").is_none());
    /// assert!(registry.is_ambiguous("Vec"));
    /// ```
    pub fn get_with_type_name(&self, type_name: &str) -> Option<Arc<TypeMeta>> {
        let tables = self.read();
        let type_id = tables.name_to_type.get(type_name)?;
        tables.metas.get(type_id).cloned()
    }

    /// Returns `true` if the given short type name matches several registered types.
    #[inline]
    pub fn is_ambiguous(&self, type_name: &str) -> bool {
        self.read().ambiguous_names.contains(type_name)
    }

    /// Returns a copy of the [`TypeTrait`] of type `C` registered for the given type.
    pub fn get_type_trait<C: TypeTrait + Clone>(&self, type_id: TypeId) -> Option<C> {
        self.read().metas.get(&type_id)?.get_trait::<C>().cloned()
    }

    /// Returns an iterator over a snapshot of the registered [`TypeMeta`]s,
    /// in no particular order.
    ///
    /// Types registered while iterating are not visited.
    pub fn iter(&self) -> alloc::vec::IntoIter<Arc<TypeMeta>> {
        let snapshot: Vec<_> = self.read().metas.values().cloned().collect();
        snapshot.into_iter()
    }

    /// Enumerates every registered type offering the capability `C`.
    ///
    /// ```
    /// use vc_codec::registry::{TypeRegistry, TypeTraitErasure};
    ///
    /// let registry = TypeRegistry::new();
    /// let mut ids: Vec<_> = registry
    ///     .iter_with_trait::<TypeTraitErasure>()
    ///     .filter_map(|(meta, _)| meta.declared_id())
    ///     .collect();
    /// ids.sort();
    ///
    /// assert_eq!(ids, ["vc.array", "vc.map", "vc.optional", "vc.result", "vc.set"]);
    /// ```
    pub fn iter_with_trait<C: TypeTrait + Clone>(&self) -> impl Iterator<Item = (Arc<TypeMeta>, C)> {
        self.iter().filter_map(|meta| {
            let type_trait = meta.get_trait::<C>()?.clone();
            Some((meta, type_trait))
        })
    }

    /// Every registered identifier, sorted.
    pub fn ids(&self) -> Vec<StableId> {
        let mut ids: Vec<_> = self.read().id_to_type.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use core::any::TypeId;
    use std::thread;

    use super::TypeRegistry;
    use crate::RegistryError;
    use crate::registry::{FromType, GetTypeMeta, TypeMeta, TypeTraitDefault};

    #[derive(Default, Clone, PartialEq, Debug)]
    struct Left;

    #[derive(Default, Clone, PartialEq, Debug)]
    struct Right;

    #[derive(Default, Clone, PartialEq, Debug)]
    struct Anonymous;

    impl GetTypeMeta for Left {
        const STABLE_ID: Option<&'static str> = Some("side");

        fn get_type_meta() -> TypeMeta {
            TypeMeta::of::<Self>()
        }
    }

    impl GetTypeMeta for Right {
        const STABLE_ID: Option<&'static str> = Some("side");

        fn get_type_meta() -> TypeMeta {
            TypeMeta::of::<Self>()
        }
    }

    impl GetTypeMeta for Anonymous {
        fn get_type_meta() -> TypeMeta {
            let mut meta = TypeMeta::of::<Self>();
            meta.insert_trait::<TypeTraitDefault>(FromType::<Self>::from_type());
            meta
        }

        fn register_dependencies(registry: &TypeRegistry) {
            registry.register::<Left>();
        }
    }

    #[test]
    fn bijection() {
        let registry = TypeRegistry::new();
        for id in registry.ids() {
            let meta = registry.resolve_id(&id).unwrap();
            assert_eq!(registry.resolve_stable_id(&meta).unwrap(), Some(id));
        }
        assert!(registry.resolve_id("missing").is_none());
    }

    #[test]
    #[should_panic = "already taken"]
    fn collision_fails_fast() {
        let registry = TypeRegistry::empty();
        registry.register::<Left>();
        registry.register::<Right>();
    }

    #[test]
    fn collision_as_error() {
        let registry = TypeRegistry::empty();
        registry.register::<Left>();
        let error = registry.try_register::<Right>().unwrap_err();
        assert!(matches!(error, RegistryError::IdentifierCollision { .. }));
        // the first registration is intact
        assert!(registry.resolve_id("side").unwrap().is::<Left>());
        assert!(!registry.contains(TypeId::of::<Right>()));
    }

    #[test]
    fn explicit_identifiers() {
        let registry = TypeRegistry::empty();
        registry.register::<Anonymous>();
        assert_eq!(registry.stable_id_of::<Anonymous>(), Ok(None));
        // dependencies come along
        assert!(registry.contains_id("side"));

        registry.register_as::<Anonymous>("anon");
        registry.register_as::<Anonymous>("anon");
        assert_eq!(registry.stable_id_of::<Anonymous>().unwrap().unwrap(), "anon");

        assert!(matches!(
            registry.try_register_as::<Anonymous>("other"),
            Err(RegistryError::AlreadyIdentified { .. })
        ));
        assert!(matches!(
            registry.try_register_as::<Left>("left"),
            Err(RegistryError::SelfIdentified { .. })
        ));
    }

    #[test]
    fn stale_registry() {
        let registry = TypeRegistry::empty();
        let meta = Left::get_type_meta();
        assert!(matches!(
            registry.resolve_stable_id(&meta),
            Err(RegistryError::FailedToResolveIdentifier { .. })
        ));
        assert_eq!(registry.resolve_stable_id(&Anonymous::get_type_meta()), Ok(None));
    }

    #[test]
    fn iteration_is_a_snapshot() {
        let registry = TypeRegistry::empty();
        registry.register::<Left>();
        let iter = registry.iter();
        registry.register::<Anonymous>();
        assert_eq!(iter.count(), 1);
        assert_eq!(registry.iter().count(), 2);

        let defaults: Vec<_> = registry.iter_with_trait::<TypeTraitDefault>().collect();
        assert_eq!(defaults.len(), 1);
        assert!(defaults[0].0.is::<Anonymous>());
    }

    #[test]
    fn concurrent_registration() {
        let registry = Arc::new(TypeRegistry::empty());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    registry.register::<Anonymous>();
                    registry.register::<i32>();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.ids().len(), 2);
    }
}
