use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::hash::Hash;
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Portable;
use crate::registry::{FromType, GetTypeMeta, TypeMeta, TypeRegistry};
use crate::registry::{TypeTraitDefault, TypeTraitDeserialize, TypeTraitSerialize};

fn serde_meta<T>() -> TypeMeta
where
    T: GetTypeMeta + Portable + Default + Serialize + DeserializeOwned,
{
    let mut meta = TypeMeta::with_capacity::<T>(3);
    meta.insert_trait::<TypeTraitDefault>(FromType::<T>::from_type());
    meta.insert_trait::<TypeTraitSerialize>(FromType::<T>::from_type());
    meta.insert_trait::<TypeTraitDeserialize>(FromType::<T>::from_type());
    meta
}

macro_rules! impl_sequence {
    ($($name:ident $(: $bound:path)?),* $(,)?) => {$(
        impl<T> GetTypeMeta for $name<T>
        where
            T: GetTypeMeta + Portable + Clone + PartialEq + Serialize + DeserializeOwned $(+ $bound)?,
        {
            fn get_type_meta() -> TypeMeta {
                serde_meta::<Self>()
            }

            fn register_dependencies(registry: &TypeRegistry) {
                registry.register::<T>();
            }
        }
    )*};
}

impl_sequence!(Vec, Option, BTreeSet: Ord);

impl<T> GetTypeMeta for HashSet<T>
where
    T: GetTypeMeta + Portable + Clone + Eq + Hash + Serialize + DeserializeOwned,
{
    fn get_type_meta() -> TypeMeta {
        serde_meta::<Self>()
    }

    fn register_dependencies(registry: &TypeRegistry) {
        registry.register::<T>();
    }
}

impl<T> GetTypeMeta for Box<T>
where
    T: GetTypeMeta + Portable + Clone + PartialEq + Default + Serialize + DeserializeOwned,
{
    fn get_type_meta() -> TypeMeta {
        serde_meta::<Self>()
    }

    fn register_dependencies(registry: &TypeRegistry) {
        registry.register::<T>();
    }
}

impl<K, V> GetTypeMeta for BTreeMap<K, V>
where
    K: GetTypeMeta + Portable + Clone + Ord + Serialize + DeserializeOwned,
    V: GetTypeMeta + Portable + Clone + PartialEq + Serialize + DeserializeOwned,
{
    fn get_type_meta() -> TypeMeta {
        serde_meta::<Self>()
    }

    fn register_dependencies(registry: &TypeRegistry) {
        registry.register::<K>();
        registry.register::<V>();
    }
}

impl<K, V> GetTypeMeta for HashMap<K, V>
where
    K: GetTypeMeta + Portable + Clone + Eq + Hash + Serialize + DeserializeOwned,
    V: GetTypeMeta + Portable + Clone + PartialEq + Serialize + DeserializeOwned,
{
    fn get_type_meta() -> TypeMeta {
        serde_meta::<Self>()
    }

    fn register_dependencies(registry: &TypeRegistry) {
        registry.register::<K>();
        registry.register::<V>();
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::collections::{BTreeMap, BTreeSet};
    use alloc::string::String;
    use alloc::vec::Vec;
    use std::collections::{HashMap, HashSet};

    use crate::Portable;
    use crate::registry::{TypeRegistry, TypeTraitDefault};

    #[test]
    fn generic_types_register_their_parameters() {
        let registry = TypeRegistry::empty();
        registry.register::<BTreeMap<String, Vec<Option<u8>>>>();

        assert!(registry.contains_id("string"));
        assert!(registry.contains_id("u8"));
        assert!(registry.get::<Vec<Option<u8>>>().is_some());
        assert_eq!(registry.stable_id_of::<Vec<Option<u8>>>(), Ok(None));

        let meta = registry.get::<BTreeMap<String, Vec<Option<u8>>>>().unwrap();
        let value = meta.get_trait::<TypeTraitDefault>().unwrap().default();
        assert!(value.downcast_ref::<BTreeMap<String, Vec<Option<u8>>>>().unwrap().is_empty());
    }

    #[test]
    fn std_containers_are_portable() {
        let registry = TypeRegistry::empty();
        registry.register::<HashSet<String>>();
        registry.register::<HashMap<u8, Vec<i64>>>();
        registry.register::<Box<BTreeSet<char>>>();

        assert!(registry.contains_id("char"));
        assert!(registry.get::<Vec<i64>>().is_some());
        assert!(registry.get::<BTreeSet<char>>().is_some());

        let boxed = registry
            .get::<HashMap<u8, Vec<i64>>>()
            .unwrap()
            .get_trait::<TypeTraitDefault>()
            .unwrap()
            .default();
        let value: &dyn Portable = &*boxed;
        assert_eq!(value.downcast_ref::<HashMap<u8, Vec<i64>>>(), Some(&HashMap::new()));
        assert!(value.portable_eq(&*value.clone_portable()));
    }
}
