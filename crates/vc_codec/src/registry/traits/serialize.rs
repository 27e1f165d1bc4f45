use crate::Portable;
use crate::registry::FromType;

/// Native `serde` serialization of a registered type.
///
/// Gives the type-erased [`erased_serde::Serialize`] view of a value, which
/// the pipeline writes through the wrapped serializer.
#[derive(Clone)]
pub struct TypeTraitSerialize {
    func: fn(&dyn Portable) -> Option<&dyn erased_serde::Serialize>,
}

fn view<T: serde::Serialize + Portable>(value: &dyn Portable) -> Option<&dyn erased_serde::Serialize> {
    value
        .downcast_ref::<T>()
        .map(|value| value as &dyn erased_serde::Serialize)
}

impl TypeTraitSerialize {
    /// The serializable view of `value`, `None` if it is not of the registered type.
    #[inline]
    pub fn get<'a>(&self, value: &'a dyn Portable) -> Option<&'a dyn erased_serde::Serialize> {
        (self.func)(value)
    }
}

impl<T: serde::Serialize + Portable> FromType<T> for TypeTraitSerialize {
    fn from_type() -> Self {
        Self { func: view::<T> }
    }
}
