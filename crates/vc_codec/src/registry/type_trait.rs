use core::any::Any;

/// A capability attached to a registered type, stored in its [`TypeMeta`].
///
/// Capabilities are plain values, usually a table of function pointers
/// built by [`FromType`]. They are looked up by their own type:
///
/// ```
/// use vc_codec::registry::{TypeMeta, TypeTraitDefault, FromType};
///
/// let mut meta = TypeMeta::of::<String>();
/// meta.insert_trait::<TypeTraitDefault>(FromType::<String>::from_type());
///
/// let value = meta.get_trait::<TypeTraitDefault>().unwrap().default();
/// assert_eq!(value.downcast_ref::<String>(), Some(&String::new()));
/// ```
///
/// Implemented for every `Clone + Send + Sync + 'static` type.
///
/// [`TypeMeta`]: crate::registry::TypeMeta
/// [`FromType`]: crate::registry::FromType
pub trait TypeTrait: Any + Send + Sync {
    fn clone_type_trait(&self) -> alloc::boxed::Box<dyn TypeTrait>;
}

impl<T: Clone + Any + Send + Sync> TypeTrait for T {
    #[inline]
    fn clone_type_trait(&self) -> alloc::boxed::Box<dyn TypeTrait> {
        alloc::boxed::Box::new(self.clone())
    }
}

impl dyn TypeTrait {
    /// Returns `true` if the underlying value is of type `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    #[inline]
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        (self as &mut dyn Any).downcast_mut::<T>()
    }
}

impl core::fmt::Debug for dyn TypeTrait {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("TypeTrait")
    }
}
