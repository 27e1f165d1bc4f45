use alloc::boxed::Box;

use crate::Portable;
use crate::registry::FromType;

/// Builds a default value of a registered type.
///
/// Used by the bridge containers' own `Default` and available to callers
/// that need a value of a type only known by its [`StableId`](crate::StableId).
#[derive(Clone)]
pub struct TypeTraitDefault {
    func: fn() -> Box<dyn Portable>,
}

impl TypeTraitDefault {
    /// Call the underlying function pointer to create a default value.
    #[inline(always)]
    pub fn default(&self) -> Box<dyn Portable> {
        (self.func)()
    }
}

impl<T: Default + Portable> FromType<T> for TypeTraitDefault {
    fn from_type() -> Self {
        Self {
            func: || -> Box<dyn Portable> { Box::new(T::default()) },
        }
    }
}
