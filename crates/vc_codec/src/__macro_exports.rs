//! Items referenced by the output of `#[derive(GetTypeMeta)]`.

pub use serde;

#[cfg(feature = "auto_register")]
pub mod auto_register {
    pub use inventory;

    use crate::registry::{GetTypeMeta, TypeRegistry};

    pub struct __AutoRegisterFunc(pub fn(&TypeRegistry));

    inventory::collect!(__AutoRegisterFunc);

    pub trait __RegisterType {
        fn __register(registry: &TypeRegistry);
    }

    impl<T: GetTypeMeta> __RegisterType for T {
        #[inline]
        fn __register(registry: &TypeRegistry) {
            registry.register::<T>();
        }
    }

    // Always submitted, so a non-empty iteration proves the platform works.
    fn __avail(_: &TypeRegistry) {}

    inventory::submit! { __AutoRegisterFunc(__avail) }

    /// Runs every submitted registration, returns how many ran.
    pub(crate) fn __register_types(registry: &TypeRegistry) -> usize {
        inventory::iter::<__AutoRegisterFunc>
            .into_iter()
            .map(|func| (func.0)(registry))
            .count()
    }
}
