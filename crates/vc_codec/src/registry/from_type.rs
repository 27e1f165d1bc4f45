/// Builds a [`TypeTrait`] for the type `T`.
///
/// Used by `#[derive(GetTypeMeta)]` to fill the capability table passed to
/// [`TypeMeta::insert_trait`].
///
/// # Example
///
/// ```
/// # use vc_codec::registry::{TypeMeta, TypeTraitDefault, FromType};
/// let mut meta = TypeMeta::of::<String>();
///
/// meta.insert_trait::<TypeTraitDefault>(FromType::<String>::from_type());
/// ```
///
/// [`TypeTrait`]: crate::registry::TypeTrait
/// [`TypeMeta::insert_trait`]: crate::registry::TypeMeta::insert_trait
pub trait FromType<T> {
    fn from_type() -> Self;
}
