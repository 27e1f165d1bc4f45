use alloc::boxed::Box;

use serde::de::{DeserializeOwned, Deserializer, Error};

use crate::Portable;
use crate::registry::FromType;

/// Native `serde` deserialization of a registered type.
///
/// # Example
///
/// ```
/// use vc_codec::registry::{FromType, TypeTraitDeserialize};
///
/// let func = <TypeTraitDeserialize as FromType<i32>>::from_type();
///
/// let mut deserializer = serde_json::Deserializer::from_str("12");
/// let value = func.deserialize(&mut deserializer).unwrap();
///
/// assert_eq!(value.downcast_ref::<i32>(), Some(&12));
/// ```
#[derive(Clone)]
pub struct TypeTraitDeserialize {
    func: fn(
        &mut dyn erased_serde::Deserializer<'_>,
    ) -> Result<Box<dyn Portable>, erased_serde::Error>,
}

fn build<T: DeserializeOwned + Portable>(
    deserializer: &mut dyn erased_serde::Deserializer<'_>,
) -> Result<Box<dyn Portable>, erased_serde::Error> {
    let value: T = erased_serde::deserialize(deserializer)?;
    Ok(Box::new(value))
}

impl TypeTraitDeserialize {
    /// Deserializes a value of the registered type.
    ///
    /// Errors of the deserializer keep their message.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        &self,
        deserializer: D,
    ) -> Result<Box<dyn Portable>, D::Error> {
        let mut erased = <dyn erased_serde::Deserializer>::erase(deserializer);
        (self.func)(&mut erased).map_err(D::Error::custom)
    }
}

impl<T: DeserializeOwned + Portable> FromType<T> for TypeTraitDeserialize {
    fn from_type() -> Self {
        Self { func: build::<T> }
    }
}
