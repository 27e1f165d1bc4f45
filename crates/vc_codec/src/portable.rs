use alloc::boxed::Box;
use core::any::{Any, TypeId};
use core::fmt;

// -----------------------------------------------------------------------------
// Portable

/// The object-safe view of a value that can sit behind an [`AnyValue`].
///
/// Implemented for every `Clone + PartialEq + Debug + Send + Sync + 'static`
/// type. How the value is encoded is not part of this trait: the pipeline
/// looks the concrete type up in the [`TypeRegistry`] and dispatches through
/// the capabilities registered there.
///
/// [`TypeRegistry`]: crate::registry::TypeRegistry
pub trait Portable: Any + Send + Sync + fmt::Debug {
    fn clone_portable(&self) -> Box<dyn Portable>;

    /// Compares with a value of any type, values of different types are unequal.
    fn portable_eq(&self, other: &dyn Portable) -> bool;

    fn portable_type_name(&self) -> &'static str;
}

impl<T> Portable for T
where
    T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    #[inline]
    fn clone_portable(&self) -> Box<dyn Portable> {
        Box::new(self.clone())
    }

    fn portable_eq(&self, other: &dyn Portable) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }

    #[inline]
    fn portable_type_name(&self) -> &'static str {
        core::any::type_name::<T>()
    }
}

impl dyn Portable {
    /// The [`TypeId`] of the concrete value.
    #[inline]
    pub fn value_type_id(&self) -> TypeId {
        (self as &dyn Any).type_id()
    }

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

    /// Takes the concrete value out, or gives the box back on a type mismatch.
    pub fn downcast<T: Any>(self: Box<Self>) -> Result<Box<T>, Box<Self>> {
        if self.is::<T>() {
            let any: Box<dyn Any> = self;
            any.downcast::<T>().map_err(|_| unreachable!("type checked above"))
        } else {
            Err(self)
        }
    }
}

// -----------------------------------------------------------------------------
// AnyValue

/// A polymorphic slot: a value whose concrete type is only known at runtime.
///
/// Encoding an `AnyValue` writes a type discriminator naming the concrete
/// type (when the discriminator plugin is active), decoding reads it back and
/// rebuilds a value of that type through the [`TypeRegistry`]. Nested slots
/// (`AnyValue` holding an `AnyValue`) are unwrapped to the innermost value.
///
/// # Examples
///
/// ```
/// use vc_codec::AnyValue;
///
/// let value = AnyValue::new(AnyValue::new(7_i32));
/// assert_eq!(value.downcast_ref::<i32>(), Some(&7));
/// assert_eq!(value.type_name(), "i32");
/// assert_eq!(value, AnyValue::new(7_i32));
/// ```
///
/// [`TypeRegistry`]: crate::registry::TypeRegistry
pub struct AnyValue(Box<dyn Portable>);

impl AnyValue {
    #[inline]
    pub fn new<T: Portable>(value: T) -> Self {
        Self(Box::new(value))
    }

    #[inline]
    pub fn from_boxed(value: Box<dyn Portable>) -> Self {
        Self(value)
    }

    #[inline]
    pub fn into_boxed(self) -> Box<dyn Portable> {
        self.0
    }

    /// The held value, possibly another [`AnyValue`].
    #[inline]
    pub fn as_portable(&self) -> &dyn Portable {
        &*self.0
    }

    /// The concrete value, with nested [`AnyValue`] layers unwrapped.
    pub fn innermost(&self) -> &dyn Portable {
        let mut current = &*self.0;
        while let Some(nested) = current.downcast_ref::<AnyValue>() {
            current = &*nested.0;
        }
        current
    }

    /// Like [`innermost`](Self::innermost), by value.
    pub fn into_innermost(self) -> Box<dyn Portable> {
        let mut current = self.0;
        loop {
            match current.downcast::<AnyValue>() {
                Ok(nested) => current = nested.0,
                Err(value) => return value,
            }
        }
    }

    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.innermost().is::<T>()
    }

    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.innermost().downcast_ref::<T>()
    }

    /// Takes the concrete value out, or gives the slot back on a type mismatch.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        match self.into_innermost().downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self(value)),
        }
    }

    /// The type name of the concrete value.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.innermost().portable_type_name()
    }

    /// The [`TypeId`] of the concrete value.
    #[inline]
    pub fn value_type_id(&self) -> TypeId {
        self.innermost().value_type_id()
    }
}

impl Clone for AnyValue {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone_portable())
    }
}

impl PartialEq for AnyValue {
    fn eq(&self, other: &Self) -> bool {
        self.innermost().portable_eq(other.innermost())
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyValue").field(&self.innermost()).finish()
    }
}

impl From<Box<dyn Portable>> for AnyValue {
    #[inline]
    fn from(value: Box<dyn Portable>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::{AnyValue, Portable};

    #[test]
    fn portable_equality_needs_the_same_type() {
        let a: &dyn Portable = &1_i32;
        let b: &dyn Portable = &1_i64;
        assert!(a.portable_eq(&1_i32));
        assert!(!a.portable_eq(b));
    }

    #[test]
    fn downcast_gives_the_slot_back() {
        let value = AnyValue::new(String::from("abc"));
        let value = value.downcast::<i32>().unwrap_err();
        assert_eq!(value.downcast::<String>().unwrap(), "abc");
    }

    #[test]
    fn nested_layers_are_transparent() {
        let nested = AnyValue::new(AnyValue::new(AnyValue::new(1.5_f64)));
        assert!(nested.is::<f64>());
        assert!(nested.as_portable().is::<AnyValue>());
        assert_eq!(nested.clone(), AnyValue::new(1.5_f64));
        assert_eq!(format!("{nested:?}"), "AnyValue(1.5)");
    }
}
