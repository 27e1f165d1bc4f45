use alloc::boxed::Box;

use crate::context::CodingContext;
use crate::erasure::{TaggedRepresentation, TypeErasure};
use crate::registry::FromType;
use crate::{CodecError, Portable};

/// Converts a registered container through the type-erasure bridge.
///
/// The pipeline falls back to it for values without native serialization,
/// provided the unsafe serialization plugin is active.
#[derive(Clone)]
pub struct TypeTraitErasure {
    to_tagged: fn(&dyn Portable, &CodingContext) -> Option<Result<TaggedRepresentation, CodecError>>,
    from_tagged: fn(TaggedRepresentation, &CodingContext) -> Result<Box<dyn Portable>, CodecError>,
}

fn to_tagged<T: TypeErasure + Portable>(
    value: &dyn Portable,
    ctx: &CodingContext,
) -> Option<Result<TaggedRepresentation, CodecError>> {
    Some(value.downcast_ref::<T>()?.to_tagged(ctx))
}

fn from_tagged<T: TypeErasure + Portable>(
    repr: TaggedRepresentation,
    ctx: &CodingContext,
) -> Result<Box<dyn Portable>, CodecError> {
    Ok(Box::new(T::from_tagged(repr, ctx)?))
}

impl TypeTraitErasure {
    /// The tagged representation of `value`, `None` if it is not of the registered type.
    #[inline]
    pub fn to_tagged(
        &self,
        value: &dyn Portable,
        ctx: &CodingContext,
    ) -> Option<Result<TaggedRepresentation, CodecError>> {
        (self.to_tagged)(value, ctx)
    }

    /// Rebuilds a value of the registered type.
    #[inline]
    pub fn from_tagged(
        &self,
        repr: TaggedRepresentation,
        ctx: &CodingContext,
    ) -> Result<Box<dyn Portable>, CodecError> {
        (self.from_tagged)(repr, ctx)
    }
}

impl<T: TypeErasure + Portable> FromType<T> for TypeTraitErasure {
    fn from_type() -> Self {
        Self {
            to_tagged: to_tagged::<T>,
            from_tagged: from_tagged::<T>,
        }
    }
}
