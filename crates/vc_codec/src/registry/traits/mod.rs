mod default;
mod deserialize;
mod erasure;
mod serialize;

pub use default::TypeTraitDefault;
pub use deserialize::TypeTraitDeserialize;
pub use erasure::TypeTraitErasure;
pub use serialize::TypeTraitSerialize;
