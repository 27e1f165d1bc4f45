use alloc::string::String;

use crate::AnyValue;
use crate::registry::{FromType, GetTypeMeta, TypeMeta};
use crate::registry::{TypeTraitDefault, TypeTraitDeserialize, TypeTraitSerialize};

macro_rules! impl_native {
    ($($ty:ty => $id:literal),* $(,)?) => {$(
        impl GetTypeMeta for $ty {
            const STABLE_ID: Option<&'static str> = Some($id);

            fn get_type_meta() -> TypeMeta {
                let mut meta = TypeMeta::with_capacity::<Self>(3);
                meta.insert_trait::<TypeTraitDefault>(FromType::<Self>::from_type());
                meta.insert_trait::<TypeTraitSerialize>(FromType::<Self>::from_type());
                meta.insert_trait::<TypeTraitDeserialize>(FromType::<Self>::from_type());
                meta
            }
        }
    )*};
}

impl_native! {
    () => "unit",
    bool => "bool",
    char => "char",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    f32 => "f32",
    f64 => "f64",
    String => "string",
}

impl GetTypeMeta for AnyValue {
    fn get_type_meta() -> TypeMeta {
        let mut meta = TypeMeta::with_capacity::<Self>(2);
        meta.insert_trait::<TypeTraitSerialize>(FromType::<Self>::from_type());
        meta.insert_trait::<TypeTraitDeserialize>(FromType::<Self>::from_type());
        meta
    }
}
