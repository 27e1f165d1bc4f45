//! `GetTypeMeta` for foreign types.
//!
//! ## Implemented Menu
//!
//! - native, with their name as stable id (`String` as `"string"`):
//!     - `i8`-`i128`, `u8`-`u128`, `f32`, `f64`, `bool`, `char`, `()`, `String`
//! - generic, without stable id:
//!     - `Vec<T>`, `Option<T>`, `Box<T>`
//!     - `BTreeMap<K, V>`, `BTreeSet<T>`, `HashMap<K, V>`, `HashSet<T>`
//! - [`AnyValue`](crate::AnyValue), without stable id.

mod collections;
mod native;
