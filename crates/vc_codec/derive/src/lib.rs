//! See [`GetTypeMeta`](derive_get_type_meta).
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::std_instead_of_core, reason = "proc-macro lib")]
#![allow(clippy::std_instead_of_alloc, reason = "proc-macro lib")]

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

static TYPE_META_ATTRIBUTE_NAME: &str = "type_meta";

// -----------------------------------------------------------------------------
// Modules

mod attributes;
mod impls;
mod path;

// -----------------------------------------------------------------------------
// Macros

/// # Derive GetTypeMeta Trait
///
/// `#[derive(GetTypeMeta)]` implements `GetTypeMeta`, the registration
/// information a `TypeRegistry` stores for a type.
///
/// Only the capabilities declared with `#[type_meta(...)]` are inserted,
/// the macro cannot tell which traits a type implements.
///
/// ## Stable Identifier
///
/// ```rust, ignore
/// #[derive(GetTypeMeta)]
/// #[type_meta(id = "shapes.circle")]
/// struct Circle { r: f32 }
/// ```
///
/// Without `id`, the type can still be registered (and looked up by its
/// `TypeId`), but it cannot appear behind a type discriminator.
/// Generic types cannot declare an identifier: every instantiation would
/// claim the same one.
///
/// ## Capabilities
///
/// - `serialize`: `serde::Serialize`, inserts `TypeTraitSerialize`
/// - `deserialize`: `serde::de::DeserializeOwned`, inserts `TypeTraitDeserialize`
/// - `serde`: both of the above
/// - `default`: `Default`, inserts `TypeTraitDefault`
/// - `erasure`: `TypeErasure`, inserts `TypeTraitErasure`
/// - `type_trait = Path`: any `TypeTrait` implementing `FromType<Self>`,
///   can be repeated
///
/// ```rust, ignore
/// #[derive(GetTypeMeta, Serialize, Deserialize, Default, Clone, PartialEq, Debug)]
/// #[type_meta(id = "hero.stats", serde, default, type_trait = TypeTraitDescribe)]
/// struct Stats { hp: u32 }
/// ```
///
/// ## Namespaces
///
/// A namespace registers other types along with itself. It cannot declare
/// an identifier of its own.
///
/// ```rust, ignore
/// #[derive(GetTypeMeta)]
/// #[type_meta(namespace, nested(Circle, Square))]
/// struct Shapes;
/// ```
///
/// `nested(..)` is also accepted outside of a namespace, to register the
/// types a type depends on.
///
/// ## Automatic Registration
///
/// With the `auto_register` feature, `#[type_meta(auto_register)]` submits
/// the type to `TypeRegistry::auto_register`. It has no effect on generic types.
#[proc_macro_derive(GetTypeMeta, attributes(type_meta))]
pub fn derive_get_type_meta(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    let attrs = match attributes::TypeMetaAttributes::parse_attrs(&ast.attrs) {
        Ok(v) => v,
        Err(err) => return err.into_compile_error().into(),
    };

    if let Err(err) = attrs.validity(&ast.generics) {
        return err.into_compile_error().into();
    }

    let vc_codec_path = path::vc_codec();

    let get_type_meta = impls::impl_trait_get_type_meta(&ast, &attrs, &vc_codec_path);
    let auto_register = impls::get_auto_register_impl(&ast, &attrs, &vc_codec_path);

    quote::quote! {
        #get_type_meta
        #auto_register
    }
    .into()
}
