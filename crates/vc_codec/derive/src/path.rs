//! Paths of the `vc_codec` items the generated code refers to.

use proc_macro2::TokenStream;
use quote::quote;

/// Get the access path to the `vc_codec` crate.
///
/// Resolved against the manifest of the crate being compiled, see
/// [`vc_macro_utils::Manifest::crate_path`]. Falls back to `::vc_codec`,
/// which `vc_codec` also provides for itself.
pub(crate) fn vc_codec() -> syn::Path {
    vc_macro_utils::Manifest::crate_path("vc_codec")
}

#[inline(always)]
pub(crate) fn get_type_meta_(vc_codec_path: &syn::Path) -> TokenStream {
    quote! {
        #vc_codec_path::registry::GetTypeMeta
    }
}

#[inline(always)]
pub(crate) fn type_meta_(vc_codec_path: &syn::Path) -> TokenStream {
    quote! {
        #vc_codec_path::registry::TypeMeta
    }
}

#[inline(always)]
pub(crate) fn type_registry_(vc_codec_path: &syn::Path) -> TokenStream {
    quote! {
        #vc_codec_path::registry::TypeRegistry
    }
}

#[inline(always)]
pub(crate) fn from_type_(vc_codec_path: &syn::Path) -> TokenStream {
    quote! {
        #vc_codec_path::registry::FromType
    }
}

#[inline(always)]
pub(crate) fn type_trait_serialize_(vc_codec_path: &syn::Path) -> TokenStream {
    quote! {
        #vc_codec_path::registry::TypeTraitSerialize
    }
}

#[inline(always)]
pub(crate) fn type_trait_deserialize_(vc_codec_path: &syn::Path) -> TokenStream {
    quote! {
        #vc_codec_path::registry::TypeTraitDeserialize
    }
}

#[inline(always)]
pub(crate) fn type_trait_default_(vc_codec_path: &syn::Path) -> TokenStream {
    quote! {
        #vc_codec_path::registry::TypeTraitDefault
    }
}

#[inline(always)]
pub(crate) fn type_trait_erasure_(vc_codec_path: &syn::Path) -> TokenStream {
    quote! {
        #vc_codec_path::registry::TypeTraitErasure
    }
}

#[cfg(feature = "auto_register")]
#[inline(always)]
pub(crate) fn auto_register_(vc_codec_path: &syn::Path) -> TokenStream {
    quote! {
        #vc_codec_path::__macro_exports::auto_register
    }
}
