use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};
use syn::{DeriveInput, Ident, WherePredicate, parse_quote, spanned::Spanned};

use crate::attributes::TypeMetaAttributes;

#[inline(always)]
fn empty() -> TokenStream {
    TokenStream::new()
}

#[inline]
fn is_generic(ast: &DeriveInput) -> bool {
    ast.generics.type_params().next().is_some() || ast.generics.const_params().next().is_some()
}

/// Generate implementation code for `GetTypeMeta` trait.
///
/// For generic types, every inserted capability becomes a `where` bound
/// (`TypeTraitX: FromType<Self>`) instead of an error inside the body.
pub(crate) fn impl_trait_get_type_meta(
    ast: &DeriveInput,
    attrs: &TypeMetaAttributes,
    vc_codec_path: &syn::Path,
) -> TokenStream {
    let get_type_meta_ = crate::path::get_type_meta_(vc_codec_path);
    let type_meta_ = crate::path::type_meta_(vc_codec_path);
    let type_registry_ = crate::path::type_registry_(vc_codec_path);
    let from_type_ = crate::path::from_type_(vc_codec_path);

    let outer_ = Ident::new("__outer", Span::call_site());

    let mut capabilities: Vec<(Span, TokenStream)> = Vec::with_capacity(attrs.trait_count());
    if let Some(span) = attrs.serialize {
        capabilities.push((span, crate::path::type_trait_serialize_(vc_codec_path)));
    }
    if let Some(span) = attrs.deserialize {
        capabilities.push((span, crate::path::type_trait_deserialize_(vc_codec_path)));
    }
    if let Some(span) = attrs.default {
        capabilities.push((span, crate::path::type_trait_default_(vc_codec_path)));
    }
    if let Some(span) = attrs.erasure {
        capabilities.push((span, crate::path::type_trait_erasure_(vc_codec_path)));
    }
    for extra_path in &attrs.type_traits {
        capabilities.push((extra_path.span(), quote!(#extra_path)));
    }

    let trait_counter = capabilities.len();

    let insert_traits = capabilities.iter().map(|(span, type_trait_)| {
        quote_spanned! { *span =>
            #type_meta_::insert_trait::<#type_trait_>(&mut #outer_, #from_type_::<Self>::from_type());
        }
    });

    let stable_id = match &attrs.id {
        Some(id) => quote! {
            const STABLE_ID: ::core::option::Option<&'static str> = ::core::option::Option::Some(#id);
        },
        None => empty(),
    };

    let register_deps = if attrs.nested.is_empty() {
        empty()
    } else {
        let nested = attrs.nested.iter().map(|ty| {
            quote_spanned! { ty.span() =>
                #type_registry_::register::<#ty>(__registry);
            }
        });
        quote! {
            fn register_dependencies(__registry: &#type_registry_) {
                #(#nested)*
            }
        }
    };

    let mut generics = ast.generics.clone();
    if is_generic(ast) {
        let where_clause = generics.make_where_clause();
        for param in ast.generics.type_params() {
            let ident = &param.ident;
            where_clause
                .predicates
                .push(parse_quote!(#ident: ::core::marker::Send + ::core::marker::Sync + 'static));
        }
        for (_, type_trait_) in &capabilities {
            let predicate: WherePredicate = parse_quote!(#type_trait_: #from_type_<Self>);
            where_clause.predicates.push(predicate);
        }
    }

    let real_ident = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    quote! {
        impl #impl_generics #get_type_meta_ for #real_ident #ty_generics #where_clause {
            #stable_id

            fn get_type_meta() -> #type_meta_ {
                let mut #outer_ = #type_meta_::with_capacity::<Self>(#trait_counter);
                #(#insert_traits)*
                #outer_
            }

            #register_deps
        }
    }
}

/// Generate `auto_register` implementation
#[cfg(feature = "auto_register")]
pub(crate) fn get_auto_register_impl(
    ast: &DeriveInput,
    attrs: &TypeMetaAttributes,
    vc_codec_path: &syn::Path,
) -> TokenStream {
    if let Some(span) = attrs.auto_register {
        // Invalid for generic types.
        if is_generic(ast) {
            return empty();
        }

        let auto_register_ = crate::path::auto_register_(vc_codec_path);
        let real_ident = &ast.ident;

        quote_spanned! { span =>
            #auto_register_::inventory::submit!{
                #auto_register_::__AutoRegisterFunc(
                    <#real_ident as #auto_register_::__RegisterType>::__register
                )
            }
        }
    } else {
        empty()
    }
}

/// Generate `auto_register` implementation
#[cfg(not(feature = "auto_register"))]
pub(crate) fn get_auto_register_impl(
    _: &DeriveInput,
    _: &TypeMetaAttributes,
    _: &syn::Path,
) -> TokenStream {
    empty()
}
