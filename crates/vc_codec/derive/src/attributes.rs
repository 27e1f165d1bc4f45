//! Parsing of `#[type_meta(...)]`.

use proc_macro2::Span;
use syn::meta::ParseNestedMeta;
use syn::parse::Parse;
use syn::{Attribute, Generics, LitStr, Path, Token, Type, parenthesized};

use crate::TYPE_META_ATTRIBUTE_NAME;

/// The content of every `#[type_meta(...)]` on a type.
///
/// Flags record the span they were written at, so generated code points
/// back to the attribute when a bound is not met.
#[derive(Default)]
pub(crate) struct TypeMetaAttributes {
    pub id: Option<LitStr>,
    pub serialize: Option<Span>,
    pub deserialize: Option<Span>,
    pub default: Option<Span>,
    pub erasure: Option<Span>,
    pub namespace: Option<Span>,
    pub auto_register: Option<Span>,
    pub nested: Vec<Type>,
    pub type_traits: Vec<Path>,
}

fn set_flag(slot: &mut Option<Span>, span: Span, name: &str) -> syn::Result<()> {
    if slot.is_some() {
        return Err(syn::Error::new(span, format!("duplicate `{name}` flag")));
    }
    *slot = Some(span);
    Ok(())
}

impl TypeMetaAttributes {
    /// Parse every `#[type_meta(...)]` in `attrs`, others are ignored.
    pub fn parse_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut this = Self::default();
        for attr in attrs {
            if attr.path().is_ident(TYPE_META_ATTRIBUTE_NAME) {
                attr.parse_nested_meta(|meta| this.parse_meta(meta))?;
            }
        }
        Ok(this)
    }

    fn parse_meta(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        let Some(ident) = meta.path.get_ident() else {
            return Err(meta.error("expected an identifier"));
        };

        let span = ident.span();

        match ident.to_string().as_str() {
            "id" => {
                if self.id.is_some() {
                    return Err(meta.error("duplicate `id`"));
                }
                let id: LitStr = meta.value()?.parse()?;
                if id.value().is_empty() {
                    return Err(syn::Error::new(id.span(), "stable id cannot be empty"));
                }
                self.id = Some(id);
            }
            "serialize" => set_flag(&mut self.serialize, span, "serialize")?,
            "deserialize" => set_flag(&mut self.deserialize, span, "deserialize")?,
            "serde" => {
                set_flag(&mut self.serialize, span, "serialize")?;
                set_flag(&mut self.deserialize, span, "deserialize")?;
            }
            "default" => set_flag(&mut self.default, span, "default")?,
            "erasure" => set_flag(&mut self.erasure, span, "erasure")?,
            "namespace" => set_flag(&mut self.namespace, span, "namespace")?,
            "auto_register" => set_flag(&mut self.auto_register, span, "auto_register")?,
            "nested" => {
                let content;
                parenthesized!(content in meta.input);
                let types = content.parse_terminated(Type::parse, Token![,])?;
                self.nested.extend(types);
            }
            "type_trait" => {
                let path: Path = meta.value()?.parse()?;
                self.type_traits.push(path);
            }
            _ => {
                return Err(meta.error(format!(
                    "unknown `{TYPE_META_ATTRIBUTE_NAME}` attribute `{ident}`"
                )));
            }
        }
        Ok(())
    }

    /// Reject combinations that cannot be registered soundly.
    pub fn validity(&self, generics: &Generics) -> syn::Result<()> {
        if let Some(id) = &self.id {
            if let Some(span) = self.namespace {
                return Err(syn::Error::new(
                    span,
                    "a namespace cannot declare a stable id, give it to the nested types instead",
                ));
            }
            if generics.type_params().next().is_some() || generics.const_params().next().is_some() {
                return Err(syn::Error::new(
                    id.span(),
                    "a generic type cannot declare a stable id, register each instantiation with `register_as`",
                ));
            }
        }
        if let Some(span) = self.namespace
            && self.nested.is_empty()
        {
            return Err(syn::Error::new(span, "a namespace needs `nested(..)` types"));
        }
        Ok(())
    }

    /// Number of capabilities inserted into the generated `TypeMeta`.
    pub fn trait_count(&self) -> usize {
        [self.serialize, self.deserialize, self.default, self.erasure]
            .iter()
            .filter(|flag| flag.is_some())
            .count()
            + self.type_traits.len()
    }
}
