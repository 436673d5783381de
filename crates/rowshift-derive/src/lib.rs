//! Derive macro for rowshift record metadata.
//!
//! This crate provides the `#[derive(Record)]` macro, which exposes a struct's
//! fields to the descriptor provider in `rowshift-core` together with
//! pre-built accessor functions for every field.

use proc_macro::TokenStream;
use proc_macro2::{Delimiter, Spacing, TokenStream as TokenStream2, TokenTree};
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident, LitBool, LitStr, Type};

/// Derives the `Record` trait for a struct with named fields.
///
/// # Attributes
///
/// - `#[record(name = "DisplayName")]` - Overrides the record type's display
///   name (optional, defaults to the struct name)
///
/// # Field Attributes
///
/// - `#[record(id)]` - Marks the field as the record identifier. The store
///   generates the identifier when the record does not carry one.
/// - `#[record(id(auto_generated = false))]` - Marks the field as an
///   identifier the caller must always supply.
///
/// Without an explicit `id` attribute the descriptor provider falls back to
/// conventional identifier names (`id`, `Id`, `ID`, `_id`, `<type>_id`).
///
/// # Generated Items
///
/// For a struct `User`, this macro generates an implementation of
/// `rowshift_core::descriptor::Record` whose `fields()` lists every field in
/// declaration order, each with its declared type, `TypeId` and a pair of
/// `&dyn Any` accessors.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_record_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_record_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record derive does not support generic structs",
        ));
    }

    let type_name = get_record_name(&input.attrs, struct_name)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record derive only supports structs",
            ));
        }
    };

    let mut field_infos: Vec<FieldInfo> = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attrs = parse_field_attrs(&field.attrs)?;
        field_infos.push(FieldInfo {
            ident: ident.clone(),
            field_type: field.ty.clone(),
            name: ident.unraw().to_string(),
            id: attrs.id,
        });
    }

    let getters: Vec<Ident> = (0..field_infos.len())
        .map(|i| format_ident!("__rowshift_get_{}", i))
        .collect();
    let setters: Vec<Ident> = (0..field_infos.len())
        .map(|i| format_ident!("__rowshift_get_mut_{}", i))
        .collect();

    let accessor_fns: Vec<TokenStream2> = field_infos
        .iter()
        .zip(getters.iter().zip(setters.iter()))
        .map(|(info, (getter, setter))| {
            let ident = &info.ident;
            quote! {
                fn #getter(
                    record: &dyn ::std::any::Any,
                ) -> ::std::option::Option<&dyn ::std::any::Any> {
                    record
                        .downcast_ref::<#struct_name>()
                        .map(|r| &r.#ident as &dyn ::std::any::Any)
                }

                fn #setter(
                    record: &mut dyn ::std::any::Any,
                ) -> ::std::option::Option<&mut dyn ::std::any::Any> {
                    record
                        .downcast_mut::<#struct_name>()
                        .map(|r| &mut r.#ident as &mut dyn ::std::any::Any)
                }
            }
        })
        .collect();

    let field_entries: Vec<TokenStream2> = field_infos
        .iter()
        .zip(getters.iter().zip(setters.iter()))
        .map(|(info, (getter, setter))| {
            let name = &info.name;
            let field_type = &info.field_type;
            let declared_type = render_type(quote!(#field_type));
            let id_token = match info.id {
                Some(auto_generated) => quote! {
                    ::std::option::Option::Some(::rowshift_core::descriptor::IdAnnotation {
                        auto_generated: #auto_generated,
                    })
                },
                None => quote! { ::std::option::Option::None },
            };

            quote! {
                ::rowshift_core::descriptor::FieldInfo {
                    name: #name,
                    declared_type: #declared_type,
                    type_id: ::std::any::TypeId::of::<#field_type>(),
                    id: #id_token,
                    get: #getter,
                    get_mut: #setter,
                }
            }
        })
        .collect();

    let expanded = quote! {
        const _: () = {
            #(#accessor_fns)*

            impl ::rowshift_core::descriptor::Record for #struct_name {
                fn type_name() -> &'static str {
                    #type_name
                }

                fn fields() -> ::std::vec::Vec<::rowshift_core::descriptor::FieldInfo> {
                    ::std::vec![#(#field_entries),*]
                }
            }
        };
    };

    Ok(expanded)
}

struct FieldInfo {
    ident: Ident,
    field_type: Type,
    name: String,
    /// `Some(auto_generated)` when the field carries `#[record(id)]`.
    id: Option<bool>,
}

struct FieldAttrs {
    id: Option<bool>,
}

fn get_record_name(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<String> {
    let mut record_name = None;
    for attr in attrs {
        if attr.path().is_ident("record") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    record_name = Some(value.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported record attribute, expected `name`"))
                }
            })?;
        }
    }
    Ok(record_name.unwrap_or_else(|| struct_name.unraw().to_string()))
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs { id: None };

    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if !meta.path.is_ident("id") {
                return Err(meta.error("unsupported record field attribute, expected `id`"));
            }

            let mut auto_generated = true;
            if meta.input.peek(syn::token::Paren) {
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("auto_generated") {
                        let value: LitBool = inner.value()?.parse()?;
                        auto_generated = value.value;
                        Ok(())
                    } else {
                        Err(inner.error("unsupported id option, expected `auto_generated`"))
                    }
                })?;
            }
            result.id = Some(auto_generated);
            Ok(())
        })?;
    }

    Ok(result)
}

/// Renders type tokens as source text, with spaces only where Rust needs
/// them (`&'static str`, `dyn Any + Send`, `HashMap<String, i64>`).
fn render_type(tokens: TokenStream2) -> String {
    let mut out = String::new();
    render_tokens(tokens, &mut out);
    out.trim_end().to_string()
}

fn render_tokens(tokens: TokenStream2, out: &mut String) {
    let mut after_word = false;
    for token in tokens {
        match token {
            TokenTree::Ident(_) | TokenTree::Literal(_) => {
                if after_word {
                    out.push(' ');
                }
                out.push_str(&token.to_string());
                after_word = true;
            }
            TokenTree::Punct(punct) => {
                match punct.as_char() {
                    ',' | ';' => {
                        out.push(punct.as_char());
                        out.push(' ');
                    }
                    '+' | '=' => {
                        out.push(' ');
                        out.push(punct.as_char());
                        out.push(' ');
                    }
                    '-' if punct.spacing() == Spacing::Joint => out.push_str(" -"),
                    '>' if out.ends_with(" -") => out.push_str("> "),
                    c => out.push(c),
                }
                after_word = false;
            }
            TokenTree::Group(group) => {
                let (open, close) = match group.delimiter() {
                    Delimiter::Parenthesis => ("(", ")"),
                    Delimiter::Bracket => ("[", "]"),
                    Delimiter::Brace => ("{", "}"),
                    Delimiter::None => ("", ""),
                };
                if after_word && group.delimiter() == Delimiter::None {
                    out.push(' ');
                }
                out.push_str(open);
                render_tokens(group.stream(), out);
                let trimmed = out.trim_end().len();
                out.truncate(trimmed);
                out.push_str(close);
                after_word = group.delimiter() == Delimiter::None;
            }
        }
    }
}
