//! Derive macros for Formwire state trees
//!
//! # Available Macros
//!
//! - `#[derive(Enrich)]` - Implements `formwire_core::enrich::Enrich` by
//!   enriching every field of a struct or enum variant
//!
//! # Example
//!
//! ```ignore
//! use formwire_core::enrich::{Field, enrich};
//! use formwire_core::field_path;
//! use formwire_core::message::FieldMessagePath;
//! use formwire_macros::Enrich;
//!
//! #[derive(Enrich, Clone, Debug)]
//! struct AddressForm {
//!     #[enrich(path_part)]
//!     path_part: FieldMessagePath,
//!     street: Field<String>,
//!     zip: Field<String>,
//!     #[enrich(skip)]
//!     draft_id: u64,
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, GenericParam, parse_macro_input, parse_quote};

/// Derive macro for state-tree nodes
///
/// Generates `formwire_core::enrich::Enrich` for a struct or enum. Each
/// field is enriched with the same context, so the type behaves as a plain
/// composite unless one field is marked as its path part.
///
/// # Attributes
///
/// - `#[enrich(path_part)]` - This field holds the node's own path part
///   (`FieldMessagePath` or `Option<FieldMessagePath>`); the other fields are
///   enriched under the extended prefix
/// - `#[enrich(skip)]` - Clone this field instead of enriching it
///
/// Every type parameter gets an `Enrich` bound.
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to a union
/// - More than one field in a struct or variant is `#[enrich(path_part)]`
/// - A field is both `path_part` and `skip`
/// - An `#[enrich(...)]` option is unknown
///
/// # Example
///
/// ```ignore
/// #[derive(Enrich, Clone, Debug)]
/// enum Payment {
///     Card { number: Field<String>, expiry: Field<String> },
///     Invoice(Field<String>),
///     Cash,
/// }
/// ```
#[proc_macro_derive(Enrich, attributes(enrich))]
pub fn derive_enrich(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_enrich(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// How a field takes part in enrichment
#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldRole {
    Enrich,
    PathPart,
    Skip,
}

fn expand_enrich(mut input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = input.ident.clone();

    for param in &mut input.generics.params {
        if let GenericParam::Type(type_param) = param {
            type_param
                .bounds
                .push(parse_quote!(::formwire_core::enrich::Enrich));
        }
    }
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (enrich_body, addresses_body) = match &input.data {
        Data::Struct(data_struct) => {
            let arm = expand_fields(&quote!(Self), &data_struct.fields)?;
            let (pattern, enrich, addresses) = (arm.pattern, arm.enrich, arm.addresses);
            (
                quote! {
                    let #pattern = self;
                    #enrich
                },
                quote! {
                    let #pattern = self;
                    #addresses
                },
            )
        },
        Data::Enum(data_enum) => {
            let mut enrich_arms = Vec::new();
            let mut addresses_arms = Vec::new();
            for variant in &data_enum.variants {
                let variant_name = &variant.ident;
                let arm = expand_fields(&quote!(Self::#variant_name), &variant.fields)?;
                let (pattern, enrich, addresses) = (arm.pattern, arm.enrich, arm.addresses);
                enrich_arms.push(quote! { #pattern => { #enrich } });
                addresses_arms.push(quote! { #pattern => { #addresses } });
            }
            (
                quote! {
                    match self {
                        #(#enrich_arms)*
                    }
                },
                quote! {
                    match self {
                        #(#addresses_arms)*
                    }
                },
            )
        },
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "#[derive(Enrich)] can only be used on structs and enums",
            ));
        },
    };

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::formwire_core::enrich::Enrich for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn enrich(&self, formwire_ctx: &::formwire_core::enrich::EnrichContext<'_>) -> Self {
                #enrich_body
            }

            #[allow(unused_variables)]
            fn addresses(
                &self,
                formwire_prefix: &::formwire_core::message::FieldMessagePath,
                formwire_out: &mut ::std::vec::Vec<::formwire_core::message::FieldMessagePath>,
            ) {
                #addresses_body
            }
        }
    })
}

/// Generated code for one struct body or enum variant
struct FieldsArm {
    pattern: TokenStream2,
    enrich: TokenStream2,
    addresses: TokenStream2,
}

fn expand_fields(path: &TokenStream2, fields: &Fields) -> syn::Result<FieldsArm> {
    let mut bindings = Vec::new();
    let mut roles = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let binding = field
            .ident
            .clone()
            .unwrap_or_else(|| format_ident!("field_{}", index));
        roles.push(field_role(&field.attrs)?);
        bindings.push(binding);
    }

    let mut path_parts = bindings
        .iter()
        .zip(&roles)
        .filter(|(_, role)| **role == FieldRole::PathPart)
        .map(|(binding, _)| binding);
    let path_part = path_parts.next();
    if let Some(extra) = path_parts.next() {
        return Err(syn::Error::new(
            extra.span(),
            "only one field may be marked #[enrich(path_part)]",
        ));
    }

    let values = bindings.iter().zip(&roles).map(|(binding, role)| match role {
        FieldRole::Enrich => {
            quote! { ::formwire_core::enrich::Enrich::enrich(#binding, formwire_scope) }
        },
        FieldRole::PathPart | FieldRole::Skip => {
            quote! { ::core::clone::Clone::clone(#binding) }
        },
    });
    let enriched_bindings = bindings
        .iter()
        .zip(&roles)
        .filter(|(_, role)| **role == FieldRole::Enrich)
        .map(|(binding, _)| binding);

    let (ctx_setup, prefix_setup) = match path_part {
        Some(part) => (
            quote! {
                let formwire_scope =
                    &formwire_ctx.within(::formwire_core::enrich::AsPathPart::as_path_part(#part));
            },
            quote! {
                let formwire_scope = &match ::formwire_core::enrich::AsPathPart::as_path_part(#part) {
                    ::core::option::Option::Some(part) => formwire_prefix.join(part),
                    ::core::option::Option::None => ::core::clone::Clone::clone(formwire_prefix),
                };
            },
        ),
        None => (
            quote! { let formwire_scope = formwire_ctx; },
            quote! { let formwire_scope = formwire_prefix; },
        ),
    };

    let (pattern, construct) = match fields {
        Fields::Named(_) => (
            quote! { #path { #(#bindings),* } },
            quote! { #path { #(#bindings: #values),* } },
        ),
        Fields::Unnamed(_) => (
            quote! { #path ( #(#bindings),* ) },
            quote! { #path ( #(#values),* ) },
        ),
        Fields::Unit => (quote! { #path }, quote! { #path }),
    };

    Ok(FieldsArm {
        pattern,
        enrich: quote! {
            #ctx_setup
            #construct
        },
        addresses: quote! {
            #prefix_setup
            #( ::formwire_core::enrich::Enrich::addresses(#enriched_bindings, formwire_scope, formwire_out); )*
        },
    })
}

fn field_role(attrs: &[Attribute]) -> syn::Result<FieldRole> {
    let mut role = FieldRole::Enrich;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("enrich")) {
        attr.parse_nested_meta(|meta| {
            let requested = if meta.path.is_ident("path_part") {
                FieldRole::PathPart
            } else if meta.path.is_ident("skip") {
                FieldRole::Skip
            } else {
                return Err(meta.error("expected `path_part` or `skip`"));
            };
            if role != FieldRole::Enrich && role != requested {
                return Err(meta.error("a field cannot be both `path_part` and `skip`"));
            }
            role = requested;
            Ok(())
        })?;
    }
    Ok(role)
}
