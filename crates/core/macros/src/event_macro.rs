//! Implementation of the `Eventful` derive macro.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Index, Member};

/// Implements the Eventful derive macro.
pub fn derive_eventful_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let member = registry_member(input)?;

    Ok(quote! {
        impl #impl_generics ::eventful::Eventful for #name #ty_generics #where_clause {
            fn event_registry(&self) -> &::eventful::EventRegistry {
                ::eventful::Eventful::event_registry(&self.#member)
            }
        }

        impl #impl_generics ::eventful::AsEventful for #name #ty_generics #where_clause {
            fn composes_events() -> bool {
                true
            }

            fn as_eventful(&self) -> ::core::option::Option<&dyn ::eventful::Eventful> {
                ::core::option::Option::Some(self)
            }
        }
    })
}

/// Finds the single field marked `#[eventful]`.
fn registry_member(input: &DeriveInput) -> syn::Result<Member> {
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Eventful can only be derived for structs",
            ))
        }
    };

    let mut found = None;
    for (index, field) in fields.iter().enumerate() {
        let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("eventful")) else {
            continue;
        };
        attr.meta.require_path_only()?;

        if found.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "only one field may be marked #[eventful]",
            ));
        }
        found = Some(match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(index)),
        });
    }

    found.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            "Eventful needs a field marked #[eventful] holding an EventRegistry or another Eventful type",
        )
    })
}
