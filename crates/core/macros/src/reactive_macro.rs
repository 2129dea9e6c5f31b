//! Implementation of the `Reactive` derive macro.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    parse_macro_input, Data, DeriveInput, Expr, ExprLit, Field, Fields, GenericArgument, Lit, Path,
    PathArguments, Type,
};

/// Implements the Reactive derive macro.
pub fn derive_reactive_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Reactive can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Reactive can only be derived for structs",
            ))
        }
    };

    let mut accessors = Vec::new();
    for field in fields {
        let Some(ReactiveAttr { event, scheduler }) = reactive_attr(field)? else {
            continue;
        };
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let value_ty = slot_value_type(&field.ty)?;
        let property = ident.unraw().to_string();
        let setter = format_ident!("set_{}", ident.unraw());
        let emitter = match scheduler {
            Some(path) => quote! {
                ::eventful::ReactiveEmit::new(#event).with_scheduler(#path())
            },
            None => quote! { ::eventful::ReactiveEmit::new(#event) },
        };

        accessors.push(quote! {
            /// Reads the reactive property.
            pub fn #ident(&self) -> #value_ty {
                self.#ident.get()
            }

            /// Writes the reactive property and defers its change event.
            pub fn #setter(self: &::std::rc::Rc<Self>, value: #value_ty)
            where
                Self: 'static,
            {
                self.#ident.set(value);
                #emitter.schedule(self, #property);
            }
        });
    }

    if accessors.is_empty() {
        return Err(syn::Error::new_spanned(
            name,
            "Reactive needs at least one field marked #[reactive(event = \"...\")]",
        ));
    }

    Ok(quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            #(#accessors)*
        }

        const _: () = {
            fn assert_eventful<T: ::eventful::Eventful + ::eventful::AsEventful>() {}

            #[allow(dead_code)]
            fn check #impl_generics () #where_clause {
                assert_eventful::<#name #ty_generics>();
            }
        };
    })
}

/// Parsed `#[reactive(event = "...", scheduler = path)]`.
struct ReactiveAttr {
    event: String,
    /// Function returning the `Rc<dyn Scheduler>` to defer on.
    scheduler: Option<Path>,
}

/// Reads the `#[reactive(...)]` attribute, if present.
fn reactive_attr(field: &Field) -> syn::Result<Option<ReactiveAttr>> {
    let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("reactive")) else {
        return Ok(None);
    };

    let mut event = None;
    let mut scheduler = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("event") {
            let value: Expr = meta.value()?.parse()?;
            if let Expr::Lit(ExprLit {
                lit: Lit::Str(lit), ..
            }) = value
            {
                event = Some(lit.value());
                return Ok(());
            }
            return Err(meta.error("expected a string literal event name"));
        }
        if meta.path.is_ident("scheduler") {
            scheduler = Some(meta.value()?.parse::<Path>()?);
            return Ok(());
        }
        Err(meta.error("unsupported reactive attribute"))
    })?;

    match event {
        Some(event) if !event.is_empty() => Ok(Some(ReactiveAttr { event, scheduler })),
        _ => Err(syn::Error::new_spanned(
            attr,
            "#[reactive] requires a non-empty `event = \"...\"`",
        )),
    }
}

/// Extracts `T` from a `Slot<T>` field type.
fn slot_value_type(ty: &Type) -> syn::Result<&Type> {
    if let Type::Path(path) = ty {
        if let Some(segment) = path.path.segments.last() {
            if segment.ident == "Slot" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return Ok(inner);
                    }
                }
            }
        }
    }
    Err(syn::Error::new_spanned(
        ty,
        "reactive fields must be declared as `Slot<T>`",
    ))
}
