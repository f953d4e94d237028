use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type, parse_macro_input};

/// Derive macro for adaptable records.
///
/// Implements `morph_api::record::Record` for a struct with named fields:
///
/// - `declare()`: one `FieldDecl` per field, in declaration order.
/// - `slot(i)` / `slot_mut(i)`: accessors for the field at position `i`.
///
/// Field attributes:
///
/// - `#[record(ignore)]` / `#[record(skip)]`: never copied, never put into overflow.
/// - `#[record(alias = "...")]`: alternate matching name. Falls back to
///   `#[serde(rename = "...")]` when present.
/// - `#[record(overflow)]`: this `Overflow` field is the overflow slot.
/// - `#[record(flatten)]`: hoist the members of an embedded record. The field
///   type may be `R`, `Box<R>`, `Option<R>` or `Option<Box<R>>` with
///   `R: Record + Default`.
/// - `#[record(read_only)]`: readable as a source, never written.
///
/// # Example
///
/// ```ignore
/// #[derive(Record, Default)]
/// pub struct PersonRow {
///     pub name: String,
///     #[record(alias = "years")]
///     pub age: i32,
///     #[record(flatten)]
///     pub address: Option<Box<Address>>,
///     pub additional_data: Overflow,
/// }
/// ```
///
/// Non-embedded field types must implement `morph_api::FieldValue`.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error().into(),
    }
}

#[derive(Default)]
struct FieldAttrs {
    ignore: bool,
    alias: Option<String>,
    overflow: bool,
    flatten: bool,
    read_only: bool,
}

/// How an embedded record is held by its parent.
enum Embedding<'a> {
    Direct(&'a Type),
    Boxed(&'a Type),
    Optional(&'a Type),
    OptionalBoxed(&'a Type),
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream, syn::Error> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record only supports structs with named fields",
                ));
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "Record only supports structs")),
    };

    let mut decl_tokens = Vec::new();
    let mut slot_arms = Vec::new();
    let mut slot_mut_arms = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
        let field_name_str = field_name.unraw().to_string();
        let field_ty = &field.ty;
        let attrs = parse_field_attrs(field)?;

        let mut decl = if attrs.flatten {
            if attrs.overflow {
                return Err(syn::Error::new_spanned(
                    field_name,
                    "a flattened field cannot be the overflow slot",
                ));
            }
            let embedding = embedding_of(field_ty);
            let (inner, optional) = match embedding {
                Embedding::Direct(t) | Embedding::Boxed(t) => (t, false),
                Embedding::Optional(t) | Embedding::OptionalBoxed(t) => (t, true),
            };
            let (slot, slot_mut) = embedded_accessors(field_name, &embedding);
            slot_arms.push(quote! { #index => #slot, });
            slot_mut_arms.push(quote! { #index => #slot_mut, });
            quote! { ::morph_api::record::FieldDecl::embedded::<#inner>(#field_name_str, #optional) }
        } else {
            slot_arms.push(quote! {
                #index => ::morph_api::record::Slot::Value(&self.#field_name),
            });
            slot_mut_arms.push(quote! {
                #index => ::morph_api::record::SlotMut::Value(&mut self.#field_name),
            });
            quote! { ::morph_api::record::FieldDecl::value::<#field_ty>(#field_name_str) }
        };

        if let Some(alias) = &attrs.alias {
            decl = quote! { #decl.with_alias(#alias) };
        }
        if attrs.ignore {
            decl = quote! { #decl.ignored() };
        }
        if attrs.overflow {
            decl = quote! { #decl.overflow() };
        }
        if attrs.read_only {
            decl = quote! { #decl.read_only() };
        }
        decl_tokens.push(decl);
    }

    let expanded = quote! {
        impl ::morph_api::record::Record for #name {
            fn declare() -> ::std::vec::Vec<::morph_api::record::FieldDecl> {
                ::std::vec![
                    #(#decl_tokens),*
                ]
            }

            #[allow(unreachable_patterns)]
            fn slot(&self, __index: usize) -> ::morph_api::record::Slot<'_> {
                match __index {
                    #(#slot_arms)*
                    _ => ::morph_api::record::Slot::Absent,
                }
            }

            #[allow(unreachable_patterns)]
            fn slot_mut(&mut self, __index: usize) -> ::morph_api::record::SlotMut<'_> {
                match __index {
                    #(#slot_mut_arms)*
                    _ => ::morph_api::record::SlotMut::Absent,
                }
            }
        }
    };

    Ok(TokenStream::from(expanded))
}

fn parse_field_attrs(field: &syn::Field) -> Result<FieldAttrs, syn::Error> {
    let mut attrs = FieldAttrs::default();
    let mut serde_rename: Option<String> = None;

    for attr in &field.attrs {
        if attr.path().is_ident("record") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("ignore") || meta.path.is_ident("skip") {
                    attrs.ignore = true;
                } else if meta.path.is_ident("alias") {
                    let value: LitStr = meta.value()?.parse()?;
                    attrs.alias = Some(value.value());
                } else if meta.path.is_ident("overflow") {
                    attrs.overflow = true;
                } else if meta.path.is_ident("flatten") {
                    attrs.flatten = true;
                } else if meta.path.is_ident("read_only") {
                    attrs.read_only = true;
                } else {
                    return Err(meta.error(
                        "unknown record attribute (expected ignore, skip, alias, overflow, flatten, read_only)",
                    ));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") && meta.input.peek(syn::Token![=]) {
                    let value: LitStr = meta.value()?.parse()?;
                    serde_rename = Some(value.value());
                    Ok(())
                } else {
                    skip_meta(&meta)
                }
            })?;
        }
    }

    if attrs.alias.is_none() {
        attrs.alias = serde_rename;
    }
    Ok(attrs)
}

/// Consumes the value or argument list of a serde meta item we don't read.
fn skip_meta(meta: &ParseNestedMeta<'_>) -> Result<(), syn::Error> {
    if meta.input.peek(syn::Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: TokenStream2 = content.parse()?;
    }
    Ok(())
}

fn embedding_of(ty: &Type) -> Embedding<'_> {
    if let Some(inner) = wrapped(ty, "Option") {
        return match wrapped(inner, "Box") {
            Some(boxed) => Embedding::OptionalBoxed(boxed),
            None => Embedding::Optional(inner),
        };
    }
    match wrapped(ty, "Box") {
        Some(inner) => Embedding::Boxed(inner),
        None => Embedding::Direct(ty),
    }
}

/// Returns `T` when `ty` is `wrapper<T>` (matched on the last path segment).
fn wrapped<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn embedded_accessors(field: &syn::Ident, embedding: &Embedding<'_>) -> (TokenStream2, TokenStream2) {
    match embedding {
        Embedding::Direct(_) => (
            quote! { ::morph_api::record::Slot::Nested(&self.#field) },
            quote! { ::morph_api::record::SlotMut::Nested(&mut self.#field) },
        ),
        Embedding::Boxed(_) => (
            quote! { ::morph_api::record::Slot::Nested(&*self.#field) },
            quote! { ::morph_api::record::SlotMut::Nested(&mut *self.#field) },
        ),
        Embedding::Optional(inner) => (
            quote! {
                match &self.#field {
                    ::core::option::Option::Some(__nested) => ::morph_api::record::Slot::Nested(__nested),
                    ::core::option::Option::None => ::morph_api::record::Slot::Absent,
                }
            },
            quote! {
                ::morph_api::record::SlotMut::Nested(
                    self.#field.get_or_insert_with(<#inner as ::core::default::Default>::default),
                )
            },
        ),
        Embedding::OptionalBoxed(inner) => (
            quote! {
                match &self.#field {
                    ::core::option::Option::Some(__nested) => ::morph_api::record::Slot::Nested(&**__nested),
                    ::core::option::Option::None => ::morph_api::record::Slot::Absent,
                }
            },
            quote! {
                ::morph_api::record::SlotMut::Nested(
                    &mut **self.#field.get_or_insert_with(|| {
                        ::std::boxed::Box::new(<#inner as ::core::default::Default>::default())
                    }),
                )
            },
        ),
    }
}
