//! `#[derive(Diffable)]` implementation
//!
//! Generates `to_value`, `set_value`, `reset` and `patch_at` for a record.
//! All paths go through `::shapediff::`, which also resolves inside the
//! crate itself thanks to `extern crate self as shapediff`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Ident, LitStr, Result};

/// One non-skipped field.
struct RecordField<'a> {
    ident: &'a Ident,
    ty: &'a syn::Type,
    /// Segment name in paths
    name: String,
}

/// Parsed `#[diff(...)]` options of one field.
#[derive(Default)]
struct FieldArgs {
    skip: bool,
    rename: Option<String>,
}

fn parse_field_args(field: &syn::Field) -> Result<FieldArgs> {
    let mut args = FieldArgs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("diff") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                args.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                args.rename = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `rename = \"...\"`"))
            }
        })?;
    }
    Ok(args)
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    let named = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Diffable can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Diffable can only be derived for structs",
            ));
        }
    };

    let mut fields = Vec::with_capacity(named.len());
    for field in named {
        let args = parse_field_args(field)?;
        if args.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = args
            .rename
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());
        fields.push(RecordField {
            ident,
            ty: &field.ty,
            name,
        });
    }

    // Generic records bound each field type, so containers keep their own
    // requirements (e.g. `Vec<T>` also needs `T: Default`)
    let mut generics = input.generics.clone();
    if generics.type_params().next().is_some() {
        let where_clause = generics.make_where_clause();
        for field in &fields {
            let ty = field.ty;
            where_clause
                .predicates
                .push(syn::parse_quote!(#ty: ::shapediff::Diffable));
        }
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let idents: Vec<&Ident> = fields.iter().map(|f| f.ident).collect();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    let count = fields.len();

    Ok(quote! {
        impl #impl_generics ::shapediff::Diffable for #name #ty_generics #where_clause {
            fn to_value(&self) -> ::shapediff::Value {
                let mut record = ::shapediff::Record::with_capacity(#count);
                #(
                    record.push(#names, ::shapediff::Diffable::to_value(&self.#idents));
                )*
                ::shapediff::Value::Record(record)
            }

            fn set_value(
                &mut self,
                value: &::shapediff::Value,
            ) -> ::core::result::Result<(), ::shapediff::ChangeError> {
                match value {
                    ::shapediff::Value::Record(record) => {
                        #(
                            match record.get(#names) {
                                ::core::option::Option::Some(field) => {
                                    ::shapediff::Diffable::set_value(&mut self.#idents, field)?
                                }
                                ::core::option::Option::None => {
                                    ::shapediff::Diffable::reset(&mut self.#idents)
                                }
                            }
                        )*
                        ::core::result::Result::Ok(())
                    }
                    ::shapediff::Value::Null => {
                        ::shapediff::Diffable::reset(self);
                        ::core::result::Result::Ok(())
                    }
                    other => ::core::result::Result::Err(
                        ::shapediff::ChangeError::shape("record", other.kind()),
                    ),
                }
            }

            fn reset(&mut self) {
                #(
                    ::shapediff::Diffable::reset(&mut self.#idents);
                )*
            }

            fn patch_at(
                &mut self,
                step: ::shapediff::Step<'_>,
            ) -> ::core::result::Result<::shapediff::PatchStatus, ::shapediff::ChangeError> {
                let field = match step.segment() {
                    ::core::option::Option::None => return step.apply(self),
                    ::core::option::Option::Some(::shapediff::Segment::Field(field)) => field.as_str(),
                    ::core::option::Option::Some(other) => {
                        return ::core::result::Result::Err(
                            ::shapediff::ChangeError::shape("field", other.kind()),
                        );
                    }
                };
                match field {
                    #(
                        #names => ::shapediff::Diffable::patch_at(&mut self.#idents, step.next()),
                    )*
                    _ => ::core::result::Result::Err(::shapediff::ChangeError::FieldNotFound {
                        field: field.to_string(),
                    }),
                }
            }
        }
    })
}
