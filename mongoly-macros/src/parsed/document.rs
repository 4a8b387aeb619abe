use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::parse::Parse;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Attribute, Data, DeriveInput, Error, Fields, Ident, LitStr, Path, Result, Token, Type};

use super::field::ParsedField;

pub(crate) struct ParsedDocument {
    name: Ident,
    extends: Option<Type>,
    merge_with: Vec<Path>,
    omit: Option<Vec<String>>,
    pick: Option<Vec<String>>,
    rename: Vec<(String, String)>,
    collection: Option<String>,
    verbatim_naming: bool,
    drop_old_indexes: bool,
    fields: Vec<ParsedField>,
}

impl ParsedDocument {
    pub(crate) fn from_input(input: &DeriveInput) -> Result<Self> {
        if !input.generics.params.is_empty() {
            return Err(Error::new(
                input.generics.span(),
                "Document cannot be derived for generic types",
            ));
        }

        let mut parsed = Self {
            name: input.ident.clone(),
            extends: None,
            merge_with: Vec::new(),
            omit: None,
            pick: None,
            rename: Vec::new(),
            collection: None,
            verbatim_naming: false,
            drop_old_indexes: false,
            fields: Vec::new(),
        };

        for attr in &input.attrs {
            if attr.path().is_ident("mongoly") {
                parsed.parse_container_attr(attr)?;
            }
        }
        if parsed.omit.is_some() && parsed.pick.is_some() {
            return Err(Error::new(input.ident.span(), "`pick` and `omit` are mutually exclusive"));
        }

        parsed.fields = match &input.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(named) => {
                    let mut fields = Vec::new();
                    for field in &named.named {
                        if let Some(field) = ParsedField::from_field(field)? {
                            fields.push(field);
                        }
                    }
                    fields
                }
                Fields::Unit => Vec::new(),
                Fields::Unnamed(_) => return Err(Error::new(input.ident.span(), "Document requires named fields")),
            },
            _ => return Err(Error::new(input.ident.span(), "Document can only be derived for structs")),
        };

        Ok(parsed)
    }

    fn parse_container_attr(&mut self, attr: &Attribute) -> Result<()> {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("extends") {
                if self.extends.is_some() {
                    return Err(meta.error("a document extends at most one parent"));
                }
                self.extends = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("merge_with") {
                self.merge_with.push(meta.value()?.parse()?);
            } else if meta.path.is_ident("omit") {
                self.omit = Some(parse_string_list(&meta)?);
            } else if meta.path.is_ident("pick") {
                self.pick = Some(parse_string_list(&meta)?);
            } else if meta.path.is_ident("rename") {
                // rename(old_name = "new_name", ...)
                meta.parse_nested_meta(|entry| {
                    let from = entry
                        .path
                        .get_ident()
                        .ok_or_else(|| entry.error("expected a field name"))?
                        .to_string();
                    let to: LitStr = entry.value()?.parse()?;
                    self.rename.push((from, to.value()));
                    Ok(())
                })?;
            } else if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                self.collection = Some(value.value());
            } else if meta.path.is_ident("naming") {
                let value: LitStr = meta.value()?.parse()?;
                self.verbatim_naming = match value.value().as_str() {
                    "snake_plural" => false,
                    "verbatim" => true,
                    other => {
                        return Err(Error::new(
                            value.span(),
                            format!("unknown naming `{other}`, expected `snake_plural` or `verbatim`"),
                        ));
                    }
                };
            } else if meta.path.is_ident("drop_old_indexes") {
                self.drop_old_indexes = true;
            } else {
                return Err(meta.error("unsupported mongoly container attribute"));
            }
            Ok(())
        })
    }

    pub(crate) fn emit(&self) -> TokenStream2 {
        let name = &self.name;
        let name_lit = LitStr::new(&name.to_string(), Span::call_site());

        let mut descriptor = Vec::new();
        if let Some(parent) = &self.extends {
            descriptor.push(quote! { .extends(<#parent as ::mongoly::Document>::describe(catalog)?) });
        }
        for source in &self.merge_with {
            descriptor.push(quote! { .merge_with(#source()) });
        }
        if let Some(omit) = &self.omit {
            let omit = string_list(omit);
            descriptor.push(quote! { .omit(#omit) });
        }
        if let Some(pick) = &self.pick {
            let pick = string_list(pick);
            descriptor.push(quote! { .pick(#pick) });
        }
        for (from, to) in &self.rename {
            descriptor.push(quote! { .rename(#from, #to) });
        }

        let mut field_specs = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match field.emit_spec() {
                Ok(spec) => field_specs.push(spec),
                Err(err) => return err.to_compile_error(),
            }
        }

        let collection_name = match &self.collection {
            Some(collection) => quote! { ::core::option::Option::Some(::std::string::String::from(#collection)) },
            None => quote! { ::core::option::Option::None },
        };
        let naming = if self.verbatim_naming {
            quote! { ::mongoly::CollectionNaming::Verbatim }
        } else {
            quote! { ::mongoly::CollectionNaming::SnakePlural }
        };
        let drop_old_indexes = self.drop_old_indexes;

        quote! {
            impl ::mongoly::Document for #name {
                const NAME: &'static str = #name_lit;

                fn describe(catalog: &mut ::mongoly::Catalog) -> ::mongoly::Result<::mongoly::ClassId> {
                    if let ::core::option::Option::Some(class) = catalog.class_of::<Self>() {
                        return ::core::result::Result::Ok(class);
                    }
                    let class = catalog.declare_type::<Self>(<Self as ::mongoly::Document>::NAME);
                    catalog.build_class(class, move |catalog| {
                        let descriptor = ::mongoly::ClassDescriptor::new() #(#descriptor)*;
                        catalog.record_class(class, descriptor);
                        #(
                            {
                                let spec = #field_specs;
                                catalog.define_field(class, spec)?;
                            }
                        )*
                        ::core::result::Result::Ok(())
                    })
                }

                fn collection_options() -> ::mongoly::CollectionOptions {
                    ::mongoly::CollectionOptions {
                        collection_name: #collection_name,
                        naming: #naming,
                        drop_old_indexes: #drop_old_indexes,
                    }
                }
            }

            ::mongoly::inventory::submit! {
                ::mongoly::DocumentRegistration {
                    type_name: #name_lit,
                    describe: <#name as ::mongoly::Document>::describe,
                    collection_options: <#name as ::mongoly::Document>::collection_options,
                }
            }
        }
    }
}

/// Parses `= ["a", "b"]`.
fn parse_string_list(meta: &ParseNestedMeta<'_>) -> Result<Vec<String>> {
    let value = meta.value()?;
    let content;
    syn::bracketed!(content in value);
    let parsed: Punctuated<LitStr, Token![,]> = content.parse_terminated(<LitStr as Parse>::parse, Token![,])?;
    Ok(parsed.into_iter().map(|lit| lit.value()).collect())
}

fn string_list(items: &[String]) -> TokenStream2 {
    quote! {
        <::std::vec::Vec<::std::string::String>>::from([#(::std::string::String::from(#items)),*])
    }
}
