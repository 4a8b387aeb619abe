use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, Ident, LitStr, Result};

pub(crate) struct ParsedEnumeration {
    name: Ident,
    values: Vec<String>,
}

impl ParsedEnumeration {
    pub(crate) fn from_input(input: &DeriveInput) -> Result<Self> {
        let Data::Enum(data) = &input.data else {
            return Err(Error::new(input.ident.span(), "Enumeration can only be derived for enums"));
        };

        let mut values = Vec::with_capacity(data.variants.len());
        for variant in &data.variants {
            if !matches!(variant.fields, Fields::Unit) {
                return Err(Error::new(variant.ident.span(), "Enumeration variants cannot carry data"));
            }
            let mut value = variant.ident.to_string();
            for attr in &variant.attrs {
                if attr.path().is_ident("mongoly") {
                    attr.parse_nested_meta(|meta| {
                        if meta.path.is_ident("value") {
                            let lit: LitStr = meta.value()?.parse()?;
                            value = lit.value();
                            Ok(())
                        } else {
                            Err(meta.error("unsupported mongoly variant attribute"))
                        }
                    })?;
                }
            }
            values.push(value);
        }

        Ok(Self {
            name: input.ident.clone(),
            values,
        })
    }

    pub(crate) fn emit(&self) -> TokenStream2 {
        let name = &self.name;
        let values = &self.values;
        quote! {
            impl ::mongoly::Enumeration for #name {
                fn values() -> ::std::vec::Vec<::mongoly::serde_json::Value> {
                    ::std::vec![#(::mongoly::serde_json::Value::from(#values)),*]
                }
            }
        }
    }
}
