use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::spanned::Spanned;
use syn::{Error, Expr, Field, Ident, LitInt, LitStr, Result, Type, TypePath};

pub(crate) struct ParsedField {
    key: String,
    ty: TypeInfo,
    kind: FieldKind,
    bson_type: Option<Ident>,
    required: bool,
    nullable: bool,
    description: Option<String>,
    bounds: Bounds,
    array: ArrayBounds,
    index: Option<IndexAttr>,
    exclude_from_parent_index: bool,
    exclude_sub_indexes: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum FieldKind {
    Plain,
    Class,
    Enumeration,
}

struct TypeInfo {
    optional: bool,
    array: bool,
    binary: bool,
    /// Element type for arrays, the unwrapped type otherwise.
    element: Type,
}

#[derive(Default)]
struct Bounds {
    minimum: Option<Expr>,
    exclusive_minimum: bool,
    maximum: Option<Expr>,
    exclusive_maximum: bool,
    multiple_of: Option<Expr>,
    min_length: Option<LitInt>,
    max_length: Option<LitInt>,
    pattern: Option<String>,
}

#[derive(Default)]
struct ArrayBounds {
    min_items: Option<LitInt>,
    max_items: Option<LitInt>,
    unique_items: bool,
}

#[derive(Default)]
struct IndexAttr {
    direction: Option<Ident>,
    unique: bool,
    sparse: bool,
    expire_after: Option<LitInt>,
    name: Option<String>,
}

impl ParsedField {
    /// Returns `None` for fields marked `#[mongoly(skip)]`.
    pub(crate) fn from_field(field: &Field) -> Result<Option<Self>> {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new(field.span(), "Document requires named fields"))?;

        let mut parsed = Self {
            key: ident.unraw().to_string(),
            ty: classify_type(&field.ty)?,
            kind: FieldKind::Plain,
            bson_type: None,
            required: false,
            nullable: false,
            description: None,
            bounds: Bounds::default(),
            array: ArrayBounds::default(),
            index: None,
            exclude_from_parent_index: false,
            exclude_sub_indexes: false,
        };

        let mut skip = false;
        for attr in &field.attrs {
            if attr.path().is_ident("mongoly") {
                attr.parse_nested_meta(|meta| parsed.parse_field_attr(meta, &mut skip))?;
            }
        }
        if skip {
            return Ok(None);
        }

        parsed.validate(field)?;
        Ok(Some(parsed))
    }

    fn parse_field_attr(&mut self, meta: ParseNestedMeta<'_>, skip: &mut bool) -> Result<()> {
        if meta.path.is_ident("skip") {
            *skip = true;
        } else if meta.path.is_ident("key") {
            let value: LitStr = meta.value()?.parse()?;
            self.key = value.value();
        } else if meta.path.is_ident("required") {
            if self.ty.optional {
                return Err(meta.error("#[mongoly(required)] cannot be applied to an Option<T>"));
            }
            self.required = true;
        } else if meta.path.is_ident("nullable") {
            self.nullable = true;
        } else if meta.path.is_ident("description") {
            let value: LitStr = meta.value()?.parse()?;
            self.description = Some(value.value());
        } else if meta.path.is_ident("class") {
            self.set_kind(&meta, FieldKind::Class)?;
        } else if meta.path.is_ident("enumeration") {
            self.set_kind(&meta, FieldKind::Enumeration)?;
        } else if meta.path.is_ident("bson_type") {
            let value: LitStr = meta.value()?.parse()?;
            let variant = bson_variant(&value.value())
                .ok_or_else(|| Error::new(value.span(), format!("unknown bson type `{}`", value.value())))?;
            self.bson_type = Some(Ident::new(variant, value.span()));
        } else if meta.path.is_ident("min") {
            set_once(&meta, &mut self.bounds.minimum, meta.value()?.parse()?)?;
        } else if meta.path.is_ident("exclusive_min") {
            set_once(&meta, &mut self.bounds.minimum, meta.value()?.parse()?)?;
            self.bounds.exclusive_minimum = true;
        } else if meta.path.is_ident("max") {
            set_once(&meta, &mut self.bounds.maximum, meta.value()?.parse()?)?;
        } else if meta.path.is_ident("exclusive_max") {
            set_once(&meta, &mut self.bounds.maximum, meta.value()?.parse()?)?;
            self.bounds.exclusive_maximum = true;
        } else if meta.path.is_ident("multiple_of") {
            self.bounds.multiple_of = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("min_length") {
            self.bounds.min_length = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("max_length") {
            self.bounds.max_length = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("pattern") {
            let value: LitStr = meta.value()?.parse()?;
            self.bounds.pattern = Some(value.value());
        } else if meta.path.is_ident("min_items") {
            self.array.min_items = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("max_items") {
            self.array.max_items = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("unique_items") {
            self.array.unique_items = true;
        } else if meta.path.is_ident("indexed") {
            // indexed or indexed(desc) / indexed(text) / indexed(geo)
            let index = self.index.get_or_insert_with(IndexAttr::default);
            if meta.input.peek(syn::token::Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                let kind: Ident = content.parse()?;
                let variant = match kind.to_string().as_str() {
                    "asc" => "Ascending",
                    "desc" => "Descending",
                    "text" => "Text",
                    "geo" => "Geo2dSphere",
                    other => {
                        return Err(Error::new(
                            kind.span(),
                            format!("unknown index kind `{other}`, expected one of: asc, desc, text, geo"),
                        ));
                    }
                };
                index.direction = Some(Ident::new(variant, kind.span()));
            }
        } else if meta.path.is_ident("unique") {
            self.index.get_or_insert_with(IndexAttr::default).unique = true;
        } else if meta.path.is_ident("sparse") {
            self.index.get_or_insert_with(IndexAttr::default).sparse = true;
        } else if meta.path.is_ident("expire_after") {
            let value: LitInt = meta.value()?.parse()?;
            self.index.get_or_insert_with(IndexAttr::default).expire_after = Some(value);
        } else if meta.path.is_ident("index_name") {
            let value: LitStr = meta.value()?.parse()?;
            self.index.get_or_insert_with(IndexAttr::default).name = Some(value.value());
        } else if meta.path.is_ident("exclude_from_parent_index") {
            self.exclude_from_parent_index = true;
        } else if meta.path.is_ident("exclude_sub_indexes") {
            self.exclude_sub_indexes = true;
        } else {
            return Err(meta.error("unsupported mongoly field attribute"));
        }
        Ok(())
    }

    fn set_kind(&mut self, meta: &ParseNestedMeta<'_>, kind: FieldKind) -> Result<()> {
        if self.kind != FieldKind::Plain {
            return Err(meta.error("`class` and `enumeration` are mutually exclusive"));
        }
        self.kind = kind;
        Ok(())
    }

    fn validate(&self, field: &Field) -> Result<()> {
        if self.required && self.nullable {
            return Err(Error::new(field.span(), "a field cannot be both required and nullable"));
        }
        if self.bson_type.is_some() && self.kind != FieldKind::Plain {
            return Err(Error::new(
                field.span(),
                "bson_type cannot be combined with `class` or `enumeration`",
            ));
        }
        if self.exclude_sub_indexes && self.kind != FieldKind::Class {
            return Err(Error::new(
                field.span(),
                "exclude_sub_indexes only applies to `class` fields",
            ));
        }
        let has_array_bounds =
            self.array.min_items.is_some() || self.array.max_items.is_some() || self.array.unique_items;
        if has_array_bounds && !self.ty.array {
            return Err(Error::new(
                field.span(),
                "min_items, max_items and unique_items require a Vec<T> field",
            ));
        }
        Ok(())
    }

    /// Expression producing the field's `mongoly::FieldSpec`. May call `describe(catalog)?`.
    pub(crate) fn emit_spec(&self) -> Result<TokenStream2> {
        let key = LitStr::new(&self.key, Span::call_site());
        let type_ref = self.emit_type_ref()?;
        let mut chain = Vec::new();

        if self.kind == FieldKind::Enumeration {
            let element = &self.ty.element;
            chain.push(quote! { .enumeration(<#element as ::mongoly::Enumeration>::values()) });
        }
        if self.required {
            chain.push(quote! { .required() });
        }
        if self.nullable || self.ty.optional {
            chain.push(quote! { .nullable() });
        }
        if let Some(description) = &self.description {
            chain.push(quote! { .description(#description) });
        }
        if let Some(bounds) = self.bounds.emit() {
            chain.push(quote! { .bounds(#bounds) });
        }
        if let Some(array) = self.array.emit() {
            chain.push(quote! { .array_bounds(#array) });
        }
        if let Some(index) = &self.index {
            chain.extend(index.emit());
        }
        if self.exclude_from_parent_index {
            chain.push(quote! { .exclude_from_parent_index() });
        }
        if self.exclude_sub_indexes {
            chain.push(quote! { .exclude_sub_indexes() });
        }

        Ok(quote! {
            ::mongoly::FieldSpec::new(#key, #type_ref) #(#chain)*
        })
    }

    fn emit_type_ref(&self) -> Result<TokenStream2> {
        let element = &self.ty.element;
        let element_ref = if let Some(variant) = &self.bson_type {
            quote! { ::mongoly::TypeRef::Bson(::mongoly::BsonType::#variant) }
        } else if self.ty.binary {
            quote! { ::mongoly::TypeRef::Bson(::mongoly::BsonType::BinData) }
        } else if self.kind == FieldKind::Class {
            quote! { ::mongoly::TypeRef::Class(<#element as ::mongoly::Document>::describe(catalog)?) }
        } else {
            let name = type_name(element).ok_or_else(|| {
                Error::new(
                    element.span(),
                    "cannot infer a bson type for this field; add #[mongoly(bson_type = \"..\")]",
                )
            })?;
            let name = LitStr::new(&name, element.span());
            quote! { ::mongoly::TypeRef::named(#name) }
        };

        if self.ty.array {
            Ok(quote! { ::mongoly::TypeRef::array_of(#element_ref) })
        } else {
            Ok(element_ref)
        }
    }
}

impl Bounds {
    fn emit(&self) -> Option<TokenStream2> {
        let mut entries = Vec::new();
        if let Some(minimum) = &self.minimum {
            entries.push(quote! { minimum: ::core::option::Option::Some((#minimum) as f64), });
        }
        if self.exclusive_minimum {
            entries.push(quote! { exclusive_minimum: true, });
        }
        if let Some(maximum) = &self.maximum {
            entries.push(quote! { maximum: ::core::option::Option::Some((#maximum) as f64), });
        }
        if self.exclusive_maximum {
            entries.push(quote! { exclusive_maximum: true, });
        }
        if let Some(multiple_of) = &self.multiple_of {
            entries.push(quote! { multiple_of: ::core::option::Option::Some((#multiple_of) as f64), });
        }
        if let Some(min_length) = &self.min_length {
            entries.push(quote! { min_length: ::core::option::Option::Some(#min_length), });
        }
        if let Some(max_length) = &self.max_length {
            entries.push(quote! { max_length: ::core::option::Option::Some(#max_length), });
        }
        if let Some(pattern) = &self.pattern {
            entries.push(quote! { pattern: ::core::option::Option::Some(::std::string::String::from(#pattern)), });
        }
        if entries.is_empty() {
            return None;
        }
        Some(quote! {
            ::mongoly::SchemaBounds {
                #(#entries)*
                ..::core::default::Default::default()
            }
        })
    }
}

impl ArrayBounds {
    fn emit(&self) -> Option<TokenStream2> {
        if self.min_items.is_none() && self.max_items.is_none() && !self.unique_items {
            return None;
        }
        let min_items = option_tokens(self.min_items.as_ref());
        let max_items = option_tokens(self.max_items.as_ref());
        let unique_items = self.unique_items;
        Some(quote! {
            ::mongoly::ArrayBounds {
                min_items: #min_items,
                max_items: #max_items,
                unique_items: #unique_items,
            }
        })
    }
}

impl IndexAttr {
    fn emit(&self) -> Vec<TokenStream2> {
        let direction = self
            .direction
            .clone()
            .unwrap_or_else(|| format_ident!("Ascending"));
        let mut chain = vec![quote! { .indexed(::mongoly::IndexDirection::#direction) }];
        if self.unique {
            chain.push(quote! { .unique() });
        }
        if self.sparse {
            chain.push(quote! { .sparse() });
        }
        if let Some(seconds) = &self.expire_after {
            chain.push(quote! { .expire_after(#seconds) });
        }
        if let Some(name) = &self.name {
            chain.push(quote! { .index_name(#name) });
        }
        chain
    }
}

fn option_tokens(value: Option<&LitInt>) -> TokenStream2 {
    match value {
        Some(value) => quote! { ::core::option::Option::Some(#value) },
        None => quote! { ::core::option::Option::None },
    }
}

fn set_once(meta: &ParseNestedMeta<'_>, slot: &mut Option<Expr>, value: Expr) -> Result<()> {
    if slot.is_some() {
        return Err(meta.error("bound already set; use either the inclusive or the exclusive form"));
    }
    *slot = Some(value);
    Ok(())
}

fn classify_type(ty: &Type) -> Result<TypeInfo> {
    if let Some(inner) = generic_argument(ty, "Option") {
        if generic_argument(inner, "Option").is_some() {
            return Err(Error::new(ty.span(), "nested Option types are not supported"));
        }
        let mut info = classify_type(inner)?;
        info.optional = true;
        return Ok(info);
    }

    if let Some(inner) = generic_argument(ty, "Vec") {
        if type_name(inner).as_deref() == Some("u8") {
            return Ok(TypeInfo {
                optional: false,
                array: false,
                binary: true,
                element: inner.clone(),
            });
        }
        if is_bytes(inner) {
            return Ok(TypeInfo {
                optional: false,
                array: true,
                binary: true,
                element: inner.clone(),
            });
        }
        if generic_argument(inner, "Option").is_some() || generic_argument(inner, "Vec").is_some() {
            return Err(Error::new(
                inner.span(),
                "array elements must be a plain type, not Option<T> or Vec<T>",
            ));
        }
        return Ok(TypeInfo {
            optional: false,
            array: true,
            binary: false,
            element: inner.clone(),
        });
    }

    Ok(TypeInfo {
        optional: false,
        array: false,
        binary: false,
        element: ty.clone(),
    })
}

/// `Vec<u8>`, stored as a single binary value.
fn is_bytes(ty: &Type) -> bool {
    generic_argument(ty, "Vec").and_then(type_name).as_deref() == Some("u8")
}

fn generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(TypePath { qself: None, path }) = ty else {
        return None;
    };
    let segment = path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args.args.first().and_then(|arg| match arg {
            syn::GenericArgument::Type(inner) => Some(inner),
            _ => None,
        }),
        _ => None,
    }
}

/// Last path segment of the type, looking through references.
fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(TypePath { path, .. }) => path.segments.last().map(|segment| segment.ident.to_string()),
        Type::Reference(reference) => type_name(&reference.elem),
        Type::Group(group) => type_name(&group.elem),
        Type::Paren(paren) => type_name(&paren.elem),
        _ => None,
    }
}

fn bson_variant(name: &str) -> Option<&'static str> {
    let variant = match name {
        "number" => "Number",
        "double" => "Double",
        "int" => "Int",
        "long" => "Long",
        "decimal" => "Decimal",
        "bool" => "Bool",
        "string" => "String",
        "date" => "Date",
        "timestamp" => "Timestamp",
        "object" => "Object",
        "array" => "Array",
        "binData" => "BinData",
        "objectId" => "ObjectId",
        _ => return None,
    };
    Some(variant)
}
