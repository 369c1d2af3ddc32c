//! `#[derive(Codable)]`: generates a `tinycodec::Codable` impl for a struct
//! by expanding each field's describe/encode/decode call and folding the
//! results into the struct-level methods.

use proc_macro::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Index};

#[proc_macro_derive(Codable)]
pub fn derive_codable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return syn::Error::new_spanned(
                &input,
                "Codable can only be derived for structs",
            )
            .to_compile_error()
            .into()
        }
    };

    let field_idents: Vec<syn::Member> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .map(|f| syn::Member::Named(f.ident.clone().unwrap()))
            .collect(),
        Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
            .map(|i| syn::Member::Unnamed(Index::from(i)))
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let field_names: Vec<String> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .map(|f| f.ident.as_ref().unwrap().to_string())
            .collect(),
        Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len()).map(|i| i.to_string()).collect(),
        Fields::Unit => Vec::new(),
    };

    let field_types: Vec<&syn::Type> = match fields {
        Fields::Named(named) => named.named.iter().map(|f| &f.ty).collect(),
        Fields::Unnamed(unnamed) => unnamed.unnamed.iter().map(|f| &f.ty).collect(),
        Fields::Unit => Vec::new(),
    };

    let describe_children = field_idents.iter().zip(field_names.iter()).zip(field_types.iter()).map(
        |((member, fname), fty)| {
            let offset_expr = match member {
                syn::Member::Named(ident) => {
                    quote_spanned!(ident.span()=> ::core::mem::offset_of!(#name, #ident))
                }
                syn::Member::Unnamed(idx) => {
                    quote_spanned!(idx.span()=> ::core::mem::offset_of!(#name, #idx))
                }
            };
            quote! {
                {
                    let mut child = ::tinycodec::describe_cached::<#fty>(#fname);
                    child.offset = #offset_expr;
                    child
                }
            }
        },
    );

    let encode_fields = field_idents.iter().map(|member| {
        quote! { ::tinycodec::Codable::encode(&self.#member, enc); }
    });

    let decode_fields = field_idents.iter().zip(field_types.iter()).map(|(member, fty)| match member {
        syn::Member::Named(ident) => {
            quote! { #ident: <#fty as ::tinycodec::Codable>::decode_into(dec)? }
        }
        syn::Member::Unnamed(_) => {
            quote! { <#fty as ::tinycodec::Codable>::decode_into(dec)? }
        }
    });

    let construct = match fields {
        Fields::Named(_) => quote! { #name { #(#decode_fields),* } },
        Fields::Unnamed(_) => quote! { #name ( #(#decode_fields),* ) },
        Fields::Unit => quote! { #name },
    };

    // Reshape must walk `node.children` in wire order — that's the actual
    // byte layout — rather than this struct's own field order, since a
    // renamed/reordered/dropped field means the two orders can disagree. Each
    // wire child either matches a field by name (decoded into a holding slot)
    // or doesn't (skipped to keep the cursor in sync). Only once every wire
    // child has been consumed can the struct be assembled, substituting
    // `Default` for any field the wire data never mentioned.
    let local_idents: Vec<syn::Ident> = (0..field_idents.len())
        .map(|i| format_ident!("__tinycodec_field_{}", i))
        .collect();

    let field_decls = local_idents.iter().zip(field_types.iter()).map(|(local, fty)| {
        quote! { let mut #local: ::core::option::Option<#fty> = ::core::option::Option::None; }
    });

    let match_arms = field_names
        .iter()
        .zip(local_idents.iter())
        .zip(field_types.iter())
        .map(|((fname, local), fty)| {
            quote! {
                #fname => {
                    #local = ::core::option::Option::Some(
                        <#fty as ::tinycodec::Codable>::decode_reshaped(child, dec)?,
                    );
                }
            }
        });

    let reshape_fields = field_idents.iter().zip(local_idents.iter()).map(|(member, local)| match member {
        syn::Member::Named(ident) => quote! {
            #ident: #local.unwrap_or_else(::core::default::Default::default)
        },
        syn::Member::Unnamed(_) => quote! {
            #local.unwrap_or_else(::core::default::Default::default)
        },
    });

    let reshape_construct = match fields {
        Fields::Named(_) => quote! { #name { #(#reshape_fields),* } },
        Fields::Unnamed(_) => quote! { #name ( #(#reshape_fields),* ) },
        Fields::Unit => quote! { #name },
    };

    let reshape_walk = quote! {
        #(#field_decls)*
        for child in &node.children {
            match child.name.as_str() {
                #(#match_arms)*
                _ => { ::tinycodec::skip_value(child, dec)?; }
            }
        }
    };

    // Reshape falls back to a field's `Default` when the receiver struct has
    // grown a field the incoming wire data never encoded, so every field
    // type used with `#[derive(Codable)]` additionally needs `Default`.
    let default_bounds: Vec<proc_macro2::TokenStream> = field_types
        .iter()
        .map(|ty| quote! { #ty: ::core::default::Default })
        .collect();
    let combined_where = if default_bounds.is_empty() {
        quote! { #where_clause }
    } else if let Some(wc) = where_clause {
        quote! { #wc #(, #default_bounds)* }
    } else {
        quote! { where #(#default_bounds),* }
    };

    let expanded = quote! {
        impl #impl_generics ::tinycodec::Codable for #name #ty_generics #combined_where {
            const KIND: ::tinycodec::Kind = ::tinycodec::Kind::Struct;

            fn describe(name: &str) -> ::tinycodec::SchemeNode {
                ::tinycodec::SchemeNode {
                    name: name.to_string(),
                    kind: ::tinycodec::Kind::Struct,
                    children: vec![#(#describe_children),*],
                    offset: 0,
                    len: 0,
                }
            }

            fn encode(&self, enc: &mut ::tinycodec::__private::Encoder) {
                #(#encode_fields)*
            }

            fn decode_into(dec: &mut ::tinycodec::__private::Decoder) -> ::tinycodec::Result<Self> {
                Ok(#construct)
            }

            fn decode_reshaped(
                node: &::tinycodec::SchemeNode,
                dec: &mut ::tinycodec::__private::Decoder,
            ) -> ::tinycodec::Result<Self> {
                if node.kind != ::tinycodec::Kind::Struct {
                    ::tinycodec::skip_value(node, dec)?;
                    return Err(::tinycodec::__private::err(
                        "tinycodec: struct field changed kind during reshape",
                    ));
                }
                #reshape_walk
                Ok(#reshape_construct)
            }
        }
    };

    expanded.into()
}
