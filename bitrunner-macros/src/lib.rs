use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Expr, Lit, LitStr, Meta};

/// Derives the `Describe` trait for a plugin type.
///
/// # Usage
///
/// ```ignore
/// /// Implements a subset of tools for testing.
/// #[derive(Describe)]
/// #[plugin(name = "test_plugin", version = "0.1")]
/// pub struct TestPlugin;
/// ```
///
/// This will generate:
///
/// ```ignore
/// impl bitrunner_plugin_sdk::Describe for TestPlugin {
///     fn name(&self) -> &str { "test_plugin" }
///     fn help(&self) -> &str { "Implements a subset of tools for testing." }
///     fn version(&self) -> Option<&str> { Some("0.1") }
/// }
/// ```
///
/// Without `name`, the snake_case form of the type name is used.
#[proc_macro_derive(Describe, attributes(plugin))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let attrs = match extract_plugin_attrs(&input.attrs) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let name = attrs
        .name
        .unwrap_or_else(|| to_snake_case(&ident.to_string()));
    let help = extract_doc(&input.attrs);
    let version = match attrs.version {
        Some(v) => quote! { ::core::option::Option::Some(#v) },
        None => quote! { ::core::option::Option::None },
    };

    let expanded = quote! {
        impl #impl_generics ::bitrunner_plugin_sdk::Describe for #ident #ty_generics #where_clause {
            fn name(&self) -> &str {
                #name
            }

            fn help(&self) -> &str {
                #help
            }

            fn version(&self) -> ::core::option::Option<&str> {
                #version
            }
        }
    };

    TokenStream::from(expanded)
}

#[derive(Default)]
struct PluginAttrs {
    name: Option<String>,
    version: Option<String>,
}

/// Extract `name` and `version` from #[plugin(name = "...", version = "...")]
fn extract_plugin_attrs(attrs: &[syn::Attribute]) -> syn::Result<PluginAttrs> {
    let mut out = PluginAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("plugin") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                out.name = Some(lit.value());
                Ok(())
            } else if meta.path.is_ident("version") {
                let lit: LitStr = meta.value()?.parse()?;
                out.version = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("expected `name` or `version`"))
            }
        })?;
    }
    Ok(out)
}

/// Join the `///` lines into the help text
fn extract_doc(attrs: &[syn::Attribute]) -> String {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(s) => Some(s.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .collect();

    lines.join("\n").trim().to_string()
}

fn to_snake_case(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}
