//! Attribute macros for the Sequent runtime.
//!
//! - `#[sequent::main]` turns an `async fn main` into a synchronous entry
//!   point that drives the body on a fresh runtime.
//! - `#[sequent::test]` does the same for `async` test functions.
//!
//! Both accept an optional `event_interval = N` argument forwarded to
//! `RuntimeBuilder::event_interval`.

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let builder = runtime_builder(&attr);

    wrap_body(item, |block| {
        format!(
            "{{
                let runtime = {builder};
                runtime.block_on(async move {{ {block} }})
            }}"
        )
    })
}

#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let builder = runtime_builder(&attr);

    let wrapped = wrap_body(item, |block| {
        format!(
            "{{
                let runtime = {builder};
                runtime.block_on(async move {{ {block} }});
            }}"
        )
    });

    let mut result: Vec<TokenTree> = "#[test]".parse::<TokenStream>().unwrap().into_iter().collect();
    result.extend(wrapped);
    result.into_iter().collect()
}

/// Builds the `RuntimeBuilder` expression for the macro arguments.
fn runtime_builder(attr: &TokenStream) -> String {
    let mut builder = String::from("::sequent::RuntimeBuilder::new()");

    for part in attr.to_string().split(',') {
        if let Some(value) = part.trim().strip_prefix("event_interval") {
            if let Ok(n) = value.trim_start_matches([' ', '=']).trim().parse::<usize>() {
                builder.push_str(&format!(".event_interval({n})"));
            }
        }
    }

    builder.push_str(".build()");
    builder
}

/// Strips `async` from the function signature and replaces its body with
/// the source produced by `wrap`.
fn wrap_body(item: TokenStream, wrap: impl FnOnce(String) -> String) -> TokenStream {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    }

    let Some(pos) = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
    else {
        return compile_error("expected a function body");
    };

    let block = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => unreachable!(),
    };

    let body = match wrap(block).parse::<TokenStream>() {
        Ok(body) => body,
        Err(err) => return compile_error(&format!("sequent macro error: {err}")),
    };

    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, body));
    tokens.into_iter().collect()
}

fn compile_error(message: &str) -> TokenStream {
    format!("compile_error!({message:?});").parse().unwrap()
}
