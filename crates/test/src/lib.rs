use proc_macro::TokenStream;
use quote::quote;
use std::{collections::HashMap, sync::Mutex, sync::OnceLock};
use syn::{
  parse::{Parse, ParseStream},
  punctuated::Punctuated,
  Ident, ItemFn, Token,
};

static AVAILABLE_TOOLS: OnceLock<Mutex<HashMap<String, bool>>> = OnceLock::new();

fn is_tool_available(tool: &str) -> bool {
  let tools = AVAILABLE_TOOLS.get_or_init(|| Mutex::new(HashMap::new()));
  let mut tools = match tools.lock() {
    Ok(tools) => tools,
    Err(poisoned) => poisoned.into_inner(),
  };

  *tools.entry(tool.to_string()).or_insert_with(|| {
    std::process::Command::new(tool)
      .arg("--version")
      .stdout(std::process::Stdio::null())
      .stderr(std::process::Stdio::null())
      .status()
      .map_or(false, |status| status.success())
  })
}

/// Executables the test needs, e.g. `#[remote_ci_test::test(git)]`
struct Args {
  tools: Vec<String>,
}

impl Parse for Args {
  fn parse(input: ParseStream) -> syn::Result<Self> {
    let idents = Punctuated::<Ident, Token![,]>::parse_terminated(input)?;

    Ok(Self {
      tools: idents.iter().map(|ident| ident.to_string()).collect(),
    })
  }
}

#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let item_fn = syn::parse_macro_input!(item as ItemFn);
  let args = syn::parse_macro_input!(attr as Args);

  let test_name = item_fn.sig.ident;
  let output = item_fn.sig.output;
  let content = item_fn.block;

  let is_async = item_fn.sig.asyncness.is_some();

  // Evaluated when the test crate is compiled, not when the test runs
  let missing: Vec<&String> = args
    .tools
    .iter()
    .filter(|tool| !is_tool_available(tool))
    .collect();

  let ignore = if missing.is_empty() {
    quote! {}
  } else {
    let reason = format!(
      "requires {}",
      missing
        .iter()
        .map(|tool| tool.as_str())
        .collect::<Vec<_>>()
        .join(", ")
    );
    quote! { #[ignore = #reason] }
  };

  let content = quote! {
    remote_ci_logger::init_logger_with_level(log::Level::Trace);

    #content
  };

  if is_async {
    return quote! {
      #ignore
      #[tokio::test]
      async fn #test_name() #output {
        #content
      }
    }
    .into();
  }

  quote! {
    #ignore
    #[test]
    fn #test_name() #output {
      #content
    }
  }
  .into()
}
