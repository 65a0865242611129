mod model;
mod route;

use proc_macro::TokenStream;

/// Creates a new documentation function for the route, named after the original function with the suffix `_docs`.
///
/// The first line of the doc comment becomes the summary, the rest the description.
#[proc_macro_attribute]
pub fn route(args: TokenStream, input: TokenStream) -> TokenStream {
	route::from_input(args, input)
}

/// Creates two new structs: `CreateXInput` and `UpdateXInput` for the model.
///
/// Fields with `#[serde(skip_deserializing)]` or `#[serde(skip)]` are left out of both.
/// Every field of `UpdateXInput` is wrapped in an [`Option`].
/// A field marked `#[model(default = "path")]` gets `#[serde(default = "path")]`
/// on `CreateXInput` only.
#[proc_macro_attribute]
pub fn model(_args: TokenStream, input: TokenStream) -> TokenStream {
	model::from_input(input)
}
