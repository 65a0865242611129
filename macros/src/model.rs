use darling::{ast, FromDeriveInput, FromField, FromMeta};
use proc_macro2::TokenTree;
use quote::{format_ident, quote, ToTokens};
use syn::Meta;

#[derive(Debug, FromDeriveInput)]
#[darling(supports(struct_named), forward_attrs)]
struct ModelInputReceiver {
	ident: syn::Ident,

	generics: syn::Generics,

	data: ast::Data<(), ModelFieldReceiver>,

	attrs: Vec<syn::Attribute>,
}

#[derive(Debug, FromField)]
#[darling(forward_attrs)]
struct ModelFieldReceiver {
	ident: Option<syn::Ident>,

	ty: syn::Type,
	vis: syn::Visibility,

	attrs: Vec<syn::Attribute>,
}

#[derive(Debug, Default, FromMeta)]
struct FieldOptions {
	default: Option<syn::LitStr>,
}

struct Field<'a> {
	ident: &'a syn::Ident,
	ty: &'a syn::Type,
	vis: &'a syn::Visibility,
	attrs: Vec<&'a syn::Attribute>,
	options: FieldOptions,
}

fn is_model_attr(attr: &syn::Attribute) -> bool {
	attr.path().is_ident("model")
}

fn is_skipped(attr: &syn::Attribute) -> bool {
	let Meta::List(ref list) = attr.meta else {
		return false;
	};

	if !list.path.is_ident("serde") {
		return false;
	}

	list.tokens.to_token_stream().into_iter().any(|token| {
		matches!(token, TokenTree::Ident(ref ident) if ident == "skip_deserializing" || ident == "skip")
	})
}

pub fn from_input(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let mut input = syn::parse_macro_input!(input as syn::DeriveInput);
	let receiver = match ModelInputReceiver::from_derive_input(&input) {
		Ok(x) => x,
		Err(e) => return e.write_errors().into(),
	};

	let ident = &receiver.ident;
	let vis = input.vis.clone();
	let generics = &receiver.generics;
	let create_ident = format_ident!("Create{}Input", ident);
	let update_ident = format_ident!("Update{}Input", ident);

	let attrs = &receiver.attrs;

	let Some(fields) = receiver.data.as_ref().take_struct() else {
		return syn::Error::new_spanned(ident, "expected a struct with named fields")
			.to_compile_error()
			.into();
	};

	let mut errors = darling::Error::accumulator();
	let fields = fields
		.iter()
		.filter_map(|field| {
			let ident = field.ident.as_ref()?;

			if field.attrs.iter().any(is_skipped) {
				return None;
			}

			let mut options = FieldOptions::default();

			for attr in field.attrs.iter().filter(|attr| is_model_attr(attr)) {
				if let Some(parsed) = errors.handle(FieldOptions::from_meta(&attr.meta)) {
					options = parsed;
				}
			}

			Some(Field {
				ident,
				ty: &field.ty,
				vis: &field.vis,
				attrs: field.attrs.iter().filter(|attr| !is_model_attr(attr)).collect(),
				options,
			})
		})
		.collect::<Vec<_>>();

	if let Err(e) = errors.finish() {
		return e.write_errors().into();
	}

	let create_fields = fields.iter().map(|field| {
		let Field {
			ident,
			ty,
			vis,
			attrs,
			options,
		} = field;
		let default = options
			.default
			.as_ref()
			.map(|path| quote!(#[serde(default = #path)]));

		quote! {
			#(#attrs)*
			#default
			#vis #ident: #ty,
		}
	});

	let update_fields = fields.iter().map(|field| {
		let Field {
			ident,
			ty,
			vis,
			attrs,
			..
		} = field;

		quote! {
			#(#attrs)*
			#vis #ident: Option<#ty>,
		}
	});

	// `model` is not a real attribute, so it has to go before the struct is emitted
	if let syn::Data::Struct(ref mut data) = input.data {
		for field in &mut data.fields {
			field.attrs.retain(|attr| !is_model_attr(attr));
		}
	}

	quote! {
		#input

		#(#attrs)*
		#vis struct #create_ident #generics {
			#(
				#create_fields
			)*
		}

		#(#attrs)*
		#vis struct #update_ident #generics {
			#(
				#update_fields
			)*
		}
	}
	.into()
}
