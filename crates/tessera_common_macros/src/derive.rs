use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DataEnum, DeriveInput, Ident, LitStr, Variant};

fn parse_enum(item: TokenStream, derive: &str) -> Result<(Ident, DataEnum), TokenStream> {
	let input = syn::parse2::<DeriveInput>(item).map_err(|err| err.to_compile_error())?;
	match input.data {
		Data::Enum(body) => Ok((input.ident, body)),
		_ => {
			let msg = format!("`{derive}` can only be derived for enums");
			Err(quote!( compile_error!(#msg); ))
		}
	}
}

/// Get the string value of a `#[name("..")]` attribute, or the variant's name if it has none.
fn variant_name(variant: &Variant, attr_name: &str) -> TokenStream {
	variant.attrs.iter()
		.find(|attr| attr.path().is_ident(attr_name))
		.map(|attr| match attr.parse_args::<LitStr>() {
			Ok(lit) => {
				let val = lit.value();
				quote!(#val)
			},
			Err(err) => err.to_compile_error(),
		})
		.unwrap_or_else(|| {
			let val = variant.ident.to_string();
			quote!(#val)
		})
}

pub fn enum_count(item: TokenStream) -> TokenStream {
	let (ident, body) = match parse_enum(item, "EnumCount") {
		Ok(parsed) => parsed,
		Err(err) => return err,
	};
	let count = body.variants.len();

	quote!{
		impl #ident {
			/// Number of variants.
			pub const COUNT: usize = #count;
		}
	}
}

pub fn enum_display(item: TokenStream) -> TokenStream {
	let (ident, body) = match parse_enum(item, "EnumDisplay") {
		Ok(parsed) => parsed,
		Err(err) => return err,
	};

	let members = body.variants.iter().map(|variant| &variant.ident);
	let names = body.variants.iter().map(|variant| variant_name(variant, "display"));

	quote!{
		impl ::core::fmt::Display for #ident {
			fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
				f.write_str(match self {
					#(#ident::#members => #names,)*
				})
			}
		}
	}
}

pub fn enum_from_name(item: TokenStream) -> TokenStream {
	let (ident, body) = match parse_enum(item, "EnumFromName") {
		Ok(parsed) => parsed,
		Err(err) => return err,
	};

	let members = body.variants.iter().map(|variant| &variant.ident);
	let names = body.variants.iter().map(|variant| variant_name(variant, "parse_name"));

	quote!{
		impl #ident {
			/// Get the variant with the given name, names are case-insensitive.
			pub fn parse(name: &str) -> Option<Self> {
				#(
					if name.eq_ignore_ascii_case(#names) {
						return Some(#ident::#members);
					}
				)*
				None
			}
		}
	}
}
