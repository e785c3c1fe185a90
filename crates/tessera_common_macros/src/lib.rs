use proc_macro::TokenStream;

mod flags;
mod derive;

/// Turn a fieldless enum into a bit-flag struct.
/// 
/// Variants without a discriminant take the next power of 2, explicit discriminants can either be an integer literal or
/// an `|` combination of previously declared variants. A variant with a value of `0` replaces the generated `None` constant.
/// 
/// The backing integer is chosen from the largest value, unless one is passed as an argument, e.g. `#[flags(u32)]`.
#[proc_macro_attribute]
pub fn flags(args: TokenStream, input: TokenStream) -> TokenStream {
	flags::flags(args.into(), input.into()).into()
}

/// Add a `COUNT` constant containing the number of variants in the enum.
#[proc_macro_derive(EnumCount)]
pub fn enum_count(item: TokenStream) -> TokenStream {
	derive::enum_count(item.into()).into()
}

/// Implement `Display` for an enum, the displayed name can be overwritten using `#[display("name")]`.
#[proc_macro_derive(EnumDisplay, attributes(display))]
pub fn enum_display(item: TokenStream) -> TokenStream {
	derive::enum_display(item.into()).into()
}

/// Add a `parse` function, mapping a name to a variant, the name can be overwritten using `#[parse_name("name")]`.
#[proc_macro_derive(EnumFromName, attributes(parse_name))]
pub fn enum_from_name(item: TokenStream) -> TokenStream {
	derive::enum_from_name(item.into()).into()
}
