use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse::Parser, punctuated::Punctuated, BinOp, Data, DeriveInput, Expr, ExprLit, Ident, Lit, Token};

/// Value of a single flag variant.
enum FlagValue {
	/// Literal bits
	Bits(u128),
	/// Expression evaluating to the flag, built out of other variants
	Expr(TokenStream),
}

impl FlagValue {
	fn into_tokens(self) -> TokenStream {
		match self {
			FlagValue::Bits(bits) => quote!(Self::from_u128(#bits)),
			FlagValue::Expr(expr) => expr,
		}
	}
}

pub fn flags(args: TokenStream, input: TokenStream) -> TokenStream {
	let input = match syn::parse2::<DeriveInput>(input) {
		Ok(input) => input,
		Err(err) => return err.to_compile_error(),
	};

	let body = match input.data {
		Data::Enum(body) => body,
		_ => return quote!( compile_error!("`#[flags]` can only be applied to an enum"); ),
	};

	let vis = input.vis;
	let flag_name = input.ident;
	let enum_attrs = input.attrs;

	let mut idents = Vec::with_capacity(body.variants.len());
	let mut values = Vec::with_capacity(body.variants.len());
	let mut variant_attrs = Vec::with_capacity(body.variants.len());
	let mut none_name = None;
	let mut next_bit: Option<u128> = Some(1);
	let mut max_val: u128 = 0;

	for variant in body.variants {
		let value = match variant.discriminant {
			Some((_, expr)) => match flag_value(&expr) {
				Ok(FlagValue::Bits(0)) => {
					none_name = Some(variant.ident.to_string());
					FlagValue::Bits(0)
				},
				Ok(FlagValue::Bits(bits)) => {
					max_val = max_val.max(bits);
					next_bit = bits.checked_add(1).and_then(u128::checked_next_power_of_two);
					FlagValue::Bits(bits)
				},
				Ok(value) => value,
				Err(err) => return err.to_compile_error(),
			},
			None => {
				let bits = match next_bit {
					Some(bits) => bits,
					None => return syn::Error::new_spanned(&variant.ident, "Flag does not fit in 128 bits").to_compile_error(),
				};
				max_val = max_val.max(bits);
				next_bit = bits.checked_shl(1).filter(|val| *val != 0);
				FlagValue::Bits(bits)
			},
		};

		values.push(value.into_tokens());
		idents.push(variant.ident);
		variant_attrs.push(variant.attrs);
	}

	let base_type = match base_type_from_args(args, max_val) {
		Ok(ty) => ty,
		Err(err) => return err.to_compile_error(),
	};

	let none_const = match &none_name {
		Some(_) => quote!(),
		None => quote!(
			/// Value representing that no flag is set.
			#vis const None: #flag_name = #flag_name::none();
		),
	};
	let none_name = none_name.unwrap_or_else(|| "None".to_string());

	quote!(
		#(#enum_attrs)*
		#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
		#[repr(transparent)]
		#vis struct #flag_name {
			bits: #base_type,
		}

		#[allow(non_upper_case_globals)]
		impl #flag_name {
			#none_const

			#(#(#variant_attrs)* #vis const #idents: #flag_name = #values;)*

			#[allow(dead_code)]
			const fn from_u128(bits: u128) -> Self {
				Self { bits: bits as #base_type }
			}

			/// Create flags from raw bits, bits that don't belong to any flag are kept.
			#vis const fn from_bits(bits: #base_type) -> Self {
				Self { bits }
			}

			/// Create flags with no flag set.
			#vis const fn none() -> Self {
				Self { bits: 0 }
			}

			/// Create flags with all declared flags set.
			#vis const fn all() -> Self {
				Self { bits: 0 #(| #flag_name::#idents.bits)* }
			}

			/// Get the raw bits.
			#vis const fn bits(&self) -> #base_type {
				self.bits
			}

			/// Check if all given flags are set.
			#vis const fn contains(&self, flags: #flag_name) -> bool {
				self.bits & flags.bits == flags.bits
			}

			/// Check if any of the given flags is set.
			#vis const fn intersects(&self, flags: #flag_name) -> bool {
				self.bits & flags.bits != 0
			}

			/// Check if no flag is set.
			#vis const fn is_none(&self) -> bool {
				self.bits == 0
			}

			/// Check if any flag is set.
			#vis const fn is_any(&self) -> bool {
				self.bits != 0
			}

			/// Check if all declared flags are set.
			#vis const fn is_all(&self) -> bool {
				self.bits == Self::all().bits
			}

			/// Check if exactly one bit is set.
			#vis const fn is_single_bit_set(&self) -> bool {
				self.bits.count_ones() == 1
			}

			/// Set or clear the given flags.
			#vis fn set(&mut self, flags: #flag_name, set: bool) {
				if set {
					self.bits |= flags.bits;
				} else {
					self.bits &= !flags.bits;
				}
			}

			/// Enable the given flags.
			#vis fn enable(&mut self, flags: #flag_name) {
				self.bits |= flags.bits;
			}

			/// Disable the given flags.
			#vis fn disable(&mut self, flags: #flag_name) {
				self.bits &= !flags.bits;
			}

			/// Const version of `!`, only declared flags are kept.
			#vis const fn not(self) -> Self {
				Self { bits: !self.bits & Self::all().bits }
			}

			/// Const version of `&`.
			#vis const fn bitand(self, rhs: Self) -> Self {
				Self { bits: self.bits & rhs.bits }
			}

			/// Const version of `|`.
			#vis const fn bitor(self, rhs: Self) -> Self {
				Self { bits: self.bits | rhs.bits }
			}

			/// Const version of `^`.
			#vis const fn bitxor(self, rhs: Self) -> Self {
				Self { bits: self.bits ^ rhs.bits }
			}

			/// Iterate over all single-bit flags that are set, in declaration order.
			#vis fn iter(self) -> impl Iterator<Item = #flag_name> {
				[#(#flag_name::#idents),*].into_iter()
					.filter(move |flag| flag.is_single_bit_set() && self.contains(*flag))
			}
		}

		impl ::core::ops::Not for #flag_name {
			type Output = Self;

			fn not(self) -> Self {
				#flag_name::not(self)
			}
		}

		impl ::core::ops::BitAnd for #flag_name {
			type Output = Self;

			fn bitand(self, rhs: Self) -> Self {
				Self { bits: self.bits & rhs.bits }
			}
		}

		impl ::core::ops::BitAndAssign for #flag_name {
			fn bitand_assign(&mut self, rhs: Self) {
				self.bits &= rhs.bits;
			}
		}

		impl ::core::ops::BitOr for #flag_name {
			type Output = Self;

			fn bitor(self, rhs: Self) -> Self {
				Self { bits: self.bits | rhs.bits }
			}
		}

		impl ::core::ops::BitOrAssign for #flag_name {
			fn bitor_assign(&mut self, rhs: Self) {
				self.bits |= rhs.bits;
			}
		}

		impl ::core::ops::BitXor for #flag_name {
			type Output = Self;

			fn bitxor(self, rhs: Self) -> Self {
				Self { bits: self.bits ^ rhs.bits }
			}
		}

		impl ::core::ops::BitXorAssign for #flag_name {
			fn bitxor_assign(&mut self, rhs: Self) {
				self.bits ^= rhs.bits;
			}
		}

		impl ::core::convert::From<#base_type> for #flag_name {
			fn from(bits: #base_type) -> Self {
				Self { bits }
			}
		}

		impl ::core::convert::From<#flag_name> for #base_type {
			fn from(flags: #flag_name) -> Self {
				flags.bits
			}
		}

		impl ::core::default::Default for #flag_name {
			fn default() -> Self {
				Self::none()
			}
		}

		impl ::core::fmt::Debug for #flag_name {
			fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
				if self.is_none() {
					if f.alternate() {
						f.write_str(concat!(stringify!(#flag_name), "::"))?;
					}
					return f.write_str(#none_name);
				}

				let mut remaining = *self;
				let mut first = true;
				for (flag, name) in [#((#flag_name::#idents, stringify!(#idents))),*] {
					if flag.is_none() || !remaining.contains(flag) {
						continue;
					}
					if !first {
						f.write_str(" | ")?;
					}
					if f.alternate() {
						f.write_str(concat!(stringify!(#flag_name), "::"))?;
					}
					f.write_str(name)?;
					remaining.bits &= !flag.bits;
					first = false;
				}

				if remaining.is_any() {
					if !first {
						f.write_str(" | ")?;
					}
					write!(f, "{:#x}", remaining.bits)?;
				}
				Ok(())
			}
		}

		impl ::core::fmt::Display for #flag_name {
			fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
				::core::fmt::Debug::fmt(self, f)
			}
		}
	)
}

fn base_type_from_args(args: TokenStream, max_val: u128) -> syn::Result<Ident> {
	let args = Punctuated::<Ident, Token![,]>::parse_terminated.parse2(args)?;
	if let Some(arg) = args.into_iter().next() {
		return if ["u8", "u16", "u32", "u64", "u128"].iter().any(|ty| arg == *ty) {
			Ok(arg)
		} else {
			Err(syn::Error::new_spanned(arg, "Expected an unsigned integer type"))
		};
	}

	let ty = if max_val <= u8::MAX as u128 {
		"u8"
	} else if max_val <= u16::MAX as u128 {
		"u16"
	} else if max_val <= u32::MAX as u128 {
		"u32"
	} else if max_val <= u64::MAX as u128 {
		"u64"
	} else {
		"u128"
	};
	Ok(Ident::new(ty, proc_macro2::Span::call_site()))
}

fn flag_value(expr: &Expr) -> syn::Result<FlagValue> {
	match expr {
		Expr::Lit(ExprLit { lit: Lit::Int(int), .. }) => Ok(FlagValue::Bits(int.base10_parse()?)),
		Expr::Path(path) => match path.path.get_ident() {
			Some(ident) => Ok(FlagValue::Expr(quote!(Self::#ident))),
			None => Err(syn::Error::new_spanned(path, "Only single identifiers can be used to combine flags")),
		},
		Expr::Paren(paren) => flag_value(&paren.expr),
		Expr::Binary(bin) if matches!(bin.op, BinOp::BitOr(_)) => {
			let left = flag_value(&bin.left)?.into_tokens();
			let right = flag_value(&bin.right)?.into_tokens();
			Ok(FlagValue::Expr(quote!(#left.bitor(#right))))
		},
		_ => Err(syn::Error::new_spanned(expr, "Only integer literals, variant names and `|` are supported")),
	}
}
