//! Macro for implementing Display and FromStr for string-coded enums
//!
//! Enums persisted as text (rule operators, evaluation reasons) share one
//! conversion: lowercase snake_case on output, trimmed case-insensitive
//! parsing on input.
//!
//! # Example
//!
//! ```rust
//! use cortex_domain::{impl_domain_enum_conversions, Result};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Comparison {
//!     Equals,
//!     NotEquals,
//! }
//!
//! impl_domain_enum_conversions!(Comparison {
//!     Equals => "equals",
//!     NotEquals => "not_equals",
//! });
//!
//! fn parse(raw: &str) -> Result<Comparison> {
//!     raw.parse().map_err(cortex_domain::CortexError::InvalidInput)
//! }
//!
//! assert_eq!("NOT_EQUALS".parse::<Comparison>(), Ok(Comparison::NotEquals));
//! assert!(parse("between").is_err());
//! ```

/// Implements `Display`, `FromStr` and `as_str` for a fieldless enum.
///
/// Parsing trims surrounding whitespace and ignores ASCII case. Unknown
/// values produce a `String` error naming the enum.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical string form.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
