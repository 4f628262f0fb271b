//! Newtype IDs for type-safe entity references.
//!
//! The managed backend hands out opaque text keys for products, categories
//! and users. Use the `define_id!` macro to wrap them so IDs from different
//! tables can't be mixed. Cart lines get their own [`CartItemId`], which
//! distinguishes server rows from lines held in the device-local cart.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Macro to define a type-safe text ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use little_sprout_core::define_id;
/// define_id!(UserId);
/// define_id!(ProductId);
///
/// let user_id = UserId::new("u-1");
/// let product_id = ProductId::new("p-1");
///
/// // These are different types, so this won't compile:
/// // let _: UserId = product_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the underlying key.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying key.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_id!(UserId);
define_id!(ProductId);
define_id!(CategoryId);

/// Prefix used when rendering device-local line IDs.
const LOCAL_PREFIX: &str = "local_";

/// Errors that can occur when parsing a [`CartItemId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LineIdError {
    /// The input string is empty.
    #[error("cart item id cannot be empty")]
    Empty,
    /// The `local_` suffix is not a non-negative integer.
    #[error("invalid local cart item id: {0}")]
    InvalidLocal(String),
    /// The input is neither a local id nor a UUID.
    #[error("invalid cart item id: {0}")]
    Invalid(String),
}

/// Identity of a cart line.
///
/// Lines stored in the remote table carry the row's UUID. Lines in the
/// device-local cart carry a sequence number that is assigned once when the
/// line is created and rendered as `local_<n>`.
///
/// ```
/// use little_sprout_core::CartItemId;
///
/// let id: CartItemId = "local_3".parse().unwrap();
/// assert_eq!(id, CartItemId::Local(3));
/// assert_eq!(id.to_string(), "local_3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartItemId {
    /// Server-assigned row ID.
    Remote(Uuid),
    /// Device-local line number.
    Local(u64),
}

impl CartItemId {
    /// Returns `true` for lines held in the device-local cart.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Parse a cart item ID from its string form.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, has a malformed `local_`
    /// suffix, or is not a UUID.
    pub fn parse(s: &str) -> Result<Self, LineIdError> {
        if s.is_empty() {
            return Err(LineIdError::Empty);
        }

        if let Some(rest) = s.strip_prefix(LOCAL_PREFIX) {
            return rest
                .parse::<u64>()
                .map(Self::Local)
                .map_err(|_| LineIdError::InvalidLocal(s.to_owned()));
        }

        Uuid::parse_str(s)
            .map(Self::Remote)
            .map_err(|_| LineIdError::Invalid(s.to_owned()))
    }
}

impl fmt::Display for CartItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{id}"),
            Self::Local(n) => write!(f, "{LOCAL_PREFIX}{n}"),
        }
    }
}

impl FromStr for CartItemId {
    type Err = LineIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CartItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CartItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_ids_are_distinct_types() {
        let product = ProductId::new("p1");
        assert_eq!(product.as_str(), "p1");
        assert_eq!(product.to_string(), "p1");
        assert_eq!(ProductId::from("p1"), product);
    }

    #[test]
    fn test_text_id_serde_transparent() {
        let id = UserId::new("user-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"user-42\"");
        let back: UserId = serde_json::from_str("\"user-42\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_parse_local_id() {
        assert_eq!(CartItemId::parse("local_0").unwrap(), CartItemId::Local(0));
        assert_eq!(CartItemId::parse("local_17").unwrap(), CartItemId::Local(17));
        assert!(CartItemId::parse("local_0").unwrap().is_local());
    }

    #[test]
    fn test_parse_local_id_invalid_suffix() {
        assert!(matches!(
            CartItemId::parse("local_"),
            Err(LineIdError::InvalidLocal(_))
        ));
        assert!(matches!(
            CartItemId::parse("local_-1"),
            Err(LineIdError::InvalidLocal(_))
        ));
        assert!(matches!(
            CartItemId::parse("local_abc"),
            Err(LineIdError::InvalidLocal(_))
        ));
    }

    #[test]
    fn test_parse_remote_id() {
        let uuid = Uuid::new_v4();
        let id = CartItemId::parse(&uuid.to_string()).unwrap();
        assert_eq!(id, CartItemId::Remote(uuid));
        assert!(!id.is_local());
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(CartItemId::parse(""), Err(LineIdError::Empty));
        assert!(matches!(
            CartItemId::parse("not-an-id"),
            Err(LineIdError::Invalid(_))
        ));
    }

    #[test]
    fn test_cart_item_id_serializes_as_string() {
        let json = serde_json::to_string(&CartItemId::Local(2)).unwrap();
        assert_eq!(json, "\"local_2\"");
        let back: CartItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CartItemId::Local(2));
    }
}
