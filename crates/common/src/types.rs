use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses an identifier from its hyphenated string form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identifier of an authenticated shopper, as issued by the auth layer.
    UserId
);

uuid_id!(
    /// A purchasable product variant. This is the stable key the store uses for cart lines.
    VariantId
);

uuid_id!(
    /// A combo (bundle) product definition.
    ComboId
);

uuid_id!(
    /// Groups the cart rows produced by adding one combo instance.
    ///
    /// All rows sharing a group id are added and removed together.
    ComboGroupId
);

uuid_id!(
    /// Store-assigned cart identifier. Absent until the first item is added.
    CartId
);

uuid_id!(
    /// Store-assigned identifier of a single cart row.
    CartItemId
);

/// Maximum accepted length of a guest token.
pub const GUEST_TOKEN_MAX_LEN: usize = 128;

/// Errors produced when accepting a client-supplied guest token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuestTokenError {
    #[error("guest token is empty")]
    Empty,

    #[error("guest token exceeds {GUEST_TOKEN_MAX_LEN} characters")]
    TooLong,

    #[error("guest token contains whitespace or control characters")]
    InvalidCharacters,
}

/// Opaque token identifying an unauthenticated shopper's cart.
///
/// Minted client-side on first cart interaction. The server never registers it
/// until the first cart write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GuestToken(String);

impl GuestToken {
    /// Accepts a client-supplied token after trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, GuestTokenError> {
        let token = raw.trim();
        if token.is_empty() {
            return Err(GuestTokenError::Empty);
        }
        if token.len() > GUEST_TOKEN_MAX_LEN {
            return Err(GuestTokenError::TooLong);
        }
        if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(GuestTokenError::InvalidCharacters);
        }
        Ok(Self(token.to_string()))
    }

    /// Mints a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GuestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for GuestToken {
    type Error = GuestTokenError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<GuestToken> for String {
    fn from(token: GuestToken) -> Self {
        token.0
    }
}

impl AsRef<str> for GuestToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(UserId::new(), UserId::new());
        assert_ne!(ComboGroupId::new(), ComboGroupId::new());
    }

    #[test]
    fn id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(VariantId::from_uuid(uuid).as_uuid(), uuid);
    }

    #[test]
    fn id_parse_accepts_display_form() {
        let id = CartItemId::new();
        assert_eq!(CartItemId::parse(&id.to_string()).unwrap(), id);
        assert!(CartItemId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = ComboId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn guest_token_is_trimmed() {
        let token = GuestToken::parse("  abc-123 \n").unwrap();
        assert_eq!(token.as_str(), "abc-123");
    }

    #[test]
    fn guest_token_rejects_bad_input() {
        assert_eq!(GuestToken::parse("   "), Err(GuestTokenError::Empty));
        assert_eq!(
            GuestToken::parse(&"x".repeat(GUEST_TOKEN_MAX_LEN + 1)),
            Err(GuestTokenError::TooLong)
        );
        assert_eq!(
            GuestToken::parse("abc def"),
            Err(GuestTokenError::InvalidCharacters)
        );
    }

    #[test]
    fn guest_token_generate_is_parseable() {
        let token = GuestToken::generate();
        assert_eq!(GuestToken::parse(token.as_str()).unwrap(), token);
    }

    #[test]
    fn guest_token_deserialization_validates() {
        let ok: GuestToken = serde_json::from_str("\"tok\"").unwrap();
        assert_eq!(ok.as_str(), "tok");
        assert!(serde_json::from_str::<GuestToken>("\"\"").is_err());
    }
}
