//! Strongly-typed identifiers for records owned by the identity platform.
//!
//! The platform assigns these (e.g. `auth0|64f0c2...`, `rol_4DzcNQ...`), so they
//! are opaque strings here: never parsed, only carried.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a user account in the identity platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// Identifier of a role in the identity platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a platform-assigned identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::EmptyId { kind: $name });
                }
                Ok(Self(trimmed.to_string()))
            }
        }
    };
}

impl_string_newtype!(UserId, "UserId");
impl_string_newtype!(RoleId, "RoleId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_blank_ids() {
        assert!("   ".parse::<UserId>().is_err());
        assert_eq!(
            "".parse::<RoleId>(),
            Err(DomainError::EmptyId { kind: "RoleId" })
        );
    }

    #[test]
    fn parse_keeps_vendor_prefix() {
        let id: UserId = " auth0|abc123 ".parse().unwrap();
        assert_eq!(id.as_str(), "auth0|abc123");
        assert_eq!(id.to_string(), "auth0|abc123");
    }

    #[test]
    fn serializes_transparently() {
        let id = RoleId::new("rol_1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"rol_1\"");
    }
}
