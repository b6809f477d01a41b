//! Strongly-typed identifiers for remote automation objects.
//!
//! The server assigns these after creation, so they are distinct from the
//! identity keys used for client-side locking.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

macro_rules! uuid_type {
    ($(#[$meta:meta])* $name:ident, $doc:expr) => {
        $(#[$meta])*
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wraps an existing [`Uuid`].
            #[must_use]
            pub const fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Creates a new random identifier (v4).
            #[must_use]
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the inner [`Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parses an identifier from a string.
            ///
            /// # Errors
            ///
            /// Returns [`Error::InvalidUuid`] if the string is not a valid UUID.
            pub fn parse_str(input: &str) -> Result<Self> {
                Uuid::parse_str(input)
                    .map(Self)
                    .map_err(|_| Error::InvalidUuid(input.to_string()))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse_str(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_type!(ActionId, "Orchestrator action identifier");
uuid_type!(WorkflowId, "Orchestrator workflow identifier");
uuid_type!(ConfigElementId, "Orchestrator configuration element identifier");
uuid_type!(CategoryId, "Orchestrator category (folder) identifier");
