//! Closed variant fields and their canonical string tokens.
//!
//! Each enum owns exactly one token table. The same table drives `as_str`,
//! parsing of caller input, and serde in both directions, so a value that
//! serializes can always be read back and an unknown token is always an
//! [`InvalidVariant`].

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    ProtocolType,
    Scope,
    ParticipantRole,
    CollaborationMode,
}

impl VariantKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            VariantKind::ProtocolType => "protocol type",
            VariantKind::Scope => "scope",
            VariantKind::ParticipantRole => "participant role",
            VariantKind::CollaborationMode => "collaboration mode",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value '{raw}'; expected one of: {expected:?}")]
pub struct InvalidVariant {
    kind: VariantKind,
    raw: String,
    expected: &'static [&'static str],
}

impl InvalidVariant {
    #[must_use]
    pub fn new(kind: VariantKind, raw: impl Into<String>, expected: &'static [&'static str]) -> Self {
        Self {
            kind,
            raw: raw.into(),
            expected,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> VariantKind {
        self.kind
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub const fn expected(&self) -> &'static [&'static str] {
        self.expected
    }
}

macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:expr, $values:ident {
            $($(#[$vmeta:meta])* $variant:ident => $token:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        const $values: &[&str] = &[$($token),+];

        impl $name {
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }

            #[must_use]
            pub const fn all() -> &'static [$name] {
                &[$($name::$variant),+]
            }

            pub fn parse(raw: &str) -> Result<Self, InvalidVariant> {
                let trimmed = raw.trim();
                match trimmed.to_ascii_lowercase().as_str() {
                    $($token => Ok($name::$variant),)+
                    _ => Err(InvalidVariant::new($kind, trimmed, $values)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = InvalidVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(D::Error::custom)
            }
        }
    };
}

token_enum!(
    /// What kind of collaboration a protocol coordinates.
    ProtocolType, VariantKind::ProtocolType, PROTOCOL_TYPE_VALUES {
        #[default]
        Technical => "technical",
        Social => "social",
        Scientific => "scientific",
        Hybrid => "hybrid",
    }
);

token_enum!(
    ProtocolScope, VariantKind::Scope, SCOPE_VALUES {
        Narrow => "narrow",
        Broad => "broad",
        /// Trial run with a reduced participant set.
        Pilot => "pilot",
        #[default]
        Standard => "standard",
    }
);

token_enum!(
    ParticipantRole, VariantKind::ParticipantRole, ROLE_VALUES {
        Initiator => "initiator",
        #[default]
        Contributor => "contributor",
        Reviewer => "reviewer",
        Approver => "approver",
    }
);

token_enum!(
    /// How participants work together while the protocol runs.
    CollaborationMode, VariantKind::CollaborationMode, COLLABORATION_MODE_VALUES {
        Synchronous => "synchronous",
        Asynchronous => "asynchronous",
        #[default]
        Hybrid => "hybrid",
    }
);
