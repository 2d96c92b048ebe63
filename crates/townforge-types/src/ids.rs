//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity the engine touches has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. All IDs use UUID v7
//! (time-ordered) for efficient database indexing on the host side.
//!
//! The `new()` constructors exist for cases where engine-side generation
//! is needed (e.g. tests, in-memory stubs).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an agent.
    AgentId
}

define_id! {
    /// Unique identifier for a town.
    TownId
}

define_id! {
    /// Unique identifier for a plot of land inside a town.
    PlotId
}

define_id! {
    /// Unique identifier for a logged town event.
    EventId
}

define_id! {
    /// Unique identifier for an owner command.
    CommandId
}

define_id! {
    /// Unique identifier for a PvP match.
    MatchId
}

define_id! {
    /// Unique identifier for an AMM swap.
    SwapId
}
