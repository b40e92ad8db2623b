//! Numeric identifiers for every persisted entity.
//!
//! Ids are allocated by the store from a monotonic sequence. User ids come from
//! the upstream authentication layer and are taken at face value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(&self) -> u64 {
                self.0
            }

            /// Big-endian key bytes, so that byte order matches numeric order.
            pub fn to_key(&self) -> [u8; 8] {
                self.0.to_be_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(
    /// A DAO (community organisation).
    DaoId
);
define_id!(
    /// A user, as resolved by the authentication layer.
    UserId
);
define_id!(
    /// A governance proposal.
    ProposalId
);
define_id!(
    /// A vote delegation record.
    DelegationId
);
define_id!(
    /// An execution queue entry.
    EntryId
);
