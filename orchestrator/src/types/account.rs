use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::job::JobError;

/// Identity the jobs are scoped to. Rendered as a checksummed `0x` address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(Address);

impl AccountId {
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    pub fn address(&self) -> Address {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<Address> for AccountId {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_str(s.trim()).map(Self).map_err(|_| JobError::InvalidAccountId { id: s.to_string() })
    }
}
