//! The authenticated caller as seen by the order core.

use std::str::FromStr;

use common::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    B2bCustomer,
    B2cCustomer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::B2bCustomer => "b2b_customer",
            Role::B2cCustomer => "b2c_customer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "b2b_customer" => Ok(Role::B2bCustomer),
            "b2c_customer" => Ok(Role::B2cCustomer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// An authenticated user and their role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The channel orders placed by this principal are priced in.
    ///
    /// Only business customers get B2B pricing; administrators ordering for
    /// themselves pay consumer prices.
    pub fn channel(&self) -> Channel {
        match self.role {
            Role::B2bCustomer => Channel::B2b,
            Role::Admin | Role::B2cCustomer => Channel::B2c,
        }
    }
}
