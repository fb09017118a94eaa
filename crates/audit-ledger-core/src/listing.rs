//! Property listing snapshots.
//!
//! Record-management code logs the full listing on create and update, and an
//! empty change set with no actor on delete.

use serde::{Deserialize, Serialize};

use crate::changes::ChangeSet;
use crate::entry::Actor;
use crate::error::CoreError;

/// The person who owns a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
}

impl Owner {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
        }
    }
}

impl From<&Owner> for Actor {
    fn from(owner: &Owner) -> Self {
        Actor {
            id: owner.id.clone(),
            name: Some(owner.name.clone()),
            email: Some(owner.email.clone()),
        }
    }
}

/// A property listing as logged into its audit ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyListing {
    pub owner: Owner,
    /// `"sale"` or `"rent"`.
    pub buyer_intent: String,
    pub location: String,
    pub verification: Option<String>,
    pub terms: String,
}

impl PropertyListing {
    /// Full snapshot of the listing as a change set.
    pub fn to_changes(&self) -> Result<ChangeSet, CoreError> {
        ChangeSet::from_serializable(self)
    }

    /// The actor credited with mutations made by the owner.
    pub fn owner_actor(&self) -> Actor {
        Actor::from(&self.owner)
    }
}

/// Change set logged when a listing is deleted.
pub fn deletion_changes() -> ChangeSet {
    ChangeSet::new()
}
