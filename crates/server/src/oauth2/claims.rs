//! Claims model for issued tokens.
//!
//! An [`IdentityClaims`] is built fresh for every issuance and wrapped in a
//! [`ClaimsPrincipal`]. The principal is what gets bound to an issued token
//! pair, so it round-trips through JSON.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const CLAIM_SUBJECT: &str = "sub";
pub const CLAIM_NAME: &str = "name";
pub const CLAIM_USER_ID: &str = "user_id";
pub const CLAIM_CLINIC_ID: &str = "clinic_id";
pub const CLAIM_ROLE: &str = "role";

pub const SCOPE_OPENID: &str = "openid";
pub const SCOPE_PROFILE: &str = "profile";
pub const SCOPE_OFFLINE_ACCESS: &str = "offline_access";

/// Token(s) a claim is embedded in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    AccessToken,
    IdentityToken,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimValue {
    pub value: String,
    #[serde(default)]
    pub destinations: BTreeSet<Destination>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    claims: BTreeMap<String, ClaimValue>,
    scopes: BTreeSet<String>,
}

impl IdentityClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single-valued claim, replacing any previous value.
    /// `None` removes the claim.
    pub fn set_claim(&mut self, claim_type: &str, value: Option<impl Into<String>>) {
        match value {
            Some(v) => {
                self.claims.insert(
                    claim_type.to_string(),
                    ClaimValue {
                        value: v.into(),
                        destinations: BTreeSet::new(),
                    },
                );
            }
            None => {
                self.claims.remove(claim_type);
            }
        }
    }

    pub fn get(&self, claim_type: &str) -> Option<&str> {
        self.claims.get(claim_type).map(|c| c.value.as_str())
    }

    pub fn claims(&self) -> impl Iterator<Item = (&str, &ClaimValue)> {
        self.claims.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn set_scopes<I, S>(&mut self, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Route every claim through `selector` to decide which tokens carry it.
    pub fn set_destinations<F>(&mut self, selector: F)
    where
        F: Fn(&str, &IdentityClaims) -> Vec<Destination>,
    {
        let routed: Vec<(String, BTreeSet<Destination>)> = self
            .claims
            .keys()
            .map(|k| (k.clone(), selector(k, self).into_iter().collect()))
            .collect();
        for (claim_type, destinations) in routed {
            if let Some(claim) = self.claims.get_mut(&claim_type) {
                claim.destinations = destinations;
            }
        }
    }

    /// Claims embedded in the given token, keyed by claim type.
    pub fn for_destination(&self, destination: Destination) -> BTreeMap<&str, &str> {
        self.claims
            .iter()
            .filter(|(_, c)| c.destinations.contains(&destination))
            .map(|(k, c)| (k.as_str(), c.value.as_str()))
            .collect()
    }
}

/// The principal handed back to the HTTP layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsPrincipal {
    /// Authentication type the identity was created under
    pub authentication_type: String,
    pub identity: IdentityClaims,
}

impl ClaimsPrincipal {
    pub fn new(authentication_type: impl Into<String>, identity: IdentityClaims) -> Self {
        Self {
            authentication_type: authentication_type.into(),
            identity,
        }
    }

    pub fn claim(&self, claim_type: &str) -> Option<&str> {
        self.identity.get(claim_type)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
