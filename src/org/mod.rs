//! Organization identity reconciliation
//!
//! The registry is keyed by canonical name (after alias resolution). During
//! the warm-up pass the first `OrganizationRef` seen for a canonical name is
//! stored; the export pass then rewrites every employment to that entry so
//! one real-world organization ends up as one graph node.

pub mod alias;

pub use alias::{AliasError, AliasResult, AliasTable};

use indexmap::IndexMap;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::debug;

use crate::record::{OrganizationRef, PersonRecord};

/// Organization registry errors
#[derive(Error, Debug)]
pub enum OrgError {
    /// The export pass met a name that warm-up never registered
    #[error("Organization {0:?} was not registered during warm-up")]
    UnresolvedOrganization(String),
}

pub type OrgResult<T> = Result<T, OrgError>;

/// Stable org_id for an organization without a source id: hex SHA-1 of the name
pub fn derive_org_id(name: &str) -> String {
    format!("{:x}", Sha1::digest(name.as_bytes()))
}

/// First-seen organization per canonical name
#[derive(Debug, Default)]
pub struct OrganizationRegistry {
    aliases: AliasTable,
    entries: IndexMap<String, OrganizationRef>,
}

impl OrganizationRegistry {
    pub fn new(aliases: AliasTable) -> Self {
        Self {
            aliases,
            entries: IndexMap::new(),
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Canonical name plus an org_id, derived when the source has none
    pub fn canonicalize(&self, organization: &OrganizationRef) -> OrganizationRef {
        let name = self.aliases.canonical(&organization.name).to_string();
        let org_id = if organization.has_org_id() {
            organization.org_id.clone()
        } else {
            derive_org_id(&name)
        };
        OrganizationRef { name, org_id }
    }

    /// Register every organization of the record. First seen wins.
    pub fn warm_up(&mut self, record: &PersonRecord) {
        for employment in &record.employments {
            let organization = self.canonicalize(&employment.organization);
            if !self.entries.contains_key(&organization.name) {
                debug!("Registered organization {:?} ({})", organization.name, organization.org_id);
                self.entries.insert(organization.name.clone(), organization);
            }
        }
    }

    /// Registered entry for a raw (pre-alias) name
    pub fn resolve(&self, raw_name: &str) -> OrgResult<&OrganizationRef> {
        let name = self.aliases.canonical(raw_name);
        self.entries
            .get(name)
            .ok_or_else(|| OrgError::UnresolvedOrganization(name.to_string()))
    }

    /// Rewrite every employment's organization to its registered entry.
    ///
    /// The record is left untouched if any organization is unresolved.
    pub fn normalize(&self, record: &mut PersonRecord) -> OrgResult<()> {
        let resolved = record
            .employments
            .iter()
            .map(|e| self.resolve(&e.organization.name).cloned())
            .collect::<OrgResult<Vec<_>>>()?;

        for (employment, organization) in record.employments.iter_mut().zip(resolved) {
            employment.organization = organization;
        }
        Ok(())
    }

    /// Entries in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &OrganizationRef> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
