use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{Applicant, ApplicantId, NetId, NewApplicant};
use super::mapping::{CanonicalField, ResolvedMapping};
use super::parser::CsvRow;
use super::repository::{IntakeStore, StoreError};

/// Applicant the caller already knows about, keyed by net id in the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownApplicant {
    pub applicant_id: ApplicantId,
    #[serde(default)]
    pub name: Option<String>,
}

/// Where a row's applicant identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Cache,
    Store,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub applicant_id: ApplicantId,
    pub net_id: NetId,
    pub source: IdentitySource,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("missing net id")]
    MissingNetId,
    #[error("could not resolve applicant {net_id}: {source}")]
    Store { net_id: NetId, source: StoreError },
}

/// Request-scoped net id to applicant cache.
///
/// Keys go through [`NetId::parse`], the same normalization the store uses, so
/// a hit always names the applicant a store lookup would have returned.
#[derive(Debug, Clone, Default)]
pub struct IdentityCache {
    entries: HashMap<NetId, ApplicantId>,
}

impl IdentityCache {
    pub fn from_known(known: &BTreeMap<String, KnownApplicant>) -> Self {
        let entries = known
            .iter()
            .filter_map(|(raw, applicant)| {
                NetId::parse(raw).map(|net_id| (net_id, applicant.applicant_id.clone()))
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, net_id: &NetId) -> Option<&ApplicantId> {
        self.entries.get(net_id)
    }

    fn remember(&mut self, net_id: NetId, applicant_id: ApplicantId) {
        self.entries.insert(net_id, applicant_id);
    }

    /// Distinct applicant ids the cache currently vouches for.
    pub fn applicant_ids(&self) -> Vec<ApplicantId> {
        let ids: BTreeSet<&ApplicantId> = self.entries.values().collect();
        ids.into_iter().cloned().collect()
    }

    /// Keeps only entries whose id exists in `confirmed` under the same net
    /// id. Returns how many entries were dropped.
    pub fn retain_confirmed(&mut self, confirmed: &[Applicant]) -> usize {
        let net_ids: HashMap<&ApplicantId, &NetId> = confirmed
            .iter()
            .map(|applicant| (&applicant.id, &applicant.net_id))
            .collect();
        let before = self.entries.len();
        self.entries
            .retain(|net_id, applicant_id| net_ids.get(&*applicant_id) == Some(&net_id));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves rows to applicant ids: cache first, then store lookup, then
/// creation. Identities resolved through the store are added to the cache so
/// repeated net ids in one batch never hit the store twice.
pub struct IdentityResolver<'s, S: ?Sized> {
    store: &'s S,
    cache: IdentityCache,
}

impl<'s, S> IdentityResolver<'s, S>
where
    S: IntakeStore + ?Sized,
{
    pub fn new(store: &'s S, cache: IdentityCache) -> Self {
        Self { store, cache }
    }

    pub fn resolve(
        &mut self,
        row: &CsvRow,
        mapping: &ResolvedMapping,
    ) -> Result<ResolvedIdentity, IdentityError> {
        let net_id = mapping
            .value(row, CanonicalField::NetId)
            .and_then(NetId::parse)
            .ok_or(IdentityError::MissingNetId)?;

        if let Some(applicant_id) = self.cache.get(&net_id) {
            return Ok(ResolvedIdentity {
                applicant_id: applicant_id.clone(),
                net_id,
                source: IdentitySource::Cache,
            });
        }

        let name = mapping
            .value(row, CanonicalField::Name)
            .map(|name| name.to_string());
        let (applicant_id, source) = self
            .lookup_or_create(&net_id, name)
            .map_err(|source| IdentityError::Store {
                net_id: net_id.clone(),
                source,
            })?;

        debug!(row = row.number, %net_id, ?source, "resolved applicant through store");
        self.cache.remember(net_id.clone(), applicant_id.clone());
        Ok(ResolvedIdentity {
            applicant_id,
            net_id,
            source,
        })
    }

    fn lookup_or_create(
        &self,
        net_id: &NetId,
        name: Option<String>,
    ) -> Result<(ApplicantId, IdentitySource), StoreError> {
        if let Some(applicant) = self.store.applicant_by_net_id(net_id)? {
            return Ok((applicant.id, IdentitySource::Store));
        }

        let created = self.store.create_applicant(NewApplicant {
            net_id: net_id.clone(),
            name,
        });
        match created {
            Ok(applicant) => Ok((applicant.id, IdentitySource::Created)),
            // Lost a creation race; the winner's row is now visible.
            Err(StoreError::Conflict) => self
                .store
                .applicant_by_net_id(net_id)?
                .map(|applicant| (applicant.id, IdentitySource::Store))
                .ok_or(StoreError::Conflict),
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::intake::memory::MemoryIntakeStore;
    use crate::workflows::intake::parser::parse_text;

    fn mapping_for(headers: &[String]) -> ResolvedMapping {
        let mappings = [("netid", "net_id"), ("name", "name")]
            .iter()
            .map(|(h, t)| (h.to_string(), t.to_string()))
            .collect();
        crate::workflows::intake::mapping::resolve(headers, &mappings, &[CanonicalField::NetId], &[])
            .expect("mapping")
    }

    #[test]
    fn blank_net_id_is_a_row_error() {
        let table = parse_text("netid,name\n  ,Ann\n").expect("parse");
        let mapping = mapping_for(&table.headers);
        let store = MemoryIntakeStore::default();
        let mut resolver = IdentityResolver::new(&store, IdentityCache::default());

        let error = resolver
            .resolve(&table.rows[0], &mapping)
            .expect_err("blank net id");
        assert!(matches!(error, IdentityError::MissingNetId));
        assert_eq!(error.to_string(), "missing net id");
    }

    #[test]
    fn unknown_net_id_creates_applicant_once() {
        let table = parse_text("netid,name\nab1,Ann\nAB1,Ann B\n").expect("parse");
        let mapping = mapping_for(&table.headers);
        let store = MemoryIntakeStore::default();
        let mut resolver = IdentityResolver::new(&store, IdentityCache::default());

        let first = resolver.resolve(&table.rows[0], &mapping).expect("first");
        let second = resolver.resolve(&table.rows[1], &mapping).expect("second");

        assert_eq!(first.source, IdentitySource::Created);
        assert_eq!(second.source, IdentitySource::Cache);
        assert_eq!(first.applicant_id, second.applicant_id);
        assert_eq!(store.applicant_count(), 1);
        let stored = store
            .applicant_by_net_id(&first.net_id)
            .expect("lookup")
            .expect("present");
        assert_eq!(stored.name.as_deref(), Some("Ann"));
    }

    #[test]
    fn cache_hit_matches_store_lookup() {
        let table = parse_text("netid,name\nab1,Ann\n").expect("parse");
        let mapping = mapping_for(&table.headers);
        let store = MemoryIntakeStore::default();
        let existing = store
            .create_applicant(NewApplicant {
                net_id: NetId::parse("ab1").expect("net id"),
                name: Some("Ann".to_string()),
            })
            .expect("seed");

        let mut known = BTreeMap::new();
        known.insert(
            " AB1".to_string(),
            KnownApplicant {
                applicant_id: existing.id.clone(),
                name: Some("Ann".to_string()),
            },
        );

        let cached = IdentityResolver::new(&store, IdentityCache::from_known(&known))
            .resolve(&table.rows[0], &mapping)
            .expect("cached");
        let direct = IdentityResolver::new(&store, IdentityCache::default())
            .resolve(&table.rows[0], &mapping)
            .expect("direct");

        assert_eq!(cached.source, IdentitySource::Cache);
        assert_eq!(direct.source, IdentitySource::Store);
        assert_eq!(cached.applicant_id, direct.applicant_id);
    }

    #[test]
    fn retain_confirmed_drops_unknown_and_mismatched_entries() {
        let store = MemoryIntakeStore::default();
        let ann = store
            .create_applicant(NewApplicant {
                net_id: NetId::parse("ab1").expect("net id"),
                name: None,
            })
            .expect("seed");

        let mut known = BTreeMap::new();
        for (net_id, applicant_id) in [
            ("ab1", ann.id.clone()),
            ("cd2", ann.id.clone()),
            ("ef3", ApplicantId("applicant-gone".to_string())),
        ] {
            known.insert(
                net_id.to_string(),
                KnownApplicant {
                    applicant_id,
                    name: None,
                },
            );
        }

        let mut cache = IdentityCache::from_known(&known);
        assert_eq!(cache.applicant_ids().len(), 2);
        let confirmed = store
            .applicants_by_ids(&cache.applicant_ids())
            .expect("lookup");

        assert_eq!(cache.retain_confirmed(&confirmed), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&ann.net_id), Some(&ann.id));
    }
}
