//! Per-instance metadata cache.
//!
//! A cache lives exactly as long as the provider instance that owns it, and
//! every instance is created with a fresh [`Epoch`]. Entries are written once
//! per epoch; results tagged with any other epoch are refused.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use crate::{error::StaleEpochError, model::VariableSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epoch(pub u64);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub model: String,
    pub domain: String,
}

impl CacheKey {
    pub fn new(model: impl Into<String>, domain: impl Into<String>) -> Self {
        Self { model: model.into(), domain: domain.into() }
    }
}

/// Permission to fetch one key, handed out at most once per key per epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub provider: String,
    pub epoch: Epoch,
    pub key: CacheKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    Cached(VariableSet),
    /// Another ticket for this key is outstanding.
    InFlight,
    Fetch(FetchTicket),
}

#[derive(Debug)]
pub struct MetadataCache {
    provider: String,
    epoch: Epoch,
    entries: HashMap<CacheKey, VariableSet>,
    in_flight: HashSet<CacheKey>,
}

impl MetadataCache {
    pub fn new(provider: impl Into<String>, epoch: Epoch) -> Self {
        Self {
            provider: provider.into(),
            epoch,
            entries: HashMap::new(),
            in_flight: HashSet::new(),
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn get(&self, key: &CacheKey) -> Option<&VariableSet> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn begin(&mut self, key: CacheKey) -> FetchPlan {
        if let Some(vars) = self.entries.get(&key) {
            return FetchPlan::Cached(vars.clone());
        }

        if !self.in_flight.insert(key.clone()) {
            return FetchPlan::InFlight;
        }

        FetchPlan::Fetch(FetchTicket { provider: self.provider.clone(), epoch: self.epoch, key })
    }

    /// Store the result for `ticket`. An entry already present for the key
    /// wins over the new value.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        vars: VariableSet,
    ) -> Result<&VariableSet, StaleEpochError> {
        self.check_epoch(ticket)?;
        self.in_flight.remove(&ticket.key);

        Ok(self.entries.entry(ticket.key.clone()).or_insert(vars))
    }

    /// Store `vars` for `key` without a ticket, for callers that hold the cache
    /// exclusively across the fetch. Outstanding tickets are left alone and an
    /// existing entry wins.
    pub fn fill(&mut self, key: CacheKey, vars: VariableSet) -> &VariableSet {
        self.entries.entry(key).or_insert(vars)
    }

    /// Release the in-flight mark after a failed fetch. Nothing is cached.
    pub fn abandon(&mut self, ticket: &FetchTicket) -> Result<(), StaleEpochError> {
        self.check_epoch(ticket)?;
        self.in_flight.remove(&ticket.key);
        Ok(())
    }

    fn check_epoch(&self, ticket: &FetchTicket) -> Result<(), StaleEpochError> {
        if ticket.epoch != self.epoch || ticket.provider != self.provider {
            return Err(StaleEpochError {
                provider: ticket.provider.clone(),
                model: ticket.key.model.clone(),
                ticket_epoch: ticket.epoch,
                current_epoch: self.epoch,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(names: &[&str]) -> VariableSet {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn ticket(plan: FetchPlan) -> FetchTicket {
        match plan {
            FetchPlan::Fetch(t) => t,
            other => panic!("expected a ticket, got {other:?}"),
        }
    }

    #[test]
    fn miss_then_hit() {
        let mut cache = MetadataCache::new("AWS API", Epoch(1));
        let key = CacheKey::new("gso", "australia");

        let t = ticket(cache.begin(key.clone()));
        cache.complete(&t, vars(&["t2", "ws10"])).unwrap();

        assert_eq!(cache.begin(key), FetchPlan::Cached(vars(&["t2", "ws10"])));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn second_begin_while_in_flight_gets_no_ticket() {
        let mut cache = MetadataCache::new("AWS API", Epoch(1));
        let key = CacheKey::new("access-ce", "brisbane");

        let _t = ticket(cache.begin(key.clone()));
        assert_eq!(cache.begin(key), FetchPlan::InFlight);
    }

    #[test]
    fn abandon_releases_key_without_caching() {
        let mut cache = MetadataCache::new("AWS API", Epoch(1));
        let key = CacheKey::new("access-g", "brisbane");

        let t = ticket(cache.begin(key.clone()));
        cache.abandon(&t).unwrap();

        assert!(cache.is_empty());
        assert!(matches!(cache.begin(key), FetchPlan::Fetch(_)));
    }

    #[test]
    fn fill_keeps_existing_entry_and_outstanding_ticket() {
        let mut cache = MetadataCache::new("AWS API", Epoch(1));
        let key = CacheKey::new("gso", "australia");

        let t = ticket(cache.begin(key.clone()));
        assert_eq!(cache.fill(key.clone(), vars(&["t2"])), &vars(&["t2"]));
        assert_eq!(cache.fill(key.clone(), vars(&["other"])), &vars(&["t2"]));

        // The ticket still completes; the filled entry wins.
        assert_eq!(cache.complete(&t, vars(&["late"])).unwrap(), &vars(&["t2"]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn stale_epoch_is_refused() {
        let mut old = MetadataCache::new("AWS API", Epoch(1));
        let t = ticket(old.begin(CacheKey::new("access-ce", "brisbane")));

        let mut fresh = MetadataCache::new("AWS API", Epoch(2));
        let err = fresh.complete(&t, vars(&["t2"])).unwrap_err();

        assert_eq!(err.ticket_epoch, Epoch(1));
        assert_eq!(err.current_epoch, Epoch(2));
        assert!(fresh.is_empty());
    }

    #[test]
    fn populated_entry_is_immutable_for_the_epoch() {
        let mut cache = MetadataCache::new("AWS API", Epoch(4));
        let key = CacheKey::new("gso", "australia");

        let t = ticket(cache.begin(key.clone()));
        cache.complete(&t, vars(&["t2"])).unwrap();
        let stored = cache.complete(&t, vars(&["other"])).unwrap();

        assert_eq!(stored, &vars(&["t2"]));
    }
}
