//! Identity Resolver: one stable synthetic identifier per real-world customer.
//!
//! Identifiers come from the external profile reference when a row has one and
//! from the primary phone number otherwise. Reference keys and phone keys live
//! in separate namespaces of the same [`IdentityMap`] so a phone that happens
//! to equal some reference string never collides with it.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, info_span, Span};
use uuid::Uuid;

use crate::domain::{EntitySets, IdentitySignals};
use crate::metrics::IdentityMetrics;

/// Namespace for phone-derived identifiers. Fixed so the same phone always
/// yields the same identifier across runs.
pub const PHONE_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2d3e_8a4b_5c6d_9e0f_1a2b_3c4d_5e6f);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Reference(String),
    Phone(String),
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Reference(r) => write!(f, "profile:{r}"),
            IdentityKey::Phone(p) => write!(f, "number:{p}"),
        }
    }
}

/// Source of fresh synthetic identifiers
pub trait IdMinter {
    fn mint(&mut self, key: &IdentityKey) -> String;
}

/// Time-ordered UUIDv7 for references, namespaced UUIDv5 for phones
#[derive(Debug, Default)]
pub struct UuidMinter;

impl IdMinter for UuidMinter {
    fn mint(&mut self, key: &IdentityKey) -> String {
        match key {
            IdentityKey::Reference(_) => Uuid::now_v7().to_string(),
            IdentityKey::Phone(phone) => Uuid::new_v5(&PHONE_ID_NAMESPACE, phone.as_bytes()).to_string(),
        }
    }
}

/// Mapping from identity keys to synthetic identifiers. The first identifier
/// recorded for a key is kept for the rest of the run.
#[derive(Debug, Default, Clone)]
pub struct IdentityMap {
    ids: HashMap<IdentityKey, String>,
    minted_references: usize,
    minted_phones: usize,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an existing assignment. Ignored when the key is already mapped.
    pub fn seed(&mut self, key: IdentityKey, id: String) -> bool {
        if self.ids.contains_key(&key) {
            return false;
        }
        self.ids.insert(key, id);
        true
    }

    pub fn get_or_mint(&mut self, key: IdentityKey, minter: &mut dyn IdMinter) -> &str {
        let minted = match &key {
            IdentityKey::Reference(_) => &mut self.minted_references,
            IdentityKey::Phone(_) => &mut self.minted_phones,
        };
        self.ids.entry(key).or_insert_with_key(|key| {
            *minted += 1;
            minter.mint(key)
        })
        .as_str()
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&str> {
        self.ids.get(key).map(String::as_str)
    }

    /// Reference mapping first, then the phone mapping.
    pub fn resolve(&self, profile_id: Option<&str>, number: Option<&str>) -> Option<&str> {
        profile_id
            .and_then(|p| self.get(&IdentityKey::Reference(p.to_string())))
            .or_else(|| number.and_then(|n| self.get(&IdentityKey::Phone(n.to_string()))))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn minted(&self) -> (usize, usize) {
        (self.minted_references, self.minted_phones)
    }

    /// Build the map for a customer set.
    ///
    /// Existing (reference, customerId) and (phone, customerId) pairs seed the
    /// map first, so re-running over resolved data keeps its identifiers. Every
    /// other distinct reference is minted in input order, then every phone of
    /// a row without a reference.
    pub fn build<R: IdentitySignals>(customers: &[R], minter: &mut dyn IdMinter) -> Self {
        let mut map = Self::new();

        for row in customers {
            let Some(id) = row.customer_id() else { continue };
            match (row.profile_id(), row.number()) {
                (Some(profile), _) => {
                    map.seed(IdentityKey::Reference(profile.to_string()), id.to_string());
                }
                (None, Some(number)) => {
                    map.seed(IdentityKey::Phone(number.to_string()), id.to_string());
                }
                (None, None) => {}
            }
        }

        for profile in customers.iter().filter_map(|r| r.profile_id()) {
            map.get_or_mint(IdentityKey::Reference(profile.to_string()), minter);
        }
        for row in customers.iter().filter(|r| r.profile_id().is_none()) {
            if let Some(number) = row.number() {
                map.get_or_mint(IdentityKey::Phone(number.to_string()), minter);
            }
        }
        map
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub customers_in: usize,
    pub complaints_in: usize,
    pub reference_ids_minted: usize,
    pub phone_ids_minted: usize,
    pub unresolved_customers_dropped: usize,
    pub duplicate_customers_dropped: usize,
    pub orphan_complaints_dropped: usize,
    pub customers_out: usize,
    pub complaints_out: usize,
}

pub struct IdentityResolver<M: IdMinter = UuidMinter> {
    minter: M,
    span: Span,
}

impl IdentityResolver<UuidMinter> {
    pub fn new(parent: &Span) -> Self {
        Self::with_minter(UuidMinter, parent)
    }
}

impl<M: IdMinter> IdentityResolver<M> {
    pub fn with_minter(minter: M, parent: &Span) -> Self {
        Self {
            minter,
            span: info_span!(parent: parent, "identity"),
        }
    }

    /// Stamp every row with its resolved identifier, drop customers that cannot
    /// be identified, keep the first customer per identifier and restrict
    /// complaints to surviving customers.
    pub fn resolve(&mut self, entities: EntitySets) -> (EntitySets, ResolutionReport) {
        let _enter = self.span.enter();
        let EntitySets {
            mut customers,
            mut complaints,
        } = entities;

        let mut report = ResolutionReport {
            customers_in: customers.len(),
            complaints_in: complaints.len(),
            ..Default::default()
        };

        let map = IdentityMap::build(&customers, &mut self.minter);
        (report.reference_ids_minted, report.phone_ids_minted) = map.minted();
        debug!(keys = map.len(), "identity map built");

        stamp(&mut customers, &map);
        stamp(&mut complaints, &map);

        let before = customers.len();
        customers.retain(|c| c.customer_id().is_some() || c.profile_id().is_some() || c.number().is_some());
        report.unresolved_customers_dropped = before - customers.len();

        let before = customers.len();
        let mut seen: HashSet<Option<String>> = HashSet::with_capacity(before);
        customers.retain(|c| seen.insert(c.customer_id.clone()));
        report.duplicate_customers_dropped = before - customers.len();

        let surviving: HashSet<&str> = customers.iter().filter_map(|c| c.customer_id()).collect();
        let before = complaints.len();
        complaints.retain(|c| c.customer_id().is_some_and(|id| surviving.contains(id)));
        report.orphan_complaints_dropped = before - complaints.len();

        report.customers_out = customers.len();
        report.complaints_out = complaints.len();

        IdentityMetrics::record_ids_minted(report.reference_ids_minted, report.phone_ids_minted);
        IdentityMetrics::record_customers_dropped(report.unresolved_customers_dropped, report.duplicate_customers_dropped);
        IdentityMetrics::record_orphan_complaints_dropped(report.orphan_complaints_dropped);

        info!(
            customers = report.customers_out,
            complaints = report.complaints_out,
            duplicates_dropped = report.duplicate_customers_dropped,
            orphans_dropped = report.orphan_complaints_dropped,
            "Customer IDs assigned"
        );

        (EntitySets::new(customers, complaints), report)
    }
}

fn stamp<R: IdentitySignals>(rows: &mut [R], map: &IdentityMap) {
    for row in rows {
        let id = map.resolve(row.profile_id(), row.number()).map(str::to_string);
        row.set_customer_id(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComplaintRecord, CustomerRecord};

    /// Deterministic minter for assertions
    #[derive(Default)]
    struct SequentialMinter {
        next: usize,
    }

    impl IdMinter for SequentialMinter {
        fn mint(&mut self, key: &IdentityKey) -> String {
            self.next += 1;
            match key {
                IdentityKey::Reference(_) => format!("ref-{}", self.next),
                IdentityKey::Phone(_) => format!("phone-{}", self.next),
            }
        }
    }

    fn customer(profile: Option<&str>, number: Option<&str>) -> CustomerRecord {
        CustomerRecord {
            profile_id: profile.map(str::to_string),
            number: number.map(str::to_string),
            name: Some("Ama".to_string()),
            ..Default::default()
        }
    }

    fn complaint(profile: Option<&str>, number: Option<&str>) -> ComplaintRecord {
        ComplaintRecord {
            profile_id: profile.map(str::to_string),
            number: number.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_identity_map_first_seen_wins() {
        let mut minter = SequentialMinter::default();
        let mut map = IdentityMap::new();

        let first = map.get_or_mint(IdentityKey::Reference("P1".into()), &mut minter).to_string();
        let again = map.get_or_mint(IdentityKey::Reference("P1".into()), &mut minter).to_string();
        assert_eq!(first, again);
        assert!(!map.seed(IdentityKey::Reference("P1".into()), "other".into()));
        assert_eq!(map.minted(), (1, 0));
    }

    #[test]
    fn test_identity_map_namespaces_keys() {
        let mut minter = SequentialMinter::default();
        let mut map = IdentityMap::new();

        let by_ref = map.get_or_mint(IdentityKey::Reference("+233241234567".into()), &mut minter).to_string();
        let by_phone = map.get_or_mint(IdentityKey::Phone("+233241234567".into()), &mut minter).to_string();

        assert_ne!(by_ref, by_phone);
        assert_eq!(IdentityKey::Phone("x".into()).to_string(), "number:x");
    }

    #[test]
    fn test_build_prefers_existing_assignments() {
        let mut resolved = customer(Some("P1"), Some("+233241234567"));
        resolved.customer_id = Some("kept-id".to_string());
        let customers = vec![customer(Some("P1"), None), resolved];

        let map = IdentityMap::build(&customers, &mut SequentialMinter::default());

        assert_eq!(map.get(&IdentityKey::Reference("P1".into())), Some("kept-id"));
        assert_eq!(map.minted(), (0, 0));
    }

    #[test]
    fn test_resolve_shared_reference_and_drops() {
        let customers = vec![
            customer(Some("P1"), Some("+233241234567")),
            customer(Some("P1"), Some("+233201112223")),
            customer(None, Some("+233209999999")),
            customer(None, None),
        ];
        let complaints = vec![
            complaint(Some("P1"), None),
            complaint(None, Some("+233209999999")),
            complaint(None, Some("+233200000000")),
        ];

        let mut resolver = IdentityResolver::with_minter(SequentialMinter::default(), &Span::none());
        let (entities, report) = resolver.resolve(EntitySets::new(customers, complaints));

        assert_eq!(entities.customers.len(), 2);
        assert_eq!(entities.customers[0].customer_id.as_deref(), Some("ref-1"));
        assert_eq!(entities.customers[0].number.as_deref(), Some("+233241234567"));
        assert_eq!(entities.customers[1].customer_id.as_deref(), Some("phone-2"));

        assert_eq!(entities.complaints.len(), 2);
        assert_eq!(entities.complaints[0].customer_id.as_deref(), Some("ref-1"));
        assert_eq!(entities.complaints[1].customer_id.as_deref(), Some("phone-2"));

        assert_eq!(report.unresolved_customers_dropped, 1);
        assert_eq!(report.duplicate_customers_dropped, 1);
        assert_eq!(report.orphan_complaints_dropped, 1);
    }

    #[test]
    fn test_resolve_keeps_surviving_complaints_contained() {
        let customers = vec![customer(None, Some("+233241234567")), customer(Some("P9"), None)];
        let complaints = vec![complaint(Some("P404"), None), complaint(None, None), complaint(Some("P9"), None)];

        let (entities, _) = IdentityResolver::new(&Span::none()).resolve(EntitySets::new(customers, complaints));

        let ids = entities.customer_ids();
        assert!(entities
            .complaints
            .iter()
            .all(|c| c.customer_id.as_deref().is_some_and(|id| ids.contains(id))));
        assert_eq!(entities.complaints.len(), 1);
    }

    #[test]
    fn test_phone_ids_are_stable_across_runs() {
        let key = IdentityKey::Phone("+233241234567".into());
        assert_eq!(UuidMinter.mint(&key), UuidMinter.mint(&key));
    }
}
