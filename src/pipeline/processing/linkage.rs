//! Linkage of customers and complaints to the external client registry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{EntitySets, IdentitySignals};
use crate::error::Result;

/// One client registry row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub profile_id: String,
    pub phone_number: Option<String>,
    pub phone_number2: Option<String>,
}

/// Source of registry entries, read once per run
pub trait ClientRegistry {
    fn entries(&self) -> Result<Vec<RegistryEntry>>;
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Phone and profile lookups built from registry entries. The first entry in
/// registry order wins on any conflict.
#[derive(Debug, Default)]
pub struct LinkageIndex {
    profile_by_phone: HashMap<String, String>,
    number2_by_profile: HashMap<String, Option<String>>,
}

impl LinkageIndex {
    pub fn build(entries: &[RegistryEntry]) -> Self {
        let mut index = Self::default();
        for entry in entries {
            let Some(profile_id) = trimmed(Some(&entry.profile_id)) else {
                warn!("Registry entry without a profile id skipped");
                continue;
            };
            for phone in [entry.phone_number.as_deref(), entry.phone_number2.as_deref()] {
                if let Some(phone) = trimmed(phone) {
                    index
                        .profile_by_phone
                        .entry(phone.to_string())
                        .or_insert_with(|| profile_id.to_string());
                }
            }
            index
                .number2_by_profile
                .entry(profile_id.to_string())
                .or_insert_with(|| entry.phone_number2.clone());
        }
        index
    }

    pub fn profile_for(&self, number: &str) -> Option<&str> {
        self.profile_by_phone.get(number.trim()).map(String::as_str)
    }

    /// The registry's secondary phone for a profile; `None` when the profile is
    /// not registered, `Some(None)` when it is registered without one.
    pub fn number2_for(&self, profile_id: &str) -> Option<Option<&str>> {
        self.number2_by_profile.get(profile_id).map(|n| n.as_deref())
    }

    pub fn len(&self) -> usize {
        self.number2_by_profile.len()
    }

    pub fn is_empty(&self) -> bool {
        self.number2_by_profile.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkageReport {
    pub customers_linked: usize,
    pub complaints_linked: usize,
    pub number2_synced: usize,
}

fn link_rows<R: IdentitySignals>(rows: &mut [R], index: &LinkageIndex) -> (usize, usize) {
    let mut linked = 0;
    for row in rows.iter_mut() {
        let profile = row.number().and_then(|n| index.profile_for(n)).map(str::to_string);
        if let Some(profile) = profile {
            row.set_profile_id(Some(profile));
            linked += 1;
        }
    }

    let mut synced = 0;
    for row in rows.iter_mut() {
        let number2 = row
            .profile_id()
            .and_then(|p| index.number2_for(p))
            .map(|n| n.map(str::to_string));
        if let Some(number2) = number2 {
            row.set_number2(number2);
            synced += 1;
        }
    }
    (linked, synced)
}

/// Stamp registry profile ids onto rows whose phone matches a registry phone,
/// then copy the registry's secondary phone onto every row with a known
/// profile id.
pub fn sync_linkage(entities: &mut EntitySets, index: &LinkageIndex) -> LinkageReport {
    let (customers_linked, customer_number2) = link_rows(&mut entities.customers, index);
    let (complaints_linked, complaint_number2) = link_rows(&mut entities.complaints, index);

    let report = LinkageReport {
        customers_linked,
        complaints_linked,
        number2_synced: customer_number2 + complaint_number2,
    };
    info!(
        registry_entries = index.len(),
        customers_linked = report.customers_linked,
        complaints_linked = report.complaints_linked,
        number2_synced = report.number2_synced,
        "Registry linkage sync complete"
    );
    report
}
