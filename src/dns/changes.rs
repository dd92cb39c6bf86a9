//! Record set change planning
//!
//! Turns "these are the sets that should exist at a name" into the deletes
//! and upserts a DNS service needs. Sets left at the name by an earlier run
//! (a simple alias, a region since dropped) are deleted in the same batch,
//! so re-running with different inputs never leaves mixed routing behind.

use super::types::{DnsError, RecordSet};

/// One entry of a change batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    Delete(RecordSet),
    Upsert(RecordSet),
}

/// Changes that replace `existing` with `desired` at one name and type.
///
/// Deletes come first; a set is kept (and upserted) when its identifier
/// is still wanted.
pub fn plan_changes(existing: &[RecordSet], desired: &[RecordSet]) -> Vec<RecordChange> {
    let mut changes: Vec<RecordChange> = existing
        .iter()
        .filter(|set| {
            !desired
                .iter()
                .any(|wanted| wanted.set_identifier == set.set_identifier)
        })
        .cloned()
        .map(RecordChange::Delete)
        .collect();

    changes.extend(desired.iter().cloned().map(RecordChange::Upsert));
    changes
}

/// A name and type holds one simple set or only identified (weighted) sets
pub fn check_routing(sets: &[RecordSet]) -> Result<(), DnsError> {
    let simple = sets.iter().filter(|set| set.set_identifier.is_none()).count();

    if simple > 1 || (simple == 1 && sets.len() > 1) {
        let name = sets.first().map(|set| set.name.as_str()).unwrap_or_default();
        return Err(DnsError::Provider(format!(
            "Conflicting routing policies at {}: {} simple and {} weighted record sets",
            name,
            simple,
            sets.len() - simple
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::types::ChangeBatch;

    fn failover(regions: &[&str]) -> Vec<RecordSet> {
        let targets = regions
            .iter()
            .map(|region| (region.to_string(), format!("app1.{}.dev.example.com", region)))
            .collect();
        ChangeBatch::failover("app1.dev.example.com", targets, 60).record_sets()
    }

    #[test]
    fn test_fresh_name_is_all_upserts() {
        let changes = plan_changes(&[], &failover(&["us-east-1", "eu-west-1"]));

        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| matches!(c, RecordChange::Upsert(_))));
    }

    #[test]
    fn test_dropped_region_is_deleted() {
        let existing = failover(&["us-east-1", "eu-west-1", "ap-south-1"]);
        let changes = plan_changes(&existing, &failover(&["us-east-1", "eu-west-1"]));

        let deleted: Vec<&str> = changes
            .iter()
            .filter_map(|c| match c {
                RecordChange::Delete(set) => set.set_identifier.as_deref(),
                RecordChange::Upsert(_) => None,
            })
            .collect();
        assert_eq!(deleted, vec!["ap-south-1"]);
        assert!(matches!(changes[0], RecordChange::Delete(_)));
    }

    #[test]
    fn test_simple_alias_replaced_by_failover() {
        let existing = ChangeBatch::alias("app1.dev.example.com", "elb-1", 60).record_sets();
        let changes = plan_changes(&existing, &failover(&["us-east-1"]));

        assert_eq!(changes[0], RecordChange::Delete(existing[0].clone()));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_check_routing() {
        assert!(check_routing(&failover(&["us-east-1", "eu-west-1"])).is_ok());
        assert!(check_routing(&ChangeBatch::alias("a", "b", 60).record_sets()).is_ok());

        let mut mixed = failover(&["us-east-1"]);
        mixed.extend(ChangeBatch::alias("app1.dev.example.com", "elb-1", 60).record_sets());
        assert!(matches!(check_routing(&mixed), Err(DnsError::Provider(_))));
    }
}
