//! Allocation against the SQLite store
//!
//! Two allocators over two connections to the same database file stand in
//! for two service instances sharing one rotation cursor.

use leadflow_distribution::{AllocationError, DistributionConfig, RoundRobinAllocator};
use leadflow_domain::traits::DistributionRuleStore;
use leadflow_domain::{Assignment, DistributionRule, Pipeline, PipelineMember, UnassignedReason};
use leadflow_store::SqliteStore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

// Monday 2024-01-01 10:00 UTC
const MONDAY_MORNING: u64 = 1_704_103_200_000;

fn seed(store: &SqliteStore, rule: DistributionRule, members: &[(&str, bool)]) {
    let pipeline = Pipeline::new("sales", "Sales", vec!["new".to_string(), "won".to_string()]).unwrap();
    store.upsert_pipeline(&pipeline).unwrap();
    for (i, (id, active)) in members.iter().enumerate() {
        store
            .upsert_member("sales", &PipelineMember::new(*id, *active, i as u32))
            .unwrap();
    }
    store.upsert_distribution_rule(&rule).unwrap();
}

fn open(path: &Path) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(path).unwrap())
}

#[test]
fn test_rotation_persists_cursor() {
    let store = Arc::new(SqliteStore::new(":memory:").unwrap());
    seed(
        &store,
        DistributionRule::round_robin("sales"),
        &[("A", true), ("B", true), ("C", true)],
    );
    let allocator = RoundRobinAllocator::new(Arc::clone(&store), DistributionConfig::default());

    let picks: Vec<_> = (0..4)
        .map(|_| {
            allocator
                .assign("sales", MONDAY_MORNING)
                .unwrap()
                .member_id()
                .unwrap()
                .to_string()
        })
        .collect();

    assert_eq!(picks, vec!["A", "B", "C", "A"]);
    assert_eq!(store.distribution_rule("sales").unwrap().unwrap().rotation_cursor, 1);
}

#[test]
fn test_deactivated_member_leaves_rotation() {
    let store = Arc::new(SqliteStore::new(":memory:").unwrap());
    seed(
        &store,
        DistributionRule::round_robin("sales"),
        &[("A", true), ("B", true), ("C", true)],
    );
    let allocator = RoundRobinAllocator::new(Arc::clone(&store), DistributionConfig::default());

    assert_eq!(allocator.assign("sales", MONDAY_MORNING).unwrap().member_id(), Some("A"));
    store.set_member_active("sales", "B", false).unwrap();
    assert_eq!(allocator.assign("sales", MONDAY_MORNING).unwrap().member_id(), Some("C"));
    assert_eq!(allocator.assign("sales", MONDAY_MORNING).unwrap().member_id(), Some("A"));
}

#[test]
fn test_unknown_pipeline_is_inactive() {
    let store = Arc::new(SqliteStore::new(":memory:").unwrap());
    let allocator = RoundRobinAllocator::new(store, DistributionConfig::default());

    assert_eq!(
        allocator.assign("nowhere", MONDAY_MORNING).unwrap(),
        Assignment::Unassigned(UnassignedReason::RuleInactive)
    );
}

#[test]
fn test_exhausted_without_fallback() {
    let store = Arc::new(SqliteStore::new(":memory:").unwrap());
    let mut rule = DistributionRule::round_robin("sales");
    rule.fallback_to_manual = false;
    seed(&store, rule, &[]);
    let allocator = RoundRobinAllocator::new(store, DistributionConfig::default());

    let result = allocator.assign("sales", MONDAY_MORNING);
    assert!(matches!(result, Err(AllocationError::Exhausted { .. })));
}

#[test]
fn test_two_instances_share_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leadflow.db");

    let seed_store = open(&path);
    seed(
        &seed_store,
        DistributionRule::round_robin("sales"),
        &[("A", true), ("B", true), ("C", true)],
    );

    let config = DistributionConfig {
        max_cas_retries: 1_000,
        ..Default::default()
    };
    let instances: Vec<_> = (0..2)
        .map(|_| Arc::new(RoundRobinAllocator::new(open(&path), config.clone())))
        .collect();

    let handles: Vec<_> = instances
        .iter()
        .flat_map(|allocator| {
            (0..2).map(move |_| {
                let allocator = Arc::clone(allocator);
                std::thread::spawn(move || {
                    (0..15)
                        .map(|_| {
                            allocator
                                .assign("sales", MONDAY_MORNING)
                                .unwrap()
                                .member_id()
                                .unwrap()
                                .to_string()
                        })
                        .collect::<Vec<_>>()
                })
            })
        })
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for handle in handles {
        for member in handle.join().unwrap() {
            *counts.entry(member).or_default() += 1;
        }
    }

    // 60 assignments over 3 members
    assert_eq!(counts.len(), 3);
    assert!(counts.values().all(|&c| c == 20), "uneven distribution: {:?}", counts);
    assert_eq!(seed_store.distribution_rule("sales").unwrap().unwrap().rotation_cursor, 0);
}
