//! Property tests for the counter invariant: a counter always equals
//! the number of live reports for its (community, user, category) key.

use std::sync::Arc;

use proptest::prelude::*;

use reputation_ledger::{
    CommunityId, InMemoryLedgerStore, NewReport, ReportCategory, ReportId, ReportLedger, UserId,
};

#[derive(Debug, Clone)]
enum Op {
    Add(ReportCategory),
    RemoveLatest(ReportCategory),
    RemoveBogus(ReportCategory),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let category = prop_oneof![Just(ReportCategory::Scam), Just(ReportCategory::Vouch)];
    prop_oneof![
        3 => category.clone().prop_map(Op::Add),
        2 => category.clone().prop_map(Op::RemoveLatest),
        1 => category.prop_map(Op::RemoveBogus),
    ]
}

async fn run_ops(ops: Vec<Op>) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let ledger = ReportLedger::new(store);
    let community = CommunityId::from("g1");
    let user = UserId::from("u1");

    let mut live_scams: Vec<ReportId> = Vec::new();
    let mut live_vouches: Vec<ReportId> = Vec::new();

    for op in ops {
        match op {
            Op::Add(category) => {
                let report = ledger
                    .add_report(NewReport {
                        community: community.clone(),
                        user: user.clone(),
                        category,
                        reason: None,
                        reported_by: UserId::from("staff"),
                    })
                    .await
                    .unwrap();
                match category {
                    ReportCategory::Scam => live_scams.push(report.id),
                    ReportCategory::Vouch => live_vouches.push(report.id),
                }
            }
            Op::RemoveLatest(category) => {
                let live = match category {
                    ReportCategory::Scam => &mut live_scams,
                    ReportCategory::Vouch => &mut live_vouches,
                };
                if let Some(id) = live.pop() {
                    ledger
                        .remove_report(&community, &user, category, id)
                        .await
                        .unwrap();
                }
            }
            Op::RemoveBogus(category) => {
                // Unknown id: must not touch the counter.
                let result = ledger
                    .remove_report(&community, &user, category, ReportId::new(i64::MAX))
                    .await;
                assert!(result.is_err());
            }
        }

        let counter = ledger.counts(&community, &user).await.unwrap();
        assert_eq!(counter.scam_count as usize, live_scams.len());
        assert_eq!(counter.vouch_count as usize, live_vouches.len());
        assert_eq!(
            ledger
                .user_reports(&community, &user, Some(ReportCategory::Scam))
                .await
                .unwrap()
                .len(),
            live_scams.len()
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_counter_matches_live_reports(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        tokio::runtime::Runtime::new().unwrap().block_on(run_ops(ops));
    }
}
