//! # Progression Properties
//!
//! Under any sequence of advance attempts, blank or not, the current step
//! only moves forward, and by exactly one per recorded outcome.

mod common;

use common::{at, World};
use grievance_core::GrievanceType;
use proptest::prelude::*;

fn outcome_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("  \t".to_string()),
        "[a-z][a-z ]{0,11}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn step_number_only_moves_forward(outcomes in prop::collection::vec(outcome_text(), 0..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let world = World::new(at(2024, 3, 4)).await;
            let grievance = world.file(GrievanceType::Individual).await;
            let mut expected = 1u32;
            for outcome in &outcomes {
                let result = world
                    .engine
                    .advance_to_next_step(&world.ctx, &grievance.id, outcome)
                    .await;
                if outcome.trim().is_empty() {
                    assert!(result.is_err());
                } else {
                    expected += 1;
                    assert_eq!(result.unwrap().new_step_number, expected);
                }
                let loaded = world
                    .engine
                    .get_grievance(&world.ctx, &grievance.id)
                    .await
                    .unwrap();
                assert_eq!(loaded.current_step_number, Some(expected));
                assert_eq!(loaded.version, u64::from(expected));
            }
            let recorded = world
                .engine
                .step_outcomes(&world.ctx, &grievance.id)
                .await
                .unwrap();
            assert_eq!(recorded.len() as u32, expected - 1);
        });
    }
}
