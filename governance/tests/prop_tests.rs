use std::sync::Arc;

use proptest::prelude::*;

use agora_governance::evaluation::{majority_met, quorum_met};
use agora_governance::{
    ExecutionDispatcher, GovernanceConfig, GovernanceEngine, NewProposal, ProposalAction,
    VoteChoice,
};
use agora_nullables::{NullBalanceOracle, NullGovernanceStore, NullLedger};
use agora_types::{PrincipalId, Timestamp, TokenAmount};

fn choice() -> impl Strategy<Value = VoteChoice> {
    prop_oneof![
        Just(VoteChoice::For),
        Just(VoteChoice::Against),
        Just(VoteChoice::Abstain),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After any sequence of casts and revisions, the tally equals the sum of
    /// the live votes, one per voter.
    #[test]
    fn tally_matches_live_votes(
        casts in prop::collection::vec((0usize..6, 1u128..10_000, choice()), 1..40),
    ) {
        let oracle = Arc::new(NullBalanceOracle::new());
        let engine = GovernanceEngine::initialize(
            Arc::new(NullGovernanceStore::new()),
            oracle.clone(),
            Arc::new(NullLedger::new()),
            ExecutionDispatcher::new(),
            GovernanceConfig {
                min_proposal_threshold: TokenAmount::new(1),
                ..GovernanceConfig::default()
            },
            Timestamp::new(0),
        )
        .unwrap();

        let creator = PrincipalId::new("creator");
        oracle.set_balance(&creator, 1);
        let action = ProposalAction::ServiceUpdate {
            service: "search".into(),
            changes: vec![("ranking".into(), "v2".into())],
        };
        let id = engine
            .create_proposal(NewProposal::new(creator, "t", "d", &action).unwrap(), Timestamp::new(0))
            .unwrap();

        for (i, (voter, balance, choice)) in casts.iter().enumerate() {
            let voter = PrincipalId::new(format!("voter-{voter}"));
            oracle.set_balance(&voter, *balance);
            engine.cast_vote(&id, &voter, *choice, Timestamp::new(i as u64)).unwrap();
        }

        let votes = engine.list_votes(&id).unwrap();
        let tally = engine.get_proposal(&id).unwrap().tally;
        let distinct: std::collections::HashSet<_> = casts.iter().map(|(v, _, _)| *v).collect();
        prop_assert_eq!(votes.len(), distinct.len());
        for c in VoteChoice::ALL {
            let live: u128 = votes.iter().filter(|v| v.choice == c).map(|v| v.weight.raw()).sum();
            prop_assert_eq!(tally.weight_of(c), live);
        }
    }

    /// Quorum is monotonic in participation.
    #[test]
    fn quorum_monotonic(supply in 1u128..1_000_000, total in 0u128..1_000_000, pct in 0u8..=100) {
        let more = total.saturating_add(1);
        if quorum_met(total, supply, pct).unwrap() {
            prop_assert!(quorum_met(more, supply, pct).unwrap());
        }
    }

    /// Majority never passes when For is at most half and the threshold is above half.
    #[test]
    fn majority_needs_more_than_half(for_weight in 0u128..1_000, against in 0u128..1_000, pct in 51u8..=100) {
        let total = for_weight + against;
        if for_weight <= against {
            prop_assert!(!majority_met(for_weight, total, pct).unwrap());
        }
    }
}
