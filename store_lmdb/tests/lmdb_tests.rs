//! LMDB persistence tests: raw store round trips, key layout, and the
//! governance engine running on top of a real environment across reopen.

use std::sync::Arc;

use agora_governance::{
    ExecutionDispatcher, GovernanceConfig, GovernanceEngine, GovernanceError, NewProposal, ParamValue,
    ParameterUpdate, ProposalAction, ProposalStatus, VoteChoice,
};
use agora_nullables::{NullBalanceOracle, NullLedger};
use agora_store::{GovernanceStore, StoreError, WriteOp, WriteSet};
use agora_store_lmdb::LmdbEnvironment;
use agora_types::{PrincipalId, ProposalId, Timestamp, TokenAmount};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const MAP_SIZE: usize = 64 * 1024 * 1024;

fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).expect("open env");
    (dir, env)
}

fn id(byte: u8) -> ProposalId {
    ProposalId::new([byte; 32])
}

// ---------------------------------------------------------------------------
// 1. Raw store
// ---------------------------------------------------------------------------

#[test]
fn proposal_write_read_roundtrip() {
    let (_dir, env) = temp_env();
    let store = env.governance_store();

    assert!(matches!(store.get_proposal(&id(1)), Err(StoreError::NotFound(_))));

    let mut batch = WriteSet::new();
    batch.push(WriteOp::PutProposal {
        id: id(1),
        seq: 1,
        data: b"first".to_vec(),
    });
    store.commit(&batch).unwrap();
    assert_eq!(store.get_proposal(&id(1)).unwrap(), b"first".to_vec());

    // Overwrite keeps a single listing entry.
    let mut batch = WriteSet::new();
    batch.push(WriteOp::PutProposal {
        id: id(1),
        seq: 1,
        data: b"updated".to_vec(),
    });
    store.commit(&batch).unwrap();
    assert_eq!(store.list_proposals().unwrap(), vec![b"updated".to_vec()]);
}

#[test]
fn proposals_list_by_creation_sequence() {
    let (_dir, env) = temp_env();
    let store = env.governance_store();
    let mut batch = WriteSet::new();
    // Ids sort opposite to sequence.
    batch
        .push(WriteOp::PutProposal { id: id(9), seq: 1, data: vec![1] })
        .push(WriteOp::PutProposal { id: id(5), seq: 2, data: vec![2] })
        .push(WriteOp::PutProposal { id: id(1), seq: 300, data: vec![3] });
    store.commit(&batch).unwrap();
    assert_eq!(store.list_proposals().unwrap(), vec![vec![1], vec![2], vec![3]]);
}

#[test]
fn votes_are_scoped_to_their_proposal() {
    let (_dir, env) = temp_env();
    let store = env.governance_store();
    let mut batch = WriteSet::new();
    batch
        .push(WriteOp::PutVote { proposal: id(1), voter: PrincipalId::new("alice"), data: vec![1] })
        .push(WriteOp::PutVote { proposal: id(1), voter: PrincipalId::new("bob"), data: vec![2] })
        .push(WriteOp::PutVote { proposal: id(2), voter: PrincipalId::new("alice"), data: vec![3] })
        .push(WriteOp::PutVote { proposal: id(1), voter: PrincipalId::new("alice"), data: vec![4] });
    store.commit(&batch).unwrap();

    let mut votes = store.get_votes(&id(1)).unwrap();
    votes.sort();
    assert_eq!(votes, vec![vec![2], vec![4]]);
    assert_eq!(store.get_vote(&id(2), &PrincipalId::new("alice")).unwrap(), vec![3]);
    assert!(matches!(
        store.get_vote(&id(2), &PrincipalId::new("bob")),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn parameter_history_keeps_order_and_separates_names() {
    let (_dir, env) = temp_env();
    let store = env.governance_store();
    let mut batch = WriteSet::new();
    batch
        .push(WriteOp::PutParameter { name: "fee".into(), data: vec![2] })
        .push(WriteOp::AppendParameterHistory { name: "fee".into(), data: vec![1] })
        .push(WriteOp::AppendParameterHistory { name: "fee".into(), data: vec![2] })
        .push(WriteOp::AppendParameterHistory { name: "fee_cap".into(), data: vec![9] });
    store.commit(&batch).unwrap();

    let mut batch = WriteSet::new();
    batch.push(WriteOp::AppendParameterHistory { name: "fee".into(), data: vec![3] });
    store.commit(&batch).unwrap();

    assert_eq!(
        store.get_parameter_history("fee").unwrap(),
        vec![vec![1], vec![2], vec![3]]
    );
    assert_eq!(store.get_parameter_history("fee_cap").unwrap(), vec![vec![9]]);
    assert!(store.get_parameter_history("fe").unwrap().is_empty());
    assert_eq!(
        store.list_parameters().unwrap(),
        vec![("fee".to_string(), vec![2])]
    );
}

#[test]
fn history_of_a_name_excludes_names_it_prefixes() {
    let (_dir, env) = temp_env();
    let store = env.governance_store();
    let mut batch = WriteSet::new();
    batch
        .push(WriteOp::AppendParameterHistory { name: "fee".into(), data: vec![1] })
        .push(WriteOp::AppendParameterHistory { name: "fee\u{0}x".into(), data: vec![2] })
        .push(WriteOp::AppendParameterHistory { name: "fee\u{0}".into(), data: vec![3] });
    store.commit(&batch).unwrap();

    assert_eq!(store.get_parameter_history("fee").unwrap(), vec![vec![1]]);
    assert_eq!(store.get_parameter_history("fee\u{0}x").unwrap(), vec![vec![2]]);
    assert_eq!(store.get_parameter_history("fee\u{0}").unwrap(), vec![vec![3]]);
}

#[test]
fn sequence_and_config_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
        let store = env.governance_store();
        assert_eq!(store.get_config().unwrap(), None);
        assert_eq!(store.next_sequence().unwrap(), 1);
        assert_eq!(store.next_sequence().unwrap(), 2);
        let mut batch = WriteSet::new();
        batch.push(WriteOp::PutConfig { data: vec![7, 7] });
        store.commit(&batch).unwrap();
    }
    let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
    let store = env.governance_store();
    assert_eq!(store.next_sequence().unwrap(), 3);
    assert_eq!(store.get_config().unwrap(), Some(vec![7, 7]));
}

// ---------------------------------------------------------------------------
// 2. Engine on LMDB
// ---------------------------------------------------------------------------

#[test]
fn oversized_parameter_name_never_reaches_lmdb() {
    let (_dir, env) = temp_env();
    let oracle = Arc::new(NullBalanceOracle::new());
    let ledger = Arc::new(NullLedger::new());
    let alice = PrincipalId::new("alice");
    oracle.set_balance(&alice, 2_000_000);
    let engine = GovernanceEngine::initialize(
        env.governance_store(),
        oracle,
        ledger.clone(),
        ExecutionDispatcher::new(),
        GovernanceConfig::default(),
        Timestamp::new(0),
    )
    .unwrap();

    for name in ["x".repeat(600), "fee\u{0}x".to_string()] {
        let action = ProposalAction::ParameterChange {
            updates: vec![ParameterUpdate { name, value: ParamValue::Flag(true) }],
        };
        let request = NewProposal::new(alice.clone(), "Long name", "Too long", &action).unwrap();
        assert!(matches!(
            engine.create_proposal(request, Timestamp::new(1)),
            Err(GovernanceError::InvalidPayload { .. })
        ));
    }
    assert!(engine.list_proposals(None, None).unwrap().is_empty());
    assert_eq!(ledger.delta_names(), vec!["initialized"]);
}

#[test]
fn engine_state_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Arc::new(NullBalanceOracle::new());
    let ledger = Arc::new(NullLedger::new());
    let config = GovernanceConfig {
        min_proposal_threshold: TokenAmount::new(10),
        voting_period_secs: 100,
        execution_delay_secs: 10,
        ..GovernanceConfig::default()
    };
    let alice = PrincipalId::new("alice");
    oracle.set_balance(&alice, 500);
    oracle.set_total_supply(1_000);

    let proposal_id = {
        let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
        let engine = GovernanceEngine::initialize(
            env.governance_store(),
            oracle.clone(),
            ledger.clone(),
            ExecutionDispatcher::new(),
            config.clone(),
            Timestamp::new(0),
        )
        .unwrap();
        let action = ProposalAction::ParameterChange {
            updates: vec![ParameterUpdate {
                name: "majority_percentage".into(),
                value: ParamValue::Percentage(66),
            }],
        };
        let request = NewProposal::new(alice.clone(), "Supermajority", "Raise to 66%", &action).unwrap();
        let id = engine.create_proposal(request, Timestamp::new(0)).unwrap();
        engine
            .cast_vote(&id, &alice, VoteChoice::For, Timestamp::new(5))
            .unwrap();
        id
    };

    let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
    let engine = GovernanceEngine::initialize(
        env.governance_store(),
        oracle,
        ledger,
        ExecutionDispatcher::new(),
        config,
        Timestamp::new(200),
    )
    .unwrap();

    let vote = engine.get_vote(&proposal_id, &alice).unwrap();
    assert_eq!(vote.weight, TokenAmount::new(500));

    let outcome = engine
        .execute_proposal(&proposal_id, Timestamp::new(200))
        .unwrap();
    assert!(outcome.is_executed());
    assert_eq!(engine.config().unwrap().majority_percentage, 66);
    assert_eq!(
        engine.get_proposal(&proposal_id).unwrap().status,
        ProposalStatus::Executed
    );
    assert_eq!(engine.parameter_history("majority_percentage").unwrap().len(), 2);
}
