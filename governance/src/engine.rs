//! Core governance engine: proposal lifecycle, weighted voting and execution.
//!
//! Every mutating operation follows the same order:
//! 1. read and check preconditions (no state touched on failure)
//! 2. query the balance oracle, outside any lock
//! 3. take the proposal's lock, re-read, re-check
//! 4. commit the [`StateDelta`] to the ledger submitter
//! 5. write the store in one [`WriteSet`]
//!
//! A failure in step 4 leaves both the ledger and the store unchanged.
//! Executing an extension kind commits one extra delta (the effect claim)
//! before its handler runs; see [`GovernanceEngine::execute_proposal`].

use std::collections::HashSet;
use std::sync::Mutex;

use agora_store::{GovernanceStore, StoreError, WriteOp, WriteSet};
use agora_types::{PrincipalId, ProposalId, Timestamp};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::config::{GovernanceConfig, VoteWeightPolicy};
use crate::dispatcher::{ExecutionDispatcher, ExecutionEffects};
use crate::error::{ExecutionError, GovernanceError};
use crate::evaluation::{self, RejectionReason, Verdict, VoteSummary};
use crate::ledger::{CommitReceipt, LedgerSubmitter, StateDelta};
use crate::locks::{acquire, ProposalLocks};
use crate::oracle::BalanceOracle;
use crate::params::{ParameterRecord, ParameterStore, StagedParameters};
use crate::proposal::{NewProposal, Proposal, ProposalAction, ProposalKind, ProposalStatus};
use crate::tally::{Tally, Vote, VoteChoice, VoteReceipt};

type Blake2b256 = Blake2b<U32>;

/// Result of [`GovernanceEngine::execute_proposal`].
///
/// A rejection is a valid business outcome, not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    Executed {
        proposal_id: ProposalId,
        executed_at: Timestamp,
        parameters_changed: usize,
    },
    Rejected {
        proposal_id: ProposalId,
        status: ProposalStatus,
        reason: RejectionReason,
    },
}

impl ExecutionOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }
}

pub struct GovernanceEngine<S, O, L> {
    store: S,
    oracle: O,
    ledger: L,
    dispatcher: ExecutionDispatcher,
    locks: ProposalLocks,
    /// Held while an execution reads the configuration, evaluates, and writes
    /// parameters, so concurrent executions never overwrite each other's config.
    config_lock: Mutex<()>,
    /// Claims whose handler is known to have failed but whose release could
    /// not be recorded.
    unapplied_claims: Mutex<HashSet<ProposalId>>,
}

impl<S, O, L> GovernanceEngine<S, O, L>
where
    S: GovernanceStore,
    O: BalanceOracle,
    L: LedgerSubmitter,
{
    /// Open the engine over `store`, seeding `genesis` and the default
    /// parameters if the store has never been initialised.
    pub fn initialize(
        store: S,
        oracle: O,
        ledger: L,
        dispatcher: ExecutionDispatcher,
        genesis: GovernanceConfig,
        now: Timestamp,
    ) -> Result<Self, GovernanceError> {
        let engine = Self {
            store,
            oracle,
            ledger,
            dispatcher,
            locks: ProposalLocks::new(),
            config_lock: Mutex::new(()),
            unapplied_claims: Mutex::new(HashSet::new()),
        };

        match engine.store.get_config()? {
            Some(bytes) => {
                let stored: GovernanceConfig = codec::decode(&bytes)?;
                if stored != genesis {
                    tracing::warn!(
                        "stored governance configuration differs from the supplied genesis; keeping stored values"
                    );
                }
                tracing::info!("governance store already initialised");
            }
            None => engine.seed(genesis, now)?,
        }
        Ok(engine)
    }

    fn seed(&self, genesis: GovernanceConfig, now: Timestamp) -> Result<(), GovernanceError> {
        genesis.validate()?;

        let mut staged = StagedParameters::new();
        for (name, value) in genesis.as_parameters() {
            staged.set(name, value, None, None, now);
        }
        let parameters = staged.into_records();

        self.submit(&StateDelta::Initialized {
            config: genesis.clone(),
            parameters: parameters.clone(),
        })?;

        let mut batch = WriteSet::new();
        batch.push(WriteOp::PutConfig {
            data: codec::encode(&genesis)?,
        });
        for op in StagedParameters::write_ops(&parameters)? {
            batch.push(op);
        }
        self.store.commit(&batch)?;

        tracing::info!(
            quorum_pct = genesis.quorum_percentage,
            majority_pct = genesis.majority_percentage,
            voting_period_secs = genesis.voting_period_secs,
            execution_delay_secs = genesis.execution_delay_secs,
            "governance initialised"
        );
        Ok(())
    }

    pub fn dispatcher(&self) -> &ExecutionDispatcher {
        &self.dispatcher
    }

    /// The current configuration singleton.
    pub fn config(&self) -> Result<GovernanceConfig, GovernanceError> {
        let bytes = self
            .store
            .get_config()?
            .ok_or_else(|| StoreError::NotFound("governance config".to_string()))?;
        codec::decode(&bytes)
    }

    // ── Proposals ───────────────────────────────────────────────────────

    /// Submit a new proposal. The voting window opens at `now`.
    pub fn create_proposal(
        &self,
        request: NewProposal,
        now: Timestamp,
    ) -> Result<ProposalId, GovernanceError> {
        let title = request.title.trim();
        let description = request.description.trim();
        if title.is_empty() {
            return Err(GovernanceError::InvalidProposal("title is empty".to_string()));
        }
        if description.is_empty() {
            return Err(GovernanceError::InvalidProposal(
                "description is empty".to_string(),
            ));
        }

        let action = crate::proposal::ProposalAction::decode(request.kind, &request.payload)
            .map_err(|e| GovernanceError::InvalidPayload {
                kind: request.kind,
                reason: e.to_string(),
            })?;
        action.validate().map_err(|reason| GovernanceError::InvalidPayload {
            kind: request.kind,
            reason,
        })?;

        let config = self.config()?;
        let balance = self.oracle.balance_of(&request.creator, now)?;
        if balance < config.min_proposal_threshold {
            return Err(GovernanceError::InsufficientStake {
                required: config.min_proposal_threshold.raw(),
                available: balance.raw(),
            });
        }

        let seq = self.store.next_sequence()?;
        let id = derive_proposal_id(&request.creator, title, now, seq);
        let proposal = Proposal {
            id,
            seq,
            creator: request.creator,
            title: title.to_string(),
            description: description.to_string(),
            kind: request.kind,
            payload: request.payload,
            voting_start: now,
            voting_end: now.saturating_add_secs(config.voting_period_secs),
            status: ProposalStatus::Active,
            tally: Tally::default(),
            executed: false,
            execution_time: None,
            effect_claimed_at: None,
        };

        let receipt = self.submit(&StateDelta::ProposalCreated {
            proposal: proposal.clone(),
        })?;
        let mut batch = WriteSet::new();
        batch.push(proposal_op(&proposal)?);
        self.store.commit(&batch)?;

        tracing::info!(
            proposal = %id,
            creator = %proposal.creator,
            kind = %proposal.kind,
            voting_end = proposal.voting_end.as_secs(),
            ledger_seq = receipt.sequence,
            "proposal created"
        );
        Ok(id)
    }

    pub fn get_proposal(&self, id: &ProposalId) -> Result<Proposal, GovernanceError> {
        match self.store.get_proposal(id) {
            Ok(bytes) => codec::decode(&bytes),
            Err(StoreError::NotFound(_)) => Err(GovernanceError::ProposalNotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }

    /// All proposals matching both filters, oldest first.
    pub fn list_proposals(
        &self,
        status: Option<ProposalStatus>,
        kind: Option<ProposalKind>,
    ) -> Result<Vec<Proposal>, GovernanceError> {
        let mut proposals = Vec::new();
        for bytes in self.store.list_proposals()? {
            let proposal: Proposal = codec::decode(&bytes)?;
            if status.is_some_and(|s| s != proposal.status) {
                continue;
            }
            if kind.is_some_and(|k| k != proposal.kind) {
                continue;
            }
            proposals.push(proposal);
        }
        proposals.sort_by_key(|p| p.seq);
        Ok(proposals)
    }

    /// Participation figures against the total supply at `now`.
    pub fn proposal_summary(
        &self,
        id: &ProposalId,
        now: Timestamp,
    ) -> Result<VoteSummary, GovernanceError> {
        let proposal = self.get_proposal(id)?;
        let supply = self.oracle.total_supply(now)?;
        VoteSummary::compute(&proposal.tally, supply, &self.config()?)
    }

    // ── Votes ───────────────────────────────────────────────────────────

    /// Cast a vote, or replace the voter's earlier vote on the same proposal.
    pub fn cast_vote(
        &self,
        id: &ProposalId,
        voter: &PrincipalId,
        choice: VoteChoice,
        now: Timestamp,
    ) -> Result<VoteReceipt, GovernanceError> {
        let proposal = self.get_proposal(id)?;
        ensure_open(&proposal, now)?;

        let weight_at = match self.config()?.vote_weight_policy {
            VoteWeightPolicy::AtCast => now,
            VoteWeightPolicy::AtProposalStart => proposal.voting_start,
        };
        let weight = self.oracle.balance_of(voter, weight_at)?;
        if weight.is_zero() {
            return Err(GovernanceError::NoVotingPower(voter.clone()));
        }

        let lock = self.locks.get(id);
        let _guard = acquire(lock.mutex());

        let mut proposal = self.get_proposal(id)?;
        ensure_open(&proposal, now)?;
        let previous = self.find_vote(id, voter)?;

        let vote = Vote {
            proposal_id: *id,
            voter: voter.clone(),
            choice,
            weight,
            cast_at: now,
            revision: previous.as_ref().map_or(0, |p| p.revision.saturating_add(1)),
        };
        let tally = proposal.tally.record(previous.as_ref(), &vote)?;

        let receipt = self.submit(&StateDelta::VoteRecorded {
            vote: vote.clone(),
            previous: previous.clone(),
            tally,
        })?;

        proposal.tally = tally;
        let mut batch = WriteSet::new();
        batch.push(proposal_op(&proposal)?);
        batch.push(WriteOp::PutVote {
            proposal: *id,
            voter: voter.clone(),
            data: codec::encode(&vote)?,
        });
        self.store.commit(&batch)?;

        let previous_choice = previous.map(|p| p.choice);
        tracing::info!(
            proposal = %id,
            voter = %voter,
            choice = %choice,
            weight = weight.raw(),
            revised = previous_choice.is_some(),
            "vote cast"
        );
        tracing::debug!(
            proposal = %id,
            for_weight = tally.for_weight,
            against_weight = tally.against_weight,
            abstain_weight = tally.abstain_weight,
            "tally updated"
        );

        Ok(VoteReceipt {
            proposal_id: *id,
            voter: voter.clone(),
            choice,
            weight,
            previous_choice,
            tally,
            ledger_sequence: receipt.sequence,
        })
    }

    pub fn get_vote(&self, id: &ProposalId, voter: &PrincipalId) -> Result<Vote, GovernanceError> {
        self.get_proposal(id)?;
        self.find_vote(id, voter)?
            .ok_or_else(|| GovernanceError::VoteNotFound {
                proposal: *id,
                voter: voter.clone(),
            })
    }

    /// Every live vote on a proposal.
    pub fn list_votes(&self, id: &ProposalId) -> Result<Vec<Vote>, GovernanceError> {
        self.get_proposal(id)?;
        self.store
            .get_votes(id)?
            .iter()
            .map(|bytes| codec::decode(bytes))
            .collect()
    }

    fn find_vote(&self, id: &ProposalId, voter: &PrincipalId) -> Result<Option<Vote>, GovernanceError> {
        match self.store.get_vote(id, voter) {
            Ok(bytes) => codec::decode(&bytes).map(Some),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ── Evaluation & execution ──────────────────────────────────────────

    /// Evaluate quorum and majority after the execution delay and, if the
    /// proposal passed, apply its effect exactly once.
    ///
    /// For the extension kinds the effect lives outside this engine, so it is
    /// claimed first: an `EffectClaimed` delta and a stored claim marker are
    /// committed before the handler runs. A retry that finds the claim
    /// finishes the execution without calling the handler again. If the
    /// handler reports failure the claim is released and the proposal stays
    /// retryable.
    pub fn execute_proposal(
        &self,
        id: &ProposalId,
        now: Timestamp,
    ) -> Result<ExecutionOutcome, GovernanceError> {
        let proposal = self.get_proposal(id)?;
        ensure_executable(&proposal, &self.config()?, now)?;

        let supply = if proposal.effect_claimed_at.is_none() {
            Some(self.oracle.total_supply(now)?)
        } else {
            None
        };

        let lock = self.locks.get(id);
        let _guard = acquire(lock.mutex());
        let _config_guard = acquire(&self.config_lock);

        let config = self.config()?;
        let mut proposal = self.get_proposal(id)?;
        ensure_executable(&proposal, &config, now)?;

        // A standing claim means an earlier attempt already passed the
        // proposal and handed it to its handler.
        if proposal.effect_claimed_at.is_none() {
            let supply = match supply {
                Some(supply) => supply,
                None => self.oracle.total_supply(now)?,
            };
            let verdict = evaluation::evaluate(&proposal.tally, supply, &config)?;
            if let Verdict::Rejected(reason) = verdict {
                return self.record_rejection(proposal, reason, now);
            }
        }

        let plan = self
            .dispatcher
            .plan(&proposal, &config, now)
            .map_err(|e| execution_failed(id, e))?;

        if let Some(action) = &plan.external {
            self.apply_external(&mut proposal, action, now)?;
        }

        self.finish_execution(proposal, plan.effects, now)
    }

    /// Run the external handler for `proposal` at most once.
    fn apply_external(
        &self,
        proposal: &mut Proposal,
        action: &ProposalAction,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        let known_unapplied = acquire(&self.unapplied_claims).contains(&proposal.id);
        if proposal.effect_claimed_at.is_some() && !known_unapplied {
            tracing::info!(
                proposal = %proposal.id,
                "effect already handed to its handler; completing execution"
            );
            return Ok(());
        }

        if proposal.effect_claimed_at.is_none() {
            self.submit(&StateDelta::EffectClaimed {
                id: proposal.id,
                claimed_at: now,
            })?;
            proposal.effect_claimed_at = Some(now);
            let mut batch = WriteSet::new();
            batch.push(proposal_op(proposal)?);
            self.store.commit(&batch)?;
        }

        match self.dispatcher.apply(proposal, action) {
            Ok(()) => {
                acquire(&self.unapplied_claims).remove(&proposal.id);
                Ok(())
            }
            Err(e) => {
                if let Err(release_err) = self.release_claim(proposal, &e, now) {
                    // The claim stays on record; remember that the handler
                    // did not apply it so a retry in this process runs it again.
                    tracing::warn!(
                        proposal = %proposal.id,
                        error = %release_err,
                        "could not release effect claim after handler failure"
                    );
                    acquire(&self.unapplied_claims).insert(proposal.id);
                }
                Err(execution_failed(&proposal.id, e))
            }
        }
    }

    fn release_claim(
        &self,
        proposal: &mut Proposal,
        cause: &ExecutionError,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.submit(&StateDelta::EffectReleased {
            id: proposal.id,
            released_at: now,
            reason: cause.to_string(),
        })?;
        let mut released = proposal.clone();
        released.effect_claimed_at = None;
        let mut batch = WriteSet::new();
        batch.push(proposal_op(&released)?);
        self.store.commit(&batch)?;
        *proposal = released;
        acquire(&self.unapplied_claims).remove(&proposal.id);
        Ok(())
    }

    fn finish_execution(
        &self,
        mut proposal: Proposal,
        effects: ExecutionEffects,
        now: Timestamp,
    ) -> Result<ExecutionOutcome, GovernanceError> {
        let id = proposal.id;
        proposal.transition(ProposalStatus::Executed)?;
        proposal.executed = true;
        proposal.execution_time = Some(now);
        let parameters = effects.parameters.into_records();

        let receipt = self.submit(&StateDelta::ProposalExecuted {
            id,
            executed_at: now,
            parameters: parameters.clone(),
            config: effects.config.clone(),
        })?;

        let mut batch = WriteSet::new();
        batch.push(proposal_op(&proposal)?);
        for op in StagedParameters::write_ops(&parameters)? {
            batch.push(op);
        }
        if let Some(new_config) = &effects.config {
            batch.push(WriteOp::PutConfig {
                data: codec::encode(new_config)?,
            });
        }
        self.store.commit(&batch)?;

        tracing::info!(
            proposal = %id,
            kind = %proposal.kind,
            parameters_changed = parameters.len(),
            config_changed = effects.config.is_some(),
            ledger_seq = receipt.sequence,
            "proposal executed"
        );
        Ok(ExecutionOutcome::Executed {
            proposal_id: id,
            executed_at: now,
            parameters_changed: parameters.len(),
        })
    }

    fn record_rejection(
        &self,
        mut proposal: Proposal,
        reason: RejectionReason,
        now: Timestamp,
    ) -> Result<ExecutionOutcome, GovernanceError> {
        let status = match reason {
            RejectionReason::Quorum => ProposalStatus::FailedQuorum,
            RejectionReason::Majority => ProposalStatus::Rejected,
        };
        let outcome = ExecutionOutcome::Rejected {
            proposal_id: proposal.id,
            status,
            reason,
        };
        if proposal.status == status {
            return Ok(outcome);
        }

        proposal.transition(status)?;
        self.submit(&StateDelta::ProposalRejected {
            id: proposal.id,
            status,
            reason,
            evaluated_at: now,
        })?;
        let mut batch = WriteSet::new();
        batch.push(proposal_op(&proposal)?);
        self.store.commit(&batch)?;

        tracing::info!(proposal = %proposal.id, status = %status, ?reason, "proposal rejected");
        Ok(outcome)
    }

    // ── Parameters ──────────────────────────────────────────────────────

    pub fn get_parameter(&self, name: &str) -> Result<ParameterRecord, GovernanceError> {
        ParameterStore::new(&self.store).get(name)
    }

    pub fn parameter_history(&self, name: &str) -> Result<Vec<ParameterRecord>, GovernanceError> {
        ParameterStore::new(&self.store).history(name)
    }

    pub fn list_parameters(&self) -> Result<Vec<ParameterRecord>, GovernanceError> {
        ParameterStore::new(&self.store).list()
    }

    fn submit(&self, delta: &StateDelta) -> Result<CommitReceipt, GovernanceError> {
        self.ledger.commit(delta).map_err(|e| {
            tracing::warn!(delta = delta.name(), error = %e, "ledger commit failed");
            GovernanceError::LedgerCommitFailed(e)
        })
    }
}

fn execution_failed(id: &ProposalId, e: ExecutionError) -> GovernanceError {
    tracing::warn!(proposal = %id, error = %e, "proposal execution failed");
    GovernanceError::ExecutionFailed(e)
}

fn ensure_open(proposal: &Proposal, now: Timestamp) -> Result<(), GovernanceError> {
    if proposal.is_open_at(now) {
        Ok(())
    } else {
        Err(GovernanceError::ProposalNotActive {
            id: proposal.id,
            status: proposal.status,
            start: proposal.voting_start,
            end: proposal.voting_end,
        })
    }
}

fn ensure_executable(
    proposal: &Proposal,
    config: &GovernanceConfig,
    now: Timestamp,
) -> Result<(), GovernanceError> {
    if proposal.executed {
        return Err(GovernanceError::AlreadyExecuted(proposal.id));
    }
    let executable_at = proposal.executable_at(config.execution_delay_secs);
    if now < executable_at {
        return Err(GovernanceError::ExecutionDelayNotElapsed { executable_at });
    }
    Ok(())
}

fn proposal_op(proposal: &Proposal) -> Result<WriteOp, GovernanceError> {
    Ok(WriteOp::PutProposal {
        id: proposal.id,
        seq: proposal.seq,
        data: codec::encode(proposal)?,
    })
}

/// Blake2b-256 over creator, title, creation time and the store sequence.
/// The sequence is never reused, so ids never collide.
fn derive_proposal_id(creator: &PrincipalId, title: &str, now: Timestamp, seq: u64) -> ProposalId {
    let mut hasher = Blake2b256::new();
    hasher.update(b"agora-proposal");
    hasher.update(seq.to_be_bytes());
    hasher.update(now.as_secs().to_be_bytes());
    hasher.update((creator.as_str().len() as u64).to_be_bytes());
    hasher.update(creator.as_str().as_bytes());
    hasher.update(title.as_bytes());
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    ProposalId::new(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_ids_differ_by_sequence() {
        let creator = PrincipalId::new("alice");
        let a = derive_proposal_id(&creator, "same", Timestamp::new(5), 1);
        let b = derive_proposal_id(&creator, "same", Timestamp::new(5), 2);
        assert_ne!(a, b);
        assert_eq!(a, derive_proposal_id(&creator, "same", Timestamp::new(5), 1));
    }

    #[test]
    fn executed_proposal_is_not_executable_again() {
        let proposal = Proposal {
            id: ProposalId::new([4; 32]),
            seq: 1,
            creator: PrincipalId::new("alice"),
            title: "t".into(),
            description: "d".into(),
            kind: ProposalKind::ParameterChange,
            payload: Vec::new(),
            voting_start: Timestamp::new(0),
            voting_end: Timestamp::new(10),
            status: ProposalStatus::Executed,
            tally: Tally::default(),
            executed: true,
            execution_time: Some(Timestamp::new(30)),
            effect_claimed_at: None,
        };
        let config = GovernanceConfig {
            execution_delay_secs: 5,
            ..GovernanceConfig::default()
        };
        assert!(matches!(
            ensure_executable(&proposal, &config, Timestamp::new(100)),
            Err(GovernanceError::AlreadyExecuted(_))
        ));
    }
}
