//! Vote records and running tallies.
//!
//! A proposal carries one [`Tally`]. Every cast or revision goes through
//! [`Tally::record`], which removes the voter's previous weight from its old
//! bucket and adds the new weight to the new bucket in one step, so
//! `for + against + abstain` always equals the sum of live vote weights.

use std::fmt;
use std::str::FromStr;

use agora_types::{PrincipalId, ProposalId, Timestamp, TokenAmount};
use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteChoice {
    For,
    Against,
    Abstain,
}

impl VoteChoice {
    pub const ALL: [Self; 3] = [Self::For, Self::Against, Self::Abstain];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::For => "for",
            Self::Against => "against",
            Self::Abstain => "abstain",
        }
    }
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteChoice {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| GovernanceError::InvalidVote(format!("unknown vote choice {s:?}")))
    }
}

/// The live vote of one voter on one proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: ProposalId,
    pub voter: PrincipalId,
    pub choice: VoteChoice,
    pub weight: TokenAmount,
    pub cast_at: Timestamp,
    /// 0 for the first cast, incremented on every revision.
    pub revision: u32,
}

/// Weight per choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub for_weight: u128,
    pub against_weight: u128,
    pub abstain_weight: u128,
}

impl Tally {
    pub fn weight_of(&self, choice: VoteChoice) -> u128 {
        match choice {
            VoteChoice::For => self.for_weight,
            VoteChoice::Against => self.against_weight,
            VoteChoice::Abstain => self.abstain_weight,
        }
    }

    fn bucket_mut(&mut self, choice: VoteChoice) -> &mut u128 {
        match choice {
            VoteChoice::For => &mut self.for_weight,
            VoteChoice::Against => &mut self.against_weight,
            VoteChoice::Abstain => &mut self.abstain_weight,
        }
    }

    /// Sum of all buckets.
    pub fn total(&self) -> Result<u128, GovernanceError> {
        self.for_weight
            .checked_add(self.against_weight)
            .and_then(|t| t.checked_add(self.abstain_weight))
            .ok_or(GovernanceError::TallyOverflow)
    }

    /// The tally after `new` replaces `previous` (if any). `self` is untouched
    /// so a failure anywhere leaves the committed tally as it was.
    pub fn record(&self, previous: Option<&Vote>, new: &Vote) -> Result<Tally, GovernanceError> {
        let mut next = *self;
        if let Some(prev) = previous {
            let bucket = next.bucket_mut(prev.choice);
            *bucket = bucket.checked_sub(prev.weight.raw()).ok_or_else(|| {
                GovernanceError::Store(agora_store::StoreError::Corruption(format!(
                    "tally bucket {} below live vote weight of {}",
                    prev.choice, prev.voter
                )))
            })?;
        }
        let bucket = next.bucket_mut(new.choice);
        *bucket = bucket
            .checked_add(new.weight.raw())
            .ok_or(GovernanceError::TallyOverflow)?;
        next.total()?;
        Ok(next)
    }
}

/// Returned by a successful cast or revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub proposal_id: ProposalId,
    pub voter: PrincipalId,
    pub choice: VoteChoice,
    pub weight: TokenAmount,
    /// The superseded choice when this was a revision.
    pub previous_choice: Option<VoteChoice>,
    pub tally: Tally,
    /// Sequence number the ledger assigned to the commit.
    pub ledger_sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(voter: &str, choice: VoteChoice, weight: u128) -> Vote {
        Vote {
            proposal_id: ProposalId::new([7; 32]),
            voter: PrincipalId::new(voter),
            choice,
            weight: TokenAmount::new(weight),
            cast_at: Timestamp::new(0),
            revision: 0,
        }
    }

    #[test]
    fn first_cast_adds_to_bucket() {
        let t = Tally::default()
            .record(None, &vote("a", VoteChoice::For, 600))
            .unwrap();
        assert_eq!(t.for_weight, 600);
        assert_eq!(t.total().unwrap(), 600);
    }

    #[test]
    fn revision_moves_weight_between_buckets() {
        let first = vote("a", VoteChoice::For, 600);
        let t = Tally::default().record(None, &first).unwrap();
        let t = t.record(None, &vote("b", VoteChoice::Against, 500)).unwrap();
        let revised = vote("a", VoteChoice::Against, 600);
        let t = t.record(Some(&first), &revised).unwrap();
        assert_eq!(t.for_weight, 0);
        assert_eq!(t.against_weight, 1100);
        assert_eq!(t.total().unwrap(), 1100);
    }

    #[test]
    fn revision_with_changed_balance_uses_new_weight() {
        let first = vote("a", VoteChoice::Abstain, 100);
        let t = Tally::default().record(None, &first).unwrap();
        let t = t.record(Some(&first), &vote("a", VoteChoice::Abstain, 40)).unwrap();
        assert_eq!(t.abstain_weight, 40);
    }

    #[test]
    fn overflow_is_reported_and_input_untouched() {
        let t = Tally {
            for_weight: u128::MAX,
            ..Tally::default()
        };
        let err = t.record(None, &vote("a", VoteChoice::Against, 1)).unwrap_err();
        assert!(matches!(err, GovernanceError::TallyOverflow));
        assert_eq!(t.against_weight, 0);
    }

    #[test]
    fn choice_parses_case_insensitively() {
        assert_eq!("FOR".parse::<VoteChoice>().unwrap(), VoteChoice::For);
        assert!("maybe".parse::<VoteChoice>().is_err());
    }
}
