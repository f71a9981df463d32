//! Governance parameters.
//!
//! Parameters are named, typed values. The five that drive the engine itself
//! ([`ConfigParam`]) are mirrored into [`GovernanceConfig`](crate::GovernanceConfig);
//! any other name is free-form and only recorded. Every parameter, including
//! the governance thresholds themselves, changes only through an executed
//! ParameterChange proposal.

use std::fmt;

use agora_store::{GovernanceStore, StoreError, WriteOp};
use agora_types::{PrincipalId, ProposalId, Timestamp, TokenAmount};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::GovernanceError;

/// A typed parameter value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamValue {
    /// A token amount in raw units.
    Amount(TokenAmount),
    /// A duration in seconds.
    Duration(u64),
    /// An integer percentage, 0–100.
    Percentage(u8),
    Flag(bool),
    Text(String),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Amount(_) => "amount",
            Self::Duration(_) => "duration",
            Self::Percentage(_) => "percentage",
            Self::Flag(_) => "flag",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(a) => write!(f, "{a}"),
            Self::Duration(secs) => write!(f, "{secs}s"),
            Self::Percentage(p) => write!(f, "{p}%"),
            Self::Flag(b) => write!(f, "{b}"),
            Self::Text(t) => write!(f, "{t}"),
        }
    }
}

/// Longest accepted parameter name, in bytes.
pub const MAX_PARAMETER_NAME_LEN: usize = 255;

/// Check that `name` can be used as a parameter name: non-blank, at most
/// [`MAX_PARAMETER_NAME_LEN`] bytes, no control characters.
pub fn check_parameter_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("empty parameter name".to_string());
    }
    if name.len() > MAX_PARAMETER_NAME_LEN {
        return Err(format!(
            "parameter name is {} bytes, the limit is {MAX_PARAMETER_NAME_LEN}",
            name.len()
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(format!("parameter name {name:?} contains a control character"));
    }
    Ok(())
}

/// The parameters that make up the governance configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigParam {
    MinProposalThreshold,
    VotingPeriod,
    ExecutionDelay,
    QuorumPercentage,
    MajorityPercentage,
}

impl ConfigParam {
    pub const ALL: [Self; 5] = [
        Self::MinProposalThreshold,
        Self::VotingPeriod,
        Self::ExecutionDelay,
        Self::QuorumPercentage,
        Self::MajorityPercentage,
    ];

    /// Storage name of this parameter.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MinProposalThreshold => "min_proposal_threshold",
            Self::VotingPeriod => "voting_period",
            Self::ExecutionDelay => "execution_delay",
            Self::QuorumPercentage => "quorum_percentage",
            Self::MajorityPercentage => "majority_percentage",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Check that `value` has the type (and range) this parameter requires.
    pub fn check(&self, value: &ParamValue) -> Result<(), String> {
        match (self, value) {
            (Self::MinProposalThreshold, ParamValue::Amount(_)) => Ok(()),
            (Self::VotingPeriod, ParamValue::Duration(0)) => {
                Err("voting period must be at least one second".to_string())
            }
            (Self::VotingPeriod | Self::ExecutionDelay, ParamValue::Duration(_)) => Ok(()),
            (Self::QuorumPercentage | Self::MajorityPercentage, ParamValue::Percentage(p)) => {
                if *p <= 100 {
                    Ok(())
                } else {
                    Err(format!("{p} is not a percentage"))
                }
            }
            (param, other) => Err(format!(
                "{} expects {}, got {}",
                param.name(),
                param.expected_type(),
                other.type_name()
            )),
        }
    }

    fn expected_type(&self) -> &'static str {
        match self {
            Self::MinProposalThreshold => "amount",
            Self::VotingPeriod | Self::ExecutionDelay => "duration",
            Self::QuorumPercentage | Self::MajorityPercentage => "percentage",
        }
    }
}

/// Current value of a parameter plus who set it and when.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    pub value: ParamValue,
    pub updated_at: Timestamp,
    /// `None` for values seeded at initialisation.
    pub updated_by: Option<PrincipalId>,
    /// The executed proposal that set this value, `None` for seeded values.
    pub proposal_id: Option<ProposalId>,
}

/// Read access to the parameter table.
///
/// There is no public write path. Values change only through
/// [`StagedParameters`], which the execution dispatcher fills and the engine
/// commits together with the executed proposal.
pub struct ParameterStore<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: GovernanceStore + ?Sized> ParameterStore<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn get(&self, name: &str) -> Result<ParameterRecord, GovernanceError> {
        match self.store.get_parameter(name) {
            Ok(bytes) => codec::decode(&bytes),
            Err(StoreError::NotFound(_)) => Err(GovernanceError::ParameterNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Every value the parameter has held, oldest first.
    pub fn history(&self, name: &str) -> Result<Vec<ParameterRecord>, GovernanceError> {
        let entries = self.store.get_parameter_history(name)?;
        if entries.is_empty() {
            // Distinguish "never set" from "exists with empty history".
            self.get(name)?;
        }
        entries.iter().map(|b| codec::decode(b)).collect()
    }

    pub fn list(&self) -> Result<Vec<ParameterRecord>, GovernanceError> {
        self.store
            .list_parameters()?
            .iter()
            .map(|(_, bytes)| codec::decode(bytes))
            .collect()
    }
}

/// Parameter writes produced by one execution, not yet visible to readers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedParameters {
    records: Vec<ParameterRecord>,
}

impl StagedParameters {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stage `name = value`. A later set of the same name in the same
    /// execution supersedes the earlier one.
    pub(crate) fn set(
        &mut self,
        name: &str,
        value: ParamValue,
        setter: Option<&PrincipalId>,
        proposal: Option<ProposalId>,
        now: Timestamp,
    ) {
        self.records.retain(|r| r.name != name);
        self.records.push(ParameterRecord {
            name: name.to_string(),
            value,
            updated_at: now,
            updated_by: setter.cloned(),
            proposal_id: proposal,
        });
    }

    pub fn records(&self) -> &[ParameterRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn into_records(self) -> Vec<ParameterRecord> {
        self.records
    }

    /// Store operations writing the current value and one history entry per record.
    pub(crate) fn write_ops(records: &[ParameterRecord]) -> Result<Vec<WriteOp>, GovernanceError> {
        let mut ops = Vec::with_capacity(records.len() * 2);
        for record in records {
            let data = codec::encode(record)?;
            ops.push(WriteOp::PutParameter {
                name: record.name.clone(),
                data: data.clone(),
            });
            ops.push(WriteOp::AppendParameterHistory {
                name: record.name.clone(),
                data,
            });
        }
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_param_names_round_trip() {
        for p in ConfigParam::ALL {
            assert_eq!(ConfigParam::from_name(p.name()), Some(p));
        }
        assert_eq!(ConfigParam::from_name("marketplace_fee"), None);
    }

    #[test]
    fn percentage_params_reject_out_of_range_and_wrong_type() {
        let q = ConfigParam::QuorumPercentage;
        assert!(q.check(&ParamValue::Percentage(100)).is_ok());
        assert!(q.check(&ParamValue::Percentage(101)).is_err());
        assert!(q.check(&ParamValue::Duration(4)).is_err());
    }

    #[test]
    fn zero_voting_period_is_rejected() {
        assert!(ConfigParam::VotingPeriod.check(&ParamValue::Duration(0)).is_err());
        assert!(ConfigParam::ExecutionDelay.check(&ParamValue::Duration(0)).is_ok());
    }

    #[test]
    fn parameter_names_are_bounded_and_printable() {
        assert!(check_parameter_name("listing_fee").is_ok());
        assert!(check_parameter_name(&"x".repeat(MAX_PARAMETER_NAME_LEN)).is_ok());
        assert!(check_parameter_name(&"x".repeat(MAX_PARAMETER_NAME_LEN + 1)).is_err());
        assert!(check_parameter_name("  ").is_err());
        assert!(check_parameter_name("fee\u{0}x").is_err());
        assert!(check_parameter_name("fee\nx").is_err());
    }

    #[test]
    fn staging_same_name_twice_keeps_last() {
        let mut staged = StagedParameters::new();
        let now = Timestamp::new(10);
        staged.set("fee_bps", ParamValue::Percentage(1), None, None, now);
        staged.set("fee_bps", ParamValue::Percentage(2), None, None, now);
        assert_eq!(staged.records().len(), 1);
        assert_eq!(staged.records()[0].value, ParamValue::Percentage(2));
    }
}
