//! Execution dispatcher: routes an approved proposal to its effect handler.
//!
//! ParameterChange is handled here: each update is staged into
//! [`StagedParameters`] (and into the configuration when it names one of the
//! [`ConfigParam`]s). The engine commits the staged writes together with the
//! executed proposal. The other three kinds reach an [`EffectHandler`]
//! registered by the embedding service; their effects live in external
//! subsystems (ledger network, service catalog).

use std::collections::HashMap;
use std::sync::Arc;

use agora_types::Timestamp;

use crate::config::GovernanceConfig;
use crate::error::ExecutionError;
use crate::params::{check_parameter_name, ConfigParam, StagedParameters};
use crate::proposal::{Proposal, ProposalAction, ProposalKind};

/// Applies one kind of proposal effect.
///
/// Called at most once per proposal: the engine records a claim before the
/// call and never invokes the handler again while the claim stands. An `Err`
/// must mean the effect was not applied; the claim is then withdrawn and a
/// later execution may call the handler again. Handlers must not retry
/// internally.
pub trait EffectHandler: Send + Sync {
    fn apply(&self, proposal: &Proposal, action: &ProposalAction) -> Result<(), ExecutionError>;
}

impl<T: EffectHandler + ?Sized> EffectHandler for Arc<T> {
    fn apply(&self, proposal: &Proposal, action: &ProposalAction) -> Result<(), ExecutionError> {
        (**self).apply(proposal, action)
    }
}

/// What executing a proposal will do, worked out before anything is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub effects: ExecutionEffects,
    /// The action an [`EffectHandler`] still has to apply, for the extension kinds.
    pub external: Option<ProposalAction>,
}

/// Writes produced by a successful dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionEffects {
    pub parameters: StagedParameters,
    /// The new configuration, present only if a configuration parameter changed.
    pub config: Option<GovernanceConfig>,
}

#[derive(Default)]
pub struct ExecutionDispatcher {
    handlers: HashMap<ProposalKind, Box<dyn EffectHandler>>,
}

impl ExecutionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for an extension kind.
    ///
    /// ParameterChange is always handled internally; a handler registered for
    /// it is never called.
    pub fn with_handler(mut self, kind: ProposalKind, handler: impl EffectHandler + 'static) -> Self {
        if kind == ProposalKind::ParameterChange {
            tracing::warn!("ignoring effect handler registered for parameter changes");
            return self;
        }
        self.handlers.insert(kind, Box::new(handler));
        self
    }

    pub fn has_handler(&self, kind: ProposalKind) -> bool {
        kind == ProposalKind::ParameterChange || self.handlers.contains_key(&kind)
    }

    /// Decode the proposal's payload and work out what executing it means,
    /// without touching anything outside this process.
    ///
    /// ParameterChange is fully resolved into staged writes. The other kinds
    /// are checked for a registered handler and returned as the external
    /// action still to be applied with [`apply`](Self::apply).
    pub fn plan(
        &self,
        proposal: &Proposal,
        config: &GovernanceConfig,
        now: Timestamp,
    ) -> Result<ExecutionPlan, ExecutionError> {
        let action = proposal.action()?;
        match action {
            ProposalAction::ParameterChange { updates } => {
                let mut effects = ExecutionEffects::default();
                let mut new_config = config.clone();
                let mut config_changed = false;
                for update in updates {
                    check_parameter_name(&update.name).map_err(|reason| {
                        ExecutionError::InvalidParameter {
                            name: update.name.clone(),
                            reason,
                        }
                    })?;
                    if let Some(param) = ConfigParam::from_name(&update.name) {
                        new_config.apply(param, &update.value)?;
                        config_changed = true;
                    }
                    effects.parameters.set(
                        &update.name,
                        update.value,
                        Some(&proposal.creator),
                        Some(proposal.id),
                        now,
                    );
                }
                if config_changed {
                    effects.config = Some(new_config);
                }
                Ok(ExecutionPlan {
                    effects,
                    external: None,
                })
            }
            other => {
                if !self.handlers.contains_key(&proposal.kind) {
                    return Err(ExecutionError::NoHandler(proposal.kind));
                }
                Ok(ExecutionPlan {
                    effects: ExecutionEffects::default(),
                    external: Some(other),
                })
            }
        }
    }

    /// Run the registered handler for an external action.
    pub fn apply(&self, proposal: &Proposal, action: &ProposalAction) -> Result<(), ExecutionError> {
        let handler = self
            .handlers
            .get(&proposal.kind)
            .ok_or(ExecutionError::NoHandler(proposal.kind))?;
        handler.apply(proposal, action)
    }

    /// Plan and, for the extension kinds, apply in one step.
    pub fn dispatch(
        &self,
        proposal: &Proposal,
        config: &GovernanceConfig,
        now: Timestamp,
    ) -> Result<ExecutionEffects, ExecutionError> {
        let plan = self.plan(proposal, config, now)?;
        if let Some(action) = &plan.external {
            self.apply(proposal, action)?;
        }
        Ok(plan.effects)
    }
}
