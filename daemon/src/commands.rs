//! Subcommands of the `agora` binary and the wiring that opens the engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use serde_json::{json, Value};

use agora_governance::{
    ConfigParam, ExecutionDispatcher, GovernanceEngine, NewProposal, ParamValue, ParameterUpdate,
    ProposalAction, ProposalKind, ProposalStatus, VoteChoice,
};
use agora_store_lmdb::{LmdbEnvironment, LmdbGovernanceStore};
use agora_types::{PrincipalId, ProposalId, Timestamp, TokenAmount};
use agora_utils::format_duration;

use crate::config::AgoraConfig;
use crate::journal::{EffectOutbox, JournalSubmitter};
use crate::oracle::SnapshotOracle;

pub type CliEngine = GovernanceEngine<LmdbGovernanceStore, SnapshotOracle, JournalSubmitter>;

#[derive(clap::Subcommand)]
pub enum Command {
    /// Print the active governance configuration.
    Config,

    /// Submit a proposal.
    Propose {
        #[arg(long)]
        creator: PrincipalId,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Parameter change, repeatable: `--set quorum_percentage=10`.
        #[arg(long = "set", value_name = "NAME=VALUE", required_unless_present = "action")]
        set: Vec<String>,
        /// JSON file holding any proposal action.
        #[arg(long, conflicts_with = "set")]
        action: Option<PathBuf>,
    },

    /// Cast or revise a vote.
    Vote {
        proposal: ProposalId,
        #[arg(long)]
        voter: PrincipalId,
        /// "for", "against" or "abstain".
        #[arg(long)]
        choice: VoteChoice,
    },

    /// Evaluate a proposal after its delay and execute it if it passed.
    Execute { proposal: ProposalId },

    /// List proposals, oldest first.
    Proposals {
        #[arg(long)]
        status: Option<ProposalStatus>,
        #[arg(long)]
        kind: Option<ProposalKind>,
    },

    /// Show one proposal with its participation summary.
    Show { proposal: ProposalId },

    /// Show the live votes on a proposal, or one voter's vote.
    Votes {
        proposal: ProposalId,
        #[arg(long)]
        voter: Option<PrincipalId>,
    },

    /// Show a parameter, optionally with every value it has held.
    Param {
        name: String,
        #[arg(long)]
        history: bool,
    },

    /// List all parameters.
    Params,
}

/// Open the LMDB store and file-backed collaborators named by `config`.
pub fn open_engine(config: &AgoraConfig, now: Timestamp) -> anyhow::Result<CliEngine> {
    let env = LmdbEnvironment::open(&config.data_dir, config.map_size)
        .with_context(|| format!("opening store at {}", config.data_dir.display()))?;
    let oracle = SnapshotOracle::from_toml_file(&config.balances_file)?;
    let journal = JournalSubmitter::open(&config.journal_file)
        .with_context(|| format!("opening journal {}", config.journal_file.display()))?;
    let outbox = Arc::new(
        EffectOutbox::open(&config.effects_file)
            .with_context(|| format!("opening effects outbox {}", config.effects_file.display()))?,
    );

    let dispatcher = ExecutionDispatcher::new()
        .with_handler(ProposalKind::ContractUpgrade, Arc::clone(&outbox))
        .with_handler(ProposalKind::FundsAllocation, Arc::clone(&outbox))
        .with_handler(ProposalKind::ServiceUpdate, outbox);

    let engine = GovernanceEngine::initialize(
        env.governance_store(),
        oracle,
        journal,
        dispatcher,
        config.governance.clone(),
        now,
    )?;
    Ok(engine)
}

/// Run one subcommand and return its JSON output.
pub fn run(engine: &CliEngine, command: Command, now: Timestamp) -> anyhow::Result<Value> {
    let output = match command {
        Command::Config => {
            let config = engine.config()?;
            json!({
                "config": config,
                "voting_period": format_duration(config.voting_period_secs),
                "execution_delay": format_duration(config.execution_delay_secs),
            })
        }
        Command::Propose {
            creator,
            title,
            description,
            set,
            action,
        } => {
            let action = match action {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_str::<ProposalAction>(&content)
                        .with_context(|| format!("parsing action in {}", path.display()))?
                }
                None => ProposalAction::ParameterChange {
                    updates: set
                        .iter()
                        .map(|raw| parse_update(raw))
                        .collect::<anyhow::Result<_>>()?,
                },
            };
            let request = NewProposal::new(creator, title, description, &action)?;
            let id = engine.create_proposal(request, now)?;
            let proposal = engine.get_proposal(&id)?;
            json!({ "proposal_id": id, "voting_end": proposal.voting_end })
        }
        Command::Vote {
            proposal,
            voter,
            choice,
        } => serde_json::to_value(engine.cast_vote(&proposal, &voter, choice, now)?)?,
        Command::Execute { proposal } => {
            serde_json::to_value(engine.execute_proposal(&proposal, now)?)?
        }
        Command::Proposals { status, kind } => {
            serde_json::to_value(engine.list_proposals(status, kind)?)?
        }
        Command::Show { proposal } => {
            let p = engine.get_proposal(&proposal)?;
            let summary = engine.proposal_summary(&proposal, now)?;
            let executable_at = p.executable_at(engine.config()?.execution_delay_secs);
            json!({
                "proposal": p,
                "summary": summary,
                "executable_at": executable_at,
                "executable_in": format_duration(now.secs_until(executable_at)),
            })
        }
        Command::Votes { proposal, voter } => match voter {
            Some(voter) => serde_json::to_value(engine.get_vote(&proposal, &voter)?)?,
            None => serde_json::to_value(engine.list_votes(&proposal)?)?,
        },
        Command::Param { name, history } => {
            if history {
                serde_json::to_value(engine.parameter_history(&name)?)?
            } else {
                serde_json::to_value(engine.get_parameter(&name)?)?
            }
        }
        Command::Params => serde_json::to_value(engine.list_parameters()?)?,
    };
    Ok(output)
}

/// Parse `NAME=VALUE` into a typed update. Configuration parameters get
/// their own type; other names are inferred as flag, amount, percentage or text.
pub fn parse_update(raw: &str) -> anyhow::Result<ParameterUpdate> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got {raw:?}"))?;
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() {
        bail!("empty parameter name in {raw:?}");
    }

    let value = match ConfigParam::from_name(name) {
        Some(ConfigParam::MinProposalThreshold) => ParamValue::Amount(parse_amount(value)?),
        Some(ConfigParam::VotingPeriod | ConfigParam::ExecutionDelay) => {
            ParamValue::Duration(parse_duration(value)?)
        }
        Some(ConfigParam::QuorumPercentage | ConfigParam::MajorityPercentage) => {
            ParamValue::Percentage(parse_percentage(value)?)
        }
        None => infer_value(value),
    };
    Ok(ParameterUpdate {
        name: name.to_string(),
        value,
    })
}

fn parse_amount(s: &str) -> anyhow::Result<TokenAmount> {
    let raw: u128 = s.replace('_', "").parse().with_context(|| format!("invalid amount {s:?}"))?;
    Ok(TokenAmount::new(raw))
}

fn parse_percentage(s: &str) -> anyhow::Result<u8> {
    s.trim_end_matches('%')
        .parse()
        .with_context(|| format!("invalid percentage {s:?}"))
}

/// Seconds, or a number with an `s`, `m`, `h` or `d` suffix.
fn parse_duration(s: &str) -> anyhow::Result<u64> {
    let (digits, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s, 's'),
    };
    let n: u64 = digits.parse().with_context(|| format!("invalid duration {s:?}"))?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        other => bail!("unknown duration unit {other:?} in {s:?}"),
    };
    n.checked_mul(multiplier)
        .ok_or_else(|| anyhow!("duration {s:?} is too large"))
}

fn infer_value(s: &str) -> ParamValue {
    if let Ok(flag) = s.parse::<bool>() {
        return ParamValue::Flag(flag);
    }
    if let Some(pct) = s.strip_suffix('%').and_then(|p| p.parse::<u8>().ok()) {
        return ParamValue::Percentage(pct);
    }
    if let Ok(amount) = parse_amount(s) {
        return ParamValue::Amount(amount);
    }
    ParamValue::Text(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &std::path::Path) -> AgoraConfig {
        let balances = dir.join("balances.toml");
        std::fs::write(
            &balances,
            "[[snapshot]]\nat = 0\ntotal_supply = 1000\n[snapshot.balances]\nalice = 600\nbob = 500\n",
        )
        .unwrap();
        let mut config = AgoraConfig {
            data_dir: dir.join("data"),
            balances_file: balances,
            journal_file: dir.join("journal.jsonl"),
            effects_file: dir.join("effects.jsonl"),
            map_size: 16 * 1024 * 1024,
            ..AgoraConfig::default()
        };
        config.governance.min_proposal_threshold = TokenAmount::new(100);
        config.governance.voting_period_secs = 60;
        config.governance.execution_delay_secs = 30;
        config
    }

    #[test]
    fn parses_typed_updates() {
        let q = parse_update("quorum_percentage=10%").unwrap();
        assert_eq!(q.value, ParamValue::Percentage(10));
        let p = parse_update("voting_period = 3d").unwrap();
        assert_eq!(p.value, ParamValue::Duration(3 * 86_400));
        let t = parse_update("min_proposal_threshold=1_000_000").unwrap();
        assert_eq!(t.value, ParamValue::Amount(TokenAmount::new(1_000_000)));
        assert!(parse_update("quorum_percentage=lots").is_err());
        assert!(parse_update("no-equals-sign").is_err());
    }

    #[test]
    fn infers_free_form_values() {
        assert_eq!(infer_value("true"), ParamValue::Flag(true));
        assert_eq!(infer_value("25"), ParamValue::Amount(TokenAmount::new(25)));
        assert_eq!(infer_value("3%"), ParamValue::Percentage(3));
        assert_eq!(infer_value("eu-west"), ParamValue::Text("eu-west".into()));
    }

    #[test]
    fn propose_vote_execute_through_the_cli() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let engine = open_engine(&config, Timestamp::new(10)).unwrap();

        let out = run(
            &engine,
            Command::Propose {
                creator: PrincipalId::new("alice"),
                title: "Raise quorum".into(),
                description: "Ten percent".into(),
                set: vec!["quorum_percentage=10".into()],
                action: None,
            },
            Timestamp::new(10),
        )
        .unwrap();
        let id: ProposalId = out["proposal_id"].as_str().unwrap().parse().unwrap();

        run(
            &engine,
            Command::Vote {
                proposal: id,
                voter: PrincipalId::new("bob"),
                choice: VoteChoice::For,
            },
            Timestamp::new(20),
        )
        .unwrap();

        let out = run(&engine, Command::Execute { proposal: id }, Timestamp::new(100)).unwrap();
        assert!(out["Executed"].is_object());

        let param = run(
            &engine,
            Command::Param {
                name: "quorum_percentage".into(),
                history: true,
            },
            Timestamp::new(100),
        )
        .unwrap();
        assert_eq!(param.as_array().unwrap().len(), 2);

        let journal = std::fs::read_to_string(&config.journal_file).unwrap();
        assert_eq!(journal.lines().count(), 4);
    }
}
