//! File-backed collaborators for the CLI.
//!
//! - [`JournalSubmitter`]: the ledger submitter. Appends every state delta
//!   as one JSON line and syncs it before acknowledging.
//! - [`EffectOutbox`]: the effect handler for extension proposals. Appends
//!   the decoded action for the owning subsystem to pick up.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use agora_governance::{
    CommitReceipt, EffectHandler, ExecutionError, LedgerError, LedgerSubmitter, Proposal,
    ProposalAction, StateDelta,
};
use agora_types::{ProposalId, Timestamp};
use serde::Serialize;

#[derive(Serialize)]
struct JournalEntry<'a> {
    sequence: u64,
    recorded_at: Timestamp,
    delta: &'a StateDelta,
}

struct JournalState {
    file: File,
    next_sequence: u64,
}

pub struct JournalSubmitter {
    path: PathBuf,
    state: Mutex<JournalState>,
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn append_line(file: &mut File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_data()
}

impl JournalSubmitter {
    /// Open (or create) the journal, resuming the sequence after its last entry.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let existing = match File::open(path) {
            Ok(file) => {
                let mut count = 0u64;
                for line in BufReader::new(file).lines() {
                    if !line?.trim().is_empty() {
                        count += 1;
                    }
                }
                count
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        let file = open_append(path)?;
        tracing::debug!(path = %path.display(), entries = existing, "journal opened");
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(JournalState {
                file,
                next_sequence: existing + 1,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerSubmitter for JournalSubmitter {
    fn commit(&self, delta: &StateDelta) -> Result<CommitReceipt, LedgerError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| LedgerError::Unavailable("journal lock poisoned".to_string()))?;
        let sequence = state.next_sequence;
        let line = serde_json::to_string(&JournalEntry {
            sequence,
            recorded_at: Timestamp::now(),
            delta,
        })
        .map_err(|e| LedgerError::Rejected(e.to_string()))?;
        append_line(&mut state.file, &line)
            .map_err(|e| LedgerError::Unavailable(format!("{}: {e}", self.path.display())))?;
        state.next_sequence += 1;
        Ok(CommitReceipt { sequence })
    }
}

#[derive(Serialize)]
struct OutboxEntry<'a> {
    proposal_id: ProposalId,
    action: &'a ProposalAction,
}

pub struct EffectOutbox {
    path: PathBuf,
    file: Mutex<File>,
}

impl EffectOutbox {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(open_append(path)?),
        })
    }
}

impl EffectHandler for EffectOutbox {
    fn apply(&self, proposal: &Proposal, action: &ProposalAction) -> Result<(), ExecutionError> {
        let line = serde_json::to_string(&OutboxEntry {
            proposal_id: proposal.id,
            action,
        })
        .map_err(|e| ExecutionError::Handler(e.to_string()))?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| ExecutionError::Handler("outbox lock poisoned".to_string()))?;
        append_line(&mut file, &line)
            .map_err(|e| ExecutionError::Handler(format!("{}: {e}", self.path.display())))?;
        tracing::info!(proposal = %proposal.id, kind = %proposal.kind, "effect queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_governance::{GovernanceConfig, ProposalKind, ProposalStatus, Tally};
    use agora_types::PrincipalId;

    #[test]
    fn journal_resumes_sequence_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let delta = StateDelta::Initialized {
            config: GovernanceConfig::default(),
            parameters: Vec::new(),
        };

        let journal = JournalSubmitter::open(&path).unwrap();
        assert_eq!(journal.commit(&delta).unwrap().sequence, 1);
        assert_eq!(journal.commit(&delta).unwrap().sequence, 2);
        drop(journal);

        let journal = JournalSubmitter::open(&path).unwrap();
        assert_eq!(journal.commit(&delta).unwrap().sequence, 3);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2]["sequence"], 3);
        assert!(lines[0]["delta"]["Initialized"].is_object());
    }

    #[test]
    fn outbox_appends_decoded_action() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("effects.jsonl");
        let outbox = EffectOutbox::open(&path).unwrap();
        let action = ProposalAction::ServiceUpdate {
            service: "search".into(),
            changes: vec![("ranking".into(), "v2".into())],
        };
        let proposal = Proposal {
            id: ProposalId::new([5; 32]),
            seq: 1,
            creator: PrincipalId::new("alice"),
            title: "t".into(),
            description: "d".into(),
            kind: ProposalKind::ServiceUpdate,
            payload: action.encode().unwrap(),
            voting_start: Timestamp::new(0),
            voting_end: Timestamp::new(1),
            status: ProposalStatus::Active,
            tally: Tally::default(),
            executed: false,
            execution_time: None,
            effect_claimed_at: None,
        };
        outbox.apply(&proposal, &action).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let entry: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(entry["proposal_id"], "05".repeat(32));
        assert_eq!(entry["action"]["ServiceUpdate"]["service"], "search");
    }
}
