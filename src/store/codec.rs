// src/store/codec.rs

//! Text codec for the store: one record per line,
//! `state;id;dependencies;label;mode;failFast;host;user;credential;startedAt;finishedAt;command`.
//!
//! The command is the last field and may itself contain the separator.

use chrono::NaiveDateTime;

use crate::config::model::FormatSection;
use crate::errors::{Result, SequencerError};
use crate::store::record::{JobRecord, RemoteTarget, TIMESTAMP_FORMAT};
use crate::types::{ExecMode, JobId, JobState};

/// Number of fields per line.
pub const FIELD_COUNT: usize = 12;

/// Encodes and decodes records using the configured tokens.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    format: FormatSection,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(FormatSection::default())
    }
}

impl RecordCodec {
    pub fn new(format: FormatSection) -> Self {
        Self { format }
    }

    /// Decode a whole store. Blank lines are skipped; line numbers in
    /// errors are 1-based.
    pub fn decode_all(&self, text: &str) -> Result<Vec<JobRecord>> {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| self.decode_line(line, idx + 1))
            .collect()
    }

    /// Encode a whole store, one newline-terminated line per record.
    pub fn encode_all(&self, records: &[JobRecord]) -> String {
        let mut out = String::new();
        for record in records {
            out.push_str(&self.encode(record));
            out.push('\n');
        }
        out
    }

    pub fn decode_line(&self, line: &str, line_no: usize) -> Result<JobRecord> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let fields: Vec<&str> = line.splitn(FIELD_COUNT, self.format.separator.as_str()).collect();

        if fields.len() != FIELD_COUNT {
            return Err(corrupt(
                line_no,
                format!("expected {FIELD_COUNT} fields, found {}", fields.len()),
            ));
        }

        let corrupt_at = |reason: String| corrupt(line_no, reason);

        Ok(JobRecord {
            state: self.decode_state(fields[0]).map_err(corrupt_at)?,
            id: parse_id(fields[1]).map_err(corrupt_at)?,
            dependencies: self.decode_dependencies(fields[2]).map_err(corrupt_at)?,
            label: fields[3].to_string(),
            mode: self.decode_mode(fields[4]).map_err(corrupt_at)?,
            fail_fast: self.decode_flag(fields[5]).map_err(corrupt_at)?,
            remote: RemoteTarget {
                host: fields[6].to_string(),
                user: fields[7].to_string(),
                credential: fields[8].to_string(),
            },
            started_at: decode_timestamp(fields[9]).map_err(corrupt_at)?,
            finished_at: decode_timestamp(fields[10]).map_err(corrupt_at)?,
            command: fields[11].to_string(),
        })
    }

    pub fn encode(&self, record: &JobRecord) -> String {
        let deps = record
            .dependencies
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(&self.format.dependency_separator);

        let fields = [
            self.state_token(record.state).to_string(),
            record.id.to_string(),
            deps,
            record.label.clone(),
            self.mode_token(record.mode).to_string(),
            self.flag_token(record.fail_fast).to_string(),
            record.remote.host.clone(),
            record.remote.user.clone(),
            record.remote.credential.clone(),
            encode_timestamp(record.started_at),
            encode_timestamp(record.finished_at),
            record.command.clone(),
        ];

        fields.join(&self.format.separator)
    }

    pub fn state_token(&self, state: JobState) -> &str {
        let s = &self.format.states;
        match state {
            JobState::Pending => &s.pending,
            JobState::Waiting => &s.waiting,
            JobState::Running => &s.running,
            JobState::Done => &s.done,
            JobState::Failed => &s.failed,
            JobState::Blocked => &s.blocked,
        }
    }

    pub fn mode_token(&self, mode: ExecMode) -> &str {
        let m = &self.format.modes;
        match mode {
            ExecMode::Sync => &m.sync,
            ExecMode::Background => &m.background,
            ExecMode::Remote => &m.remote,
        }
    }

    fn flag_token(&self, flag: bool) -> &str {
        if flag {
            &self.format.flags.yes
        } else {
            &self.format.flags.no
        }
    }

    fn decode_state(&self, field: &str) -> std::result::Result<JobState, String> {
        let field = field.trim();
        [
            JobState::Pending,
            JobState::Waiting,
            JobState::Running,
            JobState::Done,
            JobState::Failed,
            JobState::Blocked,
        ]
        .into_iter()
        .find(|state| self.state_token(*state) == field)
        .ok_or_else(|| format!("unknown state '{field}'"))
    }

    fn decode_mode(&self, field: &str) -> std::result::Result<ExecMode, String> {
        let field = field.trim();
        [ExecMode::Sync, ExecMode::Background, ExecMode::Remote]
            .into_iter()
            .find(|mode| self.mode_token(*mode) == field)
            .ok_or_else(|| format!("unknown mode '{field}'"))
    }

    fn decode_flag(&self, field: &str) -> std::result::Result<bool, String> {
        let field = field.trim();
        if field == self.format.flags.yes {
            Ok(true)
        } else if field == self.format.flags.no {
            Ok(false)
        } else {
            Err(format!("invalid failFast flag '{field}'"))
        }
    }

    fn decode_dependencies(&self, field: &str) -> std::result::Result<Vec<JobId>, String> {
        if field.trim().is_empty() {
            return Ok(Vec::new());
        }
        field
            .split(self.format.dependency_separator.as_str())
            .map(parse_id)
            .collect()
    }
}

fn corrupt(line: usize, reason: String) -> SequencerError {
    SequencerError::StoreCorrupt { line, reason }
}

fn parse_id(field: &str) -> std::result::Result<JobId, String> {
    let field = field.trim();
    field
        .parse::<JobId>()
        .map_err(|_| format!("invalid job id '{field}'"))
}

fn decode_timestamp(field: &str) -> std::result::Result<Option<NaiveDateTime>, String> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(field, TIMESTAMP_FORMAT)
        .map(Some)
        .map_err(|e| format!("invalid timestamp '{field}': {e}"))
}

fn encode_timestamp(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}
