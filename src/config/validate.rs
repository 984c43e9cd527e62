// src/config/validate.rs

use std::collections::HashSet;
use std::net::IpAddr;

use crate::config::model::{ConfigFile, FormatSection, RawConfigFile};
use crate::errors::{Result, SequencerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SequencerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_sequencer(cfg)?;
    validate_format(&cfg.format)?;
    Ok(())
}

fn validate_sequencer(cfg: &RawConfigFile) -> Result<()> {
    let seq = &cfg.sequencer;

    if seq.poll_interval_ms == 0 {
        return Err(SequencerError::ConfigError(
            "[sequencer].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    let sentinel = seq.shutdown_sentinel.trim();
    if sentinel.is_empty() {
        return Err(SequencerError::ConfigError(
            "[sequencer].shutdown_sentinel must not be empty".to_string(),
        ));
    }
    if sentinel.contains('=') {
        return Err(SequencerError::ConfigError(format!(
            "[sequencer].shutdown_sentinel '{}' must not contain '=' (it would look like a callback)",
            sentinel
        )));
    }

    if seq.running_timeout_secs == Some(0) {
        return Err(SequencerError::ConfigError(
            "[sequencer].running_timeout_secs must be >= 1 when set".to_string(),
        ));
    }

    // Remote wrappers call back to `callback_host`; a loopback-only
    // listener can never hear them.
    if let Some(callback) = &cfg.remote.callback_host {
        if !is_loopback_host(callback) && is_loopback_host(&seq.bind) {
            return Err(SequencerError::ConfigError(format!(
                "[remote].callback_host '{}' is unreachable while [sequencer].bind is '{}'; bind to a routable address or 0.0.0.0",
                callback.trim(),
                seq.bind.trim()
            )));
        }
    }

    Ok(())
}

fn is_loopback_host(host: &str) -> bool {
    let host = host.trim();
    host.eq_ignore_ascii_case("localhost")
        || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

fn validate_format(fmt: &FormatSection) -> Result<()> {
    if fmt.separator.is_empty() {
        return Err(SequencerError::ConfigError(
            "[format].separator must not be empty".to_string(),
        ));
    }
    if fmt.dependency_separator.is_empty() {
        return Err(SequencerError::ConfigError(
            "[format].dependency_separator must not be empty".to_string(),
        ));
    }
    if fmt.separator == fmt.dependency_separator {
        return Err(SequencerError::ConfigError(format!(
            "[format].separator and dependency_separator must differ (both '{}')",
            fmt.separator
        )));
    }

    let s = &fmt.states;
    ensure_distinct_tokens(
        "[format.states]",
        &fmt.separator,
        &[
            &s.pending, &s.waiting, &s.running, &s.done, &s.failed, &s.blocked,
        ],
    )?;

    let m = &fmt.modes;
    ensure_distinct_tokens(
        "[format.modes]",
        &fmt.separator,
        &[&m.sync, &m.background, &m.remote],
    )?;

    ensure_distinct_tokens("[format.flags]", &fmt.separator, &[&fmt.flags.yes, &fmt.flags.no])?;

    if s.done.contains('=') || s.failed.contains('=') {
        return Err(SequencerError::ConfigError(
            "[format.states].done and failed must not contain '='".to_string(),
        ));
    }

    Ok(())
}

fn ensure_distinct_tokens(section: &str, separator: &str, tokens: &[&String]) -> Result<()> {
    let mut seen = HashSet::new();
    for token in tokens {
        if token.trim().is_empty() {
            return Err(SequencerError::ConfigError(format!(
                "{section} tokens must not be empty"
            )));
        }
        if token.contains(separator) {
            return Err(SequencerError::ConfigError(format!(
                "{section} token '{token}' contains the field separator '{separator}'"
            )));
        }
        if !seen.insert(token.as_str()) {
            return Err(SequencerError::ConfigError(format!(
                "{section} token '{token}' is used more than once"
            )));
        }
    }
    Ok(())
}
