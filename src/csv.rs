use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::money::MoneyError;
use crate::policy::PolicyError;
use crate::{Decision, JobId, JobStatus, Money, PolicyRequest};

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized request type '{kind}'")]
    UnrecognizedType { line: usize, kind: String },

    #[error("line {line}: {kind} missing {field}")]
    MissingField {
        line: usize,
        kind: &'static str,
        field: &'static str,
    },

    #[error("line {line}: {source}")]
    InvalidStatus { line: usize, source: PolicyError },

    #[error("line {line}: invalid timestamp: {source}")]
    InvalidTimestamp {
        line: usize,
        source: chrono::ParseError,
    },

    #[error("line {line}: invalid amount: {source}")]
    InvalidAmount { line: usize, source: MoneyError },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    job: JobId,
    status: Option<String>,
    requested_at: Option<String>,
    reason: Option<String>,
    amount: Option<f64>,
    completion: Option<f64>,
    evidence: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    job: JobId,
    r#type: &'static str,
    allowed: bool,
    amount: String,
    message: &'static str,
}

/// Read policy requests from a csv file
pub fn read_requests(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<(JobId, PolicyRequest), CsvError>>, csv::Error> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            let request = parse_row(line, &row)?;
            Ok((row.job, request))
        }))
}

fn parse_row(line: usize, row: &InputRow) -> Result<PolicyRequest, CsvError> {
    match row.r#type.as_str() {
        "user_cancel" => {
            let kind = "user_cancel";
            let status = parse_status(line, kind, row.status.as_deref())?;
            let requested_at = required(line, kind, "requested_at", row.requested_at.as_deref())?;
            let requested_at = requested_at
                .parse::<DateTime<Utc>>()
                .map_err(|source| CsvError::InvalidTimestamp { line, source })?;
            Ok(PolicyRequest::UserCancel {
                status,
                requested_at,
            })
        }
        "driver_cancel" => {
            let kind = "driver_cancel";
            let status = parse_status(line, kind, row.status.as_deref())?;
            let reason = required(line, kind, "reason", row.reason.as_deref())?;
            Ok(PolicyRequest::DriverCancel {
                status,
                reason: reason.to_string(),
            })
        }
        "payout" => {
            let kind = "payout";
            let status = parse_status(line, kind, row.status.as_deref())?;
            let amount = row.amount.ok_or(CsvError::MissingField {
                line,
                kind,
                field: "amount",
            })?;
            let amount = Money::try_from_float(amount)
                .map_err(|source| CsvError::InvalidAmount { line, source })?;
            Ok(PolicyRequest::Payout {
                status,
                amount,
                completion: row.completion.unwrap_or(0.0),
            })
        }
        "dispute" => {
            let code = required(line, "dispute", "reason", row.reason.as_deref())?;
            let evidence = row
                .evidence
                .as_deref()
                .map(|items| {
                    items
                        .split(';')
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Ok(PolicyRequest::Dispute {
                code: code.to_string(),
                evidence,
            })
        }
        other => Err(CsvError::UnrecognizedType {
            line,
            kind: other.to_string(),
        }),
    }
}

fn required<'a>(
    line: usize,
    kind: &'static str,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, CsvError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(CsvError::MissingField { line, kind, field })
}

fn parse_status(
    line: usize,
    kind: &'static str,
    value: Option<&str>,
) -> Result<JobStatus, CsvError> {
    required(line, kind, "status", value)?
        .parse()
        .map_err(|source| CsvError::InvalidStatus { line, source })
}

/// Write decisions in csv format
pub fn write_decisions<'a>(
    out: impl io::Write,
    decisions: impl IntoIterator<Item = &'a (JobId, Decision)>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    for (job, decision) in decisions {
        let row = OutputRow {
            job: *job,
            r#type: decision.kind(),
            allowed: decision.allowed(),
            amount: decision.amount().map(|a| a.to_string()).unwrap_or_default(),
            message: decision.message(),
        };
        writer.serialize(&row)?;
    }

    writer.flush()?;
    Ok(())
}
