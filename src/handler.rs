//! Invocation boundary: turns a raw unit of work (one URL, or a JSON array of
//! URLs) into pipeline calls and reports per-URL results.

use crate::app::key::parse_absolute;
use crate::app::ArchivePipeline;
use crate::error::{ArchiveError, InputError, InvalidEntry};
use crate::types::ArchiveOutcome;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Parses a JSON array of strings; anything else is taken as one literal URL.
pub fn parse_input(input: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(input) {
        Ok(records) => records,
        Err(_) => vec![input.to_string()],
    }
}

/// Checks every entry, reporting all malformed ones together.
pub fn validate_urls(records: &[String]) -> Result<(), InputError> {
    let invalid: Vec<InvalidEntry> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match parse_absolute(record) {
            Ok(_) => None,
            Err(e) => Some(InvalidEntry {
                index,
                value: record.clone(),
                reason: match e {
                    ArchiveError::InvalidUrl { reason, .. } => reason,
                    other => other.to_string(),
                },
            }),
        })
        .collect();

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(InputError::MalformedUrls(invalid))
    }
}

#[derive(Debug)]
pub struct UrlReport {
    pub url: String,
    pub result: Result<ArchiveOutcome, ArchiveError>,
}

/// Per-URL results of one unit of work, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<UrlReport>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn archived(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(&r.result, Ok(o) if o.did_work()))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(&r.result, Ok(o) if !o.did_work()))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UrlReport> {
        self.results.iter().filter(|r| r.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Result of one queue message.
#[derive(Debug)]
pub struct MessageReport {
    pub index: usize,
    pub result: Result<BatchReport, InputError>,
}

impl MessageReport {
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(report) if report.is_success())
    }
}

/// Fans URLs out over a bounded number of concurrent pipeline calls.
pub struct BatchHandler {
    pipeline: Arc<ArchivePipeline>,
    concurrency: usize,
}

impl BatchHandler {
    pub fn new(pipeline: Arc<ArchivePipeline>, concurrency: usize) -> Self {
        Self {
            pipeline,
            concurrency: concurrency.max(1),
        }
    }

    pub fn pipeline(&self) -> &ArchivePipeline {
        &self.pipeline
    }

    /// Handles one unit of work. Invalid input rejects the whole unit before
    /// any URL is processed; otherwise every URL is attempted.
    pub async fn handle(
        &self,
        cancel: &CancellationToken,
        input: &str,
    ) -> Result<BatchReport, InputError> {
        let urls = parse_input(input);
        validate_urls(&urls)?;
        Ok(self.process_all(cancel, urls).await)
    }

    /// Handles a batch of message bodies independently of one another.
    pub async fn handle_messages<S: AsRef<str>>(
        &self,
        cancel: &CancellationToken,
        messages: &[S],
    ) -> Vec<MessageReport> {
        let mut reports = Vec::with_capacity(messages.len());
        for (index, message) in messages.iter().enumerate() {
            let result = self.handle(cancel, message.as_ref()).await;
            if let Err(e) = &result {
                warn!(message = index, "rejected message: {}", e);
            }
            reports.push(MessageReport { index, result });
        }
        reports
    }

    pub async fn process_all(&self, cancel: &CancellationToken, urls: Vec<String>) -> BatchReport {
        let pipeline = &self.pipeline;
        let results: Vec<UrlReport> = futures::stream::iter(urls)
            .map(|url| async move {
                let result = pipeline.process(cancel, &url).await;
                UrlReport { url, result }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = BatchReport { results };
        info!(
            total = report.len(),
            archived = report.archived(),
            skipped = report.skipped(),
            failed = report.failures().count(),
            "batch finished"
        );
        report
    }
}
