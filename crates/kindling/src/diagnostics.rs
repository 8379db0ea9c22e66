//! Deferred diagnostics gathered while the service is being configured.
//!
//! Configuration steps run before the log subscriber exists and must not
//! abort on the first problem they see. Instead they append findings to a
//! [`DiagnosticsAggregator`]. The bootstrap gate ([`DiagnosticsAggregator::validate`])
//! then turns every blocking finding into one [`ConfigurationError`], so an
//! operator sees all independent misconfigurations in a single failed start.
//!
//! Findings at [`FindingLevel::Notice`] are advisory: they are replayed into
//! the log but never block startup.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use strum::{Display, EnumString};
use thiserror::Error;
use time::OffsetDateTime;

pub(crate) const DIAGNOSTICS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::diagnostics");

/// Severity of a configuration finding, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FindingLevel {
    /// Advisory; never blocks startup.
    Notice,
    /// Suspicious configuration.
    Warning,
    /// Invalid configuration.
    Error,
    /// Configuration that makes a subsystem unusable.
    Critical,
}

impl FindingLevel {
    /// Levels checked by the gate, in reporting order.
    pub const BLOCKING: [Self; 3] = [Self::Warning, Self::Error, Self::Critical];

    /// Returns true when findings at this level fail the gate.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        !matches!(self, Self::Notice)
    }
}

/// A single recorded finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticFinding {
    level: FindingLevel,
    message: String,
    timestamp: OffsetDateTime,
    after_seal: bool,
}

impl DiagnosticFinding {
    /// Severity of the finding.
    #[must_use]
    pub const fn level(&self) -> FindingLevel {
        self.level
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// UTC time the finding was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Returns true when the finding arrived after the gate had run.
    #[must_use]
    pub const fn after_seal(&self) -> bool {
        self.after_seal
    }
}

impl fmt::Display for DiagnosticFinding {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.level, self.message)
    }
}

/// The gate found blocking findings.
///
/// The message lists every blocking finding, grouped by level in the order
/// warning, error, critical; insertion order is kept within each group.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    message: String,
    findings: Vec<DiagnosticFinding>,
}

impl ConfigurationError {
    fn from_grouped(findings: Vec<DiagnosticFinding>) -> Self {
        let mut message = format!(
            "configuration validation failed with {} finding(s):",
            findings.len()
        );
        for finding in &findings {
            message.push('\n');
            message.push_str(&finding.to_string());
        }
        Self { message, findings }
    }

    /// Blocking findings in reporting order.
    #[must_use]
    pub fn findings(&self) -> &[DiagnosticFinding] {
        &self.findings
    }

    /// Aggregated, newline-separated message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Append-only buffer of configuration findings.
///
/// One aggregator is created per bootstrap and handed by reference to every
/// configuration step. Appends take `&self` so the buffer can be shared with
/// concurrent contributors; insertion order is preserved per writer.
#[derive(Debug, Default)]
pub struct DiagnosticsAggregator {
    findings: Mutex<Vec<DiagnosticFinding>>,
    sealed: AtomicBool,
}

impl DiagnosticsAggregator {
    /// Creates an empty, unsealed aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finding.
    pub fn append(&self, level: FindingLevel, message: impl Into<String>) {
        let message = message.into();
        let after_seal = {
            // The gate seals under this lock, so the flag read here cannot
            // go stale before the push.
            let mut entries = self.entries();
            let after_seal = self.is_sealed();
            entries.push(DiagnosticFinding {
                level,
                message: message.clone(),
                timestamp: OffsetDateTime::now_utc(),
                after_seal,
            });
            after_seal
        };
        if after_seal {
            tracing::debug!(
                target: DIAGNOSTICS_TARGET,
                event = "finding_after_seal",
                severity = %level,
                message = %message,
                "finding recorded after the bootstrap gate ran"
            );
        }
    }

    /// Records an advisory finding.
    pub fn notice(&self, message: impl Into<String>) {
        self.append(FindingLevel::Notice, message);
    }

    /// Records a warning.
    pub fn warning(&self, message: impl Into<String>) {
        self.append(FindingLevel::Warning, message);
    }

    /// Records an error.
    pub fn error(&self, message: impl Into<String>) {
        self.append(FindingLevel::Error, message);
    }

    /// Records a critical finding.
    pub fn critical(&self, message: impl Into<String>) {
        self.append(FindingLevel::Critical, message);
    }

    /// Findings at or above `min_level` (all findings for `None`), in
    /// insertion order.
    #[must_use]
    pub fn all(&self, min_level: Option<FindingLevel>) -> Vec<DiagnosticFinding> {
        self.entries()
            .iter()
            .filter(|finding| min_level.is_none_or(|min| finding.level >= min))
            .cloned()
            .collect()
    }

    /// Findings recorded at exactly `level`, in insertion order.
    #[must_use]
    pub fn at_level(&self, level: FindingLevel) -> Vec<DiagnosticFinding> {
        self.entries()
            .iter()
            .filter(|finding| finding.level == level)
            .cloned()
            .collect()
    }

    /// Returns true when at least one finding was recorded at `level`.
    #[must_use]
    pub fn has_any(&self, level: FindingLevel) -> bool {
        self.entries().iter().any(|finding| finding.level == level)
    }

    /// Number of recorded findings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns true when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Returns true once the gate has run.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Runs the bootstrap gate.
    ///
    /// Seals the aggregator, then fails when any warning, error or critical
    /// finding was recorded before sealing. Later appends are kept for
    /// display but never change the outcome of a gate that already ran.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let findings = {
            let entries = self.entries();
            self.sealed.store(true, Ordering::Release);
            FindingLevel::BLOCKING
                .iter()
                .flat_map(|level| {
                    entries
                        .iter()
                        .filter(move |finding| finding.level == *level && !finding.after_seal)
                })
                .cloned()
                .collect::<Vec<_>>()
        };

        if findings.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::from_grouped(findings))
        }
    }

    /// Emits every finding through `tracing`.
    ///
    /// Intended to be called once the log subscriber is installed so the
    /// buffered findings reach the structured log.
    pub fn replay(&self) {
        for finding in self.entries().iter() {
            let recorded_at = finding.timestamp;
            match finding.level {
                FindingLevel::Notice => tracing::info!(
                    target: DIAGNOSTICS_TARGET,
                    event = "configuration_finding",
                    severity = %finding.level,
                    %recorded_at,
                    "{}",
                    finding.message
                ),
                FindingLevel::Warning => tracing::warn!(
                    target: DIAGNOSTICS_TARGET,
                    event = "configuration_finding",
                    severity = %finding.level,
                    %recorded_at,
                    "{}",
                    finding.message
                ),
                FindingLevel::Error | FindingLevel::Critical => tracing::error!(
                    target: DIAGNOSTICS_TARGET,
                    event = "configuration_finding",
                    severity = %finding.level,
                    %recorded_at,
                    "{}",
                    finding.message
                ),
            }
        }
    }

    /// Immutable copy of every finding, for display after the build.
    #[must_use]
    pub fn report(&self) -> DiagnosticsReport {
        DiagnosticsReport {
            findings: self.all(None),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<DiagnosticFinding>> {
        self.findings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only snapshot of the findings recorded during a bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticsReport {
    findings: Vec<DiagnosticFinding>,
}

impl DiagnosticsReport {
    /// Every finding in insertion order.
    #[must_use]
    pub fn findings(&self) -> &[DiagnosticFinding] {
        &self.findings
    }

    /// Findings at or above `min_level`.
    pub fn at_least(&self, min_level: FindingLevel) -> impl Iterator<Item = &DiagnosticFinding> {
        self.findings
            .iter()
            .filter(move |finding| finding.level >= min_level)
    }

    /// Returns true when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use rstest::rstest;

    use super::*;

    #[test]
    fn empty_aggregator_passes_the_gate() {
        let diagnostics = DiagnosticsAggregator::new();
        assert!(diagnostics.validate().is_ok());
        assert!(diagnostics.is_sealed());
    }

    #[rstest]
    #[case(FindingLevel::Warning)]
    #[case(FindingLevel::Error)]
    #[case(FindingLevel::Critical)]
    fn any_blocking_finding_fails_the_gate(#[case] level: FindingLevel) {
        let diagnostics = DiagnosticsAggregator::new();
        diagnostics.append(level, "broken");

        let error = diagnostics.validate().expect_err("gate should fail");
        assert_eq!(error.findings().len(), 1);
        assert!(error.message().contains("broken"));
    }

    #[test]
    fn notices_do_not_block() {
        let diagnostics = DiagnosticsAggregator::new();
        diagnostics.notice("telemetry disabled");
        assert!(diagnostics.validate().is_ok());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn gate_groups_findings_by_level() {
        let diagnostics = DiagnosticsAggregator::new();
        diagnostics.error("E1");
        diagnostics.warning("W1");
        diagnostics.critical("C1");
        diagnostics.warning("W2");

        let error = diagnostics.validate().expect_err("gate should fail");
        let lines: Vec<&str> = error.message().lines().skip(1).collect();
        assert_eq!(
            lines,
            vec!["warning: W1", "warning: W2", "error: E1", "critical: C1"]
        );
    }

    #[test]
    fn filters_preserve_insertion_order() {
        let diagnostics = DiagnosticsAggregator::new();
        diagnostics.notice("N1");
        diagnostics.critical("C1");
        diagnostics.warning("W1");
        diagnostics.error("E1");

        let messages = |findings: Vec<DiagnosticFinding>| {
            findings
                .iter()
                .map(|finding| finding.message().to_owned())
                .collect::<Vec<_>>()
        };
        assert_eq!(messages(diagnostics.all(None)), ["N1", "C1", "W1", "E1"]);
        assert_eq!(
            messages(diagnostics.all(Some(FindingLevel::Error))),
            ["C1", "E1"]
        );
        assert_eq!(messages(diagnostics.at_level(FindingLevel::Warning)), ["W1"]);
        assert!(diagnostics.has_any(FindingLevel::Critical));
        assert!(!diagnostics.all(Some(FindingLevel::Notice)).is_empty());
    }

    #[test]
    fn findings_after_the_gate_are_kept_but_do_not_matter() {
        let diagnostics = DiagnosticsAggregator::new();
        diagnostics
            .validate()
            .expect("empty aggregator passes the gate");
        diagnostics.critical("late");

        assert!(diagnostics.has_any(FindingLevel::Critical));
        let late = diagnostics.at_level(FindingLevel::Critical);
        assert!(late.iter().all(DiagnosticFinding::after_seal));
        assert!(diagnostics.validate().is_ok());
    }

    #[test]
    fn concurrent_writers_keep_their_own_order() {
        let diagnostics = Arc::new(DiagnosticsAggregator::new());
        let handles: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|writer| {
                let diagnostics = Arc::clone(&diagnostics);
                thread::spawn(move || {
                    for index in 0..50 {
                        diagnostics.notice(format!("{writer}-{index}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread panicked");
        }

        let findings = diagnostics.all(None);
        assert_eq!(findings.len(), 100);
        for writer in ["a", "b"] {
            let sequence: Vec<usize> = findings
                .iter()
                .filter_map(|finding| finding.message().strip_prefix(&format!("{writer}-")))
                .filter_map(|index| index.parse().ok())
                .collect();
            assert_eq!(sequence, (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn writers_racing_the_gate_never_slip_past_it() {
        let diagnostics = Arc::new(DiagnosticsAggregator::new());
        let writer = {
            let diagnostics = Arc::clone(&diagnostics);
            thread::spawn(move || {
                for index in 0..500 {
                    diagnostics.warning(format!("racing-{index}"));
                }
            })
        };
        while diagnostics.is_empty() {
            thread::yield_now();
        }
        let gated = diagnostics
            .validate()
            .err()
            .map_or(0, |error| error.findings().len());
        writer.join().expect("writer thread panicked");

        let findings = diagnostics.all(None);
        let before_seal = findings.iter().filter(|finding| !finding.after_seal()).count();
        assert_eq!(gated, before_seal);
        assert!(
            findings
                .iter()
                .skip_while(|finding| !finding.after_seal())
                .all(DiagnosticFinding::after_seal),
            "a finding recorded after the gate was not flagged"
        );

        let regated = diagnostics
            .validate()
            .err()
            .map_or(0, |error| error.findings().len());
        assert_eq!(regated, gated);
    }

    #[test]
    fn report_is_a_snapshot() {
        let diagnostics = DiagnosticsAggregator::new();
        diagnostics.notice("before");
        let report = diagnostics.report();
        diagnostics.notice("after");

        assert_eq!(report.findings().len(), 1);
        assert_eq!(report.at_least(FindingLevel::Warning).count(), 0);
    }
}
