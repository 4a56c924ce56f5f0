//! Waiting for a resource to report a condition.

use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use settle_core::SettleConfig;

use crate::client::{ConditionExtractor, ResourceReader, StatusConditions};
use crate::context::WaitContext;
use crate::error::{Error, Result};
use crate::poll::{poll_until, PollOutcome};
use crate::report::{PollEvent, PollReporter, TracingReporter};
use crate::types::{Condition, ConditionQuery};

/// Polls a resource until it reports an exact `{type, status, reason}` triple.
pub struct ConditionWatcher {
    reader: Arc<dyn ResourceReader>,
    extractor: Arc<dyn ConditionExtractor>,
    reporter: Arc<dyn PollReporter>,
    interval: Duration,
    timeout: Duration,
}

impl ConditionWatcher {
    /// Create a watcher with default settings.
    pub fn new(reader: Arc<dyn ResourceReader>) -> Self {
        let config = SettleConfig::default();
        Self {
            reader,
            extractor: Arc::new(StatusConditions),
            reporter: Arc::new(TracingReporter),
            interval: config.poll_interval,
            timeout: config.condition_timeout,
        }
    }

    /// Start building a watcher.
    pub fn builder() -> ConditionWatcherBuilder {
        ConditionWatcherBuilder::new()
    }

    /// Wait until `query` is satisfied or `ctx` stops.
    ///
    /// Fetch and decode failures are retried, since the resource may not
    /// exist yet or may be mid-write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeadlineExceeded`] or [`Error::Cancelled`] with the
    /// last mismatch or read failure when the condition never shows up.
    pub async fn wait_for_condition(&self, ctx: &WaitContext, query: &ConditionQuery) -> Result<()> {
        let result = poll_until(ctx, self.interval, || self.probe(query)).await;

        if let Err(e) = &result {
            self.reporter.report(&PollEvent::WaitFailed {
                kind: query.kind.clone(),
                key: query.key.clone(),
                reason: e.to_string(),
            });
        }
        result
    }

    /// Wait with the configured condition timeout.
    ///
    /// # Errors
    ///
    /// See [`ConditionWatcher::wait_for_condition`].
    pub async fn wait(&self, query: &ConditionQuery) -> Result<()> {
        let ctx = WaitContext::with_timeout(self.timeout);
        self.wait_for_condition(&ctx, query).await
    }

    /// One attempt: fetch, decode, scan.
    async fn probe(&self, query: &ConditionQuery) -> PollOutcome {
        let resource = match self.reader.get(&query.kind, &query.key).await {
            Ok(resource) => resource,
            Err(e) => {
                self.reporter.report(&PollEvent::FetchFailed {
                    kind: query.kind.clone(),
                    key: query.key.clone(),
                    reason: e.to_string(),
                });
                return PollOutcome::Retryable(Error::read_failure(
                    query.kind.clone(),
                    query.key.clone(),
                    e.to_string(),
                ));
            }
        };

        let conditions = match self.extractor.extract_conditions(&resource) {
            Ok(conditions) => conditions,
            Err(e) => {
                self.reporter.report(&PollEvent::DecodeFailed {
                    kind: query.kind.clone(),
                    key: query.key.clone(),
                    reason: e.to_string(),
                });
                return PollOutcome::Retryable(Error::decode_failure(
                    query.kind.clone(),
                    query.key.clone(),
                    e.to_string(),
                ));
            }
        };

        self.classify(query, &conditions)
    }

    fn classify(&self, query: &ConditionQuery, conditions: &[Condition]) -> PollOutcome {
        let matched = conditions
            .iter()
            .inspect(|condition| {
                self.reporter.report(&PollEvent::ConditionObserved {
                    kind: query.kind.clone(),
                    key: query.key.clone(),
                    condition: (*condition).clone(),
                });
            })
            .find(|condition| query.matches(condition));

        if let Some(condition) = matched {
            self.reporter.report(&PollEvent::ConditionMatched {
                kind: query.kind.clone(),
                key: query.key.clone(),
                condition: condition.clone(),
            });
            return PollOutcome::Done;
        }

        self.reporter.report(&PollEvent::ConditionMissing {
            kind: query.kind.clone(),
            key: query.key.clone(),
            expected: query.expected.clone(),
        });

        let observed = if conditions.is_empty() {
            "no conditions".to_string()
        } else {
            conditions.iter().join(", ")
        };

        PollOutcome::Retryable(Error::ConditionMismatch {
            kind: query.kind.clone(),
            key: query.key.clone(),
            expected: query.expected.to_string(),
            observed,
        })
    }
}

/// Builder for [`ConditionWatcher`].
pub struct ConditionWatcherBuilder {
    reader: Option<Arc<dyn ResourceReader>>,
    extractor: Arc<dyn ConditionExtractor>,
    reporter: Arc<dyn PollReporter>,
    config: SettleConfig,
}

impl ConditionWatcherBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            reader: None,
            extractor: Arc::new(StatusConditions),
            reporter: Arc::new(TracingReporter),
            config: SettleConfig::default(),
        }
    }

    /// Set the resource reader.
    #[must_use]
    pub fn with_reader(mut self, reader: Arc<dyn ResourceReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Set a custom condition extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn ConditionExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Set a custom reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn PollReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Take interval and timeout from `config`.
    #[must_use]
    pub fn with_config(mut self, config: SettleConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Build the watcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] without a reader, or [`Error::Core`]
    /// if the configuration does not validate.
    pub fn build(self) -> Result<ConditionWatcher> {
        let reader = self
            .reader
            .ok_or_else(|| Error::invalid_config("Resource reader is required"))?;
        self.config.validate()?;

        Ok(ConditionWatcher {
            reader,
            extractor: self.extractor,
            reporter: self.reporter,
            interval: self.config.poll_interval,
            timeout: self.config.condition_timeout,
        })
    }
}

impl Default for ConditionWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::arithmetic_side_effects)]

    use proptest::prelude::*;

    use super::*;
    use crate::error::ClientError;
    use crate::memory::InMemoryCluster;
    use crate::report::RecordingReporter;
    use crate::types::{ConditionStatus, GroupVersionKind, ObjectKey};

    fn query() -> ConditionQuery {
        ConditionQuery::new(
            GroupVersionKind::new("extensions.gardener.cloud", "v1alpha1", "Worker"),
            ObjectKey::new("shoot--dev--local", "local"),
            "Ready",
            ConditionStatus::True,
            "Provisioning",
        )
    }

    fn watcher(
        cluster: Arc<InMemoryCluster>,
        reporter: Arc<RecordingReporter>,
    ) -> ConditionWatcher {
        ConditionWatcher::builder()
            .with_reader(cluster)
            .with_reporter(reporter)
            .interval(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_reader() {
        let result = ConditionWatcher::builder().build();
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_builder_rejects_zero_interval() {
        let cluster = Arc::new(InMemoryCluster::new());
        let result = ConditionWatcher::builder()
            .with_reader(cluster)
            .interval(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::Core(_))));
    }

    #[test]
    fn test_classify_first_match_stops_scan() {
        let reporter = Arc::new(RecordingReporter::new());
        let w = watcher(Arc::new(InMemoryCluster::new()), reporter.clone());
        let conditions = vec![
            Condition::new("Ready", ConditionStatus::True, "Provisioning"),
            Condition::new("Ready", ConditionStatus::True, "Provisioning"),
            Condition::new("Healthy", ConditionStatus::False, "Error"),
        ];

        let outcome = w.classify(&query(), &conditions);

        assert!(matches!(outcome, PollOutcome::Done));
        assert_eq!(
            reporter.count(|e| matches!(e, PollEvent::ConditionObserved { .. })),
            1
        );
    }

    #[test]
    fn test_classify_mismatch_names_expected_and_observed() {
        let reporter = Arc::new(RecordingReporter::new());
        let w = watcher(Arc::new(InMemoryCluster::new()), reporter);
        let conditions = vec![Condition::new("Ready", ConditionStatus::False, "Provisioning")];

        let outcome = w.classify(&query(), &conditions);

        assert!(matches!(outcome, PollOutcome::Retryable(Error::ConditionMismatch { .. })));
        let msg = match outcome {
            PollOutcome::Retryable(err) => err.to_string(),
            other => format!("{other:?}"),
        };
        assert!(msg.contains("EXPECTED: (type: Ready, status: True, reason: Provisioning)"));
        assert!(msg.contains("OBSERVED: (type: Ready, status: False, reason: Provisioning)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_is_retryable() {
        let cluster = Arc::new(InMemoryCluster::new());
        let reporter = Arc::new(RecordingReporter::new());
        let w = watcher(cluster.clone(), reporter.clone());

        let outcome = w.probe(&query()).await;

        assert!(matches!(outcome, PollOutcome::Retryable(Error::ReadFailure { .. })));
        assert_eq!(
            reporter.count(|e| matches!(e, PollEvent::FetchFailed { .. })),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_failure_is_retryable() {
        let cluster = Arc::new(InMemoryCluster::new());
        let q = query();
        cluster
            .put_resource(
                &q.kind,
                &q.key,
                serde_json::json!({"status": {"conditions": 42}}),
            )
            .await;
        let w = watcher(cluster, Arc::new(RecordingReporter::new()));

        let outcome = w.probe(&q).await;

        assert!(matches!(outcome, PollOutcome::Retryable(Error::DecodeFailure { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_recovers_after_unavailable_reads() {
        let cluster = Arc::new(InMemoryCluster::new());
        let q = query();
        cluster
            .put_conditions(&q.kind, &q.key, vec![q.expected.clone()])
            .await;
        cluster
            .fail_next_gets(2, ClientError::Unavailable("connection reset".into()))
            .await;
        let reporter = Arc::new(RecordingReporter::new());
        let w = watcher(cluster.clone(), reporter.clone());

        let ctx = WaitContext::with_timeout(Duration::from_secs(10));
        w.wait_for_condition(&ctx, &q).await.unwrap();

        assert_eq!(cluster.get_calls().await, 3);
        assert_eq!(
            reporter.count(|e| matches!(e, PollEvent::FetchFailed { .. })),
            2
        );
    }

    fn condition_strategy() -> impl Strategy<Value = Condition> {
        (
            prop::sample::select(vec!["Ready", "Healthy", "ControlPlaneHealthy"]),
            prop::sample::select(vec!["True", "False", "Unknown", "ConditionCheckError"]),
            prop::sample::select(vec!["Provisioning", "Succeeded", ""]),
        )
            .prop_map(|(t, s, r)| Condition::new(t, ConditionStatus::from(s), r))
    }

    proptest! {
        #[test]
        fn prop_classify_stops_at_first_match(
            conditions in prop::collection::vec(condition_strategy(), 1..8),
            pick in any::<prop::sample::Index>(),
        ) {
            let wanted = pick.get(&conditions).clone();
            let first = conditions.iter().position(|c| *c == wanted).unwrap();
            let q = ConditionQuery {
                kind: GroupVersionKind::deployment(),
                key: ObjectKey::new("ns", "name"),
                expected: wanted.clone(),
            };
            let reporter = Arc::new(RecordingReporter::new());
            let w = watcher(InMemoryCluster::new_arc(), reporter.clone());

            let outcome = w.classify(&q, &conditions);

            prop_assert!(matches!(outcome, PollOutcome::Done));
            prop_assert_eq!(
                reporter.count(|e| matches!(e, PollEvent::ConditionObserved { .. })),
                first + 1
            );
            prop_assert_eq!(
                reporter.count(|e| matches!(e, PollEvent::ConditionMatched { condition, .. } if *condition == wanted)),
                1
            );
        }
    }
}
