use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use herald_core::config::SchedulerConfig;
use herald_core::Platform;
use herald_integrations::TokenCache;
use herald_publish::AdapterRegistry;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::content::{ContentStatus, ContentStatusSink};
use crate::error::{Result, SchedulerError};
use crate::store::ScheduledItemStore;
use crate::types::{ListFilter, NewSchedule, ScheduledItem, SweepReport};

/// Per-sweep limits, resolved from [`SchedulerConfig`].
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub batch_limit: usize,
    pub concurrency: usize,
    /// Upper bound on one item's dispatch: a token refresh plus the publish
    /// call, each capped by the HTTP client's own timeout.
    pub dispatch_timeout: Duration,
    pub stale_after: chrono::Duration,
}

impl From<&SchedulerConfig> for SweepConfig {
    fn from(cfg: &SchedulerConfig) -> Self {
        Self {
            batch_limit: cfg.batch_limit.max(1),
            concurrency: cfg.concurrency.max(1),
            dispatch_timeout: Duration::from_secs(cfg.request_timeout_secs.max(1) * 2),
            stale_after: i64::try_from(cfg.stale_after_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .unwrap_or(chrono::Duration::MAX),
        }
    }
}

/// User-facing scheduling operations plus the due-item sweep.
pub struct SchedulerService {
    store: Arc<ScheduledItemStore>,
    adapters: AdapterRegistry,
    content: Arc<dyn ContentStatusSink>,
    config: SweepConfig,
    /// Held for the whole of a sweep; overlapping triggers in this process
    /// return immediately instead of queueing.
    sweep_lock: Mutex<()>,
}

impl SchedulerService {
    pub fn new(
        store: Arc<ScheduledItemStore>,
        adapters: AdapterRegistry,
        content: Arc<dyn ContentStatusSink>,
        config: SweepConfig,
    ) -> Self {
        Self {
            store,
            adapters,
            content,
            config,
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &ScheduledItemStore {
        &self.store
    }

    /// Validate and persist a new item. A linked content record is marked
    /// `scheduled`.
    pub async fn schedule(&self, user_id: &str, new: NewSchedule) -> Result<ScheduledItem> {
        let item = self.store.create(user_id, new)?;
        if let Some(content_id) = &item.content_id {
            self.notify_content(
                user_id,
                content_id,
                ContentStatus::Scheduled,
                item.scheduled_for,
            )
            .await;
        }
        Ok(item)
    }

    pub fn cancel(&self, user_id: &str, id: &str) -> Result<()> {
        self.store.cancel(id, user_id)
    }

    pub fn reschedule(&self, user_id: &str, id: &str, new_time: DateTime<Utc>) -> Result<()> {
        self.store.reschedule(id, user_id, new_time)
    }

    pub fn list(&self, user_id: &str, filter: &ListFilter) -> Result<Vec<ScheduledItem>> {
        self.store.list(user_id, filter)
    }

    /// A single item, visible only to its owner.
    pub fn get(&self, user_id: &str, id: &str) -> Result<ScheduledItem> {
        let item = self.store.get(id)?;
        if item.user_id != user_id {
            return Err(SchedulerError::NotFound { id: id.to_string() });
        }
        Ok(item)
    }

    /// Publish everything due at `now`.
    ///
    /// Items are claimed atomically, so a concurrent sweep in another process
    /// cannot pick up the same rows. Per-item failures are recorded on the
    /// item; only a store failure before anything was claimed aborts the
    /// sweep.
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            warn!("sweep already running, skipping this trigger");
            return Ok(SweepReport::default());
        };

        if let Some(cutoff) = Utc::now().checked_sub_signed(self.config.stale_after) {
            self.store.release_stale(cutoff)?;
        }

        let claimed = self.store.claim_due(now, self.config.batch_limit)?;
        if claimed.is_empty() {
            debug!("no due items");
            return Ok(SweepReport::default());
        }
        info!(count = claimed.len(), "sweep started");

        let tokens = TokenCache::new();
        let outcomes: Vec<bool> = stream::iter(claimed)
            .map(|item| self.dispatch(item, &tokens))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let succeeded = outcomes.iter().filter(|ok| **ok).count();
        let report = SweepReport {
            processed: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
        };
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            refreshed_credentials = tokens.len(),
            "sweep finished"
        );
        Ok(report)
    }

    /// Publish one claimed item and record the outcome. Returns whether it
    /// ended `published`.
    async fn dispatch(&self, item: ScheduledItem, tokens: &TokenCache) -> bool {
        let platform: Platform = match item.platform.parse() {
            Ok(p) => p,
            Err(_) => {
                let message = format!("unknown platform: {}", item.platform);
                return self.record_failure(&item, &message);
            }
        };
        let adapter = self.adapters.for_platform(platform);
        let req = item.to_publish_request(platform);

        let outcome =
            tokio::time::timeout(self.config.dispatch_timeout, adapter.publish(&req, tokens)).await;

        match outcome {
            Ok(Ok(published)) => {
                if let Err(e) = self.store.mark_published(
                    &item.id,
                    &published.post_id,
                    published.post_url.as_deref(),
                ) {
                    // The post is live but unrecorded; the row stays in
                    // `processing` until the stale release fails it.
                    error!(
                        item_id = %item.id,
                        %platform,
                        post_id = %published.post_id,
                        error = %e,
                        "failed to record published item"
                    );
                    return false;
                }
                info!(
                    item_id = %item.id,
                    %platform,
                    adapter = adapter.name(),
                    post_id = %published.post_id,
                    "item published"
                );
                if let Some(content_id) = &item.content_id {
                    self.notify_content(
                        &item.user_id,
                        content_id,
                        ContentStatus::Published,
                        Utc::now(),
                    )
                    .await;
                }
                true
            }
            Ok(Err(e)) => {
                warn!(
                    item_id = %item.id,
                    %platform,
                    adapter = adapter.name(),
                    kind = e.kind(),
                    transient = e.is_transient(),
                    error = %e,
                    "publish failed"
                );
                self.record_failure(&item, &e.to_string())
            }
            Err(_) => {
                let message = format!(
                    "request timed out after {}s",
                    self.config.dispatch_timeout.as_secs()
                );
                warn!(item_id = %item.id, %platform, adapter = adapter.name(), "dispatch timed out");
                self.record_failure(&item, &message)
            }
        }
    }

    fn record_failure(&self, item: &ScheduledItem, message: &str) -> bool {
        if let Err(e) = self.store.mark_failed(&item.id, message) {
            error!(item_id = %item.id, error = %e, "failed to record failed item");
        }
        false
    }

    async fn notify_content(
        &self,
        user_id: &str,
        content_id: &str,
        status: ContentStatus,
        at: DateTime<Utc>,
    ) {
        if let Err(e) = self.content.set_status(user_id, content_id, status, at).await {
            warn!(content_id, %status, error = %e, "content status update failed");
        }
    }
}
