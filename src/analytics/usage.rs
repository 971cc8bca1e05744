/// In-process usage statistics
///
/// Keeps per-day request counters, per-query popularity and a log of recent
/// events. The query table and the log are both bounded. Feeds the
/// `/api/stats` endpoint.

use crate::analytics::AnalyticsRecorder;
use crate::cache::CacheManager;
use crate::error::SearchResult;
use crate::types::{AnalyticsEvent, RequestOutcome};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

/// Number of queries listed in a report
const TOP_QUERIES: usize = 10;

/// Default size of the recent-events log
pub const DEFAULT_RECENT_EVENTS: usize = 100;

/// Default number of distinct queries kept for popularity ranking
pub const DEFAULT_TRACKED_QUERIES: usize = 10_000;

/// Counters for one UTC day, or for all days combined
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyUsage {
    pub total_requests: u64,
    pub cached_requests: u64,
    pub api_requests: u64,
    pub total_response_time_ms: u64,
    pub total_products_returned: u64,
    pub error_count: u64,
    pub timeout_count: u64,
}

impl DailyUsage {
    fn apply(&mut self, event: &AnalyticsEvent) {
        self.total_requests += 1;
        if event.cache_hit {
            self.cached_requests += 1;
        } else {
            self.api_requests += 1;
        }
        self.total_response_time_ms += event.latency_ms;
        self.total_products_returned += event.result_count as u64;
        match event.outcome {
            RequestOutcome::Success => {}
            RequestOutcome::Timeout => self.timeout_count += 1,
            RequestOutcome::Failed => self.error_count += 1,
        }
    }

    fn merge(&mut self, other: &DailyUsage) {
        self.total_requests += other.total_requests;
        self.cached_requests += other.cached_requests;
        self.api_requests += other.api_requests;
        self.total_response_time_ms += other.total_response_time_ms;
        self.total_products_returned += other.total_products_returned;
        self.error_count += other.error_count;
        self.timeout_count += other.timeout_count;
    }

    pub fn avg_response_time_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_response_time_ms as f64 / self.total_requests as f64
        }
    }

    /// Share of requests served from cache, in percent
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cached_requests as f64 * 100.0 / self.total_requests as f64
        }
    }

    fn summary(&self) -> UsageSummary {
        UsageSummary {
            total_requests: self.total_requests,
            cached_requests: self.cached_requests,
            api_requests: self.api_requests,
            cache_hit_rate: round2(self.cache_hit_rate()),
            avg_response_time_ms: round2(self.avg_response_time_ms()),
            total_products_returned: self.total_products_returned,
            error_count: self.error_count,
            timeout_count: self.timeout_count,
        }
    }
}

/// Popularity record for one normalized query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryUsage {
    /// Query as first seen
    pub query: String,
    pub search_count: u64,
    pub last_searched: DateTime<Utc>,
    pub last_response_time_ms: u64,
    pub last_result_count: usize,
}

/// Reported view of a `DailyUsage`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub total_requests: u64,
    pub cached_requests: u64,
    pub api_requests: u64,
    /// Percent, two decimals
    pub cache_hit_rate: f64,
    pub avg_response_time_ms: f64,
    pub total_products_returned: u64,
    pub error_count: u64,
    pub timeout_count: u64,
}

/// Snapshot returned by `UsageStatsRecorder::report`
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub date: NaiveDate,
    pub today: UsageSummary,
    pub total: UsageSummary,
    pub top_queries: Vec<QueryUsage>,
    /// Newest first
    pub recent_events: Vec<AnalyticsEvent>,
}

#[derive(Debug, Default)]
struct UsageState {
    daily: BTreeMap<NaiveDate, DailyUsage>,
    queries: HashMap<String, QueryUsage>,
    recent: VecDeque<AnalyticsEvent>,
}

/// Analytics sink aggregating events in memory
#[derive(Debug)]
pub struct UsageStatsRecorder {
    state: RwLock<UsageState>,
    recent_capacity: usize,
    max_tracked_queries: usize,
}

impl Default for UsageStatsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_EVENTS)
    }
}

impl UsageStatsRecorder {
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            state: RwLock::new(UsageState::default()),
            recent_capacity,
            max_tracked_queries: DEFAULT_TRACKED_QUERIES,
        }
    }

    /// Cap the query table; the least recently searched query is evicted first
    pub fn with_max_tracked_queries(mut self, max_tracked_queries: usize) -> Self {
        self.max_tracked_queries = max_tracked_queries.max(1);
        self
    }

    /// Number of distinct queries currently tracked
    pub async fn tracked_queries(&self) -> usize {
        self.state.read().await.queries.len()
    }

    /// Counters for one UTC day
    pub async fn daily(&self, date: NaiveDate) -> DailyUsage {
        self.state.read().await.daily.get(&date).cloned().unwrap_or_default()
    }

    /// Popularity record for a query, looked up by its normalized form
    pub async fn query(&self, query: &str) -> Option<QueryUsage> {
        let key = CacheManager::normalize_query(query);
        self.state.read().await.queries.get(&key).cloned()
    }

    /// Build a report for `today`
    pub async fn report(&self, today: NaiveDate) -> UsageReport {
        let state = self.state.read().await;

        let mut total = DailyUsage::default();
        for usage in state.daily.values() {
            total.merge(usage);
        }
        let today_usage = state.daily.get(&today).cloned().unwrap_or_default();

        let mut top_queries: Vec<QueryUsage> = state.queries.values().cloned().collect();
        top_queries.sort_by(|a, b| {
            b.search_count
                .cmp(&a.search_count)
                .then_with(|| b.last_searched.cmp(&a.last_searched))
        });
        top_queries.truncate(TOP_QUERIES);

        UsageReport {
            date: today,
            today: today_usage.summary(),
            total: total.summary(),
            top_queries,
            recent_events: state.recent.iter().rev().cloned().collect(),
        }
    }
}

#[async_trait]
impl AnalyticsRecorder for UsageStatsRecorder {
    async fn record(&self, event: AnalyticsEvent) -> SearchResult<()> {
        let key = CacheManager::normalize_query(&event.query);
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        state
            .daily
            .entry(event.timestamp.date_naive())
            .or_default()
            .apply(&event);

        if let Some(usage) = state.queries.get_mut(&key) {
            usage.search_count += 1;
            usage.last_searched = usage.last_searched.max(event.timestamp);
            usage.last_response_time_ms = event.latency_ms;
            usage.last_result_count = event.result_count;
        } else {
            while state.queries.len() >= self.max_tracked_queries {
                if !evict_least_recent(&mut state.queries) {
                    break;
                }
            }
            state.queries.insert(
                key,
                QueryUsage {
                    query: event.query.clone(),
                    search_count: 1,
                    last_searched: event.timestamp,
                    last_response_time_ms: event.latency_ms,
                    last_result_count: event.result_count,
                },
            );
        }

        if self.recent_capacity > 0 {
            if state.recent.len() == self.recent_capacity {
                state.recent.pop_front();
            }
            state.recent.push_back(event);
        }

        debug!("Recorded usage event ({} queries tracked)", state.queries.len());
        Ok(())
    }
}

/// Drop the least recently searched query, ties going to the less popular one
fn evict_least_recent(queries: &mut HashMap<String, QueryUsage>) -> bool {
    let oldest = queries
        .iter()
        .min_by_key(|(_, usage)| (usage.last_searched, usage.search_count))
        .map(|(key, _)| key.clone());

    match oldest {
        Some(key) => {
            debug!("Evicting query usage for {}", key);
            queries.remove(&key);
            true
        }
        None => false,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn event_at(query: &str, cache_hit: bool, count: usize, latency: u64, at: DateTime<Utc>) -> AnalyticsEvent {
        AnalyticsEvent {
            timestamp: at,
            ..AnalyticsEvent::success(query, cache_hit, count, latency)
        }
    }

    fn noon(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_daily_counters() {
        let recorder = UsageStatsRecorder::default();
        recorder.record(event_at("tv", false, 20, 300, noon(1))).await.unwrap();
        recorder.record(event_at("tv", true, 20, 2, noon(1))).await.unwrap();
        recorder
            .record(AnalyticsEvent {
                timestamp: noon(1),
                ..AnalyticsEvent::failure("radio", RequestOutcome::Timeout, 10_000)
            })
            .await
            .unwrap();
        recorder
            .record(AnalyticsEvent {
                timestamp: noon(1),
                ..AnalyticsEvent::failure("radio", RequestOutcome::Failed, 50)
            })
            .await
            .unwrap();

        let day = recorder.daily(noon(1).date_naive()).await;
        assert_eq!(day.total_requests, 4);
        assert_eq!(day.cached_requests, 1);
        assert_eq!(day.api_requests, 3);
        assert_eq!(day.total_products_returned, 40);
        assert_eq!(day.timeout_count, 1);
        assert_eq!(day.error_count, 1);
        assert_eq!(day.cache_hit_rate(), 25.0);
        assert_eq!(day.avg_response_time_ms(), 2588.0);
    }

    #[tokio::test]
    async fn test_queries_grouped_by_normalized_form() {
        let recorder = UsageStatsRecorder::default();
        recorder.record(event_at("Peanut  Butter", false, 5, 10, noon(1))).await.unwrap();
        recorder.record(event_at("peanut butter", true, 5, 1, noon(2))).await.unwrap();

        let usage = recorder.query("PEANUT BUTTER").await.unwrap();
        assert_eq!(usage.query, "Peanut  Butter");
        assert_eq!(usage.search_count, 2);
        assert_eq!(usage.last_searched, noon(2));
        assert_eq!(usage.last_response_time_ms, 1);
    }

    #[tokio::test]
    async fn test_report_top_queries_and_totals() {
        let recorder = UsageStatsRecorder::default();
        let base = noon(5);

        for i in 0..3 {
            recorder.record(event_at("laptop", false, 10, 100, base + Duration::minutes(i))).await.unwrap();
        }
        recorder.record(event_at("mouse", false, 4, 100, base)).await.unwrap();
        recorder.record(event_at("keyboard", false, 4, 100, base + Duration::minutes(10))).await.unwrap();
        recorder.record(event_at("laptop", true, 10, 1, noon(4))).await.unwrap();

        let report = recorder.report(base.date_naive()).await;
        let order: Vec<&str> = report.top_queries.iter().map(|q| q.query.as_str()).collect();
        assert_eq!(order, vec!["laptop", "keyboard", "mouse"]);
        assert_eq!(report.top_queries[0].search_count, 4);

        assert_eq!(report.today.total_requests, 5);
        assert_eq!(report.total.total_requests, 6);
        assert_eq!(report.total.cached_requests, 1);
        assert_eq!(report.total.cache_hit_rate, 16.67);
        assert_eq!(report.recent_events.first().map(|e| e.query.as_str()), Some("laptop"));
        assert!(report.recent_events[0].cache_hit);
    }

    #[tokio::test]
    async fn test_report_limits_top_queries() {
        let recorder = UsageStatsRecorder::default();
        for i in 0..15 {
            recorder.record(event_at(&format!("item {}", i), false, 1, 1, noon(1))).await.unwrap();
        }

        let report = recorder.report(noon(1).date_naive()).await;
        assert_eq!(report.top_queries.len(), 10);
    }

    #[tokio::test]
    async fn test_recent_log_is_bounded() {
        let recorder = UsageStatsRecorder::new(3);
        for i in 0..5 {
            recorder.record(event_at(&format!("q{}", i), false, 1, 1, noon(1))).await.unwrap();
        }

        let report = recorder.report(noon(1).date_naive()).await;
        let recent: Vec<&str> = report.recent_events.iter().map(|e| e.query.as_str()).collect();
        assert_eq!(recent, vec!["q4", "q3", "q2"]);
    }

    #[tokio::test]
    async fn test_query_table_is_bounded() {
        let recorder = UsageStatsRecorder::default().with_max_tracked_queries(100);
        let base = noon(1);
        for i in 0..5_000 {
            let at = base + Duration::seconds(i);
            recorder.record(event_at(&format!("unique query {}", i), false, 1, 1, at)).await.unwrap();
        }

        assert_eq!(recorder.tracked_queries().await, 100);
        assert!(recorder.query("unique query 0").await.is_none());
        assert!(recorder.query("unique query 4999").await.is_some());
        // Daily counters still see every request
        assert_eq!(recorder.daily(base.date_naive()).await.total_requests, 5_000);
    }

    #[tokio::test]
    async fn test_eviction_keeps_recent_queries_ranked() {
        let recorder = UsageStatsRecorder::default().with_max_tracked_queries(3);
        let base = noon(7);
        let at = |minutes: i64| base + Duration::minutes(minutes);

        recorder.record(event_at("laptop", false, 1, 1, at(0))).await.unwrap();
        recorder.record(event_at("mouse", false, 1, 1, at(1))).await.unwrap();
        recorder.record(event_at("keyboard", false, 1, 1, at(2))).await.unwrap();
        recorder.record(event_at("keyboard", true, 1, 1, at(3))).await.unwrap();
        recorder.record(event_at("laptop", true, 1, 1, at(5))).await.unwrap();
        recorder.record(event_at("desk", false, 1, 1, at(6))).await.unwrap();

        assert!(recorder.query("mouse").await.is_none());

        let report = recorder.report(base.date_naive()).await;
        let order: Vec<(&str, u64)> = report
            .top_queries
            .iter()
            .map(|q| (q.query.as_str(), q.search_count))
            .collect();
        assert_eq!(order, vec![("laptop", 2), ("keyboard", 2), ("desk", 1)]);
    }

    #[tokio::test]
    async fn test_empty_report() {
        let recorder = UsageStatsRecorder::default();
        let report = recorder.report(noon(1).date_naive()).await;

        assert_eq!(report.today.total_requests, 0);
        assert_eq!(report.today.cache_hit_rate, 0.0);
        assert!(report.top_queries.is_empty());
        assert!(report.recent_events.is_empty());
    }
}
