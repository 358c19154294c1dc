//! Two-stage query builder: search, filter summaries, fetch details,
//! filter details.
//!
//! ```ignore
//! let matches = Pddikti::search("Joko Kehutanan UGM")
//!     .filter_by(|s| s.sinkatan_pt == "UGM")
//!     .get_details()
//!     .filter_by(|d| d.jenjang == "S1")
//!     .run(&client)
//!     .await;
//! ```
//!
//! Builders are single-owner values: `filter_by` consumes and returns the
//! stage, and `get_details` consumes the search stage so its predicate
//! list is frozen once the detail stage exists.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::client::{FetchFailure, Fetched, StudentSource};
use crate::models::{DetailRecord, FilteredRecord, SearchSummary};

/// Side-effect-free test over one record.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

fn passes<T>(predicates: &[Predicate<T>], record: &T) -> bool {
    predicates.iter().all(|predicate| predicate(record))
}

/// Entry point of the builder chain.
pub struct Pddikti;

impl Pddikti {
    pub fn search(query: impl Into<String>) -> SearchStage {
        SearchStage::new(query)
    }
}

#[derive(Clone)]
pub struct SearchStage {
    query: String,
    filters: Vec<Predicate<SearchSummary>>,
}

impl SearchStage {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: Vec::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Keep only summaries for which `predicate` holds.
    pub fn filter_by<F>(self, predicate: F) -> Self
    where
        F: Fn(&SearchSummary) -> bool + Send + Sync + 'static,
    {
        self.filter_with(Arc::new(predicate))
    }

    pub fn filter_with(mut self, predicate: Predicate<SearchSummary>) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn get_details(self) -> DetailStage {
        DetailStage {
            query: self.query,
            search_filters: self.filters,
            detail_filters: Vec::new(),
        }
    }
}

impl fmt::Debug for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchStage")
            .field("query", &self.query)
            .field("filters", &self.filters.len())
            .finish()
    }
}

#[derive(Clone)]
pub struct DetailStage {
    query: String,
    search_filters: Vec<Predicate<SearchSummary>>,
    detail_filters: Vec<Predicate<DetailRecord>>,
}

impl DetailStage {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filter_by<F>(self, predicate: F) -> Self
    where
        F: Fn(&DetailRecord) -> bool + Send + Sync + 'static,
    {
        self.filter_with(Arc::new(predicate))
    }

    pub fn filter_with(mut self, predicate: Predicate<DetailRecord>) -> Self {
        self.detail_filters.push(predicate);
        self
    }

    pub async fn run<S>(&self, source: &S) -> Vec<FilteredRecord>
    where
        S: StudentSource + ?Sized,
    {
        self.run_with(source, &NoopObserver).await
    }

    /// Execute the pipeline, reporting progress to `observer`.
    ///
    /// Details are fetched one at a time in search order. A failed search
    /// counts as zero hits and a failed detail lookup drops the candidate,
    /// so no failure ever reaches the caller.
    pub async fn run_with<S, O>(&self, source: &S, observer: &O) -> Vec<FilteredRecord>
    where
        S: StudentSource + ?Sized,
        O: PipelineObserver + ?Sized,
    {
        observer.query_started(&self.query);

        // The failure reason is dropped: no hits and a failed search look the same here.
        let summaries = source.search(&self.query).await.found().unwrap_or_default();
        observer.search_completed(&self.query, summaries.len());

        let candidates: Vec<SearchSummary> = summaries
            .into_iter()
            .filter(|summary| passes(&self.search_filters, summary))
            .collect();
        observer.summaries_filtered(&self.query, candidates.len());

        let mut results = Vec::new();
        for summary in candidates {
            let detail = match source.get_detail(&summary.id).await {
                Fetched::Found(detail) => detail,
                Fetched::Absent(reason) => {
                    observer.detail_missing(&self.query, &summary, &reason);
                    continue;
                }
            };

            if !passes(&self.detail_filters, &detail) {
                continue;
            }

            let record = FilteredRecord {
                query: self.query.clone(),
                search_result: summary,
                detail_result: detail,
            };
            observer.detail_matched(&record);
            results.push(record);
        }

        observer.query_finished(&self.query, results.len());
        results
    }
}

impl fmt::Debug for DetailStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetailStage")
            .field("query", &self.query)
            .field("search_filters", &self.search_filters.len())
            .field("detail_filters", &self.detail_filters.len())
            .finish()
    }
}

/// Checkpoints reported while a pipeline runs. Every hook defaults to a no-op.
pub trait PipelineObserver: Send + Sync {
    fn query_started(&self, _query: &str) {}

    fn search_completed(&self, _query: &str, _found: usize) {}

    fn summaries_filtered(&self, _query: &str, _kept: usize) {}

    fn detail_missing(&self, _query: &str, _summary: &SearchSummary, _reason: &FetchFailure) {}

    fn detail_matched(&self, _record: &FilteredRecord) {}

    fn query_finished(&self, _query: &str, _matches: usize) {}
}

pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Reports pipeline progress through `tracing`.
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn query_started(&self, query: &str) {
        info!("processing query: {query}");
    }

    fn summaries_filtered(&self, query: &str, kept: usize) {
        info!("{query}: filtered to {kept} students after search filters");
    }

    fn detail_missing(&self, query: &str, summary: &SearchSummary, reason: &FetchFailure) {
        debug!("{query}: skipping {} ({}): {reason}", summary.nama, summary.id);
    }

    fn detail_matched(&self, record: &FilteredRecord) {
        info!(
            "match found: {} ({})",
            record.detail_result.nama, record.detail_result.nim
        );
    }

    fn query_finished(&self, query: &str, matches: usize) {
        info!("total matches for {query}: {matches}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::models::Gender;
    use crate::testing::{detail, summary, StubSource};

    fn joko_source() -> StubSource {
        StubSource::new()
            .with_search(
                "Joko",
                vec![summary("s1", "Joko Widodo"), summary("s2", "Budi")],
            )
            .with_detail(detail("s1", "Joko Widodo", Gender::Male, "S1"))
            .with_detail(detail("s2", "Budi", Gender::Male, "S2"))
    }

    #[test]
    fn search_stage_keeps_query() {
        let stage = Pddikti::search("Joko");
        assert_eq!(stage.query(), "Joko");
        assert_eq!(stage.get_details().query(), "Joko");
    }

    #[tokio::test]
    async fn applies_search_filters_before_fetching_details() {
        let source = joko_source();

        let results = Pddikti::search("Joko")
            .filter_by(|s| s.nama.contains("Joko"))
            .get_details()
            .run(&source)
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].search_result.nama, "Joko Widodo");
        assert_eq!(source.detail_calls(), vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn applies_detail_filters() {
        let source = joko_source();

        let results = Pddikti::search("Joko")
            .filter_by(|s| s.nama.contains("Joko"))
            .get_details()
            .filter_by(|d| d.jenis_kelamin == Gender::Male)
            .run(&source)
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].query, "Joko");
        assert_eq!(results[0].search_result.id, "s1");
        assert_eq!(results[0].detail_result.id, "s1");
    }

    #[tokio::test]
    async fn filters_out_details_that_do_not_match() {
        let source = joko_source();

        let results = Pddikti::search("Joko")
            .filter_by(|s| s.nama.contains("Joko"))
            .get_details()
            .filter_by(|d| d.jenis_kelamin == Gender::Female)
            .run(&source)
            .await;

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn no_filters_pass_every_present_detail_through_in_order() {
        let source = joko_source();

        let results = Pddikti::search("Joko").get_details().run(&source).await;

        let ids: Vec<&str> = results.iter().map(|r| r.search_result.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn predicates_are_combined_with_and() {
        let source = joko_source();

        let results = Pddikti::search("Joko")
            .filter_by(|_| true)
            .filter_by(|_| false)
            .get_details()
            .run(&source)
            .await;
        assert!(results.is_empty());
        assert!(source.detail_calls().is_empty());

        let results = Pddikti::search("Joko")
            .get_details()
            .filter_by(|d| d.jenjang == "S1")
            .filter_by(|_| false)
            .run(&source)
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn missing_details_are_dropped_silently() {
        let source = StubSource::new()
            .with_search(
                "Budi",
                vec![summary("a", "Budi A"), summary("b", "Budi B"), summary("c", "Budi C")],
            )
            .with_detail(detail("a", "Budi A", Gender::Male, "S1"))
            .with_detail(detail("c", "Budi C", Gender::Female, "S2"));

        let results = Pddikti::search("Budi").get_details().run(&source).await;

        let ids: Vec<&str> = results.iter().map(|r| r.detail_result.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(source.detail_calls(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failed_search_yields_no_records() {
        let source = StubSource::new();
        let results = Pddikti::search("nobody").get_details().run(&source).await;
        assert!(results.is_empty());
        assert!(source.detail_calls().is_empty());
    }

    #[tokio::test]
    async fn rerunning_the_same_builder_is_deterministic() {
        let source = joko_source();
        let builder = Pddikti::search("Joko")
            .get_details()
            .filter_by(|d| d.jenjang.starts_with('S'));

        let first = builder.run(&source).await;
        let second = builder.clone().run(&source).await;

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl PipelineObserver for RecordingObserver {
        fn search_completed(&self, query: &str, found: usize) {
            self.push(format!("search {query} {found}"));
        }

        fn summaries_filtered(&self, query: &str, kept: usize) {
            self.push(format!("filtered {query} {kept}"));
        }

        fn detail_missing(&self, _query: &str, summary: &SearchSummary, _reason: &FetchFailure) {
            self.push(format!("missing {}", summary.id));
        }

        fn detail_matched(&self, record: &FilteredRecord) {
            self.push(format!("matched {}", record.detail_result.id));
        }

        fn query_finished(&self, query: &str, matches: usize) {
            self.push(format!("done {query} {matches}"));
        }
    }

    #[tokio::test]
    async fn observer_sees_each_checkpoint() {
        let source = StubSource::new()
            .with_search("Joko", vec![summary("s1", "Joko"), summary("s2", "Joko Dua")])
            .with_detail(detail("s1", "Joko", Gender::Male, "S1"));
        let observer = RecordingObserver::default();

        Pddikti::search("Joko")
            .get_details()
            .run_with(&source, &observer)
            .await;

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "search Joko 2",
                "filtered Joko 2",
                "matched s1",
                "missing s2",
                "done Joko 1",
            ]
        );
    }
}
