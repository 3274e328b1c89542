//! Testing infrastructure for specsync.
//!
//! Test doubles for the tracker seams and temporary project fixtures, so
//! the client and the reconciler can be exercised without a network or
//! real time.
//!
//! # Example
//!
//! ```rust,ignore
//! use specsync::testing::{MockClock, MockIssueTracker};
//! use specsync::tracker::{TrackerClient, TrackerConfig};
//!
//! let tracker = MockIssueTracker::new("owner/repo");
//! let config = TrackerConfig::new("owner/repo").with_token("t");
//! let client = TrackerClient::with_transport(&config, tracker.clone(), MockClock::new())?;
//! ```

#[cfg(test)]
pub mod fixtures;
pub mod mocks;

#[cfg(test)]
pub use fixtures::*;
pub use mocks::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{ApiRequest, Clock, HttpMethod, IssueState, Transport};
    use std::time::Duration;

    // =========================================================================
    // Mock Transport Tests
    // =========================================================================

    #[tokio::test]
    async fn test_mock_transport_plays_script_in_order() {
        let transport = MockTransport::new()
            .with_response(crate::tracker::ApiResponse::new(500, ""))
            .with_response(crate::tracker::ApiResponse::new(200, "ok"));

        let first = transport.send(&ApiRequest::get("/a")).await.unwrap();
        let second = transport.send(&ApiRequest::get("/b")).await.unwrap();
        assert_eq!(first.status, 500);
        assert_eq!(second.body, "ok");
        assert!(transport.send(&ApiRequest::get("/c")).await.is_err());
        assert_eq!(transport.invocation_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_transport_counts_probes_separately() {
        let transport = MockTransport::new();
        let probe = transport.send(&ApiRequest::get("/rate_limit")).await.unwrap();
        assert!(probe.is_success());
        assert_eq!(transport.probe_count(), 1);
        assert_eq!(transport.invocation_count(), 0);
        assert_eq!(transport.total_calls(), 1);
    }

    // =========================================================================
    // Mock Issue Tracker Tests
    // =========================================================================

    #[tokio::test]
    async fn test_mock_tracker_label_lookup_newest_first() {
        let tracker = MockIssueTracker::new("o/r");
        tracker.seed_issue("old", &["task:a/1"], IssueState::Closed);
        let newest = tracker.seed_issue("new", &["task:a/1"], IssueState::Open);
        tracker.seed_issue("other", &["task:a/2"], IssueState::Open);

        let request = ApiRequest::get("/repos/o/r/issues")
            .with_query("labels", "task:a/1")
            .with_query("per_page", "1");
        let response = tracker.send(&request).await.unwrap();
        let issues: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(issues.as_array().unwrap().len(), 1);
        assert_eq!(issues[0]["number"], newest);
    }

    #[tokio::test]
    async fn test_mock_tracker_injected_failures_run_out() {
        let tracker = MockIssueTracker::new("o/r");
        tracker.fail_next(HttpMethod::Post, "/issues", 503, 1);
        let create = ApiRequest::post("/repos/o/r/issues", serde_json::json!({"title": "t"}));

        assert_eq!(tracker.send(&create).await.unwrap().status, 503);
        assert_eq!(tracker.send(&create).await.unwrap().status, 201);
        assert_eq!(tracker.issues().len(), 1);
        assert_eq!(tracker.mutation_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_tracker_rejects_long_labels() {
        let tracker = MockIssueTracker::new("o/r");
        let create = ApiRequest::post(
            "/repos/o/r/issues",
            serde_json::json!({"title": "t", "labels": ["x".repeat(51)]}),
        );
        assert_eq!(tracker.send(&create).await.unwrap().status, 422);
        assert!(tracker.issues().is_empty());
    }

    #[tokio::test]
    async fn test_mock_tracker_unknown_issue_is_404() {
        let tracker = MockIssueTracker::new("o/r");
        let patch = ApiRequest::patch("/repos/o/r/issues/77", serde_json::json!({"state": "closed"}));
        assert_eq!(tracker.send(&patch).await.unwrap().status, 404);
    }

    // =========================================================================
    // Mock Clock Tests
    // =========================================================================

    #[tokio::test]
    async fn test_mock_clock_advances_on_sleep() {
        let clock = MockClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_secs(5)).await;
        clock.sleep(Duration::from_secs(2)).await;
        assert_eq!(clock.now() - start, chrono::Duration::seconds(7));
        assert_eq!(clock.total_slept(), Duration::from_secs(7));
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn test_fixture_layout() {
        let project = TestProject::new().with_spec("core", "- [ ] 1 Build");
        assert!(project.specs_dir().join("core/tasks.md").exists());
        project.remove_spec("core");
        assert!(!project.specs_dir().join("core").exists());
    }
}
