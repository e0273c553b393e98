use std::sync::Arc;
use std::time::Duration;

use apify_client::RunStatus;
use serde_json::{json, Value};
use uuid::Uuid;

use leadvault_common::ContactOverrides;
use leadvault_domains::scraping::{
    PollPolicy, ProfileSink, ScrapeError, ScrapeOrchestrator, ScrapeRequest, ScrapeState,
    StoreProfileSink,
};
use leadvault_domains::testing::{
    InMemoryDashboardStore, InMemoryProfileStore, MockScraper, RecordingSink,
};
use leadvault_domains::{ActivityTrigger, Ledger, ProfileService};

const FAST: PollPolicy = PollPolicy {
    interval: Duration::ZERO,
    max_attempts: 60,
};

struct Harness {
    ledger: Ledger,
    profiles: Arc<InMemoryProfileStore>,
}

impl Harness {
    fn new() -> Self {
        let profiles = Arc::new(InMemoryProfileStore::new());
        let dashboards = Arc::new(InMemoryDashboardStore::new());
        Self {
            ledger: Ledger::new(dashboards, profiles.clone()),
            profiles,
        }
    }

    fn store_sink(&self) -> Arc<dyn ProfileSink> {
        let service = ProfileService::new(self.profiles.clone(), self.ledger.clone());
        Arc::new(StoreProfileSink::new(service))
    }

    fn orchestrator(&self, scraper: Arc<MockScraper>, sink: Arc<dyn ProfileSink>) -> ScrapeOrchestrator {
        ScrapeOrchestrator::new(scraper, sink, self.ledger.clone()).with_policy(FAST)
    }
}

fn linkedin(slug: &str) -> String {
    format!("https://www.linkedin.com/in/{slug}")
}

fn request(urls: &[String], user_id: Option<Uuid>) -> ScrapeRequest {
    ScrapeRequest {
        profiles: urls
            .iter()
            .map(|url| ContactOverrides {
                url: url.clone(),
                ..Default::default()
            })
            .collect(),
        user_id,
    }
}

fn scraped(slug: &str, name: &str) -> Value {
    json!({
        "inputUrl": linkedin(slug),
        "fullName": name,
        "title": "Engineer",
        "companyName": "Acme"
    })
}

#[tokio::test]
async fn malformed_urls_are_filtered_before_submission() {
    let harness = Harness::new();
    let slugs = ["a", "b", "c", "d", "e"];
    let items: Vec<Value> = slugs.iter().map(|s| scraped(s, &format!("Person {s}"))).collect();
    let scraper = Arc::new(MockScraper::succeeding(items));
    let sink = Arc::new(RecordingSink::new());
    let orchestrator = harness.orchestrator(scraper.clone(), sink.clone());

    let mut urls: Vec<String> = slugs.iter().map(|s| linkedin(s)).collect();
    urls.push("https://example.com/not-linkedin".to_string());
    urls.push("linkedin.com/company/acme".to_string());

    let summary = orchestrator
        .run(request(&urls, Some(Uuid::new_v4())))
        .await
        .unwrap();

    let submitted = scraper.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].len(), 5);
    assert_eq!(summary.total, 5);
    assert_eq!(summary.successful, 5);
    assert_eq!(sink.persisted().len(), 5);
}

#[tokio::test]
async fn empty_batch_fails_without_outbound_call() {
    let harness = Harness::new();
    let scraper = Arc::new(MockScraper::succeeding(Vec::new()));
    let orchestrator = harness.orchestrator(scraper.clone(), Arc::new(RecordingSink::new()));

    let err = orchestrator
        .run(request(&["https://example.com/x".to_string()], Some(Uuid::new_v4())))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::Validation(_)));
    assert!(scraper.submitted().is_empty());
}

#[tokio::test]
async fn missing_user_fails_without_outbound_call() {
    let harness = Harness::new();
    let scraper = Arc::new(MockScraper::succeeding(Vec::new()));
    let orchestrator = harness.orchestrator(scraper.clone(), Arc::new(RecordingSink::new()));

    let err = orchestrator
        .run(request(&[linkedin("a")], None))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::Validation(_)));
    assert!(scraper.submitted().is_empty());
}

#[tokio::test]
async fn poll_exhaustion_fails_every_item_without_persisting() {
    let harness = Harness::new();
    let scraper = Arc::new(
        MockScraper::succeeding(vec![scraped("a", "Alice")]).with_statuses(vec![RunStatus::Running]),
    );
    let sink = Arc::new(RecordingSink::new());
    let orchestrator = harness.orchestrator(scraper.clone(), sink.clone());

    let urls = vec![linkedin("a"), linkedin("b")];
    let summary = orchestrator
        .run(request(&urls, Some(Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(scraper.poll_count(), 60);
    assert_eq!(scraper.fetch_count(), 0);
    assert_eq!(summary.state, ScrapeState::Failed);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.successful, 0);
    assert!(summary.stage_error.is_some());
    let reasons: Vec<&str> = summary
        .results
        .iter()
        .map(|r| r.error.as_deref().unwrap())
        .collect();
    assert_eq!(reasons[0], reasons[1]);
    assert!(reasons[0].starts_with("Scraping service failed"));
    assert!(sink.persisted().is_empty());
}

#[tokio::test]
async fn no_wait_after_the_last_status_check() {
    let harness = Harness::new();
    let scraper = Arc::new(
        MockScraper::succeeding(Vec::new()).with_statuses(vec![RunStatus::Running]),
    );
    let interval = Duration::from_millis(300);
    let orchestrator = ScrapeOrchestrator::new(
        scraper.clone(),
        Arc::new(RecordingSink::new()),
        harness.ledger.clone(),
    )
    .with_policy(PollPolicy {
        interval,
        max_attempts: 2,
    });

    let started = std::time::Instant::now();
    let summary = orchestrator
        .run(request(&[linkedin("a")], Some(Uuid::new_v4())))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.state, ScrapeState::Failed);
    assert_eq!(scraper.poll_count(), 2);
    // One wait between the two checks, none after the second.
    assert!(elapsed >= interval);
    assert!(elapsed < interval * 2 - Duration::from_millis(50), "{elapsed:?}");
}

#[tokio::test]
async fn failed_run_status_is_batch_fatal() {
    let harness = Harness::new();
    let scraper = Arc::new(
        MockScraper::succeeding(Vec::new())
            .with_statuses(vec![RunStatus::Ready, RunStatus::Running, RunStatus::Failed]),
    );
    let sink = Arc::new(RecordingSink::new());
    let orchestrator = harness.orchestrator(scraper.clone(), sink.clone());

    let summary = orchestrator
        .run(request(&[linkedin("a")], Some(Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(scraper.poll_count(), 3);
    assert_eq!(summary.failed, 1);
    assert!(sink.persisted().is_empty());
}

#[tokio::test]
async fn submit_failure_is_reported_per_item() {
    let harness = Harness::new();
    let scraper = Arc::new(MockScraper::failing_submit("connection refused"));
    let orchestrator = harness.orchestrator(scraper.clone(), Arc::new(RecordingSink::new()));

    let summary = orchestrator
        .run(request(&[linkedin("a")], Some(Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(scraper.poll_count(), 0);
    assert_eq!(
        summary.results[0].error.as_deref(),
        Some("Scraping service failed: connection refused")
    );
}

#[tokio::test]
async fn item_failures_do_not_abort_the_batch() {
    let harness = Harness::new();
    let items = vec![
        scraped("a", "Alice"),
        json!({"inputUrl": linkedin("b"), "firstName": "Bob"}),
        scraped("c", "Carol"),
    ];
    let scraper = Arc::new(MockScraper::succeeding(items));
    let sink = Arc::new(RecordingSink::new());
    sink.reject_name("Carol");
    let orchestrator = harness.orchestrator(scraper, sink.clone());

    let urls = vec![linkedin("a"), linkedin("b"), linkedin("c"), linkedin("d")];
    let summary = orchestrator
        .run(request(&urls, Some(Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(summary.state, ScrapeState::Done);
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 3);
    assert!(summary.results[0].success);
    assert_eq!(summary.results[1].error.as_deref(), Some("Insufficient profile data"));
    assert!(summary.results[2].error.as_deref().unwrap().contains("already exists"));
    assert_eq!(
        summary.results[3].error.as_deref(),
        Some("No data returned for this profile")
    );
    assert_eq!(sink.persisted().len(), 1);
}

#[tokio::test]
async fn overrides_are_merged_but_never_sent_upstream() {
    let harness = Harness::new();
    let scraper = Arc::new(MockScraper::succeeding(vec![scraped("a", "Alice")]));
    let sink = Arc::new(RecordingSink::new());
    let orchestrator = harness.orchestrator(scraper.clone(), sink.clone());
    let user = Uuid::new_v4();

    let request = ScrapeRequest {
        profiles: vec![ContactOverrides {
            url: format!("  {}  ", linkedin("a")),
            phone: Some("+1 555 0100".into()),
            email: Some("alice@example.com".into()),
            extra_links: vec!["https://alice.dev".into()],
        }],
        user_id: Some(user),
    };
    orchestrator.run(request).await.unwrap();

    assert_eq!(scraper.submitted()[0], vec![linkedin("a")]);
    let persisted = sink.persisted();
    let (owner, profile) = &persisted[0];
    assert_eq!(*owner, user);
    assert_eq!(profile.phone.as_deref(), Some("+1 555 0100"));
    assert_eq!(profile.email.as_deref(), Some("alice@example.com"));
    assert_eq!(profile.extra_links, vec!["https://alice.dev"]);
}

#[tokio::test]
async fn successful_imports_are_credited_once() {
    let harness = Harness::new();
    let user = Uuid::new_v4();
    harness
        .ledger
        .fetch_or_create(user, ActivityTrigger::Signup)
        .await
        .unwrap();

    let items = vec![scraped("a", "Alice"), scraped("b", "Bob")];
    let scraper = Arc::new(MockScraper::succeeding(items));
    let orchestrator = harness.orchestrator(scraper, harness.store_sink());

    let summary = orchestrator
        .run(request(&[linkedin("a"), linkedin("b")], Some(user)))
        .await
        .unwrap();

    assert_eq!(summary.successful, 2);
    assert_eq!(summary.reward_points, 20);
    assert!(summary.reward_applied);

    let dashboard = harness.ledger.load(user).await.unwrap();
    assert_eq!(dashboard.available_points, 120);
    assert_eq!(dashboard.my_uploads, 2);
    assert_eq!(
        dashboard.recent_activity.last().map(String::as_str),
        Some("Earned 20 points: Imported 2 LinkedIn profiles")
    );
}

#[tokio::test]
async fn duplicate_profiles_fail_through_the_store_sink() {
    let harness = Harness::new();
    let user = Uuid::new_v4();

    let first = harness.orchestrator(
        Arc::new(MockScraper::succeeding(vec![scraped("a", "Alice")])),
        harness.store_sink(),
    );
    first
        .run(request(&[linkedin("a")], Some(user)))
        .await
        .unwrap();

    let second = harness.orchestrator(
        Arc::new(MockScraper::succeeding(vec![scraped("a", "Alice")])),
        harness.store_sink(),
    );
    let summary = second
        .run(request(&[linkedin("a")], Some(user)))
        .await
        .unwrap();

    assert_eq!(summary.successful, 0);
    assert_eq!(summary.reward_points, 0);
    assert!(!summary.reward_applied);
    assert_eq!(harness.profiles.all().len(), 1);
}

#[tokio::test]
async fn reordered_results_land_on_their_own_inputs() {
    let harness = Harness::new();
    let items = vec![scraped("b", "Bob"), scraped("a", "Alice")];
    let scraper = Arc::new(MockScraper::succeeding(items));
    let sink = Arc::new(RecordingSink::new());
    let orchestrator = harness.orchestrator(scraper, sink);

    let summary = orchestrator
        .run(request(&[linkedin("a"), linkedin("b")], Some(Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(summary.results[0].profile.as_ref().unwrap().name, "Alice");
    assert_eq!(summary.results[1].profile.as_ref().unwrap().name, "Bob");
}

#[tokio::test]
async fn pub_profile_urls_are_imported() {
    let harness = Harness::new();
    let url = "https://www.linkedin.com/pub/jane-doe/1/2/3".to_string();
    let item = json!({
        "inputUrl": url,
        "fullName": "Jane Doe",
        "title": "Engineer",
        "companyName": "Acme"
    });
    let scraper = Arc::new(MockScraper::succeeding(vec![item]));
    let sink = Arc::new(RecordingSink::new());
    let orchestrator = harness.orchestrator(scraper, sink.clone());

    let summary = orchestrator
        .run(request(&[url.clone()], Some(Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(summary.successful, 1, "{:?}", summary.results[0].error);
    assert_eq!(summary.results[0].url, url);
    assert_eq!(sink.persisted().len(), 1);
}
