//! Integration tests for the pagination driver
//!
//! These tests use wiremock to serve robots.txt and listing pages and run the
//! full crawl cycle end-to-end. Pauses are recorded instead of slept.

use admit_harvest::config::{
    Config, CrawlerConfig, OutputConfig, RawFormat, SiteConfig, UserAgentConfig,
};
use admit_harvest::crawler::{
    build_http_client, PaginationDriver, RecordingSleeper, RetryPolicy, RetryingFetcher,
    ThrottledTransport,
};
use admit_harvest::normalize::normalize_file;
use admit_harvest::robots::PolicyGate;
use admit_harvest::state::{CrawlPhase, CrawlReport, CrawlStatus, StopReason};
use admit_harvest::storage::load_raw;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, raw_path: &Path, target: usize) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            listing_path: "/survey".to_string(),
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        crawler: CrawlerConfig {
            target_records: target,
            ..CrawlerConfig::default()
        },
        output: OutputConfig {
            raw_path: raw_path.display().to_string(),
            typed_path: raw_path.with_extension("typed.json").display().to_string(),
            raw_format: RawFormat::Json,
        },
    }
}

async fn run_crawl(config: Config, sleeper: RecordingSleeper, fresh: bool) -> CrawlReport {
    let client = build_http_client(&config.user_agent, Duration::from_secs(5))
        .expect("Failed to build client");
    let transport =
        ThrottledTransport::with_sleeper(client, config.crawler.delay_range(), sleeper.clone());
    let fetcher = RetryingFetcher::new(
        transport,
        sleeper,
        RetryPolicy::from_config(&config.crawler),
    );
    let gate = PolicyGate::new(config.site.robots_url());

    let mut driver = PaginationDriver::new(config, fetcher, gate).fresh(fresh);
    driver.run().await.expect("Crawl failed")
}

fn letter(n: usize) -> char {
    char::from(b'A' + (n % 26) as u8)
}

/// A listing page with `rows` distinct table rows
fn listing_page(page: u32, rows: usize) -> String {
    let body: String = (0..rows)
        .map(|i| {
            format!(
                "<tr><td>University {} {}</td><td>Computer Science, PhD</td>\
                 <td>Accepted on 1 Mar 2025</td><td>GPA 3.{i}0 GRE 160V 165Q</td></tr>",
                letter(page as usize),
                letter(i)
            )
        })
        .collect();
    format!(
        "<html><body><table class=\"results\">\
         <thead><tr><th>School</th><th>Program</th><th>Decision</th><th>Stats</th></tr></thead>\
         <tbody>{body}</tbody></table></body></html>"
    )
}

const EMPTY_PAGE: &str = "<html><body><p>No more results.</p></body></html>";

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page: u32, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/survey"))
        .and(query_param("page", page.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_policy_denial_aborts_without_output() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");

    mount_robots(&server, "User-agent: *\nDisallow: /survey\n").await;
    Mock::given(method("GET"))
        .and(path("/survey"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(1, 10)))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &raw_path, 25);
    let report = run_crawl(config, RecordingSleeper::new(), false).await;

    assert!(matches!(report.status, CrawlStatus::Aborted(_)));
    assert_eq!(report.progress.phase, CrawlPhase::Aborted);
    assert_eq!(report.pages_fetched, 0);
    assert!(!raw_path.exists(), "no output file may be created");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/robots.txt");
}

#[tokio::test]
async fn test_policy_denial_leaves_existing_output_untouched() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");
    std::fs::write(&raw_path, "[]\n").unwrap();

    mount_robots(&server, "User-agent: TestBot\nDisallow: /\n").await;

    let config = create_test_config(&server.uri(), &raw_path, 25);
    let report = run_crawl(config, RecordingSleeper::new(), true).await;

    assert!(report.status.is_aborted());
    assert_eq!(std::fs::read_to_string(&raw_path).unwrap(), "[]\n");
}

#[tokio::test]
async fn test_target_reached_mid_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");

    mount_robots(&server, "User-agent: *\nAllow: /\n").await;
    for page in 1..=3 {
        mount_page(
            &server,
            page,
            ResponseTemplate::new(200).set_body_string(listing_page(page, 10)),
        )
        .await;
    }
    mount_page(
        &server,
        4,
        ResponseTemplate::new(200).set_body_string(listing_page(4, 10)),
    )
    .await;

    let config = create_test_config(&server.uri(), &raw_path, 25);
    let report = run_crawl(config, RecordingSleeper::new(), false).await;

    assert_eq!(report.status, CrawlStatus::TargetReached);
    assert_eq!(report.progress.collected, 25);
    assert_eq!(report.records_added, 25);
    assert_eq!(report.pages_fetched, 3);

    let postings = load_raw(&raw_path).unwrap();
    assert_eq!(postings.len(), 25);
    assert_eq!(postings.iter().filter(|p| p.page == 3).count(), 5);

    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| r.url.query() != Some("page=4")));
}

#[tokio::test]
async fn test_resume_skips_already_collected_postings() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");

    mount_robots(&server, "User-agent: *\nAllow: /\n").await;
    for page in 1..=3 {
        mount_page(
            &server,
            page,
            ResponseTemplate::new(200).set_body_string(listing_page(page, 10)),
        )
        .await;
    }

    let first = run_crawl(
        create_test_config(&server.uri(), &raw_path, 15),
        RecordingSleeper::new(),
        false,
    )
    .await;
    assert_eq!(first.progress.collected, 15);

    let second = run_crawl(
        create_test_config(&server.uri(), &raw_path, 25),
        RecordingSleeper::new(),
        false,
    )
    .await;
    assert_eq!(second.status, CrawlStatus::TargetReached);
    assert_eq!(second.progress.collected, 25);
    assert_eq!(second.records_added, 10);

    let postings = load_raw(&raw_path).unwrap();
    assert_eq!(postings.len(), 25);
    let mut ids: Vec<_> = postings.iter().map(|p| p.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 25);
}

#[tokio::test]
async fn test_fresh_run_discards_previous_postings() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");

    mount_robots(&server, "User-agent: *\nAllow: /\n").await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_string(listing_page(1, 10)),
    )
    .await;

    run_crawl(
        create_test_config(&server.uri(), &raw_path, 10),
        RecordingSleeper::new(),
        false,
    )
    .await;
    let report = run_crawl(
        create_test_config(&server.uri(), &raw_path, 10),
        RecordingSleeper::new(),
        true,
    )
    .await;

    assert_eq!(report.records_added, 10);
    assert_eq!(load_raw(&raw_path).unwrap().len(), 10);
}

#[tokio::test]
async fn test_missing_page_is_skipped_and_empty_pages_end_the_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");

    mount_robots(&server, "User-agent: *\nAllow: /\n").await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_string(listing_page(1, 10)),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/survey"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        3,
        ResponseTemplate::new(200).set_body_string(listing_page(3, 10)),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/survey"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_PAGE))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &raw_path, 100);
    let report = run_crawl(config, RecordingSleeper::new(), false).await;

    assert_eq!(report.status, CrawlStatus::Partial(StopReason::EndOfResults));
    assert_eq!(report.progress.collected, 20);
    assert_eq!(report.progress.phase, CrawlPhase::Done);

    // Each empty page is fetched twice before it is trusted
    let requests = server.received_requests().await.unwrap();
    let hits = |query: &str| {
        requests
            .iter()
            .filter(|r| r.url.query() == Some(query))
            .count()
    };
    assert_eq!(hits("page=4"), 2);
    assert_eq!(hits("page=5"), 2);
    assert_eq!(hits("page=6"), 0);
}

#[tokio::test]
async fn test_single_empty_page_does_not_end_the_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");

    mount_robots(&server, "User-agent: *\nAllow: /\n").await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_string(EMPTY_PAGE),
    )
    .await;
    mount_page(
        &server,
        2,
        ResponseTemplate::new(200).set_body_string(listing_page(2, 10)),
    )
    .await;

    let config = create_test_config(&server.uri(), &raw_path, 10);
    let report = run_crawl(config, RecordingSleeper::new(), false).await;

    assert_eq!(report.status, CrawlStatus::TargetReached);
    assert_eq!(report.progress.collected, 10);
}

#[tokio::test]
async fn test_consecutive_failures_end_with_partial_result() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");

    mount_robots(&server, "User-agent: *\nAllow: /\n").await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_string(listing_page(1, 10)),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/survey"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let config = create_test_config(&server.uri(), &raw_path, 100);
    let report = run_crawl(config, sleeper.clone(), false).await;

    assert_eq!(
        report.status,
        CrawlStatus::Partial(StopReason::FailureThreshold)
    );
    assert_eq!(report.status.exit_code(), 2);
    assert_eq!(report.progress.collected, 10);
    assert_eq!(report.progress.consecutive_failures, 3);
    assert_eq!(load_raw(&raw_path).unwrap().len(), 10);

    // Pages 2, 3 and 4 each got the first attempt plus five retries
    let requests = server.received_requests().await.unwrap();
    let failed = requests
        .iter()
        .filter(|r| r.url.path() == "/survey" && r.url.query() != Some("page=1"))
        .count();
    assert_eq!(failed, 18);

    let backoff: Vec<_> = sleeper
        .pauses()
        .into_iter()
        .filter(|d| *d == Duration::from_secs(16))
        .collect();
    assert_eq!(backoff.len(), 3);
}

#[tokio::test]
async fn test_crawl_delay_is_honored() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");

    mount_robots(&server, "User-agent: *\nCrawl-delay: 5\nAllow: /\n").await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_string(listing_page(1, 10)),
    )
    .await;

    let sleeper = RecordingSleeper::new();
    let config = create_test_config(&server.uri(), &raw_path, 10);
    run_crawl(config, sleeper.clone(), false).await;

    let pauses = sleeper.pauses();
    // robots.txt is fetched before the delay is known
    assert_eq!(pauses.len(), 2);
    assert!(pauses[0] >= Duration::from_secs(1) && pauses[0] <= Duration::from_secs(3));
    assert_eq!(pauses[1], Duration::from_secs(5));
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_string(listing_page(1, 10)),
    )
    .await;

    let config = create_test_config(&server.uri(), &raw_path, 10);
    let report = run_crawl(config, RecordingSleeper::new(), false).await;

    assert_eq!(report.status, CrawlStatus::TargetReached);
}

#[tokio::test]
async fn test_unreachable_robots_denies_everything() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/survey"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(1, 10)))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &raw_path, 10);
    let report = run_crawl(config, RecordingSleeper::new(), false).await;

    assert!(report.status.is_aborted());
    assert!(!raw_path.exists());
}

#[tokio::test]
async fn test_crawl_then_normalize() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");
    let typed_path = dir.path().join("typed.json");

    mount_robots(&server, "User-agent: *\nAllow: /\n").await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_string(listing_page(1, 10)),
    )
    .await;

    let config = create_test_config(&server.uri(), &raw_path, 10);
    run_crawl(config, RecordingSleeper::new(), false).await;

    let records = normalize_file(&raw_path, &typed_path).unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(records[0].institution.as_deref(), Some("University B A"));
    assert_eq!(records[0].program.as_deref(), Some("Computer Science"));
    assert_eq!(records[3].gpa, Some(3.3));
    assert_eq!(records[3].original("gpa"), Some("3.30"));

    let first = std::fs::read(&typed_path).unwrap();
    normalize_file(&raw_path, &typed_path).unwrap();
    assert_eq!(std::fs::read(&typed_path).unwrap(), first);
}
