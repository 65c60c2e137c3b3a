//! End-to-end scrape of a two-page thread served by wiremock.
//!
//! The second page repeats the first, which is how the forum signals that the
//! thread has no more pages.

use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use forum_prices::config::AppConfig;
use forum_prices::inference::location::GeoIndex;
use forum_prices::inference::{PostProcessor, ReferenceTables};
use forum_prices::loader::load_geo_index;
use forum_prices::pipeline::Pipeline;
use forum_prices::scraper::http_client::HttpClient;
use forum_prices::scraper::rate_limit::RateLimiter;
use forum_prices::scraper::{ForumScraper, ScraperOptions};

fn thread_page_html() -> String {
    r#"
<!DOCTYPE html>
<html>
<body>
    <div class="post-content"><div class="post_inner">
        MAKE: Yamaha<br>
        MODEL: P155B<br>
        CONDITION: New<br>
        PRICE PAID: $1,100<br>
        USER LOCATION: Chicago, IL
    </div></div>
    <div class="post-content"><div class="post_inner">
        MAKE: Kawai<br>
        MODEL: ES110<br>
        CONDITION: Used, like new<br>
        PRICE PAID: $550<br>
        VENDOR LOCATION: n/a
    </div></div>
    <div class="post-content"><div class="post_inner">
        Quote: Originally Posted by someone MAKE MODEL PRICE PAID
    </div></div>
</body>
</html>
    "#
    .to_string()
}

async fn mock_thread() -> MockServer {
    let server = MockServer::start().await;
    for page in ["/thread", "/thread/2.html"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(ResponseTemplate::new(200).set_body_string(thread_page_html()))
            .mount(&server)
            .await;
    }
    server
}

fn test_config(server: &MockServer, out: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.forum.base_url = format!("{}/thread", server.uri());
    config.scraper.request_delay_ms = 0;
    config.scraper.jitter_ms = 0;
    config.output.path = out.path().join("prices.csv");
    config
}

fn geo(config: &AppConfig) -> GeoIndex {
    load_geo_index(&config.geo).expect("bundled geo tables load")
}

#[tokio::test]
async fn test_identical_second_page_ends_the_walk() {
    let server = mock_thread().await;
    let out = TempDir::new().unwrap();
    let config = test_config(&server, &out);

    let client = HttpClient::new(&config.scraper).unwrap();
    let mut scraper = ForumScraper::new(
        client,
        ScraperOptions::from(&config.forum),
        RateLimiter::none(),
    )
    .unwrap();

    let posts = scraper.get_all_posts().await;
    assert!(!scraper.has_next_post());
    assert_eq!(scraper.pages_loaded(), 1);

    let nums: Vec<u32> = posts.iter().map(|p| p.post_num).collect();
    assert_eq!(nums, vec![1, 2]);
    assert!(posts.iter().all(|p| p.page_num == 1));
    assert_eq!(posts[0].make, "Yamaha");
    assert_eq!(posts[0].model, "P155B");
    assert_eq!(posts[1].price_paid, "$550");

    let tables = ReferenceTables::new(geo(&config)).unwrap();
    let mut processor = PostProcessor::new(&tables, posts);
    processor.infer_all();
    let inferred = processor.into_posts();

    assert_eq!(inferred[0].inferred.color.as_deref(), Some("BLACK"));
    assert_eq!(inferred[0].inferred.model.as_deref(), Some("P155"));
    assert_eq!(
        inferred[0]
            .inferred
            .purchase_country
            .as_ref()
            .map(|c| c.country_code.as_str()),
        Some("US")
    );
    assert_eq!(inferred[1].inferred.condition.as_deref(), Some("USED-LIKE NEW"));
    assert!(inferred[1].inferred.purchase_country.is_none());
}

#[tokio::test]
async fn test_pipeline_writes_price_sheet() {
    let server = mock_thread().await;
    let out = TempDir::new().unwrap();
    let config = test_config(&server, &out);

    let stats = Pipeline::new(config).run().await.unwrap();
    assert_eq!(stats.pages_visited, 1);
    assert_eq!(stats.posts_scraped, 2);
    assert_eq!(stats.rows_written, 2);

    let mut reader = csv::Reader::from_path(out.path().join("prices.csv")).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "PAGE");
    assert_eq!(&headers[14], "INFERRED_PURCHASE_COUNTRY");

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][1], "Yamaha");
    assert_eq!(&rows[0][4], "$1,100");
    assert_eq!(&rows[0][12], "BLACK");
    assert_eq!(&rows[0][14], "UNITED STATES");
    assert_eq!(&rows[1][7], "n/a");
    assert_eq!(&rows[1][14], "UNKNOWN");
}

#[tokio::test]
async fn test_http_error_keeps_earlier_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/thread"))
        .respond_with(ResponseTemplate::new(200).set_body_string(thread_page_html()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/thread/2.html"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let config = test_config(&server, &out);
    let stats = Pipeline::new(config).run().await.unwrap();

    assert_eq!(stats.posts_scraped, 2);
    assert_eq!(stats.rows_written, 2);
}
