use nb_core::{Error, FetchParams, SourceAdapter};
use nb_sources::{GuardianAdapter, NewsApiAdapter, RssAdapter, RssFeed};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Outlet A</title>
    <link>https://outlet-a.example</link>
    <description>Local news</description>
    <item>
      <title>City Council Approves Budget</title>
      <link>https://outlet-a.example/budget</link>
      <description>&lt;p&gt;The council voted 7-2.&lt;/p&gt;</description>
      <pubDate>Wed, 01 May 2024 10:00:00 +0000</pubDate>
      <category>Politics</category>
    </item>
    <item>
      <title>Weekend weather outlook</title>
      <link>https://outlet-a.example/weather</link>
      <pubDate>Wed, 01 May 2024 09:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

#[tokio::test]
async fn newsapi_maps_headlines_and_drops_removed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/top-headlines"))
        .and(header("X-Api-Key", "secret"))
        .and(query_param("country", "us"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {
                    "source": {"id": null, "name": "Reuters"},
                    "author": "Jane Roe",
                    "title": "City Council Approves Budget",
                    "description": "The council voted 7-2.",
                    "url": "https://reuters.example/budget",
                    "urlToImage": null,
                    "publishedAt": "2024-05-01T10:00:00Z",
                    "content": null
                },
                {
                    "source": {"id": null, "name": "[Removed]"},
                    "title": "[Removed]",
                    "url": "https://removed.com"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = NewsApiAdapter::new(Some("secret".into()))
        .unwrap()
        .with_base_url(server.uri());
    let records = adapter.fetch_articles(&FetchParams::default()).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_name.as_deref(), Some("Reuters"));
    assert_eq!(records[0].published_at.as_deref(), Some("2024-05-01T10:00:00Z"));
}

#[tokio::test]
async fn newsapi_http_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rateLimited"))
        .mount(&server)
        .await;

    let adapter = NewsApiAdapter::new(Some("secret".into()))
        .unwrap()
        .with_base_url(server.uri());
    let err = adapter.fetch_articles(&FetchParams::default()).await.unwrap_err();

    match err {
        Error::Source { source_tag, message } => {
            assert_eq!(source_tag, "newsapi");
            assert!(message.contains("429"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn newsapi_error_status_in_body_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "code": "apiKeyInvalid",
            "message": "Your API key is invalid"
        })))
        .mount(&server)
        .await;

    let adapter = NewsApiAdapter::new(Some("bad".into()))
        .unwrap()
        .with_base_url(server.uri());
    let err = adapter.fetch_articles(&FetchParams::default()).await.unwrap_err();
    assert!(err.to_string().contains("apiKeyInvalid"));
}

#[tokio::test]
async fn guardian_maps_fields_and_section() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("api-key", "g-key"))
        .and(query_param("q", "budget"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "status": "ok",
                "results": [{
                    "webTitle": "City council approves budget plan",
                    "webUrl": "https://www.theguardian.com/politics/budget",
                    "webPublicationDate": "2024-05-01T12:00:00Z",
                    "sectionId": "politics",
                    "fields": {
                        "trailText": "Councillors back spending plan",
                        "byline": "A Reporter"
                    }
                }]
            }
        })))
        .mount(&server)
        .await;

    let adapter = GuardianAdapter::new(Some("g-key".into()))
        .unwrap()
        .with_base_url(server.uri());
    let params = FetchParams {
        keywords: Some("budget".into()),
        ..Default::default()
    };
    let records = adapter.fetch_articles(&params).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_name.as_deref(), Some("The Guardian"));
    assert_eq!(records[0].category.as_deref(), Some("politics"));
    assert_eq!(records[0].author.as_deref(), Some("A Reporter"));
}

#[tokio::test]
async fn rss_reads_items_and_survives_one_broken_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let feeds = vec![
        RssFeed { name: "Outlet A".into(), url: format!("{}/a.xml", server.uri()) },
        RssFeed { name: "Outlet B".into(), url: format!("{}/broken.xml", server.uri()) },
    ];
    let adapter = RssAdapter::new(feeds).unwrap();

    let all = adapter.fetch_articles(&FetchParams::default()).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].source_name.as_deref(), Some("Outlet A"));
    assert_eq!(all[0].category.as_deref(), Some("Politics"));
    assert_eq!(all[0].published_at.as_deref(), Some("Wed, 01 May 2024 10:00:00 +0000"));

    let filtered = adapter
        .fetch_articles(&FetchParams { keywords: Some("budget".into()), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
}

#[tokio::test]
async fn rss_fails_when_every_feed_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not a feed"))
        .mount(&server)
        .await;

    let adapter = RssAdapter::new(vec![RssFeed {
        name: "Outlet A".into(),
        url: format!("{}/a.xml", server.uri()),
    }])
    .unwrap();
    let err = adapter.fetch_articles(&FetchParams::default()).await.unwrap_err();
    assert!(err.to_string().contains("malformed feed"));
}
