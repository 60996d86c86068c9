use chrono::{DateTime, Duration, TimeZone, Utc};
use nb_core::{canonicalize, Article, ArticleCache, ArticleFilter, MatchKind, RawArticle, SourceFetchState};
use nb_storage::{create_cache, StorageKind};
use std::sync::Arc;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn article(id: &str, title: &str, url: &str, content: Option<&str>) -> Article {
    Article {
        id: id.into(),
        title: title.into(),
        summary: format!("summary of {id}"),
        content: content.map(str::to_string),
        url: url.into(),
        source_name: "Outlet A".into(),
        source_url: "https://outlet-a.example".into(),
        author: "Unknown".into(),
        published_at: base(),
        fetched_at: base(),
        image_url: None,
        category: "politics".into(),
        bias_score: None,
        credibility_score: None,
        social_engagement: 0,
        sentiment_score: None,
        upstream: "rss".into(),
        ai_analysis: None,
    }
}

async fn exercise(cache: Arc<dyn ArticleCache>) {
    let first = article("1", "City Council Approves Budget", "https://a.example/1", Some("The vote was 7-2."));
    assert!(cache.save(&first).await.unwrap().saved);

    let retitled = article("2", "city council   approves budget!", "https://a.example/2", None);
    let outcome = cache.save(&retitled).await.unwrap();
    assert!(!outcome.saved);
    assert_eq!(outcome.reason, Some(MatchKind::Title));

    let same_body = article("3", "Budget vote recap", "https://a.example/3", Some("THE VOTE WAS 7-2"));
    let check = cache.check_duplicate(&same_body).await.unwrap();
    assert!(check.is_duplicate);
    assert_eq!(check.matched_by, Some(MatchKind::Content));
    assert_eq!(check.existing_id.as_deref(), Some("1"));

    let again = cache.save(&first).await.unwrap();
    assert_eq!(again.reason, Some(MatchKind::Url));
    assert_eq!(cache.stats().await.unwrap().article_count, 1);

    let hits = cache
        .search_articles("BUDGET", &ArticleFilter::new().category("Politics"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(cache.get_articles_by_source("Outlet A", 10).await.unwrap().len(), 1);
    assert!(cache.get_articles_by_category("sports", 10).await.unwrap().is_empty());

    let title_only = canonicalize(
        RawArticle {
            title: Some("Storm".into()),
            url: Some("https://a.example/storm".into()),
            ..Default::default()
        },
        "rss",
        base(),
    )
    .unwrap();
    assert!(cache.save(&title_only).await.unwrap().saved);
    let summarized = canonicalize(
        RawArticle {
            title: Some("Coast braces".into()),
            url: Some("https://a.example/coast".into()),
            description: Some("Storm".into()),
            ..Default::default()
        },
        "rss",
        base(),
    )
    .unwrap();
    assert!(cache.save(&summarized).await.unwrap().saved);

    let wildcard = cache
        .search_articles("summary_of", &ArticleFilter::new())
        .await
        .unwrap();
    assert!(wildcard.is_empty());
    assert_eq!(cache.search_articles("%", &ArticleFilter::new()).await.unwrap().len(), 0);

    let now = base();
    cache
        .record_fetch(SourceFetchState {
            source_tag: "newsapi".into(),
            last_fetched_at: now - Duration::minutes(10),
            max_age_secs: 1800,
        })
        .await
        .unwrap();
    assert!(!cache.is_stale("newsapi", Duration::minutes(30), now).await.unwrap());
    assert!(cache
        .is_stale("newsapi", Duration::minutes(30), now + Duration::minutes(21))
        .await
        .unwrap());
    assert!(cache.is_stale("guardian", Duration::minutes(30), now).await.unwrap());
}

async fn concurrent_batches(cache: Arc<dyn ArticleCache>) {
    let batch: Vec<Article> = (0..20)
        .map(|i| {
            article(
                &format!("c{i}"),
                &format!("Story number {i}"),
                &format!("https://b.example/{i}"),
                None,
            )
        })
        .collect();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            let batch = batch.clone();
            tokio::spawn(async move { cache.save_batch(&batch).await.unwrap() })
        })
        .collect();

    let mut saved = 0;
    let mut duplicates = 0;
    for task in tasks {
        let summary = task.await.unwrap();
        saved += summary.saved_count;
        duplicates += summary.duplicate_count;
    }
    assert_eq!(saved, 20);
    assert_eq!(duplicates, 60);
    assert_eq!(cache.stats().await.unwrap().article_count, 20);
}

#[tokio::test]
async fn memory_cache_contract() {
    exercise(create_cache(StorageKind::Memory, None).await.unwrap()).await;
}

#[tokio::test]
async fn memory_cache_concurrent_batches() {
    concurrent_batches(create_cache(StorageKind::Memory, None).await.unwrap()).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_cache_contract() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("articles.db");
    exercise(create_cache(StorageKind::Sqlite, Some(&path)).await.unwrap()).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_cache_concurrent_batches() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("articles.db");
    concurrent_batches(create_cache(StorageKind::Sqlite, Some(&path)).await.unwrap()).await;
}

#[cfg(not(feature = "sqlite"))]
#[tokio::test]
async fn sqlite_requires_the_feature() {
    assert!(create_cache(StorageKind::Sqlite, None).await.is_err());
}
