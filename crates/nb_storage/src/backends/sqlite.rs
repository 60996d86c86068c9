use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use nb_core::{
    Article, ArticleCache, ArticleFilter, BatchSummary, CacheStats, DuplicateCheck, Error,
    Identity, MatchKind, Result, SaveOutcome, SourceFetchState,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow, SqliteSynchronous,
};
use sqlx::pool::PoolConnection;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_DB_PATH: &str = "articles.db";

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        summary TEXT NOT NULL,
        content TEXT,
        url TEXT NOT NULL UNIQUE,
        source_name TEXT NOT NULL,
        source_url TEXT NOT NULL,
        author TEXT NOT NULL,
        published_at TEXT NOT NULL,
        fetched_at TEXT NOT NULL,
        image_url TEXT,
        category TEXT NOT NULL,
        bias_score REAL,
        credibility_score REAL,
        social_engagement INTEGER NOT NULL DEFAULT 0,
        sentiment_score REAL,
        upstream TEXT NOT NULL,
        ai_analysis TEXT,
        title_hash TEXT NOT NULL,
        content_hash TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_title_hash ON articles (title_hash)",
    "CREATE INDEX IF NOT EXISTS idx_articles_content_hash ON articles (content_hash)",
    "CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles (published_at)",
    r#"
    CREATE TABLE IF NOT EXISTS source_fetch_state (
        source_tag TEXT PRIMARY KEY,
        last_fetched_at TEXT NOT NULL,
        max_age_secs INTEGER NOT NULL
    )
    "#,
];

fn db_err(context: &str) -> impl Fn(sqlx::Error) -> Error + '_ {
    move |e| Error::Database(format!("{context}: {e}"))
}

/// Timestamps are stored as fixed-width UTC RFC 3339 so text order is time order.
fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("Failed to parse date '{value}': {e}")))
}

/// Embedded relational cache backed by a single sqlite file.
pub struct SqliteCache {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteCache {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {i}: {e}")))?;
        }
        info!(path = %db_path.display(), "sqlite cache ready");

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Writes `articles` inside one `BEGIN IMMEDIATE` transaction. Taking the
    /// write lock up front keeps a concurrent batch from passing the same
    /// duplicate check before either inserts.
    async fn write_batch(&self, articles: &[Article]) -> Result<BatchSummary> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(db_err("Failed to acquire connection"))?;
        let mut tx = ImmediateTx::begin(conn).await?;
        let conn = tx.conn()?;

        let mut summary = BatchSummary::default();
        for article in articles {
            match insert_unique(conn, article).await {
                Ok(outcome) if outcome.saved => summary.saved_count += 1,
                Ok(_) => summary.duplicate_count += 1,
                Err(e) => {
                    warn!(url = %article.url, error = %e, "failed to store article");
                    summary.error_count += 1;
                }
            }
        }

        tx.commit().await?;
        Ok(summary)
    }
}

/// A `BEGIN IMMEDIATE` transaction on a pooled connection.
///
/// Dropped without [`ImmediateTx::commit`] (an error or a cancelled future),
/// the connection is detached from the pool and closed, which makes sqlite
/// roll the transaction back instead of handing an open one to the next caller.
struct ImmediateTx {
    conn: Option<PoolConnection<Sqlite>>,
}

impl ImmediateTx {
    async fn begin(mut conn: PoolConnection<Sqlite>) -> Result<Self> {
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(db_err("Failed to begin batch"))?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| Error::Database("transaction already finished".to_string()))
    }

    async fn commit(mut self) -> Result<()> {
        let conn = self.conn()?;
        if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(Error::Database(format!("Failed to commit batch: {e}")));
        }
        // back to the pool with no transaction open
        self.conn.take();
        Ok(())
    }
}

impl Drop for ImmediateTx {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("batch transaction abandoned, closing its connection");
            drop(conn.detach());
        }
    }
}

/// Escapes `LIKE` wildcards so a keyword matches literally, as it does in memory.
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

async fn find_duplicate(conn: &mut SqliteConnection, identity: &Identity) -> Result<DuplicateCheck> {
    let by_url: Option<String> = sqlx::query_scalar("SELECT id FROM articles WHERE url = ? LIMIT 1")
        .bind(&identity.url)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("Failed to check url"))?;
    if let Some(id) = by_url {
        return Ok(DuplicateCheck::matched(MatchKind::Url, id));
    }

    let by_title: Option<String> =
        sqlx::query_scalar("SELECT id FROM articles WHERE title_hash = ? LIMIT 1")
            .bind(&identity.title_hash)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err("Failed to check title hash"))?;
    if let Some(id) = by_title {
        return Ok(DuplicateCheck::matched(MatchKind::Title, id));
    }

    if let Some(hash) = &identity.content_hash {
        let by_content: Option<String> =
            sqlx::query_scalar("SELECT id FROM articles WHERE content_hash = ? LIMIT 1")
                .bind(hash)
                .fetch_optional(&mut *conn)
                .await
                .map_err(db_err("Failed to check content hash"))?;
        if let Some(id) = by_content {
            return Ok(DuplicateCheck::matched(MatchKind::Content, id));
        }
    }

    Ok(DuplicateCheck::unique())
}

async fn insert_unique(conn: &mut SqliteConnection, article: &Article) -> Result<SaveOutcome> {
    let identity = article.identity();
    if let Some(kind) = find_duplicate(conn, &identity).await?.matched_by {
        debug!(url = %article.url, matched_by = %kind, "duplicate article rejected");
        return Ok(SaveOutcome::rejected(kind));
    }

    let ai_analysis = article
        .ai_analysis
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO articles
        (id, title, summary, content, url, source_name, source_url, author, published_at,
         fetched_at, image_url, category, bias_score, credibility_score, social_engagement,
         sentiment_score, upstream, ai_analysis, title_hash, content_hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&article.id)
    .bind(&article.title)
    .bind(&article.summary)
    .bind(article.content.as_deref())
    .bind(&article.url)
    .bind(&article.source_name)
    .bind(&article.source_url)
    .bind(&article.author)
    .bind(ts(article.published_at))
    .bind(ts(article.fetched_at))
    .bind(article.image_url.as_deref())
    .bind(&article.category)
    .bind(article.bias_score)
    .bind(article.credibility_score)
    .bind(article.social_engagement as i64)
    .bind(article.sentiment_score)
    .bind(&article.upstream)
    .bind(ai_analysis)
    .bind(&identity.title_hash)
    .bind(identity.content_hash.as_deref())
    .execute(&mut *conn)
    .await
    .map_err(db_err("Failed to store article"))?;

    // a uniqueness conflict that slipped past the lookup still reads as a URL duplicate
    if result.rows_affected() == 0 {
        return Ok(SaveOutcome::rejected(MatchKind::Url));
    }
    Ok(SaveOutcome::saved())
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let get_err = db_err("Failed to decode article row");
    let ai_analysis: Option<String> = row.try_get("ai_analysis").map_err(&get_err)?;
    let engagement: i64 = row.try_get("social_engagement").map_err(&get_err)?;

    Ok(Article {
        id: row.try_get("id").map_err(&get_err)?,
        title: row.try_get("title").map_err(&get_err)?,
        summary: row.try_get("summary").map_err(&get_err)?,
        content: row.try_get("content").map_err(&get_err)?,
        url: row.try_get("url").map_err(&get_err)?,
        source_name: row.try_get("source_name").map_err(&get_err)?,
        source_url: row.try_get("source_url").map_err(&get_err)?,
        author: row.try_get("author").map_err(&get_err)?,
        published_at: parse_ts(&row.try_get::<String, _>("published_at").map_err(&get_err)?)?,
        fetched_at: parse_ts(&row.try_get::<String, _>("fetched_at").map_err(&get_err)?)?,
        image_url: row.try_get("image_url").map_err(&get_err)?,
        category: row.try_get("category").map_err(&get_err)?,
        bias_score: row.try_get("bias_score").map_err(&get_err)?,
        credibility_score: row.try_get("credibility_score").map_err(&get_err)?,
        social_engagement: engagement.max(0) as u64,
        sentiment_score: row.try_get("sentiment_score").map_err(&get_err)?,
        upstream: row.try_get("upstream").map_err(&get_err)?,
        ai_analysis: ai_analysis
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?,
    })
}

fn row_to_state(row: &SqliteRow) -> Result<SourceFetchState> {
    let get_err = db_err("Failed to decode fetch state row");
    Ok(SourceFetchState {
        source_tag: row.try_get("source_tag").map_err(&get_err)?,
        last_fetched_at: parse_ts(&row.try_get::<String, _>("last_fetched_at").map_err(&get_err)?)?,
        max_age_secs: row.try_get("max_age_secs").map_err(&get_err)?,
    })
}

#[async_trait]
impl ArticleCache for SqliteCache {
    async fn check_duplicate(&self, article: &Article) -> Result<DuplicateCheck> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_err("Failed to acquire connection"))?;
        find_duplicate(&mut conn, &article.identity()).await
    }

    async fn save(&self, article: &Article) -> Result<SaveOutcome> {
        let summary = self.write_batch(std::slice::from_ref(article)).await?;
        if summary.saved_count == 1 {
            return Ok(SaveOutcome::saved());
        }
        if summary.error_count > 0 {
            return Err(Error::Storage(format!("Failed to store article {}", article.url)));
        }
        let check = self.check_duplicate(article).await?;
        Ok(SaveOutcome::rejected(check.matched_by.unwrap_or(MatchKind::Url)))
    }

    async fn save_batch(&self, articles: &[Article]) -> Result<BatchSummary> {
        self.write_batch(articles).await
    }

    async fn query(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM articles WHERE 1 = 1");
        if let Some(keyword) = &filter.keyword {
            let pattern = like_pattern(keyword);
            qb.push(" AND (title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR summary LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR IFNULL(content, '') LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(category) = &filter.category {
            qb.push(" AND LOWER(category) = LOWER(").push_bind(category.clone()).push(")");
        }
        if let Some(source_name) = &filter.source_name {
            qb.push(" AND source_name = ").push_bind(source_name.clone());
        }
        if let Some(upstream) = &filter.upstream {
            qb.push(" AND upstream = ").push_bind(upstream.clone());
        }
        if let Some(from) = filter.from {
            qb.push(" AND published_at >= ").push_bind(ts(from));
        }
        if let Some(to) = filter.to {
            qb.push(" AND published_at <= ").push_bind(ts(to));
        }
        qb.push(" ORDER BY published_at DESC, id ASC");
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        qb.push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(filter.offset as i64);

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to query articles"))?;
        rows.iter().map(row_to_article).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to load article"))?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn source_state(&self, source_tag: &str) -> Result<Option<SourceFetchState>> {
        let row = sqlx::query("SELECT * FROM source_fetch_state WHERE source_tag = ?")
            .bind(source_tag)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to load fetch state"))?;
        row.as_ref().map(row_to_state).transpose()
    }

    async fn record_fetch(&self, state: SourceFetchState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO source_fetch_state (source_tag, last_fetched_at, max_age_secs)
            VALUES (?, ?, ?)
            ON CONFLICT(source_tag) DO UPDATE SET
                last_fetched_at = excluded.last_fetched_at,
                max_age_secs = excluded.max_age_secs
            "#,
        )
        .bind(&state.source_tag)
        .bind(ts(state.last_fetched_at))
        .bind(state.max_age_secs)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to record fetch"))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err("Failed to begin clear"))?;
        sqlx::query("DELETE FROM articles")
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to clear articles"))?;
        sqlx::query("DELETE FROM source_fetch_state")
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to clear fetch state"))?;
        tx.commit().await.map_err(db_err("Failed to commit clear"))?;
        Ok(())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM articles WHERE published_at < ?")
            .bind(ts(cutoff))
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to prune articles"))?;
        Ok(result.rows_affected() as usize)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count articles"))?;
        let rows = sqlx::query("SELECT * FROM source_fetch_state ORDER BY source_tag")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list fetch state"))?;
        Ok(CacheStats {
            article_count: count as usize,
            sources: rows.iter().map(row_to_state).collect::<Result<Vec<_>>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn article(id: &str, title: &str, url: &str, hours_ago: i64) -> Article {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Article {
            id: id.into(),
            title: title.into(),
            summary: format!("{title} summary"),
            content: Some(format!("{title} body")),
            url: url.into(),
            source_name: "Reuters".into(),
            source_url: "https://reuters.com".into(),
            author: "Unknown".into(),
            published_at: base - Duration::hours(hours_ago),
            fetched_at: base,
            image_url: None,
            category: "politics".into(),
            bias_score: None,
            credibility_score: Some(0.9),
            social_engagement: 12,
            sentiment_score: None,
            upstream: "newsapi".into(),
            ai_analysis: Some(serde_json::json!({"claims": []})),
        }
    }

    #[tokio::test]
    async fn test_sqlite_round_trip_and_dedup() {
        let temp_dir = tempdir().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("test.db")).await.unwrap();

        let stored = article("a", "Budget passes", "https://reuters.com/a", 2);
        assert!(cache.save(&stored).await.unwrap().saved);
        assert_eq!(cache.get("a").await.unwrap(), Some(stored.clone()));

        let mut same_url = article("b", "Other", "https://reuters.com/a", 1);
        same_url.content = Some("unrelated".into());
        assert_eq!(cache.save(&same_url).await.unwrap().reason, Some(MatchKind::Url));

        let summary = cache
            .save_batch(&[
                article("c", "Storm hits coast", "https://apnews.com/c", 1),
                article("d", "STORM hits coast.", "https://apnews.com/d", 1),
            ])
            .await
            .unwrap();
        assert_eq!(summary.saved_count, 1);
        assert_eq!(summary.duplicate_count, 1);

        let ids: Vec<String> = cache
            .query(&ArticleFilter::new())
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_sqlite_fetch_state_and_prune() {
        let temp_dir = tempdir().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("state.db")).await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert!(cache.is_stale("guardian", Duration::hours(2), now).await.unwrap());
        cache
            .record_fetch(SourceFetchState {
                source_tag: "guardian".into(),
                last_fetched_at: now - Duration::minutes(10),
                max_age_secs: 7200,
            })
            .await
            .unwrap();
        assert!(!cache.is_stale("guardian", Duration::hours(2), now).await.unwrap());

        cache.save(&article("old", "Old", "https://x.com/old", 72)).await.unwrap();
        cache.save(&article("new", "New", "https://x.com/new", 1)).await.unwrap();
        assert_eq!(cache.prune_older_than(now - Duration::hours(24)).await.unwrap(), 1);

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.article_count, 1);
        assert_eq!(stats.sources.len(), 1);

        cache.clear().await.unwrap();
        assert_eq!(cache.stats().await.unwrap().article_count, 0);
        assert!(cache.source_state("guardian").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn abandoned_batch_does_not_hold_the_write_lock() {
        let temp_dir = tempdir().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("test.db")).await.unwrap();

        let conn = cache.pool.acquire().await.unwrap();
        let tx = ImmediateTx::begin(conn).await.unwrap();
        drop(tx);

        let summary = cache
            .save_batch(&[article("a", "Budget passes", "https://reuters.com/a", 2)])
            .await
            .unwrap();
        assert_eq!(summary.saved_count, 1);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("budget"), "%budget%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
