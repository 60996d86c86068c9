use chrono::{DateTime, NaiveDateTime, Utc};
use scraper::Html;
use tracing::debug;
use url::Url;

use crate::identity::hash_text;
use crate::types::{Article, RawArticle};
use crate::{Error, Result};

const UNKNOWN_AUTHOR: &str = "Unknown";
const DEFAULT_CATEGORY: &str = "general";
const SUMMARY_FALLBACK_CHARS: usize = 280;

/// Maps a raw adapter record onto the canonical [`Article`] shape.
///
/// Pure apart from `now`, which stands in for a missing publish timestamp and
/// becomes the fetch timestamp. The identifier is derived from the title, the
/// URL and the publish timestamp *as delivered*, so canonicalizing the same raw
/// record twice yields the same id even when the timestamp had to be defaulted.
pub fn canonicalize(raw: RawArticle, source_tag: &str, now: DateTime<Utc>) -> Result<Article> {
    let title = clean_field(raw.title.as_deref())
        .ok_or_else(|| Error::MalformedRecord(format!("{source_tag}: record without a title")))?;
    let raw_url = clean_field(raw.url.as_deref())
        .ok_or_else(|| Error::MalformedRecord(format!("{source_tag}: '{title}' has no URL")))?;
    let url = parse_article_url(&raw_url)?;

    let published = raw.published_at.as_deref().and_then(parse_timestamp);
    if published.is_none() {
        debug!(source = %source_tag, title = %title, "missing or unparseable publish date, using fetch time");
    }
    let published_at = published.unwrap_or(now);

    let content = clean_field(raw.content.as_deref()).map(|text| strip_html(&text));
    let summary = clean_field(raw.description.as_deref())
        .map(|text| strip_html(&text))
        .filter(|text| !text.is_empty())
        .or_else(|| content.as_deref().map(|text| truncate_chars(text, SUMMARY_FALLBACK_CHARS)))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| title.clone());

    let host = url.host_str().unwrap_or_default().trim_start_matches("www.").to_string();
    let source_name = clean_field(raw.source_name.as_deref()).unwrap_or_else(|| host.clone());
    let source_url = clean_field(raw.source_url.as_deref())
        .unwrap_or_else(|| format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default()));

    let id_seed = format!(
        "{}|{}|{}",
        title,
        raw_url,
        published.map(|ts| ts.to_rfc3339()).unwrap_or_default()
    );

    Ok(Article {
        id: hash_text(&id_seed)[..24].to_string(),
        title,
        summary,
        content: content.filter(|text| !text.is_empty()),
        url: raw_url,
        source_name,
        source_url,
        author: clean_field(raw.author.as_deref()).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        published_at,
        fetched_at: now,
        image_url: clean_field(raw.image_url.as_deref()),
        category: clean_field(raw.category.as_deref())
            .map(|c| c.to_lowercase())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        bias_score: None,
        credibility_score: None,
        social_engagement: raw.engagement.unwrap_or(0),
        sentiment_score: None,
        upstream: source_tag.to_string(),
        ai_analysis: None,
    })
}

fn clean_field(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_article_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(Error::MalformedRecord(format!("unsupported article URL: {raw}"))),
    }
}

/// Accepts RFC 3339, RFC 2822 and naive `YYYY-MM-DD HH:MM:SS` (assumed UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(value) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Drops markup some feeds embed in descriptions and bodies.
pub fn strip_html(text: &str) -> String {
    if !text.contains('<') && !text.contains('&') {
        return text.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    let fragment = Html::parse_fragment(text);
    let plain = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    plain.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}
