use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use url::Url;

use crate::domain::article::{RawArticle, RawUser};
use crate::domain::dates::parse_date;
use crate::domain::slug::{sanitize_slug, slugify, SLUG_MAX_LEN};

/// Canonical internal record. Field names match the persisted snapshot
/// schema, so the struct serializes directly into `posts_data.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub link: String,
    pub date: String,
    pub content_html: String,
    pub description: String,
    pub slug: String,
    pub cover_image: String,
    pub tags: Vec<String>,
    pub author: String,
    pub api_data: Value,
}

impl Post {
    /// Normalize one upstream record into the canonical form.
    ///
    /// Deterministic and total: every field resolves to a default when the
    /// upstream payload omits it, and the original record is retained in
    /// `api_data` for lossless downstream use.
    pub fn from_raw(raw: &RawArticle, fallback_author: &str) -> Self {
        let title = raw
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());
        let link = raw.url.clone().unwrap_or_default();

        let author = raw
            .author
            .clone()
            .filter(|a| !a.is_empty())
            .or_else(|| user_field(&raw.user, |u| u.name.as_deref()))
            .or_else(|| user_field(&raw.user, |u| u.username.as_deref()))
            .unwrap_or_else(|| fallback_author.to_string());

        let tags = raw
            .tag_list
            .as_ref()
            .filter(|value| !value_is_empty(value))
            .or(raw.tags.as_ref())
            .map(normalize_tags)
            .unwrap_or_default();

        let slug = derive_slug(&link, raw.slug.as_deref(), &title);

        Self {
            id: raw.id,
            title,
            link,
            date: raw.published_at.clone().unwrap_or_default(),
            content_html: raw.body_html.clone().unwrap_or_default(),
            description: raw.description.as_deref().unwrap_or("").trim().to_string(),
            slug,
            cover_image: raw.cover_image.clone().unwrap_or_default(),
            tags,
            author,
            api_data: raw.to_value(),
        }
    }

    /// Rebuild a post from one persisted snapshot entry.
    ///
    /// Only non-object entries are rejected; missing fields fall back to
    /// defaults and legacy tag shapes are re-normalized.
    pub fn from_snapshot_entry(entry: &Value) -> Option<Self> {
        let obj = entry.as_object()?;
        let text = |key: &str| -> String {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let api_data = obj.get("api_data").cloned().unwrap_or(Value::Null);
        let id = obj
            .get("id")
            .and_then(Value::as_u64)
            .or_else(|| api_data.get("id").and_then(Value::as_u64))
            .unwrap_or(0);

        let title = {
            let t = text("title");
            if t.is_empty() {
                "Untitled".to_string()
            } else {
                t
            }
        };
        let link = text("link");

        let tags = obj.get("tags").map(normalize_tags).unwrap_or_default();

        let stored_slug = text("slug");
        let slug = if stored_slug.is_empty() {
            derive_slug(&link, api_data.get("slug").and_then(Value::as_str), &title)
        } else {
            stored_slug
        };

        Some(Self {
            id,
            title,
            link,
            date: text("date"),
            content_html: text("content_html"),
            description: text("description"),
            slug,
            cover_image: text("cover_image"),
            tags,
            author: text("author"),
            api_data,
        })
    }

    /// Reinterpret a cached post as a pseudo-upstream record.
    ///
    /// Used by cache fallback so a failed live fetch can still flow through
    /// the normal normalize/reconcile path.
    pub fn to_raw_article(&self, username: &str) -> RawArticle {
        let api_str = |key: &str| -> Option<String> {
            self.api_data
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let tag_list = if self.tags.is_empty() {
            self.api_data
                .get("tag_list")
                .cloned()
                .unwrap_or_else(|| json!([]))
        } else {
            json!(self.tags)
        };

        RawArticle {
            id: if self.id != 0 {
                self.id
            } else {
                self.api_data.get("id").and_then(Value::as_u64).unwrap_or(0)
            },
            title: Some(if self.title.is_empty() {
                "Untitled".to_string()
            } else {
                self.title.clone()
            }),
            url: Some(self.link.trim().to_string()),
            published_at: non_empty(&self.date).or_else(|| api_str("published_at")),
            edited_at: api_str("edited_at"),
            updated_at: api_str("updated_at"),
            body_html: non_empty(&self.content_html)
                .or_else(|| api_str("body_html"))
                .or_else(|| api_str("content_html")),
            description: Some(self.description.trim().to_string()),
            cover_image: Some(self.cover_image.clone()),
            slug: non_empty(&self.slug),
            author: None,
            tag_list: Some(tag_list),
            tags: None,
            user: Some(RawUser {
                name: non_empty(&self.author),
                username: Some(username.to_string()),
                extra: Map::new(),
            }),
            extra: Map::new(),
        }
    }

    /// Best known activity instant: edit time from the original record,
    /// else the publish date. Drives dedup winner selection and ordering.
    pub fn activity_timestamp(&self) -> Option<DateTime<Utc>> {
        self.api_data
            .get("edited_at")
            .and_then(Value::as_str)
            .and_then(parse_date)
            .or_else(|| parse_date(&self.date))
    }
}

/// Slug policy: the canonical link's path segment after the username,
/// sanitized; else the upstream slug field; else the slugified title;
/// else the literal "post".
fn derive_slug(link: &str, api_slug: Option<&str>, title: &str) -> String {
    if let Ok(parsed) = Url::parse(link) {
        let segment = parsed
            .path_segments()
            .and_then(|mut segments| segments.nth(1))
            .filter(|segment| !segment.is_empty());
        if let Some(segment) = segment {
            return sanitize_slug(segment, SLUG_MAX_LEN);
        }
    }

    let fallback = api_slug
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| slugify(title));

    if fallback.is_empty() {
        "post".to_string()
    } else {
        sanitize_slug(&fallback, SLUG_MAX_LEN)
    }
}

/// Normalize any JSON shape the upstream uses for tags into a clean list.
/// Lists are trimmed and filtered; strings split on commas, else
/// whitespace; anything else is stringified and normalized once more.
pub fn normalize_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let text = match item {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let trimmed = text.trim().to_string();
                (!trimmed.is_empty()).then_some(trimmed)
            })
            .collect(),
        Value::String(s) => split_tag_string(s),
        other => split_tag_string(&other.to_string()),
    }
}

fn split_tag_string(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.contains(',') {
        return trimmed
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect();
    }
    if trimmed.contains(char::is_whitespace) {
        return trimmed.split_whitespace().map(String::from).collect();
    }
    vec![trimmed.to_string()]
}

fn user_field(user: &Option<RawUser>, pick: impl Fn(&RawUser) -> Option<&str>) -> Option<String> {
    user.as_ref()
        .and_then(|u| pick(u))
        .filter(|value| !value.is_empty())
        .map(String::from)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
