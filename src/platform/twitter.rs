//! 推特 / X API 客户端
//!
//! - 搜索：GET /2/tweets/search/recent（since_id + next_token 分页，展开媒体 URL 与作者用户名）
//! - 上传：POST upload.twitter.com/1.1/media/upload.json（multipart）
//! - 发推：POST /2/tweets
//!
//! 429 映射为 RateLimited（重置时间取自 x-rate-limit-reset），401 为 ConfigError，5xx 与网络错误为 Transient，其余非 2xx 为 Rejected。

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use crate::config::TwitterSection;
use crate::core::BotError;
use crate::mention::{MediaItem, MediaKind, Mention, MentionId};
use crate::platform::oauth::{percent_encode, OAuthCredentials};
use crate::platform::{InboxFetcher, MediaHandle, MediaUploader, StatusPoster, MAX_MEDIA_PER_POST};

/// search/recent 单页 max_results 的合法范围
const PAGE_MIN: usize = 10;
const PAGE_MAX: usize = 100;

pub struct TwitterClient {
    client: Client,
    credentials: OAuthCredentials,
    api_base: String,
    upload_base: String,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Option<Vec<ApiTweet>>,
    includes: Option<Includes>,
    meta: Option<SearchMeta>,
    errors: Option<Vec<ApiError>>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    author_id: Option<String>,
    referenced_tweets: Option<Vec<ReferencedTweet>>,
    attachments: Option<Attachments>,
}

#[derive(Debug, Deserialize)]
struct ReferencedTweet {
    #[serde(rename = "type")]
    ref_type: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct Attachments {
    media_keys: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    media: Vec<ApiMedia>,
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiMedia {
    media_key: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct SearchMeta {
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    data: Option<PostedTweet>,
    errors: Option<Vec<ApiError>>,
}

#[derive(Debug, Deserialize)]
struct PostedTweet {
    id: String,
}

impl TwitterClient {
    pub fn new(cfg: &TwitterSection, credentials: OAuthCredentials) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .user_agent(concat!("mondrian-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BotError::ConfigError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            credentials,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            upload_base: cfg.upload_base.trim_end_matches('/').to_string(),
            page_size: cfg.page_size.clamp(PAGE_MIN, PAGE_MAX),
        })
    }

    async fn fetch_page(
        &self,
        query: &str,
        since_id: Option<MentionId>,
        page_size: usize,
        next_token: Option<&str>,
    ) -> Result<SearchResponse, BotError> {
        let url = format!("{}/tweets/search/recent", self.api_base);
        let page_size = page_size.to_string();
        let since = since_id.map(|id| id.to_string());

        let mut params: Vec<(&str, &str)> = vec![
            ("query", query),
            ("max_results", page_size.as_str()),
            ("tweet.fields", "author_id,referenced_tweets,attachments"),
            ("expansions", "attachments.media_keys,author_id"),
            ("media.fields", "url,type"),
            ("user.fields", "username"),
        ];
        if let Some(ref id) = since {
            params.push(("since_id", id.as_str()));
        }
        if let Some(token) = next_token {
            params.push(("next_token", token));
        }

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let auth = self.credentials.authorization_header("GET", &url, &params);

        let response = self
            .client
            .get(format!("{}?{}", url, query_string))
            .header("Authorization", auth)
            .send()
            .await
            .map_err(|e| BotError::Transient(format!("search request failed: {}", e)))?;

        let body = read_body(response).await?;
        tracing::debug!("search/recent response: {}", body);
        let page: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| BotError::Transient(format!("malformed search response: {}", e)))?;
        if page.data.is_none() {
            if let Some(errors) = &page.errors {
                return Err(BotError::Rejected(join_errors(errors)));
            }
        }
        Ok(page)
    }
}

#[async_trait]
impl InboxFetcher for TwitterClient {
    async fn search(
        &self,
        query: &str,
        since_id: Option<MentionId>,
        max_results: usize,
    ) -> Result<Vec<Mention>, BotError> {
        let mut mentions = Vec::new();
        let mut next_token: Option<String> = None;

        while mentions.len() < max_results {
            let remaining = max_results - mentions.len();
            let page_size = remaining.clamp(PAGE_MIN, self.page_size);
            let page = self
                .fetch_page(query, since_id, page_size, next_token.as_deref())
                .await?;
            mentions.extend(page_to_mentions(&page));
            next_token = page.meta.and_then(|m| m.next_token);
            if next_token.is_none() {
                break;
            }
        }

        mentions.truncate(max_results);
        Ok(mentions)
    }
}

#[async_trait]
impl MediaUploader for TwitterClient {
    async fn upload(&self, path: &Path) -> Result<MediaHandle, BotError> {
        let url = format!("{}/media/upload.json", self.upload_base);
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BotError::Transform(format!("read artifact {}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("media.jpg")
            .to_string();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")
            .map_err(|e| BotError::Transient(format!("multipart: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("media", part);

        let auth = self.credentials.authorization_header("POST", &url, &[]);
        let response = self
            .client
            .post(&url)
            .header("Authorization", auth)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BotError::Transient(format!("media upload failed: {}", e)))?;

        let body = read_body(response).await?;
        let uploaded: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| BotError::Transient(format!("malformed upload response: {}", e)))?;
        tracing::debug!(media_id = %uploaded.media_id_string, path = %path.display(), "media uploaded");
        Ok(MediaHandle(uploaded.media_id_string))
    }
}

#[async_trait]
impl StatusPoster for TwitterClient {
    async fn post(
        &self,
        text: &str,
        media: &[MediaHandle],
        in_reply_to: Option<MentionId>,
    ) -> Result<String, BotError> {
        if media.len() > MAX_MEDIA_PER_POST {
            return Err(BotError::Rejected(format!(
                "too many media attachments ({} > {})",
                media.len(),
                MAX_MEDIA_PER_POST
            )));
        }
        let url = format!("{}/tweets", self.api_base);
        let body = build_post_body(text, media, in_reply_to);

        let auth = self.credentials.authorization_header("POST", &url, &[]);
        let response = self
            .client
            .post(&url)
            .header("Authorization", auth)
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Transient(format!("post request failed: {}", e)))?;

        let body = read_body(response).await?;
        let posted: PostResponse = serde_json::from_str(&body)
            .map_err(|e| BotError::Transient(format!("malformed post response: {}", e)))?;
        match posted.data {
            Some(tweet) => Ok(tweet.id),
            None => Err(BotError::Rejected(
                posted
                    .errors
                    .as_deref()
                    .map(join_errors)
                    .unwrap_or_else(|| "no tweet data returned".to_string()),
            )),
        }
    }
}

fn build_post_body(
    text: &str,
    media: &[MediaHandle],
    in_reply_to: Option<MentionId>,
) -> serde_json::Value {
    let mut body = serde_json::json!({});
    if !text.is_empty() {
        body["text"] = serde_json::json!(text);
    }
    if !media.is_empty() {
        let ids: Vec<&str> = media.iter().map(|m| m.0.as_str()).collect();
        body["media"] = serde_json::json!({ "media_ids": ids });
    }
    if let Some(id) = in_reply_to {
        body["reply"] = serde_json::json!({ "in_reply_to_tweet_id": id.to_string() });
    }
    body
}

/// 读取响应体并按状态码归类错误
async fn read_body(response: Response) -> Result<String, BotError> {
    let status = response.status();
    let retry_after = retry_after(&response);
    let body = response
        .text()
        .await
        .map_err(|e| BotError::Transient(format!("read body: {}", e)))?;
    classify_status(status, retry_after, &body)?;
    Ok(body)
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> Result<(), BotError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Err(BotError::RateLimited { retry_after })
    } else if status == StatusCode::UNAUTHORIZED {
        // 凭据失效重试无意义，交由主循环终止进程
        Err(BotError::ConfigError(format!("credentials rejected ({}): {}", status, body)))
    } else if status.is_server_error() {
        Err(BotError::Transient(format!("API error ({}): {}", status, body)))
    } else {
        Err(BotError::Rejected(format!("API error ({}): {}", status, body)))
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    let reset_at: u64 = response
        .headers()
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Some(Duration::from_secs(reset_at.saturating_sub(now)))
}

fn join_errors(errors: &[ApiError]) -> String {
    errors
        .iter()
        .filter_map(|e| e.detail.clone().or_else(|| e.message.clone()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// 将一页搜索结果转为 Mention（保持接口返回的从新到旧顺序）
fn page_to_mentions(page: &SearchResponse) -> Vec<Mention> {
    let empty = Includes::default();
    let includes = page.includes.as_ref().unwrap_or(&empty);
    let media_urls: HashMap<&str, Option<&str>> = includes
        .media
        .iter()
        .map(|m| (m.media_key.as_str(), m.url.as_deref()))
        .collect();
    let handles: HashMap<&str, &str> = includes
        .users
        .iter()
        .map(|u| (u.id.as_str(), u.username.as_str()))
        .collect();

    page.data
        .iter()
        .flatten()
        .filter_map(|tweet| {
            let id = match tweet.id.parse::<MentionId>() {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("Skipping tweet with unparsable id {}: {}", tweet.id, e);
                    return None;
                }
            };
            let Some(author_handle) = tweet
                .author_id
                .as_deref()
                .and_then(|a| handles.get(a).copied())
                .filter(|h| !h.is_empty())
                .map(str::to_string)
            else {
                tracing::warn!(mention = %id, "Skipping tweet without author handle (users expansion missing)");
                return None;
            };
            let in_reply_to_id = tweet
                .referenced_tweets
                .iter()
                .flatten()
                .find(|r| r.ref_type == "replied_to")
                .and_then(|r| r.id.parse().ok());
            // 视频 / GIF 没有 url 字段，仍记为媒体（Other），避免被误判为纯文本提及
            let media = tweet
                .attachments
                .as_ref()
                .and_then(|a| a.media_keys.as_ref())
                .into_iter()
                .flatten()
                .map(|key| match media_urls.get(key.as_str()).copied().flatten() {
                    Some(url) => MediaItem::from_url(url),
                    None => MediaItem {
                        url: String::new(),
                        kind: MediaKind::Other,
                    },
                })
                .collect();
            Some(Mention {
                id,
                author_handle,
                in_reply_to_id,
                media,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "data": [
            {"id": "1002", "author_id": "u1", "attachments": {"media_keys": ["3_a"]},
             "referenced_tweets": [{"type": "replied_to", "id": "990"}]},
            {"id": "1001", "author_id": "u2"},
            {"id": "1000", "author_id": "u2", "attachments": {"media_keys": ["7_v"]}}
        ],
        "includes": {
            "media": [
                {"media_key": "3_a", "type": "photo", "url": "https://pbs.twimg.com/media/a.jpg"},
                {"media_key": "7_v", "type": "video"}
            ],
            "users": [{"id": "u1", "username": "alice"}, {"id": "u2", "username": "bob"}]
        },
        "meta": {"result_count": 3, "next_token": "abc"}
    }"#;

    #[test]
    fn test_page_to_mentions() {
        let page: SearchResponse = serde_json::from_str(SAMPLE).unwrap();
        let mentions = page_to_mentions(&page);
        assert_eq!(mentions.len(), 3);

        assert_eq!(mentions[0].id, MentionId(1002));
        assert_eq!(mentions[0].author_handle, "alice");
        assert_eq!(mentions[0].in_reply_to_id, Some(MentionId(990)));
        assert_eq!(mentions[0].media[0].kind, MediaKind::Jpeg);

        assert_eq!(mentions[1].author_handle, "bob");
        assert!(mentions[1].media.is_empty());
        assert!(!mentions[1].is_reply());

        assert_eq!(mentions[2].media.len(), 1);
        assert_eq!(mentions[2].media[0].kind, MediaKind::Other);
        assert_eq!(page.meta.unwrap().next_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_mention_without_author_handle_is_skipped() {
        let page: SearchResponse = serde_json::from_str(
            r#"{
                "data": [
                    {"id": "2002", "author_id": "u9"},
                    {"id": "2001", "author_id": "u1"},
                    {"id": "2000"}
                ],
                "includes": {"users": [{"id": "u1", "username": "alice"}]}
            }"#,
        )
        .unwrap();
        let mentions = page_to_mentions(&page);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].id, MentionId(2001));
        assert_eq!(mentions[0].author_handle, "alice");
    }

    #[test]
    fn test_empty_page() {
        let page: SearchResponse = serde_json::from_str(r#"{"meta": {"result_count": 0}}"#).unwrap();
        assert!(page_to_mentions(&page).is_empty());
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::OK, None, "").is_ok());
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(60)), ""),
            Err(BotError::RateLimited {
                retry_after: Some(Duration::from_secs(60))
            })
        );
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, "oops"),
            Err(BotError::Transient(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None, "duplicate"),
            Err(BotError::Rejected(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, "Unauthorized"),
            Err(BotError::ConfigError(_))
        ));
    }

    #[test]
    fn test_build_post_body_reply_with_media() {
        let body = build_post_body(
            "@alice",
            &[MediaHandle("m1".into()), MediaHandle("m2".into())],
            Some(MentionId(42)),
        );
        assert_eq!(body["text"], "@alice");
        assert_eq!(body["media"]["media_ids"], serde_json::json!(["m1", "m2"]));
        assert_eq!(body["reply"]["in_reply_to_tweet_id"], "42");
    }

    #[test]
    fn test_build_post_body_top_level_without_text() {
        let body = build_post_body("", &[MediaHandle("m1".into())], None);
        assert!(body.get("text").is_none());
        assert!(body.get("reply").is_none());
    }
}
