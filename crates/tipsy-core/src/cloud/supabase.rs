//! Supabase PostgREST adapter for the entry collection and the user registry.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::{ProfileUpdate, RemoteEntry, RemoteUser};
use crate::util::{compact_text, generate_id, is_http_url};
use crate::{Error, Result};

use super::{EntryCollection, UserRegistry};

const ENTRIES_TABLE: &str = "drinking_notes";
const USERS_TABLE: &str = "users";
const PAGE_SIZE: usize = 500;

/// PostgREST client over the two backup tables.
#[derive(Clone)]
pub struct SupabaseStore {
    rest_url: String,
    anon_key: String,
    client: Client,
}

impl std::fmt::Debug for SupabaseStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseStore")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SupabaseStore {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>) -> Result<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(Error::InvalidConfig(
                "Supabase anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            rest_url,
            anon_key,
            client: Client::builder().build()?,
        })
    }

    fn table_url(&self, table: &str, filters: &[(&str, &str)]) -> String {
        let query = filters
            .iter()
            .map(|(column, value)| format!("{column}=eq.{}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        if query.is_empty() {
            format!("{}/{table}", self.rest_url)
        } else {
            format!("{}/{table}?{query}", self.rest_url)
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
            .header("Accept", "application/json")
    }

    async fn fetch<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>> {
        let response = self.authorized(self.client.get(url)).send().await?;
        Ok(check(response).await?.json::<Vec<T>>().await?)
    }

    async fn patch(&self, url: String, body: &impl serde::Serialize) -> Result<()> {
        let response = self
            .authorized(self.client.patch(url))
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// One page of an owner query. `_id` breaks `createTime` ties so offsets
/// stay stable across pages.
fn page_url(base: &str, offset: usize) -> String {
    format!("{base}&order=createTime.desc,_id.asc&limit={PAGE_SIZE}&offset={offset}")
}

#[async_trait]
impl EntryCollection for SupabaseStore {
    async fn query(&self, owner: &str) -> Result<Vec<RemoteEntry>> {
        let base = self.table_url(ENTRIES_TABLE, &[("_openid", owner)]);
        let mut entries = Vec::new();
        loop {
            let page: Vec<RemoteEntry> = self.fetch(page_url(&base, entries.len())).await?;
            let done = page.len() < PAGE_SIZE;
            entries.extend(page);
            if done {
                break;
            }
        }
        tracing::debug!("Fetched {} remote entries", entries.len());
        Ok(entries)
    }

    async fn find(&self, owner: &str, note_id: &str) -> Result<Option<RemoteEntry>> {
        let url = format!(
            "{}&limit=1",
            self.table_url(ENTRIES_TABLE, &[("_openid", owner), ("noteId", note_id)])
        );
        let rows: Vec<RemoteEntry> = self.fetch(url).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, entry: &RemoteEntry) -> Result<String> {
        let mut entry = entry.clone();
        let doc_id = entry.doc_id.get_or_insert_with(generate_id).clone();

        let response = self
            .authorized(self.client.post(self.table_url(ENTRIES_TABLE, &[])))
            .header("Prefer", "return=minimal")
            .json(&entry)
            .send()
            .await?;
        check(response).await?;
        Ok(doc_id)
    }

    async fn update(&self, doc_id: &str, entry: &RemoteEntry) -> Result<()> {
        let mut entry = entry.clone();
        entry.doc_id = None;
        entry.created_at = None;
        self.patch(self.table_url(ENTRIES_TABLE, &[("_id", doc_id)]), &entry)
            .await
    }

    async fn delete(&self, doc_id: &str) -> Result<()> {
        let response = self
            .authorized(
                self.client
                    .delete(self.table_url(ENTRIES_TABLE, &[("_id", doc_id)])),
            )
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl UserRegistry for SupabaseStore {
    async fn get(&self, openid: &str) -> Result<Option<RemoteUser>> {
        let url = format!("{}&limit=1", self.table_url(USERS_TABLE, &[("_id", openid)]));
        let rows: Vec<RemoteUser> = self.fetch(url).await?;
        Ok(rows.into_iter().next())
    }

    async fn create(&self, user: &RemoteUser) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.table_url(USERS_TABLE, &[])))
            .header("Prefer", "return=minimal")
            .json(user)
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(Error::Conflict(format!("user {} already exists", user.openid)));
        }
        check(response).await?;
        Ok(())
    }

    async fn update_profile(&self, openid: &str, update: &ProfileUpdate) -> Result<()> {
        self.patch(self.table_url(USERS_TABLE, &[("_id", openid)]), update)
            .await
    }

    async fn set_last_backup(&self, openid: &str, at: Option<i64>) -> Result<()> {
        self.patch(
            self.table_url(USERS_TABLE, &[("_id", openid)]),
            &serde_json::json!({ "lastBackupAt": at }),
        )
        .await
    }
}

async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Remote(parse_api_error(status, &body)))
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.details).or(payload.hint) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_rest_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidConfig(
            "Supabase URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(Error::InvalidConfig(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiaryEntry;
    use crate::util::now_millis;

    #[test]
    fn normalize_rest_url_appends_rest_path() {
        assert_eq!(
            normalize_rest_url("https://project.supabase.co/").unwrap(),
            "https://project.supabase.co/rest/v1"
        );
    }

    #[test]
    fn normalize_rest_url_keeps_existing_rest_path() {
        assert_eq!(
            normalize_rest_url("https://project.supabase.co/rest/v1").unwrap(),
            "https://project.supabase.co/rest/v1"
        );
        assert!(normalize_rest_url("project.supabase.co").is_err());
    }

    #[test]
    fn table_url_encodes_filter_values() {
        let store = SupabaseStore::new("https://project.supabase.co", "anon").unwrap();
        assert_eq!(
            store.table_url(ENTRIES_TABLE, &[("_openid", "o 1"), ("noteId", "n&1")]),
            "https://project.supabase.co/rest/v1/drinking_notes?_openid=eq.o%201&noteId=eq.n%261"
        );
    }

    #[test]
    fn page_url_orders_with_id_tiebreaker() {
        assert_eq!(
            page_url("https://p.supabase.co/rest/v1/drinking_notes?_openid=eq.o", 500),
            "https://p.supabase.co/rest/v1/drinking_notes?_openid=eq.o\
             &order=createTime.desc,_id.asc&limit=500&offset=500"
        );
    }

    #[test]
    fn store_debug_redacts_anon_key() {
        let store = SupabaseStore::new("https://project.supabase.co", "anon-secret").unwrap();
        assert!(!format!("{store:?}").contains("anon-secret"));
    }

    #[test]
    fn parse_api_error_prefers_message() {
        let body = r#"{"message":"duplicate key value","code":"23505"}"#;
        assert_eq!(
            parse_api_error(StatusCode::CONFLICT, body),
            "duplicate key value (409)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires TIPSY_SUPABASE_URL and TIPSY_SUPABASE_ANON_KEY plus network access"]
    async fn live_entry_upsert_roundtrip() {
        let _ = dotenvy::dotenv();
        let url = std::env::var("TIPSY_SUPABASE_URL").expect("TIPSY_SUPABASE_URL must be set");
        let key =
            std::env::var("TIPSY_SUPABASE_ANON_KEY").expect("TIPSY_SUPABASE_ANON_KEY must be set");
        let store = SupabaseStore::new(url, key).unwrap();

        let owner = format!("integration-{}", now_millis());
        let entry = DiaryEntry::new("Integration Sour", 4);
        let remote = RemoteEntry::from_local(&entry, &owner, None);
        let doc_id = store.insert(&remote).await.unwrap();

        let found = store
            .find(&owner, entry.id.as_str())
            .await
            .unwrap()
            .expect("inserted entry should be found");
        assert_eq!(found.doc_id.as_deref(), Some(doc_id.as_str()));

        store.delete(&doc_id).await.unwrap();
        assert!(store.query(&owner).await.unwrap().is_empty());
    }
}
