use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::Bookmark;
use crate::services::auth::Session;

#[derive(Debug, Serialize)]
struct CreateBookmarkRequest<'a> {
    user_id: &'a str,
    title: &'a str,
    url: &'a str,
}

/// Request/response client for the authoritative bookmark table. The
/// backend assigns durable ids and timestamps; this client never invents
/// either.
pub struct BookmarkGateway {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl BookmarkGateway {
    pub fn new(base_url: String, anon_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url,
            anon_key,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/bookmarks", self.base_url)
    }

    /// Fetch the owner's full bookmark snapshot, newest first. Used on
    /// initial load and to resync after an uncertain delete failure.
    pub async fn list(&self, session: &Session) -> Result<Vec<Bookmark>> {
        let owner = format!("eq.{}", session.user_id);
        let response = self
            .client
            .get(self.table_url())
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .query(&[
                ("select", "*"),
                ("user_id", owner.as_str()),
                ("order", "created_at.desc"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::Gateway(format!("list failed: {}", error_text)));
        }

        Ok(response.json().await?)
    }

    /// Create a bookmark for the owner, returning the durable record.
    pub async fn create(&self, session: &Session, title: &str, url: &str) -> Result<Bookmark> {
        let request = CreateBookmarkRequest {
            user_id: &session.user_id,
            title,
            url,
        };

        let response = self
            .client
            .post(self.table_url())
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(&session.access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::Gateway(format!("create failed: {}", error_text)));
        }

        // return=representation yields an array with the inserted row
        let mut rows: Vec<Bookmark> = response.json().await?;
        rows.pop()
            .ok_or_else(|| AppError::Gateway("create returned no row".to_string()))
    }

    /// Delete a bookmark by durable id.
    pub async fn delete(&self, session: &Session, id: &str) -> Result<()> {
        let filter = format!("eq.{}", id);
        let response = self
            .client
            .delete(self.table_url())
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .query(&[("id", filter.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::Gateway(format!("delete failed: {}", error_text)));
        }

        Ok(())
    }
}
