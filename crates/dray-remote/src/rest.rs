use std::time::Duration;

use anyhow::Context;
use dray_core::config::BackendConfig;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

impl Order {
    fn suffix(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// Thin client for the backend's table API.
///
/// Every request carries the project anon key in the `apikey` header. The
/// bearer token defaults to the anon key until a session token is
/// attached, at which point row visibility follows the signed-in user.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl RestClient {
    pub fn new(backend: &BackendConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed building HTTP client for the table API")?;

        Ok(Self {
            http,
            base_url: backend.url.trim_end_matches('/').to_string(),
            anon_key: backend.anon_key.clone(),
            access_token: None,
        })
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// `SELECT * FROM {table}`, in whatever order the backend pleases.
    #[instrument(skip(self))]
    pub async fn select_all<T>(&self, table: &str) -> anyhow::Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.fetch_rows(table, &[]).await
    }

    /// `SELECT * FROM {table} ORDER BY {column}`.
    #[instrument(skip(self))]
    pub async fn select_ordered<T>(
        &self,
        table: &str,
        column: &str,
        order: Order,
    ) -> anyhow::Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.fetch_rows(table, &[("order", order_param(column, order))])
            .await
    }

    /// `SELECT * FROM {table} WHERE {column} = {value}`.
    #[instrument(skip(self))]
    pub async fn select_eq<T>(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> anyhow::Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.fetch_rows(table, &[(column, format!("eq.{value}"))])
            .await
    }

    async fn fetch_rows<T>(&self, table: &str, params: &[(&str, String)]) -> anyhow::Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let url = table_url(&self.base_url, table);
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);

        let response = self
            .http
            .get(&url)
            .query(&[("select", "*")])
            .query(params)
            .header("apikey", &self.anon_key)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {bearer}"))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("failed requesting rows from {table}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(table, %status, body = %body, "table API returned an error status");
            anyhow::bail!("table API rejected the {table} query: {status}");
        }

        let rows: Vec<T> = response
            .json()
            .await
            .with_context(|| format!("failed decoding rows from {table}"))?;

        debug!(table, rows = rows.len(), "fetched table rows");
        Ok(rows)
    }
}

fn table_url(base_url: &str, table: &str) -> String {
    format!("{base_url}/rest/v1/{table}")
}

fn order_param(column: &str, order: Order) -> String {
    format!("{column}.{}", order.suffix())
}

#[cfg(test)]
mod tests {
    use super::{Order, order_param, table_url};

    #[test]
    fn table_urls_join_cleanly() {
        assert_eq!(
            table_url("https://abcdefgh.supabase.co", "Task"),
            "https://abcdefgh.supabase.co/rest/v1/Task"
        );
    }

    #[test]
    fn order_params_carry_the_direction_suffix() {
        assert_eq!(
            order_param("creationDate", Order::Descending),
            "creationDate.desc"
        );
        assert_eq!(order_param("deadline", Order::Ascending), "deadline.asc");
    }
}
