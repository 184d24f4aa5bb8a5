//! Hosted row store over HTTP
//!
//! Talks to a PostgREST-style API (`/rest/v1/<table>`) with:
//! - `apikey` + bearer authorization on every request
//! - `eq.` filters for owner, id and period type
//! - upsert through `on_conflict` on the goal's compound key

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Backend, BackendError, BackendResult, sort_newest_first};
use crate::period::Granularity;
use crate::types::{Goal, Row, Snapshot};

const SNAPSHOTS_TABLE: &str = "snapshots";
const GOALS_TABLE: &str = "goals";
const GOAL_CONFLICT_COLUMNS: &str = "user_id,period_type,period_key,area_id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: String,
    /// Session token of the signed-in user; the api key is used when absent.
    pub access_token: Option<String>,
}

impl RestConfig {
    /// Accepts `host:port` as well as full URLs.
    pub fn from_connection_string(connection_string: &str, api_key: impl Into<String>) -> Self {
        let base_url = if connection_string.starts_with("http") {
            connection_string.to_string()
        } else {
            format!("http://{}", connection_string)
        };
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: None,
        }
    }
}

#[derive(Clone)]
struct RestClient {
    base_url: String,
    api_key: String,
    bearer: String,
    agent: ureq::Agent,
}

impl RestClient {
    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        request
            .set("apikey", &self.api_key)
            .set("Authorization", &format!("Bearer {}", self.bearer))
    }

    fn get(&self, table: &str) -> ureq::Request {
        self.authorize(self.agent.get(&self.table_url(table)))
    }

    fn post(&self, table: &str) -> ureq::Request {
        self.authorize(self.agent.post(&self.table_url(table)))
    }

    fn delete(&self, table: &str) -> ureq::Request {
        self.authorize(self.agent.delete(&self.table_url(table)))
    }

    fn insert_snapshot(&self, row: &Row<Snapshot>) -> BackendResult<()> {
        self.post(SNAPSHOTS_TABLE)
            .set("Prefer", "return=minimal")
            .send_json(row)
            .map_err(map_ureq_error)?;
        Ok(())
    }

    fn list_snapshots(
        &self,
        owner: &str,
        period_type: Option<Granularity>,
    ) -> BackendResult<Vec<Snapshot>> {
        let mut request = self
            .get(SNAPSHOTS_TABLE)
            .query("select", "*")
            .query("user_id", &eq(owner))
            .query("order", "created_at.desc,id.desc");
        if let Some(period_type) = period_type {
            request = request.query("period_type", &eq(period_type.as_str()));
        }
        let rows: Vec<Row<Snapshot>> = request.call().map_err(map_ureq_error)?.into_json()?;
        let mut snapshots: Vec<Snapshot> = rows.into_iter().map(|r| r.record).collect();
        sort_newest_first(&mut snapshots);
        Ok(snapshots)
    }

    fn delete_snapshots(&self, filters: &[(&str, String)]) -> BackendResult<()> {
        let mut request = self.delete(SNAPSHOTS_TABLE);
        for (column, value) in filters {
            request = request.query(column, value);
        }
        request.call().map_err(map_ureq_error)?;
        Ok(())
    }

    fn list_goals(&self, owner: &str) -> BackendResult<Vec<Goal>> {
        let rows: Vec<Row<Goal>> = self
            .get(GOALS_TABLE)
            .query("select", "*")
            .query("user_id", &eq(owner))
            .call()
            .map_err(map_ureq_error)?
            .into_json()?;
        Ok(rows.into_iter().map(|r| r.record).collect())
    }

    fn upsert_goal(&self, row: &Row<Goal>) -> BackendResult<()> {
        self.post(GOALS_TABLE)
            .query("on_conflict", GOAL_CONFLICT_COLUMNS)
            .set("Prefer", "resolution=merge-duplicates,return=minimal")
            .send_json(row)
            .map_err(map_ureq_error)?;
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn map_ureq_error(err: ureq::Error) -> BackendError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            BackendError::Api(format!("HTTP {code}: {body}"))
        }
        ureq::Error::Transport(transport) => BackendError::Network(transport.to_string()),
    }
}

/// Backend for a hosted row store. Requests run on the blocking pool.
pub struct RestBackend {
    client: RestClient,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> Self {
        let bearer = config
            .access_token
            .clone()
            .unwrap_or_else(|| config.api_key.clone());
        Self {
            client: RestClient {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_key: config.api_key,
                bearer,
                agent: ureq::Agent::new(),
            },
        }
    }

    pub fn base_url(&self) -> &str {
        &self.client.base_url
    }

    async fn blocking<T, F>(&self, f: F) -> BackendResult<T>
    where
        T: Send + 'static,
        F: FnOnce(RestClient) -> BackendResult<T> + Send + 'static,
    {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || f(client))
            .await
            .map_err(|e| {
                BackendError::Io(std::io::Error::other(format!(
                    "spawn_blocking failed: {}",
                    e
                )))
            })?
    }
}

#[async_trait]
impl Backend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn insert_snapshot(&self, owner: &str, snapshot: &Snapshot) -> BackendResult<()> {
        let row = Row::new(owner, snapshot.clone());
        self.blocking(move |c| c.insert_snapshot(&row)).await
    }

    async fn list_snapshots(
        &self,
        owner: &str,
        period_type: Option<Granularity>,
    ) -> BackendResult<Vec<Snapshot>> {
        let owner = owner.to_string();
        self.blocking(move |c| c.list_snapshots(&owner, period_type))
            .await
    }

    async fn delete_snapshot(&self, owner: &str, id: &str) -> BackendResult<()> {
        let filters = vec![("user_id", eq(owner)), ("id", eq(id))];
        self.blocking(move |c| c.delete_snapshots(&filters)).await
    }

    async fn delete_snapshots_by_period(
        &self,
        owner: &str,
        period_type: Granularity,
    ) -> BackendResult<()> {
        let filters = vec![
            ("user_id", eq(owner)),
            ("period_type", eq(period_type.as_str())),
        ];
        self.blocking(move |c| c.delete_snapshots(&filters)).await
    }

    async fn list_goals(&self, owner: &str) -> BackendResult<Vec<Goal>> {
        let owner = owner.to_string();
        self.blocking(move |c| c.list_goals(&owner)).await
    }

    async fn upsert_goal(&self, owner: &str, goal: &Goal) -> BackendResult<()> {
        let row = Row::new(owner, goal.clone());
        self.blocking(move |c| c.upsert_goal(&row)).await
    }
}
