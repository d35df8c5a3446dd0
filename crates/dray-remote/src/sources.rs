use std::collections::BTreeSet;

use async_trait::async_trait;
use dray_core::task::{ClientRecord, TaskRecord};
use tracing::warn;

use crate::feed::RecordSource;
use crate::rest::{Order, RestClient};

const USER_COLUMN: &str = "userID";
const CREATION_COLUMN: &str = "creationDate";

/// Fetches the task collection, either the whole table or one user's
/// rows.
#[derive(Debug, Clone)]
pub struct TaskListSource {
    rest: RestClient,
    table: String,
    user: Option<i64>,
}

impl TaskListSource {
    pub fn new(rest: RestClient, table: impl Into<String>) -> Self {
        Self {
            rest,
            table: table.into(),
            user: None,
        }
    }

    #[must_use]
    pub fn for_user(mut self, user: i64) -> Self {
        self.user = Some(user);
        self
    }
}

#[async_trait]
impl RecordSource for TaskListSource {
    type Record = TaskRecord;

    async fn fetch(&self) -> anyhow::Result<Vec<TaskRecord>> {
        let rows = match self.user {
            Some(user) => {
                self.rest
                    .select_eq(&self.table, USER_COLUMN, &user.to_string())
                    .await?
            }
            None => self.rest.select_all(&self.table).await?,
        };
        Ok(dedup_by_id(rows))
    }
}

/// Fetches the history collection the way the backend serves it: every
/// row, newest creation first. Range filtering and reordering happen
/// locally in `dray_core::history`.
#[derive(Debug, Clone)]
pub struct TaskHistorySource {
    rest: RestClient,
    table: String,
}

impl TaskHistorySource {
    pub fn new(rest: RestClient, table: impl Into<String>) -> Self {
        Self {
            rest,
            table: table.into(),
        }
    }
}

#[async_trait]
impl RecordSource for TaskHistorySource {
    type Record = TaskRecord;

    async fn fetch(&self) -> anyhow::Result<Vec<TaskRecord>> {
        let rows = self
            .rest
            .select_ordered(&self.table, CREATION_COLUMN, Order::Descending)
            .await?;
        Ok(dedup_by_id(rows))
    }
}

/// Fetches the client directory.
#[derive(Debug, Clone)]
pub struct ClientListSource {
    rest: RestClient,
    table: String,
}

impl ClientListSource {
    pub fn new(rest: RestClient, table: impl Into<String>) -> Self {
        Self {
            rest,
            table: table.into(),
        }
    }
}

#[async_trait]
impl RecordSource for ClientListSource {
    type Record = ClientRecord;

    async fn fetch(&self) -> anyhow::Result<Vec<ClientRecord>> {
        self.rest.select_all(&self.table).await
    }
}

// The published collection must not repeat an identifier; first
// occurrence wins.
fn dedup_by_id(rows: Vec<TaskRecord>) -> Vec<TaskRecord> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        if seen.insert(row.id) {
            out.push(row);
        } else {
            warn!(id = row.id, "dropping duplicate task row");
        }
    }

    out
}
