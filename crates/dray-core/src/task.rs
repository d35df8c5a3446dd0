use serde::{Deserialize, Serialize};

/// One row of the backend `Task` table, shaped exactly as the table API
/// returns it.
///
/// Timestamp columns stay raw strings: the backend stores either a plain
/// ISO-8601 date or a date-time with offset, and rows with malformed
/// values must survive decoding so the history engine can apply its own
/// exclusion policy instead of the whole fetch failing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    #[serde(rename = "ID")]
    pub id: i64,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(rename = "creationDate", default)]
    pub creation_date: Option<String>,

    #[serde(default)]
    pub deadline: Option<String>,

    #[serde(rename = "userID", default)]
    pub user_id: Option<i64>,
}

/// One row of the backend `Client` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientRecord {
    #[serde(rename = "ID")]
    pub id: i64,
    pub name: String,
    pub nif: String,
    pub address: String,
    pub phone: String,
    pub email: String,
}
