use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::types::time::OffsetDateTime;
use sqlx::{FromRow, Row};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum LeadType {
    Buyer,
    Seller,
}

impl LeadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadType::Buyer => "buyer",
            LeadType::Seller => "seller",
        }
    }
}

impl FromStr for LeadType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(LeadType::Buyer),
            "seller" => Ok(LeadType::Seller),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum BatchCallStatus {
    Pending,
    Completed,
}

impl BatchCallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchCallStatus::Pending => "pending",
            BatchCallStatus::Completed => "completed",
        }
    }
}

impl FromStr for BatchCallStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BatchCallStatus::Pending),
            "completed" => Ok(BatchCallStatus::Completed),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// A text column held a value outside its enum.
#[derive(Debug)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone_number: String,
    pub user_id: Uuid,
    pub address: Option<String>,
    #[serde(rename = "type")]
    pub lead_type: Option<LeadType>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl<'r> FromRow<'r, PgRow> for Lead {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let lead_type: Option<String> = row.try_get("lead_type")?;
        let lead_type = lead_type
            .map(|t| t.parse::<LeadType>())
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "lead_type".to_string(),
                source: Box::new(e),
            })?;
        Ok(Lead {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone_number: row.try_get("phone_number")?,
            user_id: row.try_get("owner_id")?,
            address: row.try_get("address")?,
            lead_type,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Serialize, Clone, PartialEq, Debug, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub id: Uuid,
    pub call_id: String,
    pub lead_id: Uuid,
    pub status: String,
    pub analysis: Option<serde_json::Value>,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub duration_ms: Option<i64>,
    pub cost: Option<f64>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A lead as listed to its owner, calls newest first.
#[derive(Serialize, Clone, Debug)]
pub struct LeadWithCalls {
    #[serde(flatten)]
    pub lead: Lead,
    pub calls: Vec<Call>,
}

#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BatchCall {
    pub id: Uuid,
    pub batch_call_id: String,
    pub user_id: Uuid,
    pub agent_id: String,
    pub expected_calls: i32,
    pub calls_done: i32,
    pub status: BatchCallStatus,
    pub lead_ids: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl<'r> FromRow<'r, PgRow> for BatchCall {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<BatchCallStatus>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: Box::new(e),
            })?;
        Ok(BatchCall {
            id: row.try_get("id")?,
            batch_call_id: row.try_get("batch_call_id")?,
            user_id: row.try_get("owner_id")?,
            agent_id: row.try_get("agent_id")?,
            expected_calls: row.try_get("expected_calls")?,
            calls_done: row.try_get("calls_done")?,
            status,
            lead_ids: row.try_get("lead_ids")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// One entry of a bulk import; already validated.
#[derive(Clone, Debug)]
pub struct NewLead {
    pub name: String,
    pub email: Option<String>,
    pub phone_number: String,
    pub address: Option<String>,
    pub lead_type: Option<LeadType>,
}

/// Contact details from a call request. A missing name keeps the stored one.
#[derive(Clone, Debug)]
pub struct ContactUpsert {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: String,
}

#[derive(Clone, Debug, Default)]
pub struct LeadChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub lead_type: Option<LeadType>,
}

/// How a path segment addresses a lead.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LeadKey {
    Id(Uuid),
    Phone(String),
}

impl LeadKey {
    pub fn parse(raw: &str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(id) => LeadKey::Id(id),
            Err(_) => LeadKey::Phone(raw.to_string()),
        }
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        match self {
            LeadKey::Id(id) => lead.id == *id,
            LeadKey::Phone(phone) => lead.phone_number == *phone,
        }
    }
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSummary {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub skipped_count: u64,
}

impl UpsertSummary {
    pub fn saved(&self) -> u64 {
        self.upserted_count + self.modified_count
    }
}

#[derive(Clone, Debug)]
pub struct NewCall {
    pub call_id: String,
    pub lead_id: Uuid,
    pub status: String,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
}

/// Terminal data copied back from the provider.
#[derive(Clone, Debug, Default)]
pub struct CallOutcome {
    pub status: String,
    pub analysis: Option<serde_json::Value>,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub duration_ms: Option<i64>,
    pub cost: Option<f64>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewBatchCall {
    pub batch_call_id: String,
    pub owner_id: Uuid,
    pub agent_id: String,
    pub lead_ids: Vec<Uuid>,
}
