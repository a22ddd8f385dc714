use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

use crate::{error::AppError, storage::db::SurrealDbClient};

/// How far back the digest looks when no previous run has been recorded.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

fn serialize_datetime<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    Into::<surrealdb::sql::Datetime>::into(*date).serialize(serializer)
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let dt = surrealdb::sql::Datetime::deserialize(deserializer)?;
    Ok(DateTime::<Utc>::from(dt))
}

/// Singleton record tracking when the digest last completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunState {
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime"
    )]
    pub last_run: DateTime<Utc>,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime"
    )]
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    pub const TABLE: &'static str = "run_state";

    pub async fn get_current(db: &SurrealDbClient) -> Result<Option<Self>, AppError> {
        let state: Option<Self> = db
            .client
            .query("SELECT last_run, updated_at FROM type::thing('run_state', 'current')")
            .await?
            .take(0)?;

        Ok(state)
    }

    /// The cutoff for "new" papers: the last recorded run, or a week before `now`.
    pub async fn last_run_or_default(
        db: &SurrealDbClient,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, AppError> {
        match Self::get_current(db).await? {
            Some(state) => Ok(state.last_run),
            None => {
                warn!(
                    lookback_days = DEFAULT_LOOKBACK_DAYS,
                    "No previous run recorded, defaulting to lookback window"
                );
                Ok(now - Duration::days(DEFAULT_LOOKBACK_DAYS))
            }
        }
    }

    pub async fn record_run(db: &SurrealDbClient, at: DateTime<Utc>) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query(
                "UPSERT type::thing('run_state', 'current')
                 SET last_run = $last_run, updated_at = time::now()
                 RETURN last_run, updated_at",
            )
            .bind(("last_run", surrealdb::sql::Datetime::from(at)))
            .await?
            .take(0)?;

        let state = updated.ok_or(AppError::InternalError(
            "Something went wrong recording the run".into(),
        ))?;
        info!(last_run = %state.last_run, "Recorded run");
        Ok(state)
    }
}
