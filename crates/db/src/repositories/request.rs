use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};

use reqflow_core::domain::request::{Request, RequestFields, RequestId, RequestStatus};

use super::{ListOrder, NewRequest, RepositoryError, RequestQuery, RequestRepository};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, function, status, owner, approver, validated_by, \
     reason_for_return, submission_date, modified_date, validation_status, returned_by, \
     created_at, fields_json";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Fixed-width RFC 3339 so lexical order in SQLite matches time order.
pub(crate) fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn decode<T: std::str::FromStr>(column: &str, raw: &str) -> Result<T, RepositoryError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<Request, RepositoryError> {
    let get = |column: &str| -> Result<String, RepositoryError> {
        row.try_get::<String, _>(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let get_opt = |column: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get::<Option<String>, _>(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };

    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let fields: RequestFields = serde_json::from_str(&get("fields_json")?)
        .map_err(|e| RepositoryError::Decode(format!("fields_json: {e}")))?;

    Ok(Request {
        id: RequestId(id),
        function: decode("function", &get("function")?)?,
        status: decode("status", &get("status")?)?,
        owner: get("owner")?,
        approver: get_opt("approver")?,
        validated_by: get_opt("validated_by")?,
        reason_for_return: get_opt("reason_for_return")?,
        submission_date: decode_timestamp("submission_date", &get("submission_date")?)?,
        modified_date: decode_timestamp("modified_date", &get("modified_date")?)?,
        validation_status: get_opt("validation_status")?
            .map(|raw| decode("validation_status", &raw))
            .transpose()?,
        returned_by: get_opt("returned_by")?.map(|raw| decode("returned_by", &raw)).transpose()?,
        created_at: decode_timestamp("created_at", &get("created_at")?)?,
        fields,
    })
}

fn encode_fields(fields: &RequestFields) -> Result<String, RepositoryError> {
    serde_json::to_string(fields).map_err(|e| RepositoryError::Decode(format!("fields_json: {e}")))
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: RequestId) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM change_request WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_request).transpose()
    }

    async fn list(&self, query: &RequestQuery) -> Result<Vec<Request>, RepositoryError> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {REQUEST_COLUMNS} FROM change_request WHERE 1 = 1"));

        if !query.statuses.is_empty() {
            builder.push(" AND status IN (");
            let mut separated = builder.separated(", ");
            for status in &query.statuses {
                separated.push_bind(status.as_str());
            }
            separated.push_unseparated(")");
        }
        if let Some(owner) = &query.owner {
            builder.push(" AND owner = ").push_bind(owner.clone()).push(" COLLATE NOCASE");
        }
        if let Some(function) = query.function.query_value() {
            builder.push(" AND function = ").push_bind(function);
        }
        builder.push(match query.order {
            ListOrder::SubmissionDateDesc => " ORDER BY submission_date DESC, id DESC",
            ListOrder::CreatedAtDesc => " ORDER BY created_at DESC, id DESC",
        });

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }

    async fn insert(&self, new: NewRequest) -> Result<Request, RepositoryError> {
        let at = encode_timestamp(new.submitted_at);
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO change_request
                 (function, status, owner, submission_date, modified_date, created_at, fields_json)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(new.function.key())
        .bind(RequestStatus::Submitted.as_str())
        .bind(&new.owner)
        .bind(&at)
        .bind(&at)
        .bind(&at)
        .bind(encode_fields(&new.fields)?)
        .fetch_one(&self.pool)
        .await?;

        self.find_by_id(RequestId(id))
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("inserted request {id} not readable")))
    }

    async fn update_if_status(
        &self,
        request: &Request,
        expected: RequestStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE change_request SET
                 status = ?,
                 approver = ?,
                 validated_by = ?,
                 reason_for_return = ?,
                 submission_date = ?,
                 modified_date = ?,
                 validation_status = ?,
                 returned_by = ?,
                 fields_json = ?
             WHERE id = ? AND status = ?",
        )
        .bind(request.status.as_str())
        .bind(&request.approver)
        .bind(&request.validated_by)
        .bind(&request.reason_for_return)
        .bind(encode_timestamp(request.submission_date))
        .bind(encode_timestamp(request.modified_date))
        .bind(request.validation_status.map(|status| status.as_str()))
        .bind(request.returned_by.map(|stage| stage.as_str()))
        .bind(encode_fields(&request.fields)?)
        .bind(request.id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM change_request").fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
