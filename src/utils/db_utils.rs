use crate::error::ApiError;
use chrono::{NaiveDate, NaiveTime};
use serde_json::{Map, Value};
use sqlx::MySqlPool;

/// A typed value bound into an `UPDATE`.
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    Date(NaiveDate),
    Time(NaiveTime),
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Checks a partial-update body: a non-empty JSON object whose keys are
/// all in `allowed` and whose values are not null.
pub fn patch_object<'a>(
    body: &'a Value,
    allowed: &[&str],
) -> Result<&'a Map<String, Value>, ApiError> {
    let patch = body
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if patch.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    for (key, value) in patch {
        if !allowed.contains(&key.as_str()) {
            return Err(ApiError::bad_request(format!(
                "Field `{key}` cannot be updated"
            )));
        }
        if value.is_null() {
            return Err(ApiError::bad_request(format!("Field `{key}` must not be null")));
        }
    }

    Ok(patch)
}

/// Builds `UPDATE table SET .. WHERE id_column = ?`.
/// Column names come from the caller's code, never from the request.
pub fn build_update(
    table: &str,
    assignments: Vec<(&'static str, SqlValue)>,
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    if assignments.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    let set_clause = assignments
        .iter()
        .map(|(column, _)| format!("{} = ?", column))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values: Vec<SqlValue> = assignments.into_iter().map(|(_, v)| v).collect();
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Time(v) => query.bind(v),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_set_clause_in_given_order() {
        let update = build_update(
            "students",
            vec![
                ("name", SqlValue::String("Budi".into())),
                (
                    "birth_date",
                    SqlValue::Date(NaiveDate::from_ymd_opt(2005, 1, 10).unwrap()),
                ),
            ],
            "id",
            4,
        )
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE students SET name = ?, birth_date = ? WHERE id = ?"
        );
        assert_eq!(update.values.last(), Some(&SqlValue::U64(4)));
        assert_eq!(update.values.len(), 3);
    }

    #[test]
    fn empty_assignments_are_rejected() {
        assert!(build_update("students", Vec::new(), "id", 1).is_err());
    }

    #[test]
    fn patch_rejects_unknown_columns() {
        let body = json!({"id = 1; DROP TABLE students; --": 1});
        let err = patch_object(&body, &["name"]).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn patch_rejects_nulls_empties_and_non_objects() {
        assert!(patch_object(&json!({"time": null}), &["time"]).is_err());
        assert!(patch_object(&json!({}), &["time"]).is_err());
        assert!(patch_object(&json!(["time"]), &["time"]).is_err());

        let body = json!({"note": "08:00"});
        let patch = patch_object(&body, &["note"]).unwrap();
        assert_eq!(patch["note"], "08:00");
    }
}
