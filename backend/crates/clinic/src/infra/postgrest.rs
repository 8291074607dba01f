//! Supabase REST (PostgREST) row store
//!
//! `/rest/v1/{table}` with filters encoded as `column=op.value`.

use reqwest::Method;
use serde_json::Value;

use crate::domain::repository::{Direction, Filter, Op, Query, Row, RowStore, refuse_unfiltered};
use crate::error::{ClinicError, ClinicResult};
use crate::infra::supabase::{SupabaseHttp, ensure_success};

const SERVICE: &str = "postgrest";

/// PostgREST-backed row store
#[derive(Debug, Clone)]
pub struct PostgrestStore {
    http: SupabaseHttp,
}

impl PostgrestStore {
    pub fn new(http: SupabaseHttp) -> Self {
        Self { http }
    }

    fn table_url(&self, table: &str) -> ClinicResult<reqwest::Url> {
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(ClinicError::Validation(format!("invalid table name: {table}")));
        }
        self.http.url(&format!("rest/v1/{table}"))
    }
}

/// Query-string pairs for a filter
pub fn filter_params(filter: &Filter) -> Vec<(String, String)> {
    filter
        .conditions()
        .iter()
        .map(|c| {
            let encoded = match (&c.value, c.op) {
                (Value::Null, Op::Eq) => "is.null".to_string(),
                (value, op) => format!("{}.{}", op.as_str(), encode_value(value)),
            };
            (c.column.clone(), encoded)
        })
        .collect()
}

/// Query-string pairs for a full read
pub fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(&query.filter));

    if let Some((column, direction)) = &query.order {
        let dir = match direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        params.push(("order".to_string(), format!("{column}.{dir}")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

impl RowStore for PostgrestStore {
    async fn select(&self, table: &str, query: &Query) -> ClinicResult<Vec<Row>> {
        let response = self
            .http
            .request(Method::GET, self.table_url(table)?)
            .query(&query_params(query))
            .send()
            .await?;

        let rows = ensure_success(SERVICE, response).await?.json().await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> ClinicResult<Row> {
        let response = self
            .http
            .request(Method::POST, self.table_url(table)?)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        let mut rows: Vec<Row> = ensure_success(SERVICE, response).await?.json().await?;
        if rows.is_empty() {
            return Err(ClinicError::Internal(format!(
                "insert into {table} returned no row"
            )));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> ClinicResult<Vec<Row>> {
        refuse_unfiltered("update", table, filter)?;

        let response = self
            .http
            .request(Method::PATCH, self.table_url(table)?)
            .query(&filter_params(filter))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;

        let rows = ensure_success(SERVICE, response).await?.json().await?;
        Ok(rows)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> ClinicResult<u64> {
        refuse_unfiltered("delete", table, filter)?;

        let response = self
            .http
            .request(Method::DELETE, self.table_url(table)?)
            .query(&filter_params(filter))
            .header("Prefer", "return=representation")
            .send()
            .await?;

        let rows: Vec<Row> = ensure_success(SERVICE, response).await?.json().await?;
        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{
        Router,
        extract::{Path, RawQuery, State},
        http::{HeaderMap, Method as AxumMethod, StatusCode},
        routing::any,
    };
    use serde_json::json;

    use crate::test_support::spawn_stub;

    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        table: String,
        query: String,
        prefer: Option<String>,
        apikey: Option<String>,
        authorization: Option<String>,
        body: String,
    }

    type Log = Arc<Mutex<Vec<Captured>>>;

    async fn handler(
        State(log): State<Log>,
        method: AxumMethod,
        Path(table): Path<String>,
        RawQuery(query): RawQuery,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, String) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        log.lock().unwrap().push(Captured {
            method: method.to_string(),
            table: table.clone(),
            query: query.unwrap_or_default(),
            prefer: header("prefer"),
            apikey: header("apikey"),
            authorization: header("authorization"),
            body: body.clone(),
        });

        if table == "broken" {
            return (StatusCode::BAD_REQUEST, r#"{"message":"column missing"}"#.to_string());
        }
        match method.as_str() {
            "GET" => (
                StatusCode::OK,
                r#"[{"id":1,"action":"booking.update"}]"#.to_string(),
            ),
            "POST" => (StatusCode::CREATED, format!("[{}]", body)),
            "PATCH" => (StatusCode::OK, format!("[{}]", body)),
            "DELETE" => (StatusCode::OK, r#"[{"id":1},{"id":2}]"#.to_string()),
            _ => (StatusCode::METHOD_NOT_ALLOWED, String::new()),
        }
    }

    async fn stub_store() -> (PostgrestStore, Log) {
        let log: Log = Arc::default();
        let router = Router::new()
            .route("/rest/v1/{table}", any(handler))
            .with_state(log.clone());
        let base = spawn_stub(router).await;
        let http = SupabaseHttp::new(&base, "service-key", Duration::from_secs(5)).unwrap();
        (PostgrestStore::new(http), log)
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_encoding() {
        let filter = Filter::new()
            .eq("email", "a@b.com")
            .lt("attempted_at_ms", 1_000)
            .gte("expires_at_ms", 0)
            .eq("deleted_at", Value::Null)
            .eq("failed", true);

        assert_eq!(
            filter_params(&filter),
            vec![
                ("email".to_string(), "eq.a@b.com".to_string()),
                ("attempted_at_ms".to_string(), "lt.1000".to_string()),
                ("expires_at_ms".to_string(), "gte.0".to_string()),
                ("deleted_at".to_string(), "is.null".to_string()),
                ("failed".to_string(), "eq.true".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_encoding() {
        let query = Query::new()
            .filter(Filter::new().eq("resource_type", "booking"))
            .order_by("created_at", Direction::Desc)
            .limit(20);
        let params = query_params(&query);
        assert_eq!(params[0], ("select".to_string(), "*".to_string()));
        assert!(params.contains(&("order".to_string(), "created_at.desc".to_string())));
        assert!(params.contains(&("limit".to_string(), "20".to_string())));
    }

    #[tokio::test]
    async fn test_select_sends_headers_and_filters() {
        let (store, log) = stub_store().await;
        let query = Query::new()
            .filter(Filter::new().eq("resource_type", "booking"))
            .order_by("created_at", Direction::Desc)
            .limit(5);

        let rows = store.select("audit_logs", &query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["action"], "booking.update");

        let captured = log.lock().unwrap()[0].clone();
        assert_eq!(captured.method, "GET");
        assert_eq!(captured.table, "audit_logs");
        assert!(captured.query.contains("resource_type=eq.booking"));
        assert!(captured.query.contains("order=created_at.desc"));
        assert!(captured.query.contains("limit=5"));
        assert_eq!(captured.apikey.as_deref(), Some("service-key"));
        assert_eq!(captured.authorization.as_deref(), Some("Bearer service-key"));
    }

    #[tokio::test]
    async fn test_insert_returns_representation() {
        let (store, log) = stub_store().await;
        let inserted = store
            .insert("audit_logs", row(json!({ "action": "customer.create" })))
            .await
            .unwrap();
        assert_eq!(inserted["action"], "customer.create");

        let captured = log.lock().unwrap()[0].clone();
        assert_eq!(captured.method, "POST");
        assert_eq!(captured.prefer.as_deref(), Some("return=representation"));
        assert!(captured.body.contains("customer.create"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (store, log) = stub_store().await;
        let filter = Filter::new().eq("id", "b-1");

        let updated = store
            .update("bookings", &filter, row(json!({ "status": "cancelled" })))
            .await
            .unwrap();
        assert_eq!(updated[0]["status"], "cancelled");

        let deleted = store.delete("bookings", &filter).await.unwrap();
        assert_eq!(deleted, 2);

        let log = log.lock().unwrap();
        assert_eq!(log[0].method, "PATCH");
        assert_eq!(log[0].query, "id=eq.b-1");
        assert_eq!(log[1].method, "DELETE");
    }

    #[tokio::test]
    async fn test_unfiltered_writes_are_refused() {
        let (store, log) = stub_store().await;
        assert!(matches!(
            store.delete("bookings", &Filter::new()).await,
            Err(ClinicError::Validation(_))
        ));
        assert!(matches!(
            store.update("bookings", &Filter::new(), Row::new()).await,
            Err(ClinicError::Validation(_))
        ));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_becomes_upstream_error() {
        let (store, _log) = stub_store().await;
        let err = store.select("broken", &Query::new()).await.unwrap_err();
        match err {
            ClinicError::Upstream {
                service,
                status,
                message,
            } => {
                assert_eq!(service, "postgrest");
                assert_eq!(status, 400);
                assert!(message.contains("column missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_table_name() {
        let (store, _log) = stub_store().await;
        assert!(matches!(
            store.select("customers?select=*", &Query::new()).await,
            Err(ClinicError::Validation(_))
        ));
    }
}
