use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ApiError;

/// Raw JSON object body. Validation runs against this before anything is
/// deserialized into typed input.
#[derive(Debug, Clone, Default)]
pub struct Payload(pub Map<String, Value>);

impl Payload {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    pub fn str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Trims surrounding whitespace from every string field not in `except`.
    pub fn trimmed(mut self, except: &[&str]) -> Self {
        for (key, value) in self.0.iter_mut() {
            if except.contains(&key.as_str()) {
                continue;
            }
            if let Value::String(s) = value {
                let t = s.trim();
                if t.len() != s.len() {
                    *s = t.to_string();
                }
            }
        }
        self
    }
}

#[async_trait]
impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| {
                warn!(error = %e, "rejected request body");
                ApiError::BadRequest(e.body_text())
            })?;

        match value {
            Value::Object(map) => Ok(Payload(map)),
            _ => Err(ApiError::BadRequest("Request body must be a JSON object".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header::CONTENT_TYPE};

    async fn extract(body: &'static str) -> Result<Payload, ApiError> {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        Payload::from_request(req, &()).await
    }

    #[tokio::test]
    async fn accepts_object() {
        let p = extract(r#"{"name":"Chair","stock":null}"#).await.unwrap();
        assert_eq!(p.str("name"), Some("Chair"));
        assert!(p.get("stock").is_none());
    }

    #[tokio::test]
    async fn trims_all_but_excluded_fields() {
        let p = extract(r#"{"name":"  Chair ","password":" pw ","price":5}"#)
            .await
            .unwrap()
            .trimmed(&["password"]);
        assert_eq!(p.str("name"), Some("Chair"));
        assert_eq!(p.str("password"), Some(" pw "));
        assert_eq!(p.get("price"), Some(&Value::from(5)));
    }

    #[tokio::test]
    async fn rejects_array_and_garbage() {
        assert!(matches!(extract("[1,2]").await, Err(ApiError::BadRequest(_))));
        assert!(matches!(extract("{nope").await, Err(ApiError::BadRequest(_))));
    }
}
