use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    envelope::{ApiResponse, Empty},
    error::{ApiError, ApiResult},
    payload::Payload,
    products::{
        dto::ProductResource,
        repo_types::{NewProduct, ProductChanges},
    },
    state::AppState,
    validation::{as_boolean, as_integer, validate, Rule, RuleSet},
};

pub const PRODUCT_RULES: RuleSet = &[
    ("name", &[Rule::Required, Rule::String, Rule::MinLength(4), Rule::MaxLength(32)]),
    ("category", &[Rule::Required, Rule::String, Rule::MinLength(4), Rule::MaxLength(32)]),
    ("price", &[Rule::Required, Rule::Integer, Rule::NumericMin(1)]),
    ("stock", &[Rule::Boolean]),
];

const PRODUCT: &str = "Product";

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

/// Validated product fields.
struct ProductInput {
    name: String,
    category: String,
    price: i64,
    stock: Option<bool>,
}

impl ProductInput {
    fn from_payload(payload: Payload) -> ApiResult<Self> {
        let payload = payload.trimmed(&[]);
        if let Err(errors) = validate(PRODUCT_RULES, payload.fields()) {
            warn!(fields = ?errors.keys().collect::<Vec<_>>(), "product validation failed");
            return Err(ApiError::Validation(errors));
        }

        Ok(Self {
            name: payload.str("name").unwrap_or_default().to_string(),
            category: payload.str("category").unwrap_or_default().to_string(),
            price: payload.get("price").and_then(as_integer).unwrap_or_default(),
            stock: payload.get("stock").and_then(as_boolean),
        })
    }
}

/// Unparseable ids cannot name a stored product.
fn product_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(PRODUCT))
}

#[instrument(skip_all, fields(user_id = %principal.user_id))]
pub async fn list_products(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> ApiResult<ApiResponse<Vec<ProductResource>>> {
    let products = state.products.list().await?;
    let items = products.into_iter().map(ProductResource::from).collect();
    Ok(ApiResponse::ok(items, "Products retrieved successfully"))
}

#[instrument(skip_all, fields(user_id = %principal.user_id))]
pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    payload: Payload,
) -> ApiResult<ApiResponse<ProductResource>> {
    let input = ProductInput::from_payload(payload)?;
    let product = state
        .products
        .create(NewProduct {
            name: input.name,
            category: input.category,
            price: input.price,
            stock: input.stock.unwrap_or(false),
        })
        .await?;

    info!(product_id = %product.id, "product created");
    Ok(ApiResponse::created(product.into(), "Product created successfully"))
}

#[instrument(skip_all, fields(user_id = %principal.user_id, id = %id))]
pub async fn get_product(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<ProductResource>> {
    let product = state
        .products
        .find(product_id(&id)?)
        .await?
        .ok_or(ApiError::NotFound(PRODUCT))?;
    Ok(ApiResponse::ok(product.into(), "Product retrieved successfully"))
}

#[instrument(skip_all, fields(user_id = %principal.user_id, id = %id))]
pub async fn update_product(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    payload: Payload,
) -> ApiResult<ApiResponse<ProductResource>> {
    let id = product_id(&id)?;
    if state.products.find(id).await?.is_none() {
        return Err(ApiError::NotFound(PRODUCT));
    }

    let input = ProductInput::from_payload(payload)?;
    let product = state
        .products
        .update(
            id,
            ProductChanges {
                name: input.name,
                category: input.category,
                price: input.price,
                stock: input.stock,
            },
        )
        .await?
        .ok_or(ApiError::NotFound(PRODUCT))?;

    info!(product_id = %product.id, "product updated");
    Ok(ApiResponse::ok(product.into(), "Product updated successfully"))
}

#[instrument(skip_all, fields(user_id = %principal.user_id, id = %id))]
pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Empty>> {
    let id = product_id(&id)?;
    if state.products.find(id).await?.is_none() || !state.products.delete(id).await? {
        return Err(ApiError::NotFound(PRODUCT));
    }

    info!(product_id = %id, "product deleted");
    Ok(ApiResponse::empty("Product deleted successfully"))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::test_support::TestApp;

    fn chair() -> serde_json::Value {
        json!({ "name": "Chair", "category": "Furniture", "price": 50, "stock": true })
    }

    #[tokio::test]
    async fn chair_lifecycle() {
        let app = TestApp::new();
        let token = app.token().await;

        let (status, body) = app
            .send(Method::POST, "/api/products", Some(&token), Some(chair()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Product created successfully");
        let created = &body["data"];
        for field in ["name", "category", "price", "stock"] {
            assert_eq!(created[field], chair()[field], "{field}");
        }
        let id = created["id"].as_str().unwrap().to_string();
        let uri = format!("/api/products/{id}");

        let (status, body) = app.send(Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], id.as_str());
        for field in ["name", "category", "price", "stock"] {
            assert_eq!(body["data"][field], chair()[field], "{field}");
        }

        let mut changed = chair();
        changed["price"] = json!(75);
        let (status, body) = app.send(Method::PUT, &uri, Some(&token), Some(changed)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["price"], 75);

        let (_, body) = app.send(Method::GET, &uri, Some(&token), None).await;
        assert_eq!(body["data"]["price"], 75);

        let (status, body) = app.send(Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({}));

        let (status, body) = app.send(Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Product not found");
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn empty_listing_is_success() {
        let app = TestApp::new();
        let token = app.token().await;
        let (status, body) = app.send(Method::GET, "/api/products", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));

        app.send(Method::POST, "/api/products", Some(&token), Some(chair())).await;
        let (_, body) = app.send(Method::GET, "/api/products", Some(&token), None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_each_missing_required_field() {
        let app = TestApp::new();
        let token = app.token().await;

        for field in ["name", "category", "price"] {
            let mut body = chair();
            body.as_object_mut().unwrap().remove(field);
            let (status, res) = app
                .send(Method::POST, "/api/products", Some(&token), Some(body))
                .await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{field}");
            assert_eq!(res["message"], "Validation error");
            assert_eq!(res["data"][field][0], format!("The {field} field is required."));
        }

        let (_, listing) = app.send(Method::GET, "/api/products", Some(&token), None).await;
        assert_eq!(listing["data"], json!([]));
    }

    #[tokio::test]
    async fn create_reports_all_violations_at_once() {
        let app = TestApp::new();
        let token = app.token().await;
        let bad = json!({
            "name": "abc",
            "category": "x".repeat(40),
            "price": 0,
            "stock": "maybe",
        });
        let (status, res) = app.send(Method::POST, "/api/products", Some(&token), Some(bad)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let errors = res["data"].as_object().unwrap();
        assert_eq!(errors.len(), 4);
    }

    #[tokio::test]
    async fn stock_defaults_false_and_survives_update_without_it() {
        let app = TestApp::new();
        let token = app.token().await;

        let mut body = chair();
        body.as_object_mut().unwrap().remove("stock");
        let (_, res) = app.send(Method::POST, "/api/products", Some(&token), Some(body)).await;
        assert_eq!(res["data"]["stock"], false);

        let (_, res) = app.send(Method::POST, "/api/products", Some(&token), Some(chair())).await;
        let uri = format!("/api/products/{}", res["data"]["id"].as_str().unwrap());
        let update = json!({ "name": "Armchair", "category": "Furniture", "price": "60" });
        let (status, res) = app.send(Method::PUT, &uri, Some(&token), Some(update)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["data"]["stock"], true);
        assert_eq!(res["data"]["price"], 60);
        assert_eq!(res["data"]["name"], "Armchair");
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let app = TestApp::new();
        let token = app.token().await;
        let missing = format!("/api/products/{}", uuid::Uuid::new_v4());

        for method in [Method::GET, Method::DELETE] {
            let (status, _) = app.send(method, &missing, Some(&token), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, _) = app.send(Method::PUT, &missing, Some(&token), Some(chair())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.send(Method::GET, "/api/products/42", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_validates_full_rule_set() {
        let app = TestApp::new();
        let token = app.token().await;
        let (_, res) = app.send(Method::POST, "/api/products", Some(&token), Some(chair())).await;
        let uri = format!("/api/products/{}", res["data"]["id"].as_str().unwrap());

        let (status, res) = app
            .send(Method::PUT, &uri, Some(&token), Some(json!({ "price": 75 })))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(res["data"]["name"].is_array());
        assert!(res["data"]["category"].is_array());

        let (_, res) = app.send(Method::GET, &uri, Some(&token), None).await;
        assert_eq!(res["data"]["price"], 50);
    }

    #[tokio::test]
    async fn routes_require_a_live_token() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/api/products", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = app
            .send(Method::POST, "/api/products", Some("not-a-token"), Some(chair()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
