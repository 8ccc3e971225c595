use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handler::{
    accept_by_contractor, accept_by_manager, calculate_redemption, get_account, get_party, health_check,
    list_contracts, login, next_contract_id, open_account, pay, propose_contract, register_party,
    revoke_contract, withdraw_pending, withdraw_request, AppState,
};

pub fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                // Parties
                .route("/parties", post(register_party))
                .route("/login", post(login))
                .route("/parties/:party_id", get(get_party))
                .route("/parties/:party_id/contracts/:collection", get(list_contracts))
                // Contract lifecycle
                .route("/contracts", post(propose_contract))
                .route("/contracts/next-id", get(next_contract_id))
                .route("/contracts/:id/accept-contractor", post(accept_by_contractor))
                .route("/contracts/:id/accept-manager", post(accept_by_manager))
                .route("/contracts/:id/revoke", post(revoke_contract))
                .route("/contracts/:id/withdraw-request", post(withdraw_request))
                .route("/contracts/:id/withdraw-pending", post(withdraw_pending))
                .route("/contracts/:id/redemption", post(calculate_redemption))
                // Banks
                .route("/banks/:bank/accounts", post(open_account))
                .route("/banks/:bank/accounts/:account_no", get(get_account))
                .route("/banks/:bank/pay", post(pay)),
        )
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::initialize_app_state;
    use crate::config::Config;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let config = Config {
            credential_hash_cost: 4,
            ..Config::default()
        };
        create_app(initialize_app_state(&config).await.unwrap())
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, party_id: &str, bank: &str, account_no: &str, currency: &str) {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/v1/parties",
            Some(json!({
                "party_id": party_id,
                "name": party_id.to_uppercase(),
                "secret": "hunter22",
                "bank": bank,
                "account_no": account_no,
                "currency": currency,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert!(body.get("credential_hash").is_none());
    }

    #[tokio::test]
    async fn test_health_lists_ledgers() {
        let app = app().await;
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["ledgers"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_login() {
        let app = app().await;
        register(&app, "mia", "adfc", "M-1", "USD").await;

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/login",
            Some(json!({ "party_id": "mia", "secret": "hunter22" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/login",
            Some(json!({ "party_id": "mia", "secret": "wrong-secret" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "UNAUTHORIZED");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/login",
            Some(json!({ "party_id": "nobody", "secret": "hunter22" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_validation_errors_are_bad_requests() {
        let app = app().await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/parties",
            Some(json!({
                "party_id": "",
                "name": "x",
                "secret": "123",
                "bank": "adfc",
                "account_no": "1",
                "currency": "USD",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let details = body["error"].as_str().unwrap();
        assert!(details.contains("party_id"));
        assert!(details.contains("secret"));

        let (status, _) = call(&app, Method::GET, "/api/v1/parties/mia/contracts/archived", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_numeric_contract_id_renders_json_error() {
        let app = app().await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/contracts/abc/revoke",
            Some(json!({ "manager": "mia", "contractor": "ravi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "INVALID_INPUT");
        assert!(body["error"].as_str().unwrap().contains("Invalid path"));
    }

    #[tokio::test]
    async fn test_contract_lifecycle_and_cross_currency_payment() {
        let app = app().await;
        register(&app, "mia", "adfc", "M-1", "USD").await;
        register(&app, "ravi", "sbi", "R-1", "INR").await;

        let (status, body) = call(&app, Method::GET, "/api/v1/contracts/next-id", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["next_contract_id"], 1);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/contracts",
            Some(json!({
                "manager": "mia",
                "contractor": "ravi",
                "duration": 12,
                "interval": 7,
                "rate_per_interval": 100,
                "nature_of_work": "translation",
                "start_date": "01-01-2024",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let id = body["contract_id"].as_u64().unwrap();

        let (_, requested) = call(&app, Method::GET, "/api/v1/parties/ravi/contracts/requested", None).await;
        assert_eq!(requested.as_array().unwrap().len(), 1);

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/v1/contracts/{}/accept-contractor", id),
            Some(json!({
                "contractor": "ravi",
                "manager": "mia",
                "settlement_account": "R-1",
                "settlement_currency": "INR",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["stage"], "pending_approval");

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/v1/contracts/{}/accept-manager", id),
            Some(json!({ "manager": "mia", "contractor": "ravi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["stage"], "active");

        let (status, accrual) = call(
            &app,
            Method::POST,
            &format!("/api/v1/contracts/{}/redemption", id),
            Some(json!({ "manager": "mia", "contractor": "ravi", "current_date": "16-01-2024" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", accrual);
        assert_eq!(accrual["amount"], 200);
        assert_eq!(accrual["last_payment_date"], "15-01-2024");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/banks/adfc/accounts",
            Some(json!({ "account_no": "M-1", "owner": "mia", "initial_balance": 1000 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        // 100 USD -> 8217 INR at the forex desk, less 2% international fee
        let (status, receipt) = call(
            &app,
            Method::POST,
            "/api/v1/banks/adfc/pay",
            Some(json!({
                "from_currency": "USD",
                "to_currency": "INR",
                "amount": 100,
                "from_account": "M-1",
                "to_ledger": "sbi",
                "to_account": "R-1",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", receipt);
        assert_eq!(receipt["amount_delivered"], 8052);

        let (_, source) = call(&app, Method::GET, "/api/v1/banks/adfc/accounts/M-1", None).await;
        assert_eq!(source["balance"], 900);
        let (_, target) = call(&app, Method::GET, "/api/v1/banks/sbi/accounts/R-1", None).await;
        assert_eq!(target["balance"], 8052);

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/v1/contracts/{}/revoke", id),
            Some(json!({ "manager": "mia", "contractor": "ravi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["stage"], "terminated");

        let (_, party) = call(&app, Method::GET, "/api/v1/parties/ravi", None).await;
        assert!(party["active"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = app().await;
        let (status, body) = call(&app, Method::GET, "/api/v1/banks/adfc/accounts/NOPE", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "NOT_FOUND");

        let (status, _) = call(&app, Method::GET, "/api/v1/banks/chase/accounts/X", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        call(
            &app,
            Method::POST,
            "/api/v1/banks/adfc/accounts",
            Some(json!({ "account_no": "M-1", "initial_balance": 10 })),
        )
        .await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/banks/adfc/pay",
            Some(json!({
                "from_currency": "USD",
                "to_currency": "USD",
                "amount": 50,
                "from_account": "M-1",
                "to_ledger": "adfc",
                "to_account": "M-2",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/contracts/7/withdraw-request",
            Some(json!({ "party_id": "ghost" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
