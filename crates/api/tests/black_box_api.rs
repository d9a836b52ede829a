use std::str::FromStr;
use std::sync::Arc;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use uuid::Uuid;

use stockbook_api::app::{build_app, services::AppServices};
use stockbook_infra::config::AppConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, over a fresh in-memory store, on an ephemeral port.
        let services = Arc::new(AppServices::in_memory(AppConfig::default()));
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Api {
    client: reqwest::Client,
    base_url: String,
    actor: String,
}

impl Api {
    fn new(srv: &TestServer) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: srv.base_url.clone(),
            actor: Uuid::now_v7().to_string(),
        }
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-Actor-Id", &self.actor);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        let body = res.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PATCH, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::DELETE, path, None).await
    }

    /// Register a party and return `(party_id, account_id)`.
    async fn party(&self, kind: &str, name: &str) -> (String, String) {
        let (status, body) = self
            .post("/parties", json!({ "kind": kind, "name": name, "currency": "EUR" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register party: {body}");
        (
            body["party"]["id"].as_str().unwrap().to_string(),
            body["account"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn company_account(&self, name: &str, account_type: &str) -> String {
        let (status, body) = self
            .post(
                "/accounts",
                json!({ "name": name, "account_type": account_type, "currency": "EUR" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "open account: {body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Receive `quantity` units of `product` into `zone` through a supply.
    async fn receive(&self, supplier: &str, zone: &str, product: &str, quantity: &str) {
        let (status, body) = self
            .post(
                "/stock-supplies",
                json!({
                    "supplier_id": supplier,
                    "zone_id": zone,
                    "items": [{ "product_id": product, "quantity": quantity, "unit_price": "2" }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create supply: {body}");
        let id = body["id"].as_str().unwrap();
        let (status, body) = self
            .patch(&format!("/stock-supplies/{id}"), json!({ "status": "received" }))
            .await;
        assert_eq!(status, StatusCode::OK, "receive supply: {body}");
    }

    async fn stock(&self, product: &str, zone: &str) -> Decimal {
        let (status, body) = self
            .get(&format!("/stock-levels?product_id={product}&zone_id={zone}"))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["items"]
            .as_array()
            .unwrap()
            .first()
            .map(|level| decimal(&level["quantity"]))
            .unwrap_or(Decimal::ZERO)
    }

    async fn balance(&self, account: &str) -> Decimal {
        let (status, body) = self.get(&format!("/accounts/{account}")).await;
        assert_eq!(status, StatusCode::OK, "get account: {body}");
        decimal(&body["current_balance"])
    }
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not a decimal: {other}"),
    }
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn actor_header_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/sales", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/sales", srv.base_url))
        .header("X-Actor-Id", "someone")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");

    let api = Api::new(&srv);
    let (status, body) = api.get("/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], api.actor.as_str());
}

#[tokio::test]
async fn sale_lifecycle_create_pay_cancel() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);

    let zone = Uuid::now_v7().to_string();
    let product = Uuid::now_v7().to_string();
    let (client_id, client_account) = api.party("client", "Acme Retail").await;
    let (supplier_id, _) = api.party("supplier", "Widget Works").await;
    let cash = api.company_account("Till", "cash").await;

    api.receive(&supplier_id, &zone, &product, "50").await;
    assert_eq!(api.stock(&product, &zone).await, dec!(50));

    // Creation deducts stock immediately.
    let (status, sale) = api
        .post(
            "/sales",
            json!({
                "client_id": client_id,
                "zone_id": zone,
                "items": [{ "product_id": product, "quantity": "10", "unit_price": "10" }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create sale: {sale}");
    assert_eq!(sale["status"], "pending");
    assert!(sale["reference"].as_str().unwrap().starts_with("SL-"));
    assert_eq!(sale["stock_movements"], 1);
    let sale_id = sale["id"].as_str().unwrap().to_string();
    assert_eq!(api.stock(&product, &zone).await, dec!(40));

    // Full payment from the client's account into the till.
    let (status, paid) = api
        .post(
            &format!("/sales/{sale_id}/pay"),
            json!({ "amount": "100", "target_account": cash }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "pay sale: {paid}");
    assert_eq!(paid["status"], "paid");
    assert_eq!(decimal(&paid["document"]["paid_amount"]), dec!(100));
    assert_eq!(paid["document"]["payment_status"], "paid");
    assert_eq!(api.balance(&cash).await, dec!(100));
    assert_eq!(api.balance(&client_account).await, dec!(-100));

    // Cancelling reverses the goods and the money.
    let (status, cancelled) = api
        .patch(&format!("/sales/{sale_id}"), json!({ "status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::OK, "cancel sale: {cancelled}");
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(api.stock(&product, &zone).await, dec!(50));
    assert_eq!(api.balance(&cash).await, Decimal::ZERO);
    assert_eq!(api.balance(&client_account).await, Decimal::ZERO);

    // Cancelling again is a no-op.
    let (status, again) = api
        .patch(&format!("/sales/{sale_id}"), json!({ "status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["stock_movements"], 0);
    assert_eq!(again["account_movements"], 0);

    // Stock card: receipt, sale, return.
    let (status, card) = api
        .get(&format!("/stock-cards?product_id={product}&zone_id={zone}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card["total"], 3);

    let (status, statement) = api
        .get(&format!("/account-statements?account_id={cash}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(statement["total"], 2);

    let (status, deleted) = api.delete(&format!("/sales/{sale_id}")).await;
    assert_eq!(status, StatusCode::OK, "delete sale: {deleted}");
    let (status, _) = api.get(&format!("/sales/{sale_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, report) = api.get("/reports/reconcile").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["consistent"], true, "reconcile: {report}");
}

#[tokio::test]
async fn domain_errors_map_to_status_codes() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);

    let zone = Uuid::now_v7().to_string();
    let product = Uuid::now_v7().to_string();
    let (client_id, _) = api.party("client", "Acme Retail").await;
    let (supplier_id, _) = api.party("supplier", "Widget Works").await;
    let cash = api.company_account("Till", "cash").await;
    api.receive(&supplier_id, &zone, &product, "5").await;

    // Not enough stock.
    let (status, body) = api
        .post(
            "/sales",
            json!({
                "client_id": client_id,
                "zone_id": zone,
                "items": [{ "product_id": product, "quantity": "6", "unit_price": "1" }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(api.stock(&product, &zone).await, dec!(5));

    // Malformed id.
    let (status, body) = api.get("/sales/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    // Unknown client.
    let (status, body) = api
        .post(
            "/sales",
            json!({
                "client_id": Uuid::now_v7().to_string(),
                "zone_id": zone,
                "items": [{ "product_id": product, "quantity": "1", "unit_price": "1" }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    let (status, sale) = api
        .post(
            "/sales",
            json!({
                "client_id": client_id,
                "zone_id": zone,
                "items": [{ "product_id": product, "quantity": "1", "unit_price": "10" }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let sale_id = sale["id"].as_str().unwrap().to_string();

    // Overpayment is rejected.
    let (status, body) = api
        .post(
            &format!("/sales/{sale_id}/pay"),
            json!({ "amount": "11", "target_account": cash }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    // Stale version.
    let (status, body) = api
        .patch(
            &format!("/sales/{sale_id}"),
            json!({ "expected_version": 99, "status": "confirmed" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"], "conflict");

    // Illegal transition.
    let (status, body) = api
        .patch(&format!("/sales/{sale_id}"), json!({ "status": "delivered" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"], "invalid_state_transition");

    // Unknown period.
    let (status, body) = api.get("/reports/dashboard?period=fortnight").await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn transfer_and_inventory_move_stock_between_zones() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);

    let warehouse = Uuid::now_v7().to_string();
    let store = Uuid::now_v7().to_string();
    let product = Uuid::now_v7().to_string();
    let (supplier_id, _) = api.party("supplier", "Widget Works").await;
    api.receive(&supplier_id, &warehouse, &product, "20").await;

    let (status, transfer) = api
        .post(
            "/stock-transfers",
            json!({
                "from_zone": warehouse,
                "to_zone": store,
                "items": [{ "product_id": product, "quantity": "8" }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create transfer: {transfer}");
    assert!(transfer["reference"].as_str().unwrap().starts_with("TRF-"));
    let transfer_id = transfer["id"].as_str().unwrap().to_string();

    let (status, completed) = api
        .patch(
            &format!("/stock-transfers/{transfer_id}"),
            json!({ "status": "completed" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "complete transfer: {completed}");
    assert_eq!(api.stock(&product, &warehouse).await, dec!(12));
    assert_eq!(api.stock(&product, &store).await, dec!(8));

    let (status, count) = api
        .post(
            "/inventories",
            json!({
                "zone_id": store,
                "items": [{ "product_id": product, "actual_quantity": "6" }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create inventory: {count}");
    assert!(count["reference"].as_str().unwrap().starts_with("INV-"));
    let count_id = count["id"].as_str().unwrap().to_string();

    let (status, body) = api
        .patch(&format!("/inventories/{count_id}"), json!({ "status": "in_progress" }))
        .await;
    assert_eq!(status, StatusCode::OK, "start inventory: {body}");
    assert_eq!(api.stock(&product, &store).await, dec!(8));

    let (status, body) = api
        .patch(&format!("/inventories/{count_id}"), json!({ "status": "completed" }))
        .await;
    assert_eq!(status, StatusCode::OK, "complete inventory: {body}");
    assert_eq!(api.stock(&product, &store).await, dec!(6));

    let (status, low) = api.get(&format!("/reports/low-stock?zone_id={store}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(low["items"].as_array().unwrap().len(), 0);
    let (status, low) = api
        .get(&format!("/reports/low-stock?zone_id={store}&threshold=10"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(low["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn supply_payment_and_cash_operations() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);

    let zone = Uuid::now_v7().to_string();
    let product = Uuid::now_v7().to_string();
    let (supplier_id, supplier_account) = api.party("supplier", "Widget Works").await;
    let bank = api.company_account("Main bank", "bank").await;
    let rent = api.company_account("Rent", "internal").await;

    let (status, supply) = api
        .post(
            "/stock-supplies",
            json!({
                "supplier_id": supplier_id,
                "zone_id": zone,
                "items": [{ "product_id": product, "quantity": "10", "unit_price": "3" }],
                "planned_payment": "20",
                "payment_account": bank,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create supply: {supply}");
    let supply_id = supply["id"].as_str().unwrap().to_string();

    // Paying before receipt is refused.
    let (status, _) = api
        .post(
            &format!("/stock-supplies/{supply_id}/pay"),
            json!({ "amount": "10", "source_account": bank }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, received) = api
        .patch(&format!("/stock-supplies/{supply_id}"), json!({ "status": "received" }))
        .await;
    assert_eq!(status, StatusCode::OK, "receive supply: {received}");
    assert_eq!(decimal(&received["document"]["paid_amount"]), dec!(20));
    assert_eq!(api.balance(&supplier_account).await, dec!(20));
    assert_eq!(api.stock(&product, &zone).await, dec!(10));

    let (status, paid) = api
        .post(
            &format!("/stock-supplies/{supply_id}/pay"),
            json!({ "amount": "15", "source_account": bank }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "pay supply: {paid}");
    assert_eq!(paid["document"]["payment_status"], "overpaid");

    let (status, expense) = api
        .post(
            "/cash-operations",
            json!({
                "kind": "expense",
                "amount": "7",
                "source_account": bank,
                "target_account": rent,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create expense: {expense}");
    assert!(expense["reference"].as_str().unwrap().starts_with("EXP-"));
    let expense_id = expense["id"].as_str().unwrap().to_string();
    assert_eq!(api.balance(&rent).await, Decimal::ZERO);

    let (status, _) = api
        .patch(&format!("/cash-operations/{expense_id}"), json!({ "status": "confirmed" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(api.balance(&rent).await, dec!(7));
    assert_eq!(api.balance(&bank).await, dec!(-42));

    let (status, outstanding) = api.get("/reports/outstanding-balances").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outstanding["parties"].as_array().unwrap().len(), 1);

    let (status, dashboard) = api.get("/reports/dashboard?period=day").await;
    assert_eq!(status, StatusCode::OK, "{dashboard}");
    assert_eq!(dashboard["supplies_received"], 1);

    let (status, report) = api.get("/reports/reconcile").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["consistent"], true, "reconcile: {report}");
}
