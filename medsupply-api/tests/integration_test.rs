use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use medsupply_api::{app, AppState};
use medsupply_catalog::PatientShareDefaults;
use medsupply_store::{Fixtures, SessionStore};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> Router {
    let fixtures = Fixtures::load(PatientShareDefaults::default()).unwrap();
    let session = SessionStore::in_memory(4 * 1024 * 1024);
    app(AppState::new(fixtures, session))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None).await
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(body)).await
}

fn order_form(payer: &str, items: Value) -> Value {
    json!({
        "first_name": "Ruth",
        "last_name": "Alvarez",
        "dob": "1950-06-01",
        "phone": "(503) 555-0100",
        "self_pay": false,
        "payer": payer,
        "insurance_id": "MBI-1234567890",
        "group_number": "12345",
        "address": "12 Spruce Way",
        "city": "Salem",
        "state": "OR",
        "zip": "97301",
        "line_items": items,
    })
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_list_and_filter_orders() {
    let app = test_app();

    let (status, body) = get(&app, "/v1/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 7);
    assert_eq!(body[0]["id"], "ORD-1001");
    assert_eq!(body[0]["total_allowed_cents"], 245000);

    let (_, body) = get(&app, "/v1/orders?payer=Self-Pay").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "ORD-1006");
    assert_eq!(body[0]["payer"], "Self-Pay");

    let (_, body) = get(&app, "/v1/orders?status=Draft").await;
    assert_eq!(body[0]["id"], "ORD-1004");

    let (_, body) = get(&app, "/v1/orders?search=chen").await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = get(&app, "/v1/orders?status=Shipped").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dashboard_metrics() {
    let app = test_app();
    let (status, body) = get(&app, "/v1/orders/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "open_orders": 3, "needs_approval": 2, "docs_ready": 2 }));
}

#[tokio::test]
async fn test_get_order_is_case_insensitive() {
    let app = test_app();
    let (status, body) = get(&app, "/v1/orders/ord-1001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "ORD-1001");
    assert_eq!(body["margin_percent"], 122.7);
    assert_eq!(body["totals"]["total_cost_cents"], 110000);
    assert_eq!(body["notes"].as_array().unwrap().len(), 2);

    let (status, _) = get(&app, "/v1/orders/ORD-9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_order_requiring_approval() {
    let app = test_app();
    let (status, body) = post(&app, "/v1/orders", order_form("Medicare", json!([{ "product_id": "P-1", "qty": 1 }]))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["id"], "ORD-1008");
    assert_eq!(body["order"]["status"], "Needs Approval");
    assert_eq!(body["order"]["line_items"][0]["allowed_cents"], 165000);
    assert_eq!(body["order"]["line_items"][0]["patient_share_cents"], 33000);
    assert_eq!(body["missing_fee_schedules"], json!([]));
}

#[tokio::test]
async fn test_submit_reports_missing_fee_schedule() {
    let app = test_app();
    let (status, body) = post(
        &app,
        "/v1/orders",
        order_form("BCBS", json!([{ "product_id": "P-1", "qty": 1 }, { "product_id": "P-4", "qty": 1 }])),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["total_allowed_cents"], 32000);
    let missing = body["missing_fee_schedules"].as_array().unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0]["payer"], "BCBS");
    assert_eq!(missing[0]["hcpcs"], "K0823");
}

#[tokio::test]
async fn test_submit_invalid_form() {
    let app = test_app();
    let mut form = order_form("Medicare", json!([]));
    form["zip"] = json!("");
    form["phone"] = json!("n/a");

    let (status, body) = post(&app, "/v1/orders", form).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"]["zip"], "ZIP is required");
    assert_eq!(body["fields"]["phone"], "Phone must be a number");
    assert_eq!(body["fields"]["line_items"], "Add at least one line item");
    assert!(body["summary"].as_str().unwrap().contains("ZIP is required"));

    let (_, list) = get(&app, "/v1/orders").await;
    assert_eq!(list.as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_approve_and_generate_documents() {
    let app = test_app();

    let (status, body) = post(&app, "/v1/orders/ORD-1001/approve", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Approved");
    assert_eq!(body["documents"], json!([]));

    let (status, _) = post(&app, "/v1/orders/ORD-1001/approve", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = post(&app, "/v1/orders/ORD-1001/documents", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Docs Ready");
    assert_eq!(body["documents"].as_array().unwrap().len(), 3);

    let (status, invoice) = get(&app, "/v1/orders/ORD-1001/documents/invoice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoice["kind"], "invoice");
    assert_eq!(invoice["total_allowed_cents"], 245000);
    assert_eq!(invoice["patient_responsibility_cents"], 33000 + 16000);
    assert_eq!(invoice["insurance_pays_cents"], 245000 - 49000);
}

#[tokio::test]
async fn test_documents_require_docs_ready() {
    let app = test_app();

    let (status, _) = get(&app, "/v1/orders/ORD-1002/documents/pod").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = get(&app, "/v1/orders/ORD-1003/documents/receipt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, encounter) = get(&app, "/v1/orders/ORD-1003/documents/encounter").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(encounter["insurance_id"], "AET-5528194");
    assert_eq!(encounter["items"][0]["hcpcs"], "K0856");
}

#[tokio::test]
async fn test_reject_and_resubmit() {
    let app = test_app();

    let (status, body) = post(&app, "/v1/orders/ORD-1005/reject", json!({ "reason": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please provide a reason for rejection");

    let (status, body) = post(&app, "/v1/orders/ORD-1005/reject", json!({ "reason": "Prior auth denied" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Action Required");
    assert_eq!(body["rejection_reason"], "Prior auth denied");
    let notes = body["notes"].as_array().unwrap();
    assert_eq!(notes.last().unwrap()["author"], "Manager");
    assert_eq!(notes.last().unwrap()["text"], "Order rejected: Prior auth denied");

    // Drafts and finished orders cannot be rejected
    let (status, _) = post(&app, "/v1/orders/ORD-1004/reject", json!({ "reason": "x" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = post(&app, "/v1/orders/ORD-1005/submit", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "Needs Approval");
    assert!(body["order"].get("rejection_reason").is_none());
    // BCBS has no schedule for any CPAP line
    assert_eq!(body["missing_fee_schedules"].as_array().unwrap().len(), 3);

    let (_, body) = get(&app, "/v1/orders/ORD-1005").await;
    assert_eq!(body["status"], "Needs Approval");
}

#[tokio::test]
async fn test_line_item_edits_on_draft() {
    let app = test_app();

    let (status, body) = post(&app, "/v1/orders/ORD-1004/line-items", json!({ "product_id": "P-4", "qty": 2 })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["line_id"], "LI-1");
    assert_eq!(body["order"]["total_allowed_cents"], 60000);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/v1/orders/ORD-1004/coverage",
        Some(json!({ "payer": "BCBS", "self_pay": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["total_allowed_cents"], 64000);

    let (_, body) = post(&app, "/v1/orders/ORD-1004/line-items", json!({ "product_id": "P-1" })).await;
    assert_eq!(body["line_id"], "LI-2");
    assert_eq!(body["missing_fee_schedules"][0]["hcpcs"], "K0823");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/v1/orders/ORD-1004/line-items/LI-2",
        Some(json!({ "product_id": "P-4", "qty": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["total_allowed_cents"], 96000);

    let (status, body) = post(&app, "/v1/orders/ORD-1004/line-items/LI-2/clear", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["line_items"].as_array().unwrap().len(), 2);
    assert_eq!(body["total_allowed_cents"], 64000);

    let (status, body) = send(&app, Method::DELETE, "/v1/orders/ORD-1004/line-items/LI-2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["line_items"].as_array().unwrap().len(), 1);

    // Approved orders are locked
    let (status, _) = post(&app, "/v1/orders/ORD-1002/line-items", json!({ "product_id": "P-4" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_notes() {
    let app = test_app();

    let (status, body) = post(&app, "/v1/orders/ORD-1002/notes", json!({ "author": "Amy Lopez", "text": "Delivered" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["text"], "Delivered");

    let (status, _) = post(&app, "/v1/orders/ORD-1002/notes", json!({ "text": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, order) = get(&app, "/v1/orders/ORD-1002").await;
    assert_eq!(order["notes"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_catalog_admin_and_quote() {
    let app = test_app();

    let (status, body) = post(
        &app,
        "/v1/products",
        json!({ "name": "Rollator", "hcpcs": "E0149", "vendor": "Drive Medical", "cost": "60", "msrp": "150" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "P-13");

    let (status, body) = post(&app, "/v1/products", json!({ "name": "", "cost": "abc" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"]["name"], "Product name is required");

    let (status, _) = post(
        &app,
        "/v1/fee-schedules",
        json!({ "payer": "Medicare", "product_id": "P-1", "allowed_amount": "1700" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = post(
        &app,
        "/v1/fee-schedules",
        json!({ "payer": "BCBS", "product_id": "P-1", "allowed_amount": "$1,700.00" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["allowed_cents"], 170000);
    assert_eq!(body["patient_share_percent"], 15);

    let (_, quote) = post(&app, "/v1/pricing/quote", json!({ "payer": "BCBS", "product_id": "P-1" })).await;
    assert_eq!(quote["allowed"], "$1700.00");
    assert_eq!(quote["patient_share"], "$255.00");

    let (_, quote) = post(&app, "/v1/pricing/quote", json!({ "payer": "Medicare", "product_id": "P-1" })).await;
    assert_eq!(quote["allowed"], "$1650.00");
    assert_eq!(quote["patient_share"], "$330.00");

    let (_, quote) = post(&app, "/v1/pricing/quote", json!({ "payer": "Aetna", "self_pay": true, "product_id": "P-8" })).await;
    assert_eq!(quote["allowed_cents"], 42000);
    assert_eq!(quote["outcome"]["kind"], "SELF_PAY");

    let (status, _) = post(&app, "/v1/pricing/quote", json!({ "payer": "Cigna", "product_id": "P-1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_fee_schedule_prefill_and_parked_draft() {
    let app = test_app();

    let (status, body) = get(&app, "/v1/fee-schedules/form?payer=BCBS&hcpcs=K0823").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prefill"]["product_id"], "P-1");
    assert_eq!(body["prefill"]["patient_share_percent"], 15);
    assert_eq!(body["has_order_draft"], false);

    let form = order_form("BCBS", json!([{ "product_id": "P-1", "qty": 1 }]));
    let (status, _) = send(&app, Method::PUT, "/v1/session/order-draft", Some(form)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = get(&app, "/v1/fee-schedules/form?payer=Cigna").await;
    assert_eq!(body["prefill"], Value::Null);
    assert_eq!(body["has_order_draft"], true);

    let (_, body) = get(&app, "/v1/orders/form").await;
    assert_eq!(body["form"]["first_name"], "Ruth");

    let (status, _) = send(&app, Method::DELETE, "/v1/session", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = get(&app, "/v1/session/order-draft").await;
    assert_eq!(body["draft"], Value::Null);
}

#[tokio::test]
async fn test_attachments_and_continue_form() {
    let app = test_app();

    let (status, report) = send(
        &app,
        Method::PUT,
        "/v1/orders/ord-1004/attachments",
        Some(json!([
            { "name": "cmn.pdf", "type": "application/pdf", "content": "JVBERi0xLjQK" },
            { "name": "scan.png", "type": "image/png", "content": "iVBORw0KGgo=" },
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["stored"].as_array().unwrap().len(), 1);
    assert_eq!(report["rejected"][0]["reason"], "scan.png: PDF or Word only");

    let (_, body) = get(&app, "/v1/orders/ORD-1004/attachments").await;
    assert_eq!(body[0]["name"], "cmn.pdf");
    assert_eq!(body[0]["size"], 9);

    let (status, body) = get(&app, "/v1/orders/form?continue=ORD-1004").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_id"], "ORD-1004");
    assert_eq!(body["form"]["first_name"], "James");
    assert_eq!(body["form"]["last_name"], "Thompson");
    assert_eq!(body["form"]["group_number"], "");
    assert_eq!(body["attachments"].as_array().unwrap().len(), 1);

    let (status, _) = get(&app, "/v1/orders/ORD-4040/attachments").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_large_attachments_reach_the_store() {
    let app = test_app();

    // 3 MiB and 6 MiB of zero bytes
    let three_mib = "A".repeat(4 * 1024 * 1024);
    let six_mib = "A".repeat(8 * 1024 * 1024);

    let (status, report) = send(
        &app,
        Method::PUT,
        "/v1/orders/ORD-1001/attachments",
        Some(json!([
            { "name": "cmn.pdf", "type": "application/pdf", "content": three_mib },
            { "name": "scan.pdf", "type": "application/pdf", "content": six_mib },
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["stored"].as_array().unwrap().len(), 1);
    assert_eq!(report["stored"][0]["size"], 3 * 1024 * 1024);
    assert_eq!(report["rejected"][0]["reason"], "File too large: scan.pdf (max 4MB)");
}

#[tokio::test]
async fn test_update_and_resubmit_draft() {
    let app = test_app();

    let form = order_form("Medicare", json!([{ "product_id": "P-4", "qty": 1 }]));
    let (status, body) = send(&app, Method::PUT, "/v1/orders/ORD-1004", Some(form)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "Draft");
    assert_eq!(body["order"]["patient"], "Ruth Alvarez");

    let (status, body) = post(&app, "/v1/orders/ORD-1004/submit", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "Approved");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/v1/orders/ORD-1004",
        Some(order_form("Medicare", json!([]))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
