use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{Value, json};
use tower::ServiceExt;

use contract_cluster::interface::ContractInterface;
use contract_cluster::server;
use contract_cluster::settings::Settings;

const CONTRACTS: &str = "id_contrato,cpf_assinante,nome_assinante,cnpj_assinante,Valor (R$),file_name\n\
    c1,123,João,,100,c1.pdf\n\
    c2,123,Maria,,200,missing.pdf\n\
    c3,456,Maria,99,300,\n\
    c4,,,99,400,\n";

fn app(dir: &Path, cap: usize) -> Router {
    let dataset = dir.join("contracts.csv");
    let attachments = dir.join("contracts.pdf");
    fs::write(&dataset, CONTRACTS).expect("write dataset");
    fs::create_dir_all(&attachments).expect("attachment dir");
    fs::write(attachments.join("c1.pdf"), b"%PDF-1.4").expect("write pdf");
    let mut settings = Settings::with_paths(&dataset, dir.join("contracts_edits.csv"), &attachments)
        .expect("settings");
    settings.partial_match_cap = cap;
    server::router(Arc::new(ContractInterface::open(settings).expect("interface")))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn pick_finds_the_exact_row() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 200);
    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/pick",
        Some(json!({ "cpf_assinante": " 456 ", "nome_assinante": "Maria", "cnpj_assinante": "99" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "exact");
    assert_eq!(body["row_id"], 2);
    assert_eq!(body["truncated"], false);
}

#[tokio::test]
async fn pick_falls_back_to_capped_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 2);
    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/pick",
        Some(json!({ "cpf_assinante": "123", "nome_assinante": "Maria", "cnpj_assinante": "77" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "partial");
    assert!(body.get("row_id").is_none());
    let rows: Vec<u64> = body["candidates"]
        .as_array()
        .expect("candidates")
        .iter()
        .map(|c| c["row_id"].as_u64().unwrap())
        .collect();
    assert_eq!(rows, vec![0, 1]);
    assert_eq!(body["truncated"], true, "row 2 also shares the name");
}

#[tokio::test]
async fn pick_without_any_match() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 200);
    let (status, body) = call(&app, Method::POST, "/v1/pick", Some(json!({ "cpf_assinante": "000" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "none");
    assert!(body.get("candidates").is_none());
    assert_eq!(body["truncated"], false);
}

#[tokio::test]
async fn cluster_route_lists_members_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 200);
    let (status, body) = call(&app, Method::GET, "/v1/cluster/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seed"]["fields"]["id_contrato"], "c2");
    assert_eq!(body["id_col"], "id_contrato");
    let ids: Vec<&str> = body["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["fields"]["id_contrato"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
}

#[tokio::test]
async fn unknown_rows_are_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 200);
    for uri in ["/v1/cluster/9", "/v1/contract/9"] {
        let (status, body) = call(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["status"], "error");
    }
    let (status, _) = call(&app, Method::POST, "/v1/contract/9/update", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mismatched_row_index_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 200);
    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/contract/0/update",
        Some(json!({ "_row_index": "1", "Valor_R_": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(!dir.path().join("contracts_edits.csv").exists());
}

#[tokio::test]
async fn update_then_read_the_contract() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 200);
    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/contract/0/update",
        Some(json!({ "_row_index": "0", "Valor_R_": "150", "submit": "Save" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dropped"], json!(["submit"]));

    let (status, body) = call(&app, Method::GET, "/v1/contract/0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["edits"], 1);
    assert_eq!(body["pdf_filename"], "c1.pdf");
    assert_eq!(body["pdf_exists"], true);
    let valor = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["label"] == "Valor (R$)")
        .expect("valor field");
    assert_eq!(valor["safe"], "Valor_R_");
    assert_eq!(valor["value"], "100");
    assert_eq!(valor["current"], "150");
}

#[tokio::test]
async fn reload_route_reports_rows() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 200);
    let (status, body) = call(&app, Method::POST, "/v1/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"], 4);
}
