use std::sync::atomic::Ordering;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};

use listing_agent::models::{BatchStatus, ItemStatus, Plan};
use listing_agent::{billing, db, queue};

#[macro_use]
mod support;

use support::{Script, ScriptedModel};

fn properties() -> Vec<Value> {
    vec![
        json!({"property": {"address": "1 First Ave", "type": "Condo"}}),
        json!({"property": {"type": "House"}}),
        json!({"property": {"address": "3 Third Ave", "type": "Townhouse"}}),
    ]
}

#[actix_web::test]
async fn item_failure_does_not_stop_the_batch() {
    let pool = support::init_test_db().await;
    db::create_user(&pool, "pro@example.com", "hash", 10).await.expect("user");
    let generator = support::generator(&pool, ScriptedModel::new(Script::Valid));

    let batch_id = db::create_batch_job(&pool, "pro@example.com", &properties()).await.unwrap();
    let status = queue::process_batch(&pool, &generator, &batch_id, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(status, BatchStatus::Completed);

    let job = db::get_batch_job(&pool, "pro@example.com", &batch_id)
        .await
        .unwrap()
        .expect("batch");
    assert_eq!(job.total, 3);
    assert_eq!(job.completed, 3);
    let statuses: Vec<ItemStatus> = job.results.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![ItemStatus::Success, ItemStatus::Error, ItemStatus::Success]);
    assert!(job.results[1].error.is_some());
    assert!(job.results[0].result.is_some());
    assert_eq!(job.results[1].property, json!({"type": "House"}));

    // the failed item is refunded
    let balance = billing::get_balance(&pool, Some("pro@example.com")).await.unwrap();
    assert_eq!(balance, Some(8));
    assert_eq!(db::count_generation_jobs(&pool).await.unwrap(), 2);
}

#[actix_web::test]
async fn items_past_the_balance_fail_without_a_model_call() {
    let pool = support::init_test_db().await;
    db::create_user(&pool, "pro@example.com", "hash", 1).await.expect("user");
    let model = ScriptedModel::new(Script::Valid);
    let generator = support::generator(&pool, model.clone());

    let items = vec![
        json!({"property": {"address": "1 First Ave", "type": "Condo"}}),
        json!({"property": {"address": "2 Second Ave", "type": "Condo"}}),
    ];
    let batch_id = db::create_batch_job(&pool, "pro@example.com", &items).await.unwrap();
    queue::process_batch(&pool, &generator, &batch_id, Duration::ZERO)
        .await
        .unwrap();

    let job = db::get_batch_job(&pool, "pro@example.com", &batch_id)
        .await
        .unwrap()
        .expect("batch");
    assert_eq!(job.results[1].status, ItemStatus::Error);
    assert_eq!(job.results[1].error.as_deref(), Some("Not enough credits"));
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
}

#[actix_web::test]
async fn interrupted_batch_resumes_without_charging_twice() {
    let pool = support::init_test_db().await;
    db::create_user(&pool, "pro@example.com", "hash", 10).await.expect("user");
    let model = ScriptedModel::new(Script::Valid);
    let generator = support::generator(&pool, model.clone());

    let items = vec![
        json!({"property": {"address": "1 First Ave", "type": "Condo"}}),
        json!({"property": {"address": "2 Second Ave", "type": "Condo"}}),
        json!({"property": {"address": "3 Third Ave", "type": "Condo"}}),
    ];
    let batch_id = db::create_batch_job(&pool, "pro@example.com", &items).await.unwrap();

    // the worker dies while pausing after the first item
    let interrupted = tokio::time::timeout(
        Duration::from_millis(300),
        queue::process_batch(&pool, &generator, &batch_id, Duration::from_secs(5)),
    )
    .await;
    assert!(interrupted.is_err());

    let job = db::get_batch_job(&pool, "pro@example.com", &batch_id)
        .await
        .unwrap()
        .expect("batch");
    assert_eq!(job.status, BatchStatus::Processing);
    assert_eq!(job.results.len(), 1);
    assert_eq!(billing::get_balance(&pool, Some("pro@example.com")).await.unwrap(), Some(9));

    let status = queue::process_batch(&pool, &generator, &batch_id, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(status, BatchStatus::Completed);

    assert_eq!(billing::get_balance(&pool, Some("pro@example.com")).await.unwrap(), Some(7));
    assert_eq!(db::count_generation_jobs(&pool).await.unwrap(), 3);
    // two model calls per item, each item drafted once
    assert_eq!(model.calls.load(Ordering::SeqCst), 6);
}

#[actix_web::test]
async fn finished_batches_are_not_rerun() {
    let pool = support::init_test_db().await;
    db::create_user(&pool, "pro@example.com", "hash", 10).await.expect("user");
    let model = ScriptedModel::new(Script::Valid);
    let generator = support::generator(&pool, model.clone());

    let batch_id = db::create_batch_job(&pool, "pro@example.com", &properties()).await.unwrap();
    queue::process_batch(&pool, &generator, &batch_id, Duration::ZERO).await.unwrap();
    let calls = model.calls.load(Ordering::SeqCst);

    let status = queue::process_batch(&pool, &generator, &batch_id, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(status, BatchStatus::Completed);
    assert_eq!(model.calls.load(Ordering::SeqCst), calls);
}

#[actix_web::test]
async fn batch_endpoint_requires_pro_plan() {
    let pool = support::init_test_db().await;
    db::create_user(&pool, "basic@example.com", "hash", 10).await.expect("user");
    let state = support::build_state(pool, support::test_config(), ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/batch/process")
        .insert_header(support::bearer("basic@example.com"))
        .set_json(json!({ "properties": properties() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("Batch processing requires Pro plan"));
}

#[actix_web::test]
async fn batch_endpoint_reports_every_invalid_item() {
    let pool = support::init_test_db().await;
    db::create_user(&pool, "pro@example.com", "hash", 10).await.expect("user");
    db::set_plan(&pool, "pro@example.com", Plan::Pro).await.unwrap();
    let state = support::build_state(pool, support::test_config(), ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/batch/process")
        .insert_header(support::bearer("pro@example.com"))
        .set_json(json!({ "properties": [ {"property": {"address": "1 First Ave"}}, {"property": {}} ] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["errors"],
        json!([
            "Property 1: Property type is required",
            "Property 2: Address is required",
            "Property 2: Property type is required"
        ])
    );
}

#[actix_web::test]
async fn queued_batch_runs_in_the_background() {
    let pool = support::init_test_db().await;
    db::create_user(&pool, "pro@example.com", "hash", 10).await.expect("user");
    db::set_plan(&pool, "pro@example.com", Plan::Pro).await.unwrap();
    let state = support::build_state(pool, support::test_config(), ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    let items = vec![
        json!({"property": {"address": "1 First Ave", "type": "Condo"}}),
        json!({"property": {"address": "2 Second Ave", "type": "House"}}),
    ];
    let req = test::TestRequest::post()
        .uri("/batch/process")
        .insert_header(support::bearer("pro@example.com"))
        .set_json(json!({ "properties": items }))
        .to_request();
    let accepted: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(accepted["status"], json!("pending"));
    let batch_id = accepted["batchId"].as_str().expect("batch id").to_string();

    let mut job = Value::Null;
    for _ in 0..50 {
        let req = test::TestRequest::get()
            .uri(&format!("/batch/{batch_id}"))
            .insert_header(support::bearer("pro@example.com"))
            .to_request();
        job = test::call_and_read_body_json(&app, req).await;
        if job["status"] == json!("completed") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(job["status"], json!("completed"));
    assert_eq!(job["completed"], json!(2));
    assert_eq!(job["results"].as_array().map(Vec::len), Some(2));

    let req = test::TestRequest::get()
        .uri("/batch")
        .insert_header(support::bearer("pro@example.com"))
        .to_request();
    let listing: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listing["jobs"][0]["id"], json!(batch_id));
}
