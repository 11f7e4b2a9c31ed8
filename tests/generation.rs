use std::sync::atomic::Ordering;

use serde_json::json;

use listing_agent::db;
use listing_agent::generation::{GenerationError, GenerationRequest};
use listing_agent::models::SavePropertyTemplate;

mod support;

use support::{Script, ScriptedModel};

fn request(body: serde_json::Value) -> GenerationRequest {
    serde_json::from_value(body).expect("request")
}

#[actix_web::test]
async fn valid_draft_is_reviewed_and_stored() {
    let pool = support::init_test_db().await;
    let model = ScriptedModel::new(Script::Valid);
    let generator = support::generator(&pool, model.clone());

    let outcome = generator
        .generate(None, request(json!({"property": {"address": "12 Elm St", "type": "House"}})))
        .await
        .expect("generate");

    assert_eq!(outcome.primary.copy.bullets.len(), 3);
    assert_eq!(outcome.primary.flags.len(), 1);
    assert_eq!(outcome.primary.flags[0].kind.as_deref(), Some("fair_housing"));
    assert_eq!(outcome.variations.len(), 1);
    assert_eq!(outcome.tokens.prompt, 20);
    assert_eq!(outcome.tokens.completion, 40);
    assert_eq!(outcome.model, "scripted-model");
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    assert_eq!(db::count_generation_jobs(&pool).await.unwrap(), 1);
}

#[actix_web::test]
async fn broken_draft_stores_nothing() {
    let pool = support::init_test_db().await;
    let model = ScriptedModel::new(Script::BrokenDraft);
    let generator = support::generator(&pool, model.clone());

    let err = generator
        .generate(None, request(json!({"property": {"address": "12 Elm St"}})))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::InvalidOutput(_)));
    // no review pass after a rejected draft
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(db::count_generation_jobs(&pool).await.unwrap(), 0);
}

#[actix_web::test]
async fn slow_model_times_out_without_a_job() {
    let pool = support::init_test_db().await;
    let model = ScriptedModel::new(Script::Hang);
    let generator = support::impatient_generator(&pool, model.clone());

    let err = generator
        .generate(None, request(json!({"property": {"address": "12 Elm St"}})))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Timeout(_)));
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(db::count_generation_jobs(&pool).await.unwrap(), 0);
}

#[actix_web::test]
async fn missing_address_never_reaches_the_model() {
    let pool = support::init_test_db().await;
    let model = ScriptedModel::new(Script::Valid);
    let generator = support::generator(&pool, model.clone());

    let err = generator
        .generate(None, request(json!({"property": {"address": "   ", "beds": 3}})))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::InvalidRequest(_)));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn variations_share_one_job_row() {
    let pool = support::init_test_db().await;
    let model = ScriptedModel::new(Script::Valid);
    let generator = support::generator(&pool, model.clone());

    let outcome = generator
        .generate(
            Some("agent@example.com"),
            request(json!({"property": {"address": "12 Elm St"}, "variations": 3})),
        )
        .await
        .expect("generate");

    let numbers: Vec<u32> = outcome.variations.iter().map(|v| v.variation).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(model.calls.load(Ordering::SeqCst), 6);
    assert_eq!(db::count_generation_jobs(&pool).await.unwrap(), 1);
    assert!(db::job_owned_by(&pool, &outcome.job_id, "agent@example.com").await.unwrap());
}

#[actix_web::test]
async fn template_fills_missing_fields_and_counts_usage() {
    let pool = support::init_test_db().await;
    let template = db::save_template(
        &pool,
        "agent@example.com",
        &SavePropertyTemplate {
            id: None,
            name: "Condo defaults".to_string(),
            property_type: Some("Condo".to_string()),
            description: None,
            template_data: json!({"property": {"type": "Condo", "parking": "Garage"}}),
            is_shared: false,
        },
    )
    .await
    .unwrap()
    .expect("template");

    let generator = support::generator(&pool, ScriptedModel::new(Script::Valid));
    generator
        .generate(
            Some("agent@example.com"),
            request(json!({
                "property": {"address": "9 Bay Rd", "type": "Loft"},
                "template_id": template.id,
            })),
        )
        .await
        .expect("generate");

    let stored = db::find_usable_template(&pool, "agent@example.com", &template.id)
        .await
        .unwrap()
        .expect("template");
    assert_eq!(stored.usage_count, 1);

    let jobs = db::recent_jobs(&pool, "agent@example.com", 5).await.unwrap();
    assert_eq!(jobs.len(), 1);
}
