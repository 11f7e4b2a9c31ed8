use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};

use listing_agent::api::auth::SESSION_COOKIE;
use listing_agent::config::Config;
use listing_agent::db;
use listing_agent::models::Plan;

#[macro_use]
mod support;

use support::{Script, ScriptedModel};

#[actix_web::test]
async fn signup_login_and_session_cookie() {
    let pool = support::init_test_db().await;
    let state = support::build_state(pool.clone(), support::test_config(), ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/signup")
        .set_json(json!({"email": "  New.Agent@Example.com ", "password": "hunter22"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.into_owned())
        .expect("session cookie");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["email"], json!("new.agent@example.com"));

    let req = test::TestRequest::get().uri("/me").cookie(cookie).to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["email"], json!("new.agent@example.com"));
    assert_eq!(me["credits"], json!(5));
    assert_eq!(me["subscription"]["plan"], json!("basic"));

    let req = test::TestRequest::post()
        .uri("/auth/signup")
        .set_json(json!({"email": "new.agent@example.com", "password": "other"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("User already exists"));

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"email": "NEW.AGENT@example.com", "password": "wrong"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"email": "NEW.AGENT@example.com", "password": "hunter22"}))
        .to_request();
    let login: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(login["ok"], json!(true));
    let token = login["token"].as_str().expect("token").to_string();

    let req = test::TestRequest::get()
        .uri("/credits")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let credits: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(credits["credits"], json!(5));

    let user = db::find_user(&pool, "new.agent@example.com").await.unwrap().expect("user");
    assert!(user.last_login_at.is_some());
}

#[actix_web::test]
async fn signup_requires_both_fields() {
    let pool = support::init_test_db().await;
    let state = support::build_state(pool, support::test_config(), ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/signup")
        .set_json(json!({"email": "agent@example.com"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("Email and password required"));
}

#[actix_web::test]
async fn logout_clears_the_cookie_and_guests_get_null_credits() {
    let pool = support::init_test_db().await;
    let state = support::build_state(pool, support::test_config(), ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    let req = test::TestRequest::post().uri("/auth/logout").to_request();
    let resp = test::call_service(&app, req).await;
    let cleared = resp
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .expect("removal cookie");
    assert_eq!(cleared.value(), "");

    let req = test::TestRequest::get()
        .uri("/credits")
        .insert_header(("Authorization", "Bearer not-a-token"))
        .to_request();
    let credits: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(credits["credits"], Value::Null);
}

#[actix_web::test]
async fn only_one_brand_preset_is_default() {
    let pool = support::init_test_db().await;
    db::set_plan(&pool, "pro@example.com", Plan::Pro).await.unwrap();
    let state = support::build_state(pool, support::test_config(), ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    for name in ["Luxury", "Family"] {
        let req = test::TestRequest::post()
            .uri("/brands")
            .insert_header(support::bearer("pro@example.com"))
            .set_json(json!({"name": name, "voice": "warm", "keywords": "views, light", "is_default": true}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get()
        .uri("/brands")
        .insert_header(support::bearer("pro@example.com"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let presets = body["presets"].as_array().expect("presets");
    assert_eq!(presets.len(), 2);
    let defaults: Vec<&str> = presets
        .iter()
        .filter(|p| p["is_default"] == json!(true))
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(defaults, vec!["Family"]);
    assert_eq!(presets[0]["keywords"], json!(["views", "light"]));

    let req = test::TestRequest::get()
        .uri("/brand")
        .insert_header(support::bearer("pro@example.com"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["preset"]["name"], json!("Family"));
}

#[actix_web::test]
async fn basic_plan_brand_quota_and_delete() {
    let pool = support::init_test_db().await;
    let state = support::build_state(pool, support::test_config(), ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/brands")
        .insert_header(support::bearer("basic@example.com"))
        .set_json(json!({"name": "Mine"}))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_str().expect("id").to_string();
    assert!(id.starts_with("brand_"));

    let req = test::TestRequest::post()
        .uri("/brands")
        .insert_header(support::bearer("basic@example.com"))
        .set_json(json!({"name": "Second"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("Plan limited to 1 brand presets. Upgrade to create more."));

    // updates are not counted against the quota
    let req = test::TestRequest::post()
        .uri("/brands")
        .insert_header(support::bearer("basic@example.com"))
        .set_json(json!({"id": id, "name": "Renamed"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&format!("/brands/{id}"))
        .insert_header(support::bearer("someone.else@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri(&format!("/brands/{id}"))
        .insert_header(support::bearer("basic@example.com"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], json!(true));
}

#[actix_web::test]
async fn templates_are_shared_and_limited() {
    let pool = support::init_test_db().await;
    let state = support::build_state(pool, support::test_config(), ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/templates")
        .insert_header(support::bearer("owner@example.com"))
        .set_json(json!({"name": "Beach condo", "template_data": {"style": {"voice": "breezy"}}, "is_shared": true}))
        .to_request();
    let saved: Value = test::call_and_read_body_json(&app, req).await;
    assert!(saved["template"]["id"].as_str().is_some_and(|id| id.starts_with("template_")));

    let req = test::TestRequest::get()
        .uri("/templates")
        .insert_header(support::bearer("other@example.com"))
        .to_request();
    let listing: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listing["templates"][0]["name"], json!("Beach condo"));

    let req = test::TestRequest::post()
        .uri("/templates")
        .insert_header(support::bearer("owner@example.com"))
        .set_json(json!({"name": "Broken", "template_data": [1, 2]}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    for n in 2..=5 {
        let req = test::TestRequest::post()
            .uri("/templates")
            .insert_header(support::bearer("owner@example.com"))
            .set_json(json!({"name": format!("Template {n}")}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }
    let req = test::TestRequest::post()
        .uri("/templates")
        .insert_header(support::bearer("owner@example.com"))
        .set_json(json!({"name": "Template 6"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn upgrade_unlocks_analytics() {
    let pool = support::init_test_db().await;
    let state = support::build_state(pool, support::test_config(), ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/analytics")
        .insert_header(support::bearer("agent@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/subscription/upgrade")
        .insert_header(support::bearer("agent@example.com"))
        .set_json(json!({"plan": "platinum"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/subscription/upgrade")
        .insert_header(support::bearer("agent@example.com"))
        .set_json(json!({"plan": "pro"}))
        .to_request();
    let upgraded: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(upgraded["subscription"]["plan"], json!("pro"));
    assert_eq!(upgraded["subscription"]["max_brands"], json!(5));

    let req = test::TestRequest::get()
        .uri("/analytics")
        .insert_header(support::bearer("agent@example.com"))
        .to_request();
    let report: Value = test::call_and_read_body_json(&app, req).await;
    assert!(report["generationHistory"].is_array());
    assert_eq!(report["feedbackStats"]["total_feedback"], json!(0));
}

#[actix_web::test]
async fn feedback_needs_an_owned_job_and_valid_rating() {
    let pool = support::init_test_db().await;
    let state = support::build_state(pool, support::test_config(), ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/generate")
        .insert_header(support::bearer("agent@example.com"))
        .set_json(json!({"property": {"address": "12 Elm St"}}))
        .to_request();
    let generated: Value = test::call_and_read_body_json(&app, req).await;
    let job_id = generated["jobId"].as_str().expect("job id").to_string();

    let req = test::TestRequest::post()
        .uri("/feedback")
        .insert_header(support::bearer("agent@example.com"))
        .set_json(json!({"jobId": job_id, "rating": 9}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/feedback")
        .insert_header(support::bearer("intruder@example.com"))
        .set_json(json!({"jobId": job_id, "rating": 5}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/feedback")
        .insert_header(support::bearer("agent@example.com"))
        .set_json(json!({"jobId": job_id, "rating": 5, "feedback": "Great bullets"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["ok"], json!(true));
}

#[actix_web::test]
async fn admin_analytics_is_restricted_to_the_admin() {
    let pool = support::init_test_db().await;
    let config = Config {
        admin_email: Some("Boss@Example.com".to_string()),
        ..support::test_config()
    };
    let state = support::build_state(pool, config, ScriptedModel::new(Script::Valid));
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/admin/analytics")
        .insert_header(support::bearer("agent@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/admin/analytics?timeframe=7d")
        .insert_header(support::bearer("boss@example.com"))
        .to_request();
    let report: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(report["timeframe"], json!("7 days"));
    assert!(report["topUsers"].is_array());

    let req = test::TestRequest::get()
        .uri("/admin/analytics?timeframe=9223372036854775807d")
        .insert_header(support::bearer("boss@example.com"))
        .to_request();
    let report: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(report["timeframe"], json!("30 days"));
}
