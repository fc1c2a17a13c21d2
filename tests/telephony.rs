//! Telephony webhook integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use cosmetics_advisor::Stage;
use cosmetics_advisor::telephony::{CLOSING_LINE, NO_RESULTS_LINE, REPROMPT_LINE};
use tower::ServiceExt;

mod common;
use common::{
    PUBLIC_URL, REJECTED_NUMBER, body_text, form_post, mock_calls_api, mock_twilio, telephony_app,
    telephony_app_with,
};

const GREETING: &str = "Namaste! Welcome to Glow Beauty. Aap kis type ka product dekhna chahte ho? Example lipstick, cream, foundation.";

async fn post(app: &axum::Router, uri: &str, body: &str) -> (StatusCode, String) {
    let response = app.clone().oneshot(form_post(uri, body)).await.unwrap();
    let status = response.status();
    (status, body_text(response).await)
}

#[tokio::test]
async fn test_index_reports_running() {
    let (app, _) = telephony_app(3);
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Cosmetics Advisor AI ✅ Running");
}

#[tokio::test]
async fn test_voice_greets_and_gathers() {
    let (app, sessions) = telephony_app(3);
    let response = app
        .clone()
        .oneshot(form_post("/voice", "CallSid=CA1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/xml"
    );

    let xml = body_text(response).await;
    assert!(xml.contains(&format!(
        r#"<Gather input="speech" action="{PUBLIC_URL}/process" method="POST" timeout="5">"#
    )));
    assert!(xml.contains(r#"<Say voice="alice" language="en-IN">"#));
    assert!(xml.contains(GREETING));

    let conv = sessions.get("CA1").await.unwrap();
    assert_eq!(conv.stage, Stage::AwaitCategory);
}

#[tokio::test]
async fn test_full_call_reads_back_at_most_five() {
    let (app, sessions) = telephony_app(3);
    post(&app, "/voice", "CallSid=CA1").await;

    let (_, xml) = post(&app, "/process", "CallSid=CA1&SpeechResult=Lipstick.").await;
    assert!(xml.contains("Thik hai, aapko lipstick chahiye. Aapka budget kya hai? Low, Medium, ya Premium?"));
    assert!(xml.contains("<Gather"));

    let conv = sessions.get("CA1").await.unwrap();
    assert_eq!(conv.stage, Stage::AwaitBudget);
    assert_eq!(conv.category.as_deref(), Some("lipstick"));

    let (_, xml) = post(&app, "/process", "CallSid=CA1&SpeechResult=Medium").await;
    assert!(xml.contains("Aapke liye ye products mil gaye: Velvet Nude 500 rupees, "));
    assert_eq!(xml.matches(" rupees").count(), 5);
    assert!(!xml.contains("Sold Out Red"));
    assert!(!xml.contains("Matte Red"));
    assert!(!xml.contains("Gold Couture"));
    assert!(xml.contains(CLOSING_LINE));
    assert!(!xml.contains("<Gather"));
    assert!(xml.contains("<Hangup/>"));

    assert_eq!(sessions.get("CA1").await.unwrap().stage, Stage::Done);
}

#[tokio::test]
async fn test_no_matching_products_apologizes() {
    let (app, _) = telephony_app(3);
    post(&app, "/voice", "CallSid=CA2").await;
    post(&app, "/process", "CallSid=CA2&SpeechResult=foundation").await;

    let (_, xml) = post(&app, "/process", "CallSid=CA2&SpeechResult=medium").await;
    assert!(xml.contains(NO_RESULTS_LINE));
    assert!(!xml.contains("mil gaye"));
    assert!(xml.contains(CLOSING_LINE));
}

#[tokio::test]
async fn test_unrecognized_budget_lists_all_prices() {
    let (app, _) = telephony_app(3);
    post(&app, "/voice", "CallSid=CA3").await;
    post(&app, "/process", "CallSid=CA3&SpeechResult=cream").await;

    let (_, xml) = post(&app, "/process", "CallSid=CA3&SpeechResult=whatever").await;
    assert!(xml.contains("Day Cream 299 rupees"));
    assert!(xml.contains("Night Repair 1800 rupees"));
}

#[tokio::test]
async fn test_empty_speech_reprompts_category() {
    let (app, sessions) = telephony_app(3);
    post(&app, "/voice", "CallSid=CA4").await;

    let (status, xml) = post(&app, "/process", "CallSid=CA4&SpeechResult=").await;
    assert_eq!(status, StatusCode::OK);
    assert!(xml.contains(REPROMPT_LINE));
    assert!(xml.contains(GREETING));
    assert!(xml.contains("<Gather"));

    let conv = sessions.get("CA4").await.unwrap();
    assert_eq!(conv.stage, Stage::AwaitCategory);
    assert!(conv.category.is_none());

    let (_, xml) = post(&app, "/process", "CallSid=CA4&SpeechResult=cream").await;
    assert!(xml.contains("aapko cream chahiye"));
}

#[tokio::test]
async fn test_reprompt_limit_ends_call() {
    let (app, sessions) = telephony_app(1);
    post(&app, "/voice", "CallSid=CA5").await;

    let (_, xml) = post(&app, "/process", "CallSid=CA5").await;
    assert!(xml.contains("<Gather"));

    let (_, xml) = post(&app, "/process", "CallSid=CA5").await;
    assert!(!xml.contains("<Gather"));
    assert!(xml.contains(CLOSING_LINE));
    assert_eq!(sessions.get("CA5").await.unwrap().stage, Stage::Done);
}

#[tokio::test]
async fn test_calls_do_not_share_state() {
    let (app, sessions) = telephony_app(3);
    post(&app, "/voice", "CallSid=CA-A").await;
    post(&app, "/voice", "CallSid=CA-B").await;

    post(&app, "/process", "CallSid=CA-A&SpeechResult=lipstick").await;
    let (_, xml) = post(&app, "/process", "CallSid=CA-B&SpeechResult=cream").await;
    assert!(xml.contains("aapko cream chahiye"));

    let (_, xml) = post(&app, "/process", "CallSid=CA-A&SpeechResult=low").await;
    assert!(xml.contains("Matte Red 450 rupees"));
    assert!(!xml.contains("Day Cream"));

    assert_eq!(sessions.get("CA-B").await.unwrap().category.as_deref(), Some("cream"));
    assert_eq!(sessions.get("CA-B").await.unwrap().stage, Stage::AwaitBudget);
}

#[tokio::test]
async fn test_missing_call_sid_uses_shared_session() {
    let (app, sessions) = telephony_app(3);
    post(&app, "/voice", "").await;
    post(&app, "/process", "SpeechResult=cream").await;

    assert_eq!(
        sessions.get("default").await.unwrap().category.as_deref(),
        Some("cream")
    );
}

#[tokio::test]
async fn test_voice_restarts_conversation() {
    let (app, sessions) = telephony_app(3);
    post(&app, "/voice", "CallSid=CA6").await;
    post(&app, "/process", "CallSid=CA6&SpeechResult=lipstick").await;
    post(&app, "/voice", "CallSid=CA6").await;

    let conv = sessions.get("CA6").await.unwrap();
    assert_eq!(conv.stage, Stage::AwaitCategory);
    assert!(conv.category.is_none());
}

#[tokio::test]
async fn test_finished_call_gets_fallback() {
    let (app, _) = telephony_app(3);
    post(&app, "/voice", "CallSid=CA7").await;
    post(&app, "/process", "CallSid=CA7&SpeechResult=cream").await;
    post(&app, "/process", "CallSid=CA7&SpeechResult=low").await;

    let (_, xml) = post(&app, "/process", "CallSid=CA7&SpeechResult=hello").await;
    assert!(xml.contains("Sorry, kuch problem ho gayi. Call end kar raha hu."));
}

#[tokio::test]
async fn test_status_callback_evicts_finished_calls() {
    let (app, sessions) = telephony_app(3);
    post(&app, "/voice", "CallSid=CA8").await;

    let (status, _) = post(&app, "/status", "CallSid=CA8&CallStatus=in-progress").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(sessions.get("CA8").await.is_some());

    post(&app, "/status", "CallSid=CA8&CallStatus=completed").await;
    assert!(sessions.get("CA8").await.is_none());
}

#[tokio::test]
async fn test_reset_one_or_all() {
    let (app, sessions) = telephony_app(3);
    post(&app, "/voice", "CallSid=CA1").await;
    post(&app, "/voice", "CallSid=CA2").await;

    let (_, text) = post(&app, "/reset", "CallSid=CA1").await;
    assert_eq!(text, "Conversation reset ✅");
    assert!(sessions.get("CA1").await.is_none());
    assert!(sessions.get("CA2").await.is_some());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(sessions.is_empty().await);
}

#[tokio::test]
async fn test_make_call_without_credentials() {
    let (app, _) = telephony_app(3);
    let response = app
        .oneshot(Request::builder().uri("/make_call").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.starts_with("Error:"));
}

async fn get_text(app: &axum::Router, uri: &str) -> String {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_text(response).await
}

#[tokio::test]
async fn test_create_call_posts_form_with_basic_auth() {
    let (api_base, log) = mock_calls_api().await;
    let twilio = mock_twilio(&api_base);

    let sid = twilio
        .create_call("+919800000000", "https://advisor.test/voice", Some("https://advisor.test/status"))
        .await
        .unwrap();
    assert_eq!(sid, "CA0123456789");

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.account_sid, "AC-test");
    assert!(request.authorized);
    assert_eq!(request.form["To"], "+919800000000");
    assert_eq!(request.form["From"], "+15550001111");
    assert_eq!(request.form["Url"], "https://advisor.test/voice");
    assert_eq!(request.form["Method"], "POST");
    assert_eq!(request.form["StatusCallback"], "https://advisor.test/status");
}

#[tokio::test]
async fn test_create_call_surfaces_provider_error() {
    let (api_base, _) = mock_calls_api().await;
    let err = mock_twilio(&api_base)
        .create_call(REJECTED_NUMBER, "https://advisor.test/voice", None)
        .await
        .unwrap_err();

    assert!(matches!(err, cosmetics_advisor::Error::Telephony(_)));
    let message = err.to_string();
    assert!(message.contains("400"));
    assert!(message.contains("Invalid 'To' Phone Number (code 21211)"));
}

#[tokio::test]
async fn test_make_call_dials_configured_number() {
    let (api_base, log) = mock_calls_api().await;
    let (app, sessions) = telephony_app_with(3, Some(mock_twilio(&api_base)), Some("+919800000000"));

    let text = get_text(&app, "/make_call").await;
    assert_eq!(text, "Calling +919800000000... SID: CA0123456789");

    let conv = sessions.get("CA0123456789").await.unwrap();
    assert_eq!(conv.stage, Stage::AwaitCategory);

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests[0].form["Url"], format!("{PUBLIC_URL}/voice"));
    assert_eq!(requests[0].form["StatusCallback"], format!("{PUBLIC_URL}/status"));
}

#[tokio::test]
async fn test_make_call_query_overrides_callee() {
    let (api_base, log) = mock_calls_api().await;
    let (app, _) = telephony_app_with(3, Some(mock_twilio(&api_base)), Some("+919800000000"));

    let text = get_text(&app, "/make_call?to=%2B919811111111").await;
    assert_eq!(text, "Calling +919811111111... SID: CA0123456789");
    assert_eq!(log.lock().unwrap()[0].form["To"], "+919811111111");
}

#[tokio::test]
async fn test_make_call_reports_provider_error() {
    let (api_base, _) = mock_calls_api().await;
    let (app, sessions) = telephony_app_with(3, Some(mock_twilio(&api_base)), Some(REJECTED_NUMBER));

    let text = get_text(&app, "/make_call").await;
    assert!(text.starts_with("Error: "));
    assert!(text.contains("Invalid 'To' Phone Number"));
    assert!(sessions.is_empty().await);
}

#[tokio::test]
async fn test_make_call_without_callee() {
    let (api_base, log) = mock_calls_api().await;
    let (app, _) = telephony_app_with(3, Some(mock_twilio(&api_base)), None);

    let text = get_text(&app, "/make_call").await;
    assert_eq!(text, "Error: USER_PHONE_NUMBER is not configured");
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_and_ready() {
    let (app, _) = telephony_app(3);
    for uri in ["/health", "/ready"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}
