//! Pipeline tests against a scripted upstream.

use super::*;
use crate::testing::{completion, test_config, Script, ScriptedUpstream, CARD_SVG};
use serde_json::json;
use std::time::Duration;

fn templates() -> PromptTemplates {
    PromptTemplates::embedded().unwrap()
}

#[tokio::test]
async fn returns_the_single_svg_fragment() {
    let reply = format!("这是你的卡片：\n\n{}\n\n希望你喜欢！", CARD_SVG);
    let upstream = ScriptedUpstream::replying(&reply);

    let result = generate_card(
        &templates(),
        &upstream,
        &test_config(),
        &CardPrompt::Word("内卷".into()),
    )
    .await
    .unwrap();

    assert_eq!(result.svg_content.as_deref(), Some(CARD_SVG));
    assert_eq!(result.full_response, reply);
}

#[tokio::test]
async fn embeds_the_word_in_the_user_message() {
    let upstream = ScriptedUpstream::replying(CARD_SVG);
    let config = test_config();

    generate_card(&templates(), &upstream, &config, &CardPrompt::Word("内卷".into()))
        .await
        .unwrap();

    let (seen_config, request) = upstream.last_request().unwrap();
    assert_eq!(seen_config, config);
    assert_eq!(request.messages[0].role, "system");
    assert!(request.messages[0].content.contains("汉语新解"));
    assert_eq!(request.messages[1].content, "(汉语新解 内卷)");
}

#[tokio::test]
async fn reply_without_svg_keeps_full_text() {
    let upstream = ScriptedUpstream::replying("我拒绝画图。");

    let result = generate_card(
        &templates(),
        &upstream,
        &test_config(),
        &CardPrompt::Word("躺平".into()),
    )
    .await
    .unwrap();

    assert_eq!(result.svg_content, None);
    assert_eq!(result.full_response, "我拒绝画图。");
}

#[tokio::test]
async fn shape_errors_are_reported() {
    let upstream = ScriptedUpstream::new(Script::Reply(json!({ "choices": [] })));
    let err = generate_card(
        &templates(),
        &upstream,
        &test_config(),
        &CardPrompt::Word("x".into()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, UpstreamError::ResponseStructure));

    let upstream = ScriptedUpstream::new(Script::Reply(json!({ "choices": [{ "message": {} }] })));
    let err = generate_card(
        &templates(),
        &upstream,
        &test_config(),
        &CardPrompt::Word("x".into()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, UpstreamError::MessageStructure));
}

#[tokio::test]
async fn upstream_failure_is_not_retried() {
    let upstream = ScriptedUpstream::new(Script::Fail);
    let result = generate_card(
        &templates(),
        &upstream,
        &test_config(),
        &CardPrompt::Word("x".into()),
    )
    .await;

    assert!(matches!(result, Err(UpstreamError::Status { status: 502, .. })));
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_upstream_times_out() {
    let upstream = ScriptedUpstream::new(Script::Hang);
    let mut config = test_config();
    config.request_timeout_seconds = 60;

    let templates = templates();
    let prompt = CardPrompt::Word("x".into());

    let task = generate_card(&templates, &upstream, &config, &prompt);
    let result = tokio::time::timeout(Duration::from_secs(120), task).await;

    assert!(matches!(result, Ok(Err(UpstreamError::Timeout))));
}

#[test]
fn completion_helper_round_trips_through_shape_check() {
    let reply = completion("hello");
    assert_eq!(assistant_content(&reply).unwrap(), "hello");
}
