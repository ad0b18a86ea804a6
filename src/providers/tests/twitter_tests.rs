// src/providers/tests/twitter_tests.rs

use super::super::twitter::{FeedError, LegacySearchResponse, SearchResponse, Twitter};
use reqwest::StatusCode;

#[test]
fn test_mentions_from_search_joins_author_handles() {
    let payload: SearchResponse = serde_json::from_str(
        r#"{
            "data": [
                {"id": "103", "text": "@launchbot create GammaCoin GAMMA", "author_id": "9", "created_at": "2024-04-01T10:00:00.000Z"},
                {"id": "102", "text": "@launchbot gm", "author_id": "77"}
            ],
            "includes": {"users": [{"id": "9", "username": "degen_dave"}]}
        }"#,
    )
    .unwrap();

    let mentions = Twitter::mentions_from_search(payload);
    assert_eq!(mentions.len(), 2);
    assert_eq!(mentions[0].id, "103");
    assert_eq!(mentions[0].author_id, "9");
    assert_eq!(mentions[0].author_handle, "degen_dave");
    assert_eq!(mentions[0].created_at.as_deref(), Some("2024-04-01T10:00:00.000Z"));
    assert_eq!(
        mentions[1].author_handle, "unknown",
        "Author without a user expansion should get a placeholder handle"
    );
}

#[test]
fn test_mentions_from_search_handles_empty_payload() {
    // The v2 search omits "data" entirely when there are no results.
    let payload: SearchResponse = serde_json::from_str("{}").unwrap();
    assert!(Twitter::mentions_from_search(payload).is_empty());
}

#[test]
fn test_mentions_from_legacy_filters_own_tweets() {
    let payload: LegacySearchResponse = serde_json::from_str(
        r#"{
            "statuses": [
                {"id_str": "55", "full_text": "@launchbot create FooCoin FOO", "created_at": "Mon Apr 01 10:00:00 +0000 2024", "user": {"id_str": "9", "screen_name": "degen_dave"}},
                {"id_str": "54", "text": "Successfully created FooCoin", "user": {"id_str": "1", "screen_name": "LaunchBot"}}
            ]
        }"#,
    )
    .unwrap();

    let mentions = Twitter::mentions_from_legacy(payload, "launchbot");
    assert_eq!(mentions.len(), 1, "The bot's own tweets should be dropped");
    assert_eq!(mentions[0].id, "55");
    assert_eq!(mentions[0].text, "@launchbot create FooCoin FOO");
    assert_eq!(mentions[0].author_handle, "degen_dave");
}

#[test]
fn test_mentions_from_legacy_prefers_full_text() {
    let payload: LegacySearchResponse = serde_json::from_str(
        r#"{"statuses": [{"id_str": "56", "full_text": "the long form", "text": "the long...", "user": {"id_str": "9", "screen_name": "degen_dave"}}]}"#,
    )
    .unwrap();

    let mentions = Twitter::mentions_from_legacy(payload, "launchbot");
    assert_eq!(mentions[0].text, "the long form");
}

#[test]
fn test_feed_error_classification() {
    assert!(matches!(
        FeedError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
        FeedError::RateLimited
    ));
    assert!(matches!(
        FeedError::from_status(StatusCode::FORBIDDEN, String::new()),
        FeedError::Unavailable(_)
    ));
    assert!(matches!(
        FeedError::from_status(StatusCode::GONE, String::new()),
        FeedError::Unavailable(_)
    ));
    assert!(matches!(
        FeedError::from_status(StatusCode::INTERNAL_SERVER_ERROR, String::new()),
        FeedError::Api { .. }
    ));
}
