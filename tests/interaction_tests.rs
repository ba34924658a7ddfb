use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;

use rainbow_interactions::{
    config::Config,
    error::{AppError, WriteStage},
    models::interaction::{AddCommentRequest, AddReactionRequest},
    services::store::{EntityStore, Filter, MemoryStore},
    state::AppState,
};

fn test_state() -> (AppState, Arc<MemoryStore>, Arc<MemoryStore>) {
    rainbow_interactions::init_tracing("warn");
    let primary = Arc::new(MemoryStore::new());
    let secondary = Arc::new(MemoryStore::new());
    let config = Config::from_env().expect("test config");
    let state = AppState::with_stores(
        config,
        primary.clone() as Arc<dyn EntityStore>,
        secondary.clone() as Arc<dyn EntityStore>,
    );
    (state, primary, secondary)
}

async fn seed_post(store: &MemoryStore, post_id: &str) {
    store
        .insert(
            "post",
            json!({
                "post_id": post_id,
                "title": "Why the borrow checker is your friend",
                "content": "Long-form body",
                "author_id": "auth0|writer",
                "tags": ["rust"],
                "likes": [],
                "comments": [],
                "created_at": Utc::now(),
            }),
        )
        .await;
}

async fn seed_user(store: &MemoryStore, user_id: &str, display_name: Option<&str>) {
    store
        .insert(
            "user_profile",
            json!({
                "user_id": user_id,
                "display_name": display_name,
                "role": "Writer",
                "comments": [],
                "bookmarks": [],
                "created_at": Utc::now(),
                "updated_at": Utc::now(),
            }),
        )
        .await;
}

fn comment_request(post_id: &str, text: &str) -> AddCommentRequest {
    AddCommentRequest {
        post_id: post_id.to_string(),
        text: text.to_string(),
        display_name: None,
        created_at: None,
    }
}

fn reaction_request(post_id: &str, comment_id: &str, emoji: &str) -> AddReactionRequest {
    AddReactionRequest {
        post_id: post_id.to_string(),
        comment_id: comment_id.to_string(),
        emoji: emoji.to_string(),
    }
}

async fn fetch_post(store: &MemoryStore, post_id: &str) -> Value {
    store
        .fetch_one("post", &Filter::by("post_id", post_id))
        .await
        .unwrap()
        .expect("post exists")
}

async fn fetch_user(store: &MemoryStore, user_id: &str) -> Value {
    store
        .fetch_one("user_profile", &Filter::by("user_id", user_id))
        .await
        .unwrap()
        .expect("user exists")
}

#[tokio::test]
async fn toggle_like_flips_membership_and_never_duplicates() {
    let (state, primary, _) = test_state();
    seed_post(&primary, "p1").await;

    let first = state.relation_service.toggle_like("p1", "auth0|reader").await.unwrap();
    assert!(first.liked);
    assert_eq!(first.post.likes, vec!["auth0|reader".to_string()]);
    assert!(state.relation_service.is_liked("p1", "auth0|reader").await.unwrap());

    let second = state.relation_service.toggle_like("p1", "auth0|reader").await.unwrap();
    assert!(!second.liked);
    assert!(second.post.likes.is_empty());
    assert!(!state.relation_service.is_liked("p1", "auth0|reader").await.unwrap());

    // Any sequence of toggles leaves at most one occurrence.
    for _ in 0..5 {
        state.relation_service.toggle_like("p1", "auth0|reader").await.unwrap();
        let doc = fetch_post(&primary, "p1").await;
        let occurrences = doc["likes"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|v| v.as_str() == Some("auth0|reader"))
            .count();
        assert!(occurrences <= 1);
    }
}

#[tokio::test]
async fn toggle_like_on_missing_post_is_parent_not_found() {
    let (state, _, _) = test_state();
    let err = state.relation_service.toggle_like("missing", "auth0|reader").await.unwrap_err();
    assert!(matches!(err, AppError::ParentNotFound(_)));
}

#[tokio::test]
async fn comment_append_preserves_prior_comments() {
    let (state, primary, _) = test_state();
    seed_post(&primary, "p1").await;
    seed_user(&primary, "auth0|alice", Some("Alice")).await;
    seed_user(&primary, "auth0|bob", Some("Bob")).await;

    state
        .comment_service
        .add_comment("auth0|alice", comment_request("p1", "first"))
        .await
        .unwrap();
    state
        .comment_service
        .add_comment("auth0|alice", comment_request("p1", "second"))
        .await
        .unwrap();

    let before = fetch_post(&primary, "p1").await["comments"].clone();
    let created = state
        .comment_service
        .add_comment("auth0|bob", comment_request("p1", "third"))
        .await
        .unwrap();
    assert_eq!(created.comment_count, 3);
    assert_eq!(created.comment.username, "Bob");

    let after = fetch_post(&primary, "p1").await["comments"].clone();
    let after = after.as_array().unwrap();
    assert_eq!(after.len(), 3);
    assert_eq!(&after[..2], before.as_array().unwrap().as_slice());
    assert_eq!(after[2]["id"], json!(created.comment.id));
}

#[tokio::test]
async fn comment_mirror_applies_truncation_law() {
    let (state, primary, _) = test_state();
    seed_post(&primary, "p1").await;
    seed_user(&primary, "auth0|alice", Some("Alice")).await;

    let short = "short enough";
    let long = "x".repeat(45);
    state
        .comment_service
        .add_comment("auth0|alice", comment_request("p1", short))
        .await
        .unwrap();
    state
        .comment_service
        .add_comment("auth0|alice", comment_request("p1", &long))
        .await
        .unwrap();

    let user = fetch_user(&primary, "auth0|alice").await;
    let mirror = user["comments"].as_array().unwrap();
    assert_eq!(mirror.len(), 2);
    assert_eq!(mirror[0]["text"], json!(short));
    assert_eq!(mirror[1]["text"], json!(format!("{}...", "x".repeat(30))));
    assert_eq!(mirror[1]["post_id"], json!("p1"));
}

#[tokio::test]
async fn comment_falls_back_to_anonymous_and_honors_override() {
    let (state, primary, _) = test_state();
    seed_post(&primary, "p1").await;
    seed_user(&primary, "auth0|ghost", None).await;

    let created = state
        .comment_service
        .add_comment("auth0|ghost", comment_request("p1", "who am I"))
        .await
        .unwrap();
    assert_eq!(created.comment.username, "Anonymous");

    let mut request = comment_request("p1", "now with a name");
    request.display_name = Some("Casper".to_string());
    let created = state
        .comment_service
        .add_comment("auth0|ghost", request)
        .await
        .unwrap();
    assert_eq!(created.comment.username, "Casper");
}

#[tokio::test]
async fn comment_preconditions_short_circuit_without_side_effects() {
    let (state, primary, _) = test_state();
    seed_post(&primary, "p1").await;
    seed_user(&primary, "auth0|alice", Some("Alice")).await;

    // Whitespace-only text is a validation error.
    let err = state
        .comment_service
        .add_comment("auth0|alice", comment_request("p1", "   "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Empty text fails the request-level validator.
    let err = state
        .comment_service
        .add_comment("auth0|alice", comment_request("p1", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidatorError(_)));

    // Unknown actor resolves before the post.
    let err = state
        .comment_service
        .add_comment("auth0|nobody", comment_request("missing", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ActorNotFound(_)));

    // Unknown post leaves the actor's mirror untouched.
    let before = fetch_user(&primary, "auth0|alice").await["comments"]
        .as_array()
        .unwrap()
        .len();
    let err = state
        .comment_service
        .add_comment("auth0|alice", comment_request("missing", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ParentNotFound(_)));
    let after = fetch_user(&primary, "auth0|alice").await["comments"]
        .as_array()
        .unwrap()
        .len();
    assert_eq!(before, after);

    let post = fetch_post(&primary, "p1").await;
    assert_eq!(post["comments"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn mirror_write_failure_surfaces_as_partial_write_and_repairs() {
    let (state, primary, _) = test_state();
    seed_post(&primary, "p1").await;
    seed_user(&primary, "auth0|alice", Some("Alice")).await;

    primary.inject_update_failure("user_profile").await;
    let err = state
        .comment_service
        .add_comment("auth0|alice", comment_request("p1", "lost mirror entry"))
        .await
        .unwrap_err();
    match err {
        AppError::PartialWrite { completed, failed, .. } => {
            assert_eq!(completed, vec![WriteStage::PostComments]);
            assert_eq!(failed, WriteStage::UserMirror);
        }
        other => panic!("expected PartialWrite, got {:?}", other),
    }

    // The post write stuck, the mirror drifted.
    let post = fetch_post(&primary, "p1").await;
    assert_eq!(post["comments"].as_array().unwrap().len(), 1);
    let user = fetch_user(&primary, "auth0|alice").await;
    assert_eq!(user["comments"].as_array().unwrap().len(), 0);

    // Read-repair rebuilds the mirror from the post document.
    let repaired = state
        .comment_service
        .repair_comment_mirror("auth0|alice", "p1")
        .await
        .unwrap();
    assert_eq!(repaired, 1);
    let user = fetch_user(&primary, "auth0|alice").await;
    let mirror = user["comments"].as_array().unwrap();
    assert_eq!(mirror.len(), 1);
    assert_eq!(mirror[0]["text"], json!("lost mirror entry"));
}

#[tokio::test]
async fn reaction_counts_are_monotonic_and_isolated_per_emoji() {
    let (state, primary, _) = test_state();
    seed_post(&primary, "p1").await;
    seed_user(&primary, "auth0|alice", Some("Alice")).await;

    let created = state
        .comment_service
        .add_comment("auth0|alice", comment_request("p1", "react to me"))
        .await
        .unwrap();
    let comment_id = created.comment.id;

    for _ in 0..3 {
        state
            .reaction_service
            .add_reaction("auth0|bob", reaction_request("p1", &comment_id, "👍"))
            .await
            .unwrap();
    }
    let post = state
        .reaction_service
        .add_reaction("auth0|bob", reaction_request("p1", &comment_id, "🔥"))
        .await
        .unwrap();

    let comment = post.comment_by_id(&comment_id).unwrap();
    assert_eq!(comment.reactions.get("👍"), Some(&3));
    assert_eq!(comment.reactions.get("🔥"), Some(&1));
}

#[tokio::test]
async fn reaction_failures_are_typed() {
    let (state, primary, _) = test_state();
    seed_post(&primary, "p1").await;

    let err = state
        .reaction_service
        .add_reaction("auth0|bob", reaction_request("missing", "c1", "👍"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ParentNotFound(_)));

    let err = state
        .reaction_service
        .add_reaction("auth0|bob", reaction_request("p1", "no-such-comment", "👍"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CommentNotFound(_)));

    let err = state
        .reaction_service
        .add_reaction("auth0|bob", reaction_request("p1", "c1", "not a key"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn concurrent_reactions_on_different_emoji_both_land() {
    let (state, primary, _) = test_state();
    seed_post(&primary, "p1").await;
    seed_user(&primary, "auth0|alice", Some("Alice")).await;

    let created = state
        .comment_service
        .add_comment("auth0|alice", comment_request("p1", "race me"))
        .await
        .unwrap();
    let comment_id = created.comment.id;

    let reactions = state.reaction_service.clone();
    let a = {
        let reactions = reactions.clone();
        let comment_id = comment_id.clone();
        tokio::spawn(async move {
            reactions
                .add_reaction("auth0|bob", reaction_request("p1", &comment_id, "👍"))
                .await
        })
    };
    let b = {
        let comment_id = comment_id.clone();
        tokio::spawn(async move {
            reactions
                .add_reaction("auth0|carol", reaction_request("p1", &comment_id, "🎉"))
                .await
        })
    };
    for handle in join_all([a, b]).await {
        handle.unwrap().unwrap();
    }

    let post = fetch_post(&primary, "p1").await;
    let comment = post["comments"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == json!(comment_id.clone()))
        .unwrap();
    assert_eq!(comment["reactions"]["👍"], json!(1));
    assert_eq!(comment["reactions"]["🎉"], json!(1));
}

// A comment append racing with a reaction must not corrupt an unrelated
// comment's counters: the increment is keyed by comment id, not by the
// position read before the write.
#[tokio::test]
async fn reaction_racing_with_append_stays_on_its_comment() {
    let (state, primary, _) = test_state();
    seed_post(&primary, "p1").await;
    seed_user(&primary, "auth0|alice", Some("Alice")).await;
    seed_user(&primary, "auth0|bob", Some("Bob")).await;

    let first = state
        .comment_service
        .add_comment("auth0|alice", comment_request("p1", "earlier comment"))
        .await
        .unwrap();
    let target_id = first.comment.id;

    let comments = state.comment_service.clone();
    let reactions = state.reaction_service.clone();
    let append = tokio::spawn(async move {
        comments
            .add_comment("auth0|bob", comment_request("p1", "concurrent append"))
            .await
    });
    let react = {
        let target_id = target_id.clone();
        tokio::spawn(async move {
            reactions
                .add_reaction("auth0|carol", reaction_request("p1", &target_id, "👍"))
                .await
        })
    };
    append.await.unwrap().unwrap();
    react.await.unwrap().unwrap();

    let post = fetch_post(&primary, "p1").await;
    let comments = post["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    for comment in comments {
        if comment["id"] == json!(target_id.clone()) {
            assert_eq!(comment["reactions"]["👍"], json!(1));
        } else {
            assert_eq!(comment["reactions"], json!({}));
        }
    }
}

#[tokio::test]
async fn bookmark_toggle_keeps_secondary_cache_in_step() {
    let (state, primary, secondary) = test_state();
    seed_post(&primary, "p1").await;
    seed_user(&primary, "auth0|alice", Some("Alice")).await;

    let outcome = state.bookmark_service.toggle("p1", "auth0|alice").await.unwrap();
    assert!(outcome.bookmarked);
    assert!(state.bookmark_service.is_bookmarked("p1", "auth0|alice").await.unwrap());

    let cache = secondary
        .fetch_one("bookmark_profile", &Filter::by("user_id", "auth0|alice"))
        .await
        .unwrap()
        .expect("cache row created on first toggle");
    assert_eq!(cache["bookmarks"], json!(["p1"]));

    let outcome = state.bookmark_service.toggle("p1", "auth0|alice").await.unwrap();
    assert!(!outcome.bookmarked);
    let cache = secondary
        .fetch_one("bookmark_profile", &Filter::by("user_id", "auth0|alice"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cache["bookmarks"], json!([]));
}

#[tokio::test]
async fn bookmark_preconditions_are_typed() {
    let (state, primary, _) = test_state();
    seed_post(&primary, "p1").await;

    let err = state.bookmark_service.toggle("missing", "auth0|alice").await.unwrap_err();
    assert!(matches!(err, AppError::ParentNotFound(_)));

    // Bookmarking never provisions a profile.
    let err = state.bookmark_service.toggle("p1", "auth0|alice").await.unwrap_err();
    assert!(matches!(err, AppError::ActorNotFound(_)));
}

#[tokio::test]
async fn bookmark_secondary_failure_is_a_partial_write() {
    let (state, primary, secondary) = test_state();
    seed_post(&primary, "p1").await;
    seed_user(&primary, "auth0|alice", Some("Alice")).await;

    secondary.inject_update_failure("bookmark_profile").await;
    let err = state.bookmark_service.toggle("p1", "auth0|alice").await.unwrap_err();
    match err {
        AppError::PartialWrite { completed, failed, .. } => {
            assert_eq!(completed, vec![WriteStage::PrimaryBookmarks]);
            assert_eq!(failed, WriteStage::SecondaryBookmarks);
        }
        other => panic!("expected PartialWrite, got {:?}", other),
    }

    // The authoritative set did toggle; only the cache is stale.
    assert!(state.bookmark_service.is_bookmarked("p1", "auth0|alice").await.unwrap());
}

#[tokio::test]
async fn ensure_user_provisions_once_with_defaults() {
    let (state, _, _) = test_state();

    let created = state
        .user_service
        .ensure_user("auth0|new", Some("Newcomer"))
        .await
        .unwrap();
    assert_eq!(created.role, "Reader");
    assert_eq!(created.display_name.as_deref(), Some("Newcomer"));
    assert!(created.comments.is_empty());
    assert!(created.bookmarks.is_empty());

    // A second ensure must not reset the existing profile.
    let again = state
        .user_service
        .ensure_user("auth0|new", Some("Other Name"))
        .await
        .unwrap();
    assert_eq!(again.display_name.as_deref(), Some("Newcomer"));
    assert_eq!(again.id, created.id);
}

#[tokio::test]
async fn feature_flags_default_on() {
    let (state, _, _) = test_state();
    assert!(state.is_feature_enabled("comments"));
    assert!(state.is_feature_enabled("reactions"));
    assert!(!state.is_feature_enabled("payments"));
}
