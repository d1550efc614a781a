use tasktree_sync::{InvalidationReason, Session, SyncError};
use tasktree_types::ValidationError;

// ── Session ─────────────────────────────────────────────────────

#[test]
fn logged_in_session_is_active() {
    let session = Session::logged_in("tok");
    assert!(session.is_active());
    assert!(session.is_logged_in());
    assert_eq!(session.token(), Some("tok"));
}

#[test]
fn session_needs_both_flag_and_token() {
    assert!(!Session::logged_out().is_active());
    assert!(!Session::new(Some("tok".into()), false).is_active());
    assert!(!Session::new(None, true).is_active());
    assert!(!Session::new(Some(String::new()), true).is_active());
}

#[test]
fn clear_drops_token_and_flag() {
    let mut session = Session::logged_in("tok");
    session.clear();
    assert_eq!(session.token(), None);
    assert!(!session.is_logged_in());
    assert_eq!(session, Session::logged_out());
}

#[test]
fn debug_redacts_token() {
    let debug = format!("{:?}", Session::logged_in("ya29.secret"));
    assert!(!debug.contains("ya29.secret"));
    assert!(debug.contains("redacted"));
}

// ── SyncError ───────────────────────────────────────────────────

#[test]
fn error_classification() {
    assert!(SyncError::Auth("401".into()).is_auth());
    assert!(!SyncError::Auth("401".into()).is_transient());
    assert!(SyncError::Transport("reset".into()).is_transient());
    assert!(SyncError::Timeout.is_transient());
    assert!(!SyncError::Timeout.is_auth());
    assert!(!SyncError::Superseded.is_transient());
    assert!(!SyncError::Superseded.is_auth());
}

#[test]
fn error_display() {
    assert_eq!(
        SyncError::Auth("401".into()).to_string(),
        "authentication error: 401"
    );
    assert_eq!(SyncError::Timeout.to_string(), "operation timed out");
    assert_eq!(
        SyncError::from(ValidationError::MissingTrash).to_string(),
        format!("validation error: {}", ValidationError::MissingTrash)
    );
}

#[test]
fn error_from_serde_json() {
    let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let sync_err: SyncError = err.into();
    assert!(matches!(sync_err, SyncError::Serialization(_)));
}

#[tokio::test(start_paused = true)]
async fn error_from_elapsed_is_timeout() {
    let elapsed = tokio::time::timeout(
        std::time::Duration::from_millis(1),
        std::future::pending::<()>(),
    )
    .await
    .unwrap_err();
    assert!(matches!(SyncError::from(elapsed), SyncError::Timeout));
}

// ── InvalidationReason ──────────────────────────────────────────

#[test]
fn invalidation_messages_ask_to_log_in() {
    for reason in [
        InvalidationReason::AuthRejected("401".into()),
        InvalidationReason::RemoteMissing,
        InvalidationReason::WriteFailed("503".into()),
    ] {
        let message = reason.to_string();
        assert!(message.starts_with("Logged out"), "{message}");
        assert!(message.contains("log in again"), "{message}");
    }
}
