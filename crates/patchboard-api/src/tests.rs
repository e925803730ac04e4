use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::{Extension, Json, State};
use axum::http::StatusCode;

use patchboard_db::Database;
use patchboard_gateway::rooms::Rooms;
use patchboard_mailer::{MailerError, Notifier};
use patchboard_types::api::{
    LoginRequest, RegisterRequest, ResendOtpRequest, UpdateBoardRequest, VerifyEmailRequest,
};
use patchboard_types::events::GatewayEvent;
use patchboard_types::models::{Patch, PublicUser};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, AppStateInner, auth, canvas};

/// Records every send; can be flipped into a failing transport.
struct FakeNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl FakeNotifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
    }
}

#[async_trait::async_trait]
impl Notifier for FakeNotifier {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailerError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(MailerError::SendFailed("transport down".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), code.to_string()));
        Ok(())
    }
}

fn test_state(mailer: Arc<FakeNotifier>) -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        rooms: Rooms::new(),
        mailer,
        jwt_secret: "test-secret".to_string(),
        otp_ttl_minutes: 10,
    })
}

fn register_req(email: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Alice".to_string(),
        email: email.to_string(),
        password: "hunter22".to_string(),
    }
}

async fn register_alice(state: &AppState) {
    auth::register(State(state.clone()), Json(register_req("alice@example.com")))
        .await
        .unwrap();
}

/// Registers and verifies alice, returning her public projection.
async fn verified_alice(state: &AppState, mailer: &FakeNotifier) -> PublicUser {
    register_alice(state).await;
    let otp = mailer.last_code().unwrap();
    let resp = auth::verify_email(
        State(state.clone()),
        Json(VerifyEmailRequest {
            email: "alice@example.com".to_string(),
            otp,
        }),
    )
    .await
    .unwrap();
    resp.0.user
}

// -- Registration --

#[tokio::test]
async fn register_creates_unverified_user_and_sends_otp() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());

    let (status, Json(resp)) =
        auth::register(State(state.clone()), Json(register_req("Alice@Example.com")))
            .await
            .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert!(resp.success);
    assert!(!resp.user.is_verified);
    // Email is stored case-normalized
    assert_eq!(resp.user.email, "alice@example.com");
    assert_eq!(mailer.sent_count(), 1);

    // The payload never leaks the password or the OTP
    let json = serde_json::to_string(&resp).unwrap();
    assert!(!json.contains("hunter22"));
    assert!(!json.contains(&mailer.last_code().unwrap()));
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());
    register_alice(&state).await;

    let err = auth::register(State(state.clone()), Json(register_req("alice@example.com")))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::EmailTaken));

    // Also after verification
    let otp = mailer.last_code().unwrap();
    auth::verify_email(
        State(state.clone()),
        Json(VerifyEmailRequest {
            email: "alice@example.com".to_string(),
            otp,
        }),
    )
    .await
    .unwrap();
    let err = auth::register(State(state.clone()), Json(register_req("alice@example.com")))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::EmailTaken));
}

#[tokio::test]
async fn delivery_failure_still_persists_the_account() {
    let mailer = FakeNotifier::new();
    mailer.fail.store(true, Ordering::Relaxed);
    let state = test_state(mailer.clone());

    let err = auth::register(State(state.clone()), Json(register_req("alice@example.com")))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::DeliveryFailed(_)));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    // The unverified account exists and a resend can rescue it
    let user = state.db.get_user_by_email("alice@example.com").unwrap().unwrap();
    assert!(!user.is_verified);
    assert!(user.otp_code.is_some());

    mailer.fail.store(false, Ordering::Relaxed);
    let resp = auth::resend_otp(
        State(state.clone()),
        Json(ResendOtpRequest {
            email: "alice@example.com".to_string(),
        }),
    )
    .await
    .unwrap();
    assert!(resp.0.success);
}

// -- Verification state machine --

#[tokio::test]
async fn otp_verification_scenario() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());
    register_alice(&state).await;
    let issued = mailer.last_code().unwrap();

    // Wrong code: mismatch, still unverified
    let wrong = if issued == "000000" { "000001" } else { "000000" };
    let err = auth::verify_email(
        State(state.clone()),
        Json(VerifyEmailRequest {
            email: "alice@example.com".to_string(),
            otp: wrong.to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::OtpMismatch));
    let user = state.db.get_user_by_email("alice@example.com").unwrap().unwrap();
    assert!(!user.is_verified);

    // Right code before expiry: verified, token issued, OTP cleared
    let resp = auth::verify_email(
        State(state.clone()),
        Json(VerifyEmailRequest {
            email: "alice@example.com".to_string(),
            otp: issued.clone(),
        }),
    )
    .await
    .unwrap();
    assert!(!resp.0.token.is_empty());
    assert!(resp.0.user.is_verified);
    let user = state.db.get_user_by_email("alice@example.com").unwrap().unwrap();
    assert!(user.is_verified);
    assert!(user.otp_code.is_none());

    // Second attempt: already verified
    let err = auth::verify_email(
        State(state.clone()),
        Json(VerifyEmailRequest {
            email: "alice@example.com".to_string(),
            otp: issued,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::AlreadyVerified));
}

#[tokio::test]
async fn verify_unknown_email_is_not_found() {
    let state = test_state(FakeNotifier::new());
    let err = auth::verify_email(
        State(state),
        Json(VerifyEmailRequest {
            email: "ghost@example.com".to_string(),
            otp: "123456".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::UserNotFound));
}

#[tokio::test]
async fn expired_otp_is_rejected_before_comparison() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());
    register_alice(&state).await;
    let issued = mailer.last_code().unwrap();

    let user = state.db.get_user_by_email("alice@example.com").unwrap().unwrap();
    state
        .db
        .set_otp(&user.id, &issued, "2001-01-01T00:00:00+00:00")
        .unwrap();

    // Even the correct code fails once past expiry
    let err = auth::verify_email(
        State(state),
        Json(VerifyEmailRequest {
            email: "alice@example.com".to_string(),
            otp: issued,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::OtpExpired));
}

// -- Login --

#[tokio::test]
async fn login_hides_account_existence() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());
    verified_alice(&state, &mailer).await;

    let unknown = auth::login(
        State(state.clone()),
        Json(LoginRequest {
            email: "ghost@example.com".to_string(),
            password: "whatever1".to_string(),
        }),
    )
    .await
    .unwrap_err();
    let wrong_password = auth::login(
        State(state),
        Json(LoginRequest {
            email: "alice@example.com".to_string(),
            password: "not-hunter22".to_string(),
        }),
    )
    .await
    .unwrap_err();

    assert!(matches!(unknown, ApiError::InvalidCredentials));
    assert!(matches!(wrong_password, ApiError::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong_password.to_string());
    assert_eq!(unknown.status_code(), wrong_password.status_code());
}

#[tokio::test]
async fn unverified_login_issues_fresh_otp_and_no_token() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());
    register_alice(&state).await;
    let first_code = mailer.last_code().unwrap();

    let err = auth::login(
        State(state.clone()),
        Json(LoginRequest {
            email: "alice@example.com".to_string(),
            password: "hunter22".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::UnverifiedEmail));
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

    // A new code was issued and stored; the old one is dead
    assert_eq!(mailer.sent_count(), 2);
    let stored = state
        .db
        .get_user_by_email("alice@example.com")
        .unwrap()
        .unwrap()
        .otp_code
        .unwrap();
    assert_eq!(stored, mailer.last_code().unwrap());

    let old_attempt = auth::verify_email(
        State(state.clone()),
        Json(VerifyEmailRequest {
            email: "alice@example.com".to_string(),
            otp: first_code.clone(),
        }),
    )
    .await;
    if first_code != stored {
        assert!(matches!(old_attempt.unwrap_err(), ApiError::OtpMismatch));
    }
}

#[tokio::test]
async fn verified_login_returns_token() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());
    verified_alice(&state, &mailer).await;

    let resp = auth::login(
        State(state),
        Json(LoginRequest {
            email: "alice@example.com".to_string(),
            password: "hunter22".to_string(),
        }),
    )
    .await
    .unwrap();
    assert!(resp.0.success);
    assert!(!resp.0.token.is_empty());
    assert!(resp.0.user.is_verified);
}

// -- Resend --

#[tokio::test]
async fn resend_rules() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());

    let err = auth::resend_otp(
        State(state.clone()),
        Json(ResendOtpRequest {
            email: "ghost@example.com".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::UserNotFound));

    register_alice(&state).await;
    auth::resend_otp(
        State(state.clone()),
        Json(ResendOtpRequest {
            email: "alice@example.com".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(mailer.sent_count(), 2);

    let otp = mailer.last_code().unwrap();
    auth::verify_email(
        State(state.clone()),
        Json(VerifyEmailRequest {
            email: "alice@example.com".to_string(),
            otp,
        }),
    )
    .await
    .unwrap();

    let err = auth::resend_otp(
        State(state),
        Json(ResendOtpRequest {
            email: "alice@example.com".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::AlreadyVerified));
}

// -- Canvas --

fn patch(id: &str, x: f64) -> Patch {
    Patch {
        id: id.to_string(),
        x,
        y: 35.0,
        w: 30.0,
        h: 20.0,
        color: "#ef4444".to_string(),
        opacity: 0.4,
    }
}

#[tokio::test]
async fn get_board_creates_empty_and_is_idempotent() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());
    let user = verified_alice(&state, &mailer).await;

    let first = canvas::get_board(State(state.clone()), Extension(CurrentUser(user.clone())))
        .await
        .unwrap();
    assert_eq!(first.0.board.image_url, "");
    assert!(first.0.board.patches.is_empty());

    let second = canvas::get_board(State(state), Extension(CurrentUser(user)))
        .await
        .unwrap();
    assert_eq!(second.0.board.image_url, first.0.board.image_url);
    assert_eq!(second.0.board.patches, first.0.board.patches);
}

#[tokio::test]
async fn update_board_round_trips_and_preserves_order() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());
    let user = verified_alice(&state, &mailer).await;

    let submitted = vec![patch("b", 10.0), patch("a", 20.0), patch("c", 30.0)];
    canvas::update_board(
        State(state.clone()),
        Extension(CurrentUser(user.clone())),
        Json(UpdateBoardRequest {
            image_url: None,
            patches: Some(submitted.clone()),
        }),
    )
    .await
    .unwrap();

    let fetched = canvas::get_board(State(state), Extension(CurrentUser(user)))
        .await
        .unwrap();
    assert_eq!(fetched.0.board.patches, submitted);
}

#[tokio::test]
async fn partial_updates_leave_other_field_untouched() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());
    let user = verified_alice(&state, &mailer).await;

    canvas::update_board(
        State(state.clone()),
        Extension(CurrentUser(user.clone())),
        Json(UpdateBoardRequest {
            image_url: Some("https://img/scan.png".to_string()),
            patches: Some(vec![patch("p1", 10.0)]),
        }),
    )
    .await
    .unwrap();

    // Patches only
    let resp = canvas::update_board(
        State(state.clone()),
        Extension(CurrentUser(user.clone())),
        Json(UpdateBoardRequest {
            image_url: None,
            patches: Some(vec![patch("p2", 15.0)]),
        }),
    )
    .await
    .unwrap();
    assert_eq!(resp.0.board.image_url, "https://img/scan.png");
    assert_eq!(resp.0.board.patches[0].id, "p2");

    // Image only
    let resp = canvas::update_board(
        State(state),
        Extension(CurrentUser(user)),
        Json(UpdateBoardRequest {
            image_url: Some("https://img/other.png".to_string()),
            patches: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(resp.0.board.image_url, "https://img/other.png");
    assert_eq!(resp.0.board.patches[0].id, "p2");
}

#[tokio::test]
async fn sequential_updates_resolve_last_writer_wins() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());
    let user = verified_alice(&state, &mailer).await;

    let set_a = vec![patch("a1", 10.0), patch("a2", 20.0)];
    let set_b = vec![patch("b1", 50.0)];
    for set in [&set_a, &set_b] {
        canvas::update_board(
            State(state.clone()),
            Extension(CurrentUser(user.clone())),
            Json(UpdateBoardRequest {
                image_url: None,
                patches: Some(set.clone()),
            }),
        )
        .await
        .unwrap();
    }

    let fetched = canvas::get_board(State(state), Extension(CurrentUser(user)))
        .await
        .unwrap();
    // B, not a merge of A and B
    assert_eq!(fetched.0.board.patches, set_b);
}

#[tokio::test]
async fn update_fans_out_to_other_sessions() {
    let mailer = FakeNotifier::new();
    let state = test_state(mailer.clone());
    let user = verified_alice(&state, &mailer).await;

    let (_, mut other_tab) = state.rooms.join(user.id).await;

    canvas::update_board(
        State(state),
        Extension(CurrentUser(user)),
        Json(UpdateBoardRequest {
            image_url: None,
            patches: Some(vec![patch("p1", 10.0)]),
        }),
    )
    .await
    .unwrap();

    match other_tab.recv().await {
        Some(GatewayEvent::BoardUpdate { patches, .. }) => {
            assert_eq!(patches.len(), 1);
            assert_eq!(patches[0].id, "p1");
        }
        other => panic!("expected BoardUpdate, got {:?}", other),
    }
}
