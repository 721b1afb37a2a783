mod common;

use std::time::Duration;

use banter_core::{
    ChatReply, Command, ControllerConfig, ControllerError, Credentials, DeliveryStatus, Message,
    NotificationKind, Outcome, Phase, Role, Screen, SendOutcome, TransportError, ValidationError,
};
use common::{controller, controller_with, logged_in, MockTransport, PASSWORD};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_login_enters_welcome_screen() {
    let transport = MockTransport::new();
    transport.seed_session("Earlier chat", vec![Message::user("hello")]);
    let mut controller = controller(&transport);
    assert_eq!(controller.phase(), Phase::Unauthenticated);

    assert_ok!(controller.login(Credentials::new("admin01", PASSWORD)).await);

    assert_eq!(controller.phase(), Phase::NoSession);
    assert_eq!(controller.user().map(|u| u.username.as_str()), Some("admin01"));
    assert_eq!(controller.sessions().len(), 1);

    let presenter = controller.presenter();
    assert_eq!(presenter.screen(), Some(Screen::Welcome));
    assert_eq!(presenter.sessions.len(), 1);
    assert!(presenter.user.is_some());
    assert_eq!(presenter.last_notification(), Some("Login successful!"));
}

#[tokio::test]
async fn test_login_requires_credentials() {
    let transport = MockTransport::new();
    let mut controller = controller(&transport);

    let err = controller.login(Credentials::new("  ", "pw")).await.unwrap_err();
    assert_eq!(err, ControllerError::Validation(ValidationError::MissingCredentials));
    assert_eq!(transport.calls("login"), 0);
}

#[tokio::test]
async fn test_login_rejected_shows_server_message() {
    let transport = MockTransport::new();
    let mut controller = controller(&transport);

    assert_err!(controller.login(Credentials::new("admin01", "wrong")).await);

    assert_eq!(controller.phase(), Phase::Unauthenticated);
    assert!(!controller.is_auth_expiring());
    assert_eq!(
        controller.presenter().notifications.last(),
        Some(&("Invalid username or password".to_string(), NotificationKind::Error))
    );
}

#[tokio::test]
async fn test_check_auth_restores_existing_login() {
    let transport = MockTransport::authenticated("admin01");
    let mut controller = controller(&transport);

    assert!(assert_ok!(controller.check_auth().await));
    assert_eq!(controller.phase(), Phase::NoSession);
    assert_eq!(transport.calls("list_sessions"), 1);
}

#[tokio::test]
async fn test_check_auth_anonymous_shows_login() {
    let transport = MockTransport::new();
    let mut controller = controller(&transport);

    assert!(!assert_ok!(controller.check_auth().await));
    assert_eq!(controller.phase(), Phase::Unauthenticated);
    assert_eq!(controller.presenter().screen(), Some(Screen::Login));
}

#[tokio::test]
async fn test_check_auth_network_failure_shows_login() {
    let transport = MockTransport::new();
    transport.fail_next("check_auth", TransportError::Network("refused".into()));
    let mut controller = controller(&transport);

    assert_err!(controller.check_auth().await);
    assert_eq!(controller.presenter().screen(), Some(Screen::Login));
}

#[tokio::test]
async fn test_send_success_appends_user_then_assistant() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();
    transport.queue_reply(Ok(ChatReply::new("hello")));

    let outcome = controller.send_message("hi").await.unwrap();

    assert_eq!(outcome, SendOutcome::Replied);
    let history = controller.history();
    assert_eq!(history.len(), 2);
    assert_eq!((history[0].role, history[0].content.as_str()), (Role::User, "hi"));
    assert_eq!((history[1].role, history[1].content.as_str()), (Role::Assistant, "hello"));
    assert!(history.iter().all(|m| m.status == DeliveryStatus::Delivered));
    assert!(!controller.is_typing());
    assert_eq!(controller.phase(), Phase::ActiveSession);

    let presenter = controller.presenter();
    assert!(!presenter.typing);
    assert_eq!(presenter.screen(), Some(Screen::Chat));
    assert_eq!(presenter.messages.len(), 2);
}

#[tokio::test]
async fn test_whitespace_send_is_rejected_without_transport() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();

    let err = controller.send_message("   ").await.unwrap_err();

    assert_eq!(err, ControllerError::Validation(ValidationError::EmptyMessage));
    assert!(controller.history().is_empty());
    assert_eq!(transport.calls("send_chat"), 0);
}

#[tokio::test]
async fn test_send_while_typing_is_a_no_op() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();

    let ticket = controller.begin_send("first").await.unwrap().expect("ticket");
    assert_eq!(controller.phase(), Phase::Sending);
    assert!(controller.presenter().typing);

    let outcome = controller.send_message("second").await.unwrap();
    assert_eq!(outcome, SendOutcome::Ignored);
    assert_eq!(controller.history().len(), 1);
    assert!(controller.history()[0].is_pending());
    assert_eq!(transport.calls("send_chat"), 0);

    let outcome = controller
        .complete_send(ticket, Ok(ChatReply::new("done")))
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Replied);
    assert!(!controller.is_typing());
}

#[tokio::test]
async fn test_send_without_session_creates_one_first() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    assert!(controller.current_session_id().is_none());

    controller.send_message("how many plants").await.unwrap();

    assert_eq!(transport.calls("create_session"), 1);
    let id = controller.current_session_id().expect("session").to_string();
    assert!(transport.session_ids().contains(&id));
    assert_eq!(controller.history().len(), 2);
    assert_eq!(controller.presenter().active_id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn test_send_aborts_when_session_creation_fails() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    transport.fail_next("create_session", TransportError::rejected("db down"));

    assert_err!(controller.send_message("hi").await);

    assert!(controller.history().is_empty());
    assert_eq!(controller.phase(), Phase::NoSession);
    assert_eq!(transport.calls("send_chat"), 0);
    assert!(controller.presenter().notified("Failed to create new chat"));
}

#[tokio::test(start_paused = true)]
async fn test_send_auth_expired_logs_out_after_delay() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();
    transport.queue_reply(Err(TransportError::AuthExpired));

    let err = controller.send_message("hi").await.unwrap_err();
    assert_eq!(err, ControllerError::Transport(TransportError::AuthExpired));

    let history = controller.history();
    assert_eq!(history.len(), 2);
    assert!(history[0].is_failed());
    assert!(history[1].is_error);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "Authentication expired. Please login again.");
    assert!(controller.presenter().notified("Please login again"));

    assert!(controller.is_auth_expiring());
    assert_ne!(controller.phase(), Phase::Unauthenticated);
    assert_eq!(
        controller.send_message("again").await.unwrap_err(),
        ControllerError::AuthExpiring
    );

    tokio::time::advance(Duration::from_millis(1999)).await;
    assert!(!controller.tick());

    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(controller.tick());
    assert_eq!(controller.phase(), Phase::Unauthenticated);
    assert!(controller.history().is_empty());
    assert_eq!(controller.presenter().screen(), Some(Screen::Login));
}

#[tokio::test(start_paused = true)]
async fn test_settle_waits_for_expiry() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    transport.fail_next("list_sessions", TransportError::AuthExpired);

    assert_err!(controller.refresh_sessions().await);
    assert!(controller.is_auth_expiring());

    controller.settle().await;
    assert_eq!(controller.phase(), Phase::Unauthenticated);
}

#[tokio::test]
async fn test_send_network_failure_keeps_failed_user_message() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();
    transport.queue_reply(Err(TransportError::Network("connection reset".into())));

    assert_err!(controller.send_message("hi").await);

    let history = controller.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "hi");
    assert!(history[0].is_failed());
    assert_eq!(
        history[1].content,
        "Network error. Please check your connection and try again."
    );
    assert!(!history[1].content.contains("connection reset"));
    assert!(!controller.is_typing());
    assert_eq!(controller.phase(), Phase::ActiveSession);
    assert!(controller.presenter().notified("Network error occurred"));

    // the mutex is released, the next send goes through
    assert_eq!(controller.send_message("retry").await.unwrap(), SendOutcome::Replied);
}

#[tokio::test]
async fn test_failed_exchange_survives_next_send() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();
    transport.queue_reply(Err(TransportError::Network("connection reset".into())));
    transport.queue_reply(Ok(ChatReply::new("ok")));

    assert_err!(controller.send_message("first").await);
    assert_eq!(controller.send_message("second").await.unwrap(), SendOutcome::Replied);

    let history = controller.history();
    let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "first",
            "Network error. Please check your connection and try again.",
            "second",
            "ok",
        ]
    );
    assert!(history[0].is_failed());
    assert!(history[1].is_error);
    assert!(history[2..].iter().all(|m| !m.is_failed() && !m.is_error));
    assert_eq!(controller.presenter().messages.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_send_times_out() {
    let transport = MockTransport::new();
    transport.delay_chat(Duration::from_secs(120));
    let config = ControllerConfig::default().with_request_timeout(Duration::from_secs(5));
    let mut controller = controller_with(&transport, config);
    controller
        .login(Credentials::new("admin01", PASSWORD))
        .await
        .unwrap();
    controller.start_new_chat().await.unwrap();

    let err = controller.send_message("slow").await.unwrap_err();

    assert_eq!(
        err,
        ControllerError::Transport(TransportError::Timeout(Duration::from_secs(5)))
    );
    assert!(!controller.is_typing());
    assert_eq!(
        controller.history().last().map(|m| m.content.as_str()),
        Some("The request timed out. Please try again.")
    );
}

#[tokio::test]
async fn test_switch_session_replaces_history() {
    let transport = MockTransport::new();
    let first = transport.seed_session(
        "First",
        vec![Message::user("a1"), Message::assistant("a2"), Message::user("a3")],
    );
    let second = transport.seed_session("Second", vec![Message::user("b1")]);
    let mut controller = logged_in(&transport).await;

    controller.switch_session(&first).await.unwrap();
    assert_eq!(controller.history().len(), 3);

    controller.switch_session(&second).await.unwrap();
    let contents: Vec<_> = controller.history().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["b1"]);
    assert_eq!(controller.current_session_id(), Some(second.as_str()));
    assert_eq!(controller.phase(), Phase::ActiveSession);

    let presenter = controller.presenter();
    assert_eq!(presenter.messages.len(), 1);
    assert_eq!(presenter.active_id.as_deref(), Some(second.as_str()));
    assert_eq!(presenter.screen(), Some(Screen::Chat));
}

#[tokio::test]
async fn test_switch_to_missing_session_keeps_prior_state() {
    let transport = MockTransport::new();
    let first = transport.seed_session("First", vec![Message::user("a1")]);
    let mut controller = logged_in(&transport).await;
    controller.switch_session(&first).await.unwrap();

    assert_err!(controller.switch_session("nope").await);

    assert_eq!(controller.current_session_id(), Some(first.as_str()));
    assert_eq!(controller.history().len(), 1);
    assert!(controller.presenter().notified("Failed to load chat session"));
}

#[tokio::test]
async fn test_delete_current_session_returns_to_welcome() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    let id = controller.start_new_chat().await.unwrap();
    controller.send_message("hi").await.unwrap();

    controller.delete_session(&id, &mut true).await.unwrap();

    assert!(controller.current_session_id().is_none());
    assert!(controller.history().is_empty());
    assert_eq!(controller.phase(), Phase::NoSession);
    assert!(controller.sessions().iter().all(|s| s.id != id));

    let presenter = controller.presenter();
    assert_eq!(presenter.screen(), Some(Screen::Welcome));
    assert!(presenter.messages.is_empty());
    assert_eq!(presenter.last_notification(), Some("Chat deleted"));
}

#[tokio::test]
async fn test_delete_other_session_keeps_current() {
    let transport = MockTransport::new();
    let other = transport.seed_session("Other", Vec::new());
    let mut controller = logged_in(&transport).await;
    let current = controller.start_new_chat().await.unwrap();

    controller.delete_session(&other, &mut true).await.unwrap();

    assert_eq!(controller.current_session_id(), Some(current.as_str()));
    assert_eq!(controller.sessions().len(), 1);
}

#[tokio::test]
async fn test_declined_delete_changes_nothing() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    let id = controller.start_new_chat().await.unwrap();
    let before = controller.sessions().to_vec();

    let mut prompt = String::new();
    let mut gate = |text: &str| {
        prompt = text.to_string();
        false
    };
    let err = controller.delete_session(&id, &mut gate).await.unwrap_err();

    assert_eq!(err, ControllerError::Validation(ValidationError::NotConfirmed));
    assert_eq!(prompt, "Are you sure you want to delete this chat?");
    assert_eq!(transport.calls("delete_session"), 0);
    assert_eq!(controller.current_session_id(), Some(id.as_str()));
    assert_eq!(controller.sessions(), before.as_slice());
}

#[tokio::test]
async fn test_created_session_is_listed_once() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;

    let id = controller.start_new_chat().await.unwrap();
    controller.refresh_sessions().await.unwrap();

    let matches = controller.sessions().iter().filter(|s| s.id == id).count();
    assert_eq!(matches, 1);
}

#[tokio::test]
async fn test_new_chat_while_active_resets_conversation() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    let first = controller.start_new_chat().await.unwrap();
    controller.send_message("hi").await.unwrap();

    let second = controller.start_new_chat().await.unwrap();

    assert_ne!(first, second);
    assert!(controller.history().is_empty());
    assert_eq!(controller.phase(), Phase::ActiveSession);
    assert_eq!(controller.presenter().screen(), Some(Screen::Welcome));
    assert!(controller.state().is_first_message);
}

#[tokio::test]
async fn test_reply_for_switched_session_is_discarded() {
    let transport = MockTransport::new();
    let other = transport.seed_session("Other", vec![Message::user("old")]);
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();

    let ticket = controller.begin_send("hi").await.unwrap().expect("ticket");
    controller.switch_session(&other).await.unwrap();

    let outcome = controller
        .complete_send(ticket, Ok(ChatReply::new("late reply")))
        .await
        .unwrap();

    assert_eq!(outcome, SendOutcome::Discarded);
    let contents: Vec<_> = controller.history().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["old"]);
    assert!(!controller.is_typing());
}

#[tokio::test]
async fn test_switch_releases_in_flight_send() {
    let transport = MockTransport::new();
    let other = transport.seed_session("Other", vec![Message::user("old")]);
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();

    let ticket = controller.begin_send("hi").await.unwrap().expect("ticket");
    assert_eq!(controller.phase(), Phase::Sending);
    controller.switch_session(&other).await.unwrap();

    assert!(!controller.is_typing());
    assert!(!controller.presenter().typing);
    assert_eq!(controller.phase(), Phase::ActiveSession);
    assert_eq!(controller.send_message("next").await.unwrap(), SendOutcome::Replied);

    let outcome = controller
        .complete_send(ticket, Ok(ChatReply::new("late reply")))
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Discarded);
    assert_eq!(
        controller.history().last().map(|m| m.content.as_str()),
        Some("echo: next")
    );
}

#[tokio::test]
async fn test_new_chat_releases_in_flight_send() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();
    let ticket = controller.begin_send("hi").await.unwrap().expect("ticket");

    controller.start_new_chat().await.unwrap();

    assert!(!controller.is_typing());
    assert!(controller.begin_send("fresh").await.unwrap().is_some());
    let outcome = controller
        .complete_send(ticket, Ok(ChatReply::new("late reply")))
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Discarded);
}

#[tokio::test]
async fn test_cancel_send_marks_message_failed() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();

    let ticket = controller.begin_send("hi").await.unwrap().expect("ticket");
    assert!(controller.cancel_send());
    assert!(!controller.cancel_send());

    assert!(!controller.is_typing());
    assert!(controller.history()[0].is_failed());
    assert!(!controller.presenter().typing);

    let outcome = controller
        .complete_send(ticket, Ok(ChatReply::new("too late")))
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Discarded);
    assert_eq!(controller.history().len(), 1);
}

#[tokio::test]
async fn test_logout_discards_state_even_if_request_fails() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();
    controller.send_message("hi").await.unwrap();
    transport.fail_next("logout", TransportError::Network("offline".into()));

    controller.logout().await;

    assert_eq!(controller.phase(), Phase::Unauthenticated);
    assert!(controller.current_session_id().is_none());
    assert!(controller.history().is_empty());
    assert!(controller.sessions().is_empty());

    let presenter = controller.presenter();
    assert_eq!(presenter.screen(), Some(Screen::Login));
    assert!(presenter.user.is_none());
    assert_eq!(presenter.last_notification(), Some("Logged out successfully"));
}

#[tokio::test]
async fn test_follow_up_becomes_suggestion() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    controller.start_new_chat().await.unwrap();
    transport.queue_reply(Ok(
        ChatReply::new("There are 12 plants.").with_follow_up("Show them by state?")
    ));

    controller.send_message("how many plants").await.unwrap();

    assert_eq!(controller.presenter().suggestions, vec!["Show them by state?".to_string()]);
    assert_eq!(
        controller.history().last().and_then(|m| m.follow_up.as_deref()),
        Some("Show them by state?")
    );
}

#[tokio::test]
async fn test_reconcile_picks_up_server_title() {
    let transport = MockTransport::new();
    let mut controller = logged_in(&transport).await;
    let id = controller.start_new_chat().await.unwrap();

    controller
        .send_message("list all plants in gujarat please")
        .await
        .unwrap();

    let title = controller
        .sessions()
        .iter()
        .find(|s| s.id == id)
        .map(|s| s.title.clone());
    assert_eq!(title.as_deref(), Some("list all plants in"));
}

#[tokio::test]
async fn test_operations_require_login() {
    let transport = MockTransport::new();
    let mut controller = controller(&transport);

    assert_eq!(
        controller.send_message("hi").await.unwrap_err(),
        ControllerError::NotAuthenticated
    );
    assert_eq!(
        controller.start_new_chat().await.unwrap_err(),
        ControllerError::NotAuthenticated
    );
    assert_eq!(transport.calls("create_session"), 0);
}

#[tokio::test]
async fn test_dispatch_routes_commands() {
    let transport = MockTransport::new();
    let mut controller = controller(&transport);
    let mut gate = true;

    let outcome = controller
        .dispatch(Command::Login(Credentials::new("admin01", PASSWORD)), &mut gate)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done);

    let Outcome::SessionCreated(id) = controller.dispatch(Command::NewChat, &mut gate).await.unwrap()
    else {
        panic!("expected a new session");
    };

    let outcome = controller
        .dispatch(Command::Send("hi".into()), &mut gate)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Send(SendOutcome::Replied));

    let err = controller
        .dispatch(Command::Send("  ".into()), &mut gate)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert_eq!(
        controller.dispatch(Command::CancelSend, &mut gate).await.unwrap(),
        Outcome::Cancelled(false)
    );

    controller
        .dispatch(Command::Delete(id), &mut gate)
        .await
        .unwrap();
    assert_eq!(controller.phase(), Phase::NoSession);

    controller.dispatch(Command::Logout, &mut gate).await.unwrap();
    assert_eq!(controller.phase(), Phase::Unauthenticated);
}
