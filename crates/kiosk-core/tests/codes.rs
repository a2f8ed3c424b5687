mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Duration;

use kiosk_core::Error;
use kiosk_core::clock::ManualClock;
use kiosk_core::codes::Outcome;
use kiosk_core::config::CodeConfig;
use kiosk_core::notify::{NotificationGateway, Notifier};
use kiosk_db::codes;
use kiosk_types::Purpose;

#[test]
fn signup_code_verifies_account() {
    let mut fx = common::shop();
    let user = fx.user("amna@example.com");
    assert!(!user.verified);

    let code = fx.shop.issue_code(&user.id, Purpose::Signup).unwrap();
    assert_eq!(code.code.len(), 6);
    assert_eq!(code.expires_at - code.issued_at, Duration::minutes(10));
    assert!(!code.used);

    let outcome = fx.shop.validate_code(&user.id, Purpose::Signup, &code.code).unwrap();
    match outcome {
        Outcome::Consumed(consumed) => {
            assert_eq!(consumed.id, code.id);
            assert!(consumed.used);
        }
        other => panic!("expected Consumed, got {:?}", other),
    }
    assert!(fx.shop.get_user(&user.id).unwrap().verified);

    let sent = fx.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "amna@example.com");
    assert_eq!(sent[0].subject, "Your signup verification code");
    assert!(sent[0].body.contains(&code.code));
}

#[test]
fn expired_code_fails_with_correct_value() {
    let fx = common::shop();
    let user = fx.user("bilal@example.com");
    let code = fx.shop.issue_code(&user.id, Purpose::Login).unwrap();

    fx.clock.advance(Duration::minutes(10));

    let outcome = fx.shop.validate_code(&user.id, Purpose::Login, &code.code).unwrap();
    assert_eq!(outcome, Outcome::Expired);
    assert!(matches!(
        fx.shop.validator.verify(&user.id, Purpose::Login, &code.code),
        Err(Error::ExpiredCode)
    ));

    let stored = fx
        .shop
        .database()
        .with_conn(|conn| codes::get(conn, &code.id))
        .unwrap()
        .unwrap();
    assert!(!stored.used);
    assert!(!fx.shop.get_user(&user.id).unwrap().verified);
}

#[test]
fn code_is_valid_until_just_before_expiry() {
    let fx = common::shop();
    let user = fx.user("chand@example.com");
    let code = fx.shop.issue_code(&user.id, Purpose::Login).unwrap();

    fx.clock.advance(Duration::minutes(10) - Duration::seconds(1));
    assert!(fx.shop.validate_code(&user.id, Purpose::Login, &code.code).unwrap().is_consumed());
}

#[test]
fn concurrent_validations_have_one_winner() {
    let fx = common::shop();
    let user = fx.user("dua@example.com");
    let code = fx.shop.issue_code(&user.id, Purpose::Signup).unwrap();

    const ATTEMPTS: usize = 16;
    let consumed = AtomicUsize::new(0);
    let already_used = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..ATTEMPTS {
            s.spawn(|| {
                match fx.shop.validate_code(&user.id, Purpose::Signup, &code.code).unwrap() {
                    Outcome::Consumed(_) => consumed.fetch_add(1, Ordering::SeqCst),
                    Outcome::AlreadyUsed => already_used.fetch_add(1, Ordering::SeqCst),
                    other => panic!("unexpected outcome {:?}", other),
                };
            });
        }
    });

    assert_eq!(consumed.load(Ordering::SeqCst), 1);
    assert_eq!(already_used.load(Ordering::SeqCst), ATTEMPTS - 1);
}

#[test]
fn second_use_is_rejected() {
    let fx = common::shop();
    let user = fx.user("ehsan@example.com");
    let code = fx.shop.issue_code(&user.id, Purpose::PasswordReset).unwrap();

    fx.shop.validator.verify(&user.id, Purpose::PasswordReset, &code.code).unwrap();
    assert!(matches!(
        fx.shop.validator.verify(&user.id, Purpose::PasswordReset, &code.code),
        Err(Error::CodeAlreadyUsed)
    ));
}

#[test]
fn wrong_or_malformed_codes_are_invalid() {
    let fx = common::shop();
    let user = fx.user("fatima@example.com");
    let code = fx.shop.issue_code(&user.id, Purpose::Signup).unwrap();

    let wrong = if code.code == "000000" { "111111" } else { "000000" };
    for submitted in [wrong, "", "12ab56", "   "] {
        let outcome = fx.shop.validate_code(&user.id, Purpose::Signup, submitted).unwrap();
        assert_eq!(outcome, Outcome::Invalid, "submitted {:?}", submitted);
    }
    assert!(!fx.shop.get_user(&user.id).unwrap().verified);

    // Still usable after failed attempts; surrounding whitespace is ignored.
    let padded = format!(" {} ", code.code);
    assert!(fx.shop.validate_code(&user.id, Purpose::Signup, &padded).unwrap().is_consumed());
}

#[test]
fn codes_are_scoped_to_purpose_and_user() {
    let fx = common::shop();
    let owner = fx.user("ghazal@example.com");
    let other = fx.user("hamza@example.com");
    let code = fx.shop.issue_code(&owner.id, Purpose::Signup).unwrap();

    assert_eq!(
        fx.shop.validate_code(&owner.id, Purpose::Login, &code.code).unwrap(),
        Outcome::Invalid
    );
    assert_eq!(
        fx.shop.validate_code(&other.id, Purpose::Signup, &code.code).unwrap(),
        Outcome::Invalid
    );
    assert!(fx.shop.validate_code(&owner.id, Purpose::Signup, &code.code).unwrap().is_consumed());
}

#[test]
fn non_account_purposes_leave_verified_flag_alone() {
    let fx = common::shop();
    let user = fx.user("iqra@example.com");

    for purpose in [Purpose::PasswordReset, Purpose::Promotion] {
        let code = fx.shop.issue_code(&user.id, purpose).unwrap();
        assert!(fx.shop.validate_code(&user.id, purpose, &code.code).unwrap().is_consumed());
    }
    assert!(!fx.shop.get_user(&user.id).unwrap().verified);
}

#[test]
fn unknown_user_is_reported() {
    let fx = common::shop();
    let ghost = uuid::Uuid::new_v4();

    assert!(matches!(
        fx.shop.issue_code(&ghost, Purpose::Signup),
        Err(Error::UserNotFound(id)) if id == ghost
    ));
    assert!(matches!(
        fx.shop.validate_code(&ghost, Purpose::Signup, "123456"),
        Err(Error::UserNotFound(_))
    ));
}

#[test]
fn issuance_is_rate_limited_per_user() {
    let mut fx = common::shop_with(CodeConfig {
        max_per_window: 3,
        rate_window: Duration::minutes(15),
        ..CodeConfig::default()
    });
    let user = fx.user("jawad@example.com");
    let neighbour = fx.user("kiran@example.com");

    for _ in 0..3 {
        fx.shop.issue_code(&user.id, Purpose::Login).unwrap();
        fx.clock.advance(Duration::minutes(1));
    }
    assert!(matches!(
        fx.shop.issue_code(&user.id, Purpose::Signup),
        Err(Error::RateLimited)
    ));
    // Other users are unaffected.
    fx.shop.issue_code(&neighbour.id, Purpose::Login).unwrap();

    let issued = fx
        .shop
        .database()
        .with_conn(|conn| codes::list_for_user(conn, &user.id))
        .unwrap();
    assert_eq!(issued.len(), 3);
    assert_eq!(fx.sent().len(), 4);

    // The first code falls out of the window.
    fx.clock.advance(Duration::minutes(13));
    fx.shop.issue_code(&user.id, Purpose::Login).unwrap();
}

#[test]
fn newest_matching_code_is_consumed_and_older_ones_stay_valid() {
    let fx = common::shop_with(CodeConfig {
        length: 4,
        max_per_window: 0,
        ..CodeConfig::default()
    });
    let user = fx.user("laiba@example.com");

    let first = fx.shop.issue_code(&user.id, Purpose::Login).unwrap();
    fx.clock.advance(Duration::minutes(1));
    let second = fx.shop.issue_code(&user.id, Purpose::Login).unwrap();

    let consumed = fx.shop.validator.verify(&user.id, Purpose::Login, &second.code).unwrap();
    assert_eq!(consumed.id, second.id);

    if first.code != second.code {
        let consumed = fx.shop.validator.verify(&user.id, Purpose::Login, &first.code).unwrap();
        assert_eq!(consumed.id, first.id);
    }
}

struct BrokenGateway {
    attempts: AtomicUsize,
}

#[async_trait]
impl NotificationGateway for BrokenGateway {
    async fn send(&self, _recipient: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("mail server refused connection")
    }
}

#[tokio::test]
async fn delivery_failure_does_not_undo_issuance() {
    let gateway = Arc::new(BrokenGateway { attempts: AtomicUsize::new(0) });
    let (notifier, delivery) = Notifier::spawn(gateway.clone());
    let clock = Arc::new(ManualClock::new(common::start_time()));
    let shop = common::build(CodeConfig::default(), notifier, clock);

    let user = shop.register_user("maham@example.com").unwrap();
    let code = shop.issue_code(&user.id, Purpose::Signup).unwrap();

    // Dropping the shop drops the last notifier, which ends the delivery loop.
    let outcome = shop.validate_code(&user.id, Purpose::Signup, &code.code).unwrap();
    assert!(outcome.is_consumed());
    drop(shop);

    delivery.await.unwrap();
    assert_eq!(gateway.attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn issuance_survives_a_closed_delivery_queue() {
    let clock = Arc::new(ManualClock::new(common::start_time()));
    let shop = common::build(CodeConfig::default(), Notifier::disconnected(), clock);

    let user = shop.register_user("nida@example.com").unwrap();
    let code = shop.issue_code(&user.id, Purpose::Login).unwrap();
    assert!(shop.validate_code(&user.id, Purpose::Login, &code.code).unwrap().is_consumed());
}
