//! Integration tests for errors, configuration, and cancellation

use std::time::Duration;

use tessera_foundation::{
    CancelToken, Capacity, DbConfig, Error, ErrorContext, ErrorKind, SchedulerConfig, StatementRef,
};

// =============================================================================
// Errors
// =============================================================================

#[test]
fn fatal_classification() {
    assert!(Error::capacity_exhausted(Capacity::StatementPool { limit: 4 }).is_fatal());
    assert!(Error::invariant("duplicate clause").is_fatal());
    assert!(!Error::stale_ref(StatementRef::new(1, 0)).is_fatal());
    assert!(!Error::rule_body("oops").is_fatal());
    assert!(!Error::cancelled().is_fatal());
}

#[test]
fn stale_errors_name_the_ref() {
    let err = Error::stale_ref(StatementRef::new(5, 2));
    assert!(err.is_stale());
    assert!(err.to_string().contains("s5:2"));
}

#[test]
fn context_is_attached() {
    let err = Error::rule_body("bad").with_context(
        ErrorContext::new()
            .with_clause("the time is 3")
            .with_worker(2),
    );
    assert!(matches!(err.kind, ErrorKind::RuleBody(_)));
    assert!(err.context.is_some());
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn config_builders() {
    let db = DbConfig::default()
        .with_statement_capacity(10)
        .with_hold_capacity(2);
    assert_eq!(db.statement_capacity, 10);
    assert_eq!(db.hold_capacity, 2);

    let sched = SchedulerConfig::fixed(2).with_responsive_threshold(Duration::from_micros(500));
    assert_eq!(sched.max_workers(), 2);
    assert_eq!(sched.responsive_threshold, Duration::from_micros(500));
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn cancel_token_across_threads() {
    let token = CancelToken::new();
    let remote = token.clone();
    std::thread::spawn(move || remote.cancel()).join().unwrap();
    assert!(token.is_cancelled());
    assert!(matches!(token.check().unwrap_err().kind, ErrorKind::Cancelled));
}
