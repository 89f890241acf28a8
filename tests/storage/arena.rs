//! Integration tests for the statement arena and the acquire/release protocol

use std::sync::Arc;
use std::thread;

use tessera_foundation::{Clause, StatementRef};
use tessera_storage::{Pool, Statement};

fn statement(text: &str) -> Statement {
    Statement::new(Clause::parse(text), 2)
}

#[test]
fn removed_statement_goes_stale() {
    let pool: Pool<Statement> = Pool::new(8);
    let r = pool.allocate(statement("a")).unwrap().reference();
    assert!(pool.contains(r));

    let stmt = pool.acquire(r).unwrap();
    assert_eq!(stmt.drop_parent(), Some(0));
    drop(stmt);

    assert!(pool.acquire(r).is_none());
    assert!(pool.release(r).unwrap_err().is_stale());
    assert_eq!(pool.live(), 0);
}

#[test]
fn recycled_slot_gets_new_generation() {
    let pool: Pool<Statement> = Pool::new(2);
    let first = pool.allocate(statement("a")).unwrap().reference();
    pool.acquire(first).unwrap().clear_parents();
    pool.reclaim(first);

    let second = pool.allocate(statement("b")).unwrap().reference();
    assert_eq!(second.index, first.index);
    assert_ne!(second.generation, first.generation);
    assert!(pool.acquire(first).is_none());
    assert_eq!(pool.acquire(second).unwrap().clause(), &Clause::parse("b"));
}

#[test]
fn held_acquisition_delays_reclaim() {
    let pool: Pool<Statement> = Pool::new(4);
    let r = pool.allocate(statement("a")).unwrap().reference();
    pool.pin(r).unwrap();
    pool.acquire(r).unwrap().clear_parents();

    assert!(pool.acquire(r).is_some());
    pool.release(r).unwrap();
    assert!(pool.acquire(r).is_none());
}

#[test]
fn concurrent_acquire_release_is_balanced() {
    let pool: Arc<Pool<Statement>> = Arc::new(Pool::new(16));
    let refs: Vec<StatementRef> = (0..8)
        .map(|i| pool.allocate(statement(&format!("s {i}"))).unwrap().reference())
        .collect();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let pool = Arc::clone(&pool);
            let refs = refs.clone();
            thread::spawn(move || {
                for n in 0..2_000 {
                    let r = refs[(n + t) % refs.len()];
                    pool.pin(r).unwrap();
                    let guard = pool.acquire(r).unwrap();
                    drop(guard.clone());
                    pool.release(r).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for r in refs {
        assert_eq!(pool.acquire_count(r.index), Some(0));
        assert!(pool.contains(r));
    }
}
