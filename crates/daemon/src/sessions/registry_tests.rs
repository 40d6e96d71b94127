// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mill_core::FakeClock;

use super::*;

fn make_registry() -> (SessionRegistry<FakeClock>, FakeClock, Arc<ServerStats>) {
    let clock = FakeClock::new();
    let stats = Arc::new(ServerStats::new(0));
    (SessionRegistry::new(clock.clone(), Arc::clone(&stats)), clock, stats)
}

fn addr() -> SocketAddr {
    "127.0.0.1:4000".parse().unwrap()
}

#[test]
fn admit_assigns_monotonic_ids_and_counts() {
    let (registry, _, stats) = make_registry();
    let (a, _) = registry.admit(addr());
    let (b, _) = registry.admit(addr());
    assert_eq!(a.as_u32(), 1);
    assert_eq!(b.as_u32(), 2);
    assert_eq!(registry.count(), 2);
    assert_eq!(stats.snapshot(0, 0).active_sessions, 2);
}

#[test]
fn remove_frees_record_and_updates_stats() {
    let (registry, _, stats) = make_registry();
    let (id, _) = registry.admit(addr());
    let session = registry.remove(id).unwrap();
    assert_eq!(session.id, id);
    assert_eq!(registry.count(), 0);
    assert_eq!(stats.snapshot(0, 0).active_sessions, 0);
    assert!(registry.remove(id).is_none());
    assert!(registry.get(id).is_none());
}

#[test]
fn with_mutates_the_live_record() {
    let (registry, _, _) = make_registry();
    let (id, _) = registry.admit(addr());
    registry.with(id, |session| session.client_name = "cli".to_string());
    assert_eq!(registry.get(id).unwrap().client_name, "cli");
}

#[test]
fn graceful_kick_cancels_only_the_kill_token() {
    let (registry, _, _) = make_registry();
    let (id, signals) = registry.admit(addr());
    assert!(!signals.kill.is_cancelled());

    assert!(registry.kick(id, false));
    assert!(signals.kill.is_cancelled());
    assert!(!signals.force_kill.is_cancelled());

    assert!(!registry.kick(SessionId::from_raw(99), false));
}

#[test]
fn force_kick_cancels_both_tokens() {
    let (registry, _, _) = make_registry();
    let (id, signals) = registry.admit(addr());

    assert!(registry.kick(id, true));
    assert!(signals.kill.is_cancelled());
    assert!(signals.force_kill.is_cancelled());
}

#[test]
fn job_finished_flows_to_session_state() {
    let (registry, _, _) = make_registry();
    let (id, _) = registry.admit(addr());
    registry.with(id, |session| {
        session.state = SessionState::Processing;
        session.active_jobs = 1;
    });
    registry.job_finished(id);
    let session = registry.get(id).unwrap();
    assert_eq!(session.active_jobs, 0);
    assert_eq!(session.state, SessionState::Idle);
}

#[test]
fn list_returns_all_live_sessions() {
    let (registry, _, _) = make_registry();
    let (a, _) = registry.admit(addr());
    registry.admit(addr());
    registry.remove(a);
    let listed = registry.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id.as_u32(), 2);
}
