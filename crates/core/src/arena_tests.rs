// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn insert_then_get() {
    let mut arena = Arena::new();
    let a = arena.insert("a");
    let b = arena.insert("b");
    assert_eq!(arena.get(a), Some(&"a"));
    assert_eq!(arena.get(b), Some(&"b"));
    assert_eq!(arena.len(), 2);
}

#[test]
fn remove_invalidates_handle() {
    let mut arena = Arena::new();
    let h = arena.insert(7u32);
    assert_eq!(arena.remove(h), Some(7));
    assert_eq!(arena.get(h), None);
    assert_eq!(arena.remove(h), None);
    assert!(arena.is_empty());
}

#[test]
fn reused_slot_gets_new_generation() {
    let mut arena = Arena::new();
    let stale = arena.insert(1u32);
    arena.remove(stale);

    let fresh = arena.insert(2u32);
    assert_eq!(fresh.index(), stale.index());
    assert_ne!(fresh.generation(), stale.generation());

    // The stale handle must not observe the new occupant.
    assert_eq!(arena.get(stale), None);
    assert_eq!(arena.get(fresh), Some(&2));
}

#[test]
fn iter_skips_removed_slots() {
    let mut arena = Arena::new();
    let a = arena.insert("a");
    let _b = arena.insert("b");
    let c = arena.insert("c");
    arena.remove(a);
    arena.remove(c);

    let live: Vec<&str> = arena.iter().map(|(_, v)| *v).collect();
    assert_eq!(live, vec!["b"]);
}

#[test]
fn iter_mut_allows_in_place_updates() {
    let mut arena = Arena::new();
    let h = arena.insert(10u32);
    arena.insert(20u32);
    for (_, v) in arena.iter_mut() {
        *v += 1;
    }
    assert_eq!(arena.get(h), Some(&11));
}
