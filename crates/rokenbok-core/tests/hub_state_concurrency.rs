//! Concurrency tests for the shared hub state.
//!
//! Many connection handlers write to one [`HubState`] at once.  These tests
//! hammer it from real OS threads and check that no update is lost.

use std::sync::Arc;
use std::thread;

use rokenbok_core::{Button, Car, HubState, PLAYER_COUNT};

/// Every (button, player) pair gets its own thread.  Each thread toggles its
/// bit many times and finishes pressed only for even players, so the final
/// masks are fully determined.
#[test]
fn test_concurrent_set_button_on_disjoint_pairs_loses_no_update() {
    let hub = Arc::new(HubState::new());
    const TOGGLES: usize = 1_000;

    thread::scope(|scope| {
        for button in Button::ALL {
            for player in 1..=PLAYER_COUNT as u8 {
                let hub = Arc::clone(&hub);
                scope.spawn(move || {
                    for i in 0..TOGGLES {
                        hub.set_button(button, player, i % 2 == 0);
                    }
                    hub.set_button(button, player, player % 2 == 0);
                });
            }
        }
    });

    for button in Button::ALL {
        assert_eq!(
            hub.button_mask(button),
            0b1010_1010,
            "{button:?} mask lost an update"
        );
    }
}

/// Eight players race for the same vehicle: exactly one wins.
#[test]
fn test_concurrent_selection_race_has_single_winner() {
    let hub = Arc::new(HubState::new());
    let car = Car::new(4);

    let winners: usize = thread::scope(|scope| {
        let handles: Vec<_> = (1..=PLAYER_COUNT as u8)
            .map(|player| {
                let hub = Arc::clone(&hub);
                scope.spawn(move || hub.set_selection(player, car).is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum()
    });

    assert_eq!(winners, 1);
    let holders = hub
        .selections()
        .desired
        .iter()
        .filter(|s| **s == car)
        .count();
    assert_eq!(holders, 1);
}

/// A snapshot taken while writers run never shows a selection held twice.
#[test]
fn test_snapshot_never_shows_duplicate_selection() {
    let hub = Arc::new(HubState::new());

    thread::scope(|scope| {
        for player in 1..=PLAYER_COUNT as u8 {
            let hub = Arc::clone(&hub);
            scope.spawn(move || {
                for i in 0..500u32 {
                    let car = Car::new((i % 8) as u8 + 1);
                    let _ = hub.set_selection(player, car);
                    let _ = hub.set_selection(player, None);
                }
            });
        }
        let hub = Arc::clone(&hub);
        scope.spawn(move || {
            for _ in 0..2_000 {
                let snapshot = hub.snapshot();
                let mut seen = [false; PLAYER_COUNT];
                for car in snapshot.desired.iter().flatten() {
                    let idx = usize::from(car.number() - 1);
                    assert!(!seen[idx], "{car} selected twice");
                    seen[idx] = true;
                }
            }
        });
    });
}
