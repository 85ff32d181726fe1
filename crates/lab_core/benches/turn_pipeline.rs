//! Turn pipeline benchmarks for lab_core.
//!
//! Run with: `cargo bench -p lab_core`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lab_core::prelude::*;

fn run_game(turns: u32) -> u64 {
    let mut session = GameSession::new(Scenario::builtin(), Seed::from("bench")).unwrap();
    for _ in 0..turns {
        let queue = vec![
            PlannedAction::direct("fundraise"),
            PlannedAction::direct("safety_research"),
        ];
        let mut advance = session.end_turn(queue).unwrap();
        while let TurnAdvance::AwaitingPopup { event_id } = advance {
            advance = session
                .respond_to_popup(&event_id, PopupResponse::Accept)
                .unwrap();
        }
        if session.game_over().is_some() {
            break;
        }
    }
    session.state_hash()
}

pub fn turn_pipeline_benchmark(c: &mut Criterion) {
    c.bench_function("full_game_52_turns", |b| {
        b.iter(|| black_box(run_game(52)));
    });

    c.bench_function("scenario_validate", |b| {
        let scenario = Scenario::builtin();
        b.iter(|| black_box(scenario.validate().is_ok()));
    });

    c.bench_function("state_hash", |b| {
        let session = GameSession::new(Scenario::builtin(), Seed::from("bench")).unwrap();
        b.iter(|| black_box(session.state_hash()));
    });
}

criterion_group!(benches, turn_pipeline_benchmark);
criterion_main!(benches);
