use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use procfarm::master::{FarmConfig, Master, WorkerState, run_farm};
use procfarm::solver::ScriptOp;
use procfarm::{FarmError, Problem, ProblemKind, Verdict};

use crate::common::{RecordingTracer, ScriptWorkload, TraceEvent, farm_config};

fn echo(bytes: &[u8]) -> ScriptOp {
    ScriptOp::Echo(bytes.to_vec())
}

fn slow(bytes: &[u8]) -> ScriptOp {
    ScriptOp::Delay {
        millis: 30_000,
        echo: bytes.to_vec(),
    }
}

/// A winner that polls the cancel flag while it works.
fn polling_win() -> ScriptOp {
    ScriptOp::Delay {
        millis: 20,
        echo: b"win".to_vec(),
    }
}

#[test]
fn test_single_worker_second_variant_accepted() {
    let mut workload = ScriptWorkload::new(b"win")
        .round(vec![echo(b"lose")])
        .round(vec![echo(b"win")])
        .round(vec![echo(b"after")]);
    let tracer = RecordingTracer::default();

    let outcome = run_farm(&farm_config(1), &mut workload, tracer.clone()).unwrap();

    assert!(outcome.success());
    assert_eq!(outcome.shutdown.exited, vec![0]);
    assert_eq!(outcome.summary.rounds, 3);
    assert_eq!(outcome.summary.accepted, 1);
    assert_eq!(outcome.summary.rejected, 2);
    assert_eq!(outcome.summary.cancelled, 0);
    assert_eq!(outcome.summary.unsolved_rounds, 2);
    assert_eq!(outcome.summary.problems_sent, 3);
    assert_eq!(outcome.summary.problems_sent, outcome.summary.answers_received);
    assert_eq!(
        workload.verdicts,
        vec![(0, Verdict::Rejected), (1, Verdict::Accepted), (2, Verdict::Rejected)]
    );
    assert_eq!(workload.unsolved, 2);
    assert!(tracer.cancelled_workers().is_empty());

    let events = tracer.events();
    assert_eq!(events.first(), Some(&TraceEvent::Start));
    assert_eq!(events.last(), Some(&TraceEvent::End));
}

#[test]
fn test_winner_cancels_running_workers() {
    let mut workload =
        ScriptWorkload::new(b"win").round(vec![slow(b"win"), echo(b"win"), slow(b"win")]);
    let tracer = RecordingTracer::default();

    let mut master = Master::start(&farm_config(3), tracer.clone()).unwrap();
    assert_eq!(master.states(), vec![WorkerState::Idle; 3]);

    let started = Instant::now();
    let summary = master.run(&mut workload).unwrap();
    // The slow variants were cut short, not waited out.
    assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
    assert_eq!(master.states(), vec![WorkerState::Idle; 3]);

    let report = master.shutdown().unwrap();
    assert!(report.success());
    assert_eq!(report.reaped(), 3);

    assert_eq!(summary.rounds, 1);
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.cancelled, 2);
    assert_eq!(summary.problems_sent, 3);
    assert_eq!(summary.answers_received, 3);
    // Only the winner's answer is judged.
    assert_eq!(workload.verdicts, vec![(1, Verdict::Accepted)]);

    let mut cancelled = tracer.cancelled_workers();
    cancelled.sort();
    assert_eq!(cancelled, vec![0, 2]);

    // Each cancelled worker still leaves exactly one answer behind.
    let mut answered: Vec<_> = tracer
        .events()
        .into_iter()
        .filter_map(|event| match event {
            TraceEvent::Recv { worker, .. } => Some(worker),
            _ => None,
        })
        .collect();
    answered.sort();
    assert_eq!(answered, vec![0, 1, 2]);
}

#[test]
fn test_killed_worker_reported_at_shutdown() {
    let mut workload = ScriptWorkload::new(b"ok").round(vec![echo(b"ok"), echo(b"ok"), echo(b"ok")]);

    let mut master = Master::start(&farm_config(3), RecordingTracer::default()).unwrap();
    let summary = master.run(&mut workload).unwrap();
    assert_eq!(summary.accepted, 1);

    let victim = master.pids()[1];
    kill(victim, Signal::SIGKILL).unwrap();

    let report = master.shutdown().unwrap();
    assert!(!report.success());
    assert_eq!(report.reaped(), 3);
    assert_eq!(report.aborted, vec![(1, "killed by SIGKILL".to_string())]);

    let mut exited = report.exited.clone();
    exited.sort();
    assert_eq!(exited, vec![0, 2]);
}

#[test]
fn test_empty_payloads() {
    // A header-only problem cannot be decoded as a script and fails; an empty
    // echo produces a header-only answer.
    let mut workload = ScriptWorkload::new(b"")
        .raw_round(vec![Problem::new(0, ProblemKind::Script, Vec::new())])
        .raw_round(vec![echo(b"").into_problem(1)]);

    let outcome = run_farm(&farm_config(1), &mut workload, RecordingTracer::default()).unwrap();

    assert!(outcome.success());
    assert_eq!(workload.verdicts, vec![(0, Verdict::Rejected), (1, Verdict::Accepted)]);
    assert_eq!(outcome.summary.unsolved_rounds, 1);
}

#[test]
fn test_unknown_kind_is_rejected() {
    let mut workload = ScriptWorkload::new(b"x").raw_round(vec![Problem {
        id: 9,
        kind: 0xbeef,
        variants: 1,
        variant: 0,
        payload: b"x".to_vec(),
    }]);

    let outcome = run_farm(&farm_config(1), &mut workload, RecordingTracer::default()).unwrap();

    assert!(outcome.success());
    assert_eq!(workload.verdicts, vec![(9, Verdict::Rejected)]);
}

#[test]
fn test_partial_round_is_judged() {
    // Two workers but only one variant left: the round still runs.
    let mut workload = ScriptWorkload::new(b"win").round(vec![echo(b"win")]);

    let outcome = run_farm(&farm_config(2), &mut workload, RecordingTracer::default()).unwrap();

    assert!(outcome.success());
    assert_eq!(outcome.summary.rounds, 1);
    assert_eq!(outcome.summary.problems_sent, 1);
    assert_eq!(outcome.summary.accepted, 1);
    assert_eq!(outcome.summary.cancelled, 0);
}

#[test]
fn test_all_failed_round_moves_on() {
    let mut workload = ScriptWorkload::new(b"win")
        .round(vec![ScriptOp::Fail, ScriptOp::Fail])
        .round(vec![ScriptOp::Fail, echo(b"win")]);

    let outcome = run_farm(&farm_config(2), &mut workload, RecordingTracer::default()).unwrap();

    assert!(outcome.success());
    assert_eq!(outcome.summary.rounds, 2);
    assert_eq!(outcome.summary.unsolved_rounds, 1);
    assert_eq!(outcome.summary.accepted, 1);
    assert_eq!(workload.unsolved, 1);
    assert_eq!(outcome.summary.problems_sent, outcome.summary.answers_received);
}

#[test]
fn test_no_work_shuts_down_cleanly() {
    let mut workload = ScriptWorkload::new(b"");
    let tracer = RecordingTracer::default();

    let outcome = run_farm(&farm_config(2), &mut workload, tracer.clone()).unwrap();

    assert!(outcome.success());
    assert_eq!(outcome.summary.rounds, 0);
    assert_eq!(outcome.summary.problems_sent, 0);

    let exits = tracer
        .events()
        .into_iter()
        .filter(|event| matches!(event, TraceEvent::State { to: WorkerState::Exited, .. }))
        .count();
    assert_eq!(exits, 2);
}

#[test]
fn test_missing_worker_binary() {
    let config = FarmConfig::default()
        .with_workers(2)
        .with_worker_program("/nonexistent/procfarm-worker");
    let mut workload = ScriptWorkload::new(b"");

    let err = run_farm(&config, &mut workload, RecordingTracer::default()).unwrap_err();
    assert!(matches!(err, FarmError::Spawn { worker: 0, .. }));
}

#[test]
fn test_worker_that_never_stops() {
    // `true` exits instead of announcing readiness.
    let config = FarmConfig::default().with_workers(1).with_worker_program("true");
    let mut workload = ScriptWorkload::new(b"");

    let err = run_farm(&config, &mut workload, RecordingTracer::default()).unwrap_err();
    assert!(matches!(err, FarmError::WorkerDied { worker: 0, .. }));
}

#[test]
fn test_cancel_reaches_freshly_woken_workers() {
    // The winner goes first, so the others are cancelled right after they
    // are continued, often before they have read their problem.
    for _ in 0..20 {
        let mut workload = ScriptWorkload::new(b"win").round(vec![
            echo(b"win"),
            ScriptOp::Hang,
            ScriptOp::Hang,
            ScriptOp::Hang,
        ]);

        let started = Instant::now();
        let outcome = run_farm(&farm_config(4), &mut workload, RecordingTracer::default()).unwrap();

        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
        assert!(outcome.success());
        assert_eq!(outcome.summary.accepted, 1);
        assert_eq!(outcome.summary.cancelled, 3);
        assert_eq!(outcome.summary.answers_received, 4);
    }
}

#[test]
fn test_cancel_never_hits_the_next_problem() {
    // Workers that finish before the cancel goes out must not carry it into
    // the following round.
    let mut workload = ScriptWorkload::new(b"win")
        .round(vec![echo(b"win"), echo(b"lose"), echo(b"lose")])
        .round(vec![echo(b"lose"), echo(b"lose"), polling_win()])
        .round(vec![echo(b"lose"), polling_win(), echo(b"lose")]);

    let outcome = run_farm(&farm_config(3), &mut workload, RecordingTracer::default()).unwrap();

    assert!(outcome.success());
    assert_eq!(outcome.summary.rounds, 3);
    assert_eq!(outcome.summary.unsolved_rounds, 0);
    assert_eq!(outcome.summary.problems_sent, 9);
    assert_eq!(outcome.summary.answers_received, 9);
    // No winner was ever turned into a failed answer.
    assert_eq!(outcome.summary.accepted, 3);
}

#[test]
fn test_terminal_stop_is_not_an_answer() {
    let mut workload = ScriptWorkload::new(b"win").round(vec![ScriptOp::Delay {
        millis: 30_000,
        echo: b"win".to_vec(),
    }]);

    let mut master = Master::start(&farm_config(1), RecordingTracer::default()).unwrap();
    let pid = master.pids()[0];
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        kill(pid, Signal::SIGTSTP).unwrap();
    });

    let started = Instant::now();
    let err = master.run(&mut workload).unwrap_err();
    stopper.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(err, FarmError::UnexpectedStatus { worker: 0, .. }), "{:?}", err);
    // Dropping the master kills and reaps the stopped worker.
    drop(master);
}
