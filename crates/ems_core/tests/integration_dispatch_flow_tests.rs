mod support;

use ems_core::model::{AmbulanceId, CaseId};
use ems_core::simulator::StepOutcome;
use ems_core::test_helpers::FixedSelector;
use ems_core::SimError;

use support::{fixed_sim, with_selector, OnlyAmbulance};

#[test]
fn capacity_contention_queues_second_case() {
    // One ambulance, cases at t=0 and t=1, treatment lasts 5.
    let mut sim = fixed_sim(1, &[0, 1], 5);

    assert_eq!(
        sim.step().expect("step"),
        Some(StepOutcome::Dispatched {
            case: CaseId(1),
            ambulance: AmbulanceId(1),
            timestamp: 0,
            from_queue: false
        })
    );
    assert_eq!(
        sim.step().expect("step"),
        Some(StepOutcome::Queued {
            case: CaseId(2),
            timestamp: 1
        })
    );
    assert_eq!(sim.counts().pending, 1);
    assert_eq!(sim.counts().active, 1);

    assert_eq!(
        sim.step().expect("step"),
        Some(StepOutcome::Finished {
            case: CaseId(1),
            ambulance: AmbulanceId(1),
            timestamp: 5
        })
    );
    assert_eq!(
        sim.step().expect("step"),
        Some(StepOutcome::Dispatched {
            case: CaseId(2),
            ambulance: AmbulanceId(1),
            timestamp: 5,
            from_queue: true
        })
    );

    let records = sim.run().expect("run");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].case.id, CaseId(1));
    assert_eq!(records[0].delay, 0);
    assert_eq!(records[1].case.id, CaseId(2));
    assert_eq!(records[1].delay, 4);
    assert_eq!(records[1].case.times_queued, 1);
    assert_eq!(records[1].assigned_at, 5);
    assert_eq!(records[1].finished_at, Some(10));
    assert_eq!(sim.counts().finished, 2);
    assert!(sim.ambulances()[0].is_available());
}

#[test]
fn pending_cases_are_served_in_arrival_order() {
    let mut sim = fixed_sim(1, &[0, 1, 2, 3], 10);
    let records = sim.run().expect("run");

    let order: Vec<u64> = records.iter().map(|r| r.case.id.0).collect();
    let delays: Vec<u64> = records.iter().map(|r| r.delay).collect();
    assert_eq!(order, vec![1, 2, 3, 4]);
    assert_eq!(delays, vec![0, 9, 18, 27]);
    assert_eq!(sim.telemetry().max_pending, 3);
    assert_eq!(sim.telemetry().queued, 3);
}

#[test]
fn spare_capacity_means_no_delay() {
    let mut sim = fixed_sim(3, &[0, 1, 2], 10);
    let records = sim.run().expect("run");
    assert!(records.iter().all(|r| r.delay == 0 && r.case.times_queued == 0));
    let ambulances: Vec<u32> = records.iter().map(|r| r.ambulance.0).collect();
    assert_eq!(ambulances, vec![1, 2, 3]);
}

#[test]
fn declined_case_waits_for_a_release() {
    // Two ambulances, but the policy only ever sends ambulance 1.
    let mut sim = with_selector(2, &[0, 2], 10, OnlyAmbulance(AmbulanceId(1)));

    sim.step().expect("dispatch case 1");
    assert_eq!(
        sim.step().expect("arrival"),
        Some(StepOutcome::Queued {
            case: CaseId(2),
            timestamp: 2
        })
    );
    assert_eq!(
        sim.step().expect("retry"),
        Some(StepOutcome::Declined {
            case: CaseId(2),
            timestamp: 2
        })
    );
    assert!(sim.is_backlog_blocked());
    let waiting: Vec<CaseId> = sim.pending_cases().map(|c| c.id).collect();
    assert_eq!(waiting, vec![CaseId(2)]);

    assert!(matches!(
        sim.step().expect("release"),
        Some(StepOutcome::Finished { case: CaseId(1), .. })
    ));
    assert!(!sim.is_backlog_blocked());

    let records = sim.run().expect("run");
    assert_eq!(records.len(), 2);
    let second = &records[1];
    assert_eq!(second.case.id, CaseId(2));
    assert_eq!(second.ambulance, AmbulanceId(1));
    assert_eq!(second.delay, 8);
    assert_eq!(second.finished_at, Some(20));
    assert_eq!(sim.telemetry().declines, 2);
}

#[test]
fn selector_must_pick_an_available_ambulance() {
    let mut sim = with_selector(2, &[0], 10, FixedSelector(AmbulanceId(99)));
    assert_eq!(sim.step(), Err(SimError::UnknownAmbulance(AmbulanceId(99))));

    // Ambulance 1 is busy with case 1 when case 2 arrives.
    let mut sim = with_selector(2, &[0, 1], 10, FixedSelector(AmbulanceId(1)));
    sim.step().expect("dispatch case 1");
    assert_eq!(sim.step(), Err(SimError::UnknownAmbulance(AmbulanceId(1))));
}

#[test]
fn simultaneous_completions_finish_lowest_case_first() {
    let mut sim = fixed_sim(3, &[0, 0, 0], 7);
    let mut finished = Vec::new();
    sim.run_with_hook(|_, outcome| {
        if let StepOutcome::Finished { case, timestamp, .. } = outcome {
            finished.push((*timestamp, case.0));
        }
    })
    .expect("run");
    assert_eq!(finished, vec![(7, 1), (7, 2), (7, 3)]);
}
