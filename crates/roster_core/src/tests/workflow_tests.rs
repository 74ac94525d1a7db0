use super::*;
use shared::domain::TeamId;

fn drain(rx: &mut broadcast::Receiver<RosterEvent>) -> Vec<Phase> {
    let mut phases = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let RosterEvent::WorkflowPhaseChanged { phase, .. } = event {
            phases.push(phase);
        }
    }
    phases
}

#[test]
fn only_documented_transitions_are_allowed() {
    use Phase::*;
    let all = [Idle, AwaitingUserInput, AwaitingServer, Applied];
    let allowed = [
        (Idle, AwaitingUserInput),
        (AwaitingUserInput, Idle),
        (AwaitingUserInput, AwaitingServer),
        (AwaitingServer, Applied),
        (AwaitingServer, Idle),
        (Applied, Idle),
    ];
    for from in all {
        for to in all {
            assert_eq!(
                from.can_advance_to(to),
                allowed.contains(&(from, to)),
                "{from:?} -> {to:?}"
            );
        }
    }
}

#[test]
fn successful_run_passes_through_applied_back_to_idle() {
    let (tx, mut rx) = broadcast::channel(16);
    let mut flow = MutationWorkflow::new(MutationKind::CreateTeam, EntityKey::NewTeam, tx);

    flow.begin_input();
    flow.submit();
    flow.applied();

    assert_eq!(flow.phase(), Phase::Idle);
    assert_eq!(
        drain(&mut rx),
        vec![
            Phase::AwaitingUserInput,
            Phase::AwaitingServer,
            Phase::Applied,
            Phase::Idle
        ]
    );
}

#[test]
fn cancel_from_input_returns_to_idle_without_server_phase() {
    let (tx, mut rx) = broadcast::channel(16);
    let mut flow =
        MutationWorkflow::new(MutationKind::DeleteTeam, EntityKey::Team(TeamId(1)), tx);

    flow.begin_input();
    flow.cancel();

    assert_eq!(flow.phase(), Phase::Idle);
    assert_eq!(drain(&mut rx), vec![Phase::AwaitingUserInput, Phase::Idle]);
}

#[test]
fn invalid_transition_is_ignored() {
    let (tx, mut rx) = broadcast::channel(16);
    let mut flow = MutationWorkflow::new(MutationKind::CreateTeam, EntityKey::NewTeam, tx);

    flow.submit();
    flow.applied();

    assert_eq!(flow.phase(), Phase::Idle);
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn failure_after_submit_returns_to_idle() {
    let (tx, _rx) = broadcast::channel(16);
    let mut flow = MutationWorkflow::new(
        MutationKind::EditEmployee,
        EntityKey::Employee(EmployeeId(3)),
        tx,
    );
    flow.begin_input();
    flow.submit();
    assert_eq!(flow.phase(), Phase::AwaitingServer);
    flow.failed();
    assert_eq!(flow.phase(), Phase::Idle);
}

#[test]
fn in_flight_lock_is_exclusive_until_guard_drops() {
    let in_flight = InFlight::default();
    let key = EntityKey::Team(TeamId(1));

    let guard = in_flight.try_lock(key).expect("first lock");
    assert!(in_flight.is_locked(key));
    assert!(in_flight.try_lock(key).is_none());
    assert!(in_flight.try_lock(EntityKey::Team(TeamId(2))).is_some());

    drop(guard);
    assert!(!in_flight.is_locked(key));
    assert!(in_flight.try_lock(key).is_some());
}

#[test]
fn outcome_accessors() {
    let applied: MutationOutcome<u8> = MutationOutcome::Applied(7);
    assert!(applied.is_applied());
    assert_eq!(applied.applied(), Some(&7));
    assert!(applied.error().is_none());

    let failed: MutationOutcome<u8> =
        MutationOutcome::Failed(ApiError::generic(shared::error::ErrorCode::Server));
    assert!(!failed.is_applied());
    assert!(failed.error().is_some());
}
