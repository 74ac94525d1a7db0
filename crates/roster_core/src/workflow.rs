//! Confirm-then-commit state machine shared by every roster mutation.
//!
//! A workflow runs `Idle -> AwaitingUserInput -> AwaitingServer -> Applied -> Idle`.
//! Cancelling the input step returns straight to `Idle`; a failed server call
//! returns to `Idle` from `AwaitingServer`. Once `AwaitingServer` is entered
//! the call always runs to completion.

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use shared::{
    domain::{EmployeeId, EmployeeInput, Team, TeamId},
    error::ApiError,
    validation::ValidationErrors,
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::RosterEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    CreateTeam,
    RenameTeam,
    DeleteTeam,
    CreateEmployee,
    EditEmployee,
    DeleteEmployee,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::CreateTeam => "create_team",
            MutationKind::RenameTeam => "rename_team",
            MutationKind::DeleteTeam => "delete_team",
            MutationKind::CreateEmployee => "create_employee",
            MutationKind::EditEmployee => "edit_employee",
            MutationKind::DeleteEmployee => "delete_employee",
        }
    }
}

/// The entity a workflow holds the courtesy lock on while its server call is
/// in flight. Creations lock a placeholder so a second submit of the same
/// form is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Team(TeamId),
    Employee(EmployeeId),
    NewTeam,
    NewEmployee(TeamId),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Team(id) => write!(f, "team {id}"),
            EntityKey::Employee(id) => write!(f, "employee {id}"),
            EntityKey::NewTeam => f.write_str("new team"),
            EntityKey::NewEmployee(team_id) => write!(f, "new employee in team {team_id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingUserInput,
    AwaitingServer,
    Applied,
}

impl Phase {
    pub fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Idle, Phase::AwaitingUserInput)
                | (Phase::AwaitingUserInput, Phase::Idle)
                | (Phase::AwaitingUserInput, Phase::AwaitingServer)
                | (Phase::AwaitingServer, Phase::Applied)
                | (Phase::AwaitingServer, Phase::Idle)
                | (Phase::Applied, Phase::Idle)
        )
    }
}

/// Result of a confirmation or edit step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResult<T> {
    Cancelled,
    Confirmed(T),
}

#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub kind: MutationKind,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct TeamNameRequest {
    pub kind: MutationKind,
    pub title: String,
    pub current: String,
    /// Field errors from the previous submission, shown inline.
    pub errors: Option<ValidationErrors>,
}

#[derive(Debug, Clone)]
pub struct EmployeeFormRequest {
    pub kind: MutationKind,
    pub title: String,
    pub current: EmployeeInput,
    /// Teams the employee can be assigned to.
    pub teams: Vec<Team>,
    pub errors: Option<ValidationErrors>,
}

/// The input step of a workflow: a modal, a terminal prompt, or a script.
#[async_trait]
pub trait Prompt: Send + Sync {
    async fn confirm(&self, request: ConfirmRequest) -> PromptResult<()>;
    async fn team_name(&self, request: TeamNameRequest) -> PromptResult<String>;
    async fn employee_form(&self, request: EmployeeFormRequest) -> PromptResult<EmployeeInput>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome<T> {
    Applied(T),
    Cancelled,
    /// The target already has a server call in flight.
    Busy(EntityKey),
    Failed(ApiError),
}

impl<T> MutationOutcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied(_))
    }

    pub fn applied(&self) -> Option<&T> {
        match self {
            MutationOutcome::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            MutationOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// One run of the state machine for a single action.
pub struct MutationWorkflow {
    kind: MutationKind,
    target: EntityKey,
    phase: Phase,
    events: broadcast::Sender<RosterEvent>,
}

impl MutationWorkflow {
    pub fn new(
        kind: MutationKind,
        target: EntityKey,
        events: broadcast::Sender<RosterEvent>,
    ) -> Self {
        Self {
            kind,
            target,
            phase: Phase::Idle,
            events,
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn target(&self) -> EntityKey {
        self.target
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn begin_input(&mut self) {
        self.advance(Phase::AwaitingUserInput);
    }

    pub fn cancel(&mut self) {
        self.advance(Phase::Idle);
    }

    pub fn submit(&mut self) {
        self.advance(Phase::AwaitingServer);
    }

    /// Server call succeeded and the store has been updated.
    pub fn applied(&mut self) {
        self.advance(Phase::Applied);
        self.advance(Phase::Idle);
    }

    pub fn failed(&mut self) {
        self.advance(Phase::Idle);
    }

    fn advance(&mut self, next: Phase) {
        if !self.phase.can_advance_to(next) {
            warn!(
                kind = self.kind.as_str(),
                from = ?self.phase,
                to = ?next,
                "workflow: ignoring invalid transition"
            );
            return;
        }
        debug!(
            kind = self.kind.as_str(),
            entity = %self.target,
            from = ?self.phase,
            to = ?next,
            "workflow: transition"
        );
        self.phase = next;
        let _ = self.events.send(RosterEvent::WorkflowPhaseChanged {
            kind: self.kind,
            target: self.target,
            phase: next,
        });
    }
}

/// Entities with a server call in flight. Purely a client-side courtesy lock.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<EntityKey>>>,
}

impl InFlight {
    pub fn is_locked(&self, key: EntityKey) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }

    pub fn try_lock(&self, key: EntityKey) -> Option<InFlightGuard> {
        let inserted = self
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
        inserted.then(|| InFlightGuard {
            keys: Arc::clone(&self.keys),
            key,
        })
    }
}

/// Releases the lock when dropped, including when the owning future is
/// dropped mid-call.
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<EntityKey>>>,
    key: EntityKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
