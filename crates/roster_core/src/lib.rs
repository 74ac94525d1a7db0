use std::{collections::HashSet, sync::Arc};

use chrono::{Local, NaiveDate};
use shared::{
    domain::{Employee, EmployeeId, EmployeeInput, Team, TeamId, TeamSelection},
    error::{ApiError, ErrorCode},
    validation::{validate_employee, validate_team_name, ValidationError, ValidationErrors},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod filter;
pub mod gateway;
pub mod notify;
pub mod store;
pub mod workflow;

pub use filter::{FilterController, RosterView, TeamSection};
pub use gateway::{GatewayResult, HttpGateway, RemoteGateway, DEFAULT_API_BASE_URL};
pub use notify::{NotificationRelay, TracingRelay};
pub use store::{EntityStore, StoreError, TeamRemoval};
pub use workflow::{
    ConfirmRequest, EmployeeFormRequest, EntityKey, MutationKind, MutationOutcome,
    MutationWorkflow, Phase, Prompt, PromptResult, TeamNameRequest,
};

use workflow::InFlight;

/// Change notifications for whoever renders the roster. Consumers recompute
/// their view from [`RosterSession::view`] on receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    StoreChanged {
        revision: u64,
    },
    SelectionChanged(TeamSelection),
    WorkflowPhaseChanged {
        kind: MutationKind,
        target: EntityKey,
        phase: Phase,
    },
}

struct SessionState {
    store: EntityStore,
    filter: FilterController,
}

impl SessionState {
    /// Resets a selection that points at a team no longer in the store.
    fn repair_selection(&mut self) -> bool {
        match self.filter.selected() {
            TeamSelection::Team(id) if !self.store.contains_team(id) => self.filter.forget_team(id),
            _ => false,
        }
    }
}

/// A record just created on the server, resolved against the store.
struct Created<T> {
    record: T,
    revision: u64,
    selection_reset: bool,
}

/// The entry of `fresh` that is not yet in the store, preferring one that
/// looks like what was submitted.
fn pick_new<'a, T>(
    fresh: &'a [T],
    is_known: impl Fn(&T) -> bool,
    is_submitted: impl Fn(&T) -> bool,
) -> Option<&'a T> {
    let unseen: Vec<&T> = fresh.iter().filter(|item| !is_known(*item)).collect();
    unseen
        .iter()
        .rev()
        .find(|item| is_submitted(**item))
        .or(unseen.last())
        .copied()
}

fn reload_failed(what: &str, err: ApiError) -> ApiError {
    let detail = format!("{}: {}", err.message, err.detail_or_unspecified());
    ApiError::new(
        err.code,
        format!("The {what} was saved, but the roster could not be reloaded."),
    )
    .with_detail(detail)
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Owns the entity store and selection for one operator session and drives
/// every mutation through its workflow.
pub struct RosterSession {
    gateway: Arc<dyn RemoteGateway>,
    relay: Arc<dyn NotificationRelay>,
    prompt: Arc<dyn Prompt>,
    inner: Mutex<SessionState>,
    in_flight: InFlight,
    events: broadcast::Sender<RosterEvent>,
    today: fn() -> NaiveDate,
}

impl RosterSession {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        relay: Arc<dyn NotificationRelay>,
        prompt: Arc<dyn Prompt>,
    ) -> Arc<Self> {
        Self::new_with_clock(gateway, relay, prompt, local_today)
    }

    /// `today` bounds hire dates during validation.
    pub fn new_with_clock(
        gateway: Arc<dyn RemoteGateway>,
        relay: Arc<dyn NotificationRelay>,
        prompt: Arc<dyn Prompt>,
        today: fn() -> NaiveDate,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            gateway,
            relay,
            prompt,
            inner: Mutex::new(SessionState {
                store: EntityStore::new(),
                filter: FilterController::new(),
            }),
            in_flight: InFlight::default(),
            events,
            today,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RosterEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: RosterEvent) {
        let _ = self.events.send(event);
    }

    pub async fn view(&self) -> RosterView {
        let guard = self.inner.lock().await;
        RosterView::compute(&guard.store, &guard.filter)
    }

    pub async fn store_snapshot(&self) -> EntityStore {
        self.inner.lock().await.store.clone()
    }

    pub async fn teams(&self) -> Vec<Team> {
        self.inner.lock().await.store.teams().to_vec()
    }

    pub async fn employees_for_team(&self, team_id: TeamId) -> Vec<Employee> {
        let guard = self.inner.lock().await;
        guard
            .store
            .employees_for_team(team_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn selection(&self) -> TeamSelection {
        self.inner.lock().await.filter.selected()
    }

    /// Whether the UI should disable actions on `key` right now.
    pub fn is_locked(&self, key: EntityKey) -> bool {
        self.in_flight.is_locked(key)
    }

    /// Narrows the view. A team that is not in the store falls back to `All`
    /// so the selection never points at a missing team.
    pub async fn select_team(&self, selection: TeamSelection) -> RosterView {
        let view = {
            let mut guard = self.inner.lock().await;
            let effective = match selection {
                TeamSelection::Team(id) if !guard.store.contains_team(id) => {
                    warn!(team_id = id.0, "filter: unknown team selected; showing all");
                    TeamSelection::All
                }
                other => other,
            };
            guard.filter.select(effective);
            RosterView::compute(&guard.store, &guard.filter)
        };
        self.publish(RosterEvent::SelectionChanged(view.selection));
        view
    }

    pub async fn load_teams(&self) -> Result<usize, ApiError> {
        let reply = match self.gateway.list_teams().await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(code = ?err.code, "roster: loading teams failed: {}", err.message);
                self.relay.show_error(&err);
                return Err(err);
            }
        };

        let (count, revision, reset) = {
            let mut guard = self.inner.lock().await;
            guard.store.replace_teams(reply.data);
            let reset = guard.repair_selection();
            (guard.store.teams().len(), guard.store.revision(), reset)
        };

        info!(count, "roster: teams loaded");
        self.publish(RosterEvent::StoreChanged { revision });
        if reset {
            self.publish(RosterEvent::SelectionChanged(TeamSelection::All));
        }
        Ok(count)
    }

    pub async fn load_employees(&self) -> Result<usize, ApiError> {
        let reply = match self.gateway.list_employees().await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(code = ?err.code, "roster: loading employees failed: {}", err.message);
                self.relay.show_error(&err);
                return Err(err);
            }
        };

        let (count, revision) = {
            let mut guard = self.inner.lock().await;
            guard.store.replace_employees(reply.data);
            (guard.store.employees().len(), guard.store.revision())
        };

        info!(count, "roster: employees loaded");
        self.publish(RosterEvent::StoreChanged { revision });
        Ok(count)
    }

    /// Loads both collections. Each failure is reported; the first one is
    /// returned.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let teams = self.load_teams().await;
        let employees = self.load_employees().await;
        teams.and(employees).map(|_| ())
    }

    pub async fn download_summary(&self) -> Result<Vec<u8>, ApiError> {
        match self.gateway.download_summary().await {
            Ok(bytes) => {
                info!(bytes = bytes.len(), "roster: summary downloaded");
                Ok(bytes)
            }
            Err(err) => {
                self.relay.show_error(&err);
                Err(err)
            }
        }
    }

    pub async fn create_team(&self) -> MutationOutcome<Team> {
        let key = EntityKey::NewTeam;
        let mut flow = MutationWorkflow::new(MutationKind::CreateTeam, key, self.events.clone());
        if self.in_flight.is_locked(key) {
            return MutationOutcome::Busy(key);
        }

        flow.begin_input();
        let Some(name) = self
            .collect_team_name(flow.kind(), "Add a new team".to_string(), String::new())
            .await
        else {
            flow.cancel();
            return MutationOutcome::Cancelled;
        };

        let Some(_lock) = self.in_flight.try_lock(key) else {
            flow.cancel();
            return MutationOutcome::Busy(key);
        };
        flow.submit();

        let reply = match self.gateway.create_team(&name).await {
            Ok(reply) => reply,
            Err(err) => return self.fail(&mut flow, err),
        };

        match self.apply_created_team(reply.data).await {
            Ok(created) => {
                let team = created.record;
                info!(team_id = team.id.0, "roster: team created");
                if created.selection_reset {
                    self.publish(RosterEvent::SelectionChanged(TeamSelection::All));
                }
                let fallback = format!("Team {} has been added.", team.name);
                self.succeed(&mut flow, created.revision, reply.message, fallback);
                MutationOutcome::Applied(team)
            }
            Err(err) => self.fail(&mut flow, err),
        }
    }

    pub async fn rename_team(&self, team_id: TeamId) -> MutationOutcome<Team> {
        let key = EntityKey::Team(team_id);
        let mut flow = MutationWorkflow::new(MutationKind::RenameTeam, key, self.events.clone());
        if self.in_flight.is_locked(key) {
            return MutationOutcome::Busy(key);
        }
        let Some(current) = self.find_team(team_id).await else {
            return self.missing(StoreError::UnknownTeam(team_id));
        };

        flow.begin_input();
        let Some(name) = self
            .collect_team_name(
                flow.kind(),
                format!("Rename team {}", current.name),
                current.name.clone(),
            )
            .await
        else {
            flow.cancel();
            return MutationOutcome::Cancelled;
        };

        let Some(_lock) = self.in_flight.try_lock(key) else {
            flow.cancel();
            return MutationOutcome::Busy(key);
        };
        flow.submit();

        let reply = match self.gateway.rename_team(team_id, &name).await {
            Ok(reply) => reply,
            Err(err) => return self.fail(&mut flow, err),
        };

        let renamed = Team {
            id: team_id,
            name: reply.data.name,
        };
        let applied = {
            let mut guard = self.inner.lock().await;
            guard
                .store
                .apply_team_renamed(team_id, &renamed.name)
                .map(|()| guard.store.revision())
        };
        match applied {
            Ok(revision) => {
                info!(team_id = team_id.0, "roster: team renamed");
                let fallback = format!("Team {} has been renamed to {}.", current.name, renamed.name);
                self.succeed(&mut flow, revision, reply.message, fallback);
                MutationOutcome::Applied(renamed)
            }
            Err(err) => self.fail(&mut flow, err.into()),
        }
    }

    /// Deleting a team also drops every employee assigned to it from the
    /// store, and clears a selection pointing at it.
    pub async fn delete_team(&self, team_id: TeamId) -> MutationOutcome<TeamRemoval> {
        let key = EntityKey::Team(team_id);
        let mut flow = MutationWorkflow::new(MutationKind::DeleteTeam, key, self.events.clone());
        if self.in_flight.is_locked(key) {
            return MutationOutcome::Busy(key);
        }
        let Some(team) = self.find_team(team_id).await else {
            return self.missing(StoreError::UnknownTeam(team_id));
        };
        let members = self.employees_for_team(team_id).await.len();

        flow.begin_input();
        let text = if members == 0 {
            format!("Are you sure you want to delete {}?", team.name)
        } else {
            format!(
                "Are you sure you want to delete {}? Its {members} employee(s) will be removed too.",
                team.name
            )
        };
        if let PromptResult::Cancelled = self
            .prompt
            .confirm(ConfirmRequest {
                kind: flow.kind(),
                text,
            })
            .await
        {
            flow.cancel();
            return MutationOutcome::Cancelled;
        }

        let Some(_lock) = self.in_flight.try_lock(key) else {
            flow.cancel();
            return MutationOutcome::Busy(key);
        };
        flow.submit();

        let reply = match self.gateway.delete_team(team_id).await {
            Ok(reply) => reply,
            Err(err) => return self.fail(&mut flow, err),
        };

        let applied = {
            let mut guard = self.inner.lock().await;
            match guard.store.apply_team_deleted(team_id) {
                Ok(removal) => {
                    let reset = guard.filter.forget_team(team_id);
                    Ok((removal, guard.store.revision(), reset))
                }
                Err(err) => Err(err),
            }
        };
        match applied {
            Ok((removal, revision, reset)) => {
                info!(
                    team_id = team_id.0,
                    employees_removed = removal.employees.len(),
                    "roster: team deleted"
                );
                if reset {
                    self.publish(RosterEvent::SelectionChanged(TeamSelection::All));
                }
                let fallback = format!("Team {} has been deleted.", removal.team.name);
                self.succeed(&mut flow, revision, reply.message, fallback);
                MutationOutcome::Applied(removal)
            }
            Err(err) => self.fail(&mut flow, err.into()),
        }
    }

    pub async fn create_employee(&self, team_id: TeamId) -> MutationOutcome<Employee> {
        let key = EntityKey::NewEmployee(team_id);
        let mut flow =
            MutationWorkflow::new(MutationKind::CreateEmployee, key, self.events.clone());
        if self.in_flight.is_locked(key) {
            return MutationOutcome::Busy(key);
        }
        // A team with a call in flight may be on its way out.
        let team_key = EntityKey::Team(team_id);
        if self.in_flight.is_locked(team_key) {
            return MutationOutcome::Busy(team_key);
        }
        let Some(team) = self.find_team(team_id).await else {
            return self.missing(StoreError::UnknownTeam(team_id));
        };

        flow.begin_input();
        let Some(input) = self
            .collect_employee(
                flow.kind(),
                format!("Add a new employee to {}", team.name),
                EmployeeInput::for_team(team_id),
            )
            .await
        else {
            flow.cancel();
            return MutationOutcome::Cancelled;
        };

        let target_team = EntityKey::Team(input.team_id);
        if self.in_flight.is_locked(target_team) {
            flow.cancel();
            return MutationOutcome::Busy(target_team);
        }
        let Some(_lock) = self.in_flight.try_lock(key) else {
            flow.cancel();
            return MutationOutcome::Busy(key);
        };
        flow.submit();

        let reply = match self.gateway.create_employee(&input).await {
            Ok(reply) => reply,
            Err(err) => return self.fail(&mut flow, err),
        };

        match self.apply_created_employee(reply.data, &input).await {
            Ok(created) => {
                let employee = created.record;
                info!(
                    employee_id = employee.id.0,
                    team_id = employee.team_id.0,
                    "roster: employee created"
                );
                let fallback = format!("Employee {} has been added.", employee.full_name());
                self.succeed(&mut flow, created.revision, reply.message, fallback);
                MutationOutcome::Applied(employee)
            }
            Err(err) => self.fail(&mut flow, err),
        }
    }

    pub async fn edit_employee(&self, employee_id: EmployeeId) -> MutationOutcome<Employee> {
        let key = EntityKey::Employee(employee_id);
        let mut flow = MutationWorkflow::new(MutationKind::EditEmployee, key, self.events.clone());
        if self.in_flight.is_locked(key) {
            return MutationOutcome::Busy(key);
        }
        let Some(current) = self.find_employee(employee_id).await else {
            return self.missing(StoreError::UnknownEmployee(employee_id));
        };

        flow.begin_input();
        let Some(input) = self
            .collect_employee(
                flow.kind(),
                format!("Edit employee {}", current.full_name()),
                current.to_input(),
            )
            .await
        else {
            flow.cancel();
            return MutationOutcome::Cancelled;
        };
        let Some(updated) = input.into_employee(employee_id) else {
            flow.cancel();
            return MutationOutcome::Cancelled;
        };

        let Some(_lock) = self.in_flight.try_lock(key) else {
            flow.cancel();
            return MutationOutcome::Busy(key);
        };
        flow.submit();

        let reply = match self.gateway.update_employee(&updated).await {
            Ok(reply) => reply,
            Err(err) => return self.fail(&mut flow, err),
        };

        let employee = Employee {
            id: employee_id,
            ..reply.data
        };
        let applied = {
            let mut guard = self.inner.lock().await;
            guard
                .store
                .apply_employee_updated(employee.clone())
                .map(|()| guard.store.revision())
        };
        match applied {
            Ok(revision) => {
                info!(employee_id = employee_id.0, "roster: employee updated");
                let fallback = format!("Employee {} has been updated.", employee.full_name());
                self.succeed(&mut flow, revision, reply.message, fallback);
                MutationOutcome::Applied(employee)
            }
            Err(err) => self.fail(&mut flow, err.into()),
        }
    }

    pub async fn delete_employee(&self, employee_id: EmployeeId) -> MutationOutcome<Employee> {
        let key = EntityKey::Employee(employee_id);
        let mut flow =
            MutationWorkflow::new(MutationKind::DeleteEmployee, key, self.events.clone());
        if self.in_flight.is_locked(key) {
            return MutationOutcome::Busy(key);
        }
        let Some(employee) = self.find_employee(employee_id).await else {
            return self.missing(StoreError::UnknownEmployee(employee_id));
        };

        flow.begin_input();
        let text = format!(
            "Are you sure you want to delete employee {}?",
            employee.full_name()
        );
        if let PromptResult::Cancelled = self
            .prompt
            .confirm(ConfirmRequest {
                kind: flow.kind(),
                text,
            })
            .await
        {
            flow.cancel();
            return MutationOutcome::Cancelled;
        }

        let Some(_lock) = self.in_flight.try_lock(key) else {
            flow.cancel();
            return MutationOutcome::Busy(key);
        };
        flow.submit();

        let reply = match self.gateway.delete_employee(employee_id).await {
            Ok(reply) => reply,
            Err(err) => return self.fail(&mut flow, err),
        };

        let applied = {
            let mut guard = self.inner.lock().await;
            guard
                .store
                .apply_employee_deleted(employee_id)
                .map(|removed| (removed, guard.store.revision()))
        };
        match applied {
            Ok((removed, revision)) => {
                info!(employee_id = employee_id.0, "roster: employee deleted");
                let fallback = format!("Employee {} has been deleted.", removed.full_name());
                self.succeed(&mut flow, revision, reply.message, fallback);
                MutationOutcome::Applied(removed)
            }
            Err(err) => self.fail(&mut flow, err.into()),
        }
    }

    /// Applies a created team. A reply without a server-assigned id is
    /// resolved by reloading the team list and taking the new entry from it.
    async fn apply_created_team(&self, echoed: Team) -> Result<Created<Team>, ApiError> {
        if echoed.id.0 > 0 {
            let mut guard = self.inner.lock().await;
            guard.store.apply_team_created(echoed.clone())?;
            return Ok(Created {
                record: echoed,
                revision: guard.store.revision(),
                selection_reset: false,
            });
        }

        debug!(team_name = %echoed.name, "roster: create reply carries no id; reloading teams");
        let fresh = self
            .gateway
            .list_teams()
            .await
            .map_err(|err| reload_failed("team", err))?
            .data;

        let mut guard = self.inner.lock().await;
        let known: HashSet<TeamId> = guard.store.teams().iter().map(|team| team.id).collect();
        let record = pick_new(
            &fresh,
            |team| known.contains(&team.id),
            |team| team.name == echoed.name,
        )
        .cloned();
        guard.store.replace_teams(fresh);
        let selection_reset = guard.repair_selection();
        let record = record.ok_or_else(|| {
            ApiError::new(
                ErrorCode::Inconsistent,
                "The team was saved but is missing from the reloaded roster.",
            )
        })?;
        Ok(Created {
            record,
            revision: guard.store.revision(),
            selection_reset,
        })
    }

    /// Employee counterpart of [`Self::apply_created_team`]. `submitted` is
    /// the form the server accepted.
    async fn apply_created_employee(
        &self,
        echoed: Employee,
        submitted: &EmployeeInput,
    ) -> Result<Created<Employee>, ApiError> {
        if echoed.id.0 > 0 {
            let mut guard = self.inner.lock().await;
            guard.store.apply_employee_created(echoed.clone())?;
            return Ok(Created {
                record: echoed,
                revision: guard.store.revision(),
                selection_reset: false,
            });
        }

        debug!(
            team_id = echoed.team_id.0,
            "roster: create reply carries no id; reloading employees"
        );
        let fresh = self
            .gateway
            .list_employees()
            .await
            .map_err(|err| reload_failed("employee", err))?
            .data;

        let mut guard = self.inner.lock().await;
        let known: HashSet<EmployeeId> = guard
            .store
            .employees()
            .iter()
            .map(|employee| employee.id)
            .collect();
        let record = pick_new(
            &fresh,
            |employee| known.contains(&employee.id),
            |employee| employee.to_input() == *submitted,
        )
        .cloned();
        guard.store.replace_employees(fresh);
        let record = record.ok_or_else(|| {
            ApiError::new(
                ErrorCode::Inconsistent,
                "The employee was saved but is missing from the reloaded roster.",
            )
        })?;
        Ok(Created {
            record,
            revision: guard.store.revision(),
            selection_reset: false,
        })
    }

    async fn find_team(&self, team_id: TeamId) -> Option<Team> {
        self.inner.lock().await.store.team(team_id).cloned()
    }

    async fn find_employee(&self, employee_id: EmployeeId) -> Option<Employee> {
        self.inner.lock().await.store.employee(employee_id).cloned()
    }

    /// Re-presents the form until the name validates or the user cancels.
    async fn collect_team_name(
        &self,
        kind: MutationKind,
        title: String,
        mut current: String,
    ) -> Option<String> {
        let mut errors = None;
        loop {
            let request = TeamNameRequest {
                kind,
                title: title.clone(),
                current: current.clone(),
                errors: errors.take(),
            };
            match self.prompt.team_name(request).await {
                PromptResult::Cancelled => return None,
                PromptResult::Confirmed(name) => {
                    let name = name.trim().to_string();
                    match validate_team_name(&name) {
                        Ok(()) => return Some(name),
                        Err(errs) => {
                            debug!(kind = kind.as_str(), "workflow: team name rejected: {errs}");
                            current = name;
                            errors = Some(errs);
                        }
                    }
                }
            }
        }
    }

    async fn collect_employee(
        &self,
        kind: MutationKind,
        title: String,
        mut current: EmployeeInput,
    ) -> Option<EmployeeInput> {
        let mut errors = None;
        loop {
            let request = EmployeeFormRequest {
                kind,
                title: title.clone(),
                current: current.clone(),
                teams: self.teams().await,
                errors: errors.take(),
            };
            match self.prompt.employee_form(request).await {
                PromptResult::Cancelled => return None,
                PromptResult::Confirmed(input) => match self.validate_employee_input(&input).await
                {
                    Ok(()) => return Some(input),
                    Err(errs) => {
                        debug!(kind = kind.as_str(), "workflow: employee form rejected: {errs}");
                        current = input;
                        errors = Some(errs);
                    }
                },
            }
        }
    }

    async fn validate_employee_input(&self, input: &EmployeeInput) -> Result<(), ValidationErrors> {
        let mut errors = match validate_employee(input, (self.today)()) {
            Ok(()) => ValidationErrors::default(),
            Err(errors) => errors,
        };
        if input.team_id.0 > 0 && self.find_team(input.team_id).await.is_none() {
            errors.push(ValidationError::UnknownTeam(input.team_id.0));
        }
        errors.into_result()
    }

    fn succeed(
        &self,
        flow: &mut MutationWorkflow,
        revision: u64,
        server_message: Option<String>,
        fallback: String,
    ) {
        self.publish(RosterEvent::StoreChanged { revision });
        flow.applied();
        let message = server_message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or(fallback);
        self.relay.show_info(&message);
    }

    fn fail<T>(&self, flow: &mut MutationWorkflow, err: ApiError) -> MutationOutcome<T> {
        warn!(
            kind = flow.kind().as_str(),
            entity = %flow.target(),
            code = ?err.code,
            "roster: mutation failed: {}",
            err.message
        );
        flow.failed();
        self.relay.show_error(&err);
        MutationOutcome::Failed(err)
    }

    /// The target vanished before the workflow could start.
    fn missing<T>(&self, err: StoreError) -> MutationOutcome<T> {
        let err = ApiError::from(err);
        warn!(code = ?ErrorCode::Inconsistent, "roster: {}", err.detail_or_unspecified());
        self.relay.show_error(&err);
        MutationOutcome::Failed(err)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
