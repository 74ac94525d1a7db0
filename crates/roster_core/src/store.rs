//! In-memory cache of teams and employees.
//!
//! The store performs no I/O. Every `apply_*` method is called only after the
//! matching server call has succeeded; a method that finds its target missing
//! leaves the store untouched and reports a [`StoreError`].

use std::collections::HashSet;

use shared::{
    domain::{Employee, EmployeeId, Team, TeamId},
    error::{ApiError, ErrorCode},
};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("team {0} is no longer present")]
    UnknownTeam(TeamId),
    #[error("employee {0} is no longer present")]
    UnknownEmployee(EmployeeId),
    #[error("team {0} is already present")]
    DuplicateTeam(TeamId),
    #[error("employee {0} is already present")]
    DuplicateEmployee(EmployeeId),
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        ApiError::new(
            ErrorCode::Inconsistent,
            "The roster changed while this action was in progress; reload and try again.",
        )
        .with_detail(value.to_string())
    }
}

/// What a team deletion took with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRemoval {
    pub team: Team,
    pub employees: Vec<Employee>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityStore {
    teams: Vec<Team>,
    employees: Vec<Employee>,
    revision: u64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    /// Bumped on every mutation; lets observers tell whether a derived view
    /// is stale.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.iter().find(|team| team.id == id)
    }

    pub fn employee(&self, id: EmployeeId) -> Option<&Employee> {
        self.employees.iter().find(|employee| employee.id == id)
    }

    pub fn contains_team(&self, id: TeamId) -> bool {
        self.team(id).is_some()
    }

    /// Employees whose `team_id` matches, in store order. Always derived,
    /// never cached.
    pub fn employees_for_team(&self, team_id: TeamId) -> Vec<&Employee> {
        self.employees
            .iter()
            .filter(|employee| employee.team_id == team_id)
            .collect()
    }

    pub fn replace_teams(&mut self, teams: Vec<Team>) {
        let mut seen = HashSet::new();
        self.teams = teams
            .into_iter()
            .filter(|team| {
                let fresh = seen.insert(team.id);
                if !fresh {
                    warn!(team_id = team.id.0, "store: dropping duplicate team from fetch");
                }
                fresh
            })
            .collect();
        self.revision += 1;
    }

    pub fn replace_employees(&mut self, employees: Vec<Employee>) {
        let mut seen = HashSet::new();
        self.employees = employees
            .into_iter()
            .filter(|employee| {
                let fresh = seen.insert(employee.id);
                if !fresh {
                    warn!(
                        employee_id = employee.id.0,
                        "store: dropping duplicate employee from fetch"
                    );
                }
                fresh
            })
            .collect();
        self.revision += 1;
    }

    pub fn apply_team_created(&mut self, team: Team) -> Result<(), StoreError> {
        if self.contains_team(team.id) {
            return Err(StoreError::DuplicateTeam(team.id));
        }
        self.teams.push(team);
        self.revision += 1;
        Ok(())
    }

    pub fn apply_team_renamed(&mut self, id: TeamId, new_name: &str) -> Result<(), StoreError> {
        let team = self
            .teams
            .iter_mut()
            .find(|team| team.id == id)
            .ok_or(StoreError::UnknownTeam(id))?;
        team.name = new_name.to_string();
        self.revision += 1;
        Ok(())
    }

    /// Removes the team and cascades to every employee assigned to it.
    pub fn apply_team_deleted(&mut self, id: TeamId) -> Result<TeamRemoval, StoreError> {
        let index = self
            .teams
            .iter()
            .position(|team| team.id == id)
            .ok_or(StoreError::UnknownTeam(id))?;
        let team = self.teams.remove(index);

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.employees)
            .into_iter()
            .partition(|employee| employee.team_id == id);
        self.employees = kept;
        self.revision += 1;

        Ok(TeamRemoval {
            team,
            employees: removed,
        })
    }

    pub fn apply_employee_created(&mut self, employee: Employee) -> Result<(), StoreError> {
        if self.employee(employee.id).is_some() {
            return Err(StoreError::DuplicateEmployee(employee.id));
        }
        if !self.contains_team(employee.team_id) {
            return Err(StoreError::UnknownTeam(employee.team_id));
        }
        self.employees.push(employee);
        self.revision += 1;
        Ok(())
    }

    /// Replaces the stored record in place, keeping its position.
    pub fn apply_employee_updated(&mut self, employee: Employee) -> Result<(), StoreError> {
        if !self.contains_team(employee.team_id) {
            return Err(StoreError::UnknownTeam(employee.team_id));
        }
        let slot = self
            .employees
            .iter_mut()
            .find(|existing| existing.id == employee.id)
            .ok_or(StoreError::UnknownEmployee(employee.id))?;
        *slot = employee;
        self.revision += 1;
        Ok(())
    }

    pub fn apply_employee_deleted(&mut self, id: EmployeeId) -> Result<Employee, StoreError> {
        let index = self
            .employees
            .iter()
            .position(|employee| employee.id == id)
            .ok_or(StoreError::UnknownEmployee(id))?;
        let removed = self.employees.remove(index);
        self.revision += 1;
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
