//! Team selection and the roster view derived from it.

use shared::domain::{Employee, Team, TeamId, TeamSelection};

use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterController {
    selected: TeamSelection,
}

impl FilterController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> TeamSelection {
        self.selected
    }

    pub fn select(&mut self, selection: TeamSelection) {
        self.selected = selection;
    }

    /// Falls back to `All` when the selected team has just been deleted.
    /// Returns whether the selection changed.
    pub fn forget_team(&mut self, team_id: TeamId) -> bool {
        if self.selected == TeamSelection::Team(team_id) {
            self.selected = TeamSelection::All;
            return true;
        }
        false
    }

    /// `All` passes every team through in order; a team selection yields that
    /// one team, or nothing when it no longer exists.
    pub fn visible_teams<'a>(&self, all_teams: &'a [Team]) -> Vec<&'a Team> {
        match self.selected {
            TeamSelection::All => all_teams.iter().collect(),
            TeamSelection::Team(id) => all_teams.iter().filter(|team| team.id == id).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSection {
    pub team: Team,
    pub employees: Vec<Employee>,
}

/// Snapshot of what should be on screen. Recomputed from the store after each
/// mutation rather than patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterView {
    pub selection: TeamSelection,
    pub revision: u64,
    pub sections: Vec<TeamSection>,
}

impl RosterView {
    pub fn compute(store: &EntityStore, filter: &FilterController) -> Self {
        let sections = filter
            .visible_teams(store.teams())
            .into_iter()
            .map(|team| TeamSection {
                team: team.clone(),
                employees: store
                    .employees_for_team(team.id)
                    .into_iter()
                    .cloned()
                    .collect(),
            })
            .collect();

        Self {
            selection: filter.selected(),
            revision: store.revision(),
            sections,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/filter_tests.rs"]
mod tests;
