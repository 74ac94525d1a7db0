use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(TeamId);
id_newtype!(EmployeeId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub hire_date: NaiveDate,
    pub role: String,
    pub team_id: TeamId,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Editable fields of this record, used to seed an edit form.
    pub fn to_input(&self) -> EmployeeInput {
        EmployeeInput {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            hire_date: Some(self.hire_date),
            role: self.role.clone(),
            team_id: self.team_id,
        }
    }
}

/// Employee fields as collected by a create/edit form, before the server has
/// assigned an id. `hire_date` is optional so that an unfilled form can be
/// represented and rejected by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub hire_date: Option<NaiveDate>,
    pub role: String,
    pub team_id: TeamId,
}

impl EmployeeInput {
    /// Blank form pre-scoped to a team.
    pub fn for_team(team_id: TeamId) -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            hire_date: None,
            role: String::new(),
            team_id,
        }
    }

    /// Materializes the record the server would hold under `id`.
    /// Returns `None` while the hire date is still missing.
    pub fn into_employee(self, id: EmployeeId) -> Option<Employee> {
        Some(Employee {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            hire_date: self.hire_date?,
            role: self.role,
            team_id: self.team_id,
        })
    }
}

/// Which teams the roster is narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TeamSelection {
    #[default]
    All,
    Team(TeamId),
}

impl fmt::Display for TeamSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamSelection::All => f.write_str("all"),
            TeamSelection::Team(id) => id.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected \"all\" or a numeric team id, got {0:?}")]
pub struct ParseTeamSelectionError(String);

impl FromStr for TeamSelection {
    type Err = ParseTeamSelectionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("all") {
            return Ok(TeamSelection::All);
        }
        raw.parse::<i64>()
            .map(|id| TeamSelection::Team(TeamId(id)))
            .map_err(|_| ParseTeamSelectionError(raw.to_string()))
    }
}
