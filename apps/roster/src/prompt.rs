//! Terminal implementation of the confirmation/edit step.
//!
//! Values given on the command line are used for the first submission. When
//! stdin is a terminal the operator is asked for anything missing, and again
//! after a rejected submission; otherwise such a step is cancelled.

use std::io::IsTerminal;

use async_trait::async_trait;
use chrono::NaiveDate;
use roster_core::{ConfirmRequest, EmployeeFormRequest, Prompt, PromptResult, TeamNameRequest};
use shared::{
    domain::{EmployeeInput, TeamId},
    validation::ValidationErrors,
};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin},
    sync::Mutex,
};
use tracing::debug;

/// Employee fields supplied as flags. Unset fields keep the form's value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub role: Option<String>,
    pub team_id: Option<TeamId>,
}

impl EmployeeFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(self, input: &mut EmployeeInput) {
        if let Some(value) = self.first_name {
            input.first_name = value;
        }
        if let Some(value) = self.last_name {
            input.last_name = value;
        }
        if let Some(value) = self.email {
            input.email = value;
        }
        if let Some(value) = self.phone {
            input.phone = value;
        }
        if let Some(value) = self.hire_date {
            input.hire_date = Some(value);
        }
        if let Some(value) = self.role {
            input.role = value;
        }
        if let Some(value) = self.team_id {
            input.team_id = value;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Preset {
    pub team_name: Option<String>,
    pub employee: EmployeeFields,
    /// Answer yes to every confirmation.
    pub assume_yes: bool,
}

pub struct CliPrompt {
    team_name: Mutex<Option<String>>,
    employee: Mutex<Option<EmployeeFields>>,
    assume_yes: bool,
    stdin: Option<Mutex<BufReader<Stdin>>>,
}

impl CliPrompt {
    /// Interactive when stdin is a terminal.
    pub fn new(preset: Preset) -> Self {
        let stdin = std::io::stdin()
            .is_terminal()
            .then(|| Mutex::new(BufReader::new(io::stdin())));
        Self::build(preset, stdin)
    }

    /// Never reads stdin; missing or rejected input cancels the action.
    pub fn non_interactive(preset: Preset) -> Self {
        Self::build(preset, None)
    }

    fn build(preset: Preset, stdin: Option<Mutex<BufReader<Stdin>>>) -> Self {
        let employee = (!preset.employee.is_empty()).then_some(preset.employee);
        Self {
            team_name: Mutex::new(preset.team_name),
            employee: Mutex::new(employee),
            assume_yes: preset.assume_yes,
            stdin,
        }
    }

    /// `None` when not interactive or stdin is closed.
    async fn ask(&self, question: &str, default: &str) -> Option<String> {
        let stdin = self.stdin.as_ref()?;
        let mut stdout = io::stdout();
        let prompt = if default.is_empty() {
            format!("{question}: ")
        } else {
            format!("{question} [{default}]: ")
        };
        stdout.write_all(prompt.as_bytes()).await.ok()?;
        stdout.flush().await.ok()?;

        let mut line = String::new();
        let read = stdin.lock().await.read_line(&mut line).await.ok()?;
        if read == 0 {
            return None;
        }
        let answer = line.trim();
        Some(if answer.is_empty() {
            default.to_string()
        } else {
            answer.to_string()
        })
    }

    async fn ask_employee(&self, current: &EmployeeInput) -> Option<EmployeeInput> {
        let hire_date = current
            .hire_date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let first_name = self.ask("First name", &current.first_name).await?;
        let last_name = self.ask("Last name", &current.last_name).await?;
        let email = self.ask("Email", &current.email).await?;
        let phone = self.ask("Phone", &current.phone).await?;
        let hire_date = self.ask("Hire date (YYYY-MM-DD)", &hire_date).await?;
        let role = self.ask("Role", &current.role).await?;
        let team_id = self.ask("Team id", &current.team_id.to_string()).await?;

        Some(EmployeeInput {
            first_name,
            last_name,
            email,
            phone,
            hire_date: parse_date(&hire_date),
            role,
            team_id: TeamId(team_id.trim().parse().unwrap_or(0)),
        })
    }
}

/// Unparseable dates become `None` so validation reports them.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn print_errors(title: &str, errors: &ValidationErrors) {
    eprintln!("{title} was not accepted:");
    for error in errors.iter() {
        eprintln!("  {}: {error}", error.field());
    }
}

#[async_trait]
impl Prompt for CliPrompt {
    async fn confirm(&self, request: ConfirmRequest) -> PromptResult<()> {
        if self.assume_yes {
            debug!(kind = request.kind.as_str(), "prompt: confirmed by flag");
            return PromptResult::Confirmed(());
        }
        match self.ask(&format!("{} (y/N)", request.text), "").await {
            Some(answer) if matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes") => {
                PromptResult::Confirmed(())
            }
            Some(_) => PromptResult::Cancelled,
            None => {
                eprintln!("{} Pass --yes to confirm.", request.text);
                PromptResult::Cancelled
            }
        }
    }

    async fn team_name(&self, request: TeamNameRequest) -> PromptResult<String> {
        if let Some(errors) = &request.errors {
            print_errors("Team name", errors);
        } else if let Some(name) = self.team_name.lock().await.take() {
            return PromptResult::Confirmed(name);
        }

        match self.ask(&format!("{} - name", request.title), &request.current).await {
            Some(name) => PromptResult::Confirmed(name),
            None => PromptResult::Cancelled,
        }
    }

    async fn employee_form(&self, request: EmployeeFormRequest) -> PromptResult<EmployeeInput> {
        if let Some(errors) = &request.errors {
            print_errors("Employee", errors);
        } else if let Some(fields) = self.employee.lock().await.take() {
            let mut input = request.current;
            fields.apply_to(&mut input);
            return PromptResult::Confirmed(input);
        }

        if self.stdin.is_some() {
            println!("{}", request.title);
            let teams = request
                .teams
                .iter()
                .map(|team| format!("{} ({})", team.name, team.id))
                .collect::<Vec<_>>()
                .join(", ");
            println!("Teams: {teams}");
        }
        match self.ask_employee(&request.current).await {
            Some(input) => PromptResult::Confirmed(input),
            None => PromptResult::Cancelled,
        }
    }
}

#[cfg(test)]
#[path = "tests/prompt_tests.rs"]
mod tests;
