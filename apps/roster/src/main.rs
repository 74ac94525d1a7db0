use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use roster_core::{HttpGateway, MutationOutcome, RosterSession, RosterView};
use shared::domain::{EmployeeId, TeamId, TeamSelection};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod prompt;
mod relay;

use prompt::{CliPrompt, EmployeeFields, Preset};
use relay::ConsoleRelay;

#[derive(Parser, Debug)]
#[command(name = "roster", about = "Manage teams and their employees")]
struct Cli {
    /// Settings file; defaults to ./roster.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides `api_base_url` from settings.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List teams with their employees.
    Show {
        /// "all" or a team id.
        #[arg(long, default_value = "all")]
        team: TeamSelection,
    },
    #[command(subcommand)]
    Team(TeamCommand),
    #[command(subcommand)]
    Employee(EmployeeCommand),
    /// Download the spreadsheet summary of every team.
    Summary {
        #[arg(long, default_value = "summary.xlsx")]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum TeamCommand {
    Create {
        #[arg(long)]
        name: Option<String>,
    },
    Rename {
        id: i64,
        #[arg(long)]
        name: Option<String>,
    },
    Delete {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum EmployeeCommand {
    Create {
        #[arg(long)]
        team: i64,
        #[command(flatten)]
        fields: FieldArgs,
    },
    Edit {
        id: i64,
        /// Move the employee to another team.
        #[arg(long)]
        team: Option<i64>,
        #[command(flatten)]
        fields: FieldArgs,
    },
    Delete {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Default)]
struct FieldArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    hire_date: Option<NaiveDate>,
    #[arg(long)]
    role: Option<String>,
}

impl FieldArgs {
    fn into_fields(self, team_id: Option<TeamId>) -> EmployeeFields {
        EmployeeFields {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            hire_date: self.hire_date,
            role: self.role,
            team_id,
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn preset_for(command: &Command) -> Preset {
    match command {
        Command::Team(TeamCommand::Create { name })
        | Command::Team(TeamCommand::Rename { name, .. }) => Preset {
            team_name: name.clone(),
            ..Preset::default()
        },
        Command::Team(TeamCommand::Delete { yes, .. })
        | Command::Employee(EmployeeCommand::Delete { yes, .. }) => Preset {
            assume_yes: *yes,
            ..Preset::default()
        },
        _ => Preset::default(),
    }
}

fn print_view(view: &RosterView) {
    if view.is_empty() {
        println!("No teams to show.");
        return;
    }
    for section in &view.sections {
        println!("{} (#{})", section.team.name, section.team.id);
        if section.employees.is_empty() {
            println!("  no employees");
        }
        for employee in &section.employees {
            println!(
                "  #{:<5} {:<30} {:<30} {:<16} {} {}",
                employee.id,
                employee.full_name(),
                employee.email,
                employee.phone,
                employee.hire_date,
                employee.role
            );
        }
    }
}

async fn finish<T>(session: &RosterSession, outcome: MutationOutcome<T>) -> ExitCode {
    match outcome {
        MutationOutcome::Applied(_) => {
            print_view(&session.view().await);
            ExitCode::SUCCESS
        }
        MutationOutcome::Cancelled => {
            println!("Cancelled.");
            ExitCode::SUCCESS
        }
        MutationOutcome::Busy(key) => {
            eprintln!("{key} is already being changed.");
            ExitCode::FAILURE
        }
        // Already reported through the relay.
        MutationOutcome::Failed(_) => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
        settings.validate()?;
    }
    init_tracing(&settings.log_filter);
    info!(api_base_url = %settings.api_base_url, "roster: starting");

    let gateway = HttpGateway::with_timeout(&settings.api_base_url, settings.request_timeout())
        .context("failed to set up the team service client")?;
    let mut command = cli.command;
    let mut preset = preset_for(&command);
    match &mut command {
        Command::Employee(EmployeeCommand::Create { team, fields }) => {
            preset.employee = std::mem::take(fields).into_fields(Some(TeamId(*team)));
        }
        Command::Employee(EmployeeCommand::Edit { team, fields, .. }) => {
            preset.employee = std::mem::take(fields).into_fields(team.map(TeamId));
        }
        _ => {}
    }
    let session = RosterSession::new(
        Arc::new(gateway),
        Arc::new(ConsoleRelay),
        Arc::new(CliPrompt::new(preset)),
    );

    if let Command::Summary { output } = &command {
        let Ok(bytes) = session.download_summary().await else {
            return Ok(ExitCode::FAILURE);
        };
        tokio::fs::write(output, &bytes)
            .await
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!("Summary saved to {}", output.display());
        return Ok(ExitCode::SUCCESS);
    }

    if session.refresh().await.is_err() {
        return Ok(ExitCode::FAILURE);
    }

    let code = match command {
        Command::Show { team } => {
            print_view(&session.select_team(team).await);
            ExitCode::SUCCESS
        }
        Command::Team(TeamCommand::Create { .. }) => {
            finish(&session, session.create_team().await).await
        }
        Command::Team(TeamCommand::Rename { id, .. }) => {
            finish(&session, session.rename_team(TeamId(id)).await).await
        }
        Command::Team(TeamCommand::Delete { id, .. }) => {
            finish(&session, session.delete_team(TeamId(id)).await).await
        }
        Command::Employee(EmployeeCommand::Create { team, .. }) => {
            finish(&session, session.create_employee(TeamId(team)).await).await
        }
        Command::Employee(EmployeeCommand::Edit { id, .. }) => {
            finish(&session, session.edit_employee(EmployeeId(id)).await).await
        }
        Command::Employee(EmployeeCommand::Delete { id, .. }) => {
            finish(&session, session.delete_employee(EmployeeId(id)).await).await
        }
        Command::Summary { .. } => ExitCode::SUCCESS,
    };
    Ok(code)
}
