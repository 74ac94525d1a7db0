//! Field rules for team and employee forms.
//!
//! Every rule here runs before a request leaves the client; a failure is
//! reported back to the input step and never reaches the notification relay.

use std::{fmt, sync::OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;
use tracing::error;

use crate::domain::EmployeeInput;

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$";
const PHONE_PATTERN: &str = r"^(?:\+\d{1,4}[-.\s]?)?(?:\(\d{1,3}\)[-.\s]?)?\d{1,4}[-.\s]?\d{1,4}[-.\s]?\d{1,9}$";

/// A pattern that fails to compile is logged once; every value is then
/// treated as invalid.
fn compile_pattern(name: &'static str, pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(err) => {
            error!(pattern = name, "validation: pattern failed to compile: {err}");
            None
        }
    }
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| compile_pattern("email", EMAIL_PATTERN))
        .as_ref()
}

fn phone_regex() -> Option<&'static Regex> {
    static PHONE: OnceLock<Option<Regex>> = OnceLock::new();
    PHONE
        .get_or_init(|| compile_pattern("phone", PHONE_PATTERN))
        .as_ref()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("{field} must be between {min} and {max} characters (got {actual})")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },
    #[error("email address format is invalid")]
    InvalidEmail,
    #[error("phone number format is invalid")]
    InvalidPhone,
    #[error("hire date {0} is in the future")]
    FutureHireDate(NaiveDate),
    #[error("team id must be a positive number")]
    NonPositiveTeamId,
    #[error("team {0} does not exist")]
    UnknownTeam(i64),
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Required { field } | ValidationError::Length { field, .. } => field,
            ValidationError::InvalidEmail => "email",
            ValidationError::InvalidPhone => "phone",
            ValidationError::FutureHireDate(_) => "hireDate",
            ValidationError::NonPositiveTeamId | ValidationError::UnknownTeam(_) => "teamId",
        }
    }
}

/// All field failures of one submitted form, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.0.iter().filter(move |err| err.field() == field)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(value: ValidationError) -> Self {
        Self(vec![value])
    }
}

impl std::error::Error for ValidationErrors {}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for err in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

fn check_length(field: &'static str, value: &str, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.push(ValidationError::Required { field });
        return;
    }
    let actual = value.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&actual) {
        errors.push(ValidationError::Length {
            field,
            min: NAME_MIN_CHARS,
            max: NAME_MAX_CHARS,
            actual,
        });
    }
}

pub fn is_valid_email(value: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(value))
}

pub fn is_valid_phone(value: &str) -> bool {
    phone_regex().is_some_and(|re| re.is_match(value))
}

pub fn validate_team_name(name: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_length("name", name, &mut errors);
    errors.into_result()
}

/// Checks every employee field. `today` bounds the hire date so the rule is
/// deterministic under test.
pub fn validate_employee(input: &EmployeeInput, today: NaiveDate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_length("firstName", &input.first_name, &mut errors);
    check_length("lastName", &input.last_name, &mut errors);

    if input.email.trim().is_empty() {
        errors.push(ValidationError::Required { field: "email" });
    } else if !is_valid_email(&input.email) {
        errors.push(ValidationError::InvalidEmail);
    }

    if input.phone.trim().is_empty() {
        errors.push(ValidationError::Required { field: "phone" });
    } else if !is_valid_phone(&input.phone) {
        errors.push(ValidationError::InvalidPhone);
    }

    match input.hire_date {
        None => errors.push(ValidationError::Required { field: "hireDate" }),
        Some(date) if date > today => errors.push(ValidationError::FutureHireDate(date)),
        Some(_) => {}
    }

    if input.role.trim().is_empty() {
        errors.push(ValidationError::Required { field: "role" });
    }

    if input.team_id.0 <= 0 {
        errors.push(ValidationError::NonPositiveTeamId);
    }

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TeamId;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("date")
    }

    fn valid_input() -> EmployeeInput {
        EmployeeInput {
            first_name: "John".into(),
            last_name: "Doe".into(),
            email: "john.doe@example.com".into(),
            phone: "+48 123-456-789".into(),
            hire_date: NaiveDate::from_ymd_opt(2023, 1, 15),
            role: "Developer".into(),
            team_id: TeamId(1),
        }
    }

    #[test]
    fn accepts_complete_employee() {
        assert_eq!(validate_employee(&valid_input(), today()), Ok(()));
    }

    #[test]
    fn rejects_single_character_first_name() {
        let mut input = valid_input();
        input.first_name = "A".into();
        let errors = validate_employee(&input, today()).expect_err("must reject");
        assert_eq!(
            errors.iter().collect::<Vec<_>>(),
            vec![&ValidationError::Length {
                field: "firstName",
                min: 2,
                max: 50,
                actual: 1
            }]
        );
    }

    #[test]
    fn collects_every_failing_field() {
        let input = EmployeeInput::for_team(TeamId(0));
        let errors = validate_employee(&input, today()).expect_err("must reject");
        let fields: Vec<_> = errors.iter().map(ValidationError::field).collect();
        assert_eq!(
            fields,
            vec!["firstName", "lastName", "email", "phone", "hireDate", "role", "teamId"]
        );
    }

    #[test]
    fn rejects_future_hire_date() {
        let mut input = valid_input();
        input.hire_date = NaiveDate::from_ymd_opt(2024, 6, 2);
        let errors = validate_employee(&input, today()).expect_err("must reject");
        assert_eq!(errors.for_field("hireDate").count(), 1);
    }

    #[test]
    fn team_name_bounds() {
        assert!(validate_team_name("").is_err());
        assert!(validate_team_name("X").is_err());
        assert!(validate_team_name("Dev").is_ok());
        assert!(validate_team_name(&"n".repeat(50)).is_ok());
        assert!(validate_team_name(&"n".repeat(51)).is_err());
    }

    #[test]
    fn email_and_phone_patterns() {
        assert!(is_valid_email("jane.smith@example.com"));
        assert!(!is_valid_email("jane.smith@"));
        assert!(!is_valid_email("not an email"));

        assert!(is_valid_phone("123-456-7890"));
        assert!(is_valid_phone("+48 (22) 123 45 67"));
        assert!(is_valid_phone("123456789"));
        assert!(!is_valid_phone("call me"));
        assert!(!is_valid_phone("12"));
    }

    #[test]
    fn broken_pattern_is_reported_not_panicked() {
        assert!(compile_pattern("broken", "([a-z]").is_none());
        assert!(compile_pattern("email", EMAIL_PATTERN).is_some());
        assert!(compile_pattern("phone", PHONE_PATTERN).is_some());
        assert!(email_regex().is_some());
        assert!(phone_regex().is_some());
    }
}
