use super::*;
use chrono::NaiveDate;
use shared::domain::EmployeeId;

fn teams() -> Vec<Team> {
    vec![
        Team {
            id: TeamId(1),
            name: "Dev".into(),
        },
        Team {
            id: TeamId(2),
            name: "Sales".into(),
        },
    ]
}

#[test]
fn all_returns_every_team_in_store_order() {
    let filter = FilterController::new();
    let all = teams();
    let visible = filter.visible_teams(&all);
    assert_eq!(visible, all.iter().collect::<Vec<_>>());
}

#[test]
fn team_selection_narrows_to_that_team() {
    let mut filter = FilterController::new();
    filter.select(TeamSelection::Team(TeamId(2)));
    let all = teams();
    let names: Vec<_> = filter
        .visible_teams(&all)
        .into_iter()
        .map(|team| team.name.as_str())
        .collect();
    assert_eq!(names, vec!["Sales"]);
}

#[test]
fn selection_of_deleted_team_yields_nothing() {
    let mut filter = FilterController::new();
    filter.select(TeamSelection::Team(TeamId(1)));
    let remaining = vec![Team {
        id: TeamId(2),
        name: "Sales".into(),
    }];
    assert!(filter.visible_teams(&remaining).is_empty());
}

#[test]
fn forget_team_only_resets_matching_selection() {
    let mut filter = FilterController::new();
    filter.select(TeamSelection::Team(TeamId(2)));
    assert!(!filter.forget_team(TeamId(1)));
    assert_eq!(filter.selected(), TeamSelection::Team(TeamId(2)));
    assert!(filter.forget_team(TeamId(2)));
    assert_eq!(filter.selected(), TeamSelection::All);
}

#[test]
fn view_groups_employees_under_visible_teams() {
    let mut store = EntityStore::new();
    store.replace_teams(teams());
    store.replace_employees(vec![Employee {
        id: EmployeeId(10),
        first_name: "John".into(),
        last_name: "Doe".into(),
        email: "john.doe@example.com".into(),
        phone: "123-456-7890".into(),
        hire_date: NaiveDate::from_ymd_opt(2023, 1, 15).expect("date"),
        role: "Developer".into(),
        team_id: TeamId(1),
    }]);

    let mut filter = FilterController::new();
    let view = RosterView::compute(&store, &filter);
    assert_eq!(view.sections.len(), 2);
    assert_eq!(view.sections[0].employees.len(), 1);
    assert!(view.sections[1].employees.is_empty());
    assert_eq!(view.revision, store.revision());

    filter.select(TeamSelection::Team(TeamId(2)));
    let view = RosterView::compute(&store, &filter);
    assert_eq!(view.selection, TeamSelection::Team(TeamId(2)));
    assert_eq!(view.sections.len(), 1);
    assert!(view.sections[0].employees.is_empty());
}
