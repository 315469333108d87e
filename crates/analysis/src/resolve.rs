//! Column resolution: map raw header names to semantic roles using the
//! declarative keyword table from [`ColumnsConfig`](crate::config::ColumnsConfig).

use log::debug;

use crate::config::RoleRule;
use crate::error::AnalysisError;
use crate::model::{ColumnRoleMap, ResolvedColumn, Role};

/// Lowercase, trim, and collapse internal whitespace (headers often wrap
/// across lines in the source workbook).
pub fn normalize_header(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl RoleRule {
    /// `header` must already be normalized.
    pub fn matches(&self, header: &str) -> bool {
        let has = |kw: &String| {
            let kw = normalize_header(kw);
            !kw.is_empty() && header.contains(&kw)
        };
        self.all_of.iter().all(has) && !self.none_of.iter().any(has)
    }
}

/// Resolve every role named in `rules`. Per role, the first header (in header
/// order) matched by any of that role's rules wins.
pub fn resolve_columns(headers: &[String], rules: &[RoleRule]) -> ColumnRoleMap {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

    let mut roles: Vec<Role> = Vec::new();
    for rule in rules {
        if !roles.contains(&rule.role) {
            roles.push(rule.role);
        }
    }

    let mut map = ColumnRoleMap::default();
    for role in roles {
        let role_rules: Vec<&RoleRule> = rules.iter().filter(|r| r.role == role).collect();
        let hit = normalized
            .iter()
            .position(|h| role_rules.iter().any(|rule| rule.matches(h)));
        if let Some(index) = hit {
            debug!("column {:?} resolved as {}", headers[index], role);
            map.insert(role, ResolvedColumn { index, name: headers[index].clone() });
        }
    }
    map
}

/// Fail with every missing role named at once.
pub fn require_roles(
    map: &ColumnRoleMap,
    required: &[Role],
    headers: &[String],
) -> Result<(), AnalysisError> {
    let missing: Vec<Role> = required.iter().copied().filter(|r| !map.contains(*r)).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AnalysisError::RequiredColumnMissing {
            roles: missing,
            headers: headers.to_vec(),
        })
    }
}

/// Minimum-structure predicate used to pick worksheets and header rows:
/// stakeholder, impact and perception columns must all be present.
pub fn has_expected_structure(headers: &[String], rules: &[RoleRule]) -> bool {
    let map = resolve_columns(headers, rules);
    [Role::Stakeholder, Role::Impact, Role::Perception]
        .into_iter()
        .all(|role| map.contains(role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_rules;
    use crate::model::MitigationKind;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_typical_headers() {
        let h = headers(&[
            "Workstream / Process",
            "Stakeholder Group(s) Impacted",
            "Level of Impact",
            "Perception of Change",
            "Comms Mitigation",
            "Training Required?",
            "Readiness Score",
        ]);
        let map = resolve_columns(&h, &default_rules());
        assert_eq!(map.get(Role::Identifier).unwrap().index, 0);
        assert_eq!(map.get(Role::Stakeholder).unwrap().index, 1);
        assert_eq!(map.get(Role::Impact).unwrap().index, 2);
        assert_eq!(map.get(Role::Perception).unwrap().index, 3);
        assert_eq!(map.get(Role::Mitigation(MitigationKind::Comms)).unwrap().index, 4);
        assert_eq!(map.get(Role::Mitigation(MitigationKind::Training)).unwrap().index, 5);
        assert_eq!(map.get(Role::Readiness).unwrap().index, 6);
        assert!(!map.contains(Role::Mitigation(MitigationKind::Hr)));
    }

    #[test]
    fn matching_is_case_and_whitespace_insensitive() {
        let h = headers(&["  STAKEHOLDER\n GROUP ", "impact"]);
        let map = resolve_columns(&h, &default_rules());
        assert_eq!(map.get(Role::Stakeholder).unwrap().name, "  STAKEHOLDER\n GROUP ");
        assert!(map.contains(Role::Impact));
    }

    #[test]
    fn conjunctive_keywords_and_exclusions() {
        let h = headers(&["Impact Mitigation - HR", "Perception Impact", "Change Impact"]);
        let map = resolve_columns(&h, &default_rules());
        // First two carry excluded keywords, so impact lands on the third.
        assert_eq!(map.get(Role::Impact).unwrap().index, 2);
        assert_eq!(map.get(Role::Mitigation(MitigationKind::Hr)).unwrap().index, 0);
    }

    #[test]
    fn first_matching_column_wins() {
        let h = headers(&["Stakeholder", "Stakeholder (secondary)"]);
        let map = resolve_columns(&h, &default_rules());
        assert_eq!(map.get(Role::Stakeholder).unwrap().index, 0);
    }

    #[test]
    fn resolution_is_idempotent() {
        let h = headers(&["Process", "Stakeholders", "Impact", "Perception"]);
        let rules = default_rules();
        assert_eq!(resolve_columns(&h, &rules), resolve_columns(&h, &rules));
    }

    #[test]
    fn require_roles_names_all_missing() {
        let h = headers(&["Process", "Perception"]);
        let map = resolve_columns(&h, &default_rules());
        let err = require_roles(&map, &[Role::Stakeholder, Role::Impact], &h).unwrap_err();
        match err {
            AnalysisError::RequiredColumnMissing { roles, .. } => {
                assert_eq!(roles, vec![Role::Stakeholder, Role::Impact]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn structure_predicate() {
        let rules = default_rules();
        assert!(has_expected_structure(&headers(&["Stakeholder", "Impact", "Perception"]), &rules));
        assert!(!has_expected_structure(&headers(&["Stakeholder", "Impact"]), &rules));
    }
}
