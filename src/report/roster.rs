use crate::model::student::{Gender, Student, StudentStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct StudentFilter {
    /// Matches name or class (case-insensitive) or NIS
    pub search: Option<String>,
    /// Exact class label
    pub class_name: Option<String>,
    /// `aktif` or `nonaktif`, case-insensitive
    pub status: Option<String>,
}

impl StudentFilter {
    pub fn matches(&self, student: &Student) -> bool {
        if let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) {
            let term_lower = term.to_lowercase();
            let hit = student.name.to_lowercase().contains(&term_lower)
                || student.nis.contains(term)
                || student.class_name.to_lowercase().contains(&term_lower);
            if !hit {
                return false;
            }
        }

        if let Some(class_name) = self.class_name.as_deref() {
            if student.class_name != class_name {
                return false;
            }
        }

        if let Some(status) = self.status.as_deref() {
            match status.parse::<StudentStatus>() {
                Ok(wanted) if wanted == student.status => {}
                _ => return false,
            }
        }

        true
    }

    pub fn apply(&self, students: Vec<Student>) -> Vec<Student> {
        students.into_iter().filter(|s| self.matches(s)).collect()
    }
}

#[derive(Debug, PartialEq, Serialize, ToSchema)]
pub struct RosterSummary {
    pub total: usize,
    pub active: usize,
    pub male: usize,
    pub female: usize,
    /// Distinct class labels, sorted
    pub classes: Vec<String>,
}

pub fn roster_summary(students: &[Student]) -> RosterSummary {
    RosterSummary {
        total: students.len(),
        active: students.iter().filter(|s| s.is_active()).count(),
        male: students.iter().filter(|s| s.gender == Gender::Male).count(),
        female: students.iter().filter(|s| s.gender == Gender::Female).count(),
        classes: students
            .iter()
            .map(|s| s.class_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    }
}
