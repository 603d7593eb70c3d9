use serde::Serialize;
use std::collections::HashMap;

use crate::error::SessionError;
use crate::model::{AssignmentId, StudentId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub student: StudentId,
    pub assignment: AssignmentId,
    pub score: f64,
}

/// Sparse (student, assignment) -> score table.
///
/// Used both for the master table and for a session's working copy. `Clone`
/// is a full deep copy: the two never share entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMatrix {
    rows: HashMap<StudentId, HashMap<AssignmentId, ScoreEntry>>,
}

impl ScoreMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the pair, overwriting any existing value.
    pub fn add_entry(&mut self, student: &StudentId, assignment: &AssignmentId, score: f64) {
        self.rows.entry(student.clone()).or_default().insert(
            assignment.clone(),
            ScoreEntry {
                student: student.clone(),
                assignment: assignment.clone(),
                score,
            },
        );
    }

    /// Inserts a zero entry only when the pair is absent.
    pub fn ensure_entry(&mut self, student: &StudentId, assignment: &AssignmentId) {
        let row = self.rows.entry(student.clone()).or_default();
        row.entry(assignment.clone()).or_insert_with(|| ScoreEntry {
            student: student.clone(),
            assignment: assignment.clone(),
            score: 0.0,
        });
    }

    pub fn update_entry(
        &mut self,
        student: &StudentId,
        assignment: &AssignmentId,
        score: f64,
    ) -> Result<(), SessionError> {
        let entry = self
            .rows
            .get_mut(student)
            .and_then(|row| row.get_mut(assignment))
            .ok_or_else(|| SessionError::NotFound {
                student: student.clone(),
                assignment: assignment.clone(),
            })?;
        entry.score = score;
        Ok(())
    }

    /// Stored score, or 0 when the pair is absent.
    pub fn get_score(&self, student: &StudentId, assignment: &AssignmentId) -> f64 {
        self.rows
            .get(student)
            .and_then(|row| row.get(assignment))
            .map(|e| e.score)
            .unwrap_or(0.0)
    }

    pub fn contains(&self, student: &StudentId, assignment: &AssignmentId) -> bool {
        self.rows
            .get(student)
            .map(|row| row.contains_key(assignment))
            .unwrap_or(false)
    }

    pub fn entries_for(&self, student: &StudentId) -> HashMap<AssignmentId, ScoreEntry> {
        self.rows.get(student).cloned().unwrap_or_default()
    }

    /// Copy of the rows belonging to `students`; other rows are left out.
    pub fn slice<'a, I>(&self, students: I) -> ScoreMatrix
    where
        I: IntoIterator<Item = &'a StudentId>,
    {
        let mut out = ScoreMatrix::new();
        for s in students {
            if let Some(row) = self.rows.get(s) {
                out.rows.insert(s.clone(), row.clone());
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreEntry> {
        self.rows.values().flat_map(|row| row.values())
    }
}
