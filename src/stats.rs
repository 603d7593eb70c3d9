use serde::Serialize;
use tracing::trace;

use crate::model::AssignmentId;
use crate::scheme::LetterGrade;
use crate::session::{SessionListener, SessionState};

/// 1-decimal rounding used for display: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl Statistics {
    /// `None` for an empty sequence.
    pub fn from_values(values: &[f64]) -> Option<Statistics> {
        if values.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0_f64;
        for v in values {
            min = min.min(*v);
            max = max.max(*v);
            sum += v;
        }
        Some(Statistics {
            min,
            mean: sum / values.len() as f64,
            max,
        })
    }

    pub fn rounded(&self) -> Statistics {
        Statistics {
            min: round_off_1_decimal(self.min),
            mean: round_off_1_decimal(self.mean),
            max: round_off_1_decimal(self.max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentStats {
    pub assignment_id: AssignmentId,
    pub name: String,
    pub stats: Option<Statistics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    pub letter: LetterGrade,
    pub color: String,
    pub count: usize,
}

/// Statistics for whatever the session currently shows. Rebuilt from scratch
/// on every notification; never writes back to the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsEngine {
    per_assignment: Vec<AssignmentStats>,
    aggregate: Option<Statistics>,
    distribution: Vec<GradeCount>,
    revision: u64,
}

impl StatisticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn per_assignment(&self) -> &[AssignmentStats] {
        &self.per_assignment
    }

    pub fn assignment(&self, id: &AssignmentId) -> Option<&Statistics> {
        self.per_assignment
            .iter()
            .find(|a| &a.assignment_id == id)
            .and_then(|a| a.stats.as_ref())
    }

    /// Min/mean/max of per-student aggregate percentages. Absent when the
    /// scope has no graded assignment tree or no students.
    pub fn aggregate(&self) -> Option<&Statistics> {
        self.aggregate.as_ref()
    }

    /// Students per letter grade, highest grade first. Empty unless a
    /// section's grade scheme is in scope.
    pub fn distribution(&self) -> &[GradeCount] {
        &self.distribution
    }

    /// Number of recomputations so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn recompute(&mut self, session: &SessionState) {
        let students = session.students();
        let assignments = session.assignments();
        let scores = session.scores();

        self.per_assignment = assignments
            .iter()
            .map(|a| {
                let raw: Vec<f64> = students
                    .iter()
                    .map(|s| scores.get_score(&s.id, &a.id))
                    .collect();
                AssignmentStats {
                    assignment_id: a.id.clone(),
                    name: a.name.clone(),
                    stats: Statistics::from_values(&raw),
                }
            })
            .collect();

        let percentages: Vec<f64> = students
            .iter()
            .filter_map(|s| session.weighted_percentage(&s.id))
            .collect();
        self.aggregate = Statistics::from_values(&percentages);

        self.distribution = match (session.grade_scheme(), percentages.is_empty()) {
            (Some(scheme), false) => scheme
                .ranges()
                .iter()
                .map(|r| GradeCount {
                    letter: r.letter,
                    color: r.color.clone(),
                    count: percentages
                        .iter()
                        .filter(|p| scheme.classify(**p).map(|g| g.letter) == Some(r.letter))
                        .count(),
                })
                .collect(),
            _ => Vec::new(),
        };

        self.revision += 1;
        trace!(
            revision = self.revision,
            assignments = self.per_assignment.len(),
            students = students.len(),
            "statistics recomputed"
        );
    }
}

impl SessionListener for StatisticsEngine {
    fn session_changed(&mut self, session: &SessionState) {
        self.recompute(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Assignment, Catalog, Course, Section, Student};
    use crate::gradebook::Gradebook;
    use crate::model::{CourseId, SectionId, StudentId};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn round_off_matches_display_format() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(3.54), 3.5);
        assert_eq!(round_off_1_decimal(3.55), 3.6);
        assert_eq!(round_off_1_decimal(35.6818), 35.7);
    }

    #[test]
    fn statistics_over_values() {
        let s = Statistics::from_values(&[70.0, 80.0, 96.0]).expect("stats");
        assert_eq!(s.min, 70.0);
        assert_eq!(s.max, 96.0);
        assert!((s.mean - 82.0).abs() < 1e-9);
        assert!(Statistics::from_values(&[]).is_none());
    }

    fn session() -> SessionState {
        let mut book = Gradebook::new(Catalog::new(), Default::default(), Default::default());
        let c = CourseId::new("c1");
        book.add_course(Course::new(c.clone(), "Course"));
        book.add_section(
            &c,
            Section {
                id: SectionId::new("s1"),
                name: "01".to_string(),
                students: Vec::new(),
                groups: Vec::new(),
            },
        )
        .expect("section");
        for a in ["quiz1", "quiz2"] {
            book.add_assignment(
                &c,
                Assignment {
                    id: AssignmentId::new(a),
                    name: a.to_string(),
                    points: 100.0,
                    category_id: None,
                },
            )
            .expect("assignment");
        }
        for s in ["alice", "bob"] {
            book.enroll_student(
                &SectionId::new("s1"),
                Student {
                    id: StudentId::new(s),
                    first_name: s.to_string(),
                    last_name: "S".to_string(),
                },
            )
            .expect("enroll");
        }
        book.master
            .add_entry(&StudentId::new("alice"), &AssignmentId::new("quiz1"), 90.0);
        book.master
            .add_entry(&StudentId::new("alice"), &AssignmentId::new("quiz2"), 100.0);
        book.master
            .add_entry(&StudentId::new("bob"), &AssignmentId::new("quiz1"), 50.0);
        book.master
            .add_entry(&StudentId::new("bob"), &AssignmentId::new("quiz2"), 70.0);
        SessionState::new(book)
    }

    #[test]
    fn engine_recomputes_on_every_notification() {
        let mut s = session();
        let engine = Rc::new(RefCell::new(StatisticsEngine::new()));
        s.subscribe(engine.clone());

        s.select_scope(Some("c1".into()), Some("s1".into()), None)
            .expect("select");
        {
            let e = engine.borrow();
            let q1 = e.assignment(&AssignmentId::new("quiz1")).expect("quiz1 stats");
            assert_eq!((q1.min, q1.mean, q1.max), (50.0, 70.0, 90.0));
            let agg = e.aggregate().expect("aggregate");
            assert_eq!((agg.min, agg.mean, agg.max), (60.0, 77.5, 95.0));
            assert_eq!(e.revision(), 1);
        }

        s.update_grade(&StudentId::new("bob"), &AssignmentId::new("quiz1"), 80.0)
            .expect("update");
        {
            let e = engine.borrow();
            let q1 = e.assignment(&AssignmentId::new("quiz1")).expect("quiz1 stats");
            assert_eq!((q1.min, q1.mean, q1.max), (80.0, 85.0, 90.0));
            assert_eq!(e.revision(), 2);
        }

        s.undo().expect("undo");
        let e = engine.borrow();
        let q1 = e.assignment(&AssignmentId::new("quiz1")).expect("quiz1 stats");
        assert_eq!(q1.min, 50.0);
    }

    #[test]
    fn distribution_uses_working_scheme() {
        let mut s = session();
        let engine = Rc::new(RefCell::new(StatisticsEngine::new()));
        s.subscribe(engine.clone());
        s.select_scope(Some("c1".into()), Some("s1".into()), None)
            .expect("select");

        let count = |letter: LetterGrade| {
            engine
                .borrow()
                .distribution()
                .iter()
                .find(|g| g.letter == letter)
                .map(|g| g.count)
                .unwrap_or(0)
        };
        // alice 95 -> A, bob 60 -> D-
        assert_eq!(count(LetterGrade::A), 1);
        assert_eq!(count(LetterGrade::DMinus), 1);
        assert_eq!(engine.borrow().distribution().len(), 13);

        s.update_bound(LetterGrade::DMinus, 61.0).expect("bound");
        assert_eq!(count(LetterGrade::DMinus), 0);
        assert_eq!(count(LetterGrade::F), 1);
    }

    #[test]
    fn course_scope_has_aggregate_but_no_distribution() {
        let mut s = session();
        let engine = Rc::new(RefCell::new(StatisticsEngine::new()));
        s.subscribe(engine.clone());
        s.select_scope(Some("c1".into()), None, None).expect("select");
        assert!(engine.borrow().aggregate().is_some());
        assert!(engine.borrow().distribution().is_empty());

        s.select_scope(None, None, None).expect("clear");
        assert!(engine.borrow().aggregate().is_none());
        assert!(engine.borrow().per_assignment().is_empty());
    }
}
