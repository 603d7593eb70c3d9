//! Scoped editing session over the gradebook.
//!
//! The session keeps a working copy of the master scores for the students in
//! the current scope. Edits land in the working copy and are recorded as
//! deltas; nothing reaches the master table until `save_grades`.
//!
//! Undo does not step back through earlier deltas for the same cell: it
//! resets the cell to the committed (master) value. Every mutating call
//! re-establishes its invariants and then notifies listeners synchronously,
//! in subscription order, before returning.

use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::catalog::{Assignment, Category, Course, Group, Section, Student};
use crate::error::SessionError;
use crate::gradebook::Gradebook;
use crate::model::{AssignmentId, CourseId, GroupId, Scope, SectionId, StudentId};
use crate::scheme::{GradeScheme, LetterGrade};
use crate::scores::ScoreMatrix;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    pub student: StudentId,
    pub assignment: AssignmentId,
    pub new_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Clipboard {
    pub selected: Option<(StudentId, AssignmentId)>,
    pub copied_value: f64,
    pub valid: bool,
}

/// Derived view recomputed after every session mutation.
pub trait SessionListener {
    fn session_changed(&mut self, session: &SessionState);
}

impl<F> SessionListener for F
where
    F: FnMut(&SessionState),
{
    fn session_changed(&mut self, session: &SessionState) {
        self(session)
    }
}

pub type ListenerHandle = Rc<RefCell<dyn SessionListener>>;

pub struct SessionState {
    book: Gradebook,
    scope: Scope,
    working: ScoreMatrix,
    deltas: Vec<Delta>,
    redo: Vec<Delta>,
    clipboard: Clipboard,
    scheme: Option<GradeScheme>,
    scheme_changed: bool,
    listeners: Vec<ListenerHandle>,
}

impl SessionState {
    pub fn new(book: Gradebook) -> Self {
        Self {
            book,
            scope: Scope::default(),
            working: ScoreMatrix::new(),
            deltas: Vec::new(),
            redo: Vec::new(),
            clipboard: Clipboard::default(),
            scheme: None,
            scheme_changed: false,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: ListenerHandle) {
        self.listeners.push(listener);
    }

    /// Runs every listener against the current state, in subscription order.
    pub fn publish(&self) {
        for l in &self.listeners {
            l.borrow_mut().session_changed(self);
        }
    }

    // Scope

    /// Replaces the scope and checks out a fresh working copy.
    ///
    /// Pending deltas and redo history are dropped; the returned count says
    /// how many uncommitted edits were discarded.
    pub fn select_scope(
        &mut self,
        course: Option<CourseId>,
        section: Option<SectionId>,
        group: Option<GroupId>,
    ) -> Result<usize, SessionError> {
        let scope = Scope::new(course, section, group)?;
        self.book.catalog.validate_scope(&scope)?;

        let discarded = self.deltas.len();
        if discarded > 0 {
            warn!(discarded, "scope change discards uncommitted grade edits");
        }

        self.scope = scope;
        self.deltas.clear();
        self.redo.clear();
        self.clipboard.selected = None;
        self.load_scores();
        self.load_grade_scheme();
        debug!(scope = ?self.scope, entries = self.working.len(), "scope selected");

        self.publish();
        Ok(discarded)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    // Accessors

    pub fn students(&self) -> Vec<Student> {
        self.book
            .catalog
            .students_in_scope(&self.scope)
            .iter()
            .filter_map(|id| self.book.catalog.student(id).cloned())
            .collect()
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.book.catalog.assignments_in_scope(&self.scope)
    }

    /// Working copy for the current scope; empty when nothing is selected.
    pub fn scores(&self) -> &ScoreMatrix {
        &self.working
    }

    /// Working grade scheme; `None` unless a section is selected.
    pub fn grade_scheme(&self) -> Option<&GradeScheme> {
        self.scheme.as_ref()
    }

    pub fn grade_scheme_changed(&self) -> bool {
        self.scheme_changed
    }

    /// Aggregate percentage for one student's working row over the scope's
    /// assignment tree.
    pub fn weighted_percentage(&self, student: &StudentId) -> Option<f64> {
        self.book
            .catalog
            .weighted_percentage(&self.scope, &self.working.entries_for(student))
    }

    pub fn master(&self) -> &ScoreMatrix {
        &self.book.master
    }

    pub fn gradebook(&self) -> &Gradebook {
        &self.book
    }

    pub fn deltas(&self) -> &[Delta] {
        &self.deltas
    }

    pub fn redo_log(&self) -> &[Delta] {
        &self.redo
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn latest_change(&self) -> Option<&Delta> {
        self.deltas.last()
    }

    pub fn latest_undo(&self) -> Option<&Delta> {
        self.redo.last()
    }

    pub fn can_undo(&self) -> bool {
        !self.deltas.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn can_copy(&self) -> bool {
        self.clipboard.selected.is_some()
    }

    pub fn can_paste(&self) -> bool {
        self.clipboard.valid && self.clipboard.selected.is_some()
    }

    // Edits

    pub fn update_grade(
        &mut self,
        student: &StudentId,
        assignment: &AssignmentId,
        new_score: f64,
    ) -> Result<(), SessionError> {
        self.apply_edit(student, assignment, new_score)?;
        self.publish();
        Ok(())
    }

    fn apply_edit(
        &mut self,
        student: &StudentId,
        assignment: &AssignmentId,
        new_score: f64,
    ) -> Result<(), SessionError> {
        if !new_score.is_finite() {
            return Err(SessionError::precondition("score must be a finite number"));
        }
        self.ensure_in_scope(student, assignment)?;
        self.working.update_entry(student, assignment, new_score)?;

        self.redo.clear();
        self.deltas.push(Delta {
            student: student.clone(),
            assignment: assignment.clone(),
            new_score,
        });
        debug!(
            student = %student,
            assignment = %assignment,
            new_score,
            deltas = self.deltas.len(),
            "grade edited"
        );
        Ok(())
    }

    fn ensure_in_scope(&self, student: &StudentId, assignment: &AssignmentId) -> Result<(), SessionError> {
        if !self
            .book
            .catalog
            .students_in_scope(&self.scope)
            .contains(student)
        {
            return Err(SessionError::membership(format!(
                "student {} is not in the current scope",
                student
            )));
        }
        if !self
            .book
            .catalog
            .assignments_in_scope(&self.scope)
            .iter()
            .any(|a| &a.id == assignment)
        {
            return Err(SessionError::membership(format!(
                "assignment {} is not in the current scope",
                assignment
            )));
        }
        Ok(())
    }

    /// Moves the newest delta to the redo log and resets its cell to the
    /// master value.
    pub fn undo(&mut self) -> Result<(), SessionError> {
        let Some(last) = self.deltas.last() else {
            return Err(SessionError::precondition("nothing to undo"));
        };
        let committed = self.book.master.get_score(&last.student, &last.assignment);
        self.working
            .update_entry(&last.student, &last.assignment, committed)?;

        if let Some(undone) = self.deltas.pop() {
            self.redo.push(undone);
        }
        debug!(deltas = self.deltas.len(), redo = self.redo.len(), "undo");
        self.publish();
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), SessionError> {
        let Some(next) = self.redo.last() else {
            return Err(SessionError::precondition("nothing to redo"));
        };
        self.working
            .update_entry(&next.student, &next.assignment, next.new_score)?;

        if let Some(redone) = self.redo.pop() {
            self.deltas.push(redone);
        }
        debug!(deltas = self.deltas.len(), redo = self.redo.len(), "redo");
        self.publish();
        Ok(())
    }

    pub fn revert_grades(&mut self) {
        let dropped = self.deltas.len();
        self.deltas.clear();
        self.redo.clear();
        self.load_scores();
        debug!(dropped, "grades reverted");
        self.publish();
    }

    /// Commits every delta to the master table in log order and returns
    /// them. A later delta for the same cell wins.
    pub fn save_grades(&mut self) -> Result<Vec<Delta>, SessionError> {
        if let Some(missing) = self
            .deltas
            .iter()
            .find(|d| !self.book.master.contains(&d.student, &d.assignment))
        {
            return Err(SessionError::NotFound {
                student: missing.student.clone(),
                assignment: missing.assignment.clone(),
            });
        }

        let committed = std::mem::take(&mut self.deltas);
        for d in &committed {
            self.book
                .master
                .update_entry(&d.student, &d.assignment, d.new_score)?;
        }
        self.redo.clear();
        self.load_scores();
        info!(committed = committed.len(), "grades saved");

        self.publish();
        Ok(committed)
    }

    // Clipboard

    pub fn select_cell(&mut self, student: &StudentId, assignment: &AssignmentId) -> Result<(), SessionError> {
        self.ensure_in_scope(student, assignment)?;
        self.clipboard.selected = Some((student.clone(), assignment.clone()));
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.clipboard.selected = None;
    }

    pub fn copy(&mut self) -> Result<f64, SessionError> {
        let Some((student, assignment)) = self.clipboard.selected.clone() else {
            return Err(SessionError::precondition("no cell selected to copy"));
        };
        let value = self.working.get_score(&student, &assignment);
        self.clipboard.copied_value = value;
        self.clipboard.valid = true;
        Ok(value)
    }

    /// Copies the selected value and zeroes the cell through a new delta.
    pub fn cut(&mut self) -> Result<f64, SessionError> {
        let Some((student, assignment)) = self.clipboard.selected.clone() else {
            return Err(SessionError::precondition("no cell selected to cut"));
        };
        let value = self.working.get_score(&student, &assignment);
        self.apply_edit(&student, &assignment, 0.0)?;
        self.clipboard.copied_value = value;
        self.clipboard.valid = true;
        self.publish();
        Ok(value)
    }

    pub fn paste(&mut self) -> Result<(), SessionError> {
        if !self.can_paste() {
            return Err(SessionError::precondition(
                "paste needs a copied value and a selected cell",
            ));
        }
        let Some((student, assignment)) = self.clipboard.selected.clone() else {
            return Err(SessionError::precondition("no cell selected to paste into"));
        };
        let value = self.clipboard.copied_value;
        self.update_grade(&student, &assignment, value)
    }

    // Grade scheme

    pub fn update_bound(&mut self, letter: LetterGrade, new_lower_bound: f64) -> Result<(), SessionError> {
        let scheme = self.working_scheme_mut()?;
        scheme.update_bound(letter, new_lower_bound)?;
        self.scheme_changed = true;
        debug!(%letter, new_lower_bound, "grade bound edited");
        self.publish();
        Ok(())
    }

    pub fn update_color(&mut self, letter: LetterGrade, color: &str) -> Result<(), SessionError> {
        let scheme = self.working_scheme_mut()?;
        scheme.update_color(letter, color)?;
        self.scheme_changed = true;
        self.publish();
        Ok(())
    }

    /// Writes the working scheme back to the selected section. Returns
    /// `false` when there was nothing to apply.
    pub fn apply_grade_scheme(&mut self) -> Result<bool, SessionError> {
        let Some(section) = self.scope.section.clone() else {
            return Err(SessionError::precondition("no section selected"));
        };
        if !self.scheme_changed {
            return Ok(false);
        }
        if let Some(scheme) = &self.scheme {
            self.book.schemes.insert(section.clone(), scheme.clone());
        }
        self.load_grade_scheme();
        info!(section = %section, "grade scheme applied");
        self.publish();
        Ok(true)
    }

    fn working_scheme_mut(&mut self) -> Result<&mut GradeScheme, SessionError> {
        self.scheme
            .as_mut()
            .ok_or_else(|| SessionError::precondition("no section selected"))
    }

    // Roster

    pub fn add_course(&mut self, course: Course) {
        self.book.add_course(course);
        self.publish();
    }

    pub fn add_category(&mut self, course: &CourseId, category: Category) -> Result<(), SessionError> {
        self.book.add_category(course, category)?;
        self.publish();
        Ok(())
    }

    pub fn add_section(&mut self, course: &CourseId, section: Section) -> Result<(), SessionError> {
        self.book.add_section(course, section)?;
        self.publish();
        Ok(())
    }

    pub fn add_group(&mut self, section: &SectionId, group: Group) -> Result<(), SessionError> {
        self.book.add_group(section, group)?;
        self.publish();
        Ok(())
    }

    pub fn enroll_student(&mut self, section: &SectionId, student: Student) -> Result<(), SessionError> {
        self.book.enroll_student(section, student)?;
        self.reload_keeping_deltas();
        self.publish();
        Ok(())
    }

    pub fn add_assignment(&mut self, course: &CourseId, assignment: Assignment) -> Result<(), SessionError> {
        self.book.add_assignment(course, assignment)?;
        self.reload_keeping_deltas();
        self.publish();
        Ok(())
    }

    pub fn add_group_member(&mut self, group: &GroupId, student: &StudentId) -> Result<(), SessionError> {
        self.book.add_group_member(group, student)?;
        self.reload_keeping_deltas();
        self.publish();
        Ok(())
    }

    // Checkout

    fn load_scores(&mut self) {
        let students = self.book.catalog.students_in_scope(&self.scope);
        self.working = self.book.master.slice(students.iter());
    }

    /// Rebuilds the working copy after a roster change and replays pending
    /// deltas on top of it.
    fn reload_keeping_deltas(&mut self) {
        self.load_scores();
        for d in &self.deltas {
            if self.working.contains(&d.student, &d.assignment) {
                self.working.add_entry(&d.student, &d.assignment, d.new_score);
            }
        }
    }

    fn load_grade_scheme(&mut self) {
        self.scheme_changed = false;
        self.scheme = self
            .scope
            .section
            .as_ref()
            .map(|s| self.book.scheme_for(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::scheme::LetterGrade;
    use std::collections::HashMap;

    fn sid(s: &str) -> StudentId {
        StudentId::new(s)
    }

    fn aid(a: &str) -> AssignmentId {
        AssignmentId::new(a)
    }

    /// Course c1 with section s1 (alice, bob), section s2 (carol), group g1
    /// (bob), assignments quiz1 and quiz2. Master: alice/quiz1 = 70.
    fn session() -> SessionState {
        let mut book = Gradebook::new(Catalog::new(), ScoreMatrix::new(), HashMap::new());
        let c = CourseId::new("c1");
        book.add_course(Course::new(c.clone(), "CPE 309"));
        for sec in ["s1", "s2"] {
            book.add_section(
                &c,
                Section {
                    id: SectionId::new(sec),
                    name: sec.to_string(),
                    students: Vec::new(),
                    groups: Vec::new(),
                },
            )
            .expect("section");
        }
        for a in ["quiz1", "quiz2"] {
            book.add_assignment(
                &c,
                Assignment {
                    id: aid(a),
                    name: a.to_string(),
                    points: 100.0,
                    category_id: None,
                },
            )
            .expect("assignment");
        }
        for (sec, s) in [("s1", "alice"), ("s1", "bob"), ("s2", "carol")] {
            book.enroll_student(
                &SectionId::new(sec),
                Student {
                    id: sid(s),
                    first_name: s.to_string(),
                    last_name: "Student".to_string(),
                },
            )
            .expect("enroll");
        }
        book.add_group(
            &SectionId::new("s1"),
            Group {
                id: GroupId::new("g1"),
                name: "lab".to_string(),
                students: Vec::new(),
            },
        )
        .expect("group");
        book.add_group_member(&GroupId::new("g1"), &sid("bob"))
            .expect("member");
        book.master.add_entry(&sid("alice"), &aid("quiz1"), 70.0);

        let mut session = SessionState::new(book);
        session
            .select_scope(Some("c1".into()), Some("s1".into()), None)
            .expect("select");
        session
    }

    #[test]
    fn empty_scope_yields_empty_views() {
        let book = Gradebook::default();
        let session = SessionState::new(book);
        assert!(session.students().is_empty());
        assert!(session.assignments().is_empty());
        assert!(session.scores().is_empty());
        assert!(session.grade_scheme().is_none());
        assert!(!session.can_undo());
        assert!(!session.can_redo());
        assert!(!session.can_copy());
        assert!(!session.can_paste());
    }

    #[test]
    fn select_scope_enforces_nesting() {
        let mut s = session();
        let e = s
            .select_scope(None, Some("s1".into()), None)
            .unwrap_err();
        assert_eq!(e.code(), "scope_nesting");
        let e = s
            .select_scope(Some("c1".into()), None, Some("g1".into()))
            .unwrap_err();
        assert_eq!(e.code(), "scope_nesting");
        // State is unchanged by the failed selection.
        assert_eq!(s.scope().section, Some(SectionId::new("s1")));
    }

    #[test]
    fn select_scope_checks_out_scoped_rows_and_scheme() {
        let mut s = session();
        assert_eq!(s.students().len(), 2);
        assert_eq!(s.scores().len(), 4);
        assert!(s.grade_scheme().is_some());

        s.select_scope(Some("c1".into()), Some("s1".into()), Some("g1".into()))
            .expect("group");
        assert_eq!(s.students().len(), 1);
        assert_eq!(s.scores().len(), 2);

        s.select_scope(Some("c1".into()), None, None).expect("course");
        assert_eq!(s.students().len(), 3);
        assert!(s.grade_scheme().is_none());
    }

    #[test]
    fn update_then_undo_reverts_to_master() {
        let mut s = session();
        s.update_grade(&sid("alice"), &aid("quiz1"), 85.0).expect("update");
        assert_eq!(s.deltas().len(), 1);
        assert_eq!(s.scores().get_score(&sid("alice"), &aid("quiz1")), 85.0);
        assert!(s.redo_log().is_empty());
        // Master untouched until commit.
        assert_eq!(s.master().get_score(&sid("alice"), &aid("quiz1")), 70.0);

        s.undo().expect("undo");
        assert!(s.deltas().is_empty());
        assert_eq!(s.redo_log().len(), 1);
        assert_eq!(s.scores().get_score(&sid("alice"), &aid("quiz1")), 70.0);
    }

    #[test]
    fn undo_jumps_to_master_not_previous_delta() {
        let mut s = session();
        s.update_grade(&sid("alice"), &aid("quiz1"), 85.0).expect("update");
        s.update_grade(&sid("alice"), &aid("quiz1"), 90.0).expect("update");
        assert_eq!(s.deltas().len(), 2);

        s.undo().expect("undo");
        assert_eq!(s.scores().get_score(&sid("alice"), &aid("quiz1")), 70.0);
        assert_eq!(s.deltas().len(), 1);
        assert_eq!(s.latest_change().map(|d| d.new_score), Some(85.0));
        assert_eq!(s.latest_undo().map(|d| d.new_score), Some(90.0));
    }

    #[test]
    fn undo_then_redo_restores_state() {
        let mut s = session();
        s.update_grade(&sid("alice"), &aid("quiz1"), 85.0).expect("update");
        s.update_grade(&sid("bob"), &aid("quiz2"), 55.0).expect("update");
        let before = s.scores().clone();
        let (d, r) = (s.deltas().len(), s.redo_log().len());

        s.undo().expect("undo");
        s.redo().expect("redo");

        assert_eq!(s.scores(), &before);
        assert_eq!((s.deltas().len(), s.redo_log().len()), (d, r));
    }

    #[test]
    fn new_edit_clears_redo_history() {
        let mut s = session();
        s.update_grade(&sid("alice"), &aid("quiz1"), 85.0).expect("update");
        s.undo().expect("undo");
        assert!(s.can_redo());
        s.update_grade(&sid("bob"), &aid("quiz1"), 40.0).expect("update");
        assert!(!s.can_redo());
    }

    #[test]
    fn undo_and_redo_without_history_fail() {
        let mut s = session();
        assert_eq!(s.undo().unwrap_err().code(), "precondition");
        assert_eq!(s.redo().unwrap_err().code(), "precondition");
    }

    #[test]
    fn update_outside_scope_is_rejected() {
        let mut s = session();
        let e = s
            .update_grade(&sid("carol"), &aid("quiz1"), 50.0)
            .unwrap_err();
        assert_eq!(e.code(), "scope_membership");
        let e = s
            .update_grade(&sid("alice"), &aid("missing"), 50.0)
            .unwrap_err();
        assert_eq!(e.code(), "scope_membership");
        assert!(s.deltas().is_empty());
    }

    #[test]
    fn save_commits_last_writer_and_clears_logs() {
        let mut s = session();
        s.update_grade(&sid("alice"), &aid("quiz1"), 85.0).expect("update");
        s.update_grade(&sid("alice"), &aid("quiz1"), 90.0).expect("update");
        s.update_grade(&sid("bob"), &aid("quiz2"), 60.0).expect("update");
        s.undo().expect("undo");

        let committed = s.save_grades().expect("save");
        assert_eq!(committed.len(), 2);
        assert!(s.deltas().is_empty());
        assert!(s.redo_log().is_empty());
        assert_eq!(s.master().get_score(&sid("alice"), &aid("quiz1")), 90.0);
        assert_eq!(s.master().get_score(&sid("bob"), &aid("quiz2")), 0.0);

        for e in s.scores().iter() {
            assert_eq!(e.score, s.master().get_score(&e.student, &e.assignment));
        }
    }

    #[test]
    fn revert_restores_master_values() {
        let mut s = session();
        s.update_grade(&sid("alice"), &aid("quiz1"), 85.0).expect("update");
        s.update_grade(&sid("bob"), &aid("quiz1"), 12.0).expect("update");
        s.undo().expect("undo");

        s.revert_grades();
        assert!(s.deltas().is_empty());
        assert!(s.redo_log().is_empty());
        assert_eq!(s.scores(), &s.master().slice([&sid("alice"), &sid("bob")]));
    }

    #[test]
    fn scope_change_discards_pending_edits() {
        let mut s = session();
        s.update_grade(&sid("alice"), &aid("quiz1"), 85.0).expect("update");
        let discarded = s
            .select_scope(Some("c1".into()), None, None)
            .expect("select");
        assert_eq!(discarded, 1);
        assert!(s.deltas().is_empty());
        assert_eq!(s.scores().get_score(&sid("alice"), &aid("quiz1")), 70.0);
    }

    #[test]
    fn cut_then_paste_moves_value_through_deltas() {
        let mut s = session();
        s.update_grade(&sid("alice"), &aid("quiz2"), 42.0).expect("update");
        s.select_cell(&sid("alice"), &aid("quiz2")).expect("select");

        let cut = s.cut().expect("cut");
        assert_eq!(cut, 42.0);
        assert!(s.clipboard().valid);
        assert_eq!(s.clipboard().copied_value, 42.0);
        assert_eq!(s.scores().get_score(&sid("alice"), &aid("quiz2")), 0.0);
        assert_eq!(s.deltas().len(), 2);

        s.select_cell(&sid("bob"), &aid("quiz1")).expect("select");
        s.paste().expect("paste");
        assert_eq!(s.scores().get_score(&sid("bob"), &aid("quiz1")), 42.0);
        assert_eq!(s.deltas().len(), 3);
    }

    #[test]
    fn copy_does_not_create_a_delta() {
        let mut s = session();
        s.select_cell(&sid("alice"), &aid("quiz1")).expect("select");
        assert_eq!(s.copy().expect("copy"), 70.0);
        assert!(s.can_paste());
        assert!(s.deltas().is_empty());
    }

    #[test]
    fn clipboard_guards_are_explicit() {
        let mut s = session();
        assert_eq!(s.copy().unwrap_err().code(), "precondition");
        assert_eq!(s.cut().unwrap_err().code(), "precondition");
        assert_eq!(s.paste().unwrap_err().code(), "precondition");

        s.select_cell(&sid("alice"), &aid("quiz1")).expect("select");
        assert!(s.can_copy());
        assert!(!s.can_paste());
        assert_eq!(s.paste().unwrap_err().code(), "precondition");

        let e = s.select_cell(&sid("carol"), &aid("quiz1")).unwrap_err();
        assert_eq!(e.code(), "scope_membership");
    }

    #[test]
    fn failed_copy_keeps_the_copied_value() {
        let mut s = session();
        s.select_cell(&sid("alice"), &aid("quiz1")).expect("select");
        assert_eq!(s.copy().expect("copy"), 70.0);
        s.clear_selection();

        let before = s.clipboard().clone();
        assert_eq!(s.copy().unwrap_err().code(), "precondition");
        assert_eq!(s.cut().unwrap_err().code(), "precondition");
        assert_eq!(s.clipboard(), &before);
        assert!(s.deltas().is_empty());

        s.select_cell(&sid("bob"), &aid("quiz1")).expect("select");
        assert!(s.can_paste());
        s.paste().expect("paste");
        assert_eq!(s.scores().get_score(&sid("bob"), &aid("quiz1")), 70.0);
    }

    #[test]
    fn listeners_run_in_subscription_order_on_every_mutation() {
        let mut s = session();
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let first = log.clone();
        s.subscribe(Rc::new(RefCell::new(move |_: &SessionState| {
            first.borrow_mut().push("first")
        })));
        let second = log.clone();
        s.subscribe(Rc::new(RefCell::new(move |_: &SessionState| {
            second.borrow_mut().push("second")
        })));

        s.update_grade(&sid("alice"), &aid("quiz1"), 85.0).expect("update");
        s.undo().expect("undo");
        assert_eq!(*log.borrow(), vec!["first", "second", "first", "second"]);

        // Failed calls do not notify.
        log.borrow_mut().clear();
        let _ = s.undo();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn listeners_observe_post_mutation_state() {
        let mut s = session();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        s.subscribe(Rc::new(RefCell::new(move |st: &SessionState| {
            sink.borrow_mut()
                .push(st.scores().get_score(&sid("alice"), &aid("quiz1")))
        })));
        s.update_grade(&sid("alice"), &aid("quiz1"), 85.0).expect("update");
        s.save_grades().expect("save");
        assert_eq!(*seen.borrow(), vec![85.0, 85.0]);
    }

    #[test]
    fn scheme_edits_stay_local_until_applied() {
        let mut s = session();
        s.update_bound(LetterGrade::BPlus, 84.0).expect("bound");
        assert!(s.grade_scheme_changed());
        assert_eq!(
            s.gradebook()
                .scheme_for(&SectionId::new("s1"))
                .range(LetterGrade::BPlus)
                .map(|r| r.lower_bound),
            Some(87.0)
        );

        assert!(s.apply_grade_scheme().expect("apply"));
        assert!(!s.grade_scheme_changed());
        assert_eq!(
            s.gradebook()
                .scheme_for(&SectionId::new("s1"))
                .range(LetterGrade::BPlus)
                .map(|r| r.lower_bound),
            Some(84.0)
        );
        assert!(!s.apply_grade_scheme().expect("nothing to apply"));
    }

    #[test]
    fn scheme_edits_need_a_section() {
        let mut s = session();
        s.select_scope(Some("c1".into()), None, None).expect("course");
        assert_eq!(
            s.update_bound(LetterGrade::B, 84.0).unwrap_err().code(),
            "precondition"
        );
        assert_eq!(s.apply_grade_scheme().unwrap_err().code(), "precondition");
    }

    #[test]
    fn overlapping_bound_is_rejected_without_marking_dirty() {
        let mut s = session();
        let e = s.update_bound(LetterGrade::BPlus, 95.0).unwrap_err();
        assert_eq!(e.code(), "overlapping_range");
        assert!(!s.grade_scheme_changed());
    }

    #[test]
    fn enrolling_mid_session_keeps_pending_edits() {
        let mut s = session();
        s.update_grade(&sid("alice"), &aid("quiz1"), 85.0).expect("update");
        s.enroll_student(
            &SectionId::new("s1"),
            Student {
                id: sid("dave"),
                first_name: "Dave".to_string(),
                last_name: "New".to_string(),
            },
        )
        .expect("enroll");

        assert_eq!(s.students().len(), 3);
        assert_eq!(s.scores().get_score(&sid("alice"), &aid("quiz1")), 85.0);
        assert!(s.scores().contains(&sid("dave"), &aid("quiz2")));
        assert_eq!(s.deltas().len(), 1);
    }
}
