use std::collections::HashMap;

use crate::catalog::{Assignment, Catalog, Category, Course, Group, Section, Student};
use crate::error::SessionError;
use crate::model::{CourseId, GroupId, SectionId, StudentId};
use crate::scheme::GradeScheme;
use crate::scores::ScoreMatrix;

/// Everything loaded from the workspace: roster, master score table and the
/// committed grade scheme of each section.
///
/// Roster changes keep the master table filled with a 0 entry for every
/// (student, assignment) pair of a course.
#[derive(Debug, Clone, Default)]
pub struct Gradebook {
    pub catalog: Catalog,
    pub master: ScoreMatrix,
    pub schemes: HashMap<SectionId, GradeScheme>,
}

impl Gradebook {
    pub fn new(catalog: Catalog, master: ScoreMatrix, schemes: HashMap<SectionId, GradeScheme>) -> Self {
        Self {
            catalog,
            master,
            schemes,
        }
    }

    pub fn scheme_for(&self, section: &SectionId) -> GradeScheme {
        self.schemes.get(section).cloned().unwrap_or_default()
    }

    pub fn add_course(&mut self, course: Course) {
        self.catalog.add_course(course);
    }

    pub fn add_category(&mut self, course: &CourseId, category: Category) -> Result<(), SessionError> {
        self.catalog.add_category(course, category)
    }

    pub fn add_section(&mut self, course: &CourseId, section: Section) -> Result<(), SessionError> {
        let id = section.id.clone();
        self.catalog.add_section(course, section)?;
        self.schemes.entry(id).or_default();
        Ok(())
    }

    pub fn add_group(&mut self, section: &SectionId, group: Group) -> Result<(), SessionError> {
        self.catalog.add_group(section, group)
    }

    pub fn add_group_member(&mut self, group: &GroupId, student: &StudentId) -> Result<(), SessionError> {
        self.catalog.add_group_member(group, student)
    }

    pub fn enroll_student(&mut self, section: &SectionId, student: Student) -> Result<(), SessionError> {
        let student_id = student.id.clone();
        self.catalog.enroll(section, student)?;
        if let Some((course, _)) = self.catalog.section(section) {
            for a in &course.assignments {
                self.master.ensure_entry(&student_id, &a.id);
            }
        }
        Ok(())
    }

    pub fn add_assignment(&mut self, course: &CourseId, assignment: Assignment) -> Result<(), SessionError> {
        let assignment_id = assignment.id.clone();
        self.catalog.add_assignment(course, assignment)?;
        if let Some(c) = self.catalog.course(course) {
            for s in c.students() {
                self.master.ensure_entry(&s, &assignment_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssignmentId;

    #[test]
    fn roster_changes_fill_the_cross_product_with_zero() {
        let mut book = Gradebook::default();
        let c = CourseId::new("c1");
        let s = SectionId::new("s1");
        book.add_course(Course::new(c.clone(), "Course"));
        book.add_section(
            &c,
            Section {
                id: s.clone(),
                name: "01".to_string(),
                students: Vec::new(),
                groups: Vec::new(),
            },
        )
        .expect("section");
        assert!(book.schemes.contains_key(&s));

        book.add_assignment(
            &c,
            Assignment {
                id: AssignmentId::new("quiz1"),
                name: "Quiz 1".to_string(),
                points: 100.0,
                category_id: None,
            },
        )
        .expect("assignment");
        assert!(book.master.is_empty());

        book.enroll_student(
            &s,
            Student {
                id: StudentId::new("alice"),
                first_name: "Alice".to_string(),
                last_name: "A".to_string(),
            },
        )
        .expect("enroll");
        assert!(book.master.contains(&StudentId::new("alice"), &AssignmentId::new("quiz1")));

        book.add_assignment(
            &c,
            Assignment {
                id: AssignmentId::new("quiz2"),
                name: "Quiz 2".to_string(),
                points: 100.0,
                category_id: None,
            },
        )
        .expect("assignment");
        assert_eq!(book.master.len(), 2);
        assert_eq!(
            book.master
                .get_score(&StudentId::new("alice"), &AssignmentId::new("quiz2")),
            0.0
        );
    }
}
