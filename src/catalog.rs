use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::SessionError;
use crate::model::{AssignmentId, CategoryId, CourseId, GroupId, Scope, SectionId, StudentId};
use crate::scores::ScoreEntry;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: AssignmentId,
    pub name: String,
    pub points: f64,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub students: Vec<StudentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    pub students: Vec<StudentId>,
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub categories: Vec<Category>,
    pub assignments: Vec<Assignment>,
    pub sections: Vec<Section>,
}

impl Course {
    pub fn new(id: CourseId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            categories: Vec::new(),
            assignments: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// Assignments in tree order: each category's assignments in creation
    /// order, categories in creation order, uncategorized ones last.
    pub fn assignment_tree(&self) -> Vec<&Assignment> {
        let mut out: Vec<&Assignment> = Vec::with_capacity(self.assignments.len());
        for c in &self.categories {
            out.extend(
                self.assignments
                    .iter()
                    .filter(|a| a.category_id.as_ref() == Some(&c.id)),
            );
        }
        let known: HashSet<&CategoryId> = self.categories.iter().map(|c| &c.id).collect();
        out.extend(self.assignments.iter().filter(|a| match &a.category_id {
            None => true,
            Some(c) => !known.contains(c),
        }));
        out
    }

    /// Every student enrolled in any section, in section order, without
    /// duplicates.
    pub fn students(&self) -> Vec<StudentId> {
        let mut seen: HashSet<&StudentId> = HashSet::new();
        let mut out = Vec::new();
        for sec in &self.sections {
            for s in &sec.students {
                if seen.insert(s) {
                    out.push(s.clone());
                }
            }
        }
        out
    }

    /// Category-weighted percentage for one student's score row.
    ///
    /// Each category with points contributes `100 * sum(score) / sum(points)`.
    /// Uncategorized assignments share one unweighted bucket. Weighted
    /// buckets are combined by normalised weight; if none carries a positive
    /// weight the bucket percentages are averaged. `None` when no assignment
    /// has points.
    pub fn weighted_percentage(&self, row: &HashMap<AssignmentId, ScoreEntry>) -> Option<f64> {
        let weights: HashMap<&CategoryId, f64> = self
            .categories
            .iter()
            .map(|c| (&c.id, c.weight.unwrap_or(0.0)))
            .collect();

        // bucket -> (score sum, points sum)
        let mut buckets: Vec<(Option<&CategoryId>, f64, f64)> = Vec::new();
        for a in self.assignment_tree() {
            if a.points <= 0.0 {
                continue;
            }
            let key = a.category_id.as_ref().filter(|c| weights.contains_key(c));
            let score = row.get(&a.id).map(|e| e.score).unwrap_or(0.0);
            match buckets.iter_mut().find(|b| b.0 == key) {
                Some(b) => {
                    b.1 += score;
                    b.2 += a.points;
                }
                None => buckets.push((key, score, a.points)),
            }
        }
        if buckets.is_empty() {
            return None;
        }

        let mut sum = 0.0_f64;
        let mut denom = 0.0_f64;
        let mut sum_equal = 0.0_f64;
        for (key, score, points) in &buckets {
            let pct = 100.0 * score / points;
            let w = key.and_then(|k| weights.get(k).copied()).unwrap_or(0.0);
            if w > 0.0 {
                sum += pct * w;
                denom += w;
            }
            sum_equal += pct;
        }

        if denom > 0.0 {
            Some(sum / denom)
        } else {
            Some(sum_equal / buckets.len() as f64)
        }
    }
}

/// Roster and assignment tree for every course in the gradebook.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    courses: Vec<Course>,
    students: HashMap<StudentId, Student>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn course(&self, id: &CourseId) -> Option<&Course> {
        self.courses.iter().find(|c| &c.id == id)
    }

    pub fn student(&self, id: &StudentId) -> Option<&Student> {
        self.students.get(id)
    }

    pub fn section(&self, id: &SectionId) -> Option<(&Course, &Section)> {
        self.courses
            .iter()
            .find_map(|c| c.sections.iter().find(|s| &s.id == id).map(|s| (c, s)))
    }

    pub fn group(&self, id: &GroupId) -> Option<(&Course, &Section, &Group)> {
        self.courses.iter().find_map(|c| {
            c.sections.iter().find_map(|s| {
                s.groups.iter().find(|g| &g.id == id).map(|g| (c, s, g))
            })
        })
    }

    fn course_mut(&mut self, id: &CourseId) -> Result<&mut Course, SessionError> {
        self.courses
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| SessionError::unknown("course", id))
    }

    fn section_mut(&mut self, id: &SectionId) -> Result<&mut Section, SessionError> {
        self.courses
            .iter_mut()
            .flat_map(|c| c.sections.iter_mut())
            .find(|s| &s.id == id)
            .ok_or_else(|| SessionError::unknown("section", id))
    }

    pub fn add_course(&mut self, course: Course) {
        self.courses.push(course);
    }

    pub fn add_category(&mut self, course: &CourseId, category: Category) -> Result<(), SessionError> {
        self.course_mut(course)?.categories.push(category);
        Ok(())
    }

    pub fn add_assignment(
        &mut self,
        course: &CourseId,
        assignment: Assignment,
    ) -> Result<(), SessionError> {
        let c = self.course_mut(course)?;
        if let Some(cat) = &assignment.category_id {
            if !c.categories.iter().any(|x| &x.id == cat) {
                return Err(SessionError::unknown("category", cat));
            }
        }
        c.assignments.push(assignment);
        Ok(())
    }

    pub fn add_section(&mut self, course: &CourseId, section: Section) -> Result<(), SessionError> {
        self.course_mut(course)?.sections.push(section);
        Ok(())
    }

    pub fn add_group(&mut self, section: &SectionId, group: Group) -> Result<(), SessionError> {
        self.section_mut(section)?.groups.push(group);
        Ok(())
    }

    /// Registers the student (if new) and enrolls them in `section`. An id
    /// that is already registered keeps its first record.
    pub fn enroll(&mut self, section: &SectionId, student: Student) -> Result<(), SessionError> {
        let sec = self.section_mut(section)?;
        if !sec.students.contains(&student.id) {
            sec.students.push(student.id.clone());
        }
        self.students.entry(student.id.clone()).or_insert(student);
        Ok(())
    }

    /// Checks that `group` exists and `student` is enrolled in its section.
    pub fn check_group_member(&self, group: &GroupId, student: &StudentId) -> Result<(), SessionError> {
        let Some((_, section, _)) = self.group(group) else {
            return Err(SessionError::unknown("group", group));
        };
        if !section.students.contains(student) {
            return Err(SessionError::membership(format!(
                "student {} is not enrolled in section {}",
                student, section.id
            )));
        }
        Ok(())
    }

    pub fn add_group_member(&mut self, group: &GroupId, student: &StudentId) -> Result<(), SessionError> {
        self.check_group_member(group, student)?;
        let g = self
            .courses
            .iter_mut()
            .flat_map(|c| c.sections.iter_mut())
            .flat_map(|s| s.groups.iter_mut())
            .find(|g| &g.id == group)
            .ok_or_else(|| SessionError::unknown("group", group))?;
        if !g.students.contains(student) {
            g.students.push(student.clone());
        }
        Ok(())
    }

    /// Checks that every level of `scope` exists and belongs to its parent.
    pub fn validate_scope(&self, scope: &Scope) -> Result<(), SessionError> {
        let Some(course_id) = &scope.course else {
            return Ok(());
        };
        let course = self
            .course(course_id)
            .ok_or_else(|| SessionError::unknown("course", course_id))?;
        let Some(section_id) = &scope.section else {
            return Ok(());
        };
        let section = course
            .sections
            .iter()
            .find(|s| &s.id == section_id)
            .ok_or_else(|| SessionError::ScopeNesting {
                message: format!("section {} is not part of course {}", section_id, course_id),
            })?;
        if let Some(group_id) = &scope.group {
            if !section.groups.iter().any(|g| &g.id == group_id) {
                return Err(SessionError::ScopeNesting {
                    message: format!("group {} is not part of section {}", group_id, section_id),
                });
            }
        }
        Ok(())
    }

    pub fn students_in_scope(&self, scope: &Scope) -> Vec<StudentId> {
        if let Some(g) = &scope.group {
            return self
                .group(g)
                .map(|(_, _, g)| g.students.clone())
                .unwrap_or_default();
        }
        if let Some(s) = &scope.section {
            return self
                .section(s)
                .map(|(_, s)| s.students.clone())
                .unwrap_or_default();
        }
        if let Some(c) = &scope.course {
            return self.course(c).map(|c| c.students()).unwrap_or_default();
        }
        Vec::new()
    }

    pub fn assignments_in_scope(&self, scope: &Scope) -> Vec<Assignment> {
        scope
            .course
            .as_ref()
            .and_then(|c| self.course(c))
            .map(|c| c.assignment_tree().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Aggregate percentage for `row` over the scope's course tree, when one
    /// is selected and has any graded assignment.
    pub fn weighted_percentage(
        &self,
        scope: &Scope,
        row: &HashMap<AssignmentId, ScoreEntry>,
    ) -> Option<f64> {
        scope
            .course
            .as_ref()
            .and_then(|c| self.course(c))
            .and_then(|c| c.weighted_percentage(row))
    }
}
