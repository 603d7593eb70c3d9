use anyhow::Context;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{Assignment, Catalog, Category, Course, Group, Section, Student};
use crate::gradebook::Gradebook;
use crate::model::{AssignmentId, CategoryId, CourseId, GroupId, SectionId, StudentId};
use crate::scheme::{GradeRange, GradeScheme, LetterGrade};
use crate::scores::ScoreMatrix;
use crate::session::Delta;

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("open {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            name TEXT NOT NULL,
            weight REAL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_categories_course ON categories(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            category_id TEXT,
            name TEXT NOT NULL,
            points REAL NOT NULL DEFAULT 100,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(category_id) REFERENCES categories(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_course ON assignments(course_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            section_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(section_id, student_id),
            FOREIGN KEY(section_id) REFERENCES sections(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_groups(
            id TEXT PRIMARY KEY,
            section_id TEXT NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(section_id) REFERENCES sections(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS group_members(
            group_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(group_id, student_id),
            FOREIGN KEY(group_id) REFERENCES student_groups(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    // Only committed values are stored; missing pairs load as 0.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS scores(
            student_id TEXT NOT NULL,
            assignment_id TEXT NOT NULL,
            value REAL NOT NULL,
            updated_at TEXT,
            PRIMARY KEY(student_id, assignment_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(assignment_id) REFERENCES assignments(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_ranges(
            section_id TEXT NOT NULL,
            letter TEXT NOT NULL,
            lower_bound REAL NOT NULL,
            color TEXT NOT NULL,
            PRIMARY KEY(section_id, letter),
            FOREIGN KEY(section_id) REFERENCES sections(id)
        )",
        [],
    )?;

    Ok(())
}

fn next_sort_order(conn: &Connection, table: &str, parent_col: Option<(&str, &str)>) -> anyhow::Result<i64> {
    let v = match parent_col {
        Some((col, parent)) => conn.query_row(
            &format!(
                "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM {} WHERE {} = ?",
                table, col
            ),
            [parent],
            |r| r.get(0),
        )?,
        None => conn.query_row(
            &format!("SELECT COALESCE(MAX(sort_order), -1) + 1 FROM {}", table),
            [],
            |r| r.get(0),
        )?,
    };
    Ok(v)
}

pub fn insert_course(conn: &Connection, name: &str) -> anyhow::Result<Course> {
    let id = Uuid::new_v4().to_string();
    let sort_order = next_sort_order(conn, "courses", None)?;
    conn.execute(
        "INSERT INTO courses(id, name, sort_order) VALUES(?, ?, ?)",
        (&id, name, sort_order),
    )?;
    Ok(Course::new(CourseId::new(id), name))
}

pub fn insert_category(
    conn: &Connection,
    course: &CourseId,
    name: &str,
    weight: Option<f64>,
) -> anyhow::Result<Category> {
    let id = Uuid::new_v4().to_string();
    let sort_order = next_sort_order(conn, "categories", Some(("course_id", course.as_str())))?;
    conn.execute(
        "INSERT INTO categories(id, course_id, name, weight, sort_order) VALUES(?, ?, ?, ?, ?)",
        (&id, course.as_str(), name, weight, sort_order),
    )?;
    Ok(Category {
        id: CategoryId::new(id),
        name: name.to_string(),
        weight,
    })
}

pub fn insert_assignment(
    conn: &Connection,
    course: &CourseId,
    name: &str,
    points: f64,
    category: Option<&CategoryId>,
) -> anyhow::Result<Assignment> {
    let id = Uuid::new_v4().to_string();
    let sort_order = next_sort_order(conn, "assignments", Some(("course_id", course.as_str())))?;
    conn.execute(
        "INSERT INTO assignments(id, course_id, category_id, name, points, sort_order)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            course.as_str(),
            category.map(|c| c.as_str()),
            name,
            points,
            sort_order,
        ),
    )?;
    Ok(Assignment {
        id: AssignmentId::new(id),
        name: name.to_string(),
        points,
        category_id: category.cloned(),
    })
}

/// Inserts the section together with a copy of the default grade scheme.
pub fn insert_section(conn: &mut Connection, course: &CourseId, name: &str) -> anyhow::Result<Section> {
    let id = SectionId::new(Uuid::new_v4().to_string());
    let sort_order = next_sort_order(conn, "sections", Some(("course_id", course.as_str())))?;
    conn.execute(
        "INSERT INTO sections(id, course_id, name, sort_order) VALUES(?, ?, ?, ?)",
        (id.as_str(), course.as_str(), name, sort_order),
    )?;
    save_grade_scheme(conn, &id, &GradeScheme::default())?;
    Ok(Section {
        id,
        name: name.to_string(),
        students: Vec::new(),
        groups: Vec::new(),
    })
}

pub fn insert_group(conn: &Connection, section: &SectionId, name: &str) -> anyhow::Result<Group> {
    let id = Uuid::new_v4().to_string();
    let sort_order = next_sort_order(conn, "student_groups", Some(("section_id", section.as_str())))?;
    conn.execute(
        "INSERT INTO student_groups(id, section_id, name, sort_order) VALUES(?, ?, ?, ?)",
        (&id, section.as_str(), name, sort_order),
    )?;
    Ok(Group {
        id: GroupId::new(id),
        name: name.to_string(),
        students: Vec::new(),
    })
}

/// Creates the student and enrolls them in `section`.
pub fn insert_student(
    conn: &mut Connection,
    section: &SectionId,
    first_name: &str,
    last_name: &str,
) -> anyhow::Result<Student> {
    let id = Uuid::new_v4().to_string();
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO students(id, last_name, first_name) VALUES(?, ?, ?)",
        (&id, last_name, first_name),
    )?;
    let sort_order = next_sort_order(&tx, "enrollments", Some(("section_id", section.as_str())))?;
    tx.execute(
        "INSERT INTO enrollments(section_id, student_id, sort_order) VALUES(?, ?, ?)",
        (section.as_str(), &id, sort_order),
    )?;
    tx.commit()?;
    Ok(Student {
        id: StudentId::new(id),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    })
}

pub fn insert_group_member(conn: &Connection, group: &GroupId, student: &StudentId) -> anyhow::Result<()> {
    let sort_order = next_sort_order(conn, "group_members", Some(("group_id", group.as_str())))?;
    conn.execute(
        "INSERT OR IGNORE INTO group_members(group_id, student_id, sort_order) VALUES(?, ?, ?)",
        (group.as_str(), student.as_str(), sort_order),
    )?;
    Ok(())
}

/// Writes committed deltas in log order; the last one for a cell wins.
pub fn commit_scores(conn: &mut Connection, deltas: &[Delta]) -> anyhow::Result<usize> {
    let now = chrono::Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO scores(student_id, assignment_id, value, updated_at)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(student_id, assignment_id) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
        )?;
        for d in deltas {
            stmt.execute((d.student.as_str(), d.assignment.as_str(), d.new_score, &now))?;
        }
    }
    tx.commit()?;
    info!(count = deltas.len(), "scores committed to workspace");
    Ok(deltas.len())
}

pub fn save_grade_scheme(conn: &mut Connection, section: &SectionId, scheme: &GradeScheme) -> anyhow::Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM grade_ranges WHERE section_id = ?",
        [section.as_str()],
    )?;
    for r in scheme.ranges() {
        tx.execute(
            "INSERT INTO grade_ranges(section_id, letter, lower_bound, color) VALUES(?, ?, ?, ?)",
            (section.as_str(), r.letter.as_str(), r.lower_bound, &r.color),
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Loads the roster, the master score table (0 for every pair without a
/// stored value) and each section's grade scheme.
pub fn load_gradebook(conn: &Connection) -> anyhow::Result<Gradebook> {
    let mut catalog = Catalog::new();

    let mut stmt = conn.prepare("SELECT id, name FROM courses ORDER BY sort_order")?;
    let courses: Vec<(String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (id, name) in courses {
        catalog.add_course(Course::new(CourseId::new(id), name));
    }

    let mut stmt =
        conn.prepare("SELECT id, course_id, name, weight FROM categories ORDER BY course_id, sort_order")?;
    let categories: Vec<(String, String, String, Option<f64>)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (id, course_id, name, weight) in categories {
        catalog.add_category(
            &CourseId::new(course_id),
            Category {
                id: CategoryId::new(id),
                name,
                weight,
            },
        )?;
    }

    let mut stmt = conn.prepare(
        "SELECT id, course_id, category_id, name, points FROM assignments ORDER BY course_id, sort_order",
    )?;
    let assignments: Vec<(String, String, Option<String>, String, f64)> = stmt
        .query_map([], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (id, course_id, category_id, name, points) in assignments {
        catalog.add_assignment(
            &CourseId::new(course_id),
            Assignment {
                id: AssignmentId::new(id),
                name,
                points,
                category_id: category_id.map(CategoryId::new),
            },
        )?;
    }

    let mut stmt = conn.prepare("SELECT id, course_id, name FROM sections ORDER BY course_id, sort_order")?;
    let sections: Vec<(String, String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (id, course_id, name) in &sections {
        catalog.add_section(
            &CourseId::new(course_id.as_str()),
            Section {
                id: SectionId::new(id.as_str()),
                name: name.clone(),
                students: Vec::new(),
                groups: Vec::new(),
            },
        )?;
    }

    let mut stmt = conn.prepare(
        "SELECT e.section_id, s.id, s.first_name, s.last_name
         FROM enrollments e JOIN students s ON s.id = e.student_id
         ORDER BY e.section_id, e.sort_order",
    )?;
    let enrollments: Vec<(String, String, String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (section_id, id, first_name, last_name) in enrollments {
        catalog.enroll(
            &SectionId::new(section_id),
            Student {
                id: StudentId::new(id),
                first_name,
                last_name,
            },
        )?;
    }

    let mut stmt =
        conn.prepare("SELECT id, section_id, name FROM student_groups ORDER BY section_id, sort_order")?;
    let groups: Vec<(String, String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (id, section_id, name) in groups {
        catalog.add_group(
            &SectionId::new(section_id),
            Group {
                id: GroupId::new(id),
                name,
                students: Vec::new(),
            },
        )?;
    }

    let mut stmt =
        conn.prepare("SELECT group_id, student_id FROM group_members ORDER BY group_id, sort_order")?;
    let members: Vec<(String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (group_id, student_id) in members {
        if let Err(e) = catalog.add_group_member(&GroupId::new(group_id.as_str()), &StudentId::new(student_id.as_str())) {
            warn!(group = %group_id, student = %student_id, error = %e, "skipping group member");
        }
    }

    let mut master = ScoreMatrix::new();
    for course in catalog.courses() {
        for s in course.students() {
            for a in &course.assignments {
                master.ensure_entry(&s, &a.id);
            }
        }
    }
    let mut stmt = conn.prepare("SELECT student_id, assignment_id, value FROM scores")?;
    let scores: Vec<(String, String, f64)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (student_id, assignment_id, value) in scores {
        master.add_entry(&StudentId::new(student_id), &AssignmentId::new(assignment_id), value);
    }

    let mut stmt = conn.prepare("SELECT section_id, letter, lower_bound, color FROM grade_ranges")?;
    let ranges: Vec<(String, String, f64, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    let mut by_section: HashMap<String, Vec<GradeRange>> = HashMap::new();
    for (section_id, letter, lower_bound, color) in ranges {
        let Some(letter) = LetterGrade::parse(&letter) else {
            warn!(section = %section_id, letter = %letter, "unknown letter grade in stored scheme");
            continue;
        };
        by_section.entry(section_id).or_default().push(GradeRange {
            lower_bound,
            letter,
            color,
        });
    }
    let mut schemes: HashMap<SectionId, GradeScheme> = HashMap::new();
    for (id, _, _) in &sections {
        let scheme = match by_section.remove(id) {
            Some(ranges) => GradeScheme::from_ranges(ranges).unwrap_or_else(|e| {
                warn!(section = %id, error = %e, "stored grade scheme is invalid, using default");
                GradeScheme::default()
            }),
            None => GradeScheme::default(),
        };
        schemes.insert(SectionId::new(id.as_str()), scheme);
    }

    info!(
        courses = catalog.courses().len(),
        scores = master.len(),
        "gradebook loaded"
    );
    Ok(Gradebook::new(catalog, master, schemes))
}
