use serde_json::json;

use crate::db;
use crate::ipc::helpers::{
    f64_param, opt_str_param, respond, session_ref, str_param, student_json, workspace_mut,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{CategoryId, CourseId, GroupId, SectionId, StudentId};

fn require_course(state: &AppState, id: &CourseId) -> Result<(), HandlerErr> {
    if session_ref(state)?.gradebook().catalog.course(id).is_none() {
        return Err(HandlerErr::new("unknown_entity", "course not found"));
    }
    Ok(())
}

fn require_section(state: &AppState, id: &SectionId) -> Result<(), HandlerErr> {
    if session_ref(state)?.gradebook().catalog.section(id).is_none() {
        return Err(HandlerErr::new("unknown_entity", "section not found"));
    }
    Ok(())
}

fn courses_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let name = str_param(req, "name")?;
    let (conn, session) = workspace_mut(state)?;
    let course = db::insert_course(conn, name).map_err(|e| HandlerErr::db("db_insert_failed", e))?;
    let id = course.id.clone();
    session.add_course(course);
    Ok(json!({ "courseId": id }))
}

fn categories_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course = CourseId::new(str_param(req, "courseId")?);
    let name = str_param(req, "name")?;
    let weight = match req.params.get("weight") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(_) => {
            let w = f64_param(req, "weight")?;
            if w < 0.0 {
                return Err(HandlerErr::bad_params("weight must be >= 0"));
            }
            Some(w)
        }
    };
    require_course(state, &course)?;

    let (conn, session) = workspace_mut(state)?;
    let category = db::insert_category(conn, &course, name, weight)
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
    let id = category.id.clone();
    session.add_category(&course, category)?;
    Ok(json!({ "categoryId": id }))
}

fn assignments_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course = CourseId::new(str_param(req, "courseId")?);
    let name = str_param(req, "name")?;
    let points = match req.params.get("points") {
        None => 100.0,
        Some(_) => f64_param(req, "points")?,
    };
    if points < 0.0 {
        return Err(HandlerErr::bad_params("points must be >= 0"));
    }
    let category = opt_str_param(req, "categoryId").map(CategoryId::new);
    require_course(state, &course)?;
    if let Some(cat) = &category {
        let known = session_ref(state)?
            .gradebook()
            .catalog
            .course(&course)
            .map(|c| c.categories.iter().any(|x| &x.id == cat))
            .unwrap_or(false);
        if !known {
            return Err(HandlerErr::new("unknown_entity", "category not found"));
        }
    }

    let (conn, session) = workspace_mut(state)?;
    let assignment = db::insert_assignment(conn, &course, name, points, category.as_ref())
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
    let id = assignment.id.clone();
    session.add_assignment(&course, assignment)?;
    Ok(json!({ "assignmentId": id }))
}

fn sections_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course = CourseId::new(str_param(req, "courseId")?);
    let name = str_param(req, "name")?;
    require_course(state, &course)?;

    let (conn, session) = workspace_mut(state)?;
    let section = db::insert_section(conn, &course, name)
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
    let id = section.id.clone();
    session.add_section(&course, section)?;
    Ok(json!({ "sectionId": id }))
}

fn groups_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let section = SectionId::new(str_param(req, "sectionId")?);
    let name = str_param(req, "name")?;
    require_section(state, &section)?;

    let (conn, session) = workspace_mut(state)?;
    let group = db::insert_group(conn, &section, name)
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
    let id = group.id.clone();
    session.add_group(&section, group)?;
    Ok(json!({ "groupId": id }))
}

fn students_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let section = SectionId::new(str_param(req, "sectionId")?);
    let first_name = str_param(req, "firstName")?;
    let last_name = str_param(req, "lastName")?;
    require_section(state, &section)?;

    let (conn, session) = workspace_mut(state)?;
    let student = db::insert_student(conn, &section, first_name, last_name)
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
    let id = student.id.clone();
    session.enroll_student(&section, student)?;
    Ok(json!({ "studentId": id }))
}

fn groups_add_student(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let group = GroupId::new(str_param(req, "groupId")?);
    let student = StudentId::new(str_param(req, "studentId")?);

    let (conn, session) = workspace_mut(state)?;
    session
        .gradebook()
        .catalog
        .check_group_member(&group, &student)?;
    db::insert_group_member(conn, &group, &student)
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
    session.add_group_member(&group, &student)?;
    Ok(json!({ "groupId": group, "studentId": student }))
}

fn catalog_get(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session = session_ref(state)?;
    let catalog = &session.gradebook().catalog;
    let courses: Vec<serde_json::Value> = catalog
        .courses()
        .iter()
        .map(|c| {
            let sections: Vec<serde_json::Value> = c
                .sections
                .iter()
                .map(|s| {
                    let students: Vec<serde_json::Value> = s
                        .students
                        .iter()
                        .filter_map(|id| catalog.student(id))
                        .map(student_json)
                        .collect();
                    json!({
                        "id": s.id,
                        "name": s.name,
                        "students": students,
                        "groups": s.groups,
                    })
                })
                .collect();
            json!({
                "id": c.id,
                "name": c.name,
                "categories": c.categories,
                "assignments": c.assignment_tree(),
                "sections": sections,
            })
        })
        .collect();
    Ok(json!({ "courses": courses }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "courses.create" => courses_create(state, req),
        "categories.create" => categories_create(state, req),
        "assignments.create" => assignments_create(state, req),
        "sections.create" => sections_create(state, req),
        "groups.create" => groups_create(state, req),
        "groups.addStudent" => groups_add_student(state, req),
        "students.create" => students_create(state, req),
        "catalog.get" => catalog_get(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
