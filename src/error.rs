use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::model::{AssignmentId, StudentId};
use crate::scheme::LetterGrade;

/// Caller-contract violations reported by the editing session and its parts.
///
/// Every operation that returns one of these has left its receiver unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("invalid scope: {message}")]
    ScopeNesting { message: String },

    #[error("not in scope: {message}")]
    ScopeMembership { message: String },

    #[error("{letter} lower bound {requested} overlaps neighbouring bound {conflict}")]
    OverlappingRange {
        letter: LetterGrade,
        requested: f64,
        conflict: f64,
    },

    #[error("no score entry for student {student} / assignment {assignment}")]
    NotFound {
        student: StudentId,
        assignment: AssignmentId,
    },

    #[error("{0}")]
    Precondition(String),

    #[error("unknown {kind}: {id}")]
    UnknownEntity { kind: &'static str, id: String },
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::ScopeNesting { .. } => "scope_nesting",
            SessionError::ScopeMembership { .. } => "scope_membership",
            SessionError::OverlappingRange { .. } => "overlapping_range",
            SessionError::NotFound { .. } => "not_found",
            SessionError::Precondition(_) => "precondition",
            SessionError::UnknownEntity { .. } => "unknown_entity",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            SessionError::OverlappingRange {
                letter,
                requested,
                conflict,
            } => Some(json!({
                "letter": letter,
                "requested": requested,
                "conflict": conflict,
            })),
            SessionError::NotFound {
                student,
                assignment,
            } => Some(json!({
                "studentId": student,
                "assignmentId": assignment,
            })),
            SessionError::UnknownEntity { kind, id } => Some(json!({
                "kind": kind,
                "id": id,
            })),
            _ => None,
        }
    }

    pub(crate) fn unknown(kind: &'static str, id: impl fmt::Display) -> Self {
        SessionError::UnknownEntity {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        SessionError::Precondition(message.into())
    }

    pub(crate) fn membership(message: impl Into<String>) -> Self {
        SessionError::ScopeMembership {
            message: message.into(),
        }
    }
}
