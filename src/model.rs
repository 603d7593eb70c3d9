use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SessionError;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_type!(StudentId);
id_type!(AssignmentId);
id_type!(CategoryId);
id_type!(CourseId);
id_type!(SectionId);
id_type!(GroupId);

/// Current course/section/group selection.
///
/// A deeper level is only ever set when its parent is set; `Scope::new`
/// rejects any other combination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub course: Option<CourseId>,
    pub section: Option<SectionId>,
    pub group: Option<GroupId>,
}

impl Scope {
    pub fn new(
        course: Option<CourseId>,
        section: Option<SectionId>,
        group: Option<GroupId>,
    ) -> Result<Self, SessionError> {
        if group.is_some() && section.is_none() {
            return Err(SessionError::ScopeNesting {
                message: "group selected without a section".to_string(),
            });
        }
        if section.is_some() && course.is_none() {
            return Err(SessionError::ScopeNesting {
                message: "section selected without a course".to_string(),
            });
        }
        Ok(Self {
            course,
            section,
            group,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.course.is_none()
    }
}
