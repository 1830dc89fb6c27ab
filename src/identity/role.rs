use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Coarse role of a caller. Every resolved identity carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

// Substrings checked against a lowercased email. Student hints are tested first.
const STUDENT_EMAIL_HINTS: &[&str] = &["aluno", "student"];
const TEACHER_EMAIL_HINTS: &[&str] = &["prof", "teacher"];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Map a free-form role label (metadata or profile column) to a role.
    /// Unknown labels yield None so the caller can fall through to the next rule.
    pub fn parse(label: &str) -> Option<Role> {
        match label.trim().to_ascii_lowercase().as_str() {
            "teacher" | "professor" | "prof" | "tutor" => Some(Role::Teacher),
            "student" | "aluno" => Some(Role::Student),
            _ => None,
        }
    }

    /// Last-resort guess from the email address.
    pub fn from_email_hint(email: &str) -> Option<Role> {
        let e = email.to_ascii_lowercase();
        if STUDENT_EMAIL_HINTS.iter().any(|h| e.contains(h)) {
            return Some(Role::Student);
        }
        if TEACHER_EMAIL_HINTS.iter().any(|h| e.contains(h)) {
            return Some(Role::Teacher);
        }
        None
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| format!("unknown role '{}'", s))
    }
}

/// Render a role set as `[teacher, student]` for diagnostics.
pub fn format_roles(roles: &[Role]) -> String {
    let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
    format!("[{}]", names.join(", "))
}
