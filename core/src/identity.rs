//! Identity surface consumed by the core.
//!
//! RULE: the authentication collaborator pushes into the hub; the core
//! only reads. An identity is immutable for its session — a role or
//! grade change arrives as a whole new `Identity` value on the feed,
//! never as an in-place mutation.

use crate::feed::Feed;
use crate::types::{BusinessId, GradeLevel, Uid};
use serde::{Deserialize, Serialize};

/// Closed set of session roles. Exhaustively matched everywhere; there
/// is deliberately no catch-all arm downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Leader,
    Teacher,
    Student,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: Uid,
    pub role: Role,
    /// Grade a teacher is responsible for. Absent for freshly
    /// provisioned teachers and for every other role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_grade: Option<GradeLevel>,
    /// Enrollment number linking a student identity to its own record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_business_id: Option<BusinessId>,
}

/// The two feeds an identity provider must supply: the current identity
/// (None while signed out) and a session-readiness flag.
pub struct IdentityHub {
    identity: Feed<Option<Identity>>,
    ready:    Feed<bool>,
}

impl Default for IdentityHub {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityHub {
    pub fn new() -> Self {
        let hub = Self {
            identity: Feed::new(),
            ready:    Feed::new(),
        };
        hub.identity.publish(None);
        hub.ready.publish(false);
        hub
    }

    pub fn sign_in(&self, identity: Identity) {
        log::debug!("identity hub: sign-in uid={} role={:?}", identity.uid, identity.role);
        self.identity.publish(Some(identity));
    }

    pub fn sign_out(&self) {
        log::debug!("identity hub: sign-out");
        self.identity.publish(None);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.publish(ready);
    }

    pub fn identity(&self) -> &Feed<Option<Identity>> {
        &self.identity
    }

    pub fn ready(&self) -> &Feed<bool> {
        &self.ready
    }

    pub fn current(&self) -> Option<Identity> {
        self.identity.latest().flatten()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.latest().unwrap_or(false)
    }
}

// ── Demo identities ──────────────────────────────────────────────────
// Fixed sign-ins for the runner and tests, in place of a real
// authentication backend.

pub fn demo_leader() -> Identity {
    Identity {
        uid: "demo-leader-uid".into(),
        role: Role::Leader,
        assigned_grade: None,
        student_business_id: None,
    }
}

pub fn demo_teacher() -> Identity {
    Identity {
        uid: "demo-teacher-uid".into(),
        role: Role::Teacher,
        assigned_grade: Some(10),
        student_business_id: None,
    }
}

pub fn demo_student() -> Identity {
    Identity {
        uid: "demo-student-uid".into(),
        role: Role::Student,
        assigned_grade: None,
        student_business_id: Some("10010".into()),
    }
}
