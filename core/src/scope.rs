//! Visibility scope resolution.
//!
//! A scope descriptor is recreated — with a fresh generation — every
//! time the identity or the taught grade changes. Descriptors are never
//! re-filtered in place; the old descriptor's subscription is torn down
//! and a new one opened.

use crate::identity::{Identity, Role};
use crate::model::StudentRecord;
use crate::types::{Generation, GradeLevel, Uid};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// The global collection, unfiltered.
    All,
    /// Records the identity registered, in the grade it teaches.
    OwnedAndGraded,
    /// An empty monitoring view. Not an error.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeDescriptor {
    pub visibility: Visibility,
    pub owner_filter: Option<Uid>,
    pub grade_filter: Option<GradeLevel>,
    pub generation: Generation,
}

impl ScopeDescriptor {
    fn hidden(generation: Generation) -> Self {
        Self {
            visibility: Visibility::None,
            owner_filter: None,
            grade_filter: None,
            generation,
        }
    }

    /// Does this scope admit the given record?
    pub fn matches(&self, record: &StudentRecord) -> bool {
        match self.visibility {
            Visibility::All => true,
            Visibility::None => false,
            Visibility::OwnedAndGraded => {
                self.owner_filter
                    .as_deref()
                    .map_or(true, |owner| record.owner_id == owner)
                    && self
                        .grade_filter
                        .map_or(true, |grade| record.grade == grade)
            }
        }
    }
}

/// Resolves identities to scope descriptors, stamping each resolution
/// with the next generation.
pub struct ScopeResolver {
    last_generation: Generation,
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeResolver {
    pub fn new() -> Self {
        Self { last_generation: 0 }
    }

    /// Resolve the visible scope for an identity.
    ///
    /// `grade_override` takes precedence over the identity's assigned
    /// grade for teachers (the session-level "grade being taught right
    /// now" setting). Role handling is exhaustive:
    ///   - Leader  → All
    ///   - Teacher → OwnedAndGraded, or None while no grade is known
    ///   - Student → None (the self-view goes through the separate
    ///               by-business-id lookup path)
    ///   - Pending → None
    pub fn resolve(
        &mut self,
        identity: Option<&Identity>,
        grade_override: Option<GradeLevel>,
    ) -> ScopeDescriptor {
        self.last_generation += 1;
        let generation = self.last_generation;

        let Some(identity) = identity else {
            return ScopeDescriptor::hidden(generation);
        };

        match identity.role {
            Role::Leader => ScopeDescriptor {
                visibility: Visibility::All,
                owner_filter: None,
                grade_filter: None,
                generation,
            },
            Role::Teacher => match grade_override.or(identity.assigned_grade) {
                Some(grade) => ScopeDescriptor {
                    visibility: Visibility::OwnedAndGraded,
                    owner_filter: Some(identity.uid.clone()),
                    grade_filter: Some(grade),
                    generation,
                },
                None => ScopeDescriptor::hidden(generation),
            },
            Role::Student => ScopeDescriptor::hidden(generation),
            Role::Pending => ScopeDescriptor::hidden(generation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{demo_leader, demo_student, demo_teacher};

    #[test]
    fn leader_sees_the_global_collection() {
        let mut resolver = ScopeResolver::new();
        let scope = resolver.resolve(Some(&demo_leader()), None);
        assert_eq!(scope.visibility, Visibility::All);
        assert!(scope.owner_filter.is_none());
        assert!(scope.grade_filter.is_none());
    }

    #[test]
    fn teacher_is_scoped_to_owned_and_graded() {
        let mut resolver = ScopeResolver::new();
        let teacher = demo_teacher();
        let scope = resolver.resolve(Some(&teacher), None);
        assert_eq!(scope.visibility, Visibility::OwnedAndGraded);
        assert_eq!(scope.owner_filter.as_deref(), Some(teacher.uid.as_str()));
        assert_eq!(scope.grade_filter, Some(10));
    }

    #[test]
    fn grade_override_wins_over_assigned_grade() {
        let mut resolver = ScopeResolver::new();
        let scope = resolver.resolve(Some(&demo_teacher()), Some(9));
        assert_eq!(scope.grade_filter, Some(9));
    }

    #[test]
    fn teacher_without_grade_resolves_to_empty_not_error() {
        let mut resolver = ScopeResolver::new();
        let mut teacher = demo_teacher();
        teacher.assigned_grade = None;
        let scope = resolver.resolve(Some(&teacher), None);
        assert_eq!(scope.visibility, Visibility::None);
    }

    #[test]
    fn students_and_signed_out_sessions_see_nothing() {
        let mut resolver = ScopeResolver::new();
        assert_eq!(
            resolver.resolve(Some(&demo_student()), None).visibility,
            Visibility::None
        );
        assert_eq!(resolver.resolve(None, None).visibility, Visibility::None);
    }

    #[test]
    fn every_resolution_bumps_the_generation() {
        let mut resolver = ScopeResolver::new();
        let a = resolver.resolve(Some(&demo_teacher()), None).generation;
        let b = resolver.resolve(Some(&demo_teacher()), Some(9)).generation;
        let c = resolver.resolve(None, None).generation;
        assert!(a < b && b < c);
    }
}
