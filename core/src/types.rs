//! Shared primitive types used across the monitoring core.

/// Authentication uid of a signed-in user.
pub type Uid = String;

/// Store-assigned identifier of a student record.
pub type RecordId = String;

/// Externally assigned student identifier, distinct from the record id.
pub type BusinessId = String;

/// School grade level (9, 10, 11, ...).
pub type GradeLevel = i32;

/// Monotonically increasing tag distinguishing successive scope
/// resolutions. Emissions carrying a stale generation are discarded.
pub type Generation = u64;
