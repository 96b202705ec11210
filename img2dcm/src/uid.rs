//! Unique identifier generation.
use uuid::Uuid;

/// A source of new, globally unique DICOM UIDs.
///
/// Any `FnMut() -> String` closure is also a generator,
/// which is handy for producing predictable identifiers.
pub trait UidGenerator {
    /// Produce a new UID.
    fn generate_uid(&mut self) -> String;
}

impl<F> UidGenerator for F
where
    F: FnMut() -> String,
{
    fn generate_uid(&mut self) -> String {
        self()
    }
}

/// Generates UUID-derived UIDs under the `2.25` root,
/// as described in DICOM PS3.5 section B.2.
#[derive(Debug, Default, Copy, Clone)]
pub struct RandomUidGenerator;

impl UidGenerator for RandomUidGenerator {
    fn generate_uid(&mut self) -> String {
        uuid_to_uid(Uuid::new_v4())
    }
}

/// Convert a UUID into a UID of the form `2.25.<decimal>`.
pub fn uuid_to_uid(uuid: Uuid) -> String {
    format!("2.25.{}", uuid.as_u128())
}

/// Check whether the given string is a syntactically valid DICOM UID.
///
/// Trailing null padding is ignored.
pub fn is_valid_uid(uid: &str) -> bool {
    let uid = uid.trim_end_matches('\0');
    if uid.is_empty() || uid.len() > 64 {
        return false;
    }
    uid.split('.').all(|component| {
        !component.is_empty()
            && component.bytes().all(|b| b.is_ascii_digit())
            && (component.len() == 1 || !component.starts_with('0'))
    })
}
