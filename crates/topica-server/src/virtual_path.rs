//! Per-session read-only paths under `/me/`.
//!
//! | Path | Value |
//! |---|---|
//! | `/me/nickname` | the session nickname |
//! | `/me/id` | the session id (hyphenated UUID) |
//!
//! Both are String-typed and matched case-insensitively. They are resolved
//! before the registry is consulted and never stored in it.

use bytes::Bytes;
use topica_types::TopicType;
use uuid::Uuid;

pub const NICKNAME_PATH: &str = "/me/nickname";
pub const ID_PATH: &str = "/me/id";

/// Who a session is, as seen through its virtual paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub nickname: String,
}

pub use topica_types::is_virtual;

/// Resolve a virtual path to its type and current value.
///
/// `None` for paths outside `/me/` and for unknown `/me/...` paths.
pub fn resolve(path: &str, identity: &Identity) -> Option<(TopicType, Bytes)> {
    if path.eq_ignore_ascii_case(NICKNAME_PATH) {
        Some((TopicType::String, Bytes::from(identity.nickname.clone())))
    } else if path.eq_ignore_ascii_case(ID_PATH) {
        Some((TopicType::String, Bytes::from(identity.id.to_string())))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: Uuid::nil(),
            nickname: "BraveJadeOtter".to_string(),
        }
    }

    #[test]
    fn resolves_nickname_case_insensitively() {
        let (ty, value) = resolve("/ME/NickName", &identity()).unwrap();
        assert_eq!(ty, TopicType::String);
        assert_eq!(value, Bytes::from_static(b"BraveJadeOtter"));
    }

    #[test]
    fn resolves_id() {
        let (_, value) = resolve("/me/id", &identity()).unwrap();
        assert_eq!(value, Bytes::from_static(b"00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn unknown_me_path_is_virtual_but_unresolved() {
        assert!(is_virtual("/Me/colour"));
        assert!(resolve("/me/colour", &identity()).is_none());
    }

    #[test]
    fn ordinary_paths_are_not_virtual() {
        assert!(!is_virtual("/media/volume"));
        assert!(!is_virtual("/me"));
        assert!(!is_virtual("/é"));
        assert!(resolve("/arm/angle", &identity()).is_none());
    }
}
