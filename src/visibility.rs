//! Who may see and touch which notes.
//!
//! A note is visible to its owner, and to any user the owner granted a
//! share to who is still an accepted friend of the owner. Friendship is
//! re-checked at read time, so unfriending suspends shared access
//! immediately without deleting grant rows.

use crate::storage::{NoteRow, ProfileRow, Storage, StorageError};

/// A note the viewer may see, with the owner's profile attached when it
/// is not their own.
#[derive(Debug, Clone)]
pub struct VisibleNote {
    pub note: NoteRow,
    pub author: Option<ProfileRow>,
    pub is_own: bool,
}

/// All notes the viewer may see for one date: their own (if any) first,
/// then notes shared with them by current friends.
pub fn visible_notes(
    storage: &Storage,
    viewer_id: &str,
    date: &str,
) -> Result<Vec<VisibleNote>, StorageError> {
    let mut result = Vec::new();
    if let Some(own) = storage.get_note_by_owner_date(viewer_id, date)? {
        result.push(VisibleNote {
            note: own,
            author: None,
            is_own: true,
        });
    }
    for note in storage.list_shared_notes_for_date(viewer_id, date)? {
        let author = storage.get_profile(&note.user_id)?;
        result.push(VisibleNote {
            note,
            author,
            is_own: false,
        });
    }
    Ok(result)
}

/// Whether the viewer may read this note and its blocks.
pub fn can_view_note(
    storage: &Storage,
    viewer_id: &str,
    note: &NoteRow,
) -> Result<bool, StorageError> {
    if note.user_id == viewer_id {
        return Ok(true);
    }
    Ok(storage.is_note_shared_with(&note.id, viewer_id)?
        && storage.are_friends(&note.user_id, viewer_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ProfileRow, UserRow};

    fn test_storage() -> (Storage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open_in_memory(&dir.path().join("images")).unwrap();
        (storage, dir)
    }

    fn add_user(storage: &Storage, id: &str, username: &str) {
        storage
            .insert_user_with_profile(
                &UserRow {
                    id: id.to_string(),
                    email: format!("{username}@example.com"),
                    password_hash: "hash".to_string(),
                    created_at: 1,
                },
                &ProfileRow {
                    id: id.to_string(),
                    username: Some(username.to_string()),
                    full_name: None,
                },
            )
            .unwrap();
    }

    fn befriend(storage: &Storage, a: &str, b: &str) {
        let edge = storage.insert_friend_request(a, b, 1).unwrap();
        storage.accept_friend_request(edge, 1).unwrap();
    }

    #[test]
    fn test_owner_always_sees_own_note() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        let note = storage.ensure_note("u1", "2026-08-28", 1).unwrap();

        assert!(can_view_note(&storage, "u1", &note).unwrap());
        let visible = visible_notes(&storage, "u1", "2026-08-28").unwrap();
        assert_eq!(visible.len(), 1);
        assert!(visible[0].is_own);
        assert!(visible[0].author.is_none());
    }

    #[test]
    fn test_share_alone_is_not_enough() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        add_user(&storage, "u2", "bob");
        let note = storage.ensure_note("u1", "2026-08-28", 1).unwrap();

        // Grant without friendship: invisible.
        storage.insert_share(&note.id, "u1", "u2", 1).unwrap();
        assert!(!can_view_note(&storage, "u2", &note).unwrap());
        assert!(visible_notes(&storage, "u2", "2026-08-28").unwrap().is_empty());

        // Friendship without grant: also invisible.
        storage.delete_share(&note.id, "u2").unwrap();
        befriend(&storage, "u1", "u2");
        assert!(!can_view_note(&storage, "u2", &note).unwrap());
    }

    #[test]
    fn test_friend_with_grant_sees_note_with_author() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        add_user(&storage, "u2", "bob");
        let note = storage.ensure_note("u1", "2026-08-28", 1).unwrap();
        befriend(&storage, "u1", "u2");
        storage.insert_share(&note.id, "u1", "u2", 1).unwrap();

        assert!(can_view_note(&storage, "u2", &note).unwrap());
        let visible = visible_notes(&storage, "u2", "2026-08-28").unwrap();
        assert_eq!(visible.len(), 1);
        assert!(!visible[0].is_own);
        assert_eq!(
            visible[0].author.as_ref().unwrap().username,
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_unfriending_suspends_shared_access() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        add_user(&storage, "u2", "bob");
        let note = storage.ensure_note("u1", "2026-08-28", 1).unwrap();
        befriend(&storage, "u1", "u2");
        storage.insert_share(&note.id, "u1", "u2", 1).unwrap();
        assert!(can_view_note(&storage, "u2", &note).unwrap());

        storage.remove_friendship("u1", "u2").unwrap();
        assert!(!can_view_note(&storage, "u2", &note).unwrap());

        // Re-friending restores access through the surviving grant.
        befriend(&storage, "u2", "u1");
        assert!(can_view_note(&storage, "u2", &note).unwrap());
    }

    #[test]
    fn test_own_note_listed_before_shared() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        add_user(&storage, "u2", "bob");
        let shared = storage.ensure_note("u1", "2026-08-28", 1).unwrap();
        storage.ensure_note("u2", "2026-08-28", 2).unwrap();
        befriend(&storage, "u1", "u2");
        storage.insert_share(&shared.id, "u1", "u2", 1).unwrap();

        let visible = visible_notes(&storage, "u2", "2026-08-28").unwrap();
        assert_eq!(visible.len(), 2);
        assert!(visible[0].is_own);
        assert!(!visible[1].is_own);
    }
}
