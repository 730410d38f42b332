//! SQLite storage layer for daybook.
//!
//! Owns schema creation and CRUD for every entity: users and profiles,
//! directed friendship edges, per-date notes, the three block tables
//! (text blocks, todos, images), and share grants. Uploaded image bytes
//! live as files in an `images/` directory alongside the database;
//! only their URLs are stored in rows.
//!
//! Multi-step writes that must not be observed half-done (user+profile at
//! signup, accepting a request plus its reverse edge, ensure-note-exists
//! before a block insert, removing both directions of a friendship) run
//! inside a single transaction.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    NotFound(String),
    AlreadyExists(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            StorageError::Io(e) => write!(f, "io error: {e}"),
            StorageError::NotFound(msg) => write!(f, "not found: {msg}"),
            StorageError::AlreadyExists(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Sqlite(e)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Map a unique-constraint violation to [`StorageError::AlreadyExists`]
/// with a user-facing message; pass other errors through.
fn map_unique(e: rusqlite::Error, friendly: &str) -> StorageError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            return StorageError::AlreadyExists(friendly.to_string());
        }
    }
    StorageError::Sqlite(e)
}

/// Seconds since the Unix epoch; all timestamps in storage use this.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Account row. Profiles are split out so the public directory never
/// touches credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: u64,
}

/// Public profile row, created in the same transaction as the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

/// Directed friendship edge: `user_id` initiated toward `friend_id`.
/// An accepted friendship is exactly two rows, one in each direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRow {
    pub id: i64,
    pub user_id: String,
    pub friend_id: String,
    /// "pending" or "accepted"
    pub status: String,
    pub created_at: u64,
}

/// One note per (owner, date). Created lazily on the first title/subtitle
/// save or block insert. `content` is the legacy free-text body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRow {
    pub id: String,
    pub user_id: String,
    /// Calendar day, "YYYY-MM-DD".
    pub date: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Text block owned by a note; `user_id` is the author and may differ
/// from the note owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlockRow {
    pub id: String,
    pub note_id: String,
    pub user_id: String,
    pub content: String,
    pub order_key: String,
    pub created_at: u64,
}

/// Todo item owned by a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoRow {
    pub id: String,
    pub note_id: String,
    pub user_id: String,
    pub text: String,
    pub completed: bool,
    pub order_key: String,
    pub created_at: u64,
}

/// Image reference owned by a note. `url` points at the file-serving
/// endpoint; bytes live under the images directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteImageRow {
    pub id: String,
    pub note_id: String,
    pub user_id: String,
    pub url: String,
    pub order_key: String,
    pub created_at: u64,
}

/// Share grant: the note owner (`user_id`) lets `friend_id` see the note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedNoteRow {
    pub note_id: String,
    pub user_id: String,
    pub friend_id: String,
    pub created_at: u64,
}

// ---------------------------------------------------------------------------
// Storage handle
// ---------------------------------------------------------------------------

/// Database file name under the data directory.
pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("daybook.db")
}

/// Main storage handle wrapping a SQLite connection.
pub struct Storage {
    conn: Connection,
    /// Directory on disk where uploaded image files are stored.
    pub images_dir: PathBuf,
}

impl Storage {
    /// Open or create a database at the given path. Creates schema if
    /// needed. Image files live in an `images/` subdirectory alongside
    /// the database file.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let images_dir = path.parent().unwrap_or(Path::new(".")).join("images");
        std::fs::create_dir_all(&images_dir)?;
        let storage = Self { conn, images_dir };
        storage.create_schema()?;
        Ok(storage)
    }

    /// Create an in-memory database with an explicit images directory.
    pub fn open_in_memory(images_dir: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        std::fs::create_dir_all(images_dir)?;
        let storage = Self {
            conn,
            images_dir: images_dir.to_path_buf(),
        };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS profiles (
                id          TEXT PRIMARY KEY REFERENCES users(id),
                username    TEXT UNIQUE,
                full_name   TEXT
            );

            CREATE TABLE IF NOT EXISTS friends (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL,
                friend_id   TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'pending',
                created_at  INTEGER NOT NULL,
                UNIQUE (user_id, friend_id)
            );

            CREATE INDEX IF NOT EXISTS idx_friends_target
                ON friends(friend_id, status);

            CREATE TABLE IF NOT EXISTS notes (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                date        TEXT NOT NULL,
                title       TEXT,
                subtitle    TEXT,
                content     TEXT,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL,
                UNIQUE (user_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_notes_date
                ON notes(date);

            CREATE TABLE IF NOT EXISTS text_blocks (
                id          TEXT PRIMARY KEY,
                note_id     TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL,
                content     TEXT NOT NULL,
                order_key   TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_text_blocks_note
                ON text_blocks(note_id, order_key);

            CREATE TABLE IF NOT EXISTS todos (
                id          TEXT PRIMARY KEY,
                note_id     TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL,
                text        TEXT NOT NULL,
                completed   INTEGER NOT NULL DEFAULT 0,
                order_key   TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_todos_note
                ON todos(note_id, order_key);

            CREATE TABLE IF NOT EXISTS note_images (
                id          TEXT PRIMARY KEY,
                note_id     TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL,
                url         TEXT NOT NULL,
                order_key   TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_note_images_note
                ON note_images(note_id, order_key);

            CREATE TABLE IF NOT EXISTS shared_notes (
                note_id     TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL,
                friend_id   TEXT NOT NULL,
                created_at  INTEGER NOT NULL,
                PRIMARY KEY (note_id, friend_id)
            );

            CREATE INDEX IF NOT EXISTS idx_shared_notes_grantee
                ON shared_notes(friend_id);
            ",
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Users + profiles
    // -----------------------------------------------------------------------

    /// Insert a user and their profile atomically; signup must never leave
    /// an account without a directory entry.
    pub fn insert_user_with_profile(
        &self,
        user: &UserRow,
        profile: &ProfileRow,
    ) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO users (id, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user.id, user.email, user.password_hash, user.created_at as i64],
        )
        .map_err(|e| map_unique(e, "email already registered"))?;
        tx.execute(
            "INSERT INTO profiles (id, username, full_name) VALUES (?1, ?2, ?3)",
            params![profile.id, profile.username, profile.full_name],
        )
        .map_err(|e| map_unique(e, "username already taken"))?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: row.get::<_, i64>(3)? as u64,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
        )?;
        let row = stmt
            .query_row(params![email], |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: row.get::<_, i64>(3)? as u64,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, full_name FROM profiles WHERE id = ?1")?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok(ProfileRow {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    full_name: row.get(2)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn update_profile(&self, profile: &ProfileRow) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute(
                "UPDATE profiles SET username = ?1, full_name = ?2 WHERE id = ?3",
                params![profile.username, profile.full_name, profile.id],
            )
            .map_err(|e| map_unique(e, "username already taken"))?;
        Ok(affected > 0)
    }

    /// Case-insensitive substring search on username, excluding the caller.
    /// Returns at most `limit` rows; no match is an empty list, never an
    /// error.
    pub fn search_profiles(
        &self,
        term: &str,
        exclude_user_id: &str,
        limit: u32,
    ) -> Result<Vec<ProfileRow>, StorageError> {
        // Escape LIKE metacharacters so a literal '%' in the term cannot
        // widen the match.
        let escaped = term
            .to_lowercase()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let mut stmt = self.conn.prepare(
            "SELECT id, username, full_name FROM profiles
             WHERE username IS NOT NULL
               AND LOWER(username) LIKE ?1 ESCAPE '\\'
               AND id != ?2
             ORDER BY username
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![pattern, exclude_user_id, limit], |row| {
            Ok(ProfileRow {
                id: row.get(0)?,
                username: row.get(1)?,
                full_name: row.get(2)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Friend graph
    // -----------------------------------------------------------------------

    fn read_friend_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FriendRow> {
        Ok(FriendRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            friend_id: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get::<_, i64>(4)? as u64,
        })
    }

    pub fn get_friend_edge(&self, id: i64) -> Result<Option<FriendRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, friend_id, status, created_at FROM friends WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |r| Self::read_friend_row(r))
            .optional()?;
        Ok(row)
    }

    /// Find the directed edge `user_id -> friend_id` in any status.
    pub fn find_friend_edge(
        &self,
        user_id: &str,
        friend_id: &str,
    ) -> Result<Option<FriendRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, friend_id, status, created_at
             FROM friends WHERE user_id = ?1 AND friend_id = ?2",
        )?;
        let row = stmt
            .query_row(params![user_id, friend_id], |r| Self::read_friend_row(r))
            .optional()?;
        Ok(row)
    }

    /// Insert a pending request edge. The unique (user_id, friend_id)
    /// constraint turns a duplicate into [`StorageError::AlreadyExists`].
    pub fn insert_friend_request(
        &self,
        user_id: &str,
        friend_id: &str,
        now: u64,
    ) -> Result<i64, StorageError> {
        self.conn
            .execute(
                "INSERT INTO friends (user_id, friend_id, status, created_at)
                 VALUES (?1, ?2, 'pending', ?3)",
                params![user_id, friend_id, now as i64],
            )
            .map_err(|e| map_unique(e, "friend request already sent"))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Accept a pending request: mark the edge accepted and upsert the
    /// reverse accepted edge in one transaction, so the friendship is
    /// never observable one-directional.
    pub fn accept_friend_request(&self, edge_id: i64, now: u64) -> Result<FriendRow, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        let edge = tx
            .query_row(
                "SELECT id, user_id, friend_id, status, created_at FROM friends WHERE id = ?1",
                params![edge_id],
                |r| Self::read_friend_row(r),
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("friend request {edge_id}")))?;
        tx.execute(
            "UPDATE friends SET status = 'accepted' WHERE id = ?1",
            params![edge_id],
        )?;
        // The reverse direction may already exist as a pending request
        // (both sides asked); promote it instead of duplicating.
        tx.execute(
            "INSERT INTO friends (user_id, friend_id, status, created_at)
             VALUES (?1, ?2, 'accepted', ?3)
             ON CONFLICT (user_id, friend_id) DO UPDATE SET status = 'accepted'",
            params![edge.friend_id, edge.user_id, now as i64],
        )?;
        tx.commit()?;
        Ok(edge)
    }

    /// Delete a single edge (decline a pending request).
    pub fn delete_friend_edge(&self, id: i64) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM friends WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// Remove a friendship: delete both directed edges. Either direction
    /// individually missing is not an error.
    pub fn remove_friendship(&self, user_id: &str, friend_id: &str) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM friends WHERE user_id = ?1 AND friend_id = ?2",
            params![user_id, friend_id],
        )?;
        tx.execute(
            "DELETE FROM friends WHERE user_id = ?1 AND friend_id = ?2",
            params![friend_id, user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Counterparty ids of all accepted friendships, deduplicated. After
    /// an accept both directions exist, so UNION collapses the mirror.
    pub fn list_friend_ids(&self, user_id: &str) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT friend_id FROM friends WHERE user_id = ?1 AND status = 'accepted'
             UNION
             SELECT user_id FROM friends WHERE friend_id = ?1 AND status = 'accepted'",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Accepted friends resolved to profiles, ordered by username.
    pub fn list_friend_profiles(&self, user_id: &str) -> Result<Vec<ProfileRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.username, p.full_name FROM profiles p
             WHERE p.id IN (
                 SELECT friend_id FROM friends WHERE user_id = ?1 AND status = 'accepted'
                 UNION
                 SELECT user_id FROM friends WHERE friend_id = ?1 AND status = 'accepted'
             )
             ORDER BY p.username",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(ProfileRow {
                id: row.get(0)?,
                username: row.get(1)?,
                full_name: row.get(2)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Incoming pending requests with the requester's profile attached.
    pub fn list_incoming_requests(
        &self,
        user_id: &str,
    ) -> Result<Vec<(FriendRow, ProfileRow)>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.user_id, f.friend_id, f.status, f.created_at,
                    p.id, p.username, p.full_name
             FROM friends f
             JOIN profiles p ON p.id = f.user_id
             WHERE f.friend_id = ?1 AND f.status = 'pending'
             ORDER BY f.created_at",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                FriendRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    friend_id: row.get(2)?,
                    status: row.get(3)?,
                    created_at: row.get::<_, i64>(4)? as u64,
                },
                ProfileRow {
                    id: row.get(5)?,
                    username: row.get(6)?,
                    full_name: row.get(7)?,
                },
            ))
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Whether an accepted edge exists in either direction.
    pub fn are_friends(&self, a: &str, b: &str) -> Result<bool, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM friends
             WHERE status = 'accepted'
               AND ((user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1))",
            params![a, b],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // -----------------------------------------------------------------------
    // Notes
    // -----------------------------------------------------------------------

    fn read_note_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NoteRow> {
        Ok(NoteRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: row.get(2)?,
            title: row.get(3)?,
            subtitle: row.get(4)?,
            content: row.get(5)?,
            created_at: row.get::<_, i64>(6)? as u64,
            updated_at: row.get::<_, i64>(7)? as u64,
        })
    }

    const NOTE_COLS: &'static str =
        "id, user_id, date, title, subtitle, content, created_at, updated_at";

    pub fn get_note(&self, id: &str) -> Result<Option<NoteRow>, StorageError> {
        let sql = format!("SELECT {} FROM notes WHERE id = ?1", Self::NOTE_COLS);
        let mut stmt = self.conn.prepare(&sql)?;
        let row = stmt
            .query_row(params![id], |r| Self::read_note_row(r))
            .optional()?;
        Ok(row)
    }

    pub fn get_note_by_owner_date(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<NoteRow>, StorageError> {
        let sql = format!(
            "SELECT {} FROM notes WHERE user_id = ?1 AND date = ?2",
            Self::NOTE_COLS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let row = stmt
            .query_row(params![user_id, date], |r| Self::read_note_row(r))
            .optional()?;
        Ok(row)
    }

    /// Insert a note. The unique (user_id, date) constraint turns a second
    /// note for the same day into [`StorageError::AlreadyExists`].
    pub fn insert_note(&self, row: &NoteRow) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO notes (id, user_id, date, title, subtitle, content,
                                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.id,
                    row.user_id,
                    row.date,
                    row.title,
                    row.subtitle,
                    row.content,
                    row.created_at as i64,
                    row.updated_at as i64,
                ],
            )
            .map_err(|e| map_unique(e, "a note already exists for this date"))?;
        Ok(())
    }

    /// Return the owner's note for a date, creating an empty one if it
    /// does not exist yet. Insert and read-back share a transaction so a
    /// concurrent caller cannot observe the gap.
    pub fn ensure_note(&self, user_id: &str, date: &str, now: u64) -> Result<NoteRow, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO notes (id, user_id, date, title, subtitle, content,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, NULL, NULL, ?4, ?4)
             ON CONFLICT (user_id, date) DO NOTHING",
            params![uuid::Uuid::new_v4().to_string(), user_id, date, now as i64],
        )?;
        let sql = format!(
            "SELECT {} FROM notes WHERE user_id = ?1 AND date = ?2",
            Self::NOTE_COLS
        );
        let note = tx.query_row(&sql, params![user_id, date], |r| Self::read_note_row(r))?;
        tx.commit()?;
        Ok(note)
    }

    pub fn update_note_meta(
        &self,
        id: &str,
        title: Option<&str>,
        subtitle: Option<&str>,
        content: Option<&str>,
        now: u64,
    ) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE notes SET title = ?1, subtitle = ?2, content = ?3, updated_at = ?4
             WHERE id = ?5",
            params![title, subtitle, content, now as i64, id],
        )?;
        Ok(affected > 0)
    }

    pub fn touch_note(&self, id: &str, now: u64) -> Result<(), StorageError> {
        self.conn.execute(
            "UPDATE notes SET updated_at = ?1 WHERE id = ?2",
            params![now as i64, id],
        )?;
        Ok(())
    }

    /// Notes for a date whose owner granted the viewer a share, restricted
    /// to owners who are still accepted friends of the viewer. Unfriending
    /// suspends visibility even when a stale grant row remains.
    pub fn list_shared_notes_for_date(
        &self,
        viewer_id: &str,
        date: &str,
    ) -> Result<Vec<NoteRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT n.id, n.user_id, n.date, n.title, n.subtitle, n.content,
                    n.created_at, n.updated_at
             FROM notes n
             JOIN shared_notes s ON s.note_id = n.id
             WHERE s.friend_id = ?1 AND n.date = ?2
               AND EXISTS (
                   SELECT 1 FROM friends f
                   WHERE f.status = 'accepted'
                     AND ((f.user_id = n.user_id AND f.friend_id = ?1)
                       OR (f.user_id = ?1 AND f.friend_id = n.user_id))
               )
             ORDER BY n.created_at",
        )?;
        let rows = stmt.query_map(params![viewer_id, date], |r| Self::read_note_row(r))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Distinct dates visible to the viewer: own notes plus notes shared
    /// with them by current friends. Newest first, for the calendar.
    pub fn list_visible_dates(&self, viewer_id: &str) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT date FROM notes WHERE user_id = ?1
             UNION
             SELECT n.date FROM notes n
             JOIN shared_notes s ON s.note_id = n.id
             WHERE s.friend_id = ?1
               AND EXISTS (
                   SELECT 1 FROM friends f
                   WHERE f.status = 'accepted'
                     AND ((f.user_id = n.user_id AND f.friend_id = ?1)
                       OR (f.user_id = ?1 AND f.friend_id = n.user_id))
               )
             ORDER BY 1 DESC",
        )?;
        let rows = stmt.query_map(params![viewer_id], |row| row.get::<_, String>(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Text blocks
    // -----------------------------------------------------------------------

    pub fn insert_text_block(&self, row: &TextBlockRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO text_blocks (id, note_id, user_id, content, order_key, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.id,
                row.note_id,
                row.user_id,
                row.content,
                row.order_key,
                row.created_at as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_text_block(&self, id: &str) -> Result<Option<TextBlockRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, note_id, user_id, content, order_key, created_at
             FROM text_blocks WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok(TextBlockRow {
                    id: row.get(0)?,
                    note_id: row.get(1)?,
                    user_id: row.get(2)?,
                    content: row.get(3)?,
                    order_key: row.get(4)?,
                    created_at: row.get::<_, i64>(5)? as u64,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn list_text_blocks(&self, note_id: &str) -> Result<Vec<TextBlockRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, note_id, user_id, content, order_key, created_at
             FROM text_blocks WHERE note_id = ?1
             ORDER BY order_key, created_at",
        )?;
        let rows = stmt.query_map(params![note_id], |row| {
            Ok(TextBlockRow {
                id: row.get(0)?,
                note_id: row.get(1)?,
                user_id: row.get(2)?,
                content: row.get(3)?,
                order_key: row.get(4)?,
                created_at: row.get::<_, i64>(5)? as u64,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn update_text_block_content(&self, id: &str, content: &str) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE text_blocks SET content = ?1 WHERE id = ?2",
            params![content, id],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_text_block(&self, id: &str) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM text_blocks WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Todos
    // -----------------------------------------------------------------------

    pub fn insert_todo(&self, row: &TodoRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO todos (id, note_id, user_id, text, completed, order_key, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.id,
                row.note_id,
                row.user_id,
                row.text,
                row.completed as i32,
                row.order_key,
                row.created_at as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_todo(&self, id: &str) -> Result<Option<TodoRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, note_id, user_id, text, completed, order_key, created_at
             FROM todos WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok(TodoRow {
                    id: row.get(0)?,
                    note_id: row.get(1)?,
                    user_id: row.get(2)?,
                    text: row.get(3)?,
                    completed: row.get::<_, i32>(4)? != 0,
                    order_key: row.get(5)?,
                    created_at: row.get::<_, i64>(6)? as u64,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn list_todos(&self, note_id: &str) -> Result<Vec<TodoRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, note_id, user_id, text, completed, order_key, created_at
             FROM todos WHERE note_id = ?1
             ORDER BY order_key, created_at",
        )?;
        let rows = stmt.query_map(params![note_id], |row| {
            Ok(TodoRow {
                id: row.get(0)?,
                note_id: row.get(1)?,
                user_id: row.get(2)?,
                text: row.get(3)?,
                completed: row.get::<_, i32>(4)? != 0,
                order_key: row.get(5)?,
                created_at: row.get::<_, i64>(6)? as u64,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn set_todo_completed(&self, id: &str, completed: bool) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE todos SET completed = ?1 WHERE id = ?2",
            params![completed as i32, id],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_todo(&self, id: &str) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM todos WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Note images
    // -----------------------------------------------------------------------

    pub fn insert_note_image(&self, row: &NoteImageRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO note_images (id, note_id, user_id, url, order_key, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.id,
                row.note_id,
                row.user_id,
                row.url,
                row.order_key,
                row.created_at as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_note_image(&self, id: &str) -> Result<Option<NoteImageRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, note_id, user_id, url, order_key, created_at
             FROM note_images WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok(NoteImageRow {
                    id: row.get(0)?,
                    note_id: row.get(1)?,
                    user_id: row.get(2)?,
                    url: row.get(3)?,
                    order_key: row.get(4)?,
                    created_at: row.get::<_, i64>(5)? as u64,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn list_note_images(&self, note_id: &str) -> Result<Vec<NoteImageRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, note_id, user_id, url, order_key, created_at
             FROM note_images WHERE note_id = ?1
             ORDER BY order_key, created_at",
        )?;
        let rows = stmt.query_map(params![note_id], |row| {
            Ok(NoteImageRow {
                id: row.get(0)?,
                note_id: row.get(1)?,
                user_id: row.get(2)?,
                url: row.get(3)?,
                order_key: row.get(4)?,
                created_at: row.get::<_, i64>(5)? as u64,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn delete_note_image(&self, id: &str) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM note_images WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Share grants
    // -----------------------------------------------------------------------

    /// Grant `friend_id` visibility of a note. Duplicate grants are a
    /// no-op; returns whether a new row was inserted.
    pub fn insert_share(
        &self,
        note_id: &str,
        owner_id: &str,
        friend_id: &str,
        now: u64,
    ) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "INSERT OR IGNORE INTO shared_notes (note_id, user_id, friend_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![note_id, owner_id, friend_id, now as i64],
        )?;
        Ok(affected > 0)
    }

    /// Revoke a grant. Idempotent; returns whether a row existed.
    pub fn delete_share(&self, note_id: &str, friend_id: &str) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM shared_notes WHERE note_id = ?1 AND friend_id = ?2",
            params![note_id, friend_id],
        )?;
        Ok(affected > 0)
    }

    pub fn is_note_shared_with(&self, note_id: &str, user_id: &str) -> Result<bool, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM shared_notes WHERE note_id = ?1 AND friend_id = ?2",
            params![note_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Grantees of a note resolved to profiles.
    pub fn list_share_grantees(&self, note_id: &str) -> Result<Vec<ProfileRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.username, p.full_name
             FROM shared_notes s
             JOIN profiles p ON p.id = s.friend_id
             WHERE s.note_id = ?1
             ORDER BY p.username",
        )?;
        let rows = stmt.query_map(params![note_id], |row| {
            Ok(ProfileRow {
                id: row.get(0)?,
                username: row.get(1)?,
                full_name: row.get(2)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage() -> (Storage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open_in_memory(&dir.path().join("images")).unwrap();
        (storage, dir)
    }

    fn add_user(storage: &Storage, id: &str, username: &str) {
        let user = UserRow {
            id: id.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "hash".to_string(),
            created_at: now_secs(),
        };
        let profile = ProfileRow {
            id: id.to_string(),
            username: Some(username.to_string()),
            full_name: None,
        };
        storage.insert_user_with_profile(&user, &profile).unwrap();
    }

    fn count_friend_rows(storage: &Storage) -> i64 {
        storage
            .conn
            .query_row("SELECT COUNT(*) FROM friends", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_user_and_profile_created_together() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");

        let user = storage.get_user("u1").unwrap().unwrap();
        assert_eq!(user.email, "alice@example.com");
        let profile = storage.get_profile("u1").unwrap().unwrap();
        assert_eq!(profile.username, Some("alice".to_string()));

        let by_email = storage.get_user_by_email("alice@example.com").unwrap();
        assert!(by_email.is_some());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");

        let user = UserRow {
            id: "u2".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            created_at: now_secs(),
        };
        let profile = ProfileRow {
            id: "u2".to_string(),
            username: Some("alice2".to_string()),
            full_name: None,
        };
        let err = storage.insert_user_with_profile(&user, &profile).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        // Transaction rolled back: no orphan profile.
        assert!(storage.get_profile("u2").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");

        let profile = ProfileRow {
            id: "u1".to_string(),
            username: Some("alice".to_string()),
            full_name: Some("Alice A".to_string()),
        };
        assert!(storage.update_profile(&profile).unwrap());

        add_user(&storage, "u2", "bob");
        let clash = ProfileRow {
            id: "u2".to_string(),
            username: Some("alice".to_string()),
            full_name: None,
        };
        let err = storage.update_profile(&clash).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[test]
    fn test_search_profiles_substring_excluding_self() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "john");
        add_user(&storage, "u2", "joanna");
        add_user(&storage, "u3", "mike");

        // mike searches "jo": both matches, himself excluded by id anyway
        let results = storage.search_profiles("jo", "u3", 10).unwrap();
        let names: Vec<_> = results.iter().filter_map(|p| p.username.clone()).collect();
        assert_eq!(names, vec!["joanna".to_string(), "john".to_string()]);

        // john searches "jo": only joanna, self excluded
        let results = storage.search_profiles("jo", "u1", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].username, Some("joanna".to_string()));

        // case-insensitive
        let results = storage.search_profiles("JO", "u3", 10).unwrap();
        assert_eq!(results.len(), 2);

        // no match is an empty list, not an error
        let results = storage.search_profiles("zzz", "u3", 10).unwrap();
        assert!(results.is_empty());

        // LIKE metacharacters are literal
        let results = storage.search_profiles("%", "u3", 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_friend_request_lifecycle() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        add_user(&storage, "u2", "bob");
        let now = now_secs();

        // request: exactly one pending row
        let edge_id = storage.insert_friend_request("u1", "u2", now).unwrap();
        assert_eq!(count_friend_rows(&storage), 1);
        let edge = storage.get_friend_edge(edge_id).unwrap().unwrap();
        assert_eq!(edge.status, "pending");
        assert!(!storage.are_friends("u1", "u2").unwrap());

        // duplicate request rejected by the unique constraint
        let err = storage.insert_friend_request("u1", "u2", now).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        // accept: exactly two accepted rows, one per direction
        storage.accept_friend_request(edge_id, now).unwrap();
        assert_eq!(count_friend_rows(&storage), 2);
        let fwd = storage.find_friend_edge("u1", "u2").unwrap().unwrap();
        let rev = storage.find_friend_edge("u2", "u1").unwrap().unwrap();
        assert_eq!(fwd.status, "accepted");
        assert_eq!(rev.status, "accepted");
        assert!(storage.are_friends("u1", "u2").unwrap());
        assert!(storage.are_friends("u2", "u1").unwrap());

        // friend lists are deduplicated despite both directions existing
        assert_eq!(storage.list_friend_ids("u1").unwrap(), vec!["u2".to_string()]);
        let profiles = storage.list_friend_profiles("u1").unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].username, Some("bob".to_string()));

        // remove: zero rows remain
        storage.remove_friendship("u1", "u2").unwrap();
        assert_eq!(count_friend_rows(&storage), 0);
        assert!(!storage.are_friends("u1", "u2").unwrap());

        // removing again is not an error
        storage.remove_friendship("u1", "u2").unwrap();
    }

    #[test]
    fn test_decline_deletes_single_row() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        add_user(&storage, "u2", "bob");

        let edge_id = storage.insert_friend_request("u1", "u2", now_secs()).unwrap();
        assert!(storage.delete_friend_edge(edge_id).unwrap());
        assert_eq!(count_friend_rows(&storage), 0);
        assert!(!storage.delete_friend_edge(edge_id).unwrap());
    }

    #[test]
    fn test_accept_promotes_crossed_requests() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        add_user(&storage, "u2", "bob");
        let now = now_secs();

        // Both sides request each other before either accepts.
        let e1 = storage.insert_friend_request("u1", "u2", now).unwrap();
        storage.insert_friend_request("u2", "u1", now).unwrap();
        assert_eq!(count_friend_rows(&storage), 2);

        storage.accept_friend_request(e1, now).unwrap();
        // Still two rows: the crossed request was promoted, not duplicated.
        assert_eq!(count_friend_rows(&storage), 2);
        assert_eq!(
            storage.find_friend_edge("u2", "u1").unwrap().unwrap().status,
            "accepted"
        );
    }

    #[test]
    fn test_incoming_requests_carry_profiles() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        add_user(&storage, "u2", "bob");

        storage.insert_friend_request("u1", "u2", now_secs()).unwrap();
        let incoming = storage.list_incoming_requests("u2").unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].0.user_id, "u1");
        assert_eq!(incoming[0].1.username, Some("alice".to_string()));

        // Nothing incoming for the requester.
        assert!(storage.list_incoming_requests("u1").unwrap().is_empty());
    }

    #[test]
    fn test_note_unique_per_owner_and_date() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        let now = now_secs();

        let note = NoteRow {
            id: "n1".to_string(),
            user_id: "u1".to_string(),
            date: "2026-08-28".to_string(),
            title: Some("First".to_string()),
            subtitle: None,
            content: None,
            created_at: now,
            updated_at: now,
        };
        storage.insert_note(&note).unwrap();

        let dup = NoteRow {
            id: "n2".to_string(),
            ..note.clone()
        };
        let err = storage.insert_note(&dup).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        // Same owner, different date is fine.
        let other_day = NoteRow {
            id: "n3".to_string(),
            date: "2026-08-29".to_string(),
            ..note
        };
        storage.insert_note(&other_day).unwrap();
    }

    #[test]
    fn test_ensure_note_is_idempotent() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        let now = now_secs();

        let first = storage.ensure_note("u1", "2026-08-28", now).unwrap();
        let second = storage.ensure_note("u1", "2026-08-28", now + 5).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn test_note_meta_roundtrip() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        let now = now_secs();

        let note = storage.ensure_note("u1", "2026-08-28", now).unwrap();
        assert!(storage
            .update_note_meta(
                &note.id,
                Some("Morning pages"),
                Some("rainy"),
                Some("legacy body"),
                now + 1,
            )
            .unwrap());

        let loaded = storage.get_note(&note.id).unwrap().unwrap();
        assert_eq!(loaded.title, Some("Morning pages".to_string()));
        assert_eq!(loaded.subtitle, Some("rainy".to_string()));
        assert_eq!(loaded.content, Some("legacy body".to_string()));
        assert_eq!(loaded.updated_at, now + 1);
        assert_eq!(loaded.created_at, now);
    }

    #[test]
    fn test_blocks_ordered_by_key_then_created() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        let now = now_secs();
        let note = storage.ensure_note("u1", "2026-08-28", now).unwrap();

        for (id, key, created) in [("t1", "i", now), ("t2", "c", now + 2), ("t3", "c", now + 1)] {
            storage
                .insert_text_block(&TextBlockRow {
                    id: id.to_string(),
                    note_id: note.id.clone(),
                    user_id: "u1".to_string(),
                    content: String::new(),
                    order_key: key.to_string(),
                    created_at: created,
                })
                .unwrap();
        }

        let blocks = storage.list_text_blocks(&note.id).unwrap();
        let ids: Vec<_> = blocks.iter().map(|b| b.id.as_str()).collect();
        // "c" keys first, tie broken by created_at ascending
        assert_eq!(ids, vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn test_todo_toggle_and_delete() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        let now = now_secs();
        let note = storage.ensure_note("u1", "2026-08-28", now).unwrap();

        storage
            .insert_todo(&TodoRow {
                id: "td1".to_string(),
                note_id: note.id.clone(),
                user_id: "u1".to_string(),
                text: "water the plants".to_string(),
                completed: false,
                order_key: "i".to_string(),
                created_at: now,
            })
            .unwrap();

        assert!(storage.set_todo_completed("td1", true).unwrap());
        assert!(storage.get_todo("td1").unwrap().unwrap().completed);
        assert!(storage.delete_todo("td1").unwrap());
        assert!(storage.get_todo("td1").unwrap().is_none());
    }

    #[test]
    fn test_deleting_note_cascades_to_blocks() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        let now = now_secs();
        let note = storage.ensure_note("u1", "2026-08-28", now).unwrap();

        storage
            .insert_text_block(&TextBlockRow {
                id: "t1".to_string(),
                note_id: note.id.clone(),
                user_id: "u1".to_string(),
                content: "hello".to_string(),
                order_key: "i".to_string(),
                created_at: now,
            })
            .unwrap();
        storage
            .insert_note_image(&NoteImageRow {
                id: "img1".to_string(),
                note_id: note.id.clone(),
                user_id: "u1".to_string(),
                url: "/api/images/file/abc.png".to_string(),
                order_key: "r".to_string(),
                created_at: now,
            })
            .unwrap();

        storage
            .conn
            .execute("DELETE FROM notes WHERE id = ?1", params![note.id])
            .unwrap();
        assert!(storage.list_text_blocks(&note.id).unwrap().is_empty());
        assert!(storage.list_note_images(&note.id).unwrap().is_empty());
    }

    #[test]
    fn test_share_grant_idempotent() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        add_user(&storage, "u2", "bob");
        let now = now_secs();
        let note = storage.ensure_note("u1", "2026-08-28", now).unwrap();

        assert!(storage.insert_share(&note.id, "u1", "u2", now).unwrap());
        assert!(!storage.insert_share(&note.id, "u1", "u2", now).unwrap());
        assert!(storage.is_note_shared_with(&note.id, "u2").unwrap());

        let grantees = storage.list_share_grantees(&note.id).unwrap();
        assert_eq!(grantees.len(), 1);
        assert_eq!(grantees[0].username, Some("bob".to_string()));

        assert!(storage.delete_share(&note.id, "u2").unwrap());
        assert!(!storage.delete_share(&note.id, "u2").unwrap());
        assert!(!storage.is_note_shared_with(&note.id, "u2").unwrap());
    }

    #[test]
    fn test_shared_notes_require_current_friendship() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        add_user(&storage, "u2", "bob");
        let now = now_secs();

        let note = storage.ensure_note("u1", "2026-08-28", now).unwrap();
        let edge = storage.insert_friend_request("u1", "u2", now).unwrap();
        storage.accept_friend_request(edge, now).unwrap();
        storage.insert_share(&note.id, "u1", "u2", now).unwrap();

        let visible = storage.list_shared_notes_for_date("u2", "2026-08-28").unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, note.id);

        // Unfriending suspends visibility even though the grant row remains.
        storage.remove_friendship("u1", "u2").unwrap();
        assert!(storage
            .list_shared_notes_for_date("u2", "2026-08-28")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_visible_dates_union_own_and_shared() {
        let (storage, _dir) = test_storage();
        add_user(&storage, "u1", "alice");
        add_user(&storage, "u2", "bob");
        let now = now_secs();

        storage.ensure_note("u2", "2026-08-27", now).unwrap();
        let shared = storage.ensure_note("u1", "2026-08-28", now).unwrap();
        storage.ensure_note("u1", "2026-08-29", now).unwrap();

        let edge = storage.insert_friend_request("u1", "u2", now).unwrap();
        storage.accept_friend_request(edge, now).unwrap();
        storage.insert_share(&shared.id, "u1", "u2", now).unwrap();

        let dates = storage.list_visible_dates("u2").unwrap();
        // Own note, plus the shared one; the unshared 2026-08-29 is invisible.
        assert_eq!(dates, vec!["2026-08-28".to_string(), "2026-08-27".to_string()]);
    }
}
