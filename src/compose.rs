//! Merging a note's three block tables into one ordered stream.
//!
//! Text blocks, todos and images are stored separately but rendered as a
//! single sequence, ordered by fractional `order_key` with `created_at`
//! breaking ties. New blocks get their key from [`insertion_key`], which
//! looks at the merged sequence rather than any single table.

use serde_json::json;

use crate::ordering::key_between;
use crate::storage::{NoteImageRow, TextBlockRow, TodoRow};

/// One entry in a note's merged block sequence.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(TextBlockRow),
    Todo(TodoRow),
    Image(NoteImageRow),
}

impl ContentBlock {
    pub fn id(&self) -> &str {
        match self {
            ContentBlock::Text(b) => &b.id,
            ContentBlock::Todo(b) => &b.id,
            ContentBlock::Image(b) => &b.id,
        }
    }

    pub fn order_key(&self) -> &str {
        match self {
            ContentBlock::Text(b) => &b.order_key,
            ContentBlock::Todo(b) => &b.order_key,
            ContentBlock::Image(b) => &b.order_key,
        }
    }

    pub fn created_at(&self) -> u64 {
        match self {
            ContentBlock::Text(b) => b.created_at,
            ContentBlock::Todo(b) => b.created_at,
            ContentBlock::Image(b) => b.created_at,
        }
    }

    /// Author of the block, which on a shared note may differ from the
    /// note owner.
    pub fn author_id(&self) -> &str {
        match self {
            ContentBlock::Text(b) => &b.user_id,
            ContentBlock::Todo(b) => &b.user_id,
            ContentBlock::Image(b) => &b.user_id,
        }
    }

    /// Kind-tagged JSON for API responses.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ContentBlock::Text(b) => json!({
                "kind": "text",
                "id": b.id,
                "note_id": b.note_id,
                "author_id": b.user_id,
                "content": b.content,
                "order_key": b.order_key,
                "created_at": b.created_at,
            }),
            ContentBlock::Todo(b) => json!({
                "kind": "todo",
                "id": b.id,
                "note_id": b.note_id,
                "author_id": b.user_id,
                "text": b.text,
                "completed": b.completed,
                "order_key": b.order_key,
                "created_at": b.created_at,
            }),
            ContentBlock::Image(b) => json!({
                "kind": "image",
                "id": b.id,
                "note_id": b.note_id,
                "author_id": b.user_id,
                "url": b.url,
                "order_key": b.order_key,
                "created_at": b.created_at,
            }),
        }
    }
}

/// Merge the three block lists into display order.
pub fn compose(
    texts: Vec<TextBlockRow>,
    todos: Vec<TodoRow>,
    images: Vec<NoteImageRow>,
) -> Vec<ContentBlock> {
    let mut blocks: Vec<ContentBlock> = Vec::with_capacity(texts.len() + todos.len() + images.len());
    blocks.extend(texts.into_iter().map(ContentBlock::Text));
    blocks.extend(todos.into_iter().map(ContentBlock::Todo));
    blocks.extend(images.into_iter().map(ContentBlock::Image));
    blocks.sort_by(|a, b| {
        a.order_key()
            .cmp(b.order_key())
            .then(a.created_at().cmp(&b.created_at()))
    });
    blocks
}

/// Order key for a new block inserted after `after_id`, or appended at
/// the end when `after_id` is `None`. Returns `None` when `after_id`
/// names no block in the sequence.
pub fn insertion_key(blocks: &[ContentBlock], after_id: Option<&str>) -> Option<String> {
    match after_id {
        None => Some(key_between(blocks.last().map(|b| b.order_key()), None)),
        Some(id) => {
            let pos = blocks.iter().position(|b| b.id() == id)?;
            let before = Some(blocks[pos].order_key());
            let after = blocks.get(pos + 1).map(|b| b.order_key());
            Some(key_between(before, after))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(id: &str, key: &str, created: u64) -> TextBlockRow {
        TextBlockRow {
            id: id.to_string(),
            note_id: "n1".to_string(),
            user_id: "u1".to_string(),
            content: String::new(),
            order_key: key.to_string(),
            created_at: created,
        }
    }

    fn todo(id: &str, key: &str, created: u64) -> TodoRow {
        TodoRow {
            id: id.to_string(),
            note_id: "n1".to_string(),
            user_id: "u1".to_string(),
            text: String::new(),
            completed: false,
            order_key: key.to_string(),
            created_at: created,
        }
    }

    fn image(id: &str, key: &str, created: u64) -> NoteImageRow {
        NoteImageRow {
            id: id.to_string(),
            note_id: "n1".to_string(),
            user_id: "u1".to_string(),
            url: "/api/images/file/x.png".to_string(),
            order_key: key.to_string(),
            created_at: created,
        }
    }

    #[test]
    fn test_compose_interleaves_kinds_by_key() {
        let blocks = compose(
            vec![text("t1", "i", 1), text("t2", "r", 4)],
            vec![todo("td1", "m", 2)],
            vec![image("img1", "o", 3)],
        );
        let ids: Vec<_> = blocks.iter().map(|b| b.id()).collect();
        assert_eq!(ids, vec!["t1", "td1", "img1", "t2"]);
    }

    #[test]
    fn test_compose_breaks_key_ties_by_created_at() {
        let blocks = compose(
            vec![text("t1", "i", 9)],
            vec![todo("td1", "i", 3)],
            vec![image("img1", "i", 6)],
        );
        let ids: Vec<_> = blocks.iter().map(|b| b.id()).collect();
        assert_eq!(ids, vec!["td1", "img1", "t1"]);
    }

    #[test]
    fn test_insertion_key_appends_to_empty_and_end() {
        let first = insertion_key(&[], None).unwrap();

        let blocks = compose(vec![text("t1", &first, 1)], vec![], vec![]);
        let second = insertion_key(&blocks, None).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_insertion_key_lands_between_neighbours() {
        let blocks = compose(
            vec![text("t1", "i", 1), text("t2", "r", 2)],
            vec![],
            vec![],
        );
        let key = insertion_key(&blocks, Some("t1")).unwrap();
        assert!(key.as_str() > "i");
        assert!(key.as_str() < "r");
    }

    #[test]
    fn test_insertion_key_after_last_block() {
        let blocks = compose(vec![text("t1", "i", 1)], vec![], vec![]);
        let key = insertion_key(&blocks, Some("t1")).unwrap();
        assert!(key.as_str() > "i");
    }

    #[test]
    fn test_insertion_key_unknown_anchor() {
        let blocks = compose(vec![text("t1", "i", 1)], vec![], vec![]);
        assert!(insertion_key(&blocks, Some("missing")).is_none());
    }
}
