use serde_json::Value;

use super::{Assignments, by_id, contains_pattern, delete_where};
use crate::database::{Database, DatabaseError};
use crate::models::Note;
use crate::schema::Table;
use crate::statement::{OnConflict, OrderBy, Predicate, Select, Statement};
use crate::utils;

#[derive(Debug, Clone)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub folder: String,
    pub tags: Vec<String>,
}

impl NewNote {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: String::new(),
            folder: "default".to_string(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub folder: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Tags are stored as a JSON-encoded string
fn encode_tags(tags: &[String]) -> String {
    Value::from(tags.to_vec()).to_string()
}

pub struct NoteService<'a> {
    pub(super) db: &'a mut Database,
}

impl NoteService<'_> {
    fn list(&self, select: Select) -> Result<Vec<Note>, DatabaseError> {
        self.db
            .query(&select)?
            .into_iter()
            .map(|row| Database::decode(Table::Notes, row))
            .collect()
    }

    /// All notes, most recently edited first
    pub fn all(&self) -> Result<Vec<Note>, DatabaseError> {
        self.list(Select::from(Table::Notes).order_by(OrderBy::desc("updated_at")))
    }

    pub fn get(&self, id: &str) -> Result<Option<Note>, DatabaseError> {
        self.db
            .query_one(&by_id(Table::Notes, id))?
            .map(|row| Database::decode(Table::Notes, row))
            .transpose()
    }

    pub fn create(&mut self, new: NewNote) -> Result<Note, DatabaseError> {
        let now = utils::now_timestamp();
        let note = Note {
            id: utils::new_id(),
            title: new.title,
            content: new.content,
            folder: new.folder,
            tags: new.tags,
            created_at: now.clone(),
            updated_at: now,
        };

        self.db.apply(&Statement::insert(
            Table::Notes,
            [
                ("id", Value::from(note.id.as_str())),
                ("title", Value::from(note.title.as_str())),
                ("content", Value::from(note.content.as_str())),
                ("folder", Value::from(note.folder.as_str())),
                ("tags", Value::from(encode_tags(&note.tags))),
                ("created_at", Value::from(note.created_at.as_str())),
                ("updated_at", Value::from(note.updated_at.as_str())),
            ],
            OnConflict::Append,
        ))?;

        Ok(note)
    }

    pub fn update(&mut self, id: &str, patch: NotePatch) -> Result<Option<Note>, DatabaseError> {
        let mut set = Assignments::default();
        set.set("title", patch.title);
        set.set("content", patch.content);
        set.set("folder", patch.folder);
        set.set("tags", patch.tags.as_deref().map(encode_tags));
        set.push("updated_at", utils::now_timestamp());
        set.apply(self.db, Table::Notes, id)?;

        self.get(id)
    }

    pub fn delete(&mut self, id: &str) -> Result<bool, DatabaseError> {
        Ok(delete_where(self.db, Table::Notes, "id", id)? > 0)
    }

    pub fn by_folder(&self, folder: &str) -> Result<Vec<Note>, DatabaseError> {
        self.list(
            Select::from(Table::Notes)
                .filter(Predicate::eq("folder", folder))
                .order_by(OrderBy::desc("updated_at")),
        )
    }

    /// Distinct folder names in order of first appearance
    pub fn folders(&self) -> Result<Vec<String>, DatabaseError> {
        let rows = self.db.query(&Select::from(Table::Notes).distinct("folder"))?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| match row.remove("folder") {
                Some(Value::String(folder)) => Some(folder),
                _ => None,
            })
            .collect())
    }

    /// Case-insensitive substring search over title, content and tags
    pub fn search(&self, query: &str) -> Result<Vec<Note>, DatabaseError> {
        let pattern = contains_pattern(query);
        self.list(
            Select::from(Table::Notes)
                .filter(Predicate::Or(vec![
                    Predicate::like("title", pattern.as_str()),
                    Predicate::like("content", pattern.as_str()),
                    Predicate::like("tags", pattern.as_str()),
                ]))
                .order_by(OrderBy::desc("updated_at")),
        )
    }
}
