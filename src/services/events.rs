use serde_json::Value;

use super::{Assignments, by_id, delete_where};
use crate::database::{Database, DatabaseError};
use crate::models::{Event, EventType};
use crate::schema::Table;
use crate::statement::{OnConflict, OrderBy, Predicate, Select, Statement};
use crate::utils;

pub const DEFAULT_COLOR: &str = "#0ea5e9";

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub color: String,
    pub event_type: EventType,
}

impl NewEvent {
    pub fn new(title: impl Into<String>, start_time: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            start_time: start_time.into(),
            end_time: None,
            location: None,
            color: DEFAULT_COLOR.to_string(),
            event_type: EventType::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub start_time: Option<String>,
    pub end_time: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub color: Option<String>,
    pub event_type: Option<EventType>,
}

pub struct EventService<'a> {
    pub(super) db: &'a mut Database,
}

impl EventService<'_> {
    fn list(&self, select: Select) -> Result<Vec<Event>, DatabaseError> {
        self.db
            .query(&select.order_by(OrderBy::asc("start_time")))?
            .into_iter()
            .map(|row| Database::decode(Table::Events, row))
            .collect()
    }

    /// All events by start time
    pub fn all(&self) -> Result<Vec<Event>, DatabaseError> {
        self.list(Select::from(Table::Events))
    }

    pub fn get(&self, id: &str) -> Result<Option<Event>, DatabaseError> {
        self.db
            .query_one(&by_id(Table::Events, id))?
            .map(|row| Database::decode(Table::Events, row))
            .transpose()
    }

    pub fn create(&mut self, new: NewEvent) -> Result<Event, DatabaseError> {
        let now = utils::now_timestamp();
        let event = Event {
            id: utils::new_id(),
            title: new.title,
            description: new.description,
            start_time: new.start_time,
            end_time: new.end_time,
            location: new.location,
            color: new.color,
            event_type: new.event_type,
            created_at: now.clone(),
            updated_at: now,
        };

        self.db.apply(&Statement::insert(
            Table::Events,
            [
                ("id", Value::from(event.id.as_str())),
                ("title", Value::from(event.title.as_str())),
                ("description", Value::from(event.description.clone())),
                ("start_time", Value::from(event.start_time.as_str())),
                ("end_time", Value::from(event.end_time.clone())),
                ("location", Value::from(event.location.clone())),
                ("color", Value::from(event.color.as_str())),
                ("type", Value::from(event.event_type.as_str())),
                ("created_at", Value::from(event.created_at.as_str())),
                ("updated_at", Value::from(event.updated_at.as_str())),
            ],
            OnConflict::Append,
        ))?;

        Ok(event)
    }

    pub fn update(&mut self, id: &str, patch: EventPatch) -> Result<Option<Event>, DatabaseError> {
        let mut set = Assignments::default();
        set.set("title", patch.title);
        set.set("description", patch.description);
        set.set("start_time", patch.start_time);
        set.set("end_time", patch.end_time);
        set.set("location", patch.location);
        set.set("color", patch.color);
        set.set("type", patch.event_type.map(|t| t.as_str()));
        set.push("updated_at", utils::now_timestamp());
        set.apply(self.db, Table::Events, id)?;

        self.get(id)
    }

    pub fn delete(&mut self, id: &str) -> Result<bool, DatabaseError> {
        Ok(delete_where(self.db, Table::Events, "id", id)? > 0)
    }

    /// Events starting within `[start, end]`, compared as ISO-8601 strings
    pub fn by_date_range(&self, start: &str, end: &str) -> Result<Vec<Event>, DatabaseError> {
        self.list(Select::from(Table::Events).filter(Predicate::range("start_time", start, end)))
    }

    pub fn by_type(&self, event_type: EventType) -> Result<Vec<Event>, DatabaseError> {
        self.list(Select::from(Table::Events).filter(Predicate::eq("type", event_type.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_and_type_filters() {
        let mut db = Database::in_memory().unwrap();
        let mut events = db.events();
        events
            .create(NewEvent {
                event_type: EventType::Work,
                ..NewEvent::new("Standup", "2024-03-04T09:00:00.000Z")
            })
            .unwrap();
        events.create(NewEvent::new("Dentist", "2024-03-01T15:00:00.000Z")).unwrap();
        events.create(NewEvent::new("Trip", "2024-04-01T08:00:00.000Z")).unwrap();

        let march = events
            .by_date_range("2024-03-01T00:00:00.000Z", "2024-03-31T23:59:59.999Z")
            .unwrap();
        let titles: Vec<_> = march.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Dentist", "Standup"]);

        let work = events.by_type(EventType::Work).unwrap();
        assert_eq!(work.len(), 1);
        assert_eq!(work[0].title, "Standup");
    }

    #[test]
    fn test_clearing_optional_fields() {
        let mut db = Database::in_memory().unwrap();
        let mut events = db.events();
        let event = events
            .create(NewEvent {
                location: Some("Office".to_string()),
                ..NewEvent::new("Review", "2024-03-04T10:00:00.000Z")
            })
            .unwrap();

        let updated = events
            .update(
                &event.id,
                EventPatch {
                    location: Some(None),
                    ..EventPatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.location, None);
        assert_eq!(updated.color, DEFAULT_COLOR);
    }
}
