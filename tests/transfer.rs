use daybook::Database;
use daybook::services::events::NewEvent;
use daybook::services::habits::NewHabit;
use daybook::services::notes::NewNote;
use daybook::services::settings::SettingKey;
use daybook::services::tasks::NewTask;
use daybook::services::transfer::TransferError;
use serde_json::json;

fn seeded() -> Database {
    let mut db = Database::in_memory().unwrap();
    let task = db.tasks().create(NewTask::new("Write report")).unwrap();
    db.tasks().add_subtask(&task.id, "Outline").unwrap();
    db.tasks().create(NewTask::new("Call mum")).unwrap();
    db.notes().create(NewNote::new("Ideas")).unwrap();
    db.events()
        .create(NewEvent::new("Dentist", "2024-06-01T10:00:00.000Z"))
        .unwrap();
    let habit = db.habits().create(NewHabit::new("Read")).unwrap();
    db.habits().log(&habit.id, "2024-06-01", true).unwrap();
    db.settings().set(SettingKey::Theme, "dark").unwrap();
    db
}

#[test]
fn test_import_restores_deleted_tasks_exactly() {
    let mut db = seeded();
    let before = db.tasks().all().unwrap();
    let exported = db.transfer().export_json().unwrap();

    db.execute("DELETE FROM tasks", &[]).unwrap();
    assert!(db.tasks().all().unwrap().is_empty());

    db.transfer().import_json(&exported).unwrap();
    assert_eq!(db.tasks().all().unwrap(), before);
}

#[test]
fn test_import_into_fresh_store_matches_export() {
    let mut source = seeded();
    let document = source.transfer().export().unwrap();
    let json = serde_json::to_string(&document).unwrap();

    let mut target = Database::in_memory().unwrap();
    target.tasks().create(NewTask::new("Will be replaced")).unwrap();
    let restored = target.transfer().import_json(&json).unwrap();
    assert_eq!(restored, 9);

    let again = target.transfer().export().unwrap();
    assert_eq!(again.data, document.data);
    assert_eq!(target.settings().get().unwrap().theme.as_str(), "dark");
}

#[test]
fn test_import_keeps_settings_not_in_document() {
    let mut db = Database::in_memory().unwrap();
    db.execute(
        "INSERT INTO settings (key, value) VALUES ('fontSize', '14')",
        &[],
    )
    .unwrap();

    let doc = json!({
        "version": "1.0.0",
        "exportDate": "2024-06-01T00:00:00.000Z",
        "data": { "settings": [{ "key": "colorScheme", "value": "green" }] }
    });
    db.transfer().import_json(&doc.to_string()).unwrap();

    let entries = db.settings().entries().unwrap();
    assert!(entries.contains(&("fontSize".to_string(), "14".to_string())));
    assert!(entries.contains(&("colorScheme".to_string(), "green".to_string())));
    assert_eq!(entries.len(), 3);
}

#[test]
fn test_non_object_rows_are_rejected() {
    let mut db = seeded();
    let doc = r#"{"data": {"tasks": ["oops"]}}"#;
    assert!(matches!(
        db.transfer().import_json(doc),
        Err(TransferError::InvalidDocument(_))
    ));
    assert_eq!(db.tasks().all().unwrap().len(), 2);
}

#[test]
fn test_imported_notes_with_null_fields_decode() {
    let mut db = Database::in_memory().unwrap();
    let doc = json!({
        "data": { "notes": [{
            "id": "n1", "title": "Loose", "content": null, "folder": null,
            "tags": null, "created_at": "2024-01-01T00:00:00.000Z",
            "updated_at": "2024-01-01T00:00:00.000Z"
        }] }
    });
    db.transfer().import_json(&doc.to_string()).unwrap();

    let note = db.notes().get("n1").unwrap().unwrap();
    assert_eq!(note.content, "");
    assert_eq!(note.folder, "default");
}
