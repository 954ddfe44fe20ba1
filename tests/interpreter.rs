use daybook::store::TableStore;
use daybook::{Database, MemoryStore, Record, SqliteStore, Table};
use serde_json::{Value, json};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

#[test]
fn test_every_table_round_trips() {
    let mut store = TableStore::new(Box::new(MemoryStore::new()));
    let rows = vec![
        record(json!({"id": "1", "title": "A", "completed": 0, "nested": null})),
        record(json!({"title": "B", "id": "2", "score": 1.5})),
    ];

    for table in Table::ALL {
        store.write_table(table.as_str(), &rows).unwrap();
        assert_eq!(store.read_table(table.as_str()).unwrap(), rows);
    }
}

#[test]
fn test_replace_twice_keeps_latest() {
    let mut db = Database::in_memory().unwrap();
    let sql = "INSERT OR REPLACE INTO tasks (id, title) VALUES (?, ?)";
    db.execute(sql, &[json!("t1"), json!("first")]).unwrap();
    db.execute(sql, &[json!("t1"), json!("second")]).unwrap();

    let rows = db.fetch_all("SELECT * FROM tasks", &[]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"], json!("second"));
}

#[test]
fn test_ignore_twice_keeps_original() {
    let mut db = Database::in_memory().unwrap();
    let sql = "INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)";
    assert_eq!(db.execute(sql, &[json!("theme"), json!("dark")]).unwrap(), 0);
    assert_eq!(db.execute(sql, &[json!("fontSize"), json!("12")]).unwrap(), 1);
    assert_eq!(db.execute(sql, &[json!("fontSize"), json!("14")]).unwrap(), 0);

    let theme = db
        .fetch_one("SELECT * FROM settings WHERE key = ?", &[json!("theme")])
        .unwrap()
        .unwrap();
    assert_eq!(theme["value"], json!("light"));
    let size = db
        .fetch_one("SELECT * FROM settings WHERE key = 'fontSize'", &[])
        .unwrap()
        .unwrap();
    assert_eq!(size["value"], json!("12"));
}

#[test]
fn test_habit_log_unique_per_day() {
    let mut db = Database::in_memory().unwrap();
    let sql = "INSERT OR REPLACE INTO habit_logs (id, habit_id, date, completed) VALUES (?, ?, ?, ?)";
    db.execute(sql, &[json!("l1"), json!("h1"), json!("2024-05-01"), json!(1)]).unwrap();
    db.execute(sql, &[json!("l2"), json!("h1"), json!("2024-05-01"), json!(0)]).unwrap();
    db.execute(sql, &[json!("l3"), json!("h2"), json!("2024-05-01"), json!(1)]).unwrap();

    let rows = db
        .fetch_all("SELECT * FROM habit_logs WHERE habit_id = ?", &[json!("h1")])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["completed"], json!(0));
}

#[test]
fn test_update_touches_only_matching_id() {
    let mut db = Database::in_memory().unwrap();
    for id in ["a", "b", "c"] {
        db.execute(
            "INSERT INTO notes (id, title, folder) VALUES (?, 'Same', 'default')",
            &[json!(id)],
        )
        .unwrap();
    }

    let changed = db
        .execute(
            "UPDATE notes SET title = ?, folder = ? WHERE id = ?",
            &[json!("Changed"), json!("work"), json!("b")],
        )
        .unwrap();
    assert_eq!(changed, 1);

    let rows = db.fetch_all("SELECT * FROM notes", &[]).unwrap();
    let titles: Vec<_> = rows.iter().map(|r| r["title"].clone()).collect();
    assert_eq!(titles, [json!("Same"), json!("Changed"), json!("Same")]);
    assert_eq!(rows[1]["id"], json!("b"));
    assert_eq!(rows[0]["folder"], json!("default"));

    let missing = db
        .execute("UPDATE notes SET title = ? WHERE id = ?", &[json!("x"), json!("zzz")])
        .unwrap();
    assert_eq!(missing, 0);
}

#[test]
fn test_delete_without_where_empties_table() {
    let mut db = Database::in_memory().unwrap();
    for id in ["1", "2"] {
        db.execute("INSERT INTO events (id, title) VALUES (?, 'x')", &[json!(id)])
            .unwrap();
    }
    assert_eq!(db.execute("DELETE FROM events", &[]).unwrap(), 2);
    assert!(db.fetch_all("SELECT * FROM events", &[]).unwrap().is_empty());
}

#[test]
fn test_ties_keep_insertion_order() {
    let mut db = Database::in_memory().unwrap();
    for (id, start) in [("A", "09:00"), ("B", "09:00"), ("Z", "08:00"), ("C", "09:00")] {
        db.execute(
            "INSERT INTO routines (id, start_time) VALUES (?, ?)",
            &[json!(id), json!(start)],
        )
        .unwrap();
    }

    let asc = db
        .fetch_all("SELECT * FROM routines ORDER BY start_time ASC", &[])
        .unwrap();
    let ids: Vec<_> = asc.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["Z", "A", "B", "C"]);

    let desc = db
        .fetch_all("SELECT * FROM routines ORDER BY start_time DESC", &[])
        .unwrap();
    let ids: Vec<_> = desc.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["A", "B", "C", "Z"]);
}

#[test]
fn test_range_and_like_filters() {
    let mut db = Database::in_memory().unwrap();
    for (id, title, due) in [
        ("1", "Pay rent", "2024-02-01"),
        ("2", "Pay taxes", "2024-04-15"),
        ("3", "Walk", "2024-02-10"),
    ] {
        db.execute(
            "INSERT INTO tasks (id, title, due_date) VALUES (?, ?, ?)",
            &[json!(id), json!(title), json!(due)],
        )
        .unwrap();
    }

    let february = db
        .fetch_all(
            "SELECT * FROM tasks WHERE due_date >= ? AND due_date <= ? ORDER BY due_date ASC",
            &[json!("2024-02-01"), json!("2024-02-29")],
        )
        .unwrap();
    assert_eq!(february.len(), 2);

    let pay = db
        .fetch_all("SELECT * FROM tasks WHERE title LIKE ?", &[json!("%PAY%")])
        .unwrap();
    assert_eq!(pay.len(), 2);
}

#[test]
fn test_malformed_sql_is_an_error_not_empty() {
    let db = Database::in_memory().unwrap();
    assert!(db.fetch_all("SELEKT * FROM tasks", &[]).is_err());
    assert!(db.fetch_all("SELECT * FROM journal", &[]).is_err());
}

#[test]
fn test_sqlite_store_persists_across_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("data").join("daybook.db");
    let path = path.to_str().unwrap();

    {
        let mut db = Database::new(path).unwrap();
        db.execute(
            "INSERT INTO tasks (id, title) VALUES (?, ?)",
            &[json!("t1"), json!("Persist me")],
        )
        .unwrap();
        db.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('theme', 'dark')",
            &[],
        )
        .unwrap();
    }

    let db = Database::with_store(Box::new(SqliteStore::open(path).unwrap())).unwrap();
    let task = db
        .fetch_one("SELECT * FROM tasks WHERE id = ?", &[json!("t1")])
        .unwrap()
        .unwrap();
    assert_eq!(task["title"], json!("Persist me"));

    // reopening does not reseed over changed settings
    let settings = db.fetch_all("SELECT * FROM settings", &[]).unwrap();
    assert_eq!(settings.len(), 2);
    assert_eq!(settings[0]["value"], json!("dark"));
}

#[test]
fn test_order_by_optional_column_puts_nulls_first() {
    let mut db = Database::in_memory().unwrap();
    for (id, due) in [
        ("a", json!("2024-03-01")),
        ("b", Value::Null),
        ("c", json!("2024-01-01")),
    ] {
        db.execute("INSERT INTO tasks (id, due_date) VALUES (?, ?)", &[json!(id), due])
            .unwrap();
    }
    db.execute("INSERT INTO tasks (id) VALUES ('d')", &[]).unwrap();

    let rows = db
        .fetch_all("SELECT * FROM tasks ORDER BY due_date ASC", &[])
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["b", "d", "c", "a"]);
}

#[test]
fn test_equality_never_matches_missing_column() {
    let mut db = Database::in_memory().unwrap();
    db.execute("INSERT INTO events (id, location) VALUES ('1', ?)", &[Value::Null])
        .unwrap();
    db.execute("INSERT INTO events (id) VALUES ('2')", &[]).unwrap();

    let rows = db
        .fetch_all("SELECT * FROM events WHERE location = ?", &[Value::Null])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!("1"));
}
