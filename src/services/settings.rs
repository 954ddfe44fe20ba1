use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::database::{Database, DatabaseError};
use crate::models::Settings;
use crate::schema::Table;
use crate::statement::{OnConflict, Select, Statement};
use crate::store::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Theme,
    ColorScheme,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Theme => "theme",
            SettingKey::ColorScheme => "colorScheme",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "theme" => Ok(SettingKey::Theme),
            "colorScheme" | "color-scheme" | "color_scheme" => Ok(SettingKey::ColorScheme),
            _ => Err(format!("unknown setting '{}'", s)),
        }
    }
}

pub struct SettingsService<'a> {
    pub(super) db: &'a mut Database,
}

impl SettingsService<'_> {
    /// Raw `(key, value)` pairs in stored order
    pub fn entries(&self) -> Result<Vec<(String, String)>, DatabaseError> {
        let rows = self.db.query(&Select::from(Table::Settings))?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match (row.get("key"), row.get("value")) {
                (Some(Value::String(k)), Some(Value::String(v))) => Some((k.clone(), v.clone())),
                _ => None,
            })
            .collect())
    }

    /// Typed view of all settings. Keys that were never written take their defaults.
    pub fn get(&self) -> Result<Settings, DatabaseError> {
        let object: Record = self
            .entries()?
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        Database::decode(Table::Settings, object)
    }

    /// Write one setting, replacing any earlier value
    pub fn set(&mut self, key: SettingKey, value: &str) -> Result<(), DatabaseError> {
        self.db.apply(&Statement::insert(
            Table::Settings,
            [
                ("key", Value::from(key.as_str())),
                ("value", Value::from(value)),
            ],
            OnConflict::Replace,
        ))?;
        tracing::info!(key = %key, value, "setting changed");
        Ok(())
    }
}
