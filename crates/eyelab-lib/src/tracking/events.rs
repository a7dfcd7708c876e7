use crate::error::{Result, TrackerError};
use log::warn;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A value recorded into an event/parameter column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventValue::Int(v) => write!(f, "{}", v),
            EventValue::Float(v) => write!(f, "{:?}", v),
            EventValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for EventValue {
    fn from(v: i64) -> Self {
        EventValue::Int(v)
    }
}

impl From<i32> for EventValue {
    fn from(v: i32) -> Self {
        EventValue::Int(v.into())
    }
}

impl From<u32> for EventValue {
    fn from(v: u32) -> Self {
        EventValue::Int(v.into())
    }
}

impl From<f64> for EventValue {
    fn from(v: f64) -> Self {
        EventValue::Float(v)
    }
}

impl From<&str> for EventValue {
    fn from(v: &str) -> Self {
        EventValue::Text(v.to_string())
    }
}

impl From<String> for EventValue {
    fn from(v: String) -> Self {
        EventValue::Text(v)
    }
}

/// Named columns of event timestamps and task parameters.
///
/// Columns exist only once declared; writes to undeclared names are rejected.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    names: Vec<String>,
    columns: HashMap<String, Vec<EventValue>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the declared columns, dropping all recorded values.
    pub fn configure<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.clear();
        self.columns.clear();
        for name in names {
            let name = name.into();
            if self.columns.contains_key(&name) {
                warn!("event column '{}' declared twice", name);
                continue;
            }
            self.columns.insert(name.clone(), Vec::new());
            self.names.push(name);
        }
    }

    /// Empty every column but keep the declarations.
    pub fn clear_values(&mut self) {
        for values in self.columns.values_mut() {
            values.clear();
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&[EventValue]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut Vec<EventValue>> {
        match self.columns.get_mut(name) {
            Some(values) => Ok(values),
            None => {
                warn!("event column '{}' was not declared; value dropped", name);
                Err(TrackerError::UnknownChannel(name.to_string()))
            }
        }
    }

    pub fn append(&mut self, name: &str, value: EventValue) -> Result<()> {
        self.column_mut(name)?.push(value);
        Ok(())
    }

    pub fn set(&mut self, name: &str, value: EventValue) -> Result<()> {
        let column = self.column_mut(name)?;
        column.clear();
        column.push(value);
        Ok(())
    }

    pub fn set_vector(&mut self, name: &str, values: Vec<EventValue>) -> Result<()> {
        *self.column_mut(name)? = values;
        Ok(())
    }

    /// Value of `name` at row `index`, if recorded.
    pub fn value_at(&self, name: &str, index: usize) -> Option<&EventValue> {
        self.columns.get(name).and_then(|values| values.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undeclared_names_do_not_create_columns() {
        let mut log = EventLog::new();
        log.configure(["stim_on"]);
        let err = log.append("stim_off", 5i64.into()).unwrap_err();
        assert!(matches!(err, TrackerError::UnknownChannel(ref n) if n == "stim_off"));
        assert!(log.column("stim_off").is_none());
        assert_eq!(log.names(), ["stim_on".to_string()]);
    }

    #[test]
    fn set_replaces_and_append_extends() {
        let mut log = EventLog::new();
        log.configure(["block", "rt"]);
        log.append("block", 1i64.into()).unwrap();
        log.append("block", 2i64.into()).unwrap();
        log.set("block", "practice".into()).unwrap();
        assert_eq!(log.column("block").unwrap(), &[EventValue::from("practice")]);
        log.set_vector("rt", vec![0.25.into(), 0.5.into()]).unwrap();
        assert_eq!(log.value_at("rt", 1), Some(&EventValue::Float(0.5)));
        assert_eq!(log.value_at("rt", 2), None);
    }

    #[test]
    fn clear_keeps_declarations_and_duplicates_collapse() {
        let mut log = EventLog::new();
        log.configure(vec!["a".to_string(), "b".to_string(), "a".to_string()]);
        assert_eq!(log.names().len(), 2);
        log.append("a", 1i64.into()).unwrap();
        log.clear_values();
        assert_eq!(log.column("a").unwrap().len(), 0);
        assert_eq!(log.names().len(), 2);
    }

    #[test]
    fn values_render_like_recorded() {
        assert_eq!(EventValue::from(1_500_123i64).to_string(), "1500123");
        assert_eq!(EventValue::from(2.0).to_string(), "2.0");
        assert_eq!(EventValue::from("left").to_string(), "left");
    }
}
