use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::Mutex;

use super::{DataType, RecordError, Structure};

/// A record shared between the caller and a running session.
///
/// The session writes the interpreter's copy back into it once the script
/// that replaced it has run.
pub type SharedRecord = Arc<Mutex<Record>>;

/// Value held by one field of a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `vc` and `cN` fields.
    String(String),
    I2(i16),
    I4(i32),
    F8(f64),
    /// `None` is the interpreter's zero date.
    DQ8(Option<NaiveDateTime>),
    Record(Box<Record>),
    /// Always exactly as many elements as the declared size.
    List(Vec<Record>),
    DynamicList(Vec<Record>),
}

impl Value {
    fn default_for(name: &str, data_type: DataType, structure: Option<&Arc<Structure>>) -> Self {
        let child = || Record::new(name, structure.cloned().unwrap_or_default());
        match data_type {
            DataType::String | DataType::Character(_) => Value::String(String::new()),
            DataType::I2 => Value::I2(0),
            DataType::I4 => Value::I4(0),
            DataType::F8 => Value::F8(0.0),
            DataType::DQ8 => Value::DQ8(None),
            DataType::Record => Value::Record(Box::new(child())),
            DataType::List(size) => Value::List((0..size).map(|_| child()).collect()),
            DataType::DynamicList => Value::DynamicList(Vec::new()),
        }
    }

    /// Whether the value equals what the interpreter initializes it to.
    pub fn is_default(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::I2(v) => *v == 0,
            Value::I4(v) => *v == 0,
            Value::F8(v) => *v == 0.0,
            Value::DQ8(v) => v.is_none(),
            Value::Record(_) | Value::List(_) => false,
            Value::DynamicList(items) => items.is_empty(),
        }
    }
}

/// An instance of a [`Structure`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: String,
    structure: Arc<Structure>,
    values: Vec<Value>,
}

impl Record {
    /// Create a record with every field at its default value.
    pub fn new(name: &str, structure: Arc<Structure>) -> Self {
        let name = name.trim().to_ascii_uppercase();
        let values = structure
            .fields()
            .iter()
            .map(|f| Value::default_for(f.name(), f.data_type(), f.structure()))
            .collect();
        Record {
            name,
            structure,
            values,
        }
    }

    /// Wrap into a [`SharedRecord`].
    pub fn shared(self) -> SharedRecord {
        Arc::new(Mutex::new(self))
    }

    /// Uppercased record name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn structure(&self) -> &Arc<Structure> {
        &self.structure
    }

    /// Fields paired with their values, in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&super::Field, &Value)> {
        self.structure.fields().iter().zip(self.values.iter())
    }

    pub fn get(&self, field: &str) -> Result<&Value, RecordError> {
        let i = self.index(field)?;
        Ok(&self.values[i])
    }

    pub(crate) fn value_mut(&mut self, index: usize) -> &mut Value {
        &mut self.values[index]
    }

    fn index(&self, field: &str) -> Result<usize, RecordError> {
        self.structure
            .index_of(field)
            .ok_or_else(|| RecordError::UnknownField {
                record: self.name.clone(),
                field: field.to_ascii_uppercase(),
            })
    }

    fn slot(&mut self, field: &str, wanted: &str) -> Result<(DataType, &mut Value), RecordError> {
        let i = self.index(field)?;
        let data_type = self.structure.fields()[i].data_type();
        let matches = match wanted {
            "string" => matches!(data_type, DataType::String | DataType::Character(_)),
            "list" => matches!(data_type, DataType::List(_) | DataType::DynamicList),
            _ => data_type.to_string() == wanted,
        };
        if !matches {
            return Err(self.mismatch(field, wanted, data_type));
        }
        Ok((data_type, &mut self.values[i]))
    }

    fn mismatch(&self, field: &str, expected: &str, actual: DataType) -> RecordError {
        RecordError::TypeMismatch {
            field: format!("{}->{}", self.name, field.to_ascii_uppercase()),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Set a `vc` or `cN` field. Fixed-length fields reject longer values.
    pub fn set_string(&mut self, field: &str, value: impl Into<String>) -> Result<(), RecordError> {
        let value = value.into();
        let (data_type, slot) = self.slot(field, "string")?;
        if let DataType::Character(limit) = data_type {
            let actual = value.chars().count();
            if actual > limit {
                return Err(RecordError::ValueTooLong {
                    field: field.to_ascii_uppercase(),
                    limit,
                    actual,
                });
            }
        }
        *slot = Value::String(value);
        Ok(())
    }

    pub fn set_i2(&mut self, field: &str, value: i16) -> Result<(), RecordError> {
        *self.slot(field, "i2")?.1 = Value::I2(value);
        Ok(())
    }

    pub fn set_i4(&mut self, field: &str, value: i32) -> Result<(), RecordError> {
        *self.slot(field, "i4")?.1 = Value::I4(value);
        Ok(())
    }

    pub fn set_f8(&mut self, field: &str, value: f64) -> Result<(), RecordError> {
        *self.slot(field, "f8")?.1 = Value::F8(value);
        Ok(())
    }

    pub fn set_dq8(&mut self, field: &str, value: Option<NaiveDateTime>) -> Result<(), RecordError> {
        *self.slot(field, "dq8")?.1 = Value::DQ8(value);
        Ok(())
    }

    pub fn get_string(&self, field: &str) -> Result<&str, RecordError> {
        match self.get(field)? {
            Value::String(s) => Ok(s),
            _ => Err(self.mismatch(field, "string", self.type_of(field)?)),
        }
    }

    pub fn get_i2(&self, field: &str) -> Result<i16, RecordError> {
        match self.get(field)? {
            Value::I2(v) => Ok(*v),
            _ => Err(self.mismatch(field, "i2", self.type_of(field)?)),
        }
    }

    pub fn get_i4(&self, field: &str) -> Result<i32, RecordError> {
        match self.get(field)? {
            Value::I4(v) => Ok(*v),
            _ => Err(self.mismatch(field, "i4", self.type_of(field)?)),
        }
    }

    pub fn get_f8(&self, field: &str) -> Result<f64, RecordError> {
        match self.get(field)? {
            Value::F8(v) => Ok(*v),
            _ => Err(self.mismatch(field, "f8", self.type_of(field)?)),
        }
    }

    pub fn get_dq8(&self, field: &str) -> Result<Option<NaiveDateTime>, RecordError> {
        match self.get(field)? {
            Value::DQ8(v) => Ok(*v),
            _ => Err(self.mismatch(field, "dq8", self.type_of(field)?)),
        }
    }

    fn type_of(&self, field: &str) -> Result<DataType, RecordError> {
        Ok(self.structure.fields()[self.index(field)?].data_type())
    }

    /// Nested record field.
    pub fn record(&self, field: &str) -> Result<&Record, RecordError> {
        match self.get(field)? {
            Value::Record(r) => Ok(&**r),
            _ => Err(self.mismatch(field, "record", self.type_of(field)?)),
        }
    }

    pub fn record_mut(&mut self, field: &str) -> Result<&mut Record, RecordError> {
        let i = self.index(field)?;
        let err = self.mismatch(field, "record", self.type_of(field)?);
        match &mut self.values[i] {
            Value::Record(r) => Ok(&mut **r),
            _ => Err(err),
        }
    }

    /// Elements of a fixed or dynamic list.
    pub fn list(&self, field: &str) -> Result<&[Record], RecordError> {
        match self.get(field)? {
            Value::List(items) | Value::DynamicList(items) => Ok(items),
            _ => Err(self.mismatch(field, "list", self.type_of(field)?)),
        }
    }

    pub fn list_mut(&mut self, field: &str) -> Result<&mut [Record], RecordError> {
        let i = self.index(field)?;
        let err = self.mismatch(field, "list", self.type_of(field)?);
        match &mut self.values[i] {
            Value::List(items) | Value::DynamicList(items) => Ok(items.as_mut_slice()),
            _ => Err(err),
        }
    }

    /// Append a new element to a dynamic list and return it.
    pub fn add_item(&mut self, field: &str) -> Result<&mut Record, RecordError> {
        let i = self.index(field)?;
        let f = &self.structure.fields()[i];
        let (name, child) = (f.name().to_string(), f.structure().cloned());
        let err = self.mismatch(field, "[*]", f.data_type());
        match &mut self.values[i] {
            Value::DynamicList(items) => {
                items.push(Record::new(&name, child.unwrap_or_default()));
                let last = items.len() - 1;
                Ok(&mut items[last])
            }
            _ => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request() -> Record {
        let item = Structure::builder()
            .scalar("id", DataType::F8)
            .build()
            .unwrap();
        let structure = Structure::builder()
            .scalar("name", DataType::String)
            .scalar("code", DataType::Character(3))
            .scalar("count", DataType::I4)
            .scalar("flag", DataType::I2)
            .scalar("updated", DataType::DQ8)
            .list("slots", 2, item.clone())
            .dynamic_list("items", item)
            .build()
            .unwrap();
        Record::new("request", structure)
    }

    #[test]
    fn test_defaults() {
        let r = request();
        assert_eq!(r.name(), "REQUEST");
        assert_eq!(r.get_string("name").unwrap(), "");
        assert_eq!(r.get_i4("count").unwrap(), 0);
        assert_eq!(r.get_dq8("updated").unwrap(), None);
        assert_eq!(r.list("slots").unwrap().len(), 2);
        assert!(r.list("items").unwrap().is_empty());
    }

    #[test]
    fn test_setters_are_type_checked() {
        let mut r = request();
        r.set_string("NAME", "x").unwrap();
        r.set_i4("count", 7).unwrap();
        r.set_i2("flag", -1).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(1, 2, 3)
            .unwrap();
        r.set_dq8("updated", Some(date)).unwrap();
        assert_eq!(r.get_string("name").unwrap(), "x");
        assert_eq!(r.get_i4("COUNT").unwrap(), 7);
        assert_eq!(r.get_i2("flag").unwrap(), -1);
        assert_eq!(r.get_dq8("updated").unwrap(), Some(date));
        assert!(matches!(
            r.set_f8("count", 1.0),
            Err(RecordError::TypeMismatch { .. })
        ));
        assert!(matches!(
            r.set_i4("nope", 1),
            Err(RecordError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_fixed_character_length() {
        let mut r = request();
        r.set_string("code", "abc").unwrap();
        assert_eq!(
            r.set_string("code", "abcd"),
            Err(RecordError::ValueTooLong {
                field: "CODE".to_string(),
                limit: 3,
                actual: 4
            })
        );
    }

    #[test]
    fn test_dynamic_list_grows() {
        let mut r = request();
        r.add_item("items").unwrap().set_f8("id", 1.0).unwrap();
        r.add_item("items").unwrap().set_f8("id", 2.0).unwrap();
        let items = r.list("items").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].get_f8("id").unwrap(), 2.0);
        assert_eq!(items[1].name(), "ITEMS");
        assert!(r.add_item("slots").is_err());
    }
}
