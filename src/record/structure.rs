use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::RecordError;

/// Data type of a single field.
///
/// Scalars print and parse as their interpreter type tags (`vc`, `c10`, `i2`,
/// `i4`, `f8`, `dq8`). Complex types carry a child [`Structure`] on the
/// [`Field`] instead of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Character(usize),
    I2,
    I4,
    F8,
    DQ8,
    Record,
    List(usize),
    DynamicList,
}

impl DataType {
    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            DataType::Record | DataType::List(_) | DataType::DynamicList
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::String => f.write_str("vc"),
            DataType::Character(len) => write!(f, "c{len}"),
            DataType::I2 => f.write_str("i2"),
            DataType::I4 => f.write_str("i4"),
            DataType::F8 => f.write_str("f8"),
            DataType::DQ8 => f.write_str("dq8"),
            DataType::Record => f.write_str("record"),
            DataType::List(size) => write!(f, "[{size}]"),
            DataType::DynamicList => f.write_str("[*]"),
        }
    }
}

impl FromStr for DataType {
    type Err = RecordError;

    /// Parse a scalar type tag. Complex types have no tag form.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let lower = tag.trim().to_ascii_lowercase();
        match lower.as_str() {
            "vc" => Ok(DataType::String),
            "i2" => Ok(DataType::I2),
            "i4" => Ok(DataType::I4),
            "f8" => Ok(DataType::F8),
            "dq8" => Ok(DataType::DQ8),
            _ => lower
                .strip_prefix('c')
                .and_then(|len| len.parse::<usize>().ok())
                .filter(|len| *len > 0)
                .map(DataType::Character)
                .ok_or_else(|| RecordError::UnknownType(tag.to_string())),
        }
    }
}

/// A named, typed member of a [`Structure`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    data_type: DataType,
    structure: Option<Arc<Structure>>,
}

impl Field {
    /// Uppercased field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Child structure of a complex field.
    pub fn structure(&self) -> Option<&Arc<Structure>> {
        self.structure.as_ref()
    }
}

/// Ordered list of uniquely named fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    fields: Vec<Field>,
}

impl Structure {
    pub fn builder() -> StructureBuilder {
        StructureBuilder::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Case-insensitive field lookup.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        let wanted = name.to_ascii_uppercase();
        self.fields.iter().position(|f| f.name == wanted)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index_of(name).map(|i| &self.fields[i])
    }
}

/// Builds a [`Structure`], validating names on [`build`](Self::build).
#[derive(Debug, Default)]
pub struct StructureBuilder {
    fields: Vec<Field>,
}

impl StructureBuilder {
    /// Add a scalar field.
    pub fn scalar(mut self, name: &str, data_type: DataType) -> Self {
        self.fields.push(Field {
            name: name.trim().to_ascii_uppercase(),
            data_type,
            structure: None,
        });
        self
    }

    /// Add a scalar field from its type tag (`vc`, `c12`, `f8`, ...).
    pub fn tagged(self, name: &str, tag: &str) -> Result<Self, RecordError> {
        let data_type = tag.parse()?;
        Ok(self.scalar(name, data_type))
    }

    pub fn record(self, name: &str, structure: Arc<Structure>) -> Self {
        self.complex(name, DataType::Record, structure)
    }

    pub fn list(self, name: &str, size: usize, structure: Arc<Structure>) -> Self {
        self.complex(name, DataType::List(size), structure)
    }

    pub fn dynamic_list(self, name: &str, structure: Arc<Structure>) -> Self {
        self.complex(name, DataType::DynamicList, structure)
    }

    fn complex(mut self, name: &str, data_type: DataType, structure: Arc<Structure>) -> Self {
        self.fields.push(Field {
            name: name.trim().to_ascii_uppercase(),
            data_type,
            structure: Some(structure),
        });
        self
    }

    pub fn build(self) -> Result<Arc<Structure>, RecordError> {
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(RecordError::InvalidStructure(
                    "field names cannot be blank".to_string(),
                ));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(RecordError::DuplicateField(field.name.clone()));
            }
            if field.data_type == DataType::List(0) {
                return Err(RecordError::InvalidStructure(format!(
                    "fixed list {} must hold at least one element",
                    field.name
                )));
            }
        }
        Ok(Arc::new(Structure {
            fields: self.fields,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        varchar   = { "vc", DataType::String },
        upper     = { "VC", DataType::String },
        character = { "c12", DataType::Character(12) },
        short     = { "i2", DataType::I2 },
        long      = { "i4", DataType::I4 },
        double    = { "f8", DataType::F8 },
        date      = { "dq8", DataType::DQ8 },
    )]
    fn parse_type_tag(tag: &str, expected: DataType) {
        assert_eq!(tag.parse::<DataType>().unwrap(), expected);
        assert_eq!(expected.to_string(), tag.to_ascii_lowercase());
    }

    #[yare::parameterized(
        unknown = { "x9" },
        empty_c = { "c" },
        zero_c  = { "c0" },
        blank   = { "" },
    )]
    fn reject_unknown_tag(tag: &str) {
        assert!(matches!(
            tag.parse::<DataType>(),
            Err(RecordError::UnknownType(_))
        ));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let s = Structure::builder()
            .scalar("name", DataType::String)
            .scalar("Id", DataType::F8)
            .build()
            .unwrap();
        assert_eq!(s.index_of("ID"), Some(1));
        assert_eq!(s.field("NaMe").unwrap().name(), "NAME");
        assert!(s.field("missing").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Structure::builder()
            .scalar("id", DataType::F8)
            .scalar("ID", DataType::I4)
            .build()
            .unwrap_err();
        assert_eq!(err, RecordError::DuplicateField("ID".to_string()));
    }

    #[test]
    fn test_tagged_fields() {
        let s = Structure::builder()
            .tagged("code", "c12")
            .unwrap()
            .tagged("qty", "i2")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(s.field("code").unwrap().data_type(), DataType::Character(12));
        assert_eq!(s.field("QTY").unwrap().data_type(), DataType::I2);
        assert!(Structure::builder().tagged("x", "q4").is_err());
    }

    #[test]
    fn test_empty_fixed_list_rejected() {
        let child = Structure::builder().build().unwrap();
        assert!(Structure::builder().list("qual", 0, child).build().is_err());
    }
}
