//! Object dictionary providers
//!
//! A provider turns a [`DictionarySource`] into the [`ObjectDictionary`] of a node. Sources are
//! opaque names; what they refer to is up to the provider.
//!
//! [`TomlDictionaryProvider`] loads structured metadata from TOML files:
//!
//! ```toml
//! [[objects]]
//! index = 0x1017
//! parameter_name = "Producer Heartbeat Time"
//! data_type = "uint16"
//! access_type = "rw"
//!
//! [[objects]]
//! index = 0x2000
//! parameter_name = "Analog Input"
//! object_type = "array"
//! data_type = "int16"
//! access_type = "ro"
//! array_size = 4
//!
//! [[objects]]
//! index = 0x1018
//! parameter_name = "Identity"
//! object_type = "record"
//! [[objects.subs]]
//! sub_index = 0
//! parameter_name = "Highest sub-index supported"
//! data_type = "uint8"
//! [[objects.subs]]
//! sub_index = 1
//! parameter_name = "Vendor-ID"
//! data_type = "uint32"
//! ```
//!
//! `data_type` is either a type name or a numeric data type code. `bit_width` may be given for any
//! variable, and must be given when it cannot be derived from the data type (e.g. strings).
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use serde::Deserialize;
use snafu::{ResultExt, Snafu};

use sdolink_common::{
    dictionary::{Composite, DictEntry, ObjectDictionary, Variable},
    objects::{AccessType, DataType, ObjectCode},
    NodeId,
};

/// Names a dictionary to load
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DictionarySource(String);

impl DictionarySource {
    /// Create a source from a name or path
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// Get the source as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the source names nothing
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for DictionarySource {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DictionarySource {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for DictionarySource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a dictionary cannot be loaded
#[derive(Debug, Snafu)]
pub enum DictionaryError {
    /// An IO error occured while reading the file
    #[snafu(display("IO error loading {path}: {source}"))]
    Io {
        /// Path of the file
        path: String,
        /// The underlying IO error
        source: std::io::Error,
    },
    /// The file is not valid TOML, or does not match the dictionary format
    #[snafu(display("Toml parse error: {source}"))]
    TomlParsing {
        /// The toml error which led to this error
        source: toml::de::Error,
    },
    /// A data type name was not recognized
    #[snafu(display("Unknown data type '{name}' on object 0x{index:x}"))]
    UnknownDataType {
        /// The object index
        index: u16,
        /// The unrecognized name
        name: String,
    },
    /// A variable object has no data type
    #[snafu(display("Object 0x{index:x} has no data_type"))]
    MissingDataType {
        /// The object index
        index: u16,
    },
    /// The width of a variable could not be determined
    #[snafu(display(
        "Sub object 0x{index:x}.0x{sub:x} has no bit_width, and its data type has no fixed size"
    ))]
    MissingWidth {
        /// The object index
        index: u16,
        /// The sub index
        sub: u8,
    },
    /// An index was defined more than once
    #[snafu(display("Multiple definitions for object with index 0x{index:x}"))]
    DuplicateObjectIds {
        /// The index which was defined multiple times
        index: u16,
    },
    /// A sub index was defined more than once within one object
    #[snafu(display("Multiple definitions of sub index {sub} on object 0x{index:x}"))]
    DuplicateSubObjects {
        /// The object index
        index: u16,
        /// The sub index which was defined multiple times
        sub: u8,
    },
    /// A source is not known to the provider
    #[snafu(display("No dictionary named '{name}'"))]
    UnknownSource {
        /// The source name
        name: String,
    },
}

/// Something which can supply the object dictionary of a node
pub trait DictionaryProvider {
    /// Load the dictionary named by `source`, for use with `node`
    fn load(
        &self,
        source: &DictionarySource,
        node: NodeId,
    ) -> Result<ObjectDictionary, DictionaryError>;
}

/// Loads dictionaries from TOML files
///
/// Relative sources are resolved against the base directory, if one is set.
#[derive(Debug, Clone, Default)]
pub struct TomlDictionaryProvider {
    base_dir: Option<PathBuf>,
}

impl TomlDictionaryProvider {
    /// Create a provider which resolves sources relative to the working directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative sources against `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, source: &DictionarySource) -> PathBuf {
        let path = Path::new(source.as_str());
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl DictionaryProvider for TomlDictionaryProvider {
    fn load(
        &self,
        source: &DictionarySource,
        node: NodeId,
    ) -> Result<ObjectDictionary, DictionaryError> {
        let path = self.resolve(source);
        log::debug!("Loading dictionary for node {node} from {}", path.display());
        let content = std::fs::read_to_string(&path).context(IoSnafu {
            path: path.to_string_lossy(),
        })?;
        parse_dictionary(&content)
    }
}

/// Serves dictionaries held in memory, by source name
///
/// Every node loading the same source gets the same dictionary.
#[derive(Debug, Clone, Default)]
pub struct StaticDictionaryProvider {
    dictionaries: HashMap<String, ObjectDictionary>,
}

impl StaticDictionaryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dictionary under a source name
    pub fn insert(&mut self, name: impl Into<String>, dictionary: ObjectDictionary) {
        self.dictionaries.insert(name.into(), dictionary);
    }

    /// Builder style version of [`insert`](Self::insert)
    pub fn with_dictionary(
        mut self,
        name: impl Into<String>,
        dictionary: ObjectDictionary,
    ) -> Self {
        self.insert(name, dictionary);
        self
    }
}

impl DictionaryProvider for StaticDictionaryProvider {
    fn load(
        &self,
        source: &DictionarySource,
        _node: NodeId,
    ) -> Result<ObjectDictionary, DictionaryError> {
        self.dictionaries
            .get(source.as_str())
            .cloned()
            .ok_or_else(|| DictionaryError::UnknownSource {
                name: source.to_string(),
            })
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum DataTypeDef {
    Code(u16),
    Name(String),
}

impl DataTypeDef {
    fn resolve(&self, index: u16) -> Result<DataType, DictionaryError> {
        let name = match self {
            DataTypeDef::Code(code) => return Ok(DataType::from(*code)),
            DataTypeDef::Name(name) => name,
        };
        let data_type = match name.to_lowercase().as_str() {
            "boolean" | "bool" => DataType::Boolean,
            "int8" => DataType::Int8,
            "int16" => DataType::Int16,
            "int32" => DataType::Int32,
            "int64" => DataType::Int64,
            "uint8" => DataType::UInt8,
            "uint16" => DataType::UInt16,
            "uint32" => DataType::UInt32,
            "uint64" => DataType::UInt64,
            "real32" | "float" => DataType::Real32,
            "real64" | "double" => DataType::Real64,
            "visible_string" | "string" => DataType::VisibleString,
            "octet_string" => DataType::OctetString,
            "unicode_string" => DataType::UnicodeString,
            "time_of_day" => DataType::TimeOfDay,
            "time_difference" => DataType::TimeDifference,
            "domain" => DataType::Domain,
            _ => {
                return UnknownDataTypeSnafu {
                    index,
                    name: name.clone(),
                }
                .fail()
            }
        };
        Ok(data_type)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct DictionaryFile {
    #[serde(default)]
    objects: Vec<ObjectDefinition>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct ObjectDefinition {
    index: u16,
    parameter_name: String,
    #[serde(default)]
    object_type: ObjectCode,
    data_type: Option<DataTypeDef>,
    #[serde(default)]
    access_type: AccessType,
    bit_width: Option<usize>,
    array_size: Option<u8>,
    #[serde(default)]
    subs: Vec<SubDefinition>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct SubDefinition {
    sub_index: u8,
    #[serde(default)]
    parameter_name: String,
    data_type: DataTypeDef,
    #[serde(default)]
    access_type: AccessType,
    bit_width: Option<usize>,
}

fn variable(
    index: u16,
    sub: u8,
    name: String,
    data_type: DataType,
    access_type: AccessType,
    bit_width: Option<usize>,
) -> Result<Variable, DictionaryError> {
    let bit_width = match bit_width.or_else(|| data_type.bit_width()) {
        Some(w) => w,
        None => return MissingWidthSnafu { index, sub }.fail(),
    };
    Ok(Variable {
        index,
        sub,
        name,
        data_type,
        bit_width,
        access_type,
    })
}

impl ObjectDefinition {
    fn into_entry(self) -> Result<DictEntry, DictionaryError> {
        let index = self.index;
        let data_type = self
            .data_type
            .as_ref()
            .map(|dt| dt.resolve(index))
            .transpose()?;

        if self.object_type == ObjectCode::Var {
            let data_type = data_type.ok_or(DictionaryError::MissingDataType { index })?;
            return variable(
                index,
                0,
                self.parameter_name,
                data_type,
                self.access_type,
                self.bit_width,
            )
            .map(DictEntry::Scalar);
        }

        let mut members = Vec::new();
        if let (Some(size), Some(data_type)) = (self.array_size, data_type) {
            members.push(variable(
                index,
                0,
                "Highest sub-index supported".into(),
                DataType::UInt8,
                AccessType::Const,
                None,
            )?);
            for sub in 1..=size {
                members.push(variable(
                    index,
                    sub,
                    format!("{}[{sub}]", self.parameter_name),
                    data_type,
                    self.access_type,
                    self.bit_width,
                )?);
            }
        }

        let mut seen: HashSet<u8> = members.iter().map(|m| m.sub).collect();
        for sub in self.subs {
            if !seen.insert(sub.sub_index) {
                return DuplicateSubObjectsSnafu {
                    index,
                    sub: sub.sub_index,
                }
                .fail();
            }
            let data_type = sub.data_type.resolve(index)?;
            members.push(variable(
                index,
                sub.sub_index,
                sub.parameter_name,
                data_type,
                sub.access_type,
                sub.bit_width,
            )?);
        }
        members.sort_by_key(|m| m.sub);

        Ok(DictEntry::Composite(Composite {
            index,
            name: self.parameter_name,
            object_code: self.object_type,
            members,
        }))
    }
}

/// Parse a TOML dictionary
pub fn parse_dictionary(content: &str) -> Result<ObjectDictionary, DictionaryError> {
    let file: DictionaryFile = toml::from_str(content).context(TomlParsingSnafu)?;

    let mut found_indices = HashSet::new();
    let mut dictionary = ObjectDictionary::new();
    for obj in file.objects {
        if !found_indices.insert(obj.index) {
            return DuplicateObjectIdsSnafu { index: obj.index }.fail();
        }
        dictionary.push(obj.into_entry()?);
    }
    Ok(dictionary)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const DICT: &str = r#"
        [[objects]]
        index = 0x1000
        parameter_name = "Device Type"
        data_type = "uint32"
        access_type = "ro"

        [[objects]]
        index = 0x1008
        parameter_name = "Device Name"
        data_type = 9
        access_type = "const"
        bit_width = 64

        [[objects]]
        index = 0x2000
        parameter_name = "Analog Input"
        object_type = "array"
        data_type = "int16"
        access_type = "ro"
        array_size = 2

        [[objects]]
        index = 0x1018
        parameter_name = "Identity"
        object_type = "record"
        [[objects.subs]]
        sub_index = 1
        parameter_name = "Vendor-ID"
        data_type = "uint32"
        [[objects.subs]]
        sub_index = 0
        parameter_name = "Highest sub-index supported"
        data_type = "uint8"
    "#;

    #[test]
    fn test_parse_dictionary() {
        let od = parse_dictionary(DICT).unwrap();
        assert_eq!(4, od.len());

        let device_type = od.get(0x1000, 0).unwrap();
        assert_eq!(32, device_type.bit_width);
        assert_eq!(AccessType::Ro, device_type.access_type);

        let name = od.get(0x1008, 0).unwrap();
        assert_eq!(DataType::VisibleString, name.data_type);
        assert_eq!(64, name.bit_width);

        let DictEntry::Composite(array) = od.entry(0x2000).unwrap() else {
            panic!("Expected composite");
        };
        assert_eq!(ObjectCode::Array, array.object_code);
        assert_eq!(3, array.members.len());
        assert_eq!("Analog Input[2]", array.members[2].name);
        assert_eq!(8 + 16 + 16, array.bit_width());

        // Record subs are ordered by sub index
        let DictEntry::Composite(record) = od.entry(0x1018).unwrap() else {
            panic!("Expected composite");
        };
        assert_eq!(0, record.members[0].sub);
        assert_eq!("Vendor-ID", record.members[1].name);
    }

    #[test]
    fn test_missing_width() {
        let result = parse_dictionary(
            r#"
            [[objects]]
            index = 0x1008
            parameter_name = "Device Name"
            data_type = "visible_string"
            "#,
        );
        assert!(matches!(
            result,
            Err(DictionaryError::MissingWidth {
                index: 0x1008,
                sub: 0
            })
        ));
    }

    #[test]
    fn test_duplicates() {
        let result = parse_dictionary(
            r#"
            [[objects]]
            index = 0x2000
            parameter_name = "A"
            data_type = "uint8"
            [[objects]]
            index = 0x2000
            parameter_name = "B"
            data_type = "uint8"
            "#,
        );
        assert!(matches!(
            result,
            Err(DictionaryError::DuplicateObjectIds { index: 0x2000 })
        ));
    }

    #[test]
    fn test_unknown_data_type() {
        let result = parse_dictionary(
            r#"
            [[objects]]
            index = 0x2000
            parameter_name = "A"
            data_type = "complex"
            "#,
        );
        assert!(matches!(result, Err(DictionaryError::UnknownDataType { .. })));
    }

    #[test]
    fn test_toml_provider_loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("device.toml")).unwrap();
        file.write_all(DICT.as_bytes()).unwrap();

        let provider = TomlDictionaryProvider::with_base_dir(dir.path());
        let node = NodeId::new(5).unwrap();
        let od = provider.load(&"device.toml".into(), node).unwrap();
        assert_eq!(4, od.len());

        let missing = provider.load(&"other.toml".into(), node);
        assert!(matches!(missing, Err(DictionaryError::Io { .. })));
    }

    #[test]
    fn test_static_provider() {
        let od = parse_dictionary(DICT).unwrap();
        let provider = StaticDictionaryProvider::new().with_dictionary("demo", od.clone());
        let node = NodeId::new(1).unwrap();
        assert_eq!(od, provider.load(&"demo".into(), node).unwrap());
        assert!(matches!(
            provider.load(&"nope".into(), node),
            Err(DictionaryError::UnknownSource { .. })
        ));
    }
}
