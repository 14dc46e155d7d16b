//! Object dictionary metadata
//!
//! An [`ObjectDictionary`] describes which objects a device exposes. It is produced by a dictionary
//! provider (e.g. loaded from a structured file) and consumed by the object classifier. Each entry
//! is either a single variable, or a composite (array or record) of variables sharing one index.

use crate::objects::{AccessType, DataType, ObjectCode};

/// Metadata for a single sub object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    /// Object index
    pub index: u16,
    /// Sub index
    pub sub: u8,
    /// Parameter name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Width of the value, in bits
    pub bit_width: usize,
    /// Access rights
    pub access_type: AccessType,
}

/// An array or record object, containing multiple sub objects
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Composite {
    /// Object index, shared by all members
    pub index: u16,
    /// Parameter name
    pub name: String,
    /// Either [`ObjectCode::Array`] or [`ObjectCode::Record`]
    pub object_code: ObjectCode,
    /// The sub objects, in sub index order
    pub members: Vec<Variable>,
}

impl Composite {
    /// The aggregate width of all members, in bits
    pub fn bit_width(&self) -> usize {
        self.members.iter().map(|m| m.bit_width).sum()
    }
}

/// A top level entry in an object dictionary
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DictEntry {
    /// A VAR object
    Scalar(Variable),
    /// An ARRAY or RECORD object
    Composite(Composite),
}

impl DictEntry {
    /// Object index of the entry
    pub fn index(&self) -> u16 {
        match self {
            DictEntry::Scalar(var) => var.index,
            DictEntry::Composite(comp) => comp.index,
        }
    }

    /// Name of the entry
    pub fn name(&self) -> &str {
        match self {
            DictEntry::Scalar(var) => &var.name,
            DictEntry::Composite(comp) => &comp.name,
        }
    }

    /// Iterate the variables in this entry
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        let vars: &[Variable] = match self {
            DictEntry::Scalar(var) => core::slice::from_ref(var),
            DictEntry::Composite(comp) => &comp.members,
        };
        vars.iter()
    }
}

/// An ordered collection of dictionary entries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectDictionary {
    entries: Vec<DictEntry>,
}

impl ObjectDictionary {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    ///
    /// Entries keep the order in which they are inserted
    pub fn push(&mut self, entry: DictEntry) {
        self.entries.push(entry);
    }

    /// Builder style version of [`push`](Self::push)
    pub fn with_entry(mut self, entry: DictEntry) -> Self {
        self.push(entry);
        self
    }

    /// All top level entries
    pub fn entries(&self) -> &[DictEntry] {
        &self.entries
    }

    /// Number of top level entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the dictionary has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the top level entry with the given index
    pub fn entry(&self, index: u16) -> Option<&DictEntry> {
        self.entries.iter().find(|e| e.index() == index)
    }

    /// Find a variable by its address
    pub fn get(&self, index: u16, sub: u8) -> Option<&Variable> {
        self.entry(index)?.variables().find(|v| v.sub == sub)
    }

    /// Find a variable by its name
    pub fn find_by_name(&self, name: &str) -> Option<&Variable> {
        self.entries
            .iter()
            .flat_map(|e| e.variables())
            .find(|v| v.name == name)
    }

    /// Iterate every variable, in dictionary order
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.entries.iter().flat_map(|e| e.variables())
    }
}

impl FromIterator<DictEntry> for ObjectDictionary {
    fn from_iter<T: IntoIterator<Item = DictEntry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(index: u16, sub: u8, name: &str, bit_width: usize) -> Variable {
        Variable {
            index,
            sub,
            name: name.into(),
            data_type: DataType::UInt32,
            bit_width,
            access_type: AccessType::Ro,
        }
    }

    #[test]
    fn test_lookup() {
        let od: ObjectDictionary = [
            DictEntry::Scalar(var(0x1000, 0, "Device Type", 32)),
            DictEntry::Composite(Composite {
                index: 0x1018,
                name: "Identity".into(),
                object_code: ObjectCode::Record,
                members: vec![
                    var(0x1018, 0, "Highest sub-index supported", 8),
                    var(0x1018, 1, "Vendor-ID", 32),
                    var(0x1018, 2, "Product code", 32),
                ],
            }),
        ]
        .into_iter()
        .collect();

        assert_eq!(2, od.len());
        assert_eq!("Vendor-ID", od.get(0x1018, 1).unwrap().name);
        assert!(od.get(0x1018, 3).is_none());
        assert!(od.get(0x2000, 0).is_none());
        assert_eq!(0x1000, od.find_by_name("Device Type").unwrap().index);
        assert_eq!(4, od.variables().count());

        match od.entry(0x1018).unwrap() {
            DictEntry::Composite(comp) => assert_eq!(72, comp.bit_width()),
            _ => panic!("Expected composite"),
        }
    }
}
