//! Object classification
//!
//! Splits the objects of a device's dictionary into those the host can send (write) and those it
//! can receive (read), producing display-ready lists of descriptors.
use serde::Deserialize;

use sdolink_common::{
    dictionary::{DictEntry, ObjectDictionary, Variable},
    objects::ObjectDescriptor,
};

/// Label of the placeholder entry shown when there is nothing to classify
pub const NO_ACTIVE_DICTIONARY: &str = "There is no active/valid object dictionary.";

/// How descriptors for the members of arrays and records are sized
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeWidth {
    /// Every member gets the aggregate width of its composite
    #[default]
    Inherited,
    /// Every member gets its own width
    PerEntry,
}

/// One line of a classified list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedEntry {
    /// Text to display
    pub label: String,
    /// The object, or None for an informational placeholder
    pub descriptor: Option<ObjectDescriptor>,
}

impl ClassifiedEntry {
    fn object(descriptor: ObjectDescriptor) -> Self {
        Self {
            label: descriptor.label(),
            descriptor: Some(descriptor),
        }
    }

    fn placeholder() -> Self {
        Self {
            label: NO_ACTIVE_DICTIONARY.to_string(),
            descriptor: None,
        }
    }
}

/// The objects of a dictionary, partitioned by access direction
///
/// Lists are always rebuilt as a whole from a dictionary; they are never updated in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedObjectList {
    /// Objects the host may write
    pub sendable: Vec<ClassifiedEntry>,
    /// Objects the host may read
    pub receivable: Vec<ClassifiedEntry>,
}

impl Default for ClassifiedObjectList {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl ClassifiedObjectList {
    /// The lists shown when no device is active: one informational entry in each
    pub fn placeholder() -> Self {
        Self {
            sendable: vec![ClassifiedEntry::placeholder()],
            receivable: vec![ClassifiedEntry::placeholder()],
        }
    }

    /// True if this is the placeholder list
    pub fn is_placeholder(&self) -> bool {
        self.sendable.iter().all(|e| e.descriptor.is_none())
            && self.receivable.iter().all(|e| e.descriptor.is_none())
    }

    /// Find a sendable object by address
    pub fn find_sendable(&self, index: u16, sub: u8) -> Option<&ObjectDescriptor> {
        find(&self.sendable, index, sub)
    }

    /// Find a receivable object by address
    pub fn find_receivable(&self, index: u16, sub: u8) -> Option<&ObjectDescriptor> {
        find(&self.receivable, index, sub)
    }
}

fn find(entries: &[ClassifiedEntry], index: u16, sub: u8) -> Option<&ObjectDescriptor> {
    entries
        .iter()
        .filter_map(|e| e.descriptor.as_ref())
        .find(|d| d.index == index && d.sub == sub)
}

fn describe(var: &Variable, bit_width: usize) -> ObjectDescriptor {
    ObjectDescriptor {
        index: var.index,
        sub: var.sub,
        bit_width,
        name: var.name.clone(),
        data_type: var.data_type,
        access_type: var.access_type,
    }
}

/// Classify every object in a dictionary
///
/// Read-write objects appear in both lists, read-only and const objects are only receivable, and
/// write-only objects are only sendable. Dictionary order is preserved.
pub fn classify(dictionary: &ObjectDictionary, width: CompositeWidth) -> ClassifiedObjectList {
    let mut sendable = Vec::new();
    let mut receivable = Vec::new();

    for entry in dictionary.entries() {
        let descriptors: Vec<ObjectDescriptor> = match entry {
            DictEntry::Scalar(var) => vec![describe(var, var.bit_width)],
            DictEntry::Composite(comp) => {
                let aggregate = comp.bit_width();
                comp.members
                    .iter()
                    .map(|member| match width {
                        CompositeWidth::Inherited => describe(member, aggregate),
                        CompositeWidth::PerEntry => describe(member, member.bit_width),
                    })
                    .collect()
            }
        };

        for desc in descriptors {
            let access = desc.access_type;
            if access.is_writable() {
                sendable.push(ClassifiedEntry::object(desc.clone()));
            }
            if access.is_readable() {
                receivable.push(ClassifiedEntry::object(desc));
            }
        }
    }

    ClassifiedObjectList {
        sendable,
        receivable,
    }
}
