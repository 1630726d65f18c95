//! Mapping from label names to addresses.

use std::collections::HashMap;

use crate::error::ErrorKind;

/// Labels declared in a program and the addresses they resolve to.
///
/// Label names are case-insensitive and stored in lowercase. The table is built once by the
/// first assembler pass and only read after that.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    inner: HashMap<String, u16>,
}

impl LabelTable {
    pub fn new() -> LabelTable {
        LabelTable::default()
    }

    /// Binds `label` to `address`.
    ///
    /// # Errors
    /// Returns [ErrorKind::DuplicateLabel] if the label is already bound.
    pub fn define(&mut self, label: &str, address: u16) -> Result<(), ErrorKind> {
        let key = label.to_ascii_lowercase();

        if self.inner.contains_key(&key) {
            return Err(ErrorKind::DuplicateLabel { label: key });
        }

        self.inner.insert(key, address);

        Ok(())
    }

    /// Returns the address of `label`.
    pub fn get(&self, label: &str) -> Option<u16> {
        self.inner.get(&label.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates over the labels and their addresses in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.inner.iter().map(|(label, address)| (label.as_str(), *address))
    }
}

#[test]
fn test_labels_are_case_insensitive() {
    let mut table = LabelTable::new();

    table.define("Loop", 4).unwrap();

    assert_eq!(table.get("loop"), Some(4));
    assert_eq!(table.get("LOOP"), Some(4));
    assert_eq!(table.get("end"), None);
    assert_eq!(table.define("LOOP", 9), Err(ErrorKind::DuplicateLabel { label: "loop".into() }));
    assert_eq!(table.get("loop"), Some(4));
}
