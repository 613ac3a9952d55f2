//! Console capability bits and the numeric property bag published at setup.

use bitflags::bitflags;
use std::collections::BTreeMap;

bitflags! {
    /// What a console can do, reported through its `type` property.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct IoTypes: u32 {
        const CHARREAD = 1 << 0;
        const CHARWRITE = 1 << 1;
        const ADDRESSABLE_DISPLAY = 1 << 2;
        const CANVAS2D = 1 << 3;
        const EVENTS = 1 << 4;
    }
}

/// Numeric properties of one console.
///
/// The foreground snapshots these when the proxy bundle is built and the
/// worker answers `getProp` from the snapshot, so a property changed after
/// setup is not observed by native code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleProps {
    values: BTreeMap<String, i32>,
}

impl ConsoleProps {
    pub const TYPE: &'static str = "type";

    /// A bag holding only the `type` property.
    pub fn new(io: IoTypes) -> Self {
        let mut props = Self::default();
        props.set(Self::TYPE, io.bits() as i32);
        props
    }

    pub fn with(mut self, name: &str, value: i32) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: i32) {
        self.values.insert(name.to_owned(), value);
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.values.get(name).copied()
    }

    pub fn io_types(&self) -> IoTypes {
        IoTypes::from_bits_truncate(self.get(Self::TYPE).unwrap_or(0) as u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_property_carries_io_bits() {
        let props =
            ConsoleProps::new(IoTypes::CHARREAD | IoTypes::CHARWRITE).with("widthInChars", 80);
        assert_eq!(props.get("type"), Some(3));
        assert_eq!(props.io_types(), IoTypes::CHARREAD | IoTypes::CHARWRITE);
        assert_eq!(props.get("widthInChars"), Some(80));
        assert_eq!(props.get("heightInChars"), None);
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn io_type_bit_values() {
        assert_eq!(IoTypes::CHARREAD.bits(), 1);
        assert_eq!(IoTypes::CHARWRITE.bits(), 2);
        assert_eq!(IoTypes::ADDRESSABLE_DISPLAY.bits(), 4);
        assert_eq!(IoTypes::CANVAS2D.bits(), 8);
        assert_eq!(IoTypes::EVENTS.bits(), 16);
    }
}
