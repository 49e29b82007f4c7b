//! The in-memory font model shared by every container format

use std::collections::{BTreeMap, btree_map};

use bytes::Bytes;
use font_types::Tag;

/// One table of a font: its payload plus the checksum recorded for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    data: Bytes,
    checksum: u32,
}

impl Table {
    pub fn new(data: impl Into<Bytes>, checksum: u32) -> Self {
        Table {
            data: data.into(),
            checksum,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Length rounded up to a multiple of 4, i.e. the space the table takes in a container
    pub fn padded_len(&self) -> usize {
        crate::Round4!(self.data.len())
    }
}

/// A decoded font: the sfnt version plus its tables.
///
/// Tables are keyed by tag, so each tag appears at most once and iteration is always in
/// ascending tag order, which is the order every container writes them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sfnt {
    version: u32,
    tables: BTreeMap<Tag, Table>,
}

impl Sfnt {
    pub fn new(version: u32) -> Self {
        Sfnt {
            version,
            tables: BTreeMap::new(),
        }
    }

    /// The sfnt version (also called the flavor), e.g. `0x00010000` or `OTTO`
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    /// Insert a table, replacing any table already stored under `tag`
    pub fn add_table(&mut self, tag: Tag, data: impl Into<Bytes>, checksum: u32) {
        self.tables.insert(tag, Table::new(data, checksum));
    }

    pub fn table(&self, tag: Tag) -> Option<&Table> {
        self.tables.get(&tag)
    }

    /// Table tags in ascending order
    pub fn tags(&self) -> impl ExactSizeIterator<Item = Tag> + '_ {
        self.tables.keys().copied()
    }

    /// Tables in ascending tag order
    pub fn tables(&self) -> btree_map::Iter<'_, Tag, Table> {
        self.tables.iter()
    }
}
