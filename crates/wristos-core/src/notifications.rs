//! Bounded store of notifications received from the phone.
//!
//! The store keeps at most `K` records in insertion order. Adding to a full
//! store evicts the oldest record first. Record ids come from a counter that
//! only moves forward; an evicted or removed id is never handed out again
//! until the store is explicitly cleared.

use heapless::{String, Vec};
use log::debug;
use thiserror_no_std::Error;

/// Maximum length of a text field, in characters
pub const MAX_FIELD_LEN: usize = 50;

/// Number of records the watch keeps by default
pub const DEFAULT_CAPACITY: usize = 5;

/// A bounded text field of a notification, sized for four-byte characters
pub type FieldText = String<{ MAX_FIELD_LEN * 4 }>;

/// Application on the phone the notification originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Source {
    Messenger,
    Mail,
    #[default]
    None,
}

impl Source {
    /// Map a wire code to a source. Unknown codes map to [`Source::None`].
    pub const fn from_wire(code: u8) -> Self {
        match code {
            1 => Self::Messenger,
            2 => Self::Mail,
            _ => Self::None,
        }
    }

    pub const fn to_wire(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Messenger => 1,
            Self::Mail => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Messenger => "Messenger",
            Self::Mail => "Mail",
            Self::None => "",
        }
    }
}

/// Copy `value` into a bounded field, keeping the first [`MAX_FIELD_LEN`]
/// characters.
pub fn truncate_field(value: &str) -> FieldText {
    let mut field = FieldText::new();
    for c in value.chars().take(MAX_FIELD_LEN) {
        if field.push(c).is_err() {
            break;
        }
    }
    field
}

/// Whether `value` fits a field without truncation
pub fn fits_field(value: &str) -> bool {
    value.chars().count() <= MAX_FIELD_LEN
}

/// Parsed notification content before it is given an id
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotificationFields {
    pub sender: FieldText,
    pub title: FieldText,
    pub body: FieldText,
    pub source: Source,
}

impl NotificationFields {
    /// Build fields, truncating any text longer than [`MAX_FIELD_LEN`].
    pub fn new(sender: &str, title: &str, body: &str, source: Source) -> Self {
        Self {
            sender: truncate_field(sender),
            title: truncate_field(title),
            body: truncate_field(body),
            source,
        }
    }
}

/// A stored notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub sender: FieldText,
    pub title: FieldText,
    pub body: FieldText,
    pub source: Source,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("no notification with id {0}")]
    NotFound(u64),
    #[error("notification store is empty")]
    Empty,
}

/// Fixed-capacity, insertion-ordered notification store
pub struct NotificationStore<const K: usize = DEFAULT_CAPACITY> {
    records: Vec<Notification, K>,
    next_id: u64,
}

impl<const K: usize> Default for NotificationStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> NotificationStore<K> {
    pub const fn new() -> Self {
        const { assert!(K > 0, "notification store needs at least one slot") };
        Self {
            records: Vec::new(),
            next_id: 0,
        }
    }

    /// Store a notification, evicting the oldest one if the store is full.
    pub fn add(&mut self, fields: NotificationFields) -> &Notification {
        if self.records.is_full() {
            let evicted = self.records.remove(0);
            debug!("Notification store full, evicted id {}", evicted.id);
        }

        let id = self.next_id;
        self.next_id += 1;

        // A slot is free at this point, so the push cannot fail
        let _ = self.records.push(Notification {
            id,
            sender: fields.sender,
            title: fields.title,
            body: fields.body,
            source: fields.source,
        });
        debug!("Stored notification {} ({} held)", id, self.records.len());

        &self.records[self.records.len() - 1]
    }

    /// Remove a notification by id, keeping the order of the rest
    pub fn remove(&mut self, id: u64) -> Result<Notification, StoreError> {
        let index = self.position(id).ok_or(StoreError::NotFound(id))?;
        Ok(self.records.remove(index))
    }

    pub fn get(&self, id: u64) -> Result<&Notification, StoreError> {
        self.records
            .iter()
            .find(|record| record.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Snapshot of every record, oldest first
    pub fn all(&self) -> Vec<Notification, K> {
        self.records.clone()
    }

    /// Borrowing iterator over the records, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.records.iter()
    }

    /// The most recently added record still held
    pub fn newest(&self) -> Result<&Notification, StoreError> {
        self.records.last().ok_or(StoreError::Empty)
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        K
    }

    /// Drop every record and restart ids from zero
    pub fn clear(&mut self) {
        self.records.clear();
        self.next_id = 0;
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }
}
