//! Manually ordered child lists (lessons of a course, questions of a test).
//!
//! Every mutation leaves `order` fields 0-based and contiguous.

use crate::api::types::{Lesson, Question};
use crate::errors::EditorError;

/// Items not yet saved carry a local id with this prefix.
pub const LOCAL_ID_PREFIX: &str = "local-";

pub fn is_local_id(id: &str) -> bool {
    id.is_empty() || id.starts_with(LOCAL_ID_PREFIX)
}

pub trait Ordered {
    fn item_id(&self) -> &str;
    fn set_item_id(&mut self, id: String);
    fn set_order(&mut self, order: u32);
}

impl Ordered for Lesson {
    fn item_id(&self) -> &str {
        &self.id
    }
    fn set_item_id(&mut self, id: String) {
        self.id = id;
    }
    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

impl Ordered for Question {
    fn item_id(&self) -> &str {
        &self.id
    }
    fn set_item_id(&mut self, id: String) {
        self.id = id;
    }
    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl std::str::FromStr for Direction {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(EditorError::InvalidField {
                field: "direction",
                reason: format!("expected up or down, got '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderedList<T> {
    items: Vec<T>,
    /// Saved ids dropped from the list, to delete on the server.
    removed: Vec<String>,
    next_local: u32,
}

impl<T> Default for OrderedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            removed: Vec::new(),
            next_local: 1,
        }
    }
}

impl<T: Ordered> OrderedList<T> {
    /// Wrap server items, sorted by their current order.
    pub fn from_items(mut items: Vec<T>, order_of: impl Fn(&T) -> u32) -> Self {
        items.sort_by_key(|i| order_of(i));
        let mut list = Self {
            items,
            ..Self::default()
        };
        list.reindex();
        list
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|i| i.item_id() == id)
    }

    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    /// Drop ids whose server delete went through; the rest stay pending.
    pub fn forget_removed(&mut self, deleted: &[String]) {
        self.removed.retain(|id| !deleted.contains(id));
    }

    fn position(&self, id: &str) -> Result<usize, EditorError> {
        self.items
            .iter()
            .position(|i| i.item_id() == id)
            .ok_or_else(|| EditorError::UnknownItem(id.to_string()))
    }

    /// Append at the end. Items without an id get a local one; returns the id.
    pub fn add(&mut self, mut item: T) -> String {
        if item.item_id().is_empty() {
            item.set_item_id(format!("{}{}", LOCAL_ID_PREFIX, self.next_local));
            self.next_local += 1;
        }
        let id = item.item_id().to_string();
        self.items.push(item);
        self.reindex();
        id
    }

    /// Replace the item with the same id, keeping its position.
    pub fn update(&mut self, item: T) -> Result<(), EditorError> {
        let pos = self.position(item.item_id())?;
        self.items[pos] = item;
        self.reindex();
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> Result<T, EditorError> {
        let pos = self.position(id)?;
        let item = self.items.remove(pos);
        if !is_local_id(item.item_id()) {
            self.removed.push(item.item_id().to_string());
        }
        self.reindex();
        Ok(item)
    }

    /// Swap with the neighbour. First-up and last-down are no-ops.
    pub fn move_item(&mut self, id: &str, direction: Direction) -> Result<(), EditorError> {
        let pos = self.position(id)?;
        let target = match direction {
            Direction::Up if pos > 0 => pos - 1,
            Direction::Down if pos + 1 < self.items.len() => pos + 1,
            _ => return Ok(()),
        };
        self.items.swap(pos, target);
        self.reindex();
        Ok(())
    }

    fn reindex(&mut self) {
        for (idx, item) in self.items.iter_mut().enumerate() {
            item.set_order(idx as u32);
        }
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }
}
