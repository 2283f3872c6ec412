//! In-process local store.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::traits::{Cacheable, LocalStore};

/// Store that keeps items in memory for the lifetime of the process.
/// Used when the on-disk cache is disabled.
pub struct MemoryStore<T> {
  /// Items by position; gaps are pages that were never fetched
  items: RwLock<BTreeMap<u64, T>>,
  page_size: u64,
}

impl<T: Cacheable> MemoryStore<T> {
  pub fn new(page_size: u32) -> Self {
    Self {
      items: RwLock::new(BTreeMap::new()),
      page_size: u64::from(page_size.max(1)),
    }
  }

  /// Store `new_items` at `offset..offset + len`. A key cached elsewhere
  /// moves to its new position.
  fn place(items: &mut BTreeMap<u64, T>, offset: u32, new_items: &[T]) {
    let start = u64::from(offset);
    let end = start + new_items.len() as u64;
    items.retain(|position, _| !(start..end).contains(position));

    for (i, new_item) in new_items.iter().enumerate() {
      let key = new_item.cache_key();
      items.retain(|_, existing| existing.cache_key() != key);
      items.insert(start + i as u64, new_item.clone());
    }
  }
}

#[async_trait]
impl<T: Cacheable> LocalStore<T> for MemoryStore<T> {
  async fn read(&self, offset: u32) -> Result<Vec<T>> {
    let items = self
      .items
      .read()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let start = u64::from(offset);
    Ok(
      items
        .range(start..start + self.page_size)
        .map(|(_, item)| item.clone())
        .collect(),
    )
  }

  async fn append(&self, offset: u32, new_items: &[T]) -> Result<()> {
    let mut items = self
      .items
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Self::place(&mut items, offset, new_items);
    Ok(())
  }

  async fn replace_all(&self, offset: u32, new_items: &[T]) -> Result<()> {
    let mut items = self
      .items
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let mut replacement = BTreeMap::new();
    Self::place(&mut replacement, offset, new_items);
    *items = replacement;
    Ok(())
  }
}
