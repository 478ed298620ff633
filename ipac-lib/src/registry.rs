//! Card registries
//!
//! Every driver keeps the cards created at startup
//! in a registry. Cards are only ever appended, the
//! creation order is kept (reports and the periodic
//! tasks visit cards in that order) and lookup by name
//! goes through a hash map.

use std::collections::HashMap;
use std::sync::Arc;

use crate::carrier::Site;
use crate::errors::RegistryError;

/// What the registry needs to know about a card
pub trait CardIdentity {
  fn name(&self) -> &str;
  fn site(&self) -> Site;
}

pub struct Registry<C> {
  cards : Vec<Arc<C>>,
  index : HashMap<String, usize>,
}

impl<C : CardIdentity> Registry<C> {

  pub fn new() -> Self {
    Self {
      cards : Vec::new(),
      index : HashMap::new(),
    }
  }

  /// Check if a card with this name or at
  /// this site could still be added
  pub fn check_unique(&self, name : &str, site : Site) -> Result<(), RegistryError> {
    if self.index.contains_key(name) {
      warn!("A card with name {} exists already!", name);
      return Err(RegistryError::DuplicateDevice);
    }
    if let Some(other) = self.cards.iter().find(|c| c.site() == site) {
      warn!("Card {} sits at {} already!", other.name(), site);
      return Err(RegistryError::DuplicateDevice);
    }
    Ok(())
  }

  /// Append a card, rejecting duplicates.
  ///
  /// A rejected card leaves the registry untouched.
  pub fn insert(&mut self, card : C) -> Result<Arc<C>, RegistryError> {
    self.check_unique(card.name(), card.site())?;
    let card = Arc::new(card);
    self.index.insert(String::from(card.name()), self.cards.len());
    self.cards.push(card.clone());
    Ok(card)
  }

  pub fn find_by_name(&self, name : &str) -> Option<Arc<C>> {
    self.index.get(name).map(|i| self.cards[*i].clone())
  }

  pub fn iter(&self) -> impl Iterator<Item = &Arc<C>> {
    self.cards.iter()
  }

  /// The cards in creation order, e.g. for loops
  /// which should not hold the registry lock
  pub fn snapshot(&self) -> Vec<Arc<C>> {
    self.cards.clone()
  }

  pub fn names(&self) -> Vec<String> {
    self.cards.iter().map(|c| String::from(c.name())).collect()
  }

  pub fn len(&self) -> usize {
    self.cards.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cards.is_empty()
  }

  /// Drop all cards (teardown)
  pub fn clear(&mut self) {
    self.cards.clear();
    self.index.clear();
  }
}

impl<C : CardIdentity> Default for Registry<C> {
  fn default() -> Self {
    Self::new()
  }
}
