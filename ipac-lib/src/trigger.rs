//! Trigger outputs of the IP231 DAC and the IP330 ADC
//!
//! Both cards are only used for a single function here: a
//! binary output record fires a trigger register write,
//! the simultaneous output update of the IP231 or the start
//! of a conversion on the IP330. Records address them as
//! `card:PARAM`.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::carrier::{Carrier, Site};
use crate::errors::TriggerError;
use crate::memory::RegisterAccess;
use crate::registry::{CardIdentity, Registry};

pub const IP_MANUFACTURER_ACROMAG : u8 = 0xa3;
pub const IP_MODEL_ACROMAG_IP231  : u8 = 0x25;
pub const IP_MODEL_ACROMAG_IP330  : u8 = 0x11;

/// simultaneous trigger register of the IP231
pub const IP231_TRIGGER_OFFSET : usize = 0x40;
/// start convert register of the IP330
pub const IP330_TRIGGER_OFFSET : usize = 0x04;
pub const TRIGGER_VALUE        : u16   = 0x0001;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
  /// DAC, simultaneous update of all outputs
  Ip231,
  /// ADC, start convert
  Ip330,
}

impl TriggerKind {
  pub fn model(&self) -> u8 {
    match self {
      TriggerKind::Ip231 => IP_MODEL_ACROMAG_IP231,
      TriggerKind::Ip330 => IP_MODEL_ACROMAG_IP330,
    }
  }

  /// The link parameter records use for the trigger
  pub fn param(&self) -> &'static str {
    match self {
      TriggerKind::Ip231 => "SIMUL",
      TriggerKind::Ip330 => "START",
    }
  }

  pub fn default_offset(&self) -> usize {
    match self {
      TriggerKind::Ip231 => IP231_TRIGGER_OFFSET,
      TriggerKind::Ip330 => IP330_TRIGGER_OFFSET,
    }
  }
}

impl FromStr for TriggerKind {
  type Err = TriggerError;

  fn from_str(s : &str) -> Result<Self, Self::Err> {
    match s {
      "IP231" => Ok(TriggerKind::Ip231),
      "IP330" => Ok(TriggerKind::Ip330),
      _       => Err(TriggerError::BadParameter)
    }
  }
}

impl fmt::Display for TriggerKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      TriggerKind::Ip231 => write!(f, "IP231"),
      TriggerKind::Ip330 => write!(f, "IP330"),
    }
  }
}

pub struct TriggerCard {
  name     : String,
  site     : Site,
  kind     : TriggerKind,
  regs     : Arc<dyn RegisterAccess>,
  offset   : usize,
  value    : u16,
  n_fired  : AtomicU64,
}

impl CardIdentity for TriggerCard {
  fn name(&self) -> &str {
    &self.name
  }

  fn site(&self) -> Site {
    self.site
  }
}

impl TriggerCard {
  pub fn kind(&self) -> TriggerKind {
    self.kind
  }

  pub fn n_fired(&self) -> u64 {
    self.n_fired.load(Ordering::Relaxed)
  }

  pub fn fire(&self) {
    self.regs.write_u16(self.offset, self.value);
    self.n_fired.fetch_add(1, Ordering::Relaxed);
  }
}

impl fmt::Display for TriggerCard {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<TriggerCard {} ({}) at {}, register {:#04x} <- {:#06x}, fired {} times>",
           self.name, self.kind, self.site, self.offset, self.value, self.n_fired())
  }
}

/// A resolved `card:PARAM` link of an output record
#[derive(Clone)]
pub struct TriggerLink {
  pub card : Arc<TriggerCard>,
}

pub struct TriggerDriver {
  carrier : Arc<dyn Carrier>,
  cards   : RwLock<Registry<TriggerCard>>,
}

impl TriggerDriver {

  pub fn new(carrier : Arc<dyn Carrier>) -> Self {
    Self {
      carrier,
      cards   : RwLock::new(Registry::new()),
    }
  }

  /// Register a card with the default trigger register
  pub fn create(&self,
                name : &str,
                site : Site,
                kind : TriggerKind) -> Result<(), TriggerError> {
    self.create_with_register(name, site, kind, kind.default_offset(), TRIGGER_VALUE)
  }

  pub fn create_with_register(&self,
                              name   : &str,
                              site   : Site,
                              kind   : TriggerKind,
                              offset : usize,
                              value  : u16) -> Result<(), TriggerError> {
    match self.carrier.validate(site, IP_MANUFACTURER_ACROMAG, kind.model()) {
      Err(err) => {
        error!("{}: no {} at {}! {}", name, kind, site, err);
        return Err(TriggerError::ValidateFailed);
      }
      Ok(_) => ()
    }
    let regs = match self.carrier.base_addr(site) {
      Err(err) => {
        error!("{}: can't get the register block at {}! {}", name, site, err);
        return Err(TriggerError::ValidateFailed);
      }
      Ok(r) => r
    };
    let card = TriggerCard {
      name     : String::from(name),
      site,
      kind,
      regs,
      offset,
      value,
      n_fired  : AtomicU64::new(0),
    };
    match self.cards.write() {
      Err(_)        => return Err(TriggerError::DuplicateDevice),
      Ok(mut cards) => {
        cards.insert(card)?;
      }
    }
    info!("Created {} {} at {}", kind, name, site);
    Ok(())
  }

  pub fn find_card(&self, name : &str) -> Option<Arc<TriggerCard>> {
    match self.cards.read() {
      Err(_)    => None,
      Ok(cards) => cards.find_by_name(name)
    }
  }

  /// Resolve a `card:PARAM` link
  pub fn parse_link(&self, link : &str) -> Result<TriggerLink, TriggerError> {
    let mut parts = link.splitn(2, ':');
    let name  = parts.next().unwrap_or("").trim();
    let param = match parts.next() {
      None => {
        error!("Link {} is not of the form card:PARAM!", link);
        return Err(TriggerError::BadLink);
      }
      Some(p) => p.split(':').next().unwrap_or("").trim()
    };
    if name.is_empty() || param.is_empty() {
      error!("Link {} is not of the form card:PARAM!", link);
      return Err(TriggerError::BadLink);
    }
    let card = match self.find_card(name) {
      None => {
        error!("Trigger card {} is not registered!", name);
        return Err(TriggerError::CardNotFound);
      }
      Some(c) => c
    };
    if param != card.kind.param() {
      error!("{} has no function {}!", name, param);
      return Err(TriggerError::BadParameter);
    }
    Ok(TriggerLink { card })
  }

  /// Output record processing. Fires for
  /// any value but 0.
  ///
  /// Returns true if the trigger fired.
  pub fn write_bo(&self, link : &TriggerLink, value : u32) -> bool {
    if value == 0 {
      return false;
    }
    link.card.fire();
    true
  }

  pub fn names(&self) -> Vec<String> {
    match self.cards.read() {
      Err(_)    => Vec::new(),
      Ok(cards) => cards.names()
    }
  }

  pub fn report(&self) -> String {
    let mut repr = String::new();
    if let Ok(cards) = self.cards.read() {
      for card in cards.iter() {
        repr += &(format!("{}\n", card));
      }
    }
    repr
  }

  pub fn shutdown(&self) {
    if let Ok(mut cards) = self.cards.write() {
      cards.clear();
    }
  }
}
