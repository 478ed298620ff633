//! Acromag IP470 48 channel digital I/O
//!
//! The board runs either in standard mode (plain I/O) or
//! in enhanced mode, where inputs can raise change-of-state
//! or level interrupts and have a debounce filter.
//!
//! Cards are created once at startup (`Ip470Driver::create`),
//! the interrupt handlers are attached by
//! `Ip470Driver::initialise`. After that the driver serves
//! reads, writes and scan handle requests by card name.

pub mod addressing;
pub mod config;
pub mod isr;
pub mod registers;
pub mod sim;

use std::sync::atomic::{AtomicU8,
                        AtomicU64,
                        Ordering};
use std::sync::{Arc, RwLock};

use crate::carrier::{Carrier,
                     InterruptHandler,
                     IrqCmd,
                     Site};
use crate::errors::Ip470Error;
use crate::memory::{IdProm, RegisterAccess};
use crate::registry::{CardIdentity, Registry};
use crate::scan::{ScanIo, ScanTable, ScanView};

use addressing::{check_port_bit,
                 concat_ports,
                 cos_bit_number,
                 extract,
                 level_bit_number,
                 split_span,
                 DataSize};
use config::{BoardConfig,
             IntHandler,
             Mode};
use registers::*;

/// Called from the interrupt handler with
/// (card name, port, bit) of every interrupt
pub type UserCallback = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;

/// One IP470 board
pub struct Ip470Card {
  pub(crate) name             : String,
  pub(crate) site             : Site,
  pub(crate) regs             : Arc<dyn RegisterAccess>,
  pub(crate) config           : BoardConfig,
  pub(crate) user_fn          : Option<UserCallback>,
  pub(crate) last_chan        : AtomicU8,
  pub(crate) last_state       : AtomicU8,
  pub(crate) n_interrupts     : AtomicU64,
  pub(crate) n_irq_cmd_errors : AtomicU64,
  pub(crate) scans            : ScanTable,
}

impl CardIdentity for Ip470Card {
  fn name(&self) -> &str {
    &self.name
  }

  fn site(&self) -> Site {
    self.site
  }
}

impl Ip470Card {

  pub fn new(name    : &str,
             site    : Site,
             regs    : Arc<dyn RegisterAccess>,
             config  : BoardConfig,
             user_fn : Option<UserCallback>) -> Self {
    Self {
      name             : String::from(name),
      site,
      regs,
      config,
      user_fn,
      last_chan        : AtomicU8::new(0),
      last_state       : AtomicU8::new(0),
      n_interrupts     : AtomicU64::new(0),
      n_irq_cmd_errors : AtomicU64::new(0),
      scans            : ScanTable::new(),
    }
  }

  pub fn config(&self) -> &BoardConfig {
    &self.config
  }

  pub fn int_handler(&self) -> IntHandler {
    self.config.int_handler
  }

  /// Scan index of the most recent interrupt
  pub fn last_chan(&self) -> u8 {
    self.last_chan.load(Ordering::Acquire)
  }

  /// Logical state of the most recent interrupt
  pub fn last_state(&self) -> u8 {
    self.last_state.load(Ordering::Acquire)
  }

  pub fn n_interrupts(&self) -> u64 {
    self.n_interrupts.load(Ordering::Relaxed)
  }

  pub fn n_irq_cmd_errors(&self) -> u64 {
    self.n_irq_cmd_errors.load(Ordering::Relaxed)
  }

  fn select_bank(&self, bank : u8) -> u8 {
    select_bank(self.regs.as_ref(), bank, self.config.ev_control[1])
  }

  /// Program the board from the shadow registers
  pub fn configure(&self) {
    self.config.apply(self.regs.as_ref());
  }

  /// Read from (port, bit) with the given size.
  /// Port and bit have to be checked already.
  fn read(&self, port : usize, bit : usize, size : DataSize) -> u16 {
    let regs = self.regs.as_ref();
    self.select_bank(BANK0);
    match size {
      DataSize::Bit  => ((read_port(regs, port) >> bit) & 0x01) as u16,
      DataSize::Port => read_port(regs, port) as u16,
      DataSize::Nibble | DataSize::Word => {
        let n_ports   = (MAXPORTS - port).min(3);
        let mut bytes = [0u8;3];
        for k in 0..n_ports {
          bytes[k] = read_port(regs, port + k);
        }
        extract(concat_ports(&bytes[..n_ports]), bit, size)
      }
    }
  }

  fn write(&self,
           port  : usize,
           bit   : usize,
           size  : DataSize,
           value : u32,
           nbits : usize) -> Result<(), Ip470Error> {
    if value > size.max_value() {
      error!("{}: {} value out of range {:#x}", self.name, size, value);
      return Err(Ip470Error::WriteError);
    }
    let regs = self.regs.as_ref();
    self.select_bank(BANK0);
    match size {
      DataSize::Bit => {
        let old = read_port(regs, port);
        let new = (old & !(1u8 << bit)) | ((value as u8) << bit);
        write_port(regs, port, new);
      }
      DataSize::Port => {
        write_port(regs, port, value as u8);
      }
      DataSize::Nibble | DataSize::Word => {
        let nbits = nbits.min(size.width());
        for slice in split_span(port, bit, value, nbits) {
          let old = read_port(regs, slice.port);
          let new = slice.apply(old);
          trace!("{}: port {} {:#04x} -> {:#04x}", self.name, slice.port, old, new);
          if new != old {
            write_port(regs, slice.port, new);
          }
        }
      }
    }
    Ok(())
  }

  /// Scan index of (port, bit) for this card's
  /// interrupt handler
  pub fn scan_index(&self, port : usize, bit : usize) -> Result<usize, Ip470Error> {
    match self.config.int_handler {
      IntHandler::NotUsed => Err(Ip470Error::NoInterrupts),
      IntHandler::Cos     => Ok(cos_bit_number(port, bit)),
      IntHandler::Level   => Ok(level_bit_number(port, bit)),
    }
  }

  /// Mask/unmask our carrier interrupt line from
  /// interrupt context (failures are only counted)
  pub(crate) fn irq(&self, carrier : &dyn Carrier, cmd : IrqCmd) {
    if carrier.irq_cmd(self.site, cmd).is_err() {
      self.n_irq_cmd_errors.fetch_add(1, Ordering::Relaxed);
    }
  }

  /// Book keeping for a single serviced interrupt bit
  pub(crate) fn record_interrupt(&self, index : usize, state : u8, port : usize, bit : usize) {
    self.last_chan.store(index as u8, Ordering::Release);
    self.last_state.store(state, Ordering::Release);
    self.n_interrupts.fetch_add(1, Ordering::Relaxed);
    self.scans.notify(index, state);
    if let Some(f) = &self.user_fn {
      f(&self.name, port, bit);
    }
  }

  /// Entry point for the carrier interrupt
  pub fn service_interrupt(&self, carrier : &dyn Carrier) {
    match self.config.int_handler {
      IntHandler::Cos     => isr::cos_isr(self, carrier),
      IntHandler::Level   => isr::level_isr(self, carrier),
      IntHandler::NotUsed => (),
    }
  }

  /// Human readable report
  ///
  /// # Arguments
  ///
  /// * interest : 0 - registers and ID PROM, 1 - bit
  ///              pattern, 2 - both
  pub fn report(&self, interest : u8) -> String {
    let mut repr = format!("<Ip470Card {} at {}, {} mode, handler {}",
                           self.name, self.site, self.config.mode, self.config.int_handler);
    if interest == 0 || interest == 2 {
      let regs = self.regs.as_ref();
      repr += &(format!("\n  interrupt enable : {:#04x}", regs.read_u8(IER)));
      repr += &(format!("\n  interrupt vector : {:#04x}", regs.read_u8(IVR)));
      repr += &(format!("\n  last channel     : {}", self.last_chan()));
      repr += &(format!("\n  last state       : {}", self.last_state()));
      repr += &(format!("\n  interrupts       : {}", self.n_interrupts()));
      repr += &(format!("\n  dropped scans    : {}", self.scans.n_dropped()));
      repr += &(format!("\n  irq cmd errors   : {}", self.n_irq_cmd_errors()));
      repr += &(format!("\n  {}", IdProm::read(regs)));
    }
    if interest == 1 || interest == 2 {
      repr += "\n  bit    : 0 1 2 3 4 5 6 7";
      for port in 0..MAXPORTS {
        repr += &(format!("\n  port {} :", port));
        for bit in 0..MAXBITS {
          repr += &(format!(" {}", self.read(port, bit, DataSize::Bit)));
        }
      }
    }
    repr += ">";
    repr
  }
}

/// All IP470 cards of this IOC
pub struct Ip470Driver {
  carrier : Arc<dyn Carrier>,
  cards   : RwLock<Registry<Ip470Card>>,
}

impl Ip470Driver {

  pub fn new(carrier : Arc<dyn Carrier>) -> Self {
    Self {
      carrier,
      cards   : RwLock::new(Registry::new()),
    }
  }

  /// Create and configure a new card
  ///
  /// # Arguments
  ///
  /// * name        : unique card name
  /// * site        : carrier and slot
  /// * mode        : "STANDARD" or "ENHANCED"
  /// * int_handler : "COS" or "LEVEL" (enhanced mode)
  /// * user_fn     : called on every interrupt
  /// * vector      : interrupt vector (0-0xff)
  /// * event       : event sense polarity for LEVEL (0-0xfff)
  /// * debounce    : debounce duration (0-0xff)
  pub fn create(&self,
                name        : &str,
                site        : Site,
                mode        : &str,
                int_handler : &str,
                user_fn     : Option<UserCallback>,
                vector      : i32,
                event       : i32,
                debounce    : i32) -> Result<(), Ip470Error> {
    let config = match BoardConfig::from_parameters(mode, int_handler, vector, event, debounce) {
      Err(err) => {
        error!("{}: invalid parameters (mode {}, handler {}, vector {:#x}, event {:#x}, debounce {:#x})! {}",
               name, mode, int_handler, vector, event, debounce, err);
        return Err(err);
      }
      Ok(c) => c
    };
    match self.carrier.validate(site, IP_MANUFACTURER_ACROMAG, IP_MODEL_ACROMAG_IP470) {
      Err(err) => {
        error!("{}: no IP470 at {}! {}", name, site, err);
        return Err(Ip470Error::ValidateFailed);
      }
      Ok(_) => ()
    }
    let regs = match self.carrier.base_addr(site) {
      Err(err) => {
        error!("{}: can't get the register block at {}! {}", name, site, err);
        return Err(Ip470Error::ValidateFailed);
      }
      Ok(r) => r
    };
    let mut cards = match self.cards.write() {
      Err(err) => {
        error!("Card registry lock poisoned! {err}");
        return Err(Ip470Error::MallocFailed);
      }
      Ok(c) => c
    };
    cards.check_unique(name, site)?;
    let card = cards.insert(Ip470Card::new(name, site, regs, config, user_fn))?;
    card.configure();
    info!("Created IP470 {} at {} ({} mode, {})", name, site, config.mode, config.int_handler);
    Ok(())
  }

  pub fn find_card(&self, name : &str) -> Option<Arc<Ip470Card>> {
    match self.cards.read() {
      Err(_)    => None,
      Ok(cards) => cards.find_by_name(name)
    }
  }

  fn card(&self, name : &str) -> Result<Arc<Ip470Card>, Ip470Error> {
    match self.find_card(name) {
      None => {
        error!("Card {} not found!", name);
        Err(Ip470Error::CardNotFound)
      }
      Some(c) => Ok(c)
    }
  }

  pub fn which_handler(&self, name : &str) -> Result<IntHandler, Ip470Error> {
    Ok(self.card(name)?.int_handler())
  }

  pub fn read(&self,
              name : &str,
              port : usize,
              bit  : usize,
              size : DataSize) -> Result<u16, Ip470Error> {
    if let Err(err) = check_port_bit(port, bit) {
      error!("{}: port {} / bit {} out of range!", name, port, bit);
      return Err(err);
    }
    let card = self.card(name)?;
    Ok(card.read(port, bit, size))
  }

  /// Write a value
  ///
  /// For nibbles and words `nbits` is the number of
  /// bits actually written (at most 4 resp. 16), the
  /// remaining bits of the ports stay untouched.
  pub fn write(&self,
               name  : &str,
               port  : usize,
               bit   : usize,
               size  : DataSize,
               value : u32,
               nbits : usize) -> Result<(), Ip470Error> {
    if let Err(err) = check_port_bit(port, bit) {
      error!("{}: port {} / bit {} out of range!", name, port, bit);
      return Err(err);
    }
    let card = self.card(name)?;
    card.write(port, bit, size, value, nbits)
  }

  /// The scan handle a record reading (port, bit)
  /// through the given view subscribes to
  pub fn io_scan(&self,
                 name : &str,
                 port : usize,
                 bit  : usize,
                 view : ScanView) -> Result<Arc<ScanIo>, Ip470Error> {
    check_port_bit(port, bit)?;
    let card  = self.card(name)?;
    let index = match card.scan_index(port, bit) {
      Err(err) => {
        warn!("{}: no interrupts in {} mode!", name, card.config.mode);
        return Err(err);
      }
      Ok(i) => i
    };
    card.scans.get(view, index).ok_or(Ip470Error::InvalidRecordType)
  }

  /// Same as io_scan, with the view given by
  /// record type name (BI, MBBI, MBBIDIRECT)
  pub fn io_scan_record(&self,
                        name        : &str,
                        port        : usize,
                        bit         : usize,
                        record_type : &str) -> Result<Arc<ScanIo>, Ip470Error> {
    match record_type.parse::<ScanView>() {
      Err(_) => {
        error!("{}: record type {} can't be scanned on interrupts!", name, record_type);
        Err(Ip470Error::InvalidRecordType)
      }
      Ok(view) => self.io_scan(name, port, bit, view)
    }
  }

  /// Attach the interrupt handlers of all
  /// enhanced mode cards and enable the interrupts.
  ///
  /// A card which fails does not keep the others
  /// from being set up, the error is returned
  /// after all cards got visited.
  pub fn initialise(&self) -> Result<(), Ip470Error> {
    let cards = match self.cards.read() {
      Err(_) => return Err(Ip470Error::IntConnectError),
      Ok(c)  => c.snapshot()
    };
    let mut n_failed = 0usize;
    for card in cards {
      if card.config.mode != Mode::Enhanced {
        continue;
      }
      let isr_card    = card.clone();
      let isr_carrier = Arc::downgrade(&self.carrier);
      let handler : InterruptHandler = Arc::new(move || {
        if let Some(carrier) = isr_carrier.upgrade() {
          isr_card.service_interrupt(carrier.as_ref());
        }
      });
      match self.carrier.int_connect(card.site, card.config.vector, handler) {
        Err(err) => {
          error!("{}: can't connect vector {:#04x}! {}", card.name, card.config.vector, err);
          n_failed += 1;
          continue;
        }
        Ok(_) => ()
      }
      match self.carrier.irq_cmd(card.site, IrqCmd::Enable) {
        Err(err) => {
          error!("{}: can't enable the carrier interrupt! {}", card.name, err);
          n_failed += 1;
        }
        Ok(_) => info!("{}: {} interrupts on vector {:#04x}", card.name, card.config.int_handler, card.config.vector)
      }
    }
    if n_failed > 0 {
      return Err(Ip470Error::IntConnectError);
    }
    Ok(())
  }

  /// Report all cards, in creation order
  pub fn report(&self, interest : u8) -> String {
    let mut repr = String::new();
    if let Ok(cards) = self.cards.read() {
      for card in cards.iter() {
        repr += &card.report(interest);
        repr += "\n";
      }
    }
    repr
  }

  pub fn names(&self) -> Vec<String> {
    match self.cards.read() {
      Err(_)    => Vec::new(),
      Ok(cards) => cards.names()
    }
  }

  /// Forget all cards
  pub fn shutdown(&self) {
    if let Ok(mut cards) = self.cards.write() {
      cards.clear();
    }
  }
}
