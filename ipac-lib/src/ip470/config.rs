//! Creation parameters and board bring-up for the IP470
//!
//! The shadow values are fixed when the card is created
//! and programmed into the board right after. Order of
//! the writes matters: the board has to be in enhanced
//! mode before any bank can be selected, and interrupts
//! get enabled last.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Ip470Error;
use crate::memory::RegisterAccess;
use crate::ip470::registers::*;

/// Which parts of the board get programmed
/// by `BoardConfig::apply`
pub mod param {
  pub const ENHANCED    : u8 = 0x01;
  pub const MASK        : u8 = 0x02;
  pub const EVCONTROL   : u8 = 0x04;
  pub const DEBCLOCK    : u8 = 0x08;
  pub const DEBCONTROL  : u8 = 0x10;
  pub const DEBDURATION : u8 = 0x20;
  pub const RESET_INTEN : u8 = 0x40;
  pub const VECT        : u8 = 0x80;

  pub const PARAM_MASK_STANDARD : u8 = 0x43;
  pub const PARAM_MASK_ENHANCED : u8 = 0xff;
}

/// Event sense polarity for change-of-state
/// interrupts (both polarities for all groups)
pub const COS_EV_CONTROL : [u8;2] = [0xaa, 0x0a];
/// Debounce clock 8 MHz
pub const DEB_CLOCK_8MHZ : u8 = 0x01;
/// Debounce on for all 6 ports
pub const DEB_CONTROL_ALL : u8 = 0x3f;

pub const MAX_VECTOR   : i32 = 0xff;
pub const MAX_EVENT    : i32 = 0xfff;
pub const MAX_DEBOUNCE : i32 = 0xff;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
  Standard,
  Enhanced,
}

impl FromStr for Mode {
  type Err = Ip470Error;

  fn from_str(s : &str) -> Result<Self, Self::Err> {
    match s {
      "STANDARD" => Ok(Mode::Standard),
      "ENHANCED" => Ok(Mode::Enhanced),
      _          => Err(Ip470Error::ModeError)
    }
  }
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Mode::Standard => write!(f, "STANDARD"),
      Mode::Enhanced => write!(f, "ENHANCED"),
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntHandler {
  NotUsed,
  /// change of state
  Cos,
  Level,
}

impl FromStr for IntHandler {
  type Err = Ip470Error;

  fn from_str(s : &str) -> Result<Self, Self::Err> {
    match s {
      "COS"   => Ok(IntHandler::Cos),
      "LEVEL" => Ok(IntHandler::Level),
      _       => Err(Ip470Error::IntHandlerError)
    }
  }
}

impl fmt::Display for IntHandler {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      IntHandler::NotUsed => write!(f, "NOTUSED"),
      IntHandler::Cos     => write!(f, "COS"),
      IntHandler::Level   => write!(f, "LEVEL"),
    }
  }
}

/// Shadow values of the board registers
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoardConfig {
  pub mode         : Mode,
  pub int_handler  : IntHandler,
  pub param        : u8,
  pub mask_reg     : u8,
  /// event sense polarity, [0] bank1 port6,
  /// [1] bank1 port7
  pub ev_control   : [u8;2],
  pub deb_clock    : u8,
  pub deb_control  : u8,
  pub deb_duration : u16,
  pub enable       : u8,
  pub vector       : u8,
}

impl BoardConfig {

  /// Standard mode, no interrupts
  pub fn standard() -> Self {
    Self {
      mode         : Mode::Standard,
      int_handler  : IntHandler::NotUsed,
      param        : param::PARAM_MASK_STANDARD,
      mask_reg     : 0,
      ev_control   : [0, 0],
      deb_clock    : 0,
      deb_control  : 0,
      deb_duration : 0,
      enable       : 0,
      vector       : 0,
    }
  }

  /// Enhanced mode with interrupts
  ///
  /// # Arguments
  ///
  /// * int_handler : COS or LEVEL
  /// * vector      : interrupt vector
  /// * event       : event sense polarity for LEVEL
  ///                 interrupts (12 bits)
  /// * debounce    : debounce duration
  pub fn enhanced(int_handler : IntHandler,
                  vector      : u8,
                  event       : u16,
                  debounce    : u8) -> Self {
    let ev_control = match int_handler {
      IntHandler::Cos => COS_EV_CONTROL,
      _               => [(event & 0xff) as u8, ((event >> 8) & 0xff) as u8],
    };
    Self {
      mode         : Mode::Enhanced,
      int_handler,
      param        : param::PARAM_MASK_ENHANCED,
      mask_reg     : 0,
      ev_control,
      deb_clock    : DEB_CLOCK_8MHZ,
      deb_control  : DEB_CONTROL_ALL,
      deb_duration : debounce as u16,
      enable       : INTEN,
      vector,
    }
  }

  /// Check the creation parameters and set up
  /// the shadow values.
  ///
  /// Handler, vector, event and debounce only
  /// matter in enhanced mode and are ignored
  /// otherwise.
  pub fn from_parameters(mode        : &str,
                         int_handler : &str,
                         vector      : i32,
                         event       : i32,
                         debounce    : i32) -> Result<Self, Ip470Error> {
    match mode.parse::<Mode>()? {
      Mode::Standard => Ok(Self::standard()),
      Mode::Enhanced => {
        let handler = int_handler.parse::<IntHandler>()?;
        if !(0..=MAX_VECTOR).contains(&vector) {
          return Err(Ip470Error::VectorInvalid);
        }
        if !(0..=MAX_EVENT).contains(&event) {
          return Err(Ip470Error::EventRegInvalid);
        }
        if !(0..=MAX_DEBOUNCE).contains(&debounce) {
          return Err(Ip470Error::DebounceRegInvalid);
        }
        Ok(Self::enhanced(handler, vector as u8, event as u16, debounce as u8))
      }
    }
  }

  pub fn has(&self, p : u8) -> bool {
    self.param & p != 0
  }

  fn bank(&self, regs : &dyn RegisterAccess, bank : u8) {
    select_bank(regs, bank, self.ev_control[1]);
  }

  /// Program the board from the shadow values
  pub fn apply(&self, regs : &dyn RegisterAccess) {
    let enhanced = self.mode == Mode::Enhanced;

    if self.has(param::RESET_INTEN) && (self.enable & RESET != 0) {
      regs.write_u8(IER, RESET);
    }

    if self.has(param::ENHANCED) && enhanced {
      for b in ENHANCED_MODE_SEQUENCE {
        write_port(regs, BANK_PORT, b);
      }
    }

    if self.has(param::VECT) {
      regs.write_u8(IVR, self.vector);
    }

    if !enhanced {
      if self.has(param::MASK) {
        self.bank(regs, BANK0);
        write_port(regs, BANK_PORT, self.mask_reg & 0x3f);
      }
      return;
    }

    if self.has(param::MASK) {
      self.bank(regs, BANK0);
      write_port(regs, BANK_PORT, self.mask_reg & 0x3f);
    }

    if self.has(param::EVCONTROL) {
      self.bank(regs, BANK1);
      write_port(regs, STATUS_PORT, self.ev_control[0]);
      write_port(regs, BANK_PORT,   self.ev_control[1]);
    }

    if self.has(param::DEBCONTROL) {
      self.bank(regs, BANK2);
      write_port(regs, 0, self.deb_control);
    }

    if self.has(param::DEBDURATION) {
      self.bank(regs, BANK2);
      write_port(regs, 1, (self.deb_duration & 0xff) as u8);
      write_port(regs, 2, ((self.deb_duration >> 8) & 0x0f) as u8);
    }

    if self.has(param::DEBCLOCK) {
      self.bank(regs, BANK2);
      write_port(regs, 3, self.deb_clock);
    }

    if self.has(param::RESET_INTEN) && (self.enable & INTEN != 0) {
      self.bank(regs, BANK1);
      // clear whatever is pending, then enable
      // the sense inputs of all ports
      for port in 0..MAXPORTS {
        write_port(regs, port, 0x00);
        write_port(regs, port, 0xff);
      }
      regs.write_u8(IER, INTEN);
    }
  }
}
