//! A simulated IP470
//!
//! Models the bank switched register file closely enough
//! to run the driver against it: port data, write mask,
//! interrupt pending/sense enable, interrupt status, event
//! sense polarity, debounce registers, interrupt enable
//! and vector registers and the ID PROM.
//!
//! Every bus write is logged, so tests can check what the
//! driver actually put on the bus.

use std::sync::Mutex;

use crate::memory::{IdProm,
                    RegisterAccess,
                    ID_PROM_OFFSET,
                    ID_PROM_SIZE};
use crate::ip470::registers::*;

#[derive(Debug, Default, Clone)]
struct BoardState {
  bank         : u8,
  enhanced     : bool,
  last_seq     : Vec<u8>,
  data         : [u8;MAXPORTS],
  mask         : u8,
  pending      : [u8;MAXPORTS],
  sense_enable : [u8;MAXPORTS],
  ev_control   : [u8;2],
  debounce     : [u8;4],
  ier          : u8,
  ivr          : u8,
  writes       : Vec<(usize, u8)>,
}

pub struct Ip470Sim {
  state : Mutex<BoardState>,
  prom  : IdProm,
}

impl Ip470Sim {
  pub fn new() -> Self {
    Self::with_prom(IdProm::ipac(IP_MANUFACTURER_ACROMAG, IP_MODEL_ACROMAG_IP470))
  }

  /// A board with a custom ID PROM, e.g. to
  /// impersonate another module
  pub fn with_prom(prom : IdProm) -> Self {
    Self {
      state : Mutex::new(BoardState::default()),
      prom,
    }
  }

  fn with_state<T>(&self, f : impl FnOnce(&mut BoardState) -> T) -> T {
    match self.state.lock() {
      Ok(mut s) => f(&mut s),
      Err(poisoned) => f(&mut poisoned.into_inner()),
    }
  }

  /// Signal a change on (port, bit). The interrupt
  /// is latched only if the sense input is enabled.
  pub fn raise(&self, port : usize, bit : usize) -> bool {
    self.with_state(|s| {
      let b = 1u8 << bit;
      if port >= MAXPORTS || s.sense_enable[port] & b == 0 {
        return false;
      }
      s.pending[port] |= b;
      true
    })
  }

  /// Drive input lines of a port
  pub fn set_input(&self, port : usize, value : u8) {
    self.with_state(|s| s.data[port] = value);
  }

  pub fn port_data(&self, port : usize) -> u8 {
    self.with_state(|s| s.data[port])
  }

  pub fn bank(&self) -> u8 {
    self.with_state(|s| s.bank)
  }

  pub fn is_enhanced(&self) -> bool {
    self.with_state(|s| s.enhanced)
  }

  pub fn pending(&self, port : usize) -> u8 {
    self.with_state(|s| s.pending[port])
  }

  pub fn sense_enable(&self, port : usize) -> u8 {
    self.with_state(|s| s.sense_enable[port])
  }

  pub fn ev_control(&self) -> [u8;2] {
    self.with_state(|s| s.ev_control)
  }

  pub fn mask(&self) -> u8 {
    self.with_state(|s| s.mask)
  }

  pub fn debounce(&self) -> [u8;4] {
    self.with_state(|s| s.debounce)
  }

  pub fn ier(&self) -> u8 {
    self.with_state(|s| s.ier)
  }

  pub fn ivr(&self) -> u8 {
    self.with_state(|s| s.ivr)
  }

  /// All writes since creation (or the last
  /// `clear_writes`) as (offset, value)
  pub fn writes(&self) -> Vec<(usize, u8)> {
    self.with_state(|s| s.writes.clone())
  }

  pub fn clear_writes(&self) {
    self.with_state(|s| s.writes.clear());
  }
}

impl Default for Ip470Sim {
  fn default() -> Self {
    Self::new()
  }
}

fn offset_to_port(offset : usize) -> Option<usize> {
  if offset % 2 == 1 && offset <= port_offset(BANK_PORT) {
    Some((offset - 1) / 2)
  } else {
    None
  }
}

impl RegisterAccess for Ip470Sim {
  fn read_u8(&self, offset : usize) -> u8 {
    if offset >= ID_PROM_OFFSET && offset < ID_PROM_OFFSET + 2*ID_PROM_SIZE {
      if offset % 2 == 0 {
        return 0;
      }
      return self.prom.bytes[(offset - ID_PROM_OFFSET - 1) / 2];
    }
    self.with_state(|s| {
      if offset == IER {
        return s.ier;
      }
      if offset == IVR {
        return s.ivr;
      }
      let port = match offset_to_port(offset) {
        None    => return 0,
        Some(p) => p
      };
      match (s.bank, port) {
        (bank, BANK_PORT) => {
          let low = match bank {
            BANK0 => s.mask,
            // event sense polarity is write only
            BANK1 => 0x3f,
            _     => 0,
          };
          (bank << 6) | low
        }
        (BANK0, p) if p < MAXPORTS => s.data[p],
        (BANK1, p) if p < MAXPORTS => s.pending[p],
        (BANK1, STATUS_PORT)       => {
          let mut status = 0u8;
          for (i, p) in s.pending.iter().enumerate() {
            if *p != 0 {
              status |= 1 << i;
            }
          }
          status
        }
        (BANK2, p) if p < 4        => s.debounce[p],
        _                          => 0,
      }
    })
  }

  fn write_u8(&self, offset : usize, value : u8) {
    self.with_state(|s| {
      s.writes.push((offset, value));
      if offset == IER {
        if value & RESET != 0 {
          s.pending = [0;MAXPORTS];
        }
        s.ier = value & INTEN;
        return;
      }
      if offset == IVR {
        s.ivr = value;
        return;
      }
      let port = match offset_to_port(offset) {
        None    => return,
        Some(p) => p
      };
      if port == BANK_PORT {
        s.last_seq.push(value);
        if s.last_seq.len() > ENHANCED_MODE_SEQUENCE.len() {
          s.last_seq.remove(0);
        }
        if s.last_seq[..] == ENHANCED_MODE_SEQUENCE[..] {
          s.enhanced = true;
        }
        let low = value & 0x3f;
        match s.bank {
          BANK0 => s.mask = low,
          BANK1 => s.ev_control[1] = low,
          _     => (),
        }
        if s.enhanced {
          s.bank = value >> 6;
        }
        return;
      }
      match (s.bank, port) {
        (BANK0, p) if p < MAXPORTS => s.data[p] = value,
        (BANK1, p) if p < MAXPORTS => {
          s.sense_enable[p] = value;
          s.pending[p]     &= value;
        }
        (BANK1, STATUS_PORT)       => s.ev_control[0] = value,
        (BANK2, p) if p < 4        => s.debounce[p] = value,
        _                          => (),
      }
    })
  }

  fn read_u16(&self, offset : usize) -> u16 {
    (self.read_u8(offset) as u16) << 8 | self.read_u8(offset + 1) as u16
  }

  fn write_u16(&self, offset : usize, value : u16) {
    self.write_u8(offset, (value >> 8) as u8);
    self.write_u8(offset + 1, (value & 0xff) as u8);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bank_switching_needs_enhanced_mode() {
    let sim = Ip470Sim::new();
    write_port(&sim, BANK_PORT, 0x40);
    assert_eq!(sim.bank(), BANK0);
    for b in ENHANCED_MODE_SEQUENCE {
      write_port(&sim, BANK_PORT, b);
    }
    assert!(sim.is_enhanced());
    write_port(&sim, BANK_PORT, 0x80);
    assert_eq!(sim.bank(), BANK2);
  }

  #[test]
  fn pending_clears_by_writing_zero() {
    let sim = Ip470Sim::new();
    for b in ENHANCED_MODE_SEQUENCE {
      write_port(&sim, BANK_PORT, b);
    }
    write_port(&sim, BANK_PORT, 0x40);
    write_port(&sim, 3, 0xff);
    assert!(sim.raise(3, 2));
    assert_eq!(read_port(&sim, STATUS_PORT), 0x08);
    write_port(&sim, 3, !0x04);
    assert_eq!(sim.pending(3), 0);
    assert!(!sim.raise(3, 2));
  }
}
