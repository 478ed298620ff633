//! A simulated IP-5320
//!
//! The converter output is produced by a generator closure
//! which gets the control word the conversion was started
//! with and a running conversion number. `Xy5320Sim::ideal`
//! builds a generator for a perfect board with the given
//! input voltages.

use std::sync::Mutex;

use crate::memory::{IdProm,
                    RegisterAccess,
                    ID_PROM_OFFSET,
                    ID_PROM_SIZE};
use crate::xy5320::registers::*;
use crate::xy5320::VoltageRange;

/// (control word, conversion number) -> data register
pub type Generator = Box<dyn Fn(u16, u64) -> u16 + Send + Sync>;

#[derive(Debug, Default)]
struct AdcState {
  control       : u16,
  ready         : bool,
  data          : u16,
  n_conversions : u64,
  /// conversions happen on their own, like
  /// an external trigger running freely
  free_running  : bool,
  controls      : Vec<u16>,
}

pub struct Xy5320Sim {
  state     : Mutex<AdcState>,
  generator : Generator,
  prom      : IdProm,
}

/// What a control word connects to the converter
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Input {
  Channel(u8),
  AutoZero,
  Reference(usize),
}

/// Decode the input selection of a control word
pub fn decode_control(control : u16) -> (Input, u16) {
  let gain = 1u16 << ((control & GAIN_MASK) >> 6);
  let low  = (control & 0x3f) as u8;
  let input = match control & AZ_SELECT {
    AZ_SELECT  => Input::AutoZero,
    SEH_SELECT => Input::Channel(low + MAX_DIF_CHANNELS as u8),
    SEL_SELECT => Input::Channel(low),
    _ => {
      if low as u16 >= CAL0 && low as u16 <= CAL3 {
        Input::Reference((low as u16 - CAL0) as usize)
      } else {
        Input::Channel(low)
      }
    }
  };
  (input, gain)
}

/// Counts of a perfect 16bit converter for a
/// voltage at the converter input
pub fn ideal_counts(range : VoltageRange, volts : f64) -> u16 {
  let (zero, span) = match range {
    VoltageRange::Bipolar5   => (-5.0, 10.0),
    VoltageRange::Bipolar10  => (-10.0, 20.0),
    VoltageRange::Unipolar10 => (0.0, 10.0),
  };
  let counts = (volts - zero) / span * CON16;
  counts.clamp(0.0, CON16 - 1.0) as u16
}

impl Xy5320Sim {

  pub fn new(generator : Generator) -> Self {
    Self {
      state     : Mutex::new(AdcState::default()),
      generator,
      prom      : IdProm::ipac(IP_MANUFACTURER_XYCOM, IP_MODEL_XYCOM_5320),
    }
  }

  /// A perfect board. `inputs` gives the voltage
  /// on each input channel.
  pub fn ideal<F>(range : VoltageRange, inputs : F) -> Self
    where F : Fn(u8) -> f64 + Send + Sync + 'static {
    Self::new(Box::new(move |control, _| {
      let (input, gain) = decode_control(control);
      let volts = match input {
        Input::Channel(c)   => inputs(c),
        Input::AutoZero     => 0.0,
        Input::Reference(r) => CAL_VOLTAGES[r],
      };
      ideal_counts(range, volts * gain as f64)
    }))
  }

  pub fn with_prom(mut self, prom : IdProm) -> Self {
    self.prom = prom;
    self
  }

  pub fn set_free_running(&self, free_running : bool) {
    self.with_state(|s| s.free_running = free_running);
  }

  pub fn n_conversions(&self) -> u64 {
    self.with_state(|s| s.n_conversions)
  }

  /// Control words in the order they were written
  pub fn controls(&self) -> Vec<u16> {
    self.with_state(|s| s.controls.clone())
  }

  fn with_state<T>(&self, f : impl FnOnce(&mut AdcState) -> T) -> T {
    match self.state.lock() {
      Ok(mut s) => f(&mut s),
      Err(poisoned) => f(&mut poisoned.into_inner()),
    }
  }

  fn convert(&self, s : &mut AdcState) {
    s.data           = (self.generator)(s.control, s.n_conversions);
    s.n_conversions += 1;
    s.ready          = true;
  }
}

impl RegisterAccess for Xy5320Sim {
  fn read_u8(&self, offset : usize) -> u8 {
    if offset >= ID_PROM_OFFSET && offset < ID_PROM_OFFSET + 2*ID_PROM_SIZE {
      if offset % 2 == 0 {
        return 0;
      }
      return self.prom.bytes[(offset - ID_PROM_OFFSET - 1) / 2];
    }
    let word = self.read_u16(offset & !1);
    if offset % 2 == 0 { (word >> 8) as u8 } else { (word & 0xff) as u8 }
  }

  fn write_u8(&self, offset : usize, value : u8) {
    self.write_u16(offset & !1, value as u16);
  }

  fn read_u16(&self, offset : usize) -> u16 {
    if offset >= ID_PROM_OFFSET {
      return (self.read_u8(offset) as u16) << 8 | self.read_u8(offset + 1) as u16;
    }
    self.with_state(|s| {
      match offset {
        CNTL_REG => {
          if !s.ready && s.free_running {
            self.convert(s);
          }
          if s.ready { s.control | CTRIG } else { s.control & !CTRIG }
        }
        AI_REG => {
          s.ready = false;
          s.data
        }
        _ => 0
      }
    })
  }

  fn write_u16(&self, offset : usize, value : u16) {
    self.with_state(|s| {
      match offset {
        CNTL_REG => {
          s.control = value & !CTRIG;
          s.controls.push(s.control);
        }
        STRT_REG => self.convert(s),
        _        => ()
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decode() {
    assert_eq!(decode_control(0x0103), (Input::Channel(3), 1));
    assert_eq!(decode_control(0x0245), (Input::Channel(25), 2));
    assert_eq!(decode_control(0x0380), (Input::AutoZero, 4));
    assert_eq!(decode_control(0x00d6), (Input::Reference(2), 8));
  }

  #[test]
  fn conversion_flag() {
    let sim = Xy5320Sim::new(Box::new(|c, n| c + n as u16));
    sim.write_u16(CNTL_REG, 0x0005);
    assert_eq!(sim.read_u16(CNTL_REG) & CTRIG, 0);
    sim.write_u16(STRT_REG, READ_TRIGGER);
    assert_ne!(sim.read_u16(CNTL_REG) & CTRIG, 0);
    assert_eq!(sim.read_u16(AI_REG), 5);
    assert_eq!(sim.read_u16(CNTL_REG) & CTRIG, 0);
  }

  #[test]
  fn ideal_midscale() {
    assert_eq!(ideal_counts(VoltageRange::Bipolar5, 0.0), 0x8000);
    assert_eq!(ideal_counts(VoltageRange::Unipolar10, 10.0), 0xffff);
  }
}
