//! Bit addressing on the IP470
//!
//! The 48 lines are addressed as (port, bit). Reads and
//! writes come in four sizes - a single bit, a nibble,
//! a whole port or a 16 bit word. Nibbles and words may
//! start at any bit and then span up to 3 consecutive
//! ports, which are concatenated little endian (port n
//! in the lowest byte).
//!
//! The interrupt handlers map (port, bit) to the index
//! of the scan handle to notify. Change-of-state and
//! level interrupts use different formulas, both are
//! kept here side by side.

use std::fmt;
use std::str::FromStr;

use crate::errors::Ip470Error;
use crate::ip470::registers::{MAXBITS,
                              MAXPORTS};

/// Access granularity
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum DataSize {
  Bit    = 0,
  Nibble = 1,
  Port   = 2,
  Word   = 3,
}

impl DataSize {
  /// Map the legacy numeric data flag
  pub fn from_code(code : u8) -> Result<Self, Ip470Error> {
    match code {
      0 => Ok(DataSize::Bit),
      1 => Ok(DataSize::Nibble),
      2 => Ok(DataSize::Port),
      3 => Ok(DataSize::Word),
      _ => Err(Ip470Error::DataFlagError)
    }
  }

  /// Number of bits accessed
  pub fn width(&self) -> usize {
    match self {
      DataSize::Bit    => 1,
      DataSize::Nibble => 4,
      DataSize::Port   => 8,
      DataSize::Word   => 16,
    }
  }

  pub fn max_value(&self) -> u32 {
    (1u32 << self.width()) - 1
  }
}

impl FromStr for DataSize {
  type Err = Ip470Error;

  fn from_str(s : &str) -> Result<Self, Self::Err> {
    match s.trim().to_uppercase().as_str() {
      "BIT"    => Ok(DataSize::Bit),
      "NIBBLE" => Ok(DataSize::Nibble),
      "PORT"   => Ok(DataSize::Port),
      "WORD"   => Ok(DataSize::Word),
      _        => Err(Ip470Error::DataFlagError)
    }
  }
}

impl fmt::Display for DataSize {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp = match self {
      DataSize::Bit    => "BIT",
      DataSize::Nibble => "NIBBLE",
      DataSize::Port   => "PORT",
      DataSize::Word   => "WORD",
    };
    write!(f, "{}", disp)
  }
}

/// Port first, then bit
pub fn check_port_bit(port : usize, bit : usize) -> Result<(), Ip470Error> {
  if port >= MAXPORTS {
    return Err(Ip470Error::PortError);
  }
  if bit >= MAXBITS {
    return Err(Ip470Error::BitError);
  }
  Ok(())
}

/// Scan index of a change-of-state interrupt.
///
/// Each port owns 4 indices, bits 4-7 fold onto
/// the same indices as bits 0-3.
pub fn cos_bit_number(port : usize, bit : usize) -> usize {
  let mut n = (port << 2) + bit;
  if bit > 3 {
    n -= 4;
  }
  n
}

/// Scan index of a level interrupt (flat).
pub fn level_bit_number(port : usize, bit : usize) -> usize {
  port * MAXBITS + bit
}

/// The bit of the low event control byte which holds
/// the sense polarity of (port, bit).
///
/// Each port has two polarity bits, one for bits 0-3
/// and one for bits 4-7. The shadow is a single byte,
/// ports 4 and 5 fall off its end and yield 0.
pub fn event_mask_bit(port : usize, bit : usize) -> u8 {
  let mut mbit : u32 = 1 << (port << 1);
  if bit > 3 {
    mbit <<= 1;
  }
  (mbit & 0xff) as u8
}

/// Logical state reported for an interrupt on (port, bit)
pub fn interrupt_state(ev_control_lo : u8, port : usize, bit : usize) -> u8 {
  if ev_control_lo & event_mask_bit(port, bit) != 0 {
    1
  } else {
    0
  }
}

/// Concatenate up to 3 port bytes, the first one
/// ending up in the lowest byte
pub fn concat_ports(ports : &[u8]) -> u32 {
  ports.iter()
    .take(3)
    .enumerate()
    .fold(0u32, |acc, (i, p)| acc | (*p as u32) << (8*i))
}

/// Pull the value of the given size starting at `bit`
/// out of the concatenated port bytes
pub fn extract(concat : u32, bit : usize, size : DataSize) -> u16 {
  ((concat >> bit) & size.max_value()) as u16
}

/// The part of a multi-port write which lands in one port
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PortSlice {
  pub port : usize,
  /// bits of the port which get replaced
  pub mask : u8,
  /// new values of these bits (already in place)
  pub bits : u8,
}

impl PortSlice {
  pub fn apply(&self, old : u8) -> u8 {
    (old & !self.mask) | (self.bits & self.mask)
  }
}

/// Split a write of `nbits` bits of `value` starting at
/// (port, bit) into per-port pieces.
///
/// The first port takes `8 - bit` bits, every following
/// one up to 8, until all bits are placed or we run out
/// of ports. Bits of `value` beyond `nbits` are ignored,
/// so the bits outside of the span never change.
pub fn split_span(port  : usize,
                  bit   : usize,
                  value : u32,
                  nbits : usize) -> Vec<PortSlice> {
  let mut slices    = Vec::<PortSlice>::with_capacity(3);
  let nbits         = nbits.min(16);
  let mut remaining = nbits as i32;
  let mut zero_mask = ((1u32 << nbits) - 1) << bit;
  let mut uvalue    = (value & ((1u32 << nbits) - 1)) << bit;
  let mut bit       = bit;
  let mut port      = port;
  while remaining > 0 && port < MAXPORTS {
    slices.push(PortSlice {
      port,
      mask : (zero_mask & 0xff) as u8,
      bits : (uvalue & 0xff) as u8,
    });
    // value and mask are port aligned, every port
    // consumes a full byte of them
    remaining   -= (8 - bit) as i32;
    uvalue     >>= 8;
    zero_mask  >>= 8;
    bit          = 0;
    port        += 1;
  }
  slices
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cos_numbering_folds_high_nibble() {
    assert_eq!(cos_bit_number(2, 5), 9);
    assert_eq!(cos_bit_number(2, 1), 9);
    assert_eq!(cos_bit_number(0, 0), 0);
    assert_eq!(cos_bit_number(5, 7), 23);
  }

  #[test]
  fn level_numbering_is_flat() {
    assert_eq!(level_bit_number(2, 5), 21);
    assert_eq!(level_bit_number(3, 6), 30);
    assert_eq!(level_bit_number(5, 7), 47);
  }

  #[test]
  fn event_mask_bits() {
    assert_eq!(event_mask_bit(0, 0), 0x01);
    assert_eq!(event_mask_bit(0, 4), 0x02);
    assert_eq!(event_mask_bit(2, 5), 0x20);
    assert_eq!(event_mask_bit(3, 7), 0x80);
    assert_eq!(event_mask_bit(4, 0), 0x00);
    assert_eq!(interrupt_state(0xaa, 2, 5), 1);
    assert_eq!(interrupt_state(0xaa, 2, 1), 0);
  }

  #[test]
  fn concat_and_extract() {
    let c = concat_ports(&[0x21, 0x43, 0x65]);
    assert_eq!(c, 0x654321);
    assert_eq!(extract(c, 4, DataSize::Nibble), 0x2);
    assert_eq!(extract(c, 4, DataSize::Word), 0x5432);
    assert_eq!(extract(c, 0, DataSize::Bit), 1);
  }

  #[test]
  fn word_span_across_three_ports() {
    let slices = split_span(1, 4, 0xabcd, 16);
    assert_eq!(slices.len(), 3);
    assert_eq!(slices[0], PortSlice { port : 1, mask : 0xf0, bits : 0xd0 });
    assert_eq!(slices[1], PortSlice { port : 2, mask : 0xff, bits : 0xbc });
    assert_eq!(slices[2], PortSlice { port : 3, mask : 0x0f, bits : 0x0a });
  }

  #[test]
  fn span_stops_at_last_port() {
    let slices = split_span(5, 0, 0xffff, 16);
    assert_eq!(slices.len(), 1);
    assert_eq!(slices[0].port, 5);
  }

  #[test]
  fn excess_value_bits_are_dropped() {
    let slices = split_span(0, 2, 0xff, 4);
    assert_eq!(slices, vec![PortSlice { port : 0, mask : 0x3c, bits : 0x3c }]);
    assert_eq!(slices[0].apply(0x81), 0xbd);
  }

  #[test]
  fn data_size_names() {
    assert_eq!("nibble".parse::<DataSize>(), Ok(DataSize::Nibble));
    assert_eq!(DataSize::from_code(4), Err(Ip470Error::DataFlagError));
    assert_eq!(DataSize::Word.max_value(), 0xffff);
  }
}
