//! IP470 register map and bank switching
//!
//! The 48 I/O lines are organized in 6 ports of 8 bits.
//! Each port register sits on an odd byte address. Port
//! registers 0-7 are multiplexed over 3 banks (enhanced
//! mode only), the active bank lives in the top two bits
//! of port 7:
//!
//! * bank 0 - port data (0-5), write mask (7)
//! * bank 1 - interrupt pending / clear (0-5), interrupt
//!            status and event sense polarity (6), event
//!            sense polarity (7, write only)
//! * bank 2 - debounce control (0), duration (1,2), clock (3)

use crate::memory::RegisterAccess;

pub const IP_MANUFACTURER_ACROMAG : u8 = 0xa3;
pub const IP_MODEL_ACROMAG_IP470  : u8 = 0x08;

/// Ports carrying I/O lines
pub const MAXPORTS : usize = 6;
/// Bits per port
pub const MAXBITS  : usize = 8;
/// I/O lines per card
pub const N_LINES  : usize = MAXPORTS * MAXBITS;

/// Interrupt status (bank 1)
pub const STATUS_PORT : usize = 6;
/// Bank select / mask / event sense
pub const BANK_PORT   : usize = 7;

/// Interrupt enable register
pub const IER : usize = 0x1f;
/// Interrupt vector register
pub const IVR : usize = 0x2f;

// bits of the interrupt enable register
pub const INTEN : u8 = 0x01;
pub const RESET : u8 = 0x02;

pub const BANK0 : u8 = 0;
pub const BANK1 : u8 = 1;
pub const BANK2 : u8 = 2;

/// Writing this sequence to port 7 switches
/// the board into enhanced mode
pub const ENHANCED_MODE_SEQUENCE : [u8;4] = [0x07, 0x0d, 0x06, 0x12];

/// Byte offset of port register `port` (0-7)
pub fn port_offset(port : usize) -> usize {
  2*port + 1
}

pub fn read_port(regs : &dyn RegisterAccess, port : usize) -> u8 {
  regs.read_u8(port_offset(port))
}

pub fn write_port(regs : &dyn RegisterAccess, port : usize, value : u8) {
  regs.write_u8(port_offset(port), value);
}

/// Switch the register bank, returns the bank
/// which was active before.
///
/// Nothing is written if the bank is already active.
/// When leaving bank 1, the low bits of port 7 hold
/// the event sense polarity, which can't be read back,
/// so the shadow value `ev_control_hi` is written
/// instead of what we read.
///
/// # Arguments
///
/// * regs          : register block of the card
/// * new_bank      : BANK0, BANK1 or BANK2
/// * ev_control_hi : shadow of the port 7 event
///                   sense polarity (bank 1)
pub fn select_bank(regs          : &dyn RegisterAccess,
                   new_bank      : u8,
                   ev_control_hi : u8) -> u8 {
  let mut bank_bits = read_port(regs, BANK_PORT);
  let old_bank      = (bank_bits & 0xc0) >> 6;
  if old_bank == new_bank {
    return old_bank;
  }
  if old_bank == BANK1 {
    bank_bits = ev_control_hi;
  }
  bank_bits = (bank_bits & 0x3f) | (new_bank << 6);
  write_port(regs, BANK_PORT, bank_bits);
  old_bank
}
