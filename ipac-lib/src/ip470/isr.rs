//! IP470 interrupt service routines
//!
//! Both routines run in interrupt context. They do not
//! block, allocate or log. The only exclusion against
//! a second interrupt of the same card is masking the
//! carrier interrupt line while they run.
//!
//! The change-of-state and level routines differ in
//! more than the index formula (status and pending
//! bytes are re-read differently, the level routine
//! toggles the board interrupt enable), so they are
//! kept as two separate code paths.

use crate::carrier::{Carrier, IrqCmd};
use crate::ip470::Ip470Card;
use crate::ip470::addressing::{cos_bit_number,
                               interrupt_state,
                               level_bit_number};
use crate::ip470::registers::*;

/// Change-of-state interrupt
pub fn cos_isr(card : &Ip470Card, carrier : &dyn Carrier) {
  let regs  = card.regs.as_ref();
  let ev_hi = card.config.ev_control[1];

  card.irq(carrier, IrqCmd::Disable);
  let saved_bank = select_bank(regs, BANK1, ev_hi);

  for port in 0..MAXPORTS {
    let status = read_port(regs, STATUS_PORT);
    if status & (1 << port) == 0 {
      continue;
    }
    for bit in 0..MAXBITS {
      let pending = read_port(regs, port);
      if pending & (1 << bit) == 0 {
        continue;
      }
      // clear (and disable) this bit
      write_port(regs, port, !(1u8 << bit));
      let index = cos_bit_number(port, bit);
      let state = interrupt_state(card.config.ev_control[0], port, bit);
      card.record_interrupt(index, state, port, bit);
    }
    // enable all sense inputs of the port again
    write_port(regs, port, 0xff);
  }

  select_bank(regs, saved_bank, ev_hi);
  card.irq(carrier, IrqCmd::Enable);
}

/// Level interrupt
pub fn level_isr(card : &Ip470Card, carrier : &dyn Carrier) {
  let regs  = card.regs.as_ref();
  let ev_hi = card.config.ev_control[1];

  card.irq(carrier, IrqCmd::Disable);
  regs.write_u8(IER, 0x00);
  let saved_bank = select_bank(regs, BANK1, ev_hi);

  let status = read_port(regs, STATUS_PORT);
  for port in 0..MAXPORTS {
    if status & (1 << port) == 0 {
      continue;
    }
    let pending = read_port(regs, port);
    for bit in 0..MAXBITS {
      if pending & (1 << bit) == 0 {
        continue;
      }
      write_port(regs, port, !(1u8 << bit));
      let index = level_bit_number(port, bit);
      let state = interrupt_state(card.config.ev_control[0], port, bit);
      card.record_interrupt(index, state, port, bit);
    }
    write_port(regs, port, 0xff);
  }

  select_bank(regs, saved_bank, ev_hi);
  card.irq(carrier, IrqCmd::Enable);
  regs.write_u8(IER, INTEN);
}
