//! Periodic calibration and read tasks
//!
//! Both tasks wait until the IOC accepts interrupts, then
//! loop until the stop flag is set. Each pass works on a
//! snapshot of the card registry and holds only one card
//! lock at a time.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::threading::{sleep_unless_stopped,
                       stop_requested,
                       ThreadControl};
use crate::registry::CardIdentity;
use crate::xy5320::Xy5320Driver;

pub const CAL_TASK_NAME  : &str = "xy5320Cal";
pub const READ_TASK_NAME : &str = "xy5320Read";

/// Poll period of the interrupt accept gate (20 Hz)
pub const READY_POLL : Duration = Duration::from_millis(50);

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPeriods {
  pub calibration : Duration,
  pub read        : Duration,
}

impl Default for TaskPeriods {
  fn default() -> Self {
    Self {
      calibration : Duration::from_secs(20*60),
      read        : Duration::from_millis(50),
    }
  }
}

fn set_flags(thread_control : &Arc<Mutex<ThreadControl>>, f : impl FnOnce(&mut ThreadControl)) {
  match thread_control.lock() {
    Ok(mut tc) => f(&mut tc),
    Err(err)   => error!("Can't acquire lock for ThreadControl! {err}"),
  }
}

/// Block until interrupts are accepted.
///
/// Returns false if the stop flag was set meanwhile
/// or the ThreadControl is unusable.
pub fn wait_for_interrupt_accept(thread_control : &Arc<Mutex<ThreadControl>>) -> bool {
  loop {
    match thread_control.lock() {
      Ok(tc) => {
        if tc.stop_flag {
          return false;
        }
        if tc.interrupts_accepted {
          return true;
        }
      }
      Err(err) => {
        error!("Can't acquire lock for ThreadControl! {err}");
        return false;
      }
    }
    thread::sleep(READY_POLL);
  }
}

pub fn calibration_task(driver         : Arc<Xy5320Driver>,
                        interval       : Duration,
                        thread_control : Arc<Mutex<ThreadControl>>) {
  if !wait_for_interrupt_accept(&thread_control) {
    return;
  }
  info!("Calibration task running, interval {:?}", interval);
  set_flags(&thread_control, |tc| tc.thread_calibration_active = true);
  loop {
    if stop_requested(&thread_control) {
      break;
    }
    set_flags(&thread_control, |tc| tc.calibration_active = true);
    for card in driver.cards() {
      match card.calibrate() {
        Err(err) => error!("Calibration of {} failed! {}", card.name(), err),
        Ok(_)    => debug!("Calibrated {}", card.name()),
      }
    }
    set_flags(&thread_control, |tc| tc.calibration_active = false);
    if !sleep_unless_stopped(&thread_control, interval) {
      break;
    }
  }
  set_flags(&thread_control, |tc| tc.thread_calibration_active = false);
  info!("Calibration task stopped");
}

pub fn read_task(driver         : Arc<Xy5320Driver>,
                 interval       : Duration,
                 thread_control : Arc<Mutex<ThreadControl>>) {
  if !wait_for_interrupt_accept(&thread_control) {
    return;
  }
  info!("Read task running, interval {:?}", interval);
  set_flags(&thread_control, |tc| tc.thread_read_active = true);
  loop {
    if stop_requested(&thread_control) {
      break;
    }
    for card in driver.cards() {
      match card.acquire() {
        Err(err)  => error!("Reading {} failed! {}", card.name(), err),
        Ok(false) => trace!("{} not calibrated yet", card.name()),
        Ok(true)  => (),
      }
    }
    if !sleep_unless_stopped(&thread_control, interval) {
      break;
    }
  }
  set_flags(&thread_control, |tc| tc.thread_read_active = false);
  info!("Read task stopped");
}
