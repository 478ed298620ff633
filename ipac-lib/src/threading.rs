//! Thread control structures

use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Send runtime information
/// to threads via shared memory
/// (Arc(Mutex)
#[derive(Default, Debug)]
pub struct ThreadControl {
  /// Stop ALL threads
  pub stop_flag                : bool,
  /// The IOC is done with its initialization
  /// and accepts interrupts. The periodic tasks
  /// do not start before this is set.
  pub interrupts_accepted      : bool,
  /// A calibration sweep is running
  pub calibration_active       : bool,
  /// alive indicator for the calibration thread
  pub thread_calibration_active : bool,
  /// alive indicator for the read thread
  pub thread_read_active       : bool,
}

impl ThreadControl {
  pub fn new() -> Self {
    Self {
      stop_flag                 : false,
      interrupts_accepted       : false,
      calibration_active        : false,
      thread_calibration_active : false,
      thread_read_active        : false,
    }
  }
}

impl fmt::Display for ThreadControl {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<ThreadControl:");
    repr        += &(format!("\n  stop flag           : {}", self.stop_flag));
    repr        += &(format!("\n  interrupts accepted : {}", self.interrupts_accepted));
    repr        += &(format!("\n  calibration active  : {}", self.calibration_active));
    repr        += "\n    -- reported thread activity:";
    repr        += &(format!("\n  calibration         : {}", self.thread_calibration_active));
    repr        += &(format!("\n  read                : {}>", self.thread_read_active));
    write!(f, "{}", repr)
  }
}

/// Check the stop flag of a shared ThreadControl
pub fn stop_requested(thread_control : &Arc<Mutex<ThreadControl>>) -> bool {
  match thread_control.lock() {
    Ok(tc) => tc.stop_flag,
    Err(err) => {
      trace!("Can't acquire lock! {err}");
      false
    }
  }
}

/// Sleep for the given time, but wake up
/// early when the stop flag gets set.
///
/// Returns false if we got stopped.
pub fn sleep_unless_stopped(thread_control : &Arc<Mutex<ThreadControl>>,
                            duration       : Duration) -> bool {
  let tick  = Duration::from_millis(50);
  let start = Instant::now();
  loop {
    if stop_requested(thread_control) {
      return false;
    }
    let elapsed = start.elapsed();
    if elapsed >= duration {
      return true;
    }
    thread::sleep(tick.min(duration - elapsed));
  }
}
