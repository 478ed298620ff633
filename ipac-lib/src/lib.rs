//! Drivers for IndustryPack modules on VME carriers
//!
//! * `ip470`   - Acromag IP470 48 channel digital I/O with
//!               change-of-state and level interrupts
//! * `xy5320`  - Xycom IP-5320 analog input with periodic
//!               self calibration
//! * `trigger` - trigger outputs of the IP231 and IP330
//!
//! The carrier (VME bus access, interrupt plumbing) is
//! abstracted by the `Carrier` trait. `SimCarrier` together
//! with the board simulations in `ip470::sim` and
//! `xy5320::sim` allows to run everything without hardware.

pub mod address;
pub mod carrier;
pub mod errors;
pub mod ip470;
pub mod memory;
pub mod registry;
pub mod scan;
pub mod settings;
pub mod threading;
pub mod trigger;
pub mod xy5320;

pub use carrier::{Carrier,
                  SimCarrier,
                  Site,
                  UioCarrier};
pub use ip470::Ip470Driver;
pub use settings::IocSettings;
pub use threading::ThreadControl;
pub use trigger::TriggerDriver;
pub use xy5320::Xy5320Driver;

use std::io::Write;

use colored::{Colorize, ColoredString};
use log::Level;

#[macro_use] extern crate log;
extern crate env_logger;

pub const IPAC_IOC_LOGO : &str = "
      _                        _
     (_)_ __   __ _  ___      (_) ___   ___
     | | '_ \\ / _` |/ __|_____| |/ _ \\ / __|
     | | |_) | (_| | (_|_____| | (_) | (__
     |_| .__/ \\__,_|\\___|    |_|\\___/ \\___|
       |_|

     IndustryPack drivers - IP470, IP-5320, IP231/IP330
  ";

/// Make sure that the loglevel is in color, even though not using pretty_env logger
pub fn color_log(level : &Level) -> ColoredString {
  match level {
    Level::Error    => String::from(" ERROR!").red(),
    Level::Warn     => String::from(" WARN  ").yellow(),
    Level::Info     => String::from(" Info  ").green(),
    Level::Debug    => String::from(" debug ").blue(),
    Level::Trace    => String::from(" trace ").cyan(),
  }
}

/// Set up the environmental (env) logger
/// with our format
///
/// Ensure that the lines and module paths
/// are printed in the logging output
pub fn init_env_logger() {
  env_logger::builder()
    .format(|buf, record| {
    writeln!( buf, "[{level}][{module_path}:{line}] {args}",
      level = color_log(&record.level()),
      module_path = record.module_path().unwrap_or("<unknown>"),
      line = record.line().unwrap_or(0),
      args = record.args()
      )
    }).init();
}
