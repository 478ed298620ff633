//! IOC configuration
//!
//! Everything the startup script of the IOC would do -
//! which cards sit where, with what parameters, and the
//! periods of the analog input tasks - read from a single
//! toml file.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::carrier::{Site, UioSlot};
use crate::errors::SettingsError;
use crate::trigger::TriggerKind;
use crate::xy5320::tasks::TaskPeriods;
use crate::xy5320::{Resolution,
                    Trigger,
                    Xy5320Options};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierSettings {
  /// Run against simulated boards
  pub simulate   : bool,
  /// geometry of the simulated carriers
  pub n_carriers : u16,
  pub n_slots    : u16,
  /// UIO devices of the real carrier slots
  pub uio_slots  : Vec<UioSlot>,
}

impl CarrierSettings {
  pub fn new() -> Self {
    Self {
      simulate   : true,
      n_carriers : 1,
      n_slots    : 4,
      uio_slots  : Vec::<UioSlot>::new(),
    }
  }
}

impl Default for CarrierSettings {
  fn default() -> Self {
    Self::new()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ip470CardSettings {
  pub name        : String,
  pub carrier     : u16,
  pub slot        : u16,
  /// "STANDARD" or "ENHANCED"
  pub mode        : String,
  /// "COS" or "LEVEL", only used in ENHANCED mode
  pub int_handler : String,
  pub vector      : i32,
  /// event sense polarity for LEVEL interrupts
  pub event       : i32,
  pub debounce    : i32,
}

impl Ip470CardSettings {
  pub fn site(&self) -> Site {
    Site::new(self.carrier, self.slot)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Xy5320CardSettings {
  pub name             : String,
  pub carrier          : u16,
  pub slot             : u16,
  /// "-5TO5", "-10TO10" or "0TO10"
  pub range            : String,
  /// "DIF" or "SE"
  pub mode             : String,
  pub num_samples      : i32,
  /// channel/gain file. If not given, `channels`
  /// is used.
  pub channel_file     : Option<String>,
  /// (channel, gain)
  pub channels         : Vec<[i64;2]>,
  /// ADC resolution (12, 14 or 16)
  pub resolution_bits  : u8,
  pub external_trigger : bool,
}

impl Xy5320CardSettings {
  pub fn site(&self) -> Site {
    Site::new(self.carrier, self.slot)
  }

  pub fn channel_pairs(&self) -> Vec<(i64, i64)> {
    self.channels.iter().map(|c| (c[0], c[1])).collect()
  }

  pub fn options(&self) -> Xy5320Options {
    let resolution = match Resolution::from_bits(self.resolution_bits) {
      None => {
        warn!("{}: {} bit resolution not supported, using 12 bits!", self.name, self.resolution_bits);
        Resolution::Bits12
      }
      Some(r) => r
    };
    let trigger = if self.external_trigger { Trigger::External } else { Trigger::Software };
    Xy5320Options {
      trigger,
      resolution,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCardSettings {
  pub name    : String,
  pub carrier : u16,
  pub slot    : u16,
  pub kind    : TriggerKind,
  /// trigger register, if not the default
  pub offset  : Option<usize>,
  pub value   : Option<u16>,
}

impl TriggerCardSettings {
  pub fn site(&self) -> Site {
    Site::new(self.carrier, self.slot)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IocSettings {
  /// Period of the IP-5320 calibration sweeps
  pub cal_interval_sec    : u64,
  /// Period of the IP-5320 read sweeps
  pub read_interval_ms    : u64,
  /// Start the IP-5320 tasks
  pub start_tasks         : bool,
  /// Print a report of all cards every so often,
  /// 0 means never
  pub report_interval_sec : u64,
  pub carrier             : CarrierSettings,
  pub ip470               : Vec<Ip470CardSettings>,
  pub xy5320              : Vec<Xy5320CardSettings>,
  pub trigger             : Vec<TriggerCardSettings>,
}

impl IocSettings {
  pub fn new() -> Self {
    Self {
      cal_interval_sec    : 20*60,
      read_interval_ms    : 50,
      start_tasks         : true,
      report_interval_sec : 0,
      carrier             : CarrierSettings::new(),
      ip470               : vec![Ip470CardSettings {
        name        : String::from("DIO1"),
        carrier     : 0,
        slot        : 0,
        mode        : String::from("ENHANCED"),
        int_handler : String::from("COS"),
        vector      : 0x90,
        event       : 0,
        debounce    : 0,
      }],
      xy5320              : vec![Xy5320CardSettings {
        name             : String::from("AI1"),
        carrier          : 0,
        slot             : 1,
        range            : String::from("-10TO10"),
        mode             : String::from("DIF"),
        num_samples      : 16,
        channel_file     : None,
        channels         : vec![[0, 1], [1, 2]],
        resolution_bits  : 12,
        external_trigger : false,
      }],
      trigger             : vec![TriggerCardSettings {
        name    : String::from("TRG1"),
        carrier : 0,
        slot    : 2,
        kind    : TriggerKind::Ip330,
        offset  : None,
        value   : None,
      }],
    }
  }

  pub fn task_periods(&self) -> TaskPeriods {
    TaskPeriods {
      calibration : Duration::from_secs(self.cal_interval_sec),
      read        : Duration::from_millis(self.read_interval_ms),
    }
  }

  /// Write the settings to a toml file
  pub fn to_toml(&self, mut filename : String) -> Result<(), SettingsError> {
    if !filename.ends_with(".toml") {
      filename += ".toml";
    }
    info!("Will write to file {}!", filename);
    let toml_string = match toml::to_string_pretty(&self) {
      Err(err) => {
        error!("Unable to serialize toml! {err}");
        return Err(SettingsError::TomlEncodingError);
      }
      Ok(s) => s
    };
    match File::create(&filename) {
      Err(err) => {
        error!("Unable to open file {}! {}", filename, err);
        Err(SettingsError::FileNotReadable)
      }
      Ok(mut file) => {
        match file.write_all(toml_string.as_bytes()) {
          Err(err) => {
            error!("Unable to write to file {}! {}", filename, err);
            Err(SettingsError::FileNotReadable)
          }
          Ok(_) => {
            debug!("Wrote settings to {}!", filename);
            Ok(())
          }
        }
      }
    }
  }

  /// Write the settings to a json file
  pub fn to_json(&self, mut filename : String) -> Result<(), SettingsError> {
    if !filename.ends_with(".json") {
      filename += ".json";
    }
    info!("Will write to file {}!", filename);
    match File::create(&filename) {
      Err(err) => {
        error!("Unable to open file {}! {}", filename, err);
        Err(SettingsError::FileNotReadable)
      }
      Ok(file) => {
        match serde_json::to_writer_pretty(file, &self) {
          Err(err) => {
            error!("Unable to serialize json! {err}");
            Err(SettingsError::JsonEncodingError)
          }
          Ok(_) => {
            debug!("Wrote settings to {}!", filename);
            Ok(())
          }
        }
      }
    }
  }

  pub fn from_toml(filename : String) -> Result<IocSettings, SettingsError> {
    match File::open(&filename) {
      Err(err) => {
        error!("Unable to open {}! {}", filename, err);
        Err(SettingsError::FileNotReadable)
      }
      Ok(mut file) => {
        let mut toml_string = String::from("");
        match file.read_to_string(&mut toml_string) {
          Err(err) => {
            error!("Unable to read {}! {}", filename, err);
            Err(SettingsError::FileNotReadable)
          }
          Ok(_) => {
            match toml::from_str(&toml_string) {
              Err(err) => {
                error!("Can't interpret toml! {}", err);
                Err(SettingsError::TomlDecodingError)
              }
              Ok(settings) => Ok(settings)
            }
          }
        }
      }
    }
  }
}

impl fmt::Display for IocSettings {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp : String;
    match toml::to_string(self) {
      Err(err) => {
        error!("Serialization error! {err}");
        disp = String::from("-- SERIALIZATION ERROR! --");
      }
      Ok(_disp) => {
        disp = _disp;
      }
    }
    write!(f, "<IocSettings :\n{}>", disp)
  }
}

impl Default for IocSettings {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn toml_roundtrip() {
    let settings = IocSettings::new();
    let text     = toml::to_string(&settings).unwrap();
    let back : IocSettings = toml::from_str(&text).unwrap();
    assert_eq!(back, settings);
  }

  #[test]
  fn periods() {
    let mut settings = IocSettings::new();
    settings.read_interval_ms = 100;
    assert_eq!(settings.task_periods().read, Duration::from_millis(100));
    assert_eq!(settings.task_periods().calibration, Duration::from_secs(1200));
  }

  #[test]
  fn missing_file() {
    assert_eq!(IocSettings::from_toml(String::from("/nonexistent/ioc.toml")).unwrap_err(),
               SettingsError::FileNotReadable);
  }
}
