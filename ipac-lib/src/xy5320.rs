//! Xycom IP-5320 analog input
//!
//! 20 differential or 40 single ended inputs behind a
//! programmable gain amplifier and a single ADC. The
//! board carries its own calibration references, which
//! are used for a two point (auto-zero and calibration
//! voltage) correction of every configured channel.
//!
//! Two periodic tasks (see `tasks`) keep the readings
//! current: a calibration sweep every 20 minutes and a
//! read sweep at 20 Hz. All buffers of a card are behind
//! a per-card mutex.

pub mod channels;
pub mod correction;
pub mod registers;
pub mod sim;
pub mod tasks;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc,
                Mutex,
                MutexGuard,
                RwLock};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::carrier::{Carrier, Site};
use crate::errors::Xy5320Error;
use crate::memory::{IdProm, RegisterAccess};
use crate::registry::{CardIdentity, Registry};
use crate::threading::ThreadControl;

use correction::{correct_channel, Correction};
use registers::*;
use tasks::TaskPeriods;

/// Highest number of samples which can be averaged
pub const MAX_SAMPLES : i32 = 256;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoltageRange {
  /// -5 to 5 V
  Bipolar5,
  /// -10 to 10 V
  Bipolar10,
  /// 0 to 10 V
  Unipolar10,
}

impl FromStr for VoltageRange {
  type Err = Xy5320Error;

  fn from_str(s : &str) -> Result<Self, Self::Err> {
    match s {
      "-5TO5"   => Ok(VoltageRange::Bipolar5),
      "-10TO10" => Ok(VoltageRange::Bipolar10),
      "0TO10"   => Ok(VoltageRange::Unipolar10),
      _         => Err(Xy5320Error::VoltRangeError)
    }
  }
}

impl fmt::Display for VoltageRange {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp = match self {
      VoltageRange::Bipolar5   => "-5TO5",
      VoltageRange::Bipolar10  => "-10TO10",
      VoltageRange::Unipolar10 => "0TO10",
    };
    write!(f, "{}", disp)
  }
}

/// How the inputs are wired
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputMode {
  Differential,
  SingleEnded,
}

impl InputMode {
  pub fn max_channels(&self) -> usize {
    match self {
      InputMode::Differential => MAX_DIF_CHANNELS,
      InputMode::SingleEnded  => MAX_SE_CHANNELS,
    }
  }
}

impl FromStr for InputMode {
  type Err = Xy5320Error;

  fn from_str(s : &str) -> Result<Self, Self::Err> {
    match s {
      "DIF" => Ok(InputMode::Differential),
      "SE"  => Ok(InputMode::SingleEnded),
      _     => Err(Xy5320Error::ModeError)
    }
  }
}

impl fmt::Display for InputMode {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      InputMode::Differential => write!(f, "DIF"),
      InputMode::SingleEnded  => write!(f, "SE"),
    }
  }
}

/// What a channel sweep is reading. The calibration
/// task switches a card temporarily into the auto-zero
/// and calibration modes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SweepMode {
  Dif,
  Se,
  AutoZero,
  Calibration,
}

impl From<InputMode> for SweepMode {
  fn from(mode : InputMode) -> Self {
    match mode {
      InputMode::Differential => SweepMode::Dif,
      InputMode::SingleEnded  => SweepMode::Se,
    }
  }
}

impl fmt::Display for SweepMode {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp = match self {
      SweepMode::Dif         => "DIF",
      SweepMode::Se          => "SE",
      SweepMode::AutoZero    => "AZV",
      SweepMode::Calibration => "CAL",
    };
    write!(f, "{}", disp)
  }
}

/// Programmable gain
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gain {
  X1,
  X2,
  X4,
  X8,
}

impl Gain {
  pub fn from_value(value : i64) -> Result<Self, Xy5320Error> {
    match value {
      1 => Ok(Gain::X1),
      2 => Ok(Gain::X2),
      4 => Ok(Gain::X4),
      8 => Ok(Gain::X8),
      _ => Err(Xy5320Error::InvalidGain)
    }
  }

  pub fn factor(&self) -> u16 {
    match self {
      Gain::X1 => 1,
      Gain::X2 => 2,
      Gain::X4 => 4,
      Gain::X8 => 8,
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
  /// Conversions are started by writing
  /// the start register
  Software,
  /// Wait for the external trigger
  External,
}

/// ADC resolution. The data is left aligned
/// in the 16bit data register.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
  Bits12,
  Bits14,
  Bits16,
}

impl Resolution {
  pub fn from_bits(bits : u8) -> Option<Self> {
    match bits {
      12 => Some(Resolution::Bits12),
      14 => Some(Resolution::Bits14),
      16 => Some(Resolution::Bits16),
      _  => None
    }
  }

  pub fn data_mask(&self) -> u16 {
    match self {
      Resolution::Bits12 => BIT12_MASK,
      Resolution::Bits14 => BIT14_MASK,
      Resolution::Bits16 => BIT16_MASK,
    }
  }

  pub fn bit_constant(&self) -> f64 {
    match self {
      Resolution::Bits12 => CON12,
      Resolution::Bits14 => CON14,
      Resolution::Bits16 => CON16,
    }
  }
}

/// Type of the value field of the reading record
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldType {
  /// corrected ADC counts
  Long,
  /// volts
  Double,
}

impl FromStr for FieldType {
  type Err = Xy5320Error;

  fn from_str(s : &str) -> Result<Self, Self::Err> {
    match s.trim().to_uppercase().as_str() {
      "LONG"   => Ok(FieldType::Long),
      "DOUBLE" => Ok(FieldType::Double),
      _        => Err(Xy5320Error::InvalidFieldType)
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ChannelValue {
  Long(i64),
  Double(f64),
}

/// Readout of consecutive channels, laid out as
/// `[n, channel numbers (n), values (n)]`
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
  Long(Vec<i64>),
  Double(Vec<f64>),
}

impl Waveform {
  pub fn len(&self) -> usize {
    match self {
      Waveform::Long(v)   => v.len(),
      Waveform::Double(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGain {
  pub channel : u8,
  pub gain    : Gain,
}

/// Less common settings of a card
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Xy5320Options {
  pub trigger    : Trigger,
  pub resolution : Resolution,
}

impl Default for Xy5320Options {
  fn default() -> Self {
    Self {
      trigger    : Trigger::Software,
      resolution : Resolution::Bits12,
    }
  }
}

/// Everything the card mutex protects
#[derive(Debug, Clone)]
pub struct AnalogData {
  pub mode             : SweepMode,
  pub raw              : Vec<u16>,
  pub auto_zero        : Vec<u16>,
  pub calibration      : Vec<u16>,
  pub corrected        : Vec<i64>,
  pub analog           : Vec<f64>,
  /// set after the first calibration sweep
  pub calibrated       : bool,
  pub last_calibration : Option<DateTime<Utc>>,
  pub n_sweeps         : u64,
  /// channel corrections skipped since calibration
  /// and auto-zero reading agreed
  pub n_degenerate     : u64,
}

impl AnalogData {
  pub fn new(mode : SweepMode, n_channels : usize) -> Self {
    Self {
      mode,
      raw              : vec![0;n_channels],
      auto_zero        : vec![0;n_channels],
      calibration      : vec![0;n_channels],
      corrected        : vec![0;n_channels],
      analog           : vec![0.0;n_channels],
      calibrated       : false,
      last_calibration : None,
      n_sweeps         : 0,
      n_degenerate     : 0,
    }
  }

  fn buffer(&mut self) -> &mut Vec<u16> {
    match self.mode {
      SweepMode::Dif | SweepMode::Se => &mut self.raw,
      SweepMode::AutoZero            => &mut self.auto_zero,
      SweepMode::Calibration         => &mut self.calibration,
    }
  }
}

/// One IP-5320 board
pub struct Xy5320Card {
  name       : String,
  site       : Site,
  regs       : Arc<dyn RegisterAccess>,
  range      : VoltageRange,
  input_mode : InputMode,
  options    : Xy5320Options,
  average    : usize,
  channels   : Vec<ChannelGain>,
  data       : Mutex<AnalogData>,
}

impl CardIdentity for Xy5320Card {
  fn name(&self) -> &str {
    &self.name
  }

  fn site(&self) -> Site {
    self.site
  }
}

impl Xy5320Card {

  pub fn new(name       : &str,
             site       : Site,
             regs       : Arc<dyn RegisterAccess>,
             range      : VoltageRange,
             input_mode : InputMode,
             average    : usize,
             channels   : Vec<ChannelGain>,
             options    : Xy5320Options) -> Self {
    let data = AnalogData::new(SweepMode::from(input_mode), channels.len());
    Self {
      name       : String::from(name),
      site,
      regs,
      range,
      input_mode,
      options,
      average,
      channels,
      data       : Mutex::new(data),
    }
  }

  pub fn range(&self) -> VoltageRange {
    self.range
  }

  pub fn input_mode(&self) -> InputMode {
    self.input_mode
  }

  pub fn average(&self) -> usize {
    self.average
  }

  pub fn channels(&self) -> &[ChannelGain] {
    &self.channels
  }

  pub fn num_channels(&self) -> usize {
    self.channels.len()
  }

  /// Index of the channel in the configuration
  pub fn find_channel(&self, channel : i32) -> Option<usize> {
    self.channels.iter().position(|c| c.channel as i32 == channel)
  }

  /// Take the card mutex (blocks)
  pub fn lock(&self) -> Result<MutexGuard<'_, AnalogData>, Xy5320Error> {
    match self.data.lock() {
      Err(err) => {
        error!("{}: card lock poisoned! {err}", self.name);
        Err(Xy5320Error::SemFailed)
      }
      Ok(d) => Ok(d)
    }
  }

  fn control_word(&self, mode : SweepMode, index : usize) -> u16 {
    build_control(self.range, mode, &self.channels[index])
  }

  /// Sweep all channels in the current mode of `data`
  ///
  /// The control word of the next channel is prepared
  /// while the current one settles and written once the
  /// current channel is averaged.
  pub fn read_inputs(&self, data : &mut AnalogData) {
    let n_channels = self.channels.len();
    if n_channels == 0 {
      return;
    }
    let regs  = self.regs.as_ref();
    let mode  = data.mode;
    let mask  = self.options.resolution.data_mask();
    let buf   = data.buffer();
    regs.write_u16(CNTL_REG, self.control_word(mode, 0));
    for j in 0..n_channels {
      let next = if j + 1 < n_channels {
        Some(self.control_word(mode, j + 1))
      } else {
        None
      };
      if regs.read_u16(CNTL_REG) & CTRIG != 0 {
        // stale conversion, reading clears the flag
        buf[j] = regs.read_u16(AI_REG);
      }
      let mut sum = 0.0f64;
      for _ in 0..self.average {
        match self.options.trigger {
          Trigger::External => {
            while regs.read_u16(CNTL_REG) & CTRIG == 0 {
              std::hint::spin_loop();
            }
          }
          Trigger::Software => regs.write_u16(STRT_REG, READ_TRIGGER),
        }
        sum += (regs.read_u16(AI_REG) & mask) as f64;
      }
      buf[j] = (sum / self.average as f64) as u16;
      if let Some(control) = next {
        regs.write_u16(CNTL_REG, control);
      }
    }
    data.n_sweeps += 1;
  }

  /// Apply the two point calibration to the raw buffer
  pub fn correct_inputs(&self, data : &mut AnalogData) {
    let k = self.options.resolution.bit_constant();
    for (i, entry) in self.channels.iter().enumerate() {
      let point = Correction::ideal(self.range, entry.gain);
      match correct_channel(&point, entry.gain, k, data.raw[i], data.auto_zero[i], data.calibration[i]) {
        Err(err) => {
          warn!("{}: channel {} not corrected (auto-zero {:#06x}, cal {:#06x})! {}",
                self.name, entry.channel, data.auto_zero[i], data.calibration[i], err);
          data.n_degenerate += 1;
        }
        Ok((counts, volts)) => {
          data.corrected[i] = counts;
          data.analog[i]    = volts;
        }
      }
    }
  }

  /// Auto-zero and calibration sweep
  pub fn calibrate(&self) -> Result<(), Xy5320Error> {
    let mut data = self.lock()?;
    let saved    = data.mode;
    data.mode    = SweepMode::AutoZero;
    self.read_inputs(&mut data);
    data.mode    = SweepMode::Calibration;
    self.read_inputs(&mut data);
    data.calibrated       = true;
    data.last_calibration = Some(Utc::now());
    data.mode             = saved;
    Ok(())
  }

  /// Read and correct all channels. Does nothing
  /// before the first calibration.
  ///
  /// Returns true if the inputs were read.
  pub fn acquire(&self) -> Result<bool, Xy5320Error> {
    let mut data = self.lock()?;
    if !data.calibrated {
      return Ok(false);
    }
    self.read_inputs(&mut data);
    self.correct_inputs(&mut data);
    Ok(true)
  }

  pub fn report(&self) -> String {
    let regs     = self.regs.as_ref();
    let mut repr = format!("<Xy5320Card {} at {}, range {}, {} mode, {} samples",
                           self.name, self.site, self.range, self.input_mode, self.average);
    repr += &(format!("\n  control register : {:#06x}", regs.read_u16(CNTL_REG)));
    repr += &(format!("\n  {}", IdProm::read(regs)));
    match self.lock() {
      Err(_)   => repr += "\n  -- buffers not accessible",
      Ok(data) => {
        match data.last_calibration {
          None     => repr += "\n  not calibrated",
          Some(ts) => repr += &(format!("\n  calibrated       : {}", ts)),
        }
        repr += &(format!("\n  sweeps           : {}", data.n_sweeps));
        for (i, entry) in self.channels.iter().enumerate() {
          repr += &(format!("\n  chan {:2} : raw {:#06x} auto-zero {:#06x} cal {:#06x} corrected {:#x} analog {:+.6}",
                            entry.channel, data.raw[i], data.auto_zero[i], data.calibration[i],
                            data.corrected[i], data.analog[i]));
        }
      }
    }
    repr += ">";
    repr
  }
}

/// All IP-5320 cards of this IOC
pub struct Xy5320Driver {
  carrier : Arc<dyn Carrier>,
  cards   : RwLock<Registry<Xy5320Card>>,
}

impl Xy5320Driver {

  pub fn new(carrier : Arc<dyn Carrier>) -> Self {
    Self {
      carrier,
      cards   : RwLock::new(Registry::new()),
    }
  }

  /// Create a card with the channels listed in a file
  ///
  /// # Arguments
  ///
  /// * name        : unique card name
  /// * site        : carrier and slot
  /// * range       : "-5TO5", "-10TO10" or "0TO10"
  /// * mode        : "DIF" or "SE"
  /// * num_samples : samples averaged per reading (1-256)
  /// * filename    : channel/gain file
  pub fn create<P : AsRef<Path>>(&self,
                                 name        : &str,
                                 site        : Site,
                                 range       : &str,
                                 mode        : &str,
                                 num_samples : i32,
                                 filename    : P) -> Result<(), Xy5320Error> {
    self.create_with_options(name, site, range, mode, num_samples, ChannelSource::File(filename.as_ref()), Xy5320Options::default())
  }

  /// Create a card with an explicit channel list
  pub fn create_with_channels(&self,
                              name        : &str,
                              site        : Site,
                              range       : &str,
                              mode        : &str,
                              num_samples : i32,
                              channels    : &[(i64, i64)]) -> Result<(), Xy5320Error> {
    self.create_with_options(name, site, range, mode, num_samples, ChannelSource::List(channels), Xy5320Options::default())
  }

  pub fn create_with_options(&self,
                             name        : &str,
                             site        : Site,
                             range       : &str,
                             mode        : &str,
                             num_samples : i32,
                             source      : ChannelSource,
                             options     : Xy5320Options) -> Result<(), Xy5320Error> {
    let range = match range.parse::<VoltageRange>() {
      Err(err) => {
        error!("{}: invalid voltage range {}!", name, range);
        return Err(err);
      }
      Ok(r) => r
    };
    let input_mode = match mode.parse::<InputMode>() {
      Err(err) => {
        error!("{}: invalid mode {}!", name, mode);
        return Err(err);
      }
      Ok(m) => m
    };
    let average = clamp_samples(name, num_samples);
    match self.carrier.validate(site, IP_MANUFACTURER_XYCOM, IP_MODEL_XYCOM_5320) {
      Err(err) => {
        error!("{}: no IP-5320 at {}! {}", name, site, err);
        return Err(Xy5320Error::NotValidated);
      }
      Ok(_) => ()
    }
    match self.cards.read() {
      Err(_)    => return Err(Xy5320Error::MallocFailed),
      Ok(cards) => cards.check_unique(name, site)?
    }
    let channels = match source {
      ChannelSource::File(path) => channels::read_channel_file(path, input_mode)?,
      ChannelSource::List(list) => channels::check_channels(list, input_mode)?,
    };
    let regs = match self.carrier.base_addr(site) {
      Err(err) => {
        error!("{}: can't get the register block at {}! {}", name, site, err);
        return Err(Xy5320Error::NotValidated);
      }
      Ok(r) => r
    };
    let n_channels = channels.len();
    let card = Xy5320Card::new(name, site, regs, range, input_mode, average, channels, options);
    match self.cards.write() {
      Err(_)        => return Err(Xy5320Error::MallocFailed),
      Ok(mut cards) => {
        cards.insert(card)?;
      }
    }
    info!("Created IP-5320 {} at {} (range {}, {}, {} channels, {} samples)",
          name, site, range, input_mode, n_channels, average);
    Ok(())
  }

  pub fn find_card(&self, name : &str) -> Option<Arc<Xy5320Card>> {
    match self.cards.read() {
      Err(_)    => None,
      Ok(cards) => cards.find_by_name(name)
    }
  }

  fn card(&self, name : &str) -> Result<Arc<Xy5320Card>, Xy5320Error> {
    match self.find_card(name) {
      None => {
        error!("Card {} not found!", name);
        Err(Xy5320Error::CardNotFound)
      }
      Some(c) => Ok(c)
    }
  }

  /// The cards in creation order
  pub fn cards(&self) -> Vec<Arc<Xy5320Card>> {
    match self.cards.read() {
      Err(_)    => Vec::new(),
      Ok(cards) => cards.snapshot()
    }
  }

  pub fn names(&self) -> Vec<String> {
    match self.cards.read() {
      Err(_)    => Vec::new(),
      Ok(cards) => cards.names()
    }
  }

  pub fn num_channels(&self, name : &str) -> Result<usize, Xy5320Error> {
    Ok(self.card(name)?.num_channels())
  }

  pub fn find_channel(&self, name : &str, channel : i32) -> Result<usize, Xy5320Error> {
    self.card(name)?.find_channel(channel).ok_or(Xy5320Error::InvalidChannel)
  }

  /// Latest corrected reading of a channel
  pub fn read_channel(&self,
                      name    : &str,
                      channel : i32,
                      ftvl    : FieldType) -> Result<ChannelValue, Xy5320Error> {
    let card  = self.card(name)?;
    let index = match card.find_channel(channel) {
      None => {
        error!("{}: channel {} not configured!", name, channel);
        return Err(Xy5320Error::InvalidChannel);
      }
      Some(i) => i
    };
    let data = card.lock()?;
    match ftvl {
      FieldType::Long   => Ok(ChannelValue::Long(data.corrected[index])),
      FieldType::Double => Ok(ChannelValue::Double(data.analog[index])),
    }
  }

  /// Latest readings of consecutive configured channels
  ///
  /// # Arguments
  ///
  /// * start_index : index into the channel configuration
  /// * space       : number of elements the caller can take,
  ///                 at most (space-1)/2 channels are returned
  pub fn read_array(&self,
                    name        : &str,
                    start_index : i32,
                    space       : i32,
                    ftvl        : FieldType) -> Result<Waveform, Xy5320Error> {
    let card       = self.card(name)?;
    let n_channels = card.num_channels() as i32;
    if start_index < 0 || start_index > n_channels - 1 {
      error!("{}: invalid channel index {}!", name, start_index);
      return Err(Xy5320Error::InvalidChannelIndex);
    }
    if space <= 0 {
      error!("{}: no space for array values!", name);
      return Err(Xy5320Error::NoSpace);
    }
    let n_read = ((space - 1) / 2).min(n_channels - start_index) as usize;
    let start  = start_index as usize;
    let chans  = card.channels[start..start + n_read].iter().map(|c| c.channel);
    let data   = card.lock()?;
    match ftvl {
      FieldType::Long => {
        let mut wf = Vec::<i64>::with_capacity(2*n_read + 1);
        wf.push(n_read as i64);
        wf.extend(chans.map(|c| c as i64));
        wf.extend_from_slice(&data.corrected[start..start + n_read]);
        Ok(Waveform::Long(wf))
      }
      FieldType::Double => {
        let mut wf = Vec::<f64>::with_capacity(2*n_read + 1);
        wf.push(n_read as f64);
        wf.extend(chans.map(|c| c as f64));
        wf.extend_from_slice(&data.analog[start..start + n_read]);
        Ok(Waveform::Double(wf))
      }
    }
  }

  /// Run a calibration sweep on one card now
  pub fn calibrate(&self, name : &str) -> Result<(), Xy5320Error> {
    self.card(name)?.calibrate()
  }

  /// Run a read sweep on one card now
  pub fn acquire(&self, name : &str) -> Result<bool, Xy5320Error> {
    self.card(name)?.acquire()
  }

  /// Start the calibration and read tasks (once
  /// there is at least one card)
  pub fn initialise(self           : &Arc<Self>,
                    periods        : TaskPeriods,
                    thread_control : Arc<Mutex<ThreadControl>>)
    -> Result<Vec<JoinHandle<()>>, Xy5320Error> {
    if self.cards().is_empty() {
      debug!("No IP-5320 cards, not starting any tasks");
      return Ok(Vec::new());
    }
    let mut handles = Vec::<JoinHandle<()>>::new();
    let cal_driver  = Arc::clone(self);
    let cal_tc      = Arc::clone(&thread_control);
    match std::thread::Builder::new()
      .name(String::from(tasks::CAL_TASK_NAME))
      .spawn(move || tasks::calibration_task(cal_driver, periods.calibration, cal_tc)) {
      Err(err) => {
        error!("Failed to create the calibration task! {err}");
        return Err(Xy5320Error::TaskCreate);
      }
      Ok(h) => handles.push(h)
    }
    let read_driver = Arc::clone(self);
    let read_tc     = Arc::clone(&thread_control);
    match std::thread::Builder::new()
      .name(String::from(tasks::READ_TASK_NAME))
      .spawn(move || tasks::read_task(read_driver, periods.read, read_tc)) {
      Err(err) => {
        error!("Failed to create the read task! {err}");
        return Err(Xy5320Error::TaskCreate);
      }
      Ok(h) => handles.push(h)
    }
    Ok(handles)
  }

  pub fn report(&self) -> String {
    let mut repr = String::new();
    for card in self.cards() {
      repr += &card.report();
      repr += "\n";
    }
    repr
  }

  /// Forget all cards
  pub fn shutdown(&self) {
    if let Ok(mut cards) = self.cards.write() {
      cards.clear();
    }
  }
}

/// Where the channel configuration of a new card comes from
pub enum ChannelSource<'a> {
  File(&'a Path),
  /// (channel, gain) pairs
  List(&'a [(i64, i64)]),
}

fn clamp_samples(name : &str, num_samples : i32) -> usize {
  if num_samples < 1 {
    warn!("{}: {} samples requested, using 1", name, num_samples);
    return 1;
  }
  if num_samples > MAX_SAMPLES {
    warn!("{}: {} samples requested, using {}", name, num_samples, MAX_SAMPLES);
    return MAX_SAMPLES as usize;
  }
  num_samples as usize
}
