//! Specific error types for the IP module drivers
//!
//! Each driver keeps its own error enum. The
//! `status()` method of the driver errors yields
//! the numeric status codes the old device support
//! layer expects (module number in the upper 16 bits).

use std::error::Error;
use std::fmt;

/// Module number of the IP470 driver in status codes
pub const M_IP470  : i32 = 600 << 16;
/// Module number of the IP-5320 driver in status codes
pub const M_XY5320 : i32 = 602 << 16;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RegisterError {
  MMapFail,
  OutOfRange,
  Unknown,
}

impl fmt::Display for RegisterError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp : &str;
    match self {
      RegisterError::MMapFail   => disp = "MMapFail",
      RegisterError::OutOfRange => disp = "OutOfRange",
      RegisterError::Unknown    => disp = "Unknown",
    }
    write!(f, "<RegisterError: {}>", disp)
  }
}

impl Error for RegisterError {
}

////////////////////////////////////////

/// Problems reported by the IP carrier
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CarrierError {
  /// No such carrier or slot
  BadAddress,
  /// Empty slot or unreadable ID PROM
  NoModule,
  /// The ID PROM does not carry the IPAC signature
  NoIpacId,
  /// A module is present, but it is not the expected one
  WrongModule,
  MapFailed,
  IntConnectFailed,
  IrqCmdFailed,
  NotSupported,
  Unknown,
}

impl CarrierError {
  pub fn to_string(&self) -> String {
    let spl : &str;
    match self {
      CarrierError::BadAddress       => spl = "BadAddress",
      CarrierError::NoModule         => spl = "NoModule",
      CarrierError::NoIpacId         => spl = "NoIpacId",
      CarrierError::WrongModule      => spl = "WrongModule",
      CarrierError::MapFailed        => spl = "MapFailed",
      CarrierError::IntConnectFailed => spl = "IntConnectFailed",
      CarrierError::IrqCmdFailed     => spl = "IrqCmdFailed",
      CarrierError::NotSupported     => spl = "NotSupported",
      CarrierError::Unknown          => spl = "Unknown",
    }
    spl.to_string()
  }
}

impl fmt::Display for CarrierError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<CarrierError: {}>", self.to_string())
  }
}

impl Error for CarrierError {
}

////////////////////////////////////////

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RegistryError {
  /// Either the name or the carrier/slot pair
  /// is already taken
  DuplicateDevice,
}

impl fmt::Display for RegistryError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      RegistryError::DuplicateDevice => write!(f, "<RegistryError: DuplicateDevice>")
    }
  }
}

impl Error for RegistryError {
}

////////////////////////////////////////

/// Errors of the Acromag IP470 digital I/O driver
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Ip470Error {
  DuplicateDevice,
  ModeError,
  IntHandlerError,
  IntConnectError,
  ValidateFailed,
  MallocFailed,
  PortError,
  BitError,
  ReadError,
  DataFlagError,
  CardNotFound,
  NoInterrupts,
  InvalidRecordType,
  VectorInvalid,
  EventRegInvalid,
  DebounceRegInvalid,
  WriteError,
}

impl Ip470Error {
  pub fn to_string(&self) -> String {
    let spl : &str;
    match self {
      Ip470Error::DuplicateDevice    => spl = "DuplicateDevice",
      Ip470Error::ModeError          => spl = "ModeError",
      Ip470Error::IntHandlerError    => spl = "IntHandlerError",
      Ip470Error::IntConnectError    => spl = "IntConnectError",
      Ip470Error::ValidateFailed     => spl = "ValidateFailed",
      Ip470Error::MallocFailed       => spl = "MallocFailed",
      Ip470Error::PortError          => spl = "PortError",
      Ip470Error::BitError           => spl = "BitError",
      Ip470Error::ReadError          => spl = "ReadError",
      Ip470Error::DataFlagError      => spl = "DataFlagError",
      Ip470Error::CardNotFound       => spl = "CardNotFound",
      Ip470Error::NoInterrupts       => spl = "NoInterrupts",
      Ip470Error::InvalidRecordType  => spl = "InvalidRecordType",
      Ip470Error::VectorInvalid      => spl = "VectorInvalid",
      Ip470Error::EventRegInvalid    => spl = "EventRegInvalid",
      Ip470Error::DebounceRegInvalid => spl = "DebounceRegInvalid",
      Ip470Error::WriteError         => spl = "WriteError",
    }
    spl.to_string()
  }

  /// The numeric status code (module number | error number)
  pub fn status(&self) -> i32 {
    let n = match self {
      Ip470Error::DuplicateDevice    => 1,
      Ip470Error::ModeError          => 2,
      Ip470Error::IntHandlerError    => 3,
      Ip470Error::IntConnectError    => 4,
      Ip470Error::ValidateFailed     => 5,
      Ip470Error::MallocFailed       => 6,
      Ip470Error::PortError          => 7,
      Ip470Error::BitError           => 8,
      Ip470Error::ReadError          => 9,
      Ip470Error::DataFlagError      => 10,
      Ip470Error::CardNotFound       => 11,
      Ip470Error::NoInterrupts       => 12,
      Ip470Error::InvalidRecordType  => 13,
      Ip470Error::VectorInvalid      => 14,
      Ip470Error::EventRegInvalid    => 15,
      Ip470Error::DebounceRegInvalid => 16,
      Ip470Error::WriteError         => 17,
    };
    M_IP470 | n
  }
}

impl fmt::Display for Ip470Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<Ip470Error: {}>", self.to_string())
  }
}

impl Error for Ip470Error {
}

impl From<RegistryError> for Ip470Error {
  fn from(_err : RegistryError) -> Self {
    Ip470Error::DuplicateDevice
  }
}

////////////////////////////////////////

/// Errors of the Xycom IP-5320 analog input driver
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Xy5320Error {
  DuplicateDevice,
  TooManyChannels,
  FileOpenFailed,
  FileFormatError,
  SemFailed,
  VoltRangeError,
  ModeError,
  NotValidated,
  MallocFailed,
  CardNotFound,
  InvalidChannel,
  InvalidGain,
  InvalidFieldType,
  NoChannels,
  TaskCreate,
  InvalidChannelIndex,
  NoSpace,
  ReadError,
  /// A channel shows up twice in the channel file
  DuplicateChannel,
}

impl Xy5320Error {
  pub fn to_string(&self) -> String {
    let spl : &str;
    match self {
      Xy5320Error::DuplicateDevice     => spl = "DuplicateDevice",
      Xy5320Error::TooManyChannels     => spl = "TooManyChannels",
      Xy5320Error::FileOpenFailed      => spl = "FileOpenFailed",
      Xy5320Error::FileFormatError     => spl = "FileFormatError",
      Xy5320Error::SemFailed           => spl = "SemFailed",
      Xy5320Error::VoltRangeError      => spl = "VoltRangeError",
      Xy5320Error::ModeError           => spl = "ModeError",
      Xy5320Error::NotValidated        => spl = "NotValidated",
      Xy5320Error::MallocFailed        => spl = "MallocFailed",
      Xy5320Error::CardNotFound        => spl = "CardNotFound",
      Xy5320Error::InvalidChannel      => spl = "InvalidChannel",
      Xy5320Error::InvalidGain         => spl = "InvalidGain",
      Xy5320Error::InvalidFieldType    => spl = "InvalidFieldType",
      Xy5320Error::NoChannels          => spl = "NoChannels",
      Xy5320Error::TaskCreate          => spl = "TaskCreate",
      Xy5320Error::InvalidChannelIndex => spl = "InvalidChannelIndex",
      Xy5320Error::NoSpace             => spl = "NoSpace",
      Xy5320Error::ReadError           => spl = "ReadError",
      Xy5320Error::DuplicateChannel    => spl = "DuplicateChannel",
    }
    spl.to_string()
  }

  /// The numeric status code (module number | error number)
  pub fn status(&self) -> i32 {
    let n = match self {
      Xy5320Error::DuplicateDevice     => 1,
      Xy5320Error::TooManyChannels     => 2,
      Xy5320Error::FileOpenFailed      => 3,
      Xy5320Error::FileFormatError     => 4,
      Xy5320Error::SemFailed           => 5,
      Xy5320Error::VoltRangeError      => 6,
      Xy5320Error::ModeError           => 7,
      Xy5320Error::NotValidated        => 8,
      Xy5320Error::MallocFailed        => 9,
      Xy5320Error::CardNotFound        => 10,
      Xy5320Error::InvalidChannel      => 11,
      Xy5320Error::InvalidGain         => 12,
      Xy5320Error::InvalidFieldType    => 13,
      Xy5320Error::NoChannels          => 14,
      Xy5320Error::TaskCreate          => 15,
      Xy5320Error::InvalidChannelIndex => 16,
      Xy5320Error::NoSpace             => 17,
      Xy5320Error::ReadError           => 18,
      Xy5320Error::DuplicateChannel    => 19,
    };
    M_XY5320 | n
  }
}

impl fmt::Display for Xy5320Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<Xy5320Error: {}>", self.to_string())
  }
}

impl Error for Xy5320Error {
}

impl From<RegistryError> for Xy5320Error {
  fn from(_err : RegistryError) -> Self {
    Xy5320Error::DuplicateDevice
  }
}

////////////////////////////////////////

/// The two point calibration can not be
/// applied to a channel
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CorrectionError {
  /// Calibration and auto-zero reading are
  /// identical, the slope is undefined
  DegenerateCalibration,
}

impl fmt::Display for CorrectionError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      CorrectionError::DegenerateCalibration => write!(f, "<CorrectionError: DegenerateCalibration>")
    }
  }
}

impl Error for CorrectionError {
}

////////////////////////////////////////

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TriggerError {
  DuplicateDevice,
  ValidateFailed,
  CardNotFound,
  /// The link does not name a function
  /// this card type supports
  BadParameter,
  BadLink,
}

impl fmt::Display for TriggerError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp : &str;
    match self {
      TriggerError::DuplicateDevice => disp = "DuplicateDevice",
      TriggerError::ValidateFailed  => disp = "ValidateFailed",
      TriggerError::CardNotFound    => disp = "CardNotFound",
      TriggerError::BadParameter    => disp = "BadParameter",
      TriggerError::BadLink         => disp = "BadLink",
    }
    write!(f, "<TriggerError: {}>", disp)
  }
}

impl Error for TriggerError {
}

impl From<RegistryError> for TriggerError {
  fn from(_err : RegistryError) -> Self {
    TriggerError::DuplicateDevice
  }
}

////////////////////////////////////////

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AddressError {
  MissingField,
  EmptyName,
  BadNumber,
  BadDataSize,
  TrailingGarbage,
}

impl fmt::Display for AddressError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp : &str;
    match self {
      AddressError::MissingField    => disp = "MissingField",
      AddressError::EmptyName       => disp = "EmptyName",
      AddressError::BadNumber       => disp = "BadNumber",
      AddressError::BadDataSize     => disp = "BadDataSize",
      AddressError::TrailingGarbage => disp = "TrailingGarbage",
    }
    write!(f, "<AddressError: {}>", disp)
  }
}

impl Error for AddressError {
}

////////////////////////////////////////

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SettingsError {
  FileNotReadable,
  TomlDecodingError,
  TomlEncodingError,
  JsonEncodingError,
}

impl fmt::Display for SettingsError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp : &str;
    match self {
      SettingsError::FileNotReadable   => disp = "FileNotReadable",
      SettingsError::TomlDecodingError => disp = "TomlDecodingError",
      SettingsError::TomlEncodingError => disp = "TomlEncodingError",
      SettingsError::JsonEncodingError => disp = "JsonEncodingError",
    }
    write!(f, "<SettingsError: {}>", disp)
  }
}

impl Error for SettingsError {
}
