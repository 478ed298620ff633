//! Channel configuration files
//!
//! One channel per line, channel number first, then the
//! gain, separated by blanks or a comma:
//!
//! ```text
//! # chan  gain
//!   0     1
//!   1,    8
//! ```
//!
//! Blank lines and lines starting with `#` are skipped,
//! anything after the gain is ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::Xy5320Error;
use crate::xy5320::{ChannelGain,
                    Gain,
                    InputMode};

/// Split off a decimal number with an optional sign
fn take_number(s : &str) -> Option<(i64, &str)> {
  let digits_start = if s.starts_with('-') || s.starts_with('+') { 1 } else { 0 };
  let digits_end   = s[digits_start..]
    .find(|c : char| !c.is_ascii_digit())
    .map(|i| i + digits_start)
    .unwrap_or(s.len());
  if digits_end == digits_start {
    return None;
  }
  match s[..digits_end].parse::<i64>() {
    Err(_) => None,
    Ok(v)  => Some((v, &s[digits_end..]))
  }
}

/// Parse a single line. Returns None for
/// blank and comment lines.
pub fn parse_line(line : &str) -> Result<Option<(i64, i64)>, Xy5320Error> {
  let line = line.trim();
  if line.is_empty() || line.starts_with('#') {
    return Ok(None);
  }
  let (channel, rest) = take_number(line).ok_or(Xy5320Error::FileFormatError)?;
  let delim = rest.len() - rest.trim_start_matches(|c : char| c.is_whitespace() || c == ',').len();
  if delim == 0 {
    return Err(Xy5320Error::FileFormatError);
  }
  // whatever follows the gain is ignored
  let (gain, _) = take_number(&rest[delim..]).ok_or(Xy5320Error::FileFormatError)?;
  Ok(Some((channel, gain)))
}

/// Validate a list of (channel, gain) pairs for the given mode
pub fn check_channels(pairs : &[(i64, i64)],
                      mode  : InputMode) -> Result<Vec<ChannelGain>, Xy5320Error> {
  let max_channels = mode.max_channels();
  let mut channels = Vec::<ChannelGain>::with_capacity(pairs.len());
  for (channel, gain) in pairs {
    if channels.len() > max_channels - 1 {
      error!("Too many channels, only {} in {} mode!", max_channels, mode);
      return Err(Xy5320Error::TooManyChannels);
    }
    if *channel < 0 || *channel > max_channels as i64 - 1 {
      error!("Invalid channel {}!", channel);
      return Err(Xy5320Error::InvalidChannel);
    }
    let gain = match Gain::from_value(*gain) {
      Err(err) => {
        error!("Invalid gain {} for channel {}!", gain, channel);
        return Err(err);
      }
      Ok(g) => g
    };
    if channels.iter().any(|c| c.channel as i64 == *channel) {
      error!("Channel {} configured twice!", channel);
      return Err(Xy5320Error::DuplicateChannel);
    }
    channels.push(ChannelGain { channel : *channel as u8, gain });
  }
  if channels.is_empty() {
    error!("No channels configured!");
    return Err(Xy5320Error::NoChannels);
  }
  Ok(channels)
}

/// Parse channel lines from any reader
pub fn parse_channels<R : BufRead>(reader : R,
                                   mode   : InputMode) -> Result<Vec<ChannelGain>, Xy5320Error> {
  let mut pairs = Vec::<(i64, i64)>::new();
  for (n, line) in reader.lines().enumerate() {
    let line = match line {
      Err(err) => {
        error!("Unable to read line {}! {err}", n + 1);
        return Err(Xy5320Error::FileFormatError);
      }
      Ok(l) => l
    };
    match parse_line(&line) {
      Err(err) => {
        error!("Format error in line {}: \"{}\"", n + 1, line);
        return Err(err);
      }
      Ok(None)       => continue,
      Ok(Some(pair)) => pairs.push(pair),
    }
  }
  check_channels(&pairs, mode)
}

pub fn read_channel_file(filename : &Path,
                         mode     : InputMode) -> Result<Vec<ChannelGain>, Xy5320Error> {
  let file = match File::open(filename) {
    Err(err) => {
      error!("Unable to open {}! {err}", filename.display());
      return Err(Xy5320Error::FileOpenFailed);
    }
    Ok(f) => f
  };
  parse_channels(BufReader::new(file), mode)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn line_formats() {
    assert_eq!(parse_line("  3  4 "), Ok(Some((3, 4))));
    assert_eq!(parse_line("3,8 # comment"), Ok(Some((3, 8))));
    assert_eq!(parse_line("+12\t-1"), Ok(Some((12, -1))));
    assert_eq!(parse_line("# 1 1"), Ok(None));
    assert_eq!(parse_line("   "), Ok(None));
    assert_eq!(parse_line("3"), Err(Xy5320Error::FileFormatError));
    assert_eq!(parse_line("3x4"), Err(Xy5320Error::FileFormatError));
    assert_eq!(parse_line("3 4 5"), Ok(Some((3, 4))));
    assert_eq!(parse_line("7, 2  ; spare input"), Ok(Some((7, 2))));
    assert_eq!(parse_line("a 4"), Err(Xy5320Error::FileFormatError));
  }

  #[test]
  fn validation_order() {
    let dif = InputMode::Differential;
    assert_eq!(check_channels(&[(20, 1)], dif), Err(Xy5320Error::InvalidChannel));
    assert!(check_channels(&[(20, 1)], InputMode::SingleEnded).is_ok());
    assert_eq!(check_channels(&[(1, 3)], dif), Err(Xy5320Error::InvalidGain));
    assert_eq!(check_channels(&[(1, 1), (1, 2)], dif), Err(Xy5320Error::DuplicateChannel));
    assert_eq!(check_channels(&[], dif), Err(Xy5320Error::NoChannels));
    let too_many : Vec<(i64, i64)> = (0..21).map(|c| (c % 20, 1)).collect();
    assert_eq!(check_channels(&too_many, dif), Err(Xy5320Error::TooManyChannels));
  }

  #[test]
  fn from_reader() {
    let text = "# chan gain\n0 1\n\n5 8\n";
    let chans = parse_channels(text.as_bytes(), InputMode::Differential).unwrap();
    assert_eq!(chans, vec![ChannelGain { channel : 0, gain : Gain::X1 },
                           ChannelGain { channel : 5, gain : Gain::X8 }]);
  }
}
