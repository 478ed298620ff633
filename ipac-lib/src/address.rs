//! Address strings of the I/O records
//!
//! * digital records : `card:port:bit`, optionally followed
//!                     by `:SIZE` (BIT, NIBBLE, PORT, WORD)
//! * analog records  : `card:channel`
//!
//! A leading `@` (instrument I/O link) is ignored, blanks
//! around the fields are allowed.

use std::fmt;
use std::str::FromStr;

use crate::errors::AddressError;
use crate::ip470::addressing::DataSize;

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryAddress {
  pub name : String,
  pub port : i32,
  pub bit  : i32,
  pub size : Option<DataSize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalogAddress {
  pub name    : String,
  pub channel : i32,
}

fn fields(s : &str) -> Vec<&str> {
  let s = s.trim();
  let s = s.strip_prefix('@').unwrap_or(s);
  s.split(':').map(|f| f.trim()).collect()
}

fn card_name(field : Option<&&str>) -> Result<String, AddressError> {
  match field {
    None                     => Err(AddressError::MissingField),
    Some(f) if f.is_empty()  => Err(AddressError::EmptyName),
    Some(f)                  => Ok(String::from(*f)),
  }
}

fn number(field : Option<&&str>) -> Result<i32, AddressError> {
  match field {
    None                    => Err(AddressError::MissingField),
    Some(f) if f.is_empty() => Err(AddressError::MissingField),
    Some(f)                 => f.parse::<i32>().map_err(|_| AddressError::BadNumber),
  }
}

impl FromStr for BinaryAddress {
  type Err = AddressError;

  fn from_str(s : &str) -> Result<Self, Self::Err> {
    let f    = fields(s);
    let name = card_name(f.first())?;
    let port = number(f.get(1))?;
    let bit  = number(f.get(2))?;
    let size = match f.get(3) {
      None     => None,
      Some(sz) => Some(sz.parse::<DataSize>().map_err(|_| AddressError::BadDataSize)?),
    };
    if f.len() > 4 {
      return Err(AddressError::TrailingGarbage);
    }
    Ok(Self { name, port, bit, size })
  }
}

impl FromStr for AnalogAddress {
  type Err = AddressError;

  fn from_str(s : &str) -> Result<Self, Self::Err> {
    let f       = fields(s);
    let name    = card_name(f.first())?;
    let channel = number(f.get(1))?;
    if f.len() > 2 {
      return Err(AddressError::TrailingGarbage);
    }
    Ok(Self { name, channel })
  }
}

impl fmt::Display for BinaryAddress {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self.size {
      None     => write!(f, "{}:{}:{}", self.name, self.port, self.bit),
      Some(sz) => write!(f, "{}:{}:{}:{}", self.name, self.port, self.bit, sz),
    }
  }
}

impl fmt::Display for AnalogAddress {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}:{}", self.name, self.channel)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn binary() {
    let a : BinaryAddress = "@DIO1: 2 :5".parse().unwrap();
    assert_eq!(a, BinaryAddress { name : String::from("DIO1"), port : 2, bit : 5, size : None });
    let a : BinaryAddress = "DIO1:1:4:word".parse().unwrap();
    assert_eq!(a.size, Some(DataSize::Word));
    assert_eq!("DIO1:1".parse::<BinaryAddress>(), Err(AddressError::MissingField));
    assert_eq!(":1:2".parse::<BinaryAddress>(), Err(AddressError::EmptyName));
    assert_eq!("DIO1:x:2".parse::<BinaryAddress>(), Err(AddressError::BadNumber));
    assert_eq!("DIO1:1:2:BYTE".parse::<BinaryAddress>(), Err(AddressError::BadDataSize));
    assert_eq!("DIO1:1:2:BIT:3".parse::<BinaryAddress>(), Err(AddressError::TrailingGarbage));
  }

  #[test]
  fn analog() {
    let a : AnalogAddress = "AI1:7".parse().unwrap();
    assert_eq!(a.channel, 7);
    assert_eq!(a.to_string(), "AI1:7");
    assert_eq!("AI1".parse::<AnalogAddress>(), Err(AddressError::MissingField));
    assert_eq!("AI1:3:4".parse::<AnalogAddress>(), Err(AddressError::TrailingGarbage));
  }
}
