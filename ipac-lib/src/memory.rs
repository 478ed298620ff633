//! Register access for IndustryPack modules
//!
//! An IP module exposes its registers as a small
//! block in the carrier's I/O space. On a Linux
//! host the carrier space is typically reachable
//! through a UIO device (e.g. /dev/uio0) or /dev/mem,
//! which we mmap and then access with volatile
//! reads/writes.
//!
//! All module registers we care about are either
//! bytes (IP470, addressed on odd offsets) or 16bit
//! words (IP-5320). VME is big endian, so the
//! simulated block stores words big endian as well.

extern crate memmap;

use std::fs::File;
use std::fmt;
use std::sync::Mutex;

use memmap::MmapMut;

use crate::errors::RegisterError;

pub const UIO0 : &'static str = "/dev/uio0";
pub const DEVMEM : &'static str = "/dev/mem";

/// Size of the I/O space of a single IP slot in bytes
pub const IP_IO_SPACE_SIZE : usize = 0x100;

/// The ID PROM starts here in the I/O block
/// (only odd bytes are populated)
pub const ID_PROM_OFFSET   : usize = 0x80;
/// Number of bytes in the ID PROM
pub const ID_PROM_SIZE     : usize = 32;

/// Primitive access to a register block
///
/// Offsets are byte offsets relative to the
/// base of the module's I/O space. Methods take
/// `&self`, since hardware registers are shared
/// between the interrupt handler and foreground
/// code without a lock.
pub trait RegisterAccess : Send + Sync {
  fn read_u8  (&self, offset : usize) -> u8;
  fn write_u8 (&self, offset : usize, value : u8);
  fn read_u16 (&self, offset : usize) -> u16;
  fn write_u16(&self, offset : usize, value : u16);
}

/// Map a device file (read/write) at the given offset
///
/// # Arguments
///
/// * addr_space : the device, e.g. /dev/uio0
/// * addr       : offset of the block in the device
/// * len        : number of bytes to map
pub fn map_physical_mem_write(addr_space : &str,
                              addr       : u64,
                              len        : usize)
  -> Result<MmapMut, RegisterError> {
  let file = match File::options()
    .read(true)
    .write(true)
    .open(addr_space) {
    Err(err) => {
      error!("Unable to open {}! {}", addr_space, err);
      return Err(RegisterError::MMapFail);
    }
    Ok(f) => f
  };
  let m = unsafe {
    memmap::MmapOptions::new()
      .offset(addr)
      .len(len)
      .map_mut(&file)
  };
  match m {
    Err(err) => {
      error!("Failed to mmap {} at {:#x}! {}", addr_space, addr, err);
      Err(RegisterError::MMapFail)
    }
    Ok(m) => Ok(m)
  }
}

/// A register block backed by a memory mapping
/// of the carrier's I/O space
pub struct MappedRegisters {
  map  : MmapMut,
  base : *mut u8,
}

// The mapping lives as long as the struct and
// all accesses are volatile single word accesses.
unsafe impl Send for MappedRegisters {}
unsafe impl Sync for MappedRegisters {}

impl MappedRegisters {

  pub fn map(addr_space : &str,
             addr       : u64,
             len        : usize) -> Result<Self, RegisterError> {
    let mut map = map_physical_mem_write(addr_space, addr, len)?;
    let base    = map.as_mut_ptr();
    Ok(Self {
      map,
      base,
    })
  }

  pub fn len(&self) -> usize {
    self.map.len()
  }

  /// Offset is inside the block and naturally
  /// aligned for an access of `size` bytes
  fn in_range(&self, offset : usize, size : usize) -> bool {
    if offset % size != 0 {
      error!("Register offset {:#x} not aligned for a {} byte access!", offset, size);
      return false;
    }
    if offset.checked_add(size).map_or(true, |end| end > self.map.len()) {
      error!("Register offset {:#x} outside of mapped block of size {:#x}!", offset, self.map.len());
      return false;
    }
    true
  }
}

impl RegisterAccess for MappedRegisters {
  fn read_u8(&self, offset : usize) -> u8 {
    if !self.in_range(offset, 1) {
      return 0;
    }
    unsafe {
      std::ptr::read_volatile(self.base.add(offset))
    }
  }

  fn write_u8(&self, offset : usize, value : u8) {
    if !self.in_range(offset, 1) {
      return;
    }
    unsafe {
      std::ptr::write_volatile(self.base.add(offset), value);
    }
  }

  fn read_u16(&self, offset : usize) -> u16 {
    if !self.in_range(offset, 2) {
      return 0;
    }
    let p = unsafe { self.base.add(offset) } as *const u16;
    let value = unsafe { std::ptr::read_volatile(p) };
    u16::from_be(value)
  }

  fn write_u16(&self, offset : usize, value : u16) {
    if !self.in_range(offset, 2) {
      return;
    }
    let p = unsafe { self.base.add(offset) } as *mut u16;
    unsafe {
      std::ptr::write_volatile(p, value.to_be());
    }
  }
}

/// A plain block of bytes behaving like memory
///
/// Used for modules which do not need a register
/// model (e.g. trigger cards in simulation) and
/// to carry ID PROM images.
pub struct SimRegisters {
  bytes : Mutex<Vec<u8>>,
}

impl SimRegisters {
  pub fn new(size : usize) -> Self {
    Self {
      bytes : Mutex::new(vec![0u8;size]),
    }
  }

  /// A block with a valid IPAC ID PROM for
  /// the given module
  pub fn with_id(manufacturer : u8, model : u8) -> Self {
    let regs = Self::new(IP_IO_SPACE_SIZE);
    let prom = IdProm::ipac(manufacturer, model);
    for (i, b) in prom.bytes.iter().enumerate() {
      regs.write_u8(IdProm::offset(i), *b);
    }
    regs
  }
}

impl RegisterAccess for SimRegisters {
  fn read_u8(&self, offset : usize) -> u8 {
    match self.bytes.lock() {
      Ok(b)    => b.get(offset).copied().unwrap_or(0),
      Err(_)   => 0
    }
  }

  fn write_u8(&self, offset : usize, value : u8) {
    if let Ok(mut b) = self.bytes.lock() {
      if offset < b.len() {
        b[offset] = value;
      }
    }
  }

  fn read_u16(&self, offset : usize) -> u16 {
    (self.read_u8(offset) as u16) << 8 | self.read_u8(offset + 1) as u16
  }

  fn write_u16(&self, offset : usize, value : u16) {
    self.write_u8(offset, (value >> 8) as u8);
    self.write_u8(offset + 1, (value & 0xff) as u8);
  }
}

/// The IPAC identification PROM
///
/// Byte layout: 0..4 "IPAC" (or "IPAH"), 4 manufacturer,
/// 5 model, 6 revision, 7 reserved, 8..10 driver ids,
/// 10 number of bytes used, 11 CRC.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct IdProm {
  pub bytes : [u8;ID_PROM_SIZE],
}

impl IdProm {

  /// Byte offset of the i-th PROM byte in the I/O block
  pub fn offset(i : usize) -> usize {
    ID_PROM_OFFSET + 2*i + 1
  }

  pub fn read(regs : &dyn RegisterAccess) -> Self {
    let mut bytes = [0u8;ID_PROM_SIZE];
    for (i, b) in bytes.iter_mut().enumerate() {
      *b = regs.read_u8(Self::offset(i));
    }
    Self {
      bytes
    }
  }

  /// A minimal, valid PROM image
  pub fn ipac(manufacturer : u8, model : u8) -> Self {
    let mut bytes = [0u8;ID_PROM_SIZE];
    bytes[0..4].copy_from_slice(b"IPAC");
    bytes[4]  = manufacturer;
    bytes[5]  = model;
    bytes[10] = 0x0c;
    Self {
      bytes
    }
  }

  pub fn has_signature(&self) -> bool {
    &self.bytes[0..4] == b"IPAC" || &self.bytes[0..4] == b"IPAH"
  }

  pub fn manufacturer(&self) -> u8 {
    self.bytes[4]
  }

  pub fn model(&self) -> u8 {
    self.bytes[5]
  }

  pub fn revision(&self) -> u8 {
    self.bytes[6]
  }

  pub fn driver_id(&self) -> u16 {
    (self.bytes[9] as u16) << 8 | self.bytes[8] as u16
  }

  pub fn n_bytes(&self) -> u8 {
    self.bytes[10]
  }

  pub fn crc(&self) -> u8 {
    self.bytes[11]
  }
}

impl fmt::Display for IdProm {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let sig = String::from_utf8_lossy(&self.bytes[0..4]);
    let mut repr = String::from("<IdProm:");
    repr += &(format!("\n  signature    : {}", sig));
    repr += &(format!("\n  manufacturer : {:#04x}", self.manufacturer()));
    repr += &(format!("\n  model        : {:#04x}", self.model()));
    repr += &(format!("\n  revision     : {:#04x}", self.revision()));
    repr += &(format!("\n  driver id    : {:#06x}", self.driver_id()));
    repr += &(format!("\n  bytes used   : {}", self.n_bytes()));
    repr += &(format!("\n  crc          : {:#04x}>", self.crc()));
    write!(f, "{}", repr)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn sim_block_words_are_big_endian() {
    let regs = SimRegisters::new(0x10);
    regs.write_u16(0x2, 0xbeef);
    assert_eq!(regs.read_u8(0x2), 0xbe);
    assert_eq!(regs.read_u8(0x3), 0xef);
    assert_eq!(regs.read_u16(0x2), 0xbeef);
  }

  #[test]
  fn id_prom_on_odd_bytes() {
    let regs = SimRegisters::with_id(0xa3, 0x08);
    assert_eq!(regs.read_u8(0x80 + 2*4 + 1), 0xa3);
    assert_eq!(regs.read_u8(0x80 + 2*4), 0);
    let prom = IdProm::read(&regs);
    assert!(prom.has_signature());
    assert_eq!(prom.manufacturer(), 0xa3);
    assert_eq!(prom.model(), 0x08);
  }

  #[test]
  fn mapped_words_need_alignment() {
    let path = std::env::temp_dir().join(format!("ipac-regs-{}", std::process::id()));
    File::create(&path).unwrap().write_all(&[0u8;0x20]).unwrap();
    let regs = MappedRegisters::map(path.to_str().unwrap(), 0, 0x20).unwrap();
    regs.write_u16(0x3, 0xbeef);
    assert_eq!(regs.read_u8(0x3), 0);
    assert_eq!(regs.read_u8(0x4), 0);
    assert_eq!(regs.read_u16(0x3), 0);
    regs.write_u16(0x4, 0xbeef);
    assert_eq!(regs.read_u16(0x4), 0xbeef);
    assert_eq!(regs.read_u8(0x4), 0xbe);
    regs.write_u16(0x1f, 0x1234);
    assert_eq!(regs.read_u16(0x1e), 0);
    drop(regs);
    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn out_of_range_access_is_harmless() {
    let regs = SimRegisters::new(4);
    regs.write_u8(10, 0xff);
    assert_eq!(regs.read_u8(10), 0);
  }
}
