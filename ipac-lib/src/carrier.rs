//! The IP carrier board
//!
//! IP modules sit in slots of a carrier board. The
//! carrier provides the address of a module's I/O
//! space, identifies the module through its ID PROM,
//! routes the module's interrupt to a handler and
//! can mask/unmask the interrupt line of a slot.
//!
//! Two carriers are provided
//!
//! * `SimCarrier` - register blocks live in memory,
//!   interrupts are raised explicitly
//! * `UioCarrier` - slots are mapped through Linux
//!   UIO devices, interrupts are delivered by blocking
//!   reads on the device file

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use serde::{Deserialize, Serialize};

use crate::errors::CarrierError;
use crate::memory::{IdProm,
                    MappedRegisters,
                    RegisterAccess,
                    IP_IO_SPACE_SIZE};

/// Location of a module: carrier number and slot on
/// that carrier
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Site {
  pub carrier : u16,
  pub slot    : u16,
}

impl Site {
  pub fn new(carrier : u16, slot : u16) -> Self {
    Self {
      carrier,
      slot
    }
  }
}

impl fmt::Display for Site {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "C{}S{}", self.carrier, self.slot)
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IrqCmd {
  Enable,
  Disable,
}

/// Routine run when a module raises its interrupt.
///
/// Executes in interrupt context: it must not block
/// and must not allocate.
pub type InterruptHandler = Arc<dyn Fn() + Send + Sync>;

pub trait Carrier : Send + Sync {

  /// The register block of the module in the given slot
  fn base_addr(&self, site : Site) -> Result<Arc<dyn RegisterAccess>, CarrierError>;

  /// Check that the slot holds the expected module
  ///
  /// # Arguments
  ///
  /// * site         : carrier/slot
  /// * manufacturer : expected manufacturer id
  /// * model        : expected model id
  fn validate(&self, site : Site, manufacturer : u8, model : u8) -> Result<(), CarrierError> {
    let regs = self.base_addr(site)?;
    let prom = IdProm::read(regs.as_ref());
    if !prom.has_signature() {
      debug!("No IPAC signature in slot {}!", site);
      return Err(CarrierError::NoIpacId);
    }
    if prom.manufacturer() != manufacturer || prom.model() != model {
      debug!("Slot {} holds module {:#04x}/{:#04x}, expected {:#04x}/{:#04x}",
             site, prom.manufacturer(), prom.model(), manufacturer, model);
      return Err(CarrierError::WrongModule);
    }
    Ok(())
  }

  /// Route the module interrupt to the handler
  fn int_connect(&self, site : Site, vector : u8, handler : InterruptHandler) -> Result<(), CarrierError>;

  /// Mask/unmask the interrupt line of the slot
  fn irq_cmd(&self, site : Site, cmd : IrqCmd) -> Result<(), CarrierError>;
}

/// A carrier in memory
///
/// Modules are installed as register blocks (e.g. a
/// simulated IP470). Interrupts are delivered with
/// `raise`.
pub struct SimCarrier {
  n_carriers : u16,
  n_slots    : u16,
  slots      : Mutex<HashMap<Site, Arc<dyn RegisterAccess>>>,
  handlers   : Mutex<HashMap<u8, (Site, InterruptHandler)>>,
  irq_state  : Mutex<HashMap<Site, bool>>,
  irq_log    : Mutex<Vec<(Site, IrqCmd)>>,
}

impl SimCarrier {

  /// A carrier with 4 slots (A-D)
  pub fn new() -> Self {
    Self::with_geometry(1, 4)
  }

  pub fn with_geometry(n_carriers : u16, n_slots : u16) -> Self {
    Self {
      n_carriers,
      n_slots,
      slots     : Mutex::new(HashMap::new()),
      handlers  : Mutex::new(HashMap::new()),
      irq_state : Mutex::new(HashMap::new()),
      irq_log   : Mutex::new(Vec::new()),
    }
  }

  fn check_site(&self, site : Site) -> Result<(), CarrierError> {
    if site.carrier >= self.n_carriers || site.slot >= self.n_slots {
      return Err(CarrierError::BadAddress);
    }
    Ok(())
  }

  /// Plug a module into a slot
  pub fn install(&self, site : Site, regs : Arc<dyn RegisterAccess>) -> Result<(), CarrierError> {
    self.check_site(site)?;
    match self.slots.lock() {
      Err(_)        => Err(CarrierError::Unknown),
      Ok(mut slots) => {
        slots.insert(site, regs);
        Ok(())
      }
    }
  }

  /// Deliver the interrupt with the given vector
  ///
  /// The handler only runs when a handler is connected
  /// and the interrupt line of its slot is enabled.
  /// Returns true if the handler ran.
  pub fn raise(&self, vector : u8) -> bool {
    let entry = match self.handlers.lock() {
      Err(_) => None,
      Ok(h)  => h.get(&vector).cloned(),
    };
    let (site, handler) = match entry {
      None => {
        debug!("Spurious interrupt, vector {:#04x}", vector);
        return false;
      }
      Some(e) => e
    };
    if !self.irq_enabled(site) {
      trace!("Interrupt line of {} is masked", site);
      return false;
    }
    handler();
    true
  }

  pub fn irq_enabled(&self, site : Site) -> bool {
    match self.irq_state.lock() {
      Err(_)    => false,
      Ok(state) => *state.get(&site).unwrap_or(&false)
    }
  }

  /// All interrupt line commands issued so far
  pub fn irq_history(&self) -> Vec<(Site, IrqCmd)> {
    match self.irq_log.lock() {
      Err(_)  => Vec::new(),
      Ok(log) => log.clone()
    }
  }

  pub fn connected_vectors(&self) -> Vec<u8> {
    match self.handlers.lock() {
      Err(_) => Vec::new(),
      Ok(h)  => {
        let mut v : Vec<u8> = h.keys().copied().collect();
        v.sort();
        v
      }
    }
  }
}

impl Default for SimCarrier {
  fn default() -> Self {
    Self::new()
  }
}

impl Carrier for SimCarrier {
  fn base_addr(&self, site : Site) -> Result<Arc<dyn RegisterAccess>, CarrierError> {
    self.check_site(site)?;
    match self.slots.lock() {
      Err(_)    => Err(CarrierError::Unknown),
      Ok(slots) => slots.get(&site).cloned().ok_or(CarrierError::NoModule)
    }
  }

  fn int_connect(&self, site : Site, vector : u8, handler : InterruptHandler) -> Result<(), CarrierError> {
    self.check_site(site)?;
    match self.handlers.lock() {
      Err(_)    => Err(CarrierError::IntConnectFailed),
      Ok(mut h) => {
        if let Some((other, _)) = h.get(&vector) {
          if *other != site {
            error!("Vector {:#04x} already connected to {}!", vector, other);
            return Err(CarrierError::IntConnectFailed);
          }
        }
        h.insert(vector, (site, handler));
        Ok(())
      }
    }
  }

  fn irq_cmd(&self, site : Site, cmd : IrqCmd) -> Result<(), CarrierError> {
    self.check_site(site)?;
    match self.irq_state.lock() {
      Err(_)        => return Err(CarrierError::IrqCmdFailed),
      Ok(mut state) => {
        state.insert(site, cmd == IrqCmd::Enable);
      }
    }
    if let Ok(mut log) = self.irq_log.lock() {
      log.push((site, cmd));
    }
    Ok(())
  }
}

/// One slot of a carrier which is made available
/// through a UIO device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UioSlot {
  pub carrier : u16,
  pub slot    : u16,
  /// e.g. /dev/uio3
  pub device  : String,
  /// offset of the module I/O space in the mapping
  pub offset  : u64,
  pub size    : usize,
}

impl UioSlot {
  pub fn new(carrier : u16, slot : u16, device : &str) -> Self {
    Self {
      carrier,
      slot,
      device  : String::from(device),
      offset  : 0,
      size    : IP_IO_SPACE_SIZE,
    }
  }

  pub fn site(&self) -> Site {
    Site::new(self.carrier, self.slot)
  }
}

/// Carrier slots exported by the kernel through UIO
///
/// The UIO interrupt protocol: a blocking read of 4
/// bytes returns the interrupt count once an interrupt
/// arrived, writing 1 (0) as a 32bit int unmasks (masks)
/// the interrupt.
pub struct UioCarrier {
  slots   : Vec<UioSlot>,
  mapped  : Mutex<HashMap<Site, Arc<MappedRegisters>>>,
  /// irq control handles, opened once per slot
  irq_fds : Mutex<HashMap<Site, Arc<File>>>,
}

impl UioCarrier {
  pub fn new(slots : Vec<UioSlot>) -> Self {
    Self {
      slots,
      mapped  : Mutex::new(HashMap::new()),
      irq_fds : Mutex::new(HashMap::new()),
    }
  }

  /// The cached irq control handle of a slot. Only
  /// the first call for a slot opens the device.
  fn irq_handle(&self, site : Site) -> Result<Arc<File>, CarrierError> {
    let mut fds = match self.irq_fds.lock() {
      Err(_) => return Err(CarrierError::IrqCmdFailed),
      Ok(f)  => f
    };
    if let Some(fd) = fds.get(&site) {
      return Ok(fd.clone());
    }
    let slot = self.slot(site)?;
    match File::options().write(true).open(&slot.device) {
      Err(err) => {
        error!("Unable to open {} for irq control! {}", slot.device, err);
        Err(CarrierError::IrqCmdFailed)
      }
      Ok(f) => {
        let fd = Arc::new(f);
        fds.insert(site, fd.clone());
        Ok(fd)
      }
    }
  }

  fn slot(&self, site : Site) -> Result<&UioSlot, CarrierError> {
    self.slots.iter().find(|s| s.site() == site).ok_or(CarrierError::BadAddress)
  }
}

impl Carrier for UioCarrier {
  fn base_addr(&self, site : Site) -> Result<Arc<dyn RegisterAccess>, CarrierError> {
    let slot = self.slot(site)?;
    let mut mapped = match self.mapped.lock() {
      Err(_) => return Err(CarrierError::MapFailed),
      Ok(m)  => m
    };
    if let Some(regs) = mapped.get(&site) {
      return Ok(regs.clone());
    }
    match MappedRegisters::map(&slot.device, slot.offset, slot.size) {
      Err(err) => {
        error!("Unable to map {} for {}! {}", slot.device, site, err);
        Err(CarrierError::MapFailed)
      }
      Ok(regs) => {
        let regs = Arc::new(regs);
        mapped.insert(site, regs.clone());
        Ok(regs)
      }
    }
  }

  fn int_connect(&self, site : Site, vector : u8, handler : InterruptHandler) -> Result<(), CarrierError> {
    let slot = self.slot(site)?;
    if self.irq_handle(site).is_err() {
      return Err(CarrierError::IntConnectFailed);
    }
    cfg_if::cfg_if! {
      if #[cfg(target_os = "linux")] {
        // the kernel driver owns the VME vector, we
        // only program it into the module
        debug!("Connecting {} (vector {:#04x}) through {}", site, vector, slot.device);
        let mut dev = match File::open(&slot.device) {
          Err(err) => {
            error!("Unable to open {}! {}", slot.device, err);
            return Err(CarrierError::IntConnectFailed);
          }
          Ok(f) => f
        };
        let device = slot.device.clone();
        let spawned = thread::Builder::new()
          .name(format!("ipac-irq-{}", site))
          .spawn(move || {
            let mut count = [0u8;4];
            loop {
              match dev.read_exact(&mut count) {
                Err(err) => {
                  error!("Interrupt wait on {} failed! {}", device, err);
                  break;
                }
                Ok(_) => handler()
              }
            }
          });
        match spawned {
          Err(err) => {
            error!("Unable to spawn interrupt thread for {}! {}", site, err);
            Err(CarrierError::IntConnectFailed)
          }
          Ok(_) => Ok(())
        }
      } else {
        let _ = (slot, vector, handler);
        Err(CarrierError::NotSupported)
      }
    }
  }

  fn irq_cmd(&self, site : Site, cmd : IrqCmd) -> Result<(), CarrierError> {
    let fd = self.irq_handle(site)?;
    let word : i32 = match cmd {
      IrqCmd::Enable  => 1,
      IrqCmd::Disable => 0,
    };
    match (&*fd).write_all(&word.to_ne_bytes()) {
      Err(_) => Err(CarrierError::IrqCmdFailed),
      Ok(_)  => Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn uio_irq_control_opens_device_once() {
    let dir    = std::env::temp_dir();
    let device = dir.join(format!("ipac-uio-{}", std::process::id()));
    let moved  = dir.join(format!("ipac-uio-{}-moved", std::process::id()));
    File::create(&device).unwrap();
    let carrier = UioCarrier::new(vec![UioSlot::new(0, 0, device.to_str().unwrap())]);
    carrier.irq_cmd(Site::new(0, 0), IrqCmd::Disable).unwrap();
    // the device node moved away, the open handle still works
    std::fs::rename(&device, &moved).unwrap();
    carrier.irq_cmd(Site::new(0, 0), IrqCmd::Enable).unwrap();
    let mut written = Vec::<u8>::new();
    File::open(&moved).unwrap().read_to_end(&mut written).unwrap();
    let mut expected = 0i32.to_ne_bytes().to_vec();
    expected.extend_from_slice(&1i32.to_ne_bytes());
    assert_eq!(written, expected);
    assert_eq!(carrier.irq_cmd(Site::new(0, 1), IrqCmd::Enable), Err(CarrierError::BadAddress));
    let _ = std::fs::remove_file(&moved);
  }
}
