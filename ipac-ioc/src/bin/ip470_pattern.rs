//! Write bit patterns to an IP470 and read them back
//!
//! Useful to check the cabling of the output ports. The
//! card is created from the config file (or the defaults)
//! and addressed like a record, e.g. `DIO1:1:0:WORD`.

#[macro_use] extern crate log;
extern crate clap;
extern crate colored;

extern crate ipac_lib;

use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{arg,
           command,
           Parser,
           ValueEnum};
use colored::Colorize;

use ipac_lib::address::BinaryAddress;
use ipac_lib::carrier::{Carrier,
                        SimCarrier,
                        UioCarrier};
use ipac_lib::ip470::addressing::DataSize;
use ipac_lib::ip470::sim::Ip470Sim;
use ipac_lib::settings::IocSettings;
use ipac_lib::{init_env_logger, Ip470Driver};

#[derive(Debug, Copy, Clone, PartialEq, ValueEnum)]
enum Pattern {
  /// a single 1 walking through the bits
  Walk,
  /// count up from 0
  Count,
  /// write --value every cycle
  Fixed,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// Record style address card:port:bit[:SIZE]
  #[arg(short, long, default_value = "DIO1:0:0:WORD")]
  address: String,
  /// A toml config file with the IP470 cards
  #[arg(short, long)]
  config: Option<PathBuf>,
  #[arg(short, long, value_enum, default_value_t = Pattern::Walk)]
  pattern: Pattern,
  /// Value for the fixed pattern
  #[arg(long, default_value_t = 0)]
  value: u32,
  #[arg(long, default_value_t = 16)]
  cycles: u32,
  /// Pause between two writes
  #[arg(long, default_value_t = 250)]
  delay_ms: u64,
  /// Use a simulated board
  #[arg(short, long, default_value_t = false)]
  simulate: bool,
}

fn pattern_value(pattern : Pattern, cycle : u32, width : usize, fixed : u32) -> u32 {
  match pattern {
    Pattern::Walk  => 1u32 << (cycle as usize % width),
    Pattern::Count => cycle & ((1u32 << width) - 1),
    Pattern::Fixed => fixed,
  }
}

fn main() {
  init_env_logger();
  let args = Args::parse();

  let address = match args.address.parse::<BinaryAddress>() {
    Err(err) => {
      error!("Can't interpret address {}! {err}", args.address);
      exit(1);
    }
    Ok(a) => a
  };
  if address.port < 0 || address.bit < 0 {
    error!("Negative port/bit in {}!", address);
    exit(1);
  }
  let size = address.size.unwrap_or(DataSize::Bit);

  let settings = match args.config {
    None       => IocSettings::new(),
    Some(path) => {
      match IocSettings::from_toml(path.display().to_string()) {
        Err(err) => {
          error!("Unable to load config from {}! {err}", path.display());
          exit(1);
        }
        Ok(s) => s
      }
    }
  };
  let card = match settings.ip470.iter().find(|c| c.name == address.name) {
    None => {
      error!("No IP470 {} in the config!", address.name);
      exit(1);
    }
    Some(c) => c
  };

  let carrier : Arc<dyn Carrier> = if args.simulate || settings.carrier.simulate {
    println!("=> {}", "Writing to a SIMULATED board!".yellow().bold());
    let sim = SimCarrier::with_geometry(settings.carrier.n_carriers, settings.carrier.n_slots);
    if let Err(err) = sim.install(card.site(), Arc::new(Ip470Sim::new())) {
      error!("Can't install simulated IP470 at {}! {err}", card.site());
      exit(1);
    }
    Arc::new(sim)
  } else {
    Arc::new(UioCarrier::new(settings.carrier.uio_slots.clone()))
  };

  // interrupts are not needed for output patterns
  let driver = Ip470Driver::new(carrier);
  if let Err(err) = driver.create(&card.name,
                                  card.site(),
                                  "STANDARD",
                                  &card.int_handler,
                                  None,
                                  card.vector,
                                  card.event,
                                  card.debounce) {
    error!("Can't create {}! {err}", card.name);
    exit(1);
  }

  let port  = address.port as usize;
  let bit   = address.bit as usize;
  let width = size.width();
  let mut n_mismatch = 0u32;
  for cycle in 0..args.cycles {
    let value = pattern_value(args.pattern, cycle, width, args.value) & size.max_value();
    if let Err(err) = driver.write(&card.name, port, bit, size, value, width) {
      error!("Write of {:#x} to {} failed! {err}", value, address);
      exit(1);
    }
    match driver.read(&card.name, port, bit, size) {
      Err(err) => {
        error!("Read back from {} failed! {err}", address);
        exit(1);
      }
      Ok(back) => {
        if back as u32 == value {
          println!("{} {:#06x} -> {:#06x}", "OK ".green(), value, back);
        } else {
          n_mismatch += 1;
          println!("{} {:#06x} -> {:#06x}", "BAD".red().bold(), value, back);
        }
      }
    }
    thread::sleep(Duration::from_millis(args.delay_ms));
  }
  println!("{}", driver.report(1));
  driver.shutdown();
  if n_mismatch > 0 {
    error!("{} of {} read backs did not match!", n_mismatch, args.cycles);
    exit(2);
  }
}
