//! IPAC-IOC - run the IP470, IP-5320 and trigger card drivers
//! as configured in a toml file.
//!
//! The cards are created in the order of the config file,
//! then the interrupt handlers are attached and the analog
//! input tasks started. Interrupt notifications and periodic
//! reports go to the log.

#[macro_use] extern crate log;
extern crate env_logger;
extern crate clap;
extern crate crossbeam_channel;
extern crate colored;
extern crate signal_hook;

extern crate ipac_lib;

use std::path::PathBuf;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use clap::{arg,
           command,
           Parser};
use colored::Colorize;
use crossbeam_channel::{tick, Receiver};

use ipac_lib::carrier::{Carrier,
                        SimCarrier,
                        UioCarrier};
use ipac_lib::ip470::config::IntHandler;
use ipac_lib::ip470::registers::{MAXBITS, MAXPORTS};
use ipac_lib::ip470::sim::Ip470Sim;
use ipac_lib::memory::SimRegisters;
use ipac_lib::scan::{ScanEvent, ScanView};
use ipac_lib::settings::IocSettings;
use ipac_lib::trigger::{TriggerDriver, IP_MANUFACTURER_ACROMAG};
use ipac_lib::xy5320::sim::Xy5320Sim;
use ipac_lib::xy5320::{ChannelSource,
                       VoltageRange,
                       Xy5320Driver};
use ipac_lib::{init_env_logger,
               Ip470Driver,
               ThreadControl,
               IPAC_IOC_LOGO};

/*************************************/

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// A toml config file with the cards of this IOC
  #[arg(short, long)]
  config: Option<PathBuf>,
  /// Run against simulated boards, no matter
  /// what the config says
  #[arg(short, long, default_value_t = false)]
  simulate: bool,
  /// Print a report of all cards every n seconds
  /// (overrides the config file)
  #[arg(long)]
  report_interval: Option<u64>,
  /// Stop after n seconds (0 runs until Ctrl+C)
  #[arg(long, default_value_t = 0)]
  runtime: u64,
  /// Write the default configuration to this
  /// file and exit
  #[arg(long)]
  write_default_config: Option<PathBuf>,
  /// Enhance output to console
  #[arg(short, long, default_value_t = false)]
  verbose: bool,
}

/*************************************/

/// Simulated boards at every configured site
/// together with the IP470 boards and their vectors
fn sim_carrier(settings : &IocSettings) -> (Arc<SimCarrier>, Vec<(Arc<Ip470Sim>, u8)>) {
  let carrier = Arc::new(SimCarrier::with_geometry(settings.carrier.n_carriers,
                                                   settings.carrier.n_slots));
  let mut dio_sims = Vec::<(Arc<Ip470Sim>, u8)>::new();
  for card in settings.ip470.iter() {
    let sim = Arc::new(Ip470Sim::new());
    match carrier.install(card.site(), sim.clone()) {
      Err(err) => error!("Can't install simulated IP470 at {}! {}", card.site(), err),
      Ok(_)    => dio_sims.push((sim, card.vector as u8)),
    }
  }
  for card in settings.xy5320.iter() {
    let range = card.range.parse::<VoltageRange>().unwrap_or(VoltageRange::Bipolar10);
    // a slow ramp over the channels
    let sim   = Xy5320Sim::ideal(range, |c| 0.1 * (c as f64 + 1.0));
    if let Err(err) = carrier.install(card.site(), Arc::new(sim)) {
      error!("Can't install simulated IP-5320 at {}! {}", card.site(), err);
    }
  }
  for card in settings.trigger.iter() {
    let regs = SimRegisters::with_id(IP_MANUFACTURER_ACROMAG, card.kind.model());
    if let Err(err) = carrier.install(card.site(), Arc::new(regs)) {
      error!("Can't install simulated {} at {}! {}", card.kind, card.site(), err);
    }
  }
  (carrier, dio_sims)
}

/// Subscribe a single bit record to every input
/// line of all interrupt capable cards
fn subscribe_all(ip470 : &Ip470Driver) -> Vec<(String, usize, usize, Receiver<ScanEvent>)> {
  let mut subs = Vec::<(String, usize, usize, Receiver<ScanEvent>)>::new();
  for name in ip470.names() {
    match ip470.which_handler(&name) {
      Ok(IntHandler::NotUsed) | Err(_) => continue,
      Ok(_) => ()
    }
    for port in 0..MAXPORTS {
      for bit in 0..MAXBITS {
        match ip470.io_scan(&name, port, bit, ScanView::Bi) {
          Err(err) => {
            warn!("{}: no scan handle for port {} bit {}! {}", name, port, bit, err);
          }
          Ok(scan) => subs.push((name.clone(), port, bit, scan.subscribe())),
        }
      }
    }
  }
  subs
}

fn main() {
  init_env_logger();

  println!("{}", IPAC_IOC_LOGO);
  println!("-----------------------------------------------");

  let args = Args::parse();

  if let Some(path) = args.write_default_config {
    let settings = IocSettings::new();
    match settings.to_toml(path.display().to_string()) {
      Err(err) => {
        error!("Unable to write the default config! {err}");
        exit(1);
      }
      Ok(_) => {
        println!("=> Wrote the default config to {}", path.display());
        exit(0);
      }
    }
  }

  let mut settings = match args.config {
    None => {
      warn!("No config file given, using the defaults!");
      IocSettings::new()
    }
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
  if args.simulate {
    settings.carrier.simulate = true;
  }
  if let Some(interval) = args.report_interval {
    settings.report_interval_sec = interval;
  }
  if args.verbose {
    println!("{}", settings);
  }

  let (carrier, sim, dio_sims) : (Arc<dyn Carrier>, Option<Arc<SimCarrier>>, Vec<(Arc<Ip470Sim>, u8)>)
    = if settings.carrier.simulate {
    println!("=> {}", "Running against SIMULATED boards!".yellow().bold());
    let (c, boards) = sim_carrier(&settings);
    let bus : Arc<dyn Carrier> = c.clone();
    (bus, Some(c), boards)
  } else {
    let bus : Arc<dyn Carrier> = Arc::new(UioCarrier::new(settings.carrier.uio_slots.clone()));
    (bus, None, Vec::new())
  };

  // card creation, a failing card is left out
  let ip470   = Ip470Driver::new(carrier.clone());
  for card in settings.ip470.iter() {
    if let Err(err) = ip470.create(&card.name,
                                   card.site(),
                                   &card.mode,
                                   &card.int_handler,
                                   None,
                                   card.vector,
                                   card.event,
                                   card.debounce) {
      error!("IP470 {} not created! {err}", card.name);
    }
  }
  let xy5320  = Arc::new(Xy5320Driver::new(carrier.clone()));
  for card in settings.xy5320.iter() {
    let pairs  = card.channel_pairs();
    let source = match &card.channel_file {
      Some(f) => ChannelSource::File(std::path::Path::new(f)),
      None    => ChannelSource::List(&pairs),
    };
    if let Err(err) = xy5320.create_with_options(&card.name,
                                                 card.site(),
                                                 &card.range,
                                                 &card.mode,
                                                 card.num_samples,
                                                 source,
                                                 card.options()) {
      error!("IP-5320 {} not created! {err}", card.name);
    }
  }
  let trigger = TriggerDriver::new(carrier.clone());
  for card in settings.trigger.iter() {
    let result = match (card.offset, card.value) {
      (None, None) => trigger.create(&card.name, card.site(), card.kind),
      (offset, value) => {
        trigger.create_with_register(&card.name,
                                     card.site(),
                                     card.kind,
                                     offset.unwrap_or(card.kind.default_offset()),
                                     value.unwrap_or(ipac_lib::trigger::TRIGGER_VALUE))
      }
    };
    if let Err(err) = result {
      error!("{} {} not created! {err}", card.kind, card.name);
    }
  }

  // records subscribe before the interrupts are connected
  let subscriptions  = subscribe_all(&ip470);
  if let Err(err) = ip470.initialise() {
    error!("Not all IP470 interrupts are connected! {err}");
  }
  let thread_control = Arc::new(Mutex::new(ThreadControl::new()));
  let mut handles    = Vec::<JoinHandle<()>>::new();
  if settings.start_tasks {
    match xy5320.initialise(settings.task_periods(), thread_control.clone()) {
      Err(err) => error!("IP-5320 tasks not started! {err}"),
      Ok(h)    => handles.extend(h),
    }
  }
  match thread_control.lock() {
    Err(err) => error!("Can't acquire lock for ThreadControl! {err}"),
    Ok(mut tc) => tc.interrupts_accepted = true,
  }
  println!("==> All cards initialized!");
  println!("{}", ip470.report(0));
  println!("{}", trigger.report());

  let term = Arc::new(AtomicBool::new(false));
  for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
    if let Err(err) = signal_hook::flag::register(sig, Arc::clone(&term)) {
      error!("Unable to register signal handler for {}! {err}", sig);
    }
  }

  let ticker         = tick(Duration::from_secs(1));
  let start          = Instant::now();
  let mut n_ticks    = 0u64;
  let report_every   = settings.report_interval_sec;
  loop {
    if ticker.recv().is_err() {
      break;
    }
    n_ticks += 1;
    if term.load(Ordering::Relaxed) {
      println!("==> \u{1F6D1} received signal, shutting down!");
      break;
    }
    if args.runtime > 0 && start.elapsed() >= Duration::from_secs(args.runtime) {
      println!("==> Runtime of {} seconds reached!", args.runtime);
      break;
    }
    // in simulation, toggle one input line per second
    if let Some(sim) = &sim {
      let port = ((n_ticks / 8) as usize) % MAXPORTS;
      let bit  = (n_ticks % 8) as usize;
      for (board, vector) in dio_sims.iter() {
        if board.raise(port, bit) {
          sim.raise(*vector);
        }
      }
    }
    for (name, port, bit, rx) in subscriptions.iter() {
      for ev in rx.try_iter() {
        info!("{}: port {} bit {} notified (index {}, state {})", name, port, bit, ev.index, ev.state);
      }
    }
    if report_every > 0 && n_ticks % report_every == 0 {
      println!("{} {}", "==> Report".bold(), chrono::Utc::now());
      println!("{}", ip470.report(2));
      println!("{}", xy5320.report());
      println!("{}", trigger.report());
      match thread_control.lock() {
        Err(err) => error!("Can't acquire lock for ThreadControl! {err}"),
        Ok(tc)   => println!("{}", tc),
      }
    }
  }

  match thread_control.lock() {
    Err(err) => error!("Can't acquire lock for ThreadControl! {err}"),
    Ok(mut tc) => tc.stop_flag = true,
  }
  for h in handles {
    if let Err(err) = h.join() {
      error!("Task ended with a panic! {:?}", err);
    }
  }
  xy5320.shutdown();
  ip470.shutdown();
  trigger.shutdown();
  println!("So long and thanks for all the \u{1F41F}");
}
