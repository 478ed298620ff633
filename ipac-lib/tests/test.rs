#[cfg(test)]
pub mod tests {

  extern crate rand;
  use rand::Rng;

  use std::io::Write;
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  use ipac_lib::carrier::{IrqCmd,
                          SimCarrier,
                          Site};
  use ipac_lib::errors::{Ip470Error,
                         TriggerError,
                         Xy5320Error};
  use ipac_lib::ip470::Ip470Driver;
  use ipac_lib::ip470::addressing::DataSize;
  use ipac_lib::ip470::registers::*;
  use ipac_lib::ip470::sim::Ip470Sim;
  use ipac_lib::memory::{RegisterAccess, SimRegisters};
  use ipac_lib::scan::{ScanEvent, ScanView};
  use ipac_lib::threading::ThreadControl;
  use ipac_lib::trigger::{TriggerDriver,
                          TriggerKind,
                          IP330_TRIGGER_OFFSET,
                          IP_MODEL_ACROMAG_IP330};
  use ipac_lib::xy5320::correction::{correct_channel, Correction};
  use ipac_lib::xy5320::sim::Xy5320Sim;
  use ipac_lib::xy5320::tasks::{wait_for_interrupt_accept, TaskPeriods};
  use ipac_lib::xy5320::{ChannelValue,
                         FieldType,
                         Gain,
                         SweepMode,
                         VoltageRange,
                         Waveform,
                         Xy5320Driver};

  const DIO_SITE : Site = Site { carrier : 0, slot : 0 };
  const AI_SITE  : Site = Site { carrier : 0, slot : 1 };

  fn dio_setup(mode : &str, handler : &str, vector : i32) -> (Arc<SimCarrier>, Arc<Ip470Sim>, Ip470Driver) {
    let carrier = Arc::new(SimCarrier::new());
    let sim     = Arc::new(Ip470Sim::new());
    carrier.install(DIO_SITE, sim.clone()).unwrap();
    let driver  = Ip470Driver::new(carrier.clone());
    driver.create("DIO1", DIO_SITE, mode, handler, None, vector, 0, 0).unwrap();
    (carrier, sim, driver)
  }

  fn all_ports(sim : &Ip470Sim) -> u64 {
    (0..MAXPORTS).fold(0u64, |acc, p| acc | (sim.port_data(p) as u64) << (8*p))
  }

  #[test]
  fn bit_write_read_back() {
    let mut rng = rand::thread_rng();
    let (_, sim, driver) = dio_setup("ENHANCED", "COS", 0x90);
    for port in 0..MAXPORTS {
      for bit in 0..MAXBITS {
        let before : u8 = rng.gen();
        sim.set_input(port, before);
        let value : u32 = rng.gen_range(0..2);
        driver.write("DIO1", port, bit, DataSize::Bit, value, 1).unwrap();
        assert_eq!(driver.read("DIO1", port, bit, DataSize::Bit).unwrap(), value as u16);
        let mask = !(1u8 << bit);
        assert_eq!(sim.port_data(port) & mask, before & mask);
      }
    }
  }

  #[test]
  fn nibble_and_word_write_read_back() {
    let mut rng = rand::thread_rng();
    let (_, sim, driver) = dio_setup("STANDARD", "", 0);
    for size in [DataSize::Nibble, DataSize::Word] {
      for port in 0..MAXPORTS {
        for bit in 0..MAXBITS {
          let pos = port*8 + bit;
          if pos + size.width() > MAXPORTS*MAXBITS {
            continue;
          }
          for p in 0..MAXPORTS {
            sim.set_input(p, rng.gen());
          }
          let before = all_ports(&sim);
          let value  = rng.gen_range(0..=size.max_value());
          driver.write("DIO1", port, bit, size, value, size.width()).unwrap();
          assert_eq!(driver.read("DIO1", port, bit, size).unwrap() as u32, value,
                     "{} at port {} bit {}", size, port, bit);
          let span = (size.max_value() as u64) << pos;
          assert_eq!(all_ports(&sim) & !span, before & !span);
        }
      }
    }
  }

  #[test]
  fn write_checks() {
    let (_, _, driver) = dio_setup("STANDARD", "", 0);
    assert_eq!(driver.write("DIO1", 0, 0, DataSize::Bit, 2, 1), Err(Ip470Error::WriteError));
    assert_eq!(driver.write("DIO1", 0, 0, DataSize::Nibble, 0x10, 4), Err(Ip470Error::WriteError));
    assert_eq!(driver.write("DIO1", 6, 0, DataSize::Bit, 0, 1), Err(Ip470Error::PortError));
    assert_eq!(driver.read("DIO1", 0, 8, DataSize::Bit), Err(Ip470Error::BitError));
    assert_eq!(driver.read("DIO9", 0, 0, DataSize::Bit), Err(Ip470Error::CardNotFound));
  }

  #[test]
  fn select_bank_idempotent() {
    let sim = Ip470Sim::new();
    for b in ENHANCED_MODE_SEQUENCE {
      write_port(&sim, BANK_PORT, b);
    }
    let start = sim.bank();
    sim.clear_writes();
    assert_eq!(select_bank(&sim, BANK2, 0x0a), start);
    let after_first = sim.writes();
    assert_eq!(sim.bank(), BANK2);
    assert_eq!(select_bank(&sim, BANK2, 0x0a), BANK2);
    assert_eq!(sim.writes(), after_first);
    assert_eq!(sim.bank(), BANK2);
  }

  #[test]
  fn registry_rejects_duplicates() {
    let (carrier, _, driver) = dio_setup("STANDARD", "", 0);
    carrier.install(Site::new(0, 1), Arc::new(Ip470Sim::new())).unwrap();
    driver.create("DIO2", Site::new(0, 1), "STANDARD", "", None, 0, 0, 0).unwrap();
    let names = driver.names();
    carrier.install(Site::new(0, 2), Arc::new(Ip470Sim::new())).unwrap();
    assert_eq!(driver.create("DIO1", Site::new(0, 2), "STANDARD", "", None, 0, 0, 0),
               Err(Ip470Error::DuplicateDevice));
    assert_eq!(driver.create("DIO3", DIO_SITE, "STANDARD", "", None, 0, 0, 0),
               Err(Ip470Error::DuplicateDevice));
    assert_eq!(driver.names(), names);
    assert_eq!(names, vec![String::from("DIO1"), String::from("DIO2")]);
  }

  #[test]
  fn create_validates_module() {
    let carrier = Arc::new(SimCarrier::new());
    carrier.install(DIO_SITE, Arc::new(SimRegisters::with_id(0xa3, 0x32))).unwrap();
    let driver  = Ip470Driver::new(carrier.clone());
    assert_eq!(driver.create("DIO1", DIO_SITE, "STANDARD", "", None, 0, 0, 0),
               Err(Ip470Error::ValidateFailed));
    assert_eq!(driver.create("DIO1", Site::new(0, 3), "STANDARD", "", None, 0, 0, 0),
               Err(Ip470Error::ValidateFailed));
    assert_eq!(driver.create("DIO1", DIO_SITE, "FAST", "", None, 0, 0, 0),
               Err(Ip470Error::ModeError));
    assert!(driver.names().is_empty());
  }

  #[test]
  fn standard_mode_programs_mask_only() {
    let (_, sim, _) = dio_setup("STANDARD", "COS", 0x90);
    assert_eq!(sim.writes(), vec![(port_offset(BANK_PORT), 0x00)]);
    assert!(!sim.is_enhanced());
  }

  #[test]
  fn enhanced_mode_enables_interrupts_last() {
    let (_, sim, _) = dio_setup("ENHANCED", "COS", 0x90);
    let writes = sim.writes();
    let vect   = writes.iter().position(|w| *w == (IVR, 0x90)).unwrap();
    let inten  = writes.iter().position(|w| *w == (IER, INTEN)).unwrap();
    assert!(vect < inten);
    assert_eq!(*writes.last().unwrap(), (IER, INTEN));
    assert!(sim.is_enhanced());
    assert_eq!(sim.ev_control(), [0xaa, 0x0a]);
    assert_eq!(sim.debounce()[0], 0x3f);
    for port in 0..MAXPORTS {
      assert_eq!(sim.sense_enable(port), 0xff);
    }
  }

  #[test]
  fn cos_interrupt_dio1() {
    let (carrier, sim, driver) = dio_setup("ENHANCED", "COS", 0x90);
    driver.initialise().unwrap();
    assert!(carrier.irq_enabled(DIO_SITE));

    let bi9   = driver.io_scan("DIO1", 2, 5, ScanView::Bi).unwrap().subscribe();
    // COS indices 6..9 are (1,2), (1,3), (2,0), (2,1)
    let mbbi : Vec<_> = [(1, 2), (1, 3), (2, 0), (2, 1)].iter()
      .map(|(p, b)| driver.io_scan("DIO1", *p, *b, ScanView::Mbbi).unwrap().subscribe())
      .collect();
    let mbbi5 = driver.io_scan("DIO1", 1, 1, ScanView::Mbbi).unwrap().subscribe();

    sim.clear_writes();
    assert!(sim.raise(2, 5));
    assert!(carrier.raise(0x90));

    let card = driver.find_card("DIO1").unwrap();
    assert_eq!(card.last_chan(), 9);
    assert_eq!(card.last_state(), 1);
    let expected = ScanEvent { index : 9, state : 1 };
    assert_eq!(bi9.try_recv(), Ok(expected));
    for rx in mbbi.iter() {
      assert_eq!(rx.try_recv(), Ok(expected));
    }
    assert!(mbbi5.try_recv().is_err());

    // cleared with its complement, then sense re-enabled
    let writes = sim.writes();
    let clear  = writes.iter().position(|w| *w == (port_offset(2), 0xdf)).unwrap();
    let enable = writes.iter().position(|w| *w == (port_offset(2), 0xff)).unwrap();
    assert!(clear < enable);
    assert_eq!(sim.pending(2), 0);
    assert_eq!(sim.bank(), BANK1);

    let history = carrier.irq_history();
    let n       = history.len();
    assert_eq!(history[n - 2], (DIO_SITE, IrqCmd::Disable));
    assert_eq!(history[n - 1], (DIO_SITE, IrqCmd::Enable));
  }

  #[test]
  fn level_interrupt() {
    let carrier = Arc::new(SimCarrier::new());
    let sim     = Arc::new(Ip470Sim::new());
    carrier.install(DIO_SITE, sim.clone()).unwrap();
    let driver  = Ip470Driver::new(carrier.clone());
    driver.create("DIO2", DIO_SITE, "ENHANCED", "LEVEL", None, 0x91, 0, 0).unwrap();
    driver.initialise().unwrap();

    let bi30 = driver.io_scan("DIO2", 3, 6, ScanView::Bi).unwrap().subscribe();
    sim.clear_writes();
    assert!(sim.raise(3, 6));
    assert!(carrier.raise(0x91));

    let card = driver.find_card("DIO2").unwrap();
    assert_eq!(card.last_chan(), 30);
    assert_eq!(card.last_state(), 0);
    assert_eq!(bi30.try_recv(), Ok(ScanEvent { index : 30, state : 0 }));
    let writes = sim.writes();
    assert_eq!(writes.first(), Some(&(IER, 0x00)));
    assert_eq!(writes.last(), Some(&(IER, INTEN)));
    assert_eq!(sim.ier(), INTEN);
  }

  #[test]
  fn cos_shared_index_reaches_every_record() {
    let (carrier, sim, driver) = dio_setup("ENHANCED", "COS", 0x90);
    // port 2 bit 1 and port 2 bit 5 both fold to COS index 9
    let rec_a = driver.io_scan("DIO1", 2, 1, ScanView::Bi).unwrap().subscribe();
    let rec_b = driver.io_scan("DIO1", 2, 5, ScanView::Bi).unwrap().subscribe();
    let rec_c = driver.io_scan("DIO1", 2, 5, ScanView::Bi).unwrap().subscribe();
    driver.initialise().unwrap();

    assert!(sim.raise(2, 5));
    assert!(carrier.raise(0x90));
    let expected = ScanEvent { index : 9, state : 1 };
    for rx in [&rec_a, &rec_b, &rec_c] {
      assert_eq!(rx.try_recv(), Ok(expected));
      assert!(rx.try_recv().is_err());
    }
  }

  #[test]
  fn level_interrupt_reaches_all_views() {
    let carrier = Arc::new(SimCarrier::new());
    let sim     = Arc::new(Ip470Sim::new());
    carrier.install(DIO_SITE, sim.clone()).unwrap();
    let driver  = Ip470Driver::new(carrier.clone());
    driver.create("DIO2", DIO_SITE, "ENHANCED", "LEVEL", None, 0x91, 0, 0).unwrap();

    // LEVEL indices are port*8 + bit
    let mut records = Vec::new();
    for view in [ScanView::Bi, ScanView::Mbbi, ScanView::MbbiDirect] {
      for port in 0..MAXPORTS {
        for bit in 0..MAXBITS {
          let rx = driver.io_scan("DIO2", port, bit, view).unwrap().subscribe();
          records.push((view, port*8 + bit, rx));
        }
      }
    }
    driver.initialise().unwrap();

    assert!(sim.raise(3, 6));
    assert!(carrier.raise(0x91));
    let fired = 30usize;
    for (view, index, rx) in records.iter() {
      let covers = *index <= fired && fired < index + view.span();
      match rx.try_recv() {
        Ok(ev) => {
          assert!(covers, "{} {} notified", view, index);
          assert_eq!(ev, ScanEvent { index : fired as u8, state : 0 });
        }
        Err(_) => assert!(!covers, "{} {} not notified", view, index),
      }
    }
    let n_notified = records.iter().filter(|(v, i, _)| *i <= fired && fired < i + v.span()).count();
    assert_eq!(n_notified, 1 + 4 + 16);
  }

  #[test]
  fn user_callback_and_masked_line() {
    let carrier = Arc::new(SimCarrier::new());
    let sim     = Arc::new(Ip470Sim::new());
    carrier.install(DIO_SITE, sim.clone()).unwrap();
    let driver  = Ip470Driver::new(carrier.clone());
    let seen    = Arc::new(Mutex::new(Vec::<(String, usize, usize)>::new()));
    let seen_cb = seen.clone();
    driver.create("DIO1", DIO_SITE, "ENHANCED", "COS", Some(Arc::new(move |name : &str, port : usize, bit : usize| {
      seen_cb.lock().unwrap().push((String::from(name), port, bit));
    })), 0x90, 0, 0).unwrap();
    // not initialised yet, the line is masked
    sim.raise(0, 1);
    assert!(!carrier.raise(0x90));
    driver.initialise().unwrap();
    assert!(carrier.raise(0x90));
    assert_eq!(*seen.lock().unwrap(), vec![(String::from("DIO1"), 0, 1)]);
  }

  #[test]
  fn scan_requires_interrupts() {
    let (_, _, driver) = dio_setup("STANDARD", "", 0);
    assert_eq!(driver.io_scan("DIO1", 0, 0, ScanView::Bi).err(), Some(Ip470Error::NoInterrupts));
    let (_, _, driver) = dio_setup("ENHANCED", "COS", 0x90);
    assert_eq!(driver.io_scan_record("DIO1", 0, 0, "AI").err(), Some(Ip470Error::InvalidRecordType));
    assert!(driver.io_scan_record("DIO1", 5, 7, "mbbiDirect").is_ok());
    assert_eq!(driver.io_scan("DIO1", 7, 0, ScanView::Bi).err(), Some(Ip470Error::PortError));
  }

  ///////////////////////////////////////////////////////

  fn ai_setup(sim : Xy5320Sim) -> (Arc<SimCarrier>, Arc<Xy5320Sim>, Arc<Xy5320Driver>) {
    let carrier = Arc::new(SimCarrier::new());
    let sim     = Arc::new(sim);
    carrier.install(AI_SITE, sim.clone()).unwrap();
    let driver  = Arc::new(Xy5320Driver::new(carrier.clone()));
    (carrier, sim, driver)
  }

  /// channel number in the upper, conversion
  /// number (mod 16) in the lower bits
  fn counting_sim() -> Xy5320Sim {
    Xy5320Sim::new(Box::new(|control, n| ((control & 0x1f) << 12) | (((n % 16) as u16) << 4)))
  }

  fn write_file(name : &str, content : &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("ipac-lib-test-{}-{}", std::process::id(), name));
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
  }

  #[test]
  fn ai1_read_inputs_averages() {
    let (_, sim, driver) = ai_setup(counting_sim());
    driver.create_with_channels("AI1", AI_SITE, "-5TO5", "DIF", 16, &[(0, 1), (1, 1)]).unwrap();
    let card     = driver.find_card("AI1").unwrap();
    let mut data = card.lock().unwrap();
    assert_eq!(data.mode, SweepMode::Dif);
    card.read_inputs(&mut data);
    assert_eq!(data.raw, vec![0x0078, 0x1078]);
    assert_eq!(data.auto_zero, vec![0, 0]);
    assert_eq!(sim.n_conversions(), 32);
    assert_eq!(sim.controls(), vec![0x0000, 0x0001]);
  }

  #[test]
  fn unconfigured_channel() {
    let (_, _, driver) = ai_setup(counting_sim());
    driver.create_with_channels("AI1", AI_SITE, "-5TO5", "DIF", 16, &[(0, 1), (1, 1)]).unwrap();
    driver.calibrate("AI1").unwrap();
    driver.acquire("AI1").unwrap();
    let card   = driver.find_card("AI1").unwrap();
    let before = card.lock().unwrap().clone();
    assert_eq!(driver.read_channel("AI1", 99, FieldType::Double), Err(Xy5320Error::InvalidChannel));
    assert_eq!(driver.read_channel("AI2", 0, FieldType::Double), Err(Xy5320Error::CardNotFound));
    let after  = card.lock().unwrap().clone();
    assert_eq!(after.raw, before.raw);
    assert_eq!(after.auto_zero, before.auto_zero);
    assert_eq!(after.calibration, before.calibration);
    assert_eq!(after.corrected, before.corrected);
    assert_eq!(after.analog, before.analog);
  }

  #[test]
  fn zero_point_all_gains() {
    let ranges = [VoltageRange::Bipolar5, VoltageRange::Bipolar10, VoltageRange::Unipolar10];
    for range in ranges {
      for gain in [Gain::X1, Gain::X2, Gain::X4, Gain::X8] {
        let point = Correction::ideal(range, gain);
        let (_, volts) = correct_channel(&point, gain, 4096.0, 0x8130, 0x8130, 0xf010).unwrap();
        let expected = point.cal_lo * gain.factor() as f64;
        assert!((volts - expected).abs() < 1e-9, "{} {:?}: {}", range, gain, volts);
        if range != VoltageRange::Unipolar10 {
          assert!(volts.abs() < 1e-9);
        }
      }
    }
  }

  #[test]
  fn ideal_board_reads_inputs() {
    let inputs = |c : u8| -> f64 { [1.5, -2.0, 0.25][c as usize] };
    let (_, _, driver) = ai_setup(Xy5320Sim::ideal(VoltageRange::Bipolar10, inputs));
    driver.create_with_channels("AI1", AI_SITE, "-10TO10", "DIF", 4, &[(0, 1), (1, 2), (2, 8)]).unwrap();
    // nothing before the first calibration
    assert_eq!(driver.acquire("AI1"), Ok(false));
    driver.calibrate("AI1").unwrap();
    assert_eq!(driver.acquire("AI1"), Ok(true));
    let expected = [1.5, -4.0, 2.0];
    for (chan, exp) in expected.iter().enumerate() {
      match driver.read_channel("AI1", chan as i32, FieldType::Double).unwrap() {
        ChannelValue::Double(v) => assert!((v - exp).abs() < 0.02, "chan {}: {}", chan, v),
        other => panic!("unexpected {:?}", other),
      }
    }
    let card = driver.find_card("AI1").unwrap();
    let data = card.lock().unwrap();
    assert!(data.calibrated);
    assert!(data.last_calibration.is_some());
    assert_eq!(data.mode, SweepMode::Dif);
  }

  #[test]
  fn read_array_layout() {
    let (_, _, driver) = ai_setup(counting_sim());
    driver.create_with_channels("AI1", AI_SITE, "-5TO5", "SE", 1, &[(3, 1), (22, 1), (7, 1)]).unwrap();
    {
      let card     = driver.find_card("AI1").unwrap();
      let mut data = card.lock().unwrap();
      data.corrected = vec![10, 20, 30];
      data.analog    = vec![0.5, 1.5, 2.5];
    }
    assert_eq!(driver.read_array("AI1", 1, 7, FieldType::Long),
               Ok(Waveform::Long(vec![2, 22, 7, 20, 30])));
    assert_eq!(driver.read_array("AI1", 0, 3, FieldType::Double),
               Ok(Waveform::Double(vec![1.0, 3.0, 0.5])));
    assert_eq!(driver.read_array("AI1", 0, 2, FieldType::Long),
               Ok(Waveform::Long(vec![0])));
    assert_eq!(driver.read_array("AI1", 3, 7, FieldType::Long), Err(Xy5320Error::InvalidChannelIndex));
    assert_eq!(driver.read_array("AI1", -1, 7, FieldType::Long), Err(Xy5320Error::InvalidChannelIndex));
    assert_eq!(driver.read_array("AI1", 0, 0, FieldType::Long), Err(Xy5320Error::NoSpace));
    assert_eq!(driver.find_channel("AI1", 22), Ok(1));
    assert_eq!(driver.num_channels("AI1"), Ok(3));
  }

  #[test]
  fn create_from_channel_file() {
    let (_, _, driver) = ai_setup(counting_sim());
    let path = write_file("good.txt", "# chan gain\n 0 1\n4, 2  # second\n\n12 8\n");
    driver.create("AI1", AI_SITE, "0TO10", "DIF", 1000, &path).unwrap();
    let card = driver.find_card("AI1").unwrap();
    assert_eq!(card.num_channels(), 3);
    assert_eq!(card.average(), 256);
    assert_eq!(card.channels()[1].gain, Gain::X2);
    assert_eq!(driver.create("AI1", AI_SITE, "0TO10", "DIF", 1, "/nonexistent/chans.txt"),
               Err(Xy5320Error::DuplicateDevice));
    std::fs::remove_file(path).ok();
  }

  #[test]
  fn channel_file_errors() {
    let (_, _, driver) = ai_setup(counting_sim());
    let cases = [
      ("fmt.txt",   "0 1\n3\n",     Xy5320Error::FileFormatError),
      ("gain.txt",  "0 3\n",        Xy5320Error::InvalidGain),
      ("chan.txt",  "20 1\n",       Xy5320Error::InvalidChannel),
      ("dup.txt",   "1 1\n1 2\n",   Xy5320Error::DuplicateChannel),
      ("empty.txt", "# nothing\n",  Xy5320Error::NoChannels),
    ];
    for (name, content, err) in cases {
      let path = write_file(name, content);
      assert_eq!(driver.create("AI1", AI_SITE, "-5TO5", "DIF", 1, &path), Err(err), "{}", name);
      std::fs::remove_file(path).ok();
    }
    assert_eq!(driver.create("AI1", AI_SITE, "-5TO5", "DIF", 1, "/nonexistent/chans.txt"),
               Err(Xy5320Error::FileOpenFailed));
    assert_eq!(driver.create_with_channels("AI1", AI_SITE, "+-5", "DIF", 1, &[(0, 1)]),
               Err(Xy5320Error::VoltRangeError));
    assert_eq!(driver.create_with_channels("AI1", AI_SITE, "-5TO5", "DIFF", 1, &[(0, 1)]),
               Err(Xy5320Error::ModeError));
    assert_eq!(driver.create_with_channels("AI1", Site::new(0, 3), "-5TO5", "DIF", 1, &[(0, 1)]),
               Err(Xy5320Error::NotValidated));
    assert!(driver.names().is_empty());
  }

  #[test]
  fn periodic_tasks() {
    let inputs = |_c : u8| -> f64 { 1.0 };
    let (_, _, driver) = ai_setup(Xy5320Sim::ideal(VoltageRange::Bipolar5, inputs));
    driver.create_with_channels("AI1", AI_SITE, "-5TO5", "DIF", 2, &[(0, 1), (5, 4)]).unwrap();
    let tc      = Arc::new(Mutex::new(ThreadControl::new()));
    let periods = TaskPeriods {
      calibration : Duration::from_secs(60),
      read        : Duration::from_millis(10),
    };
    let handles = driver.initialise(periods, tc.clone()).unwrap();
    assert_eq!(handles.len(), 2);
    std::thread::sleep(Duration::from_millis(100));
    // gate still closed
    assert!(!driver.find_card("AI1").unwrap().lock().unwrap().calibrated);
    tc.lock().unwrap().interrupts_accepted = true;
    std::thread::sleep(Duration::from_millis(500));
    match driver.read_channel("AI1", 5, FieldType::Double).unwrap() {
      ChannelValue::Double(v) => assert!((v - 4.0).abs() < 0.02, "{}", v),
      other => panic!("unexpected {:?}", other),
    }
    tc.lock().unwrap().stop_flag = true;
    for h in handles {
      h.join().unwrap();
    }
    let tc = tc.lock().unwrap();
    assert!(!tc.thread_read_active);
    assert!(!tc.thread_calibration_active);
  }

  #[test]
  fn no_tasks_without_cards() {
    let (_, _, driver) = ai_setup(counting_sim());
    let tc = Arc::new(Mutex::new(ThreadControl::new()));
    assert!(driver.initialise(TaskPeriods::default(), tc.clone()).unwrap().is_empty());
    tc.lock().unwrap().stop_flag = true;
    assert!(!wait_for_interrupt_accept(&tc));
  }

  #[test]
  fn poisoned_thread_control_ends_wait() {
    let tc  = Arc::new(Mutex::new(ThreadControl::new()));
    let tc2 = tc.clone();
    let res = std::thread::spawn(move || {
      let _guard = tc2.lock().unwrap();
      panic!("poisoning the ThreadControl");
    }).join();
    assert!(res.is_err());
    assert!(tc.is_poisoned());
    assert!(!wait_for_interrupt_accept(&tc));
  }

  ///////////////////////////////////////////////////////

  #[test]
  fn trigger_links() {
    let carrier = Arc::new(SimCarrier::new());
    let regs    = Arc::new(SimRegisters::with_id(0xa3, IP_MODEL_ACROMAG_IP330));
    carrier.install(Site::new(0, 2), regs.clone()).unwrap();
    let driver  = TriggerDriver::new(carrier.clone());
    assert_eq!(driver.create("TRG0", Site::new(0, 2), TriggerKind::Ip231), Err(TriggerError::ValidateFailed));
    driver.create("TRG1", Site::new(0, 2), TriggerKind::Ip330).unwrap();

    assert_eq!(driver.parse_link("TRG1:SIMUL").err(), Some(TriggerError::BadParameter));
    assert_eq!(driver.parse_link("TRG2:START").err(), Some(TriggerError::CardNotFound));
    assert_eq!(driver.parse_link("TRG1").err(), Some(TriggerError::BadLink));
    assert_eq!(driver.parse_link(":START").err(), Some(TriggerError::BadLink));

    let link = driver.parse_link("TRG1:START").unwrap();
    assert!(!driver.write_bo(&link, 0));
    assert_eq!(regs.read_u16(IP330_TRIGGER_OFFSET), 0);
    assert!(driver.write_bo(&link, 1));
    assert_eq!(regs.read_u16(IP330_TRIGGER_OFFSET), 0x0001);
    assert_eq!(link.card.n_fired(), 1);
  }
}
