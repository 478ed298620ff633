use criterion::{
    black_box,
    criterion_group,
    criterion_main,
    Criterion
};
use rand::Rng;
use std::sync::Arc;

use ipac_lib::ip470::addressing::{concat_ports,
                                  extract,
                                  split_span,
                                  DataSize};
use ipac_lib::ip470::sim::Ip470Sim;
use ipac_lib::{Ip470Driver, SimCarrier, Site};
use ipac_lib::xy5320::correction::{correct_channel, Correction};
use ipac_lib::xy5320::{Gain, VoltageRange};

fn bench_addressing(c : &mut Criterion) {
  let mut rng = rand::thread_rng();
  let ports : Vec<u8> = (0..3).map(|_| rng.gen()).collect();
  let value : u32     = rng.gen_range(0..0x10000);

  c.bench_function("split_span word at bit 5", |b| {
      b.iter(|| split_span(black_box(1), black_box(5), black_box(value), 16))
  });

  c.bench_function("extract word from 3 ports", |b| {
      b.iter(|| extract(concat_ports(black_box(&ports)), black_box(3), DataSize::Word))
  });
}

fn bench_sim_board(c : &mut Criterion) {
  let carrier = Arc::new(SimCarrier::new());
  let site    = Site::new(0, 0);
  if carrier.install(site, Arc::new(Ip470Sim::new())).is_err() {
    return;
  }
  let driver  = Ip470Driver::new(carrier);
  if driver.create("DIO1", site, "STANDARD", "", None, 0, 0, 0).is_err() {
    return;
  }

  c.bench_function("write word to simulated IP470", |b| {
      b.iter(|| driver.write("DIO1", black_box(2), black_box(3), DataSize::Word, 0xbeef, 16))
  });

  c.bench_function("read word from simulated IP470", |b| {
      b.iter(|| driver.read("DIO1", black_box(2), black_box(3), DataSize::Word))
  });
}

fn bench_correction(c : &mut Criterion) {
  let mut rng = rand::thread_rng();
  let raw : Vec<u16> = (0..40).map(|_| rng.gen_range(0x1000..0xf000)).collect();
  let point = Correction::ideal(VoltageRange::Bipolar10, Gain::X2);

  c.bench_function("correct 40 channels", |b| {
      b.iter(|| {
        for r in raw.iter() {
          let _ = correct_channel(&point, Gain::X2, 4096.0, black_box(*r), 0x8000, 0xfa00);
        }
      })
  });
}

criterion_group!(benches, bench_addressing, bench_sim_board, bench_correction);
criterion_main!(benches);
