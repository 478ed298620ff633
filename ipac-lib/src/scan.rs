//! Scan notification ("I/O interrupt" scanning)
//!
//! Records which want to be processed when an input
//! changes subscribe to a scan handle. The interrupt
//! handler posts to the handle without blocking and
//! without allocating - the queue is bounded and a
//! post to a full queue is dropped (and counted).

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool,
                        AtomicU64,
                        Ordering};
use std::sync::{Arc, RwLock};

use crossbeam_channel::{bounded,
                        Receiver,
                        Sender,
                        TrySendError};

/// Number of scan handles per view
pub const N_SCAN_HANDLES : usize = 48;
/// Pending notifications per handle
pub const SCAN_QUEUE_DEPTH : usize = 64;

/// The three logical views of the bits of a card
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScanView {
  /// single bit
  Bi,
  /// nibble (up to 4 bits)
  Mbbi,
  /// word (up to 16 bits)
  MbbiDirect,
}

impl ScanView {
  /// How many consecutive bit indices a
  /// subscription of this view covers
  pub fn span(&self) -> usize {
    match self {
      ScanView::Bi         => 1,
      ScanView::Mbbi       => 4,
      ScanView::MbbiDirect => 16,
    }
  }
}

impl FromStr for ScanView {
  type Err = ();

  fn from_str(s : &str) -> Result<Self, Self::Err> {
    match s.trim().to_uppercase().as_str() {
      "BI"         => Ok(ScanView::Bi),
      "MBBI"       => Ok(ScanView::Mbbi),
      "MBBIDIRECT" => Ok(ScanView::MbbiDirect),
      _            => Err(())
    }
  }
}

impl fmt::Display for ScanView {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp = match self {
      ScanView::Bi         => "BI",
      ScanView::Mbbi       => "MBBI",
      ScanView::MbbiDirect => "MBBIDIRECT",
    };
    write!(f, "{}", disp)
  }
}

/// What a subscriber learns about an interrupt
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScanEvent {
  /// the interrupt bit number
  pub index : u8,
  /// new logical state of the bit
  pub state : u8,
}

/// One scan list. Every subscriber gets its own
/// bounded queue, so a post reaches all of them.
pub struct ScanIo {
  depth      : usize,
  senders    : RwLock<Vec<Sender<ScanEvent>>>,
  subscribed : AtomicBool,
  n_posted   : AtomicU64,
  n_dropped  : AtomicU64,
}

impl ScanIo {
  pub fn new(depth : usize) -> Self {
    Self {
      depth,
      senders    : RwLock::new(Vec::new()),
      subscribed : AtomicBool::new(false),
      n_posted   : AtomicU64::new(0),
      n_dropped  : AtomicU64::new(0),
    }
  }

  /// Obtain a receiver for notifications
  ///
  /// Subscriptions are expected before interrupts
  /// are enabled, the interrupt path only reads
  /// the subscriber list.
  pub fn subscribe(&self) -> Receiver<ScanEvent> {
    let (tx, rx) = bounded(self.depth);
    match self.senders.write() {
      Ok(mut senders) => senders.push(tx),
      Err(poisoned)   => poisoned.into_inner().push(tx),
    }
    self.subscribed.store(true, Ordering::SeqCst);
    rx
  }

  pub fn is_subscribed(&self) -> bool {
    self.subscribed.load(Ordering::Relaxed)
  }

  pub fn n_subscribers(&self) -> usize {
    match self.senders.read() {
      Ok(senders)   => senders.len(),
      Err(poisoned) => poisoned.into_inner().len(),
    }
  }

  /// Post a notification to every subscriber. Never blocks
  /// on a queue; a full queue loses this post.
  ///
  /// Returns true if at least one subscriber got it.
  pub fn request(&self, event : ScanEvent) -> bool {
    if !self.is_subscribed() {
      return false;
    }
    let senders = match self.senders.read() {
      Ok(s)         => s,
      Err(poisoned) => poisoned.into_inner(),
    };
    let mut queued = false;
    for tx in senders.iter() {
      match tx.try_send(event) {
        Ok(_) => {
          self.n_posted.fetch_add(1, Ordering::Relaxed);
          queued = true;
        }
        Err(TrySendError::Full(_)) => {
          self.n_dropped.fetch_add(1, Ordering::Relaxed);
        }
        // the record went away
        Err(TrySendError::Disconnected(_)) => (),
      }
    }
    queued
  }

  pub fn n_posted(&self) -> u64 {
    self.n_posted.load(Ordering::Relaxed)
  }

  pub fn n_dropped(&self) -> u64 {
    self.n_dropped.load(Ordering::Relaxed)
  }
}

/// Scan handles for all three views of a card
pub struct ScanTable {
  bi          : Vec<Arc<ScanIo>>,
  mbbi        : Vec<Arc<ScanIo>>,
  mbbi_direct : Vec<Arc<ScanIo>>,
}

impl ScanTable {
  pub fn new() -> Self {
    let mk = || -> Vec<Arc<ScanIo>> {
      (0..N_SCAN_HANDLES).map(|_| Arc::new(ScanIo::new(SCAN_QUEUE_DEPTH))).collect()
    };
    Self {
      bi          : mk(),
      mbbi        : mk(),
      mbbi_direct : mk(),
    }
  }

  pub fn get(&self, view : ScanView, index : usize) -> Option<Arc<ScanIo>> {
    let handles = match view {
      ScanView::Bi         => &self.bi,
      ScanView::Mbbi       => &self.mbbi,
      ScanView::MbbiDirect => &self.mbbi_direct,
    };
    handles.get(index).cloned()
  }

  /// Notify every subscription whose view
  /// covers the bit `index`.
  ///
  /// A nibble subscription at index i covers bits
  /// i..i+4, a word subscription i..i+16, so the
  /// nibble handles at index-3..=index and the word
  /// handles at index-15..=index are posted.
  pub fn notify(&self, index : usize, state : u8) {
    if index >= N_SCAN_HANDLES {
      return;
    }
    let event = ScanEvent {
      index : index as u8,
      state,
    };
    self.bi[index].request(event);
    for k in 0..ScanView::Mbbi.span() {
      if index < k {
        break;
      }
      self.mbbi[index - k].request(event);
    }
    for k in 0..ScanView::MbbiDirect.span() {
      if index < k {
        break;
      }
      self.mbbi_direct[index - k].request(event);
    }
  }

  /// Total number of posts which were dropped
  pub fn n_dropped(&self) -> u64 {
    self.bi.iter()
      .chain(self.mbbi.iter())
      .chain(self.mbbi_direct.iter())
      .map(|s| s.n_dropped())
      .sum()
  }
}

impl Default for ScanTable {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unsubscribed_handles_are_silent() {
    let io = ScanIo::new(2);
    assert!(!io.request(ScanEvent {index : 0, state : 1}));
    assert_eq!(io.n_posted(), 0);
  }

  #[test]
  fn full_queue_drops() {
    let io = ScanIo::new(1);
    let rx = io.subscribe();
    assert!(io.request(ScanEvent {index : 3, state : 1}));
    assert!(!io.request(ScanEvent {index : 3, state : 0}));
    assert_eq!(io.n_dropped(), 1);
    assert_eq!(rx.try_recv().ok(), Some(ScanEvent {index : 3, state : 1}));
  }

  #[test]
  fn every_subscriber_is_posted() {
    let io = ScanIo::new(4);
    let a  = io.subscribe();
    let b  = io.subscribe();
    assert_eq!(io.n_subscribers(), 2);
    assert!(io.request(ScanEvent {index : 9, state : 1}));
    assert_eq!(a.try_recv().ok(), Some(ScanEvent {index : 9, state : 1}));
    assert_eq!(b.try_recv().ok(), Some(ScanEvent {index : 9, state : 1}));
    assert_eq!(io.n_posted(), 2);
    drop(a);
    assert!(io.request(ScanEvent {index : 9, state : 0}));
    assert_eq!(b.try_recv().ok(), Some(ScanEvent {index : 9, state : 0}));
    assert_eq!(io.n_dropped(), 0);
  }

  #[test]
  fn notify_reaches_overlapping_views() {
    let table = ScanTable::new();
    let nibbles : Vec<_> = (0..N_SCAN_HANDLES).map(|i| table.get(ScanView::Mbbi, i).unwrap().subscribe()).collect();
    let words   : Vec<_> = (0..N_SCAN_HANDLES).map(|i| table.get(ScanView::MbbiDirect, i).unwrap().subscribe()).collect();
    table.notify(2, 1);
    for (i, rx) in nibbles.iter().enumerate() {
      assert_eq!(rx.try_recv().is_ok(), i <= 2, "nibble {}", i);
    }
    for (i, rx) in words.iter().enumerate() {
      assert_eq!(rx.try_recv().is_ok(), i <= 2, "word {}", i);
    }
    table.notify(20, 0);
    for (i, rx) in words.iter().enumerate() {
      assert_eq!(rx.try_recv().is_ok(), i >= 5 && i <= 20, "word {}", i);
    }
  }

  #[test]
  fn view_names() {
    assert_eq!("mbbiDirect".parse::<ScanView>(), Ok(ScanView::MbbiDirect));
    assert!("ao".parse::<ScanView>().is_err());
  }
}
