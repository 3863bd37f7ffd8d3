// Communication channels lock-free
//
// Command channels carry serialized CommandBlocks as raw bytes through a
// single-producer/single-consumer ring. A write either stores a whole
// block or nothing: the producer learns about a full buffer immediately
// and never waits for the audio thread.

use crate::messaging::command::{COMMAND_BLOCK_SIZE, CommandBlock};
use crate::messaging::notification::Notification;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("ring buffer full ({free} bytes free, {needed} needed)")]
    Full { free: usize, needed: usize },
}

/// Producer end of a command channel (CLI, GUI, MIDI or a reply path)
pub struct CommandSender {
    inner: HeapProd<u8>,
}

/// Consumer end of a command channel
pub struct CommandReceiver {
    inner: HeapCons<u8>,
}

/// Create a byte ring able to hold `capacity_blocks` whole CommandBlocks
pub fn create_command_channel(capacity_blocks: usize) -> (CommandSender, CommandReceiver) {
    let rb = HeapRb::<u8>::new(capacity_blocks.max(1) * COMMAND_BLOCK_SIZE);
    let (prod, cons) = rb.split();
    (CommandSender { inner: prod }, CommandReceiver { inner: cons })
}

impl CommandSender {
    /// Append one block; fails without writing anything if it does not fit
    pub fn try_send(&mut self, block: &CommandBlock) -> Result<(), ChannelError> {
        let free = self.inner.vacant_len();
        if free < COMMAND_BLOCK_SIZE {
            return Err(ChannelError::Full {
                free,
                needed: COMMAND_BLOCK_SIZE,
            });
        }
        let written = self.inner.push_slice(&block.to_bytes());
        debug_assert_eq!(written, COMMAND_BLOCK_SIZE);
        Ok(())
    }

    pub fn free_bytes(&self) -> usize {
        self.inner.vacant_len()
    }

    pub fn capacity_bytes(&self) -> usize {
        self.inner.capacity().get()
    }
}

impl CommandReceiver {
    /// Pop exactly one block, or nothing when less than a block is queued
    pub fn try_recv(&mut self) -> Option<CommandBlock> {
        if self.inner.occupied_len() < COMMAND_BLOCK_SIZE {
            return None;
        }
        let mut bytes = [0u8; COMMAND_BLOCK_SIZE];
        let read = self.inner.pop_slice(&mut bytes);
        debug_assert_eq!(read, COMMAND_BLOCK_SIZE);
        Some(CommandBlock::from_bytes(&bytes))
    }

    /// Whole blocks waiting to be read
    pub fn pending(&self) -> usize {
        self.inner.occupied_len() / COMMAND_BLOCK_SIZE
    }

    pub fn pending_bytes(&self) -> usize {
        self.inner.occupied_len()
    }
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

/// Producer shared by every client of the process; pushed with `try_lock`
#[derive(Clone)]
pub struct NotificationSink {
    tx: Arc<Mutex<NotificationProducer>>,
    dropped: Arc<AtomicU64>,
}

impl NotificationSink {
    pub fn new(tx: NotificationProducer) -> Self {
        Self {
            tx: Arc::new(Mutex::new(tx)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push without blocking; a busy or full channel counts a drop
    pub fn notify(&self, notification: Notification) {
        let pushed = match self.tx.try_lock() {
            Ok(mut tx) => tx.try_push(notification).is_ok(),
            Err(_) => false,
        };
        if !pushed {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Notifications lost since the last call
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

impl From<NotificationProducer> for NotificationSink {
    fn from(tx: NotificationProducer) -> Self {
        Self::new(tx)
    }
}

pub fn notify(sink: &NotificationSink, notification: Notification) {
    sink.notify(notification);
}

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}
