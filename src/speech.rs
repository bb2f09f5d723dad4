//! Output worker.
//!
//! [`SpeechQueue`] owns one background thread that drains a FIFO channel
//! into a [`MessageSink`], so the foreground flow never waits on output.
//! Messages leave in the order they were queued.

use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::message::{AssistantMessage, MessageSink};

pub struct SpeechQueue {
    tx: Mutex<Option<mpsc::Sender<AssistantMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SpeechQueue {
    /// Start the worker thread feeding `sink`.
    pub fn spawn(sink: Arc<dyn MessageSink>) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<AssistantMessage>();
        let worker = thread::Builder::new()
            .name("speech".into())
            .spawn(move || {
                for msg in rx {
                    sink.emit(&msg);
                }
                tracing::debug!("speech worker drained");
            })?;
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue a message. Dropped with a warning after shutdown.
    pub fn say(&self, msg: AssistantMessage) {
        let tx = self.tx.lock().expect("speech queue lock poisoned");
        match tx.as_ref() {
            Some(tx) => {
                if tx.send(msg).is_err() {
                    tracing::warn!("speech worker is gone, message dropped");
                }
            }
            None => tracing::warn!("speech queue shut down, message dropped"),
        }
    }

    /// Close the queue and wait until every queued message is emitted.
    pub fn shutdown(&self) {
        self.tx.lock().expect("speech queue lock poisoned").take();
        let worker = self.worker.lock().expect("speech queue lock poisoned").take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::warn!("speech worker panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.tx.lock().expect("speech queue lock poisoned").is_some()
    }
}

impl MessageSink for SpeechQueue {
    fn emit(&self, msg: &AssistantMessage) {
        self.say(msg.clone());
    }
}

impl Drop for SpeechQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SpeechQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechQueue")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::VecSink;

    #[test]
    fn shutdown_drains_in_order() {
        let sink = Arc::new(VecSink::new());
        let queue = SpeechQueue::spawn(sink.clone()).unwrap();
        for i in 0..50 {
            queue.say(AssistantMessage::reply(format!("line {i}")));
        }
        queue.shutdown();
        let texts = sink.texts();
        assert_eq!(texts.len(), 50);
        assert_eq!(texts[0], "line 0");
        assert_eq!(texts[49], "line 49");
        assert!(!queue.is_running());
    }

    #[test]
    fn say_after_shutdown_is_dropped() {
        let sink = Arc::new(VecSink::new());
        let queue = SpeechQueue::spawn(sink.clone()).unwrap();
        queue.shutdown();
        queue.say(AssistantMessage::reply("late"));
        queue.shutdown();
        assert!(sink.is_empty());
    }
}
