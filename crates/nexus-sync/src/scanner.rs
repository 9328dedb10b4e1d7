//! # Scan Listener
//!
//! Drives a [`BarcodeDecoder`] from a background task so partial buffers are
//! dropped as soon as the idle timeout passes, not only on the next key.
//!
//! ## Task Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ScanListener task                              │
//! │                                                                         │
//! │   ScannerHandle::press ──► mpsc<KeyEvent> ──┐                           │
//! │                                             ▼                           │
//! │                                    ┌─────────────────┐                  │
//! │   idle timer (decoder.deadline) ──►│ BarcodeDecoder  │                  │
//! │                                    └────────┬────────┘                  │
//! │   shutdown ──► break                        │ ScanEvent                 │
//! │                                             ▼                           │
//! │                                  broadcast<ScanEvent> ──► subscribers   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timestamps come from `tokio::time`, so paused-clock tests drive the idle
//! timer deterministically.

use nexus_core::{BarcodeDecoder, EventTarget, Key, KeyEvent, ScanEvent, ScannerConfig};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

const KEY_CHANNEL_CAPACITY: usize = 256;
const SCAN_CHANNEL_CAPACITY: usize = 16;

/// Background task owning one decoder.
pub struct ScanListener {
    decoder: BarcodeDecoder,
    keys_rx: mpsc::Receiver<KeyEvent>,
    scans_tx: broadcast::Sender<ScanEvent>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl ScanListener {
    /// Spawns the listener and returns its handle.
    pub fn spawn(config: ScannerConfig) -> ScannerHandle {
        let (keys_tx, keys_rx) = mpsc::channel(KEY_CHANNEL_CAPACITY);
        let (scans_tx, _) = broadcast::channel(SCAN_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let listener = ScanListener {
            decoder: BarcodeDecoder::new(config),
            keys_rx,
            scans_tx: scans_tx.clone(),
            shutdown_rx,
        };
        let task = tokio::spawn(listener.run());

        ScannerHandle {
            keys_tx,
            scans_tx,
            shutdown_tx,
            task,
        }
    }

    async fn run(mut self) {
        debug!(
            min_length = self.decoder.config().min_length,
            idle_timeout = ?self.decoder.config().idle_timeout,
            "Scan listener starting"
        );

        loop {
            let deadline = self.decoder.deadline();

            tokio::select! {
                event = self.keys_rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if let Some(scan) = self.decoder.handle(&event) {
                        info!(length = scan.code.len(), "Barcode scanned");
                        // No subscribers is not an error.
                        let _ = self.scans_tx.send(scan);
                    }
                }

                _ = idle(deadline) => {
                    if self.decoder.expire(Instant::now().into_std()) {
                        debug!("Partial scan discarded after idle timeout");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    break;
                }
            }
        }

        debug!("Scan listener stopped");
    }
}

async fn idle(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Feeds keys to a running [`ScanListener`] and hands out scan streams.
#[derive(Debug)]
pub struct ScannerHandle {
    keys_tx: mpsc::Sender<KeyEvent>,
    scans_tx: broadcast::Sender<ScanEvent>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ScannerHandle {
    /// Forwards a key event as reported by the input layer.
    pub async fn send(&self, event: KeyEvent) -> SyncResult<()> {
        self.keys_tx.send(event).await.map_err(|_| stopped())
    }

    /// Non-blocking [`ScannerHandle::send`], for synchronous input callbacks.
    pub fn try_send(&self, event: KeyEvent) -> SyncResult<()> {
        self.keys_tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                SyncError::Internal("Scanner key queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => stopped(),
        })
    }

    /// Sends `key` aimed at `target`, stamped with the current time.
    pub async fn press(&self, key: Key, target: EventTarget) -> SyncResult<()> {
        self.send(KeyEvent {
            key,
            target,
            at: Instant::now().into_std(),
        })
        .await
    }

    /// A new receiver of every scan decoded from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.scans_tx.subscribe()
    }

    /// Calls `callback` for each scan until the returned handle is dropped.
    pub fn subscribe_to_scans<F>(&self, callback: F) -> ScanSubscription
    where
        F: Fn(ScanEvent) + Send + Sync + 'static,
    {
        let mut scans = self.scans_tx.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match scans.recv().await {
                    Ok(scan) => callback(scan),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Scan subscriber fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        ScanSubscription { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the listener and waits for it to exit.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = (&mut self.task).await;
    }
}

impl Drop for ScannerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn stopped() -> SyncError {
    SyncError::Internal("Scan listener is not running".to_string())
}

/// Stops forwarding scans to a callback when dropped.
#[derive(Debug)]
pub struct ScanSubscription {
    task: JoinHandle<()>,
}

impl Drop for ScanSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    async fn type_code(handle: &ScannerHandle, code: &str) {
        for c in code.chars() {
            handle.press(Key::Char(c), EventTarget::Document).await.unwrap();
        }
        handle.press(Key::Enter, EventTarget::Document).await.unwrap();
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_burst_is_one_scan() {
        let handle = ScanListener::spawn(ScannerConfig::default());
        let mut scans = handle.subscribe();

        type_code(&handle, "7790001").await;

        let scan = scans.recv().await.unwrap();
        assert_eq!(scan.code, "7790001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gap_discards_partial_buffer() {
        let handle = ScanListener::spawn(ScannerConfig::default());
        let mut scans = handle.subscribe();

        handle.press(Key::Char('A'), EventTarget::Document).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        type_code(&handle, "BCD").await;

        let scan = scans.recv().await.unwrap();
        assert_eq!(scan.code, "BCD");
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_code_and_editable_target_ignored() {
        let handle = ScanListener::spawn(ScannerConfig::default());
        let mut scans = handle.subscribe();

        type_code(&handle, "12").await;
        for c in "7790001".chars() {
            handle.press(Key::Char(c), EventTarget::TextInput).await.unwrap();
        }
        handle.press(Key::Enter, EventTarget::TextInput).await.unwrap();
        settle().await;

        assert!(matches!(scans.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_subscription_stops_on_drop() {
        let handle = ScanListener::spawn(ScannerConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = handle.subscribe_to_scans(move |scan| {
            sink.lock().unwrap().push(scan.code);
        });

        type_code(&handle, "ABC").await;
        settle().await;
        drop(subscription);
        type_code(&handle, "DEF").await;
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec!["ABC".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let mut handle = ScanListener::spawn(ScannerConfig::default());
        assert!(handle.is_running());

        handle.shutdown().await;

        assert!(!handle.is_running());
        let err = handle
            .press(Key::Char('A'), EventTarget::Document)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Internal(_)));
    }
}
