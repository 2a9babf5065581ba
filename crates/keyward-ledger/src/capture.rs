//! Polling capture of a scanned successor key.
//!
//! Rotation needs the next key in hand before it can build a bundle.
//! When that key arrives from an external scanner (QR reader, HSM
//! bridge, paired device), [`capture_key`] polls a [`KeySource`] on a
//! fixed interval until a wire line shows up, the attempt budget runs
//! out, or the caller cancels through a watch channel.

use async_trait::async_trait;
use keyward_protocol::{wire, ScannedKey};
use keyward_types::{KeywardError, Result, RotationConfig};
use tokio::sync::watch;
use tokio::time::{self, Duration};

// ---------------------------------------------------------------------------
// KeySource
// ---------------------------------------------------------------------------

/// One poll of an external key scanner.
///
/// `poll_scan` returns `Ok(None)` while nothing has been scanned yet
/// and `Ok(Some(line))` with the raw wire line once a key arrives.
/// Errors abort the capture immediately.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn poll_scan(&self) -> Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// capture_key
// ---------------------------------------------------------------------------

/// Polls `source` until it yields a parseable wire line.
///
/// # Process
///
/// 1. Tick every `config.capture_poll_ms` milliseconds; the first
///    poll fires immediately.
/// 2. On each tick, ask the source for a scanned line and parse it
///    into a [`ScannedKey`] when present.
/// 3. Between ticks, watch `cancel`; a `true` value or a dropped
///    sender ends the capture.
///
/// # Errors
///
/// Returns [`KeywardError::CaptureTimeout`] when cancelled or when
/// `config.capture_max_attempts` polls pass without a scan, and
/// [`KeywardError::WireFormat`] when the scanned line does not parse.
pub async fn capture_key<S>(
    source: &S,
    config: &RotationConfig,
    cancel: &mut watch::Receiver<bool>,
) -> Result<ScannedKey>
where
    S: KeySource + ?Sized,
{
    let mut interval = time::interval(Duration::from_millis(config.capture_poll_ms));
    let mut attempts: u32 = 0;

    while attempts < config.capture_max_attempts {
        tokio::select! {
            _ = interval.tick() => {
                attempts += 1;
                if let Some(line) = source.poll_scan().await? {
                    let scanned = wire::parse_wire(&line)?;
                    tracing::debug!(
                        address = %scanned.claims.address,
                        attempts,
                        "captured successor key"
                    );
                    return Ok(scanned);
                }
            }
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return Err(KeywardError::CaptureTimeout {
                        reason: "key capture cancelled".to_string(),
                    });
                }
            }
        }
    }

    Err(KeywardError::CaptureTimeout {
        reason: format!("no key scanned after {attempts} polls"),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
