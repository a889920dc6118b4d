//! Serial transport with exponential-backoff reopen.
//!
//! Opening never fails outward: the bridge retries with a doubling
//! delay (1 s up to one hour, reset on success) until the port appears.
//! Runtime read errors are handled by the bridge loop closing and
//! reopening through the same path.

use std::time::Duration;

use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{error, info};

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(3600);

/// Next delay in the backoff sequence: doubled, capped at one hour.
fn next_retry_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_RETRY_DELAY)
}

/// Open the serial port, retrying forever with exponential backoff.
pub async fn open_with_backoff(port: &str, baud_rate: u32) -> SerialStream {
    let mut delay = INITIAL_RETRY_DELAY;
    loop {
        match tokio_serial::new(port, baud_rate).open_native_async() {
            Ok(stream) => {
                info!("opened serial port {port} at {baud_rate} baud");
                return stream;
            }
            Err(e) => {
                error!(
                    "error opening serial port {port}: {e} - retrying in {}s",
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                delay = next_retry_delay(delay);
            }
        }
    }
}
