//! Report reader loop
//!
//! One dedicated thread per device reads interrupt reports and hands each
//! one to a handler, strictly in order. The loop owns nothing but the read
//! buffer; device state lives in the handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::device_registry::MAX_REPORT_SIZE;
use crate::error::TransportError;
use crate::ReportSource;

/// Configuration for the report reader loop
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Read timeout (how often the shutdown flag is checked when idle)
    pub read_timeout: Duration,
    /// Sleep duration on a transient error before retrying
    pub error_sleep: Duration,
    /// Consecutive transient errors tolerated before giving up
    pub max_consecutive_errors: u32,
    /// Name prefix for debug logging
    pub name: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            error_sleep: Duration::from_millis(100),
            max_consecutive_errors: 50,
            name: "keypad".to_string(),
        }
    }
}

/// Why the reader loop returned
#[derive(Debug)]
pub enum ReaderExit {
    /// Shutdown flag was set
    Shutdown,
    /// Device went away
    Disconnected,
    /// Too many consecutive read errors
    Failed(TransportError),
    /// Handler asked to stop
    Stopped,
}

/// Read reports until shutdown, disconnect or handler stop
///
/// The handler receives the report id (first byte) and the whole report
/// including that byte. Returning `false` stops the loop.
///
/// # Example
/// ```ignore
/// run_report_reader_loop(&transport, &shutdown, &ReaderConfig::default(), |id, data| {
///     ctx.raw_event(id, data).is_ok()
/// });
/// ```
pub fn run_report_reader_loop<S, F>(
    source: &S,
    shutdown: &Arc<AtomicBool>,
    config: &ReaderConfig,
    mut handler: F,
) -> ReaderExit
where
    S: ReportSource + ?Sized,
    F: FnMut(u8, &[u8]) -> bool,
{
    debug!("{} report reader started", config.name);
    let mut buf = [0u8; MAX_REPORT_SIZE];
    let start_time = Instant::now();
    let mut consecutive_errors = 0u32;

    let exit = loop {
        if shutdown.load(Ordering::Relaxed) {
            break ReaderExit::Shutdown;
        }

        match source.read_report(&mut buf, config.read_timeout) {
            Ok(Some(len)) if len > 0 => {
                consecutive_errors = 0;
                let report = &buf[..len];
                trace!(
                    "{} report at {:.3}s: {:02X?}",
                    config.name,
                    start_time.elapsed().as_secs_f64(),
                    report
                );
                if !handler(report[0], report) {
                    break ReaderExit::Stopped;
                }
            }
            Ok(_) => {
                // Timeout or zero-length packet
            }
            Err(TransportError::Disconnected) => break ReaderExit::Disconnected,
            Err(e) => {
                consecutive_errors += 1;
                warn!("{} report reader error: {}", config.name, e);
                if consecutive_errors >= config.max_consecutive_errors {
                    break ReaderExit::Failed(e);
                }
                std::thread::sleep(config.error_sleep);
            }
        }
    };

    debug!("{} report reader exiting: {:?}", config.name, exit);
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays a scripted sequence of read results
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Option<Vec<u8>>, TransportError>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Option<Vec<u8>>, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    impl ReportSource for ScriptedSource {
        fn read_report(
            &self,
            buf: &mut [u8],
            _timeout: Duration,
        ) -> Result<Option<usize>, TransportError> {
            match self.script.lock().pop_front() {
                Some(Ok(Some(data))) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(Some(data.len()))
                }
                Some(Ok(None)) => Ok(None),
                Some(Err(e)) => Err(e),
                None => Err(TransportError::Disconnected),
            }
        }
    }

    fn fast_config() -> ReaderConfig {
        ReaderConfig {
            error_sleep: Duration::from_millis(0),
            max_consecutive_errors: 3,
            ..ReaderConfig::default()
        }
    }

    #[test]
    fn test_reports_delivered_in_order() {
        let source = ScriptedSource::new(vec![
            Ok(Some(vec![0x02, 0x01, 0x13])),
            Ok(None),
            Ok(Some(vec![0x02, 0x00, 0x00])),
        ]);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut seen = Vec::new();

        let exit = run_report_reader_loop(&source, &shutdown, &fast_config(), |id, data| {
            seen.push((id, data.to_vec()));
            true
        });

        assert!(matches!(exit, ReaderExit::Disconnected));
        assert_eq!(
            seen,
            vec![(0x02, vec![0x02, 0x01, 0x13]), (0x02, vec![0x02, 0x00, 0x00])]
        );
    }

    #[test]
    fn test_shutdown_flag_stops_loop() {
        let source = ScriptedSource::new(vec![Ok(Some(vec![0x02, 0x01, 0x13]))]);
        let shutdown = Arc::new(AtomicBool::new(true));
        let mut calls = 0;

        let exit = run_report_reader_loop(&source, &shutdown, &fast_config(), |_, _| {
            calls += 1;
            true
        });

        assert!(matches!(exit, ReaderExit::Shutdown));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_persistent_errors_give_up() {
        let source = ScriptedSource::new(vec![
            Err(TransportError::Usb("pipe".into())),
            Err(TransportError::Usb("pipe".into())),
            Err(TransportError::Usb("pipe".into())),
        ]);
        let shutdown = Arc::new(AtomicBool::new(false));

        let exit = run_report_reader_loop(&source, &shutdown, &fast_config(), |_, _| true);
        assert!(matches!(exit, ReaderExit::Failed(TransportError::Usb(_))));
    }

    #[test]
    fn test_handler_can_stop_loop() {
        let source = ScriptedSource::new(vec![
            Ok(Some(vec![0x02, 0x01, 0x13])),
            Ok(Some(vec![0x02, 0x00, 0x00])),
        ]);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut calls = 0;

        let exit = run_report_reader_loop(&source, &shutdown, &fast_config(), |_, _| {
            calls += 1;
            false
        });

        assert!(matches!(exit, ReaderExit::Stopped));
        assert_eq!(calls, 1);
    }
}
