// SPDX-License-Identifier: GPL-3.0-only

//! Control thread: preview rendering and key handling
//!
//! Runs beside the acquisition loop for as long as the run flag is set. Each
//! tick renders the latest published pair, then waits up to the poll
//! interval for a key. The acquisition loop never waits on this thread
//! except for the final join.

use super::context::{CaptureContext, ControlAction, ToggleSnapshot};
use crate::media::NormalizedPair;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Everything the status line shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub toggles: ToggleSnapshot,
    pub iteration: u64,
    pub failed_writes: u64,
    pub message: String,
}

impl StatusLine {
    pub fn capture(context: &CaptureContext) -> Self {
        Self {
            toggles: context.toggles.snapshot(),
            iteration: context.status.iterations(),
            failed_writes: context.status.sink_failures(),
            message: context.status.message(),
        }
    }
}

/// Where the preview is drawn and keys come from
pub trait PreviewSurface: Send {
    /// Draw the latest pair (if one was published yet) and the status line
    fn render(&mut self, frame: Option<&NormalizedPair>, status: &StatusLine) -> io::Result<()>;

    /// Wait at most `timeout` for a key press
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<char>>;
}

/// Surface for runs without a preview: draws nothing, reads no keys
///
/// Such runs end on Ctrl+C or when the source runs out of frames.
#[derive(Debug, Default)]
pub struct HeadlessSurface;

impl PreviewSurface for HeadlessSurface {
    fn render(&mut self, _frame: Option<&NormalizedPair>, _status: &StatusLine) -> io::Result<()> {
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<char>> {
        thread::sleep(timeout);
        Ok(None)
    }
}

/// Render and poll until the run flag is cleared
pub fn run_control_loop(
    surface: &mut dyn PreviewSurface,
    context: &CaptureContext,
    poll_interval: Duration,
) {
    let mut render_failed = false;

    while context.toggles.is_running() {
        let frame = context.frames.latest();
        let status = StatusLine::capture(context);
        match surface.render(frame.as_deref(), &status) {
            Ok(()) => render_failed = false,
            Err(e) => {
                // Log once per failure streak, the terminal may be gone
                if !render_failed {
                    warn!(error = %e, "Preview render failed");
                }
                render_failed = true;
            }
        }

        match surface.poll_key(poll_interval) {
            Ok(Some(key)) => {
                if let Some(action) = ControlAction::from_key(key) {
                    let message = context.toggles.apply(action);
                    info!(key = %key, ?action, "{}", message);
                    context.status.set_message(message);
                } else {
                    debug!(key = %key, "Ignoring unbound key");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Key polling failed");
                thread::sleep(poll_interval);
            }
        }
    }

    debug!("Control loop finished");
}

/// Handle to the running control thread
pub struct ControlThread {
    handle: JoinHandle<()>,
}

impl ControlThread {
    /// Start the control loop on its own thread; the surface is dropped there when the loop ends
    pub fn spawn(
        mut surface: Box<dyn PreviewSurface>,
        context: Arc<CaptureContext>,
        poll_interval: Duration,
    ) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name("control".to_string())
            .spawn(move || {
                run_control_loop(surface.as_mut(), &context, poll_interval);
                drop(surface);
            })?;
        Ok(Self { handle })
    }

    /// Wait for the control loop to finish; the run flag must already be cleared
    pub fn join(self) {
        if self.handle.join().is_err() {
            error!("Control thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedKeys {
        keys: VecDeque<char>,
        renders: Arc<Mutex<Vec<StatusLine>>>,
    }

    impl PreviewSurface for ScriptedKeys {
        fn render(&mut self, _frame: Option<&NormalizedPair>, status: &StatusLine) -> io::Result<()> {
            self.renders.lock().unwrap().push(status.clone());
            Ok(())
        }

        fn poll_key(&mut self, _timeout: Duration) -> io::Result<Option<char>> {
            Ok(self.keys.pop_front())
        }
    }

    #[test]
    fn test_keys_mutate_toggles_until_quit() {
        let context = CaptureContext::new(false, false);
        let renders = Arc::new(Mutex::new(Vec::new()));
        let mut surface = ScriptedKeys {
            keys: "vxps q".chars().collect(),
            renders: Arc::clone(&renders),
        };

        run_control_loop(&mut surface, &context, Duration::ZERO);

        let snapshot = context.toggles.snapshot();
        assert!(snapshot.video);
        assert!(snapshot.png);
        assert!(snapshot.screenshot_pending);
        assert!(!snapshot.running);
        assert_eq!(context.status.message(), "Stopping");
        // One render per tick, six keys polled
        assert_eq!(renders.lock().unwrap().len(), 6);
    }

    #[test]
    fn test_thread_exits_when_run_flag_clears() {
        let context = Arc::new(CaptureContext::new(false, false));
        let control = ControlThread::spawn(
            Box::new(HeadlessSurface),
            Arc::clone(&context),
            Duration::from_millis(1),
        )
        .unwrap();
        context.toggles.request_stop();
        control.join();
    }
}
