//! Blocking line reader for control commands
//!
//! Runs on its own thread. End of input ends the reader but never the
//! process: the daemon keeps running without a control channel.

use std::io::BufRead;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::lifecycle::RunFlag;

use super::controller::{Controller, Flow};
use super::protocol::{CommandParseError, ControlCommand};
use super::ControlError;

pub fn spawn_reader<R>(
    input: R,
    controller: Arc<Controller>,
    running: RunFlag,
) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("command-reader".to_string())
        .spawn(move || {
            info!("command reader started");
            match read_commands(input, &controller, &running) {
                Ok(()) => info!("command reader stopped"),
                Err(ControlError::ChannelClosed) => {
                    info!("control channel closed, continuing without commands")
                }
                Err(e) => warn!(%e, "command reader failed"),
            }
        })
}

fn read_commands<R: BufRead>(
    mut input: R,
    controller: &Controller,
    running: &RunFlag,
) -> Result<(), ControlError> {
    let mut line = String::new();
    while running.is_running() {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(ControlError::ChannelClosed);
        }
        // The flag may have dropped while the read was blocked
        if !running.is_running() {
            break;
        }

        let command = match line.parse::<ControlCommand>() {
            Ok(command) => command,
            Err(CommandParseError::Empty) => continue,
            Err(e) => {
                warn!(line = %line.trim(), %e, "ignoring control line");
                continue;
            }
        };
        if controller.apply(command) == Flow::Exit {
            debug!("reader leaving on exit command");
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Action;
    use crate::control::controller::tests::harness;
    use std::io::Cursor;

    #[test]
    fn test_eof_closes_channel_quietly() {
        let h = harness(false, true);
        let result = read_commands(Cursor::new("get_status\n"), &h.controller, &h.ctx.running);
        assert!(matches!(result, Err(ControlError::ChannelClosed)));
        assert!(h.ctx.running.is_running());
        assert_eq!(h.capture.lines().len(), 5);
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let h = harness(false, true);
        let input = "\nnonsense\nset_capture_index:-3\ntoggle_audio\nexit\ntoggle_detection\n";
        let result = read_commands(Cursor::new(input), &h.controller, &h.ctx.running);
        assert!(result.is_ok());
        assert_eq!(h.sink.actions(), vec![Action::Connect]);
        assert_eq!(h.ctx.requests.capture_index(), 0);
        // Nothing after exit is applied
        assert!(!h.ctx.mode.detection_enabled());
        assert!(!h.ctx.running.is_running());
    }

    #[test]
    fn test_reader_thread_exits_on_eof() {
        let h = harness(false, true);
        let controller = Arc::new(h.controller);
        let handle = spawn_reader(
            Cursor::new("set_auto_enabled:yes\n"),
            Arc::clone(&controller),
            h.ctx.running.clone(),
        )
        .unwrap();
        handle.join().unwrap();
        assert!(h.ctx.mode.detection_enabled());
        assert!(h.ctx.running.is_running());
    }
}
