use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::io::BufRead;

/// Reserved key that stops the calibration and tracking loops
pub const QUIT_KEY: char = 'q';

/// Pending key presses buffered between frames
const KEY_BUFFER: usize = 8;

/// Operator pointer input on the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Move { x: u32, y: u32 },
    Click { x: u32, y: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pointer(PointerEvent),
    Key(char),
}

/// Trait for key press sources, polled once per frame without waiting
pub trait KeySource {
    fn poll_key(&mut self) -> Option<char>;
}

impl KeySource for Receiver<char> {
    fn poll_key(&mut self) -> Option<char> {
        self.try_recv().ok()
    }
}

/// Parse one console line: `click X Y`, `move X Y`, or a single key
pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?;

    let mut coords = || -> Option<(u32, u32)> {
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        Some((x, y))
    };

    match head {
        "click" | "c" => {
            let (x, y) = coords()?;
            Some(Command::Pointer(PointerEvent::Click { x, y }))
        }
        "move" | "m" => {
            let (x, y) = coords()?;
            Some(Command::Pointer(PointerEvent::Move { x, y }))
        }
        key => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Command::Key(c)),
                _ => None,
            }
        }
    }
}

/// Operator input read from stdin on a background thread
///
/// Pointer events are handed to the callback on the reader thread, so they
/// arrive asynchronously to the frame loop. Key presses are queued and picked
/// up by [`KeySource::poll_key`].
pub struct ConsoleInput {
    keys: Receiver<char>,
}

impl ConsoleInput {
    pub fn spawn<F>(on_pointer: F) -> Result<Self>
    where
        F: Fn(PointerEvent) + Send + 'static,
    {
        let (sender, keys) = crossbeam_channel::bounded(KEY_BUFFER);

        std::thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                read_commands(stdin.lock(), &sender, &on_pointer);
            })
            .context("Failed to spawn console input thread")?;

        tracing::info!(
            "Console input ready: 'click X Y', 'move X Y', '{}' to quit",
            QUIT_KEY
        );

        Ok(Self { keys })
    }
}

impl KeySource for ConsoleInput {
    fn poll_key(&mut self) -> Option<char> {
        self.keys.poll_key()
    }
}

/// Dispatch commands until the reader ends or the key receiver is gone
fn read_commands<R, F>(reader: R, keys: &Sender<char>, on_pointer: &F)
where
    R: BufRead,
    F: Fn(PointerEvent),
{
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to read console input: {}", e);
                break;
            }
        };

        match parse_command(&line) {
            Some(Command::Pointer(event)) => on_pointer(event),
            Some(Command::Key(key)) => match keys.try_send(key) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Dropping key '{}', too many pending", key);
                }
                Err(TrySendError::Disconnected(_)) => break,
            },
            None if line.trim().is_empty() => {}
            None => tracing::warn!("Unrecognized input: {}", line.trim()),
        }
    }
    tracing::debug!("Console input closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_parse_pointer_commands() {
        assert_eq!(
            parse_command("click 12 34"),
            Some(Command::Pointer(PointerEvent::Click { x: 12, y: 34 }))
        );
        assert_eq!(
            parse_command("  m 1 2 "),
            Some(Command::Pointer(PointerEvent::Move { x: 1, y: 2 }))
        );
        assert_eq!(parse_command("click 12"), None);
        assert_eq!(parse_command("click -1 4"), None);
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!(parse_command("q"), Some(Command::Key(QUIT_KEY)));
        assert_eq!(parse_command("quit"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_read_commands_dispatches() {
        let input = b"move 3 4\nbogus line\nclick 5 6\nq\n";
        let (sender, mut keys) = crossbeam_channel::bounded(KEY_BUFFER);
        let seen = RefCell::new(Vec::new());

        read_commands(&input[..], &sender, &|event| seen.borrow_mut().push(event));

        assert_eq!(
            seen.into_inner(),
            vec![
                PointerEvent::Move { x: 3, y: 4 },
                PointerEvent::Click { x: 5, y: 6 }
            ]
        );
        assert_eq!(keys.poll_key(), Some(QUIT_KEY));
        assert_eq!(keys.poll_key(), None);
    }
}
