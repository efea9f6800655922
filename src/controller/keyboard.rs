// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::pack::KeyCode;

const PACK: &str = "pack";
const QUIT: &str = "quit";

/// A driver that reads key codes from stdin, one per line. Codes are decimal
/// or 0x-prefixed hexadecimal. `pack <name>` switches packs and `quit` or
/// end of input stops the driver.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Handles one line of input. Returns false once input is finished.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "Key code ({} <name>, {}): ", PACK, QUIT)?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let input = input.trim();
        let event = match input.split_once(char::is_whitespace) {
            Some((PACK, name)) if !name.trim().is_empty() => {
                Some(Event::SwitchPack(name.trim().to_string()))
            }
            _ if input.eq_ignore_ascii_case(QUIT) => return Ok(false),
            _ if input.is_empty() => None,
            _ => match parse_key_code(input) {
                Some(key) => Some(Event::Key(key)),
                None => {
                    warn!(input, "Unrecognized input");
                    None
                }
            },
        };

        if let Some(event) = event {
            events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Ok(true)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

/// Parses a decimal or 0x-prefixed hexadecimal key code.
fn parse_key_code(input: &str) -> Option<KeyCode> {
    match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => KeyCode::from_str_radix(hex, 16).ok(),
        None => input.parse().ok(),
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader};

    use tokio::sync::mpsc;

    use crate::controller::Event;

    use super::{parse_key_code, Driver};

    fn get_event(input: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(input.as_bytes());
        let mut writer: Vec<u8> = Vec::new();
        let more = Driver::monitor_io(&sender, reader, &mut writer)?;
        assert!(String::from_utf8_lossy(&writer).starts_with("Key code"));

        // Force the sender to close.
        drop(sender);
        Ok((more, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!((true, Some(Event::Key(30))), get_event("30\n")?);
        assert_eq!((true, Some(Event::Key(0xe01d))), get_event("0xe01d\n")?);
        assert_eq!((true, Some(Event::Key(0xe11d))), get_event(" 0XE11D ")?);
        assert_eq!(
            (true, Some(Event::SwitchPack("topre".to_string()))),
            get_event("pack topre\n")?
        );
        assert_eq!((true, None), get_event("pack \n")?);
        assert_eq!((true, None), get_event("unrecognized\n")?);
        assert_eq!((true, None), get_event("70000\n")?);
        assert_eq!((true, None), get_event("\n")?);
        assert_eq!((false, None), get_event("QUIT\n")?);
        assert_eq!((false, None), get_event("")?);
        Ok(())
    }

    #[test]
    fn test_parse_key_code() {
        assert_eq!(parse_key_code("3613"), Some(3613));
        assert_eq!(parse_key_code("0xe05b"), Some(0xe05b));
        assert_eq!(parse_key_code("0x"), None);
        assert_eq!(parse_key_code("-1"), None);
        assert_eq!(parse_key_code("e05b"), None);
    }
}
