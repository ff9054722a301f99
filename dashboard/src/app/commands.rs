//! Line commands for the interactive `live` view: stdin lines become
//! `UiEvent`s on the runtime's command channel.
//!
//! Input is read on its own OS thread. A blocking read cannot be cancelled,
//! so it must never be owned by the async runtime, whose shutdown would wait
//! for the next line.

use super::event::UiEvent;
use super::state::ChartId;
use crate::overlay::OverlayAlign;
use crate::preset::Preset;
use std::io::BufRead;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

pub const HELP: &str = "\
commands:
  add <signal>        open a chart
  rm <chart id>       close a chart
  overlay <signal>    add or drop a signal on the overlay
  range <seconds>     live window length
  search <term>       filter the signal list (empty clears)
  align index|time    overlay row alignment
  load <preset>       replace the layout from a preset code
  share               print the current layout as a preset code
  reload              refetch the signal list
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ui(UiEvent),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command {0:?}; try `help`")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("bad argument for `{command}`: {detail}")]
    BadArgument { command: &'static str, detail: String },
}

fn required<'a>(command: &'static str, arg: &'a str) -> Result<&'a str, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(arg)
    }
}

/// `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, arg) = match line.split_once(char::is_whitespace) {
        Some((w, rest)) => (w, rest.trim()),
        None => (line, ""),
    };

    let ui = match word.to_ascii_lowercase().as_str() {
        "help" | "?" => return Ok(Some(Command::Help)),
        "quit" | "exit" | "q" => return Ok(Some(Command::Quit)),
        "add" => UiEvent::AddChartRequested {
            signal: required("add", arg)?.to_string(),
        },
        "rm" | "remove" => {
            let raw = required("rm", arg)?.trim_start_matches('#');
            let id = raw.parse::<u64>().map_err(|e| CommandError::BadArgument {
                command: "rm",
                detail: e.to_string(),
            })?;
            UiEvent::RemoveChart { id: ChartId(id) }
        }
        "overlay" | "ov" => UiEvent::OverlayToggled {
            signal: required("overlay", arg)?.to_string(),
        },
        "range" => {
            let secs = required("range", arg)?
                .trim_end_matches('s')
                .parse::<u64>()
                .map_err(|e| CommandError::BadArgument {
                    command: "range",
                    detail: e.to_string(),
                })?;
            UiEvent::TimeRangeChanged { secs }
        }
        "search" => UiEvent::SearchChanged { term: arg.to_string() },
        "align" => {
            let align = required("align", arg)?
                .parse::<OverlayAlign>()
                .map_err(|detail| CommandError::BadArgument {
                    command: "align",
                    detail,
                })?;
            UiEvent::OverlayAlignChanged { align }
        }
        "load" => {
            let preset = Preset::decode(required("load", arg)?).map_err(|e| CommandError::BadArgument {
                command: "load",
                detail: e.to_string(),
            })?;
            UiEvent::PresetImported { preset }
        }
        "share" => UiEvent::ShareRequested,
        "reload" => UiEvent::ReloadCatalog,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(Command::Ui(ui)))
}

/// Feed parsed lines from `input` into `tx` until EOF, `quit`, or the runtime
/// hangs up. Parse errors and help go to stderr. Blocks the calling thread.
pub fn forward_commands<R: BufRead>(input: R, tx: UnboundedSender<UiEvent>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(target: "dash.input", "stdin read failed: {err}");
                break;
            }
        };
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(Command::Help)) => eprintln!("{HELP}"),
            Ok(Some(Command::Quit)) => break,
            Ok(Some(Command::Ui(ev))) => {
                if tx.send(ev).is_err() {
                    break;
                }
            }
            Err(err) => eprintln!("{err}"),
        }
    }
}

/// Run [`forward_commands`] on a detached thread. The returned receiver
/// resolves once input ends or `quit` is typed.
pub fn spawn_reader<R>(input: R, tx: UnboundedSender<UiEvent>) -> std::io::Result<oneshot::Receiver<()>>
where
    R: BufRead + Send + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("dash-input".into())
        .spawn(move || {
            forward_commands(input, tx);
            let _ = done_tx.send(());
        })?;
    Ok(done_rx)
}
