//! Operator console grammar shared by the emulator and bench tooling.
//!
//! Lines are split into whitespace separated words with `winnow`, keywords are
//! matched case-insensitively against [`COMMANDS`], and arguments are parsed
//! per command. Parsing never allocates so the grammar stays usable from
//! `no_std` targets.

pub mod status;

use core::fmt;
use core::time::Duration;

use winnow::ModalResult;
use winnow::ascii::{Caseless, digit1, space0};
use winnow::combinator::{alt, opt, preceded};
use winnow::prelude::*;
use winnow::token::take_till;

use crate::cycle::ActuatorId;
use crate::sequencer::ControlMode;

/// Commands understood by [`parse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Start,
    Stop,
    Toggle,
    Mode,
    Material,
    Progress,
    Wait,
    Jam,
    Faults,
    Status,
    Help,
    Quit,
}

/// Help entry for a console command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandHelp {
    pub tag: CommandTag,
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
}

impl CommandHelp {
    const fn new(
        tag: CommandTag,
        name: &'static str,
        usage: &'static str,
        summary: &'static str,
    ) -> Self {
        Self {
            tag,
            name,
            usage,
            summary,
        }
    }
}

/// Every console command, in help order.
pub const COMMANDS: [CommandHelp; 12] = [
    CommandHelp::new(
        CommandTag::Start,
        "start",
        "start",
        "press start/stop while stopped",
    ),
    CommandHelp::new(
        CommandTag::Stop,
        "stop",
        "stop",
        "press start/stop while running",
    ),
    CommandHelp::new(
        CommandTag::Toggle,
        "toggle",
        "toggle",
        "press start/stop",
    ),
    CommandHelp::new(
        CommandTag::Mode,
        "mode",
        "mode auto|step",
        "set the control mode switch",
    ),
    CommandHelp::new(
        CommandTag::Material,
        "material",
        "material present|missing",
        "set the strap presence sensor",
    ),
    CommandHelp::new(
        CommandTag::Progress,
        "progress",
        "progress",
        "pulse the right end switch",
    ),
    CommandHelp::new(
        CommandTag::Wait,
        "wait",
        "wait <n>ms|<n>s",
        "advance the clock",
    ),
    CommandHelp::new(
        CommandTag::Jam,
        "jam",
        "jam <actuator>|off",
        "stall one actuator's motions",
    ),
    CommandHelp::new(
        CommandTag::Faults,
        "faults",
        "faults [clear]",
        "show or clear fault counters",
    ),
    CommandHelp::new(
        CommandTag::Status,
        "status",
        "status",
        "show controller state",
    ),
    CommandHelp::new(
        CommandTag::Help,
        "help",
        "help [command]",
        "list commands",
    ),
    CommandHelp::new(
        CommandTag::Quit,
        "quit",
        "quit",
        "leave the console",
    ),
];

/// Looks up a command's help entry by keyword.
pub fn find(name: &str) -> Option<&'static CommandHelp> {
    COMMANDS
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
}

/// Structured commands produced by [`parse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    Start,
    Stop,
    Toggle,
    Mode(ControlMode),
    Material { present: bool },
    Progress,
    Wait(Duration),
    Jam(Option<ActuatorId>),
    Faults(FaultsCommand),
    Status,
    Help { topic: Option<&'a str> },
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultsCommand {
    Show,
    Clear,
}

/// Reasons a console line is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Empty,
    UnknownCommand(&'a str),
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
    InvalidArgument {
        command: &'static str,
        expected: &'static str,
        found: &'a str,
    },
    InvalidDuration(&'a str),
    TrailingInput(&'a str),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => f.write_str("empty command"),
            ParseError::UnknownCommand(word) => {
                write!(f, "unknown command `{word}` (try `help`)")
            }
            ParseError::MissingArgument { command, expected } => {
                write!(f, "`{command}` expects {expected}")
            }
            ParseError::InvalidArgument {
                command,
                expected,
                found,
            } => write!(f, "`{command}` expects {expected}, found `{found}`"),
            ParseError::InvalidDuration(word) => {
                write!(f, "invalid duration `{word}` (use e.g. 500ms or 3s)")
            }
            ParseError::TrailingInput(word) => write!(f, "unexpected `{word}` after command"),
        }
    }
}

/// Parses one console line.
///
/// # Errors
///
/// Returns a [`ParseError`] naming the offending word.
pub fn parse(line: &str) -> Result<ConsoleCommand<'_>, ParseError<'_>> {
    let mut input = line.trim_end_matches(['\r', '\n']);
    let keyword = next_word(&mut input).ok_or(ParseError::Empty)?;
    let entry = find(keyword).ok_or(ParseError::UnknownCommand(keyword))?;

    let command = match entry.tag {
        CommandTag::Start => ConsoleCommand::Start,
        CommandTag::Stop => ConsoleCommand::Stop,
        CommandTag::Toggle => ConsoleCommand::Toggle,
        CommandTag::Mode => ConsoleCommand::Mode(choice(
            &mut input,
            entry.name,
            "auto|step",
            &[("auto", ControlMode::Auto), ("step", ControlMode::Step)],
        )?),
        CommandTag::Material => ConsoleCommand::Material {
            present: choice(
                &mut input,
                entry.name,
                "present|missing",
                &[("present", true), ("missing", false)],
            )?,
        },
        CommandTag::Progress => ConsoleCommand::Progress,
        CommandTag::Wait => {
            let word = next_word(&mut input).ok_or(ParseError::MissingArgument {
                command: entry.name,
                expected: "a duration",
            })?;
            ConsoleCommand::Wait(parse_duration(word)?)
        }
        CommandTag::Jam => ConsoleCommand::Jam(choice(
            &mut input,
            entry.name,
            "clamp|tensioner|welder|sled|off",
            &[
                ("clamp", Some(ActuatorId::Clamp)),
                ("tensioner", Some(ActuatorId::Tensioner)),
                ("welder", Some(ActuatorId::Welder)),
                ("sled", Some(ActuatorId::Sled)),
                ("off", None),
            ],
        )?),
        CommandTag::Faults => match next_word(&mut input) {
            None => ConsoleCommand::Faults(FaultsCommand::Show),
            Some(word) if word.eq_ignore_ascii_case("clear") => {
                ConsoleCommand::Faults(FaultsCommand::Clear)
            }
            Some(found) => {
                return Err(ParseError::InvalidArgument {
                    command: entry.name,
                    expected: "clear",
                    found,
                });
            }
        },
        CommandTag::Status => ConsoleCommand::Status,
        CommandTag::Help => ConsoleCommand::Help {
            topic: next_word(&mut input),
        },
        CommandTag::Quit => ConsoleCommand::Quit,
    };

    match next_word(&mut input) {
        Some(extra) => Err(ParseError::TrailingInput(extra)),
        None => Ok(command),
    }
}

/// Parses a `<n>ms` or `<n>s` literal.
///
/// # Errors
///
/// Returns [`ParseError::InvalidDuration`] for anything else.
pub fn parse_duration(word: &str) -> Result<Duration, ParseError<'_>> {
    let mut input = word;
    match duration.parse_next(&mut input) {
        Ok(value) if input.is_empty() => Ok(value),
        _ => Err(ParseError::InvalidDuration(word)),
    }
}

fn next_word<'a>(input: &mut &'a str) -> Option<&'a str> {
    let word: ModalResult<Option<&'a str>> =
        preceded(space0, opt(take_till(1.., |c: char| c.is_ascii_whitespace()))).parse_next(input);
    word.ok().flatten()
}

fn choice<'a, T: Copy>(
    input: &mut &'a str,
    command: &'static str,
    expected: &'static str,
    options: &[(&str, T)],
) -> Result<T, ParseError<'a>> {
    let found = next_word(input).ok_or(ParseError::MissingArgument { command, expected })?;
    options
        .iter()
        .find(|(keyword, _)| keyword.eq_ignore_ascii_case(found))
        .map(|&(_, value)| value)
        .ok_or(ParseError::InvalidArgument {
            command,
            expected,
            found,
        })
}

#[derive(Clone, Copy)]
enum Unit {
    Millis,
    Seconds,
}

fn duration(input: &mut &str) -> ModalResult<Duration> {
    let value = digit1.try_map(str::parse::<u64>).parse_next(input)?;
    let unit = alt((
        Caseless("ms").value(Unit::Millis),
        Caseless("s").value(Unit::Seconds),
    ))
    .parse_next(input)?;
    Ok(match unit {
        Unit::Millis => Duration::from_millis(value),
        Unit::Seconds => Duration::from_secs(value),
    })
}
