//! Line-oriented operator console grammar.
//!
//! One command per line, keywords matched case-insensitively. The grammar is
//! shared by the emulator and any serial console a board exposes; it only
//! parses, and applying a command is left to the caller.

use core::{fmt, time::Duration};

use winnow::ascii::{Caseless, dec_uint, space0, space1};
use winnow::combinator::{alt, eof, opt, preceded};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_till;

/// Up/down toggle used by the simulated collaborators.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkState {
    Up,
    Down,
}

impl LinkState {
    #[must_use]
    pub const fn is_up(self) -> bool {
        matches!(self, LinkState::Up)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_up() { "up" } else { "down" })
    }
}

/// Parsed console command. Borrowed fields point into the input line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleCommand<'a> {
    /// Volume pot position in engineering units.
    Volume(u8),
    /// Channel selector position.
    Channel(usize),
    /// Network association.
    Wifi(LinkState),
    /// Stream liveness reported by the audio client.
    Stream(LinkState),
    /// Remote configuration server reachability.
    Config(LinkState),
    /// Decoder buffer fill in bytes.
    Buffer(usize),
    /// Advance simulated time.
    Advance(Duration),
    /// Replace one station URL.
    Station { index: usize, url: &'a str },
    /// Set the active station count.
    Stations(usize),
    Status,
    Help(Option<&'a str>),
}

/// Console parse failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleError {
    Empty,
    UnknownCommand,
    /// Known keyword with bad arguments; carries the keyword for usage lookup.
    Usage(&'static str),
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Empty => f.write_str("empty command"),
            ConsoleError::UnknownCommand => f.write_str("unknown command, try `help`"),
            ConsoleError::Usage(keyword) => match usage(keyword) {
                Some(text) => write!(f, "usage: {text}"),
                None => write!(f, "invalid arguments for `{keyword}`"),
            },
        }
    }
}

/// Keyword, usage line and summary for every command.
pub const COMMANDS: [(&str, &str, &str); 11] = [
    ("volume", "volume <0-255>", "set the volume input; 0 stops playback"),
    ("channel", "channel <index>", "set the channel selector input"),
    ("wifi", "wifi up|down", "associate or drop the network link"),
    ("stream", "stream up|down", "make the stream live or stall it"),
    ("config", "config up|down", "make the config server reachable or not"),
    ("buffer", "buffer <bytes>", "set the decoder buffer fill"),
    ("advance", "advance <n>[ms|s|m]", "advance simulated time"),
    ("station", "station <index> <url>", "replace a station url"),
    ("stations", "stations <1-4>", "set the active station count"),
    ("status", "status", "show register, playback and recent events"),
    ("help", "help [command]", "list commands or show one"),
];

/// Usage line for a keyword.
#[must_use]
pub fn usage(keyword: &str) -> Option<&'static str> {
    COMMANDS
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(keyword))
        .map(|(_, usage, _)| *usage)
}

/// Command parser built on top of `winnow`.
pub struct ConsoleParser;

impl ConsoleParser {
    /// Parses one console line.
    pub fn parse(line: &str) -> Result<ConsoleCommand<'_>, ConsoleError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(ConsoleError::Empty);
        }
        Self::command().parse(trimmed).map_err(|_| {
            let keyword = trimmed.split_ascii_whitespace().next().unwrap_or_default();
            COMMANDS
                .iter()
                .find(|(name, _, _)| name.eq_ignore_ascii_case(keyword))
                .map_or(ConsoleError::UnknownCommand, |(name, _, _)| {
                    ConsoleError::Usage(*name)
                })
        })
    }

    fn command<'a>() -> impl Parser<&'a str, ConsoleCommand<'a>, ContextError> {
        move |input: &mut &'a str| {
            let command = alt((
                preceded((Caseless("volume"), space1), dec_uint::<_, u8, _>)
                    .map(ConsoleCommand::Volume),
                preceded((Caseless("channel"), space1), dec_uint::<_, usize, _>)
                    .map(ConsoleCommand::Channel),
                preceded((Caseless("wifi"), space1), link_state).map(ConsoleCommand::Wifi),
                preceded((Caseless("stream"), space1), link_state).map(ConsoleCommand::Stream),
                preceded((Caseless("config"), space1), link_state).map(ConsoleCommand::Config),
                preceded((Caseless("buffer"), space1), dec_uint::<_, usize, _>)
                    .map(ConsoleCommand::Buffer),
                preceded((Caseless("advance"), space1), duration).map(ConsoleCommand::Advance),
                preceded((Caseless("stations"), space1), dec_uint::<_, usize, _>)
                    .map(ConsoleCommand::Stations),
                preceded((Caseless("station"), space1), station),
                Caseless("status").value(ConsoleCommand::Status),
                preceded(Caseless("help"), opt(preceded(space1, word))).map(ConsoleCommand::Help),
            ))
            .parse_next(input)?;

            space0.parse_next(input)?;
            eof.parse_next(input)?;
            Ok(command)
        }
    }
}

fn word<'a>(input: &mut &'a str) -> Result<&'a str, ContextError> {
    take_till(1.., char::is_whitespace).parse_next(input)
}

fn link_state(input: &mut &str) -> Result<LinkState, ContextError> {
    alt((
        Caseless("up").value(LinkState::Up),
        Caseless("down").value(LinkState::Down),
    ))
    .parse_next(input)
}

fn duration(input: &mut &str) -> Result<Duration, ContextError> {
    let amount = dec_uint::<_, u64, _>.parse_next(input)?;
    let unit = opt(alt(("ms", "s", "m"))).parse_next(input)?;
    Ok(match unit {
        Some("s") => Duration::from_secs(amount),
        Some("m") => Duration::from_secs(amount.saturating_mul(60)),
        _ => Duration::from_millis(amount),
    })
}

fn station<'a>(input: &mut &'a str) -> Result<ConsoleCommand<'a>, ContextError> {
    let index = dec_uint::<_, usize, _>.parse_next(input)?;
    space1.parse_next(input)?;
    let url = word.parse_next(input)?;
    Ok(ConsoleCommand::Station { index, url })
}
