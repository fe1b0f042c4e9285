//! Operator commands read from stdin, one per line.

use std::str::FromStr;

use crate::OperatorError;

/// One line of operator input.
///
/// The four menu actions also answer to their menu number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// `broadcast`, `b`, `1`: announce the local topic.
    Broadcast,
    /// `recv`, `r`, `2`: wait for one message and show its verdict.
    Receive,
    /// `recv <n>`: wait for `n` messages.
    ReceiveMany(usize),
    /// `drain`, `a`, `3`: run admission on everything queued.
    Drain,
    /// `direct <index> [payload...]`, `d`, `4`: send to an accepted peer.
    Direct {
        index: usize,
        payload: Option<String>,
    },
    /// `peers`, `p`
    Peers,
    /// `help`, `h`, `?`
    Help,
    /// `exit`, `quit`, `q`
    Exit,
}

pub const HELP: &str = "commands: broadcast (b,1) | recv [n] (r,2) | drain (a,3) | \
                        direct <index> [payload] (d,4) | peers (p) | help (h) | exit (q)";

fn invalid(msg: impl Into<String>) -> OperatorError {
    OperatorError::InvalidCommand(msg.into())
}

fn no_args<'a>(
    word: &str,
    command: OperatorCommand,
    mut rest: impl Iterator<Item = &'a str>,
) -> Result<OperatorCommand, OperatorError> {
    match rest.next() {
        Some(extra) => Err(invalid(format!("{word} takes no arguments, got {extra:?}"))),
        None => Ok(command),
    }
}

impl FromStr for OperatorCommand {
    type Err = OperatorError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));
        let mut args = rest.split_whitespace();

        match word.to_ascii_lowercase().as_str() {
            "" => Err(invalid("empty command")),
            "broadcast" | "b" | "1" => no_args(word, Self::Broadcast, args),
            "recv" | "r" | "2" => match args.next() {
                None => Ok(Self::Receive),
                Some(n) => {
                    let n = n
                        .parse()
                        .map_err(|_| invalid(format!("recv count must be a number, got {n:?}")))?;
                    no_args(word, Self::ReceiveMany(n), args)
                }
            },
            "drain" | "a" | "3" => no_args(word, Self::Drain, args),
            "direct" | "d" | "4" => {
                let index = args
                    .next()
                    .ok_or_else(|| invalid("direct needs a peer index"))?;
                let index = index
                    .parse()
                    .map_err(|_| invalid(format!("peer index must be a number, got {index:?}")))?;
                let payload = rest
                    .split_once(char::is_whitespace)
                    .map(|(_, payload)| payload.trim().to_owned())
                    .filter(|payload| !payload.is_empty());
                Ok(Self::Direct { index, payload })
            }
            "peers" | "p" => no_args(word, Self::Peers, args),
            "help" | "h" | "?" => Ok(Self::Help),
            "exit" | "quit" | "q" => Ok(Self::Exit),
            other => Err(invalid(format!("unknown command {other:?}"))),
        }
    }
}
