//! The text-protocol driver loop: one `<id> <command-name> [args]` line in,
//! one `=<id>[ payload]` line out. See the external interfaces table for the
//! full command grammar.

use std::io::{self, BufRead, Write};
use std::process::exit;

use anyhow::{anyhow, Result};
use clap::Parser;

use crate::board::ChessMove;
use crate::pieces::{self, Color};
use crate::search::Agent;

#[derive(Clone, Debug, Parser)]
pub struct EngineOptions {
    /// Log verbosity filter, passed straight to the env-based logger.
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Transposition table size in address bits (`2^bits` entries).
    #[arg(short = 'b', long, default_value_t = crate::search::DEFAULT_TT_BITS)]
    pub tt_bits: u32,

    /// Name this engine reports in response to the `name` command.
    #[arg(short, long, default_value = "banqi-engine")]
    pub name: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            log_level: "info".to_string(),
            tt_bits: crate::search::DEFAULT_TT_BITS,
            name: "banqi-engine".to_string(),
        }
    }
}

/// An id/name pair and its expected command body, dispatched by id.
fn expected_name(id: u32) -> Option<&'static str> {
    match id {
        1 => Some("name"),
        2 => Some("version"),
        5 => Some("quit"),
        7 => Some("reset_board"),
        10 => Some("move"),
        11 => Some("flip"),
        12 => Some("genmove"),
        14 => Some("ready"),
        15 => Some("time_settings"),
        16 => Some("time_left"),
        _ => None,
    }
}

fn parse_square(tok: &str) -> Result<u8> {
    let mut chars = tok.chars();
    let col_ch = chars.next().ok_or_else(|| anyhow!("empty square"))?;
    let row_ch = chars.next().ok_or_else(|| anyhow!("truncated square {tok}"))?;
    if !('a'..='d').contains(&col_ch) || !('1'..='8').contains(&row_ch) {
        return Err(anyhow!("square out of range: {tok}"));
    }
    let col = col_ch as u8 - b'a';
    let row = row_ch as u8 - b'1';
    Ok(row * 4 + col)
}

fn parse_piece(tok: &str) -> Result<pieces::Piece> {
    let c = tok.chars().next().ok_or_else(|| anyhow!("empty piece"))?;
    pieces::char_to_piece(c)
        .filter(|&p| p != pieces::EMPTY && p != pieces::COVERED)
        .ok_or_else(|| anyhow!("unrecognised piece character: {tok}"))
}

fn parse_color(tok: &str) -> Result<Color> {
    match tok {
        "red" => Ok(Color::Red),
        "black" => Ok(Color::Black),
        "unknown" => Ok(Color::Unknown),
        _ => Err(anyhow!("unrecognised color: {tok}")),
    }
}

/// Distinguishes a fatal protocol error (malformed id/unknown command) from a
/// recoverable one (the opponent asserted an illegal move or flip).
enum DispatchError {
    Fatal(anyhow::Error),
    Recoverable(anyhow::Error),
}

impl From<anyhow::Error> for DispatchError {
    fn from(e: anyhow::Error) -> Self {
        DispatchError::Fatal(e)
    }
}

pub struct Server {
    agent: Agent,
    options: EngineOptions,
}

impl Server {
    pub fn new(options: EngineOptions) -> Server {
        Server {
            agent: Agent::with_tt_bits(options.tt_bits),
            options,
        }
    }

    /// Runs the read-eval-print loop over stdin/stdout until `quit` or a
    /// fatal protocol error.
    pub fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            self.handle_line(&line)?;
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Result<()> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let id: u32 = match tokens.first().and_then(|t| t.parse().ok()) {
            Some(id) => id,
            None => {
                log::error!("malformed command line, missing numeric id: {line}");
                exit(1);
            }
        };

        match expected_name(id) {
            None => {
                log::error!("unsupported command id: {id}");
                exit(1);
            }
            Some(name) => {
                if tokens.get(1) != Some(&name) {
                    log::error!("command name mismatch for id {id}: {line}");
                    exit(1);
                }
            }
        }

        let args = &tokens[2.min(tokens.len())..];
        match self.dispatch(id, args) {
            Ok(payload) => {
                log::debug!("command completed: {line}");
                match payload {
                    Some(p) => println!("={id} {p}"),
                    None => println!("={id}"),
                }
                io::stdout().flush()?;
                if id == 5 {
                    exit(0);
                }
                Ok(())
            }
            Err(DispatchError::Recoverable(e)) => {
                log::warn!("recoverable protocol error on {line}: {e}");
                println!("=? {e}");
                io::stdout().flush()?;
                Ok(())
            }
            Err(DispatchError::Fatal(e)) => {
                log::error!("fatal protocol error on {line}: {e}");
                exit(1);
            }
        }
    }

    fn dispatch(&mut self, id: u32, args: &[&str]) -> std::result::Result<Option<String>, DispatchError> {
        match id {
            1 => Ok(Some(self.options.name.clone())),
            2 => Ok(Some("1.0.0".to_string())),
            5 => Ok(None),
            7 => {
                self.agent.reset();
                Ok(None)
            }
            10 => {
                let src = parse_square(args.first().copied().ok_or_else(|| anyhow!("move: missing src"))?)?;
                let dst = parse_square(args.get(1).copied().ok_or_else(|| anyhow!("move: missing dst"))?)?;
                let mv = ChessMove::Move { src, dst };
                if !self.agent.board().playable(mv) {
                    return Err(DispatchError::Recoverable(anyhow!(
                        "illegal opponent move {src} {dst}"
                    )));
                }
                self.agent.opponent_move(src, dst);
                Ok(None)
            }
            11 => {
                let pos = parse_square(args.first().copied().ok_or_else(|| anyhow!("flip: missing square"))?)?;
                let piece = parse_piece(args.get(1).copied().ok_or_else(|| anyhow!("flip: missing piece"))?)?;
                if self.agent.board().cell(pos as usize) != pieces::COVERED
                    || self.agent.board().covered_count(piece) == 0
                {
                    return Err(DispatchError::Recoverable(anyhow!(
                        "illegal opponent flip at {pos} claiming {piece}"
                    )));
                }
                self.agent.opponent_flip(pos, piece);
                Ok(None)
            }
            12 => {
                let requested = parse_color(args.first().copied().ok_or_else(|| anyhow!("genmove: missing color"))?)?;
                if requested != Color::Unknown {
                    if self.agent.color() != Color::Unknown && self.agent.color() != requested {
                        return Err(DispatchError::Recoverable(anyhow!(
                            "genmove color mismatch: engine is already {:?}",
                            self.agent.color()
                        )));
                    }
                    self.agent.set_color(requested);
                }
                let mv = self.agent.generate_move();
                Ok(Some(mv.to_string()))
            }
            14 => Ok(None),
            15 => {
                let ms: u32 = args
                    .first()
                    .ok_or_else(|| anyhow!("time_settings: missing value"))?
                    .parse()
                    .map_err(|e| anyhow!("time_settings: {e}"))?;
                self.agent.set_time_limit(ms);
                Ok(None)
            }
            16 => {
                let ms: u32 = args
                    .first()
                    .ok_or_else(|| anyhow!("time_left: missing value"))?
                    .parse()
                    .map_err(|e| anyhow!("time_left: {e}"))?;
                self.agent.set_time_left(ms);
                Ok(None)
            }
            _ => unreachable!("expected_name already rejected unknown ids"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_sequence_produces_expected_responses() {
        let mut server = Server::new(EngineOptions {
            name: "banqi-engine".to_string(),
            ..Default::default()
        });
        assert_eq!(server.dispatch(1, &[]).ok().flatten(), Some("banqi-engine".to_string()));
        assert_eq!(server.dispatch(2, &[]).ok().flatten(), Some("1.0.0".to_string()));
        assert_eq!(server.dispatch(7, &[]).ok().flatten(), None);
        let mv = server.dispatch(12, &["unknown"]).ok().flatten();
        assert_eq!(mv, Some(ChessMove::flip_intent(0).to_string()));
    }

    #[test]
    fn unsupported_id_is_rejected_up_front() {
        assert!(expected_name(999).is_none());
    }

    #[test]
    fn square_grammar_matches_row_major_layout() {
        assert_eq!(parse_square("a1").unwrap(), 0);
        assert_eq!(parse_square("d8").unwrap(), 31);
        assert!(parse_square("e1").is_err());
    }
}
