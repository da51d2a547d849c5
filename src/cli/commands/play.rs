//! Play command - Games against the trained table on a device
//!
//! Without `--port` the device is simulated in-process and moves are typed
//! on stdin. With `--port` the human plays on the device itself.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use crate::{
    Error,
    adapters::{LineInput, LogSink, StreamChannel, VirtualDevice},
    cli::{
        StonesConfig,
        commands::load_policy,
        output::{print_kv, print_section},
    },
    game::Actor,
    ports::Channel,
    session::{Session, SessionConfig},
};

#[derive(Parser, Debug)]
#[command(about = "Play against a trained table")]
pub struct PlayArgs {
    /// Saved table; the optimal-take heuristic is used when omitted
    pub table: Option<PathBuf>,

    /// Serial device node, already configured for the link settings
    #[arg(long, short = 'p')]
    pub port: Option<PathBuf>,

    /// Who moves first
    #[arg(long, value_enum, default_value = "human")]
    pub first: FirstPlayer,

    /// Number of games to play
    #[arg(long, short = 'g', default_value_t = 1)]
    pub games: usize,

    /// JSON configuration file (session section)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FirstPlayer {
    Human,
    Ai,
}

impl From<FirstPlayer> for Actor {
    fn from(first: FirstPlayer) -> Self {
        match first {
            FirstPlayer::Human => Actor::Human,
            FirstPlayer::Ai => Actor::Ai,
        }
    }
}

fn open_session<C: Channel>(
    channel: C,
    config: SessionConfig,
    args: &PlayArgs,
) -> Result<Session<C>> {
    let session = match &args.table {
        Some(path) => {
            let policy = load_policy(path)
                .with_context(|| format!("Failed to load table from {}", path.display()))?;
            Session::new(channel, policy.into_table(), config)?
        }
        None => Session::untrained(channel, config)?,
    };
    let mut session = session.with_sink(LogSink);

    print_kv("Link", &session.config().protocol.link.to_string());
    session.upload().context("Table upload failed")?;
    Ok(session)
}

fn report<C: Channel>(session: &Session<C>) {
    print_section("Session Over");
    print_kv("Games", &session.tally().games().to_string());
    print_kv("Score", &session.tally().to_string());
}

pub fn execute(args: PlayArgs) -> Result<()> {
    let first = Actor::from(args.first);
    let config = StonesConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?
        .session;

    match &args.port {
        Some(port) => {
            let channel = StreamChannel::open(port)
                .with_context(|| format!("Failed to open {}", port.display()))?;
            let mut session = open_session(channel, config, &args)?;
            for game in 1..=args.games {
                println!("\nGame {game}: press buttons on the device");
                let winner = session.play_device_game(first)?;
                println!("{winner} wins");
            }
            session.close();
            report(&session);
        }
        None => {
            let device = VirtualDevice::with_max_line_len(config.protocol.max_line_len);
            let mut session = open_session(device, config, &args)?;
            let mut input = LineInput::stdin();
            for game in 1..=args.games {
                println!("\nGame {game}");
                match session.play_game(first, &mut input) {
                    Ok(Some(winner)) => println!("{winner} wins"),
                    Ok(None) => break,
                    Err(Error::SessionClosed) => break,
                    Err(err) => return Err(err.into()),
                }
            }
            session.close();
            report(&session);
        }
    }
    Ok(())
}
