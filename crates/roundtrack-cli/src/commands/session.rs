//! Interactive round loop.
//!
//! A 1-second tokio interval drives the timer while stdin lines drive
//! counters and timer commands. Events are printed one JSON object per
//! line so the output can be piped into other tools.

use std::io::Write;

use clap::Args;
use roundtrack_core::{Config, Event, ProcessType, SessionContext, TimerState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::{open_context, CliResult};

#[derive(Args)]
pub struct SessionArgs {
    #[arg(long)]
    user: Option<i64>,
    /// Process to start with (guides, novelties)
    #[arg(long)]
    process: Option<ProcessType>,
}

/// One stdin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Pause,
    Reset,
    /// `+ field [n]`
    Increment { field: String, delta: u32 },
    /// `- field [n]`
    Decrement { field: String, delta: u32 },
    /// `++ field`: one long-press step
    RepeatIncrement(String),
    /// `-- field`
    RepeatDecrement(String),
    Finish,
    Process(ProcessType),
    Status,
    Fields,
    Help,
    Quit,
}

const HELP: &str = "\
commands:
  start | pause | reset        timer control
  + <field> [n]                increment a counter (default 1)
  - <field> [n]                decrement a counter, clamped at 0
  ++ <field> | -- <field>      repeat step using session.repeat_delta
  finish                       finalize the round now
  process <guides|novelties>   switch process between rounds
  status | fields | help | quit";

pub fn parse_command(line: &str) -> Result<SessionCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("empty command".into());
    };
    let arg = parts.next();
    let delta = match parts.next() {
        Some(n) => n
            .parse::<u32>()
            .map_err(|_| format!("'{n}' is not a positive number"))?,
        None => 1,
    };
    let field = |name: &str| {
        arg.map(str::to_string)
            .ok_or_else(|| format!("usage: {name} <field>"))
    };

    let cmd = match head {
        "start" | "s" => SessionCommand::Start,
        "pause" | "p" => SessionCommand::Pause,
        "reset" => SessionCommand::Reset,
        "+" => SessionCommand::Increment {
            field: field("+")?,
            delta,
        },
        "-" => SessionCommand::Decrement {
            field: field("-")?,
            delta,
        },
        "++" => SessionCommand::RepeatIncrement(field("++")?),
        "--" => SessionCommand::RepeatDecrement(field("--")?),
        "finish" | "f" => SessionCommand::Finish,
        "process" => {
            let name = arg.ok_or("usage: process <guides|novelties>")?;
            SessionCommand::Process(name.parse().map_err(|e| format!("{e}"))?)
        }
        "status" => SessionCommand::Status,
        "fields" => SessionCommand::Fields,
        "help" | "?" => SessionCommand::Help,
        "quit" | "q" | "exit" => SessionCommand::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(cmd)
}

fn emit(event: &Event) -> CliResult {
    let mut out = std::io::stdout().lock();
    if let Event::TimerFinished { sound: true, .. } = event {
        write!(out, "\x07")?;
    }
    writeln!(out, "{}", serde_json::to_string(event)?)?;
    Ok(())
}

fn emit_all(events: impl IntoIterator<Item = Event>) -> CliResult {
    for event in events {
        emit(&event)?;
    }
    Ok(())
}

/// Apply one command. Returns `false` when the loop should stop.
fn apply(ctx: &mut SessionContext, cmd: SessionCommand) -> CliResult<bool> {
    match cmd {
        SessionCommand::Start => emit_all(ctx.start())?,
        SessionCommand::Pause => emit_all(ctx.pause())?,
        SessionCommand::Reset => emit_all(ctx.reset_timer())?,
        SessionCommand::Increment { field, delta } => emit(&ctx.increment(&field, delta)?)?,
        SessionCommand::Decrement { field, delta } => emit(&ctx.decrement(&field, delta)?)?,
        SessionCommand::RepeatIncrement(field) => emit(&ctx.repeat_increment(&field)?)?,
        SessionCommand::RepeatDecrement(field) => emit(&ctx.repeat_decrement(&field)?)?,
        SessionCommand::Finish => emit_all(ctx.finalize_block()?)?,
        SessionCommand::Process(process) => {
            ctx.switch_process(process)?;
            println!("process: {process}");
        }
        SessionCommand::Status => {
            emit(&ctx.snapshot())?;
            println!("{}", serde_json::to_string(&ctx.counters().to_map())?);
        }
        SessionCommand::Fields => {
            for group in ctx.process().groups() {
                let ids: Vec<&str> = group.fields.iter().map(|f| f.id()).collect();
                println!("{}: {}", group.label, ids.join(", "));
            }
            for derived in ctx.process().derived_fields() {
                println!("{} (derived)", derived.id());
            }
        }
        SessionCommand::Help => println!("{HELP}"),
        SessionCommand::Quit => return Ok(false),
    }
    Ok(true)
}

pub async fn run(args: SessionArgs) -> CliResult {
    let mut config = Config::load()?;
    if let Some(process) = args.process {
        config.session.default_process = process;
    }
    let mut ctx = open_context(&config, args.user)?;
    eprintln!(
        "{} | {} | round {} | {} min. Type 'help' for commands.",
        ctx.user().name,
        ctx.process().label(),
        ctx.round().round(),
        ctx.timer().config().duration_min
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            now = ticker.tick() => {
                let elapsed = now.saturating_duration_since(last_tick).as_secs();
                last_tick = now;
                if ctx.timer().state() != TimerState::Running {
                    continue;
                }
                let events = if elapsed > 1 {
                    debug!(missed = elapsed, "catching up after suspension");
                    ctx.catch_up(elapsed)?
                } else {
                    ctx.tick()?
                };
                emit_all(events)?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let keep_going = match parse_command(&line) {
                    Ok(cmd) => match apply(&mut ctx, cmd) {
                        Ok(keep_going) => keep_going,
                        Err(e) => {
                            eprintln!("error: {e}");
                            true
                        }
                    },
                    Err(e) => {
                        eprintln!("{e}");
                        true
                    }
                };
                if !keep_going {
                    break;
                }
            }
        }
    }

    if !ctx.counters().is_all_zero() {
        warn!("session closed with unsaved counters; they are not persisted");
        eprintln!("warning: unfinished round discarded (use 'finish' to keep it)");
    }
    Ok(())
}
