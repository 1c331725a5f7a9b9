use std::{fs, path::Path, process, sync::Arc};

use anyhow::{bail, Context, Result};
use env_logger::{Env, Target};

use mascot_player::{
    config::{load_program_table, PlayerConfig},
    engine::{preload::FsLoader, program::ProgramTable, resolver, Engine},
    player::Player,
    view::Inputs,
};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

const PLAY_USAGE: &str = "mascot-player play <asset-root> [stage] [mood] [level]";
const CHECK_USAGE: &str = "mascot-player check <programs.json>";
const FRAMES_USAGE: &str = "mascot-player frames <stage> <mood>";

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);

    match args.next().as_deref() {
        Some("play") => {
            let root = args.next().context(PLAY_USAGE)?;
            let defaults = Inputs::default();
            let stage = args.next().unwrap_or(defaults.stage);
            let mood = args.next().unwrap_or(defaults.mood);
            let level = match args.next() {
                Some(level) => level
                    .parse()
                    .with_context(|| format!("Invalid level {level:?}"))?,
                None => defaults.level,
            };
            play(&root, Inputs::new(stage, mood, level))
        }
        Some("check") => {
            let path = args.next().context(CHECK_USAGE)?;
            init_logging(None)?;
            check(&path)
        }
        Some("frames") => {
            let stage = args.next().context(FRAMES_USAGE)?;
            let mood = args.next().context(FRAMES_USAGE)?;
            init_logging(None)?;
            frames(&stage, &mood)
        }
        _ => bail!(
            "Mascot Player: animated dragon display for the terminal\n\nUsage:\n  {PLAY_USAGE}\n  {CHECK_USAGE}\n  {FRAMES_USAGE}\n\nConfig is read from $MASCOT_PLAYER_CONFIG or ~/.config/mascot-player/config.json"
        ),
    }
}

/// Logs go to stderr, or to `log_file` when the terminal is taken.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    if let Some(path) = log_file {
        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder
        .try_init()
        .context("Failed to initialise logging")
}

fn play(root: &str, inputs: Inputs) -> Result<()> {
    let config = PlayerConfig::load();
    init_logging(Some(&config.log_path()))?;
    let table = config.load_programs()?;

    log::info!(
        "playing {}/{} from {root} ({} program(s))",
        inputs.stage,
        inputs.mood,
        table.program_count()
    );

    let engine = Engine::new(Arc::new(table), Arc::new(FsLoader::new(root)))
        .with_scheme(config.scheme())
        .with_timing(config.timing());
    let mut player = Player::new(engine, &config, inputs);
    player.play()
}

fn check(path: &str) -> Result<()> {
    let table = load_program_table(Path::new(path))?;
    println!(
        "{path}: {} program(s), default {}/{}",
        table.program_count(),
        table.default_stage(),
        table.default_mood(),
    );
    print_table(&table);
    Ok(())
}

fn print_table(table: &ProgramTable) {
    for stage in table.stage_names() {
        let Some(programs) = table.stage(stage) else {
            continue;
        };
        for (mood, program) in programs {
            println!(
                "  {stage}/{mood}: {} frame(s), {} step(s), cycle {} ms",
                program.total_frames,
                program.sequence.len(),
                program.cycle_duration().as_millis(),
            );
        }
    }
}

fn frames(stage: &str, mood: &str) -> Result<()> {
    let config = PlayerConfig::load();
    let table = config.load_programs()?;
    let resolved = resolver::resolve_entry(&table, stage, mood);
    let program = resolved.program;

    println!("{stage}/{mood} -> {}/{}", resolved.stage, resolved.mood);
    println!(
        "  sequence {:?}, cycle {} ms",
        program.sequence,
        program.cycle_duration().as_millis()
    );
    for (i, url) in config
        .scheme()
        .frame_urls(stage, mood, program.total_frames)
        .iter()
        .enumerate()
    {
        let frame = i as u32 + 1;
        let hold = program
            .hold_for(frame)
            .map_or_else(|| "-".to_string(), |d| d.as_millis().to_string());
        println!("  {frame:>2}  {hold:>5} ms  {url}");
    }
    Ok(())
}
