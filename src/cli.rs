use crate::{
    activation::ModSettingsActivation,
    bg3,
    config::AppConfig,
    engine::{self, PendingUndo, SlotEngine},
    logging,
    slots::SlotStore,
};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::io::{self, BufRead, Write};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct GlobalOptions {
    format: Option<OutputFormat>,
    sync: bool,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    SlotsList,
    Save(u32),
    Load(u32),
    Delete(u32),
    Name(u32, String),
    ConfigBackup,
    ConfigRestore,
    Paths,
    Shell,
    Help,
    Version,
}

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Save(u32),
    Load(u32),
    Undo,
    List,
    Status,
    Help,
    Quit,
}

struct Session {
    config: AppConfig,
    engine: SlotEngine<ModSettingsActivation>,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, tokens) = parse_global_options(&args);
    let command = parse_command(&tokens)?;
    let format = global.format.unwrap_or(OutputFormat::Text);
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("SigilSmith Slots v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Paths => {
            let config = AppConfig::load_or_create()?;
            list_paths(&config, format)
        }
        CliCommand::Name(index, name) => {
            let mut config = AppConfig::load_or_create()?;
            config.set_slot_name(index, &name);
            config.save()?;
            println!("Slot {index} is now \"{}\"", slot_label(&config, index));
            Ok(())
        }
        command => {
            let mut session = open_session(&global)?;
            run_command(&mut session, command, format)
        }
    }
}

fn parse_global_options(args: &[String]) -> (GlobalOptions, Vec<String>) {
    let mut global = GlobalOptions::default();
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            global.format = OutputFormat::parse(value).or(global.format);
            continue;
        }
        if arg == "--format" {
            if let Some(value) = iter.next() {
                global.format = OutputFormat::parse(value).or(global.format);
            }
            continue;
        }
        match arg.as_str() {
            "--sync" => global.sync = true,
            "-v" | "--verbose" => global.verbose = true,
            _ => tokens.push(arg.to_string()),
        }
    }
    (global, tokens)
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let words: Vec<&str> = tokens.iter().map(|token| token.as_str()).collect();
    let command = match words.as_slice() {
        [] | ["help" | "-h" | "--help", ..] => CliCommand::Help,
        ["version" | "-V" | "--version", ..] => CliCommand::Version,
        ["slots"] | ["slots", "list"] | ["list"] => CliCommand::SlotsList,
        ["slots", "save", index] | ["save", index] => CliCommand::Save(parse_index(index)?),
        ["slots", "load", index] | ["load", index] => CliCommand::Load(parse_index(index)?),
        ["slots", "delete", index] => CliCommand::Delete(parse_index(index)?),
        ["slots", "name", index, name @ ..] => {
            CliCommand::Name(parse_index(index)?, name.join(" "))
        }
        ["config", "backup"] => CliCommand::ConfigBackup,
        ["config", "restore"] => CliCommand::ConfigRestore,
        ["paths"] => CliCommand::Paths,
        ["shell"] => CliCommand::Shell,
        _ => bail!("Unknown command: {}", tokens.join(" ")),
    };
    Ok(command)
}

fn parse_index(value: &str) -> Result<u32> {
    let index: u32 = value
        .parse()
        .with_context(|| format!("invalid slot index: {value}"))?;
    if index == 0 {
        bail!("slot index must be 1 or higher");
    }
    Ok(index)
}

fn open_session(global: &GlobalOptions) -> Result<Session> {
    let config = AppConfig::load_or_create()?;
    let level = if global.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    logging::init(&config.log_path(), level)?;

    let modsettings_path = config.modsettings_path()?;
    let activation = ModSettingsActivation::load(&modsettings_path)?;
    let store = SlotStore::new(
        config.slot_dir(),
        modsettings_path,
        config.sync_mode || global.sync,
    );
    log::debug!(
        "Session opened: slots in {}, sync mode {}",
        store.dir().display(),
        store.sync_mode()
    );
    Ok(Session {
        config,
        engine: SlotEngine::new(store, activation),
    })
}

fn run_command(session: &mut Session, command: CliCommand, format: OutputFormat) -> Result<()> {
    match command {
        CliCommand::SlotsList => list_slots(session, format),
        CliCommand::Save(index) => save_slot(session, index),
        CliCommand::Load(index) => load_slot(session, index),
        CliCommand::Delete(index) => {
            session.engine.store().delete_slot(index)?;
            log::info!("Deleted slot {index}");
            println!("Deleted {}", slot_label(&session.config, index));
            Ok(())
        }
        CliCommand::ConfigBackup => {
            let store = session.engine.store();
            store.backup_host_config()?;
            log::info!("Backed up {}", store.host_config_path().display());
            println!("Backed up modsettings to {}", store.host_backup_path().display());
            Ok(())
        }
        CliCommand::ConfigRestore => {
            let store = session.engine.store();
            store.restore_host_config()?;
            log::info!("Restored {}", store.host_config_path().display());
            println!("Restored modsettings from {}", store.host_backup_path().display());
            Ok(())
        }
        CliCommand::Shell => run_shell(session, io::stdin().lock(), io::stdout()),
        CliCommand::Name(..) | CliCommand::Paths | CliCommand::Help | CliCommand::Version => {
            Ok(())
        }
    }
}

fn save_slot(session: &mut Session, index: u32) -> Result<()> {
    session
        .engine
        .save_state(index)
        .with_context(|| format!("save {}", slot_label(&session.config, index)))?;
    let count = session
        .engine
        .current()
        .map(|snapshot| snapshot.active_mods.len())
        .unwrap_or(0);
    println!("Saved {count} mod(s) to {}", slot_label(&session.config, index));
    Ok(())
}

fn load_slot(session: &mut Session, index: u32) -> Result<()> {
    let store = session.engine.store();
    if store.host_config_path().exists() {
        store
            .backup_host_config()
            .context("back up modsettings before load")?;
    } else {
        log::warn!(
            "No modsettings at {}, skipping backup",
            store.host_config_path().display()
        );
    }
    session
        .engine
        .load_state(index)
        .with_context(|| format!("load {}", slot_label(&session.config, index)))?;
    let count = session
        .engine
        .current()
        .map(|snapshot| snapshot.active_mods.len())
        .unwrap_or(0);
    println!("Loaded {count} mod(s) from {}", slot_label(&session.config, index));
    Ok(())
}

fn slot_label(config: &AppConfig, index: u32) -> String {
    engine::slot_display_name(index, config)
}

#[derive(Serialize)]
struct SlotListItem {
    index: u32,
    name: String,
    set: bool,
    build_number: Option<i64>,
    mod_count: Option<usize>,
    path: String,
}

fn list_slots(session: &Session, format: OutputFormat) -> Result<()> {
    let items: Vec<SlotListItem> = session
        .engine
        .store()
        .list_slots(session.config.slot_count)
        .into_iter()
        .map(|summary| SlotListItem {
            index: summary.index,
            name: session.engine.display_name(summary.index, &session.config),
            set: summary.set,
            build_number: summary.build_number,
            mod_count: summary.mod_count,
            path: summary.path.display().to_string(),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            for item in items {
                let detail = match (item.set, item.mod_count) {
                    (false, _) => "empty".to_string(),
                    (true, Some(count)) => format!("{count} mod(s)"),
                    (true, None) => "unreadable".to_string(),
                };
                println!("{:>3}  {:<24} {detail}", item.index, item.name);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PathsOutput {
    larian_dir: String,
    modsettings_path: String,
    slot_dir: String,
    log_path: String,
    error: Option<String>,
}

fn list_paths(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let (paths, error) = match bg3::detect_paths(config.larian_dir.as_deref()) {
        Ok(paths) => (Some(paths), None),
        Err(err) => (
            config.larian_dir.clone().map(bg3::paths_in),
            Some(err.to_string()),
        ),
    };

    let output = PathsOutput {
        larian_dir: paths
            .as_ref()
            .map(|paths| paths.larian_dir.display().to_string())
            .unwrap_or_default(),
        modsettings_path: paths
            .as_ref()
            .map(|paths| paths.modsettings_path.display().to_string())
            .unwrap_or_default(),
        slot_dir: config.slot_dir().display().to_string(),
        log_path: config.log_path().display().to_string(),
        error,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("Larian dir: {}", output.larian_dir);
            println!("Modsettings: {}", output.modsettings_path);
            println!("Slots: {}", output.slot_dir);
            println!("Log: {}", output.log_path);
            if let Some(error) = output.error {
                println!("Warning: {error}");
            }
        }
    }
    Ok(())
}

fn parse_shell_command(line: &str) -> Result<Option<ShellCommand>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        [] => return Ok(None),
        ["save", index] => ShellCommand::Save(parse_index(index)?),
        ["load", index] => ShellCommand::Load(parse_index(index)?),
        ["undo"] => ShellCommand::Undo,
        ["list" | "ls"] => ShellCommand::List,
        ["status"] => ShellCommand::Status,
        ["help" | "?"] => ShellCommand::Help,
        ["quit" | "exit" | "q"] => ShellCommand::Quit,
        _ => bail!("Unknown command: {line}"),
    };
    Ok(Some(command))
}

fn run_shell<R: BufRead, W: Write>(session: &mut Session, input: R, mut out: W) -> Result<()> {
    writeln!(out, "SigilSmith Slots shell. Type `help` for commands.")?;
    write!(out, "slots> ")?;
    out.flush()?;
    for line in input.lines() {
        let line = line.context("read shell input")?;
        match parse_shell_command(&line) {
            Ok(Some(ShellCommand::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(err) = run_shell_command(session, command, &mut out) {
                    writeln!(out, "Error: {err:#}")?;
                }
            }
            Ok(None) => {}
            Err(err) => writeln!(out, "{err}")?,
        }
        write!(out, "slots> ")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

fn run_shell_command<W: Write>(session: &mut Session, command: ShellCommand, out: &mut W) -> Result<()> {
    match command {
        ShellCommand::Save(index) => save_slot(session, index),
        ShellCommand::Load(index) => load_slot(session, index),
        ShellCommand::Undo => {
            if session.engine.undo_last_action() {
                writeln!(out, "Undid {}", describe_pending(session.engine.pending()))?;
            } else {
                writeln!(out, "Nothing to undo")?;
            }
            Ok(())
        }
        ShellCommand::List => list_slots(session, OutputFormat::Text),
        ShellCommand::Status => {
            let active = session.engine.capture_current();
            writeln!(out, "Last action: {:?}", session.engine.mode())?;
            writeln!(out, "Active mods: {}", active.active_mods.len())?;
            for id in &active.active_mods {
                writeln!(out, "  {}", session.engine.activation().display_name(id))?;
            }
            if session.engine.can_undo() {
                writeln!(out, "Undo available: {}", describe_pending(session.engine.pending()))?;
            }
            Ok(())
        }
        ShellCommand::Help => {
            writeln!(out, "  save <n>   Save active mods to slot n")?;
            writeln!(out, "  load <n>   Load slot n into active mods")?;
            writeln!(out, "  undo       Revert the last save or load")?;
            writeln!(out, "  list       List slots")?;
            writeln!(out, "  status     Show active mods")?;
            writeln!(out, "  quit       Leave the shell")?;
            Ok(())
        }
        ShellCommand::Quit => Ok(()),
    }
}

fn describe_pending(pending: &PendingUndo) -> String {
    match pending {
        PendingUndo::None => "nothing".to_string(),
        PendingUndo::Restore { slot, .. } => format!("load of slot {slot}"),
        PendingUndo::Backup { slot, .. } => format!("save to slot {slot}"),
    }
}

fn print_help() {
    println!("SigilSmith Slots v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  sigilsmith-slots slots list            List slots");
    println!("  sigilsmith-slots slots save <n>        Save active mods to slot n");
    println!("  sigilsmith-slots slots load <n>        Load slot n into modsettings");
    println!("  sigilsmith-slots slots delete <n>      Delete slot n");
    println!("  sigilsmith-slots slots name <n> <text> Name slot n (blank clears)");
    println!("  sigilsmith-slots config backup         Copy modsettings.lsx to the backup");
    println!("  sigilsmith-slots config restore        Copy the backup over modsettings.lsx");
    println!("  sigilsmith-slots paths                 Show detected paths");
    println!("  sigilsmith-slots shell                 Interactive session with undo");
    println!();
    println!("Global options:");
    println!("  --format <json|text>                   Output format for list commands");
    println!("  --sync                                 Use sync-mode slot files");
    println!("  -v, --verbose                          Debug logging");
    println!("  -h, --help                             Show help");
    println!("  -V, --version                          Show version");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn global_options_are_pulled_out_anywhere() {
        let (global, rest) =
            parse_global_options(&tokens(&["slots", "--format", "json", "list", "--sync"]));
        assert_eq!(global.format, Some(OutputFormat::Json));
        assert!(global.sync);
        assert_eq!(rest, tokens(&["slots", "list"]));
    }

    #[test]
    fn slot_commands_parse() {
        assert_eq!(parse_command(&tokens(&[])).unwrap(), CliCommand::Help);
        assert_eq!(
            parse_command(&tokens(&["slots", "save", "3"])).unwrap(),
            CliCommand::Save(3)
        );
        assert_eq!(parse_command(&tokens(&["load", "2"])).unwrap(), CliCommand::Load(2));
        assert_eq!(
            parse_command(&tokens(&["slots", "name", "1", "Dark", "Urge"])).unwrap(),
            CliCommand::Name(1, "Dark Urge".to_string())
        );
        assert_eq!(
            parse_command(&tokens(&["config", "restore"])).unwrap(),
            CliCommand::ConfigRestore
        );
    }

    #[test]
    fn bad_indices_and_unknown_commands_fail() {
        assert!(parse_command(&tokens(&["slots", "save", "0"])).is_err());
        assert!(parse_command(&tokens(&["slots", "load", "two"])).is_err());
        assert!(parse_command(&tokens(&["frobnicate"])).is_err());
    }

    #[test]
    fn shell_commands_parse() {
        assert_eq!(parse_shell_command("   ").unwrap(), None);
        assert_eq!(parse_shell_command("undo").unwrap(), Some(ShellCommand::Undo));
        assert_eq!(parse_shell_command("save 4").unwrap(), Some(ShellCommand::Save(4)));
        assert_eq!(parse_shell_command("exit").unwrap(), Some(ShellCommand::Quit));
        assert!(parse_shell_command("load").is_err());
    }
}
