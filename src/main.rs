//! # Command Line Interface
//!
//! Dispatch commands to `commands` module.

use gs816::commands;
mod cli;

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let main_cmd = cli::build_cli();
    let matches = main_cmd.get_matches();

    // Boot a ROM

    if let Some(cmd) = matches.subcommand_matches("run") {
        return commands::run(cmd);
    }

    // Describe a WOZ image

    if let Some(cmd) = matches.subcommand_matches("info") {
        return commands::info(cmd);
    }

    // Disassemble a binary

    if let Some(cmd) = matches.subcommand_matches("dasm") {
        return commands::dasm(cmd);
    }

    eprintln!("No subcommand was matched, try `gs816 --help`");
    Err(Box::new(commands::CommandError::InvalidCommand))
}
