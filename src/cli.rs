use clap::{arg,crate_version,Arg,ArgAction,Command};

pub fn build_cli() -> Command {
    let long_help = "gs816 is always invoked with exactly one subcommand.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error

Examples:
---------
boot a ROM:            `gs816 run -r rom3.bin`
boot with a disk:      `gs816 run -r rom3.bin -d game.woz --cycles 20000000`
describe a WOZ image:  `gs816 info -d game.woz`
disassemble a binary:  `gs816 dasm -i code.bin --org 2000`";

    Command::new("gs816")
        .about(format!("gs816 v{}: Apple IIGS core emulation",crate_version!()))
        .after_long_help(long_help)
        .arg_required_else_help(true)
        .subcommand(Command::new("run")
            .arg(arg!(-r --rom <PATH> "ROM image, 64K to 256K").required(true))
            .arg(arg!(-d --disk <PATH> "WOZ disk image for the first matching drive").required(false))
            .arg(arg!(--cycles <COUNT> "stop after this many CPU cycles").required(false)
                .default_value("10000000"))
            .arg(arg!(--banks <COUNT> "FPI RAM bank count (64K each)").required(false)
                .default_value("4"))
            .arg(Arg::new("trace").long("trace").action(ArgAction::SetTrue)
                .help("log every retired opcode (needs the opcode-trace feature)"))
            .about("boot a ROM and run until STP or the cycle limit"))
        .subcommand(Command::new("info")
            .arg(arg!(-d --dimg <PATH> "WOZ disk image").required(true))
            .about("describe a WOZ image's tracks and metadata"))
        .subcommand(Command::new("dasm")
            .arg(arg!(-i --input <PATH> "raw binary file").required(true))
            .arg(arg!(--org <HEX> "origin address").required(false).default_value("0"))
            .arg(Arg::new("mx").long("mx").action(ArgAction::SetTrue)
                .help("treat M and X as 8-bit (emulation-style code)"))
            .about("disassemble 65C816 code"))
}
