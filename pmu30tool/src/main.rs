pub mod common;
pub mod hexdump;

mod inspect;
mod parsedump;
mod simulate;
mod validate;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct ToolOptions {
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    /// Decode a configuration blob and print its channels.
    Inspect(inspect::InspectOpts),
    /// Validate a configuration blob without applying it.
    Validate(validate::ValidateOpts),
    /// Replay a captured byte stream through the frame parser.
    ParseDump(parsedump::ParseDumpOpts),
    /// Run a PMU-30 device simulator on a TCP port.
    Simulate(simulate::SimulateOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            Inspect(o) => o.run(),
            Validate(o) => o.run(),
            ParseDump(o) => o.run(),
            Simulate(o) => o.run(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    use clap::Parser;
    let opts = ToolOptions::parse();

    opts.command.run()
}
