use pmu30lib::protocol::framer::Framer;
use pmu30lib::protocol::parse::MessageParse;
use pmu30lib::protocol::Message;

#[derive(clap::Args, Debug)]
pub struct ParseDumpOpts {
    /// Raw capture of transport bytes.
    dump: String,
    /// Treat the file as whitespace-separated hex text.
    #[arg(long)]
    hex: bool,
}

impl crate::ToolRun for ParseDumpOpts {
    fn run(&self) -> anyhow::Result<()> {
        let raw = std::fs::read(&self.dump)?;
        let bytes = if self.hex {
            parse_hex_text(&raw)?
        } else {
            raw
        };

        let mut framer = Framer::new();
        for b in bytes {
            let Some(frame) = framer.push_byte(b) else {
                continue;
            };

            match Message::parse_frame(&frame) {
                Ok(Message::Host(msg)) => println!("host   {:?}", msg),
                Ok(Message::Device(msg)) => println!("device {:?}", msg),
                Err(_) => {
                    println!("frame  cmd {:#04x}, {} bytes, not understood", frame.cmd,
                        frame.payload.len());
                    crate::hexdump::hexdump_prefix("       ", frame.payload);
                }
            }
        }

        let stats = framer.stats();
        println!(
            "{} frames, {} framing errors, {} crc errors",
            stats.frames_ok, stats.framing_errors, stats.crc_errors
        );
        Ok(())
    }
}

fn parse_hex_text(raw: &[u8]) -> anyhow::Result<Vec<u8>> {
    let text = std::str::from_utf8(raw)?;
    let mut out = Vec::new();
    for token in text.split_whitespace() {
        out.push(u8::from_str_radix(token, 16)?);
    }
    Ok(out)
}
