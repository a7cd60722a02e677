use std::io::{Read, Write};
use std::time::{Duration, Instant};

use pmu30lib::device::Device;
use pmu30lib::hardware::{system_index, Hardware, HwDevice, MemFlash};
use pmu30lib::protocol::messages::system::FirmwareVersion;
use pmu30lib::protocol::MAX_FRAME_SIZE;

#[derive(clap::Args, Debug)]
pub struct SimulateOpts {
    #[arg(default_value = "localhost:8630")]
    bind: String,
    #[arg(long, default_value = "pmu30sim")]
    version: String,
    #[arg(long, default_value_t = 0x30_0001)]
    serial: u32,

    /// Fix an analog input, as index=value. Repeatable.
    #[arg(long = "analog", value_parser = parse_assignment)]
    analog: Vec<(u8, i32)>,
    /// Fix a digital input, as index=value. Repeatable.
    #[arg(long = "digital", value_parser = parse_assignment)]
    digital: Vec<(u8, i32)>,

    #[arg(long)]
    initial_flash: Option<String>,
    #[arg(long)]
    dump_flash: Option<String>,
    #[arg(long, default_value_t = 8192 + 8)]
    flash_size: usize,

    /// Print hardware writes as they happen.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_assignment(s: &str) -> Result<(u8, i32), String> {
    let (index, value) = s
        .split_once('=')
        .ok_or_else(|| "expected index=value".to_string())?;
    Ok((
        index.trim().parse().map_err(|e| format!("{}", e))?,
        value.trim().parse().map_err(|e| format!("{}", e))?,
    ))
}

impl crate::ToolRun for SimulateOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mut flash = if let Some(ref path) = self.initial_flash {
            let mut data = std::fs::read(path)?;
            data.resize(self.flash_size, 0xff);
            MemFlash::from_data(data)
        } else {
            MemFlash::new(self.flash_size)
        };

        let listener = std::net::TcpListener::bind(&self.bind)?;
        println!("Listening on {}.", self.bind);

        loop {
            let (stream, addr) = listener.accept()?;
            println!("Connected to {}.", addr);

            // a low timeout keeps the executor and telemetry running
            // between received bytes
            stream.set_read_timeout(Some(Duration::from_millis(5)))?;

            let mut sim = Simulator::new(self, &mut flash);
            match sim.simulate(stream) {
                Ok(()) => println!("Disconnected from {}.", addr),
                Err(e) => anyhow::bail!(e),
            }

            if let Some(ref path) = self.dump_flash {
                std::fs::write(path, flash.data())?;
            }
        }
    }
}

/// Scripted hardware: fixed input values, optionally logged writes.
struct SimHardware {
    analog: [i32; 16],
    digital: [i32; 12],
    verbose: bool,
}

impl Hardware for SimHardware {
    fn read_input(&mut self, device: HwDevice, index: u8) -> i32 {
        match device {
            HwDevice::AnalogIn => self.analog.get(index as usize).copied().unwrap_or(0),
            HwDevice::DigitalIn => self.digital.get(index as usize).copied().unwrap_or(0),
            HwDevice::System => match index {
                system_index::BATTERY_MV => 13_800,
                system_index::TOTAL_CURRENT_MA => 2_500,
                system_index::MCU_TEMP => 420,
                system_index::BOARD_TEMP1 => 385,
                system_index::BOARD_TEMP2 => 390,
                _ => 0,
            },
            _ => 0,
        }
    }

    fn write_output(&mut self, device: HwDevice, index: u8, value: i32) {
        if self.verbose {
            println!("hw write {:?}[{}] = {}", device, index, value);
        }
    }
}

struct Simulator<'a> {
    device: Device,
    hw: SimHardware,
    flash: &'a mut MemFlash,
    started: Instant,
}

impl<'a> Simulator<'a> {
    fn new(opts: &SimulateOpts, flash: &'a mut MemFlash) -> Self {
        let mut hw = SimHardware {
            analog: [0; 16],
            digital: [0; 12],
            verbose: opts.verbose,
        };
        for (index, value) in &opts.analog {
            if let Some(slot) = hw.analog.get_mut(*index as usize) {
                *slot = *value;
            }
        }
        for (index, value) in &opts.digital {
            if let Some(slot) = hw.digital.get_mut(*index as usize) {
                *slot = *value;
            }
        }

        Self {
            device: Device::new(opts.serial, FirmwareVersion::from_str_lossy(&opts.version)),
            hw,
            flash,
            started: Instant::now(),
        }
    }

    fn now_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    fn simulate(&mut self, mut stream: std::net::TcpStream) -> anyhow::Result<()> {
        self.device.boot(self.flash, self.now_ms());

        let mut last_pass = self.now_ms();
        loop {
            // drain incoming bytes until the read times out
            let mut chunk = [0u8; 256];
            match stream.read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    for b in &chunk[..n] {
                        self.device.push_byte(*b, &mut self.hw, self.flash);
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
                    ) =>
                {
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            // a 10ms pass cadence
            let now = self.now_ms();
            if now.wrapping_sub(last_pass) >= 10 {
                last_pass = now;
                self.device.run(&mut self.hw, self.flash, now);
            }

            let mut frame = [0u8; MAX_FRAME_SIZE];
            while let Some(n) = self.device.pop_frame(&mut frame) {
                match stream.write_all(&frame[..n]) {
                    Ok(()) => {}
                    Err(e)
                        if matches!(
                            e.kind(),
                            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
                        ) =>
                    {
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            if self.device.restart_requested() {
                println!("Restart requested, rebooting.");
                self.device.boot(self.flash, self.now_ms());
            }
        }
    }
}
