//! Record samples from a HackRF to a file, or transmit samples from a file.
//!
//! # Usage
//!
//! ```sh
//! # Record 10 M samples at 433.92 MHz
//! cargo run --example hackrf_transfer -- -f 433.92M -r capture.cs8 -n 10000000
//!
//! # Transmit a capture back, repeating until Ctrl-C
//! cargo run --example hackrf_transfer -- -f 433.92M -t capture.cs8 -x 20 --repeat
//! ```
//!
//! Files hold raw interleaved signed 8-bit I/Q.

use clap::Parser;
use rs_hackrf::{DeviceSelector, Flow, RadioConfig, StopSignal, StreamOptions};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::process;
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
struct Frequency(u64);

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, scale) = match s.chars().last() {
            Some('k') | Some('K') => (&s[..s.len() - 1], 1e3),
            Some('M') | Some('m') => (&s[..s.len() - 1], 1e6),
            Some('G') | Some('g') => (&s[..s.len() - 1], 1e9),
            _ => (s, 1.0),
        };
        number
            .parse::<f64>()
            .map(|v| Frequency((v * scale).round() as u64))
            .map_err(|e| format!("invalid frequency '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Stream samples between a HackRF and a file", long_about = None)]
struct Args {
    /// Center frequency (Hz, or with k/M/G suffix)
    #[arg(short, long, value_parser = Frequency::from_str)]
    freq: Frequency,

    /// Sample rate in Hz
    #[arg(short, long, default_value_t = 10_000_000)]
    sample_rate: u32,

    /// Receive into this file
    #[arg(short, long, conflicts_with = "transmit")]
    receive: Option<String>,

    /// Transmit from this file
    #[arg(short, long)]
    transmit: Option<String>,

    /// Stop after this many samples
    #[arg(short = 'n', long)]
    num_samples: Option<u64>,

    /// Loop the transmit file until interrupted
    #[arg(long, default_value_t = false)]
    repeat: bool,

    /// RX LNA gain in dB (0-40, 8 dB steps)
    #[arg(short, long, default_value_t = 16)]
    lna_gain: u32,

    /// RX VGA gain in dB (0-62, 2 dB steps)
    #[arg(short = 'g', long, default_value_t = 20)]
    vga_gain: u32,

    /// TX VGA gain in dB (0-47)
    #[arg(short = 'x', long, default_value_t = 0)]
    txvga_gain: u32,

    /// Enable the RF amplifier
    #[arg(short, long, default_value_t = false)]
    amp: bool,

    /// Serial number (or suffix) of the board to use
    #[arg(short, long)]
    device: Option<String>,

    /// Number of transfers kept in flight
    #[arg(long, default_value_t = 4)]
    transfers: usize,

    /// Size of each transfer in bytes
    #[arg(long, default_value_t = 262_144)]
    buffer_size: usize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if args.receive.is_none() && args.transmit.is_none() {
        eprintln!("Error: one of --receive or --transmit is required.");
        process::exit(1);
    }

    if let Err(e) = run(&args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let selector = match &args.device {
        Some(serial) => DeviceSelector::Serial(serial.clone()),
        None => DeviceSelector::Index(0),
    };

    let mut config = RadioConfig {
        device: selector,
        ..RadioConfig::new(0, args.freq.0, args.sample_rate)
    };
    config.amp_enable = args.amp;
    config.stream = StreamOptions::new(args.transfers, args.buffer_size);
    if args.transmit.is_some() {
        config.txvga_gain = Some(args.txvga_gain);
    } else {
        config.lna_gain = Some(args.lna_gain);
        config.vga_gain = Some(args.vga_gain);
    }

    let device = rs_hackrf::open(&config.device)?;
    device.apply(&config).await?;

    // The session clears its own stop flag when a stream starts, so an
    // interrupt that lands before that is kept here and checked per buffer.
    let interrupted = StopSignal::new();
    let handler = interrupted.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCaught interrupt, stopping...");
            handler.request();
        }
    });

    let limit = args.num_samples.map(|n| n * 2);
    let mut total: u64 = 0;
    let mut io_error: Option<std::io::Error> = None;
    let start = Instant::now();

    if let Some(path) = &args.receive {
        let mut out = BufWriter::new(File::create(path)?);
        info!("Receiving at {} Hz into {}", args.freq.0, path);

        device
            .receive(&config.stream, |buf| {
                let take = match limit {
                    Some(limit) => buf.len().min((limit - total) as usize),
                    None => buf.len(),
                };
                if let Err(e) = out.write_all(&buf[..take]) {
                    io_error = Some(e);
                    return Flow::Stop;
                }
                total += take as u64;
                if interrupted.is_requested() || limit.is_some_and(|limit| total >= limit) {
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            })
            .await?;
        out.flush()?;
    } else if let Some(path) = &args.transmit {
        let mut input = BufReader::new(File::open(path)?);
        let repeat = args.repeat;
        info!("Transmitting {} at {} Hz", path, args.freq.0);

        device
            .transmit(&config.stream, |buf| {
                let mut filled = 0;
                while filled < buf.len() {
                    match input.read(&mut buf[filled..]) {
                        Ok(0) if repeat => {
                            if let Err(e) = input.seek(SeekFrom::Start(0)) {
                                io_error = Some(e);
                                break;
                            }
                        }
                        Ok(0) => break,
                        Ok(n) => filled += n,
                        Err(e) => {
                            io_error = Some(e);
                            break;
                        }
                    }
                }
                buf[filled..].fill(0);
                total += filled as u64;

                let exhausted = filled < buf.len();
                if exhausted
                    || interrupted.is_requested()
                    || limit.is_some_and(|limit| total >= limit)
                {
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            })
            .await?;
    }

    if let Some(e) = io_error {
        warn!("File I/O failed: {}", e);
        return Err(e.into());
    }

    let elapsed = start.elapsed().as_secs_f64();
    eprintln!(
        "Transferred {} samples in {:.2} s ({:.3} MSPS)",
        total / 2,
        elapsed,
        total as f64 / 2.0 / elapsed / 1_000_000.0
    );
    device.release();
    Ok(())
}
