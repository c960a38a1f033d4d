mod error;
#[cfg(feature = "playback")]
mod playback;
mod wav;

use std::path::{Path, PathBuf};
use std::thread;

use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};
use serde::Serialize;
use tapemodem_core::{
    open_link, BlockSink, Demodulator, StreamControl, ToneConfig, WaveformTable, AMPLITUDE,
    QUEUE_CAPACITY, SAMPLE_RATE, SLOT_SAMPLES,
};

use crate::error::CliError;
use crate::wav::WavCapture;

#[derive(Parser)]
#[command(name = "tapemodem")]
#[command(about = "Audio-frequency data modem: one sine-tone waveform per byte")]
struct Cli {
    #[command(flatten)]
    tone: ToneArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ToneArgs {
    /// Output sample rate in Hz
    #[arg(long, global = true, default_value_t = SAMPLE_RATE)]
    sample_rate: u32,

    /// Peak amplitude of the zero-tone
    #[arg(long, global = true, default_value_t = AMPLITUDE)]
    amplitude: i16,

    /// Samples per slot (12 slots per byte)
    #[arg(long, global = true, default_value_t = SLOT_SAMPLES)]
    slot_len: usize,
}

impl ToneArgs {
    fn config(&self) -> Result<ToneConfig, CliError> {
        let config = ToneConfig {
            sample_rate: self.sample_rate,
            amplitude: self.amplitude,
            slot_len: self.slot_len,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render binary data to a WAV file as the audio callback would play it
    Encode {
        /// Input binary file
        #[arg(value_name = "INPUT.BIN")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Keep the idle carrier up around the transmission
        #[arg(long)]
        carrier: bool,

        /// Blocks emitted before the producer starts
        #[arg(long, default_value = "4")]
        lead_in: usize,

        /// Blocks emitted after the queue drains
        #[arg(long, default_value = "4")]
        tail: usize,
    },

    /// Demodulate a block-aligned WAV capture back to binary data
    Decode {
        /// Input WAV file (16-bit mono)
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output binary file
        #[arg(value_name = "OUTPUT.BIN")]
        output: PathBuf,
    },

    /// Show tone tables and timing for the current configuration
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Transmit through the default sound device
    #[cfg(feature = "playback")]
    Play {
        /// Send this text and exit instead of reading lines from stdin
        #[arg(long)]
        message: Option<String>,

        /// Keep the idle carrier up between transmissions
        #[arg(long)]
        carrier: bool,

        /// Mirror everything played into a WAV file
        #[arg(long, value_name = "FILE.WAV")]
        capture: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.tone.config()?;

    match cli.command {
        Commands::Encode {
            input,
            output,
            carrier,
            lead_in,
            tail,
        } => encode_command(config, &input, &output, carrier, lead_in, tail)?,
        Commands::Decode { input, output } => decode_command(config, &input, &output)?,
        Commands::Info { json } => info_command(config, json)?,
        #[cfg(feature = "playback")]
        Commands::Play {
            message,
            carrier,
            capture,
        } => play_command(config, message, carrier, capture.as_deref())?,
    }

    Ok(())
}

fn encode_command(
    config: ToneConfig,
    input_path: &Path,
    output_path: &Path,
    carrier: bool,
    lead_in: usize,
    tail: usize,
) -> Result<(), CliError> {
    let data = std::fs::read(input_path)?;
    info!("Read {} bytes from {}", data.len(), input_path.display());

    let (tx, mut scheduler) = open_link(config)?;
    tx.set_carrier(carrier);
    scheduler.set_sink(Box::new(WavCapture::create(output_path, config.sample_rate)?));

    for _ in 0..lead_in {
        scheduler.tick();
    }

    // This thread plays the device: it ticks back to back while a producer
    // thread feeds the queue exactly as a front-end would.
    let mut blocks = lead_in;
    thread::scope(|s| -> Result<(), CliError> {
        let producer = s.spawn(move || -> Result<(), CliError> {
            let mut tx = tx;
            let result = tx.send_bytes(&data);
            tx.wait_drained();
            tx.shutdown();
            Ok(result?)
        });

        loop {
            let tick = scheduler.tick();
            blocks += 1;
            if tick.control == StreamControl::Stop {
                break;
            }
        }

        producer.join().map_err(|_| CliError::ProducerPanic)?
    })?;

    for _ in 0..tail {
        scheduler.tick();
    }
    blocks += tail;

    let sink: Option<Box<dyn BlockSink>> = scheduler.take_sink();
    if let Some(mut sink) = sink {
        sink.finish()?;
    }

    let samples = blocks * config.block_len();
    println!(
        "Encoded {} blocks ({} samples, {:.3}s) to {}",
        blocks,
        samples,
        samples as f64 / config.sample_rate as f64,
        output_path.display()
    );
    Ok(())
}

fn decode_command(config: ToneConfig, input_path: &Path, output_path: &Path) -> Result<(), CliError> {
    let (spec, samples) = wav::read_samples(input_path)?;
    info!(
        "Read WAV: {} Hz, {} channels, {} bits, {} samples",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        samples.len()
    );
    if spec.sample_rate != config.sample_rate {
        warn!(
            "WAV sample rate {} differs from configured {}; slots are decoded by sample count",
            spec.sample_rate, config.sample_rate
        );
    }

    let remainder = samples.len() % config.block_len();
    if remainder != 0 {
        debug!("Ignoring {} trailing samples", remainder);
    }

    let demod = Demodulator::new(config)?;
    let data = demod.decode_stream(&samples)?;
    println!("Decoded {} bytes", data.len());

    std::fs::write(output_path, &data)?;
    println!("Wrote {} bytes to {}", data.len(), output_path.display());
    Ok(())
}

#[derive(Serialize)]
struct InfoReport {
    sample_rate: u32,
    amplitude: i16,
    slot_len: usize,
    block_len: usize,
    block_duration_us: u64,
    bytes_per_second: f64,
    queue_capacity: usize,
    zero_tone: Vec<i16>,
    one_tone: Vec<i16>,
}

fn info_command(config: ToneConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let table = WaveformTable::new(config)?;
    let report = InfoReport {
        sample_rate: config.sample_rate,
        amplitude: config.amplitude,
        slot_len: config.slot_len,
        block_len: config.block_len(),
        block_duration_us: config.block_duration().as_micros() as u64,
        bytes_per_second: config.bytes_per_second(),
        queue_capacity: QUEUE_CAPACITY,
        zero_tone: table.zero_tone().to_vec(),
        one_tone: table.one_tone().to_vec(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Sample rate:    {} Hz", report.sample_rate);
        println!("Amplitude:      {}", report.amplitude);
        println!("Slot length:    {} samples", report.slot_len);
        println!(
            "Block:          {} samples ({} us)",
            report.block_len, report.block_duration_us
        );
        println!("Throughput:     {:.1} bytes/s", report.bytes_per_second);
        println!("Queue capacity: {} blocks", report.queue_capacity);
        println!("Zero-tone:      {:?}", report.zero_tone);
        println!("One-tone:       {:?}", report.one_tone);
    }
    Ok(())
}

/// Longest wait for the device to play out the final blocks
#[cfg(feature = "playback")]
const PLAYBACK_STOP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[cfg(feature = "playback")]
fn play_command(
    config: ToneConfig,
    message: Option<String>,
    carrier: bool,
    capture: Option<&Path>,
) -> Result<(), CliError> {
    use std::io::BufRead;

    let (mut tx, mut scheduler) = open_link(config)?;
    tx.set_carrier(carrier);
    if let Some(path) = capture {
        scheduler.set_sink(Box::new(WavCapture::create(path, config.sample_rate)?));
        info!("Capturing output to {}", path.display());
    }

    let playback = playback::Playback::start(scheduler, &config)?;
    info!("Playing on {} channel(s)", playback.channels());

    match message {
        Some(text) => tx.send_bytes(text.as_bytes())?,
        None => {
            println!("Type text to send; :carrier on|off toggles the carrier, :quit exits");
            for line in std::io::stdin().lock().lines() {
                let line = line?;
                match line.trim() {
                    ":quit" => break,
                    ":carrier on" => tx.set_carrier(true),
                    ":carrier off" => tx.set_carrier(false),
                    _ => {
                        let mut bytes = line.as_bytes().to_vec();
                        bytes.push(b'\n');
                        tx.send_bytes(&bytes)?;
                    }
                }
            }
        }
    }

    tx.wait_drained();
    tx.shutdown();

    let mut scheduler = playback.finish(PLAYBACK_STOP_TIMEOUT)?;
    let sink: Option<Box<dyn BlockSink>> = scheduler.take_sink();
    if let Some(mut sink) = sink {
        sink.finish()?;
    }

    println!("Sent {} bytes", tx.link().bytes_queued());
    Ok(())
}
