//! Demo programs for the codec2-core speech codec and FreeDV pipeline.
//! Each subcommand reads binary from stdin, writes binary to stdout, and
//! emits diagnostics on stderr via `tracing`, mirroring the classic
//! `c2enc`/`c2dec`/`freedv_tx`/`freedv_rx` command-line tools.

mod config;

use std::io::{self, Read, Write};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use codec2_core::channel;
use codec2_core::container;
use codec2_core::freedv::modem::SyncCmd;
use codec2_core::freedv::modes::FreeDvMode;
use codec2_core::modes::Codec2Mode;
use codec2_core::{Codec2, FreeDvSession, RxOutcome};

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Codec2/FreeDV demo pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML config file (see `codec2-cli/configs/`).
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Raise log verbosity (repeatable: -v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CliCodec2Mode {
    #[value(name = "3200")]
    Mode3200,
    #[value(name = "2400")]
    Mode2400,
    #[value(name = "1600")]
    Mode1600,
    #[value(name = "1400")]
    Mode1400,
    #[value(name = "1300")]
    Mode1300,
    #[value(name = "1200")]
    Mode1200,
    #[value(name = "700c")]
    Mode700C,
    #[value(name = "450")]
    Mode450,
    #[value(name = "450pwb")]
    Mode450Pwb,
}

impl From<CliCodec2Mode> for Codec2Mode {
    fn from(m: CliCodec2Mode) -> Self {
        match m {
            CliCodec2Mode::Mode3200 => Codec2Mode::Mode3200,
            CliCodec2Mode::Mode2400 => Codec2Mode::Mode2400,
            CliCodec2Mode::Mode1600 => Codec2Mode::Mode1600,
            CliCodec2Mode::Mode1400 => Codec2Mode::Mode1400,
            CliCodec2Mode::Mode1300 => Codec2Mode::Mode1300,
            CliCodec2Mode::Mode1200 => Codec2Mode::Mode1200,
            CliCodec2Mode::Mode700C => Codec2Mode::Mode700C,
            CliCodec2Mode::Mode450 => Codec2Mode::Mode450,
            CliCodec2Mode::Mode450Pwb => Codec2Mode::Mode450Pwb,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode raw s16le PCM on stdin to packed codec2 frames on stdout.
    Encode {
        #[arg(long, value_enum, default_value = "700c")]
        mode: CliCodec2Mode,
        /// Prefix output with a `.c2` container header.
        #[arg(long)]
        c2_header: bool,
    },
    /// Decode packed codec2 frames on stdin to raw s16le PCM on stdout.
    Decode {
        #[arg(long, value_enum, default_value = "700c")]
        mode: CliCodec2Mode,
        /// Input begins with a `.c2` container header.
        #[arg(long)]
        c2_header: bool,
    },
    /// Modulate raw s16le speech PCM on stdin into FreeDV modem audio on
    /// stdout.
    FreedvTx {
        #[arg(long, default_value = "700C")]
        mode: String,
    },
    /// Demodulate FreeDV modem audio on stdin into decoded speech PCM (or
    /// raw data bytes) on stdout.
    FreedvRx {
        #[arg(long, default_value = "700C")]
        mode: String,
        #[arg(long)]
        testframes: bool,
    },
    /// Add AWGN to s16le PCM on stdin for test purposes.
    Awgn {
        #[arg(long)]
        snr_db: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(io::stderr)
        .init();

    let config = args
        .config
        .as_ref()
        .map(CliConfig::from_file)
        .transpose()?
        .unwrap_or_default();

    match args.command {
        Command::Encode { mode, c2_header } => run_encode(mode.into(), c2_header),
        Command::Decode { mode, c2_header } => run_decode(mode.into(), c2_header),
        Command::FreedvTx { mode } => run_freedv_tx(parse_freedv_mode(&mode)?),
        Command::FreedvRx { mode, testframes } => {
            run_freedv_rx(parse_freedv_mode(&mode)?, testframes, config.wav_output.as_deref())
        }
        Command::Awgn { snr_db, seed } => run_awgn(snr_db, seed),
    }
}

fn parse_freedv_mode(s: &str) -> Result<FreeDvMode> {
    use FreeDvMode::*;
    Ok(match s.to_ascii_uppercase().as_str() {
        "3200" => Mode3200,
        "2400A" => Mode2400A,
        "2400B" => Mode2400B,
        "1600" => Mode1600,
        "1400" => Mode1400,
        "1300" => Mode1300,
        "1200" => Mode1200,
        "700C" => Mode700C,
        "700D" => Mode700D,
        "700E" => Mode700E,
        "450" => Mode450,
        "450PWB" => Mode450Pwb,
        "2020" => Mode2020,
        "2020B" => Mode2020B,
        "800XA" => Mode800Xa,
        "DATAC0" => DataC0,
        "DATAC1" => DataC1,
        "DATAC3" => DataC3,
        "FSK_LDPC" => FskLdpc,
        other => return Err(eyre!("unrecognised FreeDV mode: {other}")),
    })
}

fn read_i16le(mut r: impl Read) -> Result<Vec<i16>> {
    let mut bytes = Vec::new();
    r.read_to_end(&mut bytes)?;
    Ok(bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect())
}

fn write_i16le(mut w: impl Write, samples: &[i16]) -> Result<()> {
    for &s in samples {
        w.write_all(&s.to_le_bytes())?;
    }
    Ok(())
}

fn frame_progress(total_frames: u64) -> ProgressBar {
    let bar = ProgressBar::new(total_frames);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} frames ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    bar
}

fn run_encode(mode: Codec2Mode, c2_header: bool) -> Result<()> {
    let mut codec = Codec2::new(mode)?;
    let stdin = io::stdin();
    let samples = read_i16le(stdin.lock())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if c2_header {
        out.write_all(&container::write_header(mode, 0))?;
    }

    let n_samp = codec.samples_per_frame();
    let bar = frame_progress((samples.len() / n_samp.max(1)) as u64);
    let mut frames = 0usize;
    for chunk in samples.chunks(n_samp) {
        if chunk.len() < n_samp {
            break;
        }
        let bytes = codec.encode(chunk);
        out.write_all(&bytes)?;
        frames += 1;
        bar.inc(1);
    }
    bar.finish_and_clear();
    info!(frames, "encoded frames");
    Ok(())
}

fn run_decode(mode: Codec2Mode, c2_header: bool) -> Result<()> {
    let mut codec = Codec2::new(mode)?;
    let stdin = io::stdin();
    let mut bytes = Vec::new();
    stdin.lock().read_to_end(&mut bytes)?;

    let body = if c2_header {
        if bytes.len() < container::HEADER_LEN {
            return Err(eyre!("input shorter than .c2 header"));
        }
        let header: [u8; container::HEADER_LEN] = bytes[..container::HEADER_LEN].try_into().unwrap();
        let parsed = container::read_header(&header)?;
        if parsed.mode != mode {
            return Err(eyre!("header mode does not match --mode"));
        }
        &bytes[container::HEADER_LEN..]
    } else {
        &bytes[..]
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let bytes_per_frame = codec.bytes_per_frame();
    let bar = frame_progress((body.len() / bytes_per_frame.max(1)) as u64);
    let mut frames = 0usize;
    for chunk in body.chunks(bytes_per_frame) {
        if chunk.len() < bytes_per_frame {
            break;
        }
        let pcm = codec.decode(chunk);
        write_i16le(&mut out, &pcm)?;
        frames += 1;
        bar.inc(1);
    }
    bar.finish_and_clear();
    info!(frames, "decoded frames");
    Ok(())
}

fn run_freedv_tx(mode: FreeDvMode) -> Result<()> {
    let mut session = FreeDvSession::new(mode)?;
    let stdin = io::stdin();
    let speech = read_i16le(stdin.lock())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let n_samp = session.nin().max(1);
    let mut frames = 0usize;
    for chunk in speech.chunks(n_samp) {
        if chunk.len() < n_samp {
            break;
        }
        let modulated = session.tx(Some(chunk), None);
        write_i16le(&mut out, &modulated)?;
        frames += 1;
    }
    info!(frames, "modulated frames");
    Ok(())
}

fn run_freedv_rx(mode: FreeDvMode, testframes: bool, wav_output: Option<&std::path::Path>) -> Result<()> {
    let mut session = FreeDvSession::new(mode)?;
    session.set_sync_cmd(SyncCmd::Auto);
    session.set_testframes(testframes);

    let stdin = io::stdin();
    let samples = read_i16le(stdin.lock())?;

    let mut wav_writer = wav_output
        .map(|path| -> Result<hound::WavWriter<io::BufWriter<std::fs::File>>> {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: 8000,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            Ok(hound::WavWriter::create(path, spec)?)
        })
        .transpose()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut pos = 0;
    let mut frames = 0usize;
    while pos + session.nin() <= samples.len() {
        let nin = session.nin();
        let chunk = &samples[pos..pos + nin];
        pos += nin;

        match session.rx(chunk) {
            RxOutcome::NoFrame => {}
            RxOutcome::Speech(pcm) => {
                match &mut wav_writer {
                    Some(writer) => {
                        for &s in &pcm {
                            writer.write_sample(s)?;
                        }
                    }
                    None => write_i16le(&mut out, &pcm)?,
                }
                frames += 1;
            }
            RxOutcome::Data(bytes) => {
                out.write_all(&bytes)?;
                frames += 1;
            }
        }
    }
    if let Some(writer) = wav_writer {
        writer.finalize()?;
    }

    info!(
        frames,
        sync = ?session.sync_state(),
        ber = session.ber_estimate(),
        "rx complete"
    );
    if testframes {
        let stats = session.testframe_stats();
        info!(ber = stats.ber(), per = stats.per(), "testframe stats");
        if stats.ber() > 0.1 || stats.per() > 0.01 {
            std::process::exit(2);
        }
    }
    Ok(())
}

fn run_awgn(snr_db: f64, seed: u64) -> Result<()> {
    let stdin = io::stdin();
    let samples = read_i16le(stdin.lock())?;
    let signal_rms = {
        let sum_sq: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
        (sum_sq / samples.len().max(1) as f64).sqrt()
    };
    let noise_std = channel::snr_db_to_noise_std(snr_db, signal_rms);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noisy = channel::apply_pcm_noise(&samples, noise_std, &mut rng);

    let stdout = io::stdout();
    write_i16le(stdout.lock(), &noisy)?;
    info!(snr_db, noise_std, "applied AWGN");
    Ok(())
}
