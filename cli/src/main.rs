use clap::{Args, Parser, Subcommand};
use hound::{SampleFormat, WavSpec};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tonealert_core::auth::SEED_LEN;
use tonealert_core::resample::{downmix, resample};
use tonealert_core::{
    compose, receive_acoustic, receive_code, receive_frame, transmit, AlertSigner, AlertType,
    AuditRecord, ChecksumPolicy, Ed25519KeyHandle, Ed25519Verifier, FskModulator, Integrity,
    ModemConfig, ReceivedAlert, SemanticCode, SemanticFields, Verification, WireFrame,
    CODE_LEN, FRAME_LEN, SAMPLE_RATE,
};

#[derive(Parser)]
#[command(name = "tonealert")]
#[command(about = "Signed emergency alerts over a speaker-to-microphone link")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 key seed
    Keygen {
        /// Write the seed (hex) to this file instead of stdout
        #[arg(short, long, value_name = "SEED.HEX")]
        output: Option<PathBuf>,
    },

    /// Pack alert fields into a 24-byte semantic code (hex)
    Pack {
        #[command(flatten)]
        alert: AlertArgs,
    },

    /// Decode a semantic code or a full wire frame from hex
    Unpack {
        /// 48-character semantic code or 240-character wire frame
        #[arg(value_name = "HEX")]
        hex: String,

        /// Decode even if the CRC does not match
        #[arg(long)]
        lenient: bool,

        /// Fail unless a wire frame carries a valid signature
        #[arg(long)]
        require_signature: bool,
    },

    /// Sign an alert and render it to a WAV file
    Transmit {
        #[command(flatten)]
        alert: AlertArgs,

        /// File holding the 32-byte key seed as hex
        #[arg(short, long, value_name = "SEED.HEX")]
        key: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Output sample rate in Hz
        #[arg(long, default_value_t = SAMPLE_RATE)]
        sample_rate: u32,
    },

    /// Demodulate a WAV capture and print a JSON report
    Receive {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long, value_name = "REPORT.JSON")]
        output: Option<PathBuf>,

        /// Rate the capture is converted to before demodulation
        #[arg(long, default_value_t = SAMPLE_RATE)]
        sample_rate: u32,
    },

    /// Print the tone timeline for hex-encoded bytes
    Tones {
        #[arg(value_name = "HEX")]
        hex: String,
    },
}

#[derive(Args)]
struct AlertArgs {
    /// Alert type (SOS, EQ, FL, FI, MD, TS, HZ, ST); unknown types become SOS
    #[arg(short = 't', long = "type", default_value = "SOS")]
    alert_type: String,

    /// Severity 1-9
    #[arg(short, long, default_value_t = 5)]
    severity: u8,

    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// People affected
    #[arg(short, long, default_value_t = 1)]
    pop: u64,

    /// Short message, up to 8 ASCII characters
    #[arg(short, long, default_value = "")]
    msg: String,
}

impl AlertArgs {
    fn to_fields(&self) -> SemanticFields {
        SemanticFields {
            alert_type: AlertType::parse_or_default(&self.alert_type),
            severity: self.severity,
            lat: self.lat,
            lon: self.lon,
            pop: self.pop,
            msg: self.msg.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Unsupported WAV format: {bits}-bit {format:?}")]
    UnsupportedFormat { bits: u16, format: SampleFormat },

    #[error("Expected a semantic code or a wire frame, got {0} bytes of hex")]
    UnexpectedHexLength(usize),
}

/// JSON written by `receive`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceiveReport {
    confidence: f32,
    error_positions: Vec<usize>,
    signal_detected: bool,
    preamble_located: bool,
    frame_hex: String,
    alert: Option<ReceivedAlert>,
    audit: Option<AuditRecord>,
}

/// JSON written by `unpack`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnpackReport {
    fields: SemanticFields,
    integrity: Integrity,
    verification: Verification,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { output } => keygen_command(output.as_deref())?,
        Commands::Pack { alert } => pack_command(&alert)?,
        Commands::Unpack { hex, lenient, require_signature } => {
            unpack_command(&hex, lenient, require_signature)?
        }
        Commands::Transmit { alert, key, output, sample_rate } => {
            transmit_command(&alert, &key, &output, sample_rate)?
        }
        Commands::Receive { input, output, sample_rate } => {
            receive_command(&input, output.as_deref(), sample_rate)?
        }
        Commands::Tones { hex } => tones_command(&hex)?,
    }

    Ok(())
}

fn keygen_command(output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut seed = [0u8; SEED_LEN];
    OsRng.fill_bytes(&mut seed);
    let key = Ed25519KeyHandle::from_seed(&seed);
    let seed_hex = hex::encode(seed);

    match output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", seed_hex))?;
            println!("Wrote key seed to {}", path.display());
        }
        None => println!("Seed:       {}", seed_hex),
    }
    println!("Public key: {}", hex::encode(key.public_key()));
    Ok(())
}

fn pack_command(alert: &AlertArgs) -> Result<(), Box<dyn std::error::Error>> {
    let code = tonealert_core::pack(&alert.to_fields());
    println!("{}", code.to_hex());
    Ok(())
}

fn unpack_command(
    text: &str,
    lenient: bool,
    require_signature: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let policy = if lenient {
        ChecksumPolicy::Lenient
    } else {
        ChecksumPolicy::Strict
    };

    let text = text.trim();
    let received = match text.len() / 2 {
        CODE_LEN => receive_code(&SemanticCode::from_hex(text)?, policy)?,
        FRAME_LEN => {
            let frame = WireFrame::from_hex(text)?;
            receive_frame(frame.as_bytes(), policy, &Ed25519Verifier)?
        }
        n => return Err(CliError::UnexpectedHexLength(n).into()),
    };
    if require_signature {
        received.verification.require()?;
    }

    let report = UnpackReport {
        fields: received.fields,
        integrity: received.integrity,
        verification: received.verification,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn transmit_command(
    alert: &AlertArgs,
    key_path: &Path,
    output_path: &Path,
    sample_rate: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ModemConfig::new(sample_rate);
    config.validate()?;

    let key = Ed25519KeyHandle::from_seed_hex(&std::fs::read_to_string(key_path)?)?;
    let outgoing = compose(&alert.to_fields(), &key);
    println!("Semantic code: {}", outgoing.code.to_hex());

    let samples = transmit(&outgoing.frame, &config);
    write_wav(output_path, &samples, sample_rate)?;
    println!(
        "Wrote {} samples ({:.2} s) to {}",
        samples.len(),
        samples.len() as f64 / sample_rate as f64,
        output_path.display()
    );
    Ok(())
}

fn receive_command(
    input_path: &Path,
    output_path: Option<&Path>,
    sample_rate: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ModemConfig::new(sample_rate);
    config.validate()?;

    let (samples, wav_rate) = read_wav(input_path)?;
    let samples = resample(&samples, wav_rate, sample_rate)?;

    let reception = receive_acoustic(&samples, &config, &Ed25519Verifier);
    let decode = &reception.decode;
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    let report = ReceiveReport {
        confidence: decode.confidence,
        error_positions: decode.error_positions.iter().copied().collect(),
        signal_detected: decode.signal_detected(),
        preamble_located: decode.sync.is_some_and(|s| s.is_located()),
        frame_hex: hex::encode(&decode.data),
        audit: reception
            .alert
            .as_ref()
            .map(|alert| AuditRecord::from_received(alert, decode.confidence, timestamp)),
        alert: reception.alert.clone(),
    };
    let json = serde_json::to_string_pretty(&report)?;

    match output_path {
        Some(path) => {
            std::fs::write(path, json)?;
            println!(
                "Decoded {} bytes (confidence {:.3}), report written to {}",
                decode.data.len(),
                decode.confidence,
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn tones_command(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = hex::decode(text.trim())?;
    for tone in FskModulator::default().tones(&bytes) {
        println!(
            "{:>9.3} s  {:>7.3} s  {:>6.0} Hz",
            tone.start_secs, tone.duration_secs, tone.freq_hz
        );
    }
    Ok(())
}

fn write_wav(
    path: &Path,
    samples: &[f32],
    sample_rate: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let file = File::create(path)?;
    let mut writer = hound::WavWriter::new(file, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Mono samples in [-1, 1] and the file's sample rate.
fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let mut reader = hound::WavReader::new(file)?;
    let spec = reader.spec();
    log::info!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ (24 | 32)) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (format, bits) => return Err(CliError::UnsupportedFormat { bits, format }.into()),
    };

    let mono = downmix(&interleaved, spec.channels as usize)?;
    Ok((mono, spec.sample_rate))
}
