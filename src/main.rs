use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rfm69_link::logging::init_logger_with_default;
use rfm69_link::radio::{Band, Radio, RadioConfig, SimulatedRfm69, Transport};
use rfm69_link::util::{decode_hex, encode_hex, parse_aes_key};
use rfm69_link::log_info;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Parser)]
#[command(name = "rfm69-cli")]
#[command(about = "CLI tool for RFM69 packet radios")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Own node address
    #[arg(long, global = true)]
    node: Option<u8>,

    /// Network id
    #[arg(long, global = true)]
    network: Option<u8>,

    /// Band: 315, 433, 868 or 915
    #[arg(long, global = true)]
    band: Option<Band>,

    /// Module without the +20 dBm PA stages (RFM69W/CW)
    #[arg(long, global = true)]
    standard_power: bool,

    /// AES key, 32 hex digits
    #[arg(long, global = true)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Hardware(HardwareCommand),
    /// Loopback demo against the simulated chip
    Simulate,
}

/// Commands that talk to a real module
#[derive(Subcommand)]
enum HardwareCommand {
    /// Send a hex payload to a node
    Send { to: u8, payload: String },
    /// Print received packets as JSON lines
    Listen {
        #[arg(short, long, default_value = "10")]
        seconds: u64,
    },
    /// Show or set the carrier frequency
    Frequency {
        #[arg(long)]
        set: Option<u32>,
    },
}

fn load_config(cli: &Cli) -> Result<RadioConfig> {
    let mut config = match &cli.config {
        Some(path) => RadioConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RadioConfig::default(),
    };
    if let Some(node) = cli.node {
        config.node_id = node;
    }
    if let Some(network) = cli.network {
        config.network_id = network;
    }
    if let Some(band) = cli.band {
        config.band = band;
    }
    if cli.standard_power {
        config.is_high_power = false;
    }
    Ok(config)
}

async fn apply_key<T: Transport + 'static>(radio: &Radio<T>, key: Option<&str>) -> Result<()> {
    if let Some(key) = key {
        let key = parse_aes_key(key).context("invalid AES key")?;
        radio.encrypt(Some(&key[..])).await?;
    }
    Ok(())
}

#[cfg_attr(not(feature = "raspberry-pi"), allow(dead_code))]
async fn run_command<T: Transport + 'static>(radio: &Radio<T>, command: &HardwareCommand) -> Result<()> {
    match command {
        HardwareCommand::Send { to, payload } => {
            let payload = decode_hex(payload).context("payload is not hex")?;
            radio.send(*to, &payload).await?;
            log_info(&format!("Sent {} bytes to node {to}", payload.len()));
        }
        HardwareCommand::Listen { seconds } => {
            let mut packets = radio.subscribe();
            radio.listen().await?;

            let window = Duration::from_secs(*seconds);
            while let Ok(Ok(packet)) = timeout(window, packets.recv()).await {
                println!("{}", serde_json::to_string(&packet)?);
            }
        }
        HardwareCommand::Frequency { set } => {
            if let Some(hz) = set {
                radio.set_frequency(*hz).await?;
            }
            println!("{} Hz", radio.frequency().await?);
        }
    }
    Ok(())
}

async fn simulate(config: RadioConfig, key: Option<&str>) -> Result<()> {
    let chip = SimulatedRfm69::new();
    let radio = Radio::new(chip.clone(), config, chip.interrupt_line());
    let mut packets = radio.subscribe();

    radio.init().await?;
    apply_key(&radio, key).await?;
    log_info(&format!("Simulated chip version 0x{:02X}", radio.version().await?));

    radio.listen().await?;
    radio.send(2, b"ping").await?;
    for frame in chip.transmitted() {
        println!("on air: {}", encode_hex(&frame));
    }

    // Node 2 answers
    radio.listen().await?;
    chip.inject_packet(&[6, config.node_id, 2, 0, b'p', b'o', b'n', b'g']);
    let packet = timeout(Duration::from_secs(1), packets.recv())
        .await
        .context("no packet received")??;
    println!("received: {}", serde_json::to_string(&packet)?);

    println!("stats: {}", serde_json::to_string(&radio.stats())?);
    radio.stop()?;
    Ok(())
}

#[cfg(feature = "raspberry-pi")]
async fn run_hardware(config: RadioConfig, key: Option<&str>, command: &HardwareCommand) -> Result<()> {
    use rfm69_link::radio::hal::raspberry_pi::{attach_interrupt_pin, pulse_reset, SpiTransport};
    use rfm69_link::radio::registers::{DEFAULT_INTERRUPT_PIN, DEFAULT_RESET_PIN};
    use rfm69_link::InterruptLine;

    pulse_reset(DEFAULT_RESET_PIN).await?;
    let line = InterruptLine::new();
    let _dio0 = attach_interrupt_pin(DEFAULT_INTERRUPT_PIN, line.clone())?;

    let radio = Radio::new(SpiTransport::new()?, config, line);
    radio.init().await?;
    apply_key(&radio, key).await?;

    let result = run_command(&radio, command).await;
    radio.stop()?;
    result
}

#[cfg(not(feature = "raspberry-pi"))]
async fn run_hardware(_config: RadioConfig, _key: Option<&str>, _command: &HardwareCommand) -> Result<()> {
    anyhow::bail!("hardware commands need the raspberry-pi feature; try `simulate`")
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger_with_default("info");

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let key = cli.key.as_deref();

    match &cli.command {
        Commands::Simulate => simulate(config, key).await,
        Commands::Hardware(command) => run_hardware(config, key, command).await,
    }
}
