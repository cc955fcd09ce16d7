//! Thin command-line front end over `r3link::ppl`. All protocol logic lives
//! in the library; this binary only parses arguments, loads files, and
//! prints results, the same "thin, not core" split `patrace` draws between
//! its proxy loop (library-adjacent) and its argument parsing (the binary).

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;

use r3link::error::QueryError;
use r3link::mac::MacAddress;
use r3link::ppl::client::PplClient;
use r3link::ppl::config::{validate_against_schema, ConfigDocument};
use r3link::ppl::enums::ConfigStorageMode;
use r3link::ppl::mapper;
use r3link::ppl::messages::{GetNodeState, PairNode, SetGlobalHostConfig, UnpairNode};
use r3link::ppl::orchestrator::{ConfigureOrchestrator, ConfigureRequest};
use r3link::ppl::subprotocols::{ConfigurationMessage, DiscoveryMessage, PairingMessage, PplPacket};

/// Controls a PPL node: pairing, configuration, and liveness checks.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Node address to talk to.
    #[arg(long, value_name = "ADDR")]
    peer: SocketAddr,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Queries a node's liveness and reports its state.
    Test {
        /// MAC address of the node to query.
        #[arg(long)]
        mac: String,
    },
    /// Validates a configuration document's per-slot MAC settings against a
    /// node without committing anything.
    Validate {
        /// Path to the JSON configuration document.
        config: PathBuf,
    },
    /// Clears a node's pending configuration set.
    Clear {
        /// MAC address of the node to clear.
        #[arg(long)]
        mac: String,
    },
    /// Runs a full configure transaction against a node.
    Configure {
        /// Path to the JSON configuration document.
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = PplClient::new(args.peer).context("failed to bind local PPL client socket")?;

    match args.command {
        Command::Test { mac } => run_test(&client, &mac),
        Command::Validate { config } => run_validate(&client, &config),
        Command::Clear { mac } => run_clear(&client, &mac),
        Command::Configure { config } => run_configure(&client, &config),
    }
}

fn parse_mac(s: &str) -> anyhow::Result<MacAddress> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("{s:?} is not a valid MAC address"))
}

fn run_test(client: &PplClient, mac: &str) -> anyhow::Result<()> {
    let mac = parse_mac(mac)?;
    let reply = client.send_command(PplPacket::Discovery(DiscoveryMessage::GetNodeState(
        GetNodeState { mac },
    )))?;
    match reply {
        PplPacket::Discovery(DiscoveryMessage::NodeState(state)) => {
            println!("{}: {:?}", style("node state").bold(), state.state);
            Ok(())
        }
        other => bail!("unexpected reply to GetNodeState: {other:?}"),
    }
}

fn run_clear(client: &PplClient, mac: &str) -> anyhow::Result<()> {
    let mac = parse_mac(mac)?;
    client.send_command(PplPacket::Pairing(PairingMessage::PairNode(PairNode { mac })))?;

    let result = client.send_command(PplPacket::Configuration(
        ConfigurationMessage::ClearConfigSet(r3link::ppl::messages::ClearConfigSet {}),
    ));

    client.send_command(PplPacket::Pairing(PairingMessage::UnpairNode(UnpairNode { mac })))?;

    result?;
    println!("{}", style("config set cleared").green());
    Ok(())
}

fn load_document(path: &PathBuf) -> anyhow::Result<ConfigDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    validate_against_schema(&value).map_err(|e| anyhow::anyhow!("{} failed schema validation: {e}", path.display()))?;

    serde_json::from_value(value).with_context(|| format!("failed to parse {}", path.display()))
}

fn run_validate(client: &PplClient, path: &PathBuf) -> anyhow::Result<()> {
    let document = load_document(path)?;
    let (mac, slots) = mapper::slots_from_document(&document)?;

    client.send_command(PplPacket::Pairing(PairingMessage::PairNode(PairNode { mac })))?;

    let mut any_failed = false;
    for slot in &slots {
        let outcome = client.send_command(PplPacket::Configuration(
            ConfigurationMessage::ValidateMacConfig(r3link::ppl::messages::ValidateMacConfig {
                mac: slot.mac_config.mac,
                latency: slot.mac_config.latency,
                payload_size: slot.mac_config.payload_size,
                reliability: slot.mac_config.reliability,
                station_count: slot.mac_config.station_count,
                optimization: slot.mac_config.optimization,
                total_ptts: slot.mac_config.total_ptts,
                is_static: slot.mac_config.is_static,
                security_mode: slot.mac_config.security_mode,
            }),
        ));
        match outcome {
            Ok(_) => println!("slot {}: {}", slot.slot, style("ok").green()),
            Err(err) => {
                any_failed = true;
                println!("slot {}: {} ({err})", slot.slot, style("failed").red());
            }
        }
    }

    client.send_command(PplPacket::Pairing(PairingMessage::UnpairNode(UnpairNode { mac })))?;

    if any_failed {
        bail!("one or more slots failed validation");
    }
    Ok(())
}

fn run_configure(client: &PplClient, path: &PathBuf) -> anyhow::Result<()> {
    let document = load_document(path)?;
    let (mac, slots) = mapper::slots_from_document(&document)?;

    let request = ConfigureRequest {
        mac,
        clear_first: false,
        validate_first: true,
        storage_mode: ConfigStorageMode::Persist,
        global_host_config: SetGlobalHostConfig {
            dhcp_client: 1,
            dns_primary: std::net::Ipv4Addr::UNSPECIFIED,
            dns_secondary: std::net::Ipv4Addr::UNSPECIFIED,
            ntp_server: std::net::Ipv4Addr::UNSPECIFIED,
            domain: String::new(),
        },
        slots,
    };

    let orchestrator = ConfigureOrchestrator::new(client);
    let (log, result) = orchestrator.run_configure(&request, || {
        chrono::Utc::now().to_rfc3339()
    });

    for row in &log {
        let marker = match row.result {
            r3link::ppl::orchestrator::LogResult::Ok => style("ok").green(),
            r3link::ppl::orchestrator::LogResult::Err => style("err").red(),
        };
        println!(
            "[{}] {marker} {}",
            row.timestamp,
            row.message.as_deref().unwrap_or("")
        );
    }

    match result {
        Ok(uid) => {
            println!("{} 0x{uid:016x}", style("configuration set uid:").bold());
            Ok(())
        }
        Err(err) => Err(anyhow::Error::new(err).context("configure transaction failed")),
    }
}

#[allow(dead_code)]
fn unreachable_query_error(_: QueryError) {}
