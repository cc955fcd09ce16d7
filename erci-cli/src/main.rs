//! Thin command-line front end over `r3link::erci`, one subcommand per ERCI
//! command, grounded on `patrace/src/main.rs`'s clap-derive/anyhow main shape.

use std::net::SocketAddr;

use anyhow::bail;
use clap::{Parser, Subcommand};
use console::style;

use r3link::erci::client::{ErciClient, ErciCommandArgs, ErciResponse};
use r3link::erci::constants::ErciCmd;

/// Drives a single ERCI ring-switch node.
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
    /// SELECT_CONFIG: choose a configuration, ring, and antenna.
    SelectConfig { config_id: u8, ring_id: u8, antenna_id: u8 },
    /// SWITCH_RING: change ring and antenna while running.
    SwitchRing { ring_id: u8, antenna_id: u8 },
    /// START: start the selected ring.
    Start,
    /// STOP: stop the running ring.
    Stop,
    /// SWITCH_ANTENNA: change only the active antenna while running.
    SwitchAntenna { antenna_id: u8 },
    /// SET_CONFIGMODE: toggle the node's configuration-mode flag.
    SetConfigmode {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        flag: u8,
    },
    /// STATE_QUERY: report the node's current lifecycle state.
    State,
    /// DIAGNOSTIC_DESCRIPTION_QUERY: fetch a free-text diagnostic string.
    Diagdesc,
    /// PASSPORT_QUERY: fetch a node's MAC address and serial number.
    Passport { mac_address: String, serial_number: String },
    /// REBOOT: reboot the node. No reply is expected.
    Reboot,
    /// GET_CSI_QUERY: fetch the channel state information matrix.
    Csi,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = ErciClient::new(args.peer)?;

    let (command, cmd_args) = match args.command {
        Command::SelectConfig { config_id, ring_id, antenna_id } => (
            ErciCmd::SelectConfig,
            ErciCommandArgs {
                config_id: Some(config_id),
                ring_id: Some(ring_id),
                antenna_id: Some(antenna_id),
                ..Default::default()
            },
        ),
        Command::SwitchRing { ring_id, antenna_id } => (
            ErciCmd::SwitchRing,
            ErciCommandArgs { ring_id: Some(ring_id), antenna_id: Some(antenna_id), ..Default::default() },
        ),
        Command::Start => (ErciCmd::Start, ErciCommandArgs::default()),
        Command::Stop => (ErciCmd::Stop, ErciCommandArgs::default()),
        Command::SwitchAntenna { antenna_id } => (
            ErciCmd::SwitchAntenna,
            ErciCommandArgs { antenna_id: Some(antenna_id), ..Default::default() },
        ),
        Command::SetConfigmode { flag } => (
            ErciCmd::SetConfigMode,
            ErciCommandArgs { configmode_flag: Some(flag), ..Default::default() },
        ),
        Command::State => (ErciCmd::StateQuery, ErciCommandArgs::default()),
        Command::Diagdesc => (ErciCmd::DiagnosticDescriptionQuery, ErciCommandArgs::default()),
        Command::Passport { mac_address, serial_number } => (
            ErciCmd::PassportQuery,
            ErciCommandArgs {
                mac_address: Some(mac_address),
                serial_number: Some(serial_number),
                ..Default::default()
            },
        ),
        Command::Reboot => (ErciCmd::Reboot, ErciCommandArgs::default()),
        Command::Csi => (ErciCmd::GetCsiQuery, ErciCommandArgs::default()),
    };

    if matches!(command, ErciCmd::Reboot) {
        // REBOOT has no reply; send_command would block until timeout.
        bail!("reboot acknowledgement is not part of the ERCI wire protocol; send via a raw client if needed");
    }

    let response = client.send_command(command, &cmd_args)?;
    print_response(&response);
    Ok(())
}

fn print_response(response: &ErciResponse) {
    match response {
        ErciResponse::CommandResult { success, status_msg } => {
            let marker = if *success { style("ok").green() } else { style("failed").red() };
            println!("{marker}: {status_msg}");
        }
        ErciResponse::State { state, config_id, ring_id, antenna_id } => {
            println!(
                "{} {state:?} config={config_id} ring={ring_id} antenna={antenna_id}",
                style("state:").bold()
            );
        }
        ErciResponse::DiagnosticDescription(text) => {
            println!("{} {text}", style("diagnostic:").bold());
        }
        ErciResponse::PassportQuery { success, mac_address, serial_number } => {
            let mac = mac_address
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":");
            println!(
                "{} success={success} mac={mac} serial={serial_number}",
                style("passport:").bold()
            );
        }
        ErciResponse::Csi { success, own_id, station_ids, matrix } => {
            println!(
                "{} success={success} own_id={own_id} stations={} entries={}",
                style("csi:").bold(),
                station_ids.len(),
                matrix.len()
            );
        }
    }
}
