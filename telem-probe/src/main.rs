// telem-probe/src/main.rs
// Stand-in for the TelemFFB side of the bridge: prints incoming telemetry
// and sends AXIS / OVERRIDE commands to the plugin.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::net::{SocketAddr, UdpSocket};
use telem_protocol::{
    decode_wire_line, encode_axis_command, encode_override_command, Snapshot, COMMAND_PORT,
    TELEMETRY_PORT,
};
use telem_schema::{Axis, Field, OverrideChannel};

// ---------------------------------------------------------------------------
// CLI args
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "telem-probe", about = "Talk to the TelemFFB X-Plane plugin")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print telemetry datagrams as they arrive.
    Listen {
        #[arg(long, default_value_t = default_listen_addr())] bind: SocketAddr,
        /// Stop after this many datagrams.
        #[arg(long)] count: Option<usize>,
        /// One JSON object per datagram instead of a table.
        #[arg(long)] json: bool,
    },
    /// Send an AXIS command.
    Axis {
        #[arg(long, default_value_t = default_command_addr())] to: SocketAddr,
        #[arg(long, allow_hyphen_values = true)] jx: Option<f32>,
        #[arg(long, allow_hyphen_values = true)] jy: Option<f32>,
        #[arg(long, allow_hyphen_values = true)] px: Option<f32>,
        #[arg(long, allow_hyphen_values = true)] cy: Option<f32>,
    },
    /// Send an OVERRIDE command.
    Override {
        #[arg(long, default_value_t = default_command_addr())] to: SocketAddr,
        /// joystick, pedals or collective
        channel: String,
        #[arg(action = clap::ArgAction::Set)] enabled: bool,
    },
    /// Dump the telemetry field registry as JSON.
    Fields,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], TELEMETRY_PORT))
}

fn default_command_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], COMMAND_PORT))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Listen { bind, count, json } => listen(bind, count, json),
        Command::Axis { to, jx, jy, px, cy } => {
            let datagram = axis_datagram(&[
                (Axis::JoystickX, jx),
                (Axis::JoystickY, jy),
                (Axis::PedalsX, px),
                (Axis::CollectiveY, cy),
            ])?;
            send(to, &datagram)
        }
        Command::Override { to, channel, enabled } => send(to, &override_datagram(&channel, enabled)?),
        Command::Fields => {
            let specs: Vec<_> = Field::ALL.iter().map(|f| f.spec()).collect();
            println!("{}", serde_json::to_string_pretty(&specs)?);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

fn listen(bind: SocketAddr, count: Option<usize>, json: bool) -> Result<()> {
    let socket = UdpSocket::bind(bind).with_context(|| format!("Failed to bind {bind}"))?;
    eprintln!("Listening for telemetry on {bind}...");

    let mut buf = vec![0u8; 65_535];
    let mut received = 0usize;
    while count.map_or(true, |n| received < n) {
        let (n, from) = socket.recv_from(&mut buf).context("Receive failed")?;
        let text = String::from_utf8_lossy(&buf[..n]);
        let snapshot = decode_wire_line(&text);
        received += 1;

        if json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            println!("--- #{received} from {from} ({n} bytes)");
            print!("{}", format_snapshot(&snapshot));
        }
    }
    Ok(())
}

fn format_snapshot(snapshot: &Snapshot) -> String {
    let width = snapshot.keys().map(String::len).max().unwrap_or(0);
    snapshot
        .iter()
        .map(|(k, v)| format!("{k:<width$} = {v}\n"))
        .collect()
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn axis_datagram(values: &[(Axis, Option<f32>)]) -> Result<String> {
    let pairs: Vec<(&str, f32)> = values
        .iter()
        .filter_map(|(axis, v)| v.map(|v| (axis.key(), v)))
        .collect();
    if pairs.is_empty() {
        bail!("Give at least one of --jx, --jy, --px, --cy");
    }
    Ok(encode_axis_command(&pairs))
}

fn override_datagram(channel: &str, enabled: bool) -> Result<String> {
    let Some(channel) = OverrideChannel::from_keyword(channel) else {
        bail!("Unknown channel {channel:?} (expected joystick, pedals or collective)");
    };
    Ok(encode_override_command(channel.keyword(), enabled))
}

fn send(to: SocketAddr, datagram: &str) -> Result<()> {
    let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], 0))).context("Failed to bind sender")?;
    socket
        .send_to(datagram.as_bytes(), to)
        .with_context(|| format!("Failed to send to {to}"))?;
    eprintln!("Sent {datagram:?} to {to}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_datagram_skips_unset_axes() {
        let d = axis_datagram(&[
            (Axis::JoystickX, Some(0.5)),
            (Axis::JoystickY, None),
            (Axis::PedalsX, Some(-0.25)),
            (Axis::CollectiveY, None),
        ])
        .unwrap();
        assert_eq!(d, "AXIS:jx=0.5,px=-0.25");
    }

    #[test]
    fn axis_datagram_needs_a_value() {
        assert!(axis_datagram(&[(Axis::JoystickX, None)]).is_err());
    }

    #[test]
    fn override_datagram_validates_channel() {
        assert_eq!(override_datagram("pedals", false).unwrap(), "OVERRIDE:pedals=false");
        assert!(override_datagram("throttle", true).is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["telem-probe", "axis", "--jx", "-0.5"]).unwrap();
        match cli.command {
            Command::Axis { to, jx, .. } => {
                assert_eq!(to, default_command_addr());
                assert_eq!(jx, Some(-0.5));
            }
            _ => panic!("expected axis"),
        }

        let cli = Cli::try_parse_from(["telem-probe", "override", "joystick", "true"]).unwrap();
        assert!(matches!(cli.command, Command::Override { enabled: true, .. }));

        let cli = Cli::try_parse_from(["telem-probe", "listen", "--count", "3", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Listen { count: Some(3), json: true, .. }));
    }

    #[test]
    fn snapshot_table_aligns_keys() {
        let snap = decode_wire_line("G=1.000;EngRPM=2400.000~0.000;");
        assert_eq!(format_snapshot(&snap), "EngRPM = 2400.000~0.000\nG      = 1.000\n");
    }

    #[test]
    fn send_reaches_a_local_socket() {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_read_timeout(Some(std::time::Duration::from_secs(2))).unwrap();
        send(rx.local_addr().unwrap(), "OVERRIDE:joystick=true").unwrap();

        let mut buf = [0u8; 64];
        let (n, _) = rx.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"OVERRIDE:joystick=true");
    }
}
