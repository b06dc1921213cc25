//! Command-line interface for Razcep.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

/// Razcep - weighted tunnel splitter
#[derive(Parser, Debug)]
#[command(
    name = "razcep",
    author,
    version,
    about = "Weighted tunnel splitter: NFQUEUE source-port mangler",
    long_about = r#"
Razcep intercepts TCP and UDP packets on an NFQUEUE hook and rewrites
source ports so that one canonical port per remote peer fans out across a
pool of per-tunnel ports, weighted by a live weight file.

Outbound packets (sourced from --self-ip) from canonical port
SEND_BASE + N are rewritten to SEND_BASE + N*16 + tunnel, with the tunnel
chosen by weighted fair interleaving. Inbound tunnel ports collapse back
to the canonical port. Destination ports are never touched.

QUICK START:
  iptables -A OUTPUT -p udp -j NFQUEUE --queue-num 58
  iptables -A INPUT  -p udp -j NFQUEUE --queue-num 58
  razcep --self-ip 10.0.0.1 --weight-file ./flow_weights/h1.txt
"#
)]
pub struct Cli {
    /// Configuration file path (TOML); flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// IPv4 address of this host, dotted quad or integer. Packets sourced
    /// from it are treated as outbound
    #[arg(short = 'i', long, value_parser = parse_ipv4_flexible)]
    pub self_ip: Option<Ipv4Addr>,

    /// Weight file path. If it exists it is read then deleted, once per poll
    #[arg(short = 'w', long)]
    pub weight_file: Option<PathBuf>,

    /// First port of the receive range
    #[arg(short = 'r', long)]
    pub recv_base: Option<u16>,

    /// First port of the managed send range
    #[arg(short = 's', long)]
    pub send_base: Option<u16>,

    /// NFQUEUE queue number to bind
    #[arg(short = 'q', long)]
    pub queue_num: Option<u16>,

    /// Recompute TCP/UDP checksums after rewriting (default leaves them zero)
    #[arg(short = 'c', long)]
    pub checksum: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    pub log_level: String,

    /// Log the fate of every packet (shorthand for --log-level debug)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Fold command-line overrides into a loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(addr) = self.self_ip {
            config.splitter.self_addr = Some(addr);
        }
        if let Some(ref path) = self.weight_file {
            config.weights.file = Some(path.clone());
        }
        if let Some(port) = self.recv_base {
            config.splitter.recv_base_port = port;
        }
        if let Some(port) = self.send_base {
            config.splitter.send_base_port = port;
        }
        if let Some(num) = self.queue_num {
            config.queue.queue_num = num;
        }
        if self.checksum {
            config.splitter.compute_checksums = true;
        }

        config.logging.level = if self.verbose {
            "debug".into()
        } else {
            self.log_level.clone()
        };
        config.logging.color = !self.no_color;
    }
}

/// Parse an IPv4 address given as a dotted quad or as a host-order integer
/// (the form the original mininet harness passes).
fn parse_ipv4_flexible(s: &str) -> Result<Ipv4Addr, String> {
    if let Ok(addr) = s.parse::<Ipv4Addr>() {
        return Ok(addr);
    }
    s.parse::<u32>()
        .map(Ipv4Addr::from)
        .map_err(|_| format!("'{s}' is neither a dotted-quad IPv4 address nor an integer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4_dotted() {
        assert_eq!(
            parse_ipv4_flexible("10.0.0.1").unwrap(),
            Ipv4Addr::new(10, 0, 0, 1)
        );
    }

    #[test]
    fn test_parse_ipv4_integer() {
        // 10.0.0.1 == 10 * 2^24 + 1
        assert_eq!(
            parse_ipv4_flexible("167772161").unwrap(),
            Ipv4Addr::new(10, 0, 0, 1)
        );
    }

    #[test]
    fn test_parse_ipv4_garbage() {
        assert!(parse_ipv4_flexible("not-an-ip").is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::parse_from([
            "razcep",
            "--self-ip",
            "10.0.0.2",
            "--weight-file",
            "/tmp/w.txt",
            "--send-base",
            "30000",
            "-c",
            "-v",
        ]);
        let mut config = Config::default();
        cli.apply_to(&mut config);

        assert_eq!(config.splitter.self_addr, Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(config.splitter.send_base_port, 30000);
        assert!(config.splitter.compute_checksums);
        assert_eq!(config.logging.level, "debug");
    }
}
