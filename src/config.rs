//! Configuration directives.
//!
//! One directive per line:
//!
//! ```text
//! <in_protocol> <in_endpoint> <range> <out_protocol> <out_endpoint> [<shift>] [<auth>]
//! ```
//!
//! `#` starts a comment. Endpoints are `/dev/ttySn:baud` for serial ports
//! or `[udp://|tcp://]host:port`; `range` is a receiver address `N` or an
//! inclusive interval `N-M`; `shift` is a signed offset applied to matched
//! addresses; `auth` is an HTTP Basic credential (`user:password` is
//! encoded on the fly).

use std::env;
use std::fs;

use log::info;

use crate::channel::{Channel, ChannelFlags};
use crate::error::Error;
use crate::mixer::Mixer;
use crate::protocol::WriterProtocol;
use crate::reader::{CcNode, CcReader};
use crate::writer::CcWriter;

/// Default config file
const CONF_FILE: &str = "/etc/protozoa.conf";

/// Name of the config file, overridable from the environment.
pub fn config_file() -> String {
    env::var("PROTOZOA_CONFIG").unwrap_or_else(|_| CONF_FILE.to_string())
}

pub struct Config {
    mixer: Mixer,
}

impl Config {
    pub fn new() -> Config {
        Config {
            mixer: Mixer::new(),
        }
    }

    /// Read a configuration file and build the dispatch graph. An empty
    /// configuration is an error.
    pub fn read(filename: &str) -> Result<Config, Error> {
        let text = fs::read_to_string(filename)?;
        let mut cfg = Config::new();
        for line in text.lines() {
            cfg.scan_directive(line)?;
        }
        if cfg.mixer.channels.is_empty() {
            return Err(Error::EmptyConfig(filename.to_string()));
        }
        Ok(cfg)
    }

    pub fn into_mixer(self) -> Mixer {
        self.mixer
    }

    fn scan_directive(&mut self, line: &str) -> Result<(), Error> {
        let line = line.split('#').next().unwrap_or("");
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.len() {
            0 => Ok(()),
            1..=4 => Err(Error::InvalidDirective(line.trim().to_string())),
            _ => self.directive(
                fields[0],
                fields[1],
                fields[2],
                fields[3],
                fields[4],
                fields.get(5).copied().unwrap_or("0"),
                fields.get(6).copied(),
            ),
        }
    }

    fn directive(
        &mut self,
        protocol_in: &str,
        port_in: &str,
        range: &str,
        protocol_out: &str,
        port_out: &str,
        shift: &str,
        auth: Option<&str>,
    ) -> Result<(), Error> {
        info!(
            "config: {} {} {} -> {} {} {}",
            protocol_in, port_in, range, protocol_out, port_out, shift
        );
        let chn_in = self.get_channel(port_in, ChannelFlags::LISTEN);
        let rdr = match self.mixer.channels[chn_in].reader {
            Some(rdr) => rdr,
            None => {
                let rdr = self.mixer.readers.len();
                let name = self.mixer.channels[chn_in].name.clone();
                self.mixer.readers.push(CcReader::new(&name, protocol_in)?);
                self.mixer.channels[chn_in].reader = Some(rdr);
                rdr
            }
        };
        let chn_out = self.get_channel(port_out, ChannelFlags::empty());
        let protocol = WriterProtocol::from_name(protocol_out)?;
        if protocol.resp_required() {
            self.mixer.channels[chn_out].flags |= ChannelFlags::RESP_REQUIRED;
        }
        let auth = auth.filter(|a| !a.is_empty()).map(encode_auth);
        let wtr = self.mixer.writers.len();
        self.mixer
            .writers
            .push(CcWriter::new(wtr, chn_out, protocol, auth));
        let (range_first, range_last) = parse_range(range)?;
        let shift = shift
            .parse()
            .map_err(|_| Error::InvalidDirective(format!("shift: {}", shift)))?;
        self.mixer.readers[rdr].add_node(CcNode {
            writer: wtr,
            range_first,
            range_last,
            shift,
        });
        Ok(())
    }

    /// Find a channel serving the endpoint, or create one.
    fn get_channel(&mut self, spec: &str, flags: ChannelFlags) -> usize {
        let (name, service, extra) = parse_endpoint(spec);
        let flags = flags | extra;
        if let Some(idx) = self
            .mixer
            .channels
            .iter()
            .position(|chn| chn.matches(&name, &service, flags))
        {
            return idx;
        }
        self.mixer.channels.push(Channel::new(&name, &service, flags));
        self.mixer.channels.len() - 1
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}

/// Split an endpoint into name, service and transport flags.
fn parse_endpoint(spec: &str) -> (String, String, ChannelFlags) {
    let (spec, flags) = if let Some(rest) = strip_prefix(spec, "udp://") {
        (rest, ChannelFlags::UDP)
    } else if let Some(rest) = strip_prefix(spec, "tcp://") {
        (rest, ChannelFlags::TCP)
    } else {
        (spec, ChannelFlags::empty())
    };
    match spec.rfind(':') {
        Some(pos) => (spec[..pos].to_string(), spec[pos + 1..].to_string(), flags),
        None => (spec.to_string(), String::new(), flags),
    }
}

fn strip_prefix<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.starts_with(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Parse a receiver address range: `N`, or an inclusive `N-M`.
fn parse_range(range: &str) -> Result<(i32, i32), Error> {
    let bad = || Error::InvalidDirective(format!("range: {}", range));
    let (first, last) = match range.find('-') {
        Some(pos) => {
            let first = range[..pos].parse().map_err(|_| bad())?;
            let last = range[pos + 1..].parse().map_err(|_| bad())?;
            (first, last)
        }
        None => {
            let first = range.parse().map_err(|_| bad())?;
            (first, first)
        }
    };
    if first < 1 || last < first {
        return Err(bad());
    }
    Ok((first, last))
}

/// Pass a pre-encoded credential through; encode `user:password` pairs.
fn encode_auth(auth: &str) -> String {
    if auth.contains(':') {
        base64::encode(auth)
    } else {
        auth.to_string()
    }
}

/// Check that a configuration file parses cleanly.
pub fn verify(filename: &str) -> Result<(), Error> {
    Config::read(filename).map(|_| ())
}
