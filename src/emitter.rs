//! Random postal code sender for exercising database consumers.
//!
//! Reads the codes from a finished database and sends `"<code>,<tag>"`
//! datagrams at a fixed rate. Delivery is best effort: a failed send is
//! counted and dropped, and the loop keeps going.

use csv::ReaderBuilder;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const MAX_TAG_LEN: usize = 16;
const GENERATED_TAG_LEN: usize = 8;

/// `^\w{1,16}$`, restricted to ASCII word characters
fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?-u:\w){1,16}$").unwrap())
}

/// Accept tags made of 1 to 16 ASCII letters, digits or underscores.
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag_pattern().is_match(tag) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "invalid tag {:?}: expected 1 to {} letters, digits or underscores",
            tag, MAX_TAG_LEN
        )))
    }
}

/// Random alphanumeric tag for clients started without one
pub fn generate_tag(rng: &mut impl Rng) -> String {
    (0..GENERATED_TAG_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

pub fn payload(code: &str, tag: &str) -> String {
    format!("{},{}", code, tag)
}

/// Read the code column (first `|` field) of a database.
pub fn load_codes<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut codes = Vec::new();
    for result in reader.records() {
        let record = result?;
        if let Some(code) = record.get(0).map(str::trim).filter(|c| !c.is_empty()) {
            codes.push(code.to_string());
        }
    }
    Ok(codes)
}

pub fn load_codes_from_path(path: &Path) -> Result<Vec<String>> {
    let codes = load_codes(BufReader::new(File::open(path)?))?;
    info!("Loaded {} codes from {}", codes.len(), path.display());
    Ok(codes)
}

/// Capability to send one datagram. Sending may fail.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&mut self, payload: &[u8]) -> io::Result<()>;
}

/// UDP transport bound to an ephemeral local port
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpTransport {
    /// Resolve `host` once and bind a local socket of the matching family.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| Error::Config(format!("cannot resolve {}: {}", host, e)))?
            .collect();

        let target = addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| Error::Config(format!("no addresses found for {}", host)))?;

        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await?;

        info!(addr = %target, "UDP transport ready");
        Ok(UdpTransport { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Transport for UdpTransport {
    async fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        self.socket.send_to(payload, self.target).await.map(|_| ())
    }
}

/// Rate and tag, validated at startup
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    period: Duration,
    tag: String,
}

impl EmitterConfig {
    /// `rate` is in events per second.
    pub fn new(rate: f64, tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        validate_tag(&tag)?;

        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::Config(format!("rate must be a positive number, got {}", rate)));
        }
        let period = Duration::try_from_secs_f64(1.0 / rate)
            .ok()
            .filter(|p| !p.is_zero())
            .ok_or_else(|| Error::Config(format!("rate {} is out of range", rate)))?;

        Ok(EmitterConfig { period, tag })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub sent: u64,
    pub failed: u64,
}

pub struct SampleEmitter<T, R> {
    codes: Vec<String>,
    config: EmitterConfig,
    transport: T,
    rng: R,
}

impl<T: Transport, R: Rng> SampleEmitter<T, R> {
    pub fn new(codes: Vec<String>, config: EmitterConfig, transport: T, rng: R) -> Result<Self> {
        if codes.is_empty() {
            return Err(Error::Config("database contains no codes".to_string()));
        }
        Ok(SampleEmitter {
            codes,
            config,
            transport,
            rng,
        })
    }

    /// Payload for a uniformly random code
    pub fn next_payload(&mut self) -> String {
        // `new` guarantees at least one code
        let code = self
            .codes
            .choose(&mut self.rng)
            .map(String::as_str)
            .unwrap_or_default();
        payload(code, &self.config.tag)
    }

    /// Send one payload per tick. Runs forever when `limit` is `None`.
    pub async fn run(&mut self, limit: Option<u64>) -> EmitStats {
        let mut ticker = tokio::time::interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats = EmitStats::default();
        let mut ticks: u64 = 0;

        while limit.map_or(true, |max| ticks < max) {
            ticker.tick().await;
            ticks += 1;

            let payload = self.next_payload();
            match self.transport.send(payload.as_bytes()).await {
                Ok(()) => stats.sent += 1,
                Err(e) => {
                    stats.failed += 1;
                    debug!("Send of {:?} failed: {}", payload, e);
                }
            }
        }

        stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
