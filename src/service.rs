//! Service fingerprinting
//!
//! Each open port goes through the same sequence:
//! 1. Connect within the connect budget and record the latency
//! 2. Listen briefly for an unsolicited banner
//! 3. Otherwise send the probe selected from [`PROBE_TABLE`] and read the reply
//! 4. Classify the captured text into protocol flags
//! 5. Pull product and version out of the captured text
//! 6. Pick a verdict from [`VERDICT_RULES`], then fall back to the
//!    well-known port table when the verdict stayed generic
//!
//! Nothing in here fails: I/O problems end up as [`ERROR_NOTE_PREFIX`] notes
//! on the fingerprint and simply lower the final confidence.

use futures::stream::{self, StreamExt};
use std::{io, sync::Arc, time::Instant};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{sleep, timeout},
};
use tracing::debug;

use crate::{
    port_table::{Transport, WellKnownPorts},
    timing::ProbeTiming,
};

/// Text used when no verdict could be reached
pub const UNKNOWN_SERVICE_NAME: &str = "Unknown service";

/// Port association for ports missing from [`port_association`]
pub const NON_STANDARD_PORT: &str = "non-standard port";

/// Prefix of the detection note recorded when interrogation stops on an
/// I/O error. Downstream consumers match on it verbatim.
pub const ERROR_NOTE_PREFIX: &str = "Erreur: ";

const MAX_CLASSIFIED_CHARS: usize = 500;
const READ_BUFFER_SIZE: usize = 2048;
const HINT_BONUS: u32 = 20;

/// Everything learned about one open port
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFingerprint {
    pub port: u16,
    pub is_http: bool,
    pub is_tls: bool,
    pub is_ssh: bool,
    pub is_ftp: bool,
    pub is_smtp: bool,
    pub server_header: Option<String>,
    pub tls_version: Option<String>,
    pub ssh_version: Option<String>,
    /// First captured response text, truncated
    pub banner: Option<String>,
    /// Server software, e.g. `nginx` or `OpenSSH`
    pub product: Option<String>,
    pub version: Option<String>,
    pub tcp_connectable: bool,
    pub connection_time_ms: f64,
    pub sends_data_first: bool,
    pub common_port_association: String,
    /// Append-only audit trail of what was observed
    pub detection_methods: Vec<String>,
    pub service_name: String,
    pub confidence: u8,
    pub details: String,
    pub tier: Tier,
}

impl ServiceFingerprint {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            is_http: false,
            is_tls: false,
            is_ssh: false,
            is_ftp: false,
            is_smtp: false,
            server_header: None,
            tls_version: None,
            ssh_version: None,
            banner: None,
            product: None,
            version: None,
            tcp_connectable: false,
            connection_time_ms: 0.0,
            sends_data_first: false,
            common_port_association: String::new(),
            detection_methods: Vec::new(),
            service_name: UNKNOWN_SERVICE_NAME.to_string(),
            confidence: 0,
            details: String::new(),
            tier: Tier::Unreachable,
        }
    }

    fn note<S: Into<String>>(&mut self, method: S) {
        self.detection_methods.push(method.into());
    }

    fn capture_banner(&mut self, text: &str) {
        if self.banner.is_none() {
            self.banner = Some(truncate(text));
        }
    }
}

/// Probe sent when a port stays silent during the listen window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Http,
    Ipp,
    Tls,
    Ftp,
    Smtp,
    Ssh,
    MySql,
    HttpGeneric,
}

struct ProbeSpec {
    ports: &'static [u16],
    kind: ProbeKind,
}

/// Port class to probe mapping; ports not listed get [`ProbeKind::HttpGeneric`]
const PROBE_TABLE: &[ProbeSpec] = &[
    ProbeSpec { ports: &[80, 8080, 8000, 3000], kind: ProbeKind::Http },
    ProbeSpec { ports: &[631], kind: ProbeKind::Ipp },
    ProbeSpec { ports: &[443, 8443], kind: ProbeKind::Tls },
    ProbeSpec { ports: &[21], kind: ProbeKind::Ftp },
    ProbeSpec { ports: &[25, 587], kind: ProbeKind::Smtp },
    ProbeSpec { ports: &[22], kind: ProbeKind::Ssh },
    ProbeSpec { ports: &[3306], kind: ProbeKind::MySql },
];

impl ProbeKind {
    pub fn for_port(port: u16) -> Self {
        PROBE_TABLE
            .iter()
            .find(|spec| spec.ports.contains(&port))
            .map(|spec| spec.kind)
            .unwrap_or(Self::HttpGeneric)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Ipp => "IPP",
            Self::Tls => "TLS",
            Self::Ftp => "FTP",
            Self::Smtp => "SMTP",
            Self::Ssh => "SSH",
            Self::MySql => "MySQL",
            Self::HttpGeneric => "generic HTTP",
        }
    }

    pub fn payload(&self, target: &str) -> Vec<u8> {
        match self {
            Self::Http => format!(
                "GET / HTTP/1.1\r\nHost: {}\r\nUser-Agent: rustprobe\r\nConnection: close\r\n\r\n",
                target
            )
            .into_bytes(),
            Self::Ipp => format!("GET / HTTP/1.1\r\nHost: {}:631\r\n\r\n", target).into_bytes(),
            Self::Tls => tls_client_hello(),
            Self::Ftp => b"USER anonymous\r\n".to_vec(),
            Self::Smtp => b"EHLO rustprobe.local\r\n".to_vec(),
            Self::Ssh => b"SSH-2.0-rustprobe\r\n".to_vec(),
            Self::MySql => vec![0x00],
            Self::HttpGeneric => b"GET / HTTP/1.0\r\n\r\n".to_vec(),
        }
    }
}

/// Fixed TLS 1.2 ClientHello offering a single cipher suite and no
/// extensions. Only used to see whether the peer answers with a TLS record.
fn tls_client_hello() -> Vec<u8> {
    let mut body = vec![0x03, 0x03];
    body.extend_from_slice(&[0u8; 32]); // random
    body.push(0x00); // session id
    body.extend_from_slice(&[0x00, 0x02, 0x00, 0x2f]); // TLS_RSA_WITH_AES_128_CBC_SHA
    body.extend_from_slice(&[0x01, 0x00]); // null compression
    body.extend_from_slice(&[0x00, 0x00]); // no extensions

    let mut handshake = vec![0x01, 0x00];
    handshake.extend_from_slice(&(body.len() as u16).to_be_bytes());
    handshake.extend(body);

    let mut record = vec![0x16, 0x03, 0x01];
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend(handshake);
    record
}

/// Coarse port hint, used as a tie-breaker only
pub fn port_association(port: u16) -> &'static str {
    match port {
        21 => "FTP (standard)",
        22 => "SSH (standard)",
        23 => "Telnet (standard)",
        25 => "SMTP (standard)",
        80 => "HTTP (standard)",
        443 => "HTTPS (standard)",
        631 => "IPP/CUPS (printing)",
        3306 => "MySQL (standard)",
        5432 => "PostgreSQL (standard)",
        6379 => "Redis (standard)",
        8080 => "HTTP-Alt (standard)",
        8443 => "HTTPS-Alt (standard)",
        _ => NON_STANDARD_PORT,
    }
}

/// Classify text a service sent before being asked anything
pub fn classify_banner(fingerprint: &mut ServiceFingerprint, banner: &str) {
    fingerprint.capture_banner(banner);
    let text = truncate(banner).to_lowercase();

    if text.contains("ssh") {
        fingerprint.is_ssh = true;
        fingerprint.ssh_version = Some(first_line(banner));
        fingerprint.note("SSH identified from unsolicited banner");
    } else if text.contains("ftp") {
        fingerprint.is_ftp = true;
        fingerprint.note("FTP identified from unsolicited banner");
    } else if text.contains("smtp") || text.contains("mail") {
        fingerprint.is_smtp = true;
        fingerprint.note("SMTP identified from unsolicited banner");
    } else if text.starts_with("220") || text.starts_with("331") {
        // A bare greeting code is shared by FTP and SMTP
        if ProbeKind::for_port(fingerprint.port) == ProbeKind::Smtp {
            fingerprint.is_smtp = true;
            fingerprint.note("SMTP greeting code in unsolicited banner");
        } else {
            fingerprint.is_ftp = true;
            fingerprint.note("FTP greeting code in unsolicited banner");
        }
    } else if text.contains("mysql") {
        fingerprint.note("MySQL handshake in unsolicited banner");
    } else {
        fingerprint.note("Banner detected but not identified");
    }
}

/// Classify the reply to an active probe
pub fn classify_response(fingerprint: &mut ServiceFingerprint, kind: ProbeKind, raw: &[u8]) {
    let original = String::from_utf8_lossy(raw);
    let text = truncate(&original).to_lowercase();

    match kind {
        ProbeKind::Http | ProbeKind::HttpGeneric | ProbeKind::Ipp => {
            fingerprint.capture_banner(&original);
            if !text.contains("http/") {
                fingerprint.note(format!("Unrecognised reply to {} probe", kind.label()));
            } else if mentions_printing(&text) {
                fingerprint.server_header = Some("CUPS/IPP".to_string());
                fingerprint.note("CUPS/IPP printing service detected");
            } else if kind == ProbeKind::Ipp {
                fingerprint.is_http = true;
                fingerprint.server_header = Some("IPP (Printing Service)".to_string());
                fingerprint.note("HTTP reply on the IPP port");
            } else {
                fingerprint.is_http = true;
                fingerprint.server_header = server_header(&original);
                fingerprint.note(format!("HTTP detected via {} probe", kind.label()));
            }
        }
        ProbeKind::Tls => {
            if raw.len() > 5 && raw[0] == 0x16 {
                fingerprint.is_tls = true;
                fingerprint.tls_version = Some(format!("{}.{}", raw[1], raw[2]));
                fingerprint.note("TLS handshake record received");
            } else if raw.len() > 2 && raw[0] == 0x15 {
                fingerprint.is_tls = true;
                fingerprint.tls_version = Some(format!("{}.{}", raw[1], raw[2]));
                fingerprint.note("TLS alert received");
            } else if text.contains("http/") {
                fingerprint.capture_banner(&original);
                fingerprint.is_http = true;
                fingerprint.server_header = server_header(&original);
                fingerprint.note("Plain HTTP answered the TLS probe");
            } else {
                fingerprint.note("Unrecognised reply to TLS probe");
            }
        }
        ProbeKind::Ssh => {
            fingerprint.capture_banner(&original);
            if text.contains("ssh") {
                fingerprint.is_ssh = true;
                fingerprint.ssh_version = Some(first_line(&original));
                fingerprint.note("SSH version exchange answered");
            }
        }
        ProbeKind::Ftp => {
            fingerprint.capture_banner(&original);
            if text.contains("220") || text.contains("ftp") || text.contains("331") {
                fingerprint.is_ftp = true;
                fingerprint.note("FTP reply to USER command");
            }
        }
        ProbeKind::Smtp => {
            fingerprint.capture_banner(&original);
            if text.contains("220") || text.contains("smtp") || text.contains("mail") {
                fingerprint.is_smtp = true;
                fingerprint.note("SMTP reply to EHLO");
            }
        }
        ProbeKind::MySql => {
            fingerprint.note("MySQL (response detected)");
        }
    }
}

fn mentions_printing(text: &str) -> bool {
    text.contains("cups") || contains_token(text, "ipp")
}

/// `token` surrounded by non-alphanumeric characters, so "shipping" does
/// not count as "ipp"
fn contains_token(haystack: &str, token: &str) -> bool {
    haystack.match_indices(token).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + token.len()..].chars().next();
        !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
    })
}

fn server_header(response: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("server")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().to_string()
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_CLASSIFIED_CHARS).collect()
}

/// Fill `product` and `version` from the server header, the SSH
/// identification line or the raw banner, in that order
pub fn extract_version(fingerprint: &mut ServiceFingerprint) {
    let found = fingerprint
        .server_header
        .as_deref()
        .and_then(http_product)
        .or_else(|| fingerprint.ssh_version.as_deref().map(ssh_product))
        .or_else(|| {
            if fingerprint.is_http {
                return None;
            }
            fingerprint.banner.as_deref().and_then(banner_product)
        });

    if let Some((product, version)) = found {
        let label = match &version {
            Some(version) => format!("{} {}", product, version),
            None => product.clone(),
        };
        fingerprint.note(format!("Product identified: {}", label));
        fingerprint.product = Some(product);
        fingerprint.version = version;
    }
}

const HTTP_PRODUCTS: &[(&str, &str)] = &[
    ("apache", "Apache"),
    ("nginx", "nginx"),
    ("microsoft-iis", "Microsoft-IIS"),
];

/// `Server:` header, e.g. "Apache/2.4.41 (Ubuntu)" or "lighttpd/1.4.59"
fn http_product(header: &str) -> Option<(String, Option<String>)> {
    let lower = header.to_ascii_lowercase();
    if let Some((key, name)) = HTTP_PRODUCTS.iter().find(|(key, _)| lower.contains(key)) {
        return Some((name.to_string(), version_after(header, &format!("{}/", key), &[])));
    }

    let (product, rest) = header.split_once('/')?;
    let product = product.trim();
    let version = leading_version(rest, &[])?;
    (!product.is_empty() && !product.contains(' ')).then(|| (product.to_string(), Some(version)))
}

/// SSH identification line, e.g. "SSH-2.0-OpenSSH_8.9p1 Ubuntu-3"
fn ssh_product(line: &str) -> (String, Option<String>) {
    if line.to_ascii_lowercase().contains("openssh") {
        return ("OpenSSH".to_string(), version_after(line, "openssh_", &['p']));
    }

    let software = line
        .splitn(3, '-')
        .nth(2)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|token| token.split_once('_'));
    if let Some((product, rest)) = software {
        if let Some(version) = leading_version(rest, &['p']) {
            return (product.to_string(), Some(version));
        }
    }

    ("SSH".to_string(), version_after(line, "ssh-", &[]))
}

fn banner_product(banner: &str) -> Option<(String, Option<String>)> {
    let lower = banner.to_ascii_lowercase();
    if lower.contains("vsftpd") {
        Some(("vsftpd".to_string(), version_after(banner, "vsftpd ", &[])))
    } else if lower.contains("proftpd") {
        Some(("ProFTPD".to_string(), version_after(banner, "proftpd ", &[])))
    } else if lower.contains("mysql") {
        Some(("MySQL".to_string(), mysql_version(banner)))
    } else {
        None
    }
}

/// The server version in a MySQL greeting is the first dotted number
/// followed by a dash, e.g. "8.0.36-0ubuntu0.22.04.1"
fn mysql_version(banner: &str) -> Option<String> {
    banner
        .split(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .filter_map(|token| token.split_once('-'))
        .map(|(head, _)| head)
        .find(|head| head.starts_with(|c: char| c.is_ascii_digit()) && head.contains('.'))
        .map(|head| head.trim_end_matches('.').to_string())
}

/// Version right after the first case-insensitive occurrence of `marker`
fn version_after(text: &str, marker: &str, extra: &[char]) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    lower
        .match_indices(marker)
        .find_map(|(i, _)| leading_version(&text[i + marker.len()..], extra))
}

/// Digits and dots (plus `extra`) at the start of `text`
fn leading_version(text: &str, extra: &[char]) -> Option<String> {
    let version: String = text
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || extra.contains(c))
        .collect();
    let version = version.trim_end_matches('.');
    version
        .starts_with(|c: char| c.is_ascii_digit())
        .then(|| version.to_string())
}

/// Verdict tiers, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    PrintingService,
    Http,
    Ssh,
    Ftp,
    Smtp,
    TlsOnly,
    TcpWithBanner,
    TcpSilent,
    Unreachable,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrintingService => "printing",
            Self::Http => "http",
            Self::Ssh => "ssh",
            Self::Ftp => "ftp",
            Self::Smtp => "smtp",
            Self::TlsOnly => "tls",
            Self::TcpWithBanner => "tcp_banner",
            Self::TcpSilent => "tcp_silent",
            Self::Unreachable => "unreachable",
        }
    }

    /// Tiers whose name says nothing about the protocol
    pub fn is_generic(&self) -> bool {
        matches!(self, Self::TcpWithBanner | Self::TcpSilent | Self::Unreachable)
    }
}

pub struct VerdictRule {
    pub tier: Tier,
    pub base_confidence: u32,
    /// Whether a non-generic port association may add [`HINT_BONUS`]
    pub hint_bonus: bool,
    matches: fn(&ServiceFingerprint) -> bool,
}

impl VerdictRule {
    pub fn applies(&self, fingerprint: &ServiceFingerprint) -> bool {
        (self.matches)(fingerprint)
    }
}

const UNREACHABLE_RULE: VerdictRule = VerdictRule {
    tier: Tier::Unreachable,
    base_confidence: 0,
    hint_bonus: false,
    matches: |_| true,
};

/// Verdict precedence; the first matching rule wins
pub const VERDICT_RULES: &[VerdictRule] = &[
    VerdictRule {
        tier: Tier::PrintingService,
        base_confidence: 95,
        hint_bonus: false,
        matches: is_printing_service,
    },
    VerdictRule {
        tier: Tier::Http,
        base_confidence: 95,
        hint_bonus: false,
        matches: |fp| fp.is_http,
    },
    VerdictRule {
        tier: Tier::Ssh,
        base_confidence: 95,
        hint_bonus: false,
        matches: |fp| fp.is_ssh,
    },
    VerdictRule {
        tier: Tier::Ftp,
        base_confidence: 90,
        hint_bonus: false,
        matches: |fp| fp.is_ftp,
    },
    VerdictRule {
        tier: Tier::Smtp,
        base_confidence: 90,
        hint_bonus: false,
        matches: |fp| fp.is_smtp,
    },
    VerdictRule {
        tier: Tier::TlsOnly,
        base_confidence: 85,
        hint_bonus: false,
        matches: |fp| fp.is_tls,
    },
    VerdictRule {
        tier: Tier::TcpWithBanner,
        base_confidence: 50,
        hint_bonus: true,
        matches: |fp| fp.tcp_connectable && fp.sends_data_first,
    },
    VerdictRule {
        tier: Tier::TcpSilent,
        base_confidence: 40,
        hint_bonus: true,
        matches: |fp| fp.tcp_connectable,
    },
    UNREACHABLE_RULE,
];

fn is_printing_service(fingerprint: &ServiceFingerprint) -> bool {
    fingerprint
        .server_header
        .as_deref()
        .map_or(false, |header| header.contains("CUPS") || header.contains("IPP"))
}

pub fn select_rule(fingerprint: &ServiceFingerprint) -> &'static VerdictRule {
    VERDICT_RULES
        .iter()
        .find(|rule| rule.applies(fingerprint))
        .unwrap_or(&UNREACHABLE_RULE)
}

/// Set name, confidence, details and tier from the collected flags
pub fn apply_verdict(fingerprint: &mut ServiceFingerprint) -> Tier {
    let rule = select_rule(fingerprint);
    let (mut name, mut lines) = describe(rule.tier, fingerprint);
    let mut confidence = rule.base_confidence;

    let association = fingerprint.common_port_association.as_str();
    if rule.hint_bonus && !association.is_empty() && association != NON_STANDARD_PORT {
        let short = association.split_whitespace().next().unwrap_or(association);
        name = format!("{} (probably {})", name, short);
        lines.push(format!("Port commonly used for: {}", association));
        confidence += HINT_BONUS;
    }

    if let Some(product) = &fingerprint.product {
        match &fingerprint.version {
            Some(version) => lines.push(format!("Product: {} {}", product, version)),
            None => lines.push(format!("Product: {}", product)),
        }
    }

    if fingerprint.tcp_connectable {
        lines.push(format!("Connection time: {:.0} ms", fingerprint.connection_time_ms));
    }

    fingerprint.service_name = name;
    fingerprint.confidence = confidence.min(100) as u8;
    fingerprint.details = lines.join("\n");
    fingerprint.tier = rule.tier;
    rule.tier
}

fn describe(tier: Tier, fp: &ServiceFingerprint) -> (String, Vec<String>) {
    match tier {
        Tier::PrintingService => (
            "CUPS/IPP (printing)".to_string(),
            vec![
                "CUPS/IPP printing service".to_string(),
                "HTTP-based protocol, not a regular web server".to_string(),
            ],
        ),
        Tier::Http => {
            let base = if fp.is_tls { "HTTPS" } else { "HTTP" };
            let mut lines = vec![format!("{} service confirmed by probe", base)];
            let name = match &fp.server_header {
                Some(server) => {
                    lines.push(format!("Server: {}", server));
                    format!("{} ({})", base, server)
                }
                None => base.to_string(),
            };
            (name, lines)
        }
        Tier::Ssh => {
            let mut lines = vec!["SSH service detected".to_string()];
            if let Some(version) = &fp.ssh_version {
                lines.push(format!("Version: {}", version));
            }
            ("SSH".to_string(), lines)
        }
        Tier::Ftp => ("FTP".to_string(), vec!["FTP service detected".to_string()]),
        Tier::Smtp => ("SMTP".to_string(), vec!["SMTP service detected".to_string()]),
        Tier::TlsOnly => {
            let version = fp.tls_version.as_deref().unwrap_or("unknown");
            (
                "TLS/SSL".to_string(),
                vec![format!("TLS service detected (record version {})", version)],
            )
        }
        Tier::TcpWithBanner => (
            "Active service (sends banner)".to_string(),
            vec!["Service greets first but the banner was not recognised".to_string()],
        ),
        Tier::TcpSilent => (
            "Active TCP service".to_string(),
            vec!["Service accepts connections but stays silent".to_string()],
        ),
        Tier::Unreachable => (
            UNKNOWN_SERVICE_NAME.to_string(),
            vec!["Service could not be reached for fingerprinting".to_string()],
        ),
    }
}

/// Active multi-protocol service fingerprinter
pub struct FingerprintEngine {
    timing: ProbeTiming,
    port_table: Arc<WellKnownPorts>,
}

impl FingerprintEngine {
    pub fn new(timing: ProbeTiming, port_table: Arc<WellKnownPorts>) -> Self {
        Self { timing, port_table }
    }

    pub fn timing(&self) -> &ProbeTiming {
        &self.timing
    }

    /// Fingerprint a single port. Always returns a fingerprint.
    pub async fn fingerprint(&self, target: &str, port: u16) -> ServiceFingerprint {
        let mut fingerprint = ServiceFingerprint::new(port);

        if let Err(e) = self.interrogate(target, &mut fingerprint).await {
            debug!("Fingerprinting {}:{} stopped: {}", target, port, e);
            fingerprint.note(format!("{}{}", ERROR_NOTE_PREFIX, e));
        }

        extract_version(&mut fingerprint);
        fingerprint.common_port_association = port_association(port).to_string();
        apply_verdict(&mut fingerprint);
        self.apply_well_known_fallback(&mut fingerprint);

        crate::log_service_detection!(
            target,
            port,
            fingerprint.service_name.as_str(),
            fingerprint.confidence
        );
        fingerprint
    }

    /// Fingerprint several ports concurrently; results come back ascending
    pub async fn fingerprint_all(
        &self,
        target: &str,
        ports: &[u16],
        max_concurrency: usize,
    ) -> Vec<ServiceFingerprint> {
        let mut fingerprints: Vec<ServiceFingerprint> = stream::iter(ports.iter().copied())
            .map(|port| self.fingerprint(target, port))
            .buffer_unordered(max_concurrency.max(1))
            .collect()
            .await;

        fingerprints.sort_by_key(|fp| fp.port);
        fingerprints
    }

    async fn interrogate(&self, target: &str, fingerprint: &mut ServiceFingerprint) -> io::Result<()> {
        let port = fingerprint.port;
        let started = Instant::now();

        let mut stream = timeout(self.timing.connect_budget(), TcpStream::connect((target, port)))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {} ms", self.timing.connect_budget_ms),
                )
            })??;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        fingerprint.tcp_connectable = true;
        fingerprint.connection_time_ms = elapsed_ms;
        fingerprint.note(format!("Connection: {:.0} ms", elapsed_ms));

        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        match timeout(self.timing.listen_window(), stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                fingerprint.note("Peer closed the connection during the listen window");
                return Ok(());
            }
            Ok(Ok(n)) => {
                fingerprint.sends_data_first = true;
                let banner = String::from_utf8_lossy(&buf[..n]).into_owned();
                classify_banner(fingerprint, &banner);
                return Ok(());
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {}
        }

        let kind = ProbeKind::for_port(port);
        timeout(self.timing.read_timeout(), stream.write_all(&kind.payload(target)))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "probe write timed out"))??;

        sleep(self.timing.probe_wait()).await;

        match timeout(self.timing.read_timeout(), stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => classify_response(fingerprint, kind, &buf[..n]),
            Ok(Ok(_)) | Err(_) => {
                fingerprint.note(format!("No response to {} probe", kind.label()))
            }
            Ok(Err(e)) => return Err(e),
        }

        Ok(())
    }

    fn apply_well_known_fallback(&self, fingerprint: &mut ServiceFingerprint) {
        let generic =
            fingerprint.tier.is_generic() || fingerprint.service_name.contains("(probably ");
        if !generic {
            return;
        }

        if let Some(name) = self.port_table.get(fingerprint.port, Transport::Tcp) {
            fingerprint.service_name = name.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::{net::TcpListener, task::JoinHandle};

    fn fast_timing() -> ProbeTiming {
        ProbeTiming {
            connect_budget_ms: 1000,
            listen_window_ms: 100,
            probe_wait_ms: 50,
            read_timeout_ms: 500,
        }
    }

    fn engine(table: WellKnownPorts) -> FingerprintEngine {
        FingerprintEngine::new(fast_timing(), Arc::new(table))
    }

    /// Answers every request with `response` and closes
    async fn reply_server(response: &'static [u8]) -> (u16, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    if let Ok(Ok(n)) =
                        tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await
                    {
                        if n > 0 {
                            let _ = stream.write_all(response).await;
                        }
                    }
                    let _ = stream.shutdown().await;
                });
            }
        });
        (port, handle)
    }

    /// Greets with `banner` as soon as a client connects
    async fn banner_server(banner: &'static [u8]) -> (u16, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let _ = stream.write_all(banner).await;
                    tokio::time::sleep(Duration::from_millis(500)).await;
                });
            }
        });
        (port, handle)
    }

    const NGINX_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nServer: nginx/1.18.0\r\nContent-Length: 0\r\n\r\n";

    #[tokio::test]
    async fn test_http_server_header() {
        let (port, server) = reply_server(NGINX_RESPONSE).await;

        let fp = engine(WellKnownPorts::builtin()).fingerprint("127.0.0.1", port).await;
        server.abort();

        assert!(fp.is_http);
        assert!(fp.tcp_connectable);
        assert!(!fp.sends_data_first);
        assert_eq!(fp.server_header.as_deref(), Some("nginx/1.18.0"));
        assert_eq!(fp.service_name, "HTTP (nginx/1.18.0)");
        assert!(fp.confidence >= 80);
        assert!(fp.details.contains("Server: nginx/1.18.0"));
        assert!(fp.details.contains("Product: nginx 1.18.0"));
        assert!(fp.details.lines().last().unwrap().starts_with("Connection time:"));
        assert_eq!(fp.product.as_deref(), Some("nginx"));
        assert_eq!(fp.version.as_deref(), Some("1.18.0"));
    }

    #[tokio::test]
    async fn test_ssh_banner_path() {
        let (port, server) = banner_server(b"SSH-2.0-OpenSSH_8.9p1 Ubuntu-3\r\n").await;

        let fp = engine(WellKnownPorts::empty()).fingerprint("127.0.0.1", port).await;
        server.abort();

        assert!(fp.is_ssh);
        assert!(fp.sends_data_first);
        assert_eq!(fp.ssh_version.as_deref(), Some("SSH-2.0-OpenSSH_8.9p1 Ubuntu-3"));
        assert_eq!(fp.service_name, "SSH");
        assert_eq!(fp.confidence, 95);
        assert!(fp.banner.as_deref().unwrap().contains("Ubuntu"));
    }

    #[tokio::test]
    async fn test_silent_service_gets_generic_verdict() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let fp = engine(WellKnownPorts::empty()).fingerprint("127.0.0.1", port).await;
        server.abort();

        assert_eq!(fp.tier, Tier::TcpSilent);
        assert_eq!(fp.service_name, "Active TCP service");
        assert_eq!(fp.confidence, 40);
        assert!(fp
            .detection_methods
            .iter()
            .any(|m| m == "No response to generic HTTP probe"));
    }

    #[tokio::test]
    async fn test_refused_port_keeps_tcp_state_only() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let fp = engine(WellKnownPorts::empty()).fingerprint("127.0.0.1", port).await;

        assert!(!fp.tcp_connectable);
        assert_eq!(fp.tier, Tier::Unreachable);
        assert_eq!(fp.service_name, UNKNOWN_SERVICE_NAME);
        assert_eq!(fp.confidence, 0);
        assert!(fp
            .detection_methods
            .iter()
            .any(|m| m.starts_with(ERROR_NOTE_PREFIX)));
    }

    #[tokio::test]
    async fn test_fingerprinting_is_deterministic() {
        let (port, server) = reply_server(NGINX_RESPONSE).await;
        let engine = engine(WellKnownPorts::builtin());

        let first = engine.fingerprint("127.0.0.1", port).await;
        let second = engine.fingerprint("127.0.0.1", port).await;
        server.abort();

        assert_eq!(first.service_name, second.service_name);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.tier, second.tier);
    }

    #[tokio::test]
    async fn test_fingerprint_all_is_ordered() {
        let (http_port, http) = reply_server(NGINX_RESPONSE).await;
        let (ssh_port, ssh) = banner_server(b"SSH-2.0-dropbear\r\n").await;

        let mut ports = vec![http_port, ssh_port];
        ports.sort_unstable_by(|a, b| b.cmp(a));
        let fps = engine(WellKnownPorts::empty())
            .fingerprint_all("127.0.0.1", &ports, 4)
            .await;
        http.abort();
        ssh.abort();

        assert_eq!(fps.len(), 2);
        assert!(fps[0].port < fps[1].port);
        assert!(fps.iter().all(|fp| fp.confidence <= 100));
    }

    #[test]
    fn test_probe_table() {
        assert_eq!(ProbeKind::for_port(8000), ProbeKind::Http);
        assert_eq!(ProbeKind::for_port(631), ProbeKind::Ipp);
        assert_eq!(ProbeKind::for_port(8443), ProbeKind::Tls);
        assert_eq!(ProbeKind::for_port(587), ProbeKind::Smtp);
        assert_eq!(ProbeKind::for_port(3306), ProbeKind::MySql);
        assert_eq!(ProbeKind::for_port(12345), ProbeKind::HttpGeneric);
        assert_eq!(ProbeKind::MySql.payload("h"), vec![0x00]);
        assert!(String::from_utf8(ProbeKind::Ipp.payload("printer"))
            .unwrap()
            .contains("Host: printer:631"));
    }

    #[test]
    fn test_client_hello_lengths_are_consistent() {
        let hello = tls_client_hello();
        assert_eq!(&hello[..3], &[0x16, 0x03, 0x01]);
        let record_len = u16::from_be_bytes([hello[3], hello[4]]) as usize;
        assert_eq!(record_len, hello.len() - 5);
        let handshake_len = u16::from_be_bytes([hello[7], hello[8]]) as usize;
        assert_eq!(handshake_len, hello.len() - 9);
    }

    #[test]
    fn test_classify_tls_reply() {
        let mut fp = ServiceFingerprint::new(443);
        fp.tcp_connectable = true;
        classify_response(&mut fp, ProbeKind::Tls, &[0x16, 0x03, 0x03, 0x00, 0x4a, 0x02]);
        assert!(fp.is_tls);
        assert_eq!(fp.tls_version.as_deref(), Some("3.3"));

        assert_eq!(apply_verdict(&mut fp), Tier::TlsOnly);
        assert_eq!(fp.service_name, "TLS/SSL");
        assert_eq!(fp.confidence, 85);
    }

    #[test]
    fn test_short_tls_reply_is_ignored() {
        let mut fp = ServiceFingerprint::new(443);
        classify_response(&mut fp, ProbeKind::Tls, &[0x16, 0x03, 0x03]);
        assert!(!fp.is_tls);
    }

    #[test]
    fn test_cups_reply_is_printing_not_http() {
        let mut fp = ServiceFingerprint::new(631);
        fp.tcp_connectable = true;
        classify_response(
            &mut fp,
            ProbeKind::Ipp,
            b"HTTP/1.1 200 OK\r\nServer: CUPS/2.4 IPP/2.1\r\n\r\n",
        );
        assert!(!fp.is_http);
        assert_eq!(apply_verdict(&mut fp), Tier::PrintingService);
        assert_eq!(fp.confidence, 95);
    }

    #[test]
    fn test_shipping_page_is_not_ipp() {
        let mut fp = ServiceFingerprint::new(8080);
        classify_response(
            &mut fp,
            ProbeKind::Http,
            b"HTTP/1.1 200 OK\r\nServer: Apache\r\n\r\nFree shipping today",
        );
        assert!(fp.is_http);
        assert_eq!(fp.server_header.as_deref(), Some("Apache"));
    }

    #[test]
    fn test_bare_greeting_depends_on_port_class() {
        let mut smtp = ServiceFingerprint::new(587);
        classify_banner(&mut smtp, "220 relay ready\r\n");
        assert!(smtp.is_smtp && !smtp.is_ftp);

        let mut ftp = ServiceFingerprint::new(2121);
        classify_banner(&mut ftp, "220 ready\r\n");
        assert!(ftp.is_ftp && !ftp.is_smtp);

        let mut unknown = ServiceFingerprint::new(9999);
        classify_banner(&mut unknown, "hello there");
        assert_eq!(
            unknown.detection_methods,
            vec!["Banner detected but not identified".to_string()]
        );
    }

    #[test]
    fn test_ippserver_header_is_plain_http() {
        let mut fp = ServiceFingerprint::new(8631);
        classify_response(
            &mut fp,
            ProbeKind::Http,
            b"HTTP/1.1 200 OK\r\nServer: ippserver/1.0\r\n\r\n",
        );
        assert!(fp.is_http);
        assert_eq!(fp.server_header.as_deref(), Some("ippserver/1.0"));

        let mut ipp = ServiceFingerprint::new(8631);
        classify_response(&mut ipp, ProbeKind::Http, b"HTTP/1.1 200 OK\r\nServer: IPP/2.0\r\n\r\n");
        assert!(!ipp.is_http);
        assert_eq!(ipp.server_header.as_deref(), Some("CUPS/IPP"));
    }

    #[test]
    fn test_ftp_reply_to_user_command() {
        let mut fp = ServiceFingerprint::new(21);
        fp.tcp_connectable = true;
        fp.common_port_association = port_association(21).to_string();
        classify_response(&mut fp, ProbeKind::Ftp, b"331 Please specify the password.\r\n");

        assert!(fp.is_ftp);
        assert!(fp.detection_methods.iter().any(|m| m == "FTP reply to USER command"));
        assert_eq!(apply_verdict(&mut fp), Tier::Ftp);
        assert_eq!(fp.service_name, "FTP");
        assert_eq!(fp.confidence, 90);
    }

    #[test]
    fn test_smtp_ehlo_reply_with_marker() {
        let mut fp = ServiceFingerprint::new(25);
        fp.tcp_connectable = true;
        fp.common_port_association = port_association(25).to_string();
        classify_response(
            &mut fp,
            ProbeKind::Smtp,
            b"250-mail.example.com greets scanner.local\r\n250 8BITMIME\r\n",
        );

        assert!(fp.is_smtp);
        assert_eq!(apply_verdict(&mut fp), Tier::Smtp);
        assert_eq!(fp.service_name, "SMTP");
        assert_eq!(fp.confidence, 90);
    }

    #[test]
    fn test_ehlo_reply_without_marker_stays_silent_tier() {
        let mut fp = ServiceFingerprint::new(2525);
        fp.tcp_connectable = true;
        fp.common_port_association = port_association(2525).to_string();
        classify_response(&mut fp, ProbeKind::Smtp, b"250-relay.example.com\r\n250 PIPELINING\r\n");

        assert!(!fp.is_smtp);
        assert_eq!(fp.banner.as_deref(), Some("250-relay.example.com\r\n250 PIPELINING\r\n"));
        assert_eq!(apply_verdict(&mut fp), Tier::TcpSilent);
        assert_eq!(fp.service_name, "Active TCP service");
        assert_eq!(fp.confidence, 40);
    }

    #[test]
    fn test_ssh_version_exchange_reply() {
        let mut fp = ServiceFingerprint::new(2222);
        fp.tcp_connectable = true;
        classify_response(&mut fp, ProbeKind::Ssh, b"SSH-2.0-OpenSSH_9.6\r\n");

        assert!(fp.is_ssh);
        assert_eq!(fp.ssh_version.as_deref(), Some("SSH-2.0-OpenSSH_9.6"));
        assert!(fp.detection_methods.iter().any(|m| m == "SSH version exchange answered"));
        assert_eq!(apply_verdict(&mut fp), Tier::Ssh);

        let mut other = ServiceFingerprint::new(2222);
        classify_response(&mut other, ProbeKind::Ssh, b"HTTP/1.1 400 Bad Request\r\n\r\n");
        assert!(!other.is_ssh);
        assert!(!other.is_http);
        assert!(other.banner.is_some());
    }

    #[test]
    fn test_mysql_reply_only_adds_note() {
        let mut fp = ServiceFingerprint::new(3306);
        classify_response(&mut fp, ProbeKind::MySql, b"\x4a\x00\x00\x00\x0a8.0.36\x00");

        assert_eq!(fp.detection_methods, vec!["MySQL (response detected)".to_string()]);
        assert!(!(fp.is_http || fp.is_tls || fp.is_ssh || fp.is_ftp || fp.is_smtp));
    }

    #[test]
    fn test_tls_alert_marks_tls() {
        let mut fp = ServiceFingerprint::new(8443);
        fp.tcp_connectable = true;
        classify_response(&mut fp, ProbeKind::Tls, &[0x15, 0x03, 0x03, 0x00, 0x02, 0x02, 0x28]);

        assert!(fp.is_tls);
        assert_eq!(fp.tls_version.as_deref(), Some("3.3"));
        assert!(fp.detection_methods.iter().any(|m| m == "TLS alert received"));
        assert_eq!(apply_verdict(&mut fp), Tier::TlsOnly);
        assert_eq!(fp.confidence, 85);
    }

    #[test]
    fn test_plain_http_on_tls_port() {
        let mut fp = ServiceFingerprint::new(8443);
        fp.tcp_connectable = true;
        classify_response(&mut fp, ProbeKind::Tls, NGINX_RESPONSE);

        assert!(fp.is_http);
        assert!(!fp.is_tls);
        assert_eq!(fp.server_header.as_deref(), Some("nginx/1.18.0"));
        assert_eq!(apply_verdict(&mut fp), Tier::Http);
        assert_eq!(fp.service_name, "HTTP (nginx/1.18.0)");
    }

    #[test]
    fn test_unrecognised_banner_gets_port_hint() {
        let mut fp = ServiceFingerprint::new(23);
        fp.tcp_connectable = true;
        fp.sends_data_first = true;
        fp.common_port_association = port_association(23).to_string();
        classify_banner(&mut fp, "Ubuntu 22.04 LTS\r\nlogin: ");

        assert_eq!(apply_verdict(&mut fp), Tier::TcpWithBanner);
        assert_eq!(fp.service_name, "Active service (sends banner) (probably Telnet)");
        assert_eq!(fp.confidence, 70);
    }

    #[test]
    fn test_http_products() {
        let product = |header: &str| http_product(header);
        assert_eq!(
            product("Apache/2.4.41 (Ubuntu)"),
            Some(("Apache".to_string(), Some("2.4.41".to_string())))
        );
        assert_eq!(
            product("Microsoft-IIS/10.0"),
            Some(("Microsoft-IIS".to_string(), Some("10.0".to_string())))
        );
        assert_eq!(product("Apache"), Some(("Apache".to_string(), None)));
        assert_eq!(
            product("lighttpd/1.4.59"),
            Some(("lighttpd".to_string(), Some("1.4.59".to_string())))
        );
        assert_eq!(product("CUPS/IPP"), None);
        assert_eq!(product("IPP (Printing Service)"), None);
    }

    #[test]
    fn test_ssh_products() {
        let mut fp = ServiceFingerprint::new(22);
        classify_banner(&mut fp, "SSH-2.0-OpenSSH_8.9p1 Ubuntu-3\r\n");
        extract_version(&mut fp);
        assert_eq!(fp.product.as_deref(), Some("OpenSSH"));
        assert_eq!(fp.version.as_deref(), Some("8.9p1"));

        assert_eq!(
            ssh_product("SSH-2.0-dropbear_2022.83"),
            ("dropbear".to_string(), Some("2022.83".to_string()))
        );
        assert_eq!(ssh_product("SSH-2.0-dropbear"), ("SSH".to_string(), Some("2.0".to_string())));
    }

    #[tokio::test]
    async fn test_vsftpd_banner_keeps_version() {
        let (port, server) = banner_server(b"220 (vsFTPd 3.0.3)\r\n").await;

        let fp = engine(WellKnownPorts::empty()).fingerprint("127.0.0.1", port).await;
        server.abort();

        assert!(fp.is_ftp);
        assert_eq!(fp.service_name, "FTP");
        assert_eq!(fp.product.as_deref(), Some("vsftpd"));
        assert_eq!(fp.version.as_deref(), Some("3.0.3"));
        assert!(fp.details.contains("Product: vsftpd 3.0.3"));
        assert!(fp
            .detection_methods
            .iter()
            .any(|m| m == "Product identified: vsftpd 3.0.3"));
    }

    #[test]
    fn test_proftpd_banner_version() {
        let mut fp = ServiceFingerprint::new(21);
        classify_banner(&mut fp, "220 ProFTPD 1.3.5e Server (Debian) [::ffff:10.0.0.5]\r\n");
        extract_version(&mut fp);
        assert_eq!(fp.product.as_deref(), Some("ProFTPD"));
        assert_eq!(fp.version.as_deref(), Some("1.3.5"));
    }

    #[test]
    fn test_mysql_greeting_version() {
        let mut fp = ServiceFingerprint::new(3306);
        fp.tcp_connectable = true;
        fp.sends_data_first = true;
        classify_banner(
            &mut fp,
            "J\u{0}\u{0}\u{0}\n8.0.36-0ubuntu0.22.04.1\u{0}\u{8}\u{0}\u{0}\u{0}mysql_native_password\u{0}",
        );
        extract_version(&mut fp);
        assert_eq!(fp.product.as_deref(), Some("MySQL"));
        assert_eq!(fp.version.as_deref(), Some("8.0.36"));

        apply_verdict(&mut fp);
        assert!(fp.details.contains("Product: MySQL 8.0.36"));
    }

    #[test]
    fn test_unknown_banner_has_no_product() {
        let mut fp = ServiceFingerprint::new(9999);
        classify_banner(&mut fp, "hello there");
        extract_version(&mut fp);
        assert_eq!(fp.product, None);
        assert_eq!(fp.version, None);
    }

    #[test]
    fn test_verdict_precedence() {
        let mut fp = ServiceFingerprint::new(8080);
        fp.tcp_connectable = true;
        fp.is_http = true;
        fp.is_ssh = true;
        fp.is_tls = true;
        assert_eq!(select_rule(&fp).tier, Tier::Http);

        fp.server_header = Some("CUPS/IPP".to_string());
        assert_eq!(select_rule(&fp).tier, Tier::PrintingService);

        let mut ftp_smtp = ServiceFingerprint::new(21);
        ftp_smtp.is_ftp = true;
        ftp_smtp.is_smtp = true;
        assert_eq!(select_rule(&ftp_smtp).tier, Tier::Ftp);

        assert_eq!(select_rule(&ServiceFingerprint::new(1)).tier, Tier::Unreachable);
    }

    #[test]
    fn test_hint_bonus_only_on_generic_tiers() {
        let mut silent = ServiceFingerprint::new(22);
        silent.tcp_connectable = true;
        silent.common_port_association = port_association(22).to_string();
        apply_verdict(&mut silent);
        assert_eq!(silent.service_name, "Active TCP service (probably SSH)");
        assert_eq!(silent.confidence, 60);

        let mut ssh = ServiceFingerprint::new(22);
        ssh.tcp_connectable = true;
        ssh.is_ssh = true;
        ssh.common_port_association = port_association(22).to_string();
        apply_verdict(&mut ssh);
        assert_eq!(ssh.service_name, "SSH");
        assert_eq!(ssh.confidence, 95);

        let mut odd = ServiceFingerprint::new(4444);
        odd.tcp_connectable = true;
        odd.common_port_association = port_association(4444).to_string();
        apply_verdict(&mut odd);
        assert_eq!(odd.service_name, "Active TCP service");
        assert_eq!(odd.confidence, 40);
    }

    #[test]
    fn test_well_known_fallback_replaces_generic_names() {
        let engine = engine(WellKnownPorts::builtin());

        let mut fp = ServiceFingerprint::new(3306);
        fp.tcp_connectable = true;
        fp.common_port_association = port_association(3306).to_string();
        apply_verdict(&mut fp);
        let confidence = fp.confidence;
        let methods = fp.detection_methods.clone();
        engine.apply_well_known_fallback(&mut fp);

        assert_eq!(fp.service_name, "mysql");
        assert_eq!(fp.confidence, confidence);
        assert_eq!(fp.detection_methods, methods);

        let mut http = ServiceFingerprint::new(80);
        http.tcp_connectable = true;
        http.is_http = true;
        apply_verdict(&mut http);
        engine.apply_well_known_fallback(&mut http);
        assert_eq!(http.service_name, "HTTP");
    }

    #[test]
    fn test_confidence_always_in_range() {
        for bits in 0u8..64 {
            let mut fp = ServiceFingerprint::new(21);
            fp.is_http = bits & 1 != 0;
            fp.is_tls = bits & 2 != 0;
            fp.is_ssh = bits & 4 != 0;
            fp.is_ftp = bits & 8 != 0;
            fp.tcp_connectable = bits & 16 != 0;
            fp.sends_data_first = bits & 32 != 0;
            fp.common_port_association = port_association(21).to_string();
            apply_verdict(&mut fp);
            assert!(fp.confidence <= 100);
        }
    }
}
