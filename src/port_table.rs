//! Well-known port table
//!
//! Maps `(port, transport)` to a canonical service name, in the format of
//! the nmap services file (`name port/transport [frequency] [# comment]`).
//! Consulted read-only by the fingerprint engine when active probing was
//! inconclusive; a lookup miss returns [`UNKNOWN_SERVICE`].

use std::{collections::HashMap, fmt, path::Path, str::FromStr};

use tracing::{debug, info, warn};

/// Sentinel returned on lookup misses
pub const UNKNOWN_SERVICE: &str = "unknown";

/// Subset of the nmap services file shipped with the binary
pub const BUILTIN_SERVICES: &str = r#"
# service  port/proto
ftp-data        20/tcp
ftp             21/tcp
ssh             22/tcp
telnet          23/tcp
smtp            25/tcp
domain          53/tcp
domain          53/udp
http            80/tcp
kerberos-sec    88/tcp
pop3            110/tcp
rpcbind         111/tcp
msrpc           135/tcp
netbios-ns      137/udp
netbios-ssn     139/tcp
imap            143/tcp
snmp            161/udp
ldap            389/tcp
https           443/tcp
microsoft-ds    445/tcp
submission      587/tcp
ipp             631/tcp
ldaps           636/tcp
imaps           993/tcp
pop3s           995/tcp
ms-sql-s        1433/tcp
oracle          1521/tcp
pptp            1723/tcp
nfs             2049/tcp
ppp             3000/tcp
mysql           3306/tcp
ms-wbt-server   3389/tcp
postgresql      5432/tcp
vnc             5900/tcp
redis           6379/tcp
http-alt        8000/tcp
http-proxy      8080/tcp
https-alt       8443/tcp
jetdirect       9100/tcp
mongod          27017/tcp
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
    Sctp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Sctp => "sctp",
        }
    }
}

impl FromStr for Transport {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "sctp" => Ok(Self::Sctp),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable port → service name table
#[derive(Debug, Clone, Default)]
pub struct WellKnownPorts {
    entries: HashMap<(u16, Transport), String>,
}

impl WellKnownPorts {
    /// A table where every lookup misses
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table built from [`BUILTIN_SERVICES`]
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_SERVICES)
    }

    /// Parse services-file text. Malformed lines are skipped and the first
    /// occurrence of a `(port, transport)` key wins.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut columns = line.split_whitespace();
            let (Some(name), Some(port_proto)) = (columns.next(), columns.next()) else {
                continue;
            };

            let Some((port, proto)) = port_proto.split_once('/') else {
                continue;
            };
            let (Ok(port), Ok(transport)) = (port.parse::<u16>(), proto.parse::<Transport>())
            else {
                continue;
            };

            entries
                .entry((port, transport))
                .or_insert_with(|| name.to_string());
        }

        debug!("Parsed {} well-known port entries", entries.len());
        Self { entries }
    }

    /// Load a services file. Any failure degrades to an empty table.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let table = Self::parse(&text);
                info!("Loaded {} services from {}", table.len(), path.display());
                table
            }
            Err(e) => {
                warn!(
                    "Port table {} not readable ({}), well-known lookups disabled",
                    path.display(),
                    e
                );
                Self::empty()
            }
        }
    }

    /// Load `path` when given, otherwise fall back to the builtin table
    pub fn from_optional_path<P: AsRef<Path>>(path: Option<P>) -> Self {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn get(&self, port: u16, transport: Transport) -> Option<&str> {
        self.entries.get(&(port, transport)).map(String::as_str)
    }

    /// Lookup by transport name; unknown transports and misses return
    /// [`UNKNOWN_SERVICE`]
    pub fn lookup(&self, port: u16, transport: &str) -> &str {
        transport
            .parse::<Transport>()
            .ok()
            .and_then(|t| self.get(port, t))
            .unwrap_or(UNKNOWN_SERVICE)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
