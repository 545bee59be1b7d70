//! Operating system detection
//!
//! Infers an OS family from indirect evidence: which ports are open, what
//! the services said in their banners, the names they were identified as,
//! and the TTL of a single ICMP echo reply. Two strategies are available:
//! - [`OsStrategy::Weighted`]: every indicator adds points to a family
//! - [`OsStrategy::TtlBand`]: TTL bands first, a few service rules second

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    str::FromStr,
    sync::Arc,
    time::Duration,
};
use tracing::debug;

use crate::{
    core::{OsInfo, TtlProbe},
    service::ServiceFingerprint,
};

const TTL_BAND_CONFIDENCE: u32 = 60;
const SERVICE_RULE_CONFIDENCE: u32 = 40;
const WEB_PORTS: [u16; 4] = [80, 443, 8080, 8443];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsStrategy {
    #[default]
    Weighted,
    TtlBand,
}

impl FromStr for OsStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "weighted" => Ok(Self::Weighted),
            "ttl_band" | "ttl" => Ok(Self::TtlBand),
            other => Err(format!("unknown OS detection strategy: {}", other)),
        }
    }
}

impl fmt::Display for OsStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weighted => write!(f, "weighted"),
            Self::TtlBand => write!(f, "ttl_band"),
        }
    }
}

/// What one open port contributes to OS detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEvidence {
    pub port: u16,
    pub service_name: String,
    pub banner: Option<String>,
}

/// Everything the detector looks at apart from the TTL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsEvidence {
    pub open_ports: BTreeSet<u16>,
    pub services: Vec<ServiceEvidence>,
}

impl OsEvidence {
    pub fn from_fingerprints(fingerprints: &[ServiceFingerprint]) -> Self {
        Self {
            open_ports: fingerprints.iter().map(|fp| fp.port).collect(),
            services: fingerprints
                .iter()
                .map(|fp| ServiceEvidence {
                    port: fp.port,
                    service_name: fp.service_name.clone(),
                    banner: fp.banner.clone(),
                })
                .collect(),
        }
    }

    /// Evidence made of open ports alone
    pub fn from_ports<I: IntoIterator<Item = u16>>(ports: I) -> Self {
        Self {
            open_ports: ports.into_iter().collect(),
            services: Vec::new(),
        }
    }

    fn has(&self, port: u16) -> bool {
        self.open_ports.contains(&port)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Score {
    total: u32,
    without_ttl: u32,
}

/// Per-family point accumulator
#[derive(Debug, Default)]
struct Scoreboard {
    scores: HashMap<&'static str, Score>,
}

impl Scoreboard {
    fn vote(&mut self, family: &'static str, points: u32) {
        let score = self.scores.entry(family).or_default();
        score.total += points;
        score.without_ttl += points;
    }

    fn ttl_vote(&mut self, family: &'static str, points: u32) {
        self.scores.entry(family).or_default().total += points;
    }

    /// Highest total; ties go to the family with more non-TTL evidence,
    /// then to the alphabetically first name
    fn winner(&self) -> Option<(&'static str, u32)> {
        self.scores
            .iter()
            .max_by(|(a_name, a), (b_name, b)| {
                a.total
                    .cmp(&b.total)
                    .then(a.without_ttl.cmp(&b.without_ttl))
                    .then(b_name.cmp(a_name))
            })
            .filter(|(_, score)| score.total > 0)
            .map(|(name, score)| (*name, score.total))
    }
}

/// Weighted indicator scoring
pub fn weighted_verdict(evidence: &OsEvidence, ttl: Option<u8>) -> OsInfo {
    let mut board = Scoreboard::default();
    let mut distribution: Option<&'static str> = None;

    if [135, 139, 445].iter().any(|&p| evidence.has(p)) {
        board.vote("Windows", 30);
    }
    if evidence.has(3389) {
        board.vote("Windows", 25);
    }
    if evidence.has(1433) {
        board.vote("Windows", 20);
    }
    if evidence.has(22) {
        board.vote("Linux", 20);
    }
    if evidence.has(3306) {
        board.vote("Linux", 15);
    }
    if evidence.has(5432) {
        board.vote("Linux", 15);
    }

    for service in &evidence.services {
        if let Some(banner) = &service.banner {
            let banner = banner.to_lowercase();
            if banner.contains("ubuntu") {
                board.vote("Linux", 40);
                distribution.get_or_insert("Likely Ubuntu");
            } else if banner.contains("debian") {
                board.vote("Linux", 40);
                distribution.get_or_insert("Likely Debian");
            } else if banner.contains("centos") || banner.contains("redhat") {
                board.vote("Linux", 40);
                distribution.get_or_insert("Likely CentOS/RedHat");
            } else if banner.contains("windows") || banner.contains("microsoft") {
                board.vote("Windows", 40);
            } else if banner.contains("win32") {
                board.vote("Windows", 35);
            }
        }

        let name = service.service_name.to_lowercase();
        if name.contains("microsoft") || name.contains("ms-") {
            board.vote("Windows", 30);
        }
    }

    match ttl {
        Some(ttl) if ttl <= 64 => board.ttl_vote("Linux", 25),
        Some(ttl) if ttl <= 128 => board.ttl_vote("Windows", 25),
        Some(_) => board.ttl_vote("Unix", 20),
        None => {}
    }

    let Some((family, score)) = board.winner() else {
        return OsInfo::unknown();
    };

    let mut details: Vec<String> = distribution.map(str::to_string).into_iter().collect();
    if let Some(ttl) = ttl {
        details.push(format!("TTL: {}", ttl));
    }

    OsInfo::new(family, score, details.join(", "))
}

/// TTL bands, falling back to a few service rules
pub fn ttl_band_verdict(evidence: &OsEvidence, ttl: Option<u8>) -> OsInfo {
    if let Some(ttl) = ttl {
        let family = match ttl {
            120..=128 => Some("Windows"),
            60..=70 => Some("Linux/Unix"),
            250..=255 => Some("Network device"),
            _ => None,
        };
        if let Some(family) = family {
            return OsInfo::new(family, TTL_BAND_CONFIDENCE, format!("TTL: {}", ttl));
        }
    }

    let family = if evidence.has(3389) || (evidence.has(445) && !evidence.has(22)) {
        Some("Windows")
    } else if evidence.has(22) && WEB_PORTS.iter().any(|&p| evidence.has(p)) {
        Some("Linux/Unix")
    } else {
        None
    };

    let ttl_note = ttl.map(|t| format!("TTL: {} (inconclusive)", t));
    match family {
        Some(family) => {
            let details = match ttl_note {
                Some(note) => format!("based on services, {}", note),
                None => "based on services".to_string(),
            };
            OsInfo::new(family, SERVICE_RULE_CONFIDENCE, details)
        }
        None => OsInfo::new("Unknown", 0, ttl_note.unwrap_or_default()),
    }
}

/// OS family guesser
pub struct OsDetector {
    strategy: OsStrategy,
    ttl_probe: Arc<dyn TtlProbe>,
    icmp_timeout: Duration,
}

impl OsDetector {
    pub fn new(strategy: OsStrategy, ttl_probe: Arc<dyn TtlProbe>, icmp_timeout: Duration) -> Self {
        Self {
            strategy,
            ttl_probe,
            icmp_timeout,
        }
    }

    pub fn strategy(&self) -> OsStrategy {
        self.strategy
    }

    /// Guess the OS behind `target`. ICMP problems only cost the TTL vote.
    pub async fn detect(&self, target: &str, fingerprints: &[ServiceFingerprint]) -> OsInfo {
        let evidence = OsEvidence::from_fingerprints(fingerprints);
        self.detect_with_evidence(target, &evidence).await
    }

    pub async fn detect_with_evidence(&self, target: &str, evidence: &OsEvidence) -> OsInfo {
        let ttl = self.sample_ttl(target).await;
        let os_info = match self.strategy {
            OsStrategy::Weighted => weighted_verdict(evidence, ttl),
            OsStrategy::TtlBand => ttl_band_verdict(evidence, ttl),
        };

        debug!(
            "OS verdict for {} ({} strategy, ttl {:?}): {} {}%",
            target, self.strategy, ttl, os_info.os_family, os_info.confidence
        );
        os_info
    }

    async fn sample_ttl(&self, target: &str) -> Option<u8> {
        match self.ttl_probe.echo_ttl(target, self.icmp_timeout).await {
            Ok(0) => None,
            Ok(ttl) => Some(ttl),
            Err(e) => {
                debug!("No TTL sample for {}: {}", target, e);
                metrics::counter!("rustprobe_icmp_failures_total", 1);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScannerError};
    use async_trait::async_trait;

    struct FixedTtl(Option<u8>);

    #[async_trait]
    impl TtlProbe for FixedTtl {
        async fn echo_ttl(&self, _target: &str, _timeout: Duration) -> Result<u8> {
            self.0
                .ok_or_else(|| ScannerError::network("ICMP not permitted"))
        }
    }

    fn detector(strategy: OsStrategy, ttl: Option<u8>) -> OsDetector {
        OsDetector::new(strategy, Arc::new(FixedTtl(ttl)), Duration::from_millis(100))
    }

    fn service(port: u16, name: &str, banner: Option<&str>) -> ServiceEvidence {
        ServiceEvidence {
            port,
            service_name: name.to_string(),
            banner: banner.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_linux_services_without_icmp() {
        let evidence = OsEvidence::from_ports([22, 80]);

        let weighted = detector(OsStrategy::Weighted, None)
            .detect_with_evidence("10.0.0.5", &evidence)
            .await;
        assert_eq!(weighted.os_family, "Linux");
        assert!(weighted.confidence > 0);

        let banded = detector(OsStrategy::TtlBand, None)
            .detect_with_evidence("10.0.0.5", &evidence)
            .await;
        assert_eq!(banded.os_family, "Linux/Unix");
        assert_eq!(banded.details, "based on services");
    }

    #[tokio::test]
    async fn test_rdp_is_windows_for_any_ttl() {
        let evidence = OsEvidence::from_ports([3389]);
        for ttl in [None, Some(64), Some(128), Some(255)] {
            let os = detector(OsStrategy::Weighted, ttl)
                .detect_with_evidence("10.0.0.9", &evidence)
                .await;
            assert_eq!(os.os_family, "Windows", "ttl {:?}", ttl);
        }

        for ttl in [None, Some(128), Some(90)] {
            let os = detector(OsStrategy::TtlBand, ttl)
                .detect_with_evidence("10.0.0.9", &evidence)
                .await;
            assert_eq!(os.os_family, "Windows", "ttl {:?}", ttl);
        }
    }

    #[test]
    fn test_weighted_rdp_beats_linux_ttl_tie() {
        let os = weighted_verdict(&OsEvidence::from_ports([3389]), Some(64));
        assert_eq!(os.os_family, "Windows");
        assert_eq!(os.confidence, 25);
        assert_eq!(os.details, "TTL: 64");
    }

    #[test]
    fn test_banner_names_distribution() {
        let evidence = OsEvidence {
            open_ports: [22].into_iter().collect(),
            services: vec![service(22, "SSH", Some("SSH-2.0-OpenSSH_7.4 Debian-10"))],
        };
        let os = weighted_verdict(&evidence, Some(64));
        assert_eq!(os.os_family, "Linux");
        assert_eq!(os.confidence, 85);
        assert_eq!(os.details, "Likely Debian, TTL: 64");
    }

    #[test]
    fn test_windows_service_names_and_banners() {
        let evidence = OsEvidence {
            open_ports: [80, 445, 1433].into_iter().collect(),
            services: vec![
                service(80, "HTTP (Microsoft-IIS/10.0)", Some("HTTP/1.1 200 OK\r\nServer: Microsoft-IIS/10.0")),
                service(445, "microsoft-ds", None),
                service(1433, "ms-sql-s", None),
            ],
        };
        let os = weighted_verdict(&evidence, Some(128));
        assert_eq!(os.os_family, "Windows");
        // Well past 100 before clamping
        assert_eq!(os.confidence, 100);
    }

    #[test]
    fn test_no_indicators_is_unknown() {
        let os = weighted_verdict(&OsEvidence::default(), None);
        assert!(os.is_unknown());
        assert_eq!(os.confidence, 0);

        let os = ttl_band_verdict(&OsEvidence::from_ports([8080]), Some(32));
        assert!(os.is_unknown());
        assert_eq!(os.details, "TTL: 32 (inconclusive)");
    }

    #[test]
    fn test_ttl_bands() {
        let none = OsEvidence::default();
        assert_eq!(ttl_band_verdict(&none, Some(125)).os_family, "Windows");
        assert_eq!(ttl_band_verdict(&none, Some(63)).os_family, "Linux/Unix");
        assert_eq!(ttl_band_verdict(&none, Some(254)).os_family, "Network device");
        assert_eq!(ttl_band_verdict(&none, Some(100)).os_family, "Unknown");

        let smb = OsEvidence::from_ports([445]);
        assert_eq!(ttl_band_verdict(&smb, None).os_family, "Windows");
        let smb_and_ssh = OsEvidence::from_ports([22, 445]);
        assert_eq!(ttl_band_verdict(&smb_and_ssh, None).os_family, "Unknown");
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("ttl-band".parse::<OsStrategy>().unwrap(), OsStrategy::TtlBand);
        assert_eq!("Weighted".parse::<OsStrategy>().unwrap(), OsStrategy::Weighted);
        assert!("nmap".parse::<OsStrategy>().is_err());
        assert_eq!(OsStrategy::default(), OsStrategy::Weighted);
    }
}
