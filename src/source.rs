//! Acquisition de la table de connexions du système
//!
//! La source est un point de remplacement : le backend textuel invoque
//! l'utilitaire `netstat` comme le faisait l'outil d'origine, le backend
//! structuré lit directement `/proc/net/tcp`. Les deux rendent des lignes
//! de forme netstat pour que le même normaliseur serve en aval.

use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::process::Command;

/// Erreur d'échantillonnage de la source
///
/// Jamais fatale : l'ordonnanceur la journalise et traite le cycle comme
/// un échantillon vide.
#[derive(Debug)]
pub enum SourceError {
    /// La table de connexions n'a pas pu être interrogée (outil absent,
    /// permission refusée, procfs illisible)
    Unavailable(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable(reason) => {
                write!(f, "source de connexions indisponible: {}", reason)
            }
        }
    }
}

impl Error for SourceError {}

/// Interface d'acquisition de la table de connexions
///
/// Chaque appel reflète l'état vivant du système au moment de l'appel,
/// aucune mise en cache entre les appels.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    async fn sample(&self) -> Result<Vec<String>, SourceError>;
}

/// Backend textuel: invoque `netstat -n` une fois par appel
pub struct NetstatSource;

#[async_trait]
impl ConnectionSource for NetstatSource {
    async fn sample(&self) -> Result<Vec<String>, SourceError> {
        let output = Command::new("netstat")
            .arg("-n")
            .output()
            .await
            .map_err(|e| SourceError::Unavailable(format!("netstat: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Unavailable(format!(
                "netstat a échoué: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().map(|l| l.to_string()).collect())
    }
}

/// Backend structuré: lit `/proc/net/tcp` et `/proc/net/tcp6`
///
/// Les adresses de socket du noyau sont en hexadécimal little-endian ;
/// elles sont décodées puis rendues sous forme de lignes netstat afin que
/// le normaliseur aval reste commun aux deux backends.
pub struct ProcNetSource;

const PROC_TCP: &str = "/proc/net/tcp";
const PROC_TCP6: &str = "/proc/net/tcp6";

#[async_trait]
impl ConnectionSource for ProcNetSource {
    async fn sample(&self) -> Result<Vec<String>, SourceError> {
        let tcp4 = tokio::fs::read_to_string(PROC_TCP).await;
        let tcp6 = tokio::fs::read_to_string(PROC_TCP6).await;

        if tcp4.is_err() && tcp6.is_err() {
            return Err(SourceError::Unavailable(format!(
                "{} illisible: {}",
                PROC_TCP,
                tcp4.unwrap_err()
            )));
        }

        let mut lines = Vec::new();
        if let Ok(contents) = tcp4 {
            lines.extend(render_proc_table(&contents));
        }
        if let Ok(contents) = tcp6 {
            lines.extend(render_proc_table(&contents));
        }

        Ok(lines)
    }
}

/// Source statique rejouant un échantillon fixe
///
/// Sert aux tests et aux contextes d'intégration qui veulent alimenter la
/// boucle sans toucher au système.
pub struct StaticSource {
    lines: Vec<String>,
}

impl StaticSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ConnectionSource for StaticSource {
    async fn sample(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.lines.clone())
    }
}

/// Rend les entrées d'une table procfs sous forme de lignes netstat
fn render_proc_table(contents: &str) -> Vec<String> {
    contents
        .lines()
        .skip(1) // en-tête "sl local_address rem_address st ..."
        .filter_map(render_proc_row)
        .collect()
}

fn render_proc_row(row: &str) -> Option<String> {
    let fields: Vec<&str> = row.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }

    let (local_addr, local_port) = decode_socket_hex(fields[1])?;
    let (remote_addr, remote_port) = decode_socket_hex(fields[2])?;

    // Port distant nul: socket en écoute, pas une connexion
    if remote_port == 0 {
        return None;
    }

    let state = tcp_state_name(fields[3]);
    Some(format!(
        "tcp 0 0 {} {} {}",
        format_socket(local_addr, local_port),
        format_socket(remote_addr, remote_port),
        state
    ))
}

/// Décode un champ `ADRESSE:PORT` de procfs (hex, little-endian par mot)
pub(crate) fn decode_socket_hex(field: &str) -> Option<(IpAddr, u16)> {
    let (addr_hex, port_hex) = field.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;

    let addr = match addr_hex.len() {
        8 => {
            let raw = u32::from_str_radix(addr_hex, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(raw.swap_bytes()))
        }
        32 => {
            // Quatre mots de 32 bits, chacun en little-endian
            let mut octets = [0u8; 16];
            for i in 0..4 {
                let word = u32::from_str_radix(&addr_hex[i * 8..(i + 1) * 8], 16).ok()?;
                octets[i * 4..(i + 1) * 4].copy_from_slice(&word.to_le_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };

    Some((addr, port))
}

fn format_socket(addr: IpAddr, port: u16) -> String {
    match addr {
        IpAddr::V4(v4) => format!("{}:{}", v4, port),
        IpAddr::V6(v6) => format!("[{}]:{}", v6, port),
    }
}

/// Noms d'état TCP du noyau Linux
fn tcp_state_name(hex: &str) -> &'static str {
    match hex {
        "01" => "ESTABLISHED",
        "02" => "SYN_SENT",
        "03" => "SYN_RECV",
        "04" => "FIN_WAIT1",
        "05" => "FIN_WAIT2",
        "06" => "TIME_WAIT",
        "07" => "CLOSE",
        "08" => "CLOSE_WAIT",
        "09" => "LAST_ACK",
        "0A" => "LISTEN",
        "0B" => "CLOSING",
        _ => "UNKNOWN",
    }
}
