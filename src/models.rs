use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::SystemTime;

/// Une connexion observée lors d'un échantillonnage
///
/// Les enregistrements sont recréés à chaque cycle à partir de la sortie
/// de la source de connexions, puis jetés en fin de cycle : aucune identité
/// n'est conservée d'un cycle à l'autre.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionRecord {
    /// Adresse distante (toujours un littéral IP valide)
    pub remote_addr: IpAddr,
    /// Port distant, si présent dans la ligne brute
    pub remote_port: Option<u16>,
    /// Port local, si présent dans la ligne brute
    pub local_port: Option<u16>,
    /// Ligne brute d'origine, conservée pour le diagnostic
    pub raw_line: String,
}

/// Événement émis quand une adresse dépasse le seuil de connexions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuspicionEvent {
    pub remote_addr: IpAddr,
    /// Nombre de connexions observées pendant le cycle
    pub count: u64,
    /// Seuil en vigueur au moment de la détection
    pub threshold: u64,
    pub observed_at: SystemTime,
}

impl SuspicionEvent {
    pub fn new(remote_addr: IpAddr, count: u64, threshold: u64) -> Self {
        Self {
            remote_addr,
            count,
            threshold,
            observed_at: SystemTime::now(),
        }
    }

    /// Ligne d'alerte lisible, utilisée par les sinks console et fichier
    pub fn render(&self) -> String {
        format!(
            "[ALERTE] IP suspecte détectée: {} ({} connexions, seuil {})",
            self.remote_addr, self.count, self.threshold
        )
    }
}

/// Un port en écoute relevé par l'audit des ports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListeningPort {
    pub port: u16,
    pub pid: Option<u32>,
    pub process: String,
    pub user: String,
}
