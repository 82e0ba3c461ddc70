//! Agrégation par cycle des connexions par adresse distante

use crate::models::ConnectionRecord;
use std::collections::HashMap;
use std::net::IpAddr;

/// Fenêtre d'observation d'un cycle
///
/// Les compteurs sont locaux au cycle : une fenêtre neuve est construite à
/// chaque échantillonnage et jetée en fin de cycle, rien n'est reporté d'un
/// cycle à l'autre. Ce n'est donc pas une fenêtre glissante dans le temps :
/// une connexion longue durée réapparaissant dans chaque instantané est
/// recomptée à chaque cycle, fidèle à la sémantique d'un `netstat` répété.
#[derive(Debug, Default)]
pub struct Window {
    counts: HashMap<IpAddr, u64>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construit la fenêtre complète d'un cycle à partir des
    /// enregistrements acceptés
    pub fn aggregate<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ConnectionRecord>,
    {
        let mut window = Window::new();
        for record in records {
            window.observe(record);
        }
        window
    }

    /// Comptabilise un enregistrement dans la fenêtre courante
    ///
    /// Les adresses en liste blanche sont comptées comme les autres :
    /// l'exemption est l'affaire du détecteur, pas de l'agrégation.
    pub fn observe(&mut self, record: &ConnectionRecord) {
        *self.counts.entry(record.remote_addr).or_insert(0) += 1;
    }

    pub fn counts(&self) -> &HashMap<IpAddr, u64> {
        &self.counts
    }

    pub fn count_for(&self, addr: &IpAddr) -> u64 {
        self.counts.get(addr).copied().unwrap_or(0)
    }

    /// Nombre total d'enregistrements acceptés dans le cycle
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(addr: &str, port: u16) -> ConnectionRecord {
        ConnectionRecord {
            remote_addr: addr.parse().unwrap(),
            remote_port: Some(port),
            local_port: Some(22),
            raw_line: format!("tcp 0 0 192.168.1.10:22 {}:{} ESTABLISHED", addr, port),
        }
    }

    #[test]
    fn test_counts_match_records_per_address() {
        let records = vec![
            record("10.0.0.1", 5000),
            record("10.0.0.1", 5001),
            record("10.0.0.2", 6000),
            record("10.0.0.1", 5002),
        ];
        let window = Window::aggregate(&records);
        assert_eq!(window.count_for(&"10.0.0.1".parse().unwrap()), 3);
        assert_eq!(window.count_for(&"10.0.0.2".parse().unwrap()), 1);
        // La somme des compteurs vaut le nombre d'enregistrements acceptés
        assert_eq!(window.total(), records.len() as u64);
    }

    #[test]
    fn test_empty_cycle_has_no_counts() {
        let window = Window::aggregate(&[]);
        assert!(window.is_empty());
        assert_eq!(window.total(), 0);
    }

    #[test]
    fn test_unknown_address_counts_zero() {
        let window = Window::aggregate(&[record("10.0.0.1", 5000)]);
        assert_eq!(window.count_for(&"10.9.9.9".parse().unwrap()), 0);
    }
}
