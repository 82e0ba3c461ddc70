//! Détection des adresses dépassant le seuil de connexions
//!
//! Une adresse légitime ouvrant beaucoup de connexions courtes au même
//! instant (un reverse proxy chargé, par exemple) est indiscernable d'un
//! attaquant avec cette heuristique. C'est une limite assumée, atténuée
//! uniquement par la liste blanche.

use crate::aggregator::Window;
use crate::config::MonitorPolicy;
use crate::models::SuspicionEvent;

/// Compare les compteurs du cycle à la politique et produit les événements
///
/// Un événement est émis pour chaque adresse dont le compteur dépasse
/// strictement le seuil (`count > threshold`, jamais à l'égalité) et qui
/// n'est pas en liste blanche. L'ordre d'itération du dictionnaire n'est
/// pas spécifié : les appelants doivent traiter la sortie comme un
/// ensemble.
pub fn detect(window: &Window, policy: &MonitorPolicy) -> Vec<SuspicionEvent> {
    let mut events = Vec::new();

    for (addr, &count) in window.counts() {
        if count > policy.threshold && !policy.is_whitelisted(addr) {
            events.push(SuspicionEvent::new(*addr, count, policy.threshold));
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionRecord;
    use std::collections::HashSet;
    use std::net::IpAddr;
    use std::time::Duration;

    fn policy(threshold: u64, whitelist: &[&str]) -> MonitorPolicy {
        MonitorPolicy {
            threshold,
            check_interval: Duration::from_secs(3),
            whitelist: whitelist.iter().map(|a| a.parse().unwrap()).collect(),
        }
    }

    fn window_of(addrs: &[&str]) -> Window {
        let records: Vec<ConnectionRecord> = addrs
            .iter()
            .map(|a| ConnectionRecord {
                remote_addr: a.parse().unwrap(),
                remote_port: Some(5000),
                local_port: Some(22),
                raw_line: String::new(),
            })
            .collect();
        Window::aggregate(&records)
    }

    #[test]
    fn test_event_above_threshold() {
        // Scénario A: 6 connexions d'une même adresse, seuil 5
        let window = window_of(&["10.0.0.1"; 6]);
        let events = detect(&window, &policy(5, &[]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].remote_addr, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(events[0].count, 6);
        assert_eq!(events[0].threshold, 5);
    }

    #[test]
    fn test_no_event_at_exact_threshold() {
        // Scénario B: l'égalité au seuil n'est pas suspecte
        let window = window_of(&["10.0.0.1"; 6]);
        let events = detect(&window, &policy(6, &[]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_no_event_below_threshold() {
        // Scénario C: 3 connexions de chaque adresse, seuil 5
        let window = window_of(&[
            "10.0.0.1", "10.0.0.1", "10.0.0.1", "10.0.0.2", "10.0.0.2", "10.0.0.2",
        ]);
        let events = detect(&window, &policy(5, &[]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_whitelisted_address_is_exempt() {
        // Scénario E: adresse en liste blanche, même très au-dessus du seuil
        let window = window_of(&["10.0.0.1"; 100]);
        let events = detect(&window, &policy(5, &["10.0.0.1"]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_detect_is_deterministic_as_a_set() {
        let window = window_of(&[
            "10.0.0.1", "10.0.0.1", "10.0.0.1", "10.0.0.2", "10.0.0.2", "10.0.0.2",
        ]);
        let policy = policy(2, &[]);

        let as_set = |events: Vec<SuspicionEvent>| -> HashSet<(IpAddr, u64)> {
            events.into_iter().map(|e| (e.remote_addr, e.count)).collect()
        };

        let first = as_set(detect(&window, &policy));
        let second = as_set(detect(&window, &policy));
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
