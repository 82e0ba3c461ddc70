//! Émission des événements de suspicion
//!
//! Le sink ré-alerte à chaque cycle pour une adresse durablement suspecte :
//! pas de suppression entre cycles, la visibilité est continue. Une
//! politique de notification à débit limité se construit au-dessus, en
//! enveloppant un sink, pas dans le cœur.

use crate::logger::Logger;
use crate::models::SuspicionEvent;
use log::warn;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Destination des événements de suspicion
pub trait AlertSink: Send + Sync {
    fn emit(&self, event: &SuspicionEvent);
}

/// Sink console: une ligne lisible par événement, doublée dans le fichier
/// de log
pub struct ConsoleSink {
    logger: Arc<Logger>,
}

impl ConsoleSink {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }
}

impl AlertSink for ConsoleSink {
    fn emit(&self, event: &SuspicionEvent) {
        println!("{}", event.render());
        warn!(
            "IP suspecte: {} ({} connexions, seuil {})",
            event.remote_addr, event.count, event.threshold
        );
        self.logger.log_suspicion(event);
    }
}

/// Sink canal: relaie les événements sur un canal tokio
///
/// Utilisé par les tests et les contextes d'intégration qui consomment
/// les détections ailleurs. Si le récepteur est plein ou fermé,
/// l'événement est perdu sans bloquer la boucle.
pub struct ChannelSink {
    tx: mpsc::Sender<SuspicionEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SuspicionEvent>) -> Self {
        Self { tx }
    }
}

impl AlertSink for ChannelSink {
    fn emit(&self, event: &SuspicionEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            warn!("Événement de suspicion non relayé: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    #[tokio::test]
    async fn test_channel_sink_forwards_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let sink = ChannelSink::new(tx);

        let event = SuspicionEvent::new("10.0.0.1".parse::<IpAddr>().unwrap(), 7, 5);
        sink.emit(&event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }
}
