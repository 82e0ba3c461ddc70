//! Ordonnancement de la boucle de surveillance
//!
//! Un cycle est strictement séquentiel: échantillonner, normaliser,
//! agréger, détecter, émettre, puis dormir. Un nouveau cycle ne démarre
//! jamais tant que le précédent n'est pas terminé, ce qui borne à une
//! seule invocation concurrente l'interrogation du système.

use crate::aggregator::Window;
use crate::config::MonitorPolicy;
use crate::detector::detect;
use crate::logger::Logger;
use crate::models::SuspicionEvent;
use crate::parser;
use crate::sink::AlertSink;
use crate::source::ConnectionSource;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::watch;

pub struct Monitor {
    policy: Arc<MonitorPolicy>,
    source: Box<dyn ConnectionSource>,
    sink: Box<dyn AlertSink>,
    logger: Arc<Logger>,
}

impl Monitor {
    pub fn new(
        policy: Arc<MonitorPolicy>,
        source: Box<dyn ConnectionSource>,
        sink: Box<dyn AlertSink>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            policy,
            source,
            sink,
            logger,
        }
    }

    /// Boucle de surveillance, jusqu'à annulation externe
    ///
    /// La boucle n'a aucune condition d'arrêt interne. Le signal d'arrêt
    /// interrompt l'attente entre deux cycles immédiatement, sans attendre
    /// la fin de l'intervalle ; l'état du cycle en cours est simplement
    /// jeté, aucune alerte partielle n'est émise.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Surveillance démarrée (seuil: {}, intervalle: {}s)",
            self.policy.threshold,
            self.policy.check_interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.policy.check_interval) => {}
                _ = wait_for_stop(&mut shutdown) => {
                    break;
                }
            }
        }

        info!("Surveillance arrêtée");
    }

    /// Exécute exactement un cycle et retourne ses événements
    ///
    /// Une défaillance de la source est recouvrée localement: une ligne de
    /// diagnostic, un échantillon vide, et la boucle continue. Le détecteur
    /// observe toujours l'agrégation complète du cycle, jamais un état
    /// partiel.
    pub async fn run_cycle(&self) -> Vec<SuspicionEvent> {
        let lines = match self.source.sample().await {
            Ok(lines) => lines,
            Err(e) => {
                warn!("{}", e);
                self.logger.log_source_failure(&e.to_string());
                Vec::new()
            }
        };

        let line_refs: Vec<&str> = lines.iter().map(|l| l.as_str()).collect();
        let records = parser::parse_lines(line_refs);
        let window = Window::aggregate(&records);
        let events = detect(&window, &self.policy);

        for event in &events {
            self.sink.emit(event);
        }

        debug!(
            "Cycle terminé: {} lignes brutes, {} connexions acceptées, {} suspectes",
            lines.len(),
            records.len(),
            events.len()
        );
        self.logger
            .log_cycle(records.len(), window.counts().len(), events.len());

        events
    }
}

/// Attend une véritable demande d'arrêt
///
/// Une valeur `false` rejouée sur le canal (un embarqueur renvoyant l'état
/// courant) ne doit pas écourter l'intervalle entre deux cycles: on ne se
/// résout que sur `true` ou sur la fermeture du canal.
async fn wait_for_stop(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if shutdown.changed().await.is_err() {
            return;
        }
        if *shutdown.borrow() {
            return;
        }
    }
}
