//! Bibliothèque connwatch pour la surveillance des connexions réseau
//!
//! Cette bibliothèque échantillonne périodiquement la table de connexions
//! du système, compte les connexions par adresse distante au sein de
//! chaque cycle, et signale les adresses dépassant un seuil configurable :
//! une heuristique contre les attaques par force brute et les inondations
//! de connexions.
//!
//! Elle fournit aussi deux utilitaires ponctuels : un audit des ports en
//! écoute et un garde-disque qui archive les fichiers les plus volumineux
//! d'une partition presque pleine.

// Modules principaux
pub mod models;     // Structures de données et modèles
pub mod config;     // Configuration du système
pub mod logger;     // Journalisation des événements
pub mod log_mode;   // Modes de journalisation

// Boucle de détection
pub mod source;     // Acquisition de la table de connexions
pub mod parser;     // Normalisation des lignes brutes
pub mod aggregator; // Agrégation par cycle
pub mod detector;   // Comparaison au seuil
pub mod sink;       // Émission des alertes
pub mod scheduler;  // Ordonnancement des cycles

// Utilitaires ponctuels
pub mod ports;      // Audit des ports en écoute
pub mod diskguard;  // Nettoyage de partition pleine

pub mod cli;        // Interface en ligne de commande

// Re-export des structures principales pour faciliter l'utilisation
pub use aggregator::Window;
pub use config::{Config, ConfigError, MonitorPolicy};
pub use detector::detect;
pub use log_mode::LogMode;
pub use models::{ConnectionRecord, ListeningPort, SuspicionEvent};
pub use scheduler::Monitor;
pub use sink::{AlertSink, ChannelSink, ConsoleSink};
pub use source::{ConnectionSource, NetstatSource, ProcNetSource, SourceError, StaticSource};
