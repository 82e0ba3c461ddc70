use crate::log_mode::LogMode;
use crate::models::SuspicionEvent;
use chrono::{DateTime, Local};
use log::{debug, error, warn};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

pub struct Logger {
    log_file: std::sync::Mutex<Option<File>>,
    log_path: String,
    log_mode: LogMode,
}

impl Logger {
    pub fn new(log_path: String) -> Self {
        Self::new_with_mode(log_path, LogMode::File)
    }

    pub fn new_with_mode(log_path: String, log_mode: LogMode) -> Self {
        // Si le mode de journalisation est fichier, initialiser le fichier de log
        let file = if log_mode == LogMode::File {
            // Créer le répertoire si nécessaire
            if let Some(parent) = Path::new(&log_path).parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    error!("Erreur lors de la création du répertoire de logs: {}", e);
                }
            }

            // Essayer d'ouvrir le fichier de log
            match OpenOptions::new().create(true).append(true).open(&log_path) {
                Ok(file) => Some(file),
                Err(e) => {
                    error!("Erreur lors de l'ouverture du fichier de log {}: {}", log_path, e);
                    None
                }
            }
        } else {
            // En mode systemd-journal, pas besoin de fichier
            None
        };

        Self {
            log_file: std::sync::Mutex::new(file),
            log_path,
            log_mode,
        }
    }

    /// Journalise un événement de suspicion
    pub fn log_suspicion(&self, event: &SuspicionEvent) {
        let timestamp: DateTime<Local> = event.observed_at.into();
        let formatted_time = timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let log_entry = format!("[{}] {}", formatted_time, event.render());

        match self.log_mode {
            LogMode::File => {
                self.write_to_log(&format!("{}\n", log_entry));
            }
            LogMode::SystemdJournal => {
                // Pour systemd-journal, on passe par le crate log
                warn!("{}", log_entry);
            }
        }
    }

    /// Journalise une défaillance de la source de connexions
    ///
    /// Une seule ligne de diagnostic par occurrence : la défaillance est
    /// recouvrée localement (cycle vide), jamais fatale.
    pub fn log_source_failure(&self, reason: &str) {
        let timestamp: DateTime<Local> = SystemTime::now().into();
        let formatted_time = timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let log_entry = format!(
            "[{}] [SOURCE] Échantillonnage impossible: {}",
            formatted_time, reason
        );

        match self.log_mode {
            LogMode::File => {
                self.write_to_log(&format!("{}\n", log_entry));
            }
            LogMode::SystemdJournal => {
                warn!("{}", log_entry);
            }
        }
    }

    /// Journalise le résumé d'un cycle d'échantillonnage
    pub fn log_cycle(&self, accepted: usize, distinct: usize, suspicious: usize) {
        let log_entry = format!(
            "Cycle: {} connexions acceptées, {} adresses distinctes, {} suspectes",
            accepted, distinct, suspicious
        );

        match self.log_mode {
            LogMode::File => {
                let timestamp: DateTime<Local> = SystemTime::now().into();
                let formatted_time = timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string();
                self.write_to_log(&format!("[{}] [CYCLE] {}\n", formatted_time, log_entry));
            }
            LogMode::SystemdJournal => {
                debug!("{}", log_entry);
            }
        }
    }

    fn write_to_log(&self, message: &str) {
        // Ne rien faire si on est en mode systemd-journal
        if self.log_mode == LogMode::SystemdJournal {
            return;
        }

        let mut log_file_guard = match self.log_file.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Erreur lors de l'acquisition du verrou pour le fichier de log: {}", e);
                return;
            }
        };

        if let Some(file) = log_file_guard.as_mut() {
            if let Err(e) = file.write_all(message.as_bytes()) {
                error!("Erreur lors de l'écriture dans le fichier de log: {}", e);

                // Essayer de réouvrir le fichier
                *log_file_guard = match OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.log_path)
                {
                    Ok(file) => Some(file),
                    Err(e) => {
                        error!("Erreur lors de la réouverture du fichier de log: {}", e);
                        None
                    }
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use tempfile::tempdir;

    #[test]
    fn test_suspicion_is_written_to_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("connwatch.log");
        let logger = Logger::new(log_path.to_string_lossy().to_string());

        let event = SuspicionEvent::new("10.0.0.1".parse::<IpAddr>().unwrap(), 6, 5);
        logger.log_suspicion(&event);

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("10.0.0.1"));
        assert!(contents.contains("6 connexions"));
    }
}
