use serde::{Deserialize, Serialize};

/// Mode de journalisation (fichier ou journal systemd)
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum LogMode {
    File,
    SystemdJournal,
}
