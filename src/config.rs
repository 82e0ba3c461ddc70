use crate::log_mode::LogMode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "/etc/connwatch/config.json";
const CONFIG_DIR: &str = "/etc/connwatch";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Version actuelle du logiciel
    pub version: String,

    /// Seuil de connexions par cycle avant qu'une adresse soit suspecte
    pub threshold: u64,

    /// Intervalle de temps (en secondes) entre deux cycles d'échantillonnage
    pub check_interval: u64,

    /// Liste d'adresses en liste blanche (jamais signalées)
    pub whitelist: Vec<String>,

    /// Ports autorisés pour l'audit des ports en écoute
    pub allowed_ports: Vec<u16>,

    /// Chemin vers le fichier de log
    pub log_file: String,

    /// Niveau de log
    pub log_level: String,

    /// Mode de journalisation (fichier ou systemd-journal)
    pub log_mode: LogMode,

    /// Partition surveillée par le garde-disque
    pub disk_path: String,

    /// Pourcentage d'occupation disque avant nettoyage
    pub disk_threshold: f64,

    /// Destination de l'archive créée par le garde-disque
    pub archive_dest: String,

    /// Nombre de fichiers les plus volumineux à archiver
    pub top_n_files: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            version: env!("CARGO_PKG_VERSION").to_string(),
            threshold: 5,
            check_interval: 3,
            whitelist: vec!["127.0.0.1".to_string(), "::1".to_string()],
            allowed_ports: vec![22, 80, 443, 3306],
            log_file: "/var/log/connwatch/connwatch.log".to_string(),
            log_level: "info".to_string(),
            log_mode: LogMode::File,
            disk_path: "/".to_string(),
            disk_threshold: 90.0,
            archive_dest: "/tmp".to_string(),
            top_n_files: 5,
        }
    }
}

impl Config {
    /// Charge la configuration depuis le fichier
    pub fn load() -> Result<Self, Box<dyn Error>> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(config_file: &str) -> Result<Self, Box<dyn Error>> {
        if !Path::new(config_file).exists() {
            // Créer la configuration par défaut si elle n'existe pas
            let default_config = Config::default();
            if config_file == CONFIG_FILE {
                if !Path::new(CONFIG_DIR).exists() {
                    fs::create_dir_all(CONFIG_DIR)?;
                }
                default_config.save()?;
            }
            return Ok(default_config);
        }

        let config_content = fs::read_to_string(config_file)?;
        let config: Config = serde_json::from_str(&config_content)?;

        Ok(config)
    }

    /// Sauvegarde la configuration dans le fichier
    pub fn save(&self) -> Result<(), Box<dyn Error>> {
        if !Path::new(CONFIG_DIR).exists() {
            fs::create_dir_all(CONFIG_DIR)?;
        }

        let config_json = serde_json::to_string_pretty(self)?;
        fs::write(CONFIG_FILE, config_json)?;

        Ok(())
    }

    /// Valide la configuration complète
    ///
    /// Appelée avant tout sous-programme: le processus ne doit exécuter
    /// aucune action avec une configuration invalide, toute erreur
    /// retournée ici est fatale au démarrage.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold < 1 {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if !(0.0..=100.0).contains(&self.disk_threshold) || self.disk_threshold == 0.0 {
            return Err(ConfigError::InvalidDiskThreshold(self.disk_threshold));
        }
        for entry in &self.whitelist {
            if entry.parse::<IpAddr>().is_err() {
                return Err(ConfigError::InvalidWhitelistEntry(entry.clone()));
            }
        }
        Ok(())
    }

    /// Construit la politique de surveillance validée et immuable
    ///
    /// Le processus ne doit jamais entrer dans la boucle de surveillance
    /// avec une politique invalide : toute erreur retournée ici est fatale.
    pub fn monitor_policy(&self) -> Result<MonitorPolicy, ConfigError> {
        self.validate()?;

        let whitelist: HashSet<IpAddr> = self
            .whitelist
            .iter()
            .filter_map(|entry| entry.parse().ok())
            .collect();

        Ok(MonitorPolicy {
            threshold: self.threshold,
            check_interval: Duration::from_secs(self.check_interval),
            whitelist,
        })
    }
}

/// Politique de surveillance, fixée au démarrage et immuable ensuite
///
/// Partagée librement (`Arc<MonitorPolicy>`) : elle n'est jamais modifiée
/// après validation, aucun verrou n'est donc nécessaire.
#[derive(Debug, Clone)]
pub struct MonitorPolicy {
    pub threshold: u64,
    pub check_interval: Duration,
    pub whitelist: HashSet<IpAddr>,
}

impl MonitorPolicy {
    pub fn is_whitelisted(&self, addr: &IpAddr) -> bool {
        self.whitelist.contains(addr)
    }
}

/// Erreur de configuration, fatale au démarrage
#[derive(Debug)]
pub enum ConfigError {
    InvalidThreshold(u64),
    InvalidDiskThreshold(f64),
    InvalidWhitelistEntry(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidThreshold(t) => {
                write!(f, "seuil de connexions invalide: {} (minimum 1)", t)
            }
            ConfigError::InvalidDiskThreshold(t) => {
                write!(f, "seuil disque invalide: {} (attendu dans (0, 100])", t)
            }
            ConfigError::InvalidWhitelistEntry(e) => {
                write!(f, "entrée de liste blanche invalide: {} (littéral IP attendu)", e)
            }
        }
    }
}

impl Error for ConfigError {}
