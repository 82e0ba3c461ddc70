use clap::{Args, Parser, Subcommand, ValueEnum};

/// Interface en ligne de commande de connwatch
#[derive(Parser)]
#[command(name = "connwatch", version, about = "Moniteur de connexions réseau suspectes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Démarre la boucle de surveillance (jusqu'à Ctrl-C)
    Start {
        #[command(flatten)]
        overrides: MonitorArgs,
    },
    /// Exécute exactement un cycle d'échantillonnage puis s'arrête
    Once {
        #[command(flatten)]
        overrides: MonitorArgs,
    },
    /// Audite les ports en écoute contre la liste des ports autorisés
    Ports,
    /// Lance une passe de nettoyage de la partition surveillée
    Diskguard,
    /// Affiche la configuration effective
    Config,
}

/// Surcharges de la politique de surveillance, par-dessus le fichier de
/// configuration
#[derive(Args)]
pub struct MonitorArgs {
    /// Seuil de connexions par cycle avant alerte
    #[arg(long)]
    pub threshold: Option<u64>,

    /// Intervalle entre deux cycles, en secondes
    #[arg(long)]
    pub interval: Option<u64>,

    /// Adresse à exempter de la détection (répétable)
    #[arg(long = "whitelist", value_name = "IP")]
    pub whitelist: Vec<String>,

    /// Backend d'acquisition de la table de connexions
    #[arg(long, value_enum, default_value_t = Backend::Procfs)]
    pub backend: Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum Backend {
    /// Sortie textuelle de l'utilitaire netstat
    Netstat,
    /// Lecture directe de /proc/net/tcp
    Procfs,
}
