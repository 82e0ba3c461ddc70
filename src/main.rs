use anyhow::Context;
use clap::Parser;
use connwatch::cli::{Backend, Cli, Command, MonitorArgs};
use connwatch::config::Config;
use connwatch::log_mode::LogMode;
use connwatch::logger::Logger;
use connwatch::scheduler::Monitor;
use connwatch::sink::ConsoleSink;
use connwatch::source::{ConnectionSource, NetstatSource, ProcNetSource};
use connwatch::{diskguard, ports};
use log::{error, info};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger la configuration pour déterminer le mode de log
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Configuration illisible ({}), valeurs par défaut utilisées", e);
        Config::default()
    });

    // Initialiser le logger approprié
    init_logging(&config);

    // Analyser les arguments de ligne de commande
    let cli = Cli::parse();

    // Aucun sous-programme ne s'exécute avec une configuration invalide
    config.validate().context("configuration invalide")?;

    match cli.command {
        Command::Start { overrides } => {
            let monitor = build_monitor(&config, &overrides)?;

            // Arrêt propre sur Ctrl-C: le signal interrompt l'attente entre
            // deux cycles sans attendre la fin de l'intervalle
            let (stop_tx, stop_rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Écoute du signal d'arrêt impossible: {}", e);
                    return;
                }
                info!("Signal d'arrêt reçu");
                let _ = stop_tx.send(true);
            });

            println!("Surveillance des connexions démarrée...");
            monitor.run(stop_rx).await;
            Ok(())
        }
        Command::Once { overrides } => {
            let monitor = build_monitor(&config, &overrides)?;
            let events = monitor.run_cycle().await;
            if events.is_empty() {
                println!("Aucune adresse suspecte sur ce cycle.");
            }
            Ok(())
        }
        Command::Ports => ports::audit(&config.allowed_ports),
        Command::Diskguard => diskguard::run(
            &config.disk_path,
            config.disk_threshold,
            &config.archive_dest,
            config.top_n_files,
        ),
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Assemble le moniteur à partir de la configuration et des surcharges CLI
///
/// Toute erreur de politique est fatale ici, avant l'entrée dans la boucle.
fn build_monitor(config: &Config, overrides: &MonitorArgs) -> anyhow::Result<Monitor> {
    let mut config = config.clone();
    if let Some(threshold) = overrides.threshold {
        config.threshold = threshold;
    }
    if let Some(interval) = overrides.interval {
        config.check_interval = interval;
    }
    config.whitelist.extend(overrides.whitelist.iter().cloned());

    let policy = config
        .monitor_policy()
        .context("politique de surveillance invalide")?;

    let source: Box<dyn ConnectionSource> = match overrides.backend {
        Backend::Netstat => Box::new(NetstatSource),
        Backend::Procfs => Box::new(ProcNetSource),
    };

    let logger = Arc::new(Logger::new_with_mode(config.log_file.clone(), config.log_mode));
    let sink = Box::new(ConsoleSink::new(Arc::clone(&logger)));

    Ok(Monitor::new(Arc::new(policy), source, sink, logger))
}

/// Initialise la journalisation selon le mode configuré
fn init_logging(config: &Config) {
    match config.log_mode {
        LogMode::File => {
            // Logger standard sur stderr, niveau pris dans la configuration
            env_logger::init_from_env(
                env_logger::Env::default().default_filter_or(&config.log_level),
            );
        }
        LogMode::SystemdJournal => {
            // Logger systemd-journal uniquement si la feature est activée
            #[cfg(feature = "systemd")]
            {
                use systemd_journal_logger::JournalLog;

                let log_level = match config.log_level.to_lowercase().as_str() {
                    "trace" => log::LevelFilter::Trace,
                    "debug" => log::LevelFilter::Debug,
                    "info" => log::LevelFilter::Info,
                    "warn" => log::LevelFilter::Warn,
                    "error" => log::LevelFilter::Error,
                    _ => log::LevelFilter::Info,
                };

                match JournalLog::new() {
                    Ok(logger) => {
                        if let Err(e) = logger
                            .with_syslog_identifier("connwatch".to_string())
                            .install()
                        {
                            eprintln!("Erreur lors de l'installation du logger systemd: {}", e);
                            env_logger::init_from_env(
                                env_logger::Env::default().default_filter_or(&config.log_level),
                            );
                        } else {
                            log::set_max_level(log_level);
                            info!("Logger systemd initialisé avec niveau: {}", config.log_level);
                        }
                    }
                    Err(e) => {
                        eprintln!("Erreur lors de l'initialisation du logger systemd: {}", e);
                        env_logger::init_from_env(
                            env_logger::Env::default().default_filter_or(&config.log_level),
                        );
                    }
                }
            }

            #[cfg(not(feature = "systemd"))]
            {
                eprintln!(
                    "AVERTISSEMENT: Le mode SystemdJournal n'est pas disponible (feature 'systemd' non activée). Utilisation du logger standard à la place."
                );
                env_logger::init_from_env(
                    env_logger::Env::default().default_filter_or(&config.log_level),
                );
            }
        }
    }
}
