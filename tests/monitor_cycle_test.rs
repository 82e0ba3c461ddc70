use async_trait::async_trait;
use connwatch::config::MonitorPolicy;
use connwatch::logger::Logger;
use connwatch::scheduler::Monitor;
use connwatch::sink::ChannelSink;
use connwatch::source::{ConnectionSource, SourceError, StaticSource};
use connwatch::SuspicionEvent;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};

use std::sync::atomic::{AtomicUsize, Ordering};

/// Source simulant une table de connexions inaccessible
struct UnavailableSource;

#[async_trait]
impl ConnectionSource for UnavailableSource {
    async fn sample(&self) -> Result<Vec<String>, SourceError> {
        Err(SourceError::Unavailable("netstat introuvable".to_string()))
    }
}

fn policy(threshold: u64, interval_secs: u64, whitelist: &[&str]) -> MonitorPolicy {
    MonitorPolicy {
        threshold,
        check_interval: Duration::from_secs(interval_secs),
        whitelist: whitelist.iter().map(|a| a.parse().unwrap()).collect(),
    }
}

fn connection_line(remote: &str) -> String {
    format!("tcp        0      0 192.168.1.10:22 {} ESTABLISHED", remote)
}

fn build_monitor(
    source: Box<dyn ConnectionSource>,
    policy: MonitorPolicy,
) -> (Monitor, mpsc::Receiver<SuspicionEvent>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("connwatch.log");
    let logger = Arc::new(Logger::new(log_path.to_string_lossy().to_string()));

    let (tx, rx) = mpsc::channel(64);
    let sink = Box::new(ChannelSink::new(tx));

    (Monitor::new(Arc::new(policy), source, sink, logger), rx, dir)
}

#[tokio::test]
async fn test_single_address_above_threshold_raises_one_event() {
    // Scénario A: 6 connexions de 10.0.0.1, seuil 5
    let lines: Vec<String> = (5000..5006)
        .map(|port| connection_line(&format!("10.0.0.1:{}", port)))
        .collect();
    let (monitor, _rx, _dir) =
        build_monitor(Box::new(StaticSource::new(lines)), policy(5, 1, &[]));

    let events = monitor.run_cycle().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].remote_addr, "10.0.0.1".parse::<IpAddr>().unwrap());
    assert_eq!(events[0].count, 6);
    assert_eq!(events[0].threshold, 5);
}

#[tokio::test]
async fn test_count_equal_to_threshold_is_not_suspicious() {
    // Scénario B: mêmes 6 connexions, seuil 6
    let lines: Vec<String> = (5000..5006)
        .map(|port| connection_line(&format!("10.0.0.1:{}", port)))
        .collect();
    let (monitor, _rx, _dir) =
        build_monitor(Box::new(StaticSource::new(lines)), policy(6, 1, &[]));

    assert!(monitor.run_cycle().await.is_empty());
}

#[tokio::test]
async fn test_addresses_below_threshold_raise_nothing() {
    // Scénario C: 3 connexions de chacune de deux adresses, seuil 5
    let mut lines = Vec::new();
    for addr in ["10.0.0.1", "10.0.0.2"] {
        for port in 6000..6003 {
            lines.push(connection_line(&format!("{}:{}", addr, port)));
        }
    }
    let (monitor, _rx, _dir) =
        build_monitor(Box::new(StaticSource::new(lines)), policy(5, 1, &[]));

    assert!(monitor.run_cycle().await.is_empty());
}

#[tokio::test]
async fn test_unavailable_source_yields_empty_cycle() {
    // Scénario D: source indisponible, cycle vide, pas de panique
    let (monitor, _rx, _dir) = build_monitor(Box::new(UnavailableSource), policy(5, 1, &[]));

    assert!(monitor.run_cycle().await.is_empty());
    // La boucle doit pouvoir enchaîner sur le cycle suivant
    assert!(monitor.run_cycle().await.is_empty());
}

#[tokio::test]
async fn test_whitelisted_address_never_raises() {
    // Scénario E: adresse en liste blanche avec 100 connexions, seuil 5
    let lines: Vec<String> = (1025..1125)
        .map(|port| connection_line(&format!("10.0.0.1:{}", port)))
        .collect();
    let (monitor, _rx, _dir) = build_monitor(
        Box::new(StaticSource::new(lines)),
        policy(5, 1, &["10.0.0.1"]),
    );

    assert!(monitor.run_cycle().await.is_empty());
}

#[tokio::test]
async fn test_noise_lines_never_reach_the_window() {
    let mut lines = vec![
        "Active Internet connections (w/o servers)".to_string(),
        "Proto Recv-Q Send-Q Local Address           Foreign Address         State".to_string(),
        "unix  3      [ ]         STREAM     CONNECTED     21569".to_string(),
    ];
    lines.extend((5000..5006).map(|port| connection_line(&format!("10.0.0.1:{}", port))));

    let (monitor, _rx, _dir) =
        build_monitor(Box::new(StaticSource::new(lines)), policy(5, 1, &[]));

    // Le bruit ne gonfle aucun compteur: toujours exactement 6 pour 10.0.0.1
    let events = monitor.run_cycle().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].count, 6);
}

#[tokio::test]
async fn test_events_reach_the_sink_every_cycle() {
    // Pas de suppression entre cycles: une adresse durablement suspecte
    // est ré-alertée à chaque cycle
    let lines: Vec<String> = (5000..5006)
        .map(|port| connection_line(&format!("10.0.0.1:{}", port)))
        .collect();
    let (monitor, mut rx, _dir) =
        build_monitor(Box::new(StaticSource::new(lines)), policy(5, 1, &[]));

    monitor.run_cycle().await;
    monitor.run_cycle().await;

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.remote_addr, second.remote_addr);
    assert_eq!(first.count, 6);
    assert_eq!(second.count, 6);
}

#[tokio::test]
async fn test_multiple_offenders_reported_as_a_set() {
    let mut lines = Vec::new();
    for addr in ["10.0.0.1", "10.0.0.2"] {
        for port in 7000..7007 {
            lines.push(connection_line(&format!("{}:{}", addr, port)));
        }
    }
    let (monitor, _rx, _dir) =
        build_monitor(Box::new(StaticSource::new(lines)), policy(5, 1, &[]));

    let events = monitor.run_cycle().await;
    let addrs: HashSet<IpAddr> = events.iter().map(|e| e.remote_addr).collect();
    let expected: HashSet<IpAddr> = ["10.0.0.1", "10.0.0.2"]
        .iter()
        .map(|a| a.parse().unwrap())
        .collect();
    assert_eq!(addrs, expected);
}

/// Source comptant ses invocations, pour observer la cadence des cycles
struct CountingSource {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ConnectionSource for CountingSource {
    async fn sample(&self) -> Result<Vec<String>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_false_signal_does_not_shorten_the_interval() {
    // Un embarqueur qui renvoie `false` sur le canal d'arrêt ne doit pas
    // écourter l'attente ni déclencher un cycle anticipé
    let calls = Arc::new(AtomicUsize::new(0));
    let (monitor, _rx, _dir) = build_monitor(
        Box::new(CountingSource {
            calls: Arc::clone(&calls),
        }),
        policy(5, 3600, &[]),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { monitor.run(stop_rx).await });

    // Laisser le premier cycle s'exécuter, puis rejouer la valeur courante
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(false).unwrap();
    stop_tx.send(false).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Un seul cycle: l'intervalle de 3600s n'a pas été écourté
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    stop_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("la boucle doit s'arrêter promptement")
        .unwrap();
}

#[tokio::test]
async fn test_stop_signal_interrupts_the_sleep() {
    // Intervalle volontairement long: sans interruption de l'attente, ce
    // test dépasserait son délai
    let (monitor, _rx, _dir) = build_monitor(
        Box::new(StaticSource::new(Vec::<String>::new())),
        policy(5, 3600, &[]),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { monitor.run(stop_rx).await });

    // Laisser le premier cycle s'exécuter, puis demander l'arrêt
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("la boucle doit s'arrêter promptement")
        .unwrap();
}
