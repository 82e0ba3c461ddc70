//! Audit ponctuel des ports en écoute
//!
//! Collaborateur indépendant de la boucle de surveillance: relève les
//! sockets TCP en écoute avec leur processus propriétaire et signale ceux
//! absents de la liste des ports autorisés. Aucun état, une seule passe.

use crate::models::ListeningPort;
use crate::source::decode_socket_hex;
use anyhow::Result;
use log::debug;
use std::collections::HashMap;
use std::fs;

const PROC_TABLES: [&str; 2] = ["/proc/net/tcp", "/proc/net/tcp6"];
const TCP_LISTEN: &str = "0A";

/// Exécute l'audit et imprime le rapport
pub fn audit(allowed_ports: &[u16]) -> Result<()> {
    let ports = listening_ports()?;

    if ports.is_empty() {
        println!("Aucun port en écoute trouvé.");
        return Ok(());
    }

    println!("\n=== Ports en écoute sur cette machine ===");
    for entry in &ports {
        println!(
            "Port: {:<5} | PID: {:<6} | Utilisateur: {:<15} | Processus: {}",
            entry.port,
            entry
                .pid
                .map(|p| p.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            entry.user,
            entry.process
        );
    }

    let suspicious: Vec<&ListeningPort> = ports
        .iter()
        .filter(|p| !allowed_ports.contains(&p.port))
        .collect();

    println!("\n=== Ports suspects (hors liste blanche) ===");
    if suspicious.is_empty() {
        println!("Aucun port suspect détecté.");
    } else {
        for entry in suspicious {
            println!(
                "[!] Port: {} | PID: {} | Utilisateur: {} | Processus: {}",
                entry.port,
                entry
                    .pid
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
                entry.user,
                entry.process
            );
        }
    }

    Ok(())
}

/// Relève les ports TCP en écoute, avec propriétaire en meilleur effort
///
/// La résolution inode → processus exige de lire les descripteurs des
/// autres processus ; sans privilège suffisant, le propriétaire reste
/// "N/A", comme dans l'outil d'origine.
pub fn listening_ports() -> Result<Vec<ListeningPort>> {
    let owners = socket_owners();
    let mut seen = HashMap::new();

    for table in PROC_TABLES {
        let contents = match fs::read_to_string(table) {
            Ok(c) => c,
            Err(e) => {
                debug!("Table {} illisible: {}", table, e);
                continue;
            }
        };

        for row in contents.lines().skip(1) {
            if let Some((port, uid, inode)) = parse_listen_row(row) {
                let (pid, process) = owners
                    .get(&inode)
                    .cloned()
                    .map(|(pid, name)| (Some(pid), name))
                    .unwrap_or((None, "N/A".to_string()));

                // Un même port peut apparaître dans tcp et tcp6
                seen.entry(port).or_insert(ListeningPort {
                    port,
                    pid,
                    process,
                    user: username_for_uid(uid),
                });
            }
        }
    }

    let mut ports: Vec<ListeningPort> = seen.into_values().collect();
    ports.sort_by_key(|p| p.port);
    Ok(ports)
}

/// Extrait `(port local, uid, inode)` d'une ligne procfs en état LISTEN
fn parse_listen_row(row: &str) -> Option<(u16, u32, u64)> {
    let fields: Vec<&str> = row.split_whitespace().collect();
    if fields.len() < 10 || fields[3] != TCP_LISTEN {
        return None;
    }

    let (_, port) = decode_socket_hex(fields[1])?;
    let uid: u32 = fields[7].parse().ok()?;
    let inode: u64 = fields[9].parse().ok()?;
    Some((port, uid, inode))
}

/// Construit la correspondance inode de socket → (pid, nom du processus)
fn socket_owners() -> HashMap<u64, (u32, String)> {
    let mut owners = HashMap::new();

    let proc_entries = match fs::read_dir("/proc") {
        Ok(entries) => entries,
        Err(_) => return owners,
    };

    for entry in proc_entries.flatten() {
        let pid: u32 = match entry.file_name().to_string_lossy().parse() {
            Ok(pid) => pid,
            Err(_) => continue,
        };

        let fd_dir = entry.path().join("fd");
        let fds = match fs::read_dir(&fd_dir) {
            Ok(fds) => fds,
            // Permission refusée sur les processus d'autres utilisateurs
            Err(_) => continue,
        };

        for fd in fds.flatten() {
            if let Ok(target) = fs::read_link(fd.path()) {
                let target = target.to_string_lossy();
                if let Some(inode) = target
                    .strip_prefix("socket:[")
                    .and_then(|rest| rest.strip_suffix(']'))
                    .and_then(|n| n.parse::<u64>().ok())
                {
                    let name = process_name(pid);
                    owners.entry(inode).or_insert((pid, name));
                }
            }
        }
    }

    owners
}

fn process_name(pid: u32) -> String {
    fs::read_to_string(format!("/proc/{}/comm", pid))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "N/A".to_string())
}

fn username_for_uid(uid: u32) -> String {
    if let Ok(passwd) = fs::read_to_string("/etc/passwd") {
        for line in passwd.lines() {
            let mut fields = line.split(':');
            let name = fields.next();
            let _password = fields.next();
            let entry_uid = fields.next().and_then(|u| u.parse::<u32>().ok());
            if let (Some(name), Some(entry_uid)) = (name, entry_uid) {
                if entry_uid == uid {
                    return name.to_string();
                }
            }
        }
    }
    uid.to_string()
}
