//! Garde-disque: nettoyage ponctuel d'une partition presque pleine
//!
//! Collaborateur indépendant de la boucle de surveillance. Si l'occupation
//! de la partition atteint le seuil configuré, les fichiers les plus
//! volumineux sont archivés vers une autre destination puis supprimés.
//! Une seule passe, puis le processus se termine.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Exécute une passe du garde-disque
///
/// Le seuil doit être dans (0, 100] : un seuil hors plage rendrait la
/// comparaison d'occupation toujours vraie et supprimerait des fichiers
/// sur un disque sain, donc aucune action n'est entreprise.
pub fn run(disk_path: &str, threshold: f64, archive_dest: &str, top_n: usize) -> Result<()> {
    if !(0.0..=100.0).contains(&threshold) || threshold == 0.0 {
        return Err(anyhow!(
            "seuil disque invalide: {} (attendu dans (0, 100])",
            threshold
        ));
    }

    fs::create_dir_all(archive_dest)
        .with_context(|| format!("création de la destination {}", archive_dest))?;

    let usage = disk_usage_percent(disk_path)?;
    info!("Occupation disque de {}: {:.2}%", disk_path, usage);

    if usage < threshold {
        println!(
            "Occupation de {} à {:.2}%, sous le seuil de {:.0}%. Rien à faire.",
            disk_path, usage, threshold
        );
        return Ok(());
    }

    warn!("Occupation disque au-dessus du seuil de {:.0}%!", threshold);
    let largest = find_largest_files(Path::new(disk_path), top_n);

    if largest.is_empty() {
        warn!("Aucun fichier à archiver trouvé.");
        return Ok(());
    }

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let archive_path = Path::new(archive_dest).join(format!("disk_cleanup_{}.tar.gz", timestamp));

    info!(
        "Archivage des {} fichiers les plus volumineux vers {}",
        largest.len(),
        archive_path.display()
    );
    create_archive(&largest, &archive_path)?;

    info!("Suppression des fichiers d'origine...");
    remove_files(&largest);

    println!("Nettoyage terminé: archive {}", archive_path.display());
    Ok(())
}

/// Pourcentage d'occupation de la partition, via `df -P`
pub fn disk_usage_percent(path: &str) -> Result<f64> {
    let output = Command::new("df")
        .args(["-P", path])
        .output()
        .with_context(|| format!("invocation de df pour {}", path))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("df a échoué: {}", stderr.trim()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_df_percent(&stdout).ok_or_else(|| anyhow!("sortie de df inexploitable"))
}

/// Extrait le pourcentage d'occupation de la sortie POSIX de df
fn parse_df_percent(output: &str) -> Option<f64> {
    // Première ligne: en-tête; deuxième: Filesystem Blocks Used Avail Capacity Mount
    let data_line = output.lines().nth(1)?;
    let capacity = data_line.split_whitespace().nth(4)?;
    capacity.strip_suffix('%')?.parse().ok()
}

/// Trouve les `top_n` fichiers réguliers les plus volumineux sous `path`
///
/// Les entrées illisibles (permission refusée, fichier disparu) sont
/// ignorées, comme dans l'outil d'origine.
pub fn find_largest_files(path: &Path, top_n: usize) -> Vec<(PathBuf, u64)> {
    let mut files = Vec::new();
    collect_files(path, &mut files);
    files.sort_by(|a, b| b.1.cmp(&a.1));
    files.truncate(top_n);
    files
}

fn collect_files(dir: &Path, files: &mut Vec<(PathBuf, u64)>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let metadata = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(_) => continue,
        };

        if metadata.is_dir() {
            collect_files(&path, files);
        } else if metadata.is_file() {
            files.push((path, metadata.len()));
        }
        // Liens symboliques ignorés: suivre un lien pourrait sortir de la partition
    }
}

fn create_archive(files: &[(PathBuf, u64)], archive_path: &Path) -> Result<()> {
    let output = Command::new("tar")
        .arg("-czf")
        .arg(archive_path)
        .args(files.iter().map(|(path, _)| path))
        .output()
        .context("invocation de tar")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tar a échoué: {}", stderr.trim()));
    }

    Ok(())
}

fn remove_files(files: &[(PathBuf, u64)]) {
    for (path, _) in files {
        if let Err(e) = fs::remove_file(path) {
            // Fichier déjà disparu ou protégé: continuer avec les autres
            warn!("Suppression de {} impossible: {}", path.display(), e);
        }
    }
}
