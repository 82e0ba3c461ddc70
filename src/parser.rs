//! Normalisation des lignes brutes de la table de connexions
//!
//! Les sorties de type netstat mélangent en-têtes, sockets unix et
//! connexions IP. Seules les lignes contenant une adresse distante sous
//! forme `adresse:port` avec un littéral IP valide produisent un
//! enregistrement ; tout le reste est ignoré silencieusement, ce n'est
//! pas une condition d'erreur.

use crate::models::ConnectionRecord;
use std::net::IpAddr;

/// Tente d'extraire un enregistrement de connexion d'une ligne brute
///
/// La ligne est découpée en champs délimités par des blancs. Le premier
/// champ de forme `adresse:port` est l'adresse locale, le second est
/// l'adresse distante ; cette position relative vaut pour les sorties
/// netstat Linux et Windows comme pour le backend procfs.
pub fn parse_line(line: &str) -> Option<ConnectionRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }

    let mut sockets = fields.iter().filter_map(|f| parse_socket_field(f));
    let (_, local_port) = sockets.next()?;
    let (remote_addr, remote_port) = sockets.next()?;

    Some(ConnectionRecord {
        remote_addr,
        remote_port,
        local_port,
        raw_line: line.to_string(),
    })
}

/// Normalise toutes les lignes d'un échantillon, en sautant le bruit
pub fn parse_lines<'a, I>(lines: I) -> Vec<ConnectionRecord>
where
    I: IntoIterator<Item = &'a str>,
{
    lines.into_iter().filter_map(parse_line).collect()
}

/// Découpe un champ `adresse:port` et valide le littéral IP
///
/// Formes acceptées: `10.0.0.1:5000`, `[::1]:5000`, `2001:db8::1:443`
/// (le port est la partie après le dernier `:`). Le séparateur est
/// obligatoire ; un port non numérique (ex: `*`) donne un port absent.
fn parse_socket_field(field: &str) -> Option<(IpAddr, Option<u16>)> {
    // Forme IPv6 entre crochets: [adresse]:port
    if let Some(rest) = field.strip_prefix('[') {
        let (addr_part, port_part) = rest.split_once("]:")?;
        let addr: IpAddr = addr_part.parse().ok()?;
        return Some((addr, port_part.parse().ok()));
    }

    let (addr_part, port_part) = field.rsplit_once(':')?;
    let addr: IpAddr = addr_part.parse().ok()?;
    Some((addr, port_part.parse().ok()))
}
