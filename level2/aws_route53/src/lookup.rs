use aws_sdk_route53::Client;
use aws_types::region::Region;
use thiserror::Error;
use tracing::{debug, info};

use crate::{normalize_domain, HostedZone};

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Route 53 request failed\n{0}")]
    Sdk(String),

    #[error("No public hosted zone found for {0}. The zone must exist before deploying")]
    NotFound(String),
}

/// the parts of a listed hosted zone we care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSummary {
    pub id: String,
    pub name: String,
    pub private: bool,
}

/// `ListHostedZonesByName` returns zones in lexicographic order *starting at*
/// the requested name, so the first result is not necessarily a match.
pub fn select_zone(candidates: &[ZoneSummary], domain: &str) -> Result<HostedZone, LookupError> {
    let wanted = normalize_domain(domain);
    candidates
        .iter()
        .filter(|z| !z.private)
        .find(|z| normalize_domain(&z.name) == wanted)
        .map(|z| HostedZone::new(&z.id, &z.name))
        .ok_or(LookupError::NotFound(wanted))
}

pub async fn make_client(region: &str) -> Client {
    let shared_config = aws_config::from_env()
        .region(Region::new(region.to_string()))
        .load()
        .await;
    Client::new(&shared_config)
}

pub async fn lookup_hosted_zone(client: &Client, domain: &str) -> Result<HostedZone, LookupError> {
    let resp = client
        .list_hosted_zones_by_name()
        .dns_name(domain)
        .send()
        .await
        .map_err(|e| LookupError::Sdk(format!("{:#?}", e)))?;
    let candidates: Vec<ZoneSummary> = resp
        .hosted_zones()
        .unwrap_or_default()
        .iter()
        .map(|z| ZoneSummary {
            id: z.id().unwrap_or_default().to_string(),
            name: z.name().unwrap_or_default().to_string(),
            private: z.config().map(|c| c.private_zone()).unwrap_or(false),
        })
        .collect();
    debug!(domain, candidates = candidates.len(), "listed hosted zones");
    let zone = select_zone(&candidates, domain)?;
    info!(domain, zone_id = %zone.id, "found hosted zone");
    Ok(zone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, name: &str, private: bool) -> ZoneSummary {
        ZoneSummary { id: id.into(), name: name.into(), private }
    }

    #[test]
    fn picks_exact_public_match() {
        let candidates = vec![
            summary("/hostedzone/ZPRIVATE", "codebycarson.com.", true),
            summary("/hostedzone/ZPUBLIC", "codebycarson.com.", false),
            summary("/hostedzone/ZOTHER", "codebycarson.computer.", false),
        ];
        let zone = select_zone(&candidates, "codebycarson.com").unwrap();
        assert_eq!(zone, HostedZone::new("ZPUBLIC", "codebycarson.com"));
    }

    #[test]
    fn lexicographic_neighbours_do_not_match() {
        let candidates = vec![summary("/hostedzone/ZOTHER", "codebycarson.computer.", false)];
        let err = select_zone(&candidates, "codebycarson.com.").unwrap_err();
        assert!(matches!(err, LookupError::NotFound(ref d) if d == "codebycarson.com"));
    }
}
