//! Host routing rules for the web front end

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Host always routed to the front end
pub const LOCALHOST: &str = "localhost";

/// Alias containers use to reach the host
pub const HOST_ALIAS: &str = "host.docker.internal";

/// Named port on the web service
pub const HTTP_PORT_NAME: &str = "http";

/// A single `host + path prefix` rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRule {
    pub host: String,
    pub path: String,
}

/// Full set of routing rules for one install
///
/// Rebuilt on every install and applied as a whole; never diffed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRuleSet {
    /// Backend service receiving every rule
    pub service: String,

    /// Named port on the backend service
    pub port_name: String,

    /// Rules in application order
    pub rules: Vec<HostRule>,
}

impl IngressRuleSet {
    /// Build the rule set for `localhost`, the host alias, and any extra hosts
    ///
    /// Duplicate hosts are dropped, keeping the first occurrence.
    pub fn for_hosts<S: AsRef<str>>(service: impl Into<String>, extra_hosts: &[S]) -> Result<Self> {
        let mut hosts: Vec<String> = vec![LOCALHOST.to_string(), HOST_ALIAS.to_string()];

        for host in extra_hosts {
            let host = host.as_ref().trim().to_lowercase();
            validate_host(&host)?;
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }

        Ok(Self {
            service: service.into(),
            port_name: HTTP_PORT_NAME.to_string(),
            rules: hosts
                .into_iter()
                .map(|host| HostRule {
                    host,
                    path: "/".to_string(),
                })
                .collect(),
        })
    }

    /// Hosts in rule order
    pub fn hosts(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.host.as_str()).collect()
    }
}

/// Check a hostname against RFC 1123 label rules
fn validate_host(host: &str) -> Result<()> {
    let invalid = |reason: &str| CoreError::InvalidHost {
        host: host.to_string(),
        reason: reason.to_string(),
    };

    if host.is_empty() {
        return Err(invalid("hostname is empty"));
    }
    if host.len() > 253 {
        return Err(invalid("hostname exceeds 253 characters"));
    }

    for label in host.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(invalid("each label must be 1-63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("labels cannot start or end with '-'"));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(invalid("only a-z, 0-9, '-' and '.' are allowed"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hosts() {
        let rules = IngressRuleSet::for_hosts("web", &[] as &[&str]).unwrap();
        assert_eq!(rules.hosts(), vec![LOCALHOST, HOST_ALIAS]);
        assert!(rules.rules.iter().all(|r| r.path == "/"));
        assert_eq!(rules.port_name, "http");
    }

    #[test]
    fn test_extra_hosts_deduplicated() {
        let rules = IngressRuleSet::for_hosts(
            "web",
            &["app.example.com", "LOCALHOST", "app.example.com", "other.lan"],
        )
        .unwrap();
        assert_eq!(
            rules.hosts(),
            vec![LOCALHOST, HOST_ALIAS, "app.example.com", "other.lan"]
        );
    }

    #[test]
    fn test_invalid_hosts_rejected() {
        assert!(IngressRuleSet::for_hosts("web", &[""]).is_err());
        assert!(IngressRuleSet::for_hosts("web", &["bad_host"]).is_err());
        assert!(IngressRuleSet::for_hosts("web", &["-lead.example"]).is_err());
        assert!(IngressRuleSet::for_hosts("web", &["a..b"]).is_err());
    }
}
