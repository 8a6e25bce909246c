//! Closed sets of DigitalOcean resource variants.
//!
//! Phase icons and DNS record field layouts are exhaustive matches over these
//! enums, so adding a variant fails to compile until every mapping handles it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of resource a user can favorite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    App,
    Droplet,
    Database,
    Domain,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::App => write!(f, "app"),
            ResourceKind::Droplet => write!(f, "droplet"),
            ResourceKind::Database => write!(f, "database"),
            ResourceKind::Domain => write!(f, "domain"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "app" => Ok(ResourceKind::App),
            "droplet" => Ok(ResourceKind::Droplet),
            "database" => Ok(ResourceKind::Database),
            "domain" => Ok(ResourceKind::Domain),
            _ => anyhow::bail!(
                "Invalid resource kind '{}'. Valid values: app, droplet, database, domain",
                s
            ),
        }
    }
}

/// Lifecycle phase of an App Platform deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentPhase {
    Unknown,
    PendingBuild,
    Building,
    PendingDeploy,
    Deploying,
    Active,
    Superseded,
    Error,
    Canceled,
}

impl DeploymentPhase {
    pub fn icon(self) -> &'static str {
        match self {
            DeploymentPhase::Unknown => "\u{2754}",              // ❔
            DeploymentPhase::PendingBuild => "\u{23F3}",         // ⏳
            DeploymentPhase::Building => "\u{1F528}",            // 🔨
            DeploymentPhase::PendingDeploy => "\u{23F3}",        // ⏳
            DeploymentPhase::Deploying => "\u{1F680}",           // 🚀
            DeploymentPhase::Active => "\u{2705}",               // ✅
            DeploymentPhase::Superseded => "\u{23ED}\u{FE0F}",   // ⏭️
            DeploymentPhase::Error => "\u{274C}",                // ❌
            DeploymentPhase::Canceled => "\u{1F6AB}",            // 🚫
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DeploymentPhase::Unknown => "Unknown",
            DeploymentPhase::PendingBuild => "Pending build",
            DeploymentPhase::Building => "Building",
            DeploymentPhase::PendingDeploy => "Pending deploy",
            DeploymentPhase::Deploying => "Deploying",
            DeploymentPhase::Active => "Active",
            DeploymentPhase::Superseded => "Superseded",
            DeploymentPhase::Error => "Error",
            DeploymentPhase::Canceled => "Canceled",
        }
    }

    /// Still moving; a poller should keep watching.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            DeploymentPhase::PendingBuild
                | DeploymentPhase::Building
                | DeploymentPhase::PendingDeploy
                | DeploymentPhase::Deploying
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeploymentPhase::Active
                | DeploymentPhase::Superseded
                | DeploymentPhase::Error
                | DeploymentPhase::Canceled
        )
    }
}

impl FromStr for DeploymentPhase {
    type Err = std::convert::Infallible;

    /// Unrecognised phases map to `Unknown` rather than failing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "PENDING_BUILD" => DeploymentPhase::PendingBuild,
            "BUILDING" => DeploymentPhase::Building,
            "PENDING_DEPLOY" => DeploymentPhase::PendingDeploy,
            "DEPLOYING" => DeploymentPhase::Deploying,
            "ACTIVE" => DeploymentPhase::Active,
            "SUPERSEDED" => DeploymentPhase::Superseded,
            "ERROR" => DeploymentPhase::Error,
            "CANCELED" => DeploymentPhase::Canceled,
            _ => DeploymentPhase::Unknown,
        })
    }
}

/// One editable field of a DNS record form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Name,
    Data,
    Priority,
    Port,
    Weight,
    Flags,
    Tag,
    Ttl,
}

impl RecordField {
    pub fn label(self) -> &'static str {
        match self {
            RecordField::Name => "Hostname",
            RecordField::Data => "Value",
            RecordField::Priority => "Priority",
            RecordField::Port => "Port",
            RecordField::Weight => "Weight",
            RecordField::Flags => "Flags",
            RecordField::Tag => "Tag",
            RecordField::Ttl => "TTL (seconds)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    A,
    Aaaa,
    Caa,
    Cname,
    Mx,
    Ns,
    Soa,
    Srv,
    Txt,
}

impl DnsRecordType {
    /// Ordered field layout for this record type.
    pub fn fields(self) -> &'static [RecordField] {
        use RecordField::*;
        match self {
            DnsRecordType::A | DnsRecordType::Aaaa | DnsRecordType::Cname => &[Name, Data, Ttl],
            DnsRecordType::Txt | DnsRecordType::Ns => &[Name, Data, Ttl],
            DnsRecordType::Mx => &[Name, Data, Priority, Ttl],
            DnsRecordType::Srv => &[Name, Data, Priority, Port, Weight, Ttl],
            DnsRecordType::Caa => &[Name, Data, Flags, Tag, Ttl],
            // SOA is managed by DigitalOcean; only its TTL is editable
            DnsRecordType::Soa => &[Ttl],
        }
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DnsRecordType::A => "A",
            DnsRecordType::Aaaa => "AAAA",
            DnsRecordType::Caa => "CAA",
            DnsRecordType::Cname => "CNAME",
            DnsRecordType::Mx => "MX",
            DnsRecordType::Ns => "NS",
            DnsRecordType::Soa => "SOA",
            DnsRecordType::Srv => "SRV",
            DnsRecordType::Txt => "TXT",
        };
        f.write_str(name)
    }
}

impl FromStr for DnsRecordType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(DnsRecordType::A),
            "AAAA" => Ok(DnsRecordType::Aaaa),
            "CAA" => Ok(DnsRecordType::Caa),
            "CNAME" => Ok(DnsRecordType::Cname),
            "MX" => Ok(DnsRecordType::Mx),
            "NS" => Ok(DnsRecordType::Ns),
            "SOA" => Ok(DnsRecordType::Soa),
            "SRV" => Ok(DnsRecordType::Srv),
            "TXT" => Ok(DnsRecordType::Txt),
            _ => anyhow::bail!("Unsupported DNS record type '{}'", s),
        }
    }
}
