//! Filter predicates: which side of a packet is matched against which reference address.

use std::fmt;
use std::net::IpAddr;

use crate::configuration::types::ReferenceAddresses;

/// Direction of traffic relative to a reference address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrafficDirection {
    /// Packets sent by the reference address (matched on the source field).
    Outbound,
    /// Packets received by the reference address (matched on the destination field).
    Inbound,
}

impl TrafficDirection {
    pub fn address_field(&self) -> &'static str {
        match self {
            TrafficDirection::Outbound => "src",
            TrafficDirection::Inbound => "dst",
        }
    }

    pub fn report_label(&self) -> &'static str {
        match self {
            TrafficDirection::Outbound => "send",
            TrafficDirection::Inbound => "receive",
        }
    }
}

/// Which of the two configured reference addresses a predicate is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressScope {
    Local,
    Secondary,
}

impl AddressScope {
    pub fn address(&self, addresses: &ReferenceAddresses) -> IpAddr {
        match self {
            AddressScope::Local => addresses.local,
            AddressScope::Secondary => addresses.secondary,
        }
    }
}

/// A (direction, scope) pair selecting the packets one filter job keeps.
///
/// Ordering follows [`FilterPredicate::ALL`], which is also the order reports are listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterPredicate {
    pub direction: TrafficDirection,
    pub scope: AddressScope,
}

impl FilterPredicate {
    /// The four fixed predicates of an analysis run.
    pub const ALL: [FilterPredicate; 4] = [
        FilterPredicate::new(TrafficDirection::Outbound, AddressScope::Local),
        FilterPredicate::new(TrafficDirection::Inbound, AddressScope::Local),
        FilterPredicate::new(TrafficDirection::Outbound, AddressScope::Secondary),
        FilterPredicate::new(TrafficDirection::Inbound, AddressScope::Secondary),
    ];

    pub const fn new(direction: TrafficDirection, scope: AddressScope) -> Self {
        Self { direction, scope }
    }

    /// Display filter handed to the filter tool, e.g. `ip.src == 127.0.0.1`.
    pub fn expression(&self, addresses: &ReferenceAddresses) -> String {
        let address = self.scope.address(addresses);
        let family = match address {
            IpAddr::V4(_) => "ip",
            IpAddr::V6(_) => "ipv6",
        };
        format!(
            "{}.{} == {}",
            family,
            self.direction.address_field(),
            address
        )
    }

    /// Report file name, `{scope}-{direction}.json`.
    pub fn report_file_name(&self, secondary_label: &str) -> String {
        let scope = match self.scope {
            AddressScope::Local => "local",
            AddressScope::Secondary => secondary_label,
        };
        format!("{}-{}.json", scope, self.direction.report_label())
    }

    fn position(&self) -> usize {
        match (self.scope, self.direction) {
            (AddressScope::Local, TrafficDirection::Outbound) => 0,
            (AddressScope::Local, TrafficDirection::Inbound) => 1,
            (AddressScope::Secondary, TrafficDirection::Outbound) => 2,
            (AddressScope::Secondary, TrafficDirection::Inbound) => 3,
        }
    }
}

impl PartialOrd for FilterPredicate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FilterPredicate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.position().cmp(&other.position())
    }
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            TrafficDirection::Outbound => "outbound",
            TrafficDirection::Inbound => "inbound",
        };
        let scope = match self.scope {
            AddressScope::Local => "local",
            AddressScope::Secondary => "secondary",
        };
        write!(f, "{}/{}", direction, scope)
    }
}
