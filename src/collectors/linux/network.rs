//! Network interfaces, with the default-route interface flagged primary

use crate::data::NetworkInterface;
use crate::error::Result;
use std::fs;

pub fn network_interfaces() -> Result<Vec<NetworkInterface>> {
    let primary = fs::read_to_string("/proc/net/route")
        .ok()
        .and_then(|table| default_route_interface(&table));
    super::super::unix::network_interfaces(primary.as_deref())
}

/// The interface whose destination is 0.0.0.0 with the lowest metric
pub(crate) fn default_route_interface(route_table: &str) -> Option<String> {
    route_table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 7 || fields[1] != "00000000" {
                return None;
            }
            let metric: u32 = fields[6].parse().unwrap_or(u32::MAX);
            Some((metric, fields[0].to_string()))
        })
        .min_by_key(|(metric, _)| *metric)
        .map(|(_, iface)| iface)
}
