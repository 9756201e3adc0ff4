use std::fmt::Display;

use log::{debug, error, info, warn};

use crate::proxy::ProxyEndpoint;

pub struct HordeLogger;

impl HordeLogger {
    pub fn proxies_loaded(count: usize, url: &str) {
        info!("Loaded {} proxies from {}", count, url);
    }

    pub fn proxy_fetch_failed(url: &str, err: &dyn Display) {
        error!("Failed to load proxies from {}: {}", url, err);
    }

    pub fn malformed_proxy_entry(err: &dyn Display) {
        warn!("Skipping proxy entry: {}", err);
    }

    pub fn no_proxy_available() {
        warn!("No proxy available, skipping connection attempt");
    }

    pub fn flood_started(rate: u32, host: &str, port: u16) {
        info!("Dispatching {} sessions/s against {}:{}", rate, host, port);
    }

    pub fn dispatch_complete(count: u64) {
        info!("Dispatched {} sessions, stopping timer", count);
    }

    pub fn probing(username: &str, proxy: Option<&ProxyEndpoint>) {
        match proxy {
            Some(p) => debug!("[{}] probing target via {}", username, p),
            None => debug!("[{}] probing target directly", username),
        }
    }

    pub fn motd(motd: &str) {
        info!("Server MOTD: {}", motd);
    }

    pub fn motd_parse_failed(raw: &str) {
        warn!("Status JSON did not parse, ignoring");
        debug!("Raw status text: {}", raw);
    }

    pub fn probe_completed(username: &str) {
        debug!("[{}] server pinged successfully", username);
    }

    pub fn session_connected(username: &str, proxy: Option<&ProxyEndpoint>) {
        match proxy {
            Some(p) => info!("Bot {} connected via {}", username, p),
            None => info!("Bot {} connected", username),
        }
    }

    pub fn keep_alive_echoed(username: &str, keep_alive_id: i32) {
        debug!("[{}] echoed keep-alive {}", username, keep_alive_id);
    }

    pub fn malformed_frame(username: &str, err: &dyn Display) {
        debug!("[{}] malformed frame, resyncing: {}", username, err);
    }

    pub fn session_failed(username: &str, stage: &str, err: &dyn Display) {
        error!("Session {} failed during {}: {}", username, stage, err);
    }

    pub fn session_closed(username: &str) {
        debug!("Connection closed for bot {}", username);
    }
}
