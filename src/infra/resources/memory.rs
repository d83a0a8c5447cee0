//! In-memory proxy and account pool.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::error::StoreError;
use crate::core::resources::{Account, AccountRequest, Proxy, ProxyHealth, ResourcePool};

#[derive(Default)]
struct Proxies {
    free: VecDeque<Proxy>,
    busy: HashSet<Proxy>,
    quarantined: Vec<Proxy>,
    last_exit: HashMap<Proxy, String>,
    unhealthy: HashSet<Proxy>,
}

#[derive(Default)]
struct Accounts {
    free: VecDeque<Account>,
    busy: HashMap<String, Account>,
}

/// Free/busy pool of proxies and accounts held in memory.
///
/// Proxies marked unhealthy with [`InMemoryResourcePool::mark_unhealthy`] fail
/// their release probe and are quarantined instead of returned.
#[derive(Default)]
pub struct InMemoryResourcePool {
    proxies: Mutex<Proxies>,
    accounts: Mutex<Accounts>,
}

impl InMemoryResourcePool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool seeded with free proxies and accounts.
    pub fn with_resources(
        proxies: impl IntoIterator<Item = Proxy>,
        accounts: impl IntoIterator<Item = Account>,
    ) -> Self {
        let pool = Self::new();
        pool.proxies.lock().free.extend(proxies);
        pool.accounts.lock().free.extend(accounts);
        pool
    }

    /// Add a free proxy.
    pub fn add_proxy(&self, proxy: Proxy) {
        self.proxies.lock().free.push_back(proxy);
    }

    /// Add a free account.
    pub fn add_account(&self, account: Account) {
        self.accounts.lock().free.push_back(account);
    }

    /// Make future probes of `proxy` report it unhealthy.
    pub fn mark_unhealthy(&self, proxy: &Proxy) {
        self.proxies.lock().unhealthy.insert(proxy.clone());
    }

    /// Free proxies.
    pub fn free_proxies(&self) -> usize {
        self.proxies.lock().free.len()
    }

    /// Free accounts.
    pub fn free_accounts(&self) -> usize {
        self.accounts.lock().free.len()
    }

    /// Proxies and accounts currently checked out.
    pub fn checked_out(&self) -> (usize, usize) {
        (self.proxies.lock().busy.len(), self.accounts.lock().busy.len())
    }

    /// Proxies withheld after a failed probe.
    pub fn quarantined(&self) -> Vec<Proxy> {
        self.proxies.lock().quarantined.clone()
    }

    /// Exit address recorded at the last healthy release.
    pub fn last_exit_address(&self, proxy: &Proxy) -> Option<String> {
        self.proxies.lock().last_exit.get(proxy).cloned()
    }
}

#[async_trait]
impl ResourcePool for InMemoryResourcePool {
    async fn try_acquire_proxy(&self) -> Result<Option<Proxy>, StoreError> {
        let mut proxies = self.proxies.lock();
        let proxy = proxies.free.pop_front();
        if let Some(p) = &proxy {
            proxies.busy.insert(p.clone());
        }
        Ok(proxy)
    }

    async fn try_acquire_account(
        &self,
        request: AccountRequest<'_>,
    ) -> Result<Option<Account>, StoreError> {
        let mut accounts = self.accounts.lock();
        let Some(pos) = accounts
            .free
            .iter()
            .position(|a| !request.exclude.contains(&a.phone_number))
        else {
            return Ok(None);
        };
        let account = accounts.free.remove(pos);
        if let Some(a) = &account {
            accounts.busy.insert(a.phone_number.clone(), a.clone());
        }
        Ok(account)
    }

    async fn probe_proxy(&self, proxy: &Proxy) -> ProxyHealth {
        if self.proxies.lock().unhealthy.contains(proxy) {
            return ProxyHealth::Unhealthy;
        }
        let host = proxy.0.split(':').next().unwrap_or_default();
        ProxyHealth::Healthy {
            exit_address: host.to_string(),
        }
    }

    async fn release_proxy(&self, proxy: Proxy, health: ProxyHealth) {
        let mut proxies = self.proxies.lock();
        if !proxies.busy.remove(&proxy) {
            return;
        }
        match health {
            ProxyHealth::Healthy { exit_address } => {
                proxies.last_exit.insert(proxy.clone(), exit_address);
                proxies.free.push_back(proxy);
            }
            ProxyHealth::Unhealthy => proxies.quarantined.push(proxy),
        }
    }

    async fn release_phone_number(&self, phone_number: &str) {
        let mut accounts = self.accounts.lock();
        if let Some(account) = accounts.busy.remove(phone_number) {
            accounts.free.push_back(account);
        }
    }
}
