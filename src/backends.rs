//! Bring up every faked backend the click scope needs, in dependency order.

use crate::config::HarnessConfig;
use crate::env::{Endpoint, Service, ServiceEnv};
use crate::error::Result;
use crate::fixture::FakeServerFixture;
use clickscope_fakes::catalog::{self, CannedPackage};
use clickscope_fakes::{RecordedRequest, RouteTable};
use std::path::PathBuf;
use tracing::{info, warn};

/// The set of running fakes plus the environment pointing the scope at them.
///
/// Fixtures are stopped in reverse start order, on [`stop`](Self::stop) or
/// on drop, so a failed start still tears down whatever came up first.
#[derive(Debug)]
pub struct FakeBackends {
    fixtures: Vec<(Service, FakeServerFixture)>,
    env: ServiceEnv,
}

impl FakeBackends {
    /// Start with the default catalog (the `shorts` package only).
    ///
    /// `lookup` reads the current value of a backend variable, normally
    /// `|name| std::env::var(name).ok()`.
    ///
    /// # Errors
    ///
    /// Returns the first fixture startup error; fakes already running are
    /// stopped before returning.
    pub fn start<F>(config: &HarnessConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::start_with_catalog(config, vec![CannedPackage::shorts()], lookup)
    }

    /// Start with an explicit package catalog for the search fake.
    ///
    /// Order: download, then search (which embeds the download base URL in
    /// package details), then reviews and pay when a responses root is
    /// configured. When the responses root holds a `click-package-index`
    /// tree, search serves those recorded files behind the auth gate
    /// instead of `packages`.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub fn start_with_catalog<F>(
        config: &HarnessConfig,
        packages: Vec<CannedPackage>,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        config.validate()?;
        let mut backends = Self {
            fixtures: Vec::new(),
            env: ServiceEnv::new(),
        };

        backends.provide(config, Service::Download, &lookup, || {
            Some(catalog::download_server())
        })?;

        let download_url = backends.env.get(Service::Download).map(str::to_owned);
        backends.provide(config, Service::Search, &lookup, || {
            if let Some(dir) = recorded_dir(config, Service::Search) {
                return Some(catalog::json_tree_server(dir, Service::Search.needs_auth()));
            }
            let mut search = packages
                .into_iter()
                .fold(catalog::search_server(), |s, p| s.package(p));
            if let Some(url) = download_url {
                search = search.download_base_url(url);
            }
            if let Some(root) = &config.backends.extra_root {
                search = search.extra_root(root.clone());
            }
            Some(search.build())
        })?;

        for service in [Service::Reviews, Service::Pay] {
            backends.provide(config, service, &lookup, || {
                let root = config.backends.responses_root.as_ref()?;
                let dir = service.responses_dir()?;
                Some(catalog::json_tree_server(root.join(dir), service.needs_auth()))
            })?;
        }

        info!(
            fakes = backends.fixtures.len(),
            unresolved = ?backends.env.unresolved(),
            "fake backends ready"
        );
        Ok(backends)
    }

    /// Fake `service` if its variable asks for it and `table` yields a
    /// route table; otherwise pass the real URL through.
    fn provide<F, T>(
        &mut self,
        config: &HarnessConfig,
        service: Service,
        lookup: &F,
        table: T,
    ) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
        T: FnOnce() -> Option<RouteTable>,
    {
        match Endpoint::from_value(lookup(service.env_var())) {
            Endpoint::Real(url) => {
                info!(%service, url = %url, "using real backend");
                self.env.set(service, url);
            }
            Endpoint::Fake => match table() {
                Some(table) => {
                    let fixture = FakeServerFixture::running(
                        service.to_string(),
                        table,
                        config.fixture.clone(),
                    )?;
                    if let Some(url) = fixture.base_url() {
                        self.env.set(service, url.as_str());
                    }
                    self.fixtures.push((service, fixture));
                }
                None => info!(%service, "no recorded responses configured, backend left unset"),
            },
        }
        Ok(())
    }

    /// Variables to export into the scope's environment.
    pub fn env(&self) -> &ServiceEnv {
        &self.env
    }

    /// The running fake for `service`, if it was faked.
    pub fn fixture(&self, service: Service) -> Option<&FakeServerFixture> {
        self.fixtures
            .iter()
            .find(|(s, _)| *s == service)
            .map(|(_, fixture)| fixture)
    }

    /// Services currently backed by a fake, in start order.
    pub fn faked(&self) -> Vec<Service> {
        self.fixtures.iter().map(|(s, _)| *s).collect()
    }

    /// Undeclared requests across every in-process fake.
    pub fn unmatched_requests(&self) -> Vec<(Service, RecordedRequest)> {
        self.fixtures
            .iter()
            .flat_map(|(s, f)| f.unmatched_requests().into_iter().map(move |r| (*s, r)))
            .collect()
    }

    /// Stop every fake, newest first. Keeps going past failures and
    /// returns the first one.
    ///
    /// # Errors
    ///
    /// Returns the first shutdown error encountered.
    pub fn stop(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some((service, mut fixture)) = self.fixtures.pop() {
            if let Err(e) = fixture.stop() {
                warn!(%service, error = %e, "fake backend did not stop cleanly");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Recorded responses directory for `service`, if one exists on disk.
fn recorded_dir(config: &HarnessConfig, service: Service) -> Option<PathBuf> {
    let dir = config
        .backends
        .responses_root
        .as_ref()?
        .join(service.responses_dir()?);
    dir.is_dir().then_some(dir)
}

impl Drop for FakeBackends {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "fake backends teardown failed");
        }
    }
}
