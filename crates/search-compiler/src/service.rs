//! Long-lived search compilation service.
//!
//! Owns the registry and policy snapshots and hands each request a compiler
//! bound to the snapshots current at the start of the request.

use tokio::sync::broadcast;
use tracing::info;

use crate::compiler::QueryCompiler;
use crate::config::CompilerConfig;
use crate::error::{QueryErrors, SearchError};
use crate::parse::RawQuery;
use crate::schema::SearchParameterRegistry;
use crate::snapshot::{SnapshotStore, SnapshotUpdate};
use crate::tenant::{TenantId, TenantPolicies};
use crate::types::CompiledQuery;

/// Shared entry point for compiling searches.
#[derive(Debug)]
pub struct SearchService {
    registry: SnapshotStore<SearchParameterRegistry>,
    policies: SnapshotStore<TenantPolicies>,
    config: CompilerConfig,
}

impl SearchService {
    /// Creates a service after validating `config`.
    pub fn new(
        registry: SearchParameterRegistry,
        policies: TenantPolicies,
        config: CompilerConfig,
    ) -> Result<Self, SearchError> {
        config.validate().map_err(|errors| SearchError::Configuration {
            message: errors.join(", "),
        })?;
        info!(
            parameters = registry.len(),
            resource_types = registry.type_count(),
            tenants = policies.tenant_count(),
            "Search service initialized"
        );
        Ok(Self {
            registry: SnapshotStore::new(registry),
            policies: SnapshotStore::new(policies),
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles a search on `resource_type`, or a system-level search when
    /// `resource_type` is `None`. A missing tenant falls back to the
    /// configured default.
    pub fn compile(
        &self,
        tenant: Option<&TenantId>,
        resource_type: Option<&str>,
        query: &RawQuery,
    ) -> Result<CompiledQuery, QueryErrors> {
        let default_tenant;
        let tenant = match tenant {
            Some(tenant) => tenant,
            None => {
                default_tenant = self.config.default_tenant_id();
                &default_tenant
            }
        };

        let registry = self.registry.load();
        let policies = self.policies.load();
        let compiler = QueryCompiler::new(&*registry, &*policies, &self.config);
        match resource_type {
            Some(resource_type) => compiler.compile(tenant, resource_type, query),
            None => compiler.compile_system(tenant, query),
        }
    }

    /// Publishes a new registry snapshot.
    pub fn reload_registry(&self, registry: SearchParameterRegistry) -> u64 {
        self.registry.publish(registry)
    }

    /// Publishes a new tenant policy snapshot.
    pub fn reload_policies(&self, policies: TenantPolicies) -> u64 {
        self.policies.publish(policies)
    }

    /// Subscribes to registry reloads.
    pub fn subscribe_registry(&self) -> broadcast::Receiver<SnapshotUpdate> {
        self.registry.subscribe()
    }

    /// Subscribes to policy reloads.
    pub fn subscribe_policies(&self) -> broadcast::Receiver<SnapshotUpdate> {
        self.policies.subscribe()
    }
}
