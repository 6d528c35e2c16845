//! Compiler harness.

use helios_search_compiler::{
    CompiledQuery, CompilerConfig, QueryCompiler, QueryErrors, RawQuery, SearchParameterRegistry,
    TenantId, TenantPolicies,
};

use super::fixtures;

/// Owns the fixture snapshots and compiles queries against them.
pub struct TestHarness {
    pub registry: SearchParameterRegistry,
    pub policies: TenantPolicies,
    pub config: CompilerConfig,
}

impl TestHarness {
    /// Creates a harness over the standard fixtures.
    pub fn new() -> Self {
        Self {
            registry: fixtures::registry(),
            policies: fixtures::policies(),
            config: CompilerConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns a compiler over the harness snapshots.
    pub fn compiler(&self) -> QueryCompiler<'_> {
        QueryCompiler::new(&self.registry, &self.policies, &self.config)
    }

    /// Compiles ordered `(key, value)` pairs for a tenant.
    pub fn compile(
        &self,
        tenant: &str,
        resource_type: &str,
        pairs: &[(&str, &str)],
    ) -> Result<CompiledQuery, QueryErrors> {
        self.compiler().compile(
            &TenantId::new(tenant),
            resource_type,
            &RawQuery::from_pairs(pairs.iter().copied()),
        )
    }

    /// Compiles for the default tenant.
    pub fn compile_default(
        &self,
        resource_type: &str,
        pairs: &[(&str, &str)],
    ) -> Result<CompiledQuery, QueryErrors> {
        self.compile(helios_search_compiler::tenant::DEFAULT_TENANT_ID, resource_type, pairs)
    }
}
