//! Runtime configuration.
//!
//! A handful of knobs govern the flush loop and development diagnostics.
//! Defaults require no setup; hosts that want different behavior call
//! [`set_config`] once, typically at startup.

/// Tunables for the scheduler and graph runtime.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Upper bound on the number of drain passes a single [`crate::flush_sync`]
    /// will perform before concluding the graph is not reaching a fixed
    /// point (an effect that writes to its own transitive dependency on
    /// every run). Exceeding this panics with a diagnostic message rather
    /// than looping forever.
    pub max_flush_iterations: u32,

    /// When true, a write to a signal created with `equals: false` emits a
    /// `tracing` debug event (feature `trace`) noting the forced
    /// propagation, since such writes skip the bailout optimization on
    /// every call.
    pub warn_on_forced_propagation: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_flush_iterations: 1000,
            warn_on_forced_propagation: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_ceiling() {
        let c = RuntimeConfig::default();
        assert_eq!(c.max_flush_iterations, 1000);
        assert!(!c.warn_on_forced_propagation);
    }
}
