//! Built-in rules and the registry that instantiates them.
//!
//! Rules are never discovered at runtime: every rule the analyzer can run is listed in a
//! [`RuleRegistry`] as a [`RuleFactory`]. [`RuleRegistry::new`] holds the built-in rules,
//! [`RuleRegistry::empty`] starts blank for callers assembling their own set.
//!
//! # Built-in Rules
//!
//! | Check | Rule | Finds |
//! |---|---|---|
//! | `C1025` | [`ZeroDivide`] | division by a constant zero |
//! | `C1037` | [`RedundantOperand`] | `x - x`, `x == x`, `Math.Max(x, x)` |
//! | `MS1008` | [`LockThis`] | `lock (this)` in non-private methods |
//! | `R1014` | [`StaticSetter`] | unlocked static setters reachable from thread roots |
//! | `R1037` | [`RecursiveLock`] | a lock re-taken through a call chain of its type |
//!
//! # Examples
//!
//! ```rust
//! use dotlint::config::AnalysisConfig;
//! use dotlint::metadata::TargetRuntime;
//! use dotlint::rules::RuleRegistry;
//!
//! let registry = RuleRegistry::new();
//! let config = AnalysisConfig::default().disable("MS1008");
//! let (rules, diagnostics) = registry.instantiate(&config, TargetRuntime::V4_0);
//!
//! assert_eq!(rules.len(), registry.len() - 1);
//! assert!(diagnostics.is_empty());
//! ```

mod lock_this;
mod locks;
mod recursive_lock;
mod redundant_operand;
mod static_setter;
mod zero_divide;

pub use lock_this::LockThis;
pub use recursive_lock::RecursiveLock;
pub use redundant_operand::RedundantOperand;
pub use static_setter::StaticSetter;
pub use zero_divide::ZeroDivide;

pub use crate::dispatch::RuleInfo;

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::{
    config::AnalysisConfig,
    dispatch::{boxed, DynRule, Rule},
    metadata::TargetRuntime,
    report::{Diagnostic, DiagnosticKind},
    Error, Result,
};

/// Builds one rule for a run.
pub type BuildRule = fn(&AnalysisConfig) -> Result<Box<dyn DynRule>>;

/// A registered rule: its description and how to build it.
#[derive(Clone, Copy)]
pub struct RuleFactory {
    /// Description of the built rule
    pub info: &'static RuleInfo,
    /// Constructor
    pub build: BuildRule,
}

impl RuleFactory {
    /// Factory for a rule with a `Default` constructor
    #[must_use]
    pub fn of<R: Rule + Default>() -> Self {
        RuleFactory {
            info: R::default().info(),
            build: |_| Ok(boxed(R::default())),
        }
    }
}

impl std::fmt::Debug for RuleFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleFactory")
            .field("check_id", &self.info.check_id)
            .field("name", &self.info.name)
            .finish()
    }
}

/// Ordered set of rule factories, keyed by check id.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    factories: Vec<RuleFactory>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    /// Creates a registry holding every built-in rule
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(RuleFactory::of::<ZeroDivide>());
        registry.register(RuleFactory::of::<RedundantOperand>());
        registry.register(RuleFactory::of::<LockThis>());
        registry.register(RuleFactory::of::<StaticSetter>());
        registry.register(RuleFactory::of::<RecursiveLock>());
        registry
    }

    /// Creates a registry without any rules
    #[must_use]
    pub fn empty() -> Self {
        RuleRegistry {
            factories: Vec::new(),
        }
    }

    /// Adds a factory. A factory with the same check id is replaced in place.
    pub fn register(&mut self, factory: RuleFactory) {
        match self
            .factories
            .iter_mut()
            .find(|existing| existing.info.check_id == factory.info.check_id)
        {
            Some(existing) => *existing = factory,
            None => self.factories.push(factory),
        }
    }

    /// Number of registered rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no rule is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Descriptions of the registered rules, in registration order
    pub fn infos(&self) -> impl Iterator<Item = &'static RuleInfo> + '_ {
        self.factories.iter().map(|factory| factory.info)
    }

    /// Looks up a rule description by check id
    #[must_use]
    pub fn info(&self, check_id: &str) -> Option<&'static RuleInfo> {
        self.infos().find(|info| info.check_id == check_id)
    }

    /// Builds the rules to run on an assembly targeting `runtime`.
    ///
    /// Rules disabled in `config` or requiring a newer runtime are skipped. A factory that
    /// fails or panics is left out and recorded as a [`DiagnosticKind::RuleNotInstantiated`]
    /// diagnostic; the other rules are still built.
    #[must_use]
    pub fn instantiate(
        &self,
        config: &AnalysisConfig,
        runtime: TargetRuntime,
    ) -> (Vec<Box<dyn DynRule>>, Vec<Diagnostic>) {
        let mut rules = Vec::with_capacity(self.factories.len());
        let mut diagnostics = Vec::new();

        for factory in &self.factories {
            let info = factory.info;
            if config.is_disabled(info.check_id) {
                log::debug!("rule {} is disabled", info.check_id);
                continue;
            }
            if !info.supports(runtime) {
                log::debug!("rule {} does not apply to {runtime}", info.check_id);
                continue;
            }

            let outcome = catch_unwind(AssertUnwindSafe(|| (factory.build)(config)));
            let error = match outcome {
                Ok(Ok(rule)) => {
                    rules.push(rule);
                    continue;
                }
                Ok(Err(error)) => error,
                Err(_) => Error::RuleInstantiation {
                    check_id: info.check_id.to_string(),
                    message: "factory panicked".to_string(),
                },
            };
            log::warn!("could not instantiate rule {}: {error}", info.check_id);
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::RuleNotInstantiated,
                check_id: Some(info.check_id.to_string()),
                subject: info.name.to_string(),
                message: error.to_string(),
            });
        }
        (rules, diagnostics)
    }
}
