//! Executor trait and the validated lifecycle contract.
//!
//! Concrete executors implement [`Executor`] and override the operations their
//! backend supports. Callers go through [`ExecutorContract`], which checks each
//! configuration against the operation's schema before the executor sees it.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::ExecutorConfig;
use crate::error::{Error, Result};
use crate::schema::{ConfigValidator, Operation, SchemaRegistry};

/// Executor metrics keyed by name.
pub type Stats = BTreeMap<String, Value>;

/// Extension points of a build executor.
///
/// Mandatory operations fail with [`Error::NotImplemented`] unless overridden.
/// Optional hooks succeed with `Value::Null`.
#[async_trait]
pub trait Executor: Send + Sync {
    // Build lifecycle

    /// Start a new build.
    async fn start(&self, _config: ExecutorConfig) -> Result<Value> {
        Err(Error::NotImplemented)
    }

    /// Stop a running or finished build.
    async fn stop(&self, _config: ExecutorConfig) -> Result<Value> {
        Err(Error::NotImplemented)
    }

    /// Get the status of a build.
    async fn status(&self, _config: ExecutorConfig) -> Result<Value> {
        Err(Error::NotImplemented)
    }

    /// Check a build for problems. `Value::Null` means nothing was found.
    async fn verify(&self, _config: ExecutorConfig) -> Result<Value> {
        Ok(Value::Null)
    }

    // Periodic builds

    /// Schedule periodic builds for a job.
    async fn start_periodic(&self, _config: ExecutorConfig) -> Result<Value> {
        Err(Error::NotImplemented)
    }

    /// Remove the periodic schedule of a job.
    async fn stop_periodic(&self, _config: ExecutorConfig) -> Result<Value> {
        Err(Error::NotImplemented)
    }

    // Frozen builds

    /// Hold a build until its freeze window ends.
    async fn start_frozen(&self, _config: ExecutorConfig) -> Result<Value> {
        Err(Error::NotImplemented)
    }

    /// Drop a frozen build for a job.
    async fn stop_frozen(&self, _config: ExecutorConfig) -> Result<Value> {
        Err(Error::NotImplemented)
    }

    /// Let a build run despite an active freeze window.
    async fn skip_frozen(&self, _config: ExecutorConfig) -> Result<Value> {
        Ok(Value::Null)
    }

    // Timers

    /// Start tracking the run time of a build.
    async fn start_timer(&self, _config: ExecutorConfig) -> Result<Value> {
        Ok(Value::Null)
    }

    /// Stop tracking the run time of a build.
    async fn stop_timer(&self, _config: ExecutorConfig) -> Result<Value> {
        Ok(Value::Null)
    }

    /// Release resources held by the executor.
    async fn clean_up(&self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn stats(&self) -> Stats {
        Stats::new()
    }
}

macro_rules! forward_executor {
    ($ty:ty) => {
        #[async_trait]
        impl<E: Executor + ?Sized> Executor for $ty {
            async fn start(&self, config: ExecutorConfig) -> Result<Value> {
                (**self).start(config).await
            }

            async fn stop(&self, config: ExecutorConfig) -> Result<Value> {
                (**self).stop(config).await
            }

            async fn status(&self, config: ExecutorConfig) -> Result<Value> {
                (**self).status(config).await
            }

            async fn verify(&self, config: ExecutorConfig) -> Result<Value> {
                (**self).verify(config).await
            }

            async fn start_periodic(&self, config: ExecutorConfig) -> Result<Value> {
                (**self).start_periodic(config).await
            }

            async fn stop_periodic(&self, config: ExecutorConfig) -> Result<Value> {
                (**self).stop_periodic(config).await
            }

            async fn start_frozen(&self, config: ExecutorConfig) -> Result<Value> {
                (**self).start_frozen(config).await
            }

            async fn stop_frozen(&self, config: ExecutorConfig) -> Result<Value> {
                (**self).stop_frozen(config).await
            }

            async fn skip_frozen(&self, config: ExecutorConfig) -> Result<Value> {
                (**self).skip_frozen(config).await
            }

            async fn start_timer(&self, config: ExecutorConfig) -> Result<Value> {
                (**self).start_timer(config).await
            }

            async fn stop_timer(&self, config: ExecutorConfig) -> Result<Value> {
                (**self).stop_timer(config).await
            }

            async fn clean_up(&self) -> Result<Value> {
                (**self).clean_up().await
            }

            fn stats(&self) -> Stats {
                (**self).stats()
            }
        }
    };
}

forward_executor!(Arc<E>);
forward_executor!(Box<E>);

/// Validated entry point to an executor.
///
/// Every configuration is checked against the schema of its operation; an
/// invalid configuration never reaches the executor.
pub struct ExecutorContract<E> {
    executor: E,
    validator: Arc<dyn ConfigValidator>,
}

impl<E: Executor> ExecutorContract<E> {
    /// Wrap an executor using the built-in schemas.
    pub fn new(executor: E) -> Self {
        Self::with_validator(executor, SchemaRegistry::builtin())
    }

    pub fn with_validator(executor: E, validator: impl ConfigValidator + 'static) -> Self {
        Self {
            executor,
            validator: Arc::new(validator),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn validated(&self, operation: Operation, config: Value) -> Result<ExecutorConfig> {
        let config = self.validator.validate(operation, config)?;
        let config = ExecutorConfig::from_value(config)?;
        debug!(
            operation = %operation,
            build_id = ?config.build_id_string(),
            "Configuration validated"
        );
        Ok(config)
    }

    /// Start a new build.
    pub async fn start(&self, config: Value) -> Result<Value> {
        let config = self.validated(Operation::Start, config)?;
        self.executor.start(config).await
    }

    /// Stop a running or finished build.
    pub async fn stop(&self, config: Value) -> Result<Value> {
        let config = self.validated(Operation::Stop, config)?;
        self.executor.stop(config).await
    }

    /// Get the status of a build.
    pub async fn status(&self, config: Value) -> Result<Value> {
        let config = self.validated(Operation::Status, config)?;
        self.executor.status(config).await
    }

    /// Verify a build.
    pub async fn verify(&self, config: Value) -> Result<Value> {
        let config = self.validated(Operation::Verify, config)?;
        self.executor.verify(config).await
    }

    /// Schedule periodic builds for a job.
    pub async fn start_periodic(&self, config: Value) -> Result<Value> {
        let config = self.validated(Operation::StartPeriodic, config)?;
        self.executor.start_periodic(config).await
    }

    /// Remove the periodic schedule of a job.
    pub async fn stop_periodic(&self, config: Value) -> Result<Value> {
        let config = self.validated(Operation::StopPeriodic, config)?;
        self.executor.stop_periodic(config).await
    }

    /// Hold a build until its freeze window ends.
    pub async fn start_frozen(&self, config: Value) -> Result<Value> {
        let config = self.validated(Operation::StartFrozen, config)?;
        self.executor.start_frozen(config).await
    }

    /// Drop a frozen build for a job.
    pub async fn stop_frozen(&self, config: Value) -> Result<Value> {
        let config = self.validated(Operation::StopFrozen, config)?;
        self.executor.stop_frozen(config).await
    }

    /// Let a build run despite an active freeze window.
    pub async fn skip_frozen(&self, config: Value) -> Result<Value> {
        let config = ExecutorConfig::from_value(config)?;
        self.executor.skip_frozen(config).await
    }

    /// Start tracking the run time of a build.
    pub async fn start_timer(&self, config: Value) -> Result<Value> {
        let config = ExecutorConfig::from_value(config)?;
        self.executor.start_timer(config).await
    }

    /// Stop tracking the run time of a build.
    pub async fn stop_timer(&self, config: Value) -> Result<Value> {
        let config = ExecutorConfig::from_value(config)?;
        self.executor.stop_timer(config).await
    }

    /// Release resources held by the executor.
    pub async fn clean_up(&self) -> Result<Value> {
        self.executor.clean_up().await
    }

    /// Statistics on the executor.
    pub fn stats(&self) -> Stats {
        self.executor.stats()
    }
}
