//! Test fixture for txflow integration tests
//!
//! Mirrors a classic signup flow: a member repository and an audit-log
//! repository writing to one shared store, each behind its own declarative
//! transaction boundary, composed by a service with boundaries of its own.
//! The log repository raises a runtime-class failure for usernames containing
//! `logfail`, after it has already buffered its write.

use std::sync::Arc;

use thiserror::Error;
use txflow::{
    ExecError, FailureSpec, MemoryHandle, MemoryStore, TransactionContext, TransactionDefinition,
    TransactionManager, TxError,
};

pub type Ctx = TransactionContext<MemoryHandle>;

/// Failure taxonomy of the demo services
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Runtime-class: rolls back by default
    #[error("log write failed for {0}")]
    LogWrite(String),
    /// Checked-class: commits by default
    #[error("business outcome: {0}")]
    Business(String),
    /// Runtime-class: engine or storage trouble crossing a boundary
    #[error("storage failure: {0}")]
    Storage(String),
}

impl FailureSpec for ServiceError {
    fn kind(&self) -> &str {
        match self {
            ServiceError::LogWrite(_) => "log_write",
            ServiceError::Business(_) => "business",
            ServiceError::Storage(_) => "storage",
        }
    }

    fn rollback_eligible(&self) -> bool {
        !matches!(self, ServiceError::Business(_))
    }
}

impl From<TxError> for ServiceError {
    fn from(err: TxError) -> Self {
        ServiceError::Storage(err.to_string())
    }
}

/// Unwrap a boundary error back into the service taxonomy
pub fn flatten(err: ExecError<ServiceError>) -> ServiceError {
    match err {
        ExecError::Failure(e) => e,
        ExecError::Tx(e) => ServiceError::Storage(e.to_string()),
    }
}

fn write(ctx: &Ctx, key: String, value: &str) -> Result<(), ServiceError> {
    ctx.with_resource(|h| h.put(key, value)).map_err(ServiceError::from)
}

pub struct MemberRepository {
    manager: Arc<TransactionManager<MemoryStore>>,
}

impl MemberRepository {
    pub fn save(&self, ctx: &Ctx, username: &str) -> Result<(), ServiceError> {
        self.manager
            .execute(
                ctx,
                &TransactionDefinition::required("member_repository.save"),
                || write(ctx, format!("member/{}", username), username),
            )
            .map_err(flatten)
    }
}

pub struct LogRepository {
    manager: Arc<TransactionManager<MemoryStore>>,
    definition: TransactionDefinition,
}

impl LogRepository {
    pub fn save(&self, ctx: &Ctx, username: &str) -> Result<(), ServiceError> {
        self.manager
            .execute(ctx, &self.definition, || {
                write(ctx, format!("log/{}", username), username)?;
                // The write is buffered before the failure, as in any
                // repository that blows up after its insert.
                if username.contains("logfail") {
                    return Err(ServiceError::LogWrite(username.to_string()));
                }
                Ok(())
            })
            .map_err(flatten)
    }
}

pub struct MemberService {
    manager: Arc<TransactionManager<MemoryStore>>,
    pub member_repo: MemberRepository,
    pub log_repo: LogRepository,
}

impl MemberService {
    /// Outer boundary ON: both repositories join the service transaction
    pub fn join_v1(&self, ctx: &Ctx, username: &str) -> Result<(), ExecError<ServiceError>> {
        self.manager.execute(
            ctx,
            &TransactionDefinition::required("member_service.join_v1"),
            || {
                self.member_repo.save(ctx, username)?;
                self.log_repo.save(ctx, username)?;
                Ok(())
            },
        )
    }

    /// Outer boundary OFF: each repository runs its own transaction
    pub fn join_v1_no_outer(&self, ctx: &Ctx, username: &str) -> Result<(), ServiceError> {
        self.member_repo.save(ctx, username)?;
        self.log_repo.save(ctx, username)?;
        Ok(())
    }

    /// Outer boundary ON, log failure caught and recovered in the service
    pub fn join_v2(&self, ctx: &Ctx, username: &str) -> Result<(), ExecError<ServiceError>> {
        self.manager.execute(
            ctx,
            &TransactionDefinition::required("member_service.join_v2"),
            || {
                self.member_repo.save(ctx, username)?;
                if let Err(err) = self.log_repo.save(ctx, username) {
                    log::info!("log save failed, continuing signup: {}", err);
                }
                Ok(())
            },
        )
    }

    /// Single boundary at the service, repositories unwrapped
    pub fn join_single(&self, ctx: &Ctx, username: &str) -> Result<(), ExecError<ServiceError>> {
        self.manager.execute(
            ctx,
            &TransactionDefinition::required("member_service.join_single"),
            || {
                write(ctx, format!("member/{}", username), username)?;
                write(ctx, format!("log/{}", username), username)?;
                Ok(())
            },
        )
    }
}

/// Fixture wiring one store, one manager, and the demo service
pub struct TestFixture {
    pub store: MemoryStore,
    pub manager: Arc<TransactionManager<MemoryStore>>,
    pub service: MemberService,
}

impl TestFixture {
    /// Log repository on `REQUIRED` (shares the caller's transaction)
    pub fn new() -> Self {
        Self::with_log_definition(TransactionDefinition::required("log_repository.save"))
    }

    /// Log repository on `REQUIRES_NEW` (independent physical transaction)
    pub fn with_requires_new_log() -> Self {
        Self::with_log_definition(TransactionDefinition::requires_new("log_repository.save"))
    }

    fn with_log_definition(definition: TransactionDefinition) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let store = MemoryStore::new();
        let manager = Arc::new(TransactionManager::new(store.clone()));
        let service = MemberService {
            manager: Arc::clone(&manager),
            member_repo: MemberRepository {
                manager: Arc::clone(&manager),
            },
            log_repo: LogRepository {
                manager: Arc::clone(&manager),
                definition,
            },
        };
        Self {
            store,
            manager,
            service,
        }
    }

    pub fn context(&self) -> Ctx {
        self.manager.context()
    }

    pub fn member_saved(&self, username: &str) -> bool {
        self.store.contains(&format!("member/{}", username))
    }

    pub fn log_saved(&self, username: &str) -> bool {
        self.store.contains(&format!("log/{}", username))
    }
}
