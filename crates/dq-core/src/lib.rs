//! DQ Core - developer task views over a shared query cache
//!
//! Binds the developer read models to one [`dq_query::QueryStore`]:
//! - Task list: filters, pagination, optimistic status moves
//! - Sprint board: deduplicated tasks with live metrics
//! - Dashboard: assigned work summary
//! - Service boundary: HTTP and in-memory backends
//!
//! # Example
//!
//! ```rust,ignore
//! use dq_core::{ClientConfig, DeveloperClient};
//! use dq_domain::{BoardFilter, TaskId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DeveloperClient::from_config(ClientConfig::new().with_env_overrides())?;
//!
//! let mut board = client.sprint_board("s1", BoardFilter::All);
//! board.settled().await;
//! board.update_task_status(&TaskId::new("t1"), "en_revision").await?;
//!
//! println!("progress: {:?}", board.metrics().map(|m| m.sprint_progress));
//! client.shutdown();
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod query;
pub mod service;

pub use config::{ClientConfig, QueryOptionsConfig, ENV_AUTH_TOKEN, ENV_BASE_URL};
pub use error::{ClientError, ClientResult, ConfigError, ServiceError};
pub use query::{
    dependents, target_status, DashboardQuery, DeveloperClient, SprintBoardQuery, TaskListQuery,
    DASHBOARD, SPRINT_BOARD, TASKS,
};
pub use service::{
    ApiResponse, BoardPayload, DashboardPayload, Endpoint, HttpTaskService, InMemoryTaskService,
    TaskService,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the developer views
    pub use crate::{
        ClientConfig, ClientError, DeveloperClient, InMemoryTaskService, SprintBoardQuery,
        TaskListQuery, TaskService,
    };
    pub use dq_domain::{BoardFilter, CanonicalStatus, Status, Task, TaskFilters, TaskId};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
