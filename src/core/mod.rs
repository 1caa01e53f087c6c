//! 核心层：错误类型、执行阶段、运行监管（单飞与取消）

pub mod error;
pub mod session_supervisor;
pub mod state;

pub use error::AgentError;
pub use session_supervisor::SessionSupervisor;
pub use state::{ExecutorPhase, PhaseCell};
