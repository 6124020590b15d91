//! 核心层：错误与退避、时钟、循环状态、主循环监管、优雅关闭

pub mod clock;
pub mod error;
pub mod recovery;
pub mod shutdown;
pub mod state;
pub mod supervisor;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BotError, RecoveryAction};
pub use recovery::BackoffPolicy;
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::{CycleReport, LoopPhase};
pub use supervisor::{Supervisor, SupervisorSettings};
