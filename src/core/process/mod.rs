mod logs;
mod supervisor;

pub use logs::RollingLog;
pub use supervisor::ProcessSupervisor;
