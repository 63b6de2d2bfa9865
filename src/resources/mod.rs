//! Resource monitoring and management
//!
//! - **probe**: pluggable source of CPU/memory samples (`sysinfo` in
//!   production, a settable static probe in tests)
//! - **monitor**: background sampling loop with limit checks and a
//!   consecutive-violation counter
//! - **manager**: allocation budget tracking (allocate/deallocate) and
//!   `wait_for_resources` backpressure
//!
//! Persistent violations never raise: they degrade `check_within_limits`
//! to false, which upstream callers treat as "retry later".

pub mod manager;
pub mod monitor;
pub mod probe;

pub use manager::{ResourceConstraint, ResourceManager};
pub use monitor::{MonitorHandle, ResourceMonitor};
pub use probe::{StaticProbe, SysinfoProbe, UsageProbe, UsageSample};
