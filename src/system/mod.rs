pub mod collector;
pub mod device;
pub mod platform;
pub mod process;
pub mod smi;
pub mod snapshot;
