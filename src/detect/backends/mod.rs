pub mod cpu;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use cpu::CpuBackend;
pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractDetector;
