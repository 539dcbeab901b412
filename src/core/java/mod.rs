pub mod runtime;

pub use runtime::{java_executable, JdkProvisioner, JdkRequest, LocalJdkProvisioner};
