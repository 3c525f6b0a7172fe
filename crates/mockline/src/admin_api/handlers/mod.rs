pub mod stubs;
pub mod system;
pub mod traffic;
