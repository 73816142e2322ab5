pub mod extract;
pub mod info;
pub mod preview;
pub mod session;
pub mod upload;
