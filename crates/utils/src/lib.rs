pub mod lockfile;
pub mod logging;
pub mod response;
