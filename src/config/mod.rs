#[cfg(feature = "cli")]
pub mod cli;
pub mod profiles;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use profiles::ProfilesConfig;
