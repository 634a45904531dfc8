pub mod client;

pub use client::OpenMeteoClient;

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com";
