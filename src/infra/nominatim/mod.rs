pub mod client;

pub use client::NominatimClient;

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
