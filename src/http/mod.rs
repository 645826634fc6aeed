pub mod client;

pub use client::{HttpClient, HttpConfig, HttpResponseError};
