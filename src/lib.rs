#![forbid(unsafe_code)]

pub mod capture;
pub mod classify;
pub mod cli;
pub mod download;
pub mod error;
pub mod fetch;
pub mod ffmpeg;
pub mod formats;
pub mod layout;
pub mod logging;
pub mod plan;
pub mod sanitize;
pub mod split;
