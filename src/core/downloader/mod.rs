mod client;

pub use client::{DownloadEntry, Downloader, ProgressFn};
