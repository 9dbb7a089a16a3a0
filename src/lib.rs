pub mod capture;
pub mod cli;
pub mod config;
pub mod event;
pub mod ingest;
pub mod playback;
pub mod storage;
pub mod timeline;
pub mod web;
