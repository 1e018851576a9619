// ABOUTME: Configuration module for environment-driven server settings
// ABOUTME: All runtime configuration enters through environment variables
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

pub mod environment;

pub use environment::{Environment, ServerConfig, WeChatConfig};
