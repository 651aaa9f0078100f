// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod check;
pub mod config;
pub mod constants;
pub mod deploy;
pub mod error;
pub mod kubernetes;
pub mod report;
pub mod submit;
pub mod types;
pub mod validate;
pub mod wait;

#[cfg(test)]
pub mod test_utils;
