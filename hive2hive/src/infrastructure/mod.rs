// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Layer
//!
//! Everything that touches a runtime, a cipher implementation, a file
//! system, or the overlay: configuration, logging, adapters, and the
//! execution runtime.

pub mod adapters;
pub mod config;
pub mod logging;
pub mod runtime;
