// SPDX-License-Identifier: MIT

//! Natural-language questions answered by generating, checking and running SQL

pub mod adk;
pub mod sql;
