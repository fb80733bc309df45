//! Types that are used across multiple components of the fork database.

pub mod data_types;

pub mod block;

pub mod producer_schedule;

pub mod merkle;

pub mod extensions;

pub mod features;
