//! Job application handlers

pub mod create;
pub mod delete_by_id;
pub mod get_by_id;
pub mod list;
pub mod transitions;
pub mod update;
