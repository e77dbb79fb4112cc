//! Core library for the nosh nutrition tracker.
//!
//! Everything the app persists lives in a [`store::LocalStore`]: a flat set
//! of named slots plus separate recipe/template collections. When the user is
//! signed in, [`sync::SyncEngine`] mirrors that state to a cloud document
//! store behind the [`remote::RemoteStore`] trait, one document per
//! [`catalog::RecordType`].

pub mod calc;
pub mod catalog;
pub mod models;
pub mod remote;
pub mod session;
pub mod store;
pub mod sync;
