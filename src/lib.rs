pub mod barrier;
pub mod bus;
pub mod config;
pub mod coordinator;
pub mod dialog;
pub mod error;
pub mod event;
pub mod logging;
pub mod navigation;
pub mod query;
pub mod resource;
pub mod routes;
pub mod runtime;
pub mod script;
pub mod scroll;
pub mod selection;
pub mod session;
pub mod widget;
