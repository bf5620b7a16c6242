pub mod bootstrap;
pub mod calendar_reconcile;
pub mod commands;
pub mod plan_parser;
pub mod planning_context;
pub mod rollover;
