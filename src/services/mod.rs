pub mod dataset;
pub mod event_log;
pub mod normalizer;
pub mod notifier;
pub mod shark_attack_service;
pub mod store;

pub use shark_attack_service::SharkAttackService;
